//! Little-endian primitives for the legacy (OLE2-era) binary formats.
//!
//! Both the BIFF record stream and the property-set streams are built from the same handful of
//! primitives:
//! - fixed-width integers and IEEE754 floats stored least-significant byte first
//!   ([`LeReader`], [`LeWriter`])
//! - a sequential byte source with a small lookahead ([`ByteSource`], [`StreamSource`])
//! - a guard that refuses to allocate buffers for untrusted lengths above a per-call-site cap
//!   ([`limits`])
//!
//! Nothing in this crate keeps hidden state except the process-wide allocation override in
//! [`limits`], which is meant to be configured once at startup.

use std::io;

use thiserror::Error;

mod le;
pub mod limits;
mod source;

pub use le::{get_i16, get_i32, get_u16, get_u32, get_u64, is_compressible, LeReader, LeWriter};
pub use limits::AllocationOverride;
pub use source::{ByteSource, StreamSource};

#[derive(Debug, Error)]
pub enum Error {
    /// Fewer bytes were available than a declared length required.
    #[error("unexpected end of data at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        offset: u64,
        needed: usize,
        available: usize,
    },
    /// A length read from the input exceeds the allocation cap for the call site.
    #[error(
        "tried to allocate {requested} bytes, but the maximum for this record type is {max} bytes; \
         if the file is not corrupt, raise the limit with FORMULA_BINIO_MAX_ALLOCATION"
    )]
    AllocationTooLarge { requested: u64, max: usize },
    #[error("invalid range: offset {offset} is past the end of a {len}-byte buffer")]
    InvalidRange { offset: usize, len: usize },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
