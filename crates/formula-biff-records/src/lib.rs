//! BIFF8 record stream codec.
//!
//! The `Workbook` stream of a legacy `.xls` file is a flat sequence of records, each framed as
//! `sid: u16, len: u16, payload[len]`. Payloads larger than [`framing::MAX_RECORD_DATA_SIZE`] are
//! split across trailing `CONTINUE` (0x003C) frames. This crate:
//! - splits and joins those frames ([`framing`]),
//! - maps each logical record to a typed variant via a static registry ([`registry`]),
//!   falling back to [`UnknownRecord`] so unrecognized records survive a rewrite byte-for-byte,
//! - decodes and re-encodes whole streams ([`stream`]).
//!
//! Every typed record reproduces its input exactly: `encode(decode(bytes)) == bytes`.

use thiserror::Error;

pub mod bitfield;
pub mod continuable;
pub mod framing;
pub mod record;
pub mod records;
pub mod registry;
pub mod rk;
pub mod sid;
pub mod stream;

pub use bitfield::BitField;
pub use framing::{RecordFrame, RecordReader, RecordWriter, MAX_RECORD_DATA_SIZE};
pub use record::{BiffReader, BiffRecord, RecordInput};
pub use records::*;
pub use registry::{decode_frame, lookup, Record};
pub use stream::{
    decode_record_stream, encode_record_stream, DecodeOptions, DecodePolicy, RecordStreamDecoder,
    SubstreamRecords,
};

#[derive(Debug, Error)]
pub enum RecordError {
    /// Truncated input or a length over the allocation cap.
    #[error(transparent)]
    Data(#[from] formula_binio::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated BIFF record header at offset {offset}")]
    TruncatedHeader { offset: u64 },
    #[error(
        "BIFF record 0x{sid:04X} at offset {offset} extends past end of stream \
         (declared {declared} bytes, {available} available)"
    )]
    TruncatedPayload {
        sid: u16,
        offset: u64,
        declared: usize,
        available: usize,
    },
    #[error("logical BIFF record 0x{sid:04X} at offset {offset} exceeds max continued fragments ({max} fragments)")]
    TooManyFragments { sid: u16, offset: u64, max: usize },
    /// The payload length does not match the fixed layout of the record type.
    #[error("{name} record (0x{sid:04X}) expects {expected} payload bytes, got {actual}")]
    ShapeMismatch {
        sid: u16,
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The payload has the right overall shape but an inconsistent field.
    #[error("malformed {name} record (0x{sid:04X}): {message}")]
    Malformed {
        sid: u16,
        name: &'static str,
        message: String,
    },
    #[error("fragment sizes of record 0x{sid:04X} sum to {sum}, payload is {len} bytes")]
    FragmentLayout { sid: u16, sum: usize, len: usize },
    #[error("record 0x{sid:04X} fragment of {len} bytes does not fit a u16 length field")]
    FrameTooLarge { sid: u16, len: usize },
    #[error("string of {len} characters does not fit its {max}-character length prefix")]
    StringTooLong { len: usize, max: usize },
    #[error("{count} formatting runs do not fit a u16 run count (max {max})")]
    TooManyFormatRuns { count: usize, max: usize },
}

impl RecordError {
    /// Errors caused by the payload of a single record, as opposed to the framing of the stream.
    ///
    /// Only these can be downgraded to an [`UnknownRecord`] by [`DecodePolicy::Degrade`]: after a
    /// framing error there is no reliable record boundary to resume from.
    pub fn is_payload_error(&self) -> bool {
        matches!(
            self,
            RecordError::ShapeMismatch { .. }
                | RecordError::Malformed { .. }
                | RecordError::StringTooLong { .. }
                | RecordError::Data(formula_binio::Error::UnexpectedEof { .. })
        )
    }
}

pub type Result<T, E = RecordError> = std::result::Result<T, E>;
