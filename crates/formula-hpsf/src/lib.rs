//! OLE property-set streams (`\u{5}SummaryInformation` and friends).
//!
//! A property-set stream holds a short header followed by one or more sections. Each section is
//! identified by a format id ([`ClassId`]) and maps numeric property ids to typed values
//! ([`Value`]). Property id 1 holds the codepage that every narrow string in the section is
//! encoded with; property id 0, when present, is a dictionary naming the other ids.
//!
//! [`PropertySet::parse`] reads a whole stream in one pass. [`PropertySet::to_bytes`] lays out
//! every property first and only then writes headers and offsets (see [`writer`]).

use thiserror::Error;

mod class_id;
pub mod codepage;
mod property_set;
mod section;
pub mod variant;
pub mod well_known;
pub mod writer;

pub use class_id::ClassId;
pub use property_set::{is_property_set_stream, ParseOptions, PropertySet};
pub use section::Section;
pub use variant::Value;

#[derive(Debug, Error)]
pub enum Error {
    /// Truncated input or a length over the allocation cap.
    #[error(transparent)]
    Data(#[from] formula_binio::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a property-set stream (byte order 0x{byte_order:04X}, format {format})")]
    NotPropertySet { byte_order: u16, format: u16 },
    #[error("section {index} offset {offset} lies outside the {len}-byte stream")]
    InvalidSectionOffset { index: usize, offset: u32, len: usize },
    #[error("property {id} offset {offset} lies outside its {section_size}-byte section")]
    InvalidPropertyOffset {
        id: u32,
        offset: u32,
        section_size: usize,
    },
    #[error("codepage property must be VT_I2, found type 0x{vt:04X}")]
    CodepageType { vt: u32 },
    #[error("property {id}: {message}")]
    MalformedValue { id: u32, message: String },
    #[error("unsupported vector element type 0x{vt:04X}")]
    UnsupportedVectorType { vt: u16 },
    #[error("vector of type 0x{expected:04X} holds an element of type 0x{found:04X}")]
    VectorElementType { expected: u16, found: u32 },
    #[error("property id 0 is reserved for the dictionary")]
    ReservedPropertyId,
    #[error("{text:?} cannot be represented in codepage {codepage}")]
    Unrepresentable { codepage: u16, text: String },
    #[error("unsupported codepage {0}")]
    UnsupportedCodepage(u16),
    #[error("{what} of {len} does not fit a u32 length field")]
    TooLarge { what: &'static str, len: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
