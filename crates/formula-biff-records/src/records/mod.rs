//! Typed BIFF8 records.

mod cells;
mod formats;
mod index;
mod raw;
mod rows;
mod sst;
pub mod strings;
mod workbook;

pub use cells::{
    BlankRecord, BoolErrRecord, BoolErrValue, DimensionsRecord, LabelSstRecord, MulBlankRecord,
    MulRkRecord, NumberRecord, RkCell, RkRecord,
};
pub use formats::{ExtendedFormatRecord, FontRecord};
pub use index::{DbCellBuilder, DbCellRecord, IndexBuilder, IndexRecord};
pub use raw::{ContinueRecord, DrawingRecord, UnknownRecord};
pub use rows::{
    ColInfoRecord, DefColWidthRecord, DefaultRowHeightRecord, RowRecord, Window2Record,
    Window2Zoom,
};
pub use sst::SstRecord;
pub use strings::{
    BoundSheetRecord, FooterRecord, FormatRecord, FormatRun, HeaderRecord, LabelRecord,
    LengthPrefix, StringRecord, WriteAccessRecord, XlString,
};
pub use workbook::{
    substream, BofRecord, CalcCountRecord, CalcModeRecord, CodepageRecord, CountryRecord,
    DateModeRecord, EofRecord, InterfaceHdrRecord, ProtectRecord, Window1Record,
};
