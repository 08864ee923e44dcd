//! BIFF8 record identifiers ("sids") understood by this crate.
//!
//! Any other sid is carried through unchanged as an [`crate::UnknownRecord`].

/// End of a substream (workbook globals or a sheet).
pub const RECORD_EOF: u16 = 0x000A;
pub const RECORD_CALCCOUNT: u16 = 0x000C;
pub const RECORD_CALCMODE: u16 = 0x000D;
pub const RECORD_PROTECT: u16 = 0x0012;
pub const RECORD_HEADER: u16 = 0x0014;
pub const RECORD_FOOTER: u16 = 0x0015;
/// 1900 vs 1904 date system.
pub const RECORD_DATEMODE: u16 = 0x0022;
pub const RECORD_FONT: u16 = 0x0031;
/// Continuation frame for the preceding record.
pub const RECORD_CONTINUE: u16 = 0x003C;
pub const RECORD_WINDOW1: u16 = 0x003D;
/// Workbook codepage for non-Unicode strings.
pub const RECORD_CODEPAGE: u16 = 0x0042;
pub const RECORD_DEFCOLWIDTH: u16 = 0x0055;
pub const RECORD_WRITEACCESS: u16 = 0x005C;
pub const RECORD_COLINFO: u16 = 0x007D;
/// Sheet name, type and stream offset of the sheet's BOF.
pub const RECORD_BOUNDSHEET: u16 = 0x0085;
pub const RECORD_COUNTRY: u16 = 0x008C;
pub const RECORD_MULRK: u16 = 0x00BD;
pub const RECORD_MULBLANK: u16 = 0x00BE;
/// Stream offsets from a ROW block to its cell records.
pub const RECORD_DBCELL: u16 = 0x00D7;
/// Extended format (cell style).
pub const RECORD_XF: u16 = 0x00E0;
pub const RECORD_INTERFACEHDR: u16 = 0x00E1;
/// Office Drawing (Escher) data for a sheet.
pub const RECORD_DRAWING: u16 = 0x00EC;
/// Shared string table.
pub const RECORD_SST: u16 = 0x00FC;
pub const RECORD_LABELSST: u16 = 0x00FD;
pub const RECORD_DIMENSIONS: u16 = 0x0200;
pub const RECORD_BLANK: u16 = 0x0201;
pub const RECORD_NUMBER: u16 = 0x0203;
pub const RECORD_LABEL: u16 = 0x0204;
pub const RECORD_BOOLERR: u16 = 0x0205;
/// Cached string result of the preceding formula.
pub const RECORD_STRING: u16 = 0x0207;
pub const RECORD_ROW: u16 = 0x0208;
pub const RECORD_INDEX: u16 = 0x020B;
pub const RECORD_DEFAULTROWHEIGHT: u16 = 0x0225;
pub const RECORD_WINDOW2: u16 = 0x023E;
pub const RECORD_RK: u16 = 0x027E;
pub const RECORD_FORMAT: u16 = 0x041E;
/// BIFF8 beginning-of-substream.
pub const RECORD_BOF: u16 = 0x0809;
/// BIFF5 beginning-of-substream. Only used to find substream boundaries.
pub const RECORD_BOF_BIFF5: u16 = 0x0009;

pub fn is_bof_record(sid: u16) -> bool {
    sid == RECORD_BOF || sid == RECORD_BOF_BIFF5
}
