//! Sid → decoder dispatch.
//!
//! [`RECORD_SPECS`] is a static table sorted by sid; [`lookup`] binary-searches it. Sids without
//! an entry decode to [`Record::Unknown`].

use std::io::Write;

use serde::Serialize;

use crate::framing::{RecordFrame, RecordWriter};
use crate::record::{BiffRecord, RecordInput};
use crate::records::*;
use crate::Result;

/// Registry entry for one record type.
#[derive(Clone, Copy)]
pub struct RecordSpec {
    pub sid: u16,
    pub name: &'static str,
    pub decode: fn(&RecordInput<'_>) -> Result<Record>,
}

impl std::fmt::Debug for RecordSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSpec")
            .field("sid", &format_args!("0x{:04X}", self.sid))
            .field("name", &self.name)
            .finish()
    }
}

fn decode_as<R: BiffRecord + Into<Record>>(input: &RecordInput<'_>) -> Result<Record> {
    R::decode(input).map(Into::into)
}

macro_rules! record_enum {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// Any decoded record.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(tag = "record", content = "fields")]
        pub enum Record {
            $($variant($ty),)*
            Unknown(UnknownRecord),
        }

        impl Record {
            pub fn sid(&self) -> u16 {
                match self {
                    $(Record::$variant(_) => <$ty as BiffRecord>::SID,)*
                    Record::Unknown(r) => r.sid,
                }
            }

            /// Record type name, `"UNKNOWN"` for raw holders.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Record::$variant(_) => <$ty as BiffRecord>::NAME,)*
                    Record::Unknown(_) => "UNKNOWN",
                }
            }

            pub fn to_frame(&self) -> RecordFrame {
                match self {
                    $(Record::$variant(r) => r.to_frame(),)*
                    Record::Unknown(r) => r.to_frame(),
                }
            }
        }

        $(
            impl From<$ty> for Record {
                fn from(record: $ty) -> Self {
                    Record::$variant(record)
                }
            }
        )*
    };
}

record_enum! {
    Eof(EofRecord),
    CalcCount(CalcCountRecord),
    CalcMode(CalcModeRecord),
    Protect(ProtectRecord),
    Header(HeaderRecord),
    Footer(FooterRecord),
    DateMode(DateModeRecord),
    Font(FontRecord),
    Continue(ContinueRecord),
    Window1(Window1Record),
    Codepage(CodepageRecord),
    DefColWidth(DefColWidthRecord),
    WriteAccess(WriteAccessRecord),
    ColInfo(ColInfoRecord),
    BoundSheet(BoundSheetRecord),
    Country(CountryRecord),
    MulRk(MulRkRecord),
    MulBlank(MulBlankRecord),
    DbCell(DbCellRecord),
    ExtendedFormat(ExtendedFormatRecord),
    InterfaceHdr(InterfaceHdrRecord),
    Drawing(DrawingRecord),
    Sst(SstRecord),
    LabelSst(LabelSstRecord),
    Dimensions(DimensionsRecord),
    Blank(BlankRecord),
    Number(NumberRecord),
    Label(LabelRecord),
    BoolErr(BoolErrRecord),
    String(StringRecord),
    Row(RowRecord),
    Index(IndexRecord),
    DefaultRowHeight(DefaultRowHeightRecord),
    Window2(Window2Record),
    Rk(RkRecord),
    Format(FormatRecord),
    Bof(BofRecord),
}

impl Record {
    /// Logical payload, without framing.
    pub fn payload(&self) -> Vec<u8> {
        self.to_frame().data
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Record::Unknown(_))
    }

    /// Write the record's frames, splitting into `CONTINUE` frames as needed.
    pub fn encode<W: Write>(&self, writer: &mut RecordWriter<W>) -> Result<()> {
        writer.write_frame(&self.to_frame())
    }
}

macro_rules! spec {
    ($ty:ty) => {
        RecordSpec {
            sid: <$ty as BiffRecord>::SID,
            name: <$ty as BiffRecord>::NAME,
            decode: decode_as::<$ty>,
        }
    };
}

/// Every typed record, sorted by sid.
pub static RECORD_SPECS: &[RecordSpec] = &[
    spec!(EofRecord),              // 0x000A
    spec!(CalcCountRecord),        // 0x000C
    spec!(CalcModeRecord),         // 0x000D
    spec!(ProtectRecord),          // 0x0012
    spec!(HeaderRecord),           // 0x0014
    spec!(FooterRecord),           // 0x0015
    spec!(DateModeRecord),         // 0x0022
    spec!(FontRecord),             // 0x0031
    spec!(ContinueRecord),         // 0x003C
    spec!(Window1Record),          // 0x003D
    spec!(CodepageRecord),         // 0x0042
    spec!(DefColWidthRecord),      // 0x0055
    spec!(WriteAccessRecord),      // 0x005C
    spec!(ColInfoRecord),          // 0x007D
    spec!(BoundSheetRecord),       // 0x0085
    spec!(CountryRecord),          // 0x008C
    spec!(MulRkRecord),            // 0x00BD
    spec!(MulBlankRecord),         // 0x00BE
    spec!(DbCellRecord),           // 0x00D7
    spec!(ExtendedFormatRecord),   // 0x00E0
    spec!(InterfaceHdrRecord),     // 0x00E1
    spec!(DrawingRecord),          // 0x00EC
    spec!(SstRecord),              // 0x00FC
    spec!(LabelSstRecord),         // 0x00FD
    spec!(DimensionsRecord),       // 0x0200
    spec!(BlankRecord),            // 0x0201
    spec!(NumberRecord),           // 0x0203
    spec!(LabelRecord),            // 0x0204
    spec!(BoolErrRecord),          // 0x0205
    spec!(StringRecord),           // 0x0207
    spec!(RowRecord),              // 0x0208
    spec!(IndexRecord),            // 0x020B
    spec!(DefaultRowHeightRecord), // 0x0225
    spec!(Window2Record),          // 0x023E
    spec!(RkRecord),               // 0x027E
    spec!(FormatRecord),           // 0x041E
    spec!(BofRecord),              // 0x0809
];

pub fn lookup(sid: u16) -> Option<&'static RecordSpec> {
    RECORD_SPECS
        .binary_search_by_key(&sid, |spec| spec.sid)
        .ok()
        .map(|idx| &RECORD_SPECS[idx])
}

/// Record type name for `sid`, if it has a typed decoder.
pub fn record_name(sid: u16) -> Option<&'static str> {
    lookup(sid).map(|spec| spec.name)
}

/// Decode a logical record with the decoder registered for its sid.
///
/// Unregistered sids are not an error: they come back as [`Record::Unknown`].
pub fn decode_frame(frame: &RecordFrame) -> Result<Record> {
    let input = RecordInput::from_frame(frame);
    match lookup(frame.sid) {
        Some(spec) => (spec.decode)(&input),
        None => Ok(Record::Unknown(UnknownRecord::from_input(&input))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sid;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_specs_are_sorted_and_unique() {
        for pair in RECORD_SPECS.windows(2) {
            assert!(
                pair[0].sid < pair[1].sid,
                "{} (0x{:04X}) must sort before {} (0x{:04X})",
                pair[0].name,
                pair[0].sid,
                pair[1].name,
                pair[1].sid
            );
        }
        assert_eq!(RECORD_SPECS.len(), 37);
    }

    #[test]
    fn lookup_finds_every_entry() {
        for spec in RECORD_SPECS {
            assert_eq!(lookup(spec.sid).map(|s| s.name), Some(spec.name));
        }
        assert!(lookup(0x1234).is_none());
        assert_eq!(record_name(sid::RECORD_SST), Some("SST"));
    }

    #[test]
    fn decoded_records_report_their_table_sid() {
        let frame = RecordFrame::new(sid::RECORD_CODEPAGE, vec![0xB0, 0x04]);
        let record = decode_frame(&frame).unwrap();
        assert_eq!(record, Record::Codepage(CodepageRecord { codepage: 1200 }));
        assert_eq!(record.sid(), sid::RECORD_CODEPAGE);
        assert_eq!(record.name(), "CODEPAGE");
        assert_eq!(record.payload(), frame.data);
    }

    #[test]
    fn unknown_sid_is_a_raw_holder() {
        let frame = RecordFrame::with_fragments(0x0867, vec![1, 2, 3], vec![3]);
        let record = decode_frame(&frame).unwrap();
        assert!(record.is_unknown());
        assert_eq!(record.sid(), 0x0867);
        assert_eq!(record.to_frame(), frame);
    }

    #[test]
    fn malformed_known_record_is_an_error() {
        let frame = RecordFrame::new(sid::RECORD_BOF, vec![0; 4]);
        assert!(decode_frame(&frame).unwrap_err().is_payload_error());
    }
}
