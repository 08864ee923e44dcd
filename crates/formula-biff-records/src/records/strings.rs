//! BIFF8 Unicode strings and the records that are mostly a string.
//!
//! A BIFF8 string is `cch` (u8 or u16), an option-flags byte, optional run count (`fRichSt`) and
//! extended-data size (`fExtSt`), the characters, then the formatting runs and extended data.
//! Characters are either "compressed" (one byte per code unit, high byte zero) or UTF-16LE.

use std::borrow::Cow;

use formula_binio::{is_compressible, LeWriter};
use serde::Serialize;

use crate::bitfield::{flag_accessors, value_accessors, BitField};
use crate::continuable::ContinuableWriter;
use crate::framing::RecordFrame;
use crate::record::{
    malformed, BiffReader, BiffRecord, RecordInput, STR_FLAG_EXT,
    STR_FLAG_HIGH_BYTE, STR_FLAG_RICH_TEXT,
};
use crate::sid;
use crate::{RecordError, Result};

/// Width of a string's character-count prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// `ShortXLUnicodeString` (sheet and font names).
    U8,
    /// `XLUnicodeString` / `XLUnicodeRichExtendedString`.
    U16,
}

impl LengthPrefix {
    pub const fn width(self) -> usize {
        match self {
            LengthPrefix::U8 => 1,
            LengthPrefix::U16 => 2,
        }
    }

    pub const fn max_chars(self) -> usize {
        match self {
            LengthPrefix::U8 => u8::MAX as usize,
            LengthPrefix::U16 => u16::MAX as usize,
        }
    }
}

/// One formatting run: characters from `char_pos` on use font `font_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatRun {
    pub char_pos: u16,
    pub font_index: u16,
}

/// A BIFF8 string with its formatting runs and extended (phonetic) block.
///
/// Decoding keeps what the option byte says beyond the fields modelled here (a rich-text flag
/// with a zero run count, reserved bits) and keeps UTF-16 that is not valid Unicode, so an
/// untouched string writes back the bytes it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XlString {
    text: String,
    high_byte: bool,
    runs: Vec<FormatRun>,
    ext_rst: Option<Vec<u8>>,
    /// Option bits not implied by the fields above: reserved bits, and `fRichSt` with no runs.
    extra_flags: u8,
    /// The code units, when they hold an unpaired surrogate that `text` cannot represent.
    raw_units: Option<Vec<u16>>,
}

impl XlString {
    /// Plain string, stored compressed when every character fits in one byte.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let len = text.encode_utf16().count();
        if len > LengthPrefix::U16.max_chars() {
            return Err(RecordError::StringTooLong {
                len,
                max: LengthPrefix::U16.max_chars(),
            });
        }
        Ok(Self {
            high_byte: !is_compressible(&text),
            text,
            runs: Vec::new(),
            ext_rst: None,
            extra_flags: 0,
            raw_units: None,
        })
    }

    /// Attach formatting runs. The run count is a u16 on disk.
    pub fn with_runs(mut self, runs: Vec<FormatRun>) -> Result<Self> {
        if runs.len() > usize::from(u16::MAX) {
            return Err(RecordError::TooManyFormatRuns {
                count: runs.len(),
                max: usize::from(u16::MAX),
            });
        }
        self.runs = runs;
        Ok(self)
    }

    pub fn with_ext_rst(mut self, ext_rst: Vec<u8>) -> Self {
        self.ext_rst = Some(ext_rst);
        self
    }

    /// The characters. Unpaired surrogates read from a file show up as U+FFFD here.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn runs(&self) -> &[FormatRun] {
        &self.runs
    }

    pub fn ext_rst(&self) -> Option<&[u8]> {
        self.ext_rst.as_deref()
    }

    /// The UTF-16 code units the string is written as.
    pub fn units(&self) -> Cow<'_, [u16]> {
        match &self.raw_units {
            Some(units) => Cow::Borrowed(units),
            None => Cow::Owned(self.text.encode_utf16().collect()),
        }
    }

    /// Number of UTF-16 code units, which is what the length prefix counts.
    pub fn char_count(&self) -> usize {
        match &self.raw_units {
            Some(units) => units.len(),
            None => self.text.encode_utf16().count(),
        }
    }

    /// Whether characters are written as UTF-16LE.
    pub fn is_high_byte(&self) -> bool {
        self.high_byte || self.raw_units.is_some() || !is_compressible(&self.text)
    }

    pub(crate) fn flags(&self) -> u8 {
        let mut flags = self.extra_flags;
        if self.is_high_byte() {
            flags |= STR_FLAG_HIGH_BYTE;
        }
        if !self.runs.is_empty() {
            flags |= STR_FLAG_RICH_TEXT;
        }
        if self.ext_rst.is_some() {
            flags |= STR_FLAG_EXT;
        }
        flags
    }

    /// A run count follows the option byte whenever `fRichSt` is set, even for zero runs.
    pub(crate) fn has_run_count(&self) -> bool {
        self.flags() & STR_FLAG_RICH_TEXT != 0
    }

    pub(crate) fn run_count(&self) -> u16 {
        // `with_runs` and `read` both bound the run count to u16.
        self.runs.len() as u16
    }

    pub(crate) fn header_len(&self, prefix: LengthPrefix) -> usize {
        let mut len = prefix.width() + 1;
        if self.has_run_count() {
            len += 2;
        }
        if self.ext_rst.is_some() {
            len += 4;
        }
        len
    }

    pub(crate) fn char_width(&self) -> usize {
        if self.is_high_byte() {
            2
        } else {
            1
        }
    }

    /// Encoded size when written without interruption.
    pub fn encoded_len(&self, prefix: LengthPrefix) -> usize {
        self.header_len(prefix)
            + self.char_count() * self.char_width()
            + self.runs.len() * 4
            + self.ext_rst.as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn check_fits(&self, prefix: LengthPrefix) -> Result<()> {
        let len = self.char_count();
        if len > prefix.max_chars() {
            return Err(RecordError::StringTooLong {
                len,
                max: prefix.max_chars(),
            });
        }
        Ok(())
    }

    pub(crate) fn read<R: BiffRecord>(reader: &mut BiffReader<'_>, prefix: LengthPrefix) -> Result<Self> {
        let cch = match prefix {
            LengthPrefix::U8 => usize::from(reader.read_u8()?),
            LengthPrefix::U16 => usize::from(reader.read_u16()?),
        };
        let flags = reader.read_u8()?;
        let run_count = if flags & STR_FLAG_RICH_TEXT != 0 {
            usize::from(reader.read_u16()?)
        } else {
            0
        };
        let ext_len = if flags & STR_FLAG_EXT != 0 {
            Some(reader.read_u32()? as usize)
        } else {
            None
        };

        let high_byte = flags & STR_FLAG_HIGH_BYTE != 0;
        let units = reader.read_units::<R>(cch, high_byte)?;
        let (text, raw_units) = match String::from_utf16(&units) {
            Ok(text) => (text, None),
            Err(_) => (String::from_utf16_lossy(&units), Some(units)),
        };

        if run_count * 4 > reader.remaining() {
            return Err(malformed::<R>(format!(
                "{run_count} formatting runs declared, {} bytes left",
                reader.remaining()
            )));
        }
        let mut runs = Vec::with_capacity(run_count);
        for _ in 0..run_count {
            runs.push(FormatRun {
                char_pos: reader.read_u16()?,
                font_index: reader.read_u16()?,
            });
        }
        let ext_rst = match ext_len {
            Some(len) => Some(reader.read_bytes(len)?.to_vec()),
            None => None,
        };

        let mut extra_flags = flags & !(STR_FLAG_HIGH_BYTE | STR_FLAG_EXT);
        if !runs.is_empty() {
            extra_flags &= !STR_FLAG_RICH_TEXT;
        }
        Ok(Self {
            text,
            high_byte,
            runs,
            ext_rst,
            extra_flags,
            raw_units,
        })
    }

    pub(crate) fn write(&self, out: &mut LeWriter, prefix: LengthPrefix) {
        let units = self.units();
        match prefix {
            LengthPrefix::U8 => out.write_u8(units.len() as u8),
            LengthPrefix::U16 => out.write_u16(units.len() as u16),
        }
        out.write_u8(self.flags());
        if self.has_run_count() {
            out.write_u16(self.run_count());
        }
        if let Some(ext) = &self.ext_rst {
            out.write_u32(ext.len() as u32);
        }
        if self.is_high_byte() {
            for &unit in units.iter() {
                out.write_u16(unit);
            }
        } else {
            out.write_compressed(&self.text);
        }
        for run in &self.runs {
            out.write_u16(run.char_pos);
            out.write_u16(run.font_index);
        }
        if let Some(ext) = &self.ext_rst {
            out.write_bytes(ext);
        }
    }
}

/// BOUNDSHEET: one sheet's name, visibility, type and the stream offset of its BOF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundSheetRecord {
    pub bof_position: u32,
    pub option_flags: u16,
    name: XlString,
}

impl BoundSheetRecord {
    pub const HIDDEN: BitField = BitField::new(0x0001);
    pub const VERY_HIDDEN: BitField = BitField::new(0x0002);
    pub const SHEET_TYPE: BitField = BitField::new(0xFF00);

    pub fn new(name: &str, bof_position: u32) -> Result<Self> {
        let name = XlString::new(name)?;
        name.check_fits(LengthPrefix::U8)?;
        Ok(Self {
            bof_position,
            option_flags: 0,
            name,
        })
    }

    pub fn name(&self) -> &str {
        self.name.text()
    }

    flag_accessors! { option_flags: u16;
        is_hidden, set_hidden => Self::HIDDEN;
        is_very_hidden, set_very_hidden => Self::VERY_HIDDEN;
    }

    value_accessors! { option_flags: u16;
        /// 0 worksheet, 1 macro sheet, 2 chart, 6 VBA module.
        sheet_type, set_sheet_type => Self::SHEET_TYPE, u8;
    }
}

impl BiffRecord for BoundSheetRecord {
    const SID: u16 = sid::RECORD_BOUNDSHEET;
    const NAME: &'static str = "BOUNDSHEET";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.reader();
        let bof_position = r.read_u32()?;
        let option_flags = r.read_u16()?;
        let name = XlString::read::<Self>(&mut r, LengthPrefix::U8)?;
        r.finish::<Self>()?;
        Ok(Self {
            bof_position,
            option_flags,
            name,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u32(self.bof_position);
        out.write_u16(self.option_flags);
        self.name.write(out, LengthPrefix::U8);
    }

    fn data_size(&self) -> usize {
        6 + self.name.encoded_len(LengthPrefix::U8)
    }
}

/// FORMAT: a number format string and the index cells refer to it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatRecord {
    pub index: u16,
    pub format: XlString,
}

impl FormatRecord {
    pub fn new(index: u16, format: &str) -> Result<Self> {
        Ok(Self {
            index,
            format: XlString::new(format)?,
        })
    }
}

impl BiffRecord for FormatRecord {
    const SID: u16 = sid::RECORD_FORMAT;
    const NAME: &'static str = "FORMAT";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.reader();
        let index = r.read_u16()?;
        let format = XlString::read::<Self>(&mut r, LengthPrefix::U16)?;
        r.finish::<Self>()?;
        Ok(Self { index, format })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.index);
        self.format.write(out, LengthPrefix::U16);
    }

    fn data_size(&self) -> usize {
        2 + self.format.encoded_len(LengthPrefix::U16)
    }
}

/// LABEL: a cell holding an inline string (BIFF8 writers normally use LABELSST instead).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelRecord {
    pub row: u16,
    pub column: u16,
    pub xf_index: u16,
    pub value: XlString,
}

impl BiffRecord for LabelRecord {
    const SID: u16 = sid::RECORD_LABEL;
    const NAME: &'static str = "LABEL";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.reader();
        let row = r.read_u16()?;
        let column = r.read_u16()?;
        let xf_index = r.read_u16()?;
        let value = XlString::read::<Self>(&mut r, LengthPrefix::U16)?;
        r.finish::<Self>()?;
        Ok(Self {
            row,
            column,
            xf_index,
            value,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.row);
        out.write_u16(self.column);
        out.write_u16(self.xf_index);
        self.value.write(out, LengthPrefix::U16);
    }

    fn data_size(&self) -> usize {
        6 + self.value.encoded_len(LengthPrefix::U16)
    }
}

/// STRING: cached text result of the formula record just before it.
///
/// Results can be up to 32767 characters, so the text may continue into `CONTINUE` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringRecord {
    pub value: XlString,
}

impl StringRecord {
    fn layout(&self) -> RecordFrame {
        let mut out = ContinuableWriter::new();
        out.write_string(&self.value, LengthPrefix::U16);
        out.into_frame(Self::SID)
    }
}

impl BiffRecord for StringRecord {
    const SID: u16 = sid::RECORD_STRING;
    const NAME: &'static str = "STRING";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.reader();
        let value = XlString::read::<Self>(&mut r, LengthPrefix::U16)?;
        r.finish::<Self>()?;
        Ok(Self { value })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_bytes(&self.layout().data);
    }

    fn data_size(&self) -> usize {
        self.layout().data.len()
    }

    fn to_frame(&self) -> RecordFrame {
        self.layout()
    }
}

/// WRITEACCESS: name of the user who last saved the file, space-padded to a fixed 112 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteAccessRecord {
    user_name: XlString,
    padding: Vec<u8>,
}

impl WriteAccessRecord {
    pub const DATA_SIZE: usize = 112;

    pub fn new(user_name: &str) -> Result<Self> {
        let user_name = XlString::new(user_name)?;
        let used = user_name.encoded_len(LengthPrefix::U16);
        let Some(pad) = Self::DATA_SIZE.checked_sub(used) else {
            return Err(RecordError::StringTooLong {
                len: user_name.char_count(),
                max: (Self::DATA_SIZE - 3) / user_name.char_width(),
            });
        };
        Ok(Self {
            user_name,
            padding: vec![b' '; pad],
        })
    }

    pub fn user_name(&self) -> &str {
        self.user_name.text()
    }
}

impl BiffRecord for WriteAccessRecord {
    const SID: u16 = sid::RECORD_WRITEACCESS;
    const NAME: &'static str = "WRITEACCESS";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(Self::DATA_SIZE)?;
        let user_name = XlString::read::<Self>(&mut r, LengthPrefix::U16)?;
        let padding = r.read_remaining().to_vec();
        Ok(Self { user_name, padding })
    }

    fn encode(&self, out: &mut LeWriter) {
        self.user_name.write(out, LengthPrefix::U16);
        out.write_bytes(&self.padding);
    }

    fn data_size(&self) -> usize {
        self.user_name.encoded_len(LengthPrefix::U16) + self.padding.len()
    }
}

macro_rules! header_footer_record {
    ($(#[$meta:meta])* $name:ident, $sid:expr, $label:literal) => {
        $(#[$meta])*
        ///
        /// An empty payload means the sheet has none.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        pub struct $name {
            pub text: Option<XlString>,
        }

        impl BiffRecord for $name {
            const SID: u16 = $sid;
            const NAME: &'static str = $label;

            fn decode(input: &RecordInput<'_>) -> Result<Self> {
                if input.is_empty() {
                    return Ok(Self { text: None });
                }
                let mut r = input.reader();
                let text = XlString::read::<Self>(&mut r, LengthPrefix::U16)?;
                r.finish::<Self>()?;
                Ok(Self { text: Some(text) })
            }

            fn encode(&self, out: &mut LeWriter) {
                if let Some(text) = &self.text {
                    text.write(out, LengthPrefix::U16);
                }
            }

            fn data_size(&self) -> usize {
                self.text
                    .as_ref()
                    .map_or(0, |t| t.encoded_len(LengthPrefix::U16))
            }
        }
    };
}

header_footer_record!(
    /// HEADER: page header format string.
    HeaderRecord,
    sid::RECORD_HEADER,
    "HEADER"
);
header_footer_record!(
    /// FOOTER: page footer format string.
    FooterRecord,
    sid::RECORD_FOOTER,
    "FOOTER"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitfield::assert_fields_isolated;
    use pretty_assertions::assert_eq;

    fn round_trip<R: BiffRecord + std::fmt::Debug + PartialEq>(payload: &[u8]) -> R {
        let record = R::decode(&RecordInput::new(R::SID, payload)).unwrap();
        assert_eq!(record.to_payload(), payload, "{} did not re-encode exactly", R::NAME);
        assert_eq!(record.data_size(), payload.len());
        record
    }

    #[test]
    fn boundsheet_round_trip() {
        // BOF at 0x1234, visible worksheet, compressed name "Sheet1".
        let mut payload = vec![0x34, 0x12, 0, 0, 0x00, 0x00, 6, 0x00];
        payload.extend_from_slice(b"Sheet1");
        let record: BoundSheetRecord = round_trip(&payload);
        assert_eq!(record.name(), "Sheet1");
        assert_eq!(record.bof_position, 0x1234);
        assert!(!record.is_hidden());
        assert_eq!(record.sheet_type(), 0);
    }

    #[test]
    fn boundsheet_unicode_name_and_flags() {
        let mut record = BoundSheetRecord::new("Лист1", 99).unwrap();
        record.set_very_hidden(true);
        record.set_sheet_type(2);
        let payload = record.to_payload();
        assert_eq!(&payload[4..6], &[0x02, 0x02]);
        assert_eq!(payload[6], 5);
        assert_eq!(payload[7], STR_FLAG_HIGH_BYTE);

        let decoded = BoundSheetRecord::decode(&RecordInput::new(BoundSheetRecord::SID, &payload)).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.is_very_hidden());
        assert!(!decoded.is_hidden());
    }

    #[test]
    fn boundsheet_bitfields_are_isolated() {
        assert_fields_isolated(&[
            BoundSheetRecord::HIDDEN,
            BoundSheetRecord::VERY_HIDDEN,
            BoundSheetRecord::SHEET_TYPE,
        ]);
    }

    #[test]
    fn boundsheet_name_longer_than_255_is_rejected() {
        let name = "x".repeat(256);
        assert!(matches!(
            BoundSheetRecord::new(&name, 0),
            Err(RecordError::StringTooLong { len: 256, max: 255 })
        ));
    }

    #[test]
    fn format_round_trip_rich_and_ext() {
        let mut payload = vec![0xA4, 0x00]; // index 164
        payload.extend_from_slice(&[3, 0]); // cch
        payload.push(STR_FLAG_RICH_TEXT | STR_FLAG_EXT);
        payload.extend_from_slice(&[1, 0]); // one run
        payload.extend_from_slice(&[2, 0, 0, 0]); // 2 bytes of ext data
        payload.extend_from_slice(b"0.0");
        payload.extend_from_slice(&[1, 0, 5, 0]);
        payload.extend_from_slice(&[0xAB, 0xCD]);
        let record: FormatRecord = round_trip(&payload);
        assert_eq!(record.format.text(), "0.0");
        assert_eq!(
            record.format.runs(),
            &[FormatRun {
                char_pos: 1,
                font_index: 5
            }]
        );
        assert_eq!(record.format.ext_rst(), Some(&[0xAB, 0xCD][..]));
    }

    #[test]
    fn format_split_across_continue_with_flag_byte() {
        // "0.00" split after "0." with the continuation switching to UTF-16.
        let data = vec![
            0xA5, 0x00, 4, 0, 0x00, b'0', b'.', // fragment 1
            0x01, b'0', 0, b'0', 0, // fragment 2: flag byte + UTF-16 chars
        ];
        let frame = RecordFrame::with_fragments(sid::RECORD_FORMAT, data, vec![7, 5]);
        let record = FormatRecord::decode(&RecordInput::from_frame(&frame)).unwrap();
        assert_eq!(record.index, 0xA5);
        assert_eq!(record.format.text(), "0.00");
    }

    #[test]
    fn label_round_trip_utf16() {
        let mut payload = vec![1, 0, 2, 0, 15, 0, 2, 0, STR_FLAG_HIGH_BYTE];
        payload.extend_from_slice(&[0xAC, 0x20, 0x31, 0x00]); // "€1"
        let record: LabelRecord = round_trip(&payload);
        assert_eq!(record.value.text(), "€1");
        assert_eq!((record.row, record.column, record.xf_index), (1, 2, 15));
    }

    #[test]
    fn rich_flag_with_zero_runs_keeps_its_run_count() {
        let payload = [0, 0, 1, 0, STR_FLAG_RICH_TEXT, 0, 0, b'x'];
        let record: FormatRecord = round_trip(&payload);
        assert_eq!(record.format.text(), "x");
        assert!(record.format.runs().is_empty());
    }

    #[test]
    fn reserved_option_bits_are_written_back() {
        let record: FormatRecord = round_trip(&[0, 0, 1, 0, 0x02, b'x']);
        assert_eq!(record.format.text(), "x");
        let record: FormatRecord = round_trip(&[0, 0, 1, 0, 0xF2 | STR_FLAG_RICH_TEXT, 0, 0, b'x']);
        assert_eq!(record.format.flags(), 0xFA);
    }

    #[test]
    fn label_keeps_unpaired_surrogate() {
        let payload = [0, 0, 0, 0, 0, 0, 2, 0, STR_FLAG_HIGH_BYTE, 0x00, 0xD8, b'a', 0];
        let record: LabelRecord = round_trip(&payload);
        assert_eq!(record.value.text(), "\u{FFFD}a");
        assert_eq!(record.value.units().as_ref(), &[0xD800, 0x0061]);
        assert_eq!(record.value.char_count(), 2);
    }

    #[test]
    fn utf16_latin1_text_stays_utf16_across_continue() {
        // "abcd" stored as UTF-16 although every character would compress.
        let data = vec![
            0xA5, 0x00, 4, 0, STR_FLAG_HIGH_BYTE, b'a', 0, b'b', 0, // fragment 1
            STR_FLAG_HIGH_BYTE, b'c', 0, b'd', 0, // fragment 2
        ];
        let frame = RecordFrame::with_fragments(sid::RECORD_FORMAT, data, vec![9, 5]);
        let record = FormatRecord::decode(&RecordInput::from_frame(&frame)).unwrap();
        assert_eq!(record.format.text(), "abcd");
        assert!(record.format.is_high_byte());

        let payload = record.to_payload();
        assert_eq!(
            payload,
            vec![0xA5, 0x00, 4, 0, STR_FLAG_HIGH_BYTE, b'a', 0, b'b', 0, b'c', 0, b'd', 0]
        );
        let decoded: FormatRecord = round_trip(&payload);
        assert_eq!(decoded, record);
    }

    #[test]
    fn too_many_runs_are_rejected() {
        let runs = vec![
            FormatRun {
                char_pos: 0,
                font_index: 0
            };
            usize::from(u16::MAX) + 1
        ];
        assert!(matches!(
            XlString::new("x").unwrap().with_runs(runs),
            Err(RecordError::TooManyFormatRuns { count: 65_536, max: 65_535 })
        ));
    }

    #[test]
    fn label_with_truncated_text_fails() {
        let payload = [1, 0, 2, 0, 15, 0, 10, 0, 0x00, b'a'];
        assert!(LabelRecord::decode(&RecordInput::new(sid::RECORD_LABEL, &payload)).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let payload = [0, 0, 1, 0, 0x00, b'x', 0xFF];
        assert!(matches!(
            FormatRecord::decode(&RecordInput::new(sid::RECORD_FORMAT, &payload)),
            Err(RecordError::Malformed { .. })
        ));
    }

    #[test]
    fn long_string_record_continues_with_flag_bytes() {
        let text = "é".repeat(10_000);
        let record = StringRecord {
            value: XlString::new(text.clone()).unwrap(),
        };
        let frame = record.to_frame();
        assert!(frame.is_continued());
        // Compressed: 3 header bytes + 10000 chars + one flag byte per continuation.
        assert_eq!(frame.data.len(), 3 + 10_000 + (frame.fragment_sizes.len() - 1));

        let decoded = StringRecord::decode(&RecordInput::from_frame(&frame)).unwrap();
        assert_eq!(decoded.value.text(), text);
    }

    #[test]
    fn writeaccess_pads_to_fixed_size() {
        let record = WriteAccessRecord::new("alice").unwrap();
        let payload = record.to_payload();
        assert_eq!(payload.len(), WriteAccessRecord::DATA_SIZE);
        assert_eq!(&payload[..8], &[5, 0, 0, b'a', b'l', b'i', b'c', b'e']);
        assert!(payload[8..].iter().all(|&b| b == b' '));

        let decoded: WriteAccessRecord = round_trip(&payload);
        assert_eq!(decoded.user_name(), "alice");

        assert!(matches!(
            WriteAccessRecord::decode(&RecordInput::new(sid::RECORD_WRITEACCESS, &payload[..100])),
            Err(RecordError::ShapeMismatch {
                expected: 112,
                actual: 100,
                ..
            })
        ));
    }

    #[test]
    fn header_may_be_empty() {
        let empty: HeaderRecord = round_trip(&[]);
        assert_eq!(empty.text, None);
        let footer: FooterRecord = round_trip(&[2, 0, 0, b'&', b'P']);
        assert_eq!(footer.text.unwrap().text(), "&P");
    }

    #[test]
    fn xl_string_length_limit() {
        assert!(XlString::new("a".repeat(65_535)).is_ok());
        assert!(matches!(
            XlString::new("a".repeat(65_536)),
            Err(RecordError::StringTooLong { len: 65_536, .. })
        ));
    }
}
