//! Writer for records whose payload may span `CONTINUE` frames with structure-aware split
//! points (SST, STRING).
//!
//! Fixed-width fields are never split across frames, a string header is kept together with its
//! first character, and a string interrupted by a frame boundary resumes with an option-flags
//! byte.

use formula_binio::LeWriter;

use crate::framing::{RecordFrame, MAX_RECORD_DATA_SIZE};
use crate::record::STR_FLAG_HIGH_BYTE;
use crate::records::strings::{LengthPrefix, XlString};

pub struct ContinuableWriter {
    out: LeWriter,
    fragment_sizes: Vec<usize>,
    fragment_start: usize,
    max_fragment: usize,
}

impl Default for ContinuableWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContinuableWriter {
    pub fn new() -> Self {
        Self::with_max_fragment(MAX_RECORD_DATA_SIZE)
    }

    /// Writer with a smaller frame size, for exercising split logic on small inputs.
    ///
    /// Frames hold at least 4 bytes so a resumed UTF-16 string always makes progress.
    pub fn with_max_fragment(max_fragment: usize) -> Self {
        Self {
            out: LeWriter::new(),
            fragment_sizes: Vec::new(),
            fragment_start: 0,
            max_fragment: max_fragment.max(4),
        }
    }

    /// Bytes left in the current frame.
    pub fn available(&self) -> usize {
        self.max_fragment
            .saturating_sub(self.out.len() - self.fragment_start)
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Close the current frame and start a `CONTINUE` frame.
    pub fn write_continue(&mut self) {
        self.fragment_sizes.push(self.out.len() - self.fragment_start);
        self.fragment_start = self.out.len();
    }

    /// Start a new frame unless `needed` bytes still fit. An empty frame is never closed.
    pub fn write_continue_if_required(&mut self, needed: usize) {
        if self.available() < needed && self.out.len() > self.fragment_start {
            self.write_continue();
        }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_continue_if_required(1);
        self.out.write_u8(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_continue_if_required(2);
        self.out.write_u16(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_continue_if_required(4);
        self.out.write_u32(v);
    }

    /// Opaque bytes; may be split at any frame boundary.
    pub fn write_bytes(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            if self.available() == 0 {
                self.write_continue();
            }
            let n = bytes.len().min(self.available());
            self.out.write_bytes(&bytes[..n]);
            bytes = &bytes[n..];
        }
    }

    pub fn write_string(&mut self, s: &XlString, prefix: LengthPrefix) {
        let width = s.char_width();
        let first_char = if s.char_count() > 0 { width } else { 0 };
        self.write_continue_if_required(s.header_len(prefix) + first_char);

        let units = s.units();
        match prefix {
            LengthPrefix::U8 => self.out.write_u8(units.len() as u8),
            LengthPrefix::U16 => self.out.write_u16(units.len() as u16),
        }
        self.out.write_u8(s.flags());
        if s.has_run_count() {
            self.out.write_u16(s.run_count());
        }
        if let Some(ext) = s.ext_rst() {
            self.out.write_u32(ext.len() as u32);
        }

        // Only the width bit of a continuation's option byte is read back.
        let mut rest = &units[..];
        loop {
            let n = rest.len().min(self.available() / width);
            for &unit in &rest[..n] {
                if width == 2 {
                    self.out.write_u16(unit);
                } else {
                    self.out.write_u8(unit as u8);
                }
            }
            rest = &rest[n..];
            if rest.is_empty() {
                break;
            }
            self.write_continue();
            self.out
                .write_u8(if width == 2 { STR_FLAG_HIGH_BYTE } else { 0 });
        }

        for run in s.runs() {
            self.write_continue_if_required(4);
            self.out.write_u16(run.char_pos);
            self.out.write_u16(run.font_index);
        }
        if let Some(ext) = s.ext_rst() {
            self.write_bytes(ext);
        }
    }

    pub fn into_frame(mut self, sid: u16) -> RecordFrame {
        self.fragment_sizes.push(self.out.len() - self.fragment_start);
        RecordFrame::with_fragments(sid, self.out.into_inner(), self.fragment_sizes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::RecordWriter;
    use crate::record::RecordInput;
    use crate::records::StringRecord;
    use crate::BiffRecord;

    #[test]
    fn fixed_fields_move_to_next_frame_instead_of_splitting() {
        let mut w = ContinuableWriter::with_max_fragment(5);
        w.write_u32(1);
        w.write_u16(2); // 4 + 2 > 5
        w.write_u8(3);
        let frame = w.into_frame(0x00FC);
        assert_eq!(frame.fragment_sizes, vec![4, 3]);
        assert_eq!(frame.data, vec![1, 0, 0, 0, 2, 0, 3]);
    }

    #[test]
    fn string_header_stays_with_first_character() {
        let mut w = ContinuableWriter::with_max_fragment(8);
        w.write_u32(0xFFFF_FFFF);
        w.write_u8(0);
        // 3 bytes left: header (3) + first char (1) does not fit.
        w.write_string(&XlString::new("abc").unwrap(), LengthPrefix::U16);
        let frame = w.into_frame(0x00FC);
        assert_eq!(frame.fragment_sizes, vec![5, 6]);
        assert_eq!(&frame.data[5..], &[3, 0, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn interrupted_utf16_string_resumes_with_flag_byte() {
        let mut w = ContinuableWriter::with_max_fragment(8);
        w.write_string(&XlString::new("ΩΩΩΩ").unwrap(), LengthPrefix::U16);
        let frame = w.into_frame(0x0207);
        // 3 header bytes + 2 chars (4 bytes) leaves 1 byte: never half a code unit.
        assert_eq!(frame.fragment_sizes, vec![7, 5]);
        assert_eq!(frame.data[7], STR_FLAG_HIGH_BYTE);

        let decoded = StringRecord::decode(&RecordInput::from_frame(&frame)).unwrap();
        assert_eq!(decoded.value.text(), "ΩΩΩΩ");
    }

    #[test]
    fn split_string_keeps_option_bits_and_lone_surrogates() {
        // Rich with zero runs, a reserved bit, then "a" U+D800 "bc" as UTF-16.
        let payload = [
            4, 0, 0x0B, 0, 0, b'a', 0, 0x00, 0xD8, b'b', 0, b'c', 0,
        ];
        let original = StringRecord::decode(&RecordInput::new(StringRecord::SID, &payload)).unwrap();
        assert_eq!(original.to_payload(), payload);

        let mut w = ContinuableWriter::with_max_fragment(8);
        w.write_string(&original.value, LengthPrefix::U16);
        let frame = w.into_frame(StringRecord::SID);
        // 5 header bytes + "a" leaves 1 byte, so U+D800 opens the next fragment.
        assert_eq!(frame.fragment_sizes, vec![7, 7]);
        assert_eq!(&frame.data[..7], &payload[..7]);
        assert_eq!(frame.data[7], STR_FLAG_HIGH_BYTE);

        let decoded = StringRecord::decode(&RecordInput::from_frame(&frame)).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(decoded.value.units().as_ref(), &[0x61, 0xD800, 0x62, 0x63]);
    }

    #[test]
    fn written_fragments_survive_the_record_writer() {
        let mut w = ContinuableWriter::with_max_fragment(4);
        w.write_bytes(&[1, 2, 3, 4, 5, 6]);
        let frame = w.into_frame(0x00FC);
        assert_eq!(frame.fragment_sizes, vec![4, 2]);

        let mut writer = RecordWriter::new(Vec::new());
        writer.write_frame(&frame).unwrap();
        assert_eq!(
            writer.into_inner(),
            vec![0xFC, 0, 4, 0, 1, 2, 3, 4, 0x3C, 0, 2, 0, 5, 6]
        );
    }
}
