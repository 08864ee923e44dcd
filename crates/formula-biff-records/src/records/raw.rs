//! Records kept as opaque bytes.

use formula_binio::LeWriter;
use serde::Serialize;

use crate::framing::RecordFrame;
use crate::record::{BiffRecord, RecordInput};
use crate::sid;
use crate::Result;

/// A record with no typed decoder, or one whose decoder rejected it under
/// [`crate::DecodePolicy::Degrade`].
///
/// Keeps the payload and the physical fragment sizes, so re-encoding reproduces the original
/// frames exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnknownRecord {
    pub sid: u16,
    pub data: Vec<u8>,
    pub fragment_sizes: Vec<usize>,
}

impl UnknownRecord {
    pub fn new(sid: u16, data: Vec<u8>) -> Self {
        Self {
            sid,
            data,
            fragment_sizes: Vec::new(),
        }
    }

    pub fn from_input(input: &RecordInput<'_>) -> Self {
        Self {
            sid: input.sid(),
            data: input.data().to_vec(),
            fragment_sizes: input.fragment_sizes().to_vec(),
        }
    }

    pub fn to_frame(&self) -> RecordFrame {
        RecordFrame::with_fragments(self.sid, self.data.clone(), self.fragment_sizes.clone())
    }
}

/// CONTINUE frame that did not attach to a preceding record, such as the object data that
/// follows a DRAWING or TXO record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContinueRecord {
    pub data: Vec<u8>,
}

impl BiffRecord for ContinueRecord {
    const SID: u16 = sid::RECORD_CONTINUE;
    const NAME: &'static str = "CONTINUE";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        Ok(Self {
            data: input.data().to_vec(),
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_bytes(&self.data);
    }

    fn data_size(&self) -> usize {
        self.data.len()
    }
}

/// DRAWING (MSODRAWING): one fragment of the sheet's Escher drawing tree, kept opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawingRecord {
    pub data: Vec<u8>,
}

impl BiffRecord for DrawingRecord {
    const SID: u16 = sid::RECORD_DRAWING;
    const NAME: &'static str = "DRAWING";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        Ok(Self {
            data: input.data().to_vec(),
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_bytes(&self.data);
    }

    fn data_size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::RecordWriter;

    #[test]
    fn unknown_record_replays_its_fragments() {
        let data: Vec<u8> = (0..10).collect();
        let frame = RecordFrame::with_fragments(0x1234, data, vec![3, 7]);
        let unknown = UnknownRecord::from_input(&RecordInput::from_frame(&frame));
        assert_eq!(unknown.to_frame(), frame);

        let mut writer = RecordWriter::new(Vec::new());
        writer.write_frame(&unknown.to_frame()).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(&bytes[..4], &[0x34, 0x12, 3, 0]);
        assert_eq!(&bytes[7..11], &[0x3C, 0x00, 7, 0]);
        assert_eq!(bytes.len(), 4 + 3 + 4 + 7);
    }

    #[test]
    fn drawing_oversized_payload_repeats_its_sid() {
        let drawing = DrawingRecord {
            data: vec![0xAA; crate::MAX_RECORD_DATA_SIZE + 1],
        };
        let mut writer = RecordWriter::new(Vec::new());
        writer.write_frame(&drawing.to_frame()).unwrap();
        let bytes = writer.into_inner();
        let second = 4 + crate::MAX_RECORD_DATA_SIZE;
        assert_eq!(&bytes[second..second + 4], &[0xEC, 0x00, 1, 0]);
    }
}
