//! SST: the workbook's shared string table.

use formula_binio::LeWriter;
use serde::Serialize;

use crate::continuable::ContinuableWriter;
use crate::framing::RecordFrame;
use crate::record::{BiffRecord, RecordInput};
use crate::records::strings::{LengthPrefix, XlString};
use crate::sid;
use crate::Result;

/// Shared strings referenced by index from LABELSST cells.
///
/// Both counts are kept as read. `total_count` counts references from cells, so it is normally
/// larger than `strings.len()`; `unique_count` should equal it but files in the wild disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SstRecord {
    pub total_count: u32,
    pub unique_count: u32,
    pub strings: Vec<XlString>,
}

impl SstRecord {
    pub fn new(strings: Vec<XlString>, total_count: u32) -> Self {
        Self {
            total_count,
            unique_count: strings.len() as u32,
            strings,
        }
    }

    pub fn get(&self, index: usize) -> Option<&XlString> {
        self.strings.get(index)
    }

    fn layout(&self) -> RecordFrame {
        let mut out = ContinuableWriter::new();
        out.write_u32(self.total_count);
        out.write_u32(self.unique_count);
        for s in &self.strings {
            out.write_string(s, LengthPrefix::U16);
        }
        out.into_frame(Self::SID)
    }
}

impl BiffRecord for SstRecord {
    const SID: u16 = sid::RECORD_SST;
    const NAME: &'static str = "SST";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.reader();
        let total_count = r.read_u32()?;
        let unique_count = r.read_u32()?;
        let mut strings = Vec::new();
        while !r.is_empty() {
            strings.push(XlString::read::<Self>(&mut r, LengthPrefix::U16)?);
        }
        if strings.len() as u64 != u64::from(unique_count) {
            log::warn!(
                "SST declares {unique_count} unique strings but holds {}",
                strings.len()
            );
        }
        Ok(Self {
            total_count,
            unique_count,
            strings,
        })
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
