//! Row-block lookup records: INDEX (one per sheet) and DBCELL (one per block of 32 rows).
//!
//! Both carry a variable-length offset list. They are assembled with a builder and are immutable
//! once built.

use formula_binio::LeWriter;
use serde::Serialize;

use crate::record::{malformed, BiffRecord, RecordInput};
use crate::sid;
use crate::Result;

/// DBCELL: offset back to the first ROW record of the block, then one offset per row to its first
/// cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbCellRecord {
    row_offset: u32,
    cell_offsets: Vec<u16>,
}

impl DbCellRecord {
    pub fn row_offset(&self) -> u32 {
        self.row_offset
    }

    pub fn cell_offsets(&self) -> &[u16] {
        &self.cell_offsets
    }
}

impl BiffRecord for DbCellRecord {
    const SID: u16 = sid::RECORD_DBCELL;
    const NAME: &'static str = "DBCELL";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.reader();
        let row_offset = r.read_u32()?;
        if r.remaining() % 2 != 0 {
            return Err(malformed::<Self>(format!(
                "{} bytes of cell offsets is not a whole number of u16 values",
                r.remaining()
            )));
        }
        let mut cell_offsets = Vec::with_capacity(r.remaining() / 2);
        while !r.is_empty() {
            cell_offsets.push(r.read_u16()?);
        }
        Ok(Self {
            row_offset,
            cell_offsets,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u32(self.row_offset);
        for &offset in &self.cell_offsets {
            out.write_u16(offset);
        }
    }

    fn data_size(&self) -> usize {
        4 + self.cell_offsets.len() * 2
    }
}

#[derive(Debug, Default)]
pub struct DbCellBuilder {
    row_offset: u32,
    cell_offsets: Vec<u16>,
}

impl DbCellBuilder {
    pub fn new(row_offset: u32) -> Self {
        Self {
            row_offset,
            cell_offsets: Vec::new(),
        }
    }

    pub fn add_cell_offset(mut self, offset: u16) -> Self {
        self.cell_offsets.push(offset);
        self
    }

    pub fn build(self) -> DbCellRecord {
        DbCellRecord {
            row_offset: self.row_offset,
            cell_offsets: self.cell_offsets,
        }
    }
}

/// INDEX: row range of the sheet and the stream position of every DBCELL record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexRecord {
    reserved: u32,
    first_row: u32,
    last_row_add1: u32,
    reserved2: u32,
    dbcells: Vec<u32>,
}

impl IndexRecord {
    pub fn first_row(&self) -> u32 {
        self.first_row
    }

    /// One past the last used row.
    pub fn last_row_add1(&self) -> u32 {
        self.last_row_add1
    }

    pub fn dbcells(&self) -> &[u32] {
        &self.dbcells
    }
}

impl BiffRecord for IndexRecord {
    const SID: u16 = sid::RECORD_INDEX;
    const NAME: &'static str = "INDEX";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.reader();
        let reserved = r.read_u32()?;
        let first_row = r.read_u32()?;
        let last_row_add1 = r.read_u32()?;
        let reserved2 = r.read_u32()?;
        if r.remaining() % 4 != 0 {
            return Err(malformed::<Self>(format!(
                "{} bytes of DBCELL positions is not a whole number of u32 values",
                r.remaining()
            )));
        }
        let mut dbcells = Vec::with_capacity(r.remaining() / 4);
        while !r.is_empty() {
            dbcells.push(r.read_u32()?);
        }
        Ok(Self {
            reserved,
            first_row,
            last_row_add1,
            reserved2,
            dbcells,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u32(self.reserved);
        out.write_u32(self.first_row);
        out.write_u32(self.last_row_add1);
        out.write_u32(self.reserved2);
        for &pos in &self.dbcells {
            out.write_u32(pos);
        }
    }

    fn data_size(&self) -> usize {
        16 + self.dbcells.len() * 4
    }
}

#[derive(Debug, Default)]
pub struct IndexBuilder {
    first_row: u32,
    last_row_add1: u32,
    dbcells: Vec<u32>,
}

impl IndexBuilder {
    pub fn new(first_row: u32, last_row_add1: u32) -> Self {
        Self {
            first_row,
            last_row_add1,
            dbcells: Vec::new(),
        }
    }

    pub fn add_dbcell(mut self, position: u32) -> Self {
        self.dbcells.push(position);
        self
    }

    pub fn build(self) -> IndexRecord {
        IndexRecord {
            reserved: 0,
            first_row: self.first_row,
            last_row_add1: self.last_row_add1,
            reserved2: 0,
            dbcells: self.dbcells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordError;
    use pretty_assertions::assert_eq;

    #[test]
    fn dbcell_builder_and_round_trip() {
        let record = DbCellBuilder::new(0x0120)
            .add_cell_offset(0x14)
            .add_cell_offset(0x30)
            .build();
        let payload = record.to_payload();
        assert_eq!(payload, vec![0x20, 0x01, 0, 0, 0x14, 0, 0x30, 0]);

        let decoded = DbCellRecord::decode(&RecordInput::new(DbCellRecord::SID, &payload)).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.cell_offsets(), &[0x14, 0x30]);

        let copy = decoded.clone();
        assert_eq!(copy.cell_offsets(), decoded.cell_offsets());
    }

    #[test]
    fn dbcell_with_odd_tail_is_malformed() {
        let payload = [0, 0, 0, 0, 1, 0, 2];
        assert!(matches!(
            DbCellRecord::decode(&RecordInput::new(DbCellRecord::SID, &payload)),
            Err(RecordError::Malformed { .. })
        ));
    }

    #[test]
    fn index_round_trip_preserves_reserved_words() {
        let mut payload = vec![7, 0, 0, 0, 0, 0, 0, 0, 40, 0, 0, 0, 9, 0, 0, 0];
        payload.extend_from_slice(&[0x00, 0x10, 0, 0, 0x00, 0x20, 0, 0]);
        let record = IndexRecord::decode(&RecordInput::new(IndexRecord::SID, &payload)).unwrap();
        assert_eq!(record.last_row_add1(), 40);
        assert_eq!(record.dbcells(), &[0x1000, 0x2000]);
        assert_eq!(record.to_payload(), payload);

        let built = IndexBuilder::new(0, 40)
            .add_dbcell(0x1000)
            .add_dbcell(0x2000)
            .build();
        assert_eq!(built.data_size(), payload.len());
        assert_ne!(built, record);
    }
}
