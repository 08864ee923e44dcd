//! Cell value records.

use formula_binio::LeWriter;
use serde::Serialize;

use crate::record::{malformed, shape_mismatch, BiffReader, BiffRecord, RecordInput};
use crate::rk::{decode_rk, encode_rk};
use crate::sid;
use crate::Result;

/// DIMENSIONS: used range of a sheet. `last_row` and `last_column` are exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DimensionsRecord {
    pub first_row: u32,
    pub last_row: u32,
    pub first_column: u16,
    pub last_column: u16,
    pub reserved: u16,
}

impl BiffRecord for DimensionsRecord {
    const SID: u16 = sid::RECORD_DIMENSIONS;
    const NAME: &'static str = "DIMENSIONS";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(14)?;
        Ok(Self {
            first_row: r.read_u32()?,
            last_row: r.read_u32()?,
            first_column: r.read_u16()?,
            last_column: r.read_u16()?,
            reserved: r.read_u16()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u32(self.first_row);
        out.write_u32(self.last_row);
        out.write_u16(self.first_column);
        out.write_u16(self.last_column);
        out.write_u16(self.reserved);
    }

    fn data_size(&self) -> usize {
        14
    }
}

/// NUMBER: a cell holding an IEEE754 double.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NumberRecord {
    pub row: u16,
    pub column: u16,
    pub xf_index: u16,
    pub value: f64,
}

impl BiffRecord for NumberRecord {
    const SID: u16 = sid::RECORD_NUMBER;
    const NAME: &'static str = "NUMBER";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(14)?;
        Ok(Self {
            row: r.read_u16()?,
            column: r.read_u16()?,
            xf_index: r.read_u16()?,
            value: r.read_f64()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.row);
        out.write_u16(self.column);
        out.write_u16(self.xf_index);
        out.write_f64(self.value);
    }

    fn data_size(&self) -> usize {
        14
    }
}

/// RK: a cell holding a number in the compressed RK encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RkRecord {
    pub row: u16,
    pub column: u16,
    pub xf_index: u16,
    pub rk: i32,
}

impl RkRecord {
    /// `None` if `value` has no exact RK encoding; write a [`NumberRecord`] instead.
    pub fn new(row: u16, column: u16, xf_index: u16, value: f64) -> Option<Self> {
        Some(Self {
            row,
            column,
            xf_index,
            rk: encode_rk(value)?,
        })
    }

    pub fn value(&self) -> f64 {
        decode_rk(self.rk)
    }
}

impl BiffRecord for RkRecord {
    const SID: u16 = sid::RECORD_RK;
    const NAME: &'static str = "RK";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(10)?;
        Ok(Self {
            row: r.read_u16()?,
            column: r.read_u16()?,
            xf_index: r.read_u16()?,
            rk: r.read_i32()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.row);
        out.write_u16(self.column);
        out.write_u16(self.xf_index);
        out.write_i32(self.rk);
    }

    fn data_size(&self) -> usize {
        10
    }
}

/// BLANK: a formatted cell without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlankRecord {
    pub row: u16,
    pub column: u16,
    pub xf_index: u16,
}

impl BiffRecord for BlankRecord {
    const SID: u16 = sid::RECORD_BLANK;
    const NAME: &'static str = "BLANK";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(6)?;
        Ok(Self {
            row: r.read_u16()?,
            column: r.read_u16()?,
            xf_index: r.read_u16()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.row);
        out.write_u16(self.column);
        out.write_u16(self.xf_index);
    }

    fn data_size(&self) -> usize {
        6
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RkCell {
    pub xf_index: u16,
    pub rk: i32,
}

impl RkCell {
    pub fn value(&self) -> f64 {
        decode_rk(self.rk)
    }
}

/// MULRK: a run of RK cells in one row.
///
/// Layout: `row, first_column, (xf, rk) * n, last_column`, with
/// `last_column == first_column + n - 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MulRkRecord {
    row: u16,
    first_column: u16,
    last_column: u16,
    cells: Vec<RkCell>,
}

impl MulRkRecord {
    /// Fails on an empty run or one that would end past column 65535.
    pub fn new(row: u16, first_column: u16, cells: Vec<RkCell>) -> Result<Self> {
        let last_column = run_last_column::<Self>(first_column, cells.len())?;
        Ok(Self {
            row,
            first_column,
            last_column,
            cells,
        })
    }

    pub fn row(&self) -> u16 {
        self.row
    }

    pub fn first_column(&self) -> u16 {
        self.first_column
    }

    pub fn last_column(&self) -> u16 {
        self.last_column
    }

    pub fn cells(&self) -> &[RkCell] {
        &self.cells
    }

    /// `(column, xf_index, value)` for every cell of the run.
    pub fn expand(&self) -> impl Iterator<Item = (u16, u16, f64)> + '_ {
        (self.first_column..)
            .zip(&self.cells)
            .map(|(col, cell)| (col, cell.xf_index, cell.value()))
    }
}

fn run_last_column<R: BiffRecord>(first_column: u16, count: usize) -> Result<u16> {
    if count == 0 {
        return Err(malformed::<R>("a run needs at least one cell"));
    }
    let last = usize::from(first_column) + count - 1;
    u16::try_from(last).map_err(|_| {
        malformed::<R>(format!(
            "{count} cells from column {first_column} end past the last column"
        ))
    })
}

/// Shared decode for MULRK/MULBLANK: `row, first_col, item * n, last_col`.
fn decode_run<R, T, F>(
    input: &RecordInput<'_>,
    item_size: usize,
    mut read_item: F,
) -> Result<(u16, u16, u16, Vec<T>)>
where
    R: BiffRecord,
    F: FnMut(&mut BiffReader<'_>) -> Result<T>,
{
    let len = input.len();
    if len < 6 + item_size {
        return Err(shape_mismatch::<R>(6 + item_size, len));
    }
    if (len - 6) % item_size != 0 {
        return Err(malformed::<R>(format!(
            "payload of {len} bytes is not a whole number of {item_size}-byte cells"
        )));
    }
    let count = (len - 6) / item_size;

    let mut r = input.reader();
    let row = r.read_u16()?;
    let first_column = r.read_u16()?;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(read_item(&mut r)?);
    }
    let last = r.read_u16()?;
    if usize::from(last) + 1 != usize::from(first_column) + count {
        return Err(malformed::<R>(format!(
            "last column {last} does not match first column {first_column} plus {count} cells"
        )));
    }
    Ok((row, first_column, last, items))
}

impl BiffRecord for MulRkRecord {
    const SID: u16 = sid::RECORD_MULRK;
    const NAME: &'static str = "MULRK";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let (row, first_column, last_column, cells) = decode_run::<Self, _, _>(input, 6, |r| {
            Ok(RkCell {
                xf_index: r.read_u16()?,
                rk: r.read_i32()?,
            })
        })?;
        Ok(Self {
            row,
            first_column,
            last_column,
            cells,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.row);
        out.write_u16(self.first_column);
        for cell in &self.cells {
            out.write_u16(cell.xf_index);
            out.write_i32(cell.rk);
        }
        out.write_u16(self.last_column);
    }

    fn data_size(&self) -> usize {
        6 + 6 * self.cells.len()
    }
}

/// MULBLANK: a run of formatted empty cells in one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MulBlankRecord {
    row: u16,
    first_column: u16,
    last_column: u16,
    xf_indexes: Vec<u16>,
}

impl MulBlankRecord {
    pub fn new(row: u16, first_column: u16, xf_indexes: Vec<u16>) -> Result<Self> {
        let last_column = run_last_column::<Self>(first_column, xf_indexes.len())?;
        Ok(Self {
            row,
            first_column,
            last_column,
            xf_indexes,
        })
    }

    pub fn row(&self) -> u16 {
        self.row
    }

    pub fn first_column(&self) -> u16 {
        self.first_column
    }

    pub fn last_column(&self) -> u16 {
        self.last_column
    }

    pub fn xf_indexes(&self) -> &[u16] {
        &self.xf_indexes
    }

    pub fn expand(&self) -> impl Iterator<Item = BlankRecord> + '_ {
        (self.first_column..)
            .zip(&self.xf_indexes)
            .map(|(column, &xf_index)| BlankRecord {
                row: self.row,
                column,
                xf_index,
            })
    }
}

impl BiffRecord for MulBlankRecord {
    const SID: u16 = sid::RECORD_MULBLANK;
    const NAME: &'static str = "MULBLANK";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let (row, first_column, last_column, xf_indexes) =
            decode_run::<Self, _, _>(input, 2, |r| Ok(r.read_u16()?))?;
        Ok(Self {
            row,
            first_column,
            last_column,
            xf_indexes,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.row);
        out.write_u16(self.first_column);
        for &xf in &self.xf_indexes {
            out.write_u16(xf);
        }
        out.write_u16(self.last_column);
    }

    fn data_size(&self) -> usize {
        6 + 2 * self.xf_indexes.len()
    }
}

/// Value of a BOOLERR cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoolErrValue {
    Bool(bool),
    /// One of the `#NULL!` (0x00) .. `#N/A` (0x2A) error codes.
    Error(u8),
}

/// BOOLERR: a cell holding a boolean or an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoolErrRecord {
    pub row: u16,
    pub column: u16,
    pub xf_index: u16,
    pub value: BoolErrValue,
}

impl BiffRecord for BoolErrRecord {
    const SID: u16 = sid::RECORD_BOOLERR;
    const NAME: &'static str = "BOOLERR";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(8)?;
        let row = r.read_u16()?;
        let column = r.read_u16()?;
        let xf_index = r.read_u16()?;
        let raw = r.read_u8()?;
        let value = match r.read_u8()? {
            0 => match raw {
                0 => BoolErrValue::Bool(false),
                1 => BoolErrValue::Bool(true),
                other => {
                    return Err(malformed::<Self>(format!("boolean value {other} is not 0 or 1")))
                }
            },
            1 => BoolErrValue::Error(raw),
            other => return Err(malformed::<Self>(format!("value kind {other} is not 0 or 1"))),
        };
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
        match self.value {
            BoolErrValue::Bool(b) => {
                out.write_u8(u8::from(b));
                out.write_u8(0);
            }
            BoolErrValue::Error(code) => {
                out.write_u8(code);
                out.write_u8(1);
            }
        }
    }

    fn data_size(&self) -> usize {
        8
    }
}

/// LABELSST: a cell whose text is entry `sst_index` of the shared string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelSstRecord {
    pub row: u16,
    pub column: u16,
    pub xf_index: u16,
    pub sst_index: u32,
}

impl BiffRecord for LabelSstRecord {
    const SID: u16 = sid::RECORD_LABELSST;
    const NAME: &'static str = "LABELSST";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(10)?;
        Ok(Self {
            row: r.read_u16()?,
            column: r.read_u16()?,
            xf_index: r.read_u16()?,
            sst_index: r.read_u32()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.row);
        out.write_u16(self.column);
        out.write_u16(self.xf_index);
        out.write_u32(self.sst_index);
    }

    fn data_size(&self) -> usize {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordError;
    use pretty_assertions::assert_eq;

    fn decode<R: BiffRecord>(payload: &[u8]) -> Result<R> {
        R::decode(&RecordInput::new(R::SID, payload))
    }

    fn assert_round_trip<R: BiffRecord>(payload: &[u8]) -> R {
        let record: R = decode(payload).unwrap();
        assert_eq!(record.to_payload(), payload, "{}", R::NAME);
        record
    }

    #[test]
    fn number_round_trip() {
        let mut payload = vec![3, 0, 1, 0, 0x0F, 0];
        payload.extend_from_slice(&1.5f64.to_le_bytes());
        let number: NumberRecord = assert_round_trip(&payload);
        assert_eq!(number.value, 1.5);
        assert!(matches!(
            decode::<NumberRecord>(&payload[..13]),
            Err(RecordError::ShapeMismatch {
                expected: 14,
                actual: 13,
                ..
            })
        ));
    }

    #[test]
    fn rk_record_value() {
        let rk = RkRecord::new(0, 0, 15, 12.34).unwrap();
        let decoded: RkRecord = assert_round_trip(&rk.to_payload());
        assert_eq!(decoded.value(), 12.34);
        assert_eq!(RkRecord::new(0, 0, 15, std::f64::consts::E), None);
    }

    #[test]
    fn dimensions_round_trip() {
        let dims = DimensionsRecord {
            first_row: 0,
            last_row: 65_536,
            first_column: 0,
            last_column: 256,
            reserved: 0,
        };
        assert_eq!(assert_round_trip::<DimensionsRecord>(&dims.to_payload()), dims);
    }

    #[test]
    fn mulrk_expands_cells() {
        let record = MulRkRecord::new(
            4,
            2,
            vec![
                RkCell {
                    xf_index: 15,
                    rk: (1 << 2) | 0x02,
                },
                RkCell {
                    xf_index: 16,
                    rk: (250 << 2) | 0x03,
                },
            ],
        )
        .unwrap();
        let payload = record.to_payload();
        assert_eq!(payload.len(), 18);
        assert_eq!(&payload[16..], &[3, 0]);

        let decoded: MulRkRecord = assert_round_trip(&payload);
        let cells: Vec<_> = decoded.expand().collect();
        assert_eq!(cells, vec![(2, 15, 1.0), (3, 16, 2.5)]);
    }

    #[test]
    fn mulrk_rejects_inconsistent_last_column() {
        let mut payload = MulRkRecord::new(
            0,
            0,
            vec![RkCell { xf_index: 0, rk: 2 }, RkCell { xf_index: 0, rk: 6 }],
        )
        .unwrap()
        .to_payload();
        let n = payload.len();
        payload[n - 2] = 7;
        assert!(matches!(
            decode::<MulRkRecord>(&payload),
            Err(RecordError::Malformed { .. })
        ));
        assert!(matches!(
            decode::<MulRkRecord>(&payload[..n - 1]),
            Err(RecordError::Malformed { .. })
        ));
        assert!(matches!(
            decode::<MulRkRecord>(&payload[..4]),
            Err(RecordError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn runs_past_the_last_column_are_rejected() {
        let cell = RkCell { xf_index: 0, rk: 2 };
        let record = MulRkRecord::new(0, u16::MAX - 1, vec![cell; 2]).unwrap();
        assert_eq!(record.last_column(), u16::MAX);
        assert!(matches!(
            MulRkRecord::new(0, u16::MAX - 1, vec![cell; 3]),
            Err(RecordError::Malformed { .. })
        ));
        assert!(matches!(
            MulRkRecord::new(0, 5, Vec::new()),
            Err(RecordError::Malformed { .. })
        ));
        assert!(matches!(
            MulBlankRecord::new(0, u16::MAX, vec![15, 15]),
            Err(RecordError::Malformed { .. })
        ));
        assert!(matches!(
            MulBlankRecord::new(0, 0, Vec::new()),
            Err(RecordError::Malformed { .. })
        ));
    }

    #[test]
    fn mulblank_expands_to_blanks() {
        let payload = [1, 0, 5, 0, 15, 0, 16, 0, 17, 0, 7, 0];
        let record: MulBlankRecord = assert_round_trip(&payload);
        assert_eq!(record.last_column(), 7);
        let blanks: Vec<_> = record.expand().collect();
        assert_eq!(blanks.len(), 3);
        assert_eq!(
            blanks[2],
            BlankRecord {
                row: 1,
                column: 7,
                xf_index: 17
            }
        );
    }

    #[test]
    fn boolerr_values() {
        let t: BoolErrRecord = assert_round_trip(&[0, 0, 0, 0, 15, 0, 1, 0]);
        assert_eq!(t.value, BoolErrValue::Bool(true));
        let e: BoolErrRecord = assert_round_trip(&[0, 0, 0, 0, 15, 0, 0x07, 1]);
        assert_eq!(e.value, BoolErrValue::Error(0x07));
        assert!(decode::<BoolErrRecord>(&[0, 0, 0, 0, 15, 0, 2, 0]).is_err());
        assert!(decode::<BoolErrRecord>(&[0, 0, 0, 0, 15, 0, 0, 2]).is_err());
    }

    #[test]
    fn labelsst_and_blank_round_trip() {
        let label: LabelSstRecord = assert_round_trip(&[1, 0, 2, 0, 3, 0, 4, 0, 0, 0]);
        assert_eq!(label.sst_index, 4);
        let blank: BlankRecord = assert_round_trip(&[9, 0, 8, 0, 7, 0]);
        assert_eq!(blank.xf_index, 7);
    }
}
