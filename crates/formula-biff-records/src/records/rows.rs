//! Row, column and sheet-window records. Mostly packed option words.

use formula_binio::LeWriter;
use serde::Serialize;

use crate::bitfield::{flag_accessors, value_accessors, BitField};
use crate::record::{shape_mismatch, BiffRecord, RecordInput};
use crate::sid;
use crate::Result;

/// ROW: height and formatting of one row, plus the columns its cells span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowRecord {
    pub row: u16,
    pub first_column: u16,
    /// One past the last column with a cell.
    pub last_column: u16,
    /// Height in twips; bit 15 set means the default height.
    pub height: u16,
    pub optimize: u16,
    pub reserved: u16,
    pub option_flags: u16,
    pub xf_flags: u16,
}

impl RowRecord {
    pub const OUTLINE_LEVEL: BitField = BitField::new(0x0007);
    pub const COLLAPSED: BitField = BitField::new(0x0010);
    pub const ZERO_HEIGHT: BitField = BitField::new(0x0020);
    pub const BAD_FONT_HEIGHT: BitField = BitField::new(0x0040);
    pub const FORMATTED: BitField = BitField::new(0x0080);
    /// Always set by Excel.
    pub const UNUSED_ALWAYS_SET: BitField = BitField::new(0x0100);

    pub const XF_INDEX: BitField = BitField::new(0x0FFF);
    pub const TOP_BORDER: BitField = BitField::new(0x1000);
    pub const BOTTOM_BORDER: BitField = BitField::new(0x2000);
    pub const PHONETIC_GUIDE: BitField = BitField::new(0x4000);

    pub const OPTION_FIELDS: &'static [BitField] = &[
        Self::OUTLINE_LEVEL,
        Self::COLLAPSED,
        Self::ZERO_HEIGHT,
        Self::BAD_FONT_HEIGHT,
        Self::FORMATTED,
        Self::UNUSED_ALWAYS_SET,
    ];
    pub const XF_FIELDS: &'static [BitField] = &[
        Self::XF_INDEX,
        Self::TOP_BORDER,
        Self::BOTTOM_BORDER,
        Self::PHONETIC_GUIDE,
    ];

    pub fn new(row: u16) -> Self {
        Self {
            row,
            first_column: 0,
            last_column: 0,
            height: 0x00FF,
            optimize: 0,
            reserved: 0,
            option_flags: 0x0100,
            xf_flags: 0x000F,
        }
    }

    flag_accessors! { option_flags: u16;
        is_collapsed, set_collapsed => Self::COLLAPSED;
        is_zero_height, set_zero_height => Self::ZERO_HEIGHT;
        bad_font_height, set_bad_font_height => Self::BAD_FONT_HEIGHT;
        is_formatted, set_formatted => Self::FORMATTED;
    }

    value_accessors! { option_flags: u16;
        outline_level, set_outline_level => Self::OUTLINE_LEVEL, u8;
    }

    flag_accessors! { xf_flags: u16;
        top_border, set_top_border => Self::TOP_BORDER;
        bottom_border, set_bottom_border => Self::BOTTOM_BORDER;
        phonetic_guide, set_phonetic_guide => Self::PHONETIC_GUIDE;
    }

    value_accessors! { xf_flags: u16;
        xf_index, set_xf_index => Self::XF_INDEX, u16;
    }
}

impl BiffRecord for RowRecord {
    const SID: u16 = sid::RECORD_ROW;
    const NAME: &'static str = "ROW";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(16)?;
        Ok(Self {
            row: r.read_u16()?,
            first_column: r.read_u16()?,
            last_column: r.read_u16()?,
            height: r.read_u16()?,
            optimize: r.read_u16()?,
            reserved: r.read_u16()?,
            option_flags: r.read_u16()?,
            xf_flags: r.read_u16()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.row);
        out.write_u16(self.first_column);
        out.write_u16(self.last_column);
        out.write_u16(self.height);
        out.write_u16(self.optimize);
        out.write_u16(self.reserved);
        out.write_u16(self.option_flags);
        out.write_u16(self.xf_flags);
    }

    fn data_size(&self) -> usize {
        16
    }
}

/// COLINFO: width and formatting of a range of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColInfoRecord {
    pub first_column: u16,
    pub last_column: u16,
    /// Width in 1/256 of the default character width.
    pub width: u16,
    pub xf_index: u16,
    pub options: u16,
    /// Absent in some writers' output, which end the record after `options`.
    pub reserved: Option<u16>,
}

impl ColInfoRecord {
    pub const HIDDEN: BitField = BitField::new(0x0001);
    pub const OUTLINE_LEVEL: BitField = BitField::new(0x0700);
    pub const COLLAPSED: BitField = BitField::new(0x1000);

    pub const FIELDS: &'static [BitField] = &[Self::HIDDEN, Self::OUTLINE_LEVEL, Self::COLLAPSED];

    flag_accessors! { options: u16;
        is_hidden, set_hidden => Self::HIDDEN;
        is_collapsed, set_collapsed => Self::COLLAPSED;
    }

    value_accessors! { options: u16;
        outline_level, set_outline_level => Self::OUTLINE_LEVEL, u8;
    }
}

impl BiffRecord for ColInfoRecord {
    const SID: u16 = sid::RECORD_COLINFO;
    const NAME: &'static str = "COLINFO";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        if input.len() != 10 && input.len() != 12 {
            return Err(shape_mismatch::<Self>(12, input.len()));
        }
        let mut r = input.reader();
        Ok(Self {
            first_column: r.read_u16()?,
            last_column: r.read_u16()?,
            width: r.read_u16()?,
            xf_index: r.read_u16()?,
            options: r.read_u16()?,
            reserved: if r.is_empty() {
                None
            } else {
                Some(r.read_u16()?)
            },
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.first_column);
        out.write_u16(self.last_column);
        out.write_u16(self.width);
        out.write_u16(self.xf_index);
        out.write_u16(self.options);
        if let Some(reserved) = self.reserved {
            out.write_u16(reserved);
        }
    }

    fn data_size(&self) -> usize {
        if self.reserved.is_some() {
            12
        } else {
            10
        }
    }
}

/// DEFCOLWIDTH: default column width in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DefColWidthRecord {
    pub width: u16,
}

impl BiffRecord for DefColWidthRecord {
    const SID: u16 = sid::RECORD_DEFCOLWIDTH;
    const NAME: &'static str = "DEFCOLWIDTH";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(2)?;
        Ok(Self {
            width: r.read_u16()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.width);
    }

    fn data_size(&self) -> usize {
        2
    }
}

/// DEFAULTROWHEIGHT: height and flags of rows without a ROW record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DefaultRowHeightRecord {
    pub options: u16,
    pub height: u16,
}

impl DefaultRowHeightRecord {
    pub const UNSYNCED: BitField = BitField::new(0x0001);
    pub const ZERO_HEIGHT: BitField = BitField::new(0x0002);
    pub const EXTRA_ASCENT: BitField = BitField::new(0x0004);
    pub const EXTRA_DESCENT: BitField = BitField::new(0x0008);

    pub const FIELDS: &'static [BitField] = &[
        Self::UNSYNCED,
        Self::ZERO_HEIGHT,
        Self::EXTRA_ASCENT,
        Self::EXTRA_DESCENT,
    ];

    flag_accessors! { options: u16;
        is_unsynced, set_unsynced => Self::UNSYNCED;
        is_zero_height, set_zero_height => Self::ZERO_HEIGHT;
        extra_ascent, set_extra_ascent => Self::EXTRA_ASCENT;
        extra_descent, set_extra_descent => Self::EXTRA_DESCENT;
    }
}

impl BiffRecord for DefaultRowHeightRecord {
    const SID: u16 = sid::RECORD_DEFAULTROWHEIGHT;
    const NAME: &'static str = "DEFAULTROWHEIGHT";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(4)?;
        Ok(Self {
            options: r.read_u16()?,
            height: r.read_u16()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.options);
        out.write_u16(self.height);
    }

    fn data_size(&self) -> usize {
        4
    }
}

/// Zoom and reserved tail of a worksheet WINDOW2 (absent for chart sheets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window2Zoom {
    pub page_break_zoom: u16,
    pub normal_zoom: u16,
    pub reserved: u32,
}

/// WINDOW2: per-sheet window options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window2Record {
    pub options: u16,
    pub top_row: u16,
    pub left_column: u16,
    pub header_color: u32,
    pub zoom: Option<Window2Zoom>,
}

impl Window2Record {
    pub const DISPLAY_FORMULAS: BitField = BitField::new(0x0001);
    pub const DISPLAY_GRIDLINES: BitField = BitField::new(0x0002);
    pub const DISPLAY_ROW_COL_HEADINGS: BitField = BitField::new(0x0004);
    pub const FREEZE_PANES: BitField = BitField::new(0x0008);
    pub const DISPLAY_ZEROS: BitField = BitField::new(0x0010);
    pub const DEFAULT_HEADER_COLOR: BitField = BitField::new(0x0020);
    pub const ARABIC: BitField = BitField::new(0x0040);
    pub const DISPLAY_GUTS: BitField = BitField::new(0x0080);
    pub const FREEZE_PANES_NO_SPLIT: BitField = BitField::new(0x0100);
    pub const SELECTED: BitField = BitField::new(0x0200);
    pub const ACTIVE: BitField = BitField::new(0x0400);
    pub const PAGE_BREAK_PREVIEW: BitField = BitField::new(0x0800);

    pub const FIELDS: &'static [BitField] = &[
        Self::DISPLAY_FORMULAS,
        Self::DISPLAY_GRIDLINES,
        Self::DISPLAY_ROW_COL_HEADINGS,
        Self::FREEZE_PANES,
        Self::DISPLAY_ZEROS,
        Self::DEFAULT_HEADER_COLOR,
        Self::ARABIC,
        Self::DISPLAY_GUTS,
        Self::FREEZE_PANES_NO_SPLIT,
        Self::SELECTED,
        Self::ACTIVE,
        Self::PAGE_BREAK_PREVIEW,
    ];

    flag_accessors! { options: u16;
        display_formulas, set_display_formulas => Self::DISPLAY_FORMULAS;
        display_gridlines, set_display_gridlines => Self::DISPLAY_GRIDLINES;
        display_row_col_headings, set_display_row_col_headings => Self::DISPLAY_ROW_COL_HEADINGS;
        freeze_panes, set_freeze_panes => Self::FREEZE_PANES;
        display_zeros, set_display_zeros => Self::DISPLAY_ZEROS;
        default_header_color, set_default_header_color => Self::DEFAULT_HEADER_COLOR;
        is_arabic, set_arabic => Self::ARABIC;
        display_guts, set_display_guts => Self::DISPLAY_GUTS;
        freeze_panes_no_split, set_freeze_panes_no_split => Self::FREEZE_PANES_NO_SPLIT;
        is_selected, set_selected => Self::SELECTED;
        is_active, set_active => Self::ACTIVE;
        page_break_preview, set_page_break_preview => Self::PAGE_BREAK_PREVIEW;
    }
}

impl Default for Window2Record {
    fn default() -> Self {
        Self {
            options: 0x06B6,
            top_row: 0,
            left_column: 0,
            header_color: 0x40,
            zoom: Some(Window2Zoom {
                page_break_zoom: 0,
                normal_zoom: 0,
                reserved: 0,
            }),
        }
    }
}

impl BiffRecord for Window2Record {
    const SID: u16 = sid::RECORD_WINDOW2;
    const NAME: &'static str = "WINDOW2";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        if input.len() != 10 && input.len() != 18 {
            return Err(shape_mismatch::<Self>(18, input.len()));
        }
        let mut r = input.reader();
        let options = r.read_u16()?;
        let top_row = r.read_u16()?;
        let left_column = r.read_u16()?;
        let header_color = r.read_u32()?;
        let zoom = if r.is_empty() {
            None
        } else {
            Some(Window2Zoom {
                page_break_zoom: r.read_u16()?,
                normal_zoom: r.read_u16()?,
                reserved: r.read_u32()?,
            })
        };
        Ok(Self {
            options,
            top_row,
            left_column,
            header_color,
            zoom,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.options);
        out.write_u16(self.top_row);
        out.write_u16(self.left_column);
        out.write_u32(self.header_color);
        if let Some(zoom) = &self.zoom {
            out.write_u16(zoom.page_break_zoom);
            out.write_u16(zoom.normal_zoom);
            out.write_u32(zoom.reserved);
        }
    }

    fn data_size(&self) -> usize {
        if self.zoom.is_some() {
            18
        } else {
            10
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitfield::assert_fields_isolated;
    use crate::RecordError;
    use pretty_assertions::assert_eq;

    fn decode<R: BiffRecord>(payload: &[u8]) -> Result<R> {
        R::decode(&RecordInput::new(R::SID, payload))
    }

    #[test]
    fn row_masks_are_pairwise_isolated() {
        assert_fields_isolated(RowRecord::OPTION_FIELDS);
        assert_fields_isolated(RowRecord::XF_FIELDS);
        assert_fields_isolated(ColInfoRecord::FIELDS);
        assert_fields_isolated(DefaultRowHeightRecord::FIELDS);
        assert_fields_isolated(Window2Record::FIELDS);
    }

    #[test]
    fn row_setters_leave_other_bits_alone() {
        let mut row = RowRecord::new(3);
        row.set_outline_level(7);
        row.set_zero_height(true);
        row.set_xf_index(0x0ABC);
        row.set_bottom_border(true);
        assert_eq!(row.option_flags, 0x0100 | 0x0020 | 0x0007);
        assert_eq!(row.xf_flags, 0x2ABC);

        row.set_outline_level(1);
        assert!(row.is_zero_height());
        assert_eq!(row.option_flags, 0x0121);
        row.set_xf_index(0xFFFF);
        assert!(row.bottom_border() && !row.top_border());
        assert_eq!(row.xf_index(), 0x0FFF);

        let decoded: RowRecord = decode(&row.to_payload()).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn colinfo_accepts_short_form() {
        let long = [0, 0, 3, 0, 0x00, 0x09, 15, 0, 0x01, 0x02, 0, 0];
        let record: ColInfoRecord = decode(&long).unwrap();
        assert!(record.is_hidden());
        assert_eq!(record.outline_level(), 2);
        assert_eq!(record.to_payload(), long);

        let short: ColInfoRecord = decode(&long[..10]).unwrap();
        assert_eq!(short.reserved, None);
        assert_eq!(short.to_payload(), &long[..10]);

        assert!(matches!(
            decode::<ColInfoRecord>(&long[..11]),
            Err(RecordError::ShapeMismatch { actual: 11, .. })
        ));
    }

    #[test]
    fn window2_chart_and_worksheet_forms() {
        let sheet = Window2Record::default();
        assert!(sheet.display_gridlines() && !sheet.freeze_panes());
        let bytes = sheet.to_payload();
        assert_eq!(bytes.len(), 18);
        assert_eq!(decode::<Window2Record>(&bytes).unwrap(), sheet);

        let chart: Window2Record = decode(&bytes[..10]).unwrap();
        assert_eq!(chart.zoom, None);
        assert_eq!(chart.to_payload(), &bytes[..10]);
    }

    #[test]
    fn default_row_height_round_trip() {
        let record: DefaultRowHeightRecord = decode(&[0x01, 0x00, 0xFF, 0x00]).unwrap();
        assert!(record.is_unsynced());
        assert_eq!(record.height, 0xFF);
        assert_eq!(record.to_payload(), vec![0x01, 0x00, 0xFF, 0x00]);
        let width: DefColWidthRecord = decode(&[8, 0]).unwrap();
        assert_eq!(width.width, 8);
    }
}
