//! Cell formatting records: extended formats (XF) and fonts.

use formula_binio::LeWriter;
use serde::Serialize;

use crate::bitfield::{flag_accessors, value_accessors, BitField};
use crate::record::{BiffRecord, RecordInput};
use crate::records::strings::{LengthPrefix, XlString};
use crate::sid;
use crate::Result;

/// XF: one cell or style format. Almost every field is a packed option word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtendedFormatRecord {
    pub font_index: u16,
    pub format_index: u16,
    pub cell_options: u16,
    pub alignment_options: u16,
    pub indention_options: u16,
    pub border_options: u16,
    pub palette_options: u16,
    pub additional_palette_options: u32,
    pub fill_palette_options: u16,
}

impl ExtendedFormatRecord {
    pub const DATA_SIZE: usize = 20;

    // cell_options
    pub const LOCKED: BitField = BitField::new(0x0001);
    pub const HIDDEN: BitField = BitField::new(0x0002);
    pub const XF_TYPE: BitField = BitField::new(0x0004);
    pub const LOTUS_PREFIX: BitField = BitField::new(0x0008);
    pub const PARENT_INDEX: BitField = BitField::new(0xFFF0);

    // alignment_options
    pub const ALIGNMENT: BitField = BitField::new(0x0007);
    pub const WRAP_TEXT: BitField = BitField::new(0x0008);
    pub const VERTICAL_ALIGNMENT: BitField = BitField::new(0x0070);
    pub const JUSTIFY_LAST: BitField = BitField::new(0x0080);
    pub const ROTATION: BitField = BitField::new(0xFF00);

    // indention_options
    pub const INDENT: BitField = BitField::new(0x000F);
    pub const SHRINK_TO_FIT: BitField = BitField::new(0x0010);
    pub const MERGE_CELLS: BitField = BitField::new(0x0020);
    pub const READING_ORDER: BitField = BitField::new(0x00C0);
    pub const USED_NUMBER_FORMAT: BitField = BitField::new(0x0400);
    pub const USED_FONT: BitField = BitField::new(0x0800);
    pub const USED_ALIGNMENT: BitField = BitField::new(0x1000);
    pub const USED_BORDER: BitField = BitField::new(0x2000);
    pub const USED_PATTERN: BitField = BitField::new(0x4000);
    pub const USED_PROTECTION: BitField = BitField::new(0x8000);

    // border_options
    pub const BORDER_LEFT: BitField = BitField::new(0x000F);
    pub const BORDER_RIGHT: BitField = BitField::new(0x00F0);
    pub const BORDER_TOP: BitField = BitField::new(0x0F00);
    pub const BORDER_BOTTOM: BitField = BitField::new(0xF000);

    // palette_options
    pub const LEFT_BORDER_COLOR: BitField = BitField::new(0x007F);
    pub const RIGHT_BORDER_COLOR: BitField = BitField::new(0x3F80);
    pub const DIAGONAL: BitField = BitField::new(0xC000);

    // additional_palette_options
    pub const TOP_BORDER_COLOR: BitField = BitField::new(0x0000_007F);
    pub const BOTTOM_BORDER_COLOR: BitField = BitField::new(0x0000_3F80);
    pub const DIAGONAL_COLOR: BitField = BitField::new(0x001F_C000);
    pub const DIAGONAL_LINE_STYLE: BitField = BitField::new(0x01E0_0000);
    pub const FILL_PATTERN: BitField = BitField::new(0xFC00_0000);

    // fill_palette_options
    pub const FILL_FOREGROUND: BitField = BitField::new(0x007F);
    pub const FILL_BACKGROUND: BitField = BitField::new(0x3F80);

    /// Field groups, one per option word.
    pub const FIELD_GROUPS: &'static [&'static [BitField]] = &[
        &[
            Self::LOCKED,
            Self::HIDDEN,
            Self::XF_TYPE,
            Self::LOTUS_PREFIX,
            Self::PARENT_INDEX,
        ],
        &[
            Self::ALIGNMENT,
            Self::WRAP_TEXT,
            Self::VERTICAL_ALIGNMENT,
            Self::JUSTIFY_LAST,
            Self::ROTATION,
        ],
        &[
            Self::INDENT,
            Self::SHRINK_TO_FIT,
            Self::MERGE_CELLS,
            Self::READING_ORDER,
            Self::USED_NUMBER_FORMAT,
            Self::USED_FONT,
            Self::USED_ALIGNMENT,
            Self::USED_BORDER,
            Self::USED_PATTERN,
            Self::USED_PROTECTION,
        ],
        &[
            Self::BORDER_LEFT,
            Self::BORDER_RIGHT,
            Self::BORDER_TOP,
            Self::BORDER_BOTTOM,
        ],
        &[
            Self::LEFT_BORDER_COLOR,
            Self::RIGHT_BORDER_COLOR,
            Self::DIAGONAL,
        ],
        &[
            Self::TOP_BORDER_COLOR,
            Self::BOTTOM_BORDER_COLOR,
            Self::DIAGONAL_COLOR,
            Self::DIAGONAL_LINE_STYLE,
            Self::FILL_PATTERN,
        ],
        &[Self::FILL_FOREGROUND, Self::FILL_BACKGROUND],
    ];

    flag_accessors! { cell_options: u16;
        is_locked, set_locked => Self::LOCKED;
        is_hidden, set_hidden => Self::HIDDEN;
        /// Style XF rather than cell XF.
        is_style, set_style => Self::XF_TYPE;
        lotus_prefix, set_lotus_prefix => Self::LOTUS_PREFIX;
    }
    value_accessors! { cell_options: u16;
        parent_index, set_parent_index => Self::PARENT_INDEX, u16;
    }

    flag_accessors! { alignment_options: u16;
        wrap_text, set_wrap_text => Self::WRAP_TEXT;
        justify_last, set_justify_last => Self::JUSTIFY_LAST;
    }
    value_accessors! { alignment_options: u16;
        alignment, set_alignment => Self::ALIGNMENT, u8;
        vertical_alignment, set_vertical_alignment => Self::VERTICAL_ALIGNMENT, u8;
        rotation, set_rotation => Self::ROTATION, u8;
    }

    flag_accessors! { indention_options: u16;
        shrink_to_fit, set_shrink_to_fit => Self::SHRINK_TO_FIT;
        merge_cells, set_merge_cells => Self::MERGE_CELLS;
        used_number_format, set_used_number_format => Self::USED_NUMBER_FORMAT;
        used_font, set_used_font => Self::USED_FONT;
        used_alignment, set_used_alignment => Self::USED_ALIGNMENT;
        used_border, set_used_border => Self::USED_BORDER;
        used_pattern, set_used_pattern => Self::USED_PATTERN;
        used_protection, set_used_protection => Self::USED_PROTECTION;
    }
    value_accessors! { indention_options: u16;
        indent, set_indent => Self::INDENT, u8;
        reading_order, set_reading_order => Self::READING_ORDER, u8;
    }

    value_accessors! { border_options: u16;
        border_left, set_border_left => Self::BORDER_LEFT, u8;
        border_right, set_border_right => Self::BORDER_RIGHT, u8;
        border_top, set_border_top => Self::BORDER_TOP, u8;
        border_bottom, set_border_bottom => Self::BORDER_BOTTOM, u8;
    }

    value_accessors! { palette_options: u16;
        left_border_color, set_left_border_color => Self::LEFT_BORDER_COLOR, u8;
        right_border_color, set_right_border_color => Self::RIGHT_BORDER_COLOR, u8;
        diagonal, set_diagonal => Self::DIAGONAL, u8;
    }

    value_accessors! { additional_palette_options: u32;
        top_border_color, set_top_border_color => Self::TOP_BORDER_COLOR, u8;
        bottom_border_color, set_bottom_border_color => Self::BOTTOM_BORDER_COLOR, u8;
        diagonal_color, set_diagonal_color => Self::DIAGONAL_COLOR, u8;
        diagonal_line_style, set_diagonal_line_style => Self::DIAGONAL_LINE_STYLE, u8;
        fill_pattern, set_fill_pattern => Self::FILL_PATTERN, u8;
    }

    value_accessors! { fill_palette_options: u16;
        fill_foreground, set_fill_foreground => Self::FILL_FOREGROUND, u8;
        fill_background, set_fill_background => Self::FILL_BACKGROUND, u8;
    }
}

impl BiffRecord for ExtendedFormatRecord {
    const SID: u16 = sid::RECORD_XF;
    const NAME: &'static str = "XF";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(Self::DATA_SIZE)?;
        Ok(Self {
            font_index: r.read_u16()?,
            format_index: r.read_u16()?,
            cell_options: r.read_u16()?,
            alignment_options: r.read_u16()?,
            indention_options: r.read_u16()?,
            border_options: r.read_u16()?,
            palette_options: r.read_u16()?,
            additional_palette_options: r.read_u32()?,
            fill_palette_options: r.read_u16()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.font_index);
        out.write_u16(self.format_index);
        out.write_u16(self.cell_options);
        out.write_u16(self.alignment_options);
        out.write_u16(self.indention_options);
        out.write_u16(self.border_options);
        out.write_u16(self.palette_options);
        out.write_u32(self.additional_palette_options);
        out.write_u16(self.fill_palette_options);
    }

    fn data_size(&self) -> usize {
        Self::DATA_SIZE
    }
}

/// FONT: one entry of the workbook font table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FontRecord {
    /// Height in twips.
    pub height: u16,
    pub attributes: u16,
    pub color_index: u16,
    /// 400 normal, 700 bold.
    pub bold_weight: u16,
    /// 0 none, 1 superscript, 2 subscript.
    pub super_sub: u16,
    pub underline: u8,
    pub family: u8,
    pub charset: u8,
    pub reserved: u8,
    name: XlString,
}

impl FontRecord {
    pub const ITALIC: BitField = BitField::new(0x0002);
    pub const STRIKEOUT: BitField = BitField::new(0x0008);
    pub const MAC_OUTLINE: BitField = BitField::new(0x0010);
    pub const MAC_SHADOW: BitField = BitField::new(0x0020);

    pub const FIELDS: &'static [BitField] = &[
        Self::ITALIC,
        Self::STRIKEOUT,
        Self::MAC_OUTLINE,
        Self::MAC_SHADOW,
    ];

    pub fn new(name: &str, height: u16) -> Result<Self> {
        let name = XlString::new(name)?;
        name.check_fits(LengthPrefix::U8)?;
        Ok(Self {
            height,
            attributes: 0,
            color_index: 0x7FFF,
            bold_weight: 400,
            super_sub: 0,
            underline: 0,
            family: 0,
            charset: 0,
            reserved: 0,
            name,
        })
    }

    pub fn name(&self) -> &str {
        self.name.text()
    }

    flag_accessors! { attributes: u16;
        is_italic, set_italic => Self::ITALIC;
        is_strikeout, set_strikeout => Self::STRIKEOUT;
        is_mac_outline, set_mac_outline => Self::MAC_OUTLINE;
        is_mac_shadow, set_mac_shadow => Self::MAC_SHADOW;
    }
}

impl BiffRecord for FontRecord {
    const SID: u16 = sid::RECORD_FONT;
    const NAME: &'static str = "FONT";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.reader();
        let height = r.read_u16()?;
        let attributes = r.read_u16()?;
        let color_index = r.read_u16()?;
        let bold_weight = r.read_u16()?;
        let super_sub = r.read_u16()?;
        let underline = r.read_u8()?;
        let family = r.read_u8()?;
        let charset = r.read_u8()?;
        let reserved = r.read_u8()?;
        let name = XlString::read::<Self>(&mut r, LengthPrefix::U8)?;
        r.finish::<Self>()?;
        Ok(Self {
            height,
            attributes,
            color_index,
            bold_weight,
            super_sub,
            underline,
            family,
            charset,
            reserved,
            name,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.height);
        out.write_u16(self.attributes);
        out.write_u16(self.color_index);
        out.write_u16(self.bold_weight);
        out.write_u16(self.super_sub);
        out.write_u8(self.underline);
        out.write_u8(self.family);
        out.write_u8(self.charset);
        out.write_u8(self.reserved);
        self.name.write(out, LengthPrefix::U8);
    }

    fn data_size(&self) -> usize {
        14 + self.name.encoded_len(LengthPrefix::U8)
    }
}
