//! Workbook-globals records with a fixed layout.

use formula_binio::LeWriter;
use serde::Serialize;

use crate::bitfield::{flag_accessors, BitField};
use crate::record::{BiffRecord, RecordInput};
use crate::sid;
use crate::Result;

/// Substream types carried by [`BofRecord::substream_type`].
pub mod substream {
    pub const WORKBOOK_GLOBALS: u16 = 0x0005;
    pub const VB_MODULE: u16 = 0x0006;
    pub const WORKSHEET: u16 = 0x0010;
    pub const CHART: u16 = 0x0020;
    pub const MACRO_SHEET: u16 = 0x0040;
    pub const WORKSPACE: u16 = 0x0100;
}

/// BOF: start of a substream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BofRecord {
    pub version: u16,
    pub substream_type: u16,
    pub build: u16,
    pub build_year: u16,
    pub history_flags: u32,
    pub required_version: u32,
}

impl BofRecord {
    pub const DATA_SIZE: usize = 16;
    /// BIFF8.
    pub const VERSION_BIFF8: u16 = 0x0600;

    pub fn new(substream_type: u16) -> Self {
        Self {
            version: Self::VERSION_BIFF8,
            substream_type,
            build: 0x10D3,
            build_year: 0x07CC,
            history_flags: 0x0000_0041,
            required_version: 0x0000_0006,
        }
    }
}

impl BiffRecord for BofRecord {
    const SID: u16 = sid::RECORD_BOF;
    const NAME: &'static str = "BOF";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(Self::DATA_SIZE)?;
        Ok(Self {
            version: r.read_u16()?,
            substream_type: r.read_u16()?,
            build: r.read_u16()?,
            build_year: r.read_u16()?,
            history_flags: r.read_u32()?,
            required_version: r.read_u32()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.version);
        out.write_u16(self.substream_type);
        out.write_u16(self.build);
        out.write_u16(self.build_year);
        out.write_u32(self.history_flags);
        out.write_u32(self.required_version);
    }

    fn data_size(&self) -> usize {
        Self::DATA_SIZE
    }
}

/// EOF: end of a substream. Empty payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EofRecord;

impl BiffRecord for EofRecord {
    const SID: u16 = sid::RECORD_EOF;
    const NAME: &'static str = "EOF";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        input.fixed::<Self>(0)?;
        Ok(Self)
    }

    fn encode(&self, _out: &mut LeWriter) {}

    fn data_size(&self) -> usize {
        0
    }
}

/// Records whose whole payload is a single 16-bit field.
macro_rules! u16_record {
    ($(#[$meta:meta])* $name:ident { $field:ident: $ty:ty }, $sid:expr, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
        pub struct $name {
            pub $field: $ty,
        }

        impl BiffRecord for $name {
            const SID: u16 = $sid;
            const NAME: &'static str = $label;

            fn decode(input: &RecordInput<'_>) -> Result<Self> {
                let mut r = input.fixed::<Self>(2)?;
                Ok(Self {
                    $field: r.read_u16()? as $ty,
                })
            }

            fn encode(&self, out: &mut LeWriter) {
                out.write_u16(self.$field as u16);
            }

            fn data_size(&self) -> usize {
                2
            }
        }
    };
}

u16_record!(
    /// CODEPAGE: codepage of byte strings in the workbook (1200 = UTF-16).
    CodepageRecord { codepage: u16 },
    sid::RECORD_CODEPAGE,
    "CODEPAGE"
);
u16_record!(
    /// DATEMODE: 1 for the 1904 date system.
    DateModeRecord { mode: u16 },
    sid::RECORD_DATEMODE,
    "DATEMODE"
);
u16_record!(
    /// CALCCOUNT: iteration limit for circular references.
    CalcCountRecord { iterations: u16 },
    sid::RECORD_CALCCOUNT,
    "CALCCOUNT"
);
u16_record!(
    /// CALCMODE: -1 automatic except tables, 0 manual, 1 automatic.
    CalcModeRecord { mode: i16 },
    sid::RECORD_CALCMODE,
    "CALCMODE"
);
u16_record!(
    /// PROTECT: 1 if the sheet or workbook structure is protected.
    ProtectRecord { protect: u16 },
    sid::RECORD_PROTECT,
    "PROTECT"
);
u16_record!(
    /// INTERFACEHDR: codepage of the user interface that saved the file.
    InterfaceHdrRecord { codepage: u16 },
    sid::RECORD_INTERFACEHDR,
    "INTERFACEHDR"
);

impl DateModeRecord {
    pub fn is_1904(&self) -> bool {
        self.mode == 1
    }
}

impl ProtectRecord {
    pub fn is_protected(&self) -> bool {
        self.protect != 0
    }
}

/// COUNTRY: country codes of the user interface and of the system regional settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountryRecord {
    pub default_country: u16,
    pub current_country: u16,
}

impl BiffRecord for CountryRecord {
    const SID: u16 = sid::RECORD_COUNTRY;
    const NAME: &'static str = "COUNTRY";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(4)?;
        Ok(Self {
            default_country: r.read_u16()?,
            current_country: r.read_u16()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_u16(self.default_country);
        out.write_u16(self.current_country);
    }

    fn data_size(&self) -> usize {
        4
    }
}

/// WINDOW1: workbook window position, size and tab bar state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window1Record {
    pub h_pos: i16,
    pub v_pos: i16,
    pub width: u16,
    pub height: u16,
    pub options: u16,
    pub active_sheet: u16,
    pub first_visible_tab: u16,
    pub selected_tab_count: u16,
    pub tab_width_ratio: u16,
}

impl Window1Record {
    pub const HIDDEN: BitField = BitField::new(0x0001);
    pub const ICONIC: BitField = BitField::new(0x0002);
    pub const RESERVED: BitField = BitField::new(0x0004);
    pub const DISPLAY_HSCROLL: BitField = BitField::new(0x0008);
    pub const DISPLAY_VSCROLL: BitField = BitField::new(0x0010);
    pub const DISPLAY_TABS: BitField = BitField::new(0x0020);

    pub const FIELDS: &'static [BitField] = &[
        Self::HIDDEN,
        Self::ICONIC,
        Self::RESERVED,
        Self::DISPLAY_HSCROLL,
        Self::DISPLAY_VSCROLL,
        Self::DISPLAY_TABS,
    ];

    flag_accessors! { options: u16;
        is_hidden, set_hidden => Self::HIDDEN;
        is_iconic, set_iconic => Self::ICONIC;
        display_hscroll, set_display_hscroll => Self::DISPLAY_HSCROLL;
        display_vscroll, set_display_vscroll => Self::DISPLAY_VSCROLL;
        display_tabs, set_display_tabs => Self::DISPLAY_TABS;
    }
}

impl Default for Window1Record {
    fn default() -> Self {
        Self {
            h_pos: 0x0168,
            v_pos: 0x001E,
            width: 0x3A5C,
            height: 0x23BE,
            options: 0x0038,
            active_sheet: 0,
            first_visible_tab: 0,
            selected_tab_count: 1,
            tab_width_ratio: 0x0258,
        }
    }
}

impl BiffRecord for Window1Record {
    const SID: u16 = sid::RECORD_WINDOW1;
    const NAME: &'static str = "WINDOW1";

    fn decode(input: &RecordInput<'_>) -> Result<Self> {
        let mut r = input.fixed::<Self>(18)?;
        Ok(Self {
            h_pos: r.read_i16()?,
            v_pos: r.read_i16()?,
            width: r.read_u16()?,
            height: r.read_u16()?,
            options: r.read_u16()?,
            active_sheet: r.read_u16()?,
            first_visible_tab: r.read_u16()?,
            selected_tab_count: r.read_u16()?,
            tab_width_ratio: r.read_u16()?,
        })
    }

    fn encode(&self, out: &mut LeWriter) {
        out.write_i16(self.h_pos);
        out.write_i16(self.v_pos);
        out.write_u16(self.width);
        out.write_u16(self.height);
        out.write_u16(self.options);
        out.write_u16(self.active_sheet);
        out.write_u16(self.first_visible_tab);
        out.write_u16(self.selected_tab_count);
        out.write_u16(self.tab_width_ratio);
    }

    fn data_size(&self) -> usize {
        18
    }
}
