use std::io::{Read, Write};

use formula_binio::{get_u16, get_u32, limits, LeReader};
use serde::Serialize;

use crate::codepage::DEFAULT_CODEPAGE;
use crate::section::Section;
use crate::well_known::{DOCUMENT_SUMMARY_INFORMATION, SUMMARY_INFORMATION};
use crate::writer::PropertySetWriter;
use crate::{ClassId, Error, Result};

pub const BYTE_ORDER_ASSERTION: u16 = 0xFFFE;
pub const FORMAT_ASSERTION: u16 = 0;
pub const OS_WIN16: u16 = 0;
pub const OS_MACINTOSH: u16 = 1;
pub const OS_WIN32: u16 = 2;
/// Win32, OS version 4.10.
pub const DEFAULT_OS_VERSION: u32 = ((OS_WIN32 as u32) << 16) | 0x0A04;

/// Stream header: byte order, format, OS version, class id, section count.
pub(crate) const HEADER_LEN: usize = 28;
/// Section list entry: format id and stream offset.
pub(crate) const SECTION_ENTRY_LEN: usize = 20;

/// Property-set streams are small; anything larger than this is refused by [`PropertySet::read_from`].
const MAX_STREAM_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Codepage for narrow strings in sections without a codepage property.
    pub fallback_codepage: u16,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            fallback_codepage: DEFAULT_CODEPAGE,
        }
    }
}

/// A parsed or programmatically built property-set stream.
#[derive(Debug, Clone, Serialize)]
pub struct PropertySet {
    pub byte_order: u16,
    pub format: u16,
    pub os_version: u32,
    pub class_id: ClassId,
    sections: Vec<Section>,
}

impl Default for PropertySet {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertySet {
    /// An empty set with a Win32 header and no sections.
    pub fn new() -> Self {
        Self {
            byte_order: BYTE_ORDER_ASSERTION,
            format: FORMAT_ASSERTION,
            os_version: DEFAULT_OS_VERSION,
            class_id: ClassId::default(),
            sections: Vec::new(),
        }
    }

    /// An empty set with one empty section.
    pub fn with_section(format_id: ClassId) -> Self {
        let mut set = Self::new();
        set.sections.push(Section::new(format_id));
        set
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn sections_mut(&mut self) -> &mut [Section] {
        &mut self.sections
    }

    pub fn first_section(&self) -> Option<&Section> {
        self.sections.first()
    }

    pub fn first_section_mut(&mut self) -> Option<&mut Section> {
        self.sections.first_mut()
    }

    /// First section with the given format id.
    pub fn section(&self, format_id: &ClassId) -> Option<&Section> {
        self.sections.iter().find(|s| s.format_id() == *format_id)
    }

    pub fn section_mut(&mut self, format_id: &ClassId) -> Option<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.format_id() == *format_id)
    }

    pub fn add_section(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn remove_section(&mut self, index: usize) -> Option<Section> {
        (index < self.sections.len()).then(|| self.sections.remove(index))
    }

    /// OS kind from the high word of the OS version (`OS_WIN16`, `OS_MACINTOSH`, `OS_WIN32`).
    pub fn os_kind(&self) -> u16 {
        (self.os_version >> 16) as u16
    }

    pub fn is_summary_information(&self) -> bool {
        self.first_section()
            .is_some_and(|s| s.format_id().matches(&SUMMARY_INFORMATION))
    }

    pub fn is_document_summary_information(&self) -> bool {
        self.first_section()
            .is_some_and(|s| s.format_id().matches(&DOCUMENT_SUMMARY_INFORMATION))
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_with(bytes, &ParseOptions::default())
    }

    pub fn parse_with(bytes: &[u8], options: &ParseOptions) -> Result<Self> {
        let mut r = LeReader::new(bytes);
        let byte_order = r.read_u16()?;
        let format = r.read_u16()?;
        if byte_order != BYTE_ORDER_ASSERTION || format != FORMAT_ASSERTION {
            return Err(Error::NotPropertySet { byte_order, format });
        }
        let os_version = r.read_u32()?;
        let mut class_id = [0u8; 16];
        class_id.copy_from_slice(r.read_bytes(ClassId::LENGTH)?);
        let count = r.read_u32()? as usize;
        let table = r.read_bytes(count.saturating_mul(SECTION_ENTRY_LEN))?;

        let mut sections = Vec::with_capacity(count);
        for index in 0..count {
            let entry = &table[index * SECTION_ENTRY_LEN..(index + 1) * SECTION_ENTRY_LEN];
            let mut format_id = [0u8; 16];
            format_id.copy_from_slice(&entry[..16]);
            let offset = get_u32(entry, 16)?;
            if offset as usize >= bytes.len() {
                return Err(Error::InvalidSectionOffset {
                    index,
                    offset,
                    len: bytes.len(),
                });
            }
            sections.push(Section::parse(
                bytes,
                offset as usize,
                ClassId::from_bytes(format_id),
                options,
            )?);
        }

        Ok(Self {
            byte_order,
            format,
            os_version,
            class_id: ClassId::from_bytes(class_id),
            sections,
        })
    }

    /// Read a whole stream and parse it.
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        Self::read_from_with(reader, &ParseOptions::default())
    }

    pub fn read_from_with<R: Read>(reader: R, options: &ParseOptions) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .take(MAX_STREAM_LEN as u64 + 1)
            .read_to_end(&mut bytes)?;
        limits::check_length(bytes.len() as u64, MAX_STREAM_LEN)?;
        Self::parse_with(&bytes, options)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(PropertySetWriter::new(self)
            .assign_sections()?
            .compute_offsets()?
            .serialize()
            .into_bytes())
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        out.write_all(&self.to_bytes()?)?;
        Ok(())
    }
}

/// Header fields must match; sections compare by value regardless of their order.
impl PartialEq for PropertySet {
    fn eq(&self, other: &Self) -> bool {
        self.byte_order == other.byte_order
            && self.format == other.format
            && self.os_version == other.os_version
            && self.class_id == other.class_id
            && self.sections.len() == other.sections.len()
            && self.sections.iter().all(|s| other.sections.contains(s))
            && other.sections.iter().all(|s| self.sections.contains(s))
    }
}

/// Whether `bytes` starts with a readable property-set header.
pub fn is_property_set_stream(bytes: &[u8]) -> bool {
    let header_ok = matches!(
        (get_u16(bytes, 0), get_u16(bytes, 2)),
        (Ok(BYTE_ORDER_ASSERTION), Ok(FORMAT_ASSERTION))
    );
    header_ok
        && get_u32(bytes, HEADER_LEN - 4).is_ok_and(|count| {
            (count as usize)
                .checked_mul(SECTION_ENTRY_LEN)
                .and_then(|len| len.checked_add(HEADER_LEN))
                .is_some_and(|end| end <= bytes.len())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use pretty_assertions::assert_eq;

    fn sample() -> PropertySet {
        let mut set = PropertySet::with_section(SUMMARY_INFORMATION);
        let section = set.first_section_mut().unwrap();
        section.set_codepage(1252);
        section
            .set_property(2, Value::Lpstr("Quarterly".into()))
            .unwrap();
        section.set_property(14, Value::I4(3)).unwrap();
        set
    }

    #[test]
    fn header_layout() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0xFE, 0xFF, 0x00, 0x00]);
        assert_eq!(get_u32(&bytes, 4).unwrap(), DEFAULT_OS_VERSION);
        assert_eq!(get_u32(&bytes, 24).unwrap(), 1);
        assert_eq!(&bytes[28..44], SUMMARY_INFORMATION.as_bytes());
        assert_eq!(get_u32(&bytes, 44).unwrap(), 48);
        assert!(is_property_set_stream(&bytes));
    }

    #[test]
    fn detects_non_property_set_streams() {
        assert!(!is_property_set_stream(&[]));
        assert!(!is_property_set_stream(&[0xFE, 0xFF, 0, 0]));
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0] = 0xFF;
        assert!(!is_property_set_stream(&bytes));
        assert!(matches!(
            PropertySet::parse(&bytes),
            Err(Error::NotPropertySet { byte_order: 0xFFFF, format: 0 })
        ));
    }

    #[test]
    fn read_from_matches_parse() {
        let bytes = sample().to_bytes().unwrap();
        let set = PropertySet::read_from(std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(set, sample());
        assert!(set.is_summary_information());
        assert!(!set.is_document_summary_information());

        let mut out = Vec::new();
        set.write_to(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn section_offset_past_end_is_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[44..48].copy_from_slice(&0x1000u32.to_le_bytes());
        assert!(matches!(
            PropertySet::parse(&bytes),
            Err(Error::InvalidSectionOffset { index: 0, offset: 0x1000, .. })
        ));
    }

    #[test]
    fn codepage_must_be_a_short() {
        let mut bytes = sample().to_bytes().unwrap();
        // Section at 48: size, count 3, then (id, offset) pairs sorted by id; codepage is id 1.
        assert_eq!(get_u32(&bytes, 56).unwrap(), 1);
        let at = 48 + get_u32(&bytes, 60).unwrap() as usize;
        bytes[at] = 3;
        assert!(matches!(
            PropertySet::parse(&bytes),
            Err(Error::CodepageType { vt: 3 })
        ));
    }

    #[test]
    fn sections_compare_regardless_of_order() {
        let mut a = sample();
        a.add_section(Section::new(DOCUMENT_SUMMARY_INFORMATION));
        let mut b = PropertySet::with_section(DOCUMENT_SUMMARY_INFORMATION);
        b.add_section(sample().sections()[0].clone());
        assert_eq!(a, b);

        b.os_version = OS_MACINTOSH as u32;
        assert_ne!(a, b);
    }
}
