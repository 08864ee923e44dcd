//! Property-set serialization as a sequence of typed stages.
//!
//! ```text
//! Empty --assign_sections--> SectionsAssigned --compute_offsets--> OffsetsComputed --serialize--> Serialized
//! ```
//!
//! Every property is encoded in the first stage, so encoding errors (a string the section
//! codepage cannot hold) surface before any offset is computed. Offsets are derived purely from
//! the encoded lengths, and the last stage only copies bytes.

use formula_binio::LeWriter;

use crate::codepage::{CP_UTF16, DEFAULT_CODEPAGE};
use crate::property_set::{PropertySet, HEADER_LEN, SECTION_ENTRY_LEN};
use crate::section::{write_dictionary, Section, SECTION_HEADER_LEN};
use crate::variant::{write_typed, Value};
use crate::well_known::{PID_CODEPAGE, PID_DICTIONARY};
use crate::{ClassId, Error, Result};

/// One property, encoded, in write order.
#[derive(Debug)]
struct EncodedProperty {
    id: u32,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct EncodedSection {
    format_id: ClassId,
    properties: Vec<EncodedProperty>,
}

#[derive(Debug)]
struct SectionLayout {
    section: EncodedSection,
    /// Stream offset of the section header.
    offset: u32,
    /// Offsets of each property, relative to the section start.
    property_offsets: Vec<u32>,
    size: u32,
}

pub struct Empty<'a> {
    set: &'a PropertySet,
}

pub struct SectionsAssigned<'a> {
    set: &'a PropertySet,
    sections: Vec<EncodedSection>,
}

pub struct OffsetsComputed<'a> {
    set: &'a PropertySet,
    layouts: Vec<SectionLayout>,
}

pub struct Serialized {
    bytes: Vec<u8>,
}

/// Serializer for one [`PropertySet`]; see the module docs for the stages.
pub struct PropertySetWriter<S> {
    state: S,
}

fn to_u32(what: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::TooLarge { what, len })
}

impl<'a> PropertySetWriter<Empty<'a>> {
    pub fn new(set: &'a PropertySet) -> Self {
        Self {
            state: Empty { set },
        }
    }

    /// Encode every property of every section.
    pub fn assign_sections(self) -> Result<PropertySetWriter<SectionsAssigned<'a>>> {
        let set = self.state.set;
        let sections = set
            .sections()
            .iter()
            .map(encode_section)
            .collect::<Result<Vec<_>>>()?;
        Ok(PropertySetWriter {
            state: SectionsAssigned { set, sections },
        })
    }
}

fn encode_section(section: &Section) -> Result<EncodedSection> {
    if let Some(value) = section.property(PID_CODEPAGE) {
        if !matches!(value, Value::I2(_)) {
            return Err(Error::CodepageType { vt: value.vt() });
        }
    }
    let codepage = section.effective_codepage(DEFAULT_CODEPAGE);
    let mut properties = Vec::with_capacity(section.property_count() + 1);

    if let Some(dictionary) = section.dictionary() {
        let mut out = LeWriter::new();
        write_dictionary(&mut out, dictionary, codepage)?;
        properties.push(EncodedProperty {
            id: PID_DICTIONARY,
            bytes: out.into_inner(),
        });
        // Readers need the codepage to decode the dictionary names.
        if section.codepage().is_none() {
            let mut out = LeWriter::new();
            write_typed(&mut out, &Value::I2(CP_UTF16 as i16), codepage)?;
            properties.push(EncodedProperty {
                id: PID_CODEPAGE,
                bytes: out.into_inner(),
            });
        }
    }

    for (id, value) in section.properties() {
        let mut out = LeWriter::new();
        write_typed(&mut out, value, codepage)?;
        properties.push(EncodedProperty {
            id,
            bytes: out.into_inner(),
        });
    }

    Ok(EncodedSection {
        format_id: section.format_id(),
        properties,
    })
}

impl<'a> PropertySetWriter<SectionsAssigned<'a>> {
    /// Lay out sections back to back after the header and properties back to back after each
    /// section's offset table.
    pub fn compute_offsets(self) -> Result<PropertySetWriter<OffsetsComputed<'a>>> {
        let SectionsAssigned { set, sections } = self.state;
        let mut next = HEADER_LEN + sections.len() * SECTION_ENTRY_LEN;

        let mut layouts = Vec::with_capacity(sections.len());
        for section in sections {
            let mut at = SECTION_HEADER_LEN + section.properties.len() * 8;
            let mut property_offsets = Vec::with_capacity(section.properties.len());
            for property in &section.properties {
                property_offsets.push(to_u32("property offset", at)?);
                at += property.bytes.len();
            }
            layouts.push(SectionLayout {
                offset: to_u32("section offset", next)?,
                size: to_u32("section size", at)?,
                property_offsets,
                section,
            });
            next += at;
        }
        to_u32("property set", next)?;

        Ok(PropertySetWriter {
            state: OffsetsComputed { set, layouts },
        })
    }
}

impl PropertySetWriter<OffsetsComputed<'_>> {
    /// Total length of the stream about to be written.
    pub fn stream_len(&self) -> usize {
        HEADER_LEN
            + self.state.layouts.len() * SECTION_ENTRY_LEN
            + self
                .state
                .layouts
                .iter()
                .map(|l| l.size as usize)
                .sum::<usize>()
    }

    pub fn serialize(self) -> PropertySetWriter<Serialized> {
        let capacity = self.stream_len();
        let OffsetsComputed { set, layouts } = self.state;
        let mut out = LeWriter::with_capacity(capacity);

        out.write_u16(set.byte_order);
        out.write_u16(set.format);
        out.write_u32(set.os_version);
        out.write_bytes(set.class_id.as_bytes());
        out.write_u32(layouts.len() as u32);
        for layout in &layouts {
            out.write_bytes(layout.section.format_id.as_bytes());
            out.write_u32(layout.offset);
        }

        for layout in &layouts {
            debug_assert_eq!(out.len(), layout.offset as usize);
            out.write_u32(layout.size);
            out.write_u32(layout.section.properties.len() as u32);
            for (property, offset) in layout
                .section
                .properties
                .iter()
                .zip(&layout.property_offsets)
            {
                out.write_u32(property.id);
                out.write_u32(*offset);
            }
            for property in &layout.section.properties {
                out.write_bytes(&property.bytes);
            }
        }

        PropertySetWriter {
            state: Serialized {
                bytes: out.into_inner(),
            },
        }
    }
}

impl PropertySetWriter<Serialized> {
    pub fn bytes(&self) -> &[u8] {
        &self.state.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.state.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well_known::SUMMARY_INFORMATION;
    use std::collections::BTreeMap;

    #[test]
    fn stages_agree_on_length() {
        let mut set = PropertySet::with_section(SUMMARY_INFORMATION);
        let section = set.first_section_mut().unwrap();
        section.set_property(2, Value::Lpwstr("abc".into())).unwrap();
        section.set_dictionary(BTreeMap::from([(2, "Title".to_string())]));

        let laid_out = PropertySetWriter::new(&set)
            .assign_sections()
            .unwrap()
            .compute_offsets()
            .unwrap();
        let expected = laid_out.stream_len();
        let written = laid_out.serialize();
        assert_eq!(written.bytes().len(), expected);
    }

    #[test]
    fn every_offset_span_holds_exactly_one_value() {
        use crate::variant::read_typed;
        use formula_binio::{get_u32, LeReader};

        let mut set = PropertySet::with_section(SUMMARY_INFORMATION);
        let section = set.first_section_mut().unwrap();
        section.set_codepage(65001);
        section.set_property(2, Value::Lpstr("Größe".into())).unwrap();
        section.set_property(3, Value::Bool(false)).unwrap();
        section.set_property(4, Value::Blob(vec![1, 2, 3])).unwrap();
        section.set_property(12, Value::FileTime(1)).unwrap();
        let bytes = set.to_bytes().unwrap();

        let start = get_u32(&bytes, HEADER_LEN + 16).unwrap() as usize;
        let size = get_u32(&bytes, start).unwrap() as usize;
        let count = get_u32(&bytes, start + 4).unwrap() as usize;
        let offsets: Vec<usize> = (0..count)
            .map(|i| get_u32(&bytes, start + 12 + i * 8).unwrap() as usize)
            .chain(std::iter::once(size))
            .collect();
        for span in offsets.windows(2) {
            let slice = &bytes[start + span[0]..start + span[1]];
            let mut r = LeReader::new(slice);
            assert!(read_typed(&mut r, 65001).unwrap().is_some());
            assert_eq!(r.remaining(), 0, "span {span:?} has trailing bytes");
        }
    }

    #[test]
    fn dictionary_without_codepage_gets_one() {
        let mut section = Section::new(SUMMARY_INFORMATION);
        section.set_dictionary(BTreeMap::from([(7, "x".to_string())]));
        section.remove_property(PID_CODEPAGE);

        let encoded = encode_section(&section).unwrap();
        let ids: Vec<u32> = encoded.properties.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PID_DICTIONARY, PID_CODEPAGE]);
    }

    #[test]
    fn encoding_errors_surface_before_layout() {
        let mut set = PropertySet::with_section(SUMMARY_INFORMATION);
        let section = set.first_section_mut().unwrap();
        section.set_codepage(1252);
        section.set_property(2, Value::Lpstr("日本".into())).unwrap();
        assert!(matches!(
            PropertySetWriter::new(&set).assign_sections(),
            Err(Error::Unrepresentable { codepage: 1252, .. })
        ));
    }
}
