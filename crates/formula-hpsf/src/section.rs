use std::collections::BTreeMap;

use formula_binio::{get_u32, LeReader, LeWriter};
use serde::Serialize;

use crate::codepage::{self, CP_UTF16};
use crate::property_set::ParseOptions;
use crate::variant::{self, vt, Value};
use crate::well_known::{self, PID_CODEPAGE, PID_DICTIONARY};
use crate::{ClassId, Error, Result};

/// Bytes of the section header before the (id, offset) table.
pub(crate) const SECTION_HEADER_LEN: usize = 8;

/// One section of a property set: a format id plus its properties.
///
/// Properties are kept sorted by id. The dictionary (id 0) is held separately since it has no type
/// tag; the codepage (id 1) is an ordinary `VT_I2` property.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Section {
    format_id: ClassId,
    properties: BTreeMap<u32, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dictionary: Option<BTreeMap<u32, String>>,
}

impl Section {
    pub fn new(format_id: ClassId) -> Self {
        Self {
            format_id,
            properties: BTreeMap::new(),
            dictionary: None,
        }
    }

    pub fn format_id(&self) -> ClassId {
        self.format_id
    }

    pub fn set_format_id(&mut self, format_id: ClassId) {
        self.format_id = format_id;
    }

    /// Codepage from property 1, if present.
    pub fn codepage(&self) -> Option<u16> {
        match self.properties.get(&PID_CODEPAGE) {
            // Stored as a signed 16-bit value; 65001 shows up as -535.
            Some(Value::I2(cp)) => Some(*cp as u16),
            _ => None,
        }
    }

    pub fn set_codepage(&mut self, codepage: u16) {
        self.properties.insert(PID_CODEPAGE, Value::I2(codepage as i16));
    }

    /// The codepage narrow strings are encoded with: property 1, UTF-16 for a section with a
    /// dictionary, otherwise `fallback`.
    pub fn effective_codepage(&self, fallback: u16) -> u16 {
        match self.codepage() {
            Some(cp) => cp,
            None if self.dictionary.is_some() => CP_UTF16,
            None => fallback,
        }
    }

    pub fn property(&self, id: u32) -> Option<&Value> {
        self.properties.get(&id)
    }

    /// Properties in id order, excluding the dictionary.
    pub fn properties(&self) -> impl Iterator<Item = (u32, &Value)> + '_ {
        self.properties.iter().map(|(id, value)| (*id, value))
    }

    /// Insert or replace a property, returning the previous value.
    ///
    /// Id 0 is the dictionary; use [`Section::set_dictionary`] for it.
    pub fn set_property(&mut self, id: u32, value: Value) -> Result<Option<Value>> {
        if id == PID_DICTIONARY {
            return Err(Error::ReservedPropertyId);
        }
        Ok(self.properties.insert(id, value))
    }

    pub fn remove_property(&mut self, id: u32) -> Option<Value> {
        self.properties.remove(&id)
    }

    /// Number of properties written to the stream, the dictionary included.
    pub fn property_count(&self) -> usize {
        self.properties.len() + usize::from(self.dictionary.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.property_count() == 0
    }

    pub fn dictionary(&self) -> Option<&BTreeMap<u32, String>> {
        self.dictionary.as_ref()
    }

    /// Install a dictionary. Adds a UTF-16 codepage property if the section has none.
    pub fn set_dictionary(&mut self, dictionary: BTreeMap<u32, String>) {
        if self.codepage().is_none() {
            self.set_codepage(CP_UTF16);
        }
        self.dictionary = Some(dictionary);
    }

    pub fn remove_dictionary(&mut self) -> Option<BTreeMap<u32, String>> {
        self.dictionary.take()
    }

    /// Human-readable name for `id`: the dictionary entry, then the well-known name for this
    /// section's format id.
    pub fn property_name(&self, id: u32) -> Option<&str> {
        if let Some(name) = self.dictionary.as_ref().and_then(|d| d.get(&id)) {
            return Some(name.as_str());
        }
        well_known::property_name(&self.format_id, id)
    }

    /// Text of a string property.
    pub fn string(&self, id: u32) -> Option<&str> {
        self.property(id).and_then(Value::as_str)
    }

    /// Parse the section starting at `offset` in `stream`.
    pub(crate) fn parse(
        stream: &[u8],
        offset: usize,
        format_id: ClassId,
        options: &ParseOptions,
    ) -> Result<Section> {
        let available = stream.len().saturating_sub(offset);
        let mut header = LeReader::new(stream.get(offset..).unwrap_or_default());
        let declared = header.read_u32()? as usize;
        let count = header.read_u32()? as usize;
        let table = header.read_bytes(count.saturating_mul(8))?;

        let size = if declared > available {
            log::warn!(
                "property-set section at offset {offset} declares {declared} bytes, only {available} available"
            );
            available
        } else {
            declared
        };
        let body = &stream[offset..offset + size];

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let id = get_u32(table, i * 8)?;
            let prop_offset = get_u32(table, i * 8 + 4)?;
            if prop_offset as usize >= size {
                return Err(Error::InvalidPropertyOffset {
                    id,
                    offset: prop_offset,
                    section_size: size,
                });
            }
            entries.push((id, prop_offset as usize));
        }

        let mut section = Section::new(format_id);
        let codepage = match entries.iter().find(|(id, _)| *id == PID_CODEPAGE) {
            Some(&(_, at)) => {
                let mut r = LeReader::new(&body[at..]);
                let tag = r.read_u32()?;
                if tag != u32::from(vt::I2) {
                    return Err(Error::CodepageType { vt: tag });
                }
                r.read_u16()?
            }
            None if entries.iter().any(|(id, _)| *id == PID_DICTIONARY) => CP_UTF16,
            None => options.fallback_codepage,
        };

        // A value runs up to the next larger offset, or to the end of the section.
        let mut offsets: Vec<usize> = entries.iter().map(|(_, at)| *at).collect();
        offsets.sort_unstable();
        offsets.dedup();

        for (id, at) in entries {
            let end = offsets
                .get(offsets.partition_point(|&o| o <= at))
                .copied()
                .unwrap_or(size);
            let slice = &body[at..end];

            if id == PID_DICTIONARY {
                if section.dictionary.is_some() {
                    log::warn!("ignoring duplicate dictionary in section {format_id}");
                    continue;
                }
                section.dictionary = Some(read_dictionary(slice, codepage)?);
                continue;
            }
            if section.properties.contains_key(&id) {
                log::warn!("ignoring duplicate property {id} in section {format_id}");
                continue;
            }

            let mut r = LeReader::new(slice);
            let value = match variant::read_typed(&mut r, codepage)? {
                Some(value) => value,
                None => Value::Unsupported {
                    vt: get_u32(slice, 0)?,
                    data: slice[4..].to_vec(),
                },
            };
            section.properties.insert(id, value);
        }
        Ok(section)
    }
}

/// Sections compare by value: the codepage property is ignored, since it only affects how
/// strings are stored, and the dictionary is compared on its own.
impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.format_id == other.format_id
            && self.dictionary == other.dictionary
            && comparable_values(self).eq(comparable_values(other))
    }
}

fn comparable_values(section: &Section) -> impl Iterator<Item = (&u32, &Value)> + '_ {
    section
        .properties
        .iter()
        .filter(|(id, _)| **id != PID_CODEPAGE)
}

fn read_dictionary(slice: &[u8], codepage: u16) -> Result<BTreeMap<u32, String>> {
    let mut r = LeReader::new(slice);
    let count = r.read_u32()?;
    let width = codepage::unit_width(codepage);
    let mut out = BTreeMap::new();
    for _ in 0..count {
        let id = r.read_u32()?;
        let len = r.read_u32()? as usize;
        let bytes = r.read_bytes(len.saturating_mul(width))?;
        let name = codepage::decode(codepage, bytes);
        if width == 2 {
            let rem = r.position() % 4;
            if rem != 0 {
                r.read_available(4 - rem);
            }
        }
        out.insert(id, name.trim_end_matches('\0').to_string());
    }
    Ok(out)
}

/// Dictionary entries: id, length in code units including the terminator, then the name. UTF-16
/// entries are padded to 4 bytes; the dictionary as a whole always is.
pub(crate) fn write_dictionary(
    out: &mut LeWriter,
    dictionary: &BTreeMap<u32, String>,
    codepage: u16,
) -> Result<()> {
    let width = codepage::unit_width(codepage);
    out.write_u32(u32::try_from(dictionary.len()).map_err(|_| Error::TooLarge {
        what: "dictionary",
        len: dictionary.len(),
    })?);
    for (id, name) in dictionary {
        let mut bytes = codepage::encode(codepage, name)?;
        bytes.resize(bytes.len() + width, 0);
        let units = bytes.len() / width;
        out.write_u32(*id);
        out.write_u32(u32::try_from(units).map_err(|_| Error::TooLarge {
            what: "dictionary entry",
            len: units,
        })?);
        out.write_bytes(&bytes);
        if width == 2 {
            pad4(out);
        }
    }
    pad4(out);
    Ok(())
}

fn pad4(out: &mut LeWriter) {
    let rem = out.len() % 4;
    if rem != 0 {
        out.write_zeros(4 - rem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well_known::{PID_TITLE, SUMMARY_INFORMATION};
    use pretty_assertions::assert_eq;

    #[test]
    fn utf16_dictionary_layout() {
        let mut out = LeWriter::new();
        let dictionary = BTreeMap::from([(42, "Widget".to_string())]);
        write_dictionary(&mut out, &dictionary, CP_UTF16).unwrap();
        let bytes = out.into_inner();

        // count, id, 7 units, 14 bytes of name padded to 16.
        assert_eq!(bytes.len(), 4 + 8 + 16);
        assert_eq!(&bytes[..12], &[1, 0, 0, 0, 42, 0, 0, 0, 7, 0, 0, 0]);
        assert_eq!(read_dictionary(&bytes, CP_UTF16).unwrap(), dictionary);
    }

    #[test]
    fn narrow_dictionary_is_packed() {
        let mut out = LeWriter::new();
        let dictionary = BTreeMap::from([(2, "ab".to_string()), (3, "c".to_string())]);
        write_dictionary(&mut out, &dictionary, 1252).unwrap();
        let bytes = out.into_inner();
        // count, (2, 3, "ab\0"), (3, 2, "c\0"), padding
        assert_eq!(bytes.len(), 4 + 11 + 10 + 3);
        assert_eq!(read_dictionary(&bytes, 1252).unwrap(), dictionary);
    }

    #[test]
    fn names_resolve_through_dictionary_then_well_known_tables() {
        let mut section = Section::new(SUMMARY_INFORMATION);
        section
            .set_property(PID_TITLE, Value::Lpstr("Q3".into()))
            .unwrap();
        section.set_property(42, Value::I4(7)).unwrap();
        assert_eq!(section.property_name(PID_TITLE), Some("PIDSI_TITLE"));
        assert_eq!(section.property_name(42), None);

        section.set_dictionary(BTreeMap::from([(42, "Widget".to_string())]));
        assert_eq!(section.property_name(42), Some("Widget"));
        assert_eq!(section.codepage(), Some(CP_UTF16));
    }

    #[test]
    fn equality_ignores_codepage_and_insertion_order() {
        let mut a = Section::new(SUMMARY_INFORMATION);
        a.set_codepage(1252);
        a.set_property(2, Value::Lpstr("x".into())).unwrap();
        a.set_property(5, Value::I4(1)).unwrap();

        let mut b = Section::new(SUMMARY_INFORMATION);
        b.set_property(5, Value::I4(1)).unwrap();
        b.set_property(2, Value::Lpstr("x".into())).unwrap();
        b.set_codepage(65001);
        assert_eq!(a, b);

        b.set_dictionary(BTreeMap::from([(5, "n".to_string())]));
        assert_ne!(a, b);
    }

    #[test]
    fn dictionary_id_is_reserved() {
        let mut section = Section::default();
        assert!(matches!(
            section.set_property(PID_DICTIONARY, Value::Empty),
            Err(Error::ReservedPropertyId)
        ));
    }
}
