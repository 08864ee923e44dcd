//! The two property sets Office writes into every compound file, and their property ids.
//!
//! - `\u{5}SummaryInformation` ([`SUMMARY_INFORMATION`]): title, author, timestamps, counts.
//! - `\u{5}DocumentSummaryInformation` ([`DOCUMENT_SUMMARY_INFORMATION`]): company, manager and
//!   friends in its first section, plus an optional second section ([`USER_DEFINED_PROPERTIES`])
//!   holding custom properties named through its dictionary.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone};

use crate::codepage::CP_UTF16;
use crate::variant::{vt, Value};
use crate::{ClassId, PropertySet, Section};

pub const SUMMARY_INFORMATION_STREAM: &str = "\u{5}SummaryInformation";
pub const DOCUMENT_SUMMARY_INFORMATION_STREAM: &str = "\u{5}DocumentSummaryInformation";

/// `{F29F85E0-4FF9-1068-AB91-08002B27B3D9}`
pub const SUMMARY_INFORMATION: ClassId = ClassId::from_fields(
    0xF29F_85E0,
    0x4FF9,
    0x1068,
    [0xAB, 0x91, 0x08, 0x00, 0x2B, 0x27, 0xB3, 0xD9],
);
/// `{D5CDD502-2E9C-101B-9397-08002B2CF9AE}`
pub const DOCUMENT_SUMMARY_INFORMATION: ClassId = ClassId::from_fields(
    0xD5CD_D502,
    0x2E9C,
    0x101B,
    [0x93, 0x97, 0x08, 0x00, 0x2B, 0x2C, 0xF9, 0xAE],
);
/// `{D5CDD505-2E9C-101B-9397-08002B2CF9AE}`
pub const USER_DEFINED_PROPERTIES: ClassId = ClassId::from_fields(
    0xD5CD_D505,
    0x2E9C,
    0x101B,
    [0x93, 0x97, 0x08, 0x00, 0x2B, 0x2C, 0xF9, 0xAE],
);

pub const PID_DICTIONARY: u32 = 0;
pub const PID_CODEPAGE: u32 = 1;
pub const PID_LOCALE: u32 = 0x8000_0000;
pub const PID_BEHAVIOR: u32 = 0x8000_0003;

pub const PID_TITLE: u32 = 2;
pub const PID_SUBJECT: u32 = 3;
pub const PID_AUTHOR: u32 = 4;
pub const PID_KEYWORDS: u32 = 5;
pub const PID_COMMENTS: u32 = 6;
pub const PID_TEMPLATE: u32 = 7;
pub const PID_LASTAUTHOR: u32 = 8;
pub const PID_REVNUMBER: u32 = 9;
pub const PID_EDITTIME: u32 = 10;
pub const PID_LASTPRINTED: u32 = 11;
pub const PID_CREATE_DTM: u32 = 12;
pub const PID_LASTSAVE_DTM: u32 = 13;
pub const PID_PAGECOUNT: u32 = 14;
pub const PID_WORDCOUNT: u32 = 15;
pub const PID_CHARCOUNT: u32 = 16;
pub const PID_THUMBNAIL: u32 = 17;
pub const PID_APPNAME: u32 = 18;
pub const PID_SECURITY: u32 = 19;

pub const PID_CATEGORY: u32 = 2;
pub const PID_PRESFORMAT: u32 = 3;
pub const PID_BYTECOUNT: u32 = 4;
pub const PID_LINECOUNT: u32 = 5;
pub const PID_PARCOUNT: u32 = 6;
pub const PID_SLIDECOUNT: u32 = 7;
pub const PID_NOTECOUNT: u32 = 8;
pub const PID_HIDDENCOUNT: u32 = 9;
pub const PID_MMCLIPCOUNT: u32 = 10;
pub const PID_SCALE: u32 = 11;
pub const PID_HEADINGPAIR: u32 = 12;
pub const PID_DOCPARTS: u32 = 13;
pub const PID_MANAGER: u32 = 14;
pub const PID_COMPANY: u32 = 15;
pub const PID_LINKSDIRTY: u32 = 16;

/// First id handed out to custom properties; 0 and 1 are reserved.
const FIRST_CUSTOM_PID: u32 = 2;

const COMMON_NAMES: &[(u32, &str)] = &[
    (PID_DICTIONARY, "PID_DICTIONARY"),
    (PID_CODEPAGE, "PID_CODEPAGE"),
    (PID_LOCALE, "PID_LOCALE"),
    (PID_BEHAVIOR, "PID_BEHAVIOR"),
];

const SUMMARY_INFORMATION_NAMES: &[(u32, &str)] = &[
    (2, "PIDSI_TITLE"),
    (3, "PIDSI_SUBJECT"),
    (4, "PIDSI_AUTHOR"),
    (5, "PIDSI_KEYWORDS"),
    (6, "PIDSI_COMMENTS"),
    (7, "PIDSI_TEMPLATE"),
    (8, "PIDSI_LASTAUTHOR"),
    (9, "PIDSI_REVNUMBER"),
    (10, "PIDSI_EDITTIME"),
    (11, "PIDSI_LASTPRINTED"),
    (12, "PIDSI_CREATE_DTM"),
    (13, "PIDSI_LASTSAVE_DTM"),
    (14, "PIDSI_PAGECOUNT"),
    (15, "PIDSI_WORDCOUNT"),
    (16, "PIDSI_CHARCOUNT"),
    (17, "PIDSI_THUMBNAIL"),
    (18, "PIDSI_APPNAME"),
    (19, "PIDSI_DOC_SECURITY"),
];

const DOCUMENT_SUMMARY_INFORMATION_NAMES: &[(u32, &str)] = &[
    (2, "PIDDSI_CATEGORY"),
    (3, "PIDDSI_PRESFORMAT"),
    (4, "PIDDSI_BYTECOUNT"),
    (5, "PIDDSI_LINECOUNT"),
    (6, "PIDDSI_PARCOUNT"),
    (7, "PIDDSI_SLIDECOUNT"),
    (8, "PIDDSI_NOTECOUNT"),
    (9, "PIDDSI_HIDDENCOUNT"),
    (10, "PIDDSI_MMCLIPCOUNT"),
    (11, "PIDDSI_SCALE"),
    (12, "PIDDSI_HEADINGPAIR"),
    (13, "PIDDSI_DOCPARTS"),
    (14, "PIDDSI_MANAGER"),
    (15, "PIDDSI_COMPANY"),
    (16, "PIDDSI_LINKSDIRTY"),
    (17, "PIDDSI_CCHWITHSPACES"),
    (19, "PIDDSI_SHAREDDOC"),
    (20, "PIDDSI_LINKBASE"),
    (21, "PIDDSI_HLINKS"),
    (22, "PIDDSI_HYPERLINKSCHANGED"),
    (23, "PIDDSI_VERSION"),
    (24, "PIDDSI_DIGSIG"),
    (26, "PIDDSI_CONTENTTYPE"),
    (27, "PIDDSI_CONTENTSTATUS"),
    (28, "PIDDSI_LANGUAGE"),
    (29, "PIDDSI_DOCVERSION"),
];

fn find_name(table: &[(u32, &'static str)], id: u32) -> Option<&'static str> {
    table
        .binary_search_by_key(&id, |(pid, _)| *pid)
        .ok()
        .map(|idx| table[idx].1)
}

/// Well-known name of property `id` in a section with `format_id`.
pub fn property_name(format_id: &ClassId, id: u32) -> Option<&'static str> {
    if let Some(name) = find_name(COMMON_NAMES, id) {
        return Some(name);
    }
    if format_id.matches(&SUMMARY_INFORMATION) {
        find_name(SUMMARY_INFORMATION_NAMES, id)
    } else if format_id.matches(&DOCUMENT_SUMMARY_INFORMATION) {
        find_name(DOCUMENT_SUMMARY_INFORMATION_NAMES, id)
    } else {
        None
    }
}

/// A property set with one empty `SummaryInformation` section.
pub fn new_summary_information() -> PropertySet {
    PropertySet::with_section(SUMMARY_INFORMATION)
}

/// A property set with one empty `DocumentSummaryInformation` section.
pub fn new_document_summary_information() -> PropertySet {
    PropertySet::with_section(DOCUMENT_SUMMARY_INFORMATION)
}

/// Read-only view of a `SummaryInformation` property set.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInformation<'a> {
    section: &'a Section,
}

impl<'a> SummaryInformation<'a> {
    /// `None` unless the first section is a `SummaryInformation` section.
    pub fn new(set: &'a PropertySet) -> Option<Self> {
        set.first_section()
            .filter(|s| s.format_id().matches(&SUMMARY_INFORMATION))
            .map(|section| Self { section })
    }

    pub fn section(&self) -> &'a Section {
        self.section
    }

    fn text(&self, id: u32) -> Option<&'a str> {
        self.section.string(id)
    }

    fn count(&self, id: u32) -> Option<i64> {
        self.section.property(id).and_then(Value::as_i64)
    }

    fn time<Tz: TimeZone>(&self, id: u32, tz: &Tz) -> Option<DateTime<Tz>> {
        self.section.property(id)?.as_datetime(tz)
    }

    pub fn title(&self) -> Option<&'a str> {
        self.text(PID_TITLE)
    }

    pub fn subject(&self) -> Option<&'a str> {
        self.text(PID_SUBJECT)
    }

    pub fn author(&self) -> Option<&'a str> {
        self.text(PID_AUTHOR)
    }

    pub fn keywords(&self) -> Option<&'a str> {
        self.text(PID_KEYWORDS)
    }

    pub fn comments(&self) -> Option<&'a str> {
        self.text(PID_COMMENTS)
    }

    pub fn template(&self) -> Option<&'a str> {
        self.text(PID_TEMPLATE)
    }

    pub fn last_author(&self) -> Option<&'a str> {
        self.text(PID_LASTAUTHOR)
    }

    pub fn revision_number(&self) -> Option<&'a str> {
        self.text(PID_REVNUMBER)
    }

    pub fn application_name(&self) -> Option<&'a str> {
        self.text(PID_APPNAME)
    }

    /// Total editing time. Stored as a FILETIME holding a duration rather than a date.
    pub fn edit_time(&self) -> Option<Duration> {
        match self.section.property(PID_EDITTIME)? {
            Value::FileTime(ticks) => Some(Duration::from_nanos(ticks.saturating_mul(100))),
            _ => None,
        }
    }

    pub fn last_printed<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.time(PID_LASTPRINTED, tz)
    }

    pub fn created<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.time(PID_CREATE_DTM, tz)
    }

    pub fn last_saved<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.time(PID_LASTSAVE_DTM, tz)
    }

    pub fn page_count(&self) -> Option<i64> {
        self.count(PID_PAGECOUNT)
    }

    pub fn word_count(&self) -> Option<i64> {
        self.count(PID_WORDCOUNT)
    }

    pub fn char_count(&self) -> Option<i64> {
        self.count(PID_CHARCOUNT)
    }

    pub fn security(&self) -> Option<i64> {
        self.count(PID_SECURITY)
    }

    /// Raw clipboard data of the thumbnail, format field included.
    pub fn thumbnail(&self) -> Option<&'a [u8]> {
        match self.section.property(PID_THUMBNAIL)? {
            Value::ClipboardData(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }
}

/// Read-only view of a `DocumentSummaryInformation` property set.
#[derive(Debug, Clone, Copy)]
pub struct DocumentSummaryInformation<'a> {
    section: &'a Section,
    custom: Option<&'a Section>,
}

impl<'a> DocumentSummaryInformation<'a> {
    pub fn new(set: &'a PropertySet) -> Option<Self> {
        let section = set
            .first_section()
            .filter(|s| s.format_id().matches(&DOCUMENT_SUMMARY_INFORMATION))?;
        let custom = set
            .sections()
            .iter()
            .skip(1)
            .find(|s| s.format_id().matches(&USER_DEFINED_PROPERTIES));
        Some(Self { section, custom })
    }

    pub fn section(&self) -> &'a Section {
        self.section
    }

    fn text(&self, id: u32) -> Option<&'a str> {
        self.section.string(id)
    }

    fn count(&self, id: u32) -> Option<i64> {
        self.section.property(id).and_then(Value::as_i64)
    }

    pub fn category(&self) -> Option<&'a str> {
        self.text(PID_CATEGORY)
    }

    pub fn presentation_format(&self) -> Option<&'a str> {
        self.text(PID_PRESFORMAT)
    }

    pub fn manager(&self) -> Option<&'a str> {
        self.text(PID_MANAGER)
    }

    pub fn company(&self) -> Option<&'a str> {
        self.text(PID_COMPANY)
    }

    pub fn byte_count(&self) -> Option<i64> {
        self.count(PID_BYTECOUNT)
    }

    pub fn line_count(&self) -> Option<i64> {
        self.count(PID_LINECOUNT)
    }

    pub fn paragraph_count(&self) -> Option<i64> {
        self.count(PID_PARCOUNT)
    }

    pub fn slide_count(&self) -> Option<i64> {
        self.count(PID_SLIDECOUNT)
    }

    pub fn note_count(&self) -> Option<i64> {
        self.count(PID_NOTECOUNT)
    }

    pub fn hidden_count(&self) -> Option<i64> {
        self.count(PID_HIDDENCOUNT)
    }

    pub fn mm_clip_count(&self) -> Option<i64> {
        self.count(PID_MMCLIPCOUNT)
    }

    pub fn scale(&self) -> Option<bool> {
        self.section.property(PID_SCALE).and_then(Value::as_bool)
    }

    pub fn links_dirty(&self) -> Option<bool> {
        self.section.property(PID_LINKSDIRTY).and_then(Value::as_bool)
    }

    /// Heading pairs: a `VT_VARIANT` vector alternating a heading and the number of document
    /// parts listed under it.
    pub fn heading_pairs(&self) -> Vec<(&'a str, i64)> {
        let Some(Value::Vector { items, .. }) = self.section.property(PID_HEADINGPAIR) else {
            return Vec::new();
        };
        items
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_str()?, pair[1].as_i64()?)))
            .collect()
    }

    /// Titles of the document parts (sheet names for a workbook).
    pub fn document_parts(&self) -> Vec<&'a str> {
        match self.section.property(PID_DOCPARTS) {
            Some(Value::Vector { items, .. }) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Custom properties by dictionary name, in id order. Properties without a name are skipped.
    pub fn custom_properties(&self) -> Vec<(&'a str, &'a Value)> {
        let Some(custom) = self.custom else {
            return Vec::new();
        };
        let Some(dictionary) = custom.dictionary() else {
            return Vec::new();
        };
        custom
            .properties()
            .filter_map(|(id, value)| Some((dictionary.get(&id)?.as_str(), value)))
            .collect()
    }

    pub fn custom_property(&self, name: &str) -> Option<&'a Value> {
        self.custom_properties()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

/// Set a named custom property in a `DocumentSummaryInformation` set, adding the user-defined
/// section if needed. Returns the property id used.
///
/// An existing property with the same name is replaced in place.
pub fn set_custom_property(set: &mut PropertySet, name: &str, value: Value) -> crate::Result<u32> {
    let existing = set
        .sections()
        .iter()
        .position(|s| s.format_id() == USER_DEFINED_PROPERTIES);
    let index = match existing {
        Some(index) => index,
        None => {
            if set.sections().is_empty() {
                set.add_section(Section::new(DOCUMENT_SUMMARY_INFORMATION));
            }
            let mut custom = Section::new(USER_DEFINED_PROPERTIES);
            custom.set_codepage(CP_UTF16);
            set.add_section(custom);
            set.sections().len() - 1
        }
    };
    let custom = &mut set.sections_mut()[index];

    let mut dictionary = custom.dictionary().cloned().unwrap_or_default();
    let existing_id = dictionary
        .iter()
        .find(|(_, n)| n.as_str() == name)
        .map(|(id, _)| *id);
    let id = match existing_id {
        Some(id) => id,
        None => {
            let used = dictionary
                .keys()
                .copied()
                .chain(custom.properties().map(|(id, _)| id))
                .filter(|id| *id < PID_LOCALE)
                .max()
                .unwrap_or(0);
            let id = used.max(FIRST_CUSTOM_PID - 1) + 1;
            dictionary.insert(id, name.to_string());
            id
        }
    };
    custom.set_dictionary(dictionary);
    custom.set_property(id, value)?;
    Ok(id)
}

/// The `VT_VARIANT` vector Office writes for heading pairs.
pub fn heading_pairs_value(pairs: &[(&str, i32)]) -> Value {
    Value::Vector {
        element_type: vt::VARIANT,
        items: pairs
            .iter()
            .flat_map(|(heading, count)| [Value::Lpstr(heading.to_string()), Value::I4(*count)])
            .collect(),
    }
}

/// Dictionary with the given names, keyed from the first custom id upwards.
pub fn dictionary_from_names<'n>(names: impl IntoIterator<Item = &'n str>) -> BTreeMap<u32, String> {
    (FIRST_CUSTOM_PID..)
        .zip(names)
        .map(|(id, name)| (id, name.to_string()))
        .collect()
}
