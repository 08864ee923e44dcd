use std::fmt;

use serde::{Serialize, Serializer};

/// A 16-byte class or format id, kept in stream byte order.
///
/// On disk the first three GUID fields are little-endian, so the bytes differ from the textual
/// `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` form, which [`fmt::Display`] produces.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId([u8; 16]);

impl ClassId {
    pub const LENGTH: usize = 16;

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build from the GUID fields as written in the textual form.
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        let a = data1.to_le_bytes();
        let b = data2.to_le_bytes();
        let c = data3.to_le_bytes();
        Self([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], data4[0], data4[1], data4[2],
            data4[3], data4[4], data4[5], data4[6], data4[7],
        ])
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 16]
    }

    /// The same id with its first three fields byte-swapped.
    ///
    /// Some writers store format ids in textual (big-endian) field order.
    pub fn inverted(&self) -> Self {
        let b = self.0;
        Self([
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15],
        ])
    }

    /// Equal as stored, or equal once one side is [`ClassId::inverted`].
    pub fn matches(&self, other: &ClassId) -> bool {
        self == other || self.inverted() == *other
    }

    /// Parse `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` (braces optional).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(text);
        let mut parts = text.split('-');
        let mut field = |len: usize| -> Option<u64> {
            let part = parts.next()?;
            if part.len() != len || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            u64::from_str_radix(part, 16).ok()
        };
        let data1 = field(8)? as u32;
        let data2 = field(4)? as u16;
        let data3 = field(4)? as u16;
        let clock = field(4)? as u16;
        let node = field(12)?;
        if parts.next().is_some() {
            return None;
        }

        let mut data4 = [0u8; 8];
        data4[..2].copy_from_slice(&clock.to_be_bytes());
        data4[2..].copy_from_slice(&node.to_be_bytes()[2..]);
        Some(Self::from_fields(data1, data2, data3, data4))
    }
}

impl From<[u8; 16]> for ClassId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{{{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9]
        )?;
        for byte in &b[10..] {
            write!(f, "{byte:02X}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({self})")
    }
}

impl Serialize for ClassId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
