//! Typed property values (`TypedPropertyValue`) and their on-disk encoding.
//!
//! Every value starts with a 32-bit type tag (only the low 16 bits are meaningful) and is padded
//! to a multiple of 4 bytes. Inside a vector, scalars narrower than 4 bytes are packed and only
//! the vector as a whole is padded; strings and blobs carry their own padding everywhere.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use formula_binio::{LeReader, LeWriter};
use serde::Serialize;

use crate::codepage;
use crate::{ClassId, Error, Result};

/// Variant type tags.
pub mod vt {
    pub const EMPTY: u16 = 0;
    pub const NULL: u16 = 1;
    pub const I2: u16 = 2;
    pub const I4: u16 = 3;
    pub const R4: u16 = 4;
    pub const R8: u16 = 5;
    pub const CY: u16 = 6;
    pub const DATE: u16 = 7;
    pub const ERROR: u16 = 10;
    pub const BOOL: u16 = 11;
    pub const VARIANT: u16 = 12;
    pub const I1: u16 = 16;
    pub const UI1: u16 = 17;
    pub const UI2: u16 = 18;
    pub const UI4: u16 = 19;
    pub const I8: u16 = 20;
    pub const UI8: u16 = 21;
    pub const INT: u16 = 22;
    pub const UINT: u16 = 23;
    pub const LPSTR: u16 = 30;
    pub const LPWSTR: u16 = 31;
    pub const FILETIME: u16 = 64;
    pub const BLOB: u16 = 65;
    pub const CF: u16 = 71;
    pub const CLSID: u16 = 72;
    pub const VECTOR: u16 = 0x1000;

    /// Mask selecting the element type of a vector tag.
    pub const TYPE_MASK: u16 = 0x0FFF;
}

/// 100ns ticks between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;
const MS_PER_DAY: i64 = 86_400_000;
/// Days from the OLE automation epoch to 9999-12-31.
const MAX_OLE_DAYS: f64 = 2_958_465.0;

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Empty,
    Null,
    I1(i8),
    I2(i16),
    I4(i32),
    I8(i64),
    UI1(u8),
    UI2(u16),
    UI4(u32),
    UI8(u64),
    Int(i32),
    UInt(u32),
    R4(f32),
    R8(f64),
    /// Currency, scaled by 10 000.
    Currency(i64),
    /// OLE automation date: days since 1899-12-30, local time.
    Date(f64),
    /// An `HRESULT`/`SCODE`.
    Error(u32),
    Bool(bool),
    /// Narrow string in the section codepage.
    Lpstr(String),
    Lpwstr(String),
    /// 100ns ticks since 1601-01-01 UTC (or a duration, for edit time).
    FileTime(u64),
    Blob(Vec<u8>),
    /// Clipboard data including its leading format field.
    ClipboardData(Vec<u8>),
    ClassId(ClassId),
    /// `VT_VECTOR | element_type`. With `element_type == VT_VARIANT` each item keeps its own type.
    Vector { element_type: u16, items: Vec<Value> },
    /// A type this crate does not interpret, kept as the bytes following the type tag.
    Unsupported { vt: u32, data: Vec<u8> },
}

impl Value {
    /// The type tag written before the value.
    pub fn vt(&self) -> u32 {
        let tag = match self {
            Value::Empty => vt::EMPTY,
            Value::Null => vt::NULL,
            Value::I1(_) => vt::I1,
            Value::I2(_) => vt::I2,
            Value::I4(_) => vt::I4,
            Value::I8(_) => vt::I8,
            Value::UI1(_) => vt::UI1,
            Value::UI2(_) => vt::UI2,
            Value::UI4(_) => vt::UI4,
            Value::UI8(_) => vt::UI8,
            Value::Int(_) => vt::INT,
            Value::UInt(_) => vt::UINT,
            Value::R4(_) => vt::R4,
            Value::R8(_) => vt::R8,
            Value::Currency(_) => vt::CY,
            Value::Date(_) => vt::DATE,
            Value::Error(_) => vt::ERROR,
            Value::Bool(_) => vt::BOOL,
            Value::Lpstr(_) => vt::LPSTR,
            Value::Lpwstr(_) => vt::LPWSTR,
            Value::FileTime(_) => vt::FILETIME,
            Value::Blob(_) => vt::BLOB,
            Value::ClipboardData(_) => vt::CF,
            Value::ClassId(_) => vt::CLSID,
            Value::Vector { element_type, .. } => vt::VECTOR | element_type,
            Value::Unsupported { vt, .. } => return *vt,
        };
        u32::from(tag)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Lpstr(s) | Value::Lpwstr(s) => Some(s),
            _ => None,
        }
    }

    /// Any integer-valued scalar widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        Some(match *self {
            Value::I1(v) => v.into(),
            Value::I2(v) => v.into(),
            Value::I4(v) | Value::Int(v) => v.into(),
            Value::I8(v) => v,
            Value::UI1(v) => v.into(),
            Value::UI2(v) => v.into(),
            Value::UI4(v) | Value::UInt(v) => v.into(),
            Value::UI8(v) => i64::try_from(v).ok()?,
            _ => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// A `VT_FILETIME` or `VT_DATE` value as a point in time in `tz`.
    pub fn as_datetime<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        match *self {
            Value::FileTime(ticks) => filetime_to_datetime(ticks, tz),
            Value::Date(days) => ole_date_to_datetime(days, tz),
            _ => None,
        }
    }
}

/// Convert FILETIME ticks (UTC) to a date-time in `tz`.
pub fn filetime_to_datetime<Tz: TimeZone>(ticks: u64, tz: &Tz) -> Option<DateTime<Tz>> {
    let ticks = i64::try_from(ticks).ok()?.checked_sub(FILETIME_UNIX_EPOCH)?;
    let secs = ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = (ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    Some(DateTime::<Utc>::from_timestamp(secs, nanos)?.with_timezone(tz))
}

/// Convert a date-time to FILETIME ticks. `None` before 1601.
pub fn datetime_to_filetime<Tz: TimeZone>(datetime: &DateTime<Tz>) -> Option<u64> {
    let ticks = datetime
        .timestamp()
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(i64::from(datetime.timestamp_subsec_nanos() / 100))?
        .checked_add(FILETIME_UNIX_EPOCH)?;
    u64::try_from(ticks).ok()
}

fn ole_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Interpret an OLE automation date as local time in `tz`.
///
/// Before the epoch the fractional part still counts forward from midnight, so `-1.25` is
/// 1899-12-29 06:00.
pub fn ole_date_to_datetime<Tz: TimeZone>(days: f64, tz: &Tz) -> Option<DateTime<Tz>> {
    if !days.is_finite() || days.abs() > MAX_OLE_DAYS {
        return None;
    }
    let whole = days.trunc();
    let frac_ms = ((days - whole).abs() * MS_PER_DAY as f64).round() as i64;
    let offset = TimeDelta::try_milliseconds((whole as i64) * MS_PER_DAY + frac_ms)?;
    let naive = ole_epoch()?.checked_add_signed(offset)?;
    tz.from_local_datetime(&naive).earliest()
}

/// The inverse of [`ole_date_to_datetime`], using the local wall-clock time of `datetime`.
pub fn datetime_to_ole_date<Tz: TimeZone>(datetime: &DateTime<Tz>) -> Option<f64> {
    let total_ms = (datetime.naive_local() - ole_epoch()?).num_milliseconds();
    let day = total_ms.div_euclid(MS_PER_DAY);
    let frac = total_ms.rem_euclid(MS_PER_DAY) as f64 / MS_PER_DAY as f64;
    Some(if day >= 0 {
        day as f64 + frac
    } else {
        day as f64 - frac
    })
}

fn align4(r: &mut LeReader<'_>) {
    let rem = r.position() % 4;
    if rem != 0 {
        // The last value of a section may omit its padding.
        r.read_available(4 - rem);
    }
}

fn pad4(out: &mut LeWriter) {
    let rem = out.len() % 4;
    if rem != 0 {
        out.write_zeros(4 - rem);
    }
}

fn trim_nuls(mut s: String) -> String {
    let len = s.trim_end_matches('\0').len();
    s.truncate(len);
    s
}

fn length_u32(what: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::TooLarge { what, len })
}

/// Read a type tag and the value that follows it, including padding.
///
/// Returns `Ok(None)` for a type tag this crate does not interpret; the caller decides whether
/// to keep the raw bytes.
pub(crate) fn read_typed(r: &mut LeReader<'_>, codepage: u16) -> Result<Option<Value>> {
    read_typed_in(r, codepage, false)
}

fn read_typed_in(r: &mut LeReader<'_>, codepage: u16, in_vector: bool) -> Result<Option<Value>> {
    let tag = r.read_u32()?;
    if tag > u32::from(u16::MAX) {
        return Ok(None);
    }
    read_value(r, tag as u16, codepage, in_vector, false)
}

fn read_value(
    r: &mut LeReader<'_>,
    tag: u16,
    codepage: u16,
    in_vector: bool,
    packed: bool,
) -> Result<Option<Value>> {
    if tag & vt::VECTOR != 0 {
        // Vectors do not nest, not even through VT_VARIANT elements.
        if in_vector {
            return Ok(None);
        }
        return read_vector(r, tag & vt::TYPE_MASK, codepage);
    }

    let value = match tag {
        vt::EMPTY => Value::Empty,
        vt::NULL => Value::Null,
        vt::I1 => Value::I1(r.read_i8()?),
        vt::UI1 => Value::UI1(r.read_u8()?),
        vt::I2 => Value::I2(r.read_i16()?),
        vt::UI2 => Value::UI2(r.read_u16()?),
        vt::BOOL => Value::Bool(r.read_u16()? != 0),
        vt::I4 => Value::I4(r.read_i32()?),
        vt::INT => Value::Int(r.read_i32()?),
        vt::UI4 => Value::UI4(r.read_u32()?),
        vt::UINT => Value::UInt(r.read_u32()?),
        vt::ERROR => Value::Error(r.read_u32()?),
        vt::R4 => Value::R4(r.read_f32()?),
        vt::R8 => Value::R8(r.read_f64()?),
        vt::CY => Value::Currency(r.read_i64()?),
        vt::DATE => Value::Date(r.read_f64()?),
        vt::I8 => Value::I8(r.read_i64()?),
        vt::UI8 => Value::UI8(r.read_u64()?),
        vt::FILETIME => Value::FileTime(r.read_u64()?),
        vt::CLSID => {
            let bytes = r.read_bytes(ClassId::LENGTH)?;
            let mut id = [0u8; 16];
            id.copy_from_slice(bytes);
            Value::ClassId(ClassId::from_bytes(id))
        }
        vt::LPSTR => {
            let size = r.read_u32()? as usize;
            let bytes = r.read_bytes(size)?;
            let text = trim_nuls(codepage::decode(codepage, bytes));
            align4(r);
            Value::Lpstr(text)
        }
        vt::LPWSTR => {
            let chars = r.read_u32()? as usize;
            let bytes = r.read_bytes(chars.saturating_mul(2))?;
            let text = trim_nuls(codepage::decode(codepage::CP_UTF16, bytes));
            align4(r);
            Value::Lpwstr(text)
        }
        vt::BLOB | vt::CF => {
            let size = r.read_u32()? as usize;
            let bytes = r.read_bytes(size)?.to_vec();
            align4(r);
            if tag == vt::BLOB {
                Value::Blob(bytes)
            } else {
                Value::ClipboardData(bytes)
            }
        }
        _ => return Ok(None),
    };
    if !packed {
        align4(r);
    }
    Ok(Some(value))
}

/// `Ok(None)` when any element has a type this crate does not interpret.
fn read_vector(r: &mut LeReader<'_>, element_type: u16, codepage: u16) -> Result<Option<Value>> {
    // Zero-width elements would let a corrupt count spin without consuming input.
    if matches!(element_type, vt::EMPTY | vt::NULL) {
        return Ok(None);
    }
    let count = r.read_u32()? as usize;
    // Every element occupies at least one byte, so the remaining input bounds the count.
    let mut items = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        let item = if element_type == vt::VARIANT {
            read_typed_in(r, codepage, true)?
        } else {
            read_value(r, element_type, codepage, true, true)?
        };
        let Some(item) = item else {
            return Ok(None);
        };
        items.push(item);
    }
    align4(r);
    Ok(Some(Value::Vector {
        element_type,
        items,
    }))
}

/// Write the type tag and value, padded to 4 bytes.
pub(crate) fn write_typed(out: &mut LeWriter, value: &Value, codepage: u16) -> Result<()> {
    out.write_u32(value.vt());
    write_value(out, value, codepage, false)
}

fn write_value(out: &mut LeWriter, value: &Value, codepage: u16, packed: bool) -> Result<()> {
    match value {
        Value::Empty | Value::Null => {}
        Value::I1(v) => out.write_i8(*v),
        Value::UI1(v) => out.write_u8(*v),
        Value::I2(v) => out.write_i16(*v),
        Value::UI2(v) => out.write_u16(*v),
        Value::Bool(v) => out.write_u16(if *v { 0xFFFF } else { 0 }),
        Value::I4(v) | Value::Int(v) => out.write_i32(*v),
        Value::UI4(v) | Value::UInt(v) | Value::Error(v) => out.write_u32(*v),
        Value::R4(v) => out.write_f32(*v),
        Value::R8(v) | Value::Date(v) => out.write_f64(*v),
        Value::Currency(v) | Value::I8(v) => out.write_i64(*v),
        Value::UI8(v) | Value::FileTime(v) => out.write_u64(*v),
        Value::ClassId(id) => out.write_bytes(id.as_bytes()),
        Value::Lpstr(text) => {
            let mut bytes = codepage::encode(codepage, text)?;
            bytes.resize(bytes.len() + codepage::unit_width(codepage), 0);
            out.write_u32(length_u32("string", bytes.len())?);
            out.write_bytes(&bytes);
            pad4(out);
        }
        Value::Lpwstr(text) => {
            let units: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
            out.write_u32(length_u32("string", units.len())?);
            for unit in units {
                out.write_u16(unit);
            }
            pad4(out);
        }
        Value::Blob(bytes) | Value::ClipboardData(bytes) => {
            out.write_u32(length_u32("blob", bytes.len())?);
            out.write_bytes(bytes);
            pad4(out);
        }
        Value::Vector {
            element_type,
            items,
        } => {
            if matches!(*element_type, vt::EMPTY | vt::NULL) {
                return Err(Error::UnsupportedVectorType { vt: *element_type });
            }
            out.write_u32(length_u32("vector", items.len())?);
            for item in items {
                if let Value::Vector { .. } = item {
                    return Err(Error::UnsupportedVectorType {
                        vt: item.vt() as u16,
                    });
                }
                if *element_type == vt::VARIANT {
                    write_typed(out, item, codepage)?;
                } else if item.vt() != u32::from(*element_type) {
                    return Err(Error::VectorElementType {
                        expected: *element_type,
                        found: item.vt(),
                    });
                } else {
                    write_value(out, item, codepage, true)?;
                }
            }
            pad4(out);
        }
        Value::Unsupported { data, .. } => out.write_bytes(data),
    }
    if !packed {
        pad4(out);
    }
    Ok(())
}
