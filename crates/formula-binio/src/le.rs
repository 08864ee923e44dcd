use crate::{limits, Error, Result};

/// Bounds-checked little-endian reader over a byte slice.
///
/// Reads advance an internal cursor. Every read either returns the full requested width or fails
/// with [`Error::UnexpectedEof`] without moving the cursor.
#[derive(Debug, Clone)]
pub struct LeReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> LeReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn set_position(&mut self, offset: usize) -> Result<()> {
        if offset > self.data.len() {
            return Err(Error::InvalidRange {
                offset,
                len: self.data.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn eof(&self, needed: usize) -> Error {
        Error::UnexpectedEof {
            offset: self.offset as u64,
            needed,
            available: self.remaining(),
        }
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Borrow the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(n).ok_or_else(|| self.eof(n))?;
        let out = self.data.get(self.offset..end).ok_or_else(|| self.eof(n))?;
        self.offset = end;
        Ok(out)
    }

    /// Copy the next `n` bytes into an owned buffer after checking `n` against `max`.
    pub fn read_vec(&mut self, n: usize, max: usize) -> Result<Vec<u8>> {
        let n = limits::check_length(n as u64, max)?;
        Ok(self.read_bytes(n)?.to_vec())
    }

    /// Borrow up to `n` bytes, returning fewer (possibly none) at the end of the data.
    ///
    /// Unlike [`LeReader::read_bytes`] this never fails. It is meant for decrypted payloads that can
    /// legitimately come up short; everything else should use the strict reads.
    pub fn read_available(&mut self, n: usize) -> &'a [u8] {
        let take = n.min(self.remaining());
        let out = &self.data[self.offset..self.offset + take];
        self.offset += take;
        out
    }

    pub fn read_remaining(&mut self) -> &'a [u8] {
        let out = &self.data[self.offset.min(self.data.len())..];
        self.offset = self.data.len();
        out
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_array().map(i16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Read `cch` UTF-16LE code units.
    ///
    /// Unpaired surrogates are replaced, matching how the rest of the importer treats malformed
    /// UTF-16 text.
    pub fn read_utf16(&mut self, cch: usize) -> Result<String> {
        let byte_len = cch.checked_mul(2).ok_or_else(|| self.eof(usize::MAX))?;
        let raw = self.read_bytes(byte_len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    /// Read a UTF-16LE string prefixed with a `u16` character count.
    pub fn read_prefixed_utf16(&mut self) -> Result<String> {
        let start = self.offset;
        let cch = self.read_u16()? as usize;
        self.read_utf16(cch).inspect_err(|_| self.offset = start)
    }

    /// Read `cch` "compressed" characters: UTF-16 code units with the high byte dropped.
    pub fn read_compressed(&mut self, cch: usize) -> Result<String> {
        Ok(self.read_bytes(cch)?.iter().copied().map(char::from).collect())
    }
}

/// Growable little-endian byte sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeWriter {
    buf: Vec<u8>,
}

impl LeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_bytes(&v.to_le_bytes());
    }

    /// Write the UTF-16LE code units of `s` without a length prefix.
    pub fn write_utf16(&mut self, s: &str) {
        for unit in s.encode_utf16() {
            self.write_u16(unit);
        }
    }

    /// Write `s` as a `u16` character count followed by UTF-16LE code units.
    ///
    /// Strings longer than `u16::MAX` code units are rejected rather than silently truncated so
    /// the prefix always matches the characters written.
    pub fn write_prefixed_utf16(&mut self, s: &str) -> Result<(), std::num::TryFromIntError> {
        let cch = u16::try_from(s.encode_utf16().count())?;
        self.write_u16(cch);
        self.write_utf16(s);
        Ok(())
    }

    /// Write `s` as "compressed" (high byte dropped) characters.
    ///
    /// Callers must check [`is_compressible`] first; characters above U+00FF are written as `?`.
    pub fn write_compressed(&mut self, s: &str) {
        for ch in s.chars() {
            let v = ch as u32;
            self.write_u8(if v <= 0xFF { v as u8 } else { b'?' });
        }
    }

    /// Overwrite a previously written `u16` at `pos` (used for back-patched lengths).
    pub fn set_u16_at(&mut self, pos: usize, v: u16) -> Result<()> {
        self.set_bytes_at(pos, &v.to_le_bytes())
    }

    /// Overwrite a previously written `u32` at `pos` (used for back-patched offsets).
    pub fn set_u32_at(&mut self, pos: usize, v: u32) -> Result<()> {
        self.set_bytes_at(pos, &v.to_le_bytes())
    }

    fn set_bytes_at(&mut self, pos: usize, bytes: &[u8]) -> Result<()> {
        let len = self.buf.len();
        let dst = pos
            .checked_add(bytes.len())
            .and_then(|end| self.buf.get_mut(pos..end))
            .ok_or(Error::InvalidRange { offset: pos, len })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }
}

/// Returns true when every character of `s` fits a "compressed" (8-bit) BIFF string.
pub fn is_compressible(s: &str) -> bool {
    s.chars().all(|ch| (ch as u32) <= 0xFF)
}

fn get_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    let bytes = offset
        .checked_add(N)
        .and_then(|end| data.get(offset..end))
        .ok_or(Error::UnexpectedEof {
            offset: offset as u64,
            needed: N,
            available: data.len().saturating_sub(offset),
        })?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Random-access read of a `u16` at `offset`.
pub fn get_u16(data: &[u8], offset: usize) -> Result<u16> {
    get_array(data, offset).map(u16::from_le_bytes)
}

pub fn get_i16(data: &[u8], offset: usize) -> Result<i16> {
    get_array(data, offset).map(i16::from_le_bytes)
}

pub fn get_u32(data: &[u8], offset: usize) -> Result<u32> {
    get_array(data, offset).map(u32::from_le_bytes)
}

pub fn get_i32(data: &[u8], offset: usize) -> Result<i32> {
    get_array(data, offset).map(i32::from_le_bytes)
}

pub fn get_u64(data: &[u8], offset: usize) -> Result<u64> {
    get_array(data, offset).map(u64::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_integers_least_significant_byte_first() {
        let data = [
            0x01, 0x02, // u16
            0x03, 0x04, 0x05, 0x06, // u32
            0xFE, 0xFF, // i16 = -2
            0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, // u64
        ];
        let mut r = LeReader::new(&data);
        assert_eq!(r.read_u16().unwrap(), 0x0201);
        assert_eq!(r.read_u32().unwrap(), 0x0605_0403);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_u64().unwrap(), 0x0E0D_0C0B_0A09_0807);
        assert!(r.is_empty());
    }

    #[test]
    fn strict_read_past_end_fails_without_advancing() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut r = LeReader::new(&data);
        r.read_u8().unwrap();
        let err = r.read_u32().unwrap_err();
        match err {
            Error::UnexpectedEof {
                offset,
                needed,
                available,
            } => {
                assert_eq!(offset, 1);
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
        assert_eq!(r.position(), 1);
        assert_eq!(r.read_u16().unwrap(), 0xCCBB);
    }

    #[test]
    fn tolerant_read_returns_short_slice() {
        let data = [1, 2, 3];
        let mut r = LeReader::new(&data);
        assert_eq!(r.read_available(8), &[1, 2, 3]);
        assert_eq!(r.read_available(8), &[] as &[u8]);
        assert!(r.read_bytes(1).is_err());
    }

    #[test]
    fn writer_and_reader_agree_on_floats() {
        let mut w = LeWriter::new();
        w.write_f64(-1234.5625);
        w.write_f32(0.5);
        w.write_i64(i64::MIN);
        let bytes = w.into_inner();
        assert_eq!(&bytes[..8], &(-1234.5625f64).to_le_bytes());

        let mut r = LeReader::new(&bytes);
        assert_eq!(r.read_f64().unwrap(), -1234.5625);
        assert_eq!(r.read_f32().unwrap(), 0.5);
        assert_eq!(r.read_i64().unwrap(), i64::MIN);
    }

    #[test]
    fn prefixed_utf16_string() {
        let mut w = LeWriter::new();
        w.write_prefixed_utf16("h\u{e9}llo \u{1F600}").unwrap();
        let bytes = w.into_inner();
        // 7 UTF-16 code units (the emoji is a surrogate pair).
        assert_eq!(&bytes[..2], &[7, 0]);

        let mut r = LeReader::new(&bytes);
        assert_eq!(r.read_prefixed_utf16().unwrap(), "h\u{e9}llo \u{1F600}");
    }

    #[test]
    fn truncated_prefixed_utf16_restores_cursor() {
        let bytes = [0x03, 0x00, b'a', 0x00];
        let mut r = LeReader::new(&bytes);
        assert!(r.read_prefixed_utf16().is_err());
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn compressed_strings_map_bytes_to_latin1() {
        let mut w = LeWriter::new();
        assert!(is_compressible("caf\u{e9}"));
        assert!(!is_compressible("\u{20AC}"));
        w.write_compressed("caf\u{e9}");
        let bytes = w.into_inner();
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(LeReader::new(&bytes).read_compressed(4).unwrap(), "caf\u{e9}");
    }

    #[test]
    fn back_patching_checks_bounds() {
        let mut w = LeWriter::new();
        w.write_u32(0);
        w.set_u32_at(0, 0xDEAD_BEEF).unwrap();
        assert_eq!(w.as_slice(), &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert!(w.set_u16_at(3, 1).is_err());
    }

    #[test]
    fn random_access_getters() {
        let data = [0x00, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        assert_eq!(get_u16(&data, 1).unwrap(), 0x1234);
        assert_eq!(get_u32(&data, 3).unwrap(), 0x1234_5678);
        assert!(get_u32(&data, 4).is_err());
        assert!(get_u16(&data, 100).is_err());
    }
}
