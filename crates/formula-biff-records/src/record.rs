//! The capability every typed record implements, and the payload view it decodes from.

use std::ops::{Deref, DerefMut};

use formula_binio::{limits, LeReader, LeWriter};

use crate::framing::RecordFrame;
use crate::{RecordError, Result};

/// BIFF8 string option flag: characters are UTF-16LE rather than compressed 8-bit.
pub const STR_FLAG_HIGH_BYTE: u8 = 0x01;
/// BIFF8 string option flag: extended (phonetic) data follows the runs.
pub const STR_FLAG_EXT: u8 = 0x04;
/// BIFF8 string option flag: formatting runs follow the characters.
pub const STR_FLAG_RICH_TEXT: u8 = 0x08;

/// A typed record with a fixed sid.
///
/// Implementations must reproduce their input exactly: for any payload `decode` accepts,
/// `encode` writes the same bytes and `data_size` returns their count.
pub trait BiffRecord: Sized {
    const SID: u16;
    const NAME: &'static str;

    fn decode(input: &RecordInput<'_>) -> Result<Self>;

    fn encode(&self, out: &mut LeWriter);

    /// Payload length `encode` will produce.
    fn data_size(&self) -> usize;

    fn to_payload(&self) -> Vec<u8> {
        let mut out = LeWriter::with_capacity(self.data_size());
        self.encode(&mut out);
        debug_assert_eq!(
            out.len(),
            self.data_size(),
            "{} wrote a payload that disagrees with data_size()",
            Self::NAME
        );
        out.into_inner()
    }

    /// Frame ready for [`crate::RecordWriter::write_frame`].
    ///
    /// The default leaves continuation splitting to the writer. Records whose continuation frames
    /// carry extra structure (continued strings) override this to pin their own split points.
    fn to_frame(&self) -> RecordFrame {
        RecordFrame::new(Self::SID, self.to_payload())
    }
}

/// Payload of one logical record, with the sizes of the physical fragments it was read from.
#[derive(Debug, Clone, Copy)]
pub struct RecordInput<'a> {
    sid: u16,
    data: &'a [u8],
    fragment_sizes: &'a [usize],
}

impl<'a> RecordInput<'a> {
    /// Payload read from a single physical frame.
    pub fn new(sid: u16, data: &'a [u8]) -> Self {
        Self {
            sid,
            data,
            fragment_sizes: &[],
        }
    }

    pub fn from_frame(frame: &'a RecordFrame) -> Self {
        Self {
            sid: frame.sid,
            data: &frame.data,
            fragment_sizes: &frame.fragment_sizes,
        }
    }

    pub fn sid(&self) -> u16 {
        self.sid
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn fragment_sizes(&self) -> &'a [usize] {
        self.fragment_sizes
    }

    pub fn reader(&self) -> BiffReader<'a> {
        let mut boundaries = Vec::new();
        let mut end = 0usize;
        if let Some((_, leading)) = self.fragment_sizes.split_last() {
            for size in leading {
                end = end.saturating_add(*size);
                boundaries.push(end);
            }
        }
        BiffReader {
            inner: LeReader::new(self.data),
            boundaries,
        }
    }

    /// Reader over a payload that must be exactly `expected` bytes long.
    pub(crate) fn fixed<R: BiffRecord>(&self, expected: usize) -> Result<BiffReader<'a>> {
        if self.data.len() != expected {
            return Err(shape_mismatch::<R>(expected, self.data.len()));
        }
        Ok(self.reader())
    }
}

pub(crate) fn shape_mismatch<R: BiffRecord>(expected: usize, actual: usize) -> RecordError {
    RecordError::ShapeMismatch {
        sid: R::SID,
        name: R::NAME,
        expected,
        actual,
    }
}

pub(crate) fn malformed<R: BiffRecord>(message: impl Into<String>) -> RecordError {
    RecordError::Malformed {
        sid: R::SID,
        name: R::NAME,
        message: message.into(),
    }
}

/// Little-endian reader over a logical payload that knows where the `CONTINUE` boundaries were.
///
/// Plain field reads ignore the boundaries. Character data does not: when a string runs into the
/// next fragment, that fragment starts with a fresh option-flags byte that selects the width of
/// the remaining characters.
pub struct BiffReader<'a> {
    inner: LeReader<'a>,
    /// Payload offsets at which the second and later fragments start.
    boundaries: Vec<usize>,
}

impl<'a> Deref for BiffReader<'a> {
    type Target = LeReader<'a>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for BiffReader<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<'a> BiffReader<'a> {
    /// Bytes left before the next fragment boundary (or the end of the payload).
    pub fn fragment_remaining(&self) -> usize {
        let pos = self.inner.position();
        match self.boundaries.iter().find(|&&b| b > pos) {
            Some(&b) => b - pos,
            None => self.inner.remaining(),
        }
    }

    fn at_boundary(&self) -> bool {
        self.boundaries.contains(&self.inner.position())
    }

    /// Read `cch` characters, starting compressed or UTF-16LE per `high_byte`.
    ///
    /// Unpaired surrogates become U+FFFD; use [`BiffReader::read_units`] to keep them.
    pub fn read_chars<R: BiffRecord>(&mut self, cch: usize, high_byte: bool) -> Result<String> {
        let units = self.read_units::<R>(cch, high_byte)?;
        Ok(String::from_utf16_lossy(&units))
    }

    /// Read `cch` characters as UTF-16 code units, widening compressed ones.
    pub fn read_units<R: BiffRecord>(&mut self, cch: usize, mut high_byte: bool) -> Result<Vec<u16>> {
        let mut units: Vec<u16> = Vec::with_capacity(limits::initial_capacity(cch));
        let mut remaining = cch;
        loop {
            let width = if high_byte { 2 } else { 1 };
            // Sitting on a boundary means the previous fragment is used up.
            let available = if self.at_boundary() {
                0
            } else {
                self.fragment_remaining()
            };
            let take = remaining.min(available / width);
            let bytes = self.inner.read_bytes(take * width)?;
            if high_byte {
                units.extend(
                    bytes
                        .chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
                );
            } else {
                units.extend(bytes.iter().map(|&b| u16::from(b)));
            }
            remaining -= take;
            if remaining == 0 {
                break;
            }

            if !self.at_boundary() {
                if self.fragment_remaining() == self.inner.remaining() {
                    // No further fragment: the payload simply ends too early.
                    return Err(formula_binio::Error::UnexpectedEof {
                        offset: self.inner.position() as u64,
                        needed: remaining * width,
                        available: self.inner.remaining(),
                    }
                    .into());
                }
                return Err(malformed::<R>(format!(
                    "odd byte left before CONTINUE boundary at offset {}",
                    self.inner.position()
                )));
            }
            high_byte = self.inner.read_u8()? & STR_FLAG_HIGH_BYTE != 0;
        }
        Ok(units)
    }

    /// Fail unless every byte of the payload has been consumed.
    pub fn finish<R: BiffRecord>(&self) -> Result<()> {
        match self.inner.remaining() {
            0 => Ok(()),
            n => Err(malformed::<R>(format!("{n} unexpected trailing bytes"))),
        }
    }
}
