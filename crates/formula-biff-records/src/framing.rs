//! Physical record framing.
//!
//! A physical frame is `sid: u16, len: u16, payload[len]`. A logical record is one frame plus any
//! directly following `CONTINUE` frames, when the record type allows continuation. Readers return
//! logical records as a [`RecordFrame`]: the concatenated payload plus the size of every physical
//! fragment, so that decoders which care about fragment boundaries (continued strings) can find
//! them.

use std::io::Write;

use formula_binio::{limits, ByteSource};
use serde::Serialize;

use crate::sid::{is_bof_record, RECORD_CONTINUE, RECORD_DRAWING, RECORD_EOF};
use crate::{RecordError, Result};

/// Largest payload a single BIFF8 frame may carry: 8228 bytes per frame minus the 4-byte header.
pub const MAX_RECORD_DATA_SIZE: usize = 8224;

const HEADER_LEN: usize = 4;

const ENV_MAX_RECORD_FRAGMENTS: &str = "FORMULA_BIFF_MAX_RECORD_FRAGMENTS";

/// Default cap on physical frames (initial frame included) coalesced into one logical record.
pub const DEFAULT_MAX_RECORD_FRAGMENTS: usize = 4096;

/// Default cap on the size of a coalesced logical record.
pub const DEFAULT_MAX_LOGICAL_RECORD_BYTES: usize = 16 * 1024 * 1024;

/// Record families whose first `n` continuation segments repeat the primary sid instead of using
/// `CONTINUE`.
///
/// Excel writes oversized `DRAWING` payloads this way; readers that rebuild the Escher tree expect
/// it.
const CONTINUATION_SID_OVERRIDES: &[(u16, usize)] = &[(RECORD_DRAWING, 2)];

/// Sid to use for the `segment`-th continuation frame (1-based) of a record with `sid`.
pub fn continuation_sid(sid: u16, segment: usize) -> u16 {
    match CONTINUATION_SID_OVERRIDES.iter().find(|(s, _)| *s == sid) {
        Some((_, repeat)) if segment <= *repeat => sid,
        _ => RECORD_CONTINUE,
    }
}

/// Default continuation policy.
///
/// Drawing-layer records (`DRAWING`, `OBJ`, `TXO`, `MSODRAWINGSELECTION`) are followed by
/// `CONTINUE` frames that hold separate drawing objects rather than overflow bytes; those frames
/// are left as standalone `CONTINUE` records.
pub fn default_allows_continuation(sid: u16) -> bool {
    const OBJ: u16 = 0x005D;
    const TXO: u16 = 0x01B6;
    const MSODRAWINGSELECTION: u16 = 0x00ED;
    !matches!(
        sid,
        RECORD_CONTINUE | RECORD_EOF | RECORD_DRAWING | OBJ | TXO | MSODRAWINGSELECTION
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingLimits {
    pub max_logical_bytes: usize,
    pub max_fragments: usize,
}

impl Default for FramingLimits {
    /// Defaults, with the fragment cap overridable through `FORMULA_BIFF_MAX_RECORD_FRAGMENTS`.
    fn default() -> Self {
        let max_fragments = std::env::var(ENV_MAX_RECORD_FRAGMENTS)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_MAX_RECORD_FRAGMENTS);
        Self {
            max_logical_bytes: DEFAULT_MAX_LOGICAL_RECORD_BYTES,
            max_fragments,
        }
    }
}

/// A logical record: sid, coalesced payload and physical fragment sizes.
///
/// `fragment_sizes` is empty for frames built for writing whose split points are left to the
/// writer. Otherwise it lists the size of each physical frame in payload order and sums to
/// `data.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFrame {
    pub sid: u16,
    pub data: Vec<u8>,
    pub fragment_sizes: Vec<usize>,
}

impl RecordFrame {
    /// Frame whose payload the writer splits at [`MAX_RECORD_DATA_SIZE`].
    pub fn new(sid: u16, data: Vec<u8>) -> Self {
        Self {
            sid,
            data,
            fragment_sizes: Vec::new(),
        }
    }

    pub fn with_fragments(sid: u16, data: Vec<u8>, fragment_sizes: Vec<usize>) -> Self {
        Self {
            sid,
            data,
            fragment_sizes,
        }
    }

    pub fn is_continued(&self) -> bool {
        self.fragment_sizes.len() > 1
    }

    pub fn fragments(&self) -> FragmentIter<'_> {
        FragmentIter {
            data: &self.data,
            sizes: &self.fragment_sizes,
            idx: 0,
            offset: 0,
        }
    }
}

pub struct FragmentIter<'a> {
    data: &'a [u8],
    sizes: &'a [usize],
    idx: usize,
    offset: usize,
}

impl<'a> Iterator for FragmentIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let size = *self.sizes.get(self.idx)?;
        let start = self.offset;
        let end = start.checked_add(size)?;
        let out = self.data.get(start..end)?;
        self.idx += 1;
        self.offset = end;
        Some(out)
    }
}

/// Reads logical records from a [`ByteSource`], coalescing `CONTINUE` frames.
pub struct RecordReader<S> {
    source: S,
    allows_continuation: fn(u16) -> bool,
    limits: FramingLimits,
    record_offset: u64,
}

impl<S: ByteSource> RecordReader<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, default_allows_continuation, FramingLimits::default())
    }

    pub fn with_options(
        source: S,
        allows_continuation: fn(u16) -> bool,
        limits: FramingLimits,
    ) -> Self {
        Self {
            source,
            allows_continuation,
            limits,
            record_offset: 0,
        }
    }

    /// Stream offset of the header of the record most recently returned.
    pub fn record_offset(&self) -> u64 {
        self.record_offset
    }

    pub fn position(&self) -> u64 {
        self.source.position()
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Read the next logical record, or `None` at a clean end of stream.
    pub fn read_next_record(&mut self) -> Result<Option<RecordFrame>> {
        if self.source.is_eof()? {
            return Ok(None);
        }

        let offset = self.source.position();
        let (sid, len) = self.read_header()?;
        let mut data = Vec::with_capacity(len);
        self.read_payload(sid, offset, len, &mut data)?;
        let mut fragment_sizes = vec![len];

        if (self.allows_continuation)(sid) {
            while self.next_is_continue()? {
                if fragment_sizes.len() >= self.limits.max_fragments {
                    return Err(RecordError::TooManyFragments {
                        sid,
                        offset,
                        max: self.limits.max_fragments,
                    });
                }
                let frame_offset = self.source.position();
                let (_, len) = self.read_header()?;
                let total = data.len() as u64 + len as u64;
                limits::check_length(total, self.limits.max_logical_bytes)?;
                self.read_payload(RECORD_CONTINUE, frame_offset, len, &mut data)?;
                fragment_sizes.push(len);
            }
            if fragment_sizes.len() > 1 {
                log::debug!(
                    "coalesced record 0x{sid:04X} at offset {offset} from {} frames",
                    fragment_sizes.len()
                );
            }
        }

        self.record_offset = offset;
        Ok(Some(RecordFrame {
            sid,
            data,
            fragment_sizes,
        }))
    }

    fn read_header(&mut self) -> Result<(u16, usize)> {
        let offset = self.source.position();
        let mut header = [0u8; HEADER_LEN];
        if self.source.read_available(&mut header)? < HEADER_LEN {
            return Err(RecordError::TruncatedHeader { offset });
        }
        let sid = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;
        Ok((sid, len))
    }

    fn read_payload(&mut self, sid: u16, offset: u64, len: usize, data: &mut Vec<u8>) -> Result<()> {
        let len = limits::check_length(len as u64, u16::MAX as usize)?;
        let start = data.len();
        data.resize(start + len, 0);
        let available = self.source.read_available(&mut data[start..])?;
        if available < len {
            return Err(RecordError::TruncatedPayload {
                sid,
                offset,
                declared: len,
                available,
            });
        }
        Ok(())
    }

    fn next_is_continue(&mut self) -> Result<bool> {
        let next = self.source.peek(2)?;
        Ok(next.len() == 2 && u16::from_le_bytes([next[0], next[1]]) == RECORD_CONTINUE)
    }
}

/// Writes logical records as physical frames.
pub struct RecordWriter<W: Write> {
    inner: W,
    bytes_written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Write `payload` as one frame with `sid`, followed by continuation frames for anything past
    /// [`MAX_RECORD_DATA_SIZE`].
    pub fn write_record(&mut self, sid: u16, payload: &[u8]) -> Result<()> {
        let mut chunks = payload.chunks(MAX_RECORD_DATA_SIZE);
        let first = chunks.next().unwrap_or_default();
        self.write_raw_frame(sid, first)?;
        for (segment, chunk) in chunks.enumerate() {
            self.write_raw_frame(continuation_sid(sid, segment + 1), chunk)?;
        }
        Ok(())
    }

    /// Write a [`RecordFrame`], honouring its fragment sizes when it has them.
    pub fn write_frame(&mut self, frame: &RecordFrame) -> Result<()> {
        if frame.fragment_sizes.is_empty() {
            return self.write_record(frame.sid, &frame.data);
        }

        let sum: usize = frame.fragment_sizes.iter().sum();
        if sum != frame.data.len() {
            return Err(RecordError::FragmentLayout {
                sid: frame.sid,
                sum,
                len: frame.data.len(),
            });
        }
        for (segment, fragment) in frame.fragments().enumerate() {
            let sid = if segment == 0 {
                frame.sid
            } else {
                continuation_sid(frame.sid, segment)
            };
            self.write_raw_frame(sid, fragment)?;
        }
        Ok(())
    }

    /// Write exactly one physical frame.
    pub fn write_raw_frame(&mut self, sid: u16, payload: &[u8]) -> Result<()> {
        let len = u16::try_from(payload.len()).map_err(|_| RecordError::FrameTooLarge {
            sid,
            len: payload.len(),
        })?;
        self.inner.write_all(&sid.to_le_bytes())?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(payload)?;
        self.bytes_written += (HEADER_LEN + payload.len()) as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }
}

/// One physical frame borrowed from an in-memory stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalRecord<'a> {
    /// Offset of the frame header in the parent stream.
    pub offset: usize,
    pub sid: u16,
    pub data: &'a [u8],
}

/// Zero-copy iterator over physical frames of an in-memory stream.
///
/// A truncated header or payload yields an `Err` and terminates iteration.
pub struct PhysicalRecordIter<'a> {
    stream: &'a [u8],
    offset: usize,
}

impl<'a> PhysicalRecordIter<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        Self { stream, offset: 0 }
    }
}

impl<'a> Iterator for PhysicalRecordIter<'a> {
    type Item = Result<PhysicalRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.stream.len() {
            return None;
        }

        let offset = self.offset;
        // Any error ends iteration.
        self.offset = self.stream.len();

        let Some(header) = self.stream.get(offset..offset + HEADER_LEN) else {
            return Some(Err(RecordError::TruncatedHeader {
                offset: offset as u64,
            }));
        };
        let sid = u16::from_le_bytes([header[0], header[1]]);
        let len = u16::from_le_bytes([header[2], header[3]]) as usize;

        let data_start = offset + HEADER_LEN;
        let data_end = data_start + len;
        let Some(data) = self.stream.get(data_start..data_end) else {
            return Some(Err(RecordError::TruncatedPayload {
                sid,
                offset: offset as u64,
                declared: len,
                available: self.stream.len() - data_start,
            }));
        };

        self.offset = data_end;
        Some(Ok(PhysicalRecord { offset, sid, data }))
    }
}

/// Offsets of every substream (each starting at a `BOF` frame) in a workbook stream.
pub fn substream_offsets(stream: &[u8]) -> Vec<usize> {
    PhysicalRecordIter::new(stream)
        .map_while(|r| r.ok())
        .filter(|r| is_bof_record(r.sid))
        .map(|r| r.offset)
        .collect()
}
