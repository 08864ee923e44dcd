//! Whole-stream decode and encode.

use std::io::Write;

use formula_binio::{ByteSource, LeReader};

use crate::framing::{default_allows_continuation, FramingLimits, RecordReader, RecordWriter};
use crate::record::RecordInput;
use crate::records::UnknownRecord;
use crate::registry::{decode_frame, Record};
use crate::sid::{is_bof_record, RECORD_EOF};
use crate::Result;

/// What to do when a known record's payload fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Return the error and stop.
    #[default]
    Strict,
    /// Keep the record as [`Record::Unknown`] and log a warning. Framing errors still stop the
    /// stream.
    Degrade,
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    pub policy: DecodePolicy,
    /// Stop after the first `EOF` record instead of reading to the end of the stream.
    ///
    /// Off by default: a workbook stream holds one substream per sheet, each ending in `EOF`.
    pub stop_at_eof: bool,
    /// Whether `CONTINUE` frames after a record with the given sid are joined to it.
    pub allows_continuation: fn(u16) -> bool,
    pub limits: FramingLimits,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            policy: DecodePolicy::Strict,
            stop_at_eof: false,
            allows_continuation: default_allows_continuation,
            limits: FramingLimits::default(),
        }
    }
}

/// Lazy forward-only decoder yielding one [`Record`] per logical record.
///
/// The iterator ends at the end of the stream, after `EOF` when
/// [`DecodeOptions::stop_at_eof`] is set, or right after yielding an error.
pub struct RecordStreamDecoder<S> {
    reader: RecordReader<S>,
    policy: DecodePolicy,
    stop_at_eof: bool,
    done: bool,
}

impl<S: ByteSource> RecordStreamDecoder<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, DecodeOptions::default())
    }

    pub fn with_options(source: S, options: DecodeOptions) -> Self {
        Self {
            reader: RecordReader::with_options(source, options.allows_continuation, options.limits),
            policy: options.policy,
            stop_at_eof: options.stop_at_eof,
            done: false,
        }
    }

    /// Stream offset of the header of the record most recently yielded.
    pub fn record_offset(&self) -> u64 {
        self.reader.record_offset()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let Some(frame) = self.reader.read_next_record()? else {
            return Ok(None);
        };
        match decode_frame(&frame) {
            Ok(record) => Ok(Some(record)),
            Err(err) if self.policy == DecodePolicy::Degrade && err.is_payload_error() => {
                log::warn!(
                    "keeping record 0x{:04X} at offset {} as raw bytes: {err}",
                    frame.sid,
                    self.reader.record_offset()
                );
                Ok(Some(Record::Unknown(UnknownRecord::from_input(
                    &RecordInput::from_frame(&frame),
                ))))
            }
            Err(err) => Err(err),
        }
    }
}

impl<S: ByteSource> Iterator for RecordStreamDecoder<S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => {
                if self.stop_at_eof && record.sid() == RECORD_EOF {
                    self.done = true;
                }
                Some(Ok(record))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Salvaging walk over the substream whose `BOF` sits at a given offset.
///
/// Payload errors are degraded to [`Record::Unknown`]. The walk ends after `EOF`, before the `BOF`
/// of the next substream when the `EOF` is missing, or quietly at the first framing error.
pub struct SubstreamRecords<'a> {
    decoder: RecordStreamDecoder<LeReader<'a>>,
    start: usize,
    started: bool,
    done: bool,
}

impl<'a> SubstreamRecords<'a> {
    pub fn new(stream: &'a [u8], start: usize) -> Result<Self> {
        let Some(rest) = stream.get(start..) else {
            return Err(formula_binio::Error::InvalidRange {
                offset: start,
                len: stream.len(),
            }
            .into());
        };
        let options = DecodeOptions {
            policy: DecodePolicy::Degrade,
            stop_at_eof: true,
            ..DecodeOptions::default()
        };
        Ok(Self {
            decoder: RecordStreamDecoder::with_options(LeReader::new(rest), options),
            start,
            started: false,
            done: false,
        })
    }

    /// Stream offset of the header of the record most recently read.
    pub fn record_offset(&self) -> u64 {
        self.start as u64 + self.decoder.record_offset()
    }
}

impl Iterator for SubstreamRecords<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let record = match self.decoder.next()? {
            Ok(record) => record,
            Err(err) => {
                log::warn!("substream at offset {} cut short: {err}", self.start);
                self.done = true;
                return None;
            }
        };
        if self.started && is_bof_record(record.sid()) {
            log::debug!(
                "substream at offset {} has no EOF, next BOF at offset {}",
                self.start,
                self.record_offset()
            );
            self.done = true;
            return None;
        }
        self.started = true;
        Some(record)
    }
}

/// Decode every record of an in-memory stream.
pub fn decode_record_stream(bytes: &[u8], options: DecodeOptions) -> Result<Vec<Record>> {
    RecordStreamDecoder::with_options(LeReader::new(bytes), options).collect()
}

/// Write `records` in order and return the sink.
pub fn encode_record_stream<'a, I, W>(records: I, out: W) -> Result<W>
where
    I: IntoIterator<Item = &'a Record>,
    W: Write,
{
    let mut writer = RecordWriter::new(out);
    for record in records {
        record.encode(&mut writer)?;
    }
    writer.flush()?;
    Ok(writer.into_inner())
}
