use std::io::{self, BufReader, Read};

use crate::{limits, Error, LeReader, Result};

/// Sequential byte source consumed by the record and property-set decoders.
///
/// The storage layer (usually a `cfb` stream) hands us one of these per named stream. Decoders
/// only ever move forward; the small [`ByteSource::peek`] window is enough to look at the next
/// record header before deciding whether it continues the current record.
pub trait ByteSource {
    /// Fill `buf` completely or fail with [`Error::UnexpectedEof`].
    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Fill as much of `buf` as the source can provide and return the number of bytes read.
    ///
    /// A short count is not an error. Decrypting readers can legitimately produce fewer bytes
    /// than asked for at the end of a stream.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Look at up to `n` upcoming bytes without consuming them (fewer at end of data).
    fn peek(&mut self, n: usize) -> Result<&[u8]>;

    /// Number of bytes consumed so far.
    fn position(&self) -> u64;

    fn is_eof(&mut self) -> Result<bool> {
        Ok(self.peek(1)?.is_empty())
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact_into(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact_into(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact_into(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read `len` bytes into a fresh buffer, refusing lengths above `max` before allocating.
    fn read_vec(&mut self, len: usize, max: usize) -> Result<Vec<u8>> {
        let len = limits::check_length(len as u64, max)?;
        let mut out = vec![0u8; len];
        self.read_exact_into(&mut out)?;
        Ok(out)
    }
}

impl ByteSource for LeReader<'_> {
    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.copy_from_slice(self.read_bytes(buf.len())?);
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let bytes = LeReader::read_available(self, buf.len());
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    fn peek(&mut self, n: usize) -> Result<&[u8]> {
        let start = self.position();
        let end = start.saturating_add(n).min(self.data().len());
        Ok(&self.data()[start..end])
    }

    fn position(&self) -> u64 {
        LeReader::position(self) as u64
    }
}

/// [`ByteSource`] over any [`Read`] implementation.
pub struct StreamSource<R: Read> {
    inner: BufReader<R>,
    lookahead: Vec<u8>,
    position: u64,
}

impl<R: Read> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            lookahead: Vec::new(),
            position: 0,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Read from the lookahead first, then the underlying reader, until `buf` is full or the
    /// reader reports end of data.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let from_lookahead = self.lookahead.len().min(buf.len());
        buf[..from_lookahead].copy_from_slice(&self.lookahead[..from_lookahead]);
        self.lookahead.drain(..from_lookahead);

        let mut filled = from_lookahead;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        self.position += filled as u64;
        Ok(filled)
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.position;
        let filled = self.fill(buf)?;
        if filled < buf.len() {
            return Err(Error::UnexpectedEof {
                offset,
                needed: buf.len(),
                available: filled,
            });
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.fill(buf)?)
    }

    fn peek(&mut self, n: usize) -> Result<&[u8]> {
        while self.lookahead.len() < n {
            let mut chunk = [0u8; 16];
            let want = (n - self.lookahead.len()).min(chunk.len());
            let read = match self.inner.read(&mut chunk[..want]) {
                Ok(read) => read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            if read == 0 {
                break;
            }
            self.lookahead.extend_from_slice(&chunk[..read]);
        }
        let end = n.min(self.lookahead.len());
        Ok(&self.lookahead[..end])
    }

    fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out at most one byte per call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match (self.0.split_first(), buf.first_mut()) {
                (Some((&b, rest)), Some(dst)) => {
                    *dst = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn stream_source_peek_does_not_consume() {
        let data = [0x3C, 0x00, 0x02, 0x00, 0xAA, 0xBB];
        let mut src = StreamSource::new(Trickle(&data));
        assert_eq!(src.peek(2).unwrap(), &[0x3C, 0x00]);
        assert_eq!(src.position(), 0);
        assert_eq!(src.read_u16().unwrap(), 0x003C);
        assert_eq!(src.read_u16().unwrap(), 2);
        assert_eq!(src.peek(8).unwrap(), &[0xAA, 0xBB]);
        assert_eq!(src.read_vec(2, 16).unwrap(), vec![0xAA, 0xBB]);
        assert!(src.is_eof().unwrap());
        assert_eq!(src.position(), 6);
    }

    #[test]
    fn stream_source_strict_and_tolerant_reads_differ() {
        let data = [1u8, 2, 3];
        let mut strict = StreamSource::new(&data[..]);
        let mut buf = [0u8; 4];
        assert!(matches!(
            strict.read_exact_into(&mut buf),
            Err(Error::UnexpectedEof {
                needed: 4,
                available: 3,
                ..
            })
        ));

        let mut tolerant = StreamSource::new(&data[..]);
        let mut buf = [0u8; 4];
        assert_eq!(tolerant.read_available(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }

    #[test]
    fn slice_source_matches_stream_source() {
        let data = [0x09, 0x08, 0x10, 0x00, 0xFF];
        let mut slice = LeReader::new(&data);
        let mut stream = StreamSource::new(&data[..]);
        assert_eq!(
            ByteSource::read_u16(&mut slice).unwrap(),
            ByteSource::read_u16(&mut stream).unwrap()
        );
        assert_eq!(slice.peek(3).unwrap(), stream.peek(3).unwrap());
        assert_eq!(ByteSource::position(&slice), ByteSource::position(&stream));
    }

    #[test]
    fn read_vec_rejects_oversized_length_before_reading() {
        let data = [0u8; 8];
        let mut src = StreamSource::new(&data[..]);
        assert!(matches!(
            src.read_vec(9, 8),
            Err(Error::AllocationTooLarge {
                requested: 9,
                max: 8
            })
        ));
        assert_eq!(src.position(), 0);
    }
}
