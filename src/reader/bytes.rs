use crate::error::{Error, Result};
use crate::options::ByteOrder;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};

pub type GenericBufReader<'a> = BufReader<Box<dyn Read + Send + 'a>>;

// Reads of unknown-length streams grow their buffer in steps of this size, so a corrupt length
// field can never trigger a huge up-front allocation.
const UNBOUNDED_READ_STEP: u64 = 64 * 1024;

/// A forward-only, position-tracking cursor over a byte stream.
///
/// Positions are absolute: a reader created to replay from offset `n` reports `n` before the first
/// byte is consumed. When the total stream length is known, every declared length is checked
/// against what is left before anything is allocated.
pub struct ByteReader<'a> {
    reader: GenericBufReader<'a>,
    pos: u64,
    len: Option<u64>,
}

impl<'a> ByteReader<'a> {
    /// * `start` - The absolute offset of the first byte `reader` will yield
    /// * `len` - The total length of the underlying stream, if known
    pub fn new(reader: impl Read + Send + 'a, start: u64, len: Option<u64>) -> Self {
        Self {
            reader: BufReader::new(Box::new(reader) as Box<dyn Read + Send + 'a>),
            pos: start,
            len,
        }
    }

    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self::new(bytes, 0, Some(bytes.len() as u64))
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Number of bytes left in the stream, when its length is known.
    pub fn remaining(&self) -> Option<u64> {
        self.len.map(|l| l.saturating_sub(self.pos))
    }

    pub fn stream_len(&self) -> Option<u64> {
        self.len
    }

    fn io_error(&self, e: io::Error, what: &str) -> Error {
        match e.kind() {
            ErrorKind::UnexpectedEof => Error::format(self.pos, format!("truncated {what}")),
            _ => Error::Io(e),
        }
    }

    /// Fail with a format error if `n` bytes cannot possibly remain in the stream.
    pub fn check_available(&self, n: u64, what: &str) -> Result<()> {
        match self.remaining() {
            Some(left) if n > left => Err(Error::format(
                self.pos,
                format!("{what} declares {n} bytes but only {left} remain"),
            )),
            _ => Ok(()),
        }
    }

    /// Look at the next byte without consuming it. `None` at end of stream.
    pub fn peek_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        let b = self.peek_byte()?;
        if b.is_some() {
            self.reader.consume(1);
            self.pos += 1;
        }
        Ok(b)
    }

    pub fn at_eof(&mut self) -> Result<bool> {
        Ok(self.peek_byte()?.is_none())
    }

    pub fn read_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| self.io_error(e, what))?;
        self.pos += N as u64;
        Ok(buf)
    }

    pub fn read_u32(&mut self, order: ByteOrder, what: &str) -> Result<u32> {
        Ok(order.u32_from(self.read_array(what)?))
    }

    pub fn read_i32(&mut self, order: ByteOrder, what: &str) -> Result<i32> {
        Ok(order.i32_from(self.read_array(what)?))
    }

    pub fn read_u64(&mut self, order: ByteOrder, what: &str) -> Result<u64> {
        Ok(order.u64_from(self.read_array(what)?))
    }

    /// Read exactly `n` bytes.
    pub fn read_bytes(&mut self, n: u64, what: &str) -> Result<Vec<u8>> {
        self.check_available(n, what)?;

        let mut buf = Vec::new();
        if self.len.is_some() {
            buf.resize(n as usize, 0);
            self.reader
                .read_exact(&mut buf)
                .map_err(|e| self.io_error(e, what))?;
        } else {
            // grow incrementally: the declared length has not been validated
            while (buf.len() as u64) < n {
                let step = (n - buf.len() as u64).min(UNBOUNDED_READ_STEP);
                let got = (&mut self.reader)
                    .take(step)
                    .read_to_end(&mut buf)
                    .map_err(Error::Io)?;
                if got == 0 {
                    return Err(Error::format(
                        self.pos + buf.len() as u64,
                        format!("truncated {what}"),
                    ));
                }
            }
        }
        self.pos += n;
        Ok(buf)
    }

    /// Advance `n` bytes without keeping them.
    pub fn skip(&mut self, n: u64, what: &str) -> Result<()> {
        self.check_available(n, what)?;
        let copied = io::copy(&mut (&mut self.reader).take(n), &mut io::sink())?;
        self.pos += copied;
        if copied < n {
            return Err(Error::format(self.pos, format!("truncated {what}")));
        }
        Ok(())
    }

    /// Apply `f` to every chunk of bytes up to (not including) `delim`, consuming the delimiter.
    /// Returns the number of bytes consumed, or `None` when end of stream was hit first.
    pub fn apply_on_slice_until_byte<F>(&mut self, delim: u8, mut f: F) -> Result<Option<usize>>
    where
        F: FnMut(&[u8]),
    {
        let mut read = 0;
        loop {
            let (done, used) = {
                let available = match self.reader.fill_buf() {
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(Error::Io(e)),
                };

                match memchr::memchr(delim, available) {
                    Some(i) => {
                        f(&available[..i]);
                        (true, i + 1)
                    }
                    None => {
                        f(available);
                        (false, available.len())
                    }
                }
            };

            self.reader.consume(used);
            self.pos += used as u64;
            read += used;

            if done {
                return Ok(Some(read));
            } else if used == 0 {
                return Ok(None);
            }
        }
    }

    pub fn seek_until_byte(&mut self, delim: u8) -> Result<Option<usize>> {
        self.apply_on_slice_until_byte(delim, |_| ())
    }

    /// Read one line without its terminator (`\n` or `\r\n`).
    ///
    /// Returns `None` at end of stream. The second tuple element is `true` when the line was
    /// ended by end of stream rather than a newline.
    pub fn read_line(&mut self) -> Result<Option<(Vec<u8>, bool)>> {
        if self.at_eof()? {
            return Ok(None);
        }

        let mut line = Vec::new();
        let eof = self
            .apply_on_slice_until_byte(b'\n', |x| line.extend_from_slice(x))?
            .is_none();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some((line, eof)))
    }
}
