//! FASTA and FASTQ text records. Sequences may wrap over several lines in both; a FASTQ quality
//! block ends once it is as long as the sequence, so quality lines starting with `@` are fine.

use super::bytes::ByteReader;
use super::{FieldSink, RecordDecoder};
use crate::error::{Error, Result};
use crate::record::{Field, RecordHeader};

/// Phred+33
pub const QUALITY_OFFSET: u8 = 33;

/// Skip blank lines, then read a `marker`-prefixed header line. `None` at end of stream.
fn read_header_line(bytes: &mut ByteReader, marker: u8) -> Result<Option<RecordHeader>> {
    while let Some(b'\n' | b'\r') = bytes.peek_byte()? {
        bytes.next_byte()?;
    }

    let offset = bytes.position();
    let Some((line, _)) = bytes.read_line()? else {
        return Ok(None);
    };

    if line.first() != Some(&marker) {
        return Err(Error::format(
            offset,
            format!(
                "expected a record starting with `{}`, found `{}`",
                marker as char,
                line.iter().take(20).copied().collect::<Vec<_>>().escape_ascii()
            ),
        ));
    }

    let text = std::str::from_utf8(&line[1..])
        .map_err(|_| Error::format(offset, "header line is not valid UTF-8"))?;
    let (id, comment) = match text.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, Some(rest.trim())),
        None => (text, None),
    };
    if id.is_empty() {
        return Err(Error::format(offset, "record has an empty id"));
    }

    let mut header = RecordHeader::new(id.to_string(), offset);
    header.comment = comment.filter(|c| !c.is_empty()).map(str::to_string);
    Ok(Some(header))
}

/// Read sequence lines up to (not including) the next line starting with `stop`, or end of stream.
fn read_sequence(bytes: &mut ByteReader, stop: u8) -> Result<Vec<u8>> {
    let mut seq = Vec::new();
    loop {
        match bytes.peek_byte()? {
            None => break,
            Some(b) if b == stop => break,
            _ => (),
        }
        let Some((line, _)) = bytes.read_line()? else {
            break;
        };
        seq.extend_from_slice(&line);
    }
    Ok(seq)
}

#[derive(Default)]
pub(crate) struct FastaDecoder;

impl RecordDecoder for FastaDecoder {
    fn read_header(&mut self, bytes: &mut ByteReader) -> Result<Option<RecordHeader>> {
        read_header_line(bytes, b'>')
    }

    fn read_body(&mut self, bytes: &mut ByteReader, sink: &mut FieldSink) -> Result<()> {
        let seq = read_sequence(bytes, b'>')?;
        let _ = sink(Field::Bases(&seq));
        Ok(())
    }

    fn skip_body(&mut self, bytes: &mut ByteReader) -> Result<()> {
        loop {
            match bytes.peek_byte()? {
                None | Some(b'>') => return Ok(()),
                _ => {
                    bytes.seek_until_byte(b'\n')?;
                }
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct FastqDecoder {
    id: String,
}

impl FastqDecoder {
    /// Sequence and phred qualities of the current record.
    fn read_blocks(&self, bytes: &mut ByteReader) -> Result<(Vec<u8>, Vec<u8>)> {
        let at = |e: Error| e.with_record_id(&self.id);

        let seq = read_sequence(bytes, b'+').map_err(at)?;

        let separator = bytes.position();
        match bytes.read_line().map_err(at)? {
            Some((line, _)) if line.first() == Some(&b'+') => (),
            _ => {
                return Err(at(Error::format(
                    separator,
                    "expected a `+` line after the sequence",
                )))
            }
        }

        let mut qual = Vec::with_capacity(seq.len());
        while qual.len() < seq.len() {
            let start = bytes.position();
            let Some((line, _)) = bytes.read_line().map_err(at)? else {
                return Err(at(Error::format(
                    start,
                    format!("quality ends after {} of {} values", qual.len(), seq.len()),
                )));
            };
            for (i, &c) in line.iter().enumerate() {
                if c < QUALITY_OFFSET {
                    return Err(at(Error::format(
                        start + i as u64,
                        format!("invalid quality character {:#04x}", c),
                    )));
                }
                qual.push(c - QUALITY_OFFSET);
            }
        }

        if qual.len() != seq.len() {
            return Err(at(Error::format(
                bytes.position(),
                format!("{} bases but {} quality values", seq.len(), qual.len()),
            )));
        }
        Ok((seq, qual))
    }
}

impl RecordDecoder for FastqDecoder {
    fn read_header(&mut self, bytes: &mut ByteReader) -> Result<Option<RecordHeader>> {
        let header = read_header_line(bytes, b'@')?;
        if let Some(h) = &header {
            self.id.clone_from(&h.id);
        }
        Ok(header)
    }

    fn read_body(&mut self, bytes: &mut ByteReader, sink: &mut FieldSink) -> Result<()> {
        let (seq, qual) = self.read_blocks(bytes)?;
        if sink(Field::Bases(&seq)).is_continue() {
            let _ = sink(Field::Qualities(&qual));
        }
        Ok(())
    }

    fn skip_body(&mut self, bytes: &mut ByteReader) -> Result<()> {
        // quality lines can only be told apart from the next header by counting
        self.read_blocks(bytes).map(|_| ())
    }
}
