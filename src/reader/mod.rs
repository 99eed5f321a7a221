//! Per-format record decoders driven by the push parser.
//!
//! A decoder splits every record into a header step and a body step, so that the parser can
//! capture a memento at the header and then either decode the body field by field or skip it.

pub mod bytes;
pub mod fastx;

use std::ops::ControlFlow;

use crate::codec::chromatogram::{self, Header, Section};
use crate::codec::{packed, twobit};
use crate::error::{Error, Result};
use crate::options::{ByteOrder, Format};
use crate::record::{Field, RecordHeader};
use bytes::ByteReader;

/// Receives the fields of a record body; `Break` stops decoding the body.
pub(crate) type FieldSink<'s> = dyn FnMut(Field<'_>) -> ControlFlow<()> + 's;

pub(crate) trait RecordDecoder: Send {
    /// Read the next record header, or `None` at a clean end of stream.
    fn read_header(&mut self, bytes: &mut ByteReader) -> Result<Option<RecordHeader>>;

    /// Decode the body of the record whose header was just read.
    fn read_body(&mut self, bytes: &mut ByteReader, sink: &mut FieldSink) -> Result<()>;

    /// Advance past the body of the record whose header was just read without decoding it.
    fn skip_body(&mut self, bytes: &mut ByteReader) -> Result<()>;
}

impl Format {
    /// A fresh decoder for one parse. `origin` names single-record formats' records.
    pub(crate) fn decoder(&self, origin: &str) -> Box<dyn RecordDecoder> {
        match *self {
            Format::Fasta => Box::new(fastx::FastaDecoder::default()),
            Format::Fastq => Box::new(fastx::FastqDecoder::default()),
            Format::Bfq { byte_order } => Box::new(PackedDecoder {
                order: byte_order,
                pending: 0,
            }),
            Format::Bfa { byte_order } => Box::new(ReferenceDecoder {
                order: byte_order,
                base_count: 0,
                word_count: 0,
            }),
            Format::Chromatogram { byte_order } => Box::new(ChromatogramDecoder {
                order: byte_order,
                id: record_name(origin),
                header: None,
                done: false,
            }),
        }
    }
}

/// File stem of `origin`, or `origin` itself when it has none.
fn record_name(origin: &str) -> String {
    std::path::Path::new(origin)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| origin.to_string())
}

struct PackedDecoder {
    order: ByteOrder,
    pending: u64,
}

impl RecordDecoder for PackedDecoder {
    fn read_header(&mut self, bytes: &mut ByteReader) -> Result<Option<RecordHeader>> {
        if bytes.at_eof()? {
            return Ok(None);
        }

        let offset = bytes.position();
        let name = packed::read_name(bytes, self.order)?;
        let count = packed::read_count(bytes, self.order, "base count", 1)
            .map_err(|e| e.with_record_id(&name))?;

        self.pending = count;
        let mut header = RecordHeader::new(name, offset);
        header.declared_len = Some(count);
        Ok(Some(header))
    }

    fn read_body(&mut self, bytes: &mut ByteReader, sink: &mut FieldSink) -> Result<()> {
        let raw = bytes.read_bytes(std::mem::take(&mut self.pending), "packed bases")?;

        let mut bases = Vec::new();
        let mut qualities = Vec::new();
        packed::unpack_into(&raw, &mut bases, &mut qualities);

        if sink(Field::Bases(&bases)).is_continue() {
            let _ = sink(Field::Qualities(&qualities));
        }
        Ok(())
    }

    fn skip_body(&mut self, bytes: &mut ByteReader) -> Result<()> {
        bytes.skip(std::mem::take(&mut self.pending), "packed bases")
    }
}

struct ReferenceDecoder {
    order: ByteOrder,
    base_count: u64,
    word_count: u64,
}

impl RecordDecoder for ReferenceDecoder {
    fn read_header(&mut self, bytes: &mut ByteReader) -> Result<Option<RecordHeader>> {
        if bytes.at_eof()? {
            return Ok(None);
        }

        let offset = bytes.position();
        let (name, base_count, word_count) = twobit::read_header(bytes, self.order)?;
        self.base_count = base_count;
        self.word_count = word_count;

        let mut header = RecordHeader::new(name, offset);
        header.declared_len = Some(base_count);
        Ok(Some(header))
    }

    fn read_body(&mut self, bytes: &mut ByteReader, sink: &mut FieldSink) -> Result<()> {
        let bases = twobit::read_body(bytes, self.order, self.base_count, self.word_count)?;
        let _ = sink(Field::Bases(&bases));
        Ok(())
    }

    fn skip_body(&mut self, bytes: &mut ByteReader) -> Result<()> {
        // sequence words then mask words
        bytes.skip(self.word_count * 16, "packed words")
    }
}

/// A chromatogram stream holds exactly one record, named after its origin.
struct ChromatogramDecoder {
    order: ByteOrder,
    id: String,
    header: Option<(Header, u64)>,
    done: bool,
}

impl RecordDecoder for ChromatogramDecoder {
    fn read_header(&mut self, bytes: &mut ByteReader) -> Result<Option<RecordHeader>> {
        if self.done || bytes.at_eof()? {
            return Ok(None);
        }
        self.done = true;

        let start = bytes.position();
        let header = Header::read(bytes, self.order)?;
        chromatogram::validate(&header, start, bytes.stream_len())?;

        let mut record = RecordHeader::new(self.id.clone(), start);
        record.declared_len = Some(header.bases as u64);
        self.header = Some((header, start));
        Ok(Some(record))
    }

    fn read_body(&mut self, bytes: &mut ByteReader, sink: &mut FieldSink) -> Result<()> {
        let Some((header, start)) = self.header.take() else {
            return Err(Error::format(bytes.position(), "section body without a header"));
        };

        let mut failed = None;
        chromatogram::decode_sections(bytes, &header, start, self.order, |section| {
            match &section {
                Section::BaseCalls(calls) => {
                    let qualities = match calls.called_qualities() {
                        Ok(q) => q,
                        Err(e) => {
                            failed = Some(e);
                            return ControlFlow::Break(());
                        }
                    };
                    if sink(Field::Bases(&calls.bases)).is_break()
                        || sink(Field::Qualities(&qualities)).is_break()
                    {
                        return ControlFlow::Break(());
                    }
                }
                Section::Comments(text) => {
                    if sink(Field::Comment(&String::from_utf8_lossy(text))).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                _ => (),
            }
            sink(Field::Section(&section))
        })?;
        match failed {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn skip_body(&mut self, _bytes: &mut ByteReader) -> Result<()> {
        // nothing follows the sections
        self.header = None;
        Ok(())
    }
}
