//! Push-style parsing: the parser drives a [`RecordVisitor`] through every record of a stream,
//! handing each record body to the [`BodyVisitor`] the visitor asks for.
//!
//! Visitors steer the parse through [`ParseControl`]: they can halt it at any point, and while a
//! record header is being visited they can capture a [`Memento`] that lets the same parser replay
//! that record later from a seekable source.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Error, Result};
use crate::options::Format;
use crate::reader::bytes::ByteReader;
use crate::record::{Field, RecordHeader};

/// The answer of a [`RecordVisitor`] to a record header.
pub enum Visit<B> {
    /// Decode the body, feeding its fields to this visitor
    Body(B),
    /// Advance past the body without decoding it
    Skip,
}

pub trait BodyVisitor {
    fn visit_field(&mut self, control: &mut ParseControl, field: Field<'_>);

    /// Every field of the body has been visited.
    fn visit_end(&mut self, _control: &mut ParseControl) {}

    /// Parsing was halted before the body was complete.
    fn halted(&mut self) {}
}

/// Accepts every field and keeps nothing.
impl BodyVisitor for () {
    fn visit_field(&mut self, _control: &mut ParseControl, _field: Field<'_>) {}
}

pub trait RecordVisitor {
    type Body: BodyVisitor;

    fn visit_record(&mut self, control: &mut ParseControl, header: &RecordHeader)
        -> Visit<Self::Body>;

    /// The body returned for the current record has seen all of its fields.
    fn record_done(&mut self, _control: &mut ParseControl, _body: Self::Body) {}

    /// The stream ended without the parse being halted.
    fn visit_end(&mut self) {}

    fn halted(&mut self) {}
}

/// A resumable position: the start of one record, tied to the parser that produced it.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Memento {
    offset: u64,
    source: u64,
}

impl Memento {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fingerprint of the parser that created this memento.
    pub fn source(&self) -> u64 {
        self.source
    }

    pub(crate) fn new(offset: u64, source: u64) -> Self {
        Self { offset, source }
    }
}

/// Handed to every visitor callback.
pub struct ParseControl {
    source: u64,
    halted: bool,
    header_offset: Option<u64>,
}

impl ParseControl {
    fn new(source: u64) -> Self {
        Self {
            source,
            halted: false,
            header_offset: None,
        }
    }

    /// Stop parsing. The parser notices at the next record boundary or after the current field.
    pub fn halt_parsing(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Capture the position of the record whose header is being visited.
    pub fn create_memento(&self) -> Result<Memento> {
        self.header_offset
            .map(|offset| Memento::new(offset, self.source))
            .ok_or(Error::MementoUnavailable)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ParserState {
    Init,
    AtHeader,
    Skipping,
    VisitingBody,
    RecordDone,
    End,
    Halted,
}

impl ParserState {
    fn can_move_to(self, next: ParserState) -> bool {
        use ParserState::*;
        match (self, next) {
            (Halted | End, _) => false,
            (_, Halted) => true,
            (Init | Skipping | RecordDone, AtHeader | End) => true,
            (AtHeader, Skipping | VisitingBody) => true,
            (VisitingBody, RecordDone) => true,
            _ => false,
        }
    }
}

struct StateMachine(ParserState);

impl StateMachine {
    fn go(&mut self, next: ParserState) {
        debug_assert!(
            self.0.can_move_to(next),
            "invalid parser transition {:?} -> {:?}",
            self.0,
            next
        );
        trace!("parser state {:?} -> {:?}", self.0, next);
        self.0 = next;
    }
}

/// How a parse ended, with the number of record headers that were visited.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Completed { records: u64 },
    Halted { records: u64 },
}

impl ParseOutcome {
    pub fn records(&self) -> u64 {
        match self {
            ParseOutcome::Completed { records } | ParseOutcome::Halted { records } => *records,
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, ParseOutcome::Halted { .. })
    }
}

/// Drives visitors over streams of one format from one origin.
///
/// The origin (usually a canonical path) and the format together make the parser's identity,
/// which every memento it creates carries.
#[derive(Debug, Clone)]
pub struct PushParser {
    format: Format,
    origin: String,
    source: u64,
}

impl PushParser {
    pub fn new(format: Format, origin: impl Into<String>) -> Self {
        let origin = origin.into();
        let source = fingerprint(&origin, &format);
        Self {
            format,
            origin,
            source,
        }
    }

    /// A parser whose origin is the canonical form of `path`.
    pub fn for_path(path: impl AsRef<Path>, format: Format) -> Result<Self> {
        let canonical = std::fs::canonicalize(path.as_ref())?;
        Ok(Self::new(format, canonical.display().to_string()))
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn source(&self) -> u64 {
        self.source
    }

    /// Parse a whole stream from its first byte. `len` is the total stream length, if known, and
    /// lets every declared length be checked before anything is read.
    pub fn parse<R, V>(&self, reader: R, len: Option<u64>, visitor: &mut V) -> Result<ParseOutcome>
    where
        R: Read + Send,
        V: RecordVisitor,
    {
        self.run(ByteReader::new(reader, 0, len), visitor)
    }

    /// Resume parsing at the record a memento points to.
    pub fn replay<R, V>(
        &self,
        mut reader: R,
        len: Option<u64>,
        memento: &Memento,
        visitor: &mut V,
    ) -> Result<ParseOutcome>
    where
        R: Read + Seek + Send,
        V: RecordVisitor,
    {
        if memento.source != self.source {
            return Err(Error::IncompatibleMemento {
                expected: self.source,
                found: memento.source,
            });
        }

        reader.seek(SeekFrom::Start(memento.offset))?;
        self.run(ByteReader::new(reader, memento.offset, len), visitor)
    }

    fn run<V: RecordVisitor>(&self, mut bytes: ByteReader, visitor: &mut V) -> Result<ParseOutcome> {
        let mut decoder = self.format.decoder(&self.origin);
        let mut control = ParseControl::new(self.source);
        let mut state = StateMachine(ParserState::Init);
        let mut records = 0;

        let halted = |state: &mut StateMachine, visitor: &mut V, records| -> Result<ParseOutcome> {
            state.go(ParserState::Halted);
            visitor.halted();
            Ok(ParseOutcome::Halted { records })
        };

        loop {
            if control.is_halted() {
                return halted(&mut state, visitor, records);
            }

            let Some(header) = decoder.read_header(&mut bytes)? else {
                state.go(ParserState::End);
                visitor.visit_end();
                return Ok(ParseOutcome::Completed { records });
            };
            state.go(ParserState::AtHeader);
            records += 1;

            control.header_offset = Some(header.offset());
            let visit = visitor.visit_record(&mut control, &header);
            control.header_offset = None;

            match visit {
                Visit::Skip => {
                    if control.is_halted() {
                        return halted(&mut state, visitor, records);
                    }
                    state.go(ParserState::Skipping);
                    decoder
                        .skip_body(&mut bytes)
                        .map_err(|e| e.with_record_id(header.id()))?;
                }
                Visit::Body(mut body) => {
                    if !control.is_halted() {
                        state.go(ParserState::VisitingBody);
                        decoder
                            .read_body(&mut bytes, &mut |field| {
                                body.visit_field(&mut control, field);
                                if control.is_halted() {
                                    std::ops::ControlFlow::Break(())
                                } else {
                                    std::ops::ControlFlow::Continue(())
                                }
                            })
                            .map_err(|e| e.with_record_id(header.id()))?;
                    }

                    if control.is_halted() {
                        body.halted();
                        return halted(&mut state, visitor, records);
                    }

                    body.visit_end(&mut control);
                    state.go(ParserState::RecordDone);
                    visitor.record_done(&mut control, body);
                }
            }
        }
    }
}

/// Stable identity of a parser: origin plus format kind and byte order.
fn fingerprint(origin: &str, format: &Format) -> u64 {
    let mut key = Vec::with_capacity(origin.len() + 16);
    key.extend_from_slice(origin.as_bytes());
    key.push(0);
    key.extend_from_slice(format.name().as_bytes());
    key.push(0);
    if let Some(order) = format.byte_order() {
        key.push(order as u8 + 1);
    }
    xxh3_64(&key)
}
