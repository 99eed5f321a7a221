//! Streaming and random access over files of biological sequence records.
//!
//! Supported layouts are FASTA and FASTQ text, MAQ bit-packed `bfq` reads and `bfa` references,
//! and SCF chromatograms. Every format is decoded by the same push parser, which feeds either an
//! id index ([`RecordStore`]) or a background streaming iterator ([`RecordStream`]).

#[macro_use]
extern crate log;

pub mod codec;
pub mod error;
pub mod file;
pub mod filter;
pub mod index;
pub mod io;
pub mod options;
pub mod parser;
pub mod reader;
pub mod record;
pub mod seq;
pub mod store;
pub mod stream;

pub use error::{Error, Result};
pub use filter::{AcceptAll, IdFilter};
pub use index::OffsetIndex;
pub use options::{ByteOrder, Format};
pub use parser::{BodyVisitor, Memento, ParseControl, ParseOutcome, PushParser, RecordVisitor, Visit};
pub use record::{Field, Record, RecordBuilder, RecordHeader};
pub use store::RecordStore;
pub use stream::RecordStream;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
