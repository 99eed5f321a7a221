use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::file::{IndexMetadata, SourceFingerprint};
use crate::filter::{AcceptAll, IdFilter};
use crate::index::{self, OffsetIndex};
use crate::options::Format;
use crate::parser::{Memento, ParseControl, PushParser, RecordVisitor, Visit};
use crate::record::{Record, RecordBuilder, RecordHeader};
use crate::stream::RecordStream;

/// Random access to the records of one file, by id.
///
/// Only the id index is held in memory. Every lookup replays a single record from its memento on
/// a fresh read-only handle, so lookups from several threads need no coordination.
pub struct RecordStore {
    path: PathBuf,
    parser: PushParser,
    index: Arc<OffsetIndex>,
    source: SourceFingerprint,
    elapsed: f64,
    closed: AtomicBool,
}

impl RecordStore {
    /// Index `path` in one pass, keeping only the ids `filter` accepts.
    pub fn build(path: impl AsRef<Path>, format: Format, filter: impl IdFilter) -> Result<Self> {
        let now = Instant::now();
        let path = path.as_ref().to_path_buf();
        let parser = PushParser::for_path(&path, format)?;
        let source = SourceFingerprint::of(&path)?;

        let file = File::open(&path)?;
        let index = OffsetIndex::build(&parser, file, Some(source.size), &filter)?;

        Ok(Self {
            path,
            parser,
            index: Arc::new(index),
            source,
            elapsed: now.elapsed().as_secs_f64(),
            closed: AtomicBool::new(false),
        })
    }

    /// Index every record of `path`.
    pub fn open(path: impl AsRef<Path>, format: Format) -> Result<Self> {
        Self::build(path, format, AcceptAll)
    }

    /// Open `path` with an index previously written by [`RecordStore::save_index`].
    ///
    /// The index is rejected if it was built for another file or format, or if the source has
    /// changed since.
    pub fn with_index(
        path: impl AsRef<Path>,
        format: Format,
        index_path: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let index_path = index_path.as_ref();
        let parser = PushParser::for_path(&path, format)
            .with_context(|| format!("Unable to open {}", path.display()))?;
        let source = SourceFingerprint::of(&path)?;

        let (metadata, index) = index::load(index_path, &parser)?;
        if metadata.file_path != parser.origin() {
            bail!(
                "Index {} was built for {}, not {}",
                index_path.display(),
                metadata.file_path,
                parser.origin()
            );
        }
        if metadata.format != format {
            bail!(
                "Index {} was built for the {} format, not {}",
                index_path.display(),
                metadata.format.name(),
                format.name()
            );
        }
        if metadata.source != source {
            bail!(Error::StaleSource {
                path: path.display().to_string()
            });
        }

        info!(
            "Loaded index of {} records from {}",
            index.len(),
            index_path.display()
        );
        Ok(Self {
            path,
            parser,
            index: Arc::new(index),
            source,
            elapsed: metadata.elapsed,
            closed: AtomicBool::new(false),
        })
    }

    /// Persist the index so that [`RecordStore::with_index`] can skip the indexing pass.
    pub fn save_index(&self, index_path: impl AsRef<Path>) -> anyhow::Result<()> {
        self.check_open()?;
        let metadata = IndexMetadata {
            seqstore_version: crate::VERSION.to_string(),
            file_path: self.parser.origin().to_string(),
            source: self.source,
            format: self.parser.format(),
            index_date: format!("{:?}", chrono::offset::Local::now()),
            elapsed: self.elapsed,
            gb: (self.source.size as f64) / (1024u32.pow(3) as f64),
            record_count: self.index.len(),
            duplicates_skipped: self.index.duplicates(),
            filtered_records: self.index.filtered(),
        };
        index::save(&self.index, &metadata, index_path.as_ref())
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ClosedResource("record store"));
        }
        Ok(())
    }

    /// Fail if the source no longer has the size and modification time it was indexed with.
    fn check_fresh(&self) -> Result<()> {
        if SourceFingerprint::of(&self.path)? != self.source {
            return Err(Error::StaleSource {
                path: self.path.display().to_string(),
            });
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.parser.format()
    }

    pub fn memento(&self, id: &str) -> Result<Option<Memento>> {
        self.check_open()?;
        Ok(self.index.get(id).copied())
    }

    /// The record with this id, or `None` if the index does not hold it.
    pub fn get(&self, id: &str) -> Result<Option<Record>> {
        self.check_open()?;
        let Some(memento) = self.index.get(id) else {
            return Ok(None);
        };
        self.check_fresh()?;

        let file = File::open(&self.path)?;
        let mut visitor = SingleRecord {
            expected: id,
            record: None,
            mismatch: false,
        };
        self.parser
            .replay(file, Some(self.source.size), memento, &mut visitor)?;

        match visitor.record {
            Some(record) if !visitor.mismatch => Ok(Some(record)),
            _ => Err(Error::StaleSource {
                path: self.path.display().to_string(),
            }),
        }
    }

    /// Look up several ids in parallel. Results are in the order of `ids`.
    pub fn get_many<S: AsRef<str> + Sync>(&self, ids: &[S]) -> Result<Vec<Option<Record>>> {
        self.check_open()?;
        ids.par_iter().map(|id| self.get(id.as_ref())).collect()
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        self.check_open()?;
        Ok(self.index.contains(id))
    }

    /// Number of indexed records.
    pub fn len(&self) -> Result<usize> {
        self.check_open()?;
        Ok(self.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.index.is_empty())
    }

    /// Indexed ids in the order they first appear in the file.
    pub fn ids(&self) -> Result<impl Iterator<Item = &str>> {
        self.check_open()?;
        Ok(self.index.ids())
    }

    /// Stream the records whose ids passed the filter, in file order. Later occurrences of a
    /// duplicated id are streamed too.
    pub fn iter(&self) -> Result<RecordStream> {
        self.check_open()?;
        self.check_fresh()?;
        let file = File::open(&self.path)?;
        // every accepted id made it into the index
        let filter = (self.index.filtered() > 0)
            .then(|| self.index.clone() as Arc<dyn IdFilter + Send + Sync>);
        RecordStream::spawn_filtered(self.parser.clone(), file, Some(self.source.size), filter)
    }

    /// Every later operation fails with [`Error::ClosedResource`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed record store for {}", self.path.display());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Builds the one record a memento points to, then halts.
struct SingleRecord<'a> {
    expected: &'a str,
    record: Option<Record>,
    mismatch: bool,
}

impl RecordVisitor for SingleRecord<'_> {
    type Body = RecordBuilder;

    fn visit_record(&mut self, control: &mut ParseControl, header: &RecordHeader) -> Visit<RecordBuilder> {
        if header.id() != self.expected {
            self.mismatch = true;
            control.halt_parsing();
            return Visit::Skip;
        }
        Visit::Body(RecordBuilder::new(header))
    }

    fn record_done(&mut self, control: &mut ParseControl, body: RecordBuilder) {
        self.record = Some(body.build());
        control.halt_parsing();
    }
}
