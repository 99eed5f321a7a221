use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context};
use csv::{ReaderBuilder, WriterBuilder};
use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::file::IndexMetadata;
use crate::filter::IdFilter;
use crate::parser::{Memento, ParseControl, PushParser, RecordVisitor, Visit};
use crate::record::RecordHeader;

const PROGRESS_INTERVAL: usize = 50000;

/// Record ids mapped to the mementos that replay them, in first-seen file order.
#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    entries: IndexMap<String, Memento>,
    duplicates: usize,
    filtered: usize,
}

impl OffsetIndex {
    /// Index a stream in one forward pass, skipping every record body.
    ///
    /// Ids rejected by `filter` are left out. When an id occurs more than once the first
    /// occurrence is kept and later ones are counted and logged.
    pub fn build<R, F>(parser: &PushParser, reader: R, len: Option<u64>, filter: &F) -> Result<Self>
    where
        R: Read + Send,
        F: IdFilter + ?Sized,
    {
        let mut builder = IndexBuilder {
            index: OffsetIndex::default(),
            filter,
            seen: 0,
        };
        parser.parse(reader, len, &mut builder)?;

        let index = builder.index;
        info!(
            "Indexed {} records from {} ({} duplicate ids skipped, {} filtered)",
            index.len(),
            parser.origin(),
            index.duplicates,
            index.filtered
        );
        Ok(index)
    }

    pub fn get(&self, id: &str) -> Option<&Memento> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Memento)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of later occurrences of already indexed ids.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn filtered(&self) -> usize {
        self.filtered
    }
}

struct IndexBuilder<'f, F: ?Sized> {
    index: OffsetIndex,
    filter: &'f F,
    seen: usize,
}

impl<F: IdFilter + ?Sized> RecordVisitor for IndexBuilder<'_, F> {
    type Body = ();

    fn visit_record(&mut self, control: &mut ParseControl, header: &RecordHeader) -> Visit<()> {
        self.seen += 1;
        if self.seen % PROGRESS_INTERVAL == 0 {
            info!("Processed: {}", self.seen);
        }

        if !self.filter.accept(header.id()) {
            self.index.filtered += 1;
            return Visit::Skip;
        }

        match self.index.entries.entry(header.id().to_string()) {
            Entry::Occupied(first) => {
                self.index.duplicates += 1;
                warn!(
                    "Duplicate id `{}` at byte {}, keeping the record at byte {}",
                    header.id(),
                    header.offset(),
                    first.get().offset()
                );
            }
            Entry::Vacant(slot) => {
                if let Ok(memento) = control.create_memento() {
                    slot.insert(memento);
                }
            }
        }
        Visit::Skip
    }
}

/// An index accepts exactly the ids it holds.
impl IdFilter for OffsetIndex {
    fn accept(&self, id: &str) -> bool {
        self.contains(id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub id: String,
    pub offset: u64,
}

/// Write `index` as a TSV file preceded by a `#`-prefixed JSON metadata line.
///
/// The file is written in full next to `path` and then renamed over it, so a failed write leaves
/// any earlier index at `path` untouched.
pub fn save(index: &OffsetIndex, metadata: &IndexMetadata, path: &Path) -> anyhow::Result<()> {
    let mut tempfile_dir = std::path::absolute(path)?;
    tempfile_dir.pop();
    let mut temp_file = NamedTempFile::new_in(&tempfile_dir)
        .with_context(|| format!("Could not create a temporary file in {}", tempfile_dir.display()))?;

    info!("Writing index to {}...", path.display());
    writeln!(temp_file, "#{}", serde_json::to_string(metadata)?)?;
    {
        let mut wtr = WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(temp_file.as_file_mut());
        for (id, memento) in index.iter() {
            wtr.serialize(IndexRow {
                id: id.to_string(),
                offset: memento.offset(),
            })?;
        }
        wtr.flush()?;
    }

    temp_file
        .persist(path)
        .with_context(|| format!("Could not create index file {}", path.display()))?;
    Ok(())
}

/// Read a saved index back, rebuilding mementos for `parser`.
pub fn load(path: &Path, parser: &PushParser) -> anyhow::Result<(IndexMetadata, OffsetIndex)> {
    let file = File::open(path).with_context(|| format!("Unable to open index {}", path.display()))?;
    let mut file = BufReader::new(file);

    // the first line is not TSV
    let mut header = String::new();
    file.read_line(&mut header)
        .context("Could not read the first line")?;
    let Some(json) = header.strip_prefix('#') else {
        bail!("{} is not an index file: missing metadata line", path.display());
    };
    let metadata: IndexMetadata =
        serde_json::from_str(json.trim_end()).context("Invalid index metadata")?;

    let rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(file);

    let mut index = OffsetIndex {
        duplicates: metadata.duplicates_skipped,
        filtered: metadata.filtered_records,
        ..OffsetIndex::default()
    };
    for row in rdr.into_deserialize() {
        let row: IndexRow = row?;
        let memento = Memento::new(row.offset, parser.source());
        if index.entries.insert(row.id.clone(), memento).is_some() {
            bail!("Index {} lists id `{}` twice", path.display(), row.id);
        }
    }

    if index.len() != metadata.record_count {
        bail!(
            "Index {} holds {} rows but its metadata says {}",
            path.display(),
            index.len(),
            metadata.record_count
        );
    }

    Ok((metadata, index))
}
