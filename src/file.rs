use crate::options::Format;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

/// Size and modification time of a source file, taken when it is indexed.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SourceFingerprint {
    pub size: u64,
    /// Time since the epoch, if the platform reports one
    pub modified: Option<Duration>,
}

impl SourceFingerprint {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            size: meta.len(),
            modified: meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok()),
        })
    }
}

/// The JSON line at the top of a saved index.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexMetadata {
    pub seqstore_version: String,
    pub file_path: String,
    pub source: SourceFingerprint,
    pub format: Format,
    pub index_date: String,
    pub elapsed: f64,
    pub gb: f64,
    pub record_count: usize,
    pub duplicates_skipped: usize,
    pub filtered_records: usize,
}
