use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the parsers, codecs, index and stream can report.
///
/// `Format` errors are fatal to the parse that produced them and carry the byte offset (and record
/// id, when it had already been read) so callers can point at the offending record.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed record{} at byte {offset}: {reason}", describe_id(.id))]
    Format {
        offset: u64,
        id: Option<String>,
        reason: String,
    },

    #[error("{0} has been closed")]
    ClosedResource(&'static str),

    #[error("cannot encode{}{}: {reason}", describe_id(.id), describe_position(.position))]
    Encoding {
        id: Option<String>,
        position: Option<usize>,
        reason: String,
    },

    #[error(
        "memento was created by source {found:#018x} and cannot be replayed against source {expected:#018x}"
    )]
    IncompatibleMemento { expected: u64, found: u64 },

    #[error("mementos can only be created while a record header is being visited")]
    MementoUnavailable,

    #[error("{path} has changed since it was indexed")]
    StaleSource { path: String },

    #[error("the parsing worker terminated unexpectedly")]
    WorkerPanicked,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn describe_id(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" `{id}`"),
        None => String::new(),
    }
}

fn describe_position(position: &Option<usize>) -> String {
    match position {
        Some(p) => format!(" (position {p})"),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn format(offset: u64, reason: impl Into<String>) -> Self {
        Error::Format {
            offset,
            id: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn encoding(position: Option<usize>, reason: impl Into<String>) -> Self {
        Error::Encoding {
            id: None,
            position,
            reason: reason.into(),
        }
    }

    /// Attach a record id to a format or encoding error that does not carry one yet.
    pub(crate) fn with_record_id(self, record_id: &str) -> Self {
        match self {
            Error::Format {
                offset,
                id: None,
                reason,
            } => Error::Format {
                offset,
                id: Some(record_id.to_string()),
                reason,
            },
            Error::Encoding {
                id: None,
                position,
                reason,
            } => Error::Encoding {
                id: Some(record_id.to_string()),
                position,
                reason,
            },
            other => other,
        }
    }

    /// Byte offset of a format error.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Error::Format { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn record_id(&self) -> Option<&str> {
        match self {
            Error::Format { id, .. } | Error::Encoding { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}
