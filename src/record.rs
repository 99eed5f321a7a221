use crate::codec::chromatogram::Section;
use crate::parser::{BodyVisitor, ParseControl};

/// What is known about a record before its body is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub(crate) id: String,
    pub(crate) comment: Option<String>,
    pub(crate) offset: u64,
    pub(crate) declared_len: Option<u64>,
}

impl RecordHeader {
    pub(crate) fn new(id: String, offset: u64) -> Self {
        Self {
            id,
            comment: None,
            offset,
            declared_len: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Byte offset at which the record starts.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bases the header declares, for formats that declare one up front.
    pub fn declared_len(&self) -> Option<u64> {
        self.declared_len
    }
}

/// One decoded field of a record body. Borrowed from the decoder and only valid for the call.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    Bases(&'a [u8]),
    /// Phred values, not ASCII-offset
    Qualities(&'a [u8]),
    Comment(&'a str),
    Section(&'a Section),
}

/// A decoded sequence record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    id: String,
    comment: Option<String>,
    bases: Vec<u8>,
    qualities: Option<Vec<u8>>,
    sections: Vec<Section>,
}

impl Record {
    pub fn new(id: impl Into<String>, bases: Vec<u8>, qualities: Option<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            comment: None,
            bases,
            qualities,
            sections: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    pub fn qualities(&self) -> Option<&[u8]> {
        self.qualities.as_deref()
    }

    /// Decoded chromatogram sections, in the order they were read. Empty for other formats.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Mean phred quality, or `None` without qualities or bases.
    pub fn mean_quality(&self) -> Option<f64> {
        let qualities = self.qualities.as_ref()?;
        if qualities.is_empty() {
            return None;
        }
        let total: u64 = qualities.iter().map(|&q| q as u64).sum();
        Some(total as f64 / qualities.len() as f64)
    }
}

/// Body visitor that collects every field into a [`Record`].
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(header: &RecordHeader) -> Self {
        let mut record = Record::new(header.id.clone(), Vec::new(), None);
        record.comment = header.comment.clone();
        if let Some(n) = header.declared_len {
            record.bases.reserve(n.min(1 << 20) as usize);
        }
        Self { record }
    }

    pub fn build(self) -> Record {
        self.record
    }
}

impl BodyVisitor for RecordBuilder {
    fn visit_field(&mut self, _control: &mut ParseControl, field: Field<'_>) {
        let record = &mut self.record;
        match field {
            Field::Bases(b) => record.bases.extend_from_slice(b),
            Field::Qualities(q) => record
                .qualities
                .get_or_insert_with(Vec::new)
                .extend_from_slice(q),
            Field::Comment(c) => record.comment = Some(c.to_string()),
            Field::Section(s) => record.sections.push(s.clone()),
        }
    }
}
