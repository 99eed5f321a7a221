use super::sections::SectionKind;
use crate::error::{Error, Result};
use crate::options::ByteOrder;
use crate::reader::bytes::ByteReader;

/// `.scf`
pub const MAGIC: u32 = 0x2e73_6366;
pub const HEADER_SIZE: u64 = 128;
pub const SPARE_WORDS: usize = 18;

/// Bytes taken by one base call, whatever the version.
pub const BASE_CALL_SIZE: u64 = 12;

// offset of the version field inside the header, for error reporting
const VERSION_FIELD: u64 = 36;

/// Layout generation of a chromatogram, selected once from the header's version field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// Interleaved samples and row-wise base calls
    V2,
    /// Planar delta-delta samples and column-wise base calls
    V3,
}

impl Version {
    pub fn from_field(field: &[u8; 4]) -> Option<Self> {
        match field[0] {
            b'2' => Some(Version::V2),
            b'3' => Some(Version::V3),
            _ => None,
        }
    }

    /// The version field written for a freshly built chromatogram.
    pub fn field(self) -> [u8; 4] {
        match self {
            Version::V2 => *b"2.00",
            Version::V3 => *b"3.00",
        }
    }
}

/// The fixed 128-byte header. Every section's position and size is known once this is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub samples: u32,
    pub samples_offset: u32,
    pub bases: u32,
    pub bases_left_clip: u32,
    pub bases_right_clip: u32,
    pub bases_offset: u32,
    pub comments_size: u32,
    pub comments_offset: u32,
    pub version: [u8; 4],
    pub sample_size: u32,
    pub code_set: u32,
    pub private_size: u32,
    pub private_offset: u32,
    pub spare: [u32; SPARE_WORDS],
}

impl Header {
    pub fn read(bytes: &mut ByteReader, order: ByteOrder) -> Result<Header> {
        let start = bytes.position();
        bytes.check_available(HEADER_SIZE, "chromatogram header")?;

        let magic = bytes.read_u32(order, "magic number")?;
        if magic != MAGIC {
            return Err(Error::format(
                start,
                format!("bad magic number {magic:#010x}, expected {MAGIC:#010x} (wrong byte order?)"),
            ));
        }

        let mut word = |what: &str| bytes.read_u32(order, what);
        let samples = word("sample count")?;
        let samples_offset = word("samples offset")?;
        let bases = word("base count")?;
        let bases_left_clip = word("left clip")?;
        let bases_right_clip = word("right clip")?;
        let bases_offset = word("bases offset")?;
        let comments_size = word("comments size")?;
        let comments_offset = word("comments offset")?;

        let version = bytes.read_array::<4>("version")?;

        let mut word = |what: &str| bytes.read_u32(order, what);
        let sample_size = word("sample size")?;
        let code_set = word("code set")?;
        let private_size = word("private data size")?;
        let private_offset = word("private data offset")?;
        let mut spare = [0u32; SPARE_WORDS];
        for s in spare.iter_mut() {
            *s = word("spare")?;
        }

        Ok(Header {
            samples,
            samples_offset,
            bases,
            bases_left_clip,
            bases_right_clip,
            bases_offset,
            comments_size,
            comments_offset,
            version,
            sample_size,
            code_set,
            private_size,
            private_offset,
            spare,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>, order: ByteOrder) {
        order.put_u32(out, MAGIC);
        for v in [
            self.samples,
            self.samples_offset,
            self.bases,
            self.bases_left_clip,
            self.bases_right_clip,
            self.bases_offset,
            self.comments_size,
            self.comments_offset,
        ] {
            order.put_u32(out, v);
        }
        out.extend_from_slice(&self.version);
        for v in [
            self.sample_size,
            self.code_set,
            self.private_size,
            self.private_offset,
        ] {
            order.put_u32(out, v);
        }
        for v in self.spare {
            order.put_u32(out, v);
        }
    }

    /// Version of the layout, or a format error pointing at the version field.
    pub fn layout_version(&self, record_start: u64) -> Result<Version> {
        Version::from_field(&self.version).ok_or_else(|| {
            Error::format(
                record_start + VERSION_FIELD,
                format!(
                    "unsupported chromatogram version `{}`",
                    self.version.escape_ascii()
                ),
            )
        })
    }

    /// Declared offset and byte length of a section.
    pub fn extent(&self, kind: SectionKind) -> (u64, u64) {
        match kind {
            SectionKind::Samples => (
                self.samples_offset as u64,
                self.samples as u64 * 4 * self.sample_size as u64,
            ),
            SectionKind::Bases => (
                self.bases_offset as u64,
                self.bases as u64 * BASE_CALL_SIZE,
            ),
            SectionKind::Comments => (self.comments_offset as u64, self.comments_size as u64),
            SectionKind::PrivateData => (self.private_offset as u64, self.private_size as u64),
        }
    }

    /// Record where a section was placed. Counts for samples and bases are set separately.
    pub fn place(&mut self, kind: SectionKind, offset: u32, size: u32) {
        match kind {
            SectionKind::Samples => self.samples_offset = offset,
            SectionKind::Bases => self.bases_offset = offset,
            SectionKind::Comments => {
                self.comments_offset = offset;
                self.comments_size = size;
            }
            SectionKind::PrivateData => {
                self.private_offset = offset;
                self.private_size = size;
            }
        }
    }
}
