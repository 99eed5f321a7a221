use serde::{Deserialize, Serialize};

/// Byte order of every multi-byte integer in a binary file.
///
/// Packed files are not portable between producers and consumers of differing endianness, so
/// readers always take the order explicitly. Writers default to the host order.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// The byte order of the machine we are running on.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn u16_from(self, b: [u8; 2]) -> u16 {
        match self {
            ByteOrder::Little => u16::from_le_bytes(b),
            ByteOrder::Big => u16::from_be_bytes(b),
        }
    }

    pub fn u32_from(self, b: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        }
    }

    pub fn i32_from(self, b: [u8; 4]) -> i32 {
        match self {
            ByteOrder::Little => i32::from_le_bytes(b),
            ByteOrder::Big => i32::from_be_bytes(b),
        }
    }

    pub fn u64_from(self, b: [u8; 8]) -> u64 {
        match self {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        }
    }

    pub fn put_u16(self, out: &mut Vec<u8>, v: u16) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    pub fn put_u32(self, out: &mut Vec<u8>, v: u32) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    pub fn put_i32(self, out: &mut Vec<u8>, v: i32) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }

    pub fn put_u64(self, out: &mut Vec<u8>, v: u64) {
        match self {
            ByteOrder::Little => out.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::native()
    }
}

/// The on-disk layout of a record file, and with it the decoder that drives a parse.
///
/// A `Format` is part of the identity of every memento produced while parsing, so a memento taken
/// with one byte order can never be replayed with another.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Format {
    Fasta,
    Fastq,
    /// MAQ packed nucleotide+quality reads
    Bfq { byte_order: ByteOrder },
    /// MAQ 2-bit packed reference sequences
    Bfa { byte_order: ByteOrder },
    /// SCF chromatogram; one record per stream
    Chromatogram { byte_order: ByteOrder },
}

impl Format {
    pub fn byte_order(&self) -> Option<ByteOrder> {
        match self {
            Format::Fasta | Format::Fastq => None,
            Format::Bfq { byte_order }
            | Format::Bfa { byte_order }
            | Format::Chromatogram { byte_order } => Some(*byte_order),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Fasta => "fasta",
            Format::Fastq => "fastq",
            Format::Bfq { .. } => "bfq",
            Format::Bfa { .. } => "bfa",
            Format::Chromatogram { .. } => "scf",
        }
    }
}
