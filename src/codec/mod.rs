//! Binary record codecs. Every decoder works on a [`ByteReader`](crate::reader::bytes::ByteReader)
//! positioned at a record boundary and every encoder is the exact inverse of its decoder.

pub mod chromatogram;
pub mod packed;
pub mod twobit;

pub use chromatogram::Chromatogram;
pub use packed::PackedRead;
pub use twobit::{encode as encode_reference, ReferenceSequence};
