#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::NamedTempFile;
use seqstore::codec::packed;
use seqstore::{ByteOrder, Format};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const ORDER: ByteOrder = ByteOrder::Little;

pub fn bfq() -> Format {
    Format::Bfq { byte_order: ORDER }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic bases and qualities for record `i`, `len` long.
pub fn read_content(i: usize, len: usize) -> (Vec<u8>, Vec<u8>) {
    let bases = (0..len).map(|j| b"ACGTN"[(i * 7 + j * 3) % 5]).collect();
    let quals = (0..len).map(|j| 1 + ((i + j) % 60) as u8).collect();
    (bases, quals)
}

/// A `bfq` file holding one record per id, each `len` bases long.
pub fn bfq_bytes(ids: &[String], len: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let (bases, quals) = read_content(i, len);
        packed::encode_into(&mut data, id, &bases, &quals, ORDER).unwrap();
    }
    data
}

pub fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("read_{i}")).collect()
}

pub fn bfq_file(ids: &[String], len: usize) -> NamedTempFile {
    let file = NamedTempFile::new("reads.bfq").unwrap();
    file.write_binary(&bfq_bytes(ids, len)).unwrap();
    file
}
