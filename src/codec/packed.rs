//! MAQ `bfq` records: one byte per base, holding the base in the top two bits and a phred quality
//! (0-63) in the low six. The all-zero byte is reserved for an unknown base.
//!
//! ```text
//! i32 name_len | name bytes + NUL | i32 count | count packed bytes
//! ```

use crate::error::{Error, Result};
use crate::options::ByteOrder;
use crate::reader::bytes::ByteReader;
use crate::seq::dna;

pub const MAX_QUALITY: u8 = 63;

/// Packed byte standing in for an unknown base; decodes to `N` with quality 0.
pub const SENTINEL: u8 = 0;

const QUALITY_MASK: u8 = 0b0011_1111;

/// A decoded packed read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedRead {
    pub name: String,
    pub bases: Vec<u8>,
    pub qualities: Vec<u8>,
}

#[inline(always)]
pub fn unpack_base(byte: u8) -> (u8, u8) {
    if byte == SENTINEL {
        (dna::UNKNOWN, 0)
    } else {
        (dna::code_to_dna(byte >> 6), byte & QUALITY_MASK)
    }
}

/// Pack one base and quality. `position` is only used for error reporting.
pub fn pack_base(base: u8, quality: u8, position: usize) -> Result<u8> {
    if dna::is_unknown(base) {
        return Ok(SENTINEL);
    }

    let Some(code) = dna::dna_to_code(base) else {
        return Err(Error::encoding(
            Some(position),
            format!(
                "base `{}` is not representable (only A, C, G, T and N are)",
                base.escape_ascii()
            ),
        ));
    };

    if quality > MAX_QUALITY {
        return Err(Error::encoding(
            Some(position),
            format!("quality {quality} is above the maximum of {MAX_QUALITY}"),
        ));
    }

    let byte = (code << 6) | quality;
    if byte == SENTINEL {
        return Err(Error::encoding(
            Some(position),
            "base A with quality 0 collides with the unknown-base sentinel",
        ));
    }
    Ok(byte)
}

pub fn unpack_into(packed: &[u8], bases: &mut Vec<u8>, qualities: &mut Vec<u8>) {
    bases.reserve(packed.len());
    qualities.reserve(packed.len());
    for &byte in packed {
        let (b, q) = unpack_base(byte);
        bases.push(b);
        qualities.push(q);
    }
}

/// Read a length-prefixed, NUL-terminated name.
pub(crate) fn read_name(bytes: &mut ByteReader, order: ByteOrder) -> Result<String> {
    let start = bytes.position();
    let len = bytes.read_i32(order, "name length")?;
    if len < 1 {
        return Err(Error::format(start, format!("invalid name length {len}")));
    }

    let mut raw = bytes.read_bytes(len as u64, "name")?;
    if raw.pop() != Some(0) {
        return Err(Error::format(start, "name is missing its NUL terminator"));
    }

    String::from_utf8(raw).map_err(|_| Error::format(start + 4, "name is not valid UTF-8"))
}

pub(crate) fn write_name(out: &mut Vec<u8>, name: &str, order: ByteOrder) -> Result<()> {
    if name.as_bytes().contains(&0) {
        return Err(Error::encoding(None, "names cannot contain NUL bytes"));
    }
    let len = i32::try_from(name.len() + 1)
        .map_err(|_| Error::encoding(None, "name is too long for a 32-bit length"))?;

    order.put_i32(out, len);
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    Ok(())
}

/// Read a non-negative 32-bit count of `unit` sized elements, checking that they fit in what is
/// left of the stream.
pub(crate) fn read_count(
    bytes: &mut ByteReader,
    order: ByteOrder,
    what: &str,
    unit: u64,
) -> Result<u64> {
    let start = bytes.position();
    let count = bytes.read_i32(order, what)?;
    if count < 0 {
        return Err(Error::format(start, format!("negative {what} {count}")));
    }
    let count = count as u64;
    bytes.check_available(count * unit, what)?;
    Ok(count)
}

pub(crate) fn count_to_i32(n: usize, what: &str) -> Result<i32> {
    i32::try_from(n).map_err(|_| Error::encoding(None, format!("{what} does not fit in 32 bits")))
}

/// Read one record, or `None` if the stream is already at its end.
pub fn read_record(bytes: &mut ByteReader, order: ByteOrder) -> Result<Option<PackedRead>> {
    if bytes.at_eof()? {
        return Ok(None);
    }

    let name = read_name(bytes, order)?;
    let packed = read_count(bytes, order, "base count", 1)
        .and_then(|count| bytes.read_bytes(count, "packed bases"))
        .map_err(|e| e.with_record_id(&name))?;

    let mut bases = Vec::new();
    let mut qualities = Vec::new();
    unpack_into(&packed, &mut bases, &mut qualities);

    Ok(Some(PackedRead {
        name,
        bases,
        qualities,
    }))
}

/// Decode the record at the start of `bytes`.
pub fn decode(bytes: &[u8], order: ByteOrder) -> Result<PackedRead> {
    let mut reader = ByteReader::from_slice(bytes);
    read_record(&mut reader, order)?.ok_or_else(|| Error::format(0, "no record in empty input"))
}

/// Decode every record in `bytes`.
pub fn decode_all(bytes: &[u8], order: ByteOrder) -> Result<Vec<PackedRead>> {
    let mut reader = ByteReader::from_slice(bytes);
    let mut reads = Vec::new();
    while let Some(read) = read_record(&mut reader, order)? {
        reads.push(read);
    }
    Ok(reads)
}

/// Append the encoding of one record to `out`.
pub fn encode_into(
    out: &mut Vec<u8>,
    name: &str,
    bases: &[u8],
    qualities: &[u8],
    order: ByteOrder,
) -> Result<()> {
    if bases.len() != qualities.len() {
        return Err(Error::Encoding {
            id: Some(name.to_string()),
            position: None,
            reason: format!(
                "{} bases but {} qualities",
                bases.len(),
                qualities.len()
            ),
        });
    }

    let mut record = Vec::with_capacity(name.len() + bases.len() + 9);
    write_name(&mut record, name, order).map_err(|e| e.with_record_id(name))?;
    order.put_i32(&mut record, count_to_i32(bases.len(), "base count")?);
    for (i, (&b, &q)) in bases.iter().zip(qualities).enumerate() {
        record.push(pack_base(b, q, i).map_err(|e| e.with_record_id(name))?);
    }

    out.extend_from_slice(&record);
    Ok(())
}

pub fn encode(name: &str, bases: &[u8], qualities: &[u8], order: ByteOrder) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(&mut out, name, bases, qualities, order)?;
    Ok(out)
}
