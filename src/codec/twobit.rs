//! MAQ `bfa` reference sequences: 2 bits per base, 32 bases per 64-bit word, first base in the
//! highest bits. A parallel mask array marks known bases with `0b11`; a zero mask group turns the
//! base into `N` whatever its 2-bit code says.
//!
//! ```text
//! i32 name_len | name bytes + NUL | i32 base_count | i32 word_count
//!     | word_count u64 sequence words | word_count u64 mask words
//! ```

use super::packed::{count_to_i32, read_count, read_name, write_name};
use crate::error::{Error, Result};
use crate::options::ByteOrder;
use crate::reader::bytes::ByteReader;
use crate::seq::dna;

pub const BASES_PER_WORD: usize = 32;

const KNOWN: u64 = 0b11;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    /// Uppercase bases, `N` where the mask marks a base unknown
    pub bases: Vec<u8>,
}

pub fn words_for(base_count: usize) -> usize {
    base_count.div_ceil(BASES_PER_WORD)
}

#[inline(always)]
fn shift_of(i: usize) -> usize {
    (BASES_PER_WORD - 1 - i % BASES_PER_WORD) * 2
}

/// Pack bases into sequence and mask words.
pub fn pack(bases: &[u8]) -> Result<(Vec<u64>, Vec<u64>)> {
    let n_words = words_for(bases.len());
    let mut seq = vec![0u64; n_words];
    let mut mask = vec![0u64; n_words];

    for (i, &b) in bases.iter().enumerate() {
        if dna::is_unknown(b) {
            continue;
        }
        let code = dna::dna_to_code(b).ok_or_else(|| {
            Error::encoding(
                Some(i),
                format!("base `{}` is not representable", b.escape_ascii()),
            )
        })?;
        seq[i / BASES_PER_WORD] |= (code as u64) << shift_of(i);
        mask[i / BASES_PER_WORD] |= KNOWN << shift_of(i);
    }

    Ok((seq, mask))
}

/// Unpack exactly `count` bases; the final word may be only partly used.
pub fn unpack(seq: &[u64], mask: &[u64], count: usize) -> Result<Vec<u8>> {
    let needed = words_for(count);
    if seq.len() < needed || mask.len() < needed {
        return Err(Error::encoding(
            None,
            format!(
                "{count} bases need {needed} words, got {} sequence and {} mask words",
                seq.len(),
                mask.len()
            ),
        ));
    }
    let mut bases = Vec::with_capacity(count);
    for i in 0..count {
        let w = i / BASES_PER_WORD;
        let shift = shift_of(i);
        if (mask[w] >> shift) & KNOWN == 0 {
            bases.push(dna::UNKNOWN);
        } else {
            bases.push(dna::code_to_dna(((seq[w] >> shift) & 0b11) as u8));
        }
    }
    Ok(bases)
}

/// Header of a reference record: name, base count and word count, validated against each other.
pub(crate) fn read_header(bytes: &mut ByteReader, order: ByteOrder) -> Result<(String, u64, u64)> {
    let name = read_name(bytes, order)?;

    let counts = (|| -> Result<(u64, u64)> {
        let start = bytes.position();
        let base_count = bytes.read_i32(order, "base count")?;
        if base_count < 0 {
            return Err(Error::format(
                start,
                format!("negative base count {base_count}"),
            ));
        }

        let at = bytes.position();
        // each word index covers one sequence word and one mask word
        let word_count = read_count(bytes, order, "word count", 16)?;
        let expected = words_for(base_count as usize) as u64;
        if word_count != expected {
            return Err(Error::format(
                at,
                format!("{base_count} bases need {expected} words, header says {word_count}"),
            ));
        }
        Ok((base_count as u64, word_count))
    })()
    .map_err(|e| e.with_record_id(&name))?;

    Ok((name, counts.0, counts.1))
}

pub(crate) fn read_words(bytes: &mut ByteReader, order: ByteOrder, n: u64) -> Result<Vec<u64>> {
    let raw = bytes.read_bytes(n * 8, "packed words")?;
    Ok(raw
        .chunks_exact(8)
        .map(|c| {
            let mut w = [0u8; 8];
            w.copy_from_slice(c);
            order.u64_from(w)
        })
        .collect())
}

pub(crate) fn read_body(
    bytes: &mut ByteReader,
    order: ByteOrder,
    base_count: u64,
    word_count: u64,
) -> Result<Vec<u8>> {
    let seq = read_words(bytes, order, word_count)?;
    let mask = read_words(bytes, order, word_count)?;
    unpack(&seq, &mask, base_count as usize)
}

pub fn read_record(bytes: &mut ByteReader, order: ByteOrder) -> Result<Option<ReferenceSequence>> {
    if bytes.at_eof()? {
        return Ok(None);
    }

    let (name, base_count, word_count) = read_header(bytes, order)?;
    let bases = read_body(bytes, order, base_count, word_count).map_err(|e| e.with_record_id(&name))?;
    Ok(Some(ReferenceSequence { name, bases }))
}

pub fn decode(bytes: &[u8], order: ByteOrder) -> Result<ReferenceSequence> {
    let mut reader = ByteReader::from_slice(bytes);
    read_record(&mut reader, order)?.ok_or_else(|| Error::format(0, "no record in empty input"))
}

pub fn decode_all(bytes: &[u8], order: ByteOrder) -> Result<Vec<ReferenceSequence>> {
    let mut reader = ByteReader::from_slice(bytes);
    let mut sequences = Vec::new();
    while let Some(s) = read_record(&mut reader, order)? {
        sequences.push(s);
    }
    Ok(sequences)
}

pub fn encode_into(out: &mut Vec<u8>, name: &str, bases: &[u8], order: ByteOrder) -> Result<()> {
    let (seq, mask) = pack(bases).map_err(|e| e.with_record_id(name))?;

    let mut record = Vec::with_capacity(name.len() + 13 + seq.len() * 16);
    write_name(&mut record, name, order).map_err(|e| e.with_record_id(name))?;
    order.put_i32(&mut record, count_to_i32(bases.len(), "base count")?);
    order.put_i32(&mut record, count_to_i32(seq.len(), "word count")?);
    for w in seq.iter().chain(mask.iter()) {
        order.put_u64(&mut record, *w);
    }

    out.extend_from_slice(&record);
    Ok(())
}

pub fn encode(name: &str, bases: &[u8], order: ByteOrder) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(&mut out, name, bases, order)?;
    Ok(out)
}
