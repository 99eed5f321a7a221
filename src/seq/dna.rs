//! 2-bit nucleotide codes shared by the packed binary formats.

pub const A: u8 = 0b00;
pub const C: u8 = 0b01;
pub const G: u8 = 0b10;
pub const T: u8 = 0b11;

/// Symbol used for any base a packed format marks as unknown.
pub const UNKNOWN: u8 = b'N';

pub const ASCII_LOOKUP: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// 2-bit code of an ASCII nucleotide, case-insensitive. `None` for anything outside ACGT.
#[inline(always)]
pub fn dna_to_code(b: u8) -> Option<u8> {
    match b {
        b'A' | b'a' => Some(A),
        b'C' | b'c' => Some(C),
        b'G' | b'g' => Some(G),
        b'T' | b't' => Some(T),
        _ => None,
    }
}

#[inline(always)]
pub fn code_to_dna(code: u8) -> u8 {
    ASCII_LOOKUP[(code & 0b11) as usize]
}

#[inline(always)]
pub fn is_unknown(b: u8) -> bool {
    b == b'N' || b == b'n'
}
