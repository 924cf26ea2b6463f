use crate::shared::field::hex_nibble;
use thiserror::Error;

pub const SENTENCE_START: u8 = b'$';
pub const CHECKSUM_MARKER: u8 = b'*';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChecksumError {
    #[error("no checksum marker within {0} bytes")]
    MarkerNotFound(usize),
    #[error("checksum marker not followed by two hex digits")]
    Truncated,
}

// XOR of every byte strictly between '$' and '*'.
// Callers hand in the bytes already stripped of both markers.
pub fn xor_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0_u8, |ck, byte| ck ^ byte)
}

// Index of the first checksum marker, searched over the whole slice.
pub fn find_checksum_marker(sentence: &[u8]) -> Result<usize, ChecksumError> {
    sentence
        .iter()
        .position(|&byte| byte == CHECKSUM_MARKER)
        .ok_or(ChecksumError::MarkerNotFound(sentence.len()))
}

// Read the two ASCII hex digits right after the checksum marker.
pub fn checksum_field(sentence: &[u8]) -> Result<u8, ChecksumError> {
    let marker = find_checksum_marker(sentence)?;
    match sentence.get(marker + 1..marker + 3) {
        Some(&[hi, lo]) => Ok((hex_nibble(hi) << 4) | hex_nibble(lo)),
        _ => Err(ChecksumError::Truncated),
    }
}

// UBX Fletcher-like checksum over class/id/length/payload bytes.
pub fn ubx_checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a = 0_u8;
    let mut ck_b = 0_u8;
    for byte in data {
        ck_a = ck_a.wrapping_add(*byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}
