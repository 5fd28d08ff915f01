//! # Codec
//!
//! Endian-stable fixed-width and varint encoding shared by the `batch`, `wal`,
//! and `memtable` crates.
//!
//! Two encodings are provided:
//! - **Fixed-width**: `fixed32`/`fixed64`, always little-endian, always the
//!   same number of bytes. Used for the write-batch header and the memtable
//!   entry tag.
//! - **Varint**: base-128, 7 value bits per byte, continuation bit set on
//!   every byte but the last. Used for lengths, which are usually small.
//!
//! All decode functions are fallible: a truncated buffer or a varint that
//! never terminates within its maximum byte count is corruption, not silent
//! truncation.

use thiserror::Error;

/// Errors produced while decoding a fixed-width or varint-encoded value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before the expected number of bytes were available.
    #[error("truncated input: needed at least {needed} bytes, had {had}")]
    Truncated {
        /// Minimum number of bytes required to decode the value.
        needed: usize,
        /// Number of bytes actually available.
        had: usize,
    },
    /// A varint never set its continuation bit to zero within the maximum
    /// byte count for its width (5 bytes for 32-bit, 10 for 64-bit).
    #[error("malformed varint: continuation bit set past the maximum byte count")]
    MalformedVarint,
}

type Result<T> = std::result::Result<T, CodecError>;

/// Writes `v` into `buf[0..4]` as little-endian.
///
/// # Panics
/// Panics if `buf.len() < 4`.
pub fn encode_fixed32(buf: &mut [u8], v: u32) {
    buf[0..4].copy_from_slice(&v.to_le_bytes());
}

/// Writes `v` into `buf[0..8]` as little-endian.
///
/// # Panics
/// Panics if `buf.len() < 8`.
pub fn encode_fixed64(buf: &mut [u8], v: u64) {
    buf[0..8].copy_from_slice(&v.to_le_bytes());
}

/// Reads a little-endian `u32` from `buf[0..4]`.
///
/// # Panics
/// Panics if `buf.len() < 4`.
pub fn decode_fixed32(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[0..4].try_into().unwrap())
}

/// Reads a little-endian `u64` from `buf[0..8]`.
///
/// # Panics
/// Panics if `buf.len() < 8`.
pub fn decode_fixed64(buf: &[u8]) -> u64 {
    u64::from_le_bytes(buf[0..8].try_into().unwrap())
}

/// Appends the little-endian encoding of `v` to `dst`.
pub fn put_fixed32(dst: &mut Vec<u8>, v: u32) {
    dst.extend_from_slice(&v.to_le_bytes());
}

/// Appends the little-endian encoding of `v` to `dst`.
pub fn put_fixed64(dst: &mut Vec<u8>, v: u64) {
    dst.extend_from_slice(&v.to_le_bytes());
}

/// Number of bytes `encode_varint64` would emit for `v`.
///
/// Used by callers that need to reserve space or compute an encoded entry's
/// total size before writing it (the memtable entry layout does this).
pub fn varint_length(mut v: u64) -> usize {
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

/// Appends the varint32 encoding of `v` to `dst`. 1-5 bytes.
pub fn put_varint32(dst: &mut Vec<u8>, v: u32) {
    put_varint64(dst, v as u64);
}

/// Appends the varint64 encoding of `v` to `dst`. 1-10 bytes.
pub fn put_varint64(dst: &mut Vec<u8>, mut v: u64) {
    loop {
        if v < 0x80 {
            dst.push(v as u8);
            break;
        }
        dst.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
}

/// Decodes a varint32 from the start of `input`.
///
/// Returns the decoded value and the number of bytes consumed. Fails with
/// [`CodecError::Truncated`] if `input` is exhausted before a terminating
/// byte, or [`CodecError::MalformedVarint`] if the continuation bit is still
/// set after 5 bytes (the encoding is corrupt; no 32-bit value needs more).
pub fn decode_varint32(input: &[u8]) -> Result<(u32, usize)> {
    let (v, n) = decode_varint_impl(input, 5)?;
    Ok((v as u32, n))
}

/// Decodes a varint64 from the start of `input`. See [`decode_varint32`].
pub fn decode_varint64(input: &[u8]) -> Result<(u64, usize)> {
    decode_varint_impl(input, 10)
}

fn decode_varint_impl(input: &[u8], max_bytes: usize) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    for (i, &byte) in input.iter().take(max_bytes).enumerate() {
        result |= ((byte & 0x7f) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
    }
    if input.len() < max_bytes {
        Err(CodecError::Truncated {
            needed: input.len() + 1,
            had: input.len(),
        })
    } else {
        Err(CodecError::MalformedVarint)
    }
}

/// Appends a varint32 length prefix followed by `s` itself.
pub fn put_length_prefixed_slice(dst: &mut Vec<u8>, s: &[u8]) {
    put_varint32(dst, s.len() as u32);
    dst.extend_from_slice(s);
}

/// Reads a length-prefixed slice from the start of `input`.
///
/// Returns the slice and the total number of bytes consumed (prefix +
/// payload). Fails if the length prefix is malformed or the payload is
/// shorter than the decoded length.
pub fn get_length_prefixed_slice(input: &[u8]) -> Result<(&[u8], usize)> {
    let (len, prefix_len) = decode_varint32(input)?;
    let len = len as usize;
    let end = prefix_len
        .checked_add(len)
        .filter(|&e| e <= input.len())
        .ok_or(CodecError::Truncated {
            needed: prefix_len + len,
            had: input.len(),
        })?;
    Ok((&input[prefix_len..end], end))
}

#[cfg(test)]
mod tests;
