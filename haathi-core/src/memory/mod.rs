//! Guest linear-memory helpers.
//!
//! Responsibilities:
//! - Decode strings the guest passes by offset, either null-terminated or length-delimited.
//! - Hand out bounds-checked byte views for storage keys/values.
//! - Hand out bounds-checked mutable views for copying host bytes back into guest memory.
//!
//! All helpers take a plain `&[u8]` / `&mut [u8]` view. Callers obtain a fresh view from the
//! wasmtime `Memory` on every import call, because the guest may grow its memory between calls.
//!
//! String decoding is byte-per-character (each byte becomes the code point of the same value).
//! In null-terminated mode the byte `0xC2` is dropped, so the UTF-8 lead byte of U+0080..U+00BF
//! disappears and its continuation byte lands on the intended glyph (`C2 AF` -> `¯`).

use thiserror::Error;

/// Byte skipped by [`read_cstr`].
pub const FILLER_BYTE: u8 = 0xC2;

/// Errors from decoding guest memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("range {offset}+{len} is outside guest memory of {memory_size} bytes")]
    OutOfBounds {
        offset: u32,
        len: u32,
        memory_size: usize,
    },
    #[error("no terminator after offset {offset} in guest memory of {memory_size} bytes")]
    Unterminated { offset: u32, memory_size: usize },
}

/// Borrow `len` bytes starting at `offset`.
pub fn read_bytes(memory: &[u8], offset: u32, len: u32) -> Result<&[u8], DecodeError> {
    let start = offset as usize;
    start
        .checked_add(len as usize)
        .and_then(|end| memory.get(start..end))
        .ok_or(DecodeError::OutOfBounds {
            offset,
            len,
            memory_size: memory.len(),
        })
}

/// Decode a null-terminated string starting at `offset`.
///
/// Stops at the first zero byte. [`FILLER_BYTE`] is skipped wherever it appears.
/// Fails if `offset` is outside memory or no zero byte occurs before the end of memory.
pub fn read_cstr(memory: &[u8], offset: u32) -> Result<String, DecodeError> {
    let tail = memory
        .get(offset as usize..)
        .filter(|tail| !tail.is_empty())
        .ok_or(DecodeError::OutOfBounds {
            offset,
            len: 1,
            memory_size: memory.len(),
        })?;

    let end = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::Unterminated {
            offset,
            memory_size: memory.len(),
        })?;

    Ok(tail[..end]
        .iter()
        .filter(|&&b| b != FILLER_BYTE)
        .map(|&b| char::from(b))
        .collect())
}

/// Decode exactly `len` bytes starting at `offset`, with no terminator or filler handling.
pub fn read_str(memory: &[u8], offset: u32, len: u32) -> Result<String, DecodeError> {
    Ok(read_bytes(memory, offset, len)?
        .iter()
        .map(|&b| char::from(b))
        .collect())
}

/// Mutably borrow `len` bytes starting at `offset`.
pub fn read_bytes_mut(memory: &mut [u8], offset: u32, len: u32) -> Result<&mut [u8], DecodeError> {
    let memory_size = memory.len();
    let start = offset as usize;
    start
        .checked_add(len as usize)
        .and_then(|end| memory.get_mut(start..end))
        .ok_or(DecodeError::OutOfBounds {
            offset,
            len,
            memory_size,
        })
}
