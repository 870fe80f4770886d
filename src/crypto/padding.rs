//! PKCS#7 padding
//!
//! A full block of padding is appended when the input is already
//! block-aligned, so removal is never ambiguous.

use crate::config::crypto::BLOCK_SIZE;
use crate::crypto::CipherError;
use heapless::Vec;

/// Copy `data` and append 1..=16 padding bytes, each equal to the pad length
pub fn pkcs7_pad<const N: usize>(data: &[u8]) -> Result<Vec<u8, N>, CipherError> {
    let pad = BLOCK_SIZE - (data.len() % BLOCK_SIZE);

    let mut out = Vec::new();
    out.extend_from_slice(data)
        .map_err(|_| CipherError::Overflow)?;
    for _ in 0..pad {
        out.push(pad as u8).map_err(|_| CipherError::Overflow)?;
    }
    Ok(out)
}

/// Validate and strip padding
pub fn pkcs7_unpad(data: &[u8]) -> Result<&[u8], CipherError> {
    if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::Length);
    }

    let pad = data[data.len() - 1] as usize;
    if pad == 0 || pad > BLOCK_SIZE {
        return Err(CipherError::Padding);
    }

    let (body, tail) = data.split_at(data.len() - pad);
    if tail.iter().any(|&b| b as usize != pad) {
        return Err(CipherError::Padding);
    }

    Ok(body)
}
