/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Lowercase hex packing, grounded on `original_source/src/pack.c`. Kept
//! hand-rolled rather than delegated to the `hex` crate so that decode
//! errors can carry the source line number the record codec needs.

/// Decode a lowercase or uppercase hex string of even length into `dest`.
///
/// Returns the number of bytes written. `dest` must be at least
/// `hex.len() / 2` bytes. An odd-length string or a non-hex character
/// fails with the offending 1-based `line` attached.
pub fn pack(dest: &mut [u8], hex: &str, line: u64) -> Result<usize, HexError> {
    let bytes = hex.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(HexError::OddLength { line });
    }
    let n = bytes.len() / 2;
    if n > dest.len() {
        return Err(HexError::TooLong { line });
    }
    for i in 0..n {
        let hi = hex_nibble(bytes[2 * i], line)?;
        let lo = hex_nibble(bytes[2 * i + 1], line)?;
        dest[i] = (hi << 4) | lo;
    }
    Ok(n)
}

fn hex_nibble(c: u8, line: u64) -> Result<u8, HexError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(HexError::NonHexChar { line }),
    }
}

/// Write exactly `2 * src.len()` lowercase hex characters into a `String`.
/// There is no error path: every byte maps to two valid hex characters.
pub fn unpack(src: &[u8]) -> String {
    let mut out = String::with_capacity(src.len() * 2);
    for b in src {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum HexError {
    #[error("line {line}: odd-length hex string")]
    OddLength { line: u64 },
    #[error("line {line}: hex string longer than destination buffer")]
    TooLong { line: u64 },
    #[error("line {line}: invalid hex character")]
    NonHexChar { line: u64 },
}
