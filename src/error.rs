/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use thiserror::Error;

use crate::digest::Tag;

/// Errors that can occur while parsing a record stream (ours or a prior
/// run's). These are fatal for the input file being read, never for the
/// run as a whole.
#[derive(Debug, Error)]
pub enum RecordParseError {
    #[error("line {line}: 'pathmd5' missing")]
    MissingPathMd5 { line: u64 },

    #[error("line {line}: '{field}' has wrong length for {tag:?}: expected {expected} bytes, got {actual}")]
    BadDigestLength {
        line: u64,
        field: &'static str,
        tag: Tag,
        expected: usize,
        actual: usize,
    },

    #[error("line {line}: odd-length hex string in '{field}'")]
    OddLengthHex { line: u64, field: &'static str },

    #[error("line {line}: non-hex character in '{field}'")]
    NonHexChar { line: u64, field: &'static str },

    #[error("line {line}: '{field}' is not an integer")]
    NonInteger { line: u64, field: &'static str },

    #[error("line {line}: duplicate key '{key}'")]
    DuplicateKey { line: u64, key: String },

    #[error("line {line}: invalid json: {source}")]
    Json { line: u64, source: serde_json::Error },
}

pub type Result<T> = std::result::Result<T, RecordParseError>;
