/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! An open destination directory paired with its display path, grounded
//! on `original_source/src/impl/process.h`'s `file_t` and on
//! `diffuzzer/src/path.rs`'s `LocalPath` wrapper. All `*at` calls against
//! the destination tree go through the directory fd held here rather
//! than through `AT_FDCWD`, since a real directory fd is always
//! available once `root::resolve` has run (spec.md §4.M).

use std::fmt;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

/// Open handle to a directory in the destination tree, plus the path
/// used to describe it in log/verbose output.
pub struct DestDir {
    fd: OwnedFd,
    path: String,
}

impl DestDir {
    pub fn new(fd: OwnedFd, path: String) -> DestDir {
        DestDir { fd, path }
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn display_path(&self) -> &str {
        &self.path
    }

    /// Join `rel` onto this directory's display path the way
    /// `pathstr()` does in `original_source/src/preprocess.c`.
    pub fn pathstr(&self, rel: &str) -> String {
        if self.path.is_empty() {
            rel.to_string()
        } else {
            format!("{}/{}", self.path, rel)
        }
    }
}

impl fmt::Display for DestDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
