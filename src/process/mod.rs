/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Per-entry-type processors (spec.md §4.H, §4.I, §4.J), grounded on
//! `original_source/src/impl/process_{regular,symlink,special}.c`,
//! `original_source/src/process_directory.c` and
//! `original_source/src/preprocess.c`.

pub mod dir;
pub mod preprocess;
pub mod regular;
pub mod special;
pub mod symlink;

use std::cell::RefCell;

use crate::digest::Mask;
use crate::index::Index;

/// Parameters shared by every processor for the duration of one run,
/// grounded on `original_source/src/impl/process.h`'s `process_opts`.
pub struct ProcessOpts<'a> {
    pub digests: Mask,
    pub uid: u32,
    pub gid: u32,
    pub buffer_size: usize,
    pub index: Option<&'a RefCell<Index>>,
    pub verbose: bool,
}
