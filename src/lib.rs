/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Content-addressed, deduplicating file-tree copier: walks source
//! trees, recreates them under a destination, and reports what happened
//! as a newline-delimited JSON record stream (spec.md §1).

pub mod args;
pub mod config;
pub mod digest;
pub mod error;
pub mod index;
pub mod ioutil;
pub mod output;
pub mod path;
pub mod process;
pub mod record;
pub mod root;
pub mod walk;

#[cfg(test)]
mod testutil;
