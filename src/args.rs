/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! CLI surface (spec.md §4.O), mirroring `diffuzzer/src/args.rs` and
//! `hasher/src/args.rs`'s `#[derive(Parser)]` idiom.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Destination directory (or path to create, for a single source)
    #[arg(long)]
    pub to: PathBuf,

    /// One or more source files or directories to copy
    #[arg(required = true)]
    pub source: Vec<PathBuf>,

    /// Digest algorithms to compute, comma-separated or repeated
    /// (md5, sha1, sha256, sha512)
    #[arg(long, value_delimiter = ',')]
    pub digest: Vec<String>,

    /// Prior run's output, loaded as a dedup index before copying starts
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Owner to assign to every created entry (default: current user)
    #[arg(long)]
    pub uid: Option<u32>,

    /// Group to assign to every created entry (default: current group)
    #[arg(long)]
    pub gid: Option<u32>,

    /// Log the source/destination path of every entry as it is processed
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Extended-attribute record sink (default: `<output>.xattrs`)
    #[arg(long)]
    pub xattr_out: Option<PathBuf>,

    /// Path to configuration file in TOML format
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Where to write the record stream (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
