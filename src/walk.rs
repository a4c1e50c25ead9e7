/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The directory walk driver (spec.md §4.K), grounded on
//! `original_source/src/impl/dcp.c`'s `dcp()`. `walkdir` only yields
//! preorder directory events, so postorder events are synthesized with
//! a one-entry lookahead and a stack of directories still open
//! (spec.md §9's resolution of the walk-driver open question).

use std::collections::VecDeque;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};

use digest::Digest as _;
use walkdir::{DirEntry, WalkDir};

use crate::process::preprocess::{describe_transfer, preprocess, Disposition};
use crate::process::{dir, regular, special, symlink, ProcessOpts};
use crate::record::model::{Record, RecordBuilder, StatAttrs, State};
use crate::root::RootResolution;

enum EventKind {
    PreDir,
    PostDir,
    Leaf,
}

struct Event {
    entry: DirEntry,
    kind: EventKind,
}

/// Turns a single preorder-only `walkdir` iterator into preorder +
/// synthesized postorder directory events.
struct PostorderWalk {
    inner: walkdir::IntoIter,
    pending: VecDeque<Event>,
    stack: Vec<DirEntry>,
}

impl PostorderWalk {
    fn new(root: &Path) -> PostorderWalk {
        PostorderWalk {
            inner: WalkDir::new(root).follow_links(false).into_iter(),
            pending: VecDeque::new(),
            stack: Vec::new(),
        }
    }
}

impl Iterator for PostorderWalk {
    type Item = walkdir::Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Some(Ok(ev));
            }
            match self.inner.next() {
                None => {
                    return self
                        .stack
                        .pop()
                        .map(|entry| Ok(Event { entry, kind: EventKind::PostDir }));
                }
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(entry)) => {
                    while let Some(top) = self.stack.last() {
                        if entry.depth() <= top.depth() {
                            let dir = self.stack.pop().unwrap();
                            self.pending.push_back(Event {
                                entry: dir,
                                kind: EventKind::PostDir,
                            });
                        } else {
                            break;
                        }
                    }
                    let is_dir = entry.file_type().is_dir();
                    if is_dir {
                        self.stack.push(entry.clone());
                    }
                    self.pending.push_back(Event {
                        entry,
                        kind: if is_dir { EventKind::PreDir } else { EventKind::Leaf },
                    });
                }
            }
        }
    }
}

/// One callback invocation per processed entry: the finished record (if
/// any was produced — a dedup hit produces none) plus the source-side
/// path, used by the output layer to also dump extended attributes.
pub fn walk<F>(
    sources: &[PathBuf],
    resolution: &RootResolution,
    opts: &ProcessOpts,
    mut on_record: F,
) -> anyhow::Result<()>
where
    F: FnMut(Record, Option<&Path>),
{
    for source in sources {
        walk_one_source(source, resolution, opts, &mut on_record);
    }
    Ok(())
}

fn walk_one_source<F>(source: &Path, resolution: &RootResolution, opts: &ProcessOpts, on_record: &mut F)
where
    F: FnMut(Record, Option<&Path>),
{
    let top_name = match &resolution.rename_to {
        Some(name) => name.clone(),
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string()),
    };
    let renaming = resolution.rename_to.is_some();

    for event in PostorderWalk::new(source) {
        let event = match event {
            Ok(ev) => ev,
            Err(e) => {
                log::error!("walk error: {}", e);
                let pathmd5 = match e.path() {
                    Some(path) => {
                        let (_, dap) = dest_rel_and_dap(source, path, &top_name, renaming, false);
                        pathmd5_of(&dap)
                    }
                    None => [0u8; 16],
                };
                on_record(failed_record(pathmd5), None);
                continue;
            }
        };

        let (dest_rel, dap) =
            dest_rel_and_dap(source, event.entry.path(), &top_name, renaming, event.entry.file_type().is_dir());
        let pathmd5 = pathmd5_of(&dap);

        if matches!(event.kind, EventKind::PostDir) {
            dir::finalize_dir(&resolution.dest, &dest_rel, opts.uid, opts.gid);
            continue;
        }

        let metadata = match event.entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::error!("cannot stat '{}': {}", event.entry.path().display(), e);
                on_record(failed_record(pathmd5), None);
                continue;
            }
        };
        let stat_attrs = stat_attrs_from(&metadata);

        if matches!(event.kind, EventKind::PreDir) {
            match preprocess(&resolution.dest, &dest_rel, true, opts.verbose) {
                Ok(Disposition::ProceedNoOutput) | Ok(Disposition::Removed) => {
                    if opts.verbose {
                        log::info!(
                            "{}",
                            describe_transfer(event.entry.path(), &resolution.dest, &dest_rel)
                        );
                    }
                }
                Err(e) => {
                    log::error!("cannot overwrite '{}': {}", dest_rel, e);
                    on_record(
                        RecordBuilder::new(pathmd5, State::DirFailed)
                            .attrs(stat_attrs)
                            .build(),
                        Some(event.entry.path()),
                    );
                    continue;
                }
            }
            let record = dir::create_dir(&resolution.dest, &dest_rel, stat_attrs, pathmd5);
            on_record(record, Some(event.entry.path()));
            continue;
        }

        let file_type = metadata.file_type();
        match preprocess(&resolution.dest, &dest_rel, false, opts.verbose) {
            Ok(_) => {
                if opts.verbose {
                    log::info!(
                        "{}",
                        describe_transfer(event.entry.path(), &resolution.dest, &dest_rel)
                    );
                }
            }
            Err(e) => {
                log::error!("cannot overwrite '{}': {}", dest_rel, e);
                on_record(
                    RecordBuilder::new(pathmd5, State::FileFailed)
                        .attrs(stat_attrs)
                        .build(),
                    Some(event.entry.path()),
                );
                continue;
            }
        }

        if file_type.is_file() {
            if let Some(record) = regular::process_regular(
                &resolution.dest,
                &dest_rel,
                event.entry.path(),
                stat_attrs,
                pathmd5,
                opts,
            ) {
                on_record(record, Some(event.entry.path()));
            }
        } else if file_type.is_symlink() {
            let record = symlink::process_symlink(
                &resolution.dest,
                &dest_rel,
                event.entry.path(),
                stat_attrs,
                pathmd5,
            );
            on_record(record, Some(event.entry.path()));
        } else if file_type.is_block_device()
            || file_type.is_char_device()
            || file_type.is_fifo()
            || file_type.is_socket()
        {
            let record = special::process_special(
                &resolution.dest,
                &dest_rel,
                stat_attrs,
                metadata.rdev(),
                pathmd5,
                opts,
            );
            on_record(record, Some(event.entry.path()));
        } else {
            log::error!("unknown file type for '{}'", event.entry.path().display());
            on_record(failed_record(pathmd5), Some(event.entry.path()));
        }
    }
}

fn failed_record(pathmd5: [u8; 16]) -> Record {
    RecordBuilder::new(pathmd5, State::FileFailed).build()
}

/// Destination-relative path and Destination-Absolute Path for one entry,
/// including the two DAP edge-case fixups (spec.md §4.K): a directory
/// renamed at depth zero reads as `/`, a file renamed at depth zero reads
/// as `/<dest-name>`.
fn dest_rel_and_dap(
    source: &Path,
    entry_path: &Path,
    top_name: &str,
    renaming: bool,
    is_dir: bool,
) -> (String, String) {
    let rel = entry_path
        .strip_prefix(source)
        .unwrap_or(entry_path)
        .to_string_lossy()
        .into_owned();

    let dest_rel = if rel.is_empty() {
        top_name.to_string()
    } else {
        format!("{}/{}", top_name, rel)
    };

    let dap = if renaming {
        if rel.is_empty() {
            String::new()
        } else {
            format!("/{}", rel)
        }
    } else {
        format!("/{}", dest_rel)
    };
    let dap = if dap.is_empty() {
        if is_dir {
            "/".to_string()
        } else {
            format!("/{}", dest_rel)
        }
    } else {
        dap
    };

    (dest_rel, dap)
}

fn pathmd5_of(dap: &str) -> [u8; 16] {
    let digest = md5::Md5::digest(dap.as_bytes());
    let mut pathmd5 = [0u8; 16];
    pathmd5.copy_from_slice(&digest);
    pathmd5
}

fn stat_attrs_from(metadata: &std::fs::Metadata) -> StatAttrs {
    StatAttrs {
        uid: metadata.uid(),
        gid: metadata.gid(),
        mode: metadata.mode(),
        size: metadata.size() as i64,
        atime: (metadata.atime(), metadata.atime_nsec()),
        mtime: (metadata.mtime(), metadata.mtime_nsec()),
        ctime: (metadata.ctime(), metadata.ctime_nsec()),
    }
}
