/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Resolve the destination argument into an open root directory and an
//! optional rename, spec.md §4.M, grounded on
//! `original_source/src/impl/dcp.c`'s `initdestandpaths`.

use std::os::fd::{FromRawFd, OwnedFd};
use std::path::Path;

use anyhow::{bail, Context};
use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;

use crate::path::DestDir;

/// Where new entries should land, and whether a single top-level source
/// should be renamed to the destination's own basename.
pub struct RootResolution {
    pub dest: DestDir,
    /// `Some(name)` when `newpath` does not exist (or exists as a
    /// non-directory being replaced): the lone source is renamed to
    /// `name` at the destination root. `None` when `newpath` is an
    /// existing directory: every source keeps its own basename.
    pub rename_to: Option<String>,
}

/// Mirrors the three branches of `initdestandpaths`: `newpath` is an
/// existing directory; `newpath` does not exist; `newpath` exists but is
/// not a directory. The latter two require exactly one source.
pub fn resolve(newpath: &Path, source_count: usize) -> anyhow::Result<RootResolution> {
    let trimmed = trim_trailing_slashes(newpath);

    match open_dir(&trimmed) {
        Ok(fd) => {
            return Ok(RootResolution {
                dest: DestDir::new(fd, trimmed.display().to_string()),
                rename_to: None,
            });
        }
        Err(nix::errno::Errno::ENOENT) => {
            if source_count > 1 {
                bail!("target `{}' is not a directory", trimmed.display());
            }
            let (parent, name) = split_parent_and_name(&trimmed)?;
            let fd = open_dir(&parent)
                .with_context(|| format!("cannot open target parent `{}'", parent.display()))?;
            return Ok(RootResolution {
                dest: DestDir::new(fd, parent.display().to_string()),
                rename_to: Some(name),
            });
        }
        Err(nix::errno::Errno::ENOTDIR) => {
            if source_count > 1 {
                bail!("target `{}' is not a directory", trimmed.display());
            }
            let real = std::fs::canonicalize(&trimmed)
                .with_context(|| format!("cannot resolve target `{}'", trimmed.display()))?;
            let (parent, name) = split_parent_and_name(&real)?;
            let fd = open_dir(&parent)
                .with_context(|| format!("cannot open target parent `{}'", parent.display()))?;
            return Ok(RootResolution {
                dest: DestDir::new(fd, parent.display().to_string()),
                rename_to: Some(name),
            });
        }
        Err(e) => bail!("cannot open `{}': {}", trimmed.display(), e),
    }
}

fn trim_trailing_slashes(path: &Path) -> std::path::PathBuf {
    let s = path.to_string_lossy();
    let trimmed = s.trim_end_matches('/');
    if trimmed.is_empty() {
        std::path::PathBuf::from("/")
    } else {
        std::path::PathBuf::from(trimmed)
    }
}

fn split_parent_and_name(path: &Path) -> anyhow::Result<(std::path::PathBuf, String)> {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                std::path::PathBuf::from(".")
            } else {
                parent.to_path_buf()
            };
            Ok((parent, name.to_string_lossy().into_owned()))
        }
        _ => bail!("cannot determine parent directory of `{}'", path.display()),
    }
}

fn open_dir(path: &Path) -> nix::Result<OwnedFd> {
    let raw = fcntl::open(path, OFlag::O_RDONLY | OFlag::O_DIRECTORY, Mode::empty())?;
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}
