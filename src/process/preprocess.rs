/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Destination-exists resolution (spec.md §4.J), grounded on
//! `original_source/src/preprocess.c`.

use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::AtFlags;
use nix::sys::stat::{fstatat, SFlag};
use nix::unistd::{unlinkat, UnlinkatFlags};

use crate::path::DestDir;

/// What preprocess found at the destination before the real copy ran.
#[derive(Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Destination does not exist yet, or is an existing directory that
    /// an incoming directory will simply reuse.
    ProceedNoOutput,
    /// A conflicting existing entry was removed; say so in verbose mode.
    Removed,
}

/// Resolve whether `newpath` can be (re)created at `dest`, removing a
/// conflicting non-directory/non-matching entry first. Mirrors the six
/// cases of `preprocess()` in the original: dest absent is a no-op;
/// dir-over-dir is a no-op; dir-over-non-dir and non-dir-over-dir are
/// hard errors; non-dir-over-non-dir unlinks the old entry. When
/// `verbose`, a removed entry is announced the way the original's `-v`
/// transcript does (spec.md §4.J step 5).
pub fn preprocess(
    dest: &DestDir,
    newpath: &str,
    incoming_is_dir: bool,
    verbose: bool,
) -> Result<Disposition, Errno> {
    let dirfd = dest.raw_fd();
    let existing = match fstatat(Some(dirfd), newpath, AtFlags::AT_SYMLINK_NOFOLLOW) {
        Ok(st) => st,
        Err(Errno::ENOENT) => return Ok(Disposition::ProceedNoOutput),
        Err(e) => return Err(e),
    };

    let existing_is_dir =
        (existing.st_mode & SFlag::S_IFMT.bits() as u32) == SFlag::S_IFDIR.bits() as u32;

    if incoming_is_dir {
        if existing_is_dir {
            return Ok(Disposition::ProceedNoOutput);
        }
        return Err(Errno::EEXIST);
    }

    if existing_is_dir {
        return Err(Errno::EISDIR);
    }

    unlinkat(Some(dirfd), newpath, UnlinkatFlags::NoRemoveDir)?;
    if verbose {
        log::info!("removed '{}'", dest.pathstr(newpath));
    }
    Ok(Disposition::Removed)
}

/// Recompute the display path of `oldpath` against `dest`/`newpath` for
/// the `-v` transcript the original prints via `pathstr()`.
pub fn describe_transfer(oldpath: &Path, dest: &DestDir, newpath: &str) -> String {
    format!("`{}' -> `{}'", oldpath.display(), dest.pathstr(newpath))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TempDir;
    use std::os::fd::{FromRawFd, OwnedFd};

    fn open_tempdir() -> (TempDir, DestDir) {
        let dir = TempDir::new();
        let fd = nix::fcntl::open(
            dir.path(),
            nix::fcntl::OFlag::O_RDONLY | nix::fcntl::OFlag::O_DIRECTORY,
            nix::sys::stat::Mode::empty(),
        )
        .unwrap();
        let owned: OwnedFd = unsafe { OwnedFd::from_raw_fd(fd) };
        (dir, DestDir::new(owned, String::new()))
    }

    #[test]
    fn missing_destination_proceeds() {
        let (_dir, dest) = open_tempdir();
        let outcome = preprocess(&dest, "missing.txt", false, false).unwrap();
        assert_eq!(outcome, Disposition::ProceedNoOutput);
    }

    #[test]
    fn existing_file_over_existing_file_is_removed() {
        let (dir, dest) = open_tempdir();
        std::fs::write(dir.path().join("a.txt"), b"old").unwrap();
        let outcome = preprocess(&dest, "a.txt", false, false).unwrap();
        assert_eq!(outcome, Disposition::Removed);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[test]
    fn directory_over_existing_directory_is_noop() {
        let (dir, dest) = open_tempdir();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let outcome = preprocess(&dest, "sub", true, false).unwrap();
        assert_eq!(outcome, Disposition::ProceedNoOutput);
    }

    #[test]
    fn directory_over_existing_file_is_error() {
        let (dir, dest) = open_tempdir();
        std::fs::write(dir.path().join("a.txt"), b"old").unwrap();
        let err = preprocess(&dest, "a.txt", true, false).unwrap_err();
        assert_eq!(err, Errno::EEXIST);
    }

    #[test]
    fn file_over_existing_directory_is_error() {
        let (dir, dest) = open_tempdir();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let err = preprocess(&dest, "sub", false, false).unwrap_err();
        assert_eq!(err, Errno::EISDIR);
    }
}
