/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Symlink recreation (spec.md §4.I), grounded on
//! `original_source/src/impl/process_symlink.c`.

use std::path::Path;

use nix::errno::Errno;
use nix::unistd::{readlink, symlinkat, unlinkat, UnlinkatFlags};

use crate::path::DestDir;
use crate::record::model::{PathField, Record, RecordBuilder, StatAttrs, State};

pub fn process_symlink(
    dest: &DestDir,
    newpath: &str,
    oldpath: &Path,
    stat_attrs: StatAttrs,
    pathmd5: [u8; 16],
) -> Record {
    let target = match readlink(oldpath) {
        Ok(t) => t,
        Err(_) => {
            log::warn!("cannot read symlink '{}'", oldpath.display());
            return RecordBuilder::new(pathmd5, State::FileFailed)
                .attrs(stat_attrs)
                .build();
        }
    };

    let mut retried = false;
    loop {
        match symlinkat(target.as_os_str(), Some(dest.raw_fd()), newpath) {
            Ok(()) => break,
            Err(Errno::EEXIST) if !retried => {
                retried = true;
                if unlinkat(Some(dest.raw_fd()), newpath, UnlinkatFlags::NoRemoveDir).is_err() {
                    log::warn!("cannot unlink '{}'", dest.pathstr(newpath));
                    return RecordBuilder::new(pathmd5, State::FileFailed)
                        .attrs(stat_attrs)
                        .symlink_target(PathField::from_os_bytes(target.as_os_str().as_encoded_bytes()))
                        .build();
                }
            }
            Err(_) => {
                log::warn!("cannot create symlink '{}'", dest.pathstr(newpath));
                return RecordBuilder::new(pathmd5, State::FileFailed)
                    .attrs(stat_attrs)
                    .symlink_target(PathField::from_os_bytes(target.as_os_str().as_encoded_bytes()))
                    .build();
            }
        }
    }

    RecordBuilder::new(pathmd5, State::SymlinkCreated)
        .attrs(stat_attrs)
        .symlink_target(PathField::from_os_bytes(target.as_os_str().as_encoded_bytes()))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TempDir;
    use nix::fcntl::OFlag;
    use nix::sys::stat::Mode;
    use std::os::fd::{FromRawFd, OwnedFd};

    fn open_dir(path: &Path) -> DestDir {
        let fd = nix::fcntl::open(path, OFlag::O_RDONLY | OFlag::O_DIRECTORY, Mode::empty()).unwrap();
        DestDir::new(unsafe { OwnedFd::from_raw_fd(fd) }, String::new())
    }

    fn dummy_attrs() -> StatAttrs {
        StatAttrs {
            uid: 0,
            gid: 0,
            mode: 0o120777,
            size: 0,
            atime: (0, 0),
            mtime: (0, 0),
            ctime: (0, 0),
        }
    }

    #[test]
    fn recreates_symlink_pointing_at_target() {
        let src_dir = TempDir::new();
        let dst_dir = TempDir::new();
        let link_path = src_dir.path().join("link");
        std::os::unix::fs::symlink("/etc/hosts", &link_path).unwrap();

        let dest = open_dir(dst_dir.path());
        let record = process_symlink(&dest, "link", &link_path, dummy_attrs(), [3u8; 16]);

        assert_eq!(record.state, State::SymlinkCreated);
        assert_eq!(
            record.symlink_target,
            Some(PathField::Utf8("/etc/hosts".to_string()))
        );
        let recreated = std::fs::read_link(dst_dir.path().join("link")).unwrap();
        assert_eq!(recreated, Path::new("/etc/hosts"));
    }

    #[test]
    fn recreating_over_existing_link_unlinks_first() {
        let src_dir = TempDir::new();
        let dst_dir = TempDir::new();
        let link_path = src_dir.path().join("link");
        std::os::unix::fs::symlink("/new-target", &link_path).unwrap();
        std::os::unix::fs::symlink("/old-target", dst_dir.path().join("link")).unwrap();

        let dest = open_dir(dst_dir.path());
        let record = process_symlink(&dest, "link", &link_path, dummy_attrs(), [4u8; 16]);

        assert_eq!(record.state, State::SymlinkCreated);
        let recreated = std::fs::read_link(dst_dir.path().join("link")).unwrap();
        assert_eq!(recreated, Path::new("/new-target"));
    }
}
