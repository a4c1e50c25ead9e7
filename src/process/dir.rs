/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Directory creation (preorder) and ownership fixup (postorder), spec.md
//! §4.I, grounded on `original_source/src/impl/dcp.c`'s `FTS_D` case and
//! `original_source/src/process_directory.c`.

use nix::sys::stat::{mkdirat, Mode};
use nix::unistd::{fchownat, FchownatFlags, Gid, Uid};

use crate::path::DestDir;
use crate::record::model::{Record, RecordBuilder, StatAttrs, State};

/// Create the directory on preorder visit. An already-existing directory
/// is not an error (two sources may share a destination subtree).
pub fn create_dir(dest: &DestDir, newpath: &str, stat_attrs: StatAttrs, pathmd5: [u8; 16]) -> Record {
    let state = match mkdirat(dest.raw_fd(), newpath, Mode::from_bits_truncate(0o777)) {
        Ok(()) => State::DirCreated,
        Err(nix::errno::Errno::EEXIST) => State::DirCreated,
        Err(e) => {
            log::warn!("cannot create dir '{}': {}", dest.pathstr(newpath), e);
            State::DirFailed
        }
    };
    RecordBuilder::new(pathmd5, state).attrs(stat_attrs).build()
}

/// Fix ownership on postorder visit, once every child has been created.
pub fn finalize_dir(dest: &DestDir, newpath: &str, uid: u32, gid: u32) {
    if let Err(e) = fchownat(
        Some(dest.raw_fd()),
        newpath,
        Some(Uid::from_raw(uid)),
        Some(Gid::from_raw(gid)),
        FchownatFlags::NoFollowSymlink,
    ) {
        log::warn!("cannot chown '{}': {}", dest.pathstr(newpath), e);
    }
}
