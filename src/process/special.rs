/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Special device file recreation (spec.md §4.I), grounded on
//! `original_source/src/impl/process_special.c`.

use nix::sys::stat::{mknodat, Mode, SFlag};
use nix::unistd::{fchownat, FchownatFlags, Gid, Uid};

use crate::path::DestDir;
use crate::record::model::{Record, RecordBuilder, StatAttrs, State};

use super::ProcessOpts;

pub fn process_special(
    dest: &DestDir,
    newpath: &str,
    stat_attrs: StatAttrs,
    rdev: u64,
    pathmd5: [u8; 16],
    opts: &ProcessOpts,
) -> Record {
    let kind = SFlag::from_bits_truncate(stat_attrs.mode & libc::S_IFMT);
    let perm = Mode::from_bits_truncate(0o666);

    let state = match mknodat(dest.raw_fd(), newpath, kind, perm, rdev) {
        Ok(()) => {
            if let Err(e) = fchownat(
                Some(dest.raw_fd()),
                newpath,
                Some(Uid::from_raw(opts.uid)),
                Some(Gid::from_raw(opts.gid)),
                FchownatFlags::NoFollowSymlink,
            ) {
                log::warn!("cannot chown '{}': {}", dest.pathstr(newpath), e);
            }
            State::SpecialCreated
        }
        Err(e) => {
            log::warn!("cannot create special file '{}': {}", dest.pathstr(newpath), e);
            State::FileFailed
        }
    };

    RecordBuilder::new(pathmd5, state).attrs(stat_attrs).build()
}
