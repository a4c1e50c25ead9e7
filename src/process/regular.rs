/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Regular file copy-and-digest (spec.md §4.H), grounded on
//! `original_source/src/impl/process_regular.c`. Two branches: with an
//! index, the file is first fully digested into the cache buffer (or
//! streamed through it if too large) so a dedup hit skips the write
//! entirely and produces no output record at all, matching the
//! original's `goto cleanup` before its callback is ever reached;
//! without an index, copy and digest happen in the same pass.

use std::fs::File;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::path::Path;
use std::time::Instant;

use nix::fcntl::{self, posix_fadvise, OFlag, PosixFadviseAdvice};
use nix::sys::stat::Mode;
use nix::unistd::{fchown, Gid, Uid};

use crate::digest::set::DigesterSet;
use crate::digest::Tag;
use crate::ioutil;
use crate::path::DestDir;
use crate::record::model::{Record, RecordBuilder, StatAttrs, State};

use super::ProcessOpts;

/// Copy and/or digest one regular file. Returns `None` only for the
/// silent dedup-hit case; every other outcome, including failure,
/// produces a record.
pub fn process_regular(
    dest: &DestDir,
    newpath: &str,
    oldpath: &Path,
    stat_attrs: StatAttrs,
    pathmd5: [u8; 16],
    opts: &ProcessOpts,
) -> Option<Record> {
    let start = Instant::now();
    let index_tag = opts.index.map(|idx| idx.borrow().key_tag());
    let wanted = match index_tag {
        Some(tag) => opts.digests.with(tag),
        None => opts.digests,
    };

    let src = match File::open(oldpath) {
        Ok(f) => f,
        Err(_) => {
            log::warn!("cannot open '{}'", oldpath.display());
            return Some(failed(pathmd5, stat_attrs));
        }
    };
    let src_fd = src.as_raw_fd();
    let _ = posix_fadvise(src_fd, 0, 0, PosixFadviseAdvice::POSIX_FADV_SEQUENTIAL);

    let mut set = DigesterSet::new(wanted);
    let mut buf = vec![0u8; opts.buffer_size.max(1)];
    let src_borrowed = unsafe { BorrowedFd::borrow_raw(src_fd) };

    let copied = match index_tag {
        None => match copy_and_digest(dest, newpath, src_borrowed, opts, &mut set, &mut buf) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("failed copying/hashing '{}'", oldpath.display());
                return Some(failed(pathmd5, stat_attrs));
            }
        },
        Some(tag) => {
            let valid_len = match cache_and_digest(src_borrowed, &mut set, &mut buf) {
                Ok(n) => n,
                Err(_) => {
                    log::warn!("failed hashing '{}'", oldpath.display());
                    return Some(failed(pathmd5, stat_attrs));
                }
            };
            set.finalize();

            let index = opts.index.expect("index_tag implies an index");
            let already_seen = set
                .value(tag)
                .map(|digest| index.borrow().lookup(&pathmd5, digest))
                .unwrap_or(false);

            if already_seen {
                return None;
            }

            let write_result = if valid_len as i64 == stat_attrs.size {
                write_buffer(dest, newpath, &buf[..valid_len], opts)
            } else {
                reread_and_stream(dest, newpath, src_borrowed, &mut buf, opts)
            };

            match write_result {
                Ok(()) => {
                    if let Some(digest) = set.value(tag) {
                        index.borrow_mut().insert(&pathmd5, digest);
                    }
                    true
                }
                Err(_) => {
                    log::warn!("failed writing '{}'", oldpath.display());
                    return Some(failed(pathmd5, stat_attrs));
                }
            }
        }
    };

    debug_assert!(copied);
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let mut rb = RecordBuilder::new(pathmd5, State::FileCopied)
        .attrs(stat_attrs)
        .elapsed_ms(elapsed_ms);
    for tag in Tag::ALL {
        if opts.digests.has(tag) {
            rb = rb.digest(tag, set.value(tag));
        }
    }
    Some(rb.build())
}

fn failed(pathmd5: [u8; 16], attrs: StatAttrs) -> Record {
    RecordBuilder::new(pathmd5, State::FileFailed)
        .attrs(attrs)
        .build()
}

/// No index: read, update digests, and write in lockstep, one buffer at
/// a time (`original_source/src/impl/process_regular.c` `copy_n_digest`).
fn copy_and_digest(
    dest: &DestDir,
    newpath: &str,
    src: BorrowedFd,
    opts: &ProcessOpts,
    set: &mut DigesterSet,
    buf: &mut [u8],
) -> nix::Result<()> {
    let d = create_dest_file(dest, newpath)?;
    let out = unsafe { BorrowedFd::borrow_raw(d.as_raw_fd()) };

    loop {
        let n = ioutil::read_safe(src, buf)?;
        if n == 0 {
            break;
        }
        set.update(&buf[..n]);
        ioutil::write_full(out, &buf[..n])?;
    }
    set.finalize();
    chown_best_effort(&d, opts);
    Ok(())
}

/// Digest the whole file into `buf`, reusing it as a ring if the file is
/// larger. Returns the number of valid bytes left from the final fill;
/// equal to the file size iff the whole file fit
/// (`original_source/src/impl/process_regular.c` `cache_n_digest`).
fn cache_and_digest(fd: BorrowedFd, set: &mut DigesterSet, buf: &mut [u8]) -> nix::Result<usize> {
    let mut total = 0usize;
    loop {
        if total == buf.len() {
            total = 0;
        }
        let n = ioutil::read_safe(fd, &mut buf[total..])?;
        if n == 0 {
            break;
        }
        set.update(&buf[total..total + n]);
        total += n;
    }
    Ok(total)
}

fn write_buffer(dest: &DestDir, newpath: &str, bytes: &[u8], opts: &ProcessOpts) -> nix::Result<()> {
    let d = create_dest_file(dest, newpath)?;
    let out = unsafe { BorrowedFd::borrow_raw(d.as_raw_fd()) };
    ioutil::write_full(out, bytes)?;
    chown_best_effort(&d, opts);
    Ok(())
}

fn reread_and_stream(
    dest: &DestDir,
    newpath: &str,
    src: BorrowedFd,
    buf: &mut [u8],
    opts: &ProcessOpts,
) -> nix::Result<()> {
    nix::unistd::lseek(src.as_raw_fd(), 0, nix::unistd::Whence::SeekSet)?;
    let d = create_dest_file(dest, newpath)?;
    let out = unsafe { BorrowedFd::borrow_raw(d.as_raw_fd()) };
    ioutil::pipe(out, src, buf)?;
    chown_best_effort(&d, opts);
    Ok(())
}

fn create_dest_file(dest: &DestDir, newpath: &str) -> nix::Result<OwnedFd> {
    let raw = fcntl::openat(
        dest.raw_fd(),
        newpath,
        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
        Mode::from_bits_truncate(0o666),
    )?;
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

fn chown_best_effort(fd: &OwnedFd, opts: &ProcessOpts) {
    if let Err(e) = fchown(
        fd.as_raw_fd(),
        Some(Uid::from_raw(opts.uid)),
        Some(Gid::from_raw(opts.gid)),
    ) {
        log::debug!("fchown failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::Mask;
    use crate::index::Index;
    use crate::testutil::TempDir;
    use std::cell::RefCell;

    fn open_dir(path: &Path) -> DestDir {
        let fd = nix::fcntl::open(
            path,
            OFlag::O_RDONLY | OFlag::O_DIRECTORY,
            Mode::empty(),
        )
        .unwrap();
        DestDir::new(unsafe { OwnedFd::from_raw_fd(fd) }, String::new())
    }

    fn stat_of(path: &Path) -> StatAttrs {
        let st = nix::sys::stat::stat(path).unwrap();
        StatAttrs {
            uid: st.st_uid,
            gid: st.st_gid,
            mode: st.st_mode,
            size: st.st_size,
            atime: (st.st_atime, st.st_atime_nsec),
            mtime: (st.st_mtime, st.st_mtime_nsec),
            ctime: (st.st_ctime, st.st_ctime_nsec),
        }
    }

    #[test]
    fn copies_and_digests_without_index() {
        let src_dir = TempDir::new();
        let dst_dir = TempDir::new();
        std::fs::write(src_dir.path().join("a.txt"), b"hello world").unwrap();

        let dest = open_dir(dst_dir.path());
        let opts = ProcessOpts {
            digests: Mask::of(Tag::Sha256),
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
            buffer_size: 4096,
            index: None,
            verbose: false,
        };

        let record = process_regular(
            &dest,
            "a.txt",
            &src_dir.path().join("a.txt"),
            stat_of(&src_dir.path().join("a.txt")),
            [0u8; 16],
            &opts,
        )
        .unwrap();

        assert_eq!(record.state, State::FileCopied);
        assert!(record.digest(Tag::Sha256).is_some());
        assert_eq!(
            std::fs::read(dst_dir.path().join("a.txt")).unwrap(),
            b"hello world"
        );
    }

    #[test]
    fn dedup_hit_produces_no_record_and_no_write() {
        let src_dir = TempDir::new();
        let dst_dir = TempDir::new();
        let file_path = src_dir.path().join("a.txt");
        std::fs::write(&file_path, b"duplicate content").unwrap();

        let digest = {
            use digest::Digest as _;
            sha2::Sha256::digest(b"duplicate content").to_vec()
        };
        let mut index = Index::create(Tag::Sha256);
        index.insert(&[1u8; 16], &digest);
        let index_cell = RefCell::new(index);

        let dest = open_dir(dst_dir.path());
        let opts = ProcessOpts {
            digests: Mask::of(Tag::Sha256),
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
            buffer_size: 4096,
            index: Some(&index_cell),
            verbose: false,
        };

        let record = process_regular(
            &dest,
            "a.txt",
            &file_path,
            stat_of(&file_path),
            [1u8; 16],
            &opts,
        );

        assert!(record.is_none());
        assert!(!dst_dir.path().join("a.txt").exists());
    }

    #[test]
    fn new_file_with_index_is_copied_and_indexed() {
        let src_dir = TempDir::new();
        let dst_dir = TempDir::new();
        let file_path = src_dir.path().join("a.txt");
        std::fs::write(&file_path, b"fresh content").unwrap();

        let index_cell = RefCell::new(Index::create(Tag::Sha256));
        let dest = open_dir(dst_dir.path());
        let opts = ProcessOpts {
            digests: Mask::of(Tag::Sha256),
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
            buffer_size: 4096,
            index: Some(&index_cell),
            verbose: false,
        };

        let record = process_regular(
            &dest,
            "a.txt",
            &file_path,
            stat_of(&file_path),
            [2u8; 16],
            &opts,
        )
        .unwrap();

        assert_eq!(record.state, State::FileCopied);
        assert_eq!(index_cell.borrow().len(), 1);
        assert_eq!(
            std::fs::read(dst_dir.path().join("a.txt")).unwrap(),
            b"fresh content"
        );
    }
}
