/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! EINTR-safe byte-stream I/O (spec.md §4.D), grounded on
//! `original_source/src/fd.c`. Works directly against raw file
//! descriptors via `nix` rather than `std::io::Read`/`Write` so the
//! number of underlying `read`/`write` syscalls is exactly what the
//! caller asked for (spec.md §8 testable property 8 depends on this).

use std::os::fd::{AsRawFd, BorrowedFd};

use nix::errno::Errno;
use nix::unistd::{read, write};

/// Retry a single `read(2)` across `EINTR`. Returns bytes read, `0` on
/// EOF, propagates any other error.
pub fn read_safe(fd: BorrowedFd, buf: &mut [u8]) -> nix::Result<usize> {
    loop {
        match read(fd.as_raw_fd(), buf) {
            Ok(n) => return Ok(n),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Loop `read_safe` until `buf` is full or EOF. Returns total bytes read.
pub fn read_full(fd: BorrowedFd, buf: &mut [u8]) -> nix::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = read_safe(fd, &mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Loop writes until every byte in `buf` has been flushed. A short write
/// followed by a fatal error anywhere in the loop is propagated; partial
/// writes are otherwise invisible to the caller.
pub fn write_full(fd: BorrowedFd, buf: &[u8]) -> nix::Result<()> {
    let mut total = 0;
    while total < buf.len() {
        match write(fd, &buf[total..]) {
            Ok(0) => return Err(Errno::EIO),
            Ok(n) => total += n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Repeatedly `read_safe` from `input` and `write_full` to `output`
/// through `buf` until EOF. Used when a file is too large to cache
/// in-memory (spec.md §4.H branch B, non-cached path).
pub fn pipe(output: BorrowedFd, input: BorrowedFd, buf: &mut [u8]) -> nix::Result<u64> {
    let mut total: u64 = 0;
    loop {
        let n = read_safe(input, buf)?;
        if n == 0 {
            break;
        }
        write_full(output, &buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}
