/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The entry record model (spec.md §3, §4.E). Digest presence is an
//! `Option` per field, not a non-null pointer into a shared byte block
//! (spec.md §9's "entry struct with pointer-nulls as presence" redesign).

use crate::digest::{Mask, Tag};

/// State an entry can be reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    FileCopied,
    FileFailed,
    DirCreated,
    DirFailed,
    SymlinkCreated,
    SpecialCreated,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::FileCopied => "FILE_COPIED",
            State::FileFailed => "FILE_FAILED",
            State::DirCreated => "DIR_CREATED",
            State::DirFailed => "DIR_FAILED",
            State::SymlinkCreated => "SYMLINK_CREATED",
            State::SpecialCreated => "SPECIAL_CREATED",
        }
    }
}

/// Derived file type, from the mode's `S_IFMT` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Reg,
    Dir,
    Lnk,
    Chr,
    Blk,
    Fifo,
    Sock,
    Unknown,
}

impl FileType {
    pub fn from_mode(mode: u32) -> FileType {
        match mode & libc::S_IFMT {
            libc::S_IFREG => FileType::Reg,
            libc::S_IFDIR => FileType::Dir,
            libc::S_IFLNK => FileType::Lnk,
            libc::S_IFCHR => FileType::Chr,
            libc::S_IFBLK => FileType::Blk,
            libc::S_IFIFO => FileType::Fifo,
            libc::S_IFSOCK => FileType::Sock,
            _ => FileType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Reg => "reg",
            FileType::Dir => "dir",
            FileType::Lnk => "lnk",
            FileType::Chr => "chr",
            FileType::Blk => "blk",
            FileType::Fifo => "fifo",
            FileType::Sock => "sock",
            FileType::Unknown => "unkn",
        }
    }
}

/// POSIX stat attributes carried on an entry record.
#[derive(Debug, Clone, Copy)]
pub struct StatAttrs {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub size: i64,
    pub atime: (i64, i64),
    pub mtime: (i64, i64),
    pub ctime: (i64, i64),
}

/// Either a valid-UTF-8 path, or the raw hex of a non-UTF-8 path
/// (spec.md §3, §4.F path/pathhex fallback).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathField {
    Utf8(String),
    Hex(Vec<u8>),
}

impl PathField {
    pub fn from_os_bytes(bytes: &[u8]) -> PathField {
        match std::str::from_utf8(bytes) {
            Ok(s) => PathField::Utf8(s.to_owned()),
            Err(_) => PathField::Hex(bytes.to_vec()),
        }
    }
}

/// One entry in the output record stream.
#[derive(Debug, Clone)]
pub struct Record {
    pub pathmd5: [u8; 16],
    pub digests: [Option<Vec<u8>>; 4], // indexed by Tag::ALL order
    pub attrs: Option<StatAttrs>,
    pub file_type: Option<FileType>,
    pub state: State,
    pub symlink_target: Option<PathField>,
    pub path: Option<PathField>,
    pub elapsed_ms: Option<u64>,
}

impl Record {
    pub fn digest(&self, tag: Tag) -> Option<&[u8]> {
        self.digests[tag_index(tag)].as_deref()
    }

    pub fn present_mask(&self) -> Mask {
        let mut mask = Mask::NONE;
        for tag in Tag::ALL {
            if self.digest(tag).is_some() {
                mask = mask.with(tag);
            }
        }
        mask
    }
}

pub(crate) fn tag_index(tag: Tag) -> usize {
    match tag {
        Tag::Md5 => 0,
        Tag::Sha1 => 1,
        Tag::Sha256 => 2,
        Tag::Sha512 => 3,
    }
}

/// Builder accepting optional digest pointers, producing a `Record` with
/// exactly the provided digests populated (spec.md §4.E).
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new(pathmd5: [u8; 16], state: State) -> RecordBuilder {
        RecordBuilder {
            record: Record {
                pathmd5,
                digests: [None, None, None, None],
                attrs: None,
                file_type: None,
                state,
                symlink_target: None,
                path: None,
                elapsed_ms: None,
            },
        }
    }

    pub fn digest(mut self, tag: Tag, bytes: Option<&[u8]>) -> RecordBuilder {
        self.record.digests[tag_index(tag)] = bytes.map(|b| b.to_vec());
        self
    }

    pub fn attrs(mut self, attrs: StatAttrs) -> RecordBuilder {
        self.record.file_type = Some(FileType::from_mode(attrs.mode));
        self.record.attrs = Some(attrs);
        self
    }

    pub fn symlink_target(mut self, target: PathField) -> RecordBuilder {
        self.record.symlink_target = Some(target);
        self
    }

    pub fn path(mut self, path: PathField) -> RecordBuilder {
        self.record.path = Some(path);
        self
    }

    pub fn elapsed_ms(mut self, ms: u64) -> RecordBuilder {
        self.record.elapsed_ms = Some(ms);
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}

/// Separate record emitted for each extended attribute (spec.md §3, §4.L).
#[derive(Debug, Clone)]
pub struct XattrRecord {
    pub pathmd5: [u8; 16],
    pub name: String,
    pub value: Vec<u8>,
}
