/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Dedup index (spec.md §4.G), grounded on
//! `original_source/src/index/db_index.c`'s in-memory Berkeley DB B-tree.
//! The original's `struct key` is a fixed-width, zero-padded
//! `pathmd5 || digest` pair compared byte-for-byte; we keep exactly that
//! key shape but back it with a `BTreeMap` instead of an embedded
//! database (spec.md §3's ordered composite-key redesign).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use crate::digest::{Mask, Tag, MAX_DIGEST_LENGTH};
use crate::record::codec;
use crate::record::model::FileType;

/// Fixed-width, zero-padded composite key: `pathmd5 || digest`, padded to
/// `MAX_DIGEST_LENGTH` bytes regardless of the tag's natural length, so
/// that keys for different tags never accidentally compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    pathmd5: [u8; 16],
    digest: [u8; MAX_DIGEST_LENGTH],
}

impl Key {
    fn new(pathmd5: &[u8; 16], digest: &[u8]) -> Key {
        let mut padded = [0u8; MAX_DIGEST_LENGTH];
        padded[..digest.len()].copy_from_slice(digest);
        Key {
            pathmd5: *pathmd5,
            digest: padded,
        }
    }
}

/// An in-memory dedup index keyed on one digest tag at a time.
pub struct Index {
    tag: Tag,
    entries: BTreeMap<Key, ()>,
}

impl Index {
    /// Create an empty index that will be searched/populated using
    /// digests of `tag`.
    pub fn create(tag: Tag) -> Index {
        Index {
            tag,
            entries: BTreeMap::new(),
        }
    }

    pub fn key_tag(&self) -> Tag {
        self.tag
    }

    pub fn insert(&mut self, pathmd5: &[u8; 16], digest: &[u8]) {
        debug_assert_eq!(digest.len(), self.tag.length());
        self.entries.insert(Key::new(pathmd5, digest), ());
    }

    pub fn lookup(&self, pathmd5: &[u8; 16], digest: &[u8]) -> bool {
        debug_assert_eq!(digest.len(), self.tag.length());
        self.entries.contains_key(&Key::new(pathmd5, digest))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a prior run's NDJSON record stream, indexing every regular-file
    /// record that carries a digest for `tag` (spec.md §4.G steps 1-5).
    /// Malformed lines are skipped with a warning rather than aborting the
    /// whole load, matching the original's tolerant rebuild-on-restart
    /// behavior (`original_source/src/index/db_index.c`).
    pub fn load_from<R: BufRead>(tag: Tag, r: &mut R) -> Index {
        let mut idx = Index::create(tag);
        let mut expected_mask: Option<Mask> = None;
        let mut line_no = 0u64;
        loop {
            match codec::read_record(r, &mut line_no) {
                Ok(None) => break,
                Ok(Some(record)) => {
                    if !matches!(record.file_type, Some(FileType::Reg)) {
                        continue;
                    }
                    let present = record.present_mask();
                    match expected_mask {
                        None => expected_mask = Some(present),
                        Some(expected) if expected != present => log::warn!(
                            "line {}: digest mask {:?} differs from the first regular-file record's {:?}",
                            line_no,
                            present,
                            expected
                        ),
                        Some(_) => {}
                    }
                    match record.digest(tag) {
                        Some(digest) => {
                            let key = Key::new(&record.pathmd5, digest);
                            if idx.entries.insert(key, ()).is_some() {
                                log::warn!(
                                    "line {}: duplicate (pathmd5, {}) key, skipping",
                                    line_no,
                                    tag.name()
                                );
                            }
                        }
                        None => log::warn!(
                            "line {}: record has no {} digest, skipping for index",
                            line_no,
                            tag.name()
                        ),
                    }
                }
                Err(e) => {
                    log::warn!("line {}: skipping unparsable record: {}", line_no, e);
                }
            }
        }
        idx
    }
}

/// Opens each candidate prior-output file in turn and returns the first
/// regular-file record's present-digest mask (spec.md §4.G "Digest-mask
/// peek"), so a rerun against `--index` can compute the same digests the
/// prior run did without the user restating `--digest`. Returns
/// `Mask::NONE` if no candidate file yields a regular-file record.
pub fn peek_digests(paths: &[&Path]) -> Mask {
    for path in paths {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                log::debug!("cannot open '{}' while peeking digests: {}", path.display(), e);
                continue;
            }
        };
        let mut reader = std::io::BufReader::new(file);
        let mut line_no = 0u64;
        loop {
            match codec::read_record(&mut reader, &mut line_no) {
                Ok(None) => break,
                Ok(Some(record)) => {
                    if matches!(record.file_type, Some(FileType::Reg)) {
                        return record.present_mask();
                    }
                }
                Err(e) => {
                    log::debug!("line {}: skipping unparsable record while peeking: {}", line_no, e);
                }
            }
        }
    }
    Mask::NONE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::model::{RecordBuilder, StatAttrs, State};
    use std::io::Cursor;

    fn reg_attrs() -> StatAttrs {
        StatAttrs {
            uid: 0,
            gid: 0,
            mode: libc::S_IFREG as u32 | 0o644,
            size: 0,
            atime: (0, 0),
            mtime: (0, 0),
            ctime: (0, 0),
        }
    }

    fn dir_attrs() -> StatAttrs {
        StatAttrs {
            uid: 0,
            gid: 0,
            mode: libc::S_IFDIR as u32 | 0o755,
            size: 0,
            atime: (0, 0),
            mtime: (0, 0),
            ctime: (0, 0),
        }
    }

    #[test]
    fn insert_then_lookup_finds_entry() {
        let mut idx = Index::create(Tag::Sha256);
        let pathmd5 = [1u8; 16];
        let digest = [2u8; 32];
        assert!(!idx.lookup(&pathmd5, &digest));
        idx.insert(&pathmd5, &digest);
        assert!(idx.lookup(&pathmd5, &digest));
    }

    #[test]
    fn different_tags_never_collide_even_with_short_digest() {
        let mut idx = Index::create(Tag::Md5);
        let pathmd5 = [9u8; 16];
        let digest = [7u8; 16];
        idx.insert(&pathmd5, &digest);
        assert!(idx.lookup(&pathmd5, &digest));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn load_from_skips_records_without_configured_digest() {
        let mut buf = Vec::new();
        let rec_with = RecordBuilder::new([3u8; 16], State::FileCopied)
            .attrs(reg_attrs())
            .digest(Tag::Sha256, Some(&[5u8; 32]))
            .build();
        let rec_without = RecordBuilder::new([4u8; 16], State::FileCopied)
            .attrs(reg_attrs())
            .digest(Tag::Md5, Some(&[6u8; 16]))
            .build();
        codec::write_record(&mut buf, &rec_with).unwrap();
        codec::write_record(&mut buf, &rec_without).unwrap();

        let mut cursor = Cursor::new(buf);
        let idx = Index::load_from(Tag::Sha256, &mut cursor);
        assert_eq!(idx.len(), 1);
        assert!(idx.lookup(&[3u8; 16], &[5u8; 32]));
    }

    #[test]
    fn load_from_skips_non_regular_files() {
        let mut buf = Vec::new();
        let rec = RecordBuilder::new([1u8; 16], State::DirCreated)
            .attrs(dir_attrs())
            .digest(Tag::Sha256, Some(&[9u8; 32]))
            .build();
        codec::write_record(&mut buf, &rec).unwrap();
        let mut cursor = Cursor::new(buf);
        let idx = Index::load_from(Tag::Sha256, &mut cursor);
        assert!(idx.is_empty());
    }

    #[test]
    fn load_from_skips_duplicate_keys() {
        let mut buf = Vec::new();
        let rec = RecordBuilder::new([2u8; 16], State::FileCopied)
            .attrs(reg_attrs())
            .digest(Tag::Sha256, Some(&[8u8; 32]))
            .build();
        codec::write_record(&mut buf, &rec).unwrap();
        codec::write_record(&mut buf, &rec).unwrap();

        let mut cursor = Cursor::new(buf);
        let idx = Index::load_from(Tag::Sha256, &mut cursor);
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn peek_digests_reads_first_regular_file_record() {
        use crate::testutil::TempDir;
        use std::io::Write;

        let dir = TempDir::new();
        let path = dir.path().join("prior-output.ndjson");
        let mut file = File::create(&path).unwrap();
        let dir_rec = RecordBuilder::new([1u8; 16], State::DirCreated)
            .attrs(dir_attrs())
            .build();
        let file_rec = RecordBuilder::new([2u8; 16], State::FileCopied)
            .attrs(reg_attrs())
            .digest(Tag::Sha256, Some(&[3u8; 32]))
            .digest(Tag::Md5, Some(&[4u8; 16]))
            .build();
        codec::write_record(&mut file, &dir_rec).unwrap();
        codec::write_record(&mut file, &file_rec).unwrap();
        file.flush().unwrap();

        let mask = peek_digests(&[path.as_path()]);
        assert!(mask.has(Tag::Sha256));
        assert!(mask.has(Tag::Md5));
        assert!(!mask.has(Tag::Sha1));
    }

    #[test]
    fn peek_digests_falls_through_to_next_candidate() {
        let mask = peek_digests(&[Path::new("/nonexistent/dcp-test-path")]);
        assert_eq!(mask, Mask::NONE);
    }
}
