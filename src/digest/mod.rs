/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Digest primitives: single-algorithm streaming digester (§4.B), the
//! fanout digester set (§4.C), and the hex codec (§4.A).

pub mod digester;
pub mod hex;
pub mod set;

pub use digester::Digester;
pub use set::DigesterSet;

/// Maximum digest length across all supported tags (SHA-512).
pub const MAX_DIGEST_LENGTH: usize = 64;

/// A digest algorithm. Digest length is a total function over this type,
/// per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::Md5, Tag::Sha1, Tag::Sha256, Tag::Sha512];

    pub fn length(self) -> usize {
        match self {
            Tag::Md5 => 16,
            Tag::Sha1 => 20,
            Tag::Sha256 => 32,
            Tag::Sha512 => 64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tag::Md5 => "md5",
            Tag::Sha1 => "sha1",
            Tag::Sha256 => "sha256",
            Tag::Sha512 => "sha512",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Tag::Md5 => 1,
            Tag::Sha1 => 2,
            Tag::Sha256 => 4,
            Tag::Sha512 => 8,
        }
    }
}

/// Bitset over the four digest tags. Or-ing masks together is meaningful
/// (spec.md §3: "combinations of any subset are meaningful").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mask(u8);

impl Mask {
    pub const NONE: Mask = Mask(0);
    pub const ALL: Mask = Mask(1 | 2 | 4 | 8);

    pub fn of(tag: Tag) -> Mask {
        Mask(tag.bit())
    }

    pub fn has(self, tag: Tag) -> bool {
        self.0 & tag.bit() != 0
    }

    pub fn with(self, tag: Tag) -> Mask {
        Mask(self.0 | tag.bit())
    }

    pub fn union(self, other: Mask) -> Mask {
        Mask(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Tag> {
        Tag::ALL.into_iter().filter(move |t| self.has(*t))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Mask {
    type Output = Mask;
    fn bitor(self, rhs: Mask) -> Mask {
        self.union(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_union_and_membership() {
        let m = Mask::of(Tag::Md5) | Mask::of(Tag::Sha256);
        assert!(m.has(Tag::Md5));
        assert!(m.has(Tag::Sha256));
        assert!(!m.has(Tag::Sha1));
        assert!(!m.has(Tag::Sha512));
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![Tag::Md5, Tag::Sha256]);
    }

    #[test]
    fn lengths_are_correct() {
        assert_eq!(Tag::Md5.length(), 16);
        assert_eq!(Tag::Sha1.length(), 20);
        assert_eq!(Tag::Sha256.length(), 32);
        assert_eq!(Tag::Sha512.length(), 64);
    }
}
