/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Digester set: fanout over 1-4 digesters from one mask (spec.md §4.C).

use super::{Digester, Mask, Tag};

/// A mapping from tag to optional digester, constructed from a mask.
/// `update`/`finalize` broadcast to every present digester; `value`
/// returns bytes only for a tag that is both present and finalized.
pub struct DigesterSet {
    digesters: Vec<Digester>,
}

impl DigesterSet {
    pub fn new(mask: Mask) -> DigesterSet {
        DigesterSet {
            digesters: mask.iter().map(Digester::new).collect(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for d in &mut self.digesters {
            d.update(bytes);
        }
    }

    pub fn finalize(&mut self) {
        for d in &mut self.digesters {
            d.finalize();
        }
    }

    pub fn value(&self, tag: Tag) -> Option<&[u8]> {
        self.digesters
            .iter()
            .find(|d| d.tag() == tag)
            .and_then(|d| d.value())
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.digesters.iter().any(|d| d.tag() == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcasts_to_all_present_digesters() {
        let mut set = DigesterSet::new(Mask::of(Tag::Md5) | Mask::of(Tag::Sha256));
        set.update(b"hi\n");
        set.finalize();
        assert_eq!(
            super::super::hex::unpack(set.value(Tag::Sha256).unwrap()),
            "98ea6e4f216f2fb4b69fff9b3a44842c38686ca685f3f55dc48c5d3fb1107be4"
        );
        assert!(set.value(Tag::Md5).is_some());
        assert!(set.value(Tag::Sha1).is_none());
        assert!(set.value(Tag::Sha512).is_none());
    }

    #[test]
    fn value_absent_until_finalized() {
        let mut set = DigesterSet::new(Mask::of(Tag::Md5));
        set.update(b"x");
        assert!(set.value(Tag::Md5).is_none());
        set.finalize();
        assert!(set.value(Tag::Md5).is_some());
    }
}
