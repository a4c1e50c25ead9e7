/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Single-algorithm streaming digester (spec.md §4.B). A tagged variant
//! over the RustCrypto hasher types, per spec.md §9's design note:
//! "reimplementations should instead use a tagged variant with one branch
//! per algorithm and dispatch in the update/finalize calls; this is
//! allocation-free and type-safe."

use digest::Digest as _;
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use super::Tag;

enum Hasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn new(tag: Tag) -> Hasher {
        match tag {
            Tag::Md5 => Hasher::Md5(Md5::new()),
            Tag::Sha1 => Hasher::Sha1(Sha1::new()),
            Tag::Sha256 => Hasher::Sha256(Sha256::new()),
            Tag::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(bytes),
            Hasher::Sha1(h) => h.update(bytes),
            Hasher::Sha256(h) => h.update(bytes),
            Hasher::Sha512(h) => h.update(bytes),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Md5(h) => h.finalize().to_vec(),
            Hasher::Sha1(h) => h.finalize().to_vec(),
            Hasher::Sha256(h) => h.finalize().to_vec(),
            Hasher::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

enum State {
    Open(Hasher),
    Closed(Vec<u8>),
}

/// A stateful digester for one tag: create, zero-or-more updates, exactly
/// one finalize, any number of value reads. Updating a closed digester is
/// a no-op; reading the value before finalize yields `None`.
pub struct Digester {
    tag: Tag,
    state: State,
}

impl Digester {
    pub fn new(tag: Tag) -> Digester {
        Digester {
            tag,
            state: State::Open(Hasher::new(tag)),
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn update(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let State::Open(h) = &mut self.state {
            h.update(bytes);
        }
    }

    pub fn finalize(&mut self) {
        if let State::Open(_) = self.state {
            let State::Open(h) = std::mem::replace(&mut self.state, State::Closed(Vec::new()))
            else {
                unreachable!()
            };
            self.state = State::Closed(h.finalize());
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, State::Closed(_))
    }

    pub fn value(&self) -> Option<&[u8]> {
        match &self.state {
            State::Closed(bytes) => Some(bytes),
            State::Open(_) => None,
        }
    }
}
