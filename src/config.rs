/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Run configuration (spec.md §4.N), mirroring `diffuzzer/src/config.rs`'s
//! `#[derive(Serialize, Deserialize)] struct Config`. CLI flags always
//! override a loaded config value where both apply.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::digest::{Mask, Tag};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_digests")]
    pub digests: Vec<String>,
    #[serde(default)]
    pub verbose: bool,
}

fn default_buffer_size() -> usize {
    32 * 1024
}

fn default_digests() -> Vec<String> {
    vec!["sha256".to_string()]
}

impl Default for Config {
    fn default() -> Config {
        Config {
            buffer_size: default_buffer_size(),
            digests: default_digests(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load from `path` if given, otherwise fall back to defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            None => Ok(Config::default()),
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read config `{}'", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("cannot parse config `{}'", path.display()))
            }
        }
    }

    /// Parse `digests` into a `Mask`, skipping (and logging) unrecognized
    /// names rather than failing the whole config.
    pub fn digest_mask(&self) -> Mask {
        let mut mask = Mask::NONE;
        for name in &self.digests {
            match parse_tag(name) {
                Some(tag) => mask = mask.with(tag),
                None => log::warn!("unknown digest algorithm '{}' in config, ignoring", name),
            }
        }
        mask
    }
}

pub fn parse_tag(name: &str) -> Option<Tag> {
    match name.to_ascii_lowercase().as_str() {
        "md5" => Some(Tag::Md5),
        "sha1" => Some(Tag::Sha1),
        "sha256" => Some(Tag::Sha256),
        "sha512" => Some(Tag::Sha512),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sha256_and_32kib_buffer() {
        let config = Config::default();
        assert_eq!(config.buffer_size, 32 * 1024);
        assert!(config.digest_mask().has(Tag::Sha256));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config {
            buffer_size: 8192,
            digests: vec!["md5".to_string(), "sha512".to_string()],
            verbose: true,
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.buffer_size, 8192);
        assert!(parsed.digest_mask().has(Tag::Md5));
        assert!(parsed.digest_mask().has(Tag::Sha512));
        assert!(parsed.verbose);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: Config = toml::from_str("verbose = true\n").unwrap();
        assert_eq!(parsed.buffer_size, 32 * 1024);
        assert!(parsed.verbose);
    }

    #[test]
    fn unknown_digest_name_is_ignored() {
        let config = Config {
            buffer_size: 1024,
            digests: vec!["sha999".to_string()],
            verbose: false,
        };
        assert!(config.digest_mask().is_empty());
    }
}
