/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Binary entry point: parse args, load config and logging, resolve the
//! destination, walk the sources, and write the record stream. Mirrors
//! `diffuzzer/src/main.rs`'s `fn main` / `fn run` split.

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use dcp::args::Args;
use dcp::config::{self, Config};
use dcp::digest::{Mask, Tag};
use dcp::index::{self, Index};
use dcp::output;
use dcp::process::ProcessOpts;
use dcp::root;
use dcp::walk;

fn main() {
    if let Err(err) = run() {
        error!("{:?}", err);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Ok(()) = log4rs::init_file("log4rs.yml", Default::default()) {
        info!("init logger from log4rs.yml");
    }

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    let digests = if !args.digest.is_empty() {
        cli_digest_mask(&args.digest)
    } else if let Some(path) = &args.index {
        let peeked = index::peek_digests(&[path.as_path()]);
        if peeked != Mask::NONE {
            info!("auto-detected digest mask from '{}'", path.display());
            peeked
        } else {
            config.digest_mask()
        }
    } else {
        config.digest_mask()
    };
    let verbose = args.verbose || config.verbose;
    let buffer_size = config.buffer_size;

    let uid = args.uid.unwrap_or_else(|| nix::unistd::getuid().as_raw());
    let gid = args.gid.unwrap_or_else(|| nix::unistd::getgid().as_raw());

    let resolution = root::resolve(&args.to, args.source.len())
        .with_context(|| format!("cannot resolve destination `{}'", args.to.display()))?;

    let loaded_index = match &args.index {
        Some(path) => {
            let tag = primary_tag(digests).context("--index requires at least one digest")?;
            let file = File::open(path)
                .with_context(|| format!("cannot open prior index `{}'", path.display()))?;
            let mut reader = io::BufReader::new(file);
            info!("loading dedup index from '{}'", path.display());
            Some(Index::load_from(tag, &mut reader))
        }
        None => None,
    };
    let index_cell = loaded_index.map(RefCell::new);

    let opts = ProcessOpts {
        digests,
        uid,
        gid,
        buffer_size,
        index: index_cell.as_ref(),
        verbose,
    };

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("cannot create output `{}'", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let xattr_out_path = args.xattr_out.clone().unwrap_or_else(|| default_xattr_out(&args.output));
    let mut xattr_out = BufWriter::new(
        File::create(&xattr_out_path)
            .with_context(|| format!("cannot create xattr output `{}'", xattr_out_path.display()))?,
    );

    let digest_names: Vec<&str> = Tag::ALL.iter().filter(|t| digests.has(**t)).map(|t| t.name()).collect();
    let run_args: Vec<String> = std::env::args().collect();
    let run_args_refs: Vec<&str> = run_args.iter().map(String::as_str).collect();
    output::write_header(&mut out, &digest_names, &run_args_refs)?;

    walk::walk(&args.source, &resolution, &opts, |record, source_path| {
        if let Err(e) = output::emit(&mut out, &mut xattr_out, &record, source_path) {
            error!("failed writing output record: {}", e);
        }
    })?;

    xattr_out.flush().context("failed flushing xattr output")?;
    out.flush().context("failed flushing output")?;
    Ok(())
}

fn default_xattr_out(output: &Option<std::path::PathBuf>) -> std::path::PathBuf {
    match output {
        Some(path) => {
            let mut s = path.clone().into_os_string();
            s.push(".xattrs");
            std::path::PathBuf::from(s)
        }
        None => std::path::PathBuf::from("dcp-output.xattrs"),
    }
}

fn cli_digest_mask(names: &[String]) -> Mask {
    let mut mask = Mask::NONE;
    for name in names {
        match config::parse_tag(name) {
            Some(tag) => mask = mask.with(tag),
            None => error!("unknown digest algorithm '{}', ignoring", name),
        }
    }
    mask
}

fn primary_tag(mask: Mask) -> Option<Tag> {
    Tag::ALL.into_iter().find(|t| mask.has(*t))
}
