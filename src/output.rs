/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Wires the walk driver's per-entry callback to the NDJSON record
//! stream, dumping extended attributes from the source path alongside
//! each entry's own record (spec.md §4.L), grounded on
//! `original_source/src/io/io_dcp_processor.c`.

use std::io::Write;
use std::path::Path;

use crate::record::codec;
use crate::record::model::{Record, XattrRecord};

/// Emit one entry's record to `records`, plus one xattr record per
/// extended attribute found on `source_path` to `xattrs` (when given).
/// Xattr dumping is best-effort: a read failure is logged and does not
/// fail the run. The two streams are separate sinks (`--output` vs.
/// `--xattr-out`), not interleaved.
pub fn emit<W: Write, X: Write>(
    records: &mut W,
    xattrs: &mut X,
    record: &Record,
    source_path: Option<&Path>,
) -> std::io::Result<()> {
    codec::write_record(records, record)?;
    if let Some(path) = source_path {
        dump_xattrs(xattrs, record.pathmd5, path)?;
    }
    Ok(())
}

fn dump_xattrs<W: Write>(w: &mut W, pathmd5: [u8; 16], path: &Path) -> std::io::Result<()> {
    let names = match xattr::list(path) {
        Ok(names) => names,
        Err(e) => {
            log::debug!("cannot list xattrs on '{}': {}", path.display(), e);
            return Ok(());
        }
    };
    for name in names {
        let value = match xattr::get(path, &name) {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(e) => {
                log::warn!(
                    "cannot read xattr '{}' on '{}': {}",
                    name.to_string_lossy(),
                    path.display(),
                    e
                );
                continue;
            }
        };
        let record = XattrRecord {
            pathmd5,
            name: name.to_string_lossy().into_owned(),
            value,
        };
        codec::write_xattr_record(w, &record)?;
    }
    Ok(())
}

/// Write the stream-opening metadata lines (spec.md §4.F): the digest
/// tags in effect for this run, in fixed `Tag::ALL` order.
pub fn write_header<W: Write>(w: &mut W, digests: &[&str], run_args: &[&str]) -> std::io::Result<()> {
    codec::write_metadata_line(w, "version", "1")?;
    codec::write_metadata_json_list(w, "digests", digests)?;
    codec::write_metadata_list(w, "args", run_args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::model::{RecordBuilder, State};

    #[test]
    fn emit_without_source_path_writes_only_the_record() {
        let record = RecordBuilder::new([0u8; 16], State::DirCreated).build();
        let mut records = Vec::new();
        let mut xattrs = Vec::new();
        emit(&mut records, &mut xattrs, &record, None).unwrap();
        let text = String::from_utf8(records).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(xattrs.is_empty());
    }

    #[test]
    fn header_writes_three_metadata_lines() {
        let mut buf = Vec::new();
        write_header(&mut buf, &["sha256"], &["--to", "/dest"]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l.starts_with('#')));
    }
}
