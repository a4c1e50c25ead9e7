/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Read/write of the newline-delimited record stream (spec.md §4.F),
//! grounded on `original_source/src/io/io_entry.c` and
//! `original_source/src/io/io_xattr.c`, and on `dash/src/lib.rs`'s use of
//! `serde_json` for the surrounding crate's JSON conventions.

use std::collections::HashSet;
use std::fmt;
use std::io::{BufRead, Write};

use base64::Engine as _;
use serde::de::{MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;

use crate::digest::{hex, Tag};
use crate::error::RecordParseError;

use super::model::{FileType, PathField, Record, State, StatAttrs, XattrRecord};

/// Fixed key order from spec.md §4.F. Keys are emitted only when present.
fn write_record_line<W: Write>(w: &mut W, r: &Record) -> std::io::Result<()> {
    write!(w, "{{")?;
    let mut wrote_any = false;

    for tag in [Tag::Md5, Tag::Sha1, Tag::Sha256, Tag::Sha512] {
        if let Some(bytes) = r.digest(tag) {
            write!(w, "\"{}\":\"{}\",", tag.name(), hex::unpack(bytes))?;
            wrote_any = true;
        }
    }
    let _ = wrote_any;

    write!(w, "\"pathmd5\":\"{}\"", hex::unpack(&r.pathmd5))?;

    if let Some(st) = &r.attrs {
        write!(
            w,
            ",\"uid\":{},\"gid\":{},\"mode\":{},\"size\":{},\
             \"asec\":{},\"ansec\":{},\"msec\":{},\"mnsec\":{},\
             \"csec\":{},\"cnsec\":{}",
            st.uid,
            st.gid,
            st.mode,
            st.size,
            st.atime.0,
            st.atime.1,
            st.mtime.0,
            st.mtime.1,
            st.ctime.0,
            st.ctime.1,
        )?;
    }

    if let Some(ft) = r.file_type {
        write!(w, ",\"type\":\"{}\"", ft.as_str())?;
    }

    write!(
        w,
        ",\"state\":{}",
        serde_json::to_string(r.state.as_str()).expect("state string always serializes")
    )?;

    if let Some(ms) = r.elapsed_ms {
        write!(w, ",\"elapsed\":{}", ms)?;
    }

    if let Some(target) = &r.symlink_target {
        write_path_field(w, "symlinkTarget", "symlinkTargetHex", target)?;
    }

    if let Some(path) = &r.path {
        write_path_field(w, "path", "pathhex", path)?;
    }

    writeln!(w, "}}")
}

fn write_path_field<W: Write>(
    w: &mut W,
    utf8_key: &str,
    hex_key: &str,
    field: &PathField,
) -> std::io::Result<()> {
    match field {
        PathField::Utf8(s) => write!(
            w,
            ",\"{}\":{}",
            utf8_key,
            serde_json::to_string(s).expect("valid utf-8 always serializes")
        ),
        PathField::Hex(bytes) => write!(w, ",\"{}\":\"{}\"", hex_key, hex::unpack(bytes)),
    }
}

/// Write one entry record as a single NDJSON line.
pub fn write_record<W: Write>(w: &mut W, r: &Record) -> std::io::Result<()> {
    write_record_line(w, r)
}

/// Write one xattr record. `value` is base64-encoded, never raw hex
/// (spec.md §9's explicit correction of the original's inconsistent
/// duplicate xattr-codec implementations).
pub fn write_xattr_record<W: Write>(w: &mut W, r: &XattrRecord) -> std::io::Result<()> {
    writeln!(
        w,
        "{{\"pathmd5\":\"{}\",\"xattrName\":{},\"xattrValue\":\"{}\"}}",
        hex::unpack(&r.pathmd5),
        serde_json::to_string(&r.name).unwrap_or_else(|_| "\"\"".to_string()),
        base64::engine::general_purpose::STANDARD.encode(&r.value),
    )
}

/// Write a `#<key>\t<value>` metadata line with `\n`/`\t` escaped.
pub fn write_metadata_line<W: Write>(w: &mut W, key: &str, value: &str) -> std::io::Result<()> {
    writeln!(w, "#{}\t{}", key, escape_metadata(value))
}

/// Write a `#<key>\t`-prefixed, tab-separated, escaped list.
pub fn write_metadata_list<W: Write>(w: &mut W, key: &str, values: &[&str]) -> std::io::Result<()> {
    let joined = values
        .iter()
        .map(|v| escape_metadata(v))
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(w, "#{}\t{}", key, joined)
}

/// Write a `#<key>\t<json-array>` metadata line.
pub fn write_metadata_json_list<W: Write>(
    w: &mut W,
    key: &str,
    values: &[&str],
) -> std::io::Result<()> {
    let arr = serde_json::to_string(values).expect("string array always serializes");
    writeln!(w, "#{}\t{}", key, arr)
}

fn escape_metadata(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n").replace('\t', "\\t")
}

/// Read one logical record line, skipping `#`-prefixed metadata lines.
/// Returns `Ok(None)` at EOF. `line_no` is advanced for every physical
/// line consumed, including skipped metadata lines.
pub fn read_record<R: BufRead>(
    r: &mut R,
    line_no: &mut u64,
) -> Result<Option<Record>, RecordParseError> {
    loop {
        let mut buf = String::new();
        let n = r.read_line(&mut buf).map_err(|e| RecordParseError::Json {
            line: *line_no + 1,
            source: serde_json::Error::io(e),
        })?;
        if n == 0 {
            return Ok(None);
        }
        *line_no += 1;
        let trimmed = buf.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }
        return parse_record_line(trimmed, *line_no).map(Some);
    }
}

fn parse_record_line(line: &str, line_no: u64) -> Result<Record, RecordParseError> {
    let fields: RawFields = serde_json::from_str(line).map_err(|e| {
        if e.to_string().contains("duplicate key") {
            RecordParseError::DuplicateKey {
                line: line_no,
                key: e.to_string(),
            }
        } else {
            RecordParseError::Json {
                line: line_no,
                source: e,
            }
        }
    })?;

    let mut pathmd5: Option<[u8; 16]> = None;
    let mut digests: [Option<Vec<u8>>; 4] = [None, None, None, None];
    let mut uid = None;
    let mut gid = None;
    let mut mode = None;
    let mut size = None;
    let mut asec = None;
    let mut ansec = None;
    let mut msec = None;
    let mut mnsec = None;
    let mut csec = None;
    let mut cnsec = None;
    let mut state = None;
    let mut elapsed = None;
    let mut symlink_target = None;
    let mut path = None;

    for (key, val) in fields.0 {
        match key.as_str() {
            "md5" => digests[0] = parse_digest_field(&val, Tag::Md5, "md5", line_no)?,
            "sha1" => digests[1] = parse_digest_field(&val, Tag::Sha1, "sha1", line_no)?,
            "sha256" => digests[2] = parse_digest_field(&val, Tag::Sha256, "sha256", line_no)?,
            "sha512" => digests[3] = parse_digest_field(&val, Tag::Sha512, "sha512", line_no)?,
            "pathmd5" => {
                let bytes = parse_digest_field(&val, Tag::Md5, "pathmd5", line_no)?
                    .ok_or(RecordParseError::MissingPathMd5 { line: line_no })?;
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&bytes);
                pathmd5 = Some(arr);
            }
            "uid" => uid = Some(parse_int(&val, "uid", line_no)?),
            "gid" => gid = Some(parse_int(&val, "gid", line_no)?),
            "mode" => mode = Some(parse_int(&val, "mode", line_no)?),
            "size" => size = Some(parse_int(&val, "size", line_no)?),
            "asec" => asec = Some(parse_int(&val, "asec", line_no)?),
            "ansec" => ansec = Some(parse_int(&val, "ansec", line_no)?),
            "msec" => msec = Some(parse_int(&val, "msec", line_no)?),
            "mnsec" => mnsec = Some(parse_int(&val, "mnsec", line_no)?),
            "csec" => csec = Some(parse_int(&val, "csec", line_no)?),
            "cnsec" => cnsec = Some(parse_int(&val, "cnsec", line_no)?),
            "type" => {} // derived from `mode` on read; ignored like the original
            "state" => state = val.as_str().map(|s| parse_state(s)),
            "elapsed" => elapsed = Some(parse_int(&val, "elapsed", line_no)? as u64),
            "symlinkTarget" => {
                symlink_target = val.as_str().map(|s| PathField::Utf8(s.to_owned()))
            }
            "symlinkTargetHex" => {
                symlink_target = val
                    .as_str()
                    .map(|s| decode_path_hex(s, "symlinkTargetHex", line_no))
                    .transpose()?
            }
            "path" => path = val.as_str().map(|s| PathField::Utf8(s.to_owned())),
            "pathhex" => {
                path = val
                    .as_str()
                    .map(|s| decode_path_hex(s, "pathhex", line_no))
                    .transpose()?
            }
            _ => log::warn!("ignoring unknown key '{}' on line {}", key, line_no),
        }
    }

    let pathmd5 = pathmd5.ok_or(RecordParseError::MissingPathMd5 { line: line_no })?;

    let attrs = match (uid, gid, mode, size, asec, ansec, msec, mnsec, csec, cnsec) {
        (Some(uid), Some(gid), Some(mode), Some(size), Some(asec), Some(ansec), Some(msec), Some(mnsec), Some(csec), Some(cnsec)) => {
            Some(StatAttrs {
                uid: uid as u32,
                gid: gid as u32,
                mode: mode as u32,
                size,
                atime: (asec, ansec),
                mtime: (msec, mnsec),
                ctime: (csec, cnsec),
            })
        }
        _ => None,
    };

    Ok(Record {
        pathmd5,
        digests,
        file_type: attrs.map(|a| FileType::from_mode(a.mode)),
        attrs,
        state: state.unwrap_or(State::FileFailed),
        symlink_target,
        path,
        elapsed_ms: elapsed,
    })
}

fn decode_path_hex(s: &str, field: &'static str, line_no: u64) -> Result<PathField, RecordParseError> {
    let mut dest = vec![0u8; s.len() / 2];
    let n = hex::pack(&mut dest, s, line_no).map_err(|_| RecordParseError::NonHexChar {
        line: line_no,
        field,
    })?;
    dest.truncate(n);
    Ok(PathField::Hex(dest))
}

fn parse_state(s: &str) -> State {
    match s {
        "FILE_COPIED" => State::FileCopied,
        "DIR_CREATED" => State::DirCreated,
        "DIR_FAILED" => State::DirFailed,
        "SYMLINK_CREATED" => State::SymlinkCreated,
        "SPECIAL_CREATED" => State::SpecialCreated,
        _ => State::FileFailed,
    }
}

/// Hex-decode a digest field. An empty string is treated as absent
/// (spec.md §4.F). A present value of the wrong length is a hard error.
fn parse_digest_field(
    val: &Value,
    tag: Tag,
    field: &'static str,
    line_no: u64,
) -> Result<Option<Vec<u8>>, RecordParseError> {
    let s = match val.as_str() {
        Some(s) => s,
        None => {
            return Err(RecordParseError::NonInteger {
                line: line_no,
                field,
            })
        }
    };
    if s.is_empty() {
        return Ok(None);
    }
    if s.len() % 2 != 0 {
        return Err(RecordParseError::OddLengthHex {
            line: line_no,
            field,
        });
    }
    let expected = tag.length();
    let mut dest = vec![0u8; s.len() / 2];
    let n = hex::pack(&mut dest, s, line_no).map_err(|_| RecordParseError::NonHexChar {
        line: line_no,
        field,
    })?;
    if n != expected {
        return Err(RecordParseError::BadDigestLength {
            line: line_no,
            field,
            tag,
            expected,
            actual: n,
        });
    }
    Ok(Some(dest))
}

fn parse_int(val: &Value, field: &'static str, line_no: u64) -> Result<i64, RecordParseError> {
    val.as_i64().ok_or(RecordParseError::NonInteger {
        line: line_no,
        field,
    })
}

/// Read one xattr record line. Returns `Ok(None)` at EOF.
pub fn read_xattr_record<R: BufRead>(
    r: &mut R,
    line_no: &mut u64,
) -> Result<Option<XattrRecord>, RecordParseError> {
    loop {
        let mut buf = String::new();
        let n = r.read_line(&mut buf).map_err(|e| RecordParseError::Json {
            line: *line_no + 1,
            source: serde_json::Error::io(e),
        })?;
        if n == 0 {
            return Ok(None);
        }
        *line_no += 1;
        let trimmed = buf.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: RawFields = serde_json::from_str(trimmed).map_err(|e| RecordParseError::Json {
            line: *line_no,
            source: e,
        })?;

        let mut pathmd5 = None;
        let mut name = None;
        let mut value = None;
        for (key, val) in fields.0 {
            match key.as_str() {
                "pathmd5" => {
                    let bytes = parse_digest_field(&val, Tag::Md5, "pathmd5", *line_no)?
                        .ok_or(RecordParseError::MissingPathMd5 { line: *line_no })?;
                    let mut arr = [0u8; 16];
                    arr.copy_from_slice(&bytes);
                    pathmd5 = Some(arr);
                }
                "xattrName" => name = val.as_str().map(|s| s.to_owned()),
                "xattrValue" => {
                    value = val.as_str().and_then(|s| {
                        base64::engine::general_purpose::STANDARD.decode(s).ok()
                    })
                }
                _ => log::warn!("ignoring unknown key '{}' on line {}", key, line_no),
            }
        }

        return Ok(Some(XattrRecord {
            pathmd5: pathmd5.ok_or(RecordParseError::MissingPathMd5 { line: *line_no })?,
            name: name.unwrap_or_default(),
            value: value.unwrap_or_default(),
        }));
    }
}

/// A JSON object parsed preserving insertion order and rejecting
/// duplicate keys (jansson's `JSON_REJECT_DUPLICATES`, spec.md §4.F).
struct RawFields(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawFields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = RawFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a JSON object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<RawFields, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut fields = Vec::new();
                let mut seen = HashSet::new();
                while let Some((k, v)) = map.next_entry::<String, Value>()? {
                    if !seen.insert(k.clone()) {
                        return Err(serde::de::Error::custom(format!("duplicate key '{}'", k)));
                    }
                    fields.push((k, v));
                }
                Ok(RawFields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::model::RecordBuilder;
    use std::io::Cursor;

    #[test]
    fn write_then_read_roundtrips_digests_and_ints() {
        let pathmd5 = *b"0123456789abcdef";
        let record = RecordBuilder::new(pathmd5, State::FileCopied)
            .digest(Tag::Sha256, Some(&[0xabu8; 32]))
            .attrs(StatAttrs {
                uid: 1000,
                gid: 1000,
                mode: 0o100644,
                size: 3,
                atime: (1700000000, 0),
                mtime: (1700000000, 0),
                ctime: (1700000000, 0),
            })
            .path(PathField::Utf8("/a.txt".to_string()))
            .elapsed_ms(2)
            .build();

        let mut buf = Vec::new();
        write_record(&mut buf, &record).unwrap();

        let mut cursor = Cursor::new(buf);
        let mut line_no = 0;
        let parsed = read_record(&mut cursor, &mut line_no).unwrap().unwrap();

        assert_eq!(parsed.pathmd5, pathmd5);
        assert_eq!(parsed.digest(Tag::Sha256), Some([0xabu8; 32].as_slice()));
        assert!(parsed.digest(Tag::Md5).is_none());
        assert_eq!(parsed.attrs.unwrap().uid, 1000);
        assert_eq!(parsed.path, Some(PathField::Utf8("/a.txt".to_string())));
        assert_eq!(parsed.state, State::FileCopied);
    }

    #[test]
    fn metadata_lines_are_skipped_by_reader() {
        let mut buf = Vec::new();
        write_metadata_line(&mut buf, "version", "1\nfoo").unwrap();
        let record = RecordBuilder::new([0u8; 16], State::DirCreated).build();
        write_record(&mut buf, &record).unwrap();

        let mut cursor = Cursor::new(buf);
        let mut line_no = 0;
        let parsed = read_record(&mut cursor, &mut line_no).unwrap();
        assert!(parsed.is_some());
        assert_eq!(parsed.unwrap().state, State::DirCreated);
    }

    #[test]
    fn missing_pathmd5_is_error() {
        let mut cursor = Cursor::new(b"{\"state\":\"FILE_COPIED\"}\n".to_vec());
        let mut line_no = 0;
        let err = read_record(&mut cursor, &mut line_no).unwrap_err();
        assert!(matches!(err, RecordParseError::MissingPathMd5 { .. }));
    }

    #[test]
    fn wrong_length_digest_is_error() {
        let mut cursor = Cursor::new(
            b"{\"md5\":\"abc\",\"pathmd5\":\"00000000000000000000000000000000\"}\n".to_vec(),
        );
        let mut line_no = 0;
        let err = read_record(&mut cursor, &mut line_no).unwrap_err();
        assert!(matches!(err, RecordParseError::OddLengthHex { .. }));
    }

    #[test]
    fn non_utf8_path_uses_pathhex() {
        let pathmd5 = [0u8; 16];
        let record = RecordBuilder::new(pathmd5, State::FileCopied)
            .path(PathField::Hex(vec![0x66, 0xfe, 0xff]))
            .build();
        let mut buf = Vec::new();
        write_record(&mut buf, &record).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("\"pathhex\":\"66feff\""));
        assert!(!text.contains("\"path\":"));

        let mut cursor = Cursor::new(buf);
        let mut line_no = 0;
        let parsed = read_record(&mut cursor, &mut line_no).unwrap().unwrap();
        assert_eq!(parsed.path, Some(PathField::Hex(vec![0x66, 0xfe, 0xff])));
    }

    #[test]
    fn xattr_record_uses_base64() {
        let rec = XattrRecord {
            pathmd5: [1u8; 16],
            name: "user.foo".to_string(),
            value: b"hello".to_vec(),
        };
        let mut buf = Vec::new();
        write_xattr_record(&mut buf, &rec).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.contains("\"xattrValue\":\"aGVsbG8=\""));

        let mut cursor = Cursor::new(buf);
        let mut line_no = 0;
        let parsed = read_xattr_record(&mut cursor, &mut line_no)
            .unwrap()
            .unwrap();
        assert_eq!(parsed.value, b"hello");
        assert_eq!(parsed.name, "user.foo");
    }
}
