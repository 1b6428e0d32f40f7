//! Record codec for the flat store file.
//! - Paths are escaped so every record fits on one tab-delimited line.
//! - Records are projected positionally onto the header's field list.
//!
//! Escaping: bytes 0x00-0x1F, `\` and 0x7F become `\xHH`. Everything else,
//! including non-ASCII bytes, passes through so byte-wise ordering of escaped
//! paths stays meaningful.

use super::record::{format_utc, parse_utc, Field, Kind, MetaRecord};

const ESCAPE: u8 = b'\\';
const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

#[inline]
fn needs_escape(b: u8) -> bool {
    b < 0x20 || b == ESCAPE || b == 0x7F
}

/// Escape a raw path for storage.
pub fn escape_path(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for &b in raw {
        if needs_escape(b) {
            out.extend_from_slice(&[
                ESCAPE,
                b'x',
                HEX_UPPER[(b >> 4) as usize],
                HEX_UPPER[(b & 0x0F) as usize],
            ]);
        } else {
            out.push(b);
        }
    }
    out
}

#[inline]
fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Reverse [`escape_path`].
///
/// Also accepts the older convention: `\\` decodes to a single backslash and
/// a backslash that does not start a valid escape is kept as-is.
pub fn unescape_path(escaped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut i = 0;
    while i < escaped.len() {
        let b = escaped[i];
        if b != ESCAPE {
            out.push(b);
            i += 1;
            continue;
        }
        match escaped.get(i + 1) {
            Some(b'x') => {
                let hi = escaped.get(i + 2).copied().and_then(hex_val);
                let lo = escaped.get(i + 3).copied().and_then(hex_val);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi << 4) | lo);
                    i += 4;
                } else {
                    out.push(ESCAPE);
                    i += 1;
                }
            }
            Some(&ESCAPE) => {
                out.push(ESCAPE);
                i += 2;
            }
            _ => {
                out.push(ESCAPE);
                i += 1;
            }
        }
    }
    out
}

/// Return column `index` of a tab-separated record line.
pub fn column(line: &[u8], index: usize) -> Option<&[u8]> {
    line.split(|&b| b == b'\t').nth(index)
}

fn opt_num(v: Option<u32>) -> String {
    v.map(|n| n.to_string()).unwrap_or_default()
}

fn opt_time(v: Option<i64>) -> String {
    v.map(format_utc).unwrap_or_default()
}

/// ACL text must not break the line format.
fn clean_text(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Encode one record as a line (no trailing newline) in `fields` order.
pub fn encode_record(record: &MetaRecord, fields: &[Field]) -> Vec<u8> {
    let mut line = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(b'\t');
        }
        match field {
            Field::File => line.extend_from_slice(&escape_path(&record.path)),
            Field::Type => line.push(record.kind.as_char() as u8),
            Field::Mtime => line.extend_from_slice(opt_time(record.mtime).as_bytes()),
            Field::Atime => line.extend_from_slice(opt_time(record.atime).as_bytes()),
            Field::Mode => {
                if let Some(mode) = record.mode {
                    line.extend_from_slice(format!("{mode:04o}").as_bytes());
                }
            }
            Field::Uid => line.extend_from_slice(opt_num(record.uid).as_bytes()),
            Field::Gid => line.extend_from_slice(opt_num(record.gid).as_bytes()),
            Field::User => {
                line.extend_from_slice(clean_text(record.user.as_deref().unwrap_or("")).as_bytes())
            }
            Field::Group => {
                line.extend_from_slice(clean_text(record.group.as_deref().unwrap_or("")).as_bytes())
            }
            Field::Acl => {
                line.extend_from_slice(clean_text(record.acl.as_deref().unwrap_or("")).as_bytes())
            }
        }
    }
    line
}

fn non_empty(raw: &[u8]) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(raw).into_owned())
    }
}

/// Decode one line using the field list it was written with.
///
/// Returns `None` when the path is empty or the type column is not a known
/// kind; callers treat such lines as unusable and skip them. Other columns
/// that fail to parse are left unset.
pub fn decode_record(line: &[u8], fields: &[Field]) -> Option<MetaRecord> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let cols: Vec<&[u8]> = line.split(|&b| b == b'\t').collect();

    let value = |field: Field| {
        fields
            .iter()
            .position(|f| *f == field)
            .and_then(|i| cols.get(i).copied())
            .unwrap_or(&b""[..])
    };

    let path = value(Field::File);
    if path.is_empty() {
        return None;
    }
    let kind = match value(Field::Type) {
        [c] => Kind::from_char(*c as char)?,
        _ => return None,
    };

    let mut rec = MetaRecord::new(unescape_path(path), kind);
    for field in fields {
        let text = non_empty(value(*field));
        match field {
            Field::File | Field::Type => {}
            Field::Mtime => rec.mtime = text.as_deref().and_then(parse_utc),
            Field::Atime => rec.atime = text.as_deref().and_then(parse_utc),
            Field::Mode => {
                rec.mode = text
                    .as_deref()
                    .and_then(|s| u32::from_str_radix(s.trim(), 8).ok())
            }
            Field::Uid => rec.uid = text.as_deref().and_then(|s| s.trim().parse().ok()),
            Field::Gid => rec.gid = text.as_deref().and_then(|s| s.trim().parse().ok()),
            Field::User => rec.user = text,
            Field::Group => rec.group = text,
            Field::Acl => rec.acl = text,
        }
    }
    Some(rec)
}
