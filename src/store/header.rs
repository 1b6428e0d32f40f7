//! Store header and schema handling.
//!
//! Layout of the first two lines:
//! ```text
//! # generated by<TAB>git-store-meta<TAB>1.2.0
//! <file><TAB><type><TAB><mtime>...
//! ```

use std::io::{self, BufRead, Write};
use std::path::Path;

use super::record::Field;
use crate::errors::StoreMetaError;

pub const HEADER_TAG: &str = "# generated by";
pub const PRODUCER: &str = "git-store-meta";
pub const SCHEMA_VERSION: &str = "1.2.0";

/// Minor versions of schema 1 that share one apply procedure.
const SUPPORTED_MINORS: [&str; 3] = ["1.0", "1.1", "1.2"];

/// Parsed header of a store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHeader {
    pub producer: String,
    pub version: String,
    pub fields: Vec<Field>,
}

fn malformed(store: &Path, reason: impl Into<String>) -> StoreMetaError {
    StoreMetaError::MalformedStore {
        path: store.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_line<R: BufRead>(reader: &mut R, store: &Path) -> Result<Option<String>, StoreMetaError> {
    let mut buf = Vec::new();
    let n = reader
        .read_until(b'\n', &mut buf)
        .map_err(|e| StoreMetaError::io(store, e))?;
    if n == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Read exactly the two header lines from `reader`.
///
/// `store` is only used for error messages. The schema version is returned as
/// found; use [`check_schema`] to validate it.
pub fn parse_header<R: BufRead>(reader: &mut R, store: &Path) -> Result<StoreHeader, StoreMetaError> {
    let first = read_line(reader, store)?.ok_or_else(|| malformed(store, "missing header line"))?;
    let mut parts = first.split('\t');
    if parts.next() != Some(HEADER_TAG) {
        return Err(malformed(store, "header line is not tagged"));
    }
    let producer = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed(store, "header line has no producer"))?
        .to_string();
    let version = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed(store, "header line has no version"))?
        .to_string();

    let second = read_line(reader, store)?.ok_or_else(|| malformed(store, "missing field line"))?;
    let mut fields = Vec::new();
    for token in second.split('\t') {
        let name = token
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .ok_or_else(|| malformed(store, format!("field '{token}' is not wrapped in <>")))?;
        let field = Field::parse(name)
            .ok_or_else(|| malformed(store, format!("unknown field '{name}'")))?;
        if fields.contains(&field) {
            return Err(malformed(store, format!("duplicate field '{name}'")));
        }
        fields.push(field);
    }
    for required in [Field::File, Field::Type] {
        if !fields.contains(&required) {
            return Err(malformed(store, format!("required field '{required}' is missing")));
        }
    }

    Ok(StoreHeader {
        producer,
        version,
        fields,
    })
}

/// Accept versions `1.0.x`, `1.1.x` and `1.2.x`.
pub fn check_schema(header: &StoreHeader, store: &Path) -> Result<(), StoreMetaError> {
    let mut parts = header.version.splitn(3, '.');
    let major_minor = match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!("{major}.{minor}"),
        _ => String::new(),
    };
    let rest_ok = parts
        .next()
        .is_some_and(|patch| !patch.is_empty() && patch.chars().all(|c| c.is_ascii_digit()));
    if SUPPORTED_MINORS.contains(&major_minor.as_str()) && rest_ok {
        Ok(())
    } else {
        Err(StoreMetaError::UnsupportedSchema {
            path: store.to_path_buf(),
            version: header.version.clone(),
        })
    }
}

/// Write the two header lines for a new store.
pub fn write_header<W: Write>(out: &mut W, fields: &[Field]) -> io::Result<()> {
    writeln!(out, "{HEADER_TAG}\t{PRODUCER}\t{SCHEMA_VERSION}")?;
    let names: Vec<String> = fields.iter().map(|f| format!("<{f}>")).collect();
    writeln!(out, "{}", names.join("\t"))
}
