//! Metadata record model.
//! - Field: the recognized column vocabulary (`file`, `type`, `mtime`, ...).
//! - Kind: file / directory / symlink, stored as `f` / `d` / `l`.
//! - MetaRecord: one tracked path and whichever attributes were captured.
//!
//! Timestamps are whole seconds since the epoch in memory and a fixed
//! `YYYY-MM-DDTHH:MM:SSZ` UTC string on disk.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::errors::StoreMetaError;

/// Recorded mode for symlinks; links carry no meaningful permission bits.
pub const SYMLINK_MODE: u32 = 0o664;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A store column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    File,
    Type,
    Mtime,
    Atime,
    Mode,
    Uid,
    Gid,
    User,
    Group,
    Acl,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::File,
        Field::Type,
        Field::Mtime,
        Field::Atime,
        Field::Mode,
        Field::Uid,
        Field::Gid,
        Field::User,
        Field::Group,
        Field::Acl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::File => "file",
            Field::Type => "type",
            Field::Mtime => "mtime",
            Field::Atime => "atime",
            Field::Mode => "mode",
            Field::Uid => "uid",
            Field::Gid => "gid",
            Field::User => "user",
            Field::Group => "group",
            Field::Acl => "acl",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Field::ALL.iter().copied().find(|f| f.name() == s)
    }

    /// `file` and `type` must be present in every schema.
    pub fn is_mandatory(self) -> bool {
        matches!(self, Field::File | Field::Type)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown field: '{s}'"))
    }
}

/// Default columns for a new store when none are requested.
pub fn default_fields() -> Vec<Field> {
    vec![Field::File, Field::Type, Field::Mtime, Field::Atime, Field::Mode]
}

/// Parse a comma separated field list (e.g. `mtime,atime,mode`).
///
/// `file` and `type` are always placed first; duplicates are dropped while
/// keeping the first occurrence order of the rest.
pub fn parse_field_list(list: &str) -> Result<Vec<Field>, StoreMetaError> {
    let mut fields = vec![Field::File, Field::Type];
    for raw in list.split(',') {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        let field = Field::parse(name)
            .ok_or_else(|| StoreMetaError::Config(format!("unknown field '{name}'")))?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    Ok(fields)
}

/// Filesystem object kinds that can be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    File,
    Directory,
    Symlink,
}

impl Kind {
    pub fn as_char(self) -> char {
        match self {
            Kind::File => 'f',
            Kind::Directory => 'd',
            Kind::Symlink => 'l',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'f' => Some(Kind::File),
            'd' => Some(Kind::Directory),
            'l' => Some(Kind::Symlink),
            _ => None,
        }
    }

    /// Files and symlinks are interchangeable on apply: some checkouts
    /// materialize a link as a plain file.
    pub fn compatible_with(self, live: Kind) -> bool {
        match (self, live) {
            (Kind::Directory, Kind::Directory) => true,
            (Kind::Directory, _) | (_, Kind::Directory) => false,
            _ => true,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::File => "file",
            Kind::Directory => "directory",
            Kind::Symlink => "symlink",
        };
        f.write_str(s)
    }
}

/// One tracked path. `path` holds the raw (unescaped) bytes relative to the
/// worktree root. Attributes not captured or not stored are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaRecord {
    pub path: Vec<u8>,
    pub kind: Kind,
    pub mtime: Option<i64>,
    pub atime: Option<i64>,
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub user: Option<String>,
    pub group: Option<String>,
    pub acl: Option<String>,
}

impl MetaRecord {
    pub fn new(path: impl Into<Vec<u8>>, kind: Kind) -> Self {
        Self {
            path: path.into(),
            kind,
            mtime: None,
            atime: None,
            mode: None,
            uid: None,
            gid: None,
            user: None,
            group: None,
            acl: None,
        }
    }

    /// Lossy display form of the path for logs.
    pub fn display_path(&self) -> String {
        String::from_utf8_lossy(&self.path).into_owned()
    }
}

/// Format epoch seconds as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_utc(secs: i64) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.format(TIME_FORMAT).to_string(),
        None => String::new(),
    }
}

/// Parse `YYYY-MM-DDTHH:MM:SSZ` into epoch seconds.
pub fn parse_utc(s: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(s.trim(), TIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}
