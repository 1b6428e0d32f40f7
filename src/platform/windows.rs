//! Non-Unix implementation of the attribute provider (best-effort).
//!
//! Notes:
//! - Only timestamps and the readonly bit map onto the store's fields here.
//! - Ownership and ACLs report `Unsupported`; mode is approximated as
//!   0444/0644 (files) and 0555/0755 (directories) from the readonly bit.

use filetime::{set_file_times, set_symlink_file_times, FileTime};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use super::{AttrProvider, LiveStat};
use crate::errors::StoreMetaError;
use crate::store::record::Kind;

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeAttrs;

pub fn path_from_bytes(raw: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(raw).replace('/', "\\"))
}

pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().replace('\\', "/").into_bytes()
}

fn epoch_secs(t: io::Result<std::time::SystemTime>) -> i64 {
    t.ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl AttrProvider for NativeAttrs {
    fn lstat(&self, path: &Path) -> io::Result<LiveStat> {
        let meta = fs::symlink_metadata(path)?;
        let ft = meta.file_type();
        let kind = if ft.is_symlink() {
            Some(Kind::Symlink)
        } else if ft.is_dir() {
            Some(Kind::Directory)
        } else if ft.is_file() {
            Some(Kind::File)
        } else {
            None
        };
        let readonly = meta.permissions().readonly();
        let mode = match (kind, readonly) {
            (Some(Kind::Directory), true) => 0o555,
            (Some(Kind::Directory), false) => 0o755,
            (_, true) => 0o444,
            (_, false) => 0o644,
        };
        Ok(LiveStat {
            kind,
            mode,
            uid: 0,
            gid: 0,
            atime: epoch_secs(meta.accessed()),
            mtime: epoch_secs(meta.modified()),
        })
    }

    fn user_name(&self, _uid: u32) -> Option<String> {
        None
    }

    fn group_name(&self, _gid: u32) -> Option<String> {
        None
    }

    fn uid_by_name(&self, _name: &str) -> Option<u32> {
        None
    }

    fn gid_by_name(&self, _name: &str) -> Option<u32> {
        None
    }

    fn get_acl(&self, _path: &Path) -> Result<String, StoreMetaError> {
        Err(StoreMetaError::Unsupported("acl"))
    }

    fn set_acl(&self, _path: &Path, _acl: &str) -> Result<(), StoreMetaError> {
        Err(StoreMetaError::Unsupported("acl"))
    }

    fn chown(&self, _path: &Path, _uid: Option<u32>, _gid: Option<u32>, _no_follow: bool) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "ownership is not supported on this platform"))
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(mode & 0o200 == 0);
        fs::set_permissions(path, perms)
    }

    fn set_times(&self, path: &Path, atime: i64, mtime: i64, no_follow: bool) -> io::Result<()> {
        let at = FileTime::from_unix_time(atime, 0);
        let mt = FileTime::from_unix_time(mtime, 0);
        if no_follow {
            set_symlink_file_times(path, at, mt)
        } else {
            set_file_times(path, at, mt)
        }
    }
}

/// Open log file for appending (no symlink defense available via std on Windows).
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path)
}
