//! Platform-specific helpers.
//! This module hides OS differences behind a narrow attribute-provider trait so
//! the store engines never touch libc, filetime or external ACL tools directly.
//!
//! - `AttrProvider`: lstat, owner name lookup, ownership/mode/time/ACL setters.
//! - `NativeAttrs`: the implementation for the running OS.
//! - `StagedFile`: temp-sibling staging with atomic publication by rename.

use std::io;
use std::path::{Path, PathBuf};

use crate::errors::StoreMetaError;
use crate::store::record::Kind;

mod staging;
mod temp;

#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

pub use staging::StagedFile;

#[cfg(unix)]
pub use unix::{open_log_file_secure_append, path_from_bytes, path_to_bytes, NativeAttrs};

#[cfg(not(unix))]
pub use windows::{open_log_file_secure_append, path_from_bytes, path_to_bytes, NativeAttrs};

/// Result of an lstat-style query. `kind` is `None` for objects that cannot
/// be recorded (sockets, fifos, devices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveStat {
    pub kind: Option<Kind>,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
}

/// Read and write the attributes the store knows about.
///
/// `no_follow` asks for the link-targeting variant of a primitive; callers pass
/// `true` whenever the live object is a symlink.
pub trait AttrProvider {
    fn lstat(&self, path: &Path) -> io::Result<LiveStat>;

    fn user_name(&self, uid: u32) -> Option<String>;
    fn group_name(&self, gid: u32) -> Option<String>;
    fn uid_by_name(&self, name: &str) -> Option<u32>;
    fn gid_by_name(&self, name: &str) -> Option<u32>;

    /// ACL as comma-joined entries. `Unsupported` when the platform has no ACL tooling.
    fn get_acl(&self, path: &Path) -> Result<String, StoreMetaError>;
    fn set_acl(&self, path: &Path, acl: &str) -> Result<(), StoreMetaError>;

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>, no_follow: bool) -> io::Result<()>;
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;
    fn set_times(&self, path: &Path, atime: i64, mtime: i64, no_follow: bool) -> io::Result<()>;
}

/// Absolute location of a worktree-relative raw path.
pub fn resolve_in(root: &Path, raw: &[u8]) -> PathBuf {
    root.join(path_from_bytes(raw))
}
