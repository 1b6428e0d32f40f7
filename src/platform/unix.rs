//! Unix implementation of the attribute provider.
//! - lstat through std `MetadataExt`
//! - owner names via the reentrant libc passwd/group lookups
//! - link-aware chown (`lchown`) and times (`filetime::set_symlink_file_times`)
//! - ACLs through `getfacl`/`setfacl` on Linux; other Unixes report `Unsupported`

use filetime::{set_file_times, set_symlink_file_times, FileTime};
use std::ffi::{CStr, CString, OsStr};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::ptr;

use super::{AttrProvider, LiveStat};
use crate::errors::StoreMetaError;
use crate::store::record::Kind;

const MAX_LOOKUP_BUF: usize = 1 << 20;

/// Attribute provider for the running Unix system.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeAttrs;

pub fn path_from_bytes(raw: &[u8]) -> PathBuf {
    PathBuf::from(OsStr::from_bytes(raw))
}

pub fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.as_os_str().as_bytes().to_vec()
}

/// Drive one of the `get*_r` functions, growing the scratch buffer on ERANGE.
fn reentrant_lookup<E, T>(
    call: impl Fn(*mut E, *mut libc::c_char, libc::size_t, *mut *mut E) -> libc::c_int,
    extract: impl Fn(&E) -> T,
) -> Option<T> {
    let mut buf: Vec<libc::c_char> = vec![0; 1024];
    loop {
        let mut entry = MaybeUninit::<E>::uninit();
        let mut result: *mut E = ptr::null_mut();
        let rc = call(entry.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut result);
        if rc == libc::ERANGE && buf.len() < MAX_LOOKUP_BUF {
            let grown = buf.len() * 2;
            buf.resize(grown, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }
        // SAFETY: on success `result` points at `entry`, whose string fields
        // borrow from `buf`; both outlive this call to `extract`.
        return Some(extract(unsafe { &*result }));
    }
}

fn c_string(ptr: *const libc::c_char) -> String {
    // SAFETY: libc returns NUL-terminated names for successful lookups.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
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
        Ok(LiveStat {
            kind,
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
            atime: meta.atime(),
            mtime: meta.mtime(),
        })
    }

    fn user_name(&self, uid: u32) -> Option<String> {
        reentrant_lookup(
            // SAFETY: arguments are valid pointers sized by `reentrant_lookup`.
            |e: *mut libc::passwd, b, n, r| unsafe { libc::getpwuid_r(uid, e, b, n, r) },
            |pw: &libc::passwd| c_string(pw.pw_name),
        )
    }

    fn group_name(&self, gid: u32) -> Option<String> {
        reentrant_lookup(
            // SAFETY: as above.
            |e: *mut libc::group, b, n, r| unsafe { libc::getgrgid_r(gid, e, b, n, r) },
            |gr: &libc::group| c_string(gr.gr_name),
        )
    }

    fn uid_by_name(&self, name: &str) -> Option<u32> {
        let c_name = CString::new(name).ok()?;
        reentrant_lookup(
            // SAFETY: `c_name` is NUL-terminated and outlives the call.
            |e: *mut libc::passwd, b, n, r| unsafe { libc::getpwnam_r(c_name.as_ptr(), e, b, n, r) },
            |pw: &libc::passwd| pw.pw_uid,
        )
    }

    fn gid_by_name(&self, name: &str) -> Option<u32> {
        let c_name = CString::new(name).ok()?;
        reentrant_lookup(
            // SAFETY: as above.
            |e: *mut libc::group, b, n, r| unsafe { libc::getgrnam_r(c_name.as_ptr(), e, b, n, r) },
            |gr: &libc::group| gr.gr_gid,
        )
    }

    fn get_acl(&self, path: &Path) -> Result<String, StoreMetaError> {
        acl::get(path)
    }

    fn set_acl(&self, path: &Path, acl: &str) -> Result<(), StoreMetaError> {
        acl::set(path, acl)
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>, no_follow: bool) -> io::Result<()> {
        if no_follow {
            std::os::unix::fs::lchown(path, uid, gid)
        } else {
            std::os::unix::fs::chown(path, uid, gid)
        }
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
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

#[cfg(target_os = "linux")]
mod acl {
    //! ACL text through the acl(5) command line tools.

    use std::io;
    use std::path::Path;
    use std::process::Command;

    use crate::errors::StoreMetaError;

    fn run(cmd: &mut Command, path: &Path) -> Result<Vec<u8>, StoreMetaError> {
        let out = match cmd.output() {
            Ok(out) => out,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreMetaError::Unsupported("acl"));
            }
            Err(e) => return Err(StoreMetaError::io(path, e)),
        };
        if !out.status.success() {
            let msg = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(StoreMetaError::io(path, io::Error::other(msg)));
        }
        Ok(out.stdout)
    }

    pub fn get(path: &Path) -> Result<String, StoreMetaError> {
        let stdout = run(
            Command::new("getfacl")
                .args(["--physical", "--omit-header", "--no-effective", "--absolute-names", "--"])
                .arg(path),
            path,
        )?;
        let text = String::from_utf8_lossy(&stdout);
        let entries: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();
        Ok(entries.join(","))
    }

    pub fn set(path: &Path, acl: &str) -> Result<(), StoreMetaError> {
        run(
            Command::new("setfacl")
                .arg("--physical")
                .arg(format!("--set={acl}"))
                .arg("--")
                .arg(path),
            path,
        )
        .map(|_| ())
    }
}

#[cfg(not(target_os = "linux"))]
mod acl {
    use std::path::Path;

    use crate::errors::StoreMetaError;

    pub fn get(_path: &Path) -> Result<String, StoreMetaError> {
        Err(StoreMetaError::Unsupported("acl"))
    }

    pub fn set(_path: &Path, _acl: &str) -> Result<(), StoreMetaError> {
        Err(StoreMetaError::Unsupported("acl"))
    }
}

/// Open log file for appending; set 0600 only when creating a new file.
/// If the file already exists, we preserve its existing permissions.
pub fn open_log_file_secure_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let existed = path.exists();
    let f = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600) // applies on create
        .open(path)?;
    if !existed {
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(f)
}
