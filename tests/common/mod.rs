#![allow(dead_code)]

use filetime::{set_file_times, FileTime};
use git_store_meta::platform::LiveStat;
use git_store_meta::vcs::dirs_of;
use git_store_meta::{AttrProvider, Change, ChangeStatus, Config, NativeAttrs, StoreMetaError, Vcs};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Scratch worktree with canonical root.
pub struct Tree {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl Tree {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp_dir.path()).unwrap();
        Self { temp_dir, root }
    }

    /// Create a file with known contents, mode and times.
    pub fn file(&self, rel: &str, mode: u32, secs: i64) -> PathBuf {
        let p = self.root.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&p, rel.as_bytes()).unwrap();
        set_mode(&p, mode);
        touch(&p, secs);
        p
    }

    pub fn config(&self) -> Config {
        Config::new(&self.root)
    }

    pub fn store_text(&self, cfg: &Config) -> String {
        fs::read_to_string(cfg.store_path()).unwrap()
    }
}

#[cfg(unix)]
pub fn set_mode(p: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(p, fs::Permissions::from_mode(mode)).unwrap();
}

#[cfg(not(unix))]
pub fn set_mode(_p: &Path, _mode: u32) {}

#[cfg(unix)]
pub fn mode_of(p: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    fs::symlink_metadata(p).unwrap().permissions().mode() & 0o7777
}

pub fn touch(p: &Path, secs: i64) {
    set_file_times(p, FileTime::from_unix_time(secs, 0), FileTime::from_unix_time(secs, 0)).unwrap();
}

pub fn mtime_of(p: &Path) -> i64 {
    FileTime::from_last_modification_time(&fs::symlink_metadata(p).unwrap()).unix_seconds()
}

/// Record lines of a store (header removed), sorted for set comparison.
pub fn record_set(text: &str) -> Vec<String> {
    let mut v: Vec<String> = text.lines().skip(2).map(str::to_string).collect();
    v.sort();
    v
}

/// In-memory version control: a fixed file list and change feed.
#[derive(Default)]
pub struct FakeVcs {
    pub files: Vec<Vec<u8>>,
    pub changes: Vec<Change>,
}

impl FakeVcs {
    pub fn with_files(files: &[&str]) -> Self {
        Self {
            files: files.iter().map(|f| f.as_bytes().to_vec()).collect(),
            changes: Vec::new(),
        }
    }

    pub fn modified(&mut self, path: &str) {
        let raw = path.as_bytes().to_vec();
        if !self.files.contains(&raw) {
            self.files.push(raw.clone());
        }
        self.changes.push(Change { status: ChangeStatus::Modified, path: raw });
    }

    pub fn deleted(&mut self, path: &str) {
        let raw = path.as_bytes().to_vec();
        self.files.retain(|f| *f != raw);
        self.changes.push(Change { status: ChangeStatus::Deleted, path: raw });
    }
}

impl Vcs for FakeVcs {
    fn tracked_files(&self) -> Result<Vec<Vec<u8>>, StoreMetaError> {
        Ok(self.files.clone())
    }
    fn tracked_dirs(&self) -> Result<Vec<Vec<u8>>, StoreMetaError> {
        Ok(dirs_of(&self.files))
    }
    fn staged_changes(&self) -> Result<Vec<Change>, StoreMetaError> {
        Ok(self.changes.clone())
    }
    fn is_tracked(&self, path: &[u8]) -> Result<bool, StoreMetaError> {
        Ok(self.files.iter().any(|f| f == path))
    }
}

/// Native provider that remembers every path it was asked to stat.
#[derive(Default)]
pub struct CountingAttrs {
    inner: NativeAttrs,
    pub stat_calls: RefCell<Vec<PathBuf>>,
}

impl CountingAttrs {
    pub fn stat_count(&self) -> usize {
        self.stat_calls.borrow().len()
    }

    pub fn was_read(&self, p: &Path) -> bool {
        self.stat_calls.borrow().iter().any(|c| c == p)
    }
}

impl AttrProvider for CountingAttrs {
    fn lstat(&self, path: &Path) -> io::Result<LiveStat> {
        self.stat_calls.borrow_mut().push(path.to_path_buf());
        self.inner.lstat(path)
    }
    fn user_name(&self, uid: u32) -> Option<String> {
        self.inner.user_name(uid)
    }
    fn group_name(&self, gid: u32) -> Option<String> {
        self.inner.group_name(gid)
    }
    fn uid_by_name(&self, name: &str) -> Option<u32> {
        self.inner.uid_by_name(name)
    }
    fn gid_by_name(&self, name: &str) -> Option<u32> {
        self.inner.gid_by_name(name)
    }
    fn get_acl(&self, path: &Path) -> Result<String, StoreMetaError> {
        self.inner.get_acl(path)
    }
    fn set_acl(&self, path: &Path, acl: &str) -> Result<(), StoreMetaError> {
        self.inner.set_acl(path, acl)
    }
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>, no_follow: bool) -> io::Result<()> {
        self.inner.chown(path, uid, gid, no_follow)
    }
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.inner.chmod(path, mode)
    }
    fn set_times(&self, path: &Path, atime: i64, mtime: i64, no_follow: bool) -> io::Result<()> {
        self.inner.set_times(path, atime, mtime, no_follow)
    }
}

/// True when a usable `git` is on PATH.
pub fn have_git() -> bool {
    Command::new("git").arg("--version").output().is_ok_and(|o| o.status.success())
}

/// Run git in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .expect("spawn git");
    assert!(out.status.success(), "git {args:?} failed: {}", String::from_utf8_lossy(&out.stderr));
    String::from_utf8_lossy(&out.stdout).into_owned()
}

/// `git init` with hooks disabled so tests never run installed hooks.
pub fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["config", "core.hooksPath", ".git/test-no-hooks"]);
}
