//! Version-control collaborator.
//!
//! The engines only need four questions answered: which files are tracked,
//! which directories contain them, what is staged, and whether one path is
//! tracked. `GitCli` answers them by running `git` with NUL-separated output
//! so arbitrary path bytes survive untouched.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, trace};

use crate::errors::StoreMetaError;
use crate::platform::path_from_bytes;
use crate::store::merge::ancestors;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Modified,
    Deleted,
}

/// One entry of the staged change feed. `path` is worktree-relative,
/// slash-separated, unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub status: ChangeStatus,
    pub path: Vec<u8>,
}

pub trait Vcs {
    /// Worktree-relative paths of every tracked file.
    fn tracked_files(&self) -> Result<Vec<Vec<u8>>, StoreMetaError>;
    /// Every directory that contains a tracked file, excluding the root.
    fn tracked_dirs(&self) -> Result<Vec<Vec<u8>>, StoreMetaError>;
    /// Staged changes relative to the last commit. Renames arrive as a delete
    /// plus a modify.
    fn staged_changes(&self) -> Result<Vec<Change>, StoreMetaError>;
    fn is_tracked(&self, path: &[u8]) -> Result<bool, StoreMetaError>;
}

/// `Vcs` backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
}

impl GitCli {
    /// Locate the worktree containing `start`.
    pub fn discover(start: &Path) -> Result<Self, StoreMetaError> {
        let out = run_git(start, ["rev-parse", "--show-toplevel"])?;
        let top = trim_line(&out.stdout);
        if top.is_empty() {
            return Err(StoreMetaError::Vcs {
                command: "git rev-parse --show-toplevel".into(),
                detail: "not inside a work tree".into(),
            });
        }
        let root = path_from_bytes(top);
        debug!(root = %root.display(), "discovered worktree");
        Ok(Self { root })
    }

    /// Use `root` as the worktree without asking git.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn worktree_root(&self) -> &Path {
        &self.root
    }

    /// Directory git runs hooks from (honors `core.hooksPath`).
    pub fn hooks_dir(&self) -> Result<PathBuf, StoreMetaError> {
        self.git_path(["rev-parse", "--git-path", "hooks"])
    }

    fn git_path<const N: usize>(&self, args: [&str; N]) -> Result<PathBuf, StoreMetaError> {
        let out = run_git(&self.root, args)?;
        let p = path_from_bytes(trim_line(&out.stdout));
        Ok(if p.is_absolute() { p } else { self.root.join(p) })
    }
}

impl Vcs for GitCli {
    fn tracked_files(&self) -> Result<Vec<Vec<u8>>, StoreMetaError> {
        let out = run_git(&self.root, ["ls-files", "-z"])?;
        Ok(split_nul(&out.stdout))
    }

    fn tracked_dirs(&self) -> Result<Vec<Vec<u8>>, StoreMetaError> {
        Ok(dirs_of(&self.tracked_files()?))
    }

    fn staged_changes(&self) -> Result<Vec<Change>, StoreMetaError> {
        let out = run_git(
            &self.root,
            ["diff", "--cached", "--name-status", "--no-renames", "-z"],
        )?;
        parse_name_status(&out.stdout)
    }

    fn is_tracked(&self, path: &[u8]) -> Result<bool, StoreMetaError> {
        let rel = path_from_bytes(path);
        let out = git_command(&self.root)
            .args(["ls-files", "-z", "--error-unmatch", "--"])
            .arg(&rel)
            .output()
            .map_err(|e| spawn_error("git ls-files --error-unmatch", e))?;
        trace!(path = %rel.display(), tracked = out.status.success(), "is_tracked");
        Ok(out.status.success())
    }
}

/// Ancestor directories of `files`, deduplicated and byte-sorted.
pub fn dirs_of(files: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let set: BTreeSet<&[u8]> = files.iter().flat_map(|f| ancestors(f)).collect();
    set.into_iter().map(<[u8]>::to_vec).collect()
}

fn git_command(cwd: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(cwd);
    cmd
}

fn spawn_error(command: &str, e: std::io::Error) -> StoreMetaError {
    StoreMetaError::Vcs {
        command: command.to_string(),
        detail: format!("failed to run git: {e}"),
    }
}

fn run_git<I, S>(cwd: &Path, args: I) -> Result<Output, StoreMetaError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let rendered = std::iter::once("git".to_string())
        .chain(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()))
        .collect::<Vec<_>>()
        .join(" ");
    trace!(cwd = %cwd.display(), command = %rendered, "running");
    let out = git_command(cwd)
        .args(&args)
        .output()
        .map_err(|e| spawn_error(&rendered, e))?;
    if !out.status.success() {
        return Err(StoreMetaError::Vcs {
            command: rendered,
            detail: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(out)
}

fn trim_line(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && matches!(bytes[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &bytes[..end]
}

fn split_nul(bytes: &[u8]) -> Vec<Vec<u8>> {
    bytes
        .split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}

/// Parse `git diff --name-status --no-renames -z` output:
/// `STATUS NUL PATH NUL` repeated.
pub fn parse_name_status(bytes: &[u8]) -> Result<Vec<Change>, StoreMetaError> {
    let mut tokens = bytes.split(|&b| b == 0).filter(|s| !s.is_empty());
    let mut out = Vec::new();
    while let Some(status) = tokens.next() {
        let path = tokens.next().ok_or_else(|| StoreMetaError::Vcs {
            command: "git diff --cached --name-status".into(),
            detail: format!("status '{}' without a path", String::from_utf8_lossy(status)),
        })?;
        let status = if status.first() == Some(&b'D') {
            ChangeStatus::Deleted
        } else {
            ChangeStatus::Modified
        };
        out.push(Change {
            status,
            path: path.to_vec(),
        });
    }
    Ok(out)
}
