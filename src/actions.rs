//! The four user-facing actions: store, update, apply and install.
//!
//! Each action takes its collaborators explicitly so tests can substitute a
//! fake `Vcs` or `AttrProvider`. Store and update stream into a `StagedFile`
//! and publish by rename only after the whole store was written; dry-run
//! writes into a sink instead, so nothing on disk changes.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::errors::StoreMetaError;
use crate::hooks::{install_hooks, HookReport, HookSettings};
use crate::platform::{path_to_bytes, AttrProvider, StagedFile};
use crate::store::codec::column;
use crate::store::{
    apply_store, build_snapshot, check_schema, merge_records, parse_header, write_header,
    ApplyOptions, ApplySummary, Field, Kind, MergeInput, MergeSummary, SnapshotSummary, StoreHeader,
};
use crate::vcs::Vcs;

/// Which action to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Store,
    Update,
    Apply,
    Install,
}

/// What an action did, for the final user-facing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stored(SnapshotSummary),
    Updated(MergeSummary),
    Applied(ApplySummary),
    Installed(HookReport),
}

/// Worktree-relative, slash-separated form of the store path.
pub fn target_key(cfg: &Config) -> Vec<u8> {
    let rel = cfg.target.strip_prefix(&cfg.root).unwrap_or(cfg.target.as_path());
    let mut norm = PathBuf::new();
    for c in rel.components() {
        match c {
            Component::Normal(s) => norm.push(s),
            Component::ParentDir => {
                norm.pop();
            }
            _ => {}
        }
    }
    path_to_bytes(&norm)
}

fn ensure_parent(store: &Path) -> Result<()> {
    if let Some(parent) = store.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create store directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Build a complete store from every tracked path.
pub fn run_store(cfg: &Config, vcs: &dyn Vcs, provider: &dyn AttrProvider) -> Result<SnapshotSummary> {
    let store = cfg.store_path();
    let fields = cfg.store_fields();
    let files = vcs.tracked_files()?;
    let dirs = if cfg.directories { Some(vcs.tracked_dirs()?) } else { None };
    debug!(files = files.len(), dirs = dirs.as_ref().map(Vec::len), "enumerated tracked paths");

    if cfg.dry_run {
        let summary = build_snapshot(&mut io::sink(), &store, &cfg.root, &files, dirs.as_deref(), &fields, provider)?;
        info!(store = %store.display(), "dry-run: store not written");
        return Ok(summary);
    }

    ensure_parent(&store)?;
    let mut staged = StagedFile::create(&store)?;
    let summary = build_snapshot(&mut staged, &store, &cfg.root, &files, dirs.as_deref(), &fields, provider)?;
    staged.commit()?;
    info!(store = %store.display(), "store written");
    Ok(summary)
}

/// Header and record lines of an existing store. Lines keep their bytes
/// verbatim (newline removed); blank lines are skipped.
pub fn read_store(store: &Path) -> Result<(StoreHeader, Vec<Vec<u8>>), StoreMetaError> {
    let file = File::open(store).map_err(|e| StoreMetaError::io(store, e))?;
    let mut reader = BufReader::new(file);
    let header = parse_header(&mut reader, store)?;
    check_schema(&header, store)?;

    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| StoreMetaError::io(store, e))?;
        if n == 0 {
            break;
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        if !buf.is_empty() {
            lines.push(buf.clone());
        }
    }
    Ok((header, lines))
}

/// Whether the store was written with directory tracking. Only a `d` record
/// with a recorded descendant counts: without `-d` a directory can still be
/// recorded when git lists it as an entry (a submodule gitlink).
fn has_directory_records(header: &StoreHeader, lines: &[Vec<u8>]) -> bool {
    let Some(idx) = header.fields.iter().position(|f| *f == Field::Type) else {
        return false;
    };
    let dir = [Kind::Directory.as_char() as u8];
    let mut keys: Vec<&[u8]> = lines.iter().filter_map(|l| column(l, 0)).collect();
    keys.sort_unstable();
    lines
        .iter()
        .filter(|l| column(l, idx) == Some(&dir[..]))
        .filter_map(|l| column(l, 0))
        .any(|key| {
            let mut prefix = key.to_vec();
            prefix.push(b'/');
            let at = keys.partition_point(|k| *k < prefix.as_slice());
            keys.get(at).is_some_and(|k| k.starts_with(&prefix))
        })
}

/// Refresh the store from the staged change feed. Falls back to a full
/// store when no store exists yet.
pub fn run_update(cfg: &Config, vcs: &dyn Vcs, provider: &dyn AttrProvider) -> Result<Outcome> {
    let store = cfg.store_path();
    if !store.exists() {
        info!(store = %store.display(), "no store yet; building a full one");
        return run_store(cfg, vcs, provider).map(Outcome::Stored);
    }

    let (header, baseline) = read_store(&store)?;
    if cfg.fields.as_ref().is_some_and(|f| *f != header.fields) {
        warn!("update keeps the fields recorded in the store; --fields ignored");
    }
    let directories = cfg.directories || has_directory_records(&header, &baseline);

    let changes = vcs.staged_changes()?;
    let tracked_dirs = if directories { Some(vcs.tracked_dirs()?) } else { None };
    let key = target_key(cfg);
    let store_entry = if vcs.is_tracked(&key)? { Some(key.as_slice()) } else { None };
    debug!(
        baseline = baseline.len(),
        changes = changes.len(),
        directories,
        store_tracked = store_entry.is_some(),
        "merging"
    );

    let input = MergeInput {
        baseline: &baseline,
        changes: &changes,
        tracked_dirs: tracked_dirs.as_deref(),
        store_entry,
        fields: &header.fields,
    };
    let (lines, summary) = merge_records(&input, &cfg.root, provider);

    if cfg.dry_run {
        write_store(&mut io::sink(), &store, &header.fields, &lines)?;
        info!(store = %store.display(), "dry-run: store not written");
        return Ok(Outcome::Updated(summary));
    }
    let mut staged = StagedFile::create(&store)?;
    write_store(&mut staged, &store, &header.fields, &lines)?;
    staged.commit()?;
    info!(store = %store.display(), "store updated");
    Ok(Outcome::Updated(summary))
}

fn write_store<W: Write>(out: &mut W, store: &Path, fields: &[Field], lines: &[Vec<u8>]) -> Result<(), StoreMetaError> {
    let io_err = |e| StoreMetaError::io(store, e);
    write_header(out, fields).map_err(io_err)?;
    for line in lines {
        out.write_all(line).map_err(io_err)?;
        out.write_all(b"\n").map_err(io_err)?;
    }
    out.flush().map_err(io_err)
}

/// Restore the recorded attributes onto the worktree.
pub fn run_apply(cfg: &Config, provider: &dyn AttrProvider) -> Result<ApplySummary> {
    let store = cfg.store_path();
    let file = File::open(&store).map_err(|e| StoreMetaError::io(&store, e))?;
    let mut reader = BufReader::new(file);
    let opts = ApplyOptions {
        directories: cfg.directories,
        dry_run: cfg.dry_run,
        verbose: cfg.verbose,
        only: cfg.fields.clone(),
    };
    Ok(apply_store(&mut reader, &store, &cfg.root, provider, &opts)?)
}

/// Install the git hooks that keep the store in sync.
pub fn run_install(cfg: &Config, hooks_dir: &Path, program: String) -> Result<HookReport> {
    let settings = HookSettings {
        program,
        target: String::from_utf8_lossy(&target_key(cfg)).into_owned(),
        directories: cfg.directories,
    };
    install_hooks(hooks_dir, &settings, cfg.dry_run)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_key_is_normalized_and_relative() {
        let mut cfg = Config::new("/work");
        assert_eq!(target_key(&cfg), b".git_store_meta");
        cfg.target = PathBuf::from("./meta/../meta/store");
        assert_eq!(target_key(&cfg), b"meta/store");
        cfg.target = PathBuf::from("/work/sub/s");
        assert_eq!(target_key(&cfg), b"sub/s");
    }

    #[test]
    fn directory_records_are_detected() {
        let header = StoreHeader {
            producer: "git-store-meta".into(),
            version: "1.2.0".into(),
            fields: vec![Field::File, Field::Type],
        };
        assert!(!has_directory_records(&header, &[b"a\tf".to_vec()]));
        assert!(has_directory_records(&header, &[b"d\td".to_vec(), b"d-x\tf".to_vec(), b"d/x\tf".to_vec()]));
    }

    #[test]
    fn childless_directory_entry_does_not_enable_tracking() {
        let header = StoreHeader {
            producer: "git-store-meta".into(),
            version: "1.2.0".into(),
            fields: vec![Field::File, Field::Type],
        };
        let lines = [b"a/x\tf".to_vec(), b"sub\td".to_vec(), b"sub-file\tf".to_vec()];
        assert!(!has_directory_records(&header, &lines));
    }
}
