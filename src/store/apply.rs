//! Apply engine: restore recorded attributes onto the live tree.
//!
//! Every field is attempted independently; a failure is logged as a warning
//! and processing moves on to the next field and the next record. Missing
//! paths and kind mismatches skip the record. Only I/O failures on the store
//! itself are fatal.

use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info, warn};

use super::codec::decode_record;
use super::header::{check_schema, parse_header};
use super::record::{format_utc, Field, Kind, MetaRecord};
use crate::errors::StoreMetaError;
use crate::platform::{resolve_in, AttrProvider, LiveStat};

/// Options for one apply run.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Apply directory records (skipped otherwise).
    pub directories: bool,
    /// Validate and log, but call no mutating primitive.
    pub dry_run: bool,
    /// Log every attempted change at info level.
    pub verbose: bool,
    /// Restrict to these fields; `None` applies everything stored.
    pub only: Option<Vec<Field>>,
}

/// Counts reported after an apply run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplySummary {
    pub records: usize,
    /// Field changes that succeeded (or would have, in dry-run).
    pub applied: usize,
    /// Field changes that failed.
    pub failed: usize,
    /// Records skipped: missing, kind changed, undecodable or directory.
    pub skipped: usize,
}

fn note(verbose: bool, path: &Path, field: &str, value: &str) {
    if verbose {
        info!(path = %path.display(), field, value, "set");
    } else {
        debug!(path = %path.display(), field, value, "set");
    }
}

fn report(summary: &mut ApplySummary, err: Option<StoreMetaError>) {
    match err {
        None => summary.applied += 1,
        Some(StoreMetaError::Unsupported(what)) => {
            debug!("{what} is not supported here; field ignored");
        }
        Some(e) => {
            warn!(code = e.code(), kind = e.kind(), "{e}");
            summary.failed += 1;
        }
    }
}

/// A stored owner name with no local match and no numeric id. Dry-run only
/// warns, since nothing would have been changed anyway.
fn unresolved(path: &Path, field: &'static str, name: Option<&str>, opts: &ApplyOptions, summary: &mut ApplySummary) {
    let name = name.unwrap_or("");
    if opts.dry_run {
        warn!(path = %path.display(), field, name, "dry-run: name does not resolve on this system");
        summary.applied += 1;
    } else {
        report(summary, Some(apply_failure(path, field, format!("cannot resolve {field} '{name}'"))));
    }
}

fn apply_failure(path: &Path, field: &'static str, detail: impl ToString) -> StoreMetaError {
    StoreMetaError::AttributeApply {
        path: path.to_path_buf(),
        field,
        detail: detail.to_string(),
    }
}

/// Read a store from `reader` and apply it under `root`.
///
/// `store` names the store for error messages. Header problems are fatal
/// (`MalformedStore` / `UnsupportedSchema`); everything per record is not.
pub fn apply_store<R: BufRead>(
    reader: &mut R,
    store: &Path,
    root: &Path,
    provider: &dyn AttrProvider,
    opts: &ApplyOptions,
) -> Result<ApplySummary, StoreMetaError> {
    let header = parse_header(reader, store)?;
    check_schema(&header, store)?;

    let fields: Vec<Field> = match &opts.only {
        Some(only) => {
            for f in only.iter().filter(|f| !f.is_mandatory()) {
                if !header.fields.contains(f) {
                    warn!(field = %f, store = %store.display(), "field not present in store; ignored");
                }
            }
            header
                .fields
                .iter()
                .copied()
                .filter(|f| f.is_mandatory() || only.contains(f))
                .collect()
        }
        None => header.fields.clone(),
    };
    debug!(version = %header.version, fields = ?fields, "applying store");

    let mut summary = ApplySummary::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| StoreMetaError::io(store, e))?;
        if n == 0 {
            break;
        }
        if buf.iter().all(|b| b.is_ascii_whitespace()) {
            continue;
        }
        summary.records += 1;
        let Some(mut rec) = decode_record(&buf, &header.fields) else {
            warn!(line = %String::from_utf8_lossy(&buf).trim_end(), "unrecognized store record; skipping");
            summary.skipped += 1;
            continue;
        };
        restrict(&mut rec, &fields);
        apply_record(&rec, root, provider, opts, &mut summary);
    }

    info!(
        records = summary.records,
        applied = summary.applied,
        failed = summary.failed,
        skipped = summary.skipped,
        dry_run = opts.dry_run,
        "apply complete"
    );
    Ok(summary)
}

/// Clear attributes that are not part of `fields`.
fn restrict(rec: &mut MetaRecord, fields: &[Field]) {
    let keep = |f: Field| fields.contains(&f);
    if !keep(Field::Mtime) {
        rec.mtime = None;
    }
    if !keep(Field::Atime) {
        rec.atime = None;
    }
    if !keep(Field::Mode) {
        rec.mode = None;
    }
    if !keep(Field::Uid) {
        rec.uid = None;
    }
    if !keep(Field::Gid) {
        rec.gid = None;
    }
    if !keep(Field::User) {
        rec.user = None;
    }
    if !keep(Field::Group) {
        rec.group = None;
    }
    if !keep(Field::Acl) {
        rec.acl = None;
    }
}

/// Apply one decoded record. Non-fatal problems are logged and counted.
pub fn apply_record(
    rec: &MetaRecord,
    root: &Path,
    provider: &dyn AttrProvider,
    opts: &ApplyOptions,
    summary: &mut ApplySummary,
) {
    let path = resolve_in(root, &rec.path);
    if rec.kind == Kind::Directory && !opts.directories {
        debug!(path = %path.display(), "directory record; directory tracking off");
        summary.skipped += 1;
        return;
    }

    let live = match provider.lstat(&path) {
        Ok(st) => st,
        Err(_) => {
            let e = StoreMetaError::PathMissing(path.clone());
            warn!(code = e.code(), kind = e.kind(), "{e}");
            summary.skipped += 1;
            return;
        }
    };
    let live_kind = match live.kind {
        Some(k) if rec.kind.compatible_with(k) => k,
        other => {
            let e = StoreMetaError::PathKindMismatch {
                path: path.clone(),
                recorded: rec.kind.as_char(),
                found: other.map(|k| k.to_string()).unwrap_or_else(|| "unsupported".into()),
            };
            warn!(code = e.code(), kind = e.kind(), "{e}");
            summary.skipped += 1;
            return;
        }
    };
    let is_link = live_kind == Kind::Symlink;

    apply_owner(rec, &path, is_link, provider, opts, summary);
    apply_group(rec, &path, is_link, provider, opts, summary);

    if let Some(mode) = rec.mode.filter(|_| !is_link) {
        let mode = mode & 0o7777;
        note(opts.verbose, &path, "mode", &format!("{mode:04o}"));
        let err = if opts.dry_run {
            None
        } else {
            provider.chmod(&path, mode).err().map(|e| apply_failure(&path, "mode", e))
        };
        report(summary, err);
    }

    if let Some(acl) = rec.acl.as_deref().filter(|_| !is_link) {
        note(opts.verbose, &path, "acl", acl);
        let err = if opts.dry_run {
            None
        } else {
            match provider.set_acl(&path, acl) {
                Ok(()) => None,
                Err(StoreMetaError::Unsupported(what)) => Some(StoreMetaError::Unsupported(what)),
                Err(e) => Some(apply_failure(&path, "acl", e)),
            }
        };
        report(summary, err);
    }

    apply_times(rec, &path, &live, is_link, provider, opts, summary);
}

fn apply_owner(
    rec: &MetaRecord,
    path: &Path,
    is_link: bool,
    provider: &dyn AttrProvider,
    opts: &ApplyOptions,
    summary: &mut ApplySummary,
) {
    if rec.user.is_none() && rec.uid.is_none() {
        return;
    }
    let by_name = rec.user.as_deref().and_then(|name| provider.uid_by_name(name));
    if by_name.is_none() {
        if let Some(name) = rec.user.as_deref() {
            debug!(path = %path.display(), user = name, "user name unknown; trying uid");
        }
    }
    let Some(uid) = by_name.or(rec.uid) else {
        unresolved(path, "user", rec.user.as_deref(), opts, summary);
        return;
    };
    note(opts.verbose, path, "uid", &uid.to_string());
    let err = if opts.dry_run {
        None
    } else {
        provider
            .chown(path, Some(uid), None, is_link)
            .err()
            .map(|e| apply_failure(path, "user", e))
    };
    report(summary, err);
}

fn apply_group(
    rec: &MetaRecord,
    path: &Path,
    is_link: bool,
    provider: &dyn AttrProvider,
    opts: &ApplyOptions,
    summary: &mut ApplySummary,
) {
    if rec.group.is_none() && rec.gid.is_none() {
        return;
    }
    let by_name = rec.group.as_deref().and_then(|name| provider.gid_by_name(name));
    let Some(gid) = by_name.or(rec.gid) else {
        unresolved(path, "group", rec.group.as_deref(), opts, summary);
        return;
    };
    note(opts.verbose, path, "gid", &gid.to_string());
    let err = if opts.dry_run {
        None
    } else {
        provider
            .chown(path, None, Some(gid), is_link)
            .err()
            .map(|e| apply_failure(path, "group", e))
    };
    report(summary, err);
}

/// mtime and atime go through one call; a missing half keeps the live value.
fn apply_times(
    rec: &MetaRecord,
    path: &Path,
    live: &LiveStat,
    is_link: bool,
    provider: &dyn AttrProvider,
    opts: &ApplyOptions,
    summary: &mut ApplySummary,
) {
    if rec.mtime.is_none() && rec.atime.is_none() {
        return;
    }
    let mtime = rec.mtime.unwrap_or(live.mtime);
    let atime = rec.atime.unwrap_or(live.atime);
    note(
        opts.verbose,
        path,
        "times",
        &format!("mtime={} atime={}", format_utc(mtime), format_utc(atime)),
    );
    let err = if opts.dry_run {
        None
    } else {
        provider
            .set_times(path, atime, mtime, is_link)
            .err()
            .map(|e| apply_failure(path, "times", e))
    };
    report(summary, err);
}
