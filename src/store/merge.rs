//! Incremental merge of a changed-path feed into a prior snapshot.
//!
//! Every input becomes a [`Candidate`]: a baseline line from the prior store,
//! or a directive (Delete / Hold / Modify) derived from the change feed and the
//! current directory list. Candidates are sorted by `(escaped path, priority)`
//! and resolved in a single pass that keeps at most one record per path.
//!
//! Priority order is `Delete < Hold < Modify < Baseline`:
//! - Delete suppresses the path. Ancestor directories get tentative Deletes.
//! - Hold marks a directory that still exists. It emits nothing but clears the
//!   current group, so the Modify or baseline that follows survives and the
//!   tentative Delete is cancelled.
//! - Modify re-reads live metadata. It is the only candidate that touches the
//!   filesystem.
//! - Baseline lines pass through verbatim unless something earlier claimed
//!   their path.

use std::path::Path;
use tracing::{debug, info, warn};

use super::capture::capture;
use super::codec::{column, encode_record, escape_path, unescape_path};
use super::record::Field;
use crate::platform::AttrProvider;
use crate::vcs::{Change, ChangeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Delete,
    Hold,
    Modify,
    Baseline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    Delete,
    Hold,
    Modify,
    /// Prior store line, without its newline.
    Baseline(Vec<u8>),
}

/// One entry of the merge multiset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Escaped path; byte-wise ordering of this key is the store order.
    key: Vec<u8>,
    payload: Payload,
}

impl Candidate {
    fn directive(raw: &[u8], payload: Payload) -> Self {
        Self {
            key: escape_path(raw),
            payload,
        }
    }

    pub fn priority(&self) -> Priority {
        match self.payload {
            Payload::Delete => Priority::Delete,
            Payload::Hold => Priority::Hold,
            Payload::Modify => Priority::Modify,
            Payload::Baseline(_) => Priority::Baseline,
        }
    }

    fn sort_key(&self) -> (&[u8], Priority) {
        (&self.key, self.priority())
    }
}

/// Sort candidates by `(escaped path, priority)`. The sort is stable, so
/// duplicate baseline lines keep their file order.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Everything the merge needs besides the attribute provider.
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    /// Record lines of the prior store (header excluded).
    pub baseline: &'a [Vec<u8>],
    pub changes: &'a [Change],
    /// Current tracked directories; `Some` enables directory tracking.
    pub tracked_dirs: Option<&'a [Vec<u8>]>,
    /// Raw path of the store file when the store itself is tracked.
    pub store_entry: Option<&'a [u8]>,
    /// Field list of the prior store; new records use the same columns.
    pub fields: &'a [Field],
}

/// Counts reported after a merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records written from a fresh live read.
    pub refreshed: usize,
    /// Baseline lines copied through unchanged.
    pub carried: usize,
    /// Baseline lines that did not survive (deleted or superseded).
    pub dropped: usize,
}

/// Proper ancestors of a slash-separated path, nearest first.
/// `a/b/c` yields `a/b` then `a`; the worktree root is never included.
pub fn ancestors(raw: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut end = raw.len();
    std::iter::from_fn(move || {
        let slash = raw[..end].iter().rposition(|&b| b == b'/')?;
        end = slash;
        Some(&raw[..slash]).filter(|p| !p.is_empty())
    })
}

/// Build the unsorted candidate multiset.
pub fn collect_candidates(input: &MergeInput<'_>) -> Vec<Candidate> {
    let dirs_enabled = input.tracked_dirs.is_some();
    let mut out = Vec::with_capacity(input.baseline.len() + input.changes.len() * 2);

    for change in input.changes {
        let payload = match change.status {
            ChangeStatus::Modified => Payload::Modify,
            ChangeStatus::Deleted => Payload::Delete,
        };
        out.push(Candidate::directive(&change.path, payload.clone()));
        if dirs_enabled {
            for dir in ancestors(&change.path) {
                out.push(Candidate::directive(dir, payload.clone()));
            }
        }
    }

    for dir in input.tracked_dirs.unwrap_or_default() {
        out.push(Candidate::directive(dir, Payload::Hold));
    }

    if let Some(store) = input.store_entry {
        out.push(Candidate::directive(store, Payload::Modify));
    }

    let file_col = input.fields.iter().position(|f| *f == Field::File).unwrap_or(0);
    for line in input.baseline {
        match column(line, file_col) {
            // Re-escaping normalizes lines written with the older backslash convention.
            Some(path) if !path.is_empty() => out.push(Candidate {
                key: escape_path(&unescape_path(path)),
                payload: Payload::Baseline(line.clone()),
            }),
            _ => warn!(
                line = %String::from_utf8_lossy(line),
                "store line has no path; dropping"
            ),
        }
    }
    out
}

/// Merge the change feed into the baseline and return the new record lines
/// (without newlines) in store order.
pub fn merge_records(
    input: &MergeInput<'_>,
    root: &Path,
    provider: &dyn AttrProvider,
) -> (Vec<Vec<u8>>, MergeSummary) {
    let mut candidates = collect_candidates(input);
    sort_candidates(&mut candidates);

    let mut summary = MergeSummary::default();
    let mut merged = Vec::new();
    let mut group: Option<&[u8]> = None;

    for cand in &candidates {
        let key = cand.key.as_slice();
        if cand.payload != Payload::Hold && group == Some(key) {
            continue;
        }
        match &cand.payload {
            Payload::Hold => group = None,
            Payload::Delete => {
                group = Some(key);
                debug!(path = %String::from_utf8_lossy(key), "deleted");
            }
            Payload::Modify => {
                group = Some(key);
                let raw = unescape_path(key);
                match capture(provider, root, &raw, input.fields) {
                    Some(rec) => {
                        debug!(path = %rec.display_path(), "refreshed");
                        merged.push(encode_record(&rec, input.fields));
                        summary.refreshed += 1;
                    }
                    None => {
                        debug!(path = %String::from_utf8_lossy(key), "modified path not capturable");
                    }
                }
            }
            Payload::Baseline(line) => {
                group = Some(key);
                merged.push(line.clone());
                summary.carried += 1;
            }
        }
    }

    summary.dropped = input.baseline.len() - summary.carried;
    info!(
        refreshed = summary.refreshed,
        carried = summary.carried,
        dropped = summary.dropped,
        "incremental merge complete"
    );
    (merged, summary)
}
