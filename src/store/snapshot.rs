//! Full snapshot builder.
//! Captures every tracked path and writes header + records sorted by escaped
//! path under byte-wise collation. The merge engine relies on that order.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use super::capture::capture;
use super::codec::{encode_record, escape_path};
use super::header::write_header;
use super::record::Field;
use crate::errors::StoreMetaError;
use crate::platform::AttrProvider;

/// Counts reported after a full snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub recorded: usize,
    pub skipped: usize,
}

/// Build a complete store from the tracked `files` and, when directory
/// tracking is on, the tracked `dirs`.
///
/// `store` names the output for error messages only; the caller owns staging
/// and publication of `out`.
pub fn build_snapshot<W: Write>(
    out: &mut W,
    store: &Path,
    root: &Path,
    files: &[Vec<u8>],
    dirs: Option<&[Vec<u8>]>,
    fields: &[Field],
    provider: &dyn AttrProvider,
) -> Result<SnapshotSummary, StoreMetaError> {
    let mut summary = SnapshotSummary::default();
    let mut lines: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();

    let paths = files.iter().chain(dirs.unwrap_or_default());
    for raw in paths {
        let key = escape_path(raw);
        if lines.contains_key(&key) {
            continue;
        }
        match capture(provider, root, raw, fields) {
            Some(rec) => {
                lines.insert(key, encode_record(&rec, fields));
            }
            None => summary.skipped += 1,
        }
    }

    let io_err = |e| StoreMetaError::io(store, e);
    write_header(out, fields).map_err(io_err)?;
    for line in lines.values() {
        out.write_all(line).map_err(io_err)?;
        out.write_all(b"\n").map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;

    summary.recorded = lines.len();
    debug!(store = %store.display(), "snapshot written");
    info!(recorded = summary.recorded, skipped = summary.skipped, "full snapshot built");
    Ok(summary)
}
