//! Staged store writes.
//! - Records stream into a hidden temp sibling of the target (create_new).
//! - `commit` flushes, fsyncs, renames over the target and fsyncs the parent.
//! - A staged file that is dropped without `commit` is removed, never promoted.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::temp::tmp_sibling_name;

pub struct StagedFile {
    target: PathBuf,
    tmp: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl StagedFile {
    /// Create the temp sibling for `target`. The parent directory must exist.
    pub fn create(target: &Path) -> Result<Self> {
        let tmp = tmp_sibling_name(target);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .with_context(|| format!("create staging file '{}'", tmp.display()))?;
        debug!(staging = %tmp.display(), target = %target.display(), "staging store");
        Ok(Self {
            target: target.to_path_buf(),
            tmp,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn staging_path(&self) -> &Path {
        &self.tmp
    }

    /// Publish the staged content over the target by atomic rename.
    pub fn commit(mut self) -> Result<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| anyhow::anyhow!("staging file already closed"))?;
        let file = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .with_context(|| format!("flush staging file '{}'", self.tmp.display()))?;
        file.sync_all().context("fsync staging file")?;
        drop(file);

        fs::rename(&self.tmp, &self.target).with_context(|| {
            format!("rename '{}' -> '{}'", self.tmp.display(), self.target.display())
        })?;

        #[cfg(unix)]
        if let Some(parent) = self.target.parent().filter(|p| !p.as_os_str().is_empty()) {
            // The rename already happened; a failed directory fsync is not worth failing for.
            if let Err(e) = File::open(parent).and_then(|d| d.sync_all()) {
                warn!(dir = %parent.display(), error = %e, "failed to fsync store directory");
            }
        }
        debug!(target = %self.target.display(), "published store");
        Ok(())
    }

    /// Drop the staged content without publishing.
    pub fn discard(self) {}
}

impl Write for StagedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(w) => w.write(buf),
            None => Err(io::Error::other("staging file already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.tmp) {
                warn!(staging = %self.tmp.display(), error = %e, "failed to remove staging file");
            } else {
                debug!(staging = %self.tmp.display(), "discarded staging file");
            }
        }
    }
}
