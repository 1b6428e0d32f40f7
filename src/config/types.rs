//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::store::{default_fields, Field, STORE_FILE_DEFAULT};

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Warnings and errors (default)
    #[default]
    Normal,
    /// Summaries and every attempted change
    Info,
    /// Per-path decisions
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" | "warn" => Some(LogLevel::Normal),
            "info" | "verbose" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worktree root; every recorded path is relative to it
    pub root: PathBuf,
    /// Store file, relative to `root`
    pub target: PathBuf,
    /// Explicit field list; `None` means the defaults (store) or everything stored (apply)
    pub fields: Option<Vec<Field>>,
    /// Track directories as well as files
    pub directories: bool,
    /// If true, log actions but do not modify the filesystem
    pub dry_run: bool,
    /// Log every attempted change
    pub verbose: bool,
    /// Suppress the fatal error message
    pub quiet: bool,
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            target: PathBuf::from(STORE_FILE_DEFAULT),
            fields: None,
            directories: false,
            dry_run: false,
            verbose: false,
            quiet: false,
            log_level: LogLevel::Normal,
            log_file: None,
        }
    }
}

impl Config {
    /// Construct a Config for `root`; other fields use defaults.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Absolute location of the store file.
    pub fn store_path(&self) -> PathBuf {
        self.root.join(&self.target)
    }

    /// Columns for a fresh store.
    pub fn store_fields(&self) -> Vec<Field> {
        self.fields.clone().unwrap_or_else(default_fields)
    }

    /// Console level after `--verbose` is taken into account.
    pub fn effective_log_level(&self) -> LogLevel {
        if self.verbose {
            self.log_level.max(LogLevel::Info)
        } else {
            self.log_level
        }
    }
}
