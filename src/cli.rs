//! CLI definition and parsing.
//! Defines Args and provides parse() for command-line handling.
//!
//! Notes:
//! - Exactly one action flag is required (unless --print-config is given).
//! - Flags override values loaded from the XML config.

use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser, ValueHint};
use std::path::PathBuf;
use std::str::FromStr;

use crate::actions::Action;
use crate::config::types::{Config, LogLevel};
use crate::store::{parse_field_list, Field};

/// Comma separated field list as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList(pub Vec<Field>);

impl FromStr for FieldList {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_field_list(s).map(FieldList).map_err(|e| e.to_string())
    }
}

/// Store, update and apply file metadata for a git worktree.
/// CLI flags override config values (which are loaded from XML if present).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "git-store-meta",
    author,
    version,
    about = "Store and restore file metadata (mtime, mode, owner, ACL) for a git worktree"
)]
#[command(group(ArgGroup::new("action").args(["store", "update", "apply", "install"])))]
pub struct Args {
    /// Record metadata of every tracked path into a new store.
    #[arg(short = 's', long)]
    pub store: bool,

    /// Refresh the store from the staged changes (full store if none exists).
    #[arg(short = 'u', long)]
    pub update: bool,

    /// Apply the recorded metadata to the worktree.
    #[arg(short = 'a', long)]
    pub apply: bool,

    /// Install git hooks that update the store on commit and apply it on checkout/merge.
    #[arg(short = 'i', long)]
    pub install: bool,

    /// Comma separated fields: store columns, or the subset to apply.
    #[arg(short = 'f', long, value_name = "LIST")]
    pub fields: Option<FieldList>,

    /// Track directories as well as files.
    #[arg(short = 'd', long)]
    pub directory: bool,

    /// Show what would be done, but do not modify anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Log every attempted change.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Suppress the error message on failure; only the exit code remains.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Store file, relative to the worktree root.
    #[arg(short = 't', long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub target: Option<PathBuf>,

    /// Set log level. One of: quiet, normal, info, debug.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Also write logs to this file.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,

    /// Emit logs in structured JSON.
    #[arg(long)]
    pub json: bool,

    /// Print the config file location and exit.
    #[arg(long)]
    pub print_config: bool,
}

impl Args {
    /// The requested action, if any.
    pub fn action(&self) -> Option<Action> {
        if self.store {
            Some(Action::Store)
        } else if self.update {
            Some(Action::Update)
        } else if self.apply {
            Some(Action::Apply)
        } else if self.install {
            Some(Action::Install)
        } else {
            None
        }
    }

    /// Apply CLI overrides to a loaded Config (in-place). No-ops for unset flags.
    pub fn apply_overrides(&self, cfg: &mut Config) {
        if let Some(FieldList(fields)) = &self.fields {
            cfg.fields = Some(fields.clone());
        }
        if let Some(t) = &self.target {
            cfg.target = t.clone();
        }
        if self.directory {
            cfg.directories = true;
        }
        if self.dry_run {
            cfg.dry_run = true;
        }
        if self.verbose {
            cfg.verbose = true;
        }
        if self.quiet {
            cfg.quiet = true;
        }
        if let Some(level) = self.log_level {
            cfg.log_level = level;
        }
        if let Some(f) = &self.log_file {
            cfg.log_file = Some(f.clone());
        }
    }
}

/// Parse the process arguments. Exits with a usage error (code 2) when no
/// action was given.
pub fn parse() -> Args {
    let args = Args::parse();
    if args.action().is_none() && !args.print_config {
        Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "one of --store, --update, --apply or --install is required",
            )
            .exit();
    }
    args
}
