//! Core library for `git-store-meta`.
//!
//! Git records file contents but not their metadata. This crate keeps a flat,
//! sorted store of timestamps, permissions, ownership and ACLs for every
//! tracked path, refreshes it incrementally from the staged changes, and
//! applies it back onto a worktree after checkout.
//!
//! Layers, innermost first:
//! - `store`: the file format and the snapshot, merge and apply engines.
//! - `platform`: the attribute provider and staged store publication.
//! - `vcs`: the git collaborator.
//! - `actions` / `hooks`: what the command line runs.

pub mod actions;
pub mod cli;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod output;
pub mod platform;
pub mod store;
pub mod vcs;

pub use actions::{run_apply, run_install, run_store, run_update, Action, Outcome};
pub use config::{default_config_path, path_has_symlink_ancestor, Config, LogLevel};
pub use errors::StoreMetaError;
pub use platform::{AttrProvider, NativeAttrs};
pub use store::{ApplySummary, Field, Kind, MergeSummary, MetaRecord, SnapshotSummary};
pub use vcs::{Change, ChangeStatus, GitCli, Vcs};
