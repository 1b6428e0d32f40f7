//! The metadata store: file format, capture, and the three engines.
//!
//! - `record` / `codec` / `header`: vocabulary and the on-disk format.
//! - `capture`: one live read per tracked path.
//! - `snapshot`: full rebuild from the tracked path list.
//! - `merge`: incremental rebuild from the staged change feed.
//! - `apply`: restore recorded attributes onto the worktree.

pub mod apply;
pub mod capture;
pub mod codec;
pub mod header;
pub mod merge;
pub mod record;
pub mod snapshot;

pub use apply::{apply_store, ApplyOptions, ApplySummary};
pub use header::{check_schema, parse_header, write_header, StoreHeader, SCHEMA_VERSION};
pub use merge::{merge_records, MergeInput, MergeSummary};
pub use record::{default_fields, parse_field_list, Field, Kind, MetaRecord};
pub use snapshot::{build_snapshot, SnapshotSummary};

/// Store file name, relative to the worktree root.
pub const STORE_FILE_DEFAULT: &str = ".git_store_meta";
