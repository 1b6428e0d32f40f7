//! Live metadata capture for one tracked path.
//! Shared by the snapshot builder and the merge engine so both produce
//! identical records for identical filesystem state.

use std::io;
use std::path::Path;
use tracing::{debug, warn};

use super::record::{Field, Kind, MetaRecord, SYMLINK_MODE};
use crate::errors::StoreMetaError;
use crate::platform::{resolve_in, AttrProvider};

/// Read the attributes named in `fields` for `raw` (relative to `root`).
///
/// Returns `None` when the path cannot be recorded: it vanished, could not be
/// stat'ed, or is not a file, directory or symlink. Only the lookups needed for
/// `fields` are performed.
pub fn capture(provider: &dyn AttrProvider, root: &Path, raw: &[u8], fields: &[Field]) -> Option<MetaRecord> {
    let full = resolve_in(root, raw);
    let st = match provider.lstat(&full) {
        Ok(st) => st,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %full.display(), "path vanished before capture; skipping");
            return None;
        }
        Err(e) => {
            warn!(path = %full.display(), error = %e, "cannot stat path; skipping");
            return None;
        }
    };
    let Some(kind) = st.kind else {
        debug!(path = %full.display(), "unsupported file type; skipping");
        return None;
    };

    let mut rec = MetaRecord::new(raw.to_vec(), kind);
    for field in fields {
        match field {
            Field::File | Field::Type => {}
            Field::Mtime => rec.mtime = Some(st.mtime),
            Field::Atime => rec.atime = Some(st.atime),
            Field::Mode => {
                rec.mode = Some(if kind == Kind::Symlink { SYMLINK_MODE } else { st.mode & 0o7777 })
            }
            Field::Uid => rec.uid = Some(st.uid),
            Field::Gid => rec.gid = Some(st.gid),
            Field::User => rec.user = provider.user_name(st.uid),
            Field::Group => rec.group = provider.group_name(st.gid),
            Field::Acl => {
                if kind != Kind::Symlink {
                    rec.acl = match provider.get_acl(&full) {
                        Ok(acl) => Some(acl).filter(|a| !a.is_empty()),
                        Err(StoreMetaError::Unsupported(what)) => {
                            debug!(path = %full.display(), "{what} not supported; field left empty");
                            None
                        }
                        Err(e) => {
                            warn!(path = %full.display(), error = %e, "failed to read acl");
                            None
                        }
                    };
                }
            }
        }
    }
    Some(rec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{dir, file, FakeAttrs};
    use crate::platform::LiveStat;

    fn all_fields() -> Vec<Field> {
        Field::ALL.to_vec()
    }

    #[test]
    fn captures_requested_fields_only() {
        let mut attrs = FakeAttrs::default();
        attrs.users.insert(1000, "alice".into());
        attrs.insert("/repo/a.txt", file(0o644, 100));

        let rec = capture(&attrs, Path::new("/repo"), b"a.txt", &[Field::File, Field::Type, Field::Mode]).unwrap();
        assert_eq!(rec.kind, Kind::File);
        assert_eq!(rec.mode, Some(0o644));
        assert_eq!(rec.mtime, None);
        assert_eq!(rec.user, None);

        let rec = capture(&attrs, Path::new("/repo"), b"a.txt", &all_fields()).unwrap();
        assert_eq!(rec.user.as_deref(), Some("alice"));
        assert_eq!(rec.group, None);
        assert_eq!(rec.uid, Some(1000));
        assert_eq!(rec.mtime, Some(100));
    }

    #[test]
    fn symlink_mode_is_normalized() {
        let attrs = FakeAttrs::default();
        attrs.insert(
            "/repo/link",
            LiveStat { kind: Some(Kind::Symlink), mode: 0o777, uid: 0, gid: 0, atime: 1, mtime: 2 },
        );
        let rec = capture(&attrs, Path::new("/repo"), b"link", &all_fields()).unwrap();
        assert_eq!(rec.kind, Kind::Symlink);
        assert_eq!(rec.mode, Some(SYMLINK_MODE));
        assert_eq!(rec.acl, None);
    }

    #[test]
    fn missing_and_unsupported_paths_are_skipped() {
        let attrs = FakeAttrs::default();
        attrs.insert(
            "/repo/fifo",
            LiveStat { kind: None, mode: 0o644, uid: 0, gid: 0, atime: 0, mtime: 0 },
        );
        attrs.insert("/repo/d", dir(5));
        assert!(capture(&attrs, Path::new("/repo"), b"fifo", &all_fields()).is_none());
        assert!(capture(&attrs, Path::new("/repo"), b"gone", &all_fields()).is_none());
        assert!(capture(&attrs, Path::new("/repo"), b"d", &all_fields()).is_some());
    }
}
