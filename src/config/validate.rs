//! Config validation logic.
//! Verifies the worktree root, keeps the store file inside it, and checks the
//! field list before any engine runs.

use std::path::{Component, Path};
use tracing::debug;

use super::types::Config;
use crate::errors::StoreMetaError;
use crate::store::Field;

impl Config {
    /// Validate the root, the store location and the field list.
    pub fn validate(&self) -> Result<(), StoreMetaError> {
        ensure_dir_exists_and_is_dir(&self.root, "worktree root")?;
        ensure_target_inside_root(&self.root, &self.target)?;
        if let Some(fields) = &self.fields {
            ensure_fields_well_formed(fields)?;
        }
        debug!(
            root = %self.root.display(),
            target = %self.target.display(),
            directories = self.directories,
            dry_run = self.dry_run,
            "config validated"
        );
        Ok(())
    }
}

fn ensure_dir_exists_and_is_dir(path: &Path, name: &str) -> Result<(), StoreMetaError> {
    if !path.exists() {
        return Err(StoreMetaError::Config(format!("{name} does not exist: {}", path.display())));
    }
    if !path.is_dir() {
        return Err(StoreMetaError::Config(format!("{name} is not a directory: {}", path.display())));
    }
    Ok(())
}

/// The store must be a plain relative path that cannot climb out of the root.
fn ensure_target_inside_root(root: &Path, target: &Path) -> Result<(), StoreMetaError> {
    let rel = if target.is_absolute() {
        target.strip_prefix(root).map_err(|_| {
            StoreMetaError::Config(format!(
                "store file '{}' is outside the worktree '{}'",
                target.display(),
                root.display()
            ))
        })?
    } else {
        target
    };
    let mut depth = 0usize;
    let mut named = false;
    for c in rel.components() {
        match c {
            Component::Normal(_) => {
                depth += 1;
                named = true;
            }
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            _ => {
                return Err(StoreMetaError::Config(format!(
                    "store file '{}' must stay inside the worktree",
                    target.display()
                )));
            }
        }
    }
    if !named || depth == 0 {
        return Err(StoreMetaError::Config(format!(
            "store file '{}' does not name a file",
            target.display()
        )));
    }
    Ok(())
}

fn ensure_fields_well_formed(fields: &[Field]) -> Result<(), StoreMetaError> {
    if fields.first() != Some(&Field::File) || fields.get(1) != Some(&Field::Type) {
        return Err(StoreMetaError::Config("field list must start with file,type".into()));
    }
    for (i, f) in fields.iter().enumerate() {
        if fields[..i].contains(f) {
            return Err(StoreMetaError::Config(format!("field '{f}' listed twice")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn accepts_defaults_in_existing_root() {
        let dir = tempdir().unwrap();
        Config::new(dir.path()).validate().unwrap();
    }

    #[test]
    fn rejects_missing_root_and_file_root() {
        let dir = tempdir().unwrap();
        let err = Config::new(dir.path().join("nope")).validate().unwrap_err();
        assert_eq!(err.kind(), "config");
        let file = dir.path().join("f");
        std::fs::write(&file, b"").unwrap();
        assert!(Config::new(&file).validate().is_err());
    }

    #[test]
    fn target_must_stay_inside_root() {
        let dir = tempdir().unwrap();
        let mut cfg = Config::new(dir.path());
        for bad in ["../outside", "a/../../x", ".", "sub/..", "/etc/passwd"] {
            cfg.target = PathBuf::from(bad);
            assert!(cfg.validate().is_err(), "{bad} accepted");
        }
        for good in ["meta/.store", "./x", "a/../b"] {
            cfg.target = PathBuf::from(good);
            assert!(cfg.validate().is_ok(), "{good} rejected");
        }
        cfg.target = dir.path().join("inside");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn field_list_shape_is_checked() {
        let dir = tempdir().unwrap();
        let mut cfg = Config::new(dir.path());
        cfg.fields = Some(vec![Field::Type, Field::File]);
        assert!(cfg.validate().is_err());
        cfg.fields = Some(vec![Field::File, Field::Type, Field::Mode, Field::Mode]);
        assert!(cfg.validate().is_err());
        cfg.fields = Some(vec![Field::File, Field::Type, Field::Acl]);
        assert!(cfg.validate().is_ok());
    }
}
