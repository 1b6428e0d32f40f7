//! XML configuration support.
//! - Loads settings from config.xml (quick_xml + serde).
//! - Unknown elements are rejected so typos surface instead of being ignored.
//! - Only fills values; CLI overrides are merged by the caller.
//!
//! ```xml
//! <config>
//!   <target>.git_store_meta</target>
//!   <fields>mtime,mode,user,group</fields>
//!   <directory>true</directory>
//!   <log_level>info</log_level>
//!   <log_file>/var/log/git-store-meta.log</log_file>
//! </config>
//! ```

use anyhow::{Context, Result};
use quick_xml::de::from_str as from_xml_str;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::paths::default_config_path;
use super::types::{Config, LogLevel};
use crate::errors::StoreMetaError;
use crate::store::parse_field_list;

/// Struct mirroring the XML config for deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename = "config")]
#[serde(deny_unknown_fields)]
struct XmlConfig {
    target: Option<String>,
    fields: Option<String>,
    #[serde(default, deserialize_with = "de_bool_trimmed_opt")]
    directory: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

// Accept surrounding whitespace in boolean elements.
fn de_bool_trimmed_opt<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some("true" | "1" | "yes") => Ok(Some(true)),
        Some("false" | "0" | "no") => Ok(Some(false)),
        Some(other) => Err(serde::de::Error::custom(format!("invalid boolean '{other}'"))),
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// Map XmlConfig onto `cfg`; values the file leaves out keep their current setting.
fn apply_xml(parsed: XmlConfig, cfg: &mut Config) -> Result<(), StoreMetaError> {
    if let Some(t) = non_empty(parsed.target.as_deref()) {
        cfg.target = PathBuf::from(t);
    }
    if let Some(list) = non_empty(parsed.fields.as_deref()) {
        cfg.fields = Some(parse_field_list(list)?);
    }
    if let Some(d) = parsed.directory {
        cfg.directories = d;
    }
    if let Some(l) = non_empty(parsed.log_level.as_deref()) {
        cfg.log_level = l.parse::<LogLevel>().map_err(StoreMetaError::Config)?;
    }
    if let Some(f) = non_empty(parsed.log_file.as_deref()) {
        cfg.log_file = Some(PathBuf::from(f));
    }
    Ok(())
}

/// Load settings from a specific XML file on top of `base`.
pub fn load_config_from_xml_path(path: &Path, base: Config) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read config xml '{}'", path.display()))?;
    let parsed: XmlConfig = from_xml_str(&contents)
        .with_context(|| format!("parse config xml '{}'", path.display()))?;
    let mut cfg = base;
    apply_xml(parsed, &mut cfg).with_context(|| format!("config xml '{}'", path.display()))?;
    debug!(path = %path.display(), "loaded config xml");
    Ok(cfg)
}

/// Load the config file from its default location, if there is one.
/// A missing file is not an error; an unreadable or invalid one is.
pub fn load_config(base: Config) -> Result<Config> {
    match default_config_path() {
        Some(p) if p.exists() => load_config_from_xml_path(&p, base),
        Some(p) => {
            debug!(path = %p.display(), "no config file; using defaults");
            Ok(base)
        }
        None => Ok(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Field;
    use tempfile::tempdir;

    fn write(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.xml");
        fs::write(&path, body).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_every_setting() {
        let (_d, path) = write(
            "<config>\n  <target> meta/.store </target>\n  <fields>mtime,user</fields>\n  \
             <directory> true </directory>\n  <log_level>debug</log_level>\n  \
             <log_file>/tmp/gsm.log</log_file>\n</config>\n",
        );
        let cfg = load_config_from_xml_path(&path, Config::default()).unwrap();
        assert_eq!(cfg.target, PathBuf::from("meta/.store"));
        assert_eq!(cfg.fields, Some(vec![Field::File, Field::Type, Field::Mtime, Field::User]));
        assert!(cfg.directories);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.log_file, Some(PathBuf::from("/tmp/gsm.log")));
    }

    #[test]
    fn missing_elements_keep_base_values() {
        let (_d, path) = write("<config><directory>false</directory></config>");
        let base = Config { verbose: true, ..Config::new("/w") };
        let cfg = load_config_from_xml_path(&path, base).unwrap();
        assert!(cfg.verbose);
        assert_eq!(cfg.root, PathBuf::from("/w"));
        assert_eq!(cfg.fields, None);
    }

    #[test]
    fn unknown_elements_are_rejected() {
        let (_d, path) = write("<config><colour>blue</colour></config>");
        let err = load_config_from_xml_path(&path, Config::default()).unwrap_err();
        assert!(format!("{err:#}").contains("parse config xml"));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let (_d, path) = write("<config><fields>mtime,colour</fields></config>");
        let err = load_config_from_xml_path(&path, Config::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<StoreMetaError>(), Some(StoreMetaError::Config(_))));

        let (_d, path) = write("<config><log_level>loud</log_level></config>");
        assert!(load_config_from_xml_path(&path, Config::default()).is_err());
    }
}
