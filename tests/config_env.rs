use git_store_meta::config::{load_config, CONFIG_ENV};
use git_store_meta::store::Field;
use git_store_meta::{default_config_path, Config, LogLevel};
use assert_fs::prelude::*;
use assert_fs::TempDir;
use serial_test::serial;
use std::path::PathBuf;

struct EnvGuard;

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        // SAFETY: every test touching the variable is #[serial].
        unsafe { std::env::set_var(CONFIG_ENV, value) };
        EnvGuard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe { std::env::remove_var(CONFIG_ENV) };
    }
}

#[test]
#[serial]
fn env_config_is_loaded() {
    let td = TempDir::new().unwrap();
    let file = td.child("config.xml");
    file.write_str(
        "<config>\n  <target>meta/store</target>\n  <fields>mtime,acl</fields>\n  \
         <directory>true</directory>\n  <log_level>info</log_level>\n</config>\n",
    )
    .unwrap();
    let cfg_path = file.path().to_path_buf();
    let _env = EnvGuard::set(&cfg_path);

    assert_eq!(default_config_path(), Some(cfg_path.clone()));
    let cfg = load_config(Config::default()).unwrap();
    assert_eq!(cfg.target, PathBuf::from("meta/store"));
    assert_eq!(cfg.fields, Some(vec![Field::File, Field::Type, Field::Mtime, Field::Acl]));
    assert!(cfg.directories);
    assert_eq!(cfg.log_level, LogLevel::Info);
}

#[test]
#[serial]
fn missing_env_config_falls_back_to_defaults() {
    let td = TempDir::new().unwrap();
    let _env = EnvGuard::set(td.child("absent.xml").path());
    let cfg = load_config(Config::default()).unwrap();
    assert_eq!(cfg.target, PathBuf::from(".git_store_meta"));
    assert_eq!(cfg.fields, None);
    assert!(!cfg.directories);
}

#[test]
#[serial]
fn malformed_env_config_is_an_error() {
    let td = TempDir::new().unwrap();
    let file = td.child("config.xml");
    file.write_str("<config><target>x</target><extra/></config>").unwrap();
    let cfg_path = file.path().to_path_buf();
    let _env = EnvGuard::set(&cfg_path);
    let err = load_config(Config::default()).unwrap_err();
    assert!(format!("{err:#}").contains(&cfg_path.display().to_string()));
}
