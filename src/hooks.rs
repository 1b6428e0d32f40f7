//! Git hook installation.
//!
//! - `pre-commit`: refresh the store from the staged changes and stage it.
//! - `post-checkout` / `post-merge`: apply the store to the new worktree.
//!
//! Our scripts carry a marker line. An existing hook without the marker
//! belongs to someone else and is left alone.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::platform::StagedFile;

/// Marker identifying hooks written by this tool.
pub const HOOK_MARKER: &str = "# managed by git-store-meta";

pub const HOOK_NAMES: [&str; 3] = ["pre-commit", "post-checkout", "post-merge"];

/// Parameters baked into the generated scripts.
#[derive(Debug, Clone)]
pub struct HookSettings {
    /// Command used to invoke this tool from the hook.
    pub program: String,
    /// Store file, relative to the worktree root.
    pub target: String,
    pub directories: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HookReport {
    pub installed: Vec<String>,
    /// Foreign hooks that were left in place.
    pub skipped: Vec<String>,
}

/// Quote `s` for a POSIX shell.
fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub fn render_hook(name: &str, settings: &HookSettings) -> String {
    let program = sh_quote(&settings.program);
    let target = sh_quote(&settings.target);
    let dir_flag = if settings.directories { " --directory" } else { "" };
    let body = match name {
        "pre-commit" => format!(
            "{program} --update --target {target}{dir_flag} || exit 1\n\
             git add -f -- {target} || exit 1\n"
        ),
        // post-checkout args: <old-head> <new-head> <branch-flag>; a file checkout
        // (flag 0) touches only a few paths, but applying everything is harmless.
        "post-checkout" | "post-merge" => format!(
            "[ -f {target} ] || exit 0\n\
             {program} --apply --target {target}{dir_flag}\n"
        ),
        _ => String::new(),
    };
    format!("#!/bin/sh\n{HOOK_MARKER}\ncd \"$(git rev-parse --show-toplevel)\" || exit 1\n{body}")
}

/// Write the three hooks into `hooks_dir`. Own hooks are overwritten; foreign
/// hooks are skipped with a warning. `dry_run` reports without writing.
pub fn install_hooks(hooks_dir: &Path, settings: &HookSettings, dry_run: bool) -> Result<HookReport> {
    if !dry_run {
        fs::create_dir_all(hooks_dir)
            .with_context(|| format!("create hooks directory '{}'", hooks_dir.display()))?;
    }
    let mut report = HookReport::default();
    for name in HOOK_NAMES {
        let path = hooks_dir.join(name);
        if is_foreign(&path)? {
            warn!(hook = %path.display(), "existing hook not managed by git-store-meta; leaving it alone");
            report.skipped.push(name.to_string());
            continue;
        }
        if dry_run {
            info!(hook = %path.display(), "would install hook");
        } else {
            write_hook(&path, &render_hook(name, settings))?;
            info!(hook = %path.display(), "installed hook");
        }
        report.installed.push(name.to_string());
    }
    Ok(report)
}

fn is_foreign(path: &Path) -> Result<bool> {
    match fs::read(path) {
        Ok(bytes) => Ok(!String::from_utf8_lossy(&bytes).contains(HOOK_MARKER)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("read existing hook '{}'", path.display())),
    }
}

fn write_hook(path: &Path, script: &str) -> Result<()> {
    use std::io::Write;
    let mut staged = StagedFile::create(path)?;
    staged
        .write_all(script.as_bytes())
        .with_context(|| format!("write hook '{}'", path.display()))?;
    set_executable(staged.staging_path())?;
    staged.commit()
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod 0755 '{}'", path.display()))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Command the hooks should run: this executable when it can be located.
pub fn default_program() -> String {
    std::env::current_exe()
        .ok()
        .map(PathBuf::into_os_string)
        .and_then(|s| s.into_string().ok())
        .unwrap_or_else(|| "git-store-meta".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings() -> HookSettings {
        HookSettings {
            program: "/opt/bin/git-store-meta".into(),
            target: ".git_store_meta".into(),
            directories: true,
        }
    }

    #[test]
    fn quoting_survives_single_quotes() {
        assert_eq!(sh_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn pre_commit_updates_and_stages() {
        let s = render_hook("pre-commit", &settings());
        assert!(s.starts_with("#!/bin/sh\n"));
        assert!(s.contains(HOOK_MARKER));
        assert!(s.contains("'/opt/bin/git-store-meta' --update --target '.git_store_meta' --directory"));
        assert!(s.contains("git add -f -- '.git_store_meta'"));
    }

    #[test]
    fn install_writes_executable_hooks_and_skips_foreign() {
        let dir = tempdir().unwrap();
        let hooks = dir.path().join("hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(hooks.join("post-merge"), "#!/bin/sh\necho mine\n").unwrap();

        let report = install_hooks(&hooks, &settings(), false).unwrap();
        assert_eq!(report.installed, vec!["pre-commit", "post-checkout"]);
        assert_eq!(report.skipped, vec!["post-merge"]);
        assert_eq!(fs::read_to_string(hooks.join("post-merge")).unwrap(), "#!/bin/sh\necho mine\n");

        let checkout = fs::read_to_string(hooks.join("post-checkout")).unwrap();
        assert!(checkout.contains("--apply --target '.git_store_meta' --directory"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(hooks.join("pre-commit")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        // Reinstalling over our own hooks is allowed.
        let again = install_hooks(&hooks, &settings(), false).unwrap();
        assert_eq!(again.installed.len(), 2);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let hooks = dir.path().join("hooks");
        let report = install_hooks(&hooks, &settings(), true).unwrap();
        assert_eq!(report.installed.len(), 3);
        assert!(!hooks.exists());
    }
}
