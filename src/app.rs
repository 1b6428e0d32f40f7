//! Application orchestrator.
//! Loads/merges config, locates the worktree, initializes logging, validates
//! and dispatches the requested action.

use anyhow::{Context, Result};
use git_store_meta::cli::Args;
use git_store_meta::config::{load_config, CONFIG_ENV};
use git_store_meta::hooks::default_program;
use git_store_meta::output as out;
use git_store_meta::{
    default_config_path, run_apply, run_install, run_store, run_update, Action, Config, GitCli,
    NativeAttrs, Outcome, StoreMetaError,
};
use tracing::{debug, error};

use crate::logging::init_tracing;

fn print_config_location() {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        out::print_info(&format!("Using {CONFIG_ENV} (explicit):\n  {p}"));
        return;
    }
    match default_config_path() {
        Some(p) => {
            out::print_info(&format!("Default git-store-meta config path:\n  {}", p.display()));
            if p.exists() {
                out::print_info("A config file exists at that location.");
            } else {
                out::print_info("No config file exists there; built-in defaults apply.");
            }
        }
        None => out::print_error("Could not determine a default config path"),
    }
}

fn describe(outcome: &Outcome, cfg: &Config) -> String {
    let store = cfg.target.display();
    let prefix = if cfg.dry_run { "dry-run: " } else { "" };
    match outcome {
        Outcome::Stored(s) => format!("{prefix}stored {} records in {store} ({} skipped)", s.recorded, s.skipped),
        Outcome::Updated(s) => format!(
            "{prefix}updated {store}: {} refreshed, {} unchanged, {} removed or replaced",
            s.refreshed, s.carried, s.dropped
        ),
        Outcome::Applied(s) => format!(
            "{prefix}applied {store}: {} changes, {} failed, {} records skipped",
            s.applied, s.failed, s.skipped
        ),
        Outcome::Installed(r) if r.skipped.is_empty() => {
            format!("{prefix}installed hooks: {}", r.installed.join(", "))
        }
        Outcome::Installed(r) => format!(
            "{prefix}installed hooks: {}; left foreign hooks alone: {}",
            r.installed.join(", "),
            r.skipped.join(", ")
        ),
    }
}

fn log_failure(e: &anyhow::Error) {
    match e.downcast_ref::<StoreMetaError>() {
        Some(sm) => error!(code = sm.code(), kind = sm.kind(), fatal = sm.is_fatal(), "{e:#}"),
        None => error!("{e:#}"),
    }
}

fn dispatch(action: Action, cfg: &Config, git: &GitCli) -> Result<Outcome> {
    let provider = NativeAttrs;
    match action {
        Action::Store => run_store(cfg, git, &provider).map(Outcome::Stored),
        Action::Update => run_update(cfg, git, &provider),
        Action::Apply => run_apply(cfg, &provider).map(Outcome::Applied),
        Action::Install => {
            let hooks_dir = git.hooks_dir()?;
            run_install(cfg, &hooks_dir, default_program()).map(Outcome::Installed)
        }
    }
}

/// Run the CLI application. Failures are reported here (log or stderr), so the
/// caller only has to turn them into an exit code.
pub fn run(args: Args) -> Result<()> {
    if args.print_config {
        print_config_location();
        return Ok(());
    }
    let Some(action) = args.action() else {
        return Err(StoreMetaError::Config("no action given".into()).into());
    };

    // Config file first, CLI flags on top. Logging is not up yet, so report directly.
    let mut cfg = load_config(Config::default()).inspect_err(|e| {
        if !args.quiet {
            out::print_error(&format!("{e:#}"));
        }
    })?;
    args.apply_overrides(&mut cfg);

    let _guard = init_tracing(cfg.effective_log_level(), cfg.quiet, cfg.log_file.as_deref(), args.json)
        .inspect_err(|e| {
            if !cfg.quiet {
                out::print_error(&format!("Failed to initialize logging: {e:#}"));
            }
        })?;

    let result = (|| -> Result<Outcome> {
        let cwd = std::env::current_dir().context("determine current directory")?;
        let start = dunce::canonicalize(&cwd).unwrap_or(cwd);
        let git = GitCli::discover(&start)?;
        cfg.root = git.worktree_root().to_path_buf();
        cfg.validate()?;
        debug!(?action, root = %cfg.root.display(), "starting");
        dispatch(action, &cfg, &git)
    })();

    match result {
        Ok(outcome) => {
            if !cfg.quiet {
                out::print_success(&describe(&outcome, &cfg));
            }
            Ok(())
        }
        Err(e) => {
            log_failure(&e);
            Err(e)
        }
    }
}
