//! CLI argument parsing for warden.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Warden: file-locked data store shared by cooperating processes.
///
/// Records live under `<root>/.warden/data/`; every read and write is
/// guarded by a cross-process reader/writer lock under `<root>/.warden/locks/`.
/// These commands inspect and recover that lock state.
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data root (defaults to $WARDEN_HOME, then the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Log lock activity at debug level.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable logging entirely.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for warden.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the data root.
    ///
    /// Creates `.warden/` with its locks, data, and events directories and
    /// a default `config.yaml`. Safe to run again.
    Init,

    /// Lock management commands.
    Lock(LockCommand),
}

/// Lock subcommands.
#[derive(Parser, Debug)]
pub struct LockCommand {
    #[command(subcommand)]
    pub action: LockAction,
}

/// Available lock actions.
#[derive(Subcommand, Debug)]
pub enum LockAction {
    /// List all held locks.
    ///
    /// Shows every resource with a marker or reader token, its holders,
    /// their age and owner, and whether they look stale.
    List,

    /// Show the state of one resource.
    Status(LockStatusArgs),

    /// Remove every holder of a resource.
    ///
    /// Requires --force flag to prevent accidental clearing.
    Clear(LockClearArgs),
}

/// Arguments for the `lock status` command.
#[derive(Parser, Debug)]
pub struct LockStatusArgs {
    /// Lock resource name (e.g. data/retros/index.json).
    pub resource: String,
}

/// Arguments for the `lock clear` command.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    /// Lock resource name (e.g. data/retros/index.json).
    pub resource: String,

    /// Force clearing the lock (required for safety).
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["warden", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        assert!(cli.root.is_none());
        assert!(!cli.verbose && !cli.quiet);
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["warden", "lock", "list", "--root", "/tmp/x", "-v"]).unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/x")));
        assert!(cli.verbose);
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["warden", "-v", "-q", "init"]).is_err());
    }

    #[test]
    fn parse_lock_list() {
        let cli = Cli::try_parse_from(["warden", "lock", "list"]).unwrap();
        if let Command::Lock(lock_cmd) = cli.command {
            assert!(matches!(lock_cmd.action, LockAction::List));
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn parse_lock_status() {
        let cli = Cli::try_parse_from(["warden", "lock", "status", "data/a.json"]).unwrap();
        if let Command::Lock(lock_cmd) = cli.command {
            if let LockAction::Status(args) = lock_cmd.action {
                assert_eq!(args.resource, "data/a.json");
            } else {
                panic!("Expected Status action");
            }
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn parse_lock_clear() {
        let cli =
            Cli::try_parse_from(["warden", "lock", "clear", "data/a.json", "--force"]).unwrap();
        if let Command::Lock(lock_cmd) = cli.command {
            if let LockAction::Clear(args) = lock_cmd.action {
                assert_eq!(args.resource, "data/a.json");
                assert!(args.force);
            } else {
                panic!("Expected Clear action");
            }
        } else {
            panic!("Expected Lock command");
        }
    }

    #[test]
    fn parse_lock_clear_without_force() {
        let cli = Cli::try_parse_from(["warden", "lock", "clear", "data/a.json"]).unwrap();
        if let Command::Lock(lock_cmd) = cli.command
            && let LockAction::Clear(args) = lock_cmd.action
        {
            assert!(!args.force);
        } else {
            panic!("Expected Lock clear");
        }
    }
}
