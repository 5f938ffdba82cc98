//! Command implementations for warden.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations.

mod init;
mod lock;

use crate::cli::{Command, LockAction, LockCommand};
use std::path::Path;
use warden::context::DataContext;
use warden::error::Result;

/// Dispatch a command to its implementation.
///
/// `root` is the `--root` flag; see `DataContext::resolve` for the fallbacks.
pub async fn dispatch(root: Option<&Path>, command: Command) -> Result<()> {
    let ctx = DataContext::resolve(root)?;

    match command {
        Command::Init => init::cmd_init(&ctx).await,
        Command::Lock(lock_cmd) => dispatch_lock(&ctx, lock_cmd).await,
    }
}

/// Dispatch lock subcommands.
async fn dispatch_lock(ctx: &DataContext, lock_cmd: LockCommand) -> Result<()> {
    match lock_cmd.action {
        LockAction::List => lock::cmd_lock_list(ctx),
        LockAction::Status(args) => lock::cmd_lock_status(ctx, args),
        LockAction::Clear(args) => lock::cmd_lock_clear(ctx, args).await,
    }
}
