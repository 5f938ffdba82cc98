//! Implementation of the `warden lock` commands.
//!
//! These are operator tools: they inspect lock state and, with `--force`,
//! remove holders left behind by crashed processes. They never acquire.

use crate::cli::{LockClearArgs, LockStatusArgs};
use serde_json::json;
use warden::config::Config;
use warden::context::DataContext;
use warden::error::{Result, WardenError};
use warden::events::{Event, EventAction, append_event};
use warden::locks::{FileLock, HolderInfo, LockInfo, LockStatus, MarkerStore};

struct LockState {
    config: Config,
    markers: MarkerStore,
}

impl LockState {
    fn open(ctx: &DataContext) -> Result<Self> {
        ctx.ensure_initialized()?;
        let config = Config::load_or_default(ctx.config_path())?;
        Ok(Self {
            markers: MarkerStore::new(&ctx.locks_dir),
            config,
        })
    }

    /// An inspecting handle; it never acquires, so `Drop` is a no-op.
    fn handle(&self, resource: &str) -> FileLock {
        FileLock::with_options(self.markers.clone(), resource, self.config.lock_options())
    }

    fn info(&self, resource: &str) -> Result<LockInfo> {
        Ok(self.handle(resource).get_info()?)
    }
}

pub fn cmd_lock_list(ctx: &DataContext) -> Result<()> {
    let state = LockState::open(ctx)?;

    let mut held = Vec::new();
    for resource in state.markers.resources()? {
        let info = state.info(&resource)?;
        if info.status != LockStatus::Unlocked {
            held.push(info);
        }
    }

    if held.is_empty() {
        println!("No active locks.");
        return Ok(());
    }

    println!("Active locks ({}):", held.len());
    println!();

    for info in &held {
        println!("  {} ({} holder(s)):", info.resource, info.holders.len());
        for holder in &info.holders {
            print_holder(holder, "    ");
        }
        println!();
    }

    let stale_count = held.iter().filter(|info| info.is_stale).count();
    if stale_count > 0 {
        println!(
            "Note: {} lock(s) have stale holders. Use `warden lock clear <resource> --force` to clear.",
            stale_count
        );
    }

    Ok(())
}

pub fn cmd_lock_status(ctx: &DataContext, args: LockStatusArgs) -> Result<()> {
    let state = LockState::open(ctx)?;
    let info = state.info(&args.resource)?;

    println!("Resource:   {}", info.resource);
    println!("Status:     {}", info.status.as_str());
    if info.is_stale {
        println!("Stale:      yes");
    }
    for holder in &info.holders {
        println!();
        print_holder(holder, "  ");
    }

    Ok(())
}

pub async fn cmd_lock_clear(ctx: &DataContext, args: LockClearArgs) -> Result<()> {
    if !args.force {
        return Err(WardenError::UserError(format!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing a lock while its holder is still running can corrupt data.\n\
             Only clear locks if you are certain the holder has crashed.\n\n\
             To clear the lock, run:\n  warden lock clear {} --force",
            args.resource
        )));
    }

    let state = LockState::open(ctx)?;
    let mut lock = state.handle(&args.resource);
    let info = lock.get_info()?;

    if info.holders.is_empty() {
        return Err(WardenError::UserError(format!(
            "no lock held on '{}'",
            args.resource
        )));
    }

    lock.force_release()?;

    let holders: Vec<_> = info
        .holders
        .iter()
        .map(|holder| {
            json!({
                "mode": holder.mode(),
                "owner": holder.metadata.as_ref().map(|m| m.owner.clone()),
                "pid": holder.metadata.as_ref().map(|m| m.pid),
                "stale": holder.stale.map(|reason| reason.to_string()),
            })
        })
        .collect();
    let event = Event::new(EventAction::LockClear)
        .with_resource(&args.resource)
        .with_details(json!({
            "force": args.force,
            "was_stale": info.is_stale,
            "holders": holders,
        }));
    append_event(ctx, &state.config, &event).await?;

    println!("Cleared lock: {}", args.resource);
    println!();
    println!("Removed holders:");
    for holder in &info.holders {
        print_holder(holder, "  ");
    }

    Ok(())
}

fn print_holder(holder: &HolderInfo, indent: &str) {
    println!("{}Mode:       {}", indent, holder.mode());
    match &holder.metadata {
        Some(meta) => {
            println!("{}Owner:      {}", indent, meta.owner);
            println!("{}PID:        {}", indent, meta.pid);
            println!(
                "{}Created:    {}",
                indent,
                meta.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("{}Age:        {}", indent, meta.age_string());
        }
        None => println!("{}Owner:      (holder record unreadable)", indent),
    }
    if let Some(reason) = holder.stale {
        println!("{}Status:     STALE ({})", indent, reason);
    }
    println!("{}Path:       {}", indent, holder.path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::init::cmd_init;
    use tempfile::TempDir;
    use warden::events::read_events;
    use warden::locks::{LockMetadata, LockMode};

    async fn initialized_root() -> (TempDir, DataContext) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = DataContext::resolve_from(temp_dir.path()).unwrap();
        cmd_init(&ctx).await.unwrap();
        (temp_dir, ctx)
    }

    #[test]
    fn test_lock_commands_require_init() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = DataContext::resolve_from(temp_dir.path()).unwrap();

        let err = cmd_lock_list(&ctx).unwrap_err();
        assert!(matches!(err, WardenError::UserError(_)));
    }

    #[tokio::test]
    async fn test_lock_list_and_status_without_locks() {
        let (_tmp, ctx) = initialized_root().await;
        cmd_lock_list(&ctx).unwrap();
        cmd_lock_status(
            &ctx,
            LockStatusArgs {
                resource: "data/a.json".to_string(),
            },
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_lock_clear_requires_force() {
        let (_tmp, ctx) = initialized_root().await;
        let err = cmd_lock_clear(
            &ctx,
            LockClearArgs {
                resource: "data/a.json".to_string(),
                force: false,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, WardenError::UserError(_)));
        assert!(err.to_string().contains("--force"));
    }

    #[tokio::test]
    async fn test_lock_clear_nonexistent_fails() {
        let (_tmp, ctx) = initialized_root().await;
        let err = cmd_lock_clear(
            &ctx,
            LockClearArgs {
                resource: "data/a.json".to_string(),
                force: true,
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no lock held"));
    }

    #[tokio::test]
    async fn test_lock_clear_removes_holders_and_logs_event() {
        let (_tmp, ctx) = initialized_root().await;
        let markers = MarkerStore::new(&ctx.locks_dir);
        let mut meta = LockMetadata::new("crashed", LockMode::Exclusive);
        meta.pid = 999_999_999;
        markers.try_create_exclusive("data/a.json", &meta).unwrap();

        cmd_lock_list(&ctx).unwrap();
        cmd_lock_clear(
            &ctx,
            LockClearArgs {
                resource: "data/a.json".to_string(),
                force: true,
            },
        )
        .await
        .unwrap();

        assert!(!markers.has_any("data/a.json").unwrap());

        let config = Config::load(ctx.config_path()).unwrap();
        let events = read_events(&ctx, &config).await.unwrap();
        let clear = events.last().unwrap();
        assert_eq!(clear.action, EventAction::LockClear);
        assert_eq!(clear.resource.as_deref(), Some("data/a.json"));
        assert_eq!(clear.details["was_stale"], true);
        assert_eq!(clear.details["holders"][0]["mode"], "exclusive");
    }
}
