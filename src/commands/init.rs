//! Implementation of the `warden init` command.
//!
//! # What `warden init` does
//!
//! 1. Creates `.warden/` with `locks/`, `data/`, and `events/`
//! 2. Writes a default `config.yaml` (if missing)
//! 3. Writes `.warden/.gitignore` excluding `locks/`
//! 4. Appends an `init` event

use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::info;
use warden::config::Config;
use warden::context::DataContext;
use warden::error::{Result, WardenError};
use warden::events::{Event, EventAction, append_event};
use warden::fs::atomic_write_file;

const GITIGNORE: &str = "# Lock state is machine-local.\nlocks/\n";

/// Execute the `warden init` command.
///
/// This command is **idempotent**: running it again keeps the existing
/// config and records.
pub async fn cmd_init(ctx: &DataContext) -> Result<()> {
    for dir in [
        ctx.state_dir.clone(),
        ctx.locks_dir.clone(),
        ctx.data_dir.clone(),
        ctx.events_dir(),
    ] {
        create_dir(&dir)?;
    }

    let config_path = ctx.config_path();
    let config_created = if config_path.exists() {
        false
    } else {
        let yaml = Config::default().to_yaml()?;
        write_file(&config_path, &yaml)?;
        true
    };
    let config = Config::load(&config_path)?;

    let gitignore = ctx.state_dir.join(".gitignore");
    if !gitignore.exists() {
        write_file(&gitignore, GITIGNORE)?;
    }

    let event = Event::new(EventAction::Init).with_details(json!({
        "root": ctx.root.display().to_string(),
        "config_created": config_created,
    }));
    append_event(ctx, &config, &event).await?;
    info!(root = %ctx.root.display(), "initialized data root");

    println!("Initialized warden data root.");
    println!();
    println!("Root:    {}", ctx.root.display());
    println!("Config:  {}", config_path.display());
    println!();
    println!("Directories:");
    println!("  .warden/data/");
    println!("  .warden/events/");
    println!("  .warden/locks/  (untracked)");

    Ok(())
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        WardenError::UserError(format!(
            "failed to create directory '{}': {}",
            dir.display(),
            e
        ))
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    atomic_write_file(path, content).map_err(|e| {
        WardenError::UserError(format!("failed to write '{}': {}", path.display(), e))
    })
}
