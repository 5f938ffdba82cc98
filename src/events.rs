//! Audit event log for warden.
//!
//! Events are stored in NDJSON format (one JSON object per line) in
//! `.warden/events/events.ndjson`. Appends go through the store, so
//! concurrent writers are serialized by the `events/events.ndjson` lock.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: The action performed (`init`, `lock_clear`)
//! - `actor`: The owner string (e.g., `user@HOST`)
//! - `resource`: Optional lock resource the event concerns
//! - `details`: Freeform object with action-specific details

use crate::config::Config;
use crate::context::DataContext;
use crate::error::{Result, WardenError};
use crate::locks::owner_string;
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const EVENTS_SUBDIR: &str = "events";
const EVENTS_FILE: &str = "events.ndjson";

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Data root initialization
    Init,
    /// Lock cleared manually
    LockClear,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Init => write!(f, "init"),
            EventAction::LockClear => write!(f, "lock_clear"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The actor who performed the action (e.g., `user@HOST`).
    pub actor: String,

    /// Lock resource the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time and actor.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: owner_string(),
            resource: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

fn events_store(ctx: &DataContext, config: &Config) -> Store {
    Store::open_at(ctx, config, EVENTS_SUBDIR)
}

/// Append an event to the events log.
///
/// The file and its directory are created if missing. A failed append is a
/// store error and the caller should report it rather than continue silently.
pub async fn append_event(ctx: &DataContext, config: &Config, event: &Event) -> Result<()> {
    events_store(ctx, config)
        .append_jsonl(EVENTS_FILE, event)
        .await
        .map_err(|e| match e {
            WardenError::StoreError(msg) => {
                WardenError::StoreError(format!("failed to record {} event: {}", event.action, msg))
            }
            other => other,
        })
}

/// Read every event in the log, oldest first.
pub async fn read_events(ctx: &DataContext, config: &Config) -> Result<Vec<Event>> {
    events_store(ctx, config).read_jsonl(EVENTS_FILE).await
}
