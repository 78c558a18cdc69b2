//! Subcommand handlers and the state they share.

pub mod account;
pub mod config;
pub mod gate;
pub mod quest;

use std::sync::Arc;

use questgate_core::error::Result;
use questgate_core::{Clock, Config, Database, SettlementError, SystemClock};
use serde::Serialize;
use uuid::Uuid;

pub type CliResult = Result<()>;

/// Store, clock and zone for commands that touch the database.
pub struct Context {
    pub store: Arc<Database>,
    pub clock: Arc<dyn Clock>,
    pub zone: chrono_tz::Tz,
}

impl Context {
    pub fn open(config: &Config) -> Result<Self> {
        let zone = config.time_zone()?;
        let store = Arc::new(Database::open(config)?);
        tracing::debug!(path = %store.path().display(), %zone, "database opened");
        Ok(Self {
            store,
            clock: Arc::new(SystemClock),
            zone,
        })
    }
}

/// Resolve `--user` / `QUESTGATE_USER`.
pub fn require_user(user: Option<Uuid>) -> Result<Uuid, SettlementError> {
    user.ok_or_else(|| SettlementError::invalid("user", "pass --user or set QUESTGATE_USER"))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
