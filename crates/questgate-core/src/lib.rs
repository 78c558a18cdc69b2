//! # Questgate Core Library
//!
//! Reward settlement and daily streaks for timed focus sessions ("gates").
//! A user opens a gate against an optional quest, later closes it with an
//! outcome, and the close is settled exactly once: the reward is computed,
//! the account is credited, and the streak moves forward or resets.
//!
//! ## Architecture
//!
//! - **Gate**: reward formula, streak policy, session ledger and the
//!   settlement orchestrator
//! - **Store**: the persistence boundary, with an exclusive per-account
//!   scope for read-then-write settlement
//! - **Storage**: SQLite and in-memory backends plus TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionLedger`]: open, close, look up and list sessions
//! - [`Settlement`]: apply one close to session and account atomically
//! - [`Database`]: SQLite persistence
//! - [`Config`]: application configuration management

pub mod account;
pub mod clock;
pub mod error;
pub mod gate;
pub mod quest;
pub mod storage;
pub mod store;

pub use account::{Account, AccountDelta, AccountLedger, StreakState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, SettlementError, StoreError};
pub use gate::{
    compute_reward, next_streak, rank_multiplier, today_in, Closure, DayGap, FocusSession,
    Outcome, Rank, Reward, SessionLedger, SessionState, Settlement, DEFAULT_QUALITY,
    DEFAULT_ZONE,
};
pub use quest::{NewQuest, Quest, QuestBook, QuestPatch, QuestStatus};
pub use storage::{Config, Database, MemoryStore};
pub use store::{AccountTxn, SettlementStore};
