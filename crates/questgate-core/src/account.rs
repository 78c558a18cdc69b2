//! Player account state touched by settlement.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::SettlementError;
use crate::gate::Reward;
use crate::store::SettlementStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user_id: Uuid,
    pub xp: i64,
    pub gold: i64,
    pub streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(user_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            xp: 0,
            gold: 0,
            streak: 0,
            last_active_date: None,
            created_at,
        }
    }

    pub fn streak_state(&self) -> StreakState {
        StreakState {
            streak: self.streak,
            last_active_date: self.last_active_date,
        }
    }

    /// Apply a settlement delta in place.
    pub fn apply(&mut self, delta: &AccountDelta) {
        self.xp = self.xp.saturating_add(delta.reward.xp);
        self.gold = self.gold.saturating_add(delta.reward.gold);
        self.streak = delta.streak;
        self.last_active_date = Some(delta.last_active_date);
    }
}

/// The part of an account the streak policy reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    pub streak: u32,
    pub last_active_date: Option<NaiveDate>,
}

/// Effect of one settlement on an account. The reward is added; streak and
/// last-active date are overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountDelta {
    pub reward: Reward,
    pub streak: u32,
    pub last_active_date: NaiveDate,
}

/// Read side of the account ledger. Writes only happen through settlement.
pub struct AccountLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: SettlementStore> AccountLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a zeroed account for `user_id`, or return the existing one.
    pub fn register(&self, user_id: Uuid) -> Result<Account, SettlementError> {
        let account = self
            .store
            .register_account(&Account::new(user_id, self.clock.now()))?;
        tracing::info!(%user_id, "account registered");
        Ok(account)
    }

    pub fn get(&self, user_id: Uuid) -> Result<Account, SettlementError> {
        self.store
            .get_account(user_id)?
            .ok_or(SettlementError::NotFound)
    }
}
