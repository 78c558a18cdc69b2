//! Persistence boundary used by the session ledger and settlement.
//!
//! Two backends implement it: [`Database`](crate::storage::Database) on
//! SQLite and [`MemoryStore`](crate::storage::MemoryStore).

use uuid::Uuid;

use crate::account::{Account, AccountDelta, StreakState};
use crate::error::StoreError;
use crate::gate::FocusSession;
use crate::quest::Quest;

/// Storage operations the core relies on.
pub trait SettlementStore: Send + Sync {
    fn create_session(&self, session: &FocusSession) -> Result<(), StoreError>;

    fn get_session(&self, id: Uuid) -> Result<Option<FocusSession>, StoreError>;

    /// Sessions owned by `user_id`, newest first.
    fn list_sessions(&self, user_id: Uuid) -> Result<Vec<FocusSession>, StoreError>;

    /// Weight of a quest, `None` when it does not exist.
    fn quest_weight(&self, quest_id: Uuid) -> Result<Option<i64>, StoreError>;

    /// Enter the exclusive scope for one account. Other scopes for the same
    /// account block until this one commits or is dropped; scopes for other
    /// accounts are unaffected.
    fn begin_account(&self, user_id: Uuid) -> Result<Box<dyn AccountTxn + '_>, StoreError>;

    /// Insert a zeroed account if none exists and return the stored row.
    fn register_account(&self, account: &Account) -> Result<Account, StoreError>;

    fn get_account(&self, user_id: Uuid) -> Result<Option<Account>, StoreError>;

    fn create_quest(&self, quest: &Quest) -> Result<(), StoreError>;

    fn get_quest(&self, id: Uuid) -> Result<Option<Quest>, StoreError>;

    /// Quests owned by `user_id`, newest first.
    fn list_quests(&self, user_id: Uuid) -> Result<Vec<Quest>, StoreError>;

    fn update_quest(&self, quest: &Quest) -> Result<(), StoreError>;

    fn delete_quest(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Exclusive read-then-write scope over one account.
///
/// Nothing written through the scope is visible until [`commit`]. Dropping
/// the scope without committing discards every staged write and releases it.
///
/// [`commit`]: AccountTxn::commit
pub trait AccountTxn {
    /// Current streak state, creating a zeroed account row if needed.
    fn streak_state_for_update(&mut self) -> Result<StreakState, StoreError>;

    /// Record the session's end time, outcome and reward. Returns `false`
    /// when the session was already closed by someone else.
    fn close_session(&mut self, session: &FocusSession) -> Result<bool, StoreError>;

    fn apply_account_delta(&mut self, delta: &AccountDelta) -> Result<(), StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
