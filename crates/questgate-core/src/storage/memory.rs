//! In-process settlement store.
//!
//! Each account has its own slot guarded by a mutex and condvar, so an
//! exclusive scope on one account never waits on another. Writes made inside
//! a scope are staged and only become visible on commit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::account::{Account, AccountDelta, StreakState};
use crate::error::StoreError;
use crate::gate::FocusSession;
use crate::quest::Quest;
use crate::store::{AccountTxn, SettlementStore};

#[derive(Debug, Default)]
struct SlotInner {
    account: Option<Account>,
    held: bool,
}

#[derive(Debug, Default)]
struct AccountSlot {
    inner: Mutex<SlotInner>,
    released: Condvar,
}

impl AccountSlot {
    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Thread-safe store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: DashMap<Uuid, Arc<AccountSlot>>,
    sessions: RwLock<Vec<FocusSession>>,
    quests: DashMap<Uuid, Quest>,
    fail_commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail with [`StoreError::Unavailable`]. The scope
    /// is discarded as if the backend had dropped the connection.
    pub fn fail_next_commit(&self) {
        self.fail_commits.fetch_add(1, Ordering::SeqCst);
    }

    fn slot(&self, user_id: Uuid) -> Arc<AccountSlot> {
        // Clone the Arc so the map shard lock is released before waiting.
        Arc::clone(self.accounts.entry(user_id).or_default().value())
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn sessions_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<FocusSession>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn sessions_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<FocusSession>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettlementStore for MemoryStore {
    fn create_session(&self, session: &FocusSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions_write();
        if sessions.iter().any(|s| s.id == session.id) {
            return Err(StoreError::QueryFailed(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.push(session.clone());
        Ok(())
    }

    fn get_session(&self, id: Uuid) -> Result<Option<FocusSession>, StoreError> {
        Ok(self.sessions_read().iter().find(|s| s.id == id).cloned())
    }

    fn list_sessions(&self, user_id: Uuid) -> Result<Vec<FocusSession>, StoreError> {
        let mut owned: Vec<FocusSession> = self
            .sessions_read()
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.start_at.cmp(&a.start_at).then(a.id.cmp(&b.id)));
        Ok(owned)
    }

    fn quest_weight(&self, quest_id: Uuid) -> Result<Option<i64>, StoreError> {
        Ok(self.quests.get(&quest_id).map(|q| q.weight))
    }

    fn begin_account(&self, user_id: Uuid) -> Result<Box<dyn AccountTxn + '_>, StoreError> {
        let slot = self.slot(user_id);
        {
            let mut inner = slot.lock();
            while inner.held {
                inner = slot
                    .released
                    .wait(inner)
                    .unwrap_or_else(|e| e.into_inner());
            }
            inner.held = true;
        }
        Ok(Box::new(MemoryTxn {
            store: self,
            slot,
            user_id,
            account: None,
            closed: None,
        }))
    }

    fn register_account(&self, account: &Account) -> Result<Account, StoreError> {
        let slot = self.slot(account.user_id);
        let mut inner = slot.lock();
        Ok(inner.account.get_or_insert_with(|| account.clone()).clone())
    }

    fn get_account(&self, user_id: Uuid) -> Result<Option<Account>, StoreError> {
        let Some(slot) = self.accounts.get(&user_id).map(|s| Arc::clone(s.value())) else {
            return Ok(None);
        };
        let account = slot.lock().account.clone();
        Ok(account)
    }

    fn create_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        self.quests.insert(quest.id, quest.clone());
        Ok(())
    }

    fn get_quest(&self, id: Uuid) -> Result<Option<Quest>, StoreError> {
        Ok(self.quests.get(&id).map(|q| q.value().clone()))
    }

    fn list_quests(&self, user_id: Uuid) -> Result<Vec<Quest>, StoreError> {
        let mut owned: Vec<Quest> = self
            .quests
            .iter()
            .filter(|q| q.user_id == user_id)
            .map(|q| q.value().clone())
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(owned)
    }

    fn update_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        if let Some(mut existing) = self.quests.get_mut(&quest.id) {
            *existing = quest.clone();
        }
        Ok(())
    }

    fn delete_quest(&self, id: Uuid) -> Result<(), StoreError> {
        self.quests.remove(&id);
        Ok(())
    }
}

/// Exclusive scope over one account slot. Staged writes land on commit.
struct MemoryTxn<'a> {
    store: &'a MemoryStore,
    slot: Arc<AccountSlot>,
    user_id: Uuid,
    account: Option<Account>,
    closed: Option<FocusSession>,
}

impl MemoryTxn<'_> {
    fn staged_account(&mut self) -> &mut Account {
        let user_id = self.user_id;
        let slot = &self.slot;
        self.account.get_or_insert_with(|| {
            slot.lock()
                .account
                .clone()
                .unwrap_or_else(|| Account::new(user_id, Utc::now()))
        })
    }
}

impl AccountTxn for MemoryTxn<'_> {
    fn streak_state_for_update(&mut self) -> Result<StreakState, StoreError> {
        Ok(self.staged_account().streak_state())
    }

    fn close_session(&mut self, session: &FocusSession) -> Result<bool, StoreError> {
        if !session.is_closed() {
            return Err(StoreError::QueryFailed(format!(
                "session {} has no closure to record",
                session.id
            )));
        }
        let still_open = self
            .store
            .sessions_read()
            .iter()
            .any(|s| s.id == session.id && s.user_id == self.user_id && !s.is_closed());
        if !still_open || self.closed.as_ref().is_some_and(|c| c.id == session.id) {
            return Ok(false);
        }
        self.closed = Some(session.clone());
        Ok(true)
    }

    fn apply_account_delta(&mut self, delta: &AccountDelta) -> Result<(), StoreError> {
        self.staged_account().apply(delta);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        if self.store.take_injected_failure() {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        let closed = self.closed.take();
        let account = self.account.take();
        // Both writes land under the slot lock, so `get_account` never sees a
        // closed session whose reward is still missing from the account.
        let mut inner = self.slot.lock();
        if let Some(closed) = closed {
            let mut sessions = self.store.sessions_write();
            match sessions
                .iter_mut()
                .find(|s| s.id == closed.id && !s.is_closed())
            {
                Some(slot) => *slot = closed,
                None => {
                    return Err(StoreError::Unavailable(format!(
                        "session {} changed outside its account scope",
                        closed.id
                    )))
                }
            }
        }
        if let Some(account) = account {
            inner.account = Some(account);
        }
        Ok(())
    }
}

impl Drop for MemoryTxn<'_> {
    fn drop(&mut self) {
        let mut inner = self.slot.lock();
        inner.held = false;
        drop(inner);
        self.slot.released.notify_one();
    }
}
