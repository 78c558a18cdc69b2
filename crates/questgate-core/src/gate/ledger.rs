//! Session ledger: opening gates and closing them exactly once.

use std::sync::Arc;

use chrono_tz::Tz;
use uuid::Uuid;

use super::reward::Rank;
use super::session::{FocusSession, Outcome};
use super::settlement::Settlement;
use crate::clock::Clock;
use crate::error::SettlementError;
use crate::store::SettlementStore;

pub struct SessionLedger<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settlement: Settlement<S>,
}

impl<S: SettlementStore> SessionLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, zone: Tz) -> Self {
        let settlement = Settlement::new(Arc::clone(&store), Arc::clone(&clock), zone);
        Self {
            store,
            clock,
            settlement,
        }
    }

    /// Open a gate for `user_id`.
    ///
    /// A missing or blank rank becomes the lowest tier. Labels outside the
    /// rank table are stored as given and earn the lowest multiplier.
    pub fn open(
        &self,
        user_id: Uuid,
        quest_id: Option<Uuid>,
        rank: Option<&str>,
        target_minutes: i64,
    ) -> Result<FocusSession, SettlementError> {
        if target_minutes <= 0 {
            return Err(SettlementError::invalid(
                "target_minutes",
                format!("must be greater than 0, got {target_minutes}"),
            ));
        }
        let rank = match rank.map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => Rank::default().label().to_string(),
        };

        let session = FocusSession::open(user_id, quest_id, rank, target_minutes, self.clock.now());
        self.store.create_session(&session)?;
        tracing::info!(
            %user_id,
            session_id = %session.id,
            rank = %session.rank,
            target_minutes,
            "gate opened"
        );
        Ok(session)
    }

    /// Close a gate and settle it.
    ///
    /// Fails with `NotFound` when the session is missing or owned by someone
    /// else and with `AlreadyClosed` on any repeat. A zero or negative
    /// quality means the default of 1.0.
    pub fn close(
        &self,
        session_id: Uuid,
        caller: Uuid,
        outcome: Outcome,
        quality: f64,
    ) -> Result<FocusSession, SettlementError> {
        if outcome.as_str().trim().is_empty() {
            return Err(SettlementError::invalid("outcome", "must not be empty"));
        }
        if !quality.is_finite() {
            return Err(SettlementError::invalid(
                "quality",
                format!("must be a finite number, got {quality}"),
            ));
        }

        let session = self.get(session_id, caller)?;
        if session.is_closed() {
            return Err(SettlementError::AlreadyClosed);
        }
        self.settlement.settle(&session, outcome, quality)
    }

    /// Fetch a session the caller owns.
    pub fn get(&self, session_id: Uuid, caller: Uuid) -> Result<FocusSession, SettlementError> {
        match self.store.get_session(session_id)? {
            Some(session) if session.user_id == caller => Ok(session),
            _ => Err(SettlementError::NotFound),
        }
    }

    /// The caller's sessions, newest first.
    pub fn history(&self, caller: Uuid) -> Result<Vec<FocusSession>, SettlementError> {
        Ok(self.store.list_sessions(caller)?)
    }
}
