//! Settlement: closing a gate and crediting its effects to the account.
//!
//! ## Flow
//!
//! ```text
//! resolve quest weight -> compute reward
//!   -> enter account scope -> read streak state -> next streak
//!   -> close session + apply delta -> commit
//! ```
//!
//! The session write and the account write share one scope, so either both
//! land or neither does. A store error anywhere inside the scope leaves the
//! session open and the account untouched.

use std::sync::Arc;

use chrono_tz::Tz;
use uuid::Uuid;

use super::reward::{compute_reward, rank_multiplier, Reward};
use super::session::{FocusSession, Outcome};
use super::streak::{next_streak, today_in, DayGap};
use crate::account::AccountDelta;
use crate::clock::Clock;
use crate::error::SettlementError;
use crate::store::SettlementStore;

/// Quality used when the caller sends zero or a negative value.
pub const DEFAULT_QUALITY: f64 = 1.0;

pub struct Settlement<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    zone: Tz,
}

impl<S: SettlementStore> Settlement<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, zone: Tz) -> Self {
        Self { store, clock, zone }
    }

    /// Weight of the linked quest. Missing links, missing quests and lookup
    /// errors all fall back to 1.
    pub fn resolve_weight(&self, quest_id: Option<Uuid>) -> i64 {
        let Some(quest_id) = quest_id else {
            return 1;
        };
        match self.store.quest_weight(quest_id) {
            Ok(Some(weight)) if weight > 0 => weight,
            Ok(Some(weight)) => {
                tracing::debug!(%quest_id, weight, "non-positive quest weight, using 1");
                1
            }
            Ok(None) => {
                tracing::debug!(%quest_id, "quest not found, using weight 1");
                1
            }
            Err(e) => {
                tracing::debug!(%quest_id, error = %e, "quest weight lookup failed, using 1");
                1
            }
        }
    }

    /// Settle an open session. The caller has already checked ownership and
    /// that the session was open when read; a close that lost a race is
    /// reported as [`SettlementError::AlreadyClosed`].
    pub fn settle(
        &self,
        session: &FocusSession,
        outcome: Outcome,
        quality: f64,
    ) -> Result<FocusSession, SettlementError> {
        let weight = self.resolve_weight(session.quest_id);
        let quality = if quality <= 0.0 { DEFAULT_QUALITY } else { quality };
        let success = outcome.is_success();
        let reward = if success {
            compute_reward(
                session.target_minutes,
                rank_multiplier(&session.rank),
                weight,
                quality,
            )
        } else {
            // The session records what the account earned, not what it would have.
            Reward::ZERO
        };

        match self.apply(session, outcome, reward) {
            Ok((closed, streak)) => {
                tracing::info!(
                    user_id = %closed.user_id,
                    session_id = %closed.id,
                    outcome = %outcome_label(&closed),
                    xp = closed.xp_earned,
                    gold = closed.gold_earned,
                    streak,
                    "gate settled"
                );
                Ok(closed)
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %session.user_id,
                    session_id = %session.id,
                    error = %e,
                    "settlement rolled back"
                );
                Err(e)
            }
        }
    }

    fn apply(
        &self,
        session: &FocusSession,
        outcome: Outcome,
        reward: Reward,
    ) -> Result<(FocusSession, u32), SettlementError> {
        let mut txn = self.store.begin_account(session.user_id)?;

        // Read the clock inside the scope so serialized settlements see
        // non-decreasing days.
        let now = self.clock.now();
        let today = today_in(self.zone, now);

        let state = txn.streak_state_for_update()?;
        if let DayGap::Future(days) = DayGap::between(state.last_active_date, today) {
            tracing::warn!(
                user_id = %session.user_id,
                last_active = ?state.last_active_date,
                %today,
                days_ahead = days,
                "last active date is in the future, treating as a missed day"
            );
        }
        let streak = next_streak(
            outcome.is_success(),
            state.last_active_date,
            today,
            state.streak,
        );

        let closed = session.closed(now, outcome, reward);
        if !txn.close_session(&closed)? {
            return Err(SettlementError::AlreadyClosed);
        }
        txn.apply_account_delta(&AccountDelta {
            reward,
            streak,
            last_active_date: today,
        })?;
        txn.commit()?;
        Ok((closed, streak))
    }
}

fn outcome_label(session: &FocusSession) -> &str {
    session.outcome().map(Outcome::as_str).unwrap_or_default()
}
