//! Integration tests for gate settlement on SQLite.
//!
//! Covers the full open -> close -> credit workflow, repeat closes,
//! ownership checks and streak movement across calendar days.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use questgate_core::{
    AccountLedger, Database, ManualClock, NewQuest, Outcome, QuestBook, SessionLedger,
    SessionState, SettlementError, SettlementStore, DEFAULT_ZONE,
};
use tempfile::TempDir;
use uuid::Uuid;

struct Harness {
    _dir: TempDir,
    db: Arc<Database>,
    clock: Arc<ManualClock>,
    ledger: SessionLedger<Database>,
    accounts: AccountLedger<Database>,
    quests: QuestBook<Database>,
}

/// 12:00 in São Paulo.
fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 15, 0, 0).unwrap()
}

fn harness(at: DateTime<Utc>) -> Harness {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(Database::open_at(dir.path().join("questgate.db")).unwrap());
    let clock = Arc::new(ManualClock::new(at));
    Harness {
        ledger: SessionLedger::new(Arc::clone(&db), clock.clone(), DEFAULT_ZONE),
        accounts: AccountLedger::new(Arc::clone(&db), clock.clone()),
        quests: QuestBook::new(Arc::clone(&db), clock.clone()),
        _dir: dir,
        db,
        clock,
    }
}

impl Harness {
    fn run(&self, user: Uuid, outcome: &str) -> questgate_core::FocusSession {
        let session = self.ledger.open(user, None, None, 25).unwrap();
        self.ledger
            .close(session.id, user, Outcome::from(outcome), 1.0)
            .unwrap()
    }
}

#[test]
fn test_successful_gate_credits_account() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let quest = h
        .quests
        .create(
            user,
            NewQuest {
                weight: 2,
                ..NewQuest::titled("Write chapter 3")
            },
        )
        .unwrap();

    let session = h.ledger.open(user, Some(quest.id), Some("A"), 25).unwrap();
    assert_eq!(session.state(), SessionState::Open);
    assert_eq!(session.xp_earned, 0);

    h.clock.advance(Duration::minutes(25));
    let closed = h
        .ledger
        .close(session.id, user, Outcome::Success, 1.2)
        .unwrap();
    assert_eq!(closed.state(), SessionState::Closed);
    assert_eq!(closed.xp_earned, 1080);
    assert_eq!(closed.gold_earned, 540);
    assert_eq!(closed.end_at(), Some(noon(2025, 3, 10) + Duration::minutes(25)));

    let account = h.accounts.get(user).unwrap();
    assert_eq!(account.xp, 1080);
    assert_eq!(account.gold, 540);
    assert_eq!(account.streak, 1);
    assert_eq!(
        account.last_active_date,
        chrono::NaiveDate::from_ymd_opt(2025, 3, 10)
    );

    let stored = h.ledger.get(session.id, user).unwrap();
    assert_eq!(stored, closed);
}

#[test]
fn test_failed_gate_earns_nothing_and_resets_streak() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    h.run(user, "success");
    h.clock.advance(Duration::days(1));
    assert_eq!(h.accounts.get(user).unwrap().streak, 1);
    h.run(user, "success");
    assert_eq!(h.accounts.get(user).unwrap().streak, 2);

    let failed = h.run(user, "abandon");
    assert_eq!(failed.xp_earned, 0);
    assert_eq!(failed.gold_earned, 0);
    assert_eq!(failed.outcome(), Some(&Outcome::Abandon));

    let account = h.accounts.get(user).unwrap();
    assert_eq!(account.streak, 0);
    assert_eq!(account.xp, 500);
}

#[test]
fn test_unrecognized_outcome_is_a_failure() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let closed = h.run(user, "distracted");
    assert_eq!(closed.outcome(), Some(&Outcome::Other("distracted".into())));
    assert_eq!(closed.xp_earned, 0);
    assert_eq!(h.accounts.get(user).unwrap().streak, 0);
}

#[test]
fn test_second_close_is_rejected_and_not_recredited() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let session = h.ledger.open(user, None, None, 25).unwrap();
    h.ledger
        .close(session.id, user, Outcome::Success, 1.0)
        .unwrap();

    for outcome in [Outcome::Success, Outcome::Abandon] {
        let err = h.ledger.close(session.id, user, outcome, 1.0).unwrap_err();
        assert!(matches!(err, SettlementError::AlreadyClosed));
    }

    let account = h.accounts.get(user).unwrap();
    assert_eq!(account.xp, 250);
    assert_eq!(account.gold, 125);
    assert_eq!(account.streak, 1);
}

#[test]
fn test_sessions_are_owner_scoped() {
    let h = harness(noon(2025, 3, 10));
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    let session = h.ledger.open(owner, None, None, 25).unwrap();

    let err = h
        .ledger
        .close(session.id, intruder, Outcome::Success, 1.0)
        .unwrap_err();
    assert!(matches!(err, SettlementError::NotFound));
    assert!(matches!(
        h.ledger.get(session.id, intruder),
        Err(SettlementError::NotFound)
    ));
    assert!(h.ledger.history(intruder).unwrap().is_empty());
    assert!(!h.ledger.get(session.id, owner).unwrap().is_closed());
    assert!(matches!(
        h.accounts.get(intruder),
        Err(SettlementError::NotFound)
    ));

    let err = h
        .ledger
        .close(Uuid::new_v4(), owner, Outcome::Success, 1.0)
        .unwrap_err();
    assert!(matches!(err, SettlementError::NotFound));
}

#[test]
fn test_open_validates_input() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    for minutes in [0, -10] {
        assert!(matches!(
            h.ledger.open(user, None, None, minutes),
            Err(SettlementError::InvalidInput { .. })
        ));
    }
    assert!(h.ledger.history(user).unwrap().is_empty());

    let blank = h.ledger.open(user, None, Some("  "), 10).unwrap();
    assert_eq!(blank.rank, "E");
    let custom = h.ledger.open(user, None, Some("SS"), 10).unwrap();
    assert_eq!(custom.rank, "SS");
}

#[test]
fn test_close_validates_input_before_writing() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let session = h.ledger.open(user, None, None, 25).unwrap();

    assert!(matches!(
        h.ledger.close(session.id, user, Outcome::from(" "), 1.0),
        Err(SettlementError::InvalidInput { .. })
    ));
    assert!(matches!(
        h.ledger.close(session.id, user, Outcome::Success, f64::NAN),
        Err(SettlementError::InvalidInput { .. })
    ));
    assert!(!h.ledger.get(session.id, user).unwrap().is_closed());
    assert!(h.db.get_account(user).unwrap().is_none());
}

#[test]
fn test_non_positive_quality_uses_default() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let session = h.ledger.open(user, None, None, 25).unwrap();
    let closed = h
        .ledger
        .close(session.id, user, Outcome::Success, 0.0)
        .unwrap();
    assert_eq!(closed.xp_earned, 250);
}

#[test]
fn test_missing_quest_falls_back_to_weight_one() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let session = h
        .ledger
        .open(user, Some(Uuid::new_v4()), Some("E"), 25)
        .unwrap();
    let closed = h
        .ledger
        .close(session.id, user, Outcome::Success, 1.0)
        .unwrap();
    assert_eq!(closed.xp_earned, 250);
}

#[test]
fn test_streak_follows_calendar_days() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let streak = |h: &Harness| h.accounts.get(user).unwrap().streak;

    h.run(user, "success");
    assert_eq!(streak(&h), 1);
    h.run(user, "success");
    assert_eq!(streak(&h), 1, "same day does not extend");

    h.clock.advance(Duration::days(1));
    h.run(user, "success");
    assert_eq!(streak(&h), 2);

    h.clock.advance(Duration::days(2));
    h.run(user, "success");
    assert_eq!(streak(&h), 1, "a missed day resets");

    h.run(user, "abandon");
    assert_eq!(streak(&h), 0);
    h.run(user, "success");
    assert_eq!(streak(&h), 0, "a failure pins the day");

    h.clock.advance(Duration::days(1));
    h.run(user, "success");
    assert_eq!(streak(&h), 1);
}

#[test]
fn test_day_boundary_uses_settlement_zone() {
    // 23:30 on March 10th in São Paulo, already March 11th in UTC.
    let h = harness(Utc.with_ymd_and_hms(2025, 3, 11, 2, 30, 0).unwrap());
    let user = Uuid::new_v4();
    h.run(user, "success");
    assert_eq!(
        h.accounts.get(user).unwrap().last_active_date,
        chrono::NaiveDate::from_ymd_opt(2025, 3, 10)
    );

    h.clock.advance(Duration::hours(1));
    h.run(user, "success");
    assert_eq!(h.accounts.get(user).unwrap().streak, 2);
}

#[test]
fn test_account_totals_equal_session_sum() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let outcomes = ["success", "abandon", "success", "timeout", "success"];
    for (i, outcome) in outcomes.iter().enumerate() {
        let rank = ["E", "B", "S"][i % 3];
        let session = h.ledger.open(user, None, Some(rank), 15 + i as i64).unwrap();
        h.ledger
            .close(session.id, user, Outcome::from(*outcome), 1.0)
            .unwrap();
        h.clock.advance(Duration::hours(5));
    }
    // Left open; contributes nothing.
    h.ledger.open(user, None, None, 60).unwrap();

    let history = h.ledger.history(user).unwrap();
    assert_eq!(history.len(), outcomes.len() + 1);
    assert!(history
        .windows(2)
        .all(|pair| pair[0].start_at >= pair[1].start_at));

    let account = h.accounts.get(user).unwrap();
    assert_eq!(account.xp, history.iter().map(|s| s.xp_earned).sum::<i64>());
    assert_eq!(account.gold, history.iter().map(|s| s.gold_earned).sum::<i64>());
}

#[test]
fn test_register_returns_existing_account() {
    let h = harness(noon(2025, 3, 10));
    let user = Uuid::new_v4();
    let fresh = h.accounts.register(user).unwrap();
    assert_eq!((fresh.xp, fresh.gold, fresh.streak), (0, 0, 0));
    assert!(fresh.last_active_date.is_none());

    h.run(user, "success");
    let again = h.accounts.register(user).unwrap();
    assert_eq!(again.xp, 250);
}
