//! Concurrent settlement tests.
//!
//! Settlements for one account must serialize: the streak moves once per
//! day no matter how many gates close together, rewards add up, and a
//! session is credited at most once.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{TimeZone, Utc};
use questgate_core::{
    AccountLedger, Clock, Database, ManualClock, MemoryStore, Outcome, SessionLedger,
    SettlementError, SettlementStore, DEFAULT_ZONE,
};
use tempfile::TempDir;
use uuid::Uuid;

const THREADS: usize = 8;

fn clock() -> Arc<dyn Clock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 8, 20, 14, 0, 0).unwrap(),
    ))
}

fn close_many_in_parallel<S: SettlementStore + 'static>(store: Arc<S>) {
    let clock = clock();
    let ledger = Arc::new(SessionLedger::new(Arc::clone(&store), clock.clone(), DEFAULT_ZONE));
    let user = Uuid::new_v4();
    let sessions: Vec<_> = (0..THREADS)
        .map(|_| ledger.open(user, None, None, 25).unwrap())
        .collect();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = sessions
        .into_iter()
        .map(|session| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ledger.close(session.id, user, Outcome::Success, 1.0)
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let account = AccountLedger::new(store, clock).get(user).unwrap();
    assert_eq!(account.streak, 1);
    assert_eq!(account.xp, 250 * THREADS as i64);
    assert_eq!(account.gold, 125 * THREADS as i64);
}

fn race_one_session<S: SettlementStore + 'static>(store: Arc<S>) {
    let clock = clock();
    let ledger = Arc::new(SessionLedger::new(Arc::clone(&store), clock.clone(), DEFAULT_ZONE));
    let user = Uuid::new_v4();
    let session = ledger.open(user, None, Some("B"), 20).unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            let id = session.id;
            thread::spawn(move || {
                barrier.wait();
                ledger.close(id, user, Outcome::Success, 1.0)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, SettlementError::AlreadyClosed)));

    let account = AccountLedger::new(store, clock).get(user).unwrap();
    assert_eq!(account.xp, winners[0].xp_earned);
    assert_eq!(account.streak, 1);
}

#[test]
fn test_parallel_closes_same_day_sqlite() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_at(dir.path().join("questgate.db")).unwrap();
    close_many_in_parallel(Arc::new(db));
}

#[test]
fn test_parallel_closes_same_day_memory() {
    close_many_in_parallel(Arc::new(MemoryStore::new()));
}

#[test]
fn test_one_session_closed_once_sqlite() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_at(dir.path().join("questgate.db")).unwrap();
    race_one_session(Arc::new(db));
}

#[test]
fn test_one_session_closed_once_memory() {
    race_one_session(Arc::new(MemoryStore::new()));
}

#[test]
fn test_failed_commit_leaves_session_open_for_retry() {
    let store = Arc::new(MemoryStore::new());
    let clock = clock();
    let ledger = SessionLedger::new(Arc::clone(&store), clock.clone(), DEFAULT_ZONE);
    let accounts = AccountLedger::new(Arc::clone(&store), clock);
    let user = Uuid::new_v4();
    let session = ledger.open(user, None, None, 25).unwrap();

    store.fail_next_commit();
    let err = ledger
        .close(session.id, user, Outcome::Success, 1.0)
        .unwrap_err();
    assert!(matches!(err, SettlementError::StorageUnavailable(_)));
    assert!(err.is_retryable());
    assert!(!ledger.get(session.id, user).unwrap().is_closed());
    assert!(matches!(accounts.get(user), Err(SettlementError::NotFound)));

    let closed = ledger
        .close(session.id, user, Outcome::Success, 1.0)
        .unwrap();
    assert_eq!(closed.xp_earned, 250);
    let account = accounts.get(user).unwrap();
    assert_eq!(account.xp, 250);
    assert_eq!(account.streak, 1);
}

#[test]
fn test_independent_accounts_settle_in_parallel() {
    let store = Arc::new(MemoryStore::new());
    let clock = clock();
    let ledger = Arc::new(SessionLedger::new(Arc::clone(&store), clock.clone(), DEFAULT_ZONE));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                let user = Uuid::new_v4();
                for _ in 0..3 {
                    let session = ledger.open(user, None, None, 10).unwrap();
                    ledger
                        .close(session.id, user, Outcome::Success, 1.0)
                        .unwrap();
                }
                user
            })
        })
        .collect();

    let accounts = AccountLedger::new(store, clock);
    for handle in handles {
        let user = handle.join().unwrap();
        let account = accounts.get(user).unwrap();
        assert_eq!(account.xp, 300);
        assert_eq!(account.streak, 1);
    }
}
