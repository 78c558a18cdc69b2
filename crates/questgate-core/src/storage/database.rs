//! SQLite-backed settlement store.
//!
//! Provides persistent storage for:
//! - Focus sessions (append-only history)
//! - Player accounts (xp, gold, streak)
//! - Quests
//!
//! Each operation opens its own connection, so one `Database` can be shared
//! across threads. The per-account exclusive scope is a `BEGIN IMMEDIATE`
//! transaction; SQLite serializes writers at the file level.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::migrations;
use super::{data_dir, Config};
use crate::account::{Account, AccountDelta, StreakState};
use crate::error::StoreError;
use crate::gate::{Closure, FocusSession, Outcome};
use crate::quest::{Quest, QuestStatus};
use crate::store::{AccountTxn, SettlementStore};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SESSION_COLUMNS: &str = "id, user_id, quest_id, rank, start_at, end_at, target_minutes, \
                               outcome, xp_earned, gold_earned";
const QUEST_COLUMNS: &str =
    "id, user_id, title, description, weight, status, due_at, tags, created_at";
const ACCOUNT_COLUMNS: &str = "user_id, xp, gold, streak, last_active_date, created_at";

// === Helper Functions ===

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn format_date(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn uuid_col(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn opt_uuid_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn time_col(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn opt_time_col(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn opt_date_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

#[derive(Debug)]
struct HalfClosed;

impl std::fmt::Display for HalfClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("end_at and outcome must be set together")
    }
}

impl std::error::Error for HalfClosed {}

/// Build a FocusSession from a row selected with `SESSION_COLUMNS`.
fn row_to_session(row: &Row) -> rusqlite::Result<FocusSession> {
    let end_at = opt_time_col(row, 5)?;
    let outcome: Option<String> = row.get(7)?;
    let closure = match (end_at, outcome) {
        (Some(end_at), Some(outcome)) => Some(Closure {
            end_at,
            outcome: Outcome::from(outcome),
        }),
        (None, None) => None,
        _ => return Err(conversion_error(5, HalfClosed)),
    };

    Ok(FocusSession {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        quest_id: opt_uuid_col(row, 2)?,
        rank: row.get(3)?,
        start_at: time_col(row, 4)?,
        target_minutes: row.get(6)?,
        closure,
        xp_earned: row.get(8)?,
        gold_earned: row.get(9)?,
    })
}

fn row_to_quest(row: &Row) -> rusqlite::Result<Quest> {
    let status: String = row.get(5)?;
    let tags_json: String = row.get(7)?;
    let tags: Vec<String> =
        serde_json::from_str(&tags_json).map_err(|e| conversion_error(7, e))?;

    Ok(Quest {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        weight: row.get(4)?,
        status: QuestStatus::from_stored(&status),
        due_at: opt_time_col(row, 6)?,
        tags,
        created_at: time_col(row, 8)?,
    })
}

fn row_to_account(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        user_id: uuid_col(row, 0)?,
        xp: row.get(1)?,
        gold: row.get(2)?,
        streak: row.get(3)?,
        last_active_date: opt_date_col(row, 4)?,
        created_at: time_col(row, 5)?,
    })
}

fn tags_to_json(tags: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(tags).map_err(|e| StoreError::QueryFailed(e.to_string()))
}

/// SQLite database for settlement storage.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Database {
    /// Open the database named by `config` inside the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the
    /// database cannot be opened or migrated.
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let path = config.storage.database_path(&data_dir()?);
        Ok(Self::open_at(path)?
            .with_busy_timeout(Duration::from_millis(config.storage.busy_timeout_ms)))
    }

    /// Open (and migrate) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db = Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };
        let conn = db.connect()?;
        migrations::migrate(&conn).map_err(|e| StoreError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new connection to the database file.
    pub fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path).map_err(|source| StoreError::OpenFailed {
            path: self.path.clone(),
            source,
        })?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl SettlementStore for Database {
    fn create_session(&self, session: &FocusSession) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO focus_sessions
                 (id, user_id, quest_id, rank, start_at, end_at, target_minutes, outcome,
                  xp_earned, gold_earned)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                session.quest_id.map(|q| q.to_string()),
                session.rank,
                format_time(session.start_at),
                session.end_at().map(format_time),
                session.target_minutes,
                session.outcome().map(|o| o.as_str().to_string()),
                session.xp_earned,
                session.gold_earned,
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, id: Uuid) -> Result<Option<FocusSession>, StoreError> {
        let conn = self.connect()?;
        let session = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM focus_sessions WHERE id = ?1"),
                params![id.to_string()],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn list_sessions(&self, user_id: Uuid) -> Result<Vec<FocusSession>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM focus_sessions
             WHERE user_id = ?1
             ORDER BY start_at DESC, id"
        ))?;
        let sessions = stmt
            .query_map(params![user_id.to_string()], row_to_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn quest_weight(&self, quest_id: Uuid) -> Result<Option<i64>, StoreError> {
        let conn = self.connect()?;
        let weight = conn
            .query_row(
                "SELECT weight FROM quests WHERE id = ?1",
                params![quest_id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(weight)
    }

    fn begin_account(&self, user_id: Uuid) -> Result<Box<dyn AccountTxn + '_>, StoreError> {
        let conn = self.connect()?;
        conn.execute_batch("BEGIN IMMEDIATE TRANSACTION;")?;
        Ok(Box::new(SqliteTxn {
            conn,
            user_id,
            finished: false,
        }))
    }

    fn register_account(&self, account: &Account) -> Result<Account, StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO accounts (user_id, xp, gold, streak, last_active_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                account.user_id.to_string(),
                account.xp,
                account.gold,
                account.streak,
                account.last_active_date.map(format_date),
                format_time(account.created_at),
            ],
        )?;
        let stored = conn.query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
            params![account.user_id.to_string()],
            row_to_account,
        )?;
        Ok(stored)
    }

    fn get_account(&self, user_id: Uuid) -> Result<Option<Account>, StoreError> {
        let conn = self.connect()?;
        let account = conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
                params![user_id.to_string()],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    fn create_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO quests (id, user_id, title, description, weight, status, due_at, tags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                quest.id.to_string(),
                quest.user_id.to_string(),
                quest.title,
                quest.description,
                quest.weight,
                quest.status.as_str(),
                quest.due_at.map(format_time),
                tags_to_json(&quest.tags)?,
                format_time(quest.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_quest(&self, id: Uuid) -> Result<Option<Quest>, StoreError> {
        let conn = self.connect()?;
        let quest = conn
            .query_row(
                &format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = ?1"),
                params![id.to_string()],
                row_to_quest,
            )
            .optional()?;
        Ok(quest)
    }

    fn list_quests(&self, user_id: Uuid) -> Result<Vec<Quest>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {QUEST_COLUMNS} FROM quests
             WHERE user_id = ?1
             ORDER BY created_at DESC, id"
        ))?;
        let quests = stmt
            .query_map(params![user_id.to_string()], row_to_quest)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(quests)
    }

    fn update_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE quests
             SET title = ?2, description = ?3, weight = ?4, status = ?5, tags = ?6
             WHERE id = ?1",
            params![
                quest.id.to_string(),
                quest.title,
                quest.description,
                quest.weight,
                quest.status.as_str(),
                tags_to_json(&quest.tags)?,
            ],
        )?;
        Ok(())
    }

    fn delete_quest(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM quests WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }
}

/// Open `BEGIN IMMEDIATE` transaction scoped to one account. Rolled back on
/// drop unless committed.
struct SqliteTxn {
    conn: Connection,
    user_id: Uuid,
    finished: bool,
}

impl AccountTxn for SqliteTxn {
    fn streak_state_for_update(&mut self) -> Result<StreakState, StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO accounts (user_id, created_at) VALUES (?1, ?2)",
            params![self.user_id.to_string(), format_time(Utc::now())],
        )?;
        let (streak, last_active_date) = self.conn.query_row(
            "SELECT streak, last_active_date FROM accounts WHERE user_id = ?1",
            params![self.user_id.to_string()],
            |row| Ok((row.get::<_, u32>(0)?, opt_date_col(row, 1)?)),
        )?;
        Ok(StreakState {
            streak,
            last_active_date,
        })
    }

    fn close_session(&mut self, session: &FocusSession) -> Result<bool, StoreError> {
        let Some(closure) = session.closure.as_ref() else {
            return Err(StoreError::QueryFailed(format!(
                "session {} has no closure to record",
                session.id
            )));
        };
        let changed = self.conn.execute(
            "UPDATE focus_sessions
             SET end_at = ?2, outcome = ?3, xp_earned = ?4, gold_earned = ?5
             WHERE id = ?1 AND user_id = ?6 AND end_at IS NULL",
            params![
                session.id.to_string(),
                format_time(closure.end_at),
                closure.outcome.as_str(),
                session.xp_earned,
                session.gold_earned,
                session.user_id.to_string(),
            ],
        )?;
        Ok(changed == 1)
    }

    fn apply_account_delta(&mut self, delta: &AccountDelta) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE accounts
             SET xp = xp + ?2, gold = gold + ?3, streak = ?4, last_active_date = ?5
             WHERE user_id = ?1",
            params![
                self.user_id.to_string(),
                delta.reward.xp,
                delta.reward.gold,
                delta.streak,
                format_date(delta.last_active_date),
            ],
        )?;
        if changed != 1 {
            return Err(StoreError::QueryFailed(format!(
                "account {} missing inside its own transaction",
                self.user_id
            )));
        }
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT;")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTxn {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.conn.execute_batch("ROLLBACK;");
        }
    }
}
