//! Focus session ("gate run") records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reward::Reward;

/// Label a caller closes a gate with. Only `success` earns rewards and
/// extends the streak; every other label counts as a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Outcome {
    Success,
    Abandon,
    Other(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Success => "success",
            Outcome::Abandon => "abandon",
            Outcome::Other(label) => label,
        }
    }
}

impl From<String> for Outcome {
    fn from(label: String) -> Self {
        match label.as_str() {
            "success" => Outcome::Success,
            "abandon" => Outcome::Abandon,
            _ => Outcome::Other(label),
        }
    }
}

impl From<&str> for Outcome {
    fn from(label: &str) -> Self {
        Outcome::from(label.to_string())
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.as_str().to_string()
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Open,
    Closed,
}

/// End time and outcome always arrive together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Closure {
    pub end_at: DateTime<Utc>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest_id: Option<Uuid>,
    pub rank: String,
    pub start_at: DateTime<Utc>,
    pub target_minutes: i64,
    #[serde(flatten)]
    pub closure: Option<Closure>,
    pub xp_earned: i64,
    pub gold_earned: i64,
}

impl FocusSession {
    /// A fresh open session with zero rewards.
    pub fn open(
        user_id: Uuid,
        quest_id: Option<Uuid>,
        rank: impl Into<String>,
        target_minutes: i64,
        start_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            quest_id,
            rank: rank.into(),
            start_at,
            target_minutes,
            closure: None,
            xp_earned: 0,
            gold_earned: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.closure.is_some() {
            SessionState::Closed
        } else {
            SessionState::Open
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closure.is_some()
    }

    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        self.closure.as_ref().map(|c| c.end_at)
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.closure.as_ref().map(|c| &c.outcome)
    }

    pub fn reward(&self) -> Reward {
        Reward {
            xp: self.xp_earned,
            gold: self.gold_earned,
        }
    }

    /// The closed form of this session. Does not touch `self`, so a failed
    /// write leaves the caller holding the open record.
    pub fn closed(&self, end_at: DateTime<Utc>, outcome: Outcome, reward: Reward) -> Self {
        Self {
            closure: Some(Closure { end_at, outcome }),
            xp_earned: reward.xp,
            gold_earned: reward.gold,
            ..self.clone()
        }
    }
}
