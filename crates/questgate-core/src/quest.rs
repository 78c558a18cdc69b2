//! Quests: weighted tasks a gate can be run against.
//!
//! Settlement only ever reads a quest's weight. Everything else here is the
//! plain owner-scoped record kept by the stores.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::SettlementError;
use crate::store::SettlementStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    Open,
    Done,
    Archived,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Open => "open",
            QuestStatus::Done => "done",
            QuestStatus::Archived => "archived",
        }
    }

    pub fn parse(label: &str) -> Option<QuestStatus> {
        match label {
            "open" => Some(QuestStatus::Open),
            "done" => Some(QuestStatus::Done),
            "archived" => Some(QuestStatus::Archived),
            _ => None,
        }
    }

    /// Lenient read of a stored label. Unknown values come back as `Open`.
    pub fn from_stored(label: &str) -> QuestStatus {
        Self::parse(label).unwrap_or(QuestStatus::Open)
    }
}

impl FromStr for QuestStatus {
    type Err = SettlementError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Self::parse(label.trim()).ok_or_else(|| {
            SettlementError::invalid(
                "status",
                format!("unknown status '{label}', expected open, done or archived"),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub weight: i64,
    pub status: QuestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a quest.
#[derive(Debug, Clone, Default)]
pub struct NewQuest {
    pub title: String,
    pub description: Option<String>,
    pub weight: i64,
    pub due_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

impl NewQuest {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            weight: 1,
            ..Default::default()
        }
    }

    /// Validate and build the record. Blank titles are rejected; a weight
    /// below one becomes one.
    pub fn into_quest(
        self,
        user_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<Quest, SettlementError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(SettlementError::invalid("title", "must not be empty"));
        }
        Ok(Quest {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            description: self.description,
            weight: self.weight.max(1),
            status: QuestStatus::Open,
            due_at: self.due_at,
            tags: self.tags,
            created_at,
        })
    }
}

/// Partial update. Absent fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct QuestPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weight: Option<i64>,
    pub status: Option<QuestStatus>,
    pub tags: Option<Vec<String>>,
}

impl QuestPatch {
    /// Blank titles, non-positive weights and empty tag lists are ignored
    /// rather than applied.
    pub fn apply_to(self, quest: &mut Quest) {
        if let Some(title) = self.title {
            let title = title.trim();
            if !title.is_empty() {
                quest.title = title.to_string();
            }
        }
        if let Some(description) = self.description {
            quest.description = Some(description);
        }
        if let Some(weight) = self.weight.filter(|w| *w > 0) {
            quest.weight = weight;
        }
        if let Some(status) = self.status {
            quest.status = status;
        }
        if let Some(tags) = self.tags.filter(|t| !t.is_empty()) {
            quest.tags = tags;
        }
    }
}

/// Owner-scoped quest operations. Quests belonging to someone else behave
/// as if they did not exist.
pub struct QuestBook<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: SettlementStore> QuestBook<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create(&self, owner: Uuid, input: NewQuest) -> Result<Quest, SettlementError> {
        let quest = input.into_quest(owner, self.clock.now())?;
        self.store.create_quest(&quest)?;
        Ok(quest)
    }

    pub fn list(&self, owner: Uuid) -> Result<Vec<Quest>, SettlementError> {
        Ok(self.store.list_quests(owner)?)
    }

    pub fn get(&self, owner: Uuid, id: Uuid) -> Result<Quest, SettlementError> {
        match self.store.get_quest(id)? {
            Some(quest) if quest.user_id == owner => Ok(quest),
            _ => Err(SettlementError::NotFound),
        }
    }

    pub fn update(&self, owner: Uuid, id: Uuid, patch: QuestPatch) -> Result<Quest, SettlementError> {
        let mut quest = self.get(owner, id)?;
        patch.apply_to(&mut quest);
        self.store.update_quest(&quest)?;
        Ok(quest)
    }

    pub fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), SettlementError> {
        let quest = self.get(owner, id)?;
        self.store.delete_quest(quest.id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_quest_clamps_weight() {
        let quest = NewQuest {
            weight: -2,
            ..NewQuest::titled("Read a chapter")
        }
        .into_quest(Uuid::new_v4(), Utc::now())
        .unwrap();
        assert_eq!(quest.weight, 1);
        assert_eq!(quest.status, QuestStatus::Open);
    }

    #[test]
    fn blank_title_rejected() {
        let err = NewQuest::titled("   ")
            .into_quest(Uuid::new_v4(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInput { .. }));
    }

    #[test]
    fn patch_ignores_blank_title_and_bad_weight() {
        let mut quest = NewQuest::titled("Write")
            .into_quest(Uuid::new_v4(), Utc::now())
            .unwrap();
        QuestPatch {
            title: Some(" ".into()),
            weight: Some(0),
            status: Some(QuestStatus::Done),
            ..Default::default()
        }
        .apply_to(&mut quest);
        assert_eq!(quest.title, "Write");
        assert_eq!(quest.weight, 1);
        assert_eq!(quest.status, QuestStatus::Done);

        QuestPatch {
            weight: Some(3),
            ..Default::default()
        }
        .apply_to(&mut quest);
        assert_eq!(quest.weight, 3);
    }

    #[test]
    fn status_typo_is_rejected_not_reopened() {
        let mut quest = NewQuest::titled("Ship release")
            .into_quest(Uuid::new_v4(), Utc::now())
            .unwrap();
        quest.status = QuestStatus::Done;

        let err = "archivd".parse::<QuestStatus>().unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInput { .. }));
        assert_eq!(QuestStatus::parse("archivd"), None);
        assert_eq!(quest.status, QuestStatus::Done);

        QuestPatch {
            status: Some("archived".parse().unwrap()),
            ..Default::default()
        }
        .apply_to(&mut quest);
        assert_eq!(quest.status, QuestStatus::Archived);
    }

    #[test]
    fn stored_status_reads_leniently() {
        assert_eq!(QuestStatus::from_stored("done"), QuestStatus::Done);
        assert_eq!(QuestStatus::from_stored("legacy"), QuestStatus::Open);
    }

    #[test]
    fn patch_ignores_empty_tag_list() {
        let mut quest = NewQuest {
            tags: vec!["deep".into()],
            ..NewQuest::titled("Read")
        }
        .into_quest(Uuid::new_v4(), Utc::now())
        .unwrap();
        QuestPatch {
            tags: Some(Vec::new()),
            ..Default::default()
        }
        .apply_to(&mut quest);
        assert_eq!(quest.tags, vec!["deep".to_string()]);

        QuestPatch {
            tags: Some(vec!["shallow".into()]),
            ..Default::default()
        }
        .apply_to(&mut quest);
        assert_eq!(quest.tags, vec!["shallow".to_string()]);
    }
}
