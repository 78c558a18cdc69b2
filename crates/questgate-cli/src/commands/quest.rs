//! Quest management commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use questgate_core::{Config, NewQuest, QuestBook, QuestPatch, QuestStatus};
use uuid::Uuid;

use super::{print_json, require_user, split_tags, CliResult, Context};

#[derive(Subcommand)]
pub enum QuestAction {
    /// Create a new quest
    Create {
        /// Quest title
        title: String,
        /// Quest description
        #[arg(long)]
        description: Option<String>,
        /// Reward weight (values below 1 become 1)
        #[arg(long, default_value = "1")]
        weight: i64,
        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<DateTime<Utc>>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List your quests, newest first
    List,
    /// Get quest details
    Get {
        /// Quest ID
        id: Uuid,
    },
    /// Update a quest
    Update {
        /// Quest ID
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        weight: Option<i64>,
        /// open, done or archived
        #[arg(long)]
        status: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a quest
    Delete {
        /// Quest ID
        id: Uuid,
    },
}

pub fn run(action: QuestAction, config: Config, user: Option<Uuid>) -> CliResult {
    let user = require_user(user)?;
    let ctx = Context::open(&config)?;
    let quests = QuestBook::new(ctx.store, ctx.clock);

    match action {
        QuestAction::Create {
            title,
            description,
            weight,
            due,
            tags,
        } => {
            let quest = quests.create(
                user,
                NewQuest {
                    title,
                    description,
                    weight,
                    due_at: due,
                    tags: tags.as_deref().map(split_tags).unwrap_or_default(),
                },
            )?;
            print_json(&quest)
        }
        QuestAction::List => print_json(&quests.list(user)?),
        QuestAction::Get { id } => print_json(&quests.get(user, id)?),
        QuestAction::Update {
            id,
            title,
            description,
            weight,
            status,
            tags,
        } => {
            let patch = QuestPatch {
                title,
                description,
                weight,
                status: status
                    .as_deref()
                    .map(str::parse::<QuestStatus>)
                    .transpose()?,
                tags: tags.as_deref().map(split_tags),
            };
            print_json(&quests.update(user, id, patch)?)
        }
        QuestAction::Delete { id } => {
            quests.delete(user, id)?;
            println!("Quest deleted: {id}");
            Ok(())
        }
    }
}
