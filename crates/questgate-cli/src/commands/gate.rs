//! Gate commands: open a focus session, close it, review history.

use clap::Subcommand;
use questgate_core::{Config, Outcome, SessionLedger, DEFAULT_QUALITY};
use uuid::Uuid;

use super::{print_json, require_user, CliResult, Context};

#[derive(Subcommand)]
pub enum GateAction {
    /// Open a gate
    Open {
        /// Planned focus length in minutes
        #[arg(long)]
        minutes: i64,
        /// Rank label (E, D, C, B, A, S); defaults to E
        #[arg(long)]
        rank: Option<String>,
        /// Quest the gate is run against
        #[arg(long)]
        quest: Option<Uuid>,
    },
    /// Close a gate and settle its reward
    Close {
        /// Session ID
        id: Uuid,
        /// "success" earns rewards; anything else counts as a failure
        #[arg(long, default_value = "success")]
        outcome: String,
        /// Quality factor, clamped to 0.5..=1.5
        #[arg(long, default_value_t = DEFAULT_QUALITY)]
        quality: f64,
    },
    /// Show one gate
    Get {
        /// Session ID
        id: Uuid,
    },
    /// List your gates, newest first
    History,
}

pub fn run(action: GateAction, config: Config, user: Option<Uuid>) -> CliResult {
    let user = require_user(user)?;
    let ctx = Context::open(&config)?;
    let ledger = SessionLedger::new(ctx.store, ctx.clock, ctx.zone);

    match action {
        GateAction::Open {
            minutes,
            rank,
            quest,
        } => print_json(&ledger.open(user, quest, rank.as_deref(), minutes)?),
        GateAction::Close {
            id,
            outcome,
            quality,
        } => print_json(&ledger.close(id, user, Outcome::from(outcome), quality)?),
        GateAction::Get { id } => print_json(&ledger.get(id, user)?),
        GateAction::History => print_json(&ledger.history(user)?),
    }
}
