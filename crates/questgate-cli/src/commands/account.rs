//! Account commands.

use clap::Subcommand;
use questgate_core::{AccountLedger, Config};
use uuid::Uuid;

use super::{print_json, require_user, CliResult, Context};

#[derive(Subcommand)]
pub enum AccountAction {
    /// Create the account if it does not exist yet
    Register,
    /// Show xp, gold and streak
    Show,
}

pub fn run(action: AccountAction, config: Config, user: Option<Uuid>) -> CliResult {
    let user = require_user(user)?;
    let ctx = Context::open(&config)?;
    let accounts = AccountLedger::new(ctx.store, ctx.clock);

    match action {
        AccountAction::Register => print_json(&accounts.register(user)?),
        AccountAction::Show => print_json(&accounts.get(user)?),
    }
}
