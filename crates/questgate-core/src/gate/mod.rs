mod ledger;
mod reward;
mod session;
mod settlement;
mod streak;

pub use ledger::SessionLedger;
pub use reward::{compute_reward, rank_multiplier, Rank, Reward};
pub use session::{Closure, FocusSession, Outcome, SessionState};
pub use settlement::{Settlement, DEFAULT_QUALITY};
pub use streak::{next_streak, today_in, DayGap, DEFAULT_ZONE};
