//! Reward calculator.
//!
//! Turns a closed gate into experience and gold. Every input is clamped into
//! range instead of rejected, so the calculator never fails.

use serde::{Deserialize, Serialize};

/// Base experience per focused minute before multipliers.
const BASE_XP_PER_MINUTE: f64 = 10.0;
const MIN_QUALITY: f64 = 0.5;
const MAX_QUALITY: f64 = 1.5;

/// Gate rank tiers, lowest first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Rank {
    #[default]
    E,
    D,
    C,
    B,
    A,
    S,
}

impl Rank {
    pub const ALL: [Rank; 6] = [Rank::E, Rank::D, Rank::C, Rank::B, Rank::A, Rank::S];

    /// Exact, case-sensitive label match.
    pub fn from_label(label: &str) -> Option<Rank> {
        match label {
            "E" => Some(Rank::E),
            "D" => Some(Rank::D),
            "C" => Some(Rank::C),
            "B" => Some(Rank::B),
            "A" => Some(Rank::A),
            "S" => Some(Rank::S),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rank::E => "E",
            Rank::D => "D",
            Rank::C => "C",
            Rank::B => "B",
            Rank::A => "A",
            Rank::S => "S",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            Rank::S => 2.2,
            Rank::A => 1.8,
            Rank::B => 1.5,
            Rank::C => 1.3,
            Rank::D => 1.1,
            Rank::E => 1.0,
        }
    }
}

/// Multiplier for a stored rank label. Unknown labels get the lowest tier.
pub fn rank_multiplier(label: &str) -> f64 {
    Rank::from_label(label)
        .unwrap_or_default()
        .multiplier()
}

/// Experience and gold produced by one settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reward {
    pub xp: i64,
    pub gold: i64,
}

impl Reward {
    pub const ZERO: Reward = Reward { xp: 0, gold: 0 };
}

/// Compute the reward for a gate.
///
/// `xp = floor(10 * minutes * rank_multiplier * quest_weight * quality)` and
/// `gold = floor(xp / 2)`. Negative minutes count as zero, a non-positive
/// weight counts as one, and quality is clamped to `[0.5, 1.5]`.
pub fn compute_reward(
    target_minutes: i64,
    rank_multiplier: f64,
    quest_weight: i64,
    quality: f64,
) -> Reward {
    let minutes = target_minutes.max(0);
    let weight = if quest_weight <= 0 { 1 } else { quest_weight };
    let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);

    let xp_f = BASE_XP_PER_MINUTE * minutes as f64 * rank_multiplier * weight as f64 * quality;
    // `as` saturates and maps NaN to 0
    let xp = if xp_f > 0.0 { xp_f as i64 } else { 0 };

    Reward { xp, gold: xp / 2 }
}
