use crate::{
    config::GameConfig,
    preferences::PreferenceStore,
};
use color_eyre::eyre::Result;
use std::fmt;

pub const SIDE_PREFERENCE_KEY: &str = "curBetDirection";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Side {
    #[default]
    Front,
    Back,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Front => "Heads",
            Side::Back => "Tails",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Heads" => Some(Side::Front),
            "Tails" => Some(Side::Back),
            _ => None,
        }
    }

    pub fn from_heads(heads: bool) -> Self {
        if heads { Side::Front } else { Side::Back }
    }

    pub fn predicts_heads(self) -> bool {
        matches!(self, Side::Front)
    }

    /// Offset added to a coin angle before the settled test for this face.
    pub fn settle_offset(self) -> i32 {
        match self {
            Side::Front => 0,
            Side::Back => 180,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StakeTier {
    #[default]
    Standard,
    High,
}

impl StakeTier {
    pub fn toggled(self) -> Self {
        match self {
            StakeTier::Standard => StakeTier::High,
            StakeTier::High => StakeTier::Standard,
        }
    }
}

/// The wager being composed. `stake` is in base units and is always a member
/// of the active tier's stake set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BetState {
    stake: u64,
    side: Side,
    tier: StakeTier,
}

impl BetState {
    pub fn new(config: &GameConfig, side: Side) -> Self {
        Self {
            stake: config.default_stake,
            side,
            tier: StakeTier::Standard,
        }
    }

    /// Side comes from the preference store; stake and tier start fresh.
    pub fn restore(config: &GameConfig, prefs: &impl PreferenceStore) -> Self {
        let side = prefs
            .get(SIDE_PREFERENCE_KEY)
            .and_then(|label| Side::from_label(&label))
            .unwrap_or_default();
        Self::new(config, side)
    }

    pub fn stake(&self) -> u64 {
        self.stake
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn tier(&self) -> StakeTier {
        self.tier
    }

    pub fn stakes<'a>(&self, config: &'a GameConfig) -> &'a [u64] {
        config.stakes(self.tier)
    }

    /// Callers pick from `stakes()`, so the amount is a member of the menu.
    pub fn set_stake(&mut self, stake: u64) {
        self.stake = stake;
    }

    pub fn set_tier(&mut self, tier: StakeTier, config: &GameConfig) {
        self.tier = tier;
        let stakes = config.stakes(tier);
        if !stakes.contains(&self.stake)
            && let Some(fallback) = stakes.get(1).or_else(|| stakes.first())
        {
            self.stake = *fallback;
        }
    }

    /// Updates the side and writes it through to the preference store. The
    /// in-memory side changes even if persisting fails.
    pub fn set_side(&mut self, side: Side, prefs: &mut impl PreferenceStore) -> Result<()> {
        self.side = side;
        prefs.set(SIDE_PREFERENCE_KEY, side.label())
    }

    pub fn select_next_stake(&mut self, config: &GameConfig) {
        let stakes = config.stakes(self.tier);
        let idx = stakes.iter().position(|s| *s == self.stake).unwrap_or(0);
        if let Some(next) = stakes.get((idx + 1) % stakes.len().max(1)) {
            self.stake = *next;
        }
    }

    pub fn select_prev_stake(&mut self, config: &GameConfig) {
        let stakes = config.stakes(self.tier);
        let len = stakes.len().max(1);
        let idx = stakes.iter().position(|s| *s == self.stake).unwrap_or(0);
        if let Some(prev) = stakes.get((idx + len - 1) % len) {
            self.stake = *prev;
        }
    }
}
