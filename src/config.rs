use crate::{
    bet::StakeTier,
    ledger::Address,
};
use std::time::Duration;

pub const DEFAULT_MAINNET_RPC_URL: &str = "https://fullnode.mainnet.aptoslabs.com/v1";
pub const DEFAULT_TESTNET_RPC_URL: &str = "https://fullnode.testnet.aptoslabs.com/v1";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://fullnode.devnet.aptoslabs.com/v1";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8080/v1";

pub const DEFAULT_CONTRACT_ADDRESS: &str =
    "0x66fd6237b7f79a1914ec07e9fc9e54c730b732eac1646cbc42d19eb57b0df780";
pub const FLIP_MODULE_NAME: &str = "coin_flip";
pub const APT_COIN: &str = "0x1::aptos_coin::AptosCoin";
pub const APT_DECIMALS: u32 = 8;

const ONE_APT: u64 = 100_000_000;
const STANDARD_STAKES: [u64; 4] = [ONE_APT / 20, ONE_APT / 10, ONE_APT / 2, ONE_APT];
const HIGH_STAKES: [u64; 4] = [2 * ONE_APT, 3 * ONE_APT, 4 * ONE_APT, 5 * ONE_APT];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkTarget {
    Mainnet { url: String },
    Testnet { url: String },
    Devnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Mainnet { url }
            | NetworkTarget::Testnet { url }
            | NetworkTarget::Devnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NetworkTarget::Mainnet { .. } => "Mainnet",
            NetworkTarget::Testnet { .. } => "Testnet",
            NetworkTarget::Devnet { .. } => "Devnet",
            NetworkTarget::LocalNode { .. } => "Local",
        }
    }
}

/// Durations of the coin keyframe animations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationTiming {
    /// One cycle of the open-ended spin played while the outcome is unknown.
    pub spin_period: Duration,
    /// Terminating animation that lands on the outcome side.
    pub settle: Duration,
    /// Manual side switch before a flip.
    pub switch: Duration,
    pub frame: Duration,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            spin_period: Duration::from_secs(3),
            settle: Duration::from_secs(2),
            switch: Duration::from_secs(1),
            frame: Duration::from_millis(50),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoticeTiming {
    pub no_wallet: Duration,
    pub win: Duration,
    pub loss: Duration,
}

impl Default for NoticeTiming {
    fn default() -> Self {
        Self {
            no_wallet: Duration::from_secs(1),
            win: Duration::from_secs(3),
            loss: Duration::from_secs(2),
        }
    }
}

/// Process-wide read-only settings, built once in `main` and shared by
/// reference with every component.
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub contract: Address,
    pub module: String,
    pub coin_type: String,
    pub coin_ticker: String,
    pub decimals: u32,
    pub standard_stakes: Vec<u64>,
    pub high_stakes: Vec<u64>,
    pub default_stake: u64,
    pub balance_poll_interval: Duration,
    pub animation: AnimationTiming,
    pub notices: NoticeTiming,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            contract: Address::from_static(DEFAULT_CONTRACT_ADDRESS),
            module: FLIP_MODULE_NAME.to_string(),
            coin_type: APT_COIN.to_string(),
            coin_ticker: "APT".to_string(),
            decimals: APT_DECIMALS,
            standard_stakes: STANDARD_STAKES.to_vec(),
            high_stakes: HIGH_STAKES.to_vec(),
            default_stake: STANDARD_STAKES[1],
            balance_poll_interval: Duration::from_secs(6),
            animation: AnimationTiming::default(),
            notices: NoticeTiming::default(),
        }
    }
}

impl GameConfig {
    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = contract;
        self
    }

    pub fn stakes(&self, tier: StakeTier) -> &[u64] {
        match tier {
            StakeTier::Standard => &self.standard_stakes,
            StakeTier::High => &self.high_stakes,
        }
    }

    pub fn play_function(&self) -> String {
        format!("{}::{}::play", self.contract, self.module)
    }

    pub fn flip_event_type(&self) -> String {
        format!("{}::{}::FlipEvent", self.contract, self.module)
    }
}
