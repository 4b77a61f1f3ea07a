use crate::{
    bet::Side,
    config::GameConfig,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use std::fmt;

/// Account address, kept in canonical form: lowercase hex, `0x` prefix, no
/// leading zeros. Two spellings of the same account compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        let digits = strip_prefix(raw.trim());
        if digits.is_empty() || digits.len() > 64 {
            return Err(eyre!("invalid account address '{raw}'"));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(eyre!("account address '{raw}' is not hex"));
        }
        Ok(Self::canonical(digits))
    }

    /// For compile-time constants that are known to be valid hex.
    pub fn from_static(raw: &'static str) -> Self {
        Self::canonical(strip_prefix(raw))
    }

    fn canonical(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
        Self(format!("0x{}", trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full 32-byte form expected by signing payloads.
    pub fn to_long_hex(&self) -> String {
        format!("0x{:0>64}", strip_prefix(&self.0))
    }
}

fn strip_prefix(raw: &str) -> &str {
    raw.strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw)
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub String);

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entry-function call placing one wager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WagerRequest {
    pub sender: Address,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub stake_base_units: u64,
    pub predict_heads: bool,
}

impl WagerRequest {
    pub fn new(config: &GameConfig, sender: Address, stake: u64, side: Side) -> Self {
        Self {
            sender,
            function: config.play_function(),
            type_arguments: vec![config.coin_type.clone()],
            stake_base_units: stake,
            predict_heads: side.predicts_heads(),
        }
    }
}

/// Authoritative result of one wager, decoded from the ledger's `FlipEvent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlipOutcome {
    pub side: Side,
    pub won: bool,
    pub player: Address,
}

/// Signs and submits transactions on behalf of the connected account.
pub trait Wallet: Send + Sync + 'static {
    fn address(&self) -> Option<Address>;

    fn submit(
        &self,
        request: &WagerRequest,
    ) -> impl Future<Output = Result<TransactionHash>> + Send;
}

/// Read side of the chain.
pub trait Ledger: Send + Sync + 'static {
    /// Look up the event of the given type emitted by a transaction. The event
    /// feed is not filtered by sender; callers must check `player`.
    fn event_by_hash(
        &self,
        hash: &TransactionHash,
        event_type: &str,
    ) -> impl Future<Output = Result<FlipOutcome>> + Send;

    fn balance(
        &self,
        address: &Address,
        coin_type: &str,
    ) -> impl Future<Output = Result<u64>> + Send;
}
