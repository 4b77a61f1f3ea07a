pub mod aptos_client;
pub mod balance;
pub mod bet;
pub mod client;
pub mod coin;
pub mod config;
pub mod ledger;
pub mod notice;
pub mod orchestrator;
pub mod preferences;
pub mod switcher;
pub mod ui;
pub mod units;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
