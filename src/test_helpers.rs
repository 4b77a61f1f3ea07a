//! In-memory stand-ins for the wallet, the ledger and the preference store.

use crate::{
    coin::CoinHandle,
    ledger::{
        Address,
        FlipOutcome,
        Ledger,
        TransactionHash,
        WagerRequest,
        Wallet,
    },
    preferences::PreferenceStore,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::{
    sync::Notify,
    task::JoinHandle,
    time::{
        self,
        Instant,
    },
};

/// Ticks the coin on a fixed frame interval, like the terminal UI does.
pub fn drive_frames(coin: CoinHandle, frame: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(frame);
        loop {
            ticker.tick().await;
            coin.tick(Instant::now());
        }
    })
}

#[derive(Default)]
struct FakeWalletState {
    address: Option<Address>,
    submitted: Vec<WagerRequest>,
    failure: Option<String>,
    hold: bool,
}

#[derive(Clone, Default)]
pub struct FakeWallet {
    state: Arc<Mutex<FakeWalletState>>,
    gate: Arc<Notify>,
}

impl FakeWallet {
    pub fn new(address: Option<Address>) -> Self {
        let wallet = Self::default();
        wallet.state.lock().unwrap().address = address;
        wallet
    }

    pub fn fail_submissions(&self, message: &str) {
        self.state.lock().unwrap().failure = Some(message.to_string());
    }

    /// Submissions wait for [`FakeWallet::release`] before completing.
    pub fn hold_submissions(&self) {
        self.state.lock().unwrap().hold = true;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn submitted(&self) -> Vec<WagerRequest> {
        self.state.lock().unwrap().submitted.clone()
    }
}

impl Wallet for FakeWallet {
    fn address(&self) -> Option<Address> {
        self.state.lock().unwrap().address.clone()
    }

    async fn submit(&self, request: &WagerRequest) -> Result<TransactionHash> {
        let hold = {
            let mut state = self.state.lock().unwrap();
            state.submitted.push(request.clone());
            state.hold
        };
        if hold {
            self.gate.notified().await;
        }
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.failure {
            return Err(eyre!("{message}"));
        }
        Ok(TransactionHash(format!("0x{:064x}", state.submitted.len())))
    }
}

#[derive(Default)]
struct FakeLedgerState {
    outcome: Option<FlipOutcome>,
    event_failure: Option<String>,
    event_lookups: usize,
    balances: HashMap<Address, u64>,
    balance_failure: bool,
    balance_calls: usize,
}

#[derive(Clone, Default)]
pub struct FakeLedger {
    state: Arc<Mutex<FakeLedgerState>>,
}

impl FakeLedger {
    /// Outcome returned for every subsequent event lookup.
    pub fn set_next_outcome(&self, outcome: FlipOutcome) {
        self.state.lock().unwrap().outcome = Some(outcome);
    }

    pub fn fail_event_lookups(&self, message: &str) {
        self.state.lock().unwrap().event_failure = Some(message.to_string());
    }

    pub fn event_lookups(&self) -> usize {
        self.state.lock().unwrap().event_lookups
    }

    pub fn set_balance(&self, address: Address, base_units: u64) {
        self.state.lock().unwrap().balances.insert(address, base_units);
    }

    pub fn fail_balance_queries(&self, fail: bool) {
        self.state.lock().unwrap().balance_failure = fail;
    }

    pub fn balance_calls(&self) -> usize {
        self.state.lock().unwrap().balance_calls
    }
}

impl Ledger for FakeLedger {
    async fn event_by_hash(
        &self,
        hash: &TransactionHash,
        _event_type: &str,
    ) -> Result<FlipOutcome> {
        let mut state = self.state.lock().unwrap();
        state.event_lookups += 1;
        if let Some(message) = &state.event_failure {
            return Err(eyre!("{message}"));
        }
        state
            .outcome
            .clone()
            .ok_or_else(|| eyre!("no flip event recorded for {hash}"))
    }

    async fn balance(&self, address: &Address, _coin_type: &str) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.balance_calls += 1;
        if state.balance_failure {
            return Err(eyre!("balance query failed"));
        }
        Ok(state.balances.get(address).copied().unwrap_or_default())
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryPreferences {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
