//! Flip orchestration: submit a wager, keep the coin spinning while the
//! outcome is unknown, then land the coin on the side the ledger reports.
//!
//! ```text
//! Idle -> Submitting -> Spinning -> Settling -> Idle
//!            |              |
//!            +--------------+--> Idle   (failure, or event for another player)
//! ```
//!
//! At most one flip runs per session. The guard is taken synchronously in
//! [`FlipOrchestrator::request_flip`] before anything is awaited.

use crate::{
    bet::{
        BetState,
        Side,
    },
    coin::{
        Animation,
        CoinHandle,
        Keyframes,
        is_settled,
    },
    config::GameConfig,
    ledger::{
        Address,
        FlipOutcome,
        Ledger,
        TransactionHash,
        WagerRequest,
        Wallet,
    },
};
use color_eyre::eyre::Report;
use std::sync::{
    Arc,
    Mutex,
    PoisonError,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::Instant,
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FlipPhase {
    #[default]
    Idle,
    Submitting,
    Spinning,
    Settling,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlipRejection {
    NoAccount,
    InFlight,
}

/// A settled wager, ready to be announced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlipReport {
    pub outcome: FlipOutcome,
    pub stake: u64,
}

impl FlipReport {
    pub fn result_text(&self) -> &'static str {
        self.outcome.side.label()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FlipUpdate {
    /// A flip was accepted; any previous result is stale.
    Started,
    Spinning {
        hash: TransactionHash,
        keyframes: Keyframes,
    },
    Settled(FlipReport),
    /// The looked-up event belonged to someone else. Nothing to announce.
    Unmatched { hash: TransactionHash },
    Aborted { reason: String },
}

pub struct FlipOrchestrator<W, L> {
    config: Arc<GameConfig>,
    wallet: Arc<W>,
    ledger: Arc<L>,
    coin: CoinHandle,
    phase: Arc<Mutex<FlipPhase>>,
    updates: mpsc::UnboundedSender<FlipUpdate>,
}

impl<W, L> Clone for FlipOrchestrator<W, L> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            wallet: self.wallet.clone(),
            ledger: self.ledger.clone(),
            coin: self.coin.clone(),
            phase: self.phase.clone(),
            updates: self.updates.clone(),
        }
    }
}

impl<W: Wallet, L: Ledger> FlipOrchestrator<W, L> {
    pub fn new(
        config: Arc<GameConfig>,
        wallet: Arc<W>,
        ledger: Arc<L>,
        coin: CoinHandle,
        updates: mpsc::UnboundedSender<FlipUpdate>,
    ) -> Self {
        Self {
            config,
            wallet,
            ledger,
            coin,
            phase: Arc::new(Mutex::new(FlipPhase::Idle)),
            updates,
        }
    }

    pub fn phase(&self) -> FlipPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase() != FlipPhase::Idle
    }

    /// Accepts a flip for the current bet and runs it on a spawned task.
    pub fn request_flip(&self, bet: &BetState) -> Result<JoinHandle<()>, FlipRejection> {
        let account = self.wallet.address().ok_or(FlipRejection::NoAccount)?;
        self.begin()?;
        let this = self.clone();
        let (stake, side) = (bet.stake(), bet.side());
        Ok(tokio::spawn(async move { this.run(account, stake, side).await }))
    }

    fn begin(&self) -> Result<(), FlipRejection> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase != FlipPhase::Idle {
            return Err(FlipRejection::InFlight);
        }
        *phase = FlipPhase::Submitting;
        Ok(())
    }

    fn set_phase(&self, next: FlipPhase) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn publish(&self, update: FlipUpdate) {
        let _ = self.updates.send(update);
    }

    async fn run(self, account: Address, stake: u64, side: Side) {
        self.publish(FlipUpdate::Started);

        let request = WagerRequest::new(&self.config, account.clone(), stake, side);
        let hash = match self.wallet.submit(&request).await {
            Ok(hash) => hash,
            Err(err) => return self.abort("wager submission failed", err),
        };
        info!(%hash, stake, %side, "wager submitted");

        let keyframes = self.start_spin();
        self.set_phase(FlipPhase::Spinning);
        self.publish(FlipUpdate::Spinning {
            hash: hash.clone(),
            keyframes,
        });

        let event_type = self.config.flip_event_type();
        let outcome = match self.ledger.event_by_hash(&hash, &event_type).await {
            Ok(outcome) => outcome,
            Err(err) => return self.abort("flip event lookup failed", err),
        };

        if outcome.player != account {
            warn!(%hash, player = %outcome.player, %account, "flip event belongs to another player");
            self.coin.clear();
            self.set_phase(FlipPhase::Idle);
            self.publish(FlipUpdate::Unmatched { hash });
            return;
        }

        self.set_phase(FlipPhase::Settling);
        if let Some(ended) = self.start_settle(outcome.side)
            && ended.await.is_err()
        {
            debug!(%hash, "settle animation was cleared before it finished");
        }

        info!(%hash, side = %outcome.side, won = outcome.won, "flip settled");
        self.set_phase(FlipPhase::Idle);
        self.publish(FlipUpdate::Settled(FlipReport { outcome, stake }));
    }

    /// Starts the open-ended spin. The direction only keeps the rotation
    /// continuous with the face currently showing; it says nothing about the
    /// outcome.
    fn start_spin(&self) -> Keyframes {
        let now = Instant::now();
        let angle = self.coin.current_angle(now);
        let keyframes = if is_settled(angle, 0) {
            Keyframes::Flip
        } else {
            Keyframes::FlipReverse
        };
        debug!(angle, keyframes = keyframes.name(), "spinning coin");
        self.coin
            .play(Animation::spin(keyframes, &self.config.animation, now));
        keyframes
    }

    fn start_settle(&self, side: Side) -> Option<tokio::sync::oneshot::Receiver<()>> {
        let now = Instant::now();
        let settle = self.config.animation.settle;
        self.coin.with(|coin| {
            coin.play(Animation::once(Keyframes::settle_on(side), settle, now));
            coin.on_animation_end()
        })
    }

    fn abort(&self, context: &'static str, err: Report) {
        error!(?err, "{context}");
        self.coin.clear();
        self.set_phase(FlipPhase::Idle);
        self.publish(FlipUpdate::Aborted {
            reason: format!("{context}: {err}"),
        });
    }
}
