use crate::{
    balance::{
        BalancePoller,
        BalanceUpdate,
        BalanceView,
    },
    bet::{
        BetState,
        Side,
        StakeTier,
    },
    coin::CoinHandle,
    config::GameConfig,
    ledger::{
        Ledger,
        Wallet,
    },
    notice::{
        NoticeKind,
        Notices,
    },
    orchestrator::{
        FlipOrchestrator,
        FlipPhase,
        FlipRejection,
        FlipReport,
        FlipUpdate,
    },
    preferences::PreferenceStore,
    switcher::DirectionSwitcher,
    ui,
    units::format_amount,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    time::{
        self,
        Instant,
    },
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

const MAX_ERRORS: usize = 20;

#[derive(Clone, Debug, PartialEq)]
pub struct CoinView {
    /// Visible width of the coin as a fraction of its face-on width.
    pub width_ratio: f64,
    pub face: Side,
    pub moving: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppSnapshot {
    pub balance: Option<String>,
    pub stakes: Vec<String>,
    pub selected_stake: usize,
    pub whale: bool,
    pub side: Side,
    pub coin: CoinView,
    pub result: Option<&'static str>,
    pub notices: Vec<(NoticeKind, String)>,
    pub phase: FlipPhase,
    pub status: String,
    pub errors: Vec<String>,
}

pub struct ControllerChannels {
    pub flips: mpsc::UnboundedReceiver<FlipUpdate>,
    pub balances: mpsc::UnboundedReceiver<BalanceUpdate>,
}

/// Session state behind the game screen: the bet being edited, the coin, the
/// last published result and the transient notices.
pub struct AppController<W, L, P> {
    config: Arc<GameConfig>,
    bet: BetState,
    prefs: P,
    coin: CoinHandle,
    switcher: DirectionSwitcher,
    orchestrator: FlipOrchestrator<W, L>,
    poller: BalancePoller,
    balance: BalanceView,
    notices: Notices,
    result: Option<Side>,
    status: String,
    errors: Vec<String>,
}

impl<W: Wallet, L: Ledger, P: PreferenceStore> AppController<W, L, P> {
    /// Mounts the coin, restores the persisted side and starts the balance
    /// poller. Must be called from within a tokio runtime.
    pub fn new(
        config: Arc<GameConfig>,
        wallet: Arc<W>,
        ledger: Arc<L>,
        prefs: P,
    ) -> (Self, ControllerChannels) {
        let coin = CoinHandle::mounted();
        let bet = BetState::restore(&config, &prefs);
        let switcher = DirectionSwitcher::new(config.clone(), coin.clone());
        switcher.reconcile_on_mount(bet.side());

        let account = wallet.address();
        let (flip_tx, flips) = mpsc::unbounded_channel();
        let (poller, balances) =
            BalancePoller::spawn(&config, ledger.clone(), account.clone());
        let orchestrator =
            FlipOrchestrator::new(config.clone(), wallet, ledger, coin.clone(), flip_tx);

        let controller = Self {
            config,
            bet,
            prefs,
            coin,
            switcher,
            orchestrator,
            poller,
            balance: BalanceView::new(account),
            notices: Notices::default(),
            result: None,
            status: String::from("Ready"),
            errors: Vec::new(),
        };
        (controller, ControllerChannels { flips, balances })
    }

    pub fn bet(&self) -> &BetState {
        &self.bet
    }

    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    pub fn coin(&self) -> &CoinHandle {
        &self.coin
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn result(&self) -> Option<&'static str> {
        self.result.map(Side::label)
    }

    pub fn balance(&self) -> &BalanceView {
        &self.balance
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_in_flight(&self) -> bool {
        self.orchestrator.is_in_flight()
    }

    pub fn select_next_stake(&mut self) {
        self.bet.select_next_stake(&self.config);
    }

    pub fn select_prev_stake(&mut self) {
        self.bet.select_prev_stake(&self.config);
    }

    pub fn toggle_whale(&mut self) {
        let tier = self.bet.tier().toggled();
        self.bet.set_tier(tier, &self.config);
    }

    pub fn pick_side(&mut self, side: Side) {
        let in_flight = self.orchestrator.is_in_flight();
        self.switcher
            .select(&mut self.bet, &mut self.prefs, side, in_flight);
        self.result = None;
    }

    pub fn flip(&mut self) {
        match self.orchestrator.request_flip(&self.bet) {
            Ok(_) => {
                self.notices.dismiss_all();
                self.result = None;
                self.set_status(format!(
                    "Flipping {} {} on {}...",
                    format_amount(self.bet.stake(), self.config.decimals),
                    self.config.coin_ticker,
                    self.bet.side()
                ));
            }
            Err(FlipRejection::NoAccount) => {
                self.notices.push(
                    NoticeKind::Info,
                    "wallet not connected!",
                    self.config.notices.no_wallet,
                    Instant::now(),
                );
            }
            Err(FlipRejection::InFlight) => {
                debug!("flip already in flight; ignoring request");
            }
        }
    }

    pub fn handle_flip_update(&mut self, update: FlipUpdate) {
        match update {
            FlipUpdate::Started => {
                self.result = None;
                self.notices.dismiss_all();
            }
            FlipUpdate::Spinning { hash, .. } => {
                self.set_status(format!(
                    "Waiting for result of {}",
                    hash_preview(&hash.0)
                ));
            }
            FlipUpdate::Settled(report) => self.announce(report),
            FlipUpdate::Unmatched { hash } => {
                info!(%hash, "flip result not available yet");
                self.set_status("Ready");
            }
            FlipUpdate::Aborted { reason } => {
                self.set_status("Flip cancelled");
                self.push_errors(vec![reason]);
            }
        }
    }

    fn announce(&mut self, report: FlipReport) {
        let stake = format_amount(report.stake, self.config.decimals);
        let ticker = &self.config.coin_ticker;
        let (kind, text, lifetime) = if report.outcome.won {
            (
                NoticeKind::Win,
                format!("You won {stake} {ticker} 🎉🎉🎉!"),
                self.config.notices.win,
            )
        } else {
            (
                NoticeKind::Loss,
                format!("You lost {stake} {ticker}!"),
                self.config.notices.loss,
            )
        };
        self.result = Some(report.outcome.side);
        self.notices.push(kind, text, lifetime, Instant::now());
        self.set_status("Ready");
        self.poller.refresh();
    }

    pub fn handle_balance_update(&mut self, update: BalanceUpdate) {
        self.balance.apply(update);
    }

    /// Advances the coin and expires notices. Returns true if a notice
    /// disappeared.
    pub fn on_frame(&mut self, now: Instant) -> bool {
        self.coin.tick(now);
        self.notices.prune(now)
    }

    pub fn snapshot(&self, now: Instant) -> AppSnapshot {
        let stakes = self.bet.stakes(&self.config);
        let transform = self.coin.transform_at(now);
        AppSnapshot {
            balance: self.balance.header(&self.config),
            stakes: stakes
                .iter()
                .map(|stake| format_amount(*stake, self.config.decimals))
                .collect(),
            selected_stake: stakes
                .iter()
                .position(|stake| *stake == self.bet.stake())
                .unwrap_or_default(),
            whale: self.bet.tier() == StakeTier::High,
            side: self.bet.side(),
            coin: CoinView {
                width_ratio: transform.width_ratio(),
                face: transform.visible_side(),
                moving: self.coin.current_keyframes().is_some()
                    && self.orchestrator.is_in_flight(),
            },
            result: self.result(),
            notices: self
                .notices
                .active()
                .iter()
                .map(|notice| (notice.kind, notice.text.clone()))
                .collect(),
            phase: self.orchestrator.phase(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Stops the balance poller and unmounts the coin.
    pub async fn shutdown(self) -> Result<()> {
        self.coin.unmount();
        self.poller.shutdown().await
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }
}

fn hash_preview(hash: &str) -> String {
    let mut preview: String = hash.chars().take(12).collect();
    if hash.chars().nth(12).is_some() {
        preview.push_str("...");
    }
    preview
}

pub async fn run_app<W: Wallet, L: Ledger, P: PreferenceStore>(
    config: Arc<GameConfig>,
    wallet: Arc<W>,
    ledger: Arc<L>,
    prefs: P,
) -> Result<()> {
    let (mut controller, channels) = AppController::new(config, wallet, ledger, prefs);
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut controller, channels, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    controller.shutdown().await?;
    res
}

async fn run_loop<W: Wallet, L: Ledger, P: PreferenceStore>(
    controller: &mut AppController<W, L, P>,
    channels: ControllerChannels,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    let ControllerChannels {
        mut flips,
        mut balances,
    } = channels;
    let mut frames = time::interval(controller.config.animation.frame);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = frames.tick() => {
                let now = Instant::now();
                controller.on_frame(now);
                ui::draw(ui_state, &controller.snapshot(now))
                    .wrap_err("draw on frame tick failed")?;
            }
            Some(update) = flips.recv() => {
                controller.handle_flip_update(update);
            }
            maybe_balance = balances.recv() => {
                match maybe_balance {
                    Some(update) => controller.handle_balance_update(update),
                    None => {
                        warn!("balance poller channel closed");
                        break;
                    }
                }
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let Some(ev) = ui::interpret_event(raw_ev?) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::NextStake => controller.select_next_stake(),
                    ui::UserEvent::PrevStake => controller.select_prev_stake(),
                    ui::UserEvent::ToggleWhale => controller.toggle_whale(),
                    ui::UserEvent::PickSide(side) => controller.pick_side(side),
                    ui::UserEvent::Flip => controller.flip(),
                    ui::UserEvent::Redraw => {}
                }
                ui::draw(ui_state, &controller.snapshot(Instant::now()))
                    .wrap_err("draw after input failed")?;
            }
        }
    }
    Ok(())
}
