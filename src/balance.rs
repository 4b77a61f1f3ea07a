use crate::{
    config::GameConfig,
    ledger::{
        Address,
        Ledger,
    },
    units::format_amount,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BalanceCommand {
    FetchNow,
    Shutdown,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BalanceUpdate {
    pub account: Address,
    pub base_units: u64,
}

/// Polls the spendable balance of the session's account. Fetches once on
/// start, on every tick of `poll_interval` and on `FetchNow`. Without an
/// account it idles until shut down.
pub async fn balance_worker<L: Ledger>(
    poll_interval: Duration,
    ledger: Arc<L>,
    coin_type: String,
    account: Option<Address>,
    mut cmd_rx: mpsc::UnboundedReceiver<BalanceCommand>,
    update_tx: mpsc::UnboundedSender<BalanceUpdate>,
) -> Result<()> {
    async fn fetch_balance<L: Ledger>(
        ledger: &L,
        coin_type: &str,
        account: &Address,
        update_tx: &mpsc::UnboundedSender<BalanceUpdate>,
    ) -> Result<()> {
        let base_units = ledger.balance(account, coin_type).await?;
        debug!(%account, base_units, "balance fetched");
        update_tx
            .send(BalanceUpdate {
                account: account.clone(),
                base_units,
            })
            .map_err(|_| eyre!("balance receiver dropped"))?;
        Ok(())
    }

    async fn refresh<L: Ledger>(
        ledger: &L,
        coin_type: &str,
        account: Option<&Address>,
        update_tx: &mpsc::UnboundedSender<BalanceUpdate>,
    ) {
        let Some(account) = account else {
            return;
        };
        if let Err(err) = fetch_balance(ledger, coin_type, account, update_tx).await
            && !update_tx.is_closed()
        {
            warn!(?err, %account, "balance fetch failed");
        }
    }

    // the first tick completes immediately and doubles as the mount fetch
    let mut ticker = time::interval(poll_interval);
    while !update_tx.is_closed() {
        tokio::select! {
            _ = ticker.tick() => {
                refresh(&*ledger, &coin_type, account.as_ref(), &update_tx).await;
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                match cmd {
                    BalanceCommand::FetchNow => {
                        refresh(&*ledger, &coin_type, account.as_ref(), &update_tx).await;
                    }
                    BalanceCommand::Shutdown => break,
                }
            }
        }
    }
    info!("balance poller stopped");
    Ok(())
}

/// Handle to a spawned [`balance_worker`].
pub struct BalancePoller {
    commands: mpsc::UnboundedSender<BalanceCommand>,
    handle: JoinHandle<Result<()>>,
}

impl BalancePoller {
    pub fn spawn<L: Ledger>(
        config: &GameConfig,
        ledger: Arc<L>,
        account: Option<Address>,
    ) -> (Self, mpsc::UnboundedReceiver<BalanceUpdate>) {
        let (commands, cmd_rx) = mpsc::unbounded_channel();
        let (update_tx, updates) = mpsc::unbounded_channel();
        let handle = tokio::spawn(balance_worker(
            config.balance_poll_interval,
            ledger,
            config.coin_type.clone(),
            account,
            cmd_rx,
            update_tx,
        ));
        (Self { commands, handle }, updates)
    }

    pub fn refresh(&self) {
        let _ = self.commands.send(BalanceCommand::FetchNow);
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(BalanceCommand::Shutdown);
        self.handle
            .await
            .map_err(|err| eyre!("balance poller panicked: {err}"))?
    }
}

/// The balance shown for the connected account.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BalanceView {
    account: Option<Address>,
    base_units: Option<u64>,
}

impl BalanceView {
    pub fn new(account: Option<Address>) -> Self {
        Self {
            account,
            base_units: None,
        }
    }

    pub fn base_units(&self) -> Option<u64> {
        self.base_units
    }

    /// Returns false when the update belongs to another account.
    pub fn apply(&mut self, update: BalanceUpdate) -> bool {
        if self.account.as_ref() != Some(&update.account) {
            debug!(account = %update.account, "discarding stale balance update");
            return false;
        }
        self.base_units = Some(update.base_units);
        true
    }

    /// Header text, or `None` when no wallet is connected.
    pub fn header(&self, config: &GameConfig) -> Option<String> {
        self.account.as_ref()?;
        let amount = self
            .base_units
            .map(|units| format_amount(units, config.decimals))
            .unwrap_or_else(|| "-".to_string());
        Some(format!("balance: {} {}", amount, config.coin_ticker))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::FakeLedger;

    fn alice() -> Address {
        Address::parse("0xa11ce").unwrap()
    }

    fn bob() -> Address {
        Address::parse("0xb0b").unwrap()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poller__fetches_on_start_and_every_interval() {
        // given
        let config = GameConfig::default();
        let ledger = Arc::new(FakeLedger::default());
        ledger.set_balance(alice(), 150_000_000);

        // when
        let (poller, mut updates) =
            BalancePoller::spawn(&config, ledger.clone(), Some(alice()));
        let first = updates.recv().await.unwrap();

        // then
        assert_eq!(first.base_units, 150_000_000);
        assert_eq!(ledger.balance_calls(), 1);

        // when
        ledger.set_balance(alice(), 90_000_000);
        time::sleep(config.balance_poll_interval).await;
        let second = updates.recv().await.unwrap();

        // then
        assert_eq!(second.base_units, 90_000_000);
        assert_eq!(ledger.balance_calls(), 2);
        poller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn poller__fetch_now_refreshes_before_the_tick() {
        // given
        let config = GameConfig::default();
        let ledger = Arc::new(FakeLedger::default());
        ledger.set_balance(alice(), 1);
        let (poller, mut updates) =
            BalancePoller::spawn(&config, ledger.clone(), Some(alice()));
        updates.recv().await.unwrap();

        // when
        ledger.set_balance(alice(), 2);
        poller.refresh();
        let update = updates.recv().await.unwrap();

        // then
        assert_eq!(update.base_units, 2);
        assert_eq!(ledger.balance_calls(), 2);
        poller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn poller__failed_fetch_publishes_nothing_and_keeps_running() {
        // given
        let config = GameConfig::default();
        let ledger = Arc::new(FakeLedger::default());
        ledger.fail_balance_queries(true);
        let (poller, mut updates) =
            BalancePoller::spawn(&config, ledger.clone(), Some(alice()));
        settle().await;

        // then
        assert!(updates.try_recv().is_err());
        assert_eq!(ledger.balance_calls(), 1);

        // when
        ledger.fail_balance_queries(false);
        ledger.set_balance(alice(), 42);
        time::sleep(config.balance_poll_interval).await;

        // then
        assert_eq!(updates.recv().await.unwrap().base_units, 42);
        poller.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn poller__without_account_never_queries() {
        // given
        let config = GameConfig::default();
        let ledger = Arc::new(FakeLedger::default());
        let (poller, mut updates) = BalancePoller::spawn(&config, ledger.clone(), None);

        // when
        poller.refresh();
        time::sleep(config.balance_poll_interval * 2).await;
        settle().await;

        // then
        assert_eq!(ledger.balance_calls(), 0);
        assert!(updates.try_recv().is_err());
        poller.shutdown().await.unwrap();
    }

    #[test]
    fn view__discards_updates_for_other_accounts() {
        // given
        let mut view = BalanceView::new(Some(alice()));

        // when
        let applied = view.apply(BalanceUpdate {
            account: bob(),
            base_units: 5,
        });

        // then
        assert!(!applied);
        assert_eq!(view.base_units(), None);
    }

    #[test]
    fn view__header_formats_human_amount() {
        let config = GameConfig::default();
        let mut view = BalanceView::new(Some(alice()));
        assert_eq!(view.header(&config).as_deref(), Some("balance: - APT"));

        view.apply(BalanceUpdate {
            account: alice(),
            base_units: 123_450_000,
        });
        assert_eq!(
            view.header(&config).as_deref(),
            Some("balance: 1.2345 APT")
        );

        assert_eq!(BalanceView::new(None).header(&config), None);
    }
}
