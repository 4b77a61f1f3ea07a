use coinflip_client::{
    bet::Side,
    client::{
        AppController,
        ControllerChannels,
    },
    config::GameConfig,
    ledger::{
        Address,
        FlipOutcome,
    },
    notice::NoticeKind,
    orchestrator::{
        FlipPhase,
        FlipUpdate,
    },
    test_helpers::{
        FakeLedger,
        FakeWallet,
        MemoryPreferences,
    },
    units::parse_amount,
};
use proptest::prelude::*;
use std::sync::Arc;
use tokio::time::{
    self,
    Instant,
};

type Controller = AppController<FakeWallet, FakeLedger, MemoryPreferences>;

struct Session {
    controller: Controller,
    channels: ControllerChannels,
    wallet: FakeWallet,
    ledger: FakeLedger,
    frame: std::time::Duration,
}

fn player() -> Address {
    Address::parse("0x00000000000000000000000000000000000000000000000000000000000a11ce")
        .unwrap()
}

fn start(account: Option<Address>) -> Session {
    let config = Arc::new(GameConfig::default());
    let frame = config.animation.frame;
    let wallet = FakeWallet::new(account);
    let ledger = FakeLedger::default();
    let (controller, channels) = AppController::new(
        config,
        Arc::new(wallet.clone()),
        Arc::new(ledger.clone()),
        MemoryPreferences::default(),
    );
    Session {
        controller,
        channels,
        wallet,
        ledger,
        frame,
    }
}

async fn yield_a_few() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

impl Session {
    /// Renders frames and feeds flip updates back until the flip finishes.
    async fn play_out(&mut self) -> Vec<FlipUpdate> {
        let mut seen = Vec::new();
        loop {
            time::sleep(self.frame).await;
            self.controller.on_frame(Instant::now());
            while let Ok(update) = self.channels.flips.try_recv() {
                seen.push(update.clone());
                self.controller.handle_flip_update(update);
            }
            if matches!(
                seen.last(),
                Some(
                    FlipUpdate::Settled(_)
                        | FlipUpdate::Aborted { .. }
                        | FlipUpdate::Unmatched { .. }
                )
            ) {
                return seen;
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn heads_win__result_notice_and_balance_follow_the_ledger() {
    // given
    let mut session = start(Some(player()));
    session.ledger.set_balance(player(), 100_000_000);
    session.ledger.set_next_outcome(FlipOutcome {
        side: Side::Front,
        won: true,
        // the ledger reports the short form of the same account
        player: Address::parse("0xa11ce").unwrap(),
    });
    let initial = session.channels.balances.recv().await.unwrap();
    session.controller.handle_balance_update(initial);

    // when
    session.controller.flip();
    session.ledger.set_balance(player(), 110_000_000);
    let updates = session.play_out().await;
    let refreshed = session.channels.balances.recv().await.unwrap();
    session.controller.handle_balance_update(refreshed);

    // then
    assert!(matches!(updates.first(), Some(FlipUpdate::Started)));
    assert!(updates
        .iter()
        .any(|u| matches!(u, FlipUpdate::Spinning { .. })));
    let snapshot = session.controller.snapshot(Instant::now());
    assert_eq!(snapshot.result, Some("Heads"));
    assert_eq!(snapshot.phase, FlipPhase::Idle);
    assert_eq!(snapshot.notices.len(), 1);
    assert_eq!(snapshot.notices[0].0, NoticeKind::Win);
    assert!(snapshot.notices[0].1.contains("0.1"));
    assert_eq!(snapshot.balance.as_deref(), Some("balance: 1.1 APT"));
    assert_eq!(snapshot.coin.face, Side::Front);
    let submitted = session.wallet.submitted();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].predict_heads);
    assert_eq!(
        submitted[0].stake_base_units,
        parse_amount("0.1", 8).unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn tails_outcome__coin_lands_on_tails_and_notice_expires() {
    // given
    let mut session = start(Some(player()));
    session.ledger.set_next_outcome(FlipOutcome {
        side: Side::Back,
        won: false,
        player: player(),
    });

    // when
    session.controller.flip();
    session.play_out().await;

    // then
    let snapshot = session.controller.snapshot(Instant::now());
    assert_eq!(snapshot.result, Some("Tails"));
    assert_eq!(snapshot.coin.face, Side::Back);
    assert_eq!(snapshot.notices[0].0, NoticeKind::Loss);

    // when
    time::advance(GameConfig::default().notices.loss).await;
    session.controller.on_frame(Instant::now());

    // then
    assert!(session.controller.notices().is_empty());
    assert_eq!(session.controller.result(), Some("Tails"));
}

#[tokio::test(start_paused = true)]
async fn no_wallet__flip_only_raises_a_notice() {
    // given
    let mut session = start(None);

    // when
    session.controller.flip();
    yield_a_few().await;

    // then
    let snapshot = session.controller.snapshot(Instant::now());
    assert_eq!(snapshot.balance, None);
    assert_eq!(
        snapshot.notices,
        vec![(NoticeKind::Info, "wallet not connected!".to_string())]
    );
    assert_eq!(snapshot.phase, FlipPhase::Idle);
    assert!(session.wallet.submitted().is_empty());
    assert_eq!(session.ledger.balance_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn lookup_failure__session_can_flip_again() {
    // given
    let mut session = start(Some(player()));
    session.ledger.fail_event_lookups("indexer unavailable");

    // when
    session.controller.flip();
    let updates = session.play_out().await;

    // then
    assert!(matches!(updates.last(), Some(FlipUpdate::Aborted { .. })));
    assert!(!session.controller.is_in_flight());
    assert_eq!(session.controller.coin().current_keyframes(), None);

    // when
    session.controller.flip();
    session.play_out().await;

    // then
    assert_eq!(session.wallet.submitted().len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn repeated_flip_presses__submit_one_wager_at_a_time(presses in 1usize..12) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();
        let submitted = runtime.block_on(async {
            let mut session = start(Some(player()));
            session.ledger.set_next_outcome(FlipOutcome {
                side: Side::Front,
                won: true,
                player: player(),
            });
            session.wallet.hold_submissions();
            for _ in 0..presses {
                session.controller.flip();
                tokio::task::yield_now().await;
            }
            yield_a_few().await;
            let while_held = session.wallet.submitted().len();
            session.wallet.release();
            session.play_out().await;
            for _ in 0..presses {
                session.controller.flip();
                tokio::task::yield_now().await;
            }
            yield_a_few().await;
            (while_held, session.wallet.submitted().len())
        });
        prop_assert_eq!(submitted.0, 1);
        prop_assert_eq!(submitted.1, 2);
    }
}
