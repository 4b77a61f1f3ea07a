use coinflip_client::{
    bet::{
        SIDE_PREFERENCE_KEY,
        Side,
    },
    client::{
        AppController,
        ControllerChannels,
    },
    coin::Keyframes,
    config::GameConfig,
    ledger::Address,
    preferences::{
        JsonFilePreferences,
        PreferenceStore,
    },
    test_helpers::{
        FakeLedger,
        FakeWallet,
    },
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use tokio::time::Instant;

fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("coinflip-harness-{}-{name}", std::process::id()))
        .join("preferences.json")
}

type Controller = AppController<FakeWallet, FakeLedger, JsonFilePreferences>;

fn open(path: &Path) -> (Controller, ControllerChannels) {
    AppController::new(
        Arc::new(GameConfig::default()),
        Arc::new(FakeWallet::new(Some(Address::parse("0xa11ce").unwrap()))),
        Arc::new(FakeLedger::default()),
        JsonFilePreferences::open(path).unwrap(),
    )
}

#[tokio::test(start_paused = true)]
async fn side_choice__survives_a_restart_and_turns_the_new_coin() {
    // given
    let path = scratch_file("restart");
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
    let (mut first, _first_channels) = open(&path);
    assert_eq!(first.bet().side(), Side::Front);

    // when
    first.pick_side(Side::Back);
    first.shutdown().await.unwrap();
    let (second, _second_channels) = open(&path);

    // then
    assert_eq!(second.bet().side(), Side::Back);
    assert_eq!(
        second.prefs().get(SIDE_PREFERENCE_KEY).as_deref(),
        Some("Tails")
    );
    assert_eq!(
        second.coin().current_keyframes(),
        Some(Keyframes::FlipSwitchReverse)
    );
    let after_switch = Instant::now() + GameConfig::default().animation.switch;
    assert_eq!(second.snapshot(after_switch).coin.face, Side::Back);
    second.shutdown().await.unwrap();
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[tokio::test(start_paused = true)]
async fn unknown_stored_side__falls_back_to_heads() {
    // given
    let path = scratch_file("unknown");
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
    let mut prefs = JsonFilePreferences::open(&path).unwrap();
    prefs.set(SIDE_PREFERENCE_KEY, "Edge").unwrap();

    // when
    let (controller, _channels) = open(&path);

    // then
    assert_eq!(controller.bet().side(), Side::Front);
    assert_eq!(controller.coin().current_keyframes(), None);
    controller.shutdown().await.unwrap();
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
