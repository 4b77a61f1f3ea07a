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
    preferences::PreferenceStore,
};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{
    debug,
    warn,
};

/// Turns the coin to the face the player picked, without placing a wager.
#[derive(Clone)]
pub struct DirectionSwitcher {
    config: Arc<GameConfig>,
    coin: CoinHandle,
}

impl DirectionSwitcher {
    pub fn new(config: Arc<GameConfig>, coin: CoinHandle) -> Self {
        Self { config, coin }
    }

    /// Records the chosen side and, unless a flip owns the coin, rotates the
    /// coin onto that face. Returns the rotation played, if any.
    pub fn select(
        &self,
        bet: &mut BetState,
        prefs: &mut impl PreferenceStore,
        side: Side,
        flip_in_flight: bool,
    ) -> Option<Keyframes> {
        if let Err(err) = bet.set_side(side, prefs) {
            warn!(?err, %side, "failed to persist side preference");
        }
        if flip_in_flight {
            return None;
        }
        self.settle_onto(side)
    }

    /// Brings a freshly mounted coin in line with the persisted side.
    pub fn reconcile_on_mount(&self, side: Side) -> Option<Keyframes> {
        if side == Side::default() {
            return None;
        }
        self.settle_onto(side)
    }

    fn settle_onto(&self, side: Side) -> Option<Keyframes> {
        let now = Instant::now();
        let angle = self.coin.current_angle(now);
        if is_settled(angle, side.settle_offset()) {
            return None;
        }
        let keyframes = Keyframes::switch_to(side);
        debug!(angle, %side, keyframes = keyframes.name(), "switching coin face");
        self.coin.play(Animation::once(
            keyframes,
            self.config.animation.switch,
            now,
        ));
        Some(keyframes)
    }
}
