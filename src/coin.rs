//! The rendered coin: a keyframe animation model that yields the coin's
//! transform at any instant, plus the angle reader that decides which face is
//! showing by reading that transform back.
//!
//! Nothing here stores "the current face". Every decision re-derives it from
//! the live transform so the visual and the logic cannot drift apart.

use crate::{
    bet::Side,
    config::AnimationTiming,
};
use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::oneshot,
    time::Instant,
};

/// Rotation of the coin about its vertical axis as a 4x4 matrix, row-major,
/// `m[r][c]` being `m{r+1}{c+1}`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    m: [[f64; 4]; 4],
}

impl Transform {
    pub fn identity() -> Self {
        Self::rotate_y(0.0)
    }

    pub fn rotate_y(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self {
            m: [
                [c, 0.0, -s, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [s, 0.0, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn m11(&self) -> f64 {
        self.m[0][0]
    }

    pub fn m21(&self) -> f64 {
        self.m[1][0]
    }

    /// Projected width of the coin face, 1.0 when facing the viewer.
    pub fn width_ratio(&self) -> f64 {
        self.m11().abs()
    }

    pub fn visible_side(&self) -> Side {
        if self.m11() >= 0.0 { Side::Front } else { Side::Back }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Keyframes {
    /// Open-ended forward spin starting from heads.
    Flip,
    /// Open-ended spin starting from tails.
    FlipReverse,
    /// Terminating spin landing on heads.
    Flip2,
    /// Terminating spin landing on tails.
    FlipReverse2,
    FlipSwitch,
    FlipSwitchReverse,
}

impl Keyframes {
    fn from_to(self) -> (f64, f64) {
        match self {
            Keyframes::Flip => (0.0, 1800.0),
            Keyframes::FlipReverse => (180.0, 1980.0),
            Keyframes::Flip2 => (0.0, 1440.0),
            Keyframes::FlipReverse2 => (180.0, 1620.0),
            Keyframes::FlipSwitch => (180.0, 360.0),
            Keyframes::FlipSwitchReverse => (0.0, 180.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Keyframes::Flip => "flip",
            Keyframes::FlipReverse => "flipReverse",
            Keyframes::Flip2 => "flip2",
            Keyframes::FlipReverse2 => "flipReverse2",
            Keyframes::FlipSwitch => "flipSwitch",
            Keyframes::FlipSwitchReverse => "flipSwitchReverse",
        }
    }

    /// Terminating animation that comes to rest on `side`.
    pub fn settle_on(side: Side) -> Self {
        match side {
            Side::Front => Keyframes::Flip2,
            Side::Back => Keyframes::FlipReverse2,
        }
    }

    pub fn switch_to(side: Side) -> Self {
        match side {
            Side::Front => Keyframes::FlipSwitch,
            Side::Back => Keyframes::FlipSwitchReverse,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Iterations {
    Once,
    Infinite,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Animation {
    pub keyframes: Keyframes,
    pub duration: Duration,
    pub iterations: Iterations,
    started_at: Instant,
    ended: bool,
}

impl Animation {
    pub fn spin(keyframes: Keyframes, timing: &AnimationTiming, now: Instant) -> Self {
        Self::new(keyframes, timing.spin_period, Iterations::Infinite, now)
    }

    pub fn once(keyframes: Keyframes, duration: Duration, now: Instant) -> Self {
        Self::new(keyframes, duration, Iterations::Once, now)
    }

    fn new(
        keyframes: Keyframes,
        duration: Duration,
        iterations: Iterations,
        now: Instant,
    ) -> Self {
        Self {
            keyframes,
            duration,
            iterations,
            started_at: now,
            ended: false,
        }
    }

    fn ends_at(&self) -> Option<Instant> {
        match self.iterations {
            Iterations::Once => Some(self.started_at + self.duration),
            Iterations::Infinite => None,
        }
    }

    fn angle_at(&self, now: Instant) -> f64 {
        let (from, to) = self.keyframes.from_to();
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let period = self.duration.as_secs_f64();
        if period <= 0.0 {
            return to;
        }
        let progress = match self.iterations {
            Iterations::Infinite => (elapsed / period).fract(),
            // One-shot animations fill forwards: hold the last frame.
            Iterations::Once => ease_out((elapsed / period).min(1.0)),
        };
        from + (to - from) * progress
    }
}

fn ease_out(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

/// Coin element state: the animation currently applied (if any) and the
/// listeners waiting for the next one-shot animation to finish.
#[derive(Debug, Default)]
pub struct Coin {
    animation: Option<Animation>,
    end_listeners: Vec<oneshot::Sender<()>>,
}

impl Coin {
    pub fn play(&mut self, animation: Animation) {
        self.animation = Some(animation);
    }

    /// Back to the element's default style. Pending end listeners are dropped.
    pub fn clear(&mut self) {
        self.animation = None;
        self.end_listeners.clear();
    }

    pub fn transform_at(&self, now: Instant) -> Transform {
        match &self.animation {
            Some(animation) => Transform::rotate_y(animation.angle_at(now)),
            None => Transform::identity(),
        }
    }

    /// Single-fire completion signal for the next one-shot animation to end.
    pub fn on_animation_end(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.end_listeners.push(tx);
        rx
    }

    /// Advances the clock. Returns true when a one-shot animation finished
    /// during this tick, in which case every listener has been signalled
    /// and deregistered.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation.as_mut() else {
            return false;
        };
        let finished = !animation.ended
            && animation.ends_at().is_some_and(|end| now >= end);
        if !finished {
            return false;
        }
        animation.ended = true;
        for listener in self.end_listeners.drain(..) {
            let _ = listener.send(());
        }
        true
    }
}

/// Reads the rotation of a transform in whole degrees.
pub fn angle_of(transform: &Transform) -> i32 {
    transform.m21().atan2(transform.m11()).to_degrees().round() as i32
}

/// Whether `angle` rests on the face selected by `offset` (0 for heads, 180
/// for tails).
pub fn is_settled(angle: i32, offset: i32) -> bool {
    (angle + offset).rem_euclid(360) == 0
}

/// Shared handle to the coin element. The element may not be mounted yet, in
/// which case reads see the default angle and writes are dropped.
#[derive(Clone, Debug, Default)]
pub struct CoinHandle {
    inner: Arc<Mutex<Option<Coin>>>,
}

impl CoinHandle {
    pub fn mounted() -> Self {
        let handle = Self::default();
        handle.mount();
        handle
    }

    pub fn mount(&self) {
        let mut guard = self.lock();
        if guard.is_none() {
            *guard = Some(Coin::default());
        }
    }

    pub fn unmount(&self) {
        *self.lock() = None;
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Coin) -> R) -> Option<R> {
        self.lock().as_mut().map(f)
    }

    /// Current rotation read from the rendered transform, 0 when unmounted.
    pub fn current_angle(&self, now: Instant) -> i32 {
        self.with(|coin| angle_of(&coin.transform_at(now)))
            .unwrap_or(0)
    }

    pub fn transform_at(&self, now: Instant) -> Transform {
        self.with(|coin| coin.transform_at(now))
            .unwrap_or_else(Transform::identity)
    }

    pub fn tick(&self, now: Instant) -> bool {
        self.with(|coin| coin.tick(now)).unwrap_or(false)
    }

    pub fn play(&self, animation: Animation) {
        self.with(|coin| coin.play(animation));
    }

    pub fn clear(&self) {
        self.with(Coin::clear);
    }

    pub fn current_keyframes(&self) -> Option<Keyframes> {
        self.with(|coin| coin.animation.map(|a| a.keyframes))
            .flatten()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Coin>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    fn timing() -> AnimationTiming {
        AnimationTiming::default()
    }

    #[test]
    fn angle_of__reads_zero_or_half_turn_from_face() {
        assert_eq!(angle_of(&Transform::rotate_y(0.0)), 0);
        assert_eq!(angle_of(&Transform::rotate_y(360.0)), 0);
        assert_eq!(angle_of(&Transform::rotate_y(180.0)), 180);
        assert_eq!(angle_of(&Transform::rotate_y(1620.0)), 180);
    }

    #[test]
    fn is_settled__matches_heads_and_tails_offsets() {
        assert!(is_settled(0, 0));
        assert!(!is_settled(180, 0));
        assert!(is_settled(180, 180));
        assert!(is_settled(-180, 180));
        assert!(!is_settled(0, 180));
        assert!(!is_settled(90, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn tick__fires_end_listener_once_for_one_shot_animation() {
        // given
        let mut coin = Coin::default();
        let start = Instant::now();
        coin.play(Animation::once(Keyframes::Flip2, timing().settle, start));
        let mut rx = coin.on_animation_end();

        // when
        let early = coin.tick(start + Duration::from_millis(500));
        let at_end = coin.tick(start + timing().settle);
        let after = coin.tick(start + timing().settle * 2);

        // then
        assert!(!early);
        assert!(at_end);
        assert!(!after);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn tick__infinite_spin_never_ends() {
        let mut coin = Coin::default();
        let start = Instant::now();
        coin.play(Animation::spin(Keyframes::Flip, &timing(), start));
        let mut rx = coin.on_animation_end();

        assert!(!coin.tick(start + Duration::from_secs(60)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn listener__carries_over_to_replacement_and_is_dropped_on_clear() {
        // given
        let mut coin = Coin::default();
        let start = Instant::now();
        coin.play(Animation::spin(Keyframes::Flip, &timing(), start));
        let mut carried = coin.on_animation_end();

        // when
        coin.play(Animation::once(Keyframes::FlipReverse2, timing().settle, start));
        coin.tick(start + timing().settle);

        // then
        assert!(carried.try_recv().is_ok());

        // given
        let mut dropped = coin.on_animation_end();

        // when
        coin.clear();

        // then
        assert!(matches!(
            dropped.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_animation__rests_on_requested_face() {
        for side in [Side::Front, Side::Back] {
            // given
            let mut coin = Coin::default();
            let start = Instant::now();

            // when
            coin.play(Animation::once(Keyframes::settle_on(side), timing().settle, start));
            let rest = coin.transform_at(start + timing().settle + Duration::from_secs(5));

            // then
            assert_eq!(rest.visible_side(), side);
            assert!(is_settled(angle_of(&rest), side.settle_offset()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn handle__unmounted_coin_reads_zero_and_ignores_writes() {
        // given
        let handle = CoinHandle::default();
        let now = Instant::now();

        // when
        handle.play(Animation::once(Keyframes::FlipSwitchReverse, timing().switch, now));

        // then
        assert_eq!(handle.current_angle(now + Duration::from_secs(2)), 0);
        assert_eq!(handle.current_keyframes(), None);
        assert!(!handle.tick(now + Duration::from_secs(2)));
    }

    proptest! {
        #[test]
        fn is_settled__is_periodic_in_full_turns(angle in -100_000i32..100_000, offset in prop_oneof![Just(0), Just(180)]) {
            prop_assert_eq!(is_settled(angle, offset), is_settled(angle + 360, offset));
            prop_assert_eq!(is_settled(angle, offset), is_settled(angle - 360, offset));
        }
    }
}
