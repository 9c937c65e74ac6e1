//! Up-next continuation countdown
//!
//! Armed at end of media when the host has a next item. Ticks once per
//! second; reaching zero advances exactly once. The user may cancel or skip
//! the wait. A manual selection disarms it.

use crate::{config::PlayerConfig, PlaybackSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

const TICK: Duration = Duration::from_secs(1);

/// The item the countdown will advance to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationTarget {
    pub item_id: String,
    pub source: PlaybackSource,
}

/// Controller state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    Idle,
    Armed {
        remaining: u32,
        target: ContinuationTarget,
    },
}

/// Observable view of the countdown overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationState {
    pub visible: bool,
    pub remaining_seconds: u32,
    pub target: Option<ContinuationTarget>,
}

/// Up-next countdown controller
#[derive(Debug)]
pub struct ContinuationController {
    state: Continuation,
    countdown: u32,
    enabled: bool,
    next_tick: Option<Instant>,
}

impl ContinuationController {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            state: Continuation::Idle,
            countdown: config.countdown_seconds.max(1),
            enabled: config.continuation_enabled,
            next_tick: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn auto-advance on or off. Turning it off disarms.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.disarm();
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, Continuation::Armed { .. })
    }

    pub fn current(&self) -> &Continuation {
        &self.state
    }

    pub fn state(&self) -> ContinuationState {
        match &self.state {
            Continuation::Idle => ContinuationState {
                visible: false,
                remaining_seconds: 0,
                target: None,
            },
            Continuation::Armed { remaining, target } => ContinuationState {
                visible: true,
                remaining_seconds: *remaining,
                target: Some(target.clone()),
            },
        }
    }

    /// Arm at end of media. Returns false when there is nothing to advance
    /// to or continuation is disabled. Re-arming restarts the countdown.
    pub fn arm(&mut self, target: Option<ContinuationTarget>, now: Instant) -> bool {
        let Some(target) = target else {
            debug!("No next item, countdown not armed");
            return false;
        };
        if !self.enabled {
            debug!("Continuation disabled, countdown not armed");
            return false;
        }

        info!(item_id = %target.item_id, seconds = self.countdown, "Up-next countdown armed");
        self.state = Continuation::Armed {
            remaining: self.countdown,
            target,
        };
        self.next_tick = Some(now + TICK);
        true
    }

    /// One second elapsed. Yields the target when the countdown hits zero.
    pub fn tick(&mut self) -> Option<ContinuationTarget> {
        let Continuation::Armed { remaining, .. } = &mut self.state else {
            return None;
        };

        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return None;
        }

        self.next_tick = None;
        match std::mem::replace(&mut self.state, Continuation::Idle) {
            Continuation::Armed { target, .. } => {
                info!(item_id = %target.item_id, "Countdown elapsed, advancing");
                Some(target)
            }
            Continuation::Idle => None,
        }
    }

    /// Next countdown tick, while armed
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Fire every tick due by `now`
    pub fn poll(&mut self, now: Instant) -> Option<ContinuationTarget> {
        while let Some(deadline) = self.next_tick.filter(|d| *d <= now) {
            self.next_tick = Some(deadline + TICK);
            if let Some(target) = self.tick() {
                return Some(target);
            }
        }
        None
    }

    /// User dismissed the overlay
    pub fn cancel(&mut self) {
        if self.is_armed() {
            info!("Up-next countdown cancelled");
        }
        self.disarm();
    }

    /// User chose to advance without waiting
    pub fn play_now(&mut self) -> Option<ContinuationTarget> {
        self.next_tick = None;
        match std::mem::replace(&mut self.state, Continuation::Idle) {
            Continuation::Armed { target, .. } => {
                info!(item_id = %target.item_id, "Advancing immediately");
                Some(target)
            }
            Continuation::Idle => None,
        }
    }

    /// Back to idle without advancing
    pub fn disarm(&mut self) {
        self.state = Continuation::Idle;
        self.next_tick = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> ContinuationController {
        ContinuationController::new(&PlayerConfig::default())
    }

    fn target(id: &str) -> ContinuationTarget {
        ContinuationTarget {
            item_id: id.to_string(),
            source: PlaybackSource::parse(&format!("https://cdn.example.com/{}.mp4", id), id).unwrap(),
        }
    }

    #[test]
    fn test_advances_exactly_once_after_five_ticks() {
        let mut c = controller();
        assert!(c.arm(Some(target("b")), Instant::now()));
        assert_eq!(c.state().remaining_seconds, 5);

        for expected in [4, 3, 2, 1] {
            assert_eq!(c.tick(), None);
            assert_eq!(c.state().remaining_seconds, expected);
        }
        assert_eq!(c.tick().map(|t| t.item_id), Some("b".to_string()));
        assert!(!c.is_armed());
        assert_eq!(c.tick(), None);
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn test_cancel_mid_countdown_never_advances() {
        let mut c = controller();
        c.arm(Some(target("b")), Instant::now());
        c.tick();
        c.tick();
        assert_eq!(c.state().remaining_seconds, 3);

        c.cancel();
        assert!(!c.state().visible);
        for _ in 0..10 {
            assert_eq!(c.tick(), None);
        }
    }

    #[test]
    fn test_rearm_resets_countdown() {
        let mut c = controller();
        let now = Instant::now();
        c.arm(Some(target("b")), now);
        c.tick();
        c.tick();
        c.arm(Some(target("c")), now);

        let state = c.state();
        assert_eq!(state.remaining_seconds, 5);
        assert_eq!(state.target.unwrap().item_id, "c");
    }

    #[test]
    fn test_no_target_or_disabled_does_not_arm() {
        let mut c = controller();
        assert!(!c.arm(None, Instant::now()));
        assert!(!c.is_armed());

        c.set_enabled(false);
        assert!(!c.arm(Some(target("b")), Instant::now()));
        assert_eq!(c.state(), ContinuationState { visible: false, remaining_seconds: 0, target: None });
    }

    #[test]
    fn test_play_now_advances_immediately() {
        let mut c = controller();
        assert_eq!(c.play_now(), None);

        c.arm(Some(target("b")), Instant::now());
        assert_eq!(c.play_now().map(|t| t.item_id), Some("b".to_string()));
        assert!(!c.is_armed());
        assert_eq!(c.tick(), None);
    }

    #[test]
    fn test_disabling_disarms() {
        let mut c = controller();
        c.arm(Some(target("b")), Instant::now());
        c.set_enabled(false);
        assert!(!c.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_follows_one_second_deadlines() {
        let mut c = controller();
        let start = Instant::now();
        c.arm(Some(target("b")), start);
        assert_eq!(c.next_deadline(), Some(start + Duration::from_secs(1)));

        assert_eq!(c.poll(start + Duration::from_millis(999)), None);
        assert_eq!(c.state().remaining_seconds, 5);

        assert_eq!(c.poll(start + Duration::from_secs(3)), None);
        assert_eq!(c.state().remaining_seconds, 2);

        let advanced = c.poll(start + Duration::from_secs(5));
        assert_eq!(advanced.map(|t| t.item_id), Some("b".to_string()));
        assert_eq!(c.next_deadline(), None);
    }
}
