//! Media handle abstraction
//!
//! A [`MediaHandle`] is the native playback element the player binds sources
//! to. Implementations push [`MediaEvent`]s into a channel, tagged with the
//! [`SessionId`] the current source was bound under, so events that belong to
//! a torn-down session can be recognised and dropped.

use crate::{Result, SessionId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

/// Lifecycle events emitted by a media handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEvent {
    LoadedMetadata,
    TimeUpdate,
    Play,
    Pause,
    Waiting,
    Playing,
    Ended,
}

/// An event paired with the session that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent<E> {
    pub session: SessionId,
    pub event: E,
}

impl<E> SessionEvent<E> {
    pub fn new(session: SessionId, event: E) -> Self {
        Self { session, event }
    }
}

/// Channel media handles report through
pub type MediaEventSender = mpsc::UnboundedSender<SessionEvent<MediaEvent>>;
pub type MediaEventReceiver = mpsc::UnboundedReceiver<SessionEvent<MediaEvent>>;

/// A buffered time range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Native media element the player drives.
///
/// All methods are called from the player's event loop.
pub trait MediaHandle: Send {
    /// Point the handle at a locator; subsequent events carry `session`
    fn set_source(&mut self, locator: &Url, session: SessionId);

    /// Detach the current source and stop emitting events for it
    fn clear_source(&mut self);

    /// Start playback. May fail with [`crate::Error::AutoplayRejected`]
    /// when the runtime requires a user gesture first.
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    fn current_time(&self) -> f64;

    fn set_current_time(&mut self, time: f64);

    /// Media duration; 0 while unknown
    fn duration(&self) -> f64;

    /// Buffered ranges in ascending order
    fn buffered(&self) -> Vec<TimeRange>;

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);
}

/// Point-in-time readout of a media handle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaSnapshot {
    pub current_time: f64,
    pub duration: f64,
    pub paused: bool,
    pub buffered: Vec<TimeRange>,
}

impl MediaSnapshot {
    pub fn capture(media: &dyn MediaHandle) -> Self {
        let duration = media.duration();
        Self {
            current_time: media.current_time(),
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            paused: media.is_paused(),
            buffered: media.buffered(),
        }
    }

    /// Trailing edge of the buffered-range set
    pub fn buffered_end(&self) -> f64 {
        self.buffered.last().map(|r| r.end).unwrap_or(0.0)
    }
}

/// The container wrapping the media element. Fullscreen is requested on the
/// container so overlay controls stay visible.
pub trait DisplaySurface: Send {
    /// Document-level fullscreen flag
    fn is_fullscreen(&self) -> bool;

    fn request_fullscreen(&mut self) -> Result<()>;

    fn exit_fullscreen(&mut self) -> Result<()>;
}

/// Surface for headless use: fullscreen is a plain flag
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    fullscreen: bool,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySurface for HeadlessSurface {
    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        self.fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        self.fullscreen = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_end_is_trailing_range() {
        let snapshot = MediaSnapshot {
            buffered: vec![TimeRange::new(0.0, 12.0), TimeRange::new(30.0, 48.5)],
            ..Default::default()
        };
        assert_eq!(snapshot.buffered_end(), 48.5);
        assert_eq!(MediaSnapshot::default().buffered_end(), 0.0);
    }

    #[test]
    fn test_headless_surface_toggles() {
        let mut surface = HeadlessSurface::new();
        assert!(!surface.is_fullscreen());
        surface.request_fullscreen().unwrap();
        assert!(surface.is_fullscreen());
        surface.exit_fullscreen().unwrap();
        assert!(!surface.is_fullscreen());
    }
}
