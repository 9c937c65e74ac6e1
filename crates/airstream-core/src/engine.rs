//! Playback Engine - binds sources to the media handle
//!
//! Decides between direct playback and an adaptive session from the shape of
//! the locator, owns the session for as long as the source is bound, and
//! relays quality events. Rebinding always destroys the previous session
//! before a new one exists.

use crate::{
    adaptive::{AdaptiveBackend, AdaptiveEvent, AdaptiveEventSender, AdaptiveSession, LevelRequest},
    media::{MediaEvent, MediaHandle, SessionEvent},
    Error, PlaybackSource, QualitySelection, Rendition, Result, SessionId,
};
use tracing::{debug, info, instrument, warn};

/// How the current source is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Direct,
    Adaptive,
}

/// Quality-related change surfaced by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineUpdate {
    /// The ladder became available (selection reset to auto)
    LevelsChanged(Vec<Rendition>),
    /// The session now plays this rendition
    LevelSwitched(usize),
    /// The adaptive session failed
    Failed { message: String, fatal: bool },
}

/// The bound source and the session serving it
struct BoundSession {
    id: SessionId,
    source: PlaybackSource,
    mode: PlaybackMode,
    adaptive: Option<Box<dyn AdaptiveSession>>,
}

/// Playback engine adapter. Owns the media handle exclusively.
pub struct PlaybackEngine {
    media: Box<dyn MediaHandle>,
    backend: Box<dyn AdaptiveBackend>,
    adaptive_events: AdaptiveEventSender,
    session: Option<BoundSession>,
    levels: Vec<Rendition>,
    selection: QualitySelection,
    active_level: Option<usize>,
}

impl PlaybackEngine {
    pub fn new(
        media: Box<dyn MediaHandle>,
        backend: Box<dyn AdaptiveBackend>,
        adaptive_events: AdaptiveEventSender,
    ) -> Self {
        Self {
            media,
            backend,
            adaptive_events,
            session: None,
            levels: Vec::new(),
            selection: QualitySelection::Auto,
            active_level: None,
        }
    }

    /// Bind a source, tearing down whatever was bound before
    #[instrument(skip(self, source), fields(locator = %source.locator))]
    pub fn bind(&mut self, source: PlaybackSource) -> SessionId {
        self.teardown();

        let id = SessionId::new();
        let adaptive = source.is_segmented_manifest() && self.backend.is_supported();

        let session = if adaptive {
            let mut adaptive_session = self.backend.create_session(id, self.adaptive_events.clone());
            adaptive_session.load_source(&source.locator);
            adaptive_session.attach_media(self.media.as_mut());
            info!(session_id = %id, "Bound adaptive session");

            BoundSession {
                id,
                source,
                mode: PlaybackMode::Adaptive,
                adaptive: Some(adaptive_session),
            }
        } else {
            self.media.set_source(&source.locator, id);
            info!(session_id = %id, "Bound direct source");
            self.start_playback();

            BoundSession {
                id,
                source,
                mode: PlaybackMode::Direct,
                adaptive: None,
            }
        };

        self.session = Some(session);
        id
    }

    /// Destroy the bound session, if any
    pub fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Some(mut adaptive) = session.adaptive.take() {
                adaptive.destroy();
            }
            self.media.clear_source();
            debug!(session_id = %session.id, "Session torn down");
        }
        self.levels.clear();
        self.selection = QualitySelection::Auto;
        self.active_level = None;
    }

    /// Best-effort play: a rejected autoplay leaves the handle paused
    pub fn start_playback(&mut self) {
        match self.media.play() {
            Ok(()) => {}
            Err(e) if e.is_expected() => {
                debug!(error = %e, "Autoplay rejected, waiting for user gesture");
            }
            Err(e) => {
                warn!(error = %e, "Playback start failed");
            }
        }
    }

    /// True when `event` belongs to the bound session
    pub fn is_current<E>(&self, event: &SessionEvent<E>) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == event.session)
    }

    /// Filter a media event, dropping those from torn-down sessions
    pub fn accept_media_event(&self, event: SessionEvent<MediaEvent>) -> Option<MediaEvent> {
        if self.is_current(&event) {
            Some(event.event)
        } else {
            debug!(session_id = %event.session, event = ?event.event, "Dropping stale media event");
            None
        }
    }

    /// Apply an adaptive session event
    pub fn handle_adaptive_event(&mut self, event: SessionEvent<AdaptiveEvent>) -> Option<EngineUpdate> {
        if !self.is_current(&event) {
            debug!(session_id = %event.session, "Dropping stale adaptive event");
            return None;
        }

        match event.event {
            AdaptiveEvent::ManifestParsed { levels } => {
                info!(levels = levels.len(), "Manifest parsed");
                self.levels = levels.clone();
                self.selection = QualitySelection::Auto;
                self.start_playback();
                Some(EngineUpdate::LevelsChanged(levels))
            }
            AdaptiveEvent::LevelSwitched { level } => {
                debug!(level, "Level switched");
                self.active_level = Some(level);
                Some(EngineUpdate::LevelSwitched(level))
            }
            AdaptiveEvent::Error { message, fatal } => {
                warn!(%message, fatal, "Adaptive session error");
                Some(EngineUpdate::Failed { message, fatal })
            }
        }
    }

    /// Select auto mode or pin a rendition
    pub fn set_quality(&mut self, selection: QualitySelection) -> Result<()> {
        let session = self.session.as_mut().ok_or(Error::NoSession)?;
        let Some(adaptive) = session.adaptive.as_mut() else {
            return Err(Error::AdaptiveUnsupported);
        };

        let request = match selection {
            QualitySelection::Auto => LevelRequest::Auto,
            QualitySelection::Pinned(index) => {
                if index >= self.levels.len() {
                    return Err(Error::QualityUnavailable {
                        index,
                        available: self.levels.len(),
                    });
                }
                LevelRequest::Fixed(index)
            }
        };

        adaptive.set_level(request);
        self.selection = selection;
        info!(selection = %selection, "Quality selection changed");
        Ok(())
    }

    pub fn levels(&self) -> &[Rendition] {
        &self.levels
    }

    pub fn selection(&self) -> QualitySelection {
        self.selection
    }

    pub fn active_level(&self) -> Option<usize> {
        self.active_level
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn source(&self) -> Option<&PlaybackSource> {
        self.session.as_ref().map(|s| &s.source)
    }

    pub fn mode(&self) -> Option<PlaybackMode> {
        self.session.as_ref().map(|s| s.mode)
    }

    pub fn has_adaptive_session(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.adaptive.is_some())
    }

    pub fn media(&self) -> &dyn MediaHandle {
        self.media.as_ref()
    }

    pub fn media_mut(&mut self) -> &mut dyn MediaHandle {
        self.media.as_mut()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
