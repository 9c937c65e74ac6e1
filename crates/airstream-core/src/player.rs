//! Player - engine, transport controls and display surface composed
//!
//! The player is the component a host embeds. It takes a
//! [`PlaybackSource`] and reports back through [`PlayerNotice`]s, which a
//! host consumes directly or through the [`PlayerCallbacks`] trait. It never
//! touches the playlist or any persisted state.

use crate::{
    adaptive::{AdaptiveBackend, AdaptiveEvent, AdaptiveEventSender},
    config::PlayerConfig,
    engine::PlaybackEngine,
    input::{KeyInput, PointerInput},
    media::{DisplaySurface, MediaEvent, MediaHandle, MediaSnapshot, SessionEvent},
    transport::{PreviewFrame, TransportAction, TransportControls, TransportState},
    PlaybackSource, QualitySelection, Result, SessionId,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Product name used in window titles
pub const APP_NAME: &str = "AIrStream";

/// Something the embedding host needs to hear about
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerNotice {
    /// Playback position, at the handle's native update cadence
    Progress { current_time: f64, duration: f64 },
    /// The player entered or left fullscreen
    FullscreenChanged(bool),
    /// The media reached its end
    Ended,
}

/// Host-side receiver of player notices
pub trait PlayerCallbacks {
    fn on_progress(&mut self, current_time: f64, duration: f64);

    fn on_fullscreen_change(&mut self, fullscreen: bool);

    fn on_ended(&mut self);
}

impl PlayerNotice {
    /// Deliver this notice to a callbacks implementation
    pub fn dispatch<C: PlayerCallbacks + ?Sized>(self, callbacks: &mut C) {
        match self {
            PlayerNotice::Progress { current_time, duration } => callbacks.on_progress(current_time, duration),
            PlayerNotice::FullscreenChanged(fullscreen) => callbacks.on_fullscreen_change(fullscreen),
            PlayerNotice::Ended => callbacks.on_ended(),
        }
    }
}

/// Embeddable video player
pub struct Player {
    engine: PlaybackEngine,
    transport: TransportControls,
    surface: Box<dyn DisplaySurface>,
    state_tx: watch::Sender<TransportState>,
}

impl Player {
    pub fn new(
        config: &PlayerConfig,
        media: Box<dyn MediaHandle>,
        backend: Box<dyn AdaptiveBackend>,
        surface: Box<dyn DisplaySurface>,
        adaptive_events: AdaptiveEventSender,
    ) -> Result<Self> {
        config.validate()?;
        let transport = TransportControls::new(config);
        let (state_tx, _) = watch::channel(transport.state().clone());

        let mut player = Self {
            engine: PlaybackEngine::new(media, backend, adaptive_events),
            transport,
            surface,
            state_tx,
        };
        player.sync_volume();
        Ok(player)
    }

    /// Current transport state
    pub fn state(&self) -> &TransportState {
        self.transport.state()
    }

    /// Subscribe to transport state changes
    pub fn subscribe(&self) -> watch::Receiver<TransportState> {
        self.state_tx.subscribe()
    }

    pub fn source(&self) -> Option<&PlaybackSource> {
        self.engine.source()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.engine.session_id()
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Title for the hosting window
    pub fn window_title(&self) -> String {
        match self.engine.source() {
            Some(source) if !source.display_title.is_empty() => {
                format!("{} \u{2013} {}", source.display_title, APP_NAME)
            }
            _ => format!("{} \u{2013} Video Player", APP_NAME),
        }
    }

    /// Bind a source. Loading the locator that is already bound is a no-op.
    pub fn load(&mut self, source: PlaybackSource) -> SessionId {
        if let (Some(id), Some(current)) = (self.engine.session_id(), self.engine.source()) {
            if current.locator == source.locator {
                debug!(session_id = %id, "Source already bound");
                return id;
            }
        }

        info!(title = %source.display_title, locator = %source.locator, "Loading source");
        self.transport.reset_for_source();
        let id = self.engine.bind(source);
        self.sync_volume();
        self.publish();
        id
    }

    /// Tear the session down and cancel pending timers
    pub fn unload(&mut self) {
        self.engine.teardown();
        self.transport.reset_for_source();
        self.transport.cancel_timers();
        self.publish();
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub fn handle_media_event(&mut self, event: SessionEvent<MediaEvent>) -> Option<PlayerNotice> {
        let event = self.engine.accept_media_event(event)?;
        let snapshot = self.snapshot();
        let notice = self.transport.on_media_event(event, &snapshot);
        self.publish();
        notice
    }

    pub fn handle_adaptive_event(&mut self, event: SessionEvent<AdaptiveEvent>) {
        if let Some(update) = self.engine.handle_adaptive_event(event) {
            self.transport.on_engine_update(&update);
            self.publish();
        }
    }

    pub fn pointer(&mut self, input: PointerInput, now: Instant) -> Vec<PlayerNotice> {
        let snapshot = self.snapshot();
        let action = match input {
            PointerInput::Move => {
                self.transport.pointer_moved(now);
                None
            }
            PointerInput::EnterControls => {
                self.transport.enter_controls();
                None
            }
            PointerInput::LeaveControls => {
                self.transport.leave_controls(now);
                None
            }
            PointerInput::Activate { x_fraction } => self.transport.activate(x_fraction, now, &snapshot),
            PointerInput::HoverTrack { fraction } => {
                self.transport.hover(fraction);
                None
            }
            PointerInput::LeaveTrack => {
                self.transport.clear_hover();
                None
            }
            PointerInput::Scrub { fraction } => Some(self.transport.seek_to_fraction(fraction)),
        };
        self.finish(action)
    }

    pub fn key(&mut self, input: KeyInput) -> Vec<PlayerNotice> {
        let snapshot = self.snapshot();
        let action = self.transport.key(input, &snapshot);
        self.finish(action)
    }

    /// Earliest transport timer
    pub fn next_deadline(&self) -> Option<Instant> {
        self.transport.next_deadline()
    }

    /// Fire expired transport timers
    pub fn poll(&mut self, now: Instant) -> Vec<PlayerNotice> {
        let snapshot = self.snapshot();
        let action = self.transport.poll(now, &snapshot);
        self.finish(action)
    }

    /// The document fullscreen flag changed outside the player
    pub fn fullscreen_changed(&mut self) -> Option<PlayerNotice> {
        let notice = self.transport.set_fullscreen(self.surface.is_fullscreen());
        self.publish();
        notice
    }

    // -------------------------------------------------------------------------
    // Control strip
    // -------------------------------------------------------------------------

    /// Play/pause button (acts immediately, no activation window)
    pub fn toggle_play(&mut self) -> Vec<PlayerNotice> {
        let action = self.transport.toggle_play(&self.snapshot());
        self.finish(Some(action))
    }

    pub fn skip(&mut self, forward: bool) -> Vec<PlayerNotice> {
        let action = self.transport.skip(forward, &self.snapshot());
        self.finish(Some(action))
    }

    pub fn set_volume(&mut self, volume: f64) {
        for action in self.transport.set_volume(volume) {
            self.apply(action);
        }
        self.publish();
    }

    pub fn toggle_mute(&mut self) {
        let action = self.transport.toggle_mute();
        self.finish(Some(action));
    }

    pub fn toggle_settings(&mut self) {
        self.transport.toggle_settings();
        self.publish();
    }

    pub fn select_quality(&mut self, selection: QualitySelection) -> Vec<PlayerNotice> {
        let action = self.transport.choose_quality(selection);
        self.finish(Some(action))
    }

    pub fn toggle_fullscreen(&mut self) -> Vec<PlayerNotice> {
        self.finish(Some(TransportAction::ToggleFullscreen))
    }

    /// Hover preview for the scrub track
    pub fn preview(&self) -> Option<PreviewFrame> {
        let base = self.engine.source().and_then(|s| s.preview_sprite_base.as_deref());
        self.transport.preview(base)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn snapshot(&self) -> MediaSnapshot {
        MediaSnapshot::capture(self.engine.media())
    }

    fn sync_volume(&mut self) {
        let (volume, muted) = (self.transport.state().volume, self.transport.state().is_muted);
        let media = self.engine.media_mut();
        media.set_volume(volume);
        media.set_muted(muted);
    }

    fn finish(&mut self, action: Option<TransportAction>) -> Vec<PlayerNotice> {
        let notices = action.and_then(|a| self.apply(a)).into_iter().collect();
        self.publish();
        notices
    }

    fn apply(&mut self, action: TransportAction) -> Option<PlayerNotice> {
        debug!(?action, "Applying transport action");
        match action {
            TransportAction::Play => {
                self.engine.start_playback();
                None
            }
            TransportAction::Pause => {
                self.engine.media_mut().pause();
                None
            }
            TransportAction::Seek(time) => {
                self.engine.media_mut().set_current_time(time);
                self.transport.seeked(time);
                None
            }
            TransportAction::SetVolume(volume) => {
                self.engine.media_mut().set_volume(volume);
                None
            }
            TransportAction::SetMuted(muted) => {
                self.engine.media_mut().set_muted(muted);
                None
            }
            TransportAction::ToggleFullscreen => self.apply_fullscreen_toggle(),
            TransportAction::SelectQuality(selection) => {
                match self.engine.set_quality(selection) {
                    Ok(()) => self.transport.quality_applied(selection),
                    Err(e) => warn!(error = %e, "Quality change rejected"),
                }
                None
            }
        }
    }

    fn apply_fullscreen_toggle(&mut self) -> Option<PlayerNotice> {
        let result: Result<()> = if self.surface.is_fullscreen() {
            self.surface.exit_fullscreen()
        } else {
            self.surface.request_fullscreen()
        };
        if let Err(e) = result {
            warn!(error = %e, "Fullscreen toggle failed");
        }
        self.transport.set_fullscreen(self.surface.is_fullscreen())
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.transport.state().clone());
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.transport.cancel_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Key;
    use crate::media::TimeRange;
    use crate::testing::{FakeBackend, FakeMedia, FakeSurface};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Harness {
        player: Player,
        media: FakeMedia,
        surface: FakeSurface,
    }

    fn harness() -> Harness {
        let media = FakeMedia::new();
        let surface = FakeSurface::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let player = Player::new(
            &PlayerConfig::default(),
            Box::new(media.clone()),
            Box::new(FakeBackend::supported()),
            Box::new(surface.clone()),
            tx,
        )
        .unwrap();
        Harness { player, media, surface }
    }

    fn source_at(locator: &str) -> PlaybackSource {
        PlaybackSource::parse(locator, "clip").unwrap()
    }

    fn source(name: &str) -> PlaybackSource {
        PlaybackSource::parse(&format!("https://cdn.example.com/{}.mp4", name), name).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        progress: Vec<(f64, f64)>,
        fullscreen: Vec<bool>,
        ended: usize,
    }

    impl PlayerCallbacks for Recorder {
        fn on_progress(&mut self, current_time: f64, duration: f64) {
            self.progress.push((current_time, duration));
        }

        fn on_fullscreen_change(&mut self, fullscreen: bool) {
            self.fullscreen.push(fullscreen);
        }

        fn on_ended(&mut self) {
            self.ended += 1;
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = PlayerConfig { preview_interval: 0.0, ..PlayerConfig::default() };
        let result = Player::new(
            &config,
            Box::new(FakeMedia::new()),
            Box::new(FakeBackend::supported()),
            Box::new(FakeSurface::new()),
            tx,
        );
        assert!(matches!(result, Err(crate::Error::InvalidConfig(_))));
    }

    #[test]
    fn test_hls_load_outside_runtime_reports_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut player = Player::new(
            &PlayerConfig::default(),
            Box::new(FakeMedia::new()),
            Box::new(crate::HlsBackend::new(reqwest::Client::new(), 1_000_000)),
            Box::new(FakeSurface::new()),
            tx,
        )
        .unwrap();

        let id = player.load(source_at("https://cdn.example.com/master.m3u8"));
        assert_eq!(player.engine().mode(), Some(crate::PlaybackMode::Adaptive));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session, id);
        assert!(matches!(event.event, AdaptiveEvent::Error { fatal: true, .. }));
    }

    #[test]
    fn test_initial_volume_applied() {
        let h = harness();
        assert_eq!(h.media.volume(), 0.8);
        assert!(!h.media.muted());
    }

    #[test]
    fn test_progress_dispatch() {
        let mut h = harness();
        let id = h.player.load(source("a"));
        h.media.set_timeline(30.0, 120.0);
        h.media.set_buffered(vec![TimeRange::new(0.0, 45.0)]);

        let mut recorder = Recorder::default();
        if let Some(notice) = h.player.handle_media_event(SessionEvent::new(id, MediaEvent::TimeUpdate)) {
            notice.dispatch(&mut recorder);
        }
        assert_eq!(recorder.progress, vec![(30.0, 120.0)]);
        assert_eq!(h.player.state().progress_percent(), 25.0);
        assert_eq!(h.player.state().buffered_end, 45.0);
    }

    #[test]
    fn test_stale_media_events_ignored() {
        let mut h = harness();
        let a = h.player.load(source("a"));
        h.player.load(source("b"));

        h.media.set_timeline(99.0, 100.0);
        assert_eq!(h.player.handle_media_event(SessionEvent::new(a, MediaEvent::Ended)), None);
        assert_eq!(h.player.handle_media_event(SessionEvent::new(a, MediaEvent::TimeUpdate)), None);
        assert_eq!(h.player.state().current_time, 0.0);
    }

    #[test]
    fn test_reloading_same_locator_keeps_session() {
        let mut h = harness();
        let a = h.player.load(source("a"));
        assert_eq!(h.player.load(source("a")), a);
        assert_eq!(h.media.play_calls(), 1);
    }

    #[test]
    fn test_fullscreen_toggles_surface_and_reports() {
        let mut h = harness();
        let notices = h.player.toggle_fullscreen();
        assert_eq!(notices, vec![PlayerNotice::FullscreenChanged(true)]);
        assert!(h.player.state().is_fullscreen);

        // User pressed Escape
        h.surface.set_fullscreen(false);
        assert_eq!(h.player.fullscreen_changed(), Some(PlayerNotice::FullscreenChanged(false)));
        assert!(!h.player.state().is_fullscreen);
    }

    #[test]
    fn test_keyboard_fullscreen_and_play() {
        let mut h = harness();
        h.player.load(source("a"));
        h.media.reject_autoplay(false);

        assert_eq!(
            h.player.key(KeyInput::new(Key::Char('f'))),
            vec![PlayerNotice::FullscreenChanged(true)]
        );

        // Playing after load: space pauses
        h.player.key(KeyInput::new(Key::Space));
        assert!(h.media.is_paused());
        assert_eq!(h.media.pause_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_activation_seeks_without_toggling() {
        let mut h = harness();
        h.player.load(source("a"));
        h.media.set_timeline(40.0, 100.0);
        let plays_before = h.media.play_calls();

        let start = Instant::now();
        h.player.pointer(PointerInput::Activate { x_fraction: 0.1 }, start);
        h.player.pointer(PointerInput::Activate { x_fraction: 0.1 }, start + Duration::from_millis(150));
        h.player.poll(start + Duration::from_secs(1));

        assert_eq!(h.media.seeks(), vec![30.0]);
        assert_eq!(h.media.pause_calls(), 0);
        assert_eq!(h.media.play_calls(), plays_before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_activation_toggles_once() {
        let mut h = harness();
        h.player.load(source("a"));
        assert!(!h.media.is_paused());

        let start = Instant::now();
        h.player.pointer(PointerInput::Activate { x_fraction: 0.7 }, start);
        let deadline = h.player.next_deadline().unwrap();
        h.player.poll(deadline);
        h.player.poll(deadline + Duration::from_secs(1));

        assert_eq!(h.media.pause_calls(), 1);
        assert!(h.media.seeks().is_empty());
    }

    #[test]
    fn test_quality_selection_on_direct_source_keeps_auto() {
        let mut h = harness();
        h.player.load(source("a"));
        h.player.toggle_settings();
        h.player.select_quality(QualitySelection::Pinned(1));
        assert!(!h.player.state().settings_open);
        assert_eq!(h.player.state().selected_quality, QualitySelection::Auto);
    }

    #[test]
    fn test_preview_uses_source_sprites() {
        let mut h = harness();
        let id = h.player.load(source("a").with_preview_sprites("/thumbs/a"));
        h.media.set_timeline(0.0, 40.0);
        h.player.handle_media_event(SessionEvent::new(id, MediaEvent::LoadedMetadata));
        h.player.pointer(PointerInput::HoverTrack { fraction: 0.5 }, Instant::now());

        let preview = h.player.preview().unwrap();
        assert_eq!(preview.url.as_deref(), Some("/thumbs/a/thumb_0005.jpg"));
    }

    #[test]
    fn test_window_title() {
        let mut h = harness();
        assert_eq!(h.player.window_title(), "AIrStream \u{2013} Video Player");
        h.player.load(source("Sunset"));
        assert_eq!(h.player.window_title(), "Sunset \u{2013} AIrStream");
    }

    #[test]
    fn test_subscribers_see_updates() {
        let mut h = harness();
        let rx = h.player.subscribe();
        h.player.set_volume(0.0);
        assert!(rx.borrow().is_muted);
        assert!(h.media.muted());
    }
}
