//! In-memory fakes for the player's seams
//!
//! Every fake is a cheap clone around shared state, so a test can hand one
//! copy to the player and keep another to inspect what the player did.

use crate::{
    adaptive::{AdaptiveBackend, AdaptiveEventSender, AdaptiveSession, LevelRequest},
    media::{DisplaySurface, MediaHandle, TimeRange},
    Error, Rendition, Resolution, Result, SessionId,
};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build a ladder with one rendition per height, ascending
pub fn ladder(heights: &[u32]) -> Vec<Rendition> {
    heights
        .iter()
        .enumerate()
        .map(|(index, &height)| Rendition {
            index,
            bandwidth: height as u64 * 4_000,
            resolution: Some(Resolution::new(height * 16 / 9, height)),
            frame_rate: None,
            codecs: None,
            uri: Url::parse(&format!("https://cdn.example.com/{}p/index.m3u8", height))
                .expect("static URL"),
        })
        .collect()
}

// =============================================================================
// Media handle
// =============================================================================

#[derive(Debug, Default)]
struct FakeMediaState {
    source: Option<Url>,
    session: Option<SessionId>,
    paused: bool,
    reject_autoplay: bool,
    play_calls: usize,
    pause_calls: usize,
    current_time: f64,
    duration: f64,
    buffered: Vec<TimeRange>,
    volume: f64,
    muted: bool,
    seeks: Vec<f64>,
}

/// Scriptable media handle
#[derive(Debug, Clone)]
pub struct FakeMedia {
    state: Arc<Mutex<FakeMediaState>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeMediaState {
                paused: true,
                volume: 1.0,
                ..Default::default()
            })),
        }
    }

    /// Make `play()` fail as a browser does before any user gesture
    pub fn reject_autoplay(&self, reject: bool) {
        lock(&self.state).reject_autoplay = reject;
    }

    pub fn set_timeline(&self, current_time: f64, duration: f64) {
        let mut state = lock(&self.state);
        state.current_time = current_time;
        state.duration = duration;
    }

    pub fn set_buffered(&self, ranges: Vec<TimeRange>) {
        lock(&self.state).buffered = ranges;
    }

    pub fn source(&self) -> Option<Url> {
        lock(&self.state).source.clone()
    }

    pub fn session(&self) -> Option<SessionId> {
        lock(&self.state).session
    }

    pub fn play_calls(&self) -> usize {
        lock(&self.state).play_calls
    }

    pub fn pause_calls(&self) -> usize {
        lock(&self.state).pause_calls
    }

    pub fn seeks(&self) -> Vec<f64> {
        lock(&self.state).seeks.clone()
    }

    pub fn volume(&self) -> f64 {
        lock(&self.state).volume
    }

    pub fn muted(&self) -> bool {
        lock(&self.state).muted
    }

    pub fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }
}

impl Default for FakeMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaHandle for FakeMedia {
    fn set_source(&mut self, locator: &Url, session: SessionId) {
        let mut state = lock(&self.state);
        state.source = Some(locator.clone());
        state.session = Some(session);
        state.current_time = 0.0;
        state.paused = true;
    }

    fn clear_source(&mut self) {
        let mut state = lock(&self.state);
        state.source = None;
        state.session = None;
        state.paused = true;
    }

    fn play(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.play_calls += 1;
        if state.reject_autoplay {
            return Err(Error::AutoplayRejected("play() requires a user gesture".into()));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = lock(&self.state);
        state.pause_calls += 1;
        state.paused = true;
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).current_time
    }

    fn set_current_time(&mut self, time: f64) {
        let mut state = lock(&self.state);
        state.current_time = time;
        state.seeks.push(time);
    }

    fn duration(&self) -> f64 {
        lock(&self.state).duration
    }

    fn buffered(&self) -> Vec<TimeRange> {
        lock(&self.state).buffered.clone()
    }

    fn set_volume(&mut self, volume: f64) {
        lock(&self.state).volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        lock(&self.state).muted = muted;
    }
}

// =============================================================================
// Adaptive backend
// =============================================================================

#[derive(Debug, Default)]
struct FakeBackendState {
    supported: bool,
    created: Vec<SessionId>,
    destroyed: Vec<SessionId>,
    loaded: Vec<Url>,
    level_requests: Vec<LevelRequest>,
}

/// Adaptive backend that records session lifecycles
#[derive(Debug, Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeBackendState>>,
}

impl FakeBackend {
    pub fn supported() -> Self {
        Self::with_support(true)
    }

    pub fn unsupported() -> Self {
        Self::with_support(false)
    }

    fn with_support(supported: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeBackendState {
                supported,
                ..Default::default()
            })),
        }
    }

    pub fn created(&self) -> Vec<SessionId> {
        lock(&self.state).created.clone()
    }

    pub fn destroyed(&self) -> Vec<SessionId> {
        lock(&self.state).destroyed.clone()
    }

    pub fn loaded(&self) -> Vec<Url> {
        lock(&self.state).loaded.clone()
    }

    pub fn level_requests(&self) -> Vec<LevelRequest> {
        lock(&self.state).level_requests.clone()
    }

    /// Sessions created and not yet destroyed
    pub fn live_sessions(&self) -> usize {
        let state = lock(&self.state);
        state.created.iter().filter(|id| !state.destroyed.contains(*id)).count()
    }
}

impl AdaptiveBackend for FakeBackend {
    fn is_supported(&self) -> bool {
        lock(&self.state).supported
    }

    fn create_session(&mut self, id: SessionId, _events: AdaptiveEventSender) -> Box<dyn AdaptiveSession> {
        lock(&self.state).created.push(id);
        Box::new(FakeSession {
            id,
            state: Arc::clone(&self.state),
            locator: None,
        })
    }
}

struct FakeSession {
    id: SessionId,
    state: Arc<Mutex<FakeBackendState>>,
    locator: Option<Url>,
}

impl AdaptiveSession for FakeSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn load_source(&mut self, locator: &Url) {
        self.locator = Some(locator.clone());
        lock(&self.state).loaded.push(locator.clone());
    }

    fn attach_media(&mut self, media: &mut dyn MediaHandle) {
        if let Some(locator) = &self.locator {
            media.set_source(locator, self.id);
        }
    }

    fn set_level(&mut self, request: LevelRequest) {
        lock(&self.state).level_requests.push(request);
    }

    fn destroy(&mut self) {
        lock(&self.state).destroyed.push(self.id);
    }
}

// =============================================================================
// Display surface
// =============================================================================

/// Display surface whose fullscreen flag tests can flip from outside
#[derive(Debug, Clone, Default)]
pub struct FakeSurface {
    fullscreen: Arc<Mutex<bool>>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the user leaving fullscreen with Escape
    pub fn set_fullscreen(&self, fullscreen: bool) {
        *lock(&self.fullscreen) = fullscreen;
    }
}

impl DisplaySurface for FakeSurface {
    fn is_fullscreen(&self) -> bool {
        *lock(&self.fullscreen)
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        *lock(&self.fullscreen) = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        *lock(&self.fullscreen) = false;
        Ok(())
    }
}
