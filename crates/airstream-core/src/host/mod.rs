//! Host - the watch page around the player
//!
//! Owns the playlist, the current selection, persisted watch positions and
//! preferences, the up-next countdown and a queue of one-shot notifications.
//! The player reports into it through [`PlayerCallbacks`]; the host answers
//! with the next [`PlaybackSource`] to load.

mod library;
mod state;

pub use library::{format_bytes, parse_duration, LibraryClient, MediaItem};
pub use state::{decode_watch_positions, keys, FileStore, MemoryStore, PersistedState, Theme, WatchPosition};

use crate::{
    config::PlayerConfig,
    continuation::{ContinuationController, ContinuationState, ContinuationTarget},
    player::PlayerCallbacks,
    PlaybackSource,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Minimum spacing of watch position writes during playback
pub const POSITION_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// One-shot message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

/// Library list status for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchStatus {
    Resumable,
    New,
}

impl WatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            WatchStatus::Resumable => "Resumable",
            WatchStatus::New => "New",
        }
    }
}

/// Watch page state
pub struct Host {
    store: Box<dyn PersistedState>,
    playlist: Vec<MediaItem>,
    current_id: Option<String>,
    watch_positions: HashMap<String, WatchPosition>,
    positions_dirty: bool,
    positions_flushed_at: Option<Instant>,
    theme: Theme,
    volume: Option<f64>,
    fullscreen: bool,
    media_base: Option<Url>,
    continuation: ContinuationController,
    notifications: VecDeque<Notification>,
}

impl Host {
    /// Build a host, restoring whatever the store holds
    pub fn new(store: Box<dyn PersistedState>, config: &PlayerConfig) -> Self {
        let watch_positions = decode_watch_positions(store.get(keys::WATCH_POSITIONS).as_deref());

        let theme = store
            .get(keys::THEME)
            .and_then(|raw| raw.parse::<Theme>().ok())
            .unwrap_or_default();

        let volume = store
            .get(keys::VOLUME)
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|v| (0.0..=1.0).contains(v));

        let mut continuation = ContinuationController::new(config);
        if let Some(enabled) = store.get(keys::AUTOPLAY_NEXT).and_then(|raw| raw.trim().parse::<bool>().ok()) {
            continuation.set_enabled(enabled);
        }

        debug!(
            positions = watch_positions.len(),
            %theme,
            autoplay_next = continuation.is_enabled(),
            "Host state restored"
        );

        Self {
            store,
            playlist: Vec::new(),
            current_id: None,
            watch_positions,
            positions_dirty: false,
            positions_flushed_at: None,
            theme,
            volume,
            fullscreen: false,
            media_base: None,
            continuation,
            notifications: VecDeque::new(),
        }
    }

    /// Base that relative item locators resolve against
    pub fn with_media_base(mut self, base: Url) -> Self {
        self.media_base = Some(base);
        self
    }

    // -------------------------------------------------------------------------
    // Playlist
    // -------------------------------------------------------------------------

    pub fn playlist(&self) -> &[MediaItem] {
        &self.playlist
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    pub fn current_item(&self) -> Option<&MediaItem> {
        let id = self.current_id.as_deref()?;
        self.playlist.iter().find(|item| item.id == id)
    }

    /// Source for the current item
    pub fn current_source(&self) -> Option<PlaybackSource> {
        self.current_item().and_then(|item| self.source_for(item))
    }

    /// Replace the playlist and restore the selection: the last selected id
    /// when it is still listed, otherwise the first item.
    pub fn set_playlist(&mut self, items: Vec<MediaItem>) -> Option<PlaybackSource> {
        self.playlist = items;

        let saved = self.store.get(keys::LAST_VIDEO_ID);
        let restored = saved
            .filter(|id| self.playlist.iter().any(|item| &item.id == id))
            .or_else(|| self.playlist.first().map(|item| item.id.clone()));

        match restored {
            Some(id) => self.select(&id),
            None => {
                self.current_id = None;
                None
            }
        }
    }

    /// Fetch the library. On failure the list stays as it was and a
    /// notification is queued.
    #[instrument(skip(self, client))]
    pub async fn refresh(&mut self, client: &LibraryClient) -> Option<PlaybackSource> {
        match client.list_videos().await {
            Ok(items) => self.set_playlist(items),
            Err(e) => {
                warn!(error = %e, "Library fetch failed");
                self.notify(Notification::error("Could not load videos"));
                None
            }
        }
    }

    /// Upload a file, then put it first in the list and select it
    #[instrument(skip(self, client, path))]
    pub async fn upload(
        &mut self,
        client: &LibraryClient,
        path: &Path,
        title: Option<String>,
    ) -> Option<PlaybackSource> {
        match client.upload_file(path, title).await {
            Ok(item) => {
                let id = item.id.clone();
                self.playlist.retain(|existing| existing.id != id);
                self.playlist.insert(0, item);
                self.notify(Notification::success("Upload successful!"));
                self.select(&id)
            }
            Err(e) => {
                warn!(error = %e, "Upload failed");
                self.notify(Notification::error("Upload failed!"));
                None
            }
        }
    }

    /// Manual selection. Disarms a running countdown.
    pub fn select(&mut self, id: &str) -> Option<PlaybackSource> {
        let item = self.playlist.iter().find(|item| item.id == id)?;
        let source = self.source_for(item)?;

        self.continuation.disarm();
        self.flush_watch_positions();
        self.current_id = Some(id.to_string());
        self.persist(keys::LAST_VIDEO_ID, id);
        info!(item_id = %id, title = %source.display_title, "Selected");
        Some(source)
    }

    /// The item after the current one, wrapping; none for a single-item list
    pub fn next_item(&self) -> Option<&MediaItem> {
        if self.playlist.len() < 2 {
            return None;
        }
        let id = self.current_id.as_deref()?;
        let index = self.playlist.iter().position(|item| item.id == id)?;
        self.playlist.get((index + 1) % self.playlist.len())
    }

    fn next_target(&self) -> Option<ContinuationTarget> {
        let item = self.next_item()?;
        Some(ContinuationTarget {
            item_id: item.id.clone(),
            source: self.source_for(item)?,
        })
    }

    fn source_for(&self, item: &MediaItem) -> Option<PlaybackSource> {
        match item.playback_source(self.media_base.as_ref()) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Item is not playable");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Up next
    // -------------------------------------------------------------------------

    pub fn continuation(&self) -> ContinuationState {
        self.continuation.state()
    }

    pub fn countdown_deadline(&self) -> Option<Instant> {
        self.continuation.next_deadline()
    }

    /// Arm the countdown for the next item
    pub fn media_ended(&mut self, now: Instant) -> bool {
        let target = self.next_target();
        self.continuation.arm(target, now)
    }

    /// Fire countdown ticks; selects and returns the next source on advance
    pub fn poll_countdown(&mut self, now: Instant) -> Option<PlaybackSource> {
        let target = self.continuation.poll(now)?;
        self.select(&target.item_id)
    }

    pub fn cancel_up_next(&mut self) {
        self.continuation.cancel();
    }

    pub fn play_next_now(&mut self) -> Option<PlaybackSource> {
        let target = self.continuation.play_now()?;
        self.select(&target.item_id)
    }

    // -------------------------------------------------------------------------
    // Watch positions
    // -------------------------------------------------------------------------

    pub fn watch_position(&self, id: &str) -> Option<WatchPosition> {
        self.watch_positions.get(id).copied()
    }

    pub fn watch_positions(&self) -> &HashMap<String, WatchPosition> {
        &self.watch_positions
    }

    /// Watched share of an item in [0, 1]
    pub fn watch_progress(&self, id: &str) -> f64 {
        self.watch_position(id).map(|p| p.fraction()).unwrap_or(0.0)
    }

    pub fn watch_status(&self, id: &str) -> WatchStatus {
        match self.watch_position(id) {
            Some(p) if p.t > 0.0 => WatchStatus::Resumable,
            _ => WatchStatus::New,
        }
    }

    // -------------------------------------------------------------------------
    // Preferences
    // -------------------------------------------------------------------------

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.persist(keys::THEME, theme.as_str());
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.set_theme(self.theme.toggled());
        self.theme
    }

    /// Saved volume, if any
    pub fn volume(&self) -> Option<f64> {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        self.volume = Some(volume);
        self.persist(keys::VOLUME, &volume.to_string());
    }

    pub fn autoplay_next(&self) -> bool {
        self.continuation.is_enabled()
    }

    pub fn set_autoplay_next(&mut self, enabled: bool) {
        self.continuation.set_enabled(enabled);
        self.persist(keys::AUTOPLAY_NEXT, if enabled { "true" } else { "false" });
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    // -------------------------------------------------------------------------
    // Notifications
    // -------------------------------------------------------------------------

    pub fn notify(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }

    /// Take the oldest notification; each is delivered once
    pub fn take_notification(&mut self) -> Option<Notification> {
        self.notifications.pop_front()
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key, error = %e, "Failed to persist state");
        }
    }

    /// Write pending watch positions to the store
    pub fn flush_watch_positions(&mut self) {
        if !self.positions_dirty {
            return;
        }
        match serde_json::to_string(&self.watch_positions) {
            Ok(raw) => self.persist(keys::WATCH_POSITIONS, &raw),
            Err(e) => warn!(error = %e, "Failed to encode watch positions"),
        }
        self.positions_dirty = false;
        self.positions_flushed_at = Some(Instant::now());
    }
}

impl PlayerCallbacks for Host {
    fn on_progress(&mut self, current_time: f64, duration: f64) {
        let Some(id) = self.current_id.clone() else {
            return;
        };
        self.watch_positions.insert(id, WatchPosition::new(current_time, duration));
        self.positions_dirty = true;

        let due = match self.positions_flushed_at {
            Some(at) => at.elapsed() >= POSITION_FLUSH_INTERVAL,
            None => true,
        };
        if due {
            self.flush_watch_positions();
        }
    }

    fn on_fullscreen_change(&mut self, fullscreen: bool) {
        debug!(fullscreen, "Fullscreen changed");
        self.fullscreen = fullscreen;
    }

    fn on_ended(&mut self) {
        self.flush_watch_positions();
        self.media_ended(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::Continuation;

    fn item(id: &str, duration: f64) -> MediaItem {
        MediaItem::new(id, format!("https://cdn.example.com/{}.mp4", id)).with_duration(duration)
    }

    fn host_with(store: MemoryStore, items: Vec<MediaItem>) -> Host {
        let mut host = Host::new(Box::new(store), &PlayerConfig::default());
        host.set_playlist(items);
        host
    }

    #[test]
    fn test_startup_selects_first_item() {
        let host = host_with(MemoryStore::new(), vec![item("a", 10.0), item("b", 20.0)]);
        assert_eq!(host.current_id(), Some("a"));
    }

    #[test]
    fn test_startup_restores_last_selection() {
        let mut store = MemoryStore::new();
        store.set(keys::LAST_VIDEO_ID, "b").unwrap();
        let host = host_with(store, vec![item("a", 10.0), item("b", 20.0)]);
        assert_eq!(host.current_id(), Some("b"));

        let mut store = MemoryStore::new();
        store.set(keys::LAST_VIDEO_ID, "gone").unwrap();
        let host = host_with(store, vec![item("a", 10.0), item("b", 20.0)]);
        assert_eq!(host.current_id(), Some("a"));
    }

    #[test]
    fn test_corrupt_state_falls_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(keys::WATCH_POSITIONS, "{{{").unwrap();
        store.set(keys::THEME, "plaid").unwrap();
        store.set(keys::VOLUME, "loud").unwrap();
        store.set(keys::AUTOPLAY_NEXT, "maybe").unwrap();

        let host = host_with(store, vec![item("a", 10.0)]);
        assert!(host.watch_positions().is_empty());
        assert_eq!(host.theme(), Theme::Dark);
        assert_eq!(host.volume(), None);
        assert!(host.autoplay_next());
    }

    #[test]
    fn test_next_item_wraps_and_single_item_has_none() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 10.0), item("b", 20.0), item("c", 5.0)]);
        host.select("c");
        assert_eq!(host.next_item().map(|i| i.id.as_str()), Some("a"));

        let host = host_with(MemoryStore::new(), vec![item("solo", 10.0)]);
        assert_eq!(host.next_item(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_media_arms_then_advances() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 10.0), item("b", 20.0)]);
        let start = Instant::now();

        assert!(host.media_ended(start));
        let state = host.continuation();
        assert!(state.visible);
        assert_eq!(state.remaining_seconds, 5);
        assert_eq!(state.target.unwrap().item_id, "b");

        let source = host.poll_countdown(start + std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(source.locator.as_str(), "https://cdn.example.com/b.mp4");
        assert_eq!(host.current_id(), Some("b"));
        assert_eq!(*host.continuation.current(), Continuation::Idle);
    }

    #[test]
    fn test_manual_selection_disarms_countdown() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 10.0), item("b", 20.0), item("c", 5.0)]);
        host.media_ended(Instant::now());
        host.select("c");
        assert!(!host.continuation().visible);
        assert_eq!(host.current_id(), Some("c"));
    }

    #[test]
    fn test_autoplay_disabled_never_arms() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 10.0), item("b", 20.0)]);
        host.set_autoplay_next(false);
        assert!(!host.media_ended(Instant::now()));
    }

    #[test]
    fn test_progress_persisted_for_current_item() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 120.0), item("b", 20.0)]);
        host.on_progress(30.0, 120.0);

        assert_eq!(host.watch_position("a"), Some(WatchPosition::new(30.0, 120.0)));
        assert_eq!(host.watch_progress("a"), 0.25);
        assert_eq!(host.watch_status("a"), WatchStatus::Resumable);
        assert_eq!(host.watch_status("b"), WatchStatus::New);

        let raw = host.store.get(keys::WATCH_POSITIONS).unwrap();
        assert_eq!(decode_watch_positions(Some(&raw))["a"].t, 30.0);
    }

    fn stored_position(host: &Host, id: &str) -> Option<f64> {
        let raw = host.store.get(keys::WATCH_POSITIONS)?;
        decode_watch_positions(Some(&raw)).get(id).map(|p| p.t)
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_writes_are_spaced() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 120.0), item("b", 20.0)]);
        host.select("a");

        host.on_progress(1.0, 120.0);
        assert_eq!(stored_position(&host, "a"), Some(1.0));

        host.on_progress(2.0, 120.0);
        assert_eq!(host.watch_position("a"), Some(WatchPosition::new(2.0, 120.0)));
        assert_eq!(stored_position(&host, "a"), Some(1.0));

        tokio::time::advance(POSITION_FLUSH_INTERVAL).await;
        host.on_progress(7.0, 120.0);
        assert_eq!(stored_position(&host, "a"), Some(7.0));

        host.on_progress(8.0, 120.0);
        host.select("b");
        assert_eq!(stored_position(&host, "a"), Some(8.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_flushes_pending_position() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 10.0), item("b", 20.0)]);
        host.select("a");
        host.on_progress(1.0, 10.0);
        host.on_progress(10.0, 10.0);
        assert_eq!(stored_position(&host, "a"), Some(1.0));

        host.on_ended();
        assert_eq!(stored_position(&host, "a"), Some(10.0));
    }

    #[test]
    fn test_fullscreen_bubbles_to_host() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 10.0)]);
        host.on_fullscreen_change(true);
        assert!(host.is_fullscreen());
    }

    #[test]
    fn test_preferences_persist() {
        let mut host = host_with(MemoryStore::new(), vec![]);
        assert_eq!(host.toggle_theme(), Theme::Neon);
        host.set_volume(1.7);
        assert_eq!(host.volume(), Some(1.0));
        assert_eq!(host.store.get(keys::THEME).as_deref(), Some("neon"));
        assert_eq!(host.store.get(keys::VOLUME).as_deref(), Some("1"));
        assert_eq!(host.current_id(), None);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_list_and_notifies_once() {
        let mut host = host_with(MemoryStore::new(), vec![item("a", 10.0)]);
        let config = crate::config::HostConfig::default().with_api_base(Url::parse("http://127.0.0.1:1").unwrap());
        let client = LibraryClient::new(config).unwrap();

        assert_eq!(host.refresh(&client).await, None);
        assert_eq!(host.playlist().len(), 1);
        assert_eq!(host.take_notification().map(|n| n.kind), Some(NotificationKind::Error));
        assert_eq!(host.take_notification(), None);
    }
}
