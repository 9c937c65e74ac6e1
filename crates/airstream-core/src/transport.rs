//! Transport Control State
//!
//! Mirrors what the media handle reports (play/pause, buffering, timeline,
//! buffered range) and turns pointer and keyboard input into
//! [`TransportAction`]s for the player to carry out. Owns the two UI timers:
//! the idle hide timer and the single/double activation window. Timers are
//! deadlines; the event loop calls [`TransportControls::poll`] when
//! [`TransportControls::next_deadline`] passes.

use crate::{
    config::PlayerConfig,
    engine::EngineUpdate,
    input::{KeyCommand, KeyInput},
    media::{MediaEvent, MediaSnapshot},
    player::PlayerNotice,
    QualitySelection, Rendition,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Observable transport state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    pub is_playing: bool,
    pub is_buffering: bool,
    /// Volume in [0, 1]
    pub volume: f64,
    pub is_muted: bool,
    pub current_time: f64,
    pub duration: f64,
    /// End of the last buffered range
    pub buffered_end: f64,
    pub is_fullscreen: bool,
    pub controls_visible: bool,
    /// Pointer position over the scrub track, in [0, 1]
    pub hover_fraction: Option<f64>,
    /// Media time under the pointer
    pub hover_time: Option<f64>,
    pub available_qualities: Vec<Rendition>,
    pub selected_quality: QualitySelection,
    /// Rendition the adaptive session currently plays
    pub active_level: Option<usize>,
    pub settings_open: bool,
}

impl TransportState {
    fn new(volume: f64) -> Self {
        Self {
            is_playing: false,
            is_buffering: false,
            volume,
            is_muted: false,
            current_time: 0.0,
            duration: 0.0,
            buffered_end: 0.0,
            is_fullscreen: false,
            controls_visible: true,
            hover_fraction: None,
            hover_time: None,
            available_qualities: Vec::new(),
            selected_quality: QualitySelection::Auto,
            active_level: None,
            settings_open: false,
        }
    }

    /// Played share of the timeline, 0..=100
    pub fn progress_percent(&self) -> f64 {
        percent_of(self.current_time, self.duration)
    }

    /// Buffered share of the timeline, 0..=100
    pub fn buffered_percent(&self) -> f64 {
        percent_of(self.buffered_end, self.duration)
    }

    /// Scrub input value on a 0..=1000 track
    pub fn scrub_value(&self) -> u32 {
        if self.duration > 0.0 {
            ((self.current_time / self.duration).clamp(0.0, 1.0) * 1000.0).floor() as u32
        } else {
            0
        }
    }

    /// Volume shown on the slider (0 while muted), 0..=100
    pub fn volume_percent(&self) -> u32 {
        if self.is_muted {
            0
        } else {
            (self.volume * 100.0).round() as u32
        }
    }

    /// "elapsed / total" label
    pub fn time_label(&self) -> String {
        format!(
            "{} / {}",
            format_timestamp(Some(self.current_time)),
            format_timestamp(Some(self.duration))
        )
    }
}

fn percent_of(value: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        value / duration * 100.0
    } else {
        0.0
    }
}

/// Format seconds as `m:ss` or `h:mm:ss`; `-` when unknown
pub fn format_timestamp(seconds: Option<f64>) -> String {
    let Some(sec) = seconds.filter(|s| s.is_finite()) else {
        return "-".to_string();
    };
    let total = sec.max(0.0).floor() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// 1-based preview sprite index for a media time; a non-positive interval
/// maps everything to the first frame
pub fn preview_frame_index(hover_time: f64, interval: f64) -> u32 {
    if interval.is_nan() || interval <= 0.0 {
        return 1;
    }
    ((hover_time.max(0.0) / interval).floor() as u32).saturating_add(1)
}

/// Sprite file name for a frame index: `thumb_0004.jpg`
pub fn preview_frame_name(index: u32) -> String {
    format!("thumb_{:04}.jpg", index)
}

/// Full sprite URL under a base
pub fn preview_frame_url(base: &str, index: u32) -> String {
    format!("{}/{}", base.trim_end_matches('/'), preview_frame_name(index))
}

/// Hover preview over the scrub track
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewFrame {
    /// Position along the track, in [0, 1]
    pub fraction: f64,
    /// Media time under the pointer
    pub time: f64,
    /// 1-based sprite index
    pub index: u32,
    /// Sprite URL, when a sprite base is configured
    pub url: Option<String>,
    /// Time label under the thumbnail
    pub label: String,
}

/// Effect the player applies to the media handle or surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportAction {
    Play,
    Pause,
    /// Absolute seek target, already clamped to [0, duration]
    Seek(f64),
    SetVolume(f64),
    SetMuted(bool),
    ToggleFullscreen,
    SelectQuality(QualitySelection),
}

/// Transport state machine
#[derive(Debug)]
pub struct TransportControls {
    state: TransportState,
    hide_delay: Duration,
    activation_window: Duration,
    activation_seek: f64,
    keyboard_seek: f64,
    skip_seek: f64,
    preview_interval: f64,
    hide_deadline: Option<Instant>,
    pointer_over_controls: bool,
    pending_activation: Option<Instant>,
}

impl TransportControls {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            state: TransportState::new(config.initial_volume.clamp(0.0, 1.0)),
            hide_delay: config.controls_hide_delay(),
            activation_window: config.double_activation_window(),
            activation_seek: config.double_activation_seek,
            keyboard_seek: config.keyboard_seek,
            skip_seek: config.skip_seek,
            preview_interval: config.preview_interval,
            hide_deadline: None,
            pointer_over_controls: false,
            pending_activation: None,
        }
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    /// Forget everything tied to the previous source. Volume, mute,
    /// fullscreen and control visibility carry over.
    pub fn reset_for_source(&mut self) {
        let s = &mut self.state;
        s.is_playing = false;
        s.is_buffering = false;
        s.current_time = 0.0;
        s.duration = 0.0;
        s.buffered_end = 0.0;
        s.hover_fraction = None;
        s.hover_time = None;
        s.available_qualities.clear();
        s.selected_quality = QualitySelection::Auto;
        s.active_level = None;
        s.settings_open = false;
        self.pending_activation = None;
    }

    /// Cancel both timers
    pub fn cancel_timers(&mut self) {
        self.hide_deadline = None;
        self.pending_activation = None;
    }

    // -------------------------------------------------------------------------
    // Media events
    // -------------------------------------------------------------------------

    /// Apply a media event; returns what the host must hear about
    pub fn on_media_event(&mut self, event: MediaEvent, media: &MediaSnapshot) -> Option<PlayerNotice> {
        let s = &mut self.state;
        match event {
            MediaEvent::LoadedMetadata => {
                s.duration = media.duration;
                None
            }
            MediaEvent::TimeUpdate => {
                s.current_time = media.current_time;
                s.duration = media.duration;
                s.buffered_end = media.buffered_end();
                Some(PlayerNotice::Progress {
                    current_time: media.current_time,
                    duration: media.duration,
                })
            }
            MediaEvent::Play => {
                s.is_playing = true;
                s.is_buffering = false;
                None
            }
            MediaEvent::Pause => {
                s.is_playing = false;
                None
            }
            MediaEvent::Waiting => {
                s.is_buffering = true;
                None
            }
            MediaEvent::Playing => {
                s.is_buffering = false;
                None
            }
            MediaEvent::Ended => {
                s.is_playing = false;
                s.is_buffering = false;
                Some(PlayerNotice::Ended)
            }
        }
    }

    /// Mirror quality information from the engine
    pub fn on_engine_update(&mut self, update: &EngineUpdate) {
        match update {
            EngineUpdate::LevelsChanged(levels) => {
                self.state.available_qualities = levels.clone();
                self.state.selected_quality = QualitySelection::Auto;
            }
            EngineUpdate::LevelSwitched(level) => {
                self.state.active_level = Some(*level);
            }
            EngineUpdate::Failed { fatal, .. } => {
                if *fatal {
                    self.state.is_buffering = false;
                }
            }
        }
    }

    /// Mirror the document fullscreen flag; reports only real changes
    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Option<PlayerNotice> {
        if self.state.is_fullscreen == fullscreen {
            return None;
        }
        self.state.is_fullscreen = fullscreen;
        Some(PlayerNotice::FullscreenChanged(fullscreen))
    }

    // -------------------------------------------------------------------------
    // Controls visibility
    // -------------------------------------------------------------------------

    pub fn pointer_moved(&mut self, now: Instant) {
        self.state.controls_visible = true;
        if !self.pointer_over_controls {
            self.hide_deadline = Some(now + self.hide_delay);
        }
    }

    /// Pointer over the control strip holds the controls open
    pub fn enter_controls(&mut self) {
        self.pointer_over_controls = true;
        self.state.controls_visible = true;
        self.hide_deadline = None;
    }

    pub fn leave_controls(&mut self, now: Instant) {
        self.pointer_over_controls = false;
        self.hide_deadline = Some(now + self.hide_delay);
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    /// Earliest pending timer
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.hide_deadline, self.pending_activation) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire expired timers. A lapsed activation window yields the deferred
    /// play/pause toggle.
    pub fn poll(&mut self, now: Instant, media: &MediaSnapshot) -> Option<TransportAction> {
        if self.hide_deadline.is_some_and(|d| d <= now) {
            self.hide_deadline = None;
            if !self.pointer_over_controls {
                self.state.controls_visible = false;
                debug!("Controls hidden after idle");
            }
        }

        if self.pending_activation.is_some_and(|d| d <= now) {
            self.pending_activation = None;
            return Some(self.toggle_play(media));
        }

        None
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    pub fn toggle_play(&self, media: &MediaSnapshot) -> TransportAction {
        if media.paused {
            TransportAction::Play
        } else {
            TransportAction::Pause
        }
    }

    /// Click/tap on the video surface. A second activation inside the window
    /// seeks by the double-activation step (left half back, right half
    /// forward) and cancels the pending toggle.
    pub fn activate(&mut self, x_fraction: f64, now: Instant, media: &MediaSnapshot) -> Option<TransportAction> {
        match self.pending_activation.take() {
            Some(deadline) if now <= deadline => {
                let delta = if x_fraction < 0.5 {
                    -self.activation_seek
                } else {
                    self.activation_seek
                };
                Some(self.seek_by(delta, media))
            }
            _ => {
                self.pending_activation = Some(now + self.activation_window);
                None
            }
        }
    }

    /// Relative seek, clamped to the timeline
    pub fn seek_by(&self, delta: f64, media: &MediaSnapshot) -> TransportAction {
        let duration = media.duration.max(0.0);
        TransportAction::Seek((media.current_time + delta).clamp(0.0, duration))
    }

    /// Skip buttons
    pub fn skip(&self, forward: bool, media: &MediaSnapshot) -> TransportAction {
        let delta = if forward { self.skip_seek } else { -self.skip_seek };
        self.seek_by(delta, media)
    }

    /// Scrub track input
    pub fn seek_to_fraction(&self, fraction: f64) -> TransportAction {
        TransportAction::Seek(fraction.clamp(0.0, 1.0) * self.state.duration.max(0.0))
    }

    /// Record an applied seek so the UI does not wait for the next time update
    pub fn seeked(&mut self, time: f64) {
        self.state.current_time = time;
    }

    pub fn hover(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.state.hover_fraction = Some(fraction);
        self.state.hover_time = Some(fraction * self.state.duration.max(0.0));
    }

    pub fn clear_hover(&mut self) {
        self.state.hover_fraction = None;
        self.state.hover_time = None;
    }

    /// Preview for the current hover position
    pub fn preview(&self, sprite_base: Option<&str>) -> Option<PreviewFrame> {
        let fraction = self.state.hover_fraction?;
        let time = self.state.hover_time?;
        let index = preview_frame_index(time, self.preview_interval);
        Some(PreviewFrame {
            fraction,
            time,
            index,
            url: sprite_base.map(|base| preview_frame_url(base, index)),
            label: format_timestamp(Some(time)),
        })
    }

    /// Volume slider; zero mutes, anything else unmutes
    pub fn set_volume(&mut self, volume: f64) -> [TransportAction; 2] {
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        self.state.is_muted = volume == 0.0;
        [
            TransportAction::SetVolume(volume),
            TransportAction::SetMuted(self.state.is_muted),
        ]
    }

    pub fn toggle_mute(&mut self) -> TransportAction {
        self.state.is_muted = !self.state.is_muted;
        TransportAction::SetMuted(self.state.is_muted)
    }

    /// Keyboard shortcut
    pub fn key(&mut self, input: KeyInput, media: &MediaSnapshot) -> Option<TransportAction> {
        match input.command(self.keyboard_seek)? {
            KeyCommand::TogglePlay => Some(self.toggle_play(media)),
            KeyCommand::SeekBy(delta) => Some(self.seek_by(delta, media)),
            KeyCommand::ToggleMute => Some(self.toggle_mute()),
            KeyCommand::ToggleFullscreen => Some(TransportAction::ToggleFullscreen),
        }
    }

    pub fn toggle_settings(&mut self) {
        self.state.settings_open = !self.state.settings_open;
    }

    /// Pick a quality from the settings menu; the menu closes
    pub fn choose_quality(&mut self, selection: QualitySelection) -> TransportAction {
        self.state.settings_open = false;
        TransportAction::SelectQuality(selection)
    }

    /// Record a quality selection the engine accepted
    pub fn quality_applied(&mut self, selection: QualitySelection) {
        self.state.selected_quality = selection;
    }
}
