//! Player runtime - the single-task event loop
//!
//! One tokio task owns the [`Player`] and the [`Host`] and processes one
//! input at a time: media events, adaptive session events, user commands and
//! the earliest pending timer (idle hide, activation window, countdown tick).
//! No locks guard player state; everything else talks to the loop through
//! channels.

use crate::{
    adaptive::AdaptiveEventReceiver,
    continuation::ContinuationState,
    host::{Host, Notification},
    input::{KeyInput, PointerInput},
    media::MediaEventReceiver,
    player::{Player, PlayerNotice},
    transport::TransportState,
    Error, QualitySelection, Result,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// User command for the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pointer(PointerInput),
    Key(KeyInput),
    TogglePlay,
    Skip { forward: bool },
    SetVolume(f64),
    ToggleMute,
    ToggleSettings,
    SelectQuality(QualitySelection),
    ToggleFullscreen,
    /// The surface left or entered fullscreen on its own
    FullscreenChanged,
    /// Pick a playlist item by id
    Select(String),
    CancelUpNext,
    PlayNextNow,
    SetAutoplayNext(bool),
    Shutdown,
}

/// Host-side view published after every input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSnapshot {
    pub current_id: Option<String>,
    pub window_title: String,
    pub continuation: ContinuationState,
    pub fullscreen: bool,
}

/// Client side of a running [`PlayerRuntime`]
pub struct RuntimeHandle {
    commands: mpsc::UnboundedSender<Command>,
    /// Transport state, updated by the player
    pub transport: watch::Receiver<TransportState>,
    /// Host state, updated by the loop
    pub host: watch::Receiver<HostSnapshot>,
    /// One-shot notifications, each delivered once
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl RuntimeHandle {
    pub fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| Error::RuntimeStopped)
    }

    /// Command sender for other tasks
    pub fn commands(&self) -> mpsc::UnboundedSender<Command> {
        self.commands.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Event loop around one player and its host
pub struct PlayerRuntime {
    player: Player,
    host: Host,
    media_events: MediaEventReceiver,
    adaptive_events: AdaptiveEventReceiver,
    commands: mpsc::UnboundedReceiver<Command>,
    host_tx: watch::Sender<HostSnapshot>,
    notifications_tx: mpsc::UnboundedSender<Notification>,
}

impl PlayerRuntime {
    /// `media_events` and `adaptive_events` are the receiving ends of the
    /// channels the player's media handle and engine report into.
    pub fn new(
        player: Player,
        host: Host,
        media_events: MediaEventReceiver,
        adaptive_events: AdaptiveEventReceiver,
    ) -> (Self, RuntimeHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (notifications_tx, notifications) = mpsc::unbounded_channel();
        let (host_tx, host_rx) = watch::channel(snapshot(&player, &host));

        let handle = RuntimeHandle {
            commands: commands_tx,
            transport: player.subscribe(),
            host: host_rx,
            notifications,
        };

        let runtime = Self {
            player,
            host,
            media_events,
            adaptive_events,
            commands,
            host_tx,
            notifications_tx,
        };
        (runtime, handle)
    }

    /// Run until shutdown or until every command sender is gone. Returns the
    /// host so callers can inspect where the session ended.
    pub async fn run(mut self) -> Host {
        info!("Player runtime started");
        if let Some(volume) = self.host.volume() {
            self.player.set_volume(volume);
        }
        if let Some(source) = self.host.current_source() {
            self.player.load(source);
        }
        self.publish();

        loop {
            let deadline = earliest(self.player.next_deadline(), self.host.countdown_deadline());

            tokio::select! {
                biased;

                Some(event) = self.media_events.recv() => {
                    let notice = self.player.handle_media_event(event);
                    self.deliver(notice);
                }
                Some(event) = self.adaptive_events.recv() => {
                    self.player.handle_adaptive_event(event);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_timers(Instant::now());
                }
            }

            self.publish();
        }

        self.player.unload();
        self.host.flush_watch_positions();
        info!("Player runtime stopped");
        self.host
    }

    fn on_command(&mut self, command: Command) {
        debug!(?command, "Command");
        let now = Instant::now();
        let notices = match command {
            Command::Pointer(input) => self.player.pointer(input, now),
            Command::Key(input) => self.player.key(input),
            Command::TogglePlay => self.player.toggle_play(),
            Command::Skip { forward } => self.player.skip(forward),
            Command::SetVolume(volume) => {
                self.player.set_volume(volume);
                self.host.set_volume(volume);
                Vec::new()
            }
            Command::ToggleMute => {
                self.player.toggle_mute();
                Vec::new()
            }
            Command::ToggleSettings => {
                self.player.toggle_settings();
                Vec::new()
            }
            Command::SelectQuality(selection) => self.player.select_quality(selection),
            Command::ToggleFullscreen => self.player.toggle_fullscreen(),
            Command::FullscreenChanged => self.player.fullscreen_changed().into_iter().collect(),
            Command::Select(id) => {
                if let Some(source) = self.host.select(&id) {
                    self.player.load(source);
                }
                Vec::new()
            }
            Command::CancelUpNext => {
                self.host.cancel_up_next();
                Vec::new()
            }
            Command::PlayNextNow => {
                if let Some(source) = self.host.play_next_now() {
                    self.player.load(source);
                }
                Vec::new()
            }
            Command::SetAutoplayNext(enabled) => {
                self.host.set_autoplay_next(enabled);
                Vec::new()
            }
            Command::Shutdown => Vec::new(),
        };
        for notice in notices {
            self.deliver(Some(notice));
        }
    }

    fn on_timers(&mut self, now: Instant) {
        for notice in self.player.poll(now) {
            self.deliver(Some(notice));
        }
        if let Some(source) = self.host.poll_countdown(now) {
            self.player.load(source);
        }
    }

    fn deliver(&mut self, notice: Option<PlayerNotice>) {
        if let Some(notice) = notice {
            notice.dispatch(&mut self.host);
        }
    }

    fn publish(&mut self) {
        while let Some(notification) = self.host.take_notification() {
            let _ = self.notifications_tx.send(notification);
        }
        self.host_tx.send_replace(snapshot(&self.player, &self.host));
    }
}

fn snapshot(player: &Player, host: &Host) -> HostSnapshot {
    HostSnapshot {
        current_id: host.current_id().map(str::to_string),
        window_title: player.window_title(),
        continuation: host.continuation(),
        fullscreen: host.is_fullscreen(),
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
