//! CLI command implementations

use crate::output::{self, OutputFormat};
use airstream_core::{
    host::{format_bytes, FileStore, Theme, WatchStatus},
    manifest::select_auto_level,
    runtime::HostSnapshot,
    transport::format_timestamp,
    HeadlessSurface, HlsBackend, HlsParser, Host, HostConfig, LibraryClient, ManifestParser, Player,
    PlayerConfig, PlayerRuntime, SimulatedMedia, TransportState,
};
use anyhow::{anyhow, bail, Context as _};
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::Tabled;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

/// State file used when none is configured
pub const DEFAULT_STATE_FILE: &str = "airstream-state.json";

/// Shared command context
pub struct Context {
    pub host: HostConfig,
    pub player: PlayerConfig,
    pub format: OutputFormat,
}

impl Context {
    fn client(&self) -> anyhow::Result<LibraryClient> {
        Ok(LibraryClient::new(self.host.clone())?)
    }

    fn state_file(&self) -> PathBuf {
        self.host
            .state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    /// Host restored from the state file
    fn open_host(&self) -> anyhow::Result<Host> {
        let path = self.state_file();
        let store = FileStore::open(&path).with_context(|| format!("opening state file {}", path.display()))?;
        Ok(Host::new(Box::new(store), &self.player).with_media_base(self.host.api_base_url.clone()))
    }
}

fn flush_notifications(host: &mut Host) {
    while let Some(notification) = host.take_notification() {
        output::print_notification(&notification);
    }
}

// =============================================================================
// Library
// =============================================================================

#[derive(Tabled, Serialize)]
struct LibraryRow {
    #[tabled(rename = "")]
    #[serde(skip)]
    marker: &'static str,
    id: String,
    title: String,
    duration: String,
    size: String,
    watched: String,
    status: String,
}

fn library_rows(host: &Host) -> Vec<LibraryRow> {
    host.playlist()
        .iter()
        .map(|item| LibraryRow {
            marker: if host.current_id() == Some(item.id.as_str()) { "▶" } else { "" },
            id: item.id.clone(),
            title: item.display_title().to_string(),
            duration: format_timestamp(item.duration),
            size: format_bytes(item.size),
            watched: format!("{:.0}%", host.watch_progress(&item.id) * 100.0),
            status: host.watch_status(&item.id).label().to_string(),
        })
        .collect()
}

/// List the library with watch progress
pub async fn library(ctx: &Context) -> anyhow::Result<()> {
    let client = ctx.client()?;
    let mut host = ctx.open_host()?;

    let spinner = output::spinner(format!("Fetching {}", client.config().endpoint("videos")?));
    host.refresh(&client).await;
    spinner.finish_and_clear();
    flush_notifications(&mut host);

    if host.playlist().is_empty() {
        println!("{}", output::dim("No videos available"));
        return Ok(());
    }

    println!("{}", output::heading(&format!("Library ({} videos)", host.playlist().len())));
    output::print_rows(&library_rows(&host), ctx.format)
}

// =============================================================================
// Upload
// =============================================================================

/// Upload a file and select it
pub async fn upload(ctx: &Context, file: &Path, title: Option<String>) -> anyhow::Result<()> {
    if !file.is_file() {
        bail!("{} is not a file", file.display());
    }

    let client = ctx.client()?;
    let mut host = ctx.open_host()?;

    let spinner = output::spinner(format!("Uploading {}", file.display()));
    let selected = host.upload(&client, file, title).await;
    spinner.finish_and_clear();
    flush_notifications(&mut host);

    let source = selected.ok_or_else(|| anyhow!("upload of {} failed", file.display()))?;
    output::print_value(
        &host.current_item(),
        &format!("{} -> {}", source.display_title, source.locator),
        ctx.format,
    )
}

// =============================================================================
// Ladder
// =============================================================================

#[derive(Tabled, Serialize)]
struct LadderRow {
    #[tabled(rename = "")]
    #[serde(skip)]
    marker: &'static str,
    index: usize,
    quality: String,
    resolution: String,
    bandwidth: String,
    frame_rate: String,
    codecs: String,
}

/// Show the quality ladder and the auto pick
pub async fn ladder(ctx: &Context, manifest_url: &str, bandwidth: Option<u64>) -> anyhow::Result<()> {
    let url = Url::parse(manifest_url)?;
    let parser = HlsParser::new();

    let spinner = output::spinner(format!("Loading {}", url));
    let manifest = parser.parse(&url).await;
    spinner.finish_and_clear();
    let manifest = manifest?;

    let measured = manifest.download.map(|d| d.throughput_bps()).filter(|bps| *bps > 0);
    let estimate = bandwidth.or(measured).unwrap_or(ctx.player.default_bandwidth_estimate);
    let auto = select_auto_level(&manifest.renditions, estimate);
    debug!(estimate, ?auto, "Auto level");

    let rows: Vec<LadderRow> = manifest
        .renditions
        .iter()
        .map(|r| LadderRow {
            marker: if Some(r.index) == auto { "auto" } else { "" },
            index: r.index,
            quality: r.label(),
            resolution: r.resolution.map(|res| res.to_string()).unwrap_or_else(|| "-".into()),
            bandwidth: match r.bandwidth {
                0 => "-".to_string(),
                bps => format!("{} kbps", bps / 1000),
            },
            frame_rate: r.frame_rate.map(|f| format!("{:.2}", f)).unwrap_or_else(|| "-".into()),
            codecs: r.codecs.clone().unwrap_or_else(|| "-".into()),
        })
        .collect();

    println!(
        "{} {}",
        output::heading(&format!("{} renditions", rows.len())),
        output::dim(&format!("(estimate {} kbps)", estimate / 1000))
    );
    output::print_rows(&rows, ctx.format)
}

// =============================================================================
// Watch
// =============================================================================

/// Options for a simulated watch session
pub struct WatchOptions {
    pub start_id: Option<String>,
    pub speed: f64,
    pub count: usize,
    pub fallback_duration: f64,
    pub disable_autoplay: bool,
}

fn render_transport(bar: &ProgressBar, state: &TransportState) {
    bar.set_length((state.duration * 1000.0) as u64);
    bar.set_position((state.current_time * 1000.0) as u64);

    let mut message = state.time_label();
    if state.is_buffering {
        message.push_str("  buffering");
    }
    if let Some(level) = state.active_level.and_then(|i| state.available_qualities.get(i)) {
        message.push_str(&format!("  {} ({})", level.label(), state.selected_quality));
    }
    bar.set_message(message);
}

fn finished(state: &TransportState) -> bool {
    state.duration > 0.0 && state.current_time >= state.duration && !state.is_playing
}

/// Play through the library in a simulated player
pub async fn watch(ctx: &Context, options: WatchOptions) -> anyhow::Result<()> {
    let client = ctx.client()?;
    let mut host = ctx.open_host()?;
    if options.disable_autoplay {
        host.set_autoplay_next(false);
    }

    let spinner = output::spinner("Fetching library");
    host.refresh(&client).await;
    spinner.finish_and_clear();
    flush_notifications(&mut host);

    if host.playlist().is_empty() {
        bail!("No videos available");
    }
    if let Some(id) = &options.start_id {
        host.select(id).ok_or_else(|| anyhow!("no playable item with id '{}'", id))?;
    }

    // Without a next item or with autoplay off, the first item is also the last
    let continues = host.autoplay_next() && host.playlist().len() > 1;

    let (media_tx, media_rx) = mpsc::unbounded_channel();
    let (adaptive_tx, adaptive_rx) = mpsc::unbounded_channel();

    let mut media = SimulatedMedia::new(media_tx, options.speed, options.fallback_duration);
    for item in host.playlist() {
        if let (Some(duration), Ok(source)) = (item.duration, item.playback_source(Some(&ctx.host.api_base_url))) {
            media = media.with_duration(source.locator, duration);
        }
    }

    let http = reqwest::Client::builder().timeout(ctx.host.request_timeout()).build()?;
    let player = Player::new(
        &ctx.player,
        Box::new(media),
        Box::new(HlsBackend::new(http, ctx.player.default_bandwidth_estimate)),
        Box::new(HeadlessSurface::new()),
        adaptive_tx,
    )?;

    let (runtime, mut handle) = PlayerRuntime::new(player, host, media_rx, adaptive_rx);
    let task = tokio::spawn(runtime.run());

    let bar = output::playback_bar();
    let mut current: Option<String> = None;
    let mut played = 0usize;
    let mut announced: Option<u32> = None;

    loop {
        tokio::select! {
            changed = handle.transport.changed() => {
                if changed.is_err() {
                    break;
                }
                render_transport(&bar, &handle.transport.borrow_and_update());
            }
            changed = handle.host.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot: HostSnapshot = handle.host.borrow_and_update().clone();
                bar.set_prefix(snapshot.window_title.clone());

                if snapshot.current_id.is_some() && snapshot.current_id != current {
                    current = snapshot.current_id.clone();
                    played += 1;
                    announced = None;
                    bar.println(format!("▶ {}", snapshot.window_title));
                }

                let countdown = &snapshot.continuation;
                if countdown.visible && announced != Some(countdown.remaining_seconds) {
                    announced = Some(countdown.remaining_seconds);
                    if let Some(target) = &countdown.target {
                        bar.println(output::dim(&format!(
                            "Up next in {}s: {}",
                            countdown.remaining_seconds, target.source.display_title
                        )));
                    }
                }

                if finished(&handle.transport.borrow()) && (!continues || played >= options.count) {
                    break;
                }
            }
            Some(notification) = handle.notifications.recv() => {
                bar.suspend(|| output::print_notification(&notification));
            }
            _ = tokio::signal::ctrl_c() => {
                bar.println("Interrupted");
                break;
            }
        }
    }

    handle.shutdown();
    let host = task.await?;
    bar.finish_and_clear();

    if let Some(item) = host.current_item() {
        let position = host.watch_position(&item.id).unwrap_or_default();
        println!(
            "{} {} at {} / {}",
            output::heading("Stopped:"),
            item.display_title(),
            format_timestamp(Some(position.t)),
            format_timestamp(Some(position.d))
        );
    }
    Ok(())
}

// =============================================================================
// Preferences
// =============================================================================

/// Show or set the theme
pub fn theme(ctx: &Context, value: Option<&str>) -> anyhow::Result<()> {
    let mut host = ctx.open_host()?;
    if let Some(value) = value {
        let theme: Theme = value.parse()?;
        host.set_theme(theme);
    }
    let theme = host.theme();
    output::print_value(&theme, &format!("Theme: {}", theme), ctx.format)
}

#[derive(Tabled, Serialize)]
struct PositionRow {
    id: String,
    position: String,
    duration: String,
    watched: String,
    status: String,
}

/// List saved watch positions
pub fn positions(ctx: &Context) -> anyhow::Result<()> {
    let host = ctx.open_host()?;

    let mut ids: Vec<&String> = host.watch_positions().keys().collect();
    ids.sort();

    let rows: Vec<PositionRow> = ids
        .into_iter()
        .filter_map(|id| host.watch_position(id).map(|p| (id, p)))
        .map(|(id, p)| PositionRow {
            id: id.clone(),
            position: format_timestamp(Some(p.t)),
            duration: format_timestamp(Some(p.d)),
            watched: format!("{:.0}%", p.fraction() * 100.0),
            status: if p.t > 0.0 { WatchStatus::Resumable } else { WatchStatus::New }.label().to_string(),
        })
        .collect();

    if rows.is_empty() {
        println!("{}", output::dim("No saved positions"));
        return Ok(());
    }
    output::print_rows(&rows, ctx.format)
}
