//! Adaptive streaming sessions
//!
//! An [`AdaptiveSession`] loads a segmented manifest, attaches to a media
//! handle and switches renditions. The player treats its internals as opaque
//! and only consumes the events it reports.

use crate::{
    manifest::{select_auto_level, HlsParser, ManifestParser},
    media::{MediaHandle, SessionEvent},
    Rendition, SessionId,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Events reported by an adaptive session
#[derive(Debug, Clone, PartialEq)]
pub enum AdaptiveEvent {
    /// The manifest was parsed; `levels` is the quality ladder
    ManifestParsed { levels: Vec<Rendition> },
    /// The session switched to a rendition
    LevelSwitched { level: usize },
    /// The session hit an error
    Error { message: String, fatal: bool },
}

pub type AdaptiveEventSender = mpsc::UnboundedSender<SessionEvent<AdaptiveEvent>>;
pub type AdaptiveEventReceiver = mpsc::UnboundedReceiver<SessionEvent<AdaptiveEvent>>;

/// Rendition request passed to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelRequest {
    /// Let the session pick renditions
    Auto,
    /// Pin one rendition
    Fixed(usize),
}

/// Factory for adaptive sessions
pub trait AdaptiveBackend: Send {
    /// Whether this runtime can play segmented sources adaptively
    fn is_supported(&self) -> bool;

    /// Create a session whose events are tagged with `id`
    fn create_session(&mut self, id: SessionId, events: AdaptiveEventSender) -> Box<dyn AdaptiveSession>;
}

/// One adaptive streaming session bound to one source
pub trait AdaptiveSession: Send {
    fn id(&self) -> SessionId;

    /// Start loading the manifest at `locator`
    fn load_source(&mut self, locator: &Url);

    /// Attach the session's output to the media handle
    fn attach_media(&mut self, media: &mut dyn MediaHandle);

    fn set_level(&mut self, request: LevelRequest);

    /// Stop all work; no events are sent after this returns
    fn destroy(&mut self);
}

// =============================================================================
// HLS backend
// =============================================================================

/// Adaptive backend for HLS manifests.
///
/// The session parses the multivariant playlist to build the ladder and runs
/// the level policy; segment download and decode are left to the media
/// pipeline the handle wraps.
pub struct HlsBackend {
    client: reqwest::Client,
    default_bandwidth: u64,
}

impl HlsBackend {
    pub fn new(client: reqwest::Client, default_bandwidth: u64) -> Self {
        Self { client, default_bandwidth }
    }
}

impl AdaptiveBackend for HlsBackend {
    fn is_supported(&self) -> bool {
        cfg!(feature = "hls")
    }

    fn create_session(&mut self, id: SessionId, events: AdaptiveEventSender) -> Box<dyn AdaptiveSession> {
        Box::new(HlsSession {
            id,
            client: self.client.clone(),
            events,
            shared: Arc::new(Mutex::new(LadderState {
                levels: Vec::new(),
                bandwidth_estimate: self.default_bandwidth,
                request: LevelRequest::Auto,
                destroyed: false,
            })),
            locator: None,
            loader: None,
        })
    }
}

/// State shared between the session and its loader task
#[derive(Debug)]
struct LadderState {
    levels: Vec<Rendition>,
    bandwidth_estimate: u64,
    request: LevelRequest,
    destroyed: bool,
}

/// HLS adaptive session
pub struct HlsSession {
    id: SessionId,
    client: reqwest::Client,
    events: AdaptiveEventSender,
    shared: Arc<Mutex<LadderState>>,
    locator: Option<Url>,
    loader: Option<JoinHandle<()>>,
}

impl HlsSession {
    fn send(events: &AdaptiveEventSender, id: SessionId, event: AdaptiveEvent) {
        if events.send(SessionEvent::new(id, event)).is_err() {
            debug!(session_id = %id, "Adaptive event receiver dropped");
        }
    }
}

impl AdaptiveSession for HlsSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn load_source(&mut self, locator: &Url) {
        self.locator = Some(locator.clone());

        let id = self.id;
        let url = locator.clone();
        let parser = HlsParser::with_client(self.client.clone());
        let events = self.events.clone();
        let shared = Arc::clone(&self.shared);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(session_id = %id, error = %e, "No async runtime for the manifest loader");
                Self::send(
                    &events,
                    id,
                    AdaptiveEvent::Error {
                        message: format!("no async runtime for the manifest loader: {}", e),
                        fatal: true,
                    },
                );
                return;
            }
        };

        info!(session_id = %id, url = %url, "Loading HLS manifest");

        self.loader = Some(runtime.spawn(async move {
            let result = parser.parse(&url).await;

            let Ok(mut state) = shared.lock() else {
                return;
            };
            if state.destroyed {
                return;
            }

            match result {
                Ok(manifest) => {
                    if let Some(sample) = manifest.download {
                        let measured = sample.throughput_bps();
                        if measured > 0 {
                            state.bandwidth_estimate = measured;
                        }
                    }
                    state.levels = manifest.renditions.clone();

                    let level = match state.request {
                        LevelRequest::Fixed(level) => Some(level),
                        LevelRequest::Auto => select_auto_level(&state.levels, state.bandwidth_estimate),
                    };

                    Self::send(&events, id, AdaptiveEvent::ManifestParsed { levels: manifest.renditions });
                    if let Some(level) = level {
                        Self::send(&events, id, AdaptiveEvent::LevelSwitched { level });
                    }
                }
                Err(e) => {
                    warn!(session_id = %id, error = %e, "HLS manifest load failed");
                    Self::send(&events, id, AdaptiveEvent::Error { message: e.to_string(), fatal: true });
                }
            }
        }));
    }

    fn attach_media(&mut self, media: &mut dyn MediaHandle) {
        // The handle's pipeline demuxes the manifest itself
        if let Some(locator) = &self.locator {
            media.set_source(locator, self.id);
        }
    }

    fn set_level(&mut self, request: LevelRequest) {
        let Ok(mut state) = self.shared.lock() else {
            return;
        };
        state.request = request;
        if state.destroyed || state.levels.is_empty() {
            return;
        }

        let level = match request {
            LevelRequest::Fixed(level) => Some(level),
            LevelRequest::Auto => select_auto_level(&state.levels, state.bandwidth_estimate),
        };
        if let Some(level) = level {
            Self::send(&self.events, self.id, AdaptiveEvent::LevelSwitched { level });
        }
    }

    fn destroy(&mut self) {
        if let Ok(mut state) = self.shared.lock() {
            state.destroyed = true;
        }
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
        debug!(session_id = %self.id, "HLS session destroyed");
    }
}

impl Drop for HlsSession {
    fn drop(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::time::{timeout, Duration};

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080p/index.m3u8
";

    /// Serve `body` to every connection; returns the manifest URL
    async fn serve(body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/vnd.apple.mpegurl\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Url::parse(&format!("http://{}/hls/master.m3u8", addr)).unwrap()
    }

    fn session(events: AdaptiveEventSender) -> (SessionId, Box<dyn AdaptiveSession>) {
        let id = SessionId::new();
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let mut backend = HlsBackend::new(client, 1_000_000);
        (id, backend.create_session(id, events))
    }

    async fn next(rx: &mut AdaptiveEventReceiver) -> SessionEvent<AdaptiveEvent> {
        timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_manifest_parsed_then_level_switched() {
        let url = serve(MASTER).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (id, mut session) = session(tx);
        session.load_source(&url);

        let parsed = next(&mut rx).await;
        assert_eq!(parsed.session, id);
        let AdaptiveEvent::ManifestParsed { levels } = parsed.event else {
            panic!("expected ManifestParsed");
        };
        assert_eq!(levels.iter().map(|r| r.label()).collect::<Vec<_>>(), vec!["360p", "720p", "1080p"]);

        let switched = next(&mut rx).await;
        assert!(matches!(switched.event, AdaptiveEvent::LevelSwitched { level } if level < 3));
    }

    #[tokio::test]
    async fn test_fixed_level_before_manifest_is_honoured() {
        let url = serve(MASTER).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_, mut session) = session(tx);
        session.set_level(LevelRequest::Fixed(1));
        session.load_source(&url);

        assert!(matches!(next(&mut rx).await.event, AdaptiveEvent::ManifestParsed { .. }));
        assert_eq!(next(&mut rx).await.event, AdaptiveEvent::LevelSwitched { level: 1 });
    }

    #[tokio::test]
    async fn test_auto_reruns_level_policy() {
        let url = serve(MASTER).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_, mut session) = session(tx);
        session.load_source(&url);

        assert!(matches!(next(&mut rx).await.event, AdaptiveEvent::ManifestParsed { .. }));
        let AdaptiveEvent::LevelSwitched { level: auto } = next(&mut rx).await.event else {
            panic!("expected LevelSwitched");
        };

        session.set_level(LevelRequest::Fixed(0));
        assert_eq!(next(&mut rx).await.event, AdaptiveEvent::LevelSwitched { level: 0 });

        // Same estimate, same pick
        session.set_level(LevelRequest::Auto);
        assert_eq!(next(&mut rx).await.event, AdaptiveEvent::LevelSwitched { level: auto });
    }

    #[tokio::test]
    async fn test_level_request_before_manifest_is_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_, mut session) = session(tx);
        session.set_level(LevelRequest::Fixed(2));
        session.set_level(LevelRequest::Auto);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroyed_session_goes_quiet() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_, mut session) = session(tx);
        session.load_source(&Url::parse("http://127.0.0.1:1/x.m3u8").unwrap());
        session.destroy();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());

        session.set_level(LevelRequest::Auto);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_load_without_runtime_reports_fatal_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (id, mut session) = session(tx);
        session.load_source(&Url::parse("https://cdn.example.com/master.m3u8").unwrap());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.session, id);
        assert!(matches!(event.event, AdaptiveEvent::Error { fatal: true, .. }));
    }

    #[test]
    fn test_hls_backend_supported_with_feature() {
        let backend = HlsBackend::new(reqwest::Client::new(), 1_000_000);
        assert_eq!(backend.is_supported(), cfg!(feature = "hls"));
    }
}
