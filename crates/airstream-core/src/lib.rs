//! AIrStream Core - Adaptive Playback Controller
//!
//! This crate provides the core of the AIrStream watch client:
//! - Direct or HLS-manifest playback bound to an abstract media handle
//! - Quality ladder parsing and auto/pinned rendition selection
//! - Transport controls: auto-hiding controls, hover preview scrubbing,
//!   double-activation seeking and keyboard shortcuts
//! - "Up next" continuation countdown
//! - Host integration: playlist, library API client, persisted state
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Player Runtime                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Media     │  │   Adaptive   │  │   Commands   │           │
//! │  │    Events    │  │    Events    │  │  & Timers    │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │         └─────────────────┼─────────────────┘                   │
//! │                           │                                     │
//! │                    ┌──────┴──────┐        ┌──────────────┐      │
//! │                    │   Player    │───────▶│     Host     │      │
//! │                    │             │notices │  (playlist,  │      │
//! │                    └──────┬──────┘        │  up next)    │      │
//! │                           │               └──────────────┘      │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │  Transport   │  │  Playback   │  │   Display    │            │
//! │  │  Controls    │  │   Engine    │  │   Surface    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod manifest;
pub mod media;
pub mod adaptive;
pub mod engine;
pub mod input;
pub mod transport;
pub mod player;
pub mod continuation;
pub mod host;
pub mod simulated;
pub mod runtime;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
pub use types::*;
pub use config::{HostConfig, PlayerConfig};
pub use manifest::{HlsParser, Manifest, ManifestParser};
pub use media::{DisplaySurface, HeadlessSurface, MediaEvent, MediaHandle, SessionEvent};
pub use adaptive::{AdaptiveBackend, AdaptiveEvent, HlsBackend};
pub use engine::{PlaybackEngine, PlaybackMode};
pub use transport::{TransportAction, TransportControls, TransportState};
pub use player::{Player, PlayerCallbacks, PlayerNotice};
pub use continuation::{ContinuationController, ContinuationState, ContinuationTarget};
pub use host::{Host, LibraryClient, MediaItem, Notification, PersistedState};
pub use simulated::SimulatedMedia;
pub use runtime::{Command, PlayerRuntime, RuntimeHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "AIrStream Core initialized");
}
