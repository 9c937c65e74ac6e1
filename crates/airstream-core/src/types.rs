//! Core types for AIrStream

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Segmented-manifest extension that selects adaptive playback
pub const MANIFEST_EXTENSION: &str = ".m3u8";

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Vertical-resolution label shown in the quality menu ("720p")
    pub fn label(&self) -> String {
        format!("{}p", self.height)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One fixed-bitrate variant in the quality ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    /// Position in the ladder (ascending bandwidth)
    pub index: usize,
    /// Bandwidth in bits per second
    pub bandwidth: u64,
    /// Video resolution, when the manifest declares one
    pub resolution: Option<Resolution>,
    /// Frame rate, when declared
    pub frame_rate: Option<f64>,
    /// Raw CODECS attribute
    pub codecs: Option<String>,
    /// URI of the variant playlist
    pub uri: Url,
}

impl Rendition {
    /// Menu label: vertical resolution when known, otherwise the bitrate.
    /// A rendition with no declared bandwidth is the source stream itself.
    pub fn label(&self) -> String {
        match self.resolution {
            Some(r) => r.label(),
            None if self.bandwidth == 0 => "source".to_string(),
            None => format!("{} kbps", self.bandwidth / 1000),
        }
    }
}

/// Quality selection: adaptive auto mode or a pinned rendition index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitySelection {
    #[default]
    Auto,
    Pinned(usize),
}

impl QualitySelection {
    pub fn is_auto(&self) -> bool {
        matches!(self, QualitySelection::Auto)
    }
}

impl std::fmt::Display for QualitySelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualitySelection::Auto => write!(f, "auto"),
            QualitySelection::Pinned(i) => write!(f, "{}", i),
        }
    }
}

/// What a player is asked to play.
///
/// A source is immutable once bound; binding a different source tears the
/// previous session down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSource {
    /// Media or manifest locator
    pub locator: Url,
    /// Human-readable title
    pub display_title: String,
    /// Base path of the `thumb_NNNN.jpg` preview sprites
    pub preview_sprite_base: Option<String>,
}

impl PlaybackSource {
    pub fn new(locator: Url, display_title: impl Into<String>) -> Self {
        Self {
            locator,
            display_title: display_title.into(),
            preview_sprite_base: None,
        }
    }

    /// Parse the locator from a string
    pub fn parse(locator: &str, display_title: impl Into<String>) -> crate::Result<Self> {
        Ok(Self::new(Url::parse(locator)?, display_title))
    }

    pub fn with_preview_sprites(mut self, base: impl Into<String>) -> Self {
        self.preview_sprite_base = Some(base.into());
        self
    }

    /// True when the locator points at a segmented manifest
    pub fn is_segmented_manifest(&self) -> bool {
        self.locator
            .path()
            .to_ascii_lowercase()
            .ends_with(MANIFEST_EXTENSION)
    }
}
