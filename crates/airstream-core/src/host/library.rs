//! Library API client and playlist entries

use crate::{config::HostConfig, transport::preview_frame_url, Error, PlaybackSource, Result};
use chrono::{DateTime, Utc};
use reqwest::{multipart, Client};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};
use url::Url;

/// Playlist entry as returned by the library API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Seconds; the API may send a number or an `"mm:ss"` string
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default, alias = "thumbnailUrl")]
    pub thumbnail_url: Option<String>,
    /// Base path of the `thumb_NNNN.jpg` preview sprites
    #[serde(default, alias = "thumbnailsBase")]
    pub thumbnails_base: Option<String>,
    /// Size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default, alias = "s3KeyHls")]
    pub s3_key_hls: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: None,
            filename: None,
            duration: None,
            thumbnail: None,
            thumbnail_url: None,
            thumbnails_base: None,
            size: None,
            created_at: None,
            s3_key_hls: None,
            status: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Title, falling back to the file name and then the id
    pub fn display_title(&self) -> &str {
        let non_empty = |s: &&str| !s.trim().is_empty();
        self.title
            .as_deref()
            .filter(non_empty)
            .or(self.filename.as_deref().filter(non_empty))
            .unwrap_or(&self.id)
    }

    /// Creation time, when the API sent an RFC 3339 timestamp
    pub fn created(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?;
        DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
    }

    /// Still image for the library list
    pub fn thumbnail_image(&self) -> Option<String> {
        self.thumbnail
            .clone()
            .or_else(|| self.thumbnail_url.clone())
            .or_else(|| self.thumbnails_base.as_deref().map(|base| preview_frame_url(base, 1)))
    }

    /// Playable locator: the media URL, else the HLS key
    pub fn locator(&self) -> Option<&str> {
        Some(self.url.as_str())
            .filter(|u| !u.is_empty())
            .or(self.s3_key_hls.as_deref().filter(|k| !k.is_empty()))
    }

    /// Build a playback source. Relative locators resolve against `base`.
    pub fn playback_source(&self, base: Option<&Url>) -> Result<PlaybackSource> {
        let raw = self
            .locator()
            .ok_or_else(|| Error::InvalidSource(format!("item '{}' has no locator", self.id)))?;

        let locator = match (Url::parse(raw), base) {
            (Ok(url), _) => url,
            (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => base.join(raw)?,
            (Err(e), _) => return Err(e.into()),
        };

        let mut source = PlaybackSource::new(locator, self.display_title());
        if let Some(sprites) = &self.thumbnails_base {
            source = source.with_preview_sprites(sprites.clone());
        }
        Ok(source)
    }
}

/// Parse `"ss"`, `"mm:ss"` or `"h:mm:ss"` into seconds
pub fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if !text.contains(':') {
        return text.parse::<f64>().ok().filter(|s| s.is_finite() && *s >= 0.0);
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    parts.iter().try_fold(0.0, |acc, part| {
        let value = part.trim().parse::<f64>().ok().filter(|v| *v >= 0.0)?;
        Some(acc * 60.0 + value)
    })
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(f64),
        Text(String),
    }

    Ok(match Option::<RawDuration>::deserialize(deserializer)? {
        Some(RawDuration::Seconds(s)) if s.is_finite() && s >= 0.0 => Some(s),
        Some(RawDuration::Text(text)) => parse_duration(&text),
        _ => None,
    })
}

/// Human-readable byte size
pub fn format_bytes(size: Option<u64>) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let Some(bytes) = size else {
        return "-".to_string();
    };
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the library API
#[derive(Debug, Clone)]
pub struct LibraryClient {
    client: Client,
    config: HostConfig,
}

impl LibraryClient {
    pub fn new(config: HostConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// `GET {api}/videos`
    #[instrument(skip(self))]
    pub async fn list_videos(&self) -> Result<Vec<MediaItem>> {
        let url = self.config.endpoint("videos")?;
        debug!(%url, "Fetching library");

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(Error::LibraryStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let items: Vec<MediaItem> = response.json().await?;
        info!(count = items.len(), "Library fetched");
        Ok(items)
    }

    /// Upload a file from disk; the title defaults to the file name
    #[instrument(skip(self, path))]
    pub async fn upload_file(&self, path: impl AsRef<Path>, title: Option<String>) -> Result<MediaItem> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Upload(format!("{} has no file name", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        self.upload(file_name, bytes, title).await
    }

    /// `POST {api}/upload` as multipart `file` + `title`
    pub async fn upload(&self, file_name: String, bytes: Vec<u8>, title: Option<String>) -> Result<MediaItem> {
        let url = self.config.endpoint("upload")?;
        let title = title.unwrap_or_else(|| file_name.clone());
        info!(%url, %file_name, bytes = bytes.len(), "Uploading");

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name))
            .text("title", title);

        let response = self.client.post(url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Error::Upload(format!("server responded {}", response.status())));
        }

        let item: MediaItem = response.json().await?;
        info!(id = %item.id, "Upload accepted");
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("06:32"), Some(392.0));
        assert_eq!(parse_duration("1:02:03"), Some(3723.0));
        assert_eq!(parse_duration("42.5"), Some(42.5));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("ab:cd"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }

    #[test]
    fn test_item_accepts_both_spellings() {
        let json = r#"[
            {"id":"a","url":"https://cdn.example.com/a.mp4","duration":"06:32",
             "thumbnailUrl":"https://cdn.example.com/a.jpg","createdAt":"2024-05-01T10:00:00Z","size":2048},
            {"id":"b","url":"","s3_key_hls":"https://cdn.example.com/b/master.m3u8","duration":12.5,
             "filename":"b.mov","thumbnails_base":"/thumbs/b"}
        ]"#;
        let items: Vec<MediaItem> = serde_json::from_str(json).unwrap();

        assert_eq!(items[0].duration, Some(392.0));
        assert_eq!(items[0].thumbnail_url.as_deref(), Some("https://cdn.example.com/a.jpg"));
        assert_eq!(items[0].created().map(|t| t.timestamp()), Some(1_714_557_600));
        assert_eq!(items[0].display_title(), "a");

        assert_eq!(items[1].duration, Some(12.5));
        assert_eq!(items[1].display_title(), "b.mov");
        assert_eq!(items[1].locator(), Some("https://cdn.example.com/b/master.m3u8"));
        assert_eq!(items[1].thumbnail_image().as_deref(), Some("/thumbs/b/thumb_0001.jpg"));
    }

    #[test]
    fn test_playback_source_resolution() {
        let base = Url::parse("http://localhost:5000/").unwrap();
        let mut item = MediaItem::new("a", "/media/a/master.m3u8").with_title("Alpha");
        item.thumbnails_base = Some("/thumbs/a".into());

        let source = item.playback_source(Some(&base)).unwrap();
        assert_eq!(source.locator.as_str(), "http://localhost:5000/media/a/master.m3u8");
        assert_eq!(source.display_title, "Alpha");
        assert_eq!(source.preview_sprite_base.as_deref(), Some("/thumbs/a"));
        assert!(source.is_segmented_manifest());

        assert!(item.playback_source(None).is_err());
        assert!(matches!(
            MediaItem::new("x", "").playback_source(Some(&base)),
            Err(Error::InvalidSource(_))
        ));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(None), "-");
        assert_eq!(format_bytes(Some(512)), "512 B");
        assert_eq!(format_bytes(Some(1536)), "1.5 KB");
        assert_eq!(format_bytes(Some(5 * 1024 * 1024)), "5.0 MB");
    }

    #[tokio::test]
    async fn test_unreachable_library_is_an_error() {
        let config = HostConfig::default().with_api_base(Url::parse("http://127.0.0.1:1").unwrap());
        let client = tokio_test::assert_ok!(LibraryClient::new(config));
        tokio_test::assert_err!(client.list_videos().await);
    }
}
