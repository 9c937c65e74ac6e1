//! HLS (HTTP Live Streaming) manifest parser
//!
//! Turns a multivariant playlist into the quality ladder. A media playlist
//! used as the entry point becomes a single-rendition ladder.

use super::{DownloadSample, Manifest, ManifestParser};
use crate::{error::Error, Rendition, Resolution, Result};
use async_trait::async_trait;
use m3u8_rs::{MasterPlaylist, Playlist};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use url::Url;

/// HLS manifest parser
pub struct HlsParser {
    client: Client,
}

impl HlsParser {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Parse playlist text that was loaded from `base_url`
    pub fn parse_content(content: &str, base_url: &Url) -> Result<Manifest> {
        let playlist = m3u8_rs::parse_playlist_res(content.as_bytes())
            .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS playlist: {:?}", e)))?;

        let renditions = match playlist {
            Playlist::MasterPlaylist(master) => extract_renditions(&master, base_url)?,
            Playlist::MediaPlaylist(_) => vec![Rendition {
                index: 0,
                bandwidth: 0,
                resolution: None,
                frame_rate: None,
                codecs: None,
                uri: base_url.clone(),
            }],
        };

        if renditions.is_empty() {
            return Err(Error::InvalidManifest("master playlist has no variants".into()));
        }

        Ok(Manifest {
            renditions,
            base_url: base_url.clone(),
            download: None,
        })
    }
}

impl Default for HlsParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the ladder from a master playlist, sorted by bandwidth
fn extract_renditions(master: &MasterPlaylist, base_url: &Url) -> Result<Vec<Rendition>> {
    let mut renditions = Vec::new();

    for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
        let uri = base_url
            .join(&variant.uri)
            .map_err(|e| Error::InvalidManifest(format!("Invalid URI '{}': {}", variant.uri, e)))?;

        renditions.push(Rendition {
            index: 0,
            bandwidth: variant.bandwidth,
            resolution: variant
                .resolution
                .map(|r| Resolution::new(r.width as u32, r.height as u32)),
            frame_rate: variant.frame_rate,
            codecs: variant.codecs.clone(),
            uri,
        });
    }

    renditions.sort_by_key(|r| r.bandwidth);
    for (index, rendition) in renditions.iter_mut().enumerate() {
        rendition.index = index;
    }

    Ok(renditions)
}

#[async_trait]
impl ManifestParser for HlsParser {
    #[instrument(skip(self))]
    async fn parse(&self, url: &Url) -> Result<Manifest> {
        debug!("Fetching HLS manifest: {}", url);
        let started = Instant::now();

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::ManifestFetch(format!("{} returned {}", url, response.status())));
        }

        let content = response
            .text()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        let mut manifest = Self::parse_content(&content, url)?;
        manifest.download = Some(DownloadSample {
            bytes: content.len(),
            elapsed: started.elapsed(),
        });

        debug!(renditions = manifest.renditions.len(), "HLS manifest parsed");
        Ok(manifest)
    }
}
