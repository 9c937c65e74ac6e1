//! Manifest parsing for segmented (HLS) sources

mod hls;

pub use hls::HlsParser;

use crate::{Rendition, Result};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Parsed manifest data
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Quality ladder, ascending bandwidth
    pub renditions: Vec<Rendition>,
    /// URL the manifest was loaded from
    pub base_url: Url,
    /// Transfer statistics of the manifest download, when fetched over HTTP
    pub download: Option<DownloadSample>,
}

/// One timed transfer, used to seed the bandwidth estimate
#[derive(Debug, Clone, Copy)]
pub struct DownloadSample {
    /// Bytes downloaded
    pub bytes: usize,
    /// Time taken
    pub elapsed: Duration,
}

impl DownloadSample {
    /// Calculate throughput in bits per second
    pub fn throughput_bps(&self) -> u64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            ((self.bytes as f64 * 8.0) / self.elapsed.as_secs_f64()) as u64
        } else {
            0
        }
    }
}

/// Trait for manifest parsers
#[async_trait]
pub trait ManifestParser: Send + Sync {
    /// Fetch and parse a manifest from URL
    async fn parse(&self, url: &Url) -> Result<Manifest>;
}

/// Pick the rendition adaptive auto mode starts on: the highest one that fits
/// in 80% of the estimated bandwidth, or the lowest when none fits.
pub fn select_auto_level(renditions: &[Rendition], bandwidth_estimate: u64) -> Option<usize> {
    let available = (bandwidth_estimate as f64 * 0.8) as u64;

    renditions
        .iter()
        .filter(|r| r.bandwidth <= available)
        .max_by_key(|r| r.bandwidth)
        .or_else(|| renditions.iter().min_by_key(|r| r.bandwidth))
        .map(|r| r.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Resolution;

    fn ladder() -> Vec<Rendition> {
        [(400_000, 360), (1_200_000, 720), (4_000_000, 1080)]
            .iter()
            .enumerate()
            .map(|(index, &(bandwidth, height))| Rendition {
                index,
                bandwidth,
                resolution: Some(Resolution::new(height * 16 / 9, height)),
                frame_rate: None,
                codecs: None,
                uri: Url::parse(&format!("https://cdn.example.com/{}.m3u8", height)).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_auto_level_fits_bandwidth() {
        assert_eq!(select_auto_level(&ladder(), 2_000_000), Some(1));
        assert_eq!(select_auto_level(&ladder(), 10_000_000), Some(2));
    }

    #[test]
    fn test_auto_level_falls_back_to_lowest() {
        assert_eq!(select_auto_level(&ladder(), 100_000), Some(0));
        assert_eq!(select_auto_level(&[], 100_000), None);
    }

    #[test]
    fn test_download_throughput() {
        let sample = DownloadSample { bytes: 125_000, elapsed: Duration::from_millis(500) };
        assert_eq!(sample.throughput_bps(), 2_000_000);

        let instant = DownloadSample { bytes: 10, elapsed: Duration::ZERO };
        assert_eq!(instant.throughput_bps(), 0);
    }
}
