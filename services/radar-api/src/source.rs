//! Upstream source access: locating the newest file and downloading it.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use once_cell::sync::Lazy;
use radar_common::{RadarError, RadarResult};
use regex::Regex;
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::SourceConfig;

/// Access to the upstream collection of compressed source files.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// URL of the newest candidate file, or `None` when the listing has no candidates.
    async fn locate(&self) -> RadarResult<Option<String>>;

    /// Download `url` into `dest`, replacing its contents. Returns the byte count.
    async fn fetch(&self, url: &str, dest: &Path) -> RadarResult<u64>;
}

/// Last path segment of a source URL, used as the cache file name.
pub fn file_name(url: &str) -> RadarResult<String> {
    let parsed = Url::parse(url)
        .map_err(|e| RadarError::SourceUnavailable(format!("invalid source URL {}: {}", url, e)))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RadarError::SourceUnavailable(format!("source URL {} has no file name", url)))
}

static HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("href pattern is valid"));

/// Pick the newest candidate from an HTML directory listing.
///
/// Candidates are `href` targets matching `pattern`, resolved against
/// `base`. File names embed their timestamp, so the lexicographic maximum
/// is the newest.
pub fn newest_candidate(html: &str, base: &Url, pattern: &Regex) -> Option<String> {
    HREF.captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|href| href.as_str())
        .filter(|href| pattern.is_match(href))
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .max()
}

/// [`SourceClient`] that scrapes an HTTP directory index.
pub struct HttpSourceClient {
    client: Client,
    index_url: Url,
    pattern: Regex,
    index_timeout: Duration,
    download_timeout: Duration,
}

impl HttpSourceClient {
    pub fn new(config: SourceConfig) -> RadarResult<Self> {
        let index_url = Url::parse(&config.index_url).map_err(|e| {
            RadarError::invalid_argument(format!("invalid index URL {}: {}", config.index_url, e))
        })?;
        let pattern = Regex::new(&config.file_pattern).map_err(|e| {
            RadarError::invalid_argument(format!("invalid file pattern {}: {}", config.file_pattern, e))
        })?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(2)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RadarError::SourceUnavailable(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            index_url,
            pattern,
            index_timeout: config.index_timeout,
            download_timeout: config.download_timeout,
        })
    }

    pub fn index_url(&self) -> &Url {
        &self.index_url
    }
}

fn upstream_error(context: &str, url: &str, err: reqwest::Error) -> RadarError {
    RadarError::SourceUnavailable(format!("{} {}: {}", context, url, err))
}

#[async_trait]
impl SourceClient for HttpSourceClient {
    async fn locate(&self) -> RadarResult<Option<String>> {
        let url = self.index_url.as_str();
        let html = self
            .client
            .get(self.index_url.clone())
            .timeout(self.index_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream_error("index request failed for", url, e))?
            .text()
            .await
            .map_err(|e| upstream_error("cannot read index", url, e))?;

        let newest = newest_candidate(&html, &self.index_url, &self.pattern);
        debug!(index = %url, newest = ?newest, "Scanned upstream index");
        Ok(newest)
    }

    async fn fetch(&self, url: &str, dest: &Path) -> RadarResult<u64> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream_error("download failed for", url, e))?;

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            RadarError::CacheIo(format!("cannot open {}: {}", dest.display(), e))
        })?;

        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| upstream_error("error reading body of", url, e))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        info!(
            url = %url,
            bytes = downloaded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Downloaded source file"
        );
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_FILE_PATTERN, DEFAULT_INDEX_URL};

    const LISTING: &str = r#"<html><body><pre>
<a href="../">Parent Directory</a>
<a href="MRMS_ReflectivityAtLowestAltitude_00.50_20250601-120000.grib2.gz">MRMS_..._120000.grib2.gz</a>
<a href="MRMS_ReflectivityAtLowestAltitude_00.50_20250601-120400.grib2.gz">MRMS_..._120400.grib2.gz</a>
<a href="MRMS_ReflectivityAtLowestAltitude_00.50_20250601-115800.grib2.gz">MRMS_..._115800.grib2.gz</a>
<a href='MRMS_ReflectivityAtLowestAltitude.latest.grib2'>uncompressed</a>
<a href="MRMS_ReflectivityAtLowestAltitude.latest.grib2.gz.md5">checksum</a>
</pre></body></html>"#;

    fn defaults() -> (Url, Regex) {
        (
            Url::parse(DEFAULT_INDEX_URL).unwrap(),
            Regex::new(DEFAULT_FILE_PATTERN).unwrap(),
        )
    }

    #[test]
    fn test_newest_candidate_sorts_by_name() {
        let (base, pattern) = defaults();
        let newest = newest_candidate(LISTING, &base, &pattern).unwrap();
        assert_eq!(
            newest,
            "https://mrms.ncep.noaa.gov/2D/ReflectivityAtLowestAltitude/\
             MRMS_ReflectivityAtLowestAltitude_00.50_20250601-120400.grib2.gz"
        );
    }

    #[test]
    fn test_pattern_search_is_unanchored() {
        // The checksum entry contains a match, so it counts as a candidate.
        let (base, pattern) = defaults();
        let html = r#"<a href="MRMS_ReflectivityAtLowestAltitude.latest.grib2.gz.md5">x</a>"#;
        assert!(newest_candidate(html, &base, &pattern).is_some());
    }

    #[test]
    fn test_listing_without_candidates() {
        let (base, pattern) = defaults();
        assert_eq!(newest_candidate("<html></html>", &base, &pattern), None);
        assert_eq!(
            newest_candidate(r#"<a href="README.txt">readme</a>"#, &base, &pattern),
            None
        );
    }

    #[test]
    fn test_absolute_hrefs_are_kept() {
        let (base, pattern) = defaults();
        let html = r#"<a href="https://mirror.example.com/MRMS_ReflectivityAtLowestAltitude_x.grib2.gz">m</a>"#;
        assert_eq!(
            newest_candidate(html, &base, &pattern).as_deref(),
            Some("https://mirror.example.com/MRMS_ReflectivityAtLowestAltitude_x.grib2.gz")
        );
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name("https://mrms.example.com/2D/MRMS_a.grib2.gz").unwrap(),
            "MRMS_a.grib2.gz"
        );
        assert!(file_name("https://mrms.example.com/2D/").is_err());
        assert!(file_name("not a url").is_err());
    }

    #[test]
    fn test_client_rejects_bad_pattern() {
        let config = SourceConfig {
            file_pattern: "(".to_string(),
            ..SourceConfig::default()
        };
        assert!(HttpSourceClient::new(config).is_err());
    }
}
