//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Upstream directory listing of MRMS lowest-altitude reflectivity files.
pub const DEFAULT_INDEX_URL: &str = "https://mrms.ncep.noaa.gov/2D/ReflectivityAtLowestAltitude/";

/// Candidate file names in the upstream listing.
pub const DEFAULT_FILE_PATTERN: &str = r"MRMS_ReflectivityAtLowestAltitude.*\.grib2\.gz";

#[derive(Parser, Debug, Clone)]
#[command(name = "radar-api")]
#[command(about = "Serves the latest MRMS reflectivity mosaic as a transparent PNG overlay")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Directory holding downloaded sources and the latest rendered overlay
    #[arg(long, env = "CACHE_DIR", default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Upstream directory index to scan for source files
    #[arg(long, env = "MRMS_INDEX_URL", default_value = DEFAULT_INDEX_URL)]
    pub index_url: String,

    /// Regex a listing entry must match to be a candidate source
    #[arg(long, env = "MRMS_FILE_PATTERN", default_value = DEFAULT_FILE_PATTERN)]
    pub file_pattern: String,

    /// Block size used to shrink the decoded grid
    #[arg(long, env = "DOWNSAMPLE_FACTOR", default_value = "8")]
    pub downsample_factor: u32,

    /// Timeout for fetching the upstream index, in seconds
    #[arg(long, env = "INDEX_TIMEOUT_SECS", default_value = "15")]
    pub index_timeout_secs: u64,

    /// Timeout for downloading a source file, in seconds
    #[arg(long, env = "DOWNLOAD_TIMEOUT_SECS", default_value = "60")]
    pub download_timeout_secs: u64,

    /// Public base URL used to build `image_url` (derived from the Host header when unset)
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            index_url: self.index_url.clone(),
            file_pattern: self.file_pattern.clone(),
            index_timeout: Duration::from_secs(self.index_timeout_secs),
            download_timeout: Duration::from_secs(self.download_timeout_secs),
        }
    }
}

/// Upstream access settings for [`HttpSourceClient`](crate::source::HttpSourceClient).
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub index_url: String,
    pub file_pattern: String,
    pub index_timeout: Duration,
    pub download_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            index_timeout: Duration::from_secs(15),
            download_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["radar-api"]).unwrap();
        assert_eq!(args.listen, "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(args.downsample_factor, 8);
        assert!(args.public_base_url.is_none());

        let source = args.source_config();
        assert_eq!(source.index_url, DEFAULT_INDEX_URL);
        assert_eq!(source.index_timeout, Duration::from_secs(15));
        assert_eq!(source.download_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "radar-api",
            "--downsample-factor",
            "4",
            "--public-base-url",
            "https://radar.example.com",
        ])
        .unwrap();
        assert_eq!(args.downsample_factor, 4);
        assert_eq!(args.public_base_url.as_deref(), Some("https://radar.example.com"));
    }
}
