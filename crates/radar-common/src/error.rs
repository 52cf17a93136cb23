//! Error types for the radar rendering pipeline.

use thiserror::Error;

/// Result type alias using RadarError.
pub type RadarResult<T> = Result<T, RadarError>;

/// Failure kinds raised by the pipeline stages.
///
/// Every stage error is caught by the render orchestrator and turned into
/// either a stale fallback or a hard failure; callers never see these directly.
#[derive(Debug, Error)]
pub enum RadarError {
    /// Locator found nothing, or the upstream fetch failed.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// No decode filter produced a usable field, or the field shape is inconsistent.
    #[error("Decode failed: {reason} (attempted filters: {})", attempted.join(", "))]
    Decode {
        reason: String,
        attempted: Vec<String>,
    },

    /// Bad downsample factor or malformed field.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Filesystem failure reading or writing cache artifacts.
    #[error("Cache I/O error: {0}")]
    CacheIo(String),
}

impl RadarError {
    /// Create a Decode error that carries no filter list (shape problems, bad bytes).
    pub fn decode(reason: impl Into<String>) -> Self {
        RadarError::Decode {
            reason: reason.into(),
            attempted: Vec::new(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        RadarError::InvalidArgument(msg.into())
    }

    /// Short stable label, used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RadarError::SourceUnavailable(_) => "source_unavailable",
            RadarError::Decode { .. } => "decode_error",
            RadarError::InvalidArgument(_) => "invalid_argument",
            RadarError::CacheIo(_) => "cache_io_error",
        }
    }
}

impl From<std::io::Error> for RadarError {
    fn from(err: std::io::Error) -> Self {
        RadarError::CacheIo(err.to_string())
    }
}

impl From<serde_json::Error> for RadarError {
    fn from(err: serde_json::Error) -> Self {
        RadarError::CacheIo(format!("JSON error: {}", err))
    }
}
