//! Render orchestration with stale fallback.
//!
//! A request runs the whole pipeline: locate the newest upstream file,
//! download it unless it is already cached, decompress, decode, downsample,
//! colorize and encode, then commit the result as the new "latest" record.
//! Any stage failure falls back to the previously committed raster; only
//! when none exists does the request fail.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use grib2_parser::GridDecoder;
use radar_common::{RadarError, RadarResult};
use storage::CacheStore;
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::decompress::gunzip_to_temp;
use crate::metrics;
use crate::source::{self, SourceClient};

/// Pipeline step a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Locate,
    Download,
    Decompress,
    Decode,
    Downsample,
    Colorize,
    /// The blocking decode/downsample/colorize task as a whole.
    Render,
    Commit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Locate => "locate",
            Stage::Download => "download",
            Stage::Decompress => "decompress",
            Stage::Decode => "decode",
            Stage::Downsample => "downsample",
            Stage::Colorize => "colorize",
            Stage::Render => "render",
            Stage::Commit => "commit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one raster request.
#[derive(Debug)]
pub enum RenderOutcome {
    /// The pipeline succeeded and the new raster is now the latest record.
    Fresh { png: Bytes, last_updated: String },
    /// The pipeline failed; the previously committed raster is served unchanged.
    Stale {
        png: Bytes,
        stage: Stage,
        cause: RadarError,
    },
    /// The upstream listing had no candidate file and nothing is cached.
    NoSource(RadarError),
    /// The pipeline failed and nothing is cached.
    Failed { stage: Stage, cause: RadarError },
}

impl RenderOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RenderOutcome::Fresh { .. } => "fresh",
            RenderOutcome::Stale { .. } => "stale",
            RenderOutcome::NoSource(_) | RenderOutcome::Failed { .. } => "failed",
        }
    }

    /// Raster bytes to serve, if any.
    pub fn png(&self) -> Option<&Bytes> {
        match self {
            RenderOutcome::Fresh { png, .. } | RenderOutcome::Stale { png, .. } => Some(png),
            RenderOutcome::NoSource(_) | RenderOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug)]
struct StageError {
    stage: Stage,
    cause: RadarError,
    /// Locator answered but listed no candidates.
    no_candidate: bool,
}

impl StageError {
    fn new(stage: Stage, cause: RadarError) -> Self {
        Self {
            stage,
            cause,
            no_candidate: false,
        }
    }
}

/// A blocking task that panicked or was cancelled.
fn task_failure(stage: Stage, err: JoinError) -> StageError {
    StageError::new(
        stage,
        RadarError::decode(format!("{} task failed: {}", stage, err)),
    )
}

/// Decompression errors that mean the cached source itself is bad.
fn source_is_corrupt(err: &RadarError) -> bool {
    matches!(err, RadarError::Decode { .. })
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<RadarError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e.into()))
    }
}

/// Runs the render pipeline against a source and a cache directory.
pub struct RadarService {
    source: Arc<dyn SourceClient>,
    cache: Arc<CacheStore>,
    decoder: GridDecoder,
    downsample_factor: u32,
    /// Serializes pipeline runs.
    render_lock: Mutex<()>,
}

impl RadarService {
    pub fn new(
        source: Arc<dyn SourceClient>,
        cache: Arc<CacheStore>,
        decoder: GridDecoder,
        downsample_factor: u32,
    ) -> Self {
        Self {
            source,
            cache,
            decoder,
            downsample_factor,
            render_lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn downsample_factor(&self) -> u32 {
        self.downsample_factor
    }

    /// Time of the last successful render.
    pub async fn last_updated(&self) -> RadarResult<Option<String>> {
        self.cache.last_updated().await
    }

    /// Run the pipeline and decide between fresh, stale and failed.
    pub async fn render_latest(&self) -> RenderOutcome {
        let _guard = self.render_lock.lock().await;
        let start = Instant::now();

        let outcome = match self.run_pipeline().await {
            Ok((png, last_updated)) => {
                info!(
                    bytes = png.len(),
                    last_updated = %last_updated,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Rendered fresh radar overlay"
                );
                RenderOutcome::Fresh { png, last_updated }
            }
            Err(failure) => self.fall_back(failure).await,
        };

        metrics::record_render(outcome.label(), start.elapsed());
        outcome
    }

    async fn fall_back(&self, failure: StageError) -> RenderOutcome {
        let StageError {
            stage,
            cause,
            no_candidate,
        } = failure;
        metrics::record_stage_failure(stage.as_str(), cause.kind());

        match self.cache.latest_raster().await {
            Ok(Some(png)) => {
                warn!(
                    stage = %stage,
                    kind = cause.kind(),
                    error = %cause,
                    "Render failed, serving stale cached overlay"
                );
                RenderOutcome::Stale { png, stage, cause }
            }
            Ok(None) => {
                error!(
                    stage = %stage,
                    kind = cause.kind(),
                    error = %cause,
                    "Render failed and no cached overlay exists"
                );
                if no_candidate {
                    RenderOutcome::NoSource(cause)
                } else {
                    RenderOutcome::Failed { stage, cause }
                }
            }
            Err(cache_err) => {
                error!(
                    stage = %stage,
                    error = %cause,
                    cache_error = %cache_err,
                    "Render failed and the cached overlay is unreadable"
                );
                RenderOutcome::Failed { stage, cause }
            }
        }
    }

    async fn run_pipeline(&self) -> Result<(Bytes, String), StageError> {
        let url = self
            .source
            .locate()
            .await
            .at(Stage::Locate)?
            .ok_or_else(|| StageError {
                stage: Stage::Locate,
                cause: RadarError::SourceUnavailable(
                    "upstream index lists no candidate files".to_string(),
                ),
                no_candidate: true,
            })?;
        let basename = source::file_name(&url).at(Stage::Locate)?;

        self.ensure_source(&url, &basename).await?;

        let gz_path = self.cache.source_path(&basename).at(Stage::Decompress)?;
        let decompressed = match tokio::task::spawn_blocking(move || gunzip_to_temp(&gz_path))
            .await
            .map_err(|e| task_failure(Stage::Decompress, e))?
        {
            Ok(file) => file,
            Err(e) => {
                // A truncated or corrupt file is dropped so the next request
                // downloads it again.
                if source_is_corrupt(&e) {
                    if let Err(remove_err) = self.cache.remove_source(&basename).await {
                        warn!(file = %basename, error = %remove_err, "Could not remove corrupt source");
                    }
                }
                return Err(StageError::new(Stage::Decompress, e));
            }
        };

        let decoder = self.decoder.clone();
        let factor = self.downsample_factor;
        let png = tokio::task::spawn_blocking(move || -> Result<Bytes, StageError> {
            let decoded = decoder.decode_file(decompressed.path()).at(Stage::Decode)?;
            // The temp file is no longer needed once decoded.
            drop(decompressed);
            debug!(
                strategy = %decoded.strategy,
                parameter = %decoded.parameter,
                level = %decoded.level,
                reference_time = %decoded.reference_time,
                "Decoded source grid"
            );

            let field = grid_processor::downsample(decoded.field, factor).at(Stage::Downsample)?;
            let raster = renderer::colorize(&field);
            let png = raster.encode_png().at(Stage::Colorize)?;
            debug!(
                width = raster.width(),
                height = raster.height(),
                opaque = raster.opaque_count(),
                "Colorized overlay"
            );
            Ok(Bytes::from(png))
        })
        .await
        .map_err(|e| task_failure(Stage::Render, e))??;

        let last_updated = self
            .cache
            .commit(png.clone(), Utc::now())
            .await
            .at(Stage::Commit)?;
        Ok((png, last_updated))
    }

    /// Download the source unless a file with the same name is cached.
    async fn ensure_source(&self, url: &str, basename: &str) -> Result<(), StageError> {
        if self.cache.has_source(basename).await.at(Stage::Download)? {
            debug!(file = %basename, "Reusing cached source file");
            metrics::record_source_cache_hit();
            return Ok(());
        }

        let staged = self.cache.staging_file().at(Stage::Download)?;
        let bytes = self
            .source
            .fetch(url, staged.path())
            .await
            .at(Stage::Download)?;
        self.cache
            .persist_source(staged, basename)
            .at(Stage::Download)?;

        metrics::record_download(bytes);
        info!(url = %url, file = %basename, bytes, "Stored source file");
        Ok(())
    }
}
