//! Prometheus counters for the render pipeline.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

pub const RENDER_TOTAL: &str = "radar_render_total";
pub const RENDER_STAGE_FAILURES: &str = "radar_render_stage_failures_total";
pub const RENDER_DURATION: &str = "radar_render_duration_seconds";
pub const SOURCE_DOWNLOADS: &str = "radar_source_downloads_total";
pub const SOURCE_DOWNLOAD_BYTES: &str = "radar_source_download_bytes_total";
pub const SOURCE_CACHE_HITS: &str = "radar_source_cache_hits_total";

/// Register metric descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(RENDER_TOTAL, "Raster requests by outcome (fresh, stale, failed)");
    describe_counter!(RENDER_STAGE_FAILURES, "Pipeline failures by stage");
    describe_histogram!(RENDER_DURATION, "Wall time of pipeline runs");
    describe_counter!(SOURCE_DOWNLOADS, "Source files downloaded from upstream");
    describe_counter!(SOURCE_DOWNLOAD_BYTES, "Bytes downloaded from upstream");
    describe_counter!(SOURCE_CACHE_HITS, "Source files reused from the cache directory");
}

pub fn record_render(outcome: &'static str, elapsed: Duration) {
    counter!(RENDER_TOTAL, "outcome" => outcome).increment(1);
    histogram!(RENDER_DURATION, "outcome" => outcome).record(elapsed.as_secs_f64());
}

pub fn record_stage_failure(stage: &'static str, kind: &'static str) {
    counter!(RENDER_STAGE_FAILURES, "stage" => stage, "kind" => kind).increment(1);
}

pub fn record_download(bytes: u64) {
    counter!(SOURCE_DOWNLOADS).increment(1);
    counter!(SOURCE_DOWNLOAD_BYTES).increment(bytes);
}

pub fn record_source_cache_hit() {
    counter!(SOURCE_CACHE_HITS).increment(1);
}
