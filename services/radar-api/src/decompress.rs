//! Gzip decompression of downloaded sources.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use radar_common::{RadarError, RadarResult};
use tempfile::NamedTempFile;
use tracing::debug;

/// Stream-decompress a gzip file into a temp file.
///
/// The returned guard deletes the temp file when dropped, so callers get
/// cleanup on every exit path by holding it until decoding is done.
pub fn gunzip_to_temp(src: &Path) -> RadarResult<NamedTempFile> {
    let input = File::open(src)
        .map_err(|e| RadarError::CacheIo(format!("cannot open {}: {}", src.display(), e)))?;

    let mut output = tempfile::Builder::new()
        .prefix("radar-")
        .suffix(".grib2")
        .tempfile()
        .map_err(|e| RadarError::CacheIo(format!("cannot create temp file: {}", e)))?;

    let mut decoder = MultiGzDecoder::new(BufReader::new(input));
    let written = io::copy(&mut decoder, output.as_file_mut()).map_err(|e| {
        RadarError::decode(format!("corrupt gzip source {}: {}", src.display(), e))
    })?;
    if written == 0 {
        return Err(RadarError::decode(format!(
            "gzip source {} is empty",
            src.display()
        )));
    }

    debug!(
        source = %src.display(),
        decompressed_bytes = written,
        "Decompressed source file"
    );
    Ok(output)
}
