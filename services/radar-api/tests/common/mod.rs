//! Mock upstream and helpers shared by the service tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use grib2_parser::GridDecoder;
use radar_api::{RadarService, SourceClient};
use radar_common::{RadarError, RadarResult};
use storage::CacheStore;
use test_utils::{create_storm_cell_grid, gzip_bytes, Grib2Builder};

pub const SOURCE_NAME: &str = "MRMS_ReflectivityAtLowestAltitude_00.50_20250601-120400.grib2.gz";
pub const GRID_COLS: u32 = 32;
pub const GRID_ROWS: u32 = 16;
pub const FACTOR: u32 = 4;

/// What the mock locator reports.
#[derive(Debug, Clone)]
pub enum Listing {
    Newest(String),
    Empty,
    Unreachable,
}

pub struct MockSource {
    listing: Mutex<Listing>,
    payload: Mutex<Vec<u8>>,
    locate_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockSource {
    pub fn new(payload: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            listing: Mutex::new(Listing::Newest(source_url(SOURCE_NAME))),
            payload: Mutex::new(payload),
            locate_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_listing(&self, listing: Listing) {
        *self.listing.lock().unwrap() = listing;
    }

    pub fn set_payload(&self, payload: Vec<u8>) {
        *self.payload.lock().unwrap() = payload;
    }

    pub fn locate_calls(&self) -> usize {
        self.locate_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for MockSource {
    async fn locate(&self) -> RadarResult<Option<String>> {
        self.locate_calls.fetch_add(1, Ordering::SeqCst);
        match self.listing.lock().unwrap().clone() {
            Listing::Newest(url) => Ok(Some(url)),
            Listing::Empty => Ok(None),
            Listing::Unreachable => Err(RadarError::SourceUnavailable(
                "connection refused".to_string(),
            )),
        }
    }

    async fn fetch(&self, _url: &str, dest: &Path) -> RadarResult<u64> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let payload = self.payload.lock().unwrap().clone();
        tokio::fs::write(dest, &payload).await?;
        Ok(payload.len() as u64)
    }
}

pub fn source_url(name: &str) -> String {
    format!("https://mrms.example.test/2D/ReflectivityAtLowestAltitude/{}", name)
}

/// Gzipped GRIB2 file holding one storm cell.
pub fn storm_payload() -> Vec<u8> {
    let values = create_storm_cell_grid(GRID_COLS as usize, GRID_ROWS as usize, 55.0);
    let message = Grib2Builder::new_mrms()
        .with_grid(GRID_COLS, GRID_ROWS)
        .with_data(values)
        .build();
    gzip_bytes(&message)
}

pub async fn open_service(
    dir: &Path,
    source: Arc<MockSource>,
    factor: u32,
) -> (RadarService, Arc<CacheStore>) {
    let cache = Arc::new(CacheStore::open(dir).await.unwrap());
    let service = RadarService::new(source, cache.clone(), GridDecoder::default(), factor);
    (service, cache)
}

/// (width, height) from a PNG IHDR chunk.
pub fn png_dimensions(png: &[u8]) -> (u32, u32) {
    assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10], "not a PNG");
    assert_eq!(&png[12..16], b"IHDR");
    let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
    (width, height)
}
