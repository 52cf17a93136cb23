//! Reflectivity field extraction from decompressed GRIB2 files.
//!
//! Upstream products are not consistent about which parameter carries the
//! reflectivity field, so [`GridDecoder`] walks an ordered list of
//! [`DecodeStrategy`] filters and keeps the first one that yields a field.

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use radar_common::{GridField, RadarError, RadarResult};
use tracing::{debug, warn};

use crate::tables::LEVEL_SURFACE;
use crate::{Grib2Message, Grib2Reader};

/// Decoded values at or below this are MRMS sentinels (-99 no coverage, -999 missing).
pub const MISSING_VALUE_THRESHOLD: f32 = -99.0;

/// One named filter selecting the message that holds the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// First message whose parameter short name matches.
    ShortName(&'static str),
    /// First message on the given level type (Code Table 4.5).
    LevelType(u8),
    /// No filter: the first message in the file.
    FirstMessage,
}

impl DecodeStrategy {
    pub fn matches(&self, message: &Grib2Message) -> bool {
        match self {
            DecodeStrategy::ShortName(name) => message.parameter() == *name,
            DecodeStrategy::LevelType(level) => message.product_definition.level_type == *level,
            DecodeStrategy::FirstMessage => true,
        }
    }
}

impl fmt::Display for DecodeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStrategy::ShortName(name) => write!(f, "shortName={}", name),
            DecodeStrategy::LevelType(LEVEL_SURFACE) => write!(f, "typeOfLevel=surface"),
            DecodeStrategy::LevelType(level) => write!(f, "typeOfLevel={}", level),
            DecodeStrategy::FirstMessage => write!(f, "first message"),
        }
    }
}

/// A field together with where it came from.
#[derive(Debug, Clone)]
pub struct DecodedGrid {
    /// North-up field, sentinels replaced by `NaN`.
    pub field: GridField,
    /// Display name of the strategy that matched.
    pub strategy: String,
    pub parameter: String,
    pub level: String,
    pub reference_time: DateTime<Utc>,
}

/// Ordered-fallback decoder producing exactly one [`GridField`] per file.
#[derive(Debug, Clone)]
pub struct GridDecoder {
    strategies: Vec<DecodeStrategy>,
}

impl Default for GridDecoder {
    fn default() -> Self {
        Self::new(vec![
            DecodeStrategy::ShortName("REFL"),
            DecodeStrategy::ShortName("DZ"),
            DecodeStrategy::ShortName("RALA"),
            DecodeStrategy::LevelType(LEVEL_SURFACE),
            DecodeStrategy::FirstMessage,
        ])
    }
}

impl GridDecoder {
    pub fn new(strategies: Vec<DecodeStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[DecodeStrategy] {
        &self.strategies
    }

    /// Decode a decompressed GRIB2 file.
    ///
    /// The file is read in one go and closed before decoding starts.
    pub fn decode_file(&self, path: &Path) -> RadarResult<DecodedGrid> {
        let data = std::fs::read(path).map_err(|e| {
            RadarError::Decode {
                reason: format!("cannot read {}: {}", path.display(), e),
                attempted: Vec::new(),
            }
        })?;
        self.decode_bytes(Bytes::from(data))
    }

    /// Decode GRIB2 bytes, trying each strategy in order.
    pub fn decode_bytes(&self, data: Bytes) -> RadarResult<DecodedGrid> {
        let messages = read_messages(data);
        let attempted: Vec<String> = self.strategies.iter().map(ToString::to_string).collect();

        for (strategy, name) in self.strategies.iter().zip(&attempted) {
            let mut matched = false;
            for message in messages.iter().filter(|m| strategy.matches(m)) {
                matched = true;
                match field_from_message(message) {
                    Ok(field) => {
                        debug!(
                            strategy = %name,
                            parameter = message.parameter(),
                            rows = field.rows(),
                            cols = field.cols(),
                            "Decoded reflectivity field"
                        );
                        return Ok(DecodedGrid {
                            field,
                            strategy: name.clone(),
                            parameter: message.parameter().to_string(),
                            level: message.level().to_string(),
                            reference_time: message.identification.reference_time,
                        });
                    }
                    Err(e) => {
                        warn!(
                            strategy = %name,
                            parameter = message.parameter(),
                            error = %e,
                            "Matching message did not yield a field"
                        );
                    }
                }
            }
            if !matched {
                debug!(strategy = %name, "No message matched decode strategy");
            }
        }

        let reason = if messages.is_empty() {
            "file contains no readable GRIB2 messages".to_string()
        } else {
            format!("none of {} messages yielded a field", messages.len())
        };
        Err(RadarError::Decode { reason, attempted })
    }
}

/// Parse every message, skipping the ones that fail to parse.
fn read_messages(data: Bytes) -> Vec<Grib2Message> {
    let mut reader = Grib2Reader::new(data);
    let mut messages = Vec::new();
    loop {
        match reader.next_message() {
            Ok(Some(message)) => messages.push(message),
            Ok(None) => break,
            Err(e) => warn!(error = %e, "Skipping unreadable GRIB2 message"),
        }
    }
    messages
}

/// Unpack one message into a north-up field with sentinels as `NaN`.
fn field_from_message(message: &Grib2Message) -> RadarResult<GridField> {
    let (nj, ni) = message.grid_dims();
    let (rows, cols) = (nj as usize, ni as usize);
    if rows == 0 || cols == 0 {
        return Err(RadarError::decode(format!(
            "message declares an empty {}x{} grid",
            rows, cols
        )));
    }

    let mut values = message
        .unpack_data()
        .map_err(|e| RadarError::decode(e.to_string()))?;
    if values.len() != rows * cols {
        return Err(RadarError::decode(format!(
            "grid declares {}x{} = {} points but {} values were unpacked",
            rows,
            cols,
            rows * cols,
            values.len()
        )));
    }

    for v in values.iter_mut() {
        if *v <= MISSING_VALUE_THRESHOLD {
            *v = f32::NAN;
        }
    }

    let mut field =
        GridField::new(rows, cols, values).map_err(|e| RadarError::decode(e.to_string()))?;
    if message.scans_south_to_north() {
        field.flip_rows();
    }
    Ok(field)
}
