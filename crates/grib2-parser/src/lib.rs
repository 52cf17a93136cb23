//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! Reads the messages of a GRIB2 file, unpacks their data sections and
//! turns the reflectivity field of an MRMS product into a [`GridField`].
//!
//! Simple packing (template 5.0) is unpacked natively; PNG, complex and
//! JPEG2000 packings are handed to the `grib` crate.
//!
//! [`GridField`]: radar_common::GridField

pub mod decoder;
pub mod sections;
pub mod tables;
pub mod unpacking;

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

pub use decoder::{DecodeStrategy, DecodedGrid, GridDecoder, MISSING_VALUE_THRESHOLD};
pub use sections::{
    Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
pub use tables::{Grib2Tables, LevelDescription};
pub use unpacking::unpack_simple;

/// Errors raised while parsing GRIB2 bytes.
#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unpacking failed: {0}")]
    UnpackingError(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Scanning mode flag (Flag Table 3.4): points scan in the +j (south to north) direction.
const SCAN_POSITIVE_J: u8 = 0b0100_0000;

/// One GRIB2 message (first field only when a message repeats sections 4-7).
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    /// Raw bytes of the whole message, kept for the `grib` crate fallback.
    pub raw: Bytes,
}

impl Grib2Message {
    /// Parameter short name (e.g. "REFL").
    pub fn parameter(&self) -> &str {
        &self.product_definition.parameter_short_name
    }

    /// Level description (e.g. "surface", "500 m above MSL").
    pub fn level(&self) -> &str {
        &self.product_definition.level_description
    }

    /// Grid dimensions as (nj, ni) = (rows, cols).
    pub fn grid_dims(&self) -> (u32, u32) {
        (
            self.grid_definition.num_points_latitude,
            self.grid_definition.num_points_longitude,
        )
    }

    /// True when rows are stored south to north.
    pub fn scans_south_to_north(&self) -> bool {
        self.grid_definition.scanning_mode & SCAN_POSITIVE_J != 0
    }

    /// Unpack the data section into one value per grid point.
    ///
    /// Bitmap-masked points come back as `NaN`.
    pub fn unpack_data(&self) -> Result<Vec<f32>, Grib2Error> {
        let dr = &self.data_representation;
        match dr.template_number {
            0 => {
                let bitmap = self.bitmap.as_ref().map(|b| b.data.as_ref());
                let values = unpack_simple(
                    &self.data_section.data,
                    self.grid_definition.num_data_points,
                    dr.bits_per_value,
                    dr.reference_value,
                    dr.binary_scale_factor,
                    dr.decimal_scale_factor,
                    bitmap,
                )?;
                Ok(values.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
            }
            _ => unpacking::unpack_with_grib_crate(&self.raw),
        }
    }
}

/// Sequential reader over the messages in a GRIB2 byte buffer.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
    tables: Arc<Grib2Tables>,
}

impl Grib2Reader {
    /// Create a reader using the built-in radar parameter tables.
    pub fn new(data: Bytes) -> Self {
        Self::with_tables(data, Arc::new(Grib2Tables::radar()))
    }

    pub fn with_tables(data: Bytes, tables: Arc<Grib2Tables>) -> Self {
        Self {
            data,
            offset: 0,
            tables,
        }
    }

    /// Parse the next message, or `Ok(None)` once no further "GRIB" marker exists.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        let start = match find_magic(&self.data, self.offset) {
            Some(pos) => pos,
            None => {
                self.offset = self.data.len();
                return Ok(None);
            }
        };

        // Step past the marker first so a broken message is not re-read forever.
        self.offset = start + 4;

        let indicator = sections::parse_indicator(&self.data[start..])?;
        let length = usize::try_from(indicator.message_length).map_err(|_| {
            Grib2Error::InvalidFormat(format!(
                "message length {} does not fit in memory",
                indicator.message_length
            ))
        })?;
        let end = start
            .checked_add(length)
            .filter(|&end| end <= self.data.len() && length >= 16)
            .ok_or_else(|| {
                Grib2Error::InvalidFormat(format!(
                    "message at offset {} declares {} bytes but only {} remain",
                    start,
                    length,
                    self.data.len() - start
                ))
            })?;

        self.offset = end;

        let raw = self.data.slice(start..end);
        let msg = &raw[..];

        let identification = sections::parse_identification(msg)?;
        let grid_definition = sections::parse_grid_definition(msg)?;
        let product_definition =
            sections::parse_product_definition(msg, indicator.discipline, &self.tables)?;
        let data_representation = sections::parse_data_representation(msg)?;
        let bitmap = sections::parse_bitmap(msg)?;
        let data_section = sections::parse_data_section(msg)?;

        Ok(Some(Grib2Message {
            indicator,
            identification,
            grid_definition,
            product_definition,
            data_representation,
            bitmap,
            data_section,
            raw,
        }))
    }
}

fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(4)
        .position(|w| w == b"GRIB")
        .map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_has_no_messages() {
        let mut reader = Grib2Reader::new(Bytes::new());
        assert!(reader.next_message().unwrap().is_none());
    }

    #[test]
    fn test_garbage_without_magic_has_no_messages() {
        let mut reader = Grib2Reader::new(Bytes::from_static(b"this is not a grib file"));
        assert!(reader.next_message().unwrap().is_none());
    }

    #[test]
    fn test_truncated_message_is_an_error() {
        let mut data = b"GRIB".to_vec();
        data.extend_from_slice(&[0, 0, 209, 2]);
        data.extend_from_slice(&1000u64.to_be_bytes());
        let mut reader = Grib2Reader::new(Bytes::from(data));
        assert!(reader.next_message().is_err());
        // The reader does not loop on the broken message.
        assert!(reader.next_message().unwrap().is_none());
    }

    #[test]
    fn test_find_magic_skips_leading_junk() {
        assert_eq!(find_magic(b"xxGRIB", 0), Some(2));
        assert_eq!(find_magic(b"GRIB", 1), None);
    }
}
