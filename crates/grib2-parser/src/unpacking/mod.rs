//! GRIB2 data unpacking.
//!
//! Simple packing (template 5.0) is decoded here. Other packings (PNG 5.41,
//! complex 5.2/5.3, JPEG2000 5.40) go through the `grib` crate.

use std::io::Cursor;

use crate::Grib2Error;

/// Unpack simple packed GRIB2 data.
///
/// `num_points` is the number of grid points. When a bitmap is present, only
/// points whose bit is set consume a packed value; the others come back as `None`.
///
/// value = (reference_value + packed_value * 2^binary_scale) * 10^(-decimal_scale)
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: u32,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<Vec<Option<f32>>, Grib2Error> {
    let num_points = num_points as usize;
    let present = |i: usize| match bitmap {
        // 1 bit per grid point, MSB first, 1 = value present
        Some(bm) => bm
            .get(i / 8)
            .map(|byte| (byte >> (7 - (i % 8))) & 1 == 1)
            .unwrap_or(false),
        None => true,
    };

    let decimal_scale = 10.0_f32.powi(-(decimal_scale_factor as i32));

    if bits_per_value == 0 {
        // Constant field: every present point is the reference value
        let value = reference_value * decimal_scale;
        return Ok((0..num_points)
            .map(|i| present(i).then_some(value))
            .collect());
    }

    let binary_scale = 2.0_f32.powi(binary_scale_factor as i32);
    let bits_per_value = bits_per_value as usize;

    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0;

    for i in 0..num_points {
        if !present(i) {
            values.push(None);
            continue;
        }

        let packed_value = extract_bits(packed_data, bit_position, bits_per_value).map_err(|e| {
            Grib2Error::UnpackingError(format!("point {} of {}: {}", i, num_points, e))
        })?;
        bit_position += bits_per_value;

        let value = (reference_value + (packed_value as f32) * binary_scale) * decimal_scale;
        values.push(Some(value));
    }

    Ok(values)
}

/// Decode the first field of a raw GRIB2 message with the `grib` crate.
pub fn unpack_with_grib_crate(raw: &[u8]) -> Result<Vec<f32>, Grib2Error> {
    let grib_file = grib::from_reader(Cursor::new(raw))
        .map_err(|e| Grib2Error::UnpackingError(format!("grib crate parse: {}", e)))?;

    let (_, submessage) = grib_file
        .iter()
        .next()
        .ok_or_else(|| Grib2Error::UnpackingError("message has no fields".to_string()))?;

    let decoder = grib::Grib2SubmessageDecoder::from(submessage)
        .map_err(|e| Grib2Error::UnpackingError(format!("grib crate decoder: {}", e)))?;
    let values = decoder
        .dispatch()
        .map_err(|e| Grib2Error::UnpackingError(format!("grib crate unpack: {}", e)))?;

    Ok(values.collect())
}

/// Extract bits from a byte array, MSB first.
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8);

        if byte_idx >= data.len() {
            return Err("Not enough data to extract bits".to_string());
        }

        let bit = (data[byte_idx] >> bit_idx) & 1;
        result = (result << 1) | (bit as u32);
    }

    Ok(result)
}
