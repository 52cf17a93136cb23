//! GRIB2 section parsing.
//!
//! Every function takes the bytes of one complete message (starting at the
//! "GRIB" marker) and locates its section by walking the section headers.

use crate::{Grib2Error, Grib2Tables};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template_number: u16,
    /// Number of data points declared by the section header.
    pub num_data_points: u32,
    pub num_points_latitude: u32,
    pub num_points_longitude: u32,
    pub first_latitude: f64,
    pub first_longitude: f64,
    pub last_latitude: f64,
    pub last_longitude: f64,
    pub scanning_mode: u8,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template_number: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub parameter_short_name: String,
    pub level_type: u8,
    pub level_value: u32,
    pub level_description: String,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    pub num_data_points: u32,
    pub template_number: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

/// Section 6: Bitmap Section (present only when indicator is 0)
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub data: Bytes,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 5-6 reserved, 7 discipline, 8 edition, 9-16 total length (u64)
    let discipline = data[6];
    let edition = data[7];

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(data: &[u8]) -> Result<Identification, Grib2Error> {
    let offset = find_section(data, 1)?;
    let section_data = &data[offset..];

    if section_data.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    // Skip section length (4 bytes) and section number (1 byte)
    let sec = &section_data[5..];

    let center = u16::from_be_bytes([sec[0], sec[1]]);
    let sub_center = u16::from_be_bytes([sec[2], sec[3]]);

    let year = u16::from_be_bytes([sec[7], sec[8]]);
    let (month, day, hour, minute, second) = (sec[9], sec[10], sec[11], sec[12], sec[13]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        production_status: sec.get(14).copied().unwrap_or(0),
        data_type: sec.get(15).copied().unwrap_or(0),
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let section_offset = find_section(data, 3)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 6-9: number of data points, bytes 12-13: template number,
    // template data from byte 14.
    let num_data_points = u32::from_be_bytes([
        section_data[6],
        section_data[7],
        section_data[8],
        section_data[9],
    ]);
    let template_number = u16::from_be_bytes([section_data[12], section_data[13]]);
    let gd = &section_data[14..];

    // Templates 3.0 (lat/lon) and most of its relatives put Ni/Nj at the same place.
    if gd.len() < 24 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!(
                "Template {} needs at least 24 bytes for Ni/Nj, got {}",
                template_number,
                gd.len()
            ),
        });
    }
    let ni = u32::from_be_bytes([gd[16], gd[17], gd[18], gd[19]]);
    let nj = u32::from_be_bytes([gd[20], gd[21], gd[22], gd[23]]);

    if template_number == 0 && gd.len() >= 58 {
        // Template 3.0, lat/lon in microdegrees:
        // 32-35 La1, 36-39 Lo1, 41-44 La2, 45-48 Lo2, 57 scanning mode
        let micro = |bytes: &[u8]| decode_grib2_signed(bytes) as f64 / 1_000_000.0;
        Ok(GridDefinition {
            template_number,
            num_data_points,
            num_points_latitude: nj,
            num_points_longitude: ni,
            first_latitude: micro(&gd[32..36]),
            first_longitude: micro(&gd[36..40]),
            last_latitude: micro(&gd[41..45]),
            last_longitude: micro(&gd[45..49]),
            scanning_mode: gd[57],
        })
    } else {
        Ok(GridDefinition {
            template_number,
            num_data_points,
            num_points_latitude: nj,
            num_points_longitude: ni,
            first_latitude: 0.0,
            first_longitude: 0.0,
            last_latitude: 0.0,
            last_longitude: 0.0,
            scanning_mode: 0,
        })
    }
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(
    data: &[u8],
    discipline: u8,
    tables: &Grib2Tables,
) -> Result<ProductDefinition, Grib2Error> {
    let section_offset = find_section(data, 4)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // 7-8 template number, 9 parameter category, 10 parameter number.
    // For template 4.0: 22 type of first fixed surface, 23 scale factor, 24-27 scaled value.
    let template_number = u16::from_be_bytes([section_data[7], section_data[8]]);
    let parameter_category = section_data[9];
    let parameter_number = section_data[10];

    let level_type = section_data.get(22).copied().unwrap_or(255);
    let level_value = if section_data.len() >= 28 {
        u32::from_be_bytes([
            section_data[24],
            section_data[25],
            section_data[26],
            section_data[27],
        ])
    } else {
        0
    };

    let parameter_short_name =
        tables.get_parameter_name(discipline, parameter_category, parameter_number);
    let level_description = tables.get_level_description(level_type, level_value);

    Ok(ProductDefinition {
        template_number,
        parameter_category,
        parameter_number,
        parameter_short_name,
        level_type,
        level_value,
        level_description,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let section_offset = find_section(data, 5)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // 5-8 number of data points, 9-10 template number.
    // Templates 5.0, 5.2, 5.3, 5.40 and 5.41 share the leading fields:
    // 11-14 reference value (IEEE f32), 15-16 binary scale, 17-18 decimal scale,
    // 19 bits per value.
    let num_data_points = u32::from_be_bytes([
        section_data[5],
        section_data[6],
        section_data[7],
        section_data[8],
    ]);
    let template_number = u16::from_be_bytes([section_data[9], section_data[10]]);
    let t = &section_data[11..];

    Ok(DataRepresentation {
        num_data_points,
        template_number,
        reference_value: f32::from_be_bytes([t[0], t[1], t[2], t[3]]),
        binary_scale_factor: decode_grib2_signed_i16([t[4], t[5]]),
        decimal_scale_factor: decode_grib2_signed_i16([t[6], t[7]]),
        bits_per_value: t[8],
    })
}

/// Parse Section 6 (Bitmap). Returns `None` when no bitmap applies.
pub fn parse_bitmap(data: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {
    let section_offset = match find_section(data, 6) {
        Ok(offset) => offset,
        // Section 6 is mandatory, but tolerate producers that omit it.
        Err(_) => return Ok(None),
    };
    let section_data = &data[section_offset..];

    let section_length = section_length(section_data);
    if section_length < 6 || section_length > section_data.len() {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("declared length {} cannot hold a bitmap indicator", section_length),
        });
    }
    let section_data = &section_data[..section_length];

    match section_data[5] {
        255 => Ok(None),
        0 => Ok(Some(Bitmap {
            data: Bytes::copy_from_slice(&section_data[6..]),
        })),
        other => Err(Grib2Error::Unsupported(format!(
            "bitmap indicator {} (predefined or reused bitmaps)",
            other
        ))),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(data: &[u8]) -> Result<DataSection, Grib2Error> {
    let section_offset = find_section(data, 7)?;
    let section_data = &data[section_offset..];

    let section_length = section_length(section_data);
    if section_length > section_data.len() {
        return Err(Grib2Error::InvalidSection {
            section: 7,
            reason: format!(
                "declared length {} exceeds the {} bytes left",
                section_length,
                section_data.len()
            ),
        });
    }
    let data_bytes = if section_length > 5 {
        Bytes::copy_from_slice(&section_data[5..section_length])
    } else {
        Bytes::new()
    };

    Ok(DataSection { data: data_bytes })
}

// ===== Helper Functions =====

/// Decode a 4-byte GRIB2 sign-magnitude integer (MSB is the sign bit).
///
/// Returns 0 when the slice is not exactly 4 bytes long.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    let Ok(raw) = <[u8; 4]>::try_from(bytes) else {
        return 0;
    };
    let raw = u32::from_be_bytes(raw);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Sign-magnitude decode for the 2-byte scale factors in section 5.
fn decode_grib2_signed_i16(bytes: [u8; 2]) -> i16 {
    let raw = u16::from_be_bytes(bytes);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Section length from its 4-byte header. Callers have already bounds-checked it
/// through `find_section`.
fn section_length(section_data: &[u8]) -> usize {
    u32::from_be_bytes([
        section_data[0],
        section_data[1],
        section_data[2],
        section_data[3],
    ]) as usize
}

/// Find a section by number within a message
fn find_section(data: &[u8], section_num: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16; // After Section 0

    loop {
        if offset + 5 > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Section not found".to_string(),
            });
        }

        // Section 8 is the bare "7777" end marker.
        if &data[offset..offset + 4] == b"7777" {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Reached end of message without finding section".to_string(),
            });
        }

        let length = section_length(&data[offset..]);

        if length < 5 || offset + length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        if data[offset + 4] == section_num {
            return Ok(offset);
        }

        offset += length;
    }
}
