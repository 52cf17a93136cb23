//! Synthetic GRIB2 message builder.
//!
//! Produces small, structurally valid GRIB2 edition 2 messages with a lat/lon
//! grid (template 3.0), a horizontal-level product (template 4.0) and simple
//! packing (template 5.0) or PNG packing (template 5.41), optionally with a
//! bitmap. Defaults mimic the MRMS CONUS reflectivity product.

use std::io::Write;

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

/// Builder for one GRIB2 message.
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    // Grid definition
    ni: u32,
    nj: u32,
    la1: f64,
    lo1: f64,
    la2: f64,
    lo2: f64,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    // Data
    decimal_scale: i16,
    data_values: Vec<f32>,
    missing: Option<Vec<bool>>,
    png_packing: bool,
}

impl Grib2Builder {
    /// MRMS-like ReflectivityAtLowestAltitude message on a 20x15 grid, all missing (-999).
    pub fn new_mrms() -> Self {
        let ni = 20;
        let nj = 15;
        Self {
            discipline: 209, // MRMS local discipline
            center: 161,     // NSSL
            year: 2025,
            month: 6,
            day: 1,
            hour: 12,
            minute: 4,
            ni,
            nj,
            la1: 54.995,
            lo1: 230.005,
            la2: 20.005,
            lo2: 299.995,
            scanning_mode: 0, // +i, -j (north to south)
            param_category: 10,
            param_number: 0, // RALA
            level_type: 102,
            level_value: 500,
            decimal_scale: 1,
            data_values: vec![-999.0; (ni * nj) as usize],
            missing: None,
            png_packing: false,
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8, minute: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self.minute = minute;
        self
    }

    /// Resize the grid to `ni` columns by `nj` rows, filled with -999.
    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = vec![-999.0; (ni * nj) as usize];
        self.missing = None;
        self
    }

    pub fn with_parameter(mut self, discipline: u8, category: u8, number: u8) -> Self {
        self.discipline = discipline;
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    /// Rows stored south to north (scanning mode flag 0x40).
    pub fn south_to_north(mut self) -> Self {
        self.scanning_mode |= 0b0100_0000;
        std::mem::swap(&mut self.la1, &mut self.la2);
        self
    }

    pub fn with_decimal_scale(mut self, decimal_scale: i16) -> Self {
        self.decimal_scale = decimal_scale;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    /// Row-major values, first row first (in storage order).
    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Points flagged `true` are left out of the data section through a bitmap.
    pub fn with_missing_mask(mut self, missing: Vec<bool>) -> Self {
        self.missing = Some(missing);
        self
    }

    /// Pack the data section as a grayscale PNG (template 5.41), the way
    /// operational MRMS products are published.
    pub fn with_png_packing(mut self) -> Self {
        self.png_packing = true;
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let section1 = self.build_section1();
        let section3 = self.build_section3();
        let section4 = self.build_section4();
        let mut packed = self.packed_values();
        if self.png_packing {
            packed.bits = png_bit_depth(packed.bits);
        }
        let section5 = self.build_section5(&packed);
        let section6 = self.build_section6();
        let section7 = self.build_section7(&packed);

        let message_length = 16
            + section1.len()
            + section3.len()
            + section4.len()
            + section5.len()
            + section6.len()
            + section7.len()
            + 4;

        let mut message = Vec::with_capacity(message_length);

        // Section 0: Indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(self.discipline);
        message.push(2);
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        for section in [section1, section3, section4, section5, section6, section7] {
            message.extend_from_slice(&section);
        }

        // Section 8: End
        message.extend_from_slice(b"7777");

        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = header(21, 1);

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(0); // Significance of reference time (analysis)

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(self.minute);
        section.push(0); // Second

        section.push(0); // Production status (operational)
        section.push(0); // Type of data (analysis)

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        // 14 header bytes plus 58 bytes of template 3.0
        let mut section = header(72, 3);

        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Shape of Earth
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions

        section.extend_from_slice(&micro_degrees(self.la1));
        section.extend_from_slice(&micro_degrees(self.lo1));
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&micro_degrees(self.la2));
        section.extend_from_slice(&micro_degrees(self.lo2));
        section.extend_from_slice(&10_000u32.to_be_bytes()); // Di
        section.extend_from_slice(&10_000u32.to_be_bytes()); // Dj
        section.push(self.scanning_mode);

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = header(34, 4);

        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(0); // Type of generating process (analysis)
        section.push(0);
        section.push(0);
        section.extend_from_slice(&0u16.to_be_bytes());
        section.push(0);
        section.push(0); // Time range unit (minutes)
        section.extend_from_slice(&0u32.to_be_bytes()); // Forecast time

        section.push(self.level_type);
        section.push(0);
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // No second fixed surface
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section
    }

    fn build_section5(&self, packed: &Packed) -> Vec<u8> {
        let mut section = header(21, 5);

        let template: u16 = if self.png_packing { 41 } else { 0 };
        section.extend_from_slice(&(packed.values.len() as u32).to_be_bytes());
        section.extend_from_slice(&template.to_be_bytes());

        section.extend_from_slice(&packed.reference.to_be_bytes());
        section.extend_from_slice(&sign_magnitude_i16(0)); // Binary scale factor
        section.extend_from_slice(&sign_magnitude_i16(self.decimal_scale));
        section.push(packed.bits);
        section.push(0); // Original field type (floating point)

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        match &self.missing {
            None => {
                let mut section = header(6, 6);
                section.push(255);
                section
            }
            Some(missing) => {
                let mut bits = BitWriter::default();
                for i in 0..(self.ni * self.nj) as usize {
                    let absent = missing.get(i).copied().unwrap_or(false);
                    bits.push(u32::from(!absent), 1);
                }
                let bytes = bits.finish();
                let mut section = header(6 + bytes.len() as u32, 6);
                section.push(0);
                section.extend_from_slice(&bytes);
                section
            }
        }
    }

    fn build_section7(&self, packed: &Packed) -> Vec<u8> {
        let mut bits = BitWriter::default();
        if packed.bits > 0 {
            for &value in &packed.values {
                bits.push(value, packed.bits);
            }
        }
        let mut bytes = bits.finish();
        if self.png_packing && packed.bits > 0 {
            // One image row holding every packed value as a grayscale sample
            bytes = grayscale_png(&bytes, packed.values.len() as u32, packed.bits);
        }

        let mut section = header(5 + bytes.len() as u32, 7);
        section.extend_from_slice(&bytes);
        section
    }

    /// Scale the present values by 10^D and pack them relative to their minimum.
    fn packed_values(&self) -> Packed {
        let factor = 10f64.powi(self.decimal_scale as i32);
        let scaled: Vec<i64> = self
            .data_values
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                !self
                    .missing
                    .as_ref()
                    .and_then(|m| m.get(*i).copied())
                    .unwrap_or(false)
            })
            .map(|(_, &v)| (v as f64 * factor).round() as i64)
            .collect();

        let min = scaled.iter().copied().min().unwrap_or(0);
        let max = scaled.iter().copied().max().unwrap_or(0);
        let range = (max - min) as u64;
        let bits = if range == 0 {
            0
        } else {
            (64 - range.leading_zeros()) as u8
        };

        Packed {
            reference: min as f32,
            bits,
            values: scaled.iter().map(|&v| (v - min) as u32).collect(),
        }
    }
}

/// Concatenate several messages into one GRIB2 file.
pub fn build_grib2_file(messages: &[Grib2Builder]) -> Vec<u8> {
    messages.iter().flat_map(|m| m.build()).collect()
}

/// Gzip-compress bytes the way upstream `.grib2.gz` files are published.
pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("writing to an in-memory gzip encoder cannot fail");
    encoder
        .finish()
        .expect("finishing an in-memory gzip encoder cannot fail")
}

struct Packed {
    reference: f32,
    bits: u8,
    values: Vec<u32>,
}

#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    used: u8,
}

impl BitWriter {
    fn push(&mut self, value: u32, bits: u8) {
        for shift in (0..bits).rev() {
            if self.used == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> shift) & 1) as u8;
            if let Some(last) = self.bytes.last_mut() {
                *last |= bit << (7 - self.used);
            }
            self.used = (self.used + 1) % 8;
        }
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Smallest grayscale PNG sample depth that holds `bits`.
fn png_bit_depth(bits: u8) -> u8 {
    match bits {
        0 => 0,
        1..=8 => 8,
        _ => 16,
    }
}

/// Wrap packed samples in a one-row grayscale PNG.
fn grayscale_png(samples: &[u8], width: u32, bit_depth: u8) -> Vec<u8> {
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.push(bit_depth);
    ihdr.extend_from_slice(&[0, 0, 0, 0]); // Grayscale, deflate, no filter, no interlace

    // Filter type 0 for the single scanline
    let mut scanline = Vec::with_capacity(samples.len() + 1);
    scanline.push(0);
    scanline.extend_from_slice(samples);
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&scanline)
        .expect("writing to an in-memory zlib encoder cannot fail");
    let idat = encoder
        .finish()
        .expect("finishing an in-memory zlib encoder cannot fail");

    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    write_chunk(&mut png, b"IHDR", &ihdr);
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    png
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

fn header(length: u32, number: u8) -> Vec<u8> {
    let mut section = length.to_be_bytes().to_vec();
    section.push(number);
    section
}

fn micro_degrees(degrees: f64) -> [u8; 4] {
    let micro = (degrees * 1_000_000.0).round() as i64;
    let magnitude = micro.unsigned_abs() as u32 & 0x7FFF_FFFF;
    let raw = if micro < 0 { magnitude | 0x8000_0000 } else { magnitude };
    raw.to_be_bytes()
}

fn sign_magnitude_i16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}
