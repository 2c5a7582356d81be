//! GRIB2 section parsing.
//!
//! Every parser except [`parse_indicator`] takes the bytes of one section,
//! starting at its 4-byte length field. Offsets in comments are 1-based
//! octet numbers as printed in the WMO manual.

use crate::tables::{level_description, parameter_short_name};
use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use wx_common::{ProjectionParams, StepType, TimeUnit};

/// Length of Section 0.
pub const INDICATOR_LEN: usize = 16;

/// Section 0: Indicator Section
#[derive(Debug, Clone, PartialEq)]
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
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template_number: u16,
    pub num_data_points: u32,
    pub shape_of_earth: u8,
    /// `None` for grid templates other than 3.0 and 3.30
    pub projection: Option<ProjectionParams>,
}

/// Statistical processing block of product templates 4.8 and 4.11.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticalProcessing {
    /// Code Table 4.10
    pub process: u8,
    pub time_range_unit: TimeUnit,
    pub length_of_time_range: u32,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template_number: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub parameter_short_name: String,
    pub level_type: u8,
    pub level_value: f64,
    pub level_description: String,
    pub forecast_time: u32,
    pub forecast_time_unit: TimeUnit,
    pub statistical: Option<StatisticalProcessing>,
}

impl ProductDefinition {
    pub fn step_type(&self) -> StepType {
        match &self.statistical {
            Some(stat) => StepType::from_statistical_process(stat.process),
            None => StepType::Instant,
        }
    }
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
    pub original_data_type: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    /// 0 = bitmap follows, 254 = reuse previous bitmap, 255 = no bitmap
    pub indicator: u8,
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
    if data.len() < INDICATOR_LEN {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octet 7: discipline, octet 8: edition, octets 9-16: total length
    let discipline = data[6];
    let edition = data[7];
    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    let message_length = read_u64(data, 8);
    if message_length < (INDICATOR_LEN + 4) as u64 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Message length {} is too short",
            message_length
        )));
    }

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Read the (length, number) header at the start of a section.
pub fn section_header(data: &[u8]) -> Result<(usize, u8), Grib2Error> {
    if data.len() < 5 {
        return Err(Grib2Error::InvalidFormat(
            "Truncated section header".to_string(),
        ));
    }
    let length = read_u32(data, 0) as usize;
    if length < 5 || length > data.len() {
        return Err(Grib2Error::InvalidSection {
            section: data[4],
            reason: format!("Section length {} out of bounds", length),
        });
    }
    Ok((length, data[4]))
}

/// Parse Section 1 (Identification)
pub fn parse_identification(data: &[u8]) -> Result<Identification, Grib2Error> {
    require_len(data, 1, 21)?;

    let year = read_u16(data, 12) as i32;
    let reference_time = NaiveDate::from_ymd_opt(year, data[14] as u32, data[15] as u32)
        .and_then(|d| d.and_hms_opt(data[16] as u32, data[17] as u32, data[18] as u32))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid reference time {}-{}-{} {}:{}:{}",
                year, data[14], data[15], data[16], data[17], data[18]
            ),
        })?;

    Ok(Identification {
        center: read_u16(data, 5),
        sub_center: read_u16(data, 7),
        table_version: data[9],
        local_table_version: data[10],
        significance_of_reference_time: data[11],
        reference_time,
        production_status: data[19],
        data_type: data[20],
    })
}

/// Parse Section 3 (Grid Definition)
///
/// Templates 3.0 (regular lat/lon) and 3.30 (Lambert conformal) yield a
/// projection; other templates are carried without one.
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition, Grib2Error> {
    require_len(data, 3, 14)?;

    let num_data_points = read_u32(data, 6);
    let template_number = read_u16(data, 12);
    let gd = &data[14..];

    let projection = match template_number {
        0 => {
            require_len(data, 3, 72)?;
            Some(ProjectionParams::LatLon {
                ni: read_u32(gd, 16),
                nj: read_u32(gd, 20),
                lat1: micro_degrees(gd, 32),
                lon1: micro_degrees(gd, 36),
                lat2: micro_degrees(gd, 41),
                lon2: micro_degrees(gd, 45),
                di: read_u32(gd, 49) as f64 * 1e-6,
                dj: read_u32(gd, 53) as f64 * 1e-6,
                scanning_mode: gd[57],
            })
        }
        30 => {
            require_len(data, 3, 81)?;
            Some(ProjectionParams::LambertConformal {
                nx: read_u32(gd, 16),
                ny: read_u32(gd, 20),
                lat1: micro_degrees(gd, 24),
                lon1: micro_degrees(gd, 28),
                lov: micro_degrees(gd, 37),
                dx: read_u32(gd, 41) as f64 * 1e-3,
                dy: read_u32(gd, 45) as f64 * 1e-3,
                scanning_mode: gd[50],
                latin1: micro_degrees(gd, 51),
                latin2: micro_degrees(gd, 55),
            })
        }
        _ => None,
    };

    Ok(GridDefinition {
        template_number,
        num_data_points,
        shape_of_earth: gd.first().copied().unwrap_or(255),
        projection,
    })
}

/// Parse Section 4 (Product Definition)
///
/// Templates 4.0, 4.1, 4.8 and 4.11 are understood. Any other template
/// keeps its parameter but reports an unknown level and no time range.
pub fn parse_product_definition(
    data: &[u8],
    discipline: u8,
) -> Result<ProductDefinition, Grib2Error> {
    require_len(data, 4, 11)?;

    let template_number = read_u16(data, 7);
    let parameter_category = data[9];
    let parameter_number = data[10];
    let parameter_short_name =
        parameter_short_name(discipline, parameter_category, parameter_number);

    let horizontal = matches!(template_number, 0 | 1 | 8 | 11);
    if !horizontal {
        return Ok(ProductDefinition {
            template_number,
            parameter_category,
            parameter_number,
            parameter_short_name,
            level_type: 255,
            level_value: 0.0,
            level_description: "unknown".to_string(),
            forecast_time: 0,
            forecast_time_unit: TimeUnit::Hours,
            statistical: None,
        });
    }

    require_len(data, 4, 34)?;
    // Octet 18: unit of time range, octets 19-22: forecast time
    let forecast_time_unit = TimeUnit::from_grib_code(data[17]);
    let forecast_time = read_u32(data, 18);

    // Octet 23: type of first fixed surface, 24: scale factor, 25-28: scaled value
    let level_type = data[22];
    let level_value = scaled_value(data[23], read_u32(data, 24));
    let level_description = level_description(level_type, level_value);

    // Templates 4.1/4.11 insert three ensemble octets before the
    // statistical block of 4.11.
    let statistical = match template_number {
        8 => Some(parse_statistical(data, 34)?),
        11 => Some(parse_statistical(data, 37)?),
        _ => None,
    };

    Ok(ProductDefinition {
        template_number,
        parameter_category,
        parameter_number,
        parameter_short_name,
        level_type,
        level_value,
        level_description,
        forecast_time,
        forecast_time_unit,
        statistical,
    })
}

/// `start` is the 0-based index of the end-of-interval year.
fn parse_statistical(data: &[u8], start: usize) -> Result<StatisticalProcessing, Grib2Error> {
    // year(2) month day hour minute second, n ranges(1), n missing(4),
    // then per range: process, increment type, unit, length(4), ...
    let range = start + 12;
    require_len(data, 4, range + 7)?;

    if data[start + 7] == 0 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Statistical template with zero time ranges".to_string(),
        });
    }

    Ok(StatisticalProcessing {
        process: data[range],
        time_range_unit: TimeUnit::from_grib_code(data[range + 2]),
        length_of_time_range: read_u32(data, range + 3),
    })
}

/// Parse Section 5 (Data Representation)
///
/// The packing header shared by templates 5.0, 5.2, 5.3, 5.40 and 5.41 is
/// decoded; template-specific trailers are left to the unpacker.
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    require_len(data, 5, 21)?;

    Ok(DataRepresentation {
        num_data_points: read_u32(data, 5),
        template_number: read_u16(data, 9),
        reference_value: f32::from_be_bytes([data[11], data[12], data[13], data[14]]),
        binary_scale_factor: decode_grib2_signed16(&data[15..17]),
        decimal_scale_factor: decode_grib2_signed16(&data[17..19]),
        bits_per_value: data[19],
        original_data_type: data[20],
    })
}

/// Parse Section 6 (Bitmap)
pub fn parse_bitmap(data: Bytes) -> Result<Bitmap, Grib2Error> {
    require_len(&data, 6, 6)?;

    Ok(Bitmap {
        indicator: data[5],
        data: data.slice(6..),
    })
}

/// Parse Section 7 (Data)
pub fn parse_data_section(data: Bytes) -> Result<DataSection, Grib2Error> {
    require_len(&data, 7, 5)?;

    Ok(DataSection {
        data: data.slice(5..),
    })
}

// ===== Helpers =====

/// Decode a GRIB2 sign-magnitude 32-bit integer.
///
/// The most significant bit is the sign, the remaining 31 bits the
/// magnitude. This differs from two's complement. Slices that are not
/// exactly 4 bytes decode as 0.
pub fn decode_grib2_signed(bytes: &[u8]) -> i32 {
    if bytes.len() != 4 {
        return 0;
    }
    let raw = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Decode a GRIB2 sign-magnitude 16-bit integer.
pub fn decode_grib2_signed16(bytes: &[u8]) -> i16 {
    if bytes.len() != 2 {
        return 0;
    }
    let raw = u16::from_be_bytes([bytes[0], bytes[1]]);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn decode_grib2_signed8(byte: u8) -> i8 {
    let magnitude = (byte & 0x7F) as i8;
    if byte & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Scaled value of a fixed surface; all-ones (missing) reads as zero.
fn scaled_value(scale: u8, value: u32) -> f64 {
    if value == u32::MAX || scale == u8::MAX {
        return 0.0;
    }
    value as f64 / 10f64.powi(decode_grib2_signed8(scale) as i32)
}

fn micro_degrees(data: &[u8], offset: usize) -> f64 {
    decode_grib2_signed(&data[offset..offset + 4]) as f64 * 1e-6
}

fn require_len(data: &[u8], section: u8, len: usize) -> Result<(), Grib2Error> {
    if data.len() < len {
        return Err(Grib2Error::InvalidSection {
            section,
            reason: format!("Section too short: {} < {} bytes", data.len(), len),
        });
    }
    Ok(())
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_be_bytes(buf)
}
