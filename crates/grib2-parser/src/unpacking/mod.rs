//! GRIB2 data unpacking algorithms.
//!
//! Simple packing (template 5.0) is decoded here. Complex packing
//! (5.2, 5.3) and PNG (5.41) are delegated to the `grib` crate.

use crate::sections::DataRepresentation;
use crate::Grib2Error;
use std::io::Cursor;

/// Unpack simple packed GRIB2 data
///
/// Simple packing formula: value = (reference_value + (packed_value * 2^binary_scale)) * 10^(-decimal_scale)
///
/// `num_points` is the number of grid points. When a bitmap is given only
/// the points whose bit is set consume a packed value; the others are NaN.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: usize,
    drs: &DataRepresentation,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f32>, Grib2Error> {
    let reference_value = drs.reference_value as f64;
    let binary_scale = 2.0_f64.powi(drs.binary_scale_factor as i32);
    let decimal_scale = 10.0_f64.powi(-(drs.decimal_scale_factor as i32));
    let bits_per_value = drs.bits_per_value as usize;

    if bits_per_value > 32 {
        return Err(Grib2Error::UnpackingError(format!(
            "Invalid number of bits: {}",
            bits_per_value
        )));
    }

    let constant = (reference_value * decimal_scale) as f32;
    let mut values = Vec::with_capacity(num_points);
    let mut bit_position = 0usize;

    for i in 0..num_points {
        if let Some(bm) = bitmap {
            // 1 bit per data point, 1 = value present
            let present = bm
                .get(i / 8)
                .map(|byte| (byte >> (7 - (i % 8))) & 1 == 1)
                .ok_or_else(|| {
                    Grib2Error::UnpackingError(format!("Bitmap too short for {} points", num_points))
                })?;
            if !present {
                values.push(f32::NAN);
                continue;
            }
        }

        if bits_per_value == 0 {
            values.push(constant);
            continue;
        }

        let packed_value = extract_bits(packed_data, bit_position, bits_per_value)?;
        bit_position += bits_per_value;

        let value = (reference_value + packed_value as f64 * binary_scale) * decimal_scale;
        values.push(value as f32);
    }

    Ok(values)
}

/// Extract `num_bits` (1..=32) big-endian bits starting at `start_bit`.
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, Grib2Error> {
    let first_byte = start_bit / 8;
    let last_byte = (start_bit + num_bits - 1) / 8;
    if last_byte >= data.len() {
        return Err(Grib2Error::UnpackingError(format!(
            "Data section too short: need byte {}, have {}",
            last_byte,
            data.len()
        )));
    }

    let mut acc = 0u64;
    for byte in &data[first_byte..=last_byte] {
        acc = (acc << 8) | *byte as u64;
    }
    let total_bits = (last_byte - first_byte + 1) * 8;
    let shift = total_bits - (start_bit % 8) - num_bits;
    let mask = (1u64 << num_bits) - 1;
    Ok(((acc >> shift) & mask) as u32)
}

/// Decode submessage `index` of a complete GRIB2 message with the `grib`
/// crate. Missing points come back as NaN.
pub fn unpack_with_grib_crate(message: &[u8], index: usize) -> Result<Vec<f32>, Grib2Error> {
    let grib2 = grib::from_reader(Cursor::new(message))
        .map_err(|e| Grib2Error::UnpackingError(format!("Failed to read message: {}", e)))?;

    let (_, submessage) = grib2.iter().nth(index).ok_or_else(|| {
        Grib2Error::UnpackingError(format!("Submessage {} not found", index))
    })?;

    let decoder = grib::Grib2SubmessageDecoder::from(submessage)
        .map_err(|e| Grib2Error::UnpackingError(format!("Failed to create decoder: {}", e)))?;
    let values = decoder
        .dispatch()
        .map_err(|e| Grib2Error::UnpackingError(format!("Failed to decode: {}", e)))?;

    Ok(values.collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drs(reference: f32, e: i16, d: i16, bits: u8) -> DataRepresentation {
        DataRepresentation {
            num_data_points: 0,
            template_number: 0,
            reference_value: reference,
            binary_scale_factor: e,
            decimal_scale_factor: d,
            bits_per_value: bits,
            original_data_type: 0,
        }
    }

    #[test]
    fn test_extract_bits_unaligned() {
        // 0b1011_0110, 0b0101_1100
        let data = [0xB6, 0x5C];
        assert_eq!(extract_bits(&data, 0, 4).unwrap(), 0b1011);
        assert_eq!(extract_bits(&data, 4, 4).unwrap(), 0b0110);
        assert_eq!(extract_bits(&data, 6, 5).unwrap(), 0b10010);
        assert!(extract_bits(&data, 12, 8).is_err());
    }

    #[test]
    fn test_unpack_simple_scales() {
        // 8-bit values 0, 10, 255 with R=100, E=1, D=1
        let data = [0u8, 10, 255];
        let values = unpack_simple(&data, 3, &drs(100.0, 1, 1, 8), None).unwrap();
        assert_eq!(values, vec![10.0, 12.0, 61.0]);
    }

    #[test]
    fn test_unpack_simple_bitmap_skips_missing() {
        let data = [1u8, 2];
        // points 0 and 2 present, 1 missing
        let bitmap = [0b1010_0000u8];
        let values = unpack_simple(&data, 3, &drs(0.0, 0, 0, 8), Some(&bitmap)).unwrap();
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 2.0);
    }

    #[test]
    fn test_unpack_constant_field() {
        let values = unpack_simple(&[], 4, &drs(273.15, 0, 0, 0), None).unwrap();
        assert_eq!(values, vec![273.15; 4]);
    }
}
