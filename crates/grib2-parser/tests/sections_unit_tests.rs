//! Unit tests for GRIB2 section parsing functions.

use grib2_parser::sections::{
    decode_grib2_signed, decode_grib2_signed16, parse_data_representation,
    parse_product_definition,
};
use wx_common::{StepType, TimeUnit};

// ============================================================================
// Sign-magnitude integers
// ============================================================================

#[test]
fn test_decode_grib2_signed_positive() {
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x00, 0x00]), 0);
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x03, 0xE8]), 1000);
    assert_eq!(decode_grib2_signed(&90_000_000_u32.to_be_bytes()), 90_000_000);
}

#[test]
fn test_decode_grib2_signed_negative() {
    assert_eq!(decode_grib2_signed(&[0x80, 0x00, 0x00, 0x01]), -1);
    let south_pole = (90_000_000_u32 | 0x8000_0000).to_be_bytes();
    assert_eq!(decode_grib2_signed(&south_pole), -90_000_000);
}

#[test]
fn test_sign_magnitude_vs_twos_complement() {
    // Two's complement -1 reads as the largest negative magnitude
    assert_eq!(decode_grib2_signed(&[0xFF, 0xFF, 0xFF, 0xFF]), -2147483647);
    // Negative zero
    assert_eq!(decode_grib2_signed(&[0x80, 0x00, 0x00, 0x00]), 0);
}

#[test]
fn test_decode_grib2_signed_wrong_length() {
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x01]), 0);
    assert_eq!(decode_grib2_signed(&[]), 0);
    assert_eq!(decode_grib2_signed16(&[0x80]), 0);
}

#[test]
fn test_decode_grib2_signed16() {
    assert_eq!(decode_grib2_signed16(&[0x00, 0x05]), 5);
    assert_eq!(decode_grib2_signed16(&[0x80, 0x05]), -5);
}

#[test]
fn test_hrrr_typical_coordinates() {
    let lat = 21_138_000_u32.to_be_bytes();
    assert_eq!(decode_grib2_signed(&lat), 21_138_000);

    let lon = (134_095_000_u32 | 0x8000_0000).to_be_bytes();
    assert_eq!(decode_grib2_signed(&lon), -134_095_000);
}

// ============================================================================
// Section 4 and 5
// ============================================================================

fn product_section(template: u16, body: &[u8]) -> Vec<u8> {
    let mut section = Vec::new();
    section.extend_from_slice(&(9 + body.len() as u32).to_be_bytes());
    section.push(4);
    section.extend_from_slice(&0u16.to_be_bytes());
    section.extend_from_slice(&template.to_be_bytes());
    section.extend_from_slice(body);
    section
}

fn horizontal_body(category: u8, number: u8, unit: u8, time: u32, level: (u8, u8, u32)) -> Vec<u8> {
    let mut body = vec![category, number, 2, 0, 0, 0, 0, 0, unit];
    body.extend_from_slice(&time.to_be_bytes());
    body.push(level.0);
    body.push(level.1);
    body.extend_from_slice(&level.2.to_be_bytes());
    body.extend_from_slice(&[255, 0, 0, 0, 0, 0]);
    body
}

#[test]
fn test_product_template_0() {
    let section = product_section(0, &horizontal_body(0, 0, 1, 6, (103, 0, 2)));
    let pd = parse_product_definition(&section, 0).unwrap();

    assert_eq!(pd.parameter_short_name, "TMP");
    assert_eq!(pd.level_description, "2 m above ground");
    assert_eq!(pd.forecast_time, 6);
    assert_eq!(pd.forecast_time_unit, TimeUnit::Hours);
    assert_eq!(pd.step_type(), StepType::Instant);
}

#[test]
fn test_product_template_8_time_range() {
    let mut body = horizontal_body(1, 8, 1, 0, (1, 0, 0));
    body.extend_from_slice(&2024u16.to_be_bytes());
    body.extend_from_slice(&[1, 15, 13, 0, 0]);
    body.push(1);
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(&[1, 2, 0]); // accumulation over minutes
    body.extend_from_slice(&15u32.to_be_bytes());
    body.extend_from_slice(&[255, 0, 0, 0, 0]);

    let pd = parse_product_definition(&product_section(8, &body), 0).unwrap();
    assert_eq!(pd.parameter_short_name, "APCP");
    assert_eq!(pd.level_description, "surface");
    assert_eq!(pd.step_type(), StepType::Accum);

    let stat = pd.statistical.unwrap();
    assert_eq!(stat.time_range_unit, TimeUnit::Minutes);
    assert_eq!(stat.length_of_time_range, 15);
}

#[test]
fn test_product_unknown_template_keeps_parameter() {
    let section = product_section(40, &[0, 0, 2, 0, 0]);
    let pd = parse_product_definition(&section, 0).unwrap();
    assert_eq!(pd.parameter_short_name, "TMP");
    assert_eq!(pd.level_description, "unknown");
    assert!(pd.statistical.is_none());
}

#[test]
fn test_product_truncated() {
    let section = product_section(0, &[0, 0, 2]);
    assert!(parse_product_definition(&section, 0).is_err());
}

#[test]
fn test_data_representation_negative_scales() {
    let mut section = 21u32.to_be_bytes().to_vec();
    section.push(5);
    section.extend_from_slice(&100u32.to_be_bytes());
    section.extend_from_slice(&0u16.to_be_bytes());
    section.extend_from_slice(&1.5f32.to_be_bytes());
    section.extend_from_slice(&[0x80, 0x03]); // E = -3
    section.extend_from_slice(&[0x00, 0x02]); // D = 2
    section.push(12);
    section.push(0);

    let drs = parse_data_representation(&section).unwrap();
    assert_eq!(drs.num_data_points, 100);
    assert_eq!(drs.reference_value, 1.5);
    assert_eq!(drs.binary_scale_factor, -3);
    assert_eq!(drs.decimal_scale_factor, 2);
    assert_eq!(drs.bits_per_value, 12);
}
