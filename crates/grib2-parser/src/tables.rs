//! Naming tables for parameters and levels.
//!
//! Names follow the wgrib2 inventory conventions so that a decoded message
//! and its `.idx` record describe a field with the same strings.

/// wgrib2 abbreviation for a (discipline, category, number) triple.
///
/// Returns "P{discipline}_{category}_{number}" if not found.
pub fn parameter_short_name(discipline: u8, category: u8, number: u8) -> String {
    let name = match (discipline, category, number) {
        // Temperature
        (0, 0, 0) => "TMP",
        (0, 0, 2) => "POT",
        (0, 0, 6) => "DPT",
        (0, 0, 10) => "LHTFL",
        (0, 0, 11) => "SHTFL",
        // Moisture
        (0, 1, 0) => "SPFH",
        (0, 1, 1) => "RH",
        (0, 1, 3) => "PWAT",
        (0, 1, 7) => "PRATE",
        (0, 1, 8) => "APCP",
        (0, 1, 11) => "SNOD",
        (0, 1, 13) => "WEASD",
        (0, 1, 192) => "CRAIN",
        (0, 1, 193) => "CFRZR",
        (0, 1, 194) => "CICEP",
        (0, 1, 195) => "CSNOW",
        // Momentum
        (0, 2, 0) => "WDIR",
        (0, 2, 1) => "WIND",
        (0, 2, 2) => "UGRD",
        (0, 2, 3) => "VGRD",
        (0, 2, 8) => "VVEL",
        (0, 2, 22) => "GUST",
        // Mass
        (0, 3, 0) => "PRES",
        (0, 3, 1) => "PRMSL",
        (0, 3, 5) => "HGT",
        (0, 3, 192) => "MSLET",
        // Cloud
        (0, 6, 1) => "TCDC",
        (0, 6, 3) => "LCDC",
        (0, 6, 4) => "MCDC",
        (0, 6, 5) => "HCDC",
        // Stability
        (0, 7, 6) => "CAPE",
        (0, 7, 7) => "CIN",
        // Radar
        (0, 16, 195) => "REFD",
        (0, 16, 196) => "REFC",
        // Physical atmospheric properties
        (0, 19, 0) => "VIS",
        // Land surface
        (2, 0, 0) => "LAND",
        _ => return format!("P{}_{}_{}", discipline, category, number),
    };
    name.to_string()
}

/// wgrib2 level description for a first fixed surface.
///
/// `value` is the already scaled level value in the surface's native unit.
pub fn level_description(level_type: u8, value: f64) -> String {
    match level_type {
        1 => "surface".to_string(),
        2 => "cloud base".to_string(),
        3 => "cloud top".to_string(),
        4 => "0C isotherm".to_string(),
        6 => "max wind".to_string(),
        7 => "tropopause".to_string(),
        8 => "top of atmosphere".to_string(),
        10 => "entire atmosphere".to_string(),
        100 => format!("{} mb", format_value(value / 100.0)),
        101 => "mean sea level".to_string(),
        102 => format!("{} m above mean sea level", format_value(value)),
        103 => format!("{} m above ground", format_value(value)),
        106 => format!("{} m below ground", format_value(value)),
        200 => "entire atmosphere (considered as a single layer)".to_string(),
        204 => "highest tropospheric freezing level".to_string(),
        211 => "boundary layer cloud layer".to_string(),
        214 => "low cloud layer".to_string(),
        215 => "cloud ceiling".to_string(),
        220 => "planetary boundary layer".to_string(),
        224 => "middle cloud layer".to_string(),
        234 => "high cloud layer".to_string(),
        _ => format!("Level type {} value {}", level_type, format_value(value)),
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_lookup() {
        assert_eq!(parameter_short_name(0, 0, 0), "TMP");
        assert_eq!(parameter_short_name(0, 2, 2), "UGRD");
        assert_eq!(parameter_short_name(0, 2, 3), "VGRD");
        assert_eq!(parameter_short_name(0, 1, 195), "CSNOW");
        assert_eq!(parameter_short_name(0, 6, 1), "TCDC");
    }

    #[test]
    fn test_parameter_not_found() {
        assert_eq!(parameter_short_name(99, 99, 99), "P99_99_99");
    }

    #[test]
    fn test_level_descriptions() {
        assert_eq!(level_description(1, 0.0), "surface");
        assert_eq!(level_description(103, 2.0), "2 m above ground");
        assert_eq!(level_description(103, 10.0), "10 m above ground");
        assert_eq!(level_description(100, 50000.0), "500 mb");
        assert_eq!(level_description(100, 92500.0), "925 mb");
        assert_eq!(
            level_description(10, 0.0),
            "entire atmosphere"
        );
    }

    #[test]
    fn test_level_fractional_value() {
        assert_eq!(level_description(106, 0.1), "0.1 m below ground");
        assert_eq!(level_description(99, 5.0), "Level type 99 value 5");
    }
}
