//! Synthetic GRIB2 messages.
//!
//! Builds structurally valid messages with simple packing (template 5.0),
//! grid templates 3.0 or 3.30 and product templates 4.0 or 4.8. NaN values
//! are encoded through a bitmap.

/// Grid geometry written to Section 3.
#[derive(Debug, Clone)]
pub enum GridSpec {
    /// Template 3.0; angles in microdegrees
    LatLon {
        ni: u32,
        nj: u32,
        la1: i32,
        lo1: i32,
        la2: i32,
        lo2: i32,
        di: u32,
        dj: u32,
    },
    /// Template 3.30; angles in microdegrees, spacing in millimeters
    Lambert {
        nx: u32,
        ny: u32,
        la1: i32,
        lo1: i32,
        lov: i32,
        latin1: i32,
        latin2: i32,
        dx: u32,
        dy: u32,
    },
}

impl GridSpec {
    pub fn num_points(&self) -> usize {
        match self {
            GridSpec::LatLon { ni, nj, .. } => (*ni * *nj) as usize,
            GridSpec::Lambert { nx, ny, .. } => (*nx * *ny) as usize,
        }
    }
}

/// Statistical processing written as product template 4.8.
#[derive(Debug, Clone, Copy)]
pub struct Statistical {
    /// Code Table 4.10 (0 avg, 1 accum, 2 max, 3 min)
    pub process: u8,
    /// Code Table 4.4 (0 minute, 1 hour, 2 day, 13 second)
    pub unit: u8,
    pub length: u32,
}

/// Build a GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    grid: GridSpec,
    scanning_mode: u8,
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_scale: u8,
    level_value: u32,
    forecast_time: u32,
    forecast_unit: u8,
    statistical: Option<Statistical>,
    decimal_scale: i16,
    values: Vec<f32>,
}

impl Grib2Builder {
    /// 2 m temperature on a 4x3 one-degree lat/lon grid.
    pub fn new_gfs() -> Self {
        let grid = GridSpec::LatLon {
            ni: 4,
            nj: 3,
            la1: 42_000_000,
            lo1: 270_000_000,
            la2: 40_000_000,
            lo2: 273_000_000,
            di: 1_000_000,
            dj: 1_000_000,
        };
        Self::with_defaults(grid)
    }

    /// 2 m temperature on a 4x3 Lambert conformal grid with 3 km spacing.
    pub fn new_hrrr() -> Self {
        let grid = GridSpec::Lambert {
            nx: 4,
            ny: 3,
            la1: 21_138_123,
            lo1: 237_280_472,
            lov: 262_500_000,
            latin1: 38_500_000,
            latin2: 38_500_000,
            dx: 3_000_000,
            dy: 3_000_000,
        };
        Self::with_defaults(grid)
    }

    fn with_defaults(grid: GridSpec) -> Self {
        let n = grid.num_points();
        Self {
            discipline: 0,
            center: 7,
            year: 2024,
            month: 1,
            day: 15,
            hour: 12,
            grid,
            scanning_mode: 0b0100_0000,
            param_category: 0,
            param_number: 0,
            level_type: 103,
            level_scale: 0,
            level_value: 2,
            forecast_time: 0,
            forecast_unit: 1,
            statistical: None,
            decimal_scale: 2,
            values: vec![288.15; n],
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.values = vec![0.0; grid.num_points()];
        self.grid = grid;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_scale = 0;
        self.level_value = level_value;
        self
    }

    /// Forecast time in hours.
    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_time = hour;
        self.forecast_unit = 1;
        self
    }

    /// Forecast time with an explicit Code Table 4.4 unit.
    pub fn with_forecast_time(mut self, time: u32, unit: u8) -> Self {
        self.forecast_time = time;
        self.forecast_unit = unit;
        self
    }

    /// Switches to product template 4.8.
    pub fn with_statistical(mut self, process: u8, unit: u8, length: u32) -> Self {
        self.statistical = Some(Statistical {
            process,
            unit,
            length,
        });
        self
    }

    pub fn with_decimal_scale(mut self, decimal_scale: i16) -> Self {
        self.decimal_scale = decimal_scale;
        self
    }

    /// Values in scan order; NaN marks a missing point.
    pub fn with_values(mut self, values: Vec<f32>) -> Self {
        assert_eq!(
            values.len(),
            self.grid.num_points(),
            "value count must match the grid"
        );
        self.values = values;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        build_message(std::slice::from_ref(self))
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);
        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Start of forecast
        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0); // Minute
        section.push(0); // Second
        section.push(0); // Operational
        section.push(1); // Forecast
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut template = Vec::new();
        template.push(6); // Spherical earth, radius 6371229 m
        template.push(0);
        template.extend_from_slice(&0u32.to_be_bytes());
        template.push(0);
        template.extend_from_slice(&0u32.to_be_bytes());
        template.push(0);
        template.extend_from_slice(&0u32.to_be_bytes());

        let template_number: u16 = match &self.grid {
            GridSpec::LatLon {
                ni,
                nj,
                la1,
                lo1,
                la2,
                lo2,
                di,
                dj,
            } => {
                template.extend_from_slice(&ni.to_be_bytes());
                template.extend_from_slice(&nj.to_be_bytes());
                template.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
                template.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions
                template.extend_from_slice(&signed32(*la1));
                template.extend_from_slice(&signed32(*lo1));
                template.push(48); // Resolution and component flags
                template.extend_from_slice(&signed32(*la2));
                template.extend_from_slice(&signed32(*lo2));
                template.extend_from_slice(&di.to_be_bytes());
                template.extend_from_slice(&dj.to_be_bytes());
                template.push(self.scanning_mode);
                0
            }
            GridSpec::Lambert {
                nx,
                ny,
                la1,
                lo1,
                lov,
                latin1,
                latin2,
                dx,
                dy,
            } => {
                template.extend_from_slice(&nx.to_be_bytes());
                template.extend_from_slice(&ny.to_be_bytes());
                template.extend_from_slice(&signed32(*la1));
                template.extend_from_slice(&signed32(*lo1));
                template.push(8); // Resolution and component flags
                template.extend_from_slice(&signed32(*latin1)); // LaD
                template.extend_from_slice(&signed32(*lov));
                template.extend_from_slice(&dx.to_be_bytes());
                template.extend_from_slice(&dy.to_be_bytes());
                template.push(0); // Projection centre flag
                template.push(self.scanning_mode);
                template.extend_from_slice(&signed32(*latin1));
                template.extend_from_slice(&signed32(*latin2));
                template.extend_from_slice(&signed32(-90_000_000)); // South pole
                template.extend_from_slice(&0u32.to_be_bytes());
                30
            }
        };

        let mut section = Vec::new();
        section.extend_from_slice(&(14 + template.len() as u32).to_be_bytes());
        section.push(3);
        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.grid.num_points() as u32).to_be_bytes());
        section.push(0); // Octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&template_number.to_be_bytes());
        section.extend_from_slice(&template);
        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(self.param_category);
        body.push(self.param_number);
        body.push(2); // Forecast
        body.push(0); // Background process
        body.push(0); // Forecast process
        body.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        body.push(0); // Minutes of cutoff
        body.push(self.forecast_unit);
        body.extend_from_slice(&self.forecast_time.to_be_bytes());
        body.push(self.level_type);
        body.push(self.level_scale);
        body.extend_from_slice(&self.level_value.to_be_bytes());
        body.push(255); // No second surface
        body.push(0);
        body.extend_from_slice(&0u32.to_be_bytes());

        let template_number: u16 = match &self.statistical {
            None => 0,
            Some(stat) => {
                // End of interval; the parser does not read it back
                body.extend_from_slice(&self.year.to_be_bytes());
                body.push(self.month);
                body.push(self.day);
                body.push(self.hour);
                body.push(0);
                body.push(0);
                body.push(1); // One time range
                body.extend_from_slice(&0u32.to_be_bytes()); // Missing values
                body.push(stat.process);
                body.push(2); // Successive times, forecast time incremented
                body.push(stat.unit);
                body.extend_from_slice(&stat.length.to_be_bytes());
                body.push(255); // Increment unit
                body.extend_from_slice(&0u32.to_be_bytes());
                8
            }
        };

        let mut section = Vec::new();
        section.extend_from_slice(&(9 + body.len() as u32).to_be_bytes());
        section.push(4);
        section.extend_from_slice(&0u16.to_be_bytes()); // Coordinate values
        section.extend_from_slice(&template_number.to_be_bytes());
        section.extend_from_slice(&body);
        section
    }

    /// Sections 5, 6 and 7.
    fn build_data_sections(&self) -> Vec<u8> {
        let present: Vec<f64> = self
            .values
            .iter()
            .filter(|v| !v.is_nan())
            .map(|v| *v as f64 * 10f64.powi(self.decimal_scale as i32))
            .collect();
        let has_bitmap = present.len() != self.values.len();

        let (min, max) = present
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        let (reference, range) = if present.is_empty() {
            (0.0, 0.0)
        } else {
            (min, max - min)
        };

        let (bits, binary_scale) = if range == 0.0 {
            (0u8, 0i16)
        } else {
            (16u8, (range / 65535.0).log2().ceil() as i16)
        };

        let mut packed = Vec::new();
        if bits > 0 {
            let step = 2f64.powi(binary_scale as i32);
            for v in &present {
                let x = ((v - reference) / step).round().clamp(0.0, 65535.0) as u16;
                packed.extend_from_slice(&x.to_be_bytes());
            }
        }

        let mut out = Vec::new();

        // Section 5
        out.extend_from_slice(&21u32.to_be_bytes());
        out.push(5);
        out.extend_from_slice(&(present.len() as u32).to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0
        out.extend_from_slice(&(reference as f32).to_be_bytes());
        out.extend_from_slice(&signed16(binary_scale));
        out.extend_from_slice(&signed16(self.decimal_scale));
        out.push(bits);
        out.push(0); // Floating point

        // Section 6
        if has_bitmap {
            let mut bitmap = vec![0u8; (self.values.len() + 7) / 8];
            for (i, v) in self.values.iter().enumerate() {
                if !v.is_nan() {
                    bitmap[i / 8] |= 0x80 >> (i % 8);
                }
            }
            out.extend_from_slice(&(6 + bitmap.len() as u32).to_be_bytes());
            out.push(6);
            out.push(0);
            out.extend_from_slice(&bitmap);
        } else {
            out.extend_from_slice(&6u32.to_be_bytes());
            out.push(6);
            out.push(255);
        }

        // Section 7
        out.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        out.push(7);
        out.extend_from_slice(&packed);

        out
    }
}

/// One physical message carrying every builder's field.
///
/// Sections 0, 1 and 3 come from the first builder; sections 4 to 7 are
/// repeated for each builder.
pub fn build_message(fields: &[Grib2Builder]) -> Vec<u8> {
    let first = fields.first().expect("at least one field");

    let mut body = first.build_section1();
    body.extend_from_slice(&first.build_section3());
    for field in fields {
        body.extend_from_slice(&field.build_section4());
        body.extend_from_slice(&field.build_data_sections());
    }
    body.extend_from_slice(b"7777");

    let mut message = Vec::with_capacity(16 + body.len());
    message.extend_from_slice(b"GRIB");
    message.extend_from_slice(&[0, 0]);
    message.push(first.discipline);
    message.push(2);
    message.extend_from_slice(&(16 + body.len() as u64).to_be_bytes());
    message.extend_from_slice(&body);
    message
}

fn signed32(value: i32) -> [u8; 4] {
    let raw = if value < 0 {
        value.unsigned_abs() | 0x8000_0000
    } else {
        value as u32
    };
    raw.to_be_bytes()
}

fn signed16(value: i16) -> [u8; 2] {
    let raw = if value < 0 {
        value.unsigned_abs() | 0x8000
    } else {
        value as u16
    };
    raw.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_gfs_message() {
        let data = Grib2Builder::new_gfs().build();

        assert_eq!(&data[0..4], b"GRIB");
        assert_eq!(data[7], 2);
        assert_eq!(data[6], 0);
        assert_eq!(&data[data.len() - 4..], b"7777");

        let length = u64::from_be_bytes(data[8..16].try_into().unwrap());
        assert_eq!(length as usize, data.len());
    }

    #[test]
    fn test_lambert_section_lengths() {
        let data = Grib2Builder::new_hrrr().build();
        // Section 1 is 21 bytes, Section 3 follows
        let s3 = &data[16 + 21..];
        assert_eq!(u32::from_be_bytes(s3[0..4].try_into().unwrap()), 81);
        assert_eq!(s3[4], 3);
    }

    #[test]
    fn test_statistical_section4_length() {
        let builder = Grib2Builder::new_gfs().with_statistical(1, 1, 1);
        assert_eq!(builder.build_section4().len(), 58);
        assert_eq!(Grib2Builder::new_gfs().build_section4().len(), 34);
    }

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(signed32(-1), [0x80, 0, 0, 1]);
        assert_eq!(signed16(-3), [0x80, 3]);
        assert_eq!(signed16(3), [0, 3]);
    }
}
