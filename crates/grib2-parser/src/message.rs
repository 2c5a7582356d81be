//! Decoded GRIB2 messages.
//!
//! A physical message may repeat sections 2-7 to carry several fields; each
//! repetition becomes its own [`Grib2Message`] sharing the raw bytes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;
use wx_common::{ProjectionParams, StepType, TimeUnit};

use crate::sections::{
    parse_bitmap, parse_data_representation, parse_data_section, parse_grid_definition,
    parse_identification, parse_indicator, parse_product_definition, section_header,
    DataRepresentation, GridDefinition, Identification, Indicator, ProductDefinition,
    INDICATOR_LEN,
};
use crate::unpacking::{unpack_simple, unpack_with_grib_crate};
use crate::Grib2Error;

/// One field of a GRIB2 file.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    /// Index of this field within its physical message
    pub submessage: usize,
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    bitmap: Option<Bytes>,
    data: Bytes,
    raw: Bytes,
}

impl Grib2Message {
    /// Split a complete message (Section 0 through "7777") into fields.
    pub fn parse_all(raw: Bytes) -> Result<Vec<Grib2Message>, Grib2Error> {
        let indicator = parse_indicator(&raw)?;
        if indicator.message_length as usize != raw.len() {
            return Err(Grib2Error::InvalidFormat(format!(
                "Message length {} does not match buffer of {} bytes",
                indicator.message_length,
                raw.len()
            )));
        }

        let mut identification = None;
        let mut grid = None;
        let mut product = None;
        let mut drs = None;
        let mut bitmap: Option<Bytes> = None;
        let mut messages = Vec::new();

        let mut offset = INDICATOR_LEN;
        loop {
            let rest = &raw[offset..];
            if rest.starts_with(b"7777") {
                break;
            }

            let (length, number) = section_header(rest)?;
            let section = raw.slice(offset..offset + length);

            match number {
                1 => identification = Some(parse_identification(&section)?),
                2 => {} // local use
                3 => grid = Some(parse_grid_definition(&section)?),
                4 => product = Some(parse_product_definition(&section, indicator.discipline)?),
                5 => drs = Some(parse_data_representation(&section)?),
                6 => {
                    let bm = parse_bitmap(section)?;
                    match bm.indicator {
                        0 => bitmap = Some(bm.data),
                        254 => {} // previously defined bitmap applies
                        255 => bitmap = None,
                        other => {
                            return Err(Grib2Error::InvalidSection {
                                section: 6,
                                reason: format!("Predefined bitmap {} is not supported", other),
                            })
                        }
                    }
                }
                7 => {
                    let data = parse_data_section(section)?.data;
                    let (Some(identification), Some(grid), Some(product), Some(drs)) =
                        (&identification, &grid, &product, &drs)
                    else {
                        return Err(Grib2Error::InvalidSection {
                            section: 7,
                            reason: "Data section before sections 1, 3, 4 and 5".to_string(),
                        });
                    };
                    messages.push(Grib2Message {
                        submessage: messages.len(),
                        indicator: indicator.clone(),
                        identification: identification.clone(),
                        grid_definition: grid.clone(),
                        product_definition: product.clone(),
                        data_representation: drs.clone(),
                        bitmap: bitmap.clone(),
                        data,
                        raw: raw.clone(),
                    });
                }
                other => {
                    return Err(Grib2Error::InvalidSection {
                        section: other,
                        reason: "Unknown section number".to_string(),
                    })
                }
            }

            offset += length;
        }

        if messages.is_empty() {
            return Err(Grib2Error::InvalidFormat(
                "Message contains no data section".to_string(),
            ));
        }
        Ok(messages)
    }

    /// Parameter abbreviation, e.g. "TMP"
    pub fn short_name(&self) -> &str {
        &self.product_definition.parameter_short_name
    }

    /// Level description, e.g. "2 m above ground"
    pub fn level(&self) -> &str {
        &self.product_definition.level_description
    }

    pub fn step_type(&self) -> StepType {
        self.product_definition.step_type()
    }

    /// Model run (reference) time
    pub fn anal_date(&self) -> DateTime<Utc> {
        self.identification.reference_time
    }

    /// Reference time plus forecast time. For statistically processed
    /// fields this is the start of the processing interval.
    pub fn valid_date(&self) -> Result<DateTime<Utc>, Grib2Error> {
        let pd = &self.product_definition;
        if !pd.forecast_time_unit.is_fixed() {
            debug!(
                unit = pd.forecast_time_unit.as_str(),
                "Unknown forecast time unit, using reference time"
            );
            return Ok(self.anal_date());
        }

        pd.forecast_time_unit
            .advance(self.anal_date(), pd.forecast_time as i64)
            .ok_or_else(|| Grib2Error::InvalidSection {
                section: 4,
                reason: format!(
                    "Forecast time {} {} is out of range",
                    pd.forecast_time,
                    pd.forecast_time_unit.as_str()
                ),
            })
    }

    pub fn length_of_time_range(&self) -> Option<u32> {
        self.product_definition
            .statistical
            .as_ref()
            .map(|s| s.length_of_time_range)
    }

    pub fn time_range_unit(&self) -> Option<TimeUnit> {
        self.product_definition
            .statistical
            .as_ref()
            .map(|s| s.time_range_unit)
    }

    pub fn projection_params(&self) -> Result<ProjectionParams, Grib2Error> {
        self.grid_definition
            .projection
            .clone()
            .ok_or(Grib2Error::UnsupportedTemplate {
                section: 3,
                template: self.grid_definition.template_number,
            })
    }

    pub fn num_points(&self) -> usize {
        self.grid_definition.num_data_points as usize
    }

    /// Unpack the field's values in scan order; missing points are NaN.
    pub fn values(&self) -> Result<Vec<f32>, Grib2Error> {
        let values = match self.data_representation.template_number {
            0 => unpack_simple(
                &self.data,
                self.num_points(),
                &self.data_representation,
                self.bitmap.as_deref(),
            )?,
            2 | 3 | 41 => unpack_with_grib_crate(&self.raw, self.submessage)?,
            other => {
                return Err(Grib2Error::UnsupportedTemplate {
                    section: 5,
                    template: other,
                })
            }
        };

        if values.len() != self.num_points() {
            return Err(Grib2Error::UnpackingError(format!(
                "Decoded {} values for a grid of {} points",
                values.len(),
                self.num_points()
            )));
        }
        Ok(values)
    }
}
