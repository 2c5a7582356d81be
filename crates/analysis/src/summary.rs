//! Daily summaries of combined model data.

use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use serde::Serialize;

use wx_common::{metrics, MetricId};

use crate::combine::CombinedDataPoint;

const KELVIN_OFFSET: f64 = 273.15;

/// Combined values at or above this count as precipitating.
const PRECIP_THRESHOLD: f64 = 0.5;

/// Chances below this percentage are left out of the text.
const MENTION_CHANCE: u8 = 10;

/// `days` consecutive local-day windows starting at `start`.
///
/// The first window ends at the next local midnight after `start`, the
/// rest are full days.
pub fn daily_windows(
    start: DateTime<Utc>,
    days: u32,
    utc_offset: FixedOffset,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let local = start.with_timezone(&utc_offset);
    let since_midnight = Duration::seconds(local.num_seconds_from_midnight() as i64)
        + Duration::nanoseconds(local.nanosecond() as i64);
    let first_end = start - since_midnight + Duration::days(1);

    let mut windows = Vec::with_capacity(days as usize);
    let mut window_start = start;
    let mut window_end = first_end;
    for _ in 0..days {
        windows.push((window_start, window_end));
        window_start = window_end;
        window_end += Duration::days(1);
    }
    windows
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedValue {
    pub time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudCover {
    Clear,
    MostlyClear,
    PartlyCloudy,
    MostlyCloudy,
    Cloudy,
}

impl CloudCover {
    /// Category for a cover percentage.
    pub fn from_percent(percent: f64) -> Self {
        match percent {
            p if p <= 10.0 => CloudCover::Clear,
            p if p <= 30.0 => CloudCover::MostlyClear,
            p if p <= 60.0 => CloudCover::PartlyCloudy,
            p if p <= 90.0 => CloudCover::MostlyCloudy,
            _ => CloudCover::Cloudy,
        }
    }

    pub fn as_text(&self) -> &'static str {
        match self {
            CloudCover::Clear => "Clear",
            CloudCover::MostlyClear => "Mostly clear",
            CloudCover::PartlyCloudy => "Partly cloudy",
            CloudCover::MostlyCloudy => "Mostly cloudy",
            CloudCover::Cloudy => "Cloudy",
        }
    }
}

/// Cloud cover from `start` until the next period begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CloudPeriod {
    pub start: DateTime<Utc>,
    pub cover: CloudCover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecipitationKind {
    Rain,
    Snow,
}

impl PrecipitationKind {
    fn metric(&self) -> MetricId {
        match self {
            PrecipitationKind::Rain => metrics::RAINING,
            PrecipitationKind::Snow => metrics::SNOWING,
        }
    }

    fn as_text(&self) -> &'static str {
        match self {
            PrecipitationKind::Rain => "rain",
            PrecipitationKind::Snow => "snow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Light,
    Moderate,
    Heavy,
}

impl Intensity {
    /// Intensity for a composite reflectivity in dBZ.
    pub fn from_reflectivity(dbz: f64) -> Self {
        match dbz {
            d if d < 30.0 => Intensity::Light,
            d if d < 45.0 => Intensity::Moderate,
            _ => Intensity::Heavy,
        }
    }

    fn as_text(&self) -> &'static str {
        match self {
            Intensity::Light => "light",
            Intensity::Moderate => "moderate",
            Intensity::Heavy => "heavy",
        }
    }
}

/// Contiguous run of precipitating valid times, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecipitationSummary {
    pub kind: PrecipitationKind,
    /// Highest combined value in the window as a percentage
    pub chance: u8,
    pub periods: Vec<Period>,
    /// From the strongest reflectivity during `periods`
    pub intensity: Option<Intensity>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindSummary {
    pub mean_speed: Option<f64>,
    pub max_gust: Option<f64>,
    /// Degrees the wind blows from
    pub direction: Option<f64>,
    /// 16-point compass name of `direction`
    pub compass: Option<&'static str>,
}

/// Summary of one window of combined data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarizedData {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Temperatures in Kelvin, by time
    pub temps: Vec<TimedValue>,
    pub high: Option<TimedValue>,
    pub low: Option<TimedValue>,
    pub cloud_cover: Vec<CloudPeriod>,
    pub precipitation: Vec<PrecipitationSummary>,
    pub wind: Option<WindSummary>,
    pub text: String,
}

impl SummarizedData {
    /// Summarize the points with `start <= valid_time < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, points: &[CombinedDataPoint]) -> Self {
        let series = |metric: MetricId| -> Vec<TimedValue> {
            let mut values: Vec<TimedValue> = points
                .iter()
                .filter(|p| p.metric_id == metric && p.valid_time >= start && p.valid_time < end)
                .map(|p| TimedValue {
                    time: p.valid_time,
                    value: p.value,
                })
                .collect();
            values.sort_by_key(|v| v.time);
            values
        };

        let temps = series(metrics::TEMP);
        let high = temps
            .iter()
            .copied()
            .reduce(|a, b| if b.value > a.value { b } else { a });
        let low = temps
            .iter()
            .copied()
            .reduce(|a, b| if b.value < a.value { b } else { a });

        let clouds = series(metrics::CLOUD_COVER);
        let cloud_cover = cloud_periods(&clouds);

        let reflectivity = series(metrics::COMPOSITE_REFLECTIVITY);
        let precipitation = [PrecipitationKind::Rain, PrecipitationKind::Snow]
            .into_iter()
            .filter_map(|kind| precipitation_summary(kind, &series(kind.metric()), &reflectivity))
            .collect();

        let wind = wind_summary(
            &series(metrics::WIND_SPEED),
            &series(metrics::WIND_DIRECTION),
            &series(metrics::GUST_SPEED),
        );

        let mut summary = Self {
            start,
            end,
            temps,
            high,
            low,
            cloud_cover,
            precipitation,
            wind,
            text: String::new(),
        };
        summary.text = summary.describe(&clouds);
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.temps.is_empty()
            && self.cloud_cover.is_empty()
            && self.precipitation.is_empty()
            && self.wind.is_none()
    }

    fn describe(&self, clouds: &[TimedValue]) -> String {
        if self.is_empty() {
            return "No data".to_string();
        }

        let mut parts = Vec::new();

        if let (Some(high), Some(low)) = (self.high, self.low) {
            parts.push(format!(
                "High of {}°C, low of {}°C",
                celsius(high.value),
                celsius(low.value)
            ));
        }

        if !clouds.is_empty() {
            let mean = clouds.iter().map(|c| c.value).sum::<f64>() / clouds.len() as f64;
            parts.push(CloudCover::from_percent(mean).as_text().to_string());
        }

        for precip in &self.precipitation {
            if precip.chance < MENTION_CHANCE {
                continue;
            }
            let kind = match precip.intensity {
                Some(intensity) => format!("{} {}", intensity.as_text(), precip.kind.as_text()),
                None => precip.kind.as_text().to_string(),
            };
            parts.push(format!("{}% chance of {}", precip.chance, kind));
        }

        if let Some(wind) = &self.wind {
            let mut text = String::new();
            if let (Some(compass), Some(speed)) = (wind.compass, wind.mean_speed) {
                text = format!("Wind from the {} at {:.0} m/s", compass, speed);
            } else if let Some(speed) = wind.mean_speed {
                text = format!("Wind at {:.0} m/s", speed);
            }
            if let Some(gust) = wind.max_gust {
                if text.is_empty() {
                    text = format!("Gusts to {:.0} m/s", gust);
                } else {
                    text.push_str(&format!(", gusting to {:.0} m/s", gust));
                }
            }
            if !text.is_empty() {
                parts.push(text);
            }
        }

        if parts.is_empty() {
            return "No significant weather".to_string();
        }
        format!("{}.", parts.join(". "))
    }
}

fn celsius(kelvin: f64) -> i64 {
    (kelvin - KELVIN_OFFSET).round() as i64
}

fn cloud_periods(clouds: &[TimedValue]) -> Vec<CloudPeriod> {
    let mut periods: Vec<CloudPeriod> = Vec::new();
    for cloud in clouds {
        let cover = CloudCover::from_percent(cloud.value);
        if periods.last().map(|p| p.cover) != Some(cover) {
            periods.push(CloudPeriod {
                start: cloud.time,
                cover,
            });
        }
    }
    periods
}

fn precipitation_summary(
    kind: PrecipitationKind,
    values: &[TimedValue],
    reflectivity: &[TimedValue],
) -> Option<PrecipitationSummary> {
    let max = values.iter().map(|v| v.value).reduce(f64::max)?;
    let chance = (max.clamp(0.0, 1.0) * 100.0).round() as u8;

    let mut periods: Vec<Period> = Vec::new();
    let mut open: Option<Period> = None;
    for value in values {
        if value.value >= PRECIP_THRESHOLD {
            open = Some(match open {
                Some(period) => Period {
                    end: value.time,
                    ..period
                },
                None => Period {
                    start: value.time,
                    end: value.time,
                },
            });
        } else if let Some(period) = open.take() {
            periods.push(period);
        }
    }
    periods.extend(open);

    let intensity = reflectivity
        .iter()
        .filter(|r| periods.iter().any(|p| r.time >= p.start && r.time <= p.end))
        .map(|r| r.value)
        .reduce(f64::max)
        .map(Intensity::from_reflectivity);

    Some(PrecipitationSummary {
        kind,
        chance,
        periods,
        intensity,
    })
}

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass name for a direction in degrees.
pub fn compass_point(degrees: f64) -> &'static str {
    let sector = (degrees.rem_euclid(360.0) / 22.5 + 0.5).floor() as usize % COMPASS.len();
    COMPASS[sector]
}

fn wind_summary(
    speeds: &[TimedValue],
    directions: &[TimedValue],
    gusts: &[TimedValue],
) -> Option<WindSummary> {
    if speeds.is_empty() && directions.is_empty() && gusts.is_empty() {
        return None;
    }

    let mean_speed = (!speeds.is_empty())
        .then(|| speeds.iter().map(|s| s.value).sum::<f64>() / speeds.len() as f64);
    let max_gust = gusts.iter().map(|g| g.value).reduce(f64::max);

    // Speed-weighted mean of unit vectors pointing where the wind comes from
    let (mut east, mut north) = (0.0, 0.0);
    for speed in speeds {
        if let Some(dir) = directions.iter().find(|d| d.time == speed.time) {
            let rad = dir.value.to_radians();
            east += speed.value * rad.sin();
            north += speed.value * rad.cos();
        }
    }
    let direction = (east.hypot(north) > f64::EPSILON)
        .then(|| east.atan2(north).to_degrees().rem_euclid(360.0));

    Some(WindSummary {
        mean_speed,
        max_gust,
        direction,
        compass: direction.map(compass_point),
    })
}
