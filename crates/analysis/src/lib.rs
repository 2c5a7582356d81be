//! Query-time analysis of stored model data.
//!
//! [`combine_models`] merges the data points of competing sources into one
//! value per metric and valid time; [`SummarizedData`] reduces the combined
//! series of one local day into highs, lows, conditions and a short text.

pub mod combine;
pub mod summary;

pub use combine::{combine_models, CombinedDataPoint};
pub use summary::{
    compass_point, daily_windows, CloudCover, CloudPeriod, Intensity, Period,
    PrecipitationKind, PrecipitationSummary, SummarizedData, TimedValue, WindSummary,
};
