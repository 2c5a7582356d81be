//! Common types and utilities shared across the wx-explore crates.

pub mod error;
pub mod field;
pub mod metrics;
pub mod projection;
pub mod request;
pub mod source;
pub mod time;

pub use error::{WxError, WxResult};
pub use field::{circular_mean, DataPoint, FieldBucket, FieldKey};
pub use metrics::{Metric, MetricId};
pub use projection::{Projection, ProjectionId, ProjectionParams};
pub use request::IngestRequest;
pub use source::{GribSelector, IndexSelector, Source, SourceField, SourceFieldId, SourceId, StepType};
pub use time::{from_unix, to_unix, TimeUnit};
