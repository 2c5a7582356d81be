//! Storage abstractions for the ingestion pipeline.
//!
//! The ingestor and summarizer only see the traits defined here:
//! - [`FieldStore`]: decoded value arrays, keyed by field/valid/run time
//! - [`ProjectionRegistry`] and [`SourceCatalog`]: sources, fields, grids
//! - [`IngestQueue`]: delayed work items for the worker
//!
//! Production backends are object storage (S3/MinIO or local disk),
//! PostgreSQL and Redis; in-memory backends serve tests and local runs.

pub mod catalog;
pub mod fields;
pub mod memory;
pub mod object_store;
pub mod queue;
pub mod seed;

pub use self::object_store::{build_object_store, ObjectStorageConfig};
pub use catalog::{PgCatalog, ProjectionRegistry, SourceCatalog};
pub use fields::{FieldStore, ObjectFieldStore, PointQuery};
pub use memory::{MemoryCatalog, MemoryQueue};
pub use queue::{IngestQueue, RedisQueue, DEFAULT_QUEUE_KEY};
pub use seed::{CatalogSeed, FieldSeed, SourceSeed};
