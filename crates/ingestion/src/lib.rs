//! Model data ingestion.
//!
//! Turns remote GRIB2 forecast files into stored field arrays:
//!
//! - `.idx` inventories pick the byte ranges of the configured fields
//! - only those ranges are downloaded into a reduced GRIB file
//! - the reduced file is decoded message by message and flushed to the
//!   field store in size-bounded chunks
//!
//! The queue [`Worker`] drives this for published model runs and
//! [`import_local`] does the same for files already on disk.

pub mod chunk;
pub mod config;
pub mod derived;
pub mod error;
pub mod grib;
pub mod idx;
pub mod import;
pub mod reduce;
pub mod worker;

pub use chunk::Chunk;
pub use config::{FetchConfig, WorkerPolicy, DEFAULT_MAX_CHUNK_SIZE};
pub use derived::{DerivedContext, DerivedFieldGenerator, DerivedFields, DerivedRegistry, WindDerivation};
pub use error::{FetchError, IngestionError, Result};
pub use grib::{end_valid_time, GribIngestor, IngestStats};
pub use idx::{select_ranges, ByteRange};
pub use import::import_local;
pub use reduce::{reduce, HttpFetcher, ReduceStats, UrlFetcher};
pub use worker::{ItemOutcome, Worker, WorkerStats};
