//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! Messages are scanned from a seekable reader, their metadata sections are
//! decoded eagerly and their values are unpacked on demand.

pub mod file;
pub mod message;
pub mod reader;
pub mod sections;
pub mod tables;
pub mod unpacking;

pub use file::{GribFile, GribSource};
pub use message::Grib2Message;
pub use reader::Grib2Reader;

use thiserror::Error;

/// Errors that can occur while reading GRIB2 data.
#[derive(Error, Debug)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unsupported template {template} in section {section}")]
    UnsupportedTemplate { section: u8, template: u16 },

    #[error("Unpacking error: {0}")]
    UnpackingError(String),

    #[error("No messages matched {0}")]
    NoMatch(String),

    #[error("GRIB file is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Grib2Error>;
