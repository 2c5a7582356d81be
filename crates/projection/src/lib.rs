//! Grid geometry for locating a geographic point inside a GRIB grid.
//!
//! Implements the projections NCEP models are distributed on without
//! external dependencies.

pub mod grid;
pub mod lambert;

pub use grid::GridMapping;
pub use lambert::LambertConformal;
