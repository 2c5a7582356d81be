//! Grid projection descriptions attached to GRIB messages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectionId(pub i64);

/// Grid geometry of a GRIB message.
///
/// Angles are in degrees, longitudes as encoded by the producer (0..360 for
/// NCEP grids), grid spacing of Lambert grids in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "proj", rename_all = "snake_case")]
pub enum ProjectionParams {
    /// GRIB2 grid template 3.0
    LatLon {
        ni: u32,
        nj: u32,
        lat1: f64,
        lon1: f64,
        lat2: f64,
        lon2: f64,
        di: f64,
        dj: f64,
        scanning_mode: u8,
    },
    /// GRIB2 grid template 3.30
    LambertConformal {
        nx: u32,
        ny: u32,
        lat1: f64,
        lon1: f64,
        lov: f64,
        latin1: f64,
        latin2: f64,
        dx: f64,
        dy: f64,
        scanning_mode: u8,
    },
}

impl ProjectionParams {
    /// Grid shape as (columns, rows).
    pub fn shape(&self) -> (u32, u32) {
        match self {
            ProjectionParams::LatLon { ni, nj, .. } => (*ni, *nj),
            ProjectionParams::LambertConformal { nx, ny, .. } => (*nx, *ny),
        }
    }

    pub fn num_points(&self) -> usize {
        let (x, y) = self.shape();
        x as usize * y as usize
    }

    pub fn scanning_mode(&self) -> u8 {
        match self {
            ProjectionParams::LatLon { scanning_mode, .. }
            | ProjectionParams::LambertConformal { scanning_mode, .. } => *scanning_mode,
        }
    }
}

/// A persisted projection shared by every field stored on the same grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub id: ProjectionId,
    pub params: ProjectionParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_json_tagged() {
        let params = ProjectionParams::LatLon {
            ni: 1440,
            nj: 721,
            lat1: 90.0,
            lon1: 0.0,
            lat2: -90.0,
            lon2: 359.75,
            di: 0.25,
            dj: 0.25,
            scanning_mode: 0,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["proj"], "lat_lon");
        assert_eq!(params.num_points(), 1440 * 721);
    }
}
