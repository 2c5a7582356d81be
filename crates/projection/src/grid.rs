//! Mapping geographic points to flat value-array indices.
//!
//! Decoded values are stored in GRIB scan order; the scanning mode flags
//! (Flag Table 3.4) decide how (i, j) turn into an offset:
//! - 0x80: points scan in the -i direction
//! - 0x40: points scan in the +j direction
//! - 0x20: adjacent points in j are consecutive

use wx_common::ProjectionParams;

use crate::lambert::LambertConformal;

/// Point lookup for one projection.
#[derive(Debug, Clone)]
pub enum GridMapping {
    LatLon {
        ni: usize,
        nj: usize,
        lat1: f64,
        lon1: f64,
        di: f64,
        dj: f64,
        scanning_mode: u8,
    },
    Lambert {
        proj: LambertConformal,
        scanning_mode: u8,
    },
}

impl GridMapping {
    pub fn from_params(params: &ProjectionParams) -> Self {
        match params {
            ProjectionParams::LatLon {
                ni,
                nj,
                lat1,
                lon1,
                di,
                dj,
                scanning_mode,
                ..
            } => GridMapping::LatLon {
                ni: *ni as usize,
                nj: *nj as usize,
                lat1: *lat1,
                lon1: *lon1,
                di: *di,
                dj: *dj,
                scanning_mode: *scanning_mode,
            },
            ProjectionParams::LambertConformal {
                nx,
                ny,
                lat1,
                lon1,
                lov,
                latin1,
                latin2,
                dx,
                dy,
                scanning_mode,
            } => GridMapping::Lambert {
                proj: LambertConformal::from_grib2(
                    *lat1,
                    *lon1,
                    *lov,
                    *latin1,
                    *latin2,
                    *dx,
                    *dy,
                    *nx as usize,
                    *ny as usize,
                ),
                scanning_mode: *scanning_mode,
            },
        }
    }

    /// Grid shape as (columns, rows).
    pub fn shape(&self) -> (usize, usize) {
        match self {
            GridMapping::LatLon { ni, nj, .. } => (*ni, *nj),
            GridMapping::Lambert { proj, .. } => (proj.nx, proj.ny),
        }
    }

    /// Offset into a value array of the grid point nearest to (lat, lon),
    /// or `None` when the point falls outside the grid.
    pub fn nearest_index(&self, lat: f64, lon: f64) -> Option<usize> {
        let (ni, nj) = self.shape();
        let (i, j, scanning_mode) = match self {
            GridMapping::LatLon {
                ni,
                lat1,
                lon1,
                di,
                dj,
                scanning_mode,
                ..
            } => {
                let dlon = (lon - lon1).rem_euclid(360.0);
                let dlon = if scanning_mode & 0x80 != 0 {
                    (360.0 - dlon).rem_euclid(360.0)
                } else {
                    dlon
                };
                let mut i = (dlon / di).round() as i64;
                // Global grids wrap around the date line
                if i == *ni as i64 && (*ni as f64 * di - 360.0).abs() < di / 2.0 {
                    i = 0;
                }
                let j = if scanning_mode & 0x40 != 0 {
                    (lat - lat1) / dj
                } else {
                    (lat1 - lat) / dj
                };
                (i, j.round() as i64, *scanning_mode)
            }
            GridMapping::Lambert {
                proj,
                scanning_mode,
            } => {
                let (mut i, mut j) = proj.geo_to_grid(lat, lon);
                if scanning_mode & 0x80 != 0 {
                    i = -i;
                }
                if scanning_mode & 0x40 == 0 {
                    j = -j;
                }
                (i.round() as i64, j.round() as i64, *scanning_mode)
            }
        };

        if i < 0 || j < 0 || i >= ni as i64 || j >= nj as i64 {
            return None;
        }
        let (i, j) = (i as usize, j as usize);
        if scanning_mode & 0x20 != 0 {
            Some(i * nj + j)
        } else {
            Some(j * ni + i)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gfs_quarter_degree() -> GridMapping {
        GridMapping::from_params(&ProjectionParams::LatLon {
            ni: 1440,
            nj: 721,
            lat1: 90.0,
            lon1: 0.0,
            lat2: -90.0,
            lon2: 359.75,
            di: 0.25,
            dj: 0.25,
            scanning_mode: 0,
        })
    }

    #[test]
    fn test_latlon_north_to_south() {
        let grid = gfs_quarter_degree();
        assert_eq!(grid.nearest_index(90.0, 0.0), Some(0));
        // One row south, one column east
        assert_eq!(grid.nearest_index(89.75, 0.25), Some(1440 + 1));
        // Negative longitudes wrap into 0..360
        assert_eq!(grid.nearest_index(90.0, -0.25), Some(1439));
        // Nearest column to 359.9 is the wrapped first column
        assert_eq!(grid.nearest_index(90.0, 359.9), Some(0));
        assert_eq!(grid.nearest_index(-90.0, 0.0), Some(720 * 1440));
    }

    #[test]
    fn test_latlon_regional_outside() {
        let grid = GridMapping::from_params(&ProjectionParams::LatLon {
            ni: 4,
            nj: 3,
            lat1: 40.0,
            lon1: 270.0,
            lat2: 42.0,
            lon2: 273.0,
            di: 1.0,
            dj: 1.0,
            scanning_mode: 0x40,
        });
        assert_eq!(grid.nearest_index(41.0, -88.0), Some(4 + 2));
        assert_eq!(grid.nearest_index(45.0, -88.0), None);
        assert_eq!(grid.nearest_index(41.0, 0.0), None);
    }

    #[test]
    fn test_column_major_scanning() {
        let grid = GridMapping::from_params(&ProjectionParams::LatLon {
            ni: 4,
            nj: 3,
            lat1: 40.0,
            lon1: 270.0,
            lat2: 42.0,
            lon2: 273.0,
            di: 1.0,
            dj: 1.0,
            scanning_mode: 0x40 | 0x20,
        });
        // i = 2, j = 1 -> i * nj + j
        assert_eq!(grid.nearest_index(41.0, -88.0), Some(2 * 3 + 1));
    }

    #[test]
    fn test_lambert_first_point() {
        let grid = GridMapping::from_params(&ProjectionParams::LambertConformal {
            nx: 1799,
            ny: 1059,
            lat1: 21.138123,
            lon1: 237.280472,
            lov: 262.5,
            latin1: 38.5,
            latin2: 38.5,
            dx: 3000.0,
            dy: 3000.0,
            scanning_mode: 0x40,
        });
        assert_eq!(grid.nearest_index(21.138123, -122.719528), Some(0));
        assert!(grid.nearest_index(39.0, -94.5).is_some());
        assert_eq!(grid.nearest_index(-30.0, 20.0), None);
    }
}
