//! Lambert Conformal Conic projection.
//!
//! Used by HRRR and NAM. Grid coordinates are measured from the first grid
//! point with `i` increasing eastward and `j` increasing northward along the
//! projection plane.

use std::f64::consts::PI;

/// Spherical earth radius used by NCEP grids (shape of earth 6)
pub const EARTH_RADIUS: f64 = 6371229.0;

/// Lambert Conformal Conic projection parameters.
#[derive(Debug, Clone)]
pub struct LambertConformal {
    /// Central meridian (LoV) in radians
    pub lon0: f64,
    /// Latitude of first grid point in radians
    pub lat1: f64,
    /// Longitude of first grid point in radians
    pub lon1: f64,
    /// Grid spacing in X direction (meters)
    pub dx: f64,
    /// Grid spacing in Y direction (meters)
    pub dy: f64,
    pub nx: usize,
    pub ny: usize,
    /// Cone constant
    n: f64,
    f: f64,
    /// Rho at first grid point
    rho1: f64,
    /// First grid point in projection coordinates
    origin: (f64, f64),
}

impl LambertConformal {
    /// Create a projection from GRIB2 template 3.30 values (degrees, meters).
    #[allow(clippy::too_many_arguments)]
    pub fn from_grib2(
        lat1_deg: f64,
        lon1_deg: f64,
        lov_deg: f64,
        latin1_deg: f64,
        latin2_deg: f64,
        dx: f64,
        dy: f64,
        nx: usize,
        ny: usize,
    ) -> Self {
        let to_rad = PI / 180.0;
        let lat1 = lat1_deg * to_rad;
        let lon1 = lon1_deg * to_rad;
        let lon0 = lov_deg * to_rad;
        let latin1 = latin1_deg * to_rad;
        let latin2 = latin2_deg * to_rad;

        let n = if (latin1 - latin2).abs() < 1e-10 {
            // Tangent cone
            latin1.sin()
        } else {
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((PI / 4.0 + latin2 / 2.0).tan() / (PI / 4.0 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };
        let f = (latin1.cos() * (PI / 4.0 + latin1 / 2.0).tan().powf(n)) / n;
        let rho1 = EARTH_RADIUS * f / (PI / 4.0 + lat1 / 2.0).tan().powf(n);

        let theta1 = n * normalize_lon(lon1 - lon0);
        let origin = (rho1 * theta1.sin(), -rho1 * theta1.cos());

        Self {
            lon0,
            lat1,
            lon1,
            dx,
            dy,
            nx,
            ny,
            n,
            f,
            rho1,
            origin,
        }
    }

    /// HRRR CONUS grid: 1799 x 1059 at 3 km.
    pub fn hrrr() -> Self {
        Self::from_grib2(
            21.138123, 237.280472, 262.5, 38.5, 38.5, 3000.0, 3000.0, 1799, 1059,
        )
    }

    /// Geographic coordinates (degrees) to fractional grid indices (i, j).
    pub fn geo_to_grid(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;
        let lon = lon_deg * to_rad;

        let rho = EARTH_RADIUS * self.f / (PI / 4.0 + lat / 2.0).tan().powf(self.n);
        let theta = self.n * normalize_lon(lon - self.lon0);
        let x = rho * theta.sin();
        let y = -rho * theta.cos();

        ((x - self.origin.0) / self.dx, (y - self.origin.1) / self.dy)
    }

    /// Fractional grid indices to geographic coordinates (degrees).
    pub fn grid_to_geo(&self, i: f64, j: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let x = self.origin.0 + i * self.dx;
        let y = self.origin.1 + j * self.dy;

        let rho = (x * x + y * y).sqrt().copysign(self.n);
        let theta = (x / -y).atan();

        let lat = 2.0 * (EARTH_RADIUS * self.f / rho).powf(1.0 / self.n).atan() - PI / 2.0;
        let lon = self.lon0 + theta / self.n;
        (lat * to_deg, lon * to_deg)
    }

    /// Rho at the first grid point, in meters.
    pub fn first_point_radius(&self) -> f64 {
        self.rho1
    }
}

fn normalize_lon(mut dlon: f64) -> f64 {
    while dlon > PI {
        dlon -= 2.0 * PI;
    }
    while dlon < -PI {
        dlon += 2.0 * PI;
    }
    dlon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hrrr_first_grid_point() {
        let proj = LambertConformal::hrrr();

        let (i, j) = proj.geo_to_grid(21.138123, -122.719528);
        assert!(i.abs() < 0.1, "i should be ~0, got {}", i);
        assert!(j.abs() < 0.1, "j should be ~0, got {}", j);
    }

    #[test]
    fn test_hrrr_roundtrip() {
        let proj = LambertConformal::hrrr();

        let (lat, lon) = proj.grid_to_geo(900.0, 500.0);
        let (i, j) = proj.geo_to_grid(lat, lon);

        assert!((i - 900.0).abs() < 0.01, "i roundtrip failed: {}", i);
        assert!((j - 500.0).abs() < 0.01, "j roundtrip failed: {}", j);
    }

    #[test]
    fn test_hrrr_conus_center() {
        let proj = LambertConformal::hrrr();

        // Kansas City sits near the middle of the grid
        let (i, j) = proj.geo_to_grid(39.0, -94.5);
        assert!(i > 700.0 && i < 1100.0, "KC should be in middle x, got {}", i);
        assert!(j > 400.0 && j < 700.0, "KC should be in middle y, got {}", j);
    }

    #[test]
    fn test_first_point_radius_positive() {
        assert!(LambertConformal::hrrr().first_point_radius() > 0.0);
    }
}
