//! Grid geometry for the source inventory and the target domain
//!
//! - [`projection`]: the four WRF map projections on a sphere
//! - [`target`]: the projected target grid built from domain metadata
//! - [`source`]: the regular lon/lat inventory grid and its cell areas

pub mod projection;
pub mod source;
pub mod target;

use crate::field::FloatValue;

pub use projection::{Projection, ProjectionKind, ProjectionSpec};
pub use source::{compute_cell_area, CellArea, SourceGrid, Swath};
pub use target::{build_target_grid, Extent, OriginCorner, TargetGridDefinition};

/// Radius of the spherical Earth used by WRF (m)
pub const EARTH_RADIUS: FloatValue = 6_370_000.0;

/// Earth-centred cartesian position (m) of a lon/lat point (degrees) on the sphere
pub fn lonlat_to_cartesian(lon: FloatValue, lat: FloatValue) -> [FloatValue; 3] {
    let (lam, phi) = (lon.to_radians(), lat.to_radians());
    [
        EARTH_RADIUS * phi.cos() * lam.cos(),
        EARTH_RADIUS * phi.cos() * lam.sin(),
        EARTH_RADIUS * phi.sin(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_points_lie_on_the_sphere() {
        for (lon, lat) in [(0.0, 0.0), (118.0, 32.0), (-70.0, -45.0), (10.0, 90.0)] {
            let [x, y, z] = lonlat_to_cartesian(lon, lat);
            let r = (x * x + y * y + z * z).sqrt();
            assert!((r - EARTH_RADIUS).abs() < 1e-6);
        }
    }

    #[test]
    fn one_degree_chord_on_the_equator() {
        let a = lonlat_to_cartesian(0.0, 0.0);
        let b = lonlat_to_cartesian(1.0, 0.0);
        let chord = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt();
        let expected = 2.0 * EARTH_RADIUS * (0.5_f64.to_radians()).sin();
        assert!((chord - expected).abs() < 1e-6);
    }
}
