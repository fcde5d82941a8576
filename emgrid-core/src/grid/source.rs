//! Regular lon/lat inventory grid and its cell areas

use crate::errors::{EmgridError, EmgridResult};
use crate::field::FloatValue;
use ndarray::{Array1, Array2};
use std::f64::consts::PI;

use super::EARTH_RADIUS;

/// Regular lon/lat grid of the emission inventory
///
/// Boundary vectors have one more entry than the matching centre vector. Latitudes
/// may run north to south, as they do in the inventory files.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGrid {
    lon_bounds: Array1<FloatValue>,
    lat_bounds: Array1<FloatValue>,
    lon_centers: Array1<FloatValue>,
    lat_centers: Array1<FloatValue>,
}

impl SourceGrid {
    pub fn new(
        lon_bounds: Array1<FloatValue>,
        lat_bounds: Array1<FloatValue>,
        lon_centers: Array1<FloatValue>,
        lat_centers: Array1<FloatValue>,
    ) -> EmgridResult<Self> {
        if lon_bounds.len() != lon_centers.len() + 1 {
            return Err(EmgridError::InvalidBounds {
                axis: "longitude",
                index: lon_bounds.len(),
                reason: format!(
                    "expected {} boundaries for {} cells",
                    lon_centers.len() + 1,
                    lon_centers.len()
                ),
            });
        }
        if lat_bounds.len() != lat_centers.len() + 1 {
            return Err(EmgridError::InvalidBounds {
                axis: "latitude",
                index: lat_bounds.len(),
                reason: format!(
                    "expected {} boundaries for {} cells",
                    lat_centers.len() + 1,
                    lat_centers.len()
                ),
            });
        }
        Ok(Self {
            lon_bounds,
            lat_bounds,
            lon_centers,
            lat_centers,
        })
    }

    /// Evenly spaced grid between the inventory's edge coordinates
    ///
    /// Latitude boundaries run from `north` to `south`; centres are boundary midpoints.
    pub fn from_edges(
        west: FloatValue,
        east: FloatValue,
        north: FloatValue,
        south: FloatValue,
        n_lon: usize,
        n_lat: usize,
    ) -> EmgridResult<Self> {
        let lon_bounds = Array1::linspace(west, east, n_lon + 1);
        let lat_bounds = Array1::linspace(north, south, n_lat + 1);
        let midpoints = |b: &Array1<FloatValue>| {
            Array1::from_iter(b.windows(2).into_iter().map(|w| (w[0] + w[1]) / 2.0))
        };
        let lon_centers = midpoints(&lon_bounds);
        let lat_centers = midpoints(&lat_bounds);
        Self::new(lon_bounds, lat_bounds, lon_centers, lat_centers)
    }

    /// `(rows, cols)` = `(n_lat, n_lon)`
    pub fn shape(&self) -> (usize, usize) {
        (self.lat_centers.len(), self.lon_centers.len())
    }

    pub fn lon_bounds(&self) -> &Array1<FloatValue> {
        &self.lon_bounds
    }

    pub fn lat_bounds(&self) -> &Array1<FloatValue> {
        &self.lat_bounds
    }

    pub fn lon_centers(&self) -> &Array1<FloatValue> {
        &self.lon_centers
    }

    pub fn lat_centers(&self) -> &Array1<FloatValue> {
        &self.lat_centers
    }

    /// Per-pixel positions of the grid cell centres
    pub fn swath(&self) -> Swath {
        let (rows, cols) = self.shape();
        let lons = Array2::from_shape_fn((rows, cols), |(_, j)| self.lon_centers[j]);
        let lats = Array2::from_shape_fn((rows, cols), |(i, _)| self.lat_centers[i]);
        Swath { lons, lats }
    }
}

/// Irregular set of sample positions, one lon/lat pair per source pixel
#[derive(Debug, Clone, PartialEq)]
pub struct Swath {
    lons: Array2<FloatValue>,
    lats: Array2<FloatValue>,
}

impl Swath {
    pub fn new(lons: Array2<FloatValue>, lats: Array2<FloatValue>) -> EmgridResult<Self> {
        if lons.shape() != lats.shape() {
            return Err(EmgridError::ShapeMismatch {
                context: "swath latitudes".to_string(),
                expected: lons.shape().to_vec(),
                found: lats.shape().to_vec(),
            });
        }
        Ok(Self { lons, lats })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.lons.dim()
    }

    pub fn lons(&self) -> &Array2<FloatValue> {
        &self.lons
    }

    pub fn lats(&self) -> &Array2<FloatValue> {
        &self.lats
    }
}

/// Surface area of every source cell (m²)
#[derive(Debug, Clone, PartialEq)]
pub struct CellArea {
    values: Array2<FloatValue>,
}

impl CellArea {
    pub const UNIT: &'static str = "m^2";

    /// Wrap precomputed areas
    pub fn from_values(values: Array2<FloatValue>) -> EmgridResult<Self> {
        if let Some(bad) = values.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
            return Err(EmgridError::InvalidBounds {
                axis: "area",
                index: 0,
                reason: format!("cell area must be finite and non-negative, got {}", bad),
            });
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &Array2<FloatValue> {
        &self.values
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn total(&self) -> FloatValue {
        self.values.sum()
    }
}

/// Area of the spherical cap north of `lat` (degrees)
fn cap_area(lat: FloatValue) -> FloatValue {
    let cap_height = EARTH_RADIUS * (1.0 - lat.to_radians().sin());
    2.0 * PI * EARTH_RADIUS * cap_height
}

/// Check that a boundary vector is finite, strictly monotonic and brackets its centres
fn validate_axis(
    axis: &'static str,
    bounds: &Array1<FloatValue>,
    centers: &Array1<FloatValue>,
    limit: FloatValue,
) -> EmgridResult<()> {
    if bounds.len() != centers.len() + 1 || centers.is_empty() {
        return Err(EmgridError::InvalidBounds {
            axis,
            index: bounds.len(),
            reason: format!(
                "expected {} boundaries for {} cells",
                centers.len() + 1,
                centers.len()
            ),
        });
    }
    let direction = (bounds[1] - bounds[0]).signum();
    for (index, center) in centers.iter().enumerate() {
        let (lower, upper) = (bounds[index], bounds[index + 1]);
        if !(lower.is_finite() && upper.is_finite()) || lower.abs() > limit || upper.abs() > limit
        {
            return Err(EmgridError::InvalidBounds {
                axis,
                index,
                reason: format!("boundary outside ±{}: [{}, {}]", limit, lower, upper),
            });
        }
        let delta = upper - lower;
        if delta == 0.0 || delta.signum() != direction {
            return Err(EmgridError::InvalidBounds {
                axis,
                index,
                reason: format!("degenerate or inverted cell [{}, {}]", lower, upper),
            });
        }
        if *center < lower.min(upper) || *center > lower.max(upper) {
            return Err(EmgridError::InvalidBounds {
                axis,
                index,
                reason: format!("centre {} outside cell [{}, {}]", center, lower, upper),
            });
        }
    }
    Ok(())
}

/// Compute the true spherical surface area of every source cell
///
/// Each cell's area is the difference between the spherical caps bounded by its two
/// latitude edges, scaled by the fraction of the full circle spanned by its longitude
/// edges:
///
/// $$ A_{ij} = \left| C(\phi_i) - C(\phi_{i+1}) \right| \frac{|\lambda_{j+1} - \lambda_j|}{360} $$
///
/// with $C(\phi) = 2 \pi R^2 (1 - \sin\phi)$.
pub fn compute_cell_area(grid: &SourceGrid) -> EmgridResult<CellArea> {
    validate_axis("longitude", grid.lon_bounds(), grid.lon_centers(), 360.0)?;
    validate_axis("latitude", grid.lat_bounds(), grid.lat_centers(), 90.0)?;

    let lon_b = grid.lon_bounds();
    let lat_b = grid.lat_bounds();
    let values = Array2::from_shape_fn(grid.shape(), |(i, j)| {
        let band = (cap_area(lat_b[i]) - cap_area(lat_b[i + 1])).abs();
        band * (lon_b[j + 1] - lon_b[j]).abs() / 360.0
    });
    Ok(CellArea { values })
}
