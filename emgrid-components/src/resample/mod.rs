//! Resampling of hourly source fields onto the target grid
//!
//! A [`SpatialResampler`] pairs a source swath with a [`TargetGridDefinition`]. The
//! neighbour search is done once at construction; each hour slice is then resampled
//! independently by the configured [`Resampler`] strategy, in parallel, and the slices
//! are restacked in hour order.
//!
//! Resampled fields are returned with their first row at the southern edge of the
//! domain, the row order expected by WRF-Chem (`south_north`). Because the target
//! grid is defined with its origin at the upper-left corner, rows are flipped after
//! resampling.

mod bilinear;
mod geometry;
mod idw;
mod nearest;

pub use bilinear::{Bilinear, Quad};
pub use geometry::{Neighbour, ResampleGeometry, SwathIndex};
pub use idw::InverseDistance;
pub use nearest::NearestNeighbour;

use emgrid_core::config::{ResampleMethod, ResampleParameters};
use emgrid_core::errors::{EmgridError, EmgridResult};
use emgrid_core::field::{FieldMetadata, FloatValue, HourlyFlux, ResampledFlux};
use emgrid_core::grid::{OriginCorner, Swath, TargetGridDefinition};
use log::{debug, info};
use ndarray::{s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::sync::Arc;

/// A strategy that maps one source slice onto the target grid
///
/// Implementations read neighbour relations from a precomputed
/// [`ResampleGeometry`] and must be deterministic so hours can be processed in
/// any order.
pub trait Resampler: std::fmt::Debug + Send + Sync {
    fn method(&self) -> ResampleMethod;

    /// Number of nearest source pixels to gather per target cell
    fn neighbours_required(&self, params: &ResampleParameters) -> usize;

    /// Resample a single slice
    ///
    /// The returned field has the target grid shape in its native row order
    /// (see [`TargetGridDefinition::origin`]). Cells without a qualifying
    /// contribution hold `params.fill_value`.
    fn resample_slice(
        &self,
        values: ArrayView2<Option<FloatValue>>,
        geometry: &ResampleGeometry,
        params: &ResampleParameters,
    ) -> EmgridResult<Array2<FloatValue>>;
}

/// The strategy implementing `method`
pub fn strategy_for(method: ResampleMethod) -> Box<dyn Resampler> {
    match method {
        ResampleMethod::Nearest => Box::new(NearestNeighbour),
        ResampleMethod::InverseDistance => Box::new(InverseDistance),
        ResampleMethod::Bilinear => Box::new(Bilinear),
    }
}

/// Row-major copy of a slice after checking it matches the swath
fn flat_source(
    values: ArrayView2<Option<FloatValue>>,
    geometry: &ResampleGeometry,
) -> EmgridResult<Vec<Option<FloatValue>>> {
    let (rows, cols) = geometry.source_shape();
    if values.dim() != (rows, cols) {
        return Err(EmgridError::ShapeMismatch {
            context: "source slice".to_string(),
            expected: vec![rows, cols],
            found: values.shape().to_vec(),
        });
    }
    Ok(values.iter().copied().collect())
}

/// Reorder a slice from the target grid's native row order to south-to-north
pub fn south_to_north(slice: Array2<FloatValue>, origin: OriginCorner) -> Array2<FloatValue> {
    match origin {
        OriginCorner::UpperLeft => slice.slice(s![..;-1, ..]).to_owned(),
        OriginCorner::LowerLeft => slice,
    }
}

/// Resamples hourly fluxes from a fixed swath onto a fixed target grid
#[derive(Debug)]
pub struct SpatialResampler {
    target: Arc<TargetGridDefinition>,
    params: ResampleParameters,
    strategy: Box<dyn Resampler>,
    geometry: ResampleGeometry,
}

impl SpatialResampler {
    pub fn new(
        swath: &Swath,
        target: Arc<TargetGridDefinition>,
        params: ResampleParameters,
    ) -> EmgridResult<Self> {
        let strategy = strategy_for(params.method);
        let geometry = ResampleGeometry::build(
            swath,
            &target,
            strategy.neighbours_required(&params),
            params.radius_of_influence,
        )?;
        let (rows, cols) = geometry.target_shape();
        info!(
            "Resampling with {} onto {} ({}x{}), {} of {} target cells within {} m of the swath",
            params.method,
            target.area_id(),
            rows,
            cols,
            geometry.covered_cells(),
            rows * cols,
            params.radius_of_influence
        );
        Ok(Self {
            target,
            params,
            strategy,
            geometry,
        })
    }

    /// Build a resampler from a method name such as `"bilinear"`
    pub fn with_method_name(
        swath: &Swath,
        target: Arc<TargetGridDefinition>,
        method: &str,
        params: ResampleParameters,
    ) -> EmgridResult<Self> {
        let method = method.parse()?;
        Self::new(swath, target, ResampleParameters { method, ..params })
    }

    pub fn method(&self) -> ResampleMethod {
        self.strategy.method()
    }

    pub fn parameters(&self) -> &ResampleParameters {
        &self.params
    }

    pub fn target(&self) -> &TargetGridDefinition {
        &self.target
    }

    pub fn geometry(&self) -> &ResampleGeometry {
        &self.geometry
    }

    /// Resample one slice and return it south-to-north
    pub fn resample_slice(
        &self,
        values: ArrayView2<Option<FloatValue>>,
    ) -> EmgridResult<Array2<FloatValue>> {
        let native = self
            .strategy
            .resample_slice(values, &self.geometry, &self.params)?;
        Ok(south_to_north(native, self.target.origin()))
    }

    /// Resample every hour of a flux onto the target grid
    pub fn resample(&self, flux: &HourlyFlux) -> EmgridResult<ResampledFlux> {
        let hours = flux.hours();
        let slices: Vec<Array2<FloatValue>> = (0..hours)
            .into_par_iter()
            .map(|hour| {
                self.resample_slice(flux.data.index_axis(Axis(0), hour))
                    .map_err(|e| e.at_hour(hour))
            })
            .collect::<EmgridResult<_>>()?;

        let views: Vec<ArrayView2<FloatValue>> = slices.iter().map(|s| s.view()).collect();
        let (rows, cols) = self.geometry.target_shape();
        let data = ndarray::stack(Axis(0), &views).map_err(|_| EmgridError::ShapeMismatch {
            context: format!("resampled {}", flux.species),
            expected: vec![hours, rows, cols],
            found: slices.first().map(|s| s.shape().to_vec()).unwrap_or_default(),
        })?;

        let resampled = ResampledFlux {
            species: flux.species,
            unit: flux.unit.clone(),
            data,
            metadata: FieldMetadata::emission(flux.species.model_variable(), &flux.unit),
        };
        debug!(
            "{} after resampling: {}",
            flux.species.model_variable(),
            resampled.summary()
        );
        Ok(resampled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emgrid_core::grid::{build_target_grid, ProjectionSpec};
    use emgrid_core::species::Species;
    use is_close::is_close;
    use ndarray::{Array3, Zip};

    /// 4x6 equirectangular domain of 10 km cells centred on (115E, 30N)
    fn target() -> Arc<TargetGridDefinition> {
        let spec = ProjectionSpec {
            map_proj: 6,
            center_lat: 30.0,
            center_lon: 115.0,
            true_lat1: 30.0,
            true_lat2: None,
            earth_radius: emgrid_core::grid::EARTH_RADIUS,
            rows: 4,
            cols: 6,
            dx: 10_000.0,
            dy: 10_000.0,
        };
        Arc::new(build_target_grid(&spec).unwrap())
    }

    /// A swath whose pixels sit exactly on the target cell centres
    fn coincident_swath(target: &TargetGridDefinition) -> Swath {
        let (lons, lats) = target.cell_centers_lonlat();
        Swath::new(lons, lats).unwrap()
    }

    fn params(method: ResampleMethod) -> ResampleParameters {
        ResampleParameters {
            method,
            ..ResampleParameters::default()
        }
    }

    #[test]
    fn nearest_on_coincident_swath_only_flips_rows() {
        let target = target();
        let swath = coincident_swath(&target);
        let resampler =
            SpatialResampler::new(&swath, target.clone(), params(ResampleMethod::Nearest))
                .unwrap();

        let values = Array2::from_shape_fn((4, 6), |(r, c)| Some((r * 10 + c) as f64));
        let out = resampler.resample_slice(values.view()).unwrap();

        // Native row 0 is north, output row 0 is south
        for r in 0..4 {
            for c in 0..6 {
                assert_eq!(out[[3 - r, c]], (r * 10 + c) as f64);
            }
        }
    }

    #[test]
    fn absent_sample_yields_fill_value() {
        let target = target();
        let swath = coincident_swath(&target);
        let mut parameters = params(ResampleMethod::Nearest);
        parameters.fill_value = -1.0;
        let resampler = SpatialResampler::new(&swath, target, parameters).unwrap();

        let mut values = Array2::from_elem((4, 6), Some(2.0));
        values[[0, 0]] = None;
        let out = resampler.resample_slice(values.view()).unwrap();
        assert_eq!(out[[3, 0]], -1.0);
        assert_eq!(out[[0, 0]], 2.0);
    }

    #[test]
    fn cells_beyond_radius_are_filled() {
        let target = target();
        // A single distant pixel far outside the domain
        let swath = Swath::new(
            Array2::from_elem((1, 1), 130.0),
            Array2::from_elem((1, 1), 45.0),
        )
        .unwrap();
        for method in [
            ResampleMethod::Nearest,
            ResampleMethod::InverseDistance,
            ResampleMethod::Bilinear,
        ] {
            let mut parameters = params(method);
            parameters.fill_value = 7.5;
            let resampler = SpatialResampler::new(&swath, target.clone(), parameters).unwrap();
            assert_eq!(resampler.geometry().covered_cells(), 0);
            let out = resampler
                .resample_slice(Array2::from_elem((1, 1), Some(1.0)).view())
                .unwrap();
            assert!(out.iter().all(|v| *v == 7.5), "{}", method);
        }
    }

    #[test]
    fn idw_reproduces_a_constant_field() {
        let target = target();
        let swath = coincident_swath(&target);
        let resampler =
            SpatialResampler::new(&swath, target, params(ResampleMethod::InverseDistance))
                .unwrap();
        let out = resampler
            .resample_slice(Array2::from_elem((4, 6), Some(3.0)).view())
            .unwrap();
        assert!(out.iter().all(|v| is_close!(*v, 3.0)));
    }

    #[test]
    fn bilinear_reproduces_a_linear_field() {
        let target = target();
        // Fine regular lon/lat swath covering the domain with margin
        let (nlat, nlon) = (30, 40);
        let lons = Array2::from_shape_fn((nlat, nlon), |(_, j)| 114.6 + 0.02 * j as f64);
        let lats = Array2::from_shape_fn((nlat, nlon), |(i, _)| 30.3 - 0.02 * i as f64);
        let field = |lon: f64, lat: f64| 2.0 * (lon - 115.0) + 3.0 * (lat - 30.0) + 10.0;
        let values = Zip::from(&lons)
            .and(&lats)
            .map_collect(|lon, lat| Some(field(*lon, *lat)));
        let swath = Swath::new(lons, lats).unwrap();

        let parameters = ResampleParameters {
            neighbours: 16,
            ..params(ResampleMethod::Bilinear)
        };
        let resampler = SpatialResampler::new(&swath, target.clone(), parameters).unwrap();
        let out = resampler.resample_slice(values.view()).unwrap();

        let (center_lons, center_lats) = target.cell_centers_lonlat();
        for r in 0..4 {
            for c in 0..6 {
                let expected = field(center_lons[[r, c]], center_lats[[r, c]]);
                let got = out[[3 - r, c]];
                assert!(
                    (got - expected).abs() < 1e-6,
                    "cell ({}, {}): {} vs {}",
                    r,
                    c,
                    got,
                    expected
                );
            }
        }
    }

    #[test]
    fn bilinear_covers_the_edges_of_a_coincident_swath() {
        let target = target();
        let swath = coincident_swath(&target);
        let mut parameters = params(ResampleMethod::Bilinear);
        parameters.fill_value = -1.0;
        let resampler = SpatialResampler::new(&swath, target, parameters).unwrap();
        let out = resampler
            .resample_slice(Array2::from_elem((4, 6), Some(5.0)).view())
            .unwrap();
        assert!(out.iter().all(|v| is_close!(*v, 5.0)), "{:?}", out);
    }

    #[test]
    fn bilinear_on_a_pixel_row_uses_edge_pixels() {
        let target = target();
        // Two pixels a quarter cell either side of each centre, on the same row,
        // so the top and bottom cells sit on the edge of the swath
        let (lons, lats) = target.cell_centers_lonlat();
        let spacing = lons[[0, 1]] - lons[[0, 0]];
        let fine_lons = Array2::from_shape_fn((4, 12), |(r, c)| {
            let offset = if c % 2 == 0 { -0.25 } else { 0.25 };
            lons[[r, c / 2]] + offset * spacing
        });
        let fine_lats = Array2::from_shape_fn((4, 12), |(r, c)| lats[[r, c / 2]]);
        let swath = Swath::new(fine_lons, fine_lats).unwrap();
        let mut parameters = params(ResampleMethod::Bilinear);
        parameters.fill_value = -1.0;
        let resampler = SpatialResampler::new(&swath, target, parameters).unwrap();
        let out = resampler
            .resample_slice(Array2::from_elem((4, 12), Some(5.0)).view())
            .unwrap();
        assert!(out.iter().all(|v| is_close!(*v, 5.0)), "{:?}", out);
    }

    #[test]
    fn bilinear_with_absent_corner_fills() {
        let target = target();
        let swath = coincident_swath(&target);
        // With a coincident swath each cell takes the pixel at its centre
        let mut values = Array2::from_elem((4, 6), Some(1.0));
        values[[1, 1]] = None;
        let resampler =
            SpatialResampler::new(&swath, target, params(ResampleMethod::Bilinear)).unwrap();
        let out = resampler.resample_slice(values.view()).unwrap();
        assert_eq!(out[[2, 1]], 0.0);
    }

    #[test]
    fn resample_keeps_hour_order() {
        let target = target();
        let swath = coincident_swath(&target);
        let resampler =
            SpatialResampler::new(&swath, target, params(ResampleMethod::Nearest)).unwrap();

        let data = Array3::from_shape_fn((24, 4, 6), |(h, _, _)| Some(h as f64));
        let flux = HourlyFlux {
            species: Species::NOx,
            unit: Species::NOx.unit().to_string(),
            data,
        };
        let out = resampler.resample(&flux).unwrap();
        assert_eq!(out.data.shape(), &[24, 4, 6]);
        for h in 0..24 {
            assert!(out
                .data
                .index_axis(Axis(0), h)
                .iter()
                .all(|v| *v == h as f64));
        }
        assert_eq!(out.metadata.unit(), Some("mol km-2 hr-1"));
    }

    #[test]
    fn mismatched_slice_reports_hour() {
        let target = target();
        let swath = coincident_swath(&target);
        let resampler =
            SpatialResampler::new(&swath, target, params(ResampleMethod::Nearest)).unwrap();
        let flux = HourlyFlux {
            species: Species::SO2,
            unit: Species::SO2.unit().to_string(),
            data: Array3::from_elem((24, 2, 2), Some(1.0)),
        };
        let err = resampler.resample(&flux).unwrap_err();
        assert!(matches!(err, EmgridError::Hour { .. }));
        assert!(matches!(
            err.root_cause(),
            EmgridError::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn method_name_is_validated() {
        let target = target();
        let swath = coincident_swath(&target);
        let err = SpatialResampler::with_method_name(
            &swath,
            target,
            "cubic",
            ResampleParameters::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EmgridError::UnsupportedMethod(_)));
    }

    #[test]
    fn lower_left_origin_is_left_unchanged() {
        let slice = Array2::from_shape_fn((2, 2), |(r, c)| (r * 2 + c) as f64);
        assert_eq!(
            south_to_north(slice.clone(), OriginCorner::LowerLeft),
            slice
        );
        assert_eq!(
            south_to_north(slice, OriginCorner::UpperLeft),
            ndarray::array![[2.0, 3.0], [0.0, 1.0]]
        );
    }
}
