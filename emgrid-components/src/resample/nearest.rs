use super::{ResampleGeometry, Resampler};
use emgrid_core::config::{ResampleMethod, ResampleParameters};
use emgrid_core::errors::EmgridResult;
use emgrid_core::field::FloatValue;
use ndarray::{Array2, ArrayView2};

/// Value of the closest source pixel within the radius of influence
///
/// If that pixel is absent the target cell receives the fill value; farther
/// pixels are not consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighbour;

impl Resampler for NearestNeighbour {
    fn method(&self) -> ResampleMethod {
        ResampleMethod::Nearest
    }

    fn neighbours_required(&self, _params: &ResampleParameters) -> usize {
        1
    }

    fn resample_slice(
        &self,
        values: ArrayView2<Option<FloatValue>>,
        geometry: &ResampleGeometry,
        params: &ResampleParameters,
    ) -> EmgridResult<Array2<FloatValue>> {
        let source = super::flat_source(values, geometry)?;
        Ok(Array2::from_shape_fn(geometry.target_shape(), |(row, col)| {
            let cell = row * geometry.target_shape().1 + col;
            geometry
                .neighbours(cell)
                .first()
                .and_then(|n| source[n.index])
                .unwrap_or(params.fill_value)
        }))
    }
}
