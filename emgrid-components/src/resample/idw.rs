use super::{ResampleGeometry, Resampler};
use emgrid_core::config::{ResampleMethod, ResampleParameters};
use emgrid_core::errors::EmgridResult;
use emgrid_core::field::FloatValue;
use ndarray::{Array2, ArrayView2};

/// Inverse-distance weighted mean of the nearest present source pixels
///
/// Weights are `1 / r^2`. Absent pixels are skipped. A pixel coinciding with the
/// target cell centre is returned directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseDistance;

impl InverseDistance {
    fn weighted<I>(samples: I) -> Option<FloatValue>
    where
        I: IntoIterator<Item = (FloatValue, FloatValue)>,
    {
        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        for (distance, value) in samples {
            if distance == 0.0 {
                return Some(value);
            }
            let weight = 1.0 / (distance * distance);
            weight_sum += weight;
            value_sum += weight * value;
        }
        if weight_sum > 0.0 {
            Some(value_sum / weight_sum)
        } else {
            None
        }
    }
}

impl Resampler for InverseDistance {
    fn method(&self) -> ResampleMethod {
        ResampleMethod::InverseDistance
    }

    fn neighbours_required(&self, params: &ResampleParameters) -> usize {
        params.neighbours
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
            let samples = geometry
                .neighbours(cell)
                .iter()
                .filter_map(|n| source[n.index].map(|v| (n.distance, v)));
            Self::weighted(samples).unwrap_or(params.fill_value)
        }))
    }
}
