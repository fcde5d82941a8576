//! Target grid definition derived from domain projection metadata

use crate::errors::{EmgridError, EmgridResult};
use crate::field::FloatValue;
use ndarray::Array2;

use super::projection::{Projection, ProjectionSpec};

/// Corner of the projected domain that holds cell `(0, 0)`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OriginCorner {
    /// Row 0 is the northernmost row
    UpperLeft,
    /// Row 0 is the southernmost row
    LowerLeft,
}

/// Rectangular domain in projected coordinates (m)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Extent {
    pub x_min: FloatValue,
    pub y_min: FloatValue,
    pub x_max: FloatValue,
    pub y_max: FloatValue,
}

impl Extent {
    pub fn width(&self) -> FloatValue {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> FloatValue {
        self.y_max - self.y_min
    }
}

/// Regular grid in projected space used as the resampling target
///
/// The domain is centred on the projection origin with half-widths of
/// `cols * dx / 2` and `rows * dy / 2`. Cells are addressed from the upper-left
/// corner, so row 0 lies along the northern edge.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetGridDefinition {
    area_id: String,
    projection: Projection,
    rows: usize,
    cols: usize,
    extent: Extent,
}

impl TargetGridDefinition {
    pub const AREA_ID: &'static str = "wrf_circle";

    /// Build the target grid for a domain
    pub fn build(spec: &ProjectionSpec) -> EmgridResult<Self> {
        let projection = Projection::from_spec(spec)?;

        if spec.rows == 0 || spec.cols == 0 {
            return Err(EmgridError::Config(format!(
                "target grid shape must be non-empty, got {} x {}",
                spec.rows, spec.cols
            )));
        }
        if !(spec.dx > 0.0 && spec.dy > 0.0) {
            return Err(EmgridError::Config(format!(
                "target cell size must be positive, got dx={} dy={}",
                spec.dx, spec.dy
            )));
        }

        let (radius_x, radius_y) = (
            spec.cols as FloatValue * spec.dx / 2.0,
            spec.rows as FloatValue * spec.dy / 2.0,
        );

        Ok(Self {
            area_id: Self::AREA_ID.to_string(),
            projection,
            rows: spec.rows,
            cols: spec.cols,
            extent: Extent {
                x_min: -radius_x,
                y_min: -radius_y,
                x_max: radius_x,
                y_max: radius_y,
            },
        })
    }

    pub fn area_id(&self) -> &str {
        &self.area_id
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn origin(&self) -> OriginCorner {
        OriginCorner::UpperLeft
    }

    pub fn pixel_size_x(&self) -> FloatValue {
        self.extent.width() / self.cols as FloatValue
    }

    pub fn pixel_size_y(&self) -> FloatValue {
        self.extent.height() / self.rows as FloatValue
    }

    /// Projected coordinates of the centre of cell `(row, col)`
    pub fn cell_center_xy(&self, row: usize, col: usize) -> (FloatValue, FloatValue) {
        (
            self.extent.x_min + (col as FloatValue + 0.5) * self.pixel_size_x(),
            self.extent.y_max - (row as FloatValue + 0.5) * self.pixel_size_y(),
        )
    }

    /// Longitudes and latitudes (degrees) of every cell centre
    pub fn cell_centers_lonlat(&self) -> (Array2<FloatValue>, Array2<FloatValue>) {
        let mut lons = Array2::zeros((self.rows, self.cols));
        let mut lats = Array2::zeros((self.rows, self.cols));
        for row in 0..self.rows {
            for col in 0..self.cols {
                let (x, y) = self.cell_center_xy(row, col);
                let (lon, lat) = self.projection.inverse(x, y);
                lons[[row, col]] = lon;
                lats[[row, col]] = lat;
            }
        }
        (lons, lats)
    }
}

/// Build the target grid definition for a domain
///
/// Fails with [`EmgridError::UnsupportedProjection`] for unknown projection codes.
pub fn build_target_grid(spec: &ProjectionSpec) -> EmgridResult<TargetGridDefinition> {
    TargetGridDefinition::build(spec)
}
