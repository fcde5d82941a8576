use super::{Neighbour, ResampleGeometry, Resampler};
use emgrid_core::config::{ResampleMethod, ResampleParameters};
use emgrid_core::errors::EmgridResult;
use emgrid_core::field::FloatValue;
use ndarray::{Array2, ArrayView2};

/// Smallest tolerance used by the bilinear solve, applied when `epsilon` is zero
const MIN_TOLERANCE: FloatValue = 1e-9;

type Point = [FloatValue; 2];

fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1]]
}

fn cross(a: Point, b: Point) -> FloatValue {
    a[0] * b[1] - a[1] * b[0]
}

/// Corners of the source quadrilateral surrounding a target point
///
/// `lower_left`, `lower_right`, `upper_right` and `upper_left` map to the
/// fractional coordinates (0, 0), (1, 0), (1, 1) and (0, 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [Point; 4],
}

impl Quad {
    /// Fractional position `(u, v)` of `p` inside the quadrilateral
    ///
    /// Solves `p = a + u (b - a) + v (d - a) + u v (a - b + c - d)`. Returns `None`
    /// when the quadrilateral is degenerate or `p` lies outside it by more than `tolerance`.
    pub fn locate(&self, p: Point, tolerance: FloatValue) -> Option<(FloatValue, FloatValue)> {
        let [a, b, c, d] = self.corners;

        // Work in units of the quad size so the tolerance is scale free
        let scale = [sub(b, a), sub(d, a), sub(c, a)]
            .iter()
            .map(|v| v[0].hypot(v[1]))
            .fold(0.0, FloatValue::max);
        if !(scale > 0.0) {
            return None;
        }
        let norm = |q: Point| {
            let r = sub(q, a);
            [r[0] / scale, r[1] / scale]
        };
        let (b, c, d, h) = (norm(b), norm(c), norm(d), norm(p));

        let e = b;
        let f = d;
        let g = [c[0] - b[0] - d[0], c[1] - b[1] - d[1]];

        let k2 = cross(g, f);
        let k1 = cross(e, f) + cross(h, g);
        let k0 = cross(h, e);

        let inside = |x: FloatValue| x >= -tolerance && x <= 1.0 + tolerance;
        let solve_u = |v: FloatValue| -> Option<FloatValue> {
            let dx = e[0] + g[0] * v;
            let dy = e[1] + g[1] * v;
            if dx.abs() >= dy.abs() {
                (dx.abs() > tolerance).then(|| (h[0] - f[0] * v) / dx)
            } else {
                (dy.abs() > tolerance).then(|| (h[1] - f[1] * v) / dy)
            }
        };

        let candidates: Vec<FloatValue> = if k2.abs() <= tolerance {
            // Opposite edges parallel: the problem is linear in v
            if k1.abs() <= tolerance {
                return None;
            }
            vec![-k0 / k1]
        } else {
            let discriminant = k1 * k1 - 4.0 * k0 * k2;
            if discriminant < 0.0 {
                return None;
            }
            let w = discriminant.sqrt();
            vec![(-k1 - w) / (2.0 * k2), (-k1 + w) / (2.0 * k2)]
        };

        candidates.into_iter().find_map(|v| {
            let u = solve_u(v)?;
            (inside(u) && inside(v)).then(|| (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)))
        })
    }
}

/// Quadrants around a target point as (right of it, above it), in corner order
const QUADRANTS: [(bool, bool); 4] = [(false, false), (true, false), (true, true), (false, true)];

/// Source pixels a target cell is interpolated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Support {
    /// A pixel at the target point itself
    Coincident(usize),
    /// Lower-left, lower-right, upper-right and upper-left corners
    Corners([usize; 4]),
}

/// Bilinear interpolation within the quadrilateral of nearest source pixels
///
/// Candidates are the nearest neighbours within the radius of influence, projected
/// onto the target plane. The closest candidate in each quadrant around the target
/// cell centre forms a corner. Pixels lying on a quadrant boundary, within the
/// tolerance, may stand in for either adjacent quadrant, so cells on the edge of
/// the swath still find a quad. The target cell receives the fill value when a
/// quadrant is empty, a corner is absent or the cell centre cannot be located
/// inside the quadrilateral.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bilinear;

impl Bilinear {
    fn support(
        target: Point,
        neighbours: &[Neighbour],
        geometry: &ResampleGeometry,
        tolerance: FloatValue,
    ) -> Option<Support> {
        let offsets: Vec<(usize, Point)> = neighbours
            .iter()
            .map(|n| (n.index, sub(geometry.source_xy(n.index), target)))
            .collect();
        // Same relative tolerance as the solve, in units of the candidate spread
        let scale = offsets
            .iter()
            .map(|(_, d)| d[0].hypot(d[1]))
            .fold(0.0, FloatValue::max);
        let margin = tolerance * scale;
        let side = |x: FloatValue| {
            if x > margin {
                Some(true)
            } else if x < -margin {
                Some(false)
            } else {
                None
            }
        };

        let mut corners: [Option<usize>; 4] = [None; 4];
        let mut on_edge = Vec::new();
        // Neighbours are sorted closest first, so the first hit per quadrant wins
        for (index, [dx, dy]) in offsets {
            match (side(dx), side(dy)) {
                (None, None) => return Some(Support::Coincident(index)),
                (Some(right), Some(up)) => {
                    let quadrant = QUADRANTS.iter().position(|q| *q == (right, up))?;
                    corners[quadrant].get_or_insert(index);
                }
                (right, up) => on_edge.push((index, right, up)),
            }
        }

        // Each edge pixel fills at most one quadrant left empty
        for (index, right, up) in on_edge {
            let free = corners
                .iter_mut()
                .zip(QUADRANTS)
                .find(|(slot, (r, u))| {
                    slot.is_none()
                        && right.map_or(true, |x| x == *r)
                        && up.map_or(true, |y| y == *u)
                });
            if let Some((slot, _)) = free {
                *slot = Some(index);
            }
        }
        Some(Support::Corners([
            corners[0]?,
            corners[1]?,
            corners[2]?,
            corners[3]?,
        ]))
    }

    fn interpolate(
        source: &[Option<FloatValue>],
        cell: usize,
        geometry: &ResampleGeometry,
        tolerance: FloatValue,
    ) -> Option<FloatValue> {
        let target = geometry.target_xy(cell);
        let indices = match Self::support(target, geometry.neighbours(cell), geometry, tolerance)? {
            Support::Coincident(index) => return source[index],
            Support::Corners(indices) => indices,
        };
        let [va, vb, vc, vd] = [
            source[indices[0]]?,
            source[indices[1]]?,
            source[indices[2]]?,
            source[indices[3]]?,
        ];
        let quad = Quad {
            corners: indices.map(|i| geometry.source_xy(i)),
        };
        let (u, v) = quad.locate(target, tolerance)?;
        Some(
            va * (1.0 - u) * (1.0 - v)
                + vb * u * (1.0 - v)
                + vc * u * v
                + vd * (1.0 - u) * v,
        )
    }
}

impl Resampler for Bilinear {
    fn method(&self) -> ResampleMethod {
        ResampleMethod::Bilinear
    }

    fn neighbours_required(&self, params: &ResampleParameters) -> usize {
        params.neighbours.max(4)
    }

    fn resample_slice(
        &self,
        values: ArrayView2<Option<FloatValue>>,
        geometry: &ResampleGeometry,
        params: &ResampleParameters,
    ) -> EmgridResult<Array2<FloatValue>> {
        let source = super::flat_source(values, geometry)?;
        let tolerance = params.epsilon.max(MIN_TOLERANCE);
        Ok(Array2::from_shape_fn(geometry.target_shape(), |(row, col)| {
            let cell = row * geometry.target_shape().1 + col;
            Self::interpolate(&source, cell, geometry, tolerance).unwrap_or(params.fill_value)
        }))
    }
}
