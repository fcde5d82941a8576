//! Neighbour lookup between a source swath and the target grid
//!
//! Geometry does not change between hours or species, so the neighbours of every
//! target cell are found once and reused for every slice.

use emgrid_core::errors::{EmgridError, EmgridResult};
use emgrid_core::field::FloatValue;
use emgrid_core::grid::{lonlat_to_cartesian, Swath, TargetGridDefinition};
use rstar::primitives::GeomWithData;
use rstar::RTree;

type IndexedPoint = GeomWithData<[FloatValue; 3], usize>;

/// A source sample close to a target cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    /// Flat (row-major) index of the source pixel
    pub index: usize,
    /// Chord distance between source and target on the sphere (m)
    pub distance: FloatValue,
}

/// Spatial index over the pixels of a swath
pub struct SwathIndex {
    tree: RTree<IndexedPoint>,
    shape: (usize, usize),
}

impl SwathIndex {
    pub fn build(swath: &Swath) -> Self {
        let points: Vec<IndexedPoint> = swath
            .lons()
            .iter()
            .zip(swath.lats().iter())
            .enumerate()
            .map(|(index, (lon, lat))| GeomWithData::new(lonlat_to_cartesian(*lon, *lat), index))
            .collect();
        Self {
            tree: RTree::bulk_load(points),
            shape: swath.shape(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Up to `k` nearest pixels within `radius` (m) of a lon/lat point, closest first
    pub fn query(
        &self,
        lon: FloatValue,
        lat: FloatValue,
        k: usize,
        radius: FloatValue,
    ) -> Vec<Neighbour> {
        let point = lonlat_to_cartesian(lon, lat);
        let max_distance_2 = radius * radius;
        self.tree
            .nearest_neighbor_iter_with_distance_2(&point)
            .take_while(|(_, d2)| *d2 <= max_distance_2)
            .take(k)
            .map(|(entry, d2)| Neighbour {
                index: entry.data,
                distance: d2.sqrt(),
            })
            .collect()
    }
}

/// Precomputed relation between a swath and a target grid
#[derive(Debug, Clone)]
pub struct ResampleGeometry {
    source_shape: (usize, usize),
    target_shape: (usize, usize),
    /// Neighbours of every target cell in row-major order of the target grid
    neighbours: Vec<Vec<Neighbour>>,
    /// Source pixels in target projected coordinates (m)
    source_xy: Vec<[FloatValue; 2]>,
    /// Target cell centres in projected coordinates (m)
    target_xy: Vec<[FloatValue; 2]>,
}

impl ResampleGeometry {
    /// Find up to `k` neighbours within `radius` for every target cell
    pub fn build(
        swath: &Swath,
        target: &TargetGridDefinition,
        k: usize,
        radius: FloatValue,
    ) -> EmgridResult<Self> {
        if k == 0 {
            return Err(EmgridError::Config(
                "at least one neighbour is required".to_string(),
            ));
        }
        let index = SwathIndex::build(swath);
        let (rows, cols) = target.shape();
        let (lons, lats) = target.cell_centers_lonlat();

        let neighbours = lons
            .iter()
            .zip(lats.iter())
            .map(|(lon, lat)| index.query(*lon, *lat, k, radius))
            .collect();

        let projection = target.projection();
        let source_xy = swath
            .lons()
            .iter()
            .zip(swath.lats().iter())
            .map(|(lon, lat)| {
                let (x, y) = projection.forward(*lon, *lat);
                [x, y]
            })
            .collect();

        let target_xy = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| (row, col)))
            .map(|(row, col)| {
                let (x, y) = target.cell_center_xy(row, col);
                [x, y]
            })
            .collect();

        Ok(Self {
            source_shape: index.shape(),
            target_shape: (rows, cols),
            neighbours,
            source_xy,
            target_xy,
        })
    }

    pub fn source_shape(&self) -> (usize, usize) {
        self.source_shape
    }

    pub fn target_shape(&self) -> (usize, usize) {
        self.target_shape
    }

    /// Neighbours of target cell `cell` (row-major), closest first
    pub fn neighbours(&self, cell: usize) -> &[Neighbour] {
        &self.neighbours[cell]
    }

    pub fn source_xy(&self, index: usize) -> [FloatValue; 2] {
        self.source_xy[index]
    }

    pub fn target_xy(&self, cell: usize) -> [FloatValue; 2] {
        self.target_xy[cell]
    }

    /// Number of target cells with at least one neighbour
    pub fn covered_cells(&self) -> usize {
        self.neighbours.iter().filter(|n| !n.is_empty()).count()
    }
}
