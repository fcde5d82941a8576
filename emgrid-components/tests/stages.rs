//! Stage-to-stage tests of the processing chain
//!
//! These run the flux, resample and window stages back to back on a small
//! regular inventory and check that physical quantities and orientation survive.

use approx::assert_relative_eq;
use emgrid_components::flux::{FluxAssembler, SectorSeries, SpeciesInventory};
use emgrid_components::resample::SpatialResampler;
use emgrid_components::window::{split_windows, WindowLabel};
use emgrid_core::config::{ResampleMethod, ResampleParameters, SimulationDate};
use emgrid_core::diurnal::DiurnalTable;
use emgrid_core::grid::{
    build_target_grid, compute_cell_area, ProjectionSpec, SourceGrid, EARTH_RADIUS,
};
use emgrid_core::species::{Sector, Species};
use ndarray::{Array2, Array3, Axis};
use std::sync::Arc;

const MISSING: f64 = -999.0;

/// 0.05 degree inventory covering 114E-116E, 29N-31N
fn source_grid() -> SourceGrid {
    SourceGrid::from_edges(114.0, 116.0, 31.0, 29.0, 40, 40).unwrap()
}

/// 6x8 Lambert conformal domain of 12 km cells centred on (115E, 30N)
fn domain() -> ProjectionSpec {
    ProjectionSpec {
        map_proj: 1,
        center_lat: 30.0,
        center_lon: 115.0,
        true_lat1: 25.0,
        true_lat2: Some(35.0),
        earth_radius: EARTH_RADIUS,
        rows: 6,
        cols: 8,
        dx: 12_000.0,
        dy: 12_000.0,
    }
}

/// A NOx inventory with only industrial emissions, following `industry(row, col)`
fn inventory(grid: &SourceGrid, industry: impl Fn(usize, usize) -> f64) -> SpeciesInventory {
    let (rows, cols) = grid.shape();
    let series = Sector::ALL
        .into_iter()
        .map(|sector| {
            let data = Array3::from_shape_fn((1, rows, cols), |(_, r, c)| {
                if sector == Sector::Industry {
                    industry(r, c)
                } else {
                    0.0
                }
            });
            SectorSeries::new(Species::NOx, sector, vec![7], data, MISSING).unwrap()
        })
        .collect();
    SpeciesInventory::new(Species::NOx, series).unwrap()
}

fn date() -> SimulationDate {
    SimulationDate {
        year: 2019,
        month: 7,
        day: 25,
    }
}

#[test]
fn uniform_flux_density_survives_resampling() {
    let grid = source_grid();
    let area = compute_cell_area(&grid).unwrap();

    // Totals proportional to cell area give a spatially uniform flux density
    let area_values = area.values().clone();
    let inventory = inventory(&grid, |r, c| area_values[[r, c]] * 1e-6);

    let assembler =
        FluxAssembler::new(Arc::new(area), Arc::new(DiurnalTable::identity()), date()).unwrap();
    let flux = assembler.assemble(&inventory).unwrap();

    // 1 t km-2 per month of NOx: 1e9 g / (744 h * 14 g/mol)
    let expected = 1e9 / (744.0 * 14.0);
    for value in flux.data.iter() {
        assert_relative_eq!(value.unwrap(), expected, max_relative = 1e-9);
    }

    let target = Arc::new(build_target_grid(&domain()).unwrap());
    for method in [
        ResampleMethod::Nearest,
        ResampleMethod::InverseDistance,
        ResampleMethod::Bilinear,
    ] {
        let params = ResampleParameters {
            method,
            ..ResampleParameters::default()
        };
        let resampler = SpatialResampler::new(&grid.swath(), target.clone(), params).unwrap();
        let resampled = resampler.resample(&flux).unwrap();
        assert_eq!(resampled.data.shape(), &[24, 6, 8]);
        for value in resampled.data.iter() {
            assert_relative_eq!(*value, expected, max_relative = 1e-9);
        }
    }
}

#[test]
fn northern_emissions_end_up_in_the_last_rows() {
    let grid = source_grid();
    let area = compute_cell_area(&grid).unwrap();
    // Inventory rows run north to south: only the northern half emits
    let inventory = inventory(&grid, |r, _| if r < 20 { 100.0 } else { 0.0 });

    let assembler =
        FluxAssembler::new(Arc::new(area), Arc::new(DiurnalTable::identity()), date()).unwrap();
    let flux = assembler.assemble(&inventory).unwrap();

    let target = Arc::new(build_target_grid(&domain()).unwrap());
    let params = ResampleParameters {
        method: ResampleMethod::Nearest,
        ..ResampleParameters::default()
    };
    let resampler = SpatialResampler::new(&grid.swath(), target, params).unwrap();
    let resampled = resampler.resample(&flux).unwrap();

    let hour0 = resampled.data.index_axis(Axis(0), 0);
    // south_north: row 0 is the southern edge
    assert!(hour0.row(0).iter().all(|v| *v == 0.0));
    assert!(hour0.row(5).iter().all(|v| *v > 0.0));
}

#[test]
fn missing_cells_resolve_to_fill_value_only_after_resampling() {
    let grid = source_grid();
    let area = compute_cell_area(&grid).unwrap();
    let inventory = inventory(&grid, |_, _| MISSING);

    let assembler =
        FluxAssembler::new(Arc::new(area), Arc::new(DiurnalTable::identity()), date()).unwrap();
    let flux = assembler.assemble(&inventory).unwrap();
    assert!(flux.data.iter().all(|v| v.is_none()));

    let target = Arc::new(build_target_grid(&domain()).unwrap());
    let params = ResampleParameters {
        method: ResampleMethod::InverseDistance,
        fill_value: -1.0,
        ..ResampleParameters::default()
    };
    let resampler = SpatialResampler::new(&grid.swath(), target, params).unwrap();
    let resampled = resampler.resample(&flux).unwrap();
    assert!(resampled.data.iter().all(|v| *v == -1.0));
}

#[test]
fn windows_follow_the_diurnal_profile() {
    let grid = source_grid();
    let area = compute_cell_area(&grid).unwrap();
    let inventory = inventory(&grid, |_, _| 50.0);

    // Industry emits twice as much during the second half of the day
    let mut raw = Array2::ones((Sector::ALL.len(), 24));
    for hour in 12..24 {
        raw[[Sector::Industry.index(), hour]] = 2.0;
    }
    let table = DiurnalTable::from_factors(raw).unwrap();
    assert_relative_eq!(table.factor(Sector::Industry, 0), 2.0 / 3.0);

    let assembler = FluxAssembler::new(Arc::new(area), Arc::new(table), date()).unwrap();
    let flux = assembler.assemble(&inventory).unwrap();

    let target = Arc::new(build_target_grid(&domain()).unwrap());
    let resampler =
        SpatialResampler::new(&grid.swath(), target, ResampleParameters::default()).unwrap();
    let resampled = resampler.resample(&flux).unwrap();

    let (a, b) = split_windows(&resampled, &date().timestamps().unwrap()).unwrap();
    assert_eq!(a.label, WindowLabel::Hour00);
    assert_eq!(b.label, WindowLabel::Hour12);
    let ratio = b.data[[0, 3, 4]] / a.data[[11, 3, 4]];
    assert_relative_eq!(ratio, 2.0, max_relative = 1e-9);
    assert_eq!(a.model_data().shape(), &[12, 1, 6, 8]);
}
