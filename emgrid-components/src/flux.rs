//! Flux assembly on the source grid
//!
//! Turns the monthly sector totals of one species into an hourly flux:
//!
//! 1. cells equal to the inventory's missing-value sentinel become absent,
//! 2. the simulated month is selected,
//! 3. totals are converted to the chemistry model's flux unit,
//! 4. sectors are summed hour by hour using the diurnal profile.
//!
//! Absent cells propagate through every step; they are only resolved to a fill value
//! when the flux is resampled.

use emgrid_core::calendar::{hours_in_month, seconds_in_month, HOURS_PER_DAY};
use emgrid_core::config::SimulationDate;
use emgrid_core::diurnal::DiurnalTable;
use emgrid_core::errors::{EmgridError, EmgridResult};
use emgrid_core::field::{mask_sentinel, FloatValue, HourlyFlux, MaskedField};
use emgrid_core::grid::CellArea;
use emgrid_core::species::{ConversionFamily, Sector, Species};
use log::{debug, info};
use ndarray::{Array3, ArrayView2, Axis};
use std::collections::BTreeMap;
use std::sync::Arc;

pub use emgrid_core::field::mask_sentinel as mask_missing;

/// Monthly totals of one species from one sector, as read from the inventory
///
/// `data` has shape `(time, rows, cols)`; `months` holds the calendar month (1-12)
/// of every time step.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorSeries {
    pub species: Species,
    pub sector: Sector,
    pub months: Vec<u32>,
    pub data: Array3<FloatValue>,
    /// Sentinel marking cells without data
    pub missing_value: FloatValue,
}

impl SectorSeries {
    pub fn new(
        species: Species,
        sector: Sector,
        months: Vec<u32>,
        data: Array3<FloatValue>,
        missing_value: FloatValue,
    ) -> EmgridResult<Self> {
        if months.len() != data.len_of(Axis(0)) {
            return Err(EmgridError::ShapeMismatch {
                context: format!("time axis of {}", species.inventory_variable(sector)),
                expected: vec![months.len()],
                found: vec![data.len_of(Axis(0))],
            });
        }
        Ok(Self {
            species,
            sector,
            months,
            data,
            missing_value,
        })
    }

    /// Inventory variable name, e.g. `NOx_Industry`
    pub fn variable_name(&self) -> String {
        self.species.inventory_variable(self.sector)
    }

    /// `(rows, cols)` of every time step
    pub fn grid_shape(&self) -> (usize, usize) {
        let shape = self.data.shape();
        (shape[1], shape[2])
    }

    /// The single time step belonging to `month`
    pub fn select_month(&self, month: u32) -> EmgridResult<ArrayView2<'_, FloatValue>> {
        let indices: Vec<usize> = self
            .months
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == month)
            .map(|(i, _)| i)
            .collect();
        match indices.as_slice() {
            [index] => Ok(self.data.index_axis(Axis(0), *index)),
            _ => Err(EmgridError::MonthNotFound {
                variable: self.variable_name(),
                month,
                found: indices.len(),
            }),
        }
    }
}

/// All sectors of one species
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesInventory {
    species: Species,
    sectors: BTreeMap<Sector, SectorSeries>,
}

impl SpeciesInventory {
    /// Group sector series of a single species
    ///
    /// Every sector must be present exactly once and all sectors must share a grid shape.
    pub fn new(species: Species, series: Vec<SectorSeries>) -> EmgridResult<Self> {
        let mut sectors: BTreeMap<Sector, SectorSeries> = BTreeMap::new();
        for s in series {
            if s.species != species {
                return Err(EmgridError::Config(format!(
                    "{} does not belong to species {}",
                    s.variable_name(),
                    species
                )));
            }
            if sectors.contains_key(&s.sector) {
                return Err(EmgridError::Config(format!(
                    "{} was supplied more than once",
                    s.variable_name()
                )));
            }
            if let Some(first) = sectors.values().next() {
                if first.grid_shape() != s.grid_shape() {
                    let (r, c) = first.grid_shape();
                    let (fr, fc) = s.grid_shape();
                    return Err(EmgridError::ShapeMismatch {
                        context: s.variable_name(),
                        expected: vec![r, c],
                        found: vec![fr, fc],
                    });
                }
            }
            sectors.insert(s.sector, s);
        }
        for sector in Sector::ALL {
            if !sectors.contains_key(&sector) {
                return Err(EmgridError::MissingVariable(
                    species.inventory_variable(sector),
                ));
            }
        }
        Ok(Self { species, sectors })
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn sector(&self, sector: Sector) -> Option<&SectorSeries> {
        self.sectors.get(&sector)
    }

    /// Missing-value sentinel shared by all sectors, read from the reference sector
    pub fn missing_value(&self) -> EmgridResult<FloatValue> {
        self.sector(Sector::REFERENCE)
            .map(|s| s.missing_value)
            .ok_or_else(|| {
                EmgridError::MissingVariable(self.species.inventory_variable(Sector::REFERENCE))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectorSeries> {
        self.sectors.values()
    }
}

/// Convert a monthly total field into the species' flux unit
///
/// - NOx, SO2: `x * 1e9 / (area / 1e6) / (hours_in_month * weight)` in mol km-2 hr-1
/// - PM2.5: `x * 1e15 / area / (seconds_in_month * weight)` in ug/m3 m/s
///
/// Absent cells, and cells of zero area, stay absent.
pub fn convert_units(
    field: &MaskedField,
    species: Species,
    cell_area: &CellArea,
    days_in_month: u32,
) -> EmgridResult<MaskedField> {
    if field.dim() != cell_area.shape() {
        let (r, c) = cell_area.shape();
        return Err(EmgridError::ShapeMismatch {
            context: format!("{} field against cell area", species),
            expected: vec![r, c],
            found: field.shape().to_vec(),
        });
    }

    let weight = species.molecular_weight();
    let convert = |value: FloatValue, area: FloatValue| -> FloatValue {
        match species.conversion() {
            ConversionFamily::MolarPerArea => {
                value * 1e9 / (area / 1e6) / (hours_in_month(days_in_month) * weight)
            }
            ConversionFamily::MassFlux => {
                value * 1e15 / area / (seconds_in_month(days_in_month) * weight)
            }
        }
    };

    let mut converted = field.clone();
    converted
        .iter_mut()
        .zip(cell_area.values().iter())
        .for_each(|(cell, area)| {
            *cell = match *cell {
                Some(v) if *area > 0.0 => Some(convert(v, *area)),
                _ => None,
            }
        });
    Ok(converted)
}

/// Spread monthly sector fields over 24 hours and sum the sectors
///
/// `output[h] = sum over sectors of monthly[sector] * table[sector][h]`.
/// A cell absent in any sector is absent in every hour.
pub fn disaggregate(
    monthly_by_sector: &BTreeMap<Sector, MaskedField>,
    table: &DiurnalTable,
    species: Species,
) -> EmgridResult<HourlyFlux> {
    let mut iter = monthly_by_sector.iter();
    let (_, first) = iter.next().ok_or_else(|| {
        EmgridError::MissingVariable(species.inventory_variable(Sector::REFERENCE))
    })?;
    let shape = first.dim();
    for (sector, field) in iter {
        if field.dim() != shape {
            return Err(EmgridError::ShapeMismatch {
                context: species.inventory_variable(*sector),
                expected: vec![shape.0, shape.1],
                found: field.shape().to_vec(),
            });
        }
    }

    let mut data = Array3::from_elem((HOURS_PER_DAY, shape.0, shape.1), Some(0.0));
    for (hour, mut slice) in data.axis_iter_mut(Axis(0)).enumerate() {
        for (sector, field) in monthly_by_sector {
            let factor = table.factor(*sector, hour);
            slice.zip_mut_with(field, |acc, value| {
                *acc = match (*acc, *value) {
                    (Some(a), Some(v)) => Some(a + v * factor),
                    _ => None,
                }
            });
        }
    }

    Ok(HourlyFlux {
        species,
        unit: species.unit().to_string(),
        data,
    })
}

/// Builds the hourly source-grid flux of each species
///
/// Cell areas and the diurnal table are computed once and shared by every species.
#[derive(Debug, Clone)]
pub struct FluxAssembler {
    cell_area: Arc<CellArea>,
    diurnal: Arc<DiurnalTable>,
    month: u32,
    days_in_month: u32,
}

impl FluxAssembler {
    pub fn new(
        cell_area: Arc<CellArea>,
        diurnal: Arc<DiurnalTable>,
        date: SimulationDate,
    ) -> EmgridResult<Self> {
        Ok(Self {
            cell_area,
            diurnal,
            month: date.month,
            days_in_month: date.days_in_month()?,
        })
    }

    pub fn days_in_month(&self) -> u32 {
        self.days_in_month
    }

    /// Hourly flux of one species on the source grid
    pub fn assemble(&self, inventory: &SpeciesInventory) -> EmgridResult<HourlyFlux> {
        let species = inventory.species();
        info!("Map to {} species", species.model_variable());

        let sentinel = inventory.missing_value()?;
        let mut monthly = BTreeMap::new();
        for series in inventory.iter() {
            let field = mask_sentinel(series.select_month(self.month)?, sentinel);
            let converted = convert_units(&field, species, &self.cell_area, self.days_in_month)?;
            monthly.insert(series.sector, converted);
        }

        let flux = disaggregate(&monthly, &self.diurnal, species)?;
        debug!("{} {}", species.model_variable(), flux.summary());
        Ok(flux)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::{array, Array2};

    fn uniform_area(rows: usize, cols: usize, value: f64) -> CellArea {
        CellArea::from_values(Array2::from_elem((rows, cols), value)).unwrap()
    }

    fn series(species: Species, sector: Sector, value: f64) -> SectorSeries {
        SectorSeries::new(
            species,
            sector,
            vec![6, 7, 8],
            Array3::from_elem((3, 2, 2), value),
            -999.0,
        )
        .unwrap()
    }

    #[test]
    fn nox_conversion() {
        let field = array![[Some(10.0), None], [Some(0.0), Some(14.0)]];
        let area = uniform_area(2, 2, 1e6);
        let converted = convert_units(&field, Species::NOx, &area, 30).unwrap();

        let expected = 10.0 * 1e9 / 1.0 / (720.0 * 14.0);
        assert!(is_close!(converted[[0, 0]].unwrap(), expected));
        assert_eq!(converted[[0, 1]], None);
        assert_eq!(converted[[1, 0]], Some(0.0));
    }

    #[test]
    fn so2_uses_its_molecular_weight() {
        let field = array![[Some(64.0)]];
        let area = uniform_area(1, 1, 2e6);
        let converted = convert_units(&field, Species::SO2, &area, 31).unwrap();
        let expected = 64.0 * 1e9 / 2.0 / (744.0 * 64.0);
        assert!(is_close!(converted[[0, 0]].unwrap(), expected));
    }

    #[test]
    fn pm25_conversion() {
        let field = array![[Some(3.0)]];
        let area = uniform_area(1, 1, 5e6);
        let converted = convert_units(&field, Species::PM25, &area, 30).unwrap();
        let expected = 3.0 * 1e15 / 5e6 / (2_592_000.0 * 1.0);
        assert!(is_close!(converted[[0, 0]].unwrap(), expected));
    }

    #[test]
    fn conversion_rejects_mismatched_area() {
        let field = array![[Some(1.0), Some(2.0)]];
        let area = uniform_area(2, 2, 1.0);
        assert!(matches!(
            convert_units(&field, Species::NOx, &area, 30),
            Err(EmgridError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn disaggregation_sums_sectors_per_hour() {
        let mut raw = Array2::ones((5, 24));
        raw[[Sector::Traffic.index(), 8]] = 13.0;
        let table = DiurnalTable::from_factors(raw).unwrap();

        let monthly = BTreeMap::from([
            (Sector::Industry, array![[Some(1.0), Some(2.0)]]),
            (Sector::Traffic, array![[Some(3.0), None]]),
        ]);
        let flux = disaggregate(&monthly, &table, Species::NOx).unwrap();

        assert_eq!(flux.hours(), 24);
        assert_eq!(flux.unit, "mol km-2 hr-1");
        // Traffic: 13 at hour 8 and 1 elsewhere, normalised by (23 + 13) / 24 = 1.5
        assert!(is_close!(flux.data[[0, 0, 0]].unwrap(), 1.0 + 3.0 / 1.5));
        assert!(is_close!(flux.data[[8, 0, 0]].unwrap(), 1.0 + 3.0 * 13.0 / 1.5));
        // Absent traffic cell stays absent in every hour
        assert!(flux.data.index_axis(Axis(2), 1).iter().all(|v| v.is_none()));
    }

    #[test]
    fn disaggregation_preserves_daily_total() {
        let rows: Vec<f64> = (0..24).map(|h| 1.0 + (h as f64 / 3.0).sin().abs()).collect();
        let mut raw = Array2::zeros((5, 24));
        for sector in Sector::ALL {
            for (h, v) in rows.iter().enumerate() {
                raw[[sector.index(), h]] = v * (sector.index() + 1) as f64;
            }
        }
        let table = DiurnalTable::from_factors(raw).unwrap();
        let monthly: BTreeMap<Sector, MaskedField> = Sector::ALL
            .iter()
            .map(|s| (*s, array![[Some(s.index() as f64 + 0.5)]]))
            .collect();

        let flux = disaggregate(&monthly, &table, Species::SO2).unwrap();
        let daily: f64 = flux.data.iter().map(|v| v.unwrap()).sum();
        let sector_sum: f64 = monthly.values().map(|f| f[[0, 0]].unwrap()).sum();
        assert!((daily / 24.0 - sector_sum).abs() < 1e-10);
    }

    #[test]
    fn month_selection() {
        let s = series(Species::NOx, Sector::Energy, 1.0);
        assert!(s.select_month(7).is_ok());
        assert!(matches!(
            s.select_month(1),
            Err(EmgridError::MonthNotFound { found: 0, .. })
        ));
    }

    #[test]
    fn inventory_requires_every_sector() {
        let series = vec![
            series(Species::NOx, Sector::Industry, 1.0),
            series(Species::NOx, Sector::Energy, 1.0),
        ];
        let err = SpeciesInventory::new(Species::NOx, series).unwrap_err();
        assert!(matches!(err, EmgridError::MissingVariable(ref v) if v == "NOx_Traffic"));
    }

    #[test]
    fn inventory_rejects_foreign_species() {
        let series = vec![series(Species::SO2, Sector::Industry, 1.0)];
        assert!(matches!(
            SpeciesInventory::new(Species::NOx, series),
            Err(EmgridError::Config(_))
        ));
    }

    #[test]
    fn assembler_masks_converts_and_spreads() {
        let mut all: Vec<SectorSeries> = Sector::ALL
            .iter()
            .map(|s| series(Species::NOx, *s, 0.0))
            .collect();
        all[0] = series(Species::NOx, Sector::Industry, 10.0);
        all[0].data[[1, 1, 1]] = -999.0;
        let inventory = SpeciesInventory::new(Species::NOx, all).unwrap();

        let assembler = FluxAssembler::new(
            Arc::new(uniform_area(2, 2, 1e6)),
            Arc::new(DiurnalTable::identity()),
            SimulationDate {
                year: 2019,
                month: 7,
                day: 25,
            },
        )
        .unwrap();
        let flux = assembler.assemble(&inventory).unwrap();

        let expected = 10.0 * 1e9 / 1.0 / (744.0 * 14.0);
        for hour in 0..24 {
            assert!(is_close!(flux.data[[hour, 0, 0]].unwrap(), expected));
            assert_eq!(flux.data[[hour, 1, 1]], None);
        }
    }
}
