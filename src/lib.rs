//! Regrid sector-resolved emission inventories onto WRF-Chem domains
//!
//! Monthly sector totals of NOx, SO2 and PM2.5 are converted to hourly fluxes,
//! resampled onto the model grid and merged into the two half-day
//! `wrfchemi_*` baseline datasets of a domain.
//!
//! ```no_run
//! use emgrid::config::PipelineConfig;
//! use emgrid::diurnal::DiurnalTable;
//! use emgrid::grid::{ProjectionSpec, SourceGrid};
//! use emgrid::pipeline::EmissionsPipeline;
//! use emgrid::window::InMemoryBaselineStore;
//! # fn main() -> emgrid::errors::EmgridResult<()> {
//! # let projection: ProjectionSpec = unimplemented!();
//! # let inventories: Vec<emgrid::flux::SpeciesInventory> = vec![];
//! let config = PipelineConfig::from_file("emgrid.toml")?;
//! let (diurnal, _) = DiurnalTable::load(&config.paths.diurnal_table)?;
//! let source = SourceGrid::from_edges(113.0, 123.0, 36.0, 27.0, 1000, 900)?;
//!
//! let pipeline = EmissionsPipeline::new(config, projection, source, diurnal)?;
//! let mut store = InMemoryBaselineStore::new();
//! let reports = pipeline.run(&inventories, &mut store)?;
//! # Ok(())
//! # }
//! ```
//!
//! Reading and writing NetCDF files is left to the caller: inventories are handed
//! over as [`flux::SpeciesInventory`] values and baselines through a
//! [`window::BaselineStore`].

pub mod pipeline;

pub use emgrid_components::{flux, resample, window};
pub use emgrid_core::{calendar, config, diurnal, errors, field, grid, species};
