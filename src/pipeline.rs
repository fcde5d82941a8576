//! End-to-end orchestration of a regridding run
//!
//! An [`EmissionsPipeline`] owns everything that does not depend on the species:
//! the target grid, the source cell areas, the diurnal table and the neighbour
//! search between the two grids. Species are then processed one after another and
//! their half-day windows merged into the baseline datasets of the domain.

use emgrid_components::flux::{FluxAssembler, SpeciesInventory};
use emgrid_components::resample::SpatialResampler;
use emgrid_components::window::{BaselineStore, OutputWindow, WindowLabel, WindowSplitter};
use emgrid_core::config::PipelineConfig;
use emgrid_core::diurnal::DiurnalTable;
use emgrid_core::errors::{EmgridError, EmgridResult};
use emgrid_core::field::{HourlyFlux, ResampledFlux};
use emgrid_core::grid::{
    build_target_grid, compute_cell_area, CellArea, ProjectionSpec, SourceGrid,
    TargetGridDefinition,
};
use emgrid_core::species::Species;
use log::info;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// Outcome of merging one output window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeReport {
    pub label: WindowLabel,
    /// Name of the baseline dataset written
    pub dataset: String,
    pub species: Vec<Species>,
    /// Unit of every merged species, in the order of `species`
    pub units: Vec<String>,
    pub hours: Range<usize>,
}

#[derive(Debug)]
pub struct EmissionsPipeline {
    config: PipelineConfig,
    source_grid: SourceGrid,
    target: Arc<TargetGridDefinition>,
    assembler: FluxAssembler,
    resampler: SpatialResampler,
    splitter: WindowSplitter,
    timestamps: Vec<String>,
}

impl EmissionsPipeline {
    /// Prepare a run, computing the source cell areas from the grid bounds
    pub fn new(
        config: PipelineConfig,
        projection: ProjectionSpec,
        source_grid: SourceGrid,
        diurnal: DiurnalTable,
    ) -> EmgridResult<Self> {
        let cell_area = compute_cell_area(&source_grid)?;
        info!(
            "Source grid {:?} covers {:.3e} {}",
            source_grid.shape(),
            cell_area.total(),
            CellArea::UNIT
        );
        Self::with_cell_area(config, projection, source_grid, cell_area, diurnal)
    }

    /// Prepare a run with cell areas supplied by the caller
    pub fn with_cell_area(
        config: PipelineConfig,
        projection: ProjectionSpec,
        source_grid: SourceGrid,
        cell_area: CellArea,
        diurnal: DiurnalTable,
    ) -> EmgridResult<Self> {
        config.validate()?;
        if cell_area.shape() != source_grid.shape() {
            let (rows, cols) = source_grid.shape();
            return Err(EmgridError::ShapeMismatch {
                context: "cell area".to_string(),
                expected: vec![rows, cols],
                found: cell_area.values().shape().to_vec(),
            });
        }

        info!("Define the target grid");
        let target = Arc::new(build_target_grid(&projection)?);
        let assembler = FluxAssembler::new(Arc::new(cell_area), Arc::new(diurnal), config.date)?;
        let resampler =
            SpatialResampler::new(&source_grid.swath(), target.clone(), config.resample.clone())?;
        let splitter = WindowSplitter::new(config.domain.clone());
        let timestamps = config.date.timestamps()?;

        Ok(Self {
            config,
            source_grid,
            target,
            assembler,
            resampler,
            splitter,
            timestamps,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source_grid(&self) -> &SourceGrid {
        &self.source_grid
    }

    pub fn target(&self) -> &TargetGridDefinition {
        &self.target
    }

    /// Hourly stamps of the simulated day
    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    /// Hourly flux of one species on the source grid
    pub fn hourly_flux(&self, inventory: &SpeciesInventory) -> EmgridResult<HourlyFlux> {
        self.assembler
            .assemble(inventory)
            .map_err(|e| e.for_species(inventory.species()))
    }

    /// Hourly flux of one species on the target grid
    pub fn resample(&self, flux: &HourlyFlux) -> EmgridResult<ResampledFlux> {
        info!("Resample {}", flux.species.model_variable());
        self.resampler
            .resample(flux)
            .map_err(|e| e.for_species(flux.species))
    }

    /// Process every enabled species and merge the results into `store`
    ///
    /// Fails without writing anything if a species cannot be processed or either
    /// baseline dataset is missing from `store`.
    pub fn run(
        &self,
        inventories: &[SpeciesInventory],
        store: &mut dyn BaselineStore,
    ) -> EmgridResult<Vec<MergeReport>> {
        let mut morning: Vec<OutputWindow> = Vec::new();
        let mut evening: Vec<OutputWindow> = Vec::new();

        for species in self.config.species.enabled() {
            let inventory = inventories
                .iter()
                .find(|i| i.species() == species)
                .ok_or_else(|| {
                    EmgridError::MissingVariable(species.inventory_prefix().to_string())
                })?;
            let flux = self.hourly_flux(inventory)?;
            let resampled = self.resample(&flux)?;
            let (a, b) = self
                .splitter
                .split(&resampled, &self.timestamps)
                .map_err(|e| e.for_species(species))?;
            morning.push(a);
            evening.push(b);
        }

        for label in WindowLabel::ALL {
            let name = label.file_name(self.splitter.domain());
            if store.load(&name)?.is_none() {
                return Err(EmgridError::BaselineMissing {
                    window: name,
                    domain: self.splitter.domain().to_string(),
                });
            }
        }

        let mut reports = Vec::with_capacity(WindowLabel::ALL.len());
        for (label, windows) in [
            (WindowLabel::Hour00, morning),
            (WindowLabel::Hour12, evening),
        ] {
            let dataset = self.splitter.merge_into(label, &windows, store)?;
            reports.push(MergeReport {
                label,
                dataset: dataset.name,
                species: windows.iter().map(|w| w.species).collect(),
                units: windows.iter().map(|w| w.unit.clone()).collect(),
                hours: label.hours(),
            });
        }
        info!("Merged {} windows", reports.len());
        Ok(reports)
    }
}
