//! Half-day output windows and their merge into baseline emission datasets
//!
//! WRF-Chem reads anthropogenic emissions from two files per domain, one for hours
//! 0 to 11 (`wrfchemi_00z_<domain>`) and one for hours 12 to 23
//! (`wrfchemi_12z_<domain>`). Both files are produced upstream; only the species
//! computed here are overwritten.

use emgrid_core::calendar::HOURS_PER_DAY;
use emgrid_core::errors::{EmgridError, EmgridResult};
use emgrid_core::field::{AttributeValue, FieldMetadata, FloatValue, ResampledFlux};
use emgrid_core::species::Species;
use indexmap::IndexMap;
use log::info;
use ndarray::{s, Array3, ArrayD, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;

/// Hours per output window
pub const WINDOW_HOURS: usize = HOURS_PER_DAY / 2;

/// One of the two half-day output windows
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WindowLabel {
    Hour00,
    Hour12,
}

impl WindowLabel {
    pub const ALL: [WindowLabel; 2] = [WindowLabel::Hour00, WindowLabel::Hour12];

    /// Hours of the day covered by the window
    pub fn hours(&self) -> Range<usize> {
        match self {
            WindowLabel::Hour00 => 0..WINDOW_HOURS,
            WindowLabel::Hour12 => WINDOW_HOURS..HOURS_PER_DAY,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            WindowLabel::Hour00 => "00z",
            WindowLabel::Hour12 => "12z",
        }
    }

    /// Name of the baseline file for `domain`, e.g. `wrfchemi_00z_d01`
    pub fn file_name(&self, domain: &str) -> String {
        format!("wrfchemi_{}_{}", self.tag(), domain)
    }
}

impl fmt::Display for WindowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Twelve consecutive hours of a resampled flux
#[derive(Debug, Clone, PartialEq)]
pub struct OutputWindow {
    pub label: WindowLabel,
    pub species: Species,
    pub unit: String,
    /// Shape `(12, south_north, west_east)`
    pub data: Array3<FloatValue>,
    pub metadata: FieldMetadata,
    /// Hourly stamps of the window, `YYYY-MM-DD_HH:00:00`
    pub times: Vec<String>,
}

impl OutputWindow {
    pub fn hours(&self) -> Range<usize> {
        self.label.hours()
    }

    /// The window laid out as `(Time, emissions_zdim, south_north, west_east)`
    pub fn model_data(&self) -> ArrayD<FloatValue> {
        self.data.clone().insert_axis(Axis(1)).into_dyn()
    }
}

/// Split a 24-hour field into the 00z and 12z windows
///
/// `timestamps` are the 24 stamps of the simulated day.
pub fn split_windows(
    flux: &ResampledFlux,
    timestamps: &[String],
) -> EmgridResult<(OutputWindow, OutputWindow)> {
    if flux.hours() != HOURS_PER_DAY {
        return Err(EmgridError::IncompleteDay {
            hours: flux.hours(),
        });
    }
    if timestamps.len() != HOURS_PER_DAY {
        return Err(EmgridError::IncompleteDay {
            hours: timestamps.len(),
        });
    }

    let window = |label: WindowLabel| {
        let hours = label.hours();
        OutputWindow {
            label,
            species: flux.species,
            unit: flux.unit.clone(),
            data: flux.data.slice(s![hours.clone(), .., ..]).to_owned(),
            metadata: flux.metadata.clone(),
            times: timestamps[hours].to_vec(),
        }
    };
    Ok((window(WindowLabel::Hour00), window(WindowLabel::Hour12)))
}

/// A variable of a baseline emission dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineVariable {
    pub dims: Vec<String>,
    pub data: ArrayD<FloatValue>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

/// In-memory image of a `wrfchemi_*` file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaselineDataset {
    pub name: String,
    /// Variables in file order
    pub variables: IndexMap<String, BaselineVariable>,
    /// Contents of the `Times` variable
    pub times: Vec<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl BaselineDataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn variable(&self, name: &str) -> Option<&BaselineVariable> {
        self.variables.get(name)
    }
}

/// Persistent location of baseline datasets
///
/// Datasets are addressed by their file name (see [`WindowLabel::file_name`]).
pub trait BaselineStore {
    /// The dataset called `name`, or `None` if it does not exist
    fn load(&self, name: &str) -> EmgridResult<Option<BaselineDataset>>;

    /// Write `dataset` back under its own name
    fn store(&mut self, dataset: BaselineDataset) -> EmgridResult<()>;
}

/// A [`BaselineStore`] held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryBaselineStore {
    datasets: HashMap<String, BaselineDataset>,
}

impl InMemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dataset: BaselineDataset) {
        self.datasets.insert(dataset.name.clone(), dataset);
    }

    pub fn get(&self, name: &str) -> Option<&BaselineDataset> {
        self.datasets.get(name)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl BaselineStore for InMemoryBaselineStore {
    fn load(&self, name: &str) -> EmgridResult<Option<BaselineDataset>> {
        Ok(self.datasets.get(name).cloned())
    }

    fn store(&mut self, dataset: BaselineDataset) -> EmgridResult<()> {
        self.insert(dataset);
        Ok(())
    }
}

/// Overwrite the variable of `species` in `baseline` with a window
///
/// Every other variable, the `Times` stamps included, is passed through unchanged.
pub fn merge(
    window: &OutputWindow,
    mut baseline: BaselineDataset,
    species: Species,
) -> EmgridResult<BaselineDataset> {
    if window.species != species {
        return Err(EmgridError::Config(format!(
            "window holds {} but {} was requested",
            window.species, species
        )));
    }
    let name = species.baseline_variable();
    let data = window.model_data();

    if let Some(existing) = baseline.variables.get(name) {
        if existing.data.shape() != data.shape() {
            return Err(EmgridError::ShapeMismatch {
                context: format!("{} in {}", name, baseline.name),
                expected: existing.data.shape().to_vec(),
                found: data.shape().to_vec(),
            });
        }
    }

    let mut attributes = window.metadata.attributes.clone();
    attributes.insert("description".to_string(), name.into());
    let variable = BaselineVariable {
        dims: window.metadata.dims.clone(),
        data,
        attributes,
    };
    // Replacing keeps the variable at its original position
    baseline.variables.insert(name.to_string(), variable);
    Ok(baseline)
}

/// Merges output windows into the baseline datasets of one domain
#[derive(Debug, Clone)]
pub struct WindowSplitter {
    domain: String,
}

impl WindowSplitter {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn split(
        &self,
        flux: &ResampledFlux,
        timestamps: &[String],
    ) -> EmgridResult<(OutputWindow, OutputWindow)> {
        split_windows(flux, timestamps)
    }

    /// Merge windows sharing a label into the stored baseline of that window
    ///
    /// Fails with [`EmgridError::BaselineMissing`] if the store has no such dataset.
    pub fn merge_into(
        &self,
        label: WindowLabel,
        windows: &[OutputWindow],
        store: &mut dyn BaselineStore,
    ) -> EmgridResult<BaselineDataset> {
        let name = label.file_name(&self.domain);
        let mut dataset = store
            .load(&name)?
            .ok_or_else(|| EmgridError::BaselineMissing {
                window: name.clone(),
                domain: self.domain.clone(),
            })?;

        for window in windows {
            if window.label != label {
                return Err(EmgridError::Config(format!(
                    "window {} cannot be merged into {}",
                    window.label, name
                )));
            }
            dataset =
                merge(window, dataset, window.species).map_err(|e| e.for_species(window.species))?;
        }

        info!("Saving to {}", name);
        store.store(dataset.clone())?;
        Ok(dataset)
    }
}
