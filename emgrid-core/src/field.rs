//! Gridded field types passed between pipeline stages
//!
//! Cells of the source inventory may be absent (equal to the inventory's missing-value
//! sentinel). Absence is carried explicitly as `Option<FloatValue>` through unit
//! conversion and diurnal disaggregation, and only resolved to a fill value when the
//! field is resampled onto the target grid.

use crate::species::Species;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FloatValue = f64;

/// A 2-D source-grid field where each cell is either present or absent
pub type MaskedField = Array2<Option<FloatValue>>;

/// Replace cells equal to `sentinel` (and NaNs) with absent values
pub fn mask_sentinel(raw: ArrayView2<FloatValue>, sentinel: FloatValue) -> MaskedField {
    raw.mapv(|v| {
        if v.is_nan() || v == sentinel {
            None
        } else {
            Some(v)
        }
    })
}

/// Summary statistics over the present cells of a field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSummary {
    pub min: FloatValue,
    pub max: FloatValue,
    pub mean: FloatValue,
    pub present: usize,
    pub absent: usize,
}

impl FieldSummary {
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<FloatValue>>,
    {
        let mut min = FloatValue::INFINITY;
        let mut max = FloatValue::NEG_INFINITY;
        let mut sum = 0.0;
        let mut present = 0;
        let mut absent = 0;
        for value in values {
            match value {
                Some(v) => {
                    min = min.min(v);
                    max = max.max(v);
                    sum += v;
                    present += 1;
                }
                None => absent += 1,
            }
        }
        let mean = if present > 0 {
            sum / present as FloatValue
        } else {
            FloatValue::NAN
        };
        if present == 0 {
            min = FloatValue::NAN;
            max = FloatValue::NAN;
        }
        Self {
            min,
            max,
            mean,
            present,
            absent,
        }
    }
}

impl std::fmt::Display for FieldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "min: {:e} max: {:e} mean: {:e} ({} absent cells)",
            self.min, self.max, self.mean, self.absent
        )
    }
}

/// Hourly flux of one species on the source grid
///
/// Shape is `(24, rows, cols)`; absent cells stay absent.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyFlux {
    pub species: Species,
    pub unit: String,
    pub data: Array3<Option<FloatValue>>,
}

impl HourlyFlux {
    pub fn hours(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn summary(&self) -> FieldSummary {
        FieldSummary::from_values(self.data.iter().copied())
    }
}

/// Attribute value attached to an output variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i32),
    Text(String),
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

/// Descriptive metadata attached to a field written for the chemistry model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Dimension names of the written variable
    pub dims: Vec<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl FieldMetadata {
    /// WRF-Chem field kind marker for real-valued 3-D fields
    pub const FIELD_TYPE: i32 = 104;
    pub const MEMORY_ORDER: &'static str = "XYZ";
    pub const COORDINATES: &'static str = "XLONG XLAT";

    /// Metadata of a WRF-Chem emission variable
    pub fn emission(variable: &str, unit: &str) -> Self {
        let dims = ["Time", "emissions_zdim", "south_north", "west_east"]
            .iter()
            .map(|d| d.to_string())
            .collect();
        let attributes = BTreeMap::from([
            ("FieldType".to_string(), Self::FIELD_TYPE.into()),
            ("MemoryOrder".to_string(), Self::MEMORY_ORDER.into()),
            ("description".to_string(), variable.into()),
            ("stagger".to_string(), "".into()),
            ("coordinates".to_string(), Self::COORDINATES.into()),
            ("units".to_string(), unit.into()),
        ]);
        Self { dims, attributes }
    }

    pub fn unit(&self) -> Option<&str> {
        match self.attributes.get("units") {
            Some(AttributeValue::Text(u)) => Some(u.as_str()),
            _ => None,
        }
    }
}

/// Hourly flux of one species on the target grid
///
/// Shape is `(hours, south_north, west_east)` with the first row at the southern edge.
/// Cells without any source contribution hold the fill value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledFlux {
    pub species: Species,
    pub unit: String,
    pub data: Array3<FloatValue>,
    pub metadata: FieldMetadata,
}

impl ResampledFlux {
    pub fn hours(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn summary(&self) -> FieldSummary {
        FieldSummary::from_values(self.data.iter().map(|v| Some(*v)))
    }
}
