//! Pipeline configuration
//!
//! Every value that drives a run (paths, simulated date, resampling choices and the
//! species to write) is carried explicitly in a [`PipelineConfig`]. Configurations
//! are usually read from TOML:
//!
//! ```toml
//! domain = "d01"
//!
//! [paths]
//! inventory = "../input_files/VITO_STD-RES-INVENTORY_EAST-CHINA.nc"
//! domain_file = "../input_files/geo_em.d01.nc"
//! diurnal_table = "./hourly_factor.csv"
//! output_dir = "../output_files/"
//!
//! [date]
//! year = 2019
//! month = 7
//! day = 25
//!
//! [resample]
//! method = "bilinear"
//! radius_of_influence = 100000.0
//! neighbours = 10
//! ```

use crate::calendar::{days_in_month, hourly_timestamps};
use crate::errors::{EmgridError, EmgridResult};
use crate::field::FloatValue;
use crate::species::Species;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Strategy used to move hourly fields from the source swath to the target grid
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResampleMethod {
    Nearest,
    InverseDistance,
    Bilinear,
}

impl ResampleMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ResampleMethod::Nearest => "nearest",
            ResampleMethod::InverseDistance => "idw",
            ResampleMethod::Bilinear => "bilinear",
        }
    }
}

impl FromStr for ResampleMethod {
    type Err = EmgridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(ResampleMethod::Nearest),
            "idw" => Ok(ResampleMethod::InverseDistance),
            "bilinear" => Ok(ResampleMethod::Bilinear),
            _ => Err(EmgridError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for ResampleMethod {
    type Error = EmgridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResampleMethod> for String {
    fn from(value: ResampleMethod) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parameters shared by all resampling strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleParameters {
    pub method: ResampleMethod,
    /// Maximum source-to-target distance considered (m)
    pub radius_of_influence: FloatValue,
    /// Maximum number of source samples considered per target cell.
    ///
    /// Used by the inverse-distance and bilinear strategies.
    pub neighbours: usize,
    /// Numerical tolerance of the bilinear solve for degenerate quadrilaterals
    pub epsilon: FloatValue,
    /// Value of target cells without any qualifying source contribution
    pub fill_value: FloatValue,
}

impl Default for ResampleParameters {
    fn default() -> Self {
        Self {
            method: ResampleMethod::Bilinear,
            radius_of_influence: 100_000.0,
            neighbours: 10,
            epsilon: 0.0,
            fill_value: 0.0,
        }
    }
}

/// File locations handled by the I/O layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub inventory: PathBuf,
    pub domain_file: PathBuf,
    pub diurnal_table: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            inventory: PathBuf::from("../input_files/VITO_STD-RES-INVENTORY_EAST-CHINA.nc"),
            domain_file: PathBuf::from("../input_files/geo_em.d01.nc"),
            diurnal_table: PathBuf::from("./hourly_factor.csv"),
            output_dir: PathBuf::from("../output_files/"),
        }
    }
}

/// Simulated day; emissions are identical for every day of the month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl Default for SimulationDate {
    fn default() -> Self {
        Self {
            year: 2019,
            month: 7,
            day: 25,
        }
    }
}

impl SimulationDate {
    pub fn days_in_month(&self) -> EmgridResult<u32> {
        days_in_month(self.year, self.month)
    }

    /// The 24 hourly stamps of the simulated day
    pub fn timestamps(&self) -> EmgridResult<Vec<String>> {
        hourly_timestamps(self.year, self.month, self.day)
    }
}

/// Which species are written to the baseline files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    /// Write PM2.5 as well as NOx and SO2.
    ///
    /// Off by default: the PM2.5 totals of the reference inventory are not reliable.
    pub include_pm25: bool,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Self {
            include_pm25: false,
        }
    }
}

impl SpeciesConfig {
    /// Species processed and merged, in processing order
    pub fn enabled(&self) -> Vec<Species> {
        Species::ALL
            .into_iter()
            .filter(|s| *s != Species::PM25 || self.include_pm25)
            .collect()
    }
}

/// Complete configuration of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Domain suffix of the WRF files, e.g. "d01"
    pub domain: String,
    pub paths: PathsConfig,
    pub date: SimulationDate,
    pub resample: ResampleParameters,
    pub species: SpeciesConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            domain: "d01".to_string(),
            paths: PathsConfig::default(),
            date: SimulationDate::default(),
            resample: ResampleParameters::default(),
            species: SpeciesConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> EmgridResult<Self> {
        let table: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| EmgridError::Config(e.message().to_string()))?;

        // Resolve the method up front so an unknown name keeps its own error kind
        if let Some(method) = table
            .get("resample")
            .and_then(|r| r.get("method"))
            .and_then(|m| m.as_str())
        {
            method.parse::<ResampleMethod>()?;
        }

        let config: PipelineConfig = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| EmgridError::Config(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> EmgridResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> EmgridResult<()> {
        self.date.timestamps()?;
        if self.domain.is_empty() {
            return Err(EmgridError::Config("domain must not be empty".to_string()));
        }
        if !(self.resample.radius_of_influence > 0.0) {
            return Err(EmgridError::Config(format!(
                "radius_of_influence must be positive, got {}",
                self.resample.radius_of_influence
            )));
        }
        if self.resample.neighbours == 0 {
            return Err(EmgridError::Config(
                "neighbours must be at least 1".to_string(),
            ));
        }
        if !(self.resample.epsilon >= 0.0) {
            return Err(EmgridError::Config(format!(
                "epsilon must be non-negative, got {}",
                self.resample.epsilon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip() {
        for method in [
            ResampleMethod::Nearest,
            ResampleMethod::InverseDistance,
            ResampleMethod::Bilinear,
        ] {
            assert_eq!(method.name().parse::<ResampleMethod>().unwrap(), method);
        }
        assert_eq!(
            " Bilinear ".parse::<ResampleMethod>().unwrap(),
            ResampleMethod::Bilinear
        );
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = "cubic".parse::<ResampleMethod>().unwrap_err();
        assert!(matches!(err, EmgridError::UnsupportedMethod(ref m) if m == "cubic"));
    }

    #[test]
    fn defaults_match_reference_run() {
        let config = PipelineConfig::default();
        assert_eq!(config.domain, "d01");
        assert_eq!(config.date.days_in_month().unwrap(), 31);
        assert_eq!(config.resample.method, ResampleMethod::Bilinear);
        assert_eq!(config.resample.radius_of_influence, 100_000.0);
        assert_eq!(config.resample.neighbours, 10);
        assert_eq!(config.species.enabled(), vec![Species::NOx, Species::SO2]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            domain = "d02"

            [date]
            year = 2020
            month = 2
            day = 29

            [resample]
            method = "idw"
            neighbours = 4

            [species]
            include_pm25 = true
            "#,
        )
        .unwrap();

        assert_eq!(config.domain, "d02");
        assert_eq!(config.date.days_in_month().unwrap(), 29);
        assert_eq!(config.resample.method, ResampleMethod::InverseDistance);
        assert_eq!(config.resample.neighbours, 4);
        assert_eq!(config.resample.radius_of_influence, 100_000.0);
        assert_eq!(
            config.species.enabled(),
            vec![Species::NOx, Species::SO2, Species::PM25]
        );
        assert_eq!(config.paths, PathsConfig::default());
    }

    #[test]
    fn toml_with_unknown_method_fails() {
        let result = PipelineConfig::from_toml_str("[resample]\nmethod = \"cubic\"\n");
        assert!(matches!(result, Err(EmgridError::UnsupportedMethod(ref m)) if m == "cubic"));
    }

    #[test]
    fn invalid_day_fails_validation() {
        let result = PipelineConfig::from_toml_str("[date]\nyear = 2019\nmonth = 2\nday = 30\n");
        assert!(matches!(result, Err(EmgridError::Config(_))));
    }

    #[test]
    fn zero_neighbours_fails_validation() {
        let result = PipelineConfig::from_toml_str("[resample]\nneighbours = 0\n");
        assert!(matches!(result, Err(EmgridError::Config(_))));
    }

    #[test]
    fn negative_epsilon_fails_validation() {
        let result = PipelineConfig::from_toml_str("[resample]\nepsilon = -0.5\n");
        assert!(matches!(result, Err(EmgridError::Config(ref m)) if m.contains("epsilon")));

        let mut config = PipelineConfig::default();
        config.resample.epsilon = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn radius_of_influence_must_be_positive() {
        for radius in [0.0, -1000.0, f64::NAN] {
            let mut config = PipelineConfig::default();
            config.resample.radius_of_influence = radius;
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, EmgridError::Config(ref m) if m.contains("radius_of_influence")),
                "{}",
                radius
            );
        }
    }

    #[test]
    fn json_round_trip() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
    }
}
