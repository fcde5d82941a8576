use thiserror::Error;

/// Error type for the regridding pipeline.
///
/// Every variant is fatal for the species or window being processed. A missing
/// diurnal table is not represented here: it degrades to the identity table.
#[derive(Error, Debug)]
pub enum EmgridError {
    #[error("Unsupported map projection code {code}. Supported: 1 (lcc), 2 (polar stereographic), 3 (mercator), 6 (lat-lon)")]
    UnsupportedProjection { code: i32 },
    #[error("Invalid {axis} bounds at index {index}: {reason}")]
    InvalidBounds {
        axis: &'static str,
        index: usize,
        reason: String,
    },
    #[error("Unsupported resample method '{0}'. Expected one of: nearest, idw, bilinear")]
    UnsupportedMethod(String),
    #[error("Expected a field covering 24 hours, got {hours}")]
    IncompleteDay { hours: usize },
    #[error("Baseline dataset {window} for domain {domain} does not exist. It must be produced upstream before emissions can be replaced")]
    BaselineMissing { window: String, domain: String },
    #[error("Shape mismatch for {context}: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("Variable {variable} has {found} time steps in month {month}, expected exactly one")]
    MonthNotFound {
        variable: String,
        month: u32,
        found: usize,
    },
    #[error("Missing inventory variable {0}")]
    MissingVariable(String),
    #[error("Invalid diurnal table: {0}")]
    InvalidDiurnalTable(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("While processing species {species}: {source}")]
    Species {
        species: String,
        #[source]
        source: Box<EmgridError>,
    },
    #[error("While resampling hour {hour}: {source}")]
    Hour {
        hour: usize,
        #[source]
        source: Box<EmgridError>,
    },
}

impl EmgridError {
    /// Attach the species being processed to an error
    pub fn for_species(self, species: impl std::fmt::Display) -> Self {
        EmgridError::Species {
            species: species.to_string(),
            source: Box::new(self),
        }
    }

    /// Attach the hour slice being resampled to an error
    pub fn at_hour(self, hour: usize) -> Self {
        EmgridError::Hour {
            hour,
            source: Box::new(self),
        }
    }

    /// The innermost error, with species/hour context stripped
    pub fn root_cause(&self) -> &EmgridError {
        match self {
            EmgridError::Species { source, .. } | EmgridError::Hour { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// Convenience type for `Result<T, EmgridError>`.
pub type EmgridResult<T> = Result<T, EmgridError>;
