//! Diurnal disaggregation profiles
//!
//! A [`DiurnalTable`] holds 24 hourly scaling factors per [`Sector`]. Factors are
//! normalised so that every sector's daily mean is exactly 1, which means applying the
//! table only redistributes mass across the day and never changes the daily total.
//!
//! # File format
//!
//! The optional table file is plain comma-separated text:
//!
//! ```text
//! # hourly factors
//! Fires,Industry,Energy,Residential,Traffic
//! 0.5,0.8,0.9,0.4,0.3
//! ...
//! ```
//!
//! The first two lines are skipped, `#` starts a comment and exactly 24 data rows are
//! expected with at least five columns in the order of [`DiurnalTable::FILE_COLUMNS`].

use crate::calendar::HOURS_PER_DAY;
use crate::errors::{EmgridError, EmgridResult};
use crate::field::FloatValue;
use crate::species::Sector;
use log::warn;
use ndarray::{Array2, ArrayView1, Axis};
use std::path::{Path, PathBuf};

/// Where a [`DiurnalTable`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiurnalSource {
    /// Read from a table file
    File(PathBuf),
    /// The table file was unavailable and the identity table is used instead
    Default,
}

/// Sector by hour scaling factors with a daily mean of 1 for every sector
#[derive(Debug, Clone, PartialEq)]
pub struct DiurnalTable {
    /// Shape `(sectors, 24)`, rows indexed by [`Sector::index`]
    factors: Array2<FloatValue>,
}

impl Default for DiurnalTable {
    fn default() -> Self {
        Self::identity()
    }
}

impl DiurnalTable {
    /// Column order of the sectors in a table file
    pub const FILE_COLUMNS: [Sector; 5] = [
        Sector::Fires,
        Sector::Industry,
        Sector::Energy,
        Sector::Residential,
        Sector::Traffic,
    ];

    /// Header lines skipped at the top of a table file
    const HEADER_LINES: usize = 2;

    /// Every factor equal to 1
    pub fn identity() -> Self {
        Self {
            factors: Array2::ones((Sector::ALL.len(), HOURS_PER_DAY)),
        }
    }

    /// Build a table from raw factors of shape `(sectors, 24)`, re-normalising each sector
    ///
    /// Each sector row is divided by `sum / 24`, so the raw scale is irrelevant.
    pub fn from_factors(raw: Array2<FloatValue>) -> EmgridResult<Self> {
        let expected = [Sector::ALL.len(), HOURS_PER_DAY];
        if raw.shape() != expected {
            return Err(EmgridError::ShapeMismatch {
                context: "diurnal factors".to_string(),
                expected: expected.to_vec(),
                found: raw.shape().to_vec(),
            });
        }

        let mut factors = raw;
        for sector in Sector::ALL {
            let mut row = factors.row_mut(sector.index());
            if let Some(bad) = row.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
                return Err(EmgridError::InvalidDiurnalTable(format!(
                    "{} has a negative or non-finite factor {}",
                    sector, bad
                )));
            }
            let sum = row.sum();
            if sum <= 0.0 {
                return Err(EmgridError::InvalidDiurnalTable(format!(
                    "{} factors sum to zero",
                    sector
                )));
            }
            row /= sum / HOURS_PER_DAY as FloatValue;
        }
        Ok(Self { factors })
    }

    /// Parse the text of a table file
    pub fn parse(text: &str) -> EmgridResult<Self> {
        let mut raw = Array2::zeros((Sector::ALL.len(), HOURS_PER_DAY));
        let mut hour = 0;

        for (line_number, line) in text.lines().enumerate().skip(Self::HEADER_LINES) {
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            if hour >= HOURS_PER_DAY {
                return Err(EmgridError::InvalidDiurnalTable(format!(
                    "more than {} data rows (line {})",
                    HOURS_PER_DAY,
                    line_number + 1
                )));
            }

            let columns: Vec<&str> = content.split(',').map(str::trim).collect();
            if columns.len() < Self::FILE_COLUMNS.len() {
                return Err(EmgridError::InvalidDiurnalTable(format!(
                    "line {} has {} columns, expected {}",
                    line_number + 1,
                    columns.len(),
                    Self::FILE_COLUMNS.len()
                )));
            }
            for (sector, column) in Self::FILE_COLUMNS.iter().zip(columns.iter()) {
                let value: FloatValue = column.parse().map_err(|_| {
                    EmgridError::InvalidDiurnalTable(format!(
                        "line {}: cannot parse '{}' as a number",
                        line_number + 1,
                        column
                    ))
                })?;
                raw[[sector.index(), hour]] = value;
            }
            hour += 1;
        }

        if hour != HOURS_PER_DAY {
            return Err(EmgridError::InvalidDiurnalTable(format!(
                "found {} data rows, expected {}",
                hour, HOURS_PER_DAY
            )));
        }
        Self::from_factors(raw)
    }

    /// Load a table file, falling back to the identity table when it cannot be read
    ///
    /// An unreadable file is not an error: the returned [`DiurnalSource::Default`]
    /// lets the caller report it. A readable but malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> EmgridResult<(Self, DiurnalSource)> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Ok((Self::parse(&text)?, DiurnalSource::File(path.to_path_buf()))),
            Err(e) => {
                warn!(
                    "{} could not be read ({}), using a factor of 1 for every hour",
                    path.display(),
                    e
                );
                Ok((Self::identity(), DiurnalSource::Default))
            }
        }
    }

    pub fn factor(&self, sector: Sector, hour: usize) -> FloatValue {
        self.factors[[sector.index(), hour]]
    }

    /// The 24 factors of one sector
    pub fn sector_factors(&self, sector: Sector) -> ArrayView1<'_, FloatValue> {
        self.factors.row(sector.index())
    }

    /// Mean factor of every sector over the day
    pub fn daily_means(&self) -> Vec<FloatValue> {
        self.factors
            .mean_axis(Axis(1))
            .map(|m| m.to_vec())
            .unwrap_or_default()
    }
}
