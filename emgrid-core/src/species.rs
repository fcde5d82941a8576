//! Emission species and source sectors
//!
//! The inventory carries one variable per (species, sector) pair, named
//! `<prefix>_<Sector>` (for example `NOx_Industry`). The downstream chemistry
//! model expects one variable per species, named after the model species
//! (`E_NO`, `E_SO2`, `E_PM25`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Emission-source category of the inventory
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sector {
    Industry,
    Energy,
    Traffic,
    Residential,
    Fires,
}

impl Sector {
    /// All sectors, in inventory order
    pub const ALL: [Sector; 5] = [
        Sector::Industry,
        Sector::Energy,
        Sector::Traffic,
        Sector::Residential,
        Sector::Fires,
    ];

    /// Sector whose descriptor supplies the missing-value sentinel for every sector
    pub const REFERENCE: Sector = Sector::Industry;

    pub fn name(&self) -> &'static str {
        match self {
            Sector::Industry => "Industry",
            Sector::Energy => "Energy",
            Sector::Traffic => "Traffic",
            Sector::Residential => "Residential",
            Sector::Fires => "Fires",
        }
    }

    /// Row index of this sector in a [`DiurnalTable`](crate::diurnal::DiurnalTable)
    pub fn index(&self) -> usize {
        match self {
            Sector::Industry => 0,
            Sector::Energy => 1,
            Sector::Traffic => 2,
            Sector::Residential => 3,
            Sector::Fires => 4,
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How monthly totals of a species are turned into a flux
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConversionFamily {
    /// Gas-phase species: mol km-2 hr-1
    MolarPerArea,
    /// Aerosol mass: ug m-3 m s-1
    MassFlux,
}

/// Chemical species produced by the pipeline
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Species {
    NOx,
    SO2,
    PM25,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::NOx, Species::SO2, Species::PM25];

    /// Prefix of the inventory variables for this species
    pub fn inventory_prefix(&self) -> &'static str {
        match self {
            Species::NOx => "NOx",
            Species::SO2 => "SO2",
            Species::PM25 => "PM25",
        }
    }

    /// Name of the inventory variable holding one sector of this species
    pub fn inventory_variable(&self, sector: Sector) -> String {
        format!("{}_{}", self.inventory_prefix(), sector.name())
    }

    /// Name of the emission variable produced for the chemistry model
    pub fn model_variable(&self) -> &'static str {
        match self {
            Species::NOx => "E_NO",
            Species::SO2 => "E_SO2",
            Species::PM25 => "E_PM25",
        }
    }

    /// Name of the variable replaced in the baseline emission files
    ///
    /// Only PM2.5 differs from [`model_variable`](Self::model_variable).
    pub fn baseline_variable(&self) -> &'static str {
        match self {
            Species::PM25 => "E_PM_25",
            other => other.model_variable(),
        }
    }

    /// Molecular weight (g/mol) used to normalise the mass totals
    ///
    /// NOx is reported as N, hence 14. PM2.5 is not normalised.
    pub fn molecular_weight(&self) -> f64 {
        match self {
            Species::NOx => 14.0,
            Species::SO2 => 64.0,
            Species::PM25 => 1.0,
        }
    }

    pub fn conversion(&self) -> ConversionFamily {
        match self {
            Species::NOx | Species::SO2 => ConversionFamily::MolarPerArea,
            Species::PM25 => ConversionFamily::MassFlux,
        }
    }

    /// Unit of the converted flux
    pub fn unit(&self) -> &'static str {
        match self.conversion() {
            ConversionFamily::MolarPerArea => "mol km-2 hr-1",
            ConversionFamily::MassFlux => "ug/m3 m/s",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inventory_prefix())
    }
}
