//! Processing stages of the emission regridding pipeline
//!
//! # Module Organisation
//!
//! - `flux`: monthly sector totals to hourly fluxes on the source grid
//! - `resample`: hourly source fluxes onto the target model grid
//! - `window`: half-day output windows and their merge into baseline datasets
//!
//! Stages only exchange the field types of `emgrid_core::field`, so each can be
//! driven and tested on its own.

pub mod flux;
pub mod resample;
pub mod window;
