//! Core types for regridding emission inventories onto WRF-Chem domains
//!
//! This crate holds the leaves of the pipeline: grid geometry, diurnal profiles,
//! the species vocabulary and the run configuration. The numerical stages that
//! consume them live in `emgrid-components`.

pub mod calendar;
pub mod config;
pub mod diurnal;
pub mod field;
pub mod grid;
pub mod species;

pub mod errors;
