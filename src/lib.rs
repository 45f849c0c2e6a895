//! Polls the FusionSolar northbound API and reduces per-device telemetry to plant-level
//! power figures: PV generation, grid import/export, battery and house consumption.

pub mod aggregate;
pub mod api;
pub mod catalog;
pub mod model;
pub mod poll;
pub mod session;
pub mod settings;
pub mod sink;

pub use api::Error;
