//! Domain logic shared across the axon crates.
//!
//! Pure logic — no I/O, no async. Everything here is exercised by the
//! monitor task in `axon-monitor`:
//!
//! - [`sample`] — raw data-model values parsed into counter samples.
//! - [`aggregate`] — reduction of multi-instance samples to one scalar.
//! - [`drift`] — reset-compensated cumulative accounting.
//! - [`config`] — construction-time monitor configuration.

pub mod aggregate;
pub mod config;
pub mod drift;
pub mod error;
pub mod sample;
pub mod types;
