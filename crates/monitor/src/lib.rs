//! Background threshold monitoring over the management bus.
//!
//! One [`start`] call spawns a supervised background task that samples
//! a baseline for the configured query target, polls on a fixed
//! interval (reducing multi-instance responses to a scalar and folding
//! it into a reset-compensated cumulative total), and fires a
//! corrective reset when the total moves past the threshold. The task
//! terminates cooperatively via [`MonitorHandle::stop`].
//!
//! Progress is observable through broadcast [`MonitorEvent`]s.

mod action;
pub mod event;
pub mod manager;
mod monitor;

pub use event::MonitorEvent;
pub use manager::{start, MonitorHandle, StartError};
