//! Events emitted by a running threshold monitor.
//!
//! Broadcast to any number of subscribers via
//! [`MonitorHandle::subscribe`](crate::manager::MonitorHandle::subscribe);
//! published events are silently dropped when no one is listening.

use serde::Serialize;

use axon_core::types::{SampleValue, Timestamp};

/// A state change in the monitor worth surfacing to the platform.
#[derive(Debug, Clone, Serialize)]
pub enum MonitorEvent {
    /// The baseline sample was captured and polling is about to begin.
    BaselineCaptured {
        baseline: SampleValue,
        at: Timestamp,
    },

    /// A poll cycle failed and was skipped; monitor state is unchanged.
    CycleSkipped { reason: String, at: Timestamp },

    /// The corrected cumulative value moved past the threshold.
    ThresholdBreached {
        corrected: SampleValue,
        threshold: SampleValue,
        at: Timestamp,
    },

    /// The corrective reset request was dispatched and acknowledged.
    ResetRequested { at: Timestamp },

    /// The corrective reset failed. It is not retried until the next
    /// breach observation.
    ResetFailed { reason: String, at: Timestamp },

    /// The monitor reached its terminal state.
    Stopped { at: Timestamp },
}
