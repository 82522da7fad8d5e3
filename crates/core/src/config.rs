//! Monitor construction-time configuration.
//!
//! Supplied by the embedding system when a monitor is started; there is
//! no CLI or config-file surface here. Immutable once the monitor is
//! running.

use std::time::Duration;

use crate::aggregate::Aggregation;
use crate::error::CoreError;
use crate::types::SampleValue;

/// Configuration for one threshold monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Fixed delay between poll cycles.
    pub poll_interval: Duration,
    /// Corrected cumulative value above which the corrective reset
    /// fires.
    pub threshold: SampleValue,
    /// Parameter path queried each cycle. May contain wildcard segments
    /// that the data model expands over indexed instances, e.g.
    /// `Device.Ethernet.Interface.*.Stats.ErrorsSent`.
    pub query_target: String,
    /// Reduction applied when the query expands to multiple instances.
    pub aggregation: Aggregation,
}

impl MonitorConfig {
    /// Create a config with the default aggregation policy (average).
    pub fn new(
        poll_interval: Duration,
        threshold: SampleValue,
        query_target: impl Into<String>,
    ) -> Self {
        Self {
            poll_interval,
            threshold,
            query_target: query_target.into(),
            aggregation: Aggregation::default(),
        }
    }

    /// Override the aggregation policy.
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Check the invariants that would otherwise surface as a stuck or
    /// busy-looping monitor.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::Validation(
                "poll_interval must be non-zero".into(),
            ));
        }
        if self.query_target.trim().is_empty() {
            return Err(CoreError::Validation(
                "query_target must not be empty".into(),
            ));
        }
        Ok(())
    }
}
