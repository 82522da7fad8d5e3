//! Threshold monitor poll loop.
//!
//! One background task per monitor instance. Each cycle samples the
//! configured query target over the correlated client, reduces the
//! multi-instance response to a scalar, folds it into the
//! reset-compensated cumulative total, and fires the corrective action
//! when the total moves past the threshold.
//!
//! Both suspension points — the interval sleep and the wait for a
//! correlated response — race the cancellation token, so a stop request
//! interrupts either promptly.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use axon_core::config::MonitorConfig;
use axon_core::drift::CumulativeState;
use axon_core::sample::parse_sample;
use axon_core::types::SampleValue;
use axon_proto::client::{ClientError, CorrelationClient};

use crate::action;
use crate::event::MonitorEvent;

/// The monitor's background task.
///
/// Owns the cumulative state for its whole lifetime; nothing outside
/// the task ever touches it, so no locking is involved.
pub(crate) struct MonitorTask {
    config: MonitorConfig,
    client: Arc<CorrelationClient>,
    events: broadcast::Sender<MonitorEvent>,
    cancel: CancellationToken,
}

impl MonitorTask {
    pub(crate) fn new(
        config: MonitorConfig,
        client: Arc<CorrelationClient>,
        events: broadcast::Sender<MonitorEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            client,
            events,
            cancel,
        }
    }

    /// Run until cancelled.
    pub(crate) async fn run(self) {
        tracing::info!(
            query_target = %self.config.query_target,
            interval_secs = self.config.poll_interval.as_secs(),
            threshold = self.config.threshold,
            "Threshold monitor started",
        );

        let Some(baseline) = self.capture_baseline().await else {
            // Cancelled before the baseline arrived.
            self.emit(MonitorEvent::Stopped { at: Utc::now() });
            return;
        };
        let mut state = CumulativeState::new(baseline);
        self.emit(MonitorEvent::BaselineCaptured {
            baseline,
            at: Utc::now(),
        });

        // First poll one full interval after the baseline.
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.poll_interval,
            self.config.poll_interval,
        );
        // A slow poll must not cause a burst of catch-up ticks; polls
        // are strictly sequential.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = self.poll_cycle(&mut state) => {}
                    }
                }
            }
        }

        self.emit(MonitorEvent::Stopped { at: Utc::now() });
        tracing::info!(
            query_target = %self.config.query_target,
            "Threshold monitor terminated",
        );
    }

    /// Capture the starting sample.
    ///
    /// A failed baseline query is degraded, not fatal: the monitor logs
    /// a warning and counts from zero, at worst over-counting the
    /// pre-start usage once. Returns `None` only when cancelled while
    /// the request was in flight.
    async fn capture_baseline(&self) -> Option<SampleValue> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = self.sample() => Some(match result {
                Ok(baseline) => baseline,
                Err(e) => {
                    tracing::warn!(error = %e, "Baseline query failed; starting from zero");
                    0
                }
            }),
        }
    }

    /// One polling cycle: sample, fold into the cumulative state,
    /// compare against the threshold, act on a breach.
    ///
    /// Every failure here is recoverable — the cycle is skipped, state
    /// is untouched, and the next tick is the retry.
    async fn poll_cycle(&self, state: &mut CumulativeState) {
        let raw = match self.sample().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    query_target = %self.config.query_target,
                    error = %e,
                    "Poll failed; skipping cycle",
                );
                self.emit(MonitorEvent::CycleSkipped {
                    reason: e.to_string(),
                    at: Utc::now(),
                });
                return;
            }
        };

        let corrected = state.apply(raw);
        tracing::debug!(
            raw,
            corrected,
            threshold = self.config.threshold,
            "Poll cycle complete",
        );

        if corrected <= self.config.threshold {
            return;
        }

        // Corrected usage is past the limit. The total is deliberately
        // NOT cleared here — it only falls once the hardware counter
        // actually resets.
        self.emit(MonitorEvent::ThresholdBreached {
            corrected,
            threshold: self.config.threshold,
            at: Utc::now(),
        });
        tracing::info!(
            corrected,
            threshold = self.config.threshold,
            "Threshold breached; requesting corrective reset",
        );

        match action::invoke(&self.client).await {
            Ok(()) => self.emit(MonitorEvent::ResetRequested { at: Utc::now() }),
            Err(e) => {
                tracing::error!(error = %e, "Corrective reset failed");
                self.emit(MonitorEvent::ResetFailed {
                    reason: e.to_string(),
                    at: Utc::now(),
                });
            }
        }
    }

    /// Query the target and reduce the response to a single scalar.
    async fn sample(&self) -> Result<SampleValue, ClientError> {
        let values = self
            .client
            .get_values(vec![self.config.query_target.clone()])
            .await?;

        let parsed: Vec<SampleValue> = values.iter().map(|pv| parse_sample(&pv.value)).collect();
        Ok(self.config.aggregation.reduce(&parsed))
    }

    /// Publish an event; dropped silently when no one subscribes.
    fn emit(&self, event: MonitorEvent) {
        let _ = self.events.send(event);
    }
}
