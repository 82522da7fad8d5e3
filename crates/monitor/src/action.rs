//! Corrective action: reset the monitored subsystem.
//!
//! Fired when the corrected cumulative value moves past the configured
//! threshold. Failures are logged by the caller and not retried until
//! the next breach observation.

use axon_proto::client::{ClientError, CorrelationClient};

/// Reset immediately rather than after a grace period.
const RESET_DELAY_SECONDS: i32 = 0;

/// Reset variant understood by the device backend for counter
/// subsystems.
const DEFAULT_RESET_TYPE: i32 = 0;

/// Ask the device backend to reset the monitored subsystem.
pub(crate) async fn invoke(client: &CorrelationClient) -> Result<(), ClientError> {
    tracing::info!("Dispatching corrective reset");
    client.reset(RESET_DELAY_SECONDS, DEFAULT_RESET_TYPE).await
}
