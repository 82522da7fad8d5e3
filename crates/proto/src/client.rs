//! Correlated request/response client for the management bus.
//!
//! [`CorrelationClient::send`] stamps each outgoing request with a
//! fresh correlation identifier, hands the serialized frame to the
//! external executor, and suspends until the matching response arrives
//! or the reply timeout elapses. Inbound frames are fed in through
//! [`CorrelationClient::deliver`] by whichever task owns the transport
//! read loop.
//!
//! All correlation state is owned by the client instance — there are no
//! process-wide counters or connection handles, so several clients can
//! coexist on one executor and unit tests need no shared globals.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use axon_core::types::CorrelationId;

use crate::executor::{ExecutorError, RequestExecutor};
use crate::message::{Body, Envelope, Header, ParamValue, ProtoError};

/// Default bound on the wait for a correlated response.
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity and timeout settings for one client instance.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Component name stamped into every request header.
    pub caller_id: String,
    /// Address responders should reply to.
    pub response_address: String,
    pub response_port: u16,
    /// Bound on the wait for a correlated response.
    pub reply_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            caller_id: "monitor".into(),
            response_address: "127.0.0.1".into(),
            response_port: 7547,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// Client for correlated request/response exchanges over the bus.
///
/// Create via [`connect`](Self::connect); share via `Arc`.
pub struct CorrelationClient {
    options: ClientOptions,
    executor: Arc<dyn RequestExecutor>,
    /// Next correlation identifier. Wraps at `u32::MAX`; uniqueness
    /// only matters among requests still awaiting a response.
    next_correlation: AtomicU32,
    /// Waiters for in-flight requests, keyed by correlation identifier.
    pending: Mutex<HashMap<CorrelationId, oneshot::Sender<Envelope>>>,
}

impl std::fmt::Debug for CorrelationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationClient")
            .field("options", &self.options)
            .field("next_correlation", &self.next_correlation)
            .finish_non_exhaustive()
    }
}

impl CorrelationClient {
    /// Open the executor's transport and return a ready client.
    ///
    /// A transport that cannot be established is fatal to whoever is
    /// starting up on this client.
    pub async fn connect(
        executor: Arc<dyn RequestExecutor>,
        options: ClientOptions,
    ) -> Result<Arc<Self>, ClientError> {
        executor.open().await?;

        tracing::info!(caller_id = %options.caller_id, "Management bus client connected");

        Ok(Arc::new(Self {
            options,
            executor,
            next_correlation: AtomicU32::new(1),
            pending: Mutex::new(HashMap::new()),
        }))
    }

    /// Send one request and wait for its correlated response.
    ///
    /// Exactly one request per correlation identifier is in flight at a
    /// time; the identifier is released on response, timeout, or
    /// dispatch failure. There are no internal retries — callers treat
    /// a failure as a skipped cycle and try again on their own
    /// schedule.
    pub async fn send(&self, body: Body) -> Result<Envelope, ClientError> {
        let (correlation_id, waiter) = self.register();

        let envelope = Envelope {
            header: Header {
                correlation_id,
                caller_id: self.options.caller_id.clone(),
                response_address: self.options.response_address.clone(),
                response_port: self.options.response_port,
                more: false,
                response_code: 0,
            },
            body,
        };

        let frame = match envelope.encode() {
            Ok(frame) => frame,
            Err(e) => {
                self.unregister(correlation_id);
                return Err(e.into());
            }
        };

        if let Err(e) = self.executor.dispatch(frame).await {
            self.unregister(correlation_id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.options.reply_timeout, waiter).await {
            Ok(Ok(response)) => Ok(response),
            // The sender was dropped: the client was closed while this
            // request was still awaiting its response.
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                self.unregister(correlation_id);
                tracing::warn!(
                    correlation_id,
                    timeout_ms = self.options.reply_timeout.as_millis() as u64,
                    "Response wait timed out",
                );
                Err(ClientError::Timeout)
            }
        }
    }

    /// Route one inbound frame to the waiter registered for its
    /// correlation identifier.
    ///
    /// Called by the embedding system's transport reader. Frames that
    /// fail to parse, and responses whose identifier has no waiter
    /// (late replies after a timeout), are returned as errors for the
    /// reader to log; neither disturbs other in-flight requests.
    pub fn deliver(&self, frame: &[u8]) -> Result<(), ClientError> {
        let envelope = Envelope::decode(frame)?;
        let correlation_id = envelope.header.correlation_id;

        let waiter = self
            .pending
            .lock()
            .expect("pending map lock poisoned")
            .remove(&correlation_id);

        match waiter {
            Some(tx) => {
                // The waiter may have timed out between our map lookup
                // and this send; dropping the response is correct then.
                let _ = tx.send(envelope);
                Ok(())
            }
            None => Err(ClientError::UnknownCorrelation(correlation_id)),
        }
    }

    /// Query the data model and return the raw `(name, value)` pairs.
    ///
    /// A nonzero response code or a mismatched response body is an
    /// error; a wildcard that expands to zero instances is an empty,
    /// successful result.
    pub async fn get_values(
        &self,
        param_names: Vec<String>,
    ) -> Result<Vec<ParamValue>, ClientError> {
        let response = self.send(Body::GetValue { param_names }).await?;

        if !response.is_success() {
            return Err(ClientError::Failed(response.header.response_code));
        }
        if response.header.more {
            // Fragment reassembly belongs to the wire layer we do not
            // own; pass the first fragment through.
            tracing::warn!(
                correlation_id = response.header.correlation_id,
                "Fragmented get_value response; using first fragment",
            );
        }

        match response.body {
            Body::GetValueResponse { param_values } => Ok(param_values),
            _ => Err(ClientError::UnexpectedResponse(
                response.header.correlation_id,
            )),
        }
    }

    /// Issue a reset command to the device backend.
    ///
    /// Only the response code matters; the response body is ignored.
    pub async fn reset(&self, delay_seconds: i32, reset_type: i32) -> Result<(), ClientError> {
        let response = self
            .send(Body::Reset {
                delay_seconds,
                reset_type,
            })
            .await?;

        if !response.is_success() {
            return Err(ClientError::Failed(response.header.response_code));
        }
        Ok(())
    }

    /// Abandon all in-flight waits and release the transport.
    ///
    /// Waiters resolve with [`ClientError::Closed`] rather than hanging
    /// until their timeouts.
    pub async fn close(&self) {
        self.pending
            .lock()
            .expect("pending map lock poisoned")
            .clear();
        self.executor.close().await;

        tracing::info!(caller_id = %self.options.caller_id, "Management bus client closed");
    }

    // ---- private helpers ----

    /// Allocate a fresh correlation identifier and register a waiter
    /// for it.
    ///
    /// The counter wraps at `u32::MAX`; an identifier still awaiting a
    /// response is skipped so in-flight identifiers stay unique.
    fn register(&self) -> (CorrelationId, oneshot::Receiver<Envelope>) {
        let mut pending = self.pending.lock().expect("pending map lock poisoned");

        let mut id = self.next_correlation.fetch_add(1, Ordering::Relaxed);
        while pending.contains_key(&id) {
            id = self.next_correlation.fetch_add(1, Ordering::Relaxed);
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(id, tx);
        (id, rx)
    }

    /// Drop the waiter for an identifier that will get no response.
    fn unregister(&self, correlation_id: CorrelationId) {
        self.pending
            .lock()
            .expect("pending map lock poisoned")
            .remove(&correlation_id);
    }
}

/// Errors returned by [`CorrelationClient`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The underlying transport failed to open or dispatch.
    #[error("Transport error: {0}")]
    Transport(#[from] ExecutorError),

    /// No correlated response arrived within the reply timeout.
    #[error("Timed out waiting for correlated response")]
    Timeout,

    /// A message could not be encoded, or a frame could not be parsed.
    #[error(transparent)]
    Codec(#[from] ProtoError),

    /// The responder reported a nonzero response code.
    #[error("Request failed with response code {0}")]
    Failed(i32),

    /// The response body variant did not match the request.
    #[error("Unexpected response body for correlation id {0}")]
    UnexpectedResponse(CorrelationId),

    /// The client was closed while a request awaited its response.
    #[error("Client closed while awaiting response")]
    Closed,

    /// A response arrived for an identifier with no registered waiter.
    #[error("No request in flight for correlation id {0}")]
    UnknownCorrelation(CorrelationId),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
