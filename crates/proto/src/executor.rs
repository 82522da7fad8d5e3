//! Boundary to the middleware's request executor.
//!
//! The surrounding system owns the task queue and the socket transport;
//! this crate only needs submit-and-eventually-deliver semantics. The
//! trait is implemented by the embedding middleware in production and
//! by scripted doubles in tests.

use async_trait::async_trait;

/// Accepts serialized request frames for asynchronous dispatch.
///
/// `open` is called once before the first dispatch and must fail when
/// the underlying transport cannot be established — monitor startup
/// treats that as fatal. `close` releases the transport during
/// shutdown.
#[async_trait]
pub trait RequestExecutor: Send + Sync + 'static {
    /// Establish the underlying transport.
    async fn open(&self) -> Result<(), ExecutorError>;

    /// Queue one serialized frame for delivery to the backend.
    async fn dispatch(&self, frame: Vec<u8>) -> Result<(), ExecutorError>;

    /// Release the transport. Best-effort; called once during shutdown.
    async fn close(&self);
}

/// Errors surfaced by an executor implementation.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The transport could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The frame could not be queued or written.
    #[error("Dispatch error: {0}")]
    Dispatch(String),
}
