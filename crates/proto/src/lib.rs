//! Management-bus protocol client library.
//!
//! Provides the typed message envelope, the boundary trait to the
//! middleware's request executor, and the correlated request/response
//! client that the threshold monitor samples through.

pub mod client;
pub mod executor;
pub mod message;

pub use client::{ClientError, ClientOptions, CorrelationClient};
pub use executor::{ExecutorError, RequestExecutor};
pub use message::{Body, Envelope, Header, ParamValue};
