//! Management-bus message envelope and body variants.
//!
//! Every message on the bus is a fixed [`Header`] plus a [`Body`]
//! variant keyed by a `"type"` tag with associated `"data"` content.
//! The surrounding middleware owns the socket framing; this module only
//! defines the payload shape and its JSON codec.

use serde::{Deserialize, Serialize};

use axon_core::types::CorrelationId;

/// Response code signalling success. Any other value fails the request.
pub const RESPONSE_OK: i32 = 0;

/// Fixed header carried by every message on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    /// Matches a response to the request that caused it.
    pub correlation_id: CorrelationId,
    /// Component name of the requester, echoed back in responses.
    pub caller_id: String,
    /// Address the responder should deliver the reply to.
    pub response_address: String,
    pub response_port: u16,
    /// Set when a response is one fragment of a larger result.
    pub more: bool,
    /// [`RESPONSE_OK`] on success; nonzero on failure.
    pub response_code: i32,
}

/// Message body, keyed by the `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Body {
    /// Query one or more parameter paths. Paths may contain wildcard
    /// segments that the data model expands over indexed instances.
    #[serde(rename = "get_value")]
    GetValue { param_names: Vec<String> },

    /// Values returned for a `get_value` query.
    #[serde(rename = "get_value_response")]
    GetValueResponse { param_values: Vec<ParamValue> },

    /// Ask the device backend to reset the managed subsystem.
    #[serde(rename = "reset")]
    Reset { delay_seconds: i32, reset_type: i32 },
}

/// One `(name, value)` pair from a query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamValue {
    /// Fully-expanded parameter path (wildcards resolved).
    pub name: String,
    /// Raw value as reported by the data model. Numeric parsing is the
    /// consumer's concern.
    pub value: String,
}

/// A complete wire message: header plus body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub body: Body,
}

impl Envelope {
    /// Serialize to the JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>, ProtoError> {
        serde_json::to_vec(self).map_err(ProtoError::Encode)
    }

    /// Parse a frame received from the bus.
    ///
    /// Returns `Err` for malformed JSON or unknown `type` tags.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtoError> {
        serde_json::from_slice(frame).map_err(ProtoError::Decode)
    }

    /// Whether the header reports success.
    pub fn is_success(&self) -> bool {
        self.header.response_code == RESPONSE_OK
    }
}

/// Errors from the message codec.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The message could not be serialized.
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame was not a valid message.
    #[error("Failed to decode frame: {0}")]
    Decode(#[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
