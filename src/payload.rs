//! Wire payload for log events.
//!
//! Events cross the broker as a UTF-8 JSON object `{"name": ..., "data": ...}`.
//! The transport envelope tags the body as `text/plain`; the body itself is
//! JSON text.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A log event as it travels over the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    /// Logical event name ("log", "event", "auth", ...).
    pub name: String,
    /// Free-form event data.
    pub data: String,
}

impl Payload {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Decode a delivery body, degrading to an empty payload on bad input.
    ///
    /// The consume loop must survive malformed bodies, so parse failures are
    /// logged and swallowed rather than surfaced.
    pub fn from_bytes(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Malformed event body, substituting empty payload");
                Self::default()
            }
        }
    }
}
