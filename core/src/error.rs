//! Error types for the recommendation API client.
//!
//! # Design
//! `NotFound` and `InvalidAuth` get dedicated variants because callers act on
//! them differently from a generic upstream failure. Per-entity list fetches
//! never return these errors; they are folded into a
//! [`crate::NormalizedResult`] instead. Roster and health parsing do return
//! them, so setup and the roster poller can decide what to do.

/// Errors returned by `RecommendationsClient` parse methods.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// No response was received: connection refused, DNS failure, timeout.
    #[error("Cannot connect to API: {0}")]
    CannotConnect(String),

    /// The API rejected the configured key (401).
    #[error("Invalid API key")]
    InvalidAuth,

    /// The endpoint returned 404.
    #[error("Endpoint not found")]
    NotFound,

    /// Any other non-200 status, with the best message extracted from the body.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// The body could not be decoded into the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}
