//! Fatal server error types
//!
//! Only startup can fail hard: bad assets or an unbindable port abort the
//! process with a nonzero exit. Everything after the main loop starts is a
//! log-and-continue condition: protocol violations drop the offending
//! message, logic precondition failures drop the operation, and a tick is
//! never retried.

/// Errors that abort server startup.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Asset loading failed: missing or malformed manifest, undecodable
    /// navmap, or manifest/navmap disagreement.
    #[error("config error: {0}")]
    Config(String),

    /// The transport could not be brought up (typically a bind failure).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}
