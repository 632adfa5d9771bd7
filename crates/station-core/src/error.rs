use thiserror::Error;

/// Errors surfaced by the upstream content and calendar clients.
///
/// There is deliberately no transient/permanent split and no retry policy:
/// callers either propagate or render a generic failure.
#[derive(Debug, Error)]
pub enum StationError {
    /// Upstream returned a non-2xx status.
    #[error("upstream returned {status} for {url}")]
    Http { status: u16, url: String },

    /// Network-level failure (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response body did not match the expected envelope.
    #[error("response parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StationError>;
