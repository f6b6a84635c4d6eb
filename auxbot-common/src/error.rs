// ================================================================
// File: auxbot-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    // Controller-side lifecycle failures:
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    #[error("Registration error: {0}")]
    Registration(String),

    /// One or more delete calls failed. `message` is the first failure seen;
    /// every step was still attempted before this was returned.
    #[error("Reclamation error for worker {worker}: {message}")]
    Reclamation { worker: String, message: String },

    /// Non-2xx answer from the cluster API.
    #[error("Cluster API error ({status}): {message}")]
    Cluster { status: u16, message: String },

    // Worker-side playback failures:
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Audio sink error: {0}")]
    Sink(String),

    #[error("Voice connection error: {0}")]
    Voice(String),

    #[error("Invalid playback transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Tonic transport error: {0}")]
    Tonic(#[from] tonic::transport::Error),

    #[error("gRPC status error: {0}")]
    GrpcStatus(#[from] tonic::Status),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// True for failures of a Player/Health/Lifecycle call itself (transport
    /// down, deadline hit, non-OK status) as opposed to a domain failure.
    pub fn is_rpc(&self) -> bool {
        matches!(
            self,
            Error::Tonic(_) | Error::GrpcStatus(_) | Error::Timeout(_) | Error::InvalidUri(_)
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<http_uri::InvalidUri> for Error {
    fn from(err: http_uri::InvalidUri) -> Self {
        Error::InvalidUri(err.to_string())
    }
}

// tonic re-exports the `http` crate; no need for a direct dependency.
mod http_uri {
    pub use tonic::codegen::http::uri::InvalidUri;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_errors_are_classified() {
        assert!(Error::GrpcStatus(tonic::Status::unavailable("down")).is_rpc());
        assert!(!Error::Fetch("yt-dlp exited with code 1".into()).is_rpc());
        assert!(!Error::Reclamation { worker: "w".into(), message: "boom".into() }.is_rpc());
    }

    #[test]
    fn string_conversion_lands_in_parse() {
        let e: Error = "bad label".into();
        assert!(matches!(e, Error::Parse(ref s) if s == "bad label"));
    }
}
