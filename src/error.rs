//! Error types for the wraith crate.

use std::io;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing fingerprints or performing requests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed JA3/JA4R/H2-settings string; names the field that failed.
    #[error("parse error in {field}: {detail}")]
    Parse { field: &'static str, detail: String },

    /// Fingerprint names an extension ID the catalog cannot resolve.
    #[error("unknown extension ID {0}")]
    UnknownExtension(u16),

    /// TLS version token outside TLS 1.0-1.3.
    #[error("unsupported TLS version token {0}")]
    UnsupportedVersion(u16),

    /// TCP/UDP dial failed.
    #[error("dial error: {0}")]
    Dial(String),

    /// TLS or QUIC handshake failed. `retriable` marks the
    /// "unsupported curve" sub-case.
    #[error("handshake error: {message}")]
    Handshake { message: String, retriable: bool },

    /// ALPN mismatch or invalid framing from the transport.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The caller-supplied deadline elapsed.
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// TLS configuration error outside the handshake itself.
    #[error("TLS error: {0}")]
    Tls(String),

    /// QUIC/HTTP3 error.
    #[error("QUIC error: {0}")]
    Quic(String),

    /// Decompression error.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a parse error for a named field.
    pub fn parse(field: &'static str, detail: impl Into<String>) -> Self {
        Self::Parse {
            field,
            detail: detail.into(),
        }
    }

    /// Create a dial error.
    pub fn dial(message: impl Into<String>) -> Self {
        Self::Dial(message.into())
    }

    /// Create a handshake error, marking the known "unsupported curve"
    /// failure as retriable.
    pub fn handshake(message: impl Into<String>) -> Self {
        let message = message.into();
        let retriable = message.contains("unsupported curve");
        Self::Handshake { message, retriable }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a TLS error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a QUIC error.
    pub fn quic(message: impl Into<String>) -> Self {
        Self::Quic(message.into())
    }

    /// Whether a retry of the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Handshake { retriable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_curve_is_retriable() {
        let err = Error::handshake("tls: CurvePreferences includes unsupported curve");
        assert!(err.is_retriable());

        let err = Error::handshake("certificate expired");
        assert!(!err.is_retriable());
    }
}
