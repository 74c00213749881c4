//! Error taxonomy for VAPID signing and push dispatch.
//!
//! Configuration problems (bad key material) are reported eagerly and are
//! fatal for a whole batch. Everything that can go wrong with a single
//! subscription is recorded on that subscription's result row instead of
//! being returned from the batch call.

use thiserror::Error;

/// Which half of the VAPID key pair an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// The 65-byte uncompressed public point.
    Public,
    /// The 32-byte private scalar.
    Private,
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

/// Errors produced by the push library.
#[derive(Debug, Error)]
pub enum PushError {
    /// Input was not valid base64url.
    #[error("Invalid base64url: {0}")]
    Decode(#[from] base64::DecodeError),

    /// VAPID key has the wrong shape.
    #[error("VAPID {kind} key must be {expected}, got {found}")]
    InvalidKey {
        /// Which key failed validation.
        kind: KeyKind,
        /// What the key should look like.
        expected: &'static str,
        /// What was actually supplied.
        found: String,
    },

    /// Private scalar does not derive the supplied public key.
    #[error("VAPID private key does not match the configured public key")]
    KeyMismatch,

    /// ECDSA signature was not a well-formed DER SEQUENCE of two INTEGERs.
    #[error("Invalid DER signature: {0}")]
    InvalidSignatureFormat(String),

    /// The signing primitive itself failed.
    #[error("VAPID signing failed: {0}")]
    Signing(String),

    /// Claims could not be serialized.
    #[error("Failed to serialize JWT segment: {0}")]
    Json(#[from] serde_json::Error),

    /// Subscription endpoint is not an absolute http(s) URL with a host.
    #[error("Invalid push endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The offending endpoint string.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Configured token lifetime is outside what push services accept.
    #[error("VAPID token expiry must be between 1 and {max} seconds, got {found}")]
    InvalidExpiry {
        /// Upper bound in seconds.
        max: i64,
        /// Configured value in seconds.
        found: i64,
    },
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, PushError>;
