//! Unified error type for the NanoTDF public API
//!
//! The protocol and crypto crates keep their domain-specific errors for
//! precise handling. This type is what SDK consumers see: one variant per
//! failure a caller can act on, grouped into categories so recoverable and
//! fatal cases can be told apart without matching every variant.
//!
//! # Example
//!
//! ```no_run
//! use nanotdf::{ErrorCategory, NanoTdfError};
//!
//! fn handle(err: &NanoTdfError) {
//!     match err.category() {
//!         ErrorCategory::Transport if err.is_retryable() => { /* try again later */ }
//!         ErrorCategory::Untrusted | ErrorCategory::Internal => { /* stop */ }
//!         _ => {}
//!     }
//! }
//! ```

use nanotdf_crypto::CryptoError;
use nanotdf_protocol::ProtocolError;
use thiserror::Error;

/// Coarse grouping of [`NanoTdfError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad or missing configuration, or client misuse
    Configuration,
    /// Container bytes or key material that cannot be processed
    Malformed,
    /// A KAS outside the allow-list
    Untrusted,
    /// Rewrap or key fetch HTTP failures
    Transport,
    /// Broken internal invariant
    Internal,
}

/// Unified error type for all NanoTDF operations
#[derive(Debug, Error)]
pub enum NanoTdfError {
    /// Bad or missing configuration, or client misuse
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed container
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// Authenticated decryption or key unwrapping failed
    #[error("Decrypt error: {0}")]
    Decrypt(String),

    /// The KAS URL is not in the allow-list
    #[error("Untrusted KAS: [{url}] is not one of [{}]", .allowed.join(", "))]
    UntrustedKas { url: String, allowed: Vec<String> },

    /// The KAS rejected the request as malformed (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or rejected credentials (HTTP 401)
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Access denied by the KAS, either by status or in a rewrap result
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        reason: String,
        required_obligations: Vec<String>,
    },

    /// Server-side failure (HTTP 5xx)
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Connection failures and unexpected responses
    #[error("Network error: {0}")]
    Network(String),

    /// Cipher, policy type or key type this implementation does not handle
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Broken internal invariant, e.g. an IV counter outside its range
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NanoTdfError {
    /// Error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::UnsupportedFeature(_) => ErrorCategory::Configuration,
            Self::InvalidFile(_) | Self::Decrypt(_) => ErrorCategory::Malformed,
            Self::UntrustedKas { .. } => ErrorCategory::Untrusted,
            Self::BadRequest(_)
            | Self::Unauthenticated(_)
            | Self::PermissionDenied { .. }
            | Self::Service { .. }
            | Self::Network(_) => ErrorCategory::Transport,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if the error is potentially retryable
    ///
    /// Only transient transport failures qualify; retrying is the
    /// caller's (or transport's) decision.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Service { .. })
    }

    /// Returns true if no retry or reconfiguration can recover
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Untrusted | ErrorCategory::Internal
        )
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION",
            Self::InvalidFile(_) => "INVALID_FILE",
            Self::Decrypt(_) => "DECRYPT",
            Self::UntrustedKas { .. } => "UNTRUSTED_KAS",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Service { .. } => "SERVICE",
            Self::Network(_) => "NETWORK",
            Self::UnsupportedFeature(_) => "UNSUPPORTED_FEATURE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::UntrustedKas { .. } => {
                Some("Add the KAS origin to allowed_kases if it is trusted")
            }
            Self::Unauthenticated(_) => Some("Check the auth provider's credentials"),
            Self::PermissionDenied { .. } => {
                Some("Verify the entity holds the attributes the policy requires")
            }
            Self::Decrypt(_) => Some("Check that the container was encrypted for this KAS"),
            Self::Service { .. } | Self::Network(_) => Some("Retry after a delay"),
            Self::Internal(_) => {
                Some("Do not share one session between concurrent tasks without a lock")
            }
            _ => None,
        }
    }

    /// Returns true if this is a malformed-container error
    pub fn is_invalid_file(&self) -> bool {
        matches!(self, Self::InvalidFile(_))
    }

    /// Returns true if this is a KAS communication error
    pub fn is_kas_error(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }
}

/// Map a failed HTTP status from a KAS endpoint to an error
pub fn error_from_status(status: u16, url: &str, body: &str) -> NanoTdfError {
    match status {
        400 => NanoTdfError::BadRequest(format!("400 for [{}]: [{}]", url, body)),
        401 => NanoTdfError::Unauthenticated(format!("401 for [{}]", url)),
        403 => NanoTdfError::PermissionDenied {
            reason: format!("403 for [{}]", url),
            required_obligations: Vec::new(),
        },
        500..=599 => NanoTdfError::Service {
            status,
            message: format!("[{}]: [{}]", url, body),
        },
        _ => NanoTdfError::Network(format!("{} => {}", url, status)),
    }
}

impl From<ProtocolError> for NanoTdfError {
    fn from(err: ProtocolError) -> Self {
        if err.is_malformed_input() {
            NanoTdfError::InvalidFile(err.to_string())
        } else {
            NanoTdfError::Configuration(err.to_string())
        }
    }
}

impl From<CryptoError> for NanoTdfError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Protocol(e) => e.into(),
            CryptoError::IncompleteKey(_)
            | CryptoError::InvalidPrivateKey(_)
            | CryptoError::Pem(_) => NanoTdfError::Configuration(err.to_string()),
            CryptoError::InvalidPublicKey(_) => NanoTdfError::InvalidFile(err.to_string()),
            CryptoError::DecryptionFailed
            | CryptoError::CiphertextTooShort { .. }
            | CryptoError::InvalidTagLength { .. } => NanoTdfError::Decrypt(err.to_string()),
            CryptoError::UnsupportedCipher(_) | CryptoError::UnsupportedPolicyType(_) => {
                NanoTdfError::UnsupportedFeature(err.to_string())
            }
            _ => NanoTdfError::Internal(err.to_string()),
        }
    }
}
