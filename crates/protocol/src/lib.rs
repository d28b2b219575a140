//! NanoTDF Protocol Types
//!
//! This crate contains the wire-level structures for NanoTDF, including:
//! - the binary container codec (header, payload, signature)
//! - KAS (Key Access Service) request/response types
//!
//! This crate contains NO cryptographic operations and NO I/O.
//! It is purely focused on data structures and serialization.

pub mod binary;
pub mod error;
pub mod kas;
pub mod nanotdf;

// Re-export commonly used types
pub use error::ProtocolError;

pub use kas::{
    KasPublicKeyResponse, KeyAccessObjectWrapper, KeyAccessRewrapResult, KeyAccessServerList,
    NanoKeyAccess, PolicyRequest, PolicyRewrapResult, RewrapOutcome, RewrapResponse,
    SignedRewrapRequest, UnsignedRewrapRequest,
};

pub use nanotdf::{
    EccAndBindingMode, EccMode, Header, IvConvention, MagicNumberAndVersion, NanoTdf,
    NanoTdfVersion, Payload, PayloadSignatureMode, Policy, PolicyType, ResourceLocator,
    Signature, SymmetricAndPayloadConfig, SymmetricCipher,
};
