//! NanoTDF encryption
//!
//! - `nanotdf_crypto`: AES-256-GCM with NanoTDF tag and nonce sizes
//! - `binding`: GMAC-digest and ECDSA policy bindings
//! - `nanotdf`: header construction, payload encryption and decryption

pub mod binding;
pub mod nanotdf;
pub mod nanotdf_crypto;

pub use binding::{
    ecdsa_binding, gmac_binding, policy_binding, verify_ecdsa_binding, verify_gmac_binding,
    verify_header_binding,
};
pub use nanotdf::{
    build_header, decrypt_payload, decrypt_policy, encrypt_payload, encrypt_single,
    encrypt_with_header, kas_derive_key, HeaderOptions,
};
pub use nanotdf_crypto::{decrypt, encrypt, TagSize};
