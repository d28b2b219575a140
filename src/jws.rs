//! Rewrap request signing
//!
//! The KAS expects a compact JWS whose `requestBody` claim is the unsigned
//! request serialized as a string. The signer key is separate from the
//! ephemeral ECDH key and never touches payload data.

use crate::error::NanoTdfError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use nanotdf_crypto::p256::ecdsa::signature::Signer as _;
use nanotdf_crypto::EcKeyPair;
use rand::rngs::OsRng;
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::json;
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifetime of a signed request token in seconds
pub const TOKEN_LIFETIME_SECS: u64 = 60;

/// Key that signs rewrap requests
#[derive(Clone)]
pub enum RequestSigner {
    Rsa {
        private_key: RsaPrivateKey,
        public_key_pem: String,
    },
    Ec {
        key_pair: EcKeyPair,
        public_key_pem: String,
    },
}

impl RequestSigner {
    /// RSA-2048 signer
    pub fn generate() -> Result<Self, NanoTdfError> {
        Self::generate_rsa(2048)
    }

    pub fn generate_rsa(bits: usize) -> Result<Self, NanoTdfError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| {
            NanoTdfError::Configuration(format!("RSA key generation failed: {}", e))
        })?;
        Self::from_rsa(private_key)
    }

    pub fn generate_ec() -> Result<Self, NanoTdfError> {
        Self::from_ec(EcKeyPair::generate())
    }

    pub fn from_rsa(private_key: RsaPrivateKey) -> Result<Self, NanoTdfError> {
        let public_key_pem = RsaPublicKey::from(&private_key)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| NanoTdfError::Configuration(e.to_string()))?;
        let signer = RequestSigner::Rsa {
            private_key,
            public_key_pem,
        };
        signer.algorithm()?;
        Ok(signer)
    }

    pub fn from_ec(key_pair: EcKeyPair) -> Result<Self, NanoTdfError> {
        let public_key_pem = key_pair.public_key_pem()?;
        Ok(RequestSigner::Ec {
            key_pair,
            public_key_pem,
        })
    }

    /// JWS `alg` for this key
    pub fn algorithm(&self) -> Result<&'static str, NanoTdfError> {
        match self {
            RequestSigner::Ec { .. } => Ok("ES256"),
            RequestSigner::Rsa { private_key, .. } => match private_key.size() * 8 {
                2048 => Ok("RS256"),
                3072 => Ok("RS384"),
                4096 => Ok("RS512"),
                bits => Err(NanoTdfError::Configuration(format!(
                    "unsupported key algorithm RSA-{}",
                    bits
                ))),
            },
        }
    }

    pub fn public_key_pem(&self) -> &str {
        match self {
            RequestSigner::Rsa { public_key_pem, .. } => public_key_pem,
            RequestSigner::Ec { public_key_pem, .. } => public_key_pem,
        }
    }

    fn sign_bytes(&self, alg: &str, data: &[u8]) -> Vec<u8> {
        match self {
            RequestSigner::Ec { key_pair, .. } => {
                let signature: nanotdf_crypto::p256::ecdsa::Signature =
                    key_pair.signing_key().sign(data);
                signature.to_bytes().to_vec()
            }
            RequestSigner::Rsa { private_key, .. } => match alg {
                "RS384" => RsaSigningKey::<Sha384>::new(private_key.clone())
                    .sign(data)
                    .to_vec(),
                "RS512" => RsaSigningKey::<Sha512>::new(private_key.clone())
                    .sign(data)
                    .to_vec(),
                _ => RsaSigningKey::<Sha256>::new(private_key.clone())
                    .sign(data)
                    .to_vec(),
            },
        }
    }

    /// Compact JWS over `{requestBody, iat, exp}`
    pub fn sign_request(&self, request_body: &str) -> Result<String, NanoTdfError> {
        let alg = self.algorithm()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| NanoTdfError::Internal(format!("system clock: {}", e)))?
            .as_secs();

        let header = json!({ "alg": alg, "typ": "JWT" });
        // requestBody is a string, not a nested object
        let claims = json!({
            "requestBody": request_body,
            "iat": now,
            "exp": now + TOKEN_LIFETIME_SECS
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let signature = self.sign_bytes(alg, signing_input.as_bytes());
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }
}

impl fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            RequestSigner::Rsa { .. } => "Rsa",
            RequestSigner::Ec { .. } => "Ec",
        };
        f.debug_struct("RequestSigner")
            .field("kind", &kind)
            .field("public_key_pem", &self.public_key_pem())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanotdf_crypto::p256::ecdsa::signature::Verifier;
    use nanotdf_crypto::p256::ecdsa::{Signature, VerifyingKey};
    use serde_json::Value;

    fn decode_part(part: &str) -> Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    #[test]
    fn test_es256_token() {
        let key_pair = EcKeyPair::generate();
        let signer = RequestSigner::from_ec(key_pair.clone()).unwrap();
        assert_eq!(signer.algorithm().unwrap(), "ES256");

        let token = signer.sign_request(r#"{"algorithm":"ec:secp256r1"}"#).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode_part(parts[0]);
        assert_eq!(header["alg"], "ES256");
        assert_eq!(header["typ"], "JWT");

        let claims = decode_part(parts[1]);
        assert_eq!(claims["requestBody"], r#"{"algorithm":"ec:secp256r1"}"#);
        let iat = claims["iat"].as_u64().unwrap();
        assert_eq!(claims["exp"].as_u64().unwrap(), iat + TOKEN_LIFETIME_SECS);

        let signature = Signature::from_slice(&URL_SAFE_NO_PAD.decode(parts[2]).unwrap()).unwrap();
        let verifying_key = VerifyingKey::from(&key_pair.signing_key());
        let signing_input = format!("{}.{}", parts[0], parts[1]);
        assert!(verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .is_ok());
    }

    #[test]
    fn test_rs256_token() {
        let signer = RequestSigner::generate().unwrap();
        assert_eq!(signer.algorithm().unwrap(), "RS256");
        assert!(signer.public_key_pem().starts_with("-----BEGIN PUBLIC KEY-----"));

        let token = signer.sign_request("{}").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(decode_part(parts[0])["alg"], "RS256");
        assert_eq!(URL_SAFE_NO_PAD.decode(parts[2]).unwrap().len(), 256);
    }

    #[test]
    fn test_unsupported_rsa_size() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        assert!(matches!(
            RequestSigner::from_rsa(private_key),
            Err(NanoTdfError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let signer = RequestSigner::generate_ec().unwrap();
        assert!(format!("{:?}", signer).contains("[REDACTED]"));
    }
}
