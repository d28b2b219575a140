//! Client, dataset, cache and encryption settings
//!
//! Plain structs with builder-style setters. The serializable ones read
//! durations as milliseconds.

use crate::error::NanoTdfError;
use nanotdf_crypto::HeaderOptions;
use nanotdf_protocol::{PolicyType, SymmetricCipher};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Upper bound on records encrypted under one dataset DEK
///
/// IVs run `1..=0xFFFFFF` with 0 reserved for the policy.
pub const MAX_KEY_ITERATIONS: u32 = 8_388_606;

/// Default eviction age for cached DEKs
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_millis(300_000);

/// Default sweep interval of the DEK cache
pub const DEFAULT_CACHE_POLL_INTERVAL: Duration = Duration::from_millis(500);

mod duration_ms {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Settings shared by every client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// KAS used for encryption
    pub kas_endpoint: String,
    /// Platform base URL, used to list registered key access servers
    pub platform_url: Option<String>,
    /// KAS URLs trusted for rewrap; compared by origin
    pub allowed_kases: Vec<String>,
    /// Trust every KAS
    pub ignore_allow_list: bool,
    /// Obligation FQNs this client can fulfil, forwarded on rewrap
    pub fulfillable_obligation_fqns: Vec<String>,
    /// Whether the auth provider binds tokens to the signer key
    pub dpop_enabled: bool,
}

impl ClientConfig {
    pub fn new(kas_endpoint: impl Into<String>) -> Self {
        Self {
            kas_endpoint: kas_endpoint.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_platform_url(mut self, url: impl Into<String>) -> Self {
        self.platform_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_allowed_kases<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_kases = urls.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_ignore_allow_list(mut self, ignore: bool) -> Self {
        self.ignore_allow_list = ignore;
        self
    }

    #[must_use]
    pub fn with_fulfillable_obligations<I, S>(mut self, fqns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fulfillable_obligation_fqns = fqns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_dpop(mut self, enabled: bool) -> Self {
        self.dpop_enabled = enabled;
        self
    }

    /// Reject configurations no client can work with
    pub fn validate(&self) -> Result<(), NanoTdfError> {
        if self.kas_endpoint.trim().is_empty() {
            return Err(NanoTdfError::Configuration(
                "please specify kas_endpoint".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for a [`DatasetSession`](crate::DatasetSession)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    #[serde(flatten)]
    pub client: ClientConfig,
    /// Records per DEK; `None` means [`MAX_KEY_ITERATIONS`]
    pub max_key_iterations: Option<u32>,
}

impl DatasetConfig {
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            max_key_iterations: None,
        }
    }

    #[must_use]
    pub fn with_max_key_iterations(mut self, iterations: u32) -> Self {
        self.max_key_iterations = Some(iterations);
        self
    }

    /// Effective iteration limit
    pub fn key_iterations(&self) -> Result<u32, NanoTdfError> {
        match self.max_key_iterations {
            None => Ok(MAX_KEY_ITERATIONS),
            Some(0) => Err(NanoTdfError::Configuration(
                "key iterations must be at least 1".to_string(),
            )),
            Some(n) if n > MAX_KEY_ITERATIONS => Err(NanoTdfError::Configuration(format!(
                "key iteration exceeds max iterations({})",
                MAX_KEY_ITERATIONS
            ))),
            Some(n) => Ok(n),
        }
    }
}

/// Settings for a [`RewrapCache`](crate::RewrapCache)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries idle longer than this are evicted
    #[serde(with = "duration_ms")]
    pub max_age: Duration,
    /// Sweep period
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Disable caching entirely
    pub bypass: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_CACHE_MAX_AGE,
            poll_interval: DEFAULT_CACHE_POLL_INTERVAL,
            bypass: false,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn bypassed() -> Self {
        Self {
            bypass: true,
            ..Self::default()
        }
    }
}

/// Per-container encryption choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptOptions {
    /// Sign the policy with ECDSA instead of the GMAC digest
    pub ecdsa_binding: bool,
    pub symmetric_cipher: SymmetricCipher,
    pub policy_type: PolicyType,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        let defaults = HeaderOptions::default();
        Self {
            ecdsa_binding: defaults.use_ecdsa_binding,
            symmetric_cipher: defaults.symmetric_cipher,
            policy_type: defaults.policy_type,
        }
    }
}

impl EncryptOptions {
    #[must_use]
    pub fn with_ecdsa_binding(mut self, enabled: bool) -> Self {
        self.ecdsa_binding = enabled;
        self
    }

    #[must_use]
    pub fn with_cipher(mut self, cipher: SymmetricCipher) -> Self {
        self.symmetric_cipher = cipher;
        self
    }

    #[must_use]
    pub fn with_policy_type(mut self, policy_type: PolicyType) -> Self {
        self.policy_type = policy_type;
        self
    }

    pub(crate) fn header_options(&self) -> HeaderOptions {
        HeaderOptions {
            use_ecdsa_binding: self.ecdsa_binding,
            symmetric_cipher: self.symmetric_cipher,
            policy_type: self.policy_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_iterations() {
        let config = DatasetConfig::new(ClientConfig::new("https://kas.example.com/kas"));
        assert_eq!(config.key_iterations().unwrap(), MAX_KEY_ITERATIONS);

        let config = config.with_max_key_iterations(10);
        assert_eq!(config.key_iterations().unwrap(), 10);

        let too_many = DatasetConfig::default().with_max_key_iterations(MAX_KEY_ITERATIONS + 1);
        assert!(matches!(
            too_many.key_iterations(),
            Err(NanoTdfError::Configuration(_))
        ));

        let zero = DatasetConfig::default().with_max_key_iterations(0);
        assert!(zero.key_iterations().is_err());
    }

    #[test]
    fn test_cache_config_from_millis() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"max_age": 1000, "poll_interval": 50}"#).unwrap();
        assert_eq!(config.max_age, Duration::from_secs(1));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert!(!config.bypass);

        let defaults: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, CacheConfig::default());
        assert_eq!(defaults.max_age, Duration::from_millis(300_000));
    }

    #[test]
    fn test_dataset_config_flattens_client() {
        let config: DatasetConfig = serde_json::from_str(
            r#"{"kas_endpoint": "https://kas.example.com/kas", "max_key_iterations": 5}"#,
        )
        .unwrap();
        assert_eq!(config.client.kas_endpoint, "https://kas.example.com/kas");
        assert_eq!(config.key_iterations().unwrap(), 5);
    }

    #[test]
    fn test_empty_kas_endpoint() {
        assert!(ClientConfig::default().validate().is_err());
        assert!(ClientConfig::new("https://kas.example.com").validate().is_ok());
    }

    #[test]
    fn test_encrypt_option_defaults() {
        let options = EncryptOptions::default();
        assert!(!options.ecdsa_binding);
        assert_eq!(options.symmetric_cipher, SymmetricCipher::Aes256Gcm128);
        assert_eq!(options.policy_type, PolicyType::EmbeddedEncrypted);
    }
}
