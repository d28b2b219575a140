//! Single-use NanoTDF client
//!
//! One client encrypts exactly one container (IV 1 under a DEK derived from
//! the client's ephemeral key) and decrypts any number, rewrapping on every
//! call unless a [`RewrapCache`] is attached.

use crate::auth::AuthProvider;
use crate::cache::RewrapCache;
use crate::config::{ClientConfig, EncryptOptions};
use crate::error::NanoTdfError;
use crate::kas::{RewrapClient, CLIENT_VERSION};
use crate::kas_key::{fetch_ec_kas_pub_key, KasPublicKeyInfo};
use crate::policy::{AttributeObject, Policy, PolicyBuilder};
use crate::transport::KasTransport;
use nanotdf_crypto::{build_header, decrypt_payload, encrypt_with_header, SDK_INITIAL_RELEASE};
use nanotdf_protocol::{NanoTdf, ResourceLocator};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::warn;

/// Policy over `attributes` and `dissem`, warning when it restricts nothing
pub(crate) fn build_policy(kas: &KasPublicKeyInfo, attributes: &[String], dissem: &[String]) -> Policy {
    let policy = attributes
        .iter()
        .fold(PolicyBuilder::new(), |builder, fqn| {
            builder.attribute(AttributeObject::new(fqn.as_str(), kas))
        })
        .dissem(dissem.iter().cloned())
        .build();
    if policy.is_unrestricted() {
        warn!(
            "policy has an empty attributes list and an empty dissemination list; \
             any entity with a valid entity object can access this TDF"
        );
    }
    policy
}

/// KAS locator for a header, carrying the key id when the KAS has one
pub(crate) fn kas_locator(kas: &KasPublicKeyInfo) -> Result<ResourceLocator, NanoTdfError> {
    Ok(ResourceLocator::from_url(&kas.url, kas.kid.as_deref())?)
}

/// Single-use NanoTDF client
///
/// # Example
///
/// ```no_run
/// use nanotdf::{BearerAuthProvider, ClientConfig, EncryptOptions, NanoTdfClient, ReqwestTransport};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), nanotdf::NanoTdfError> {
/// let config = ClientConfig::new("https://kas.example.com/kas")
///     .with_allowed_kases(["https://kas.example.com"]);
/// let mut client = NanoTdfClient::new(
///     config,
///     Arc::new(BearerAuthProvider::new("token")),
///     Arc::new(ReqwestTransport::new()?),
/// )?;
/// client.add_dissem(["alice@example.com"]);
///
/// let container = client.encrypt(b"hello world", &EncryptOptions::default()).await?;
/// let plaintext = client.decrypt(&container).await?;
/// assert_eq!(plaintext, b"hello world");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct NanoTdfClient {
    rewrap: RewrapClient,
    /// IV of the one container this client may encrypt
    iv: Option<u32>,
    kas_public_key: OnceCell<KasPublicKeyInfo>,
    data_attributes: Vec<String>,
    dissem: Vec<String>,
    cache: Option<Arc<RewrapCache>>,
}

impl NanoTdfClient {
    pub fn new(
        config: ClientConfig,
        auth: Arc<dyn AuthProvider>,
        transport: Arc<dyn KasTransport>,
    ) -> Result<Self, NanoTdfError> {
        Ok(Self::from_rewrap_client(RewrapClient::new(
            config, auth, transport,
        )?))
    }

    pub fn from_rewrap_client(rewrap: RewrapClient) -> Self {
        Self {
            rewrap,
            iv: Some(1),
            kas_public_key: OnceCell::new(),
            data_attributes: Vec::new(),
            dissem: Vec::new(),
            cache: None,
        }
    }

    /// Reuse DEKs across decrypts of containers sharing an ephemeral key
    #[must_use]
    pub fn with_rewrap_cache(mut self, cache: Arc<RewrapCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Skip the KAS public key fetch
    #[must_use]
    pub fn with_kas_public_key(mut self, info: KasPublicKeyInfo) -> Self {
        self.kas_public_key = OnceCell::from(info);
        self
    }

    pub fn rewrap_client(&self) -> &RewrapClient {
        &self.rewrap
    }

    /// Add a data attribute FQN to the policy
    pub fn add_attribute(&mut self, fqn: impl Into<String>) {
        self.data_attributes.push(fqn.into());
    }

    /// Add entities to the policy's dissemination list
    pub fn add_dissem<I, S>(&mut self, entities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dissem.extend(entities.into_iter().map(Into::into));
    }

    /// KAS EC public key, fetched once
    pub async fn kas_public_key(&self) -> Result<&KasPublicKeyInfo, NanoTdfError> {
        self.kas_public_key
            .get_or_try_init(|| {
                fetch_ec_kas_pub_key(self.rewrap.transport(), &self.rewrap.config().kas_endpoint)
            })
            .await
    }

    /// Encrypt `data` into a new container
    ///
    /// Only the first call succeeds; later calls are a configuration error.
    pub async fn encrypt(
        &mut self,
        data: &[u8],
        options: &EncryptOptions,
    ) -> Result<Vec<u8>, NanoTdfError> {
        let iv = self.iv.take().ok_or_else(|| {
            NanoTdfError::Configuration(
                "NanoTDF clients are single use. Please generate a new client and keypair."
                    .to_string(),
            )
        })?;

        let kas = self.kas_public_key().await?;
        let policy = build_policy(kas, &self.data_attributes, &self.dissem).to_json()?;
        let (header, dek) = build_header(
            kas_locator(kas)?,
            &kas.key()?,
            self.rewrap.ephemeral_key_pair(),
            &policy,
            &options.header_options(),
        )?;
        let tdf = encrypt_with_header(&dek, &header, iv, data)?;
        Ok(tdf.to_bytes()?)
    }

    /// Decrypt a container, rewrapping its key
    pub async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, NanoTdfError> {
        let tdf = NanoTdf::from_bytes(ciphertext)?;
        self.decrypt_container(&tdf, CLIENT_VERSION).await
    }

    /// Decrypt a pre-1.0 container (3-byte payload nonce, 3-byte wrapped-key IV)
    pub async fn decrypt_legacy(&self, ciphertext: &[u8]) -> Result<Vec<u8>, NanoTdfError> {
        let tdf = NanoTdf::from_bytes_legacy(ciphertext)?;
        self.decrypt_container(&tdf, SDK_INITIAL_RELEASE).await
    }

    async fn decrypt_container(
        &self,
        tdf: &NanoTdf,
        client_version: &str,
    ) -> Result<Vec<u8>, NanoTdfError> {
        let ephemeral_key = &tdf.header.ephemeral_public_key;
        if let Some(dek) = self.cache.as_ref().and_then(|cache| cache.get(ephemeral_key)) {
            return Ok(decrypt_payload(&dek, tdf)?);
        }

        let result = self.rewrap.rewrap_header(&tdf.header, client_version).await?;
        if let Some(cache) = &self.cache {
            cache.set(ephemeral_key.clone(), result.key.clone());
        }
        Ok(decrypt_payload(&result.key, tdf)?)
    }
}
