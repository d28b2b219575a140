//! Dataset sessions: one DEK and header across many records
//!
//! Encrypting a collection with a fresh header per record would cost one
//! rewrap per record on the consumer side. A dataset session instead derives
//! one DEK, builds one header, and encrypts up to `max_key_iterations`
//! records with IVs `1, 2, ...` before rotating to a new ephemeral key.
//! Consumers cache the DEK of the last ephemeral key they rewrapped.
//!
//! A session is not safe for concurrent use; the IV counter is plain state.

use crate::auth::AuthProvider;
use crate::client::{build_policy, kas_locator};
use crate::config::{DatasetConfig, EncryptOptions};
use crate::error::NanoTdfError;
use crate::kas::{RewrapClient, CLIENT_VERSION};
use crate::kas_key::{fetch_ec_kas_pub_key, KasPublicKeyInfo};
use crate::transport::KasTransport;
use nanotdf_crypto::{build_header, decrypt_payload, encrypt_with_header, AesKey, EcKeyPair};
use nanotdf_protocol::nanotdf::MAX_PAYLOAD_LENGTH;
use nanotdf_protocol::{Header, NanoTdf};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Encryption state of a dataset session
pub enum SessionState {
    /// No DEK yet; the next encrypt derives one
    Fresh,
    /// `counter` records have been encrypted under `dek`
    Active {
        dek: AesKey,
        header: Header,
        counter: u32,
    },
    /// An IV invariant was violated; the session cannot encrypt again
    Exhausted,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Fresh => f.write_str("Fresh"),
            SessionState::Active { counter, .. } => f
                .debug_struct("Active")
                .field("counter", counter)
                .finish_non_exhaustive(),
            SessionState::Exhausted => f.write_str("Exhausted"),
        }
    }
}

/// Dataset encrypt/decrypt session
pub struct DatasetSession {
    rewrap: RewrapClient,
    max_key_iterations: u32,
    options: EncryptOptions,
    state: SessionState,
    /// Key pair the next header is built with
    ephemeral: EcKeyPair,
    kas_public_key: Option<KasPublicKeyInfo>,
    data_attributes: Vec<String>,
    dissem: Vec<String>,
    /// Ephemeral public key and DEK of the last rewrap
    decrypt_key: Option<(Vec<u8>, AesKey)>,
}

impl DatasetSession {
    pub fn new(
        config: DatasetConfig,
        auth: Arc<dyn AuthProvider>,
        transport: Arc<dyn KasTransport>,
    ) -> Result<Self, NanoTdfError> {
        let max_key_iterations = config.key_iterations()?;
        let rewrap = RewrapClient::new(config.client, auth, transport)?;
        Ok(Self::with_rewrap_client(rewrap, max_key_iterations))
    }

    /// Session over an existing rewrap client
    ///
    /// `max_key_iterations` is expected to have been validated with
    /// [`DatasetConfig::key_iterations`].
    pub fn with_rewrap_client(rewrap: RewrapClient, max_key_iterations: u32) -> Self {
        let ephemeral = rewrap.ephemeral_key_pair().clone();
        Self {
            rewrap,
            max_key_iterations,
            options: EncryptOptions::default(),
            state: SessionState::Fresh,
            ephemeral,
            kas_public_key: None,
            data_attributes: Vec::new(),
            dissem: Vec::new(),
            decrypt_key: None,
        }
    }

    /// Options for headers built from now on
    #[must_use]
    pub fn with_options(mut self, options: EncryptOptions) -> Self {
        self.options = options;
        self
    }

    /// Skip the KAS public key fetch
    #[must_use]
    pub fn with_kas_public_key(mut self, info: KasPublicKeyInfo) -> Self {
        self.kas_public_key = Some(info);
        self
    }

    pub fn add_attribute(&mut self, fqn: impl Into<String>) {
        self.data_attributes.push(fqn.into());
    }

    pub fn add_dissem<I, S>(&mut self, entities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dissem.extend(entities.into_iter().map(Into::into));
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn max_key_iterations(&self) -> u32 {
        self.max_key_iterations
    }

    pub fn rewrap_client(&self) -> &RewrapClient {
        &self.rewrap
    }

    async fn kas_public_key(&mut self) -> Result<KasPublicKeyInfo, NanoTdfError> {
        if let Some(info) = &self.kas_public_key {
            return Ok(info.clone());
        }
        let info =
            fetch_ec_kas_pub_key(self.rewrap.transport(), &self.rewrap.config().kas_endpoint)
                .await?;
        self.kas_public_key = Some(info.clone());
        Ok(info)
    }

    /// Derive a DEK and header for the current ephemeral key
    async fn start_key(&mut self) -> Result<(), NanoTdfError> {
        let kas = self.kas_public_key().await?;
        let policy = build_policy(&kas, &self.data_attributes, &self.dissem).to_json()?;
        let (header, dek) = build_header(
            kas_locator(&kas)?,
            &kas.key()?,
            &self.ephemeral,
            &policy,
            &self.options.header_options(),
        )?;
        self.state = SessionState::Active {
            dek,
            header,
            counter: 0,
        };
        Ok(())
    }

    /// Encrypt one record
    pub async fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, NanoTdfError> {
        if matches!(self.state, SessionState::Fresh) {
            self.start_key().await?;
        }

        let max_key_iterations = self.max_key_iterations;
        let (tdf, rotate) = match &mut self.state {
            SessionState::Active {
                dek,
                header,
                counter,
            } => {
                let iv = counter.checked_add(1).unwrap_or(0);
                if iv == 0 || iv > MAX_PAYLOAD_LENGTH || iv > max_key_iterations {
                    self.state = SessionState::Exhausted;
                    return Err(NanoTdfError::Internal(format!(
                        "invalid state: iv {} outside 1..={}",
                        iv, max_key_iterations
                    )));
                }
                let tdf = encrypt_with_header(dek, header, iv, data)?;
                *counter = iv;
                (tdf, iv == max_key_iterations)
            }
            SessionState::Exhausted => {
                return Err(NanoTdfError::Internal(
                    "dataset session is exhausted".to_string(),
                ));
            }
            SessionState::Fresh => {
                return Err(NanoTdfError::Internal(
                    "invalid dataset session: no key".to_string(),
                ));
            }
        };

        if rotate {
            info!(
                iterations = max_key_iterations,
                "dataset key iterations reached; rotating key"
            );
            self.state = SessionState::Fresh;
            self.ephemeral = EcKeyPair::generate();
        }
        Ok(tdf.to_bytes()?)
    }

    /// Decrypt one record
    ///
    /// Records sharing the ephemeral key of the last rewrap reuse its DEK.
    /// A failed rewrap leaves that cached key in place.
    pub async fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, NanoTdfError> {
        let tdf = NanoTdf::from_bytes(ciphertext)?;

        if let Some((ephemeral_key, dek)) = &self.decrypt_key {
            if ephemeral_key == &tdf.header.ephemeral_public_key {
                debug!("reusing dataset DEK");
                return Ok(decrypt_payload(dek, &tdf)?);
            }
        }

        let result = self.rewrap.rewrap_header(&tdf.header, CLIENT_VERSION).await?;
        let plaintext = decrypt_payload(&result.key, &tdf);
        self.decrypt_key = Some((tdf.header.ephemeral_public_key.clone(), result.key));
        Ok(plaintext?)
    }

    /// End the session, dropping (and zeroizing) its keys
    pub fn close(self) {
        debug!("closing dataset session");
    }
}

impl fmt::Debug for DatasetSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetSession")
            .field("max_key_iterations", &self.max_key_iterations)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
