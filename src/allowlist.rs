//! KAS allow-list
//!
//! Rewrap requests carry a signed proof of possession and, with DPoP,
//! a bound token. They only go to KAS origins the caller trusts; the check
//! runs before any network I/O.

use crate::auth::AuthProvider;
use crate::error::{error_from_status, NanoTdfError};
use crate::transport::{HttpRequest, KasTransport};
use nanotdf_protocol::KeyAccessServerList;
use reqwest::Url;
use tracing::{debug, info, warn};

/// `scheme://host[:port]` of a URL, with default ports elided
pub fn origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

/// Log plain-HTTP KAS URLs; returns false for insecure ones
pub fn validate_secure_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        warn!(url, "unparseable KAS URL");
        return false;
    };
    if parsed.scheme() == "https" {
        return true;
    }
    let host = parsed.host_str().unwrap_or_default();
    if parsed.scheme() == "http" && (host == "localhost" || host == "127.0.0.1") {
        debug!(url, "development URL detected");
        true
    } else if parsed.scheme() == "http"
        && (host == "svc.cluster.local"
            || host.ends_with(".svc.cluster.local")
            || host == "internal"
            || host.ends_with(".internal"))
    {
        info!(url, "internal URL detected");
        true
    } else {
        warn!(url, "insecure KAS URL loaded");
        false
    }
}

/// Set of trusted origins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginAllowList {
    origins: Vec<String>,
    allow_all: bool,
}

impl OriginAllowList {
    /// Allow-list of the origins of `urls`
    pub fn new<I, S>(urls: I) -> Result<Self, NanoTdfError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut origins = Vec::new();
        for url in urls {
            let url = url.as_ref();
            validate_secure_url(url);
            let origin = origin(url).ok_or_else(|| {
                NanoTdfError::Configuration(format!("invalid allowed KAS URL [{}]", url))
            })?;
            if !origins.contains(&origin) {
                origins.push(origin);
            }
        }
        Ok(Self {
            origins,
            allow_all: false,
        })
    }

    /// Allow-list that trusts everything
    pub fn allow_all() -> Self {
        Self {
            origins: Vec::new(),
            allow_all: true,
        }
    }

    pub fn allows(&self, url: &str) -> bool {
        if self.allow_all {
            return true;
        }
        match origin(url) {
            Some(origin) => self.origins.contains(&origin),
            None => false,
        }
    }

    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    /// `Ok` if `url` is allowed, [`NanoTdfError::UntrustedKas`] otherwise
    pub fn check(&self, url: &str) -> Result<(), NanoTdfError> {
        if self.allows(url) {
            return Ok(());
        }
        warn!(url, allowed = ?self.origins, "KAS not in allow-list");
        Err(NanoTdfError::UntrustedKas {
            url: url.to_string(),
            allowed: self.origins.clone(),
        })
    }
}

/// Build an allow-list from the platform's registered key access servers
///
/// Follows `pagination.nextOffset` until it is zero and always includes
/// `<platform_url>/kas`.
pub async fn fetch_key_access_servers(
    platform_url: &str,
    auth: &dyn AuthProvider,
    transport: &dyn KasTransport,
) -> Result<OriginAllowList, NanoTdfError> {
    let base = platform_url.trim_end_matches('/');
    let mut next_offset = 0u64;
    let mut server_urls = Vec::new();

    loop {
        let url = format!("{}/key-access-servers?pagination.offset={}", base, next_offset);
        let request = auth.with_creds(HttpRequest::get(&url)).await?;
        let response = transport.send(request).await?;
        if !response.is_success() {
            return Err(match error_from_status(response.status, &url, &response.body) {
                NanoTdfError::Network(_) => NanoTdfError::Service {
                    status: response.status,
                    message: format!("unable to fetch kas list from [{}]", url),
                },
                other => other,
            });
        }

        let page: KeyAccessServerList = serde_json::from_str(&response.body).map_err(|e| {
            NanoTdfError::Network(format!("invalid kas list from [{}]: {}", url, e))
        })?;
        server_urls.extend(page.key_access_servers.into_iter().map(|server| server.uri));
        next_offset = page.pagination.next_offset;
        if next_offset == 0 {
            break;
        }
    }

    let platform_kas = format!("{}/kas", base);
    if !server_urls.contains(&platform_kas) {
        server_urls.push(platform_kas);
    }
    debug!(count = server_urls.len(), "fetched key access servers");
    OriginAllowList::new(server_urls)
}
