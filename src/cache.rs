//! Rewrap cache
//!
//! Maps a header's ephemeral public key to the DEK the KAS returned for it,
//! so containers sharing an ephemeral key are rewrapped once. Entries expire
//! `max_age` after their last access. Inside a tokio runtime a background
//! task sweeps expired entries every `poll_interval`; elsewhere expired
//! entries are dropped when looked up.

use crate::config::CacheConfig;
use nanotdf_crypto::AesKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

struct CacheEntry {
    key: AesKey,
    last_access: Instant,
}

type Entries = Mutex<HashMap<Vec<u8>, CacheEntry>>;

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<Vec<u8>, CacheEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn evict_expired(entries: &Entries, max_age: Duration) -> usize {
    let now = Instant::now();
    let mut map = lock(entries);
    let before = map.len();
    map.retain(|_, entry| now.duration_since(entry.last_access) <= max_age);
    before - map.len()
}

/// Ephemeral-key to DEK cache shared between decrypting clients
pub struct RewrapCache {
    /// `None` when bypassed or closed
    entries: Option<Arc<Entries>>,
    max_age: Duration,
    sweeper: Option<JoinHandle<()>>,
}

impl RewrapCache {
    pub fn new(config: CacheConfig) -> Self {
        if config.bypass {
            debug!("rewrap cache bypassed");
            return Self {
                entries: None,
                max_age: config.max_age,
                sweeper: None,
            };
        }

        let entries = Arc::new(Mutex::new(HashMap::new()));
        let sweeper = tokio::runtime::Handle::try_current().ok().map(|handle| {
            handle.spawn(sweep_loop(
                Arc::downgrade(&entries),
                config.max_age,
                config.poll_interval,
            ))
        });
        Self {
            entries: Some(entries),
            max_age: config.max_age,
            sweeper,
        }
    }

    /// DEK for `ephemeral_key`, refreshing its age
    pub fn get(&self, ephemeral_key: &[u8]) -> Option<AesKey> {
        let entries = self.entries.as_ref()?;
        let mut map = lock(entries);
        let now = Instant::now();
        match map.get_mut(ephemeral_key) {
            Some(entry) if now.duration_since(entry.last_access) <= self.max_age => {
                entry.last_access = now;
                Some(entry.key.clone())
            }
            Some(_) => {
                map.remove(ephemeral_key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, ephemeral_key: impl Into<Vec<u8>>, key: AesKey) {
        if let Some(entries) = &self.entries {
            lock(entries).insert(
                ephemeral_key.into(),
                CacheEntry {
                    key,
                    last_access: Instant::now(),
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| lock(entries).len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries now, returning how many were evicted
    pub fn sweep(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |entries| evict_expired(entries, self.max_age))
    }

    /// Stop the sweeper and drop every entry; later `set` calls are ignored
    pub fn close(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        self.entries = None;
    }
}

async fn sweep_loop(entries: Weak<Entries>, max_age: Duration, poll_interval: Duration) {
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        interval.tick().await;
        let Some(entries) = entries.upgrade() else {
            break;
        };
        let evicted = evict_expired(&entries, max_age);
        if evicted > 0 {
            debug!(evicted, "rewrap cache evicted expired keys");
        }
    }
}

impl Drop for RewrapCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

impl fmt::Debug for RewrapCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewrapCache")
            .field("entries", &self.len())
            .field("max_age", &self.max_age)
            .field("closed", &self.entries.is_none())
            .finish()
    }
}
