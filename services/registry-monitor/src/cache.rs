//! TTL cache for latest-tag digests.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

struct CacheEntry {
    digest: String,
    expires_at: Instant,
}

/// Concurrent digest cache keyed by repository (implicit tag `latest`).
/// Reads take the shared lock; expired entries are evicted lazily when a
/// read finds them.
pub struct DigestCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl DigestCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, repository: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(repository) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.digest.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Entry expired: upgrade to the exclusive lock and evict, re-checking
        // in case a concurrent insert refreshed it.
        let mut entries = self.entries.write().await;
        match entries.get(repository) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.digest.clone()),
            _ => {
                entries.remove(repository);
                None
            }
        }
    }

    pub async fn insert(&self, repository: String, digest: String) {
        let mut entries = self.entries.write().await;
        entries.insert(
            repository,
            CacheEntry {
                digest,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
