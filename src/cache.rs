use crate::{config::Config, WhoisRecord};
use moka::future::Cache;
use std::{sync::Arc, time::Duration};
use tracing::debug;

/// TTL cache of resolved whois records, keyed by IP address.
///
/// Keeps repeat visitors from triggering redundant registry traffic; only
/// complete records are ever inserted.
pub struct CacheService {
    cache: Cache<String, WhoisRecord>,
}

impl CacheService {
    pub fn new(config: Arc<Config>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_entries)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self { cache }
    }

    pub async fn get(&self, ip: &str) -> Option<WhoisRecord> {
        match self.cache.get(&Self::normalize_ip(ip)).await {
            Some(record) => {
                debug!("Cache hit for ip: {}", ip);
                #[cfg(feature = "server")]
                crate::metrics::increment_cache_hits();
                Some(record)
            }
            None => {
                debug!("Cache miss for ip: {}", ip);
                #[cfg(feature = "server")]
                crate::metrics::increment_cache_misses();
                None
            }
        }
    }

    pub async fn set(&self, ip: &str, record: &WhoisRecord) {
        self.cache.insert(Self::normalize_ip(ip), record.clone()).await;
        debug!("Cached whois record for ip: {}", ip);
    }

    fn normalize_ip(ip: &str) -> String {
        ip.trim().to_lowercase()
    }
}
