use crate::{
    cache::CacheService, errors::ServiceError, store::Store, whois::WhoisService, WhoisRecord,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Ties the resolver, cache and persistence collaborator together per IP.
pub struct Enricher {
    store: Arc<dyn Store>,
    whois: Arc<WhoisService>,
    cache: Arc<CacheService>,
}

impl Enricher {
    pub fn new(store: Arc<dyn Store>, whois: Arc<WhoisService>, cache: Arc<CacheService>) -> Self {
        Self { store, whois, cache }
    }

    /// On-demand lookup. Here the lookup IS the request, so a registry miss
    /// surfaces as `WhoisNotFound` and persistence failures propagate.
    pub async fn lookup(&self, ip: &str) -> Result<WhoisRecord, ServiceError> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(ServiceError::InvalidIp("empty ip".to_string()));
        }

        self.store.find_or_create_ip(ip).await?;

        if let Some(cached) = self.cache.get(ip).await {
            return Ok(cached);
        }

        let record = self
            .whois
            .resolve(ip)
            .await
            .ok_or_else(|| ServiceError::WhoisNotFound(ip.to_string()))?;

        self.store.upsert_whois_info(ip, &record).await?;
        self.cache.set(ip, &record).await;

        Ok(record)
    }

    /// Best-effort side-channel enrichment. Misses and persistence failures
    /// are logged and swallowed; this must never gate the caller's primary
    /// request flow.
    pub async fn enrich(&self, ip: &str) {
        if let Err(e) = self.try_enrich(ip).await {
            warn!("Enrichment failed for {}: {}", ip, e);
        }
    }

    async fn try_enrich(&self, ip: &str) -> Result<(), ServiceError> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Ok(());
        }

        self.store.find_or_create_ip(ip).await?;

        // A recent cache entry means this visitor was already resolved and
        // persisted; skip the registry round trips.
        if self.cache.get(ip).await.is_some() {
            return Ok(());
        }

        let Some(record) = self.whois.resolve(ip).await else {
            debug!("Whois miss for {}, nothing persisted", ip);
            return Ok(());
        };

        self.store.upsert_whois_info(ip, &record).await?;
        self.cache.set(ip, &record).await;
        Ok(())
    }

    /// Detach enrichment onto its own task so request handling never blocks
    /// on registry latency (worst case is the sum of per-host timeouts).
    pub fn spawn_enrich(self: &Arc<Self>, ip: String) {
        let enricher = Arc::clone(self);
        tokio::spawn(async move {
            enricher.enrich(&ip).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryStore;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_config(servers: Vec<String>) -> Arc<Config> {
        Arc::new(Config {
            port: 0,
            log_path: "logs/access.log".to_string(),
            upload_log_path: "logs/upload.log".to_string(),
            whois_servers: servers,
            whois_timeout_seconds: 2,
            max_response_size: 64 * 1024,
            top_ips_limit: 20,
            cache_ttl_seconds: 60,
            cache_max_entries: 100,
            start_time: Instant::now(),
        })
    }

    fn enricher(servers: Vec<String>) -> (Arc<Enricher>, Arc<MemoryStore>) {
        let config = test_config(servers);
        let store = Arc::new(MemoryStore::new());
        let whois = Arc::new(WhoisService::new(config.clone()));
        let cache = Arc::new(CacheService::new(config));
        (
            Arc::new(Enricher::new(store.clone(), whois, cache)),
            store,
        )
    }

    async fn mock_registry(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response).await;
            }
        });
        format!("127.0.0.1:{}", addr.port())
    }

    const COMPLETE: &[u8] = b"origin: AS64500\nnetname: EXAMPLE-NET\ncountry: DE\n";

    #[tokio::test]
    async fn lookup_resolves_persists_and_caches() {
        let server = mock_registry(COMPLETE).await;
        let (enricher, store) = enricher(vec![server]);

        let record = enricher.lookup("203.0.113.7").await.unwrap();
        assert_eq!(record.asn.as_deref(), Some("AS64500"));

        let stored = store.get_whois_info("203.0.113.7").await.unwrap().unwrap();
        assert_eq!(stored.country.as_deref(), Some("DE"));

        // Second lookup is served from cache, no registry needed
        let again = enricher.lookup("203.0.113.7").await.unwrap();
        assert_eq!(again, record);
    }

    #[tokio::test]
    async fn lookup_miss_surfaces_not_found() {
        let (enricher, _) = enricher(Vec::new());
        let err = enricher.lookup("203.0.113.7").await.unwrap_err();
        assert!(matches!(err, ServiceError::WhoisNotFound(_)));
    }

    #[tokio::test]
    async fn lookup_rejects_empty_ip() {
        let (enricher, _) = enricher(Vec::new());
        let err = enricher.lookup("   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidIp(_)));
    }

    #[tokio::test]
    async fn enrich_swallows_misses_but_keeps_ip_record() {
        let (enricher, store) = enricher(Vec::new());

        enricher.enrich("203.0.113.7").await;

        let ip = store.find_or_create_ip("203.0.113.7").await.unwrap();
        assert_eq!(ip.ip, "203.0.113.7");
        // Miss: nothing persisted for the whois side
        assert!(store.get_whois_info("203.0.113.7").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enrich_persists_complete_results() {
        let server = mock_registry(COMPLETE).await;
        let (enricher, store) = enricher(vec![server]);

        enricher.enrich("203.0.113.7").await;

        let stored = store.get_whois_info("203.0.113.7").await.unwrap().unwrap();
        assert_eq!(stored.asn.as_deref(), Some("AS64500"));
    }
}
