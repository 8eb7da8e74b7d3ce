use crate::WhoisRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown ip address: {0}")]
    UnknownIp(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A tracked client IP address. Unique by `ip`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct IpAddressRecord {
    pub id: i64,
    pub ip: String,
}

/// Whois metadata attached to an IP address. At most one per IP.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WhoisInfoRecord {
    pub id: i64,
    pub ip_address_id: i64,
    pub asn: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
}

/// Persistence collaborator for IP addresses and their whois metadata.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create-or-fetch an IP address record. Repeated calls for the same IP
    /// return the existing record; duplicate-key conflicts are never
    /// surfaced to the caller.
    async fn find_or_create_ip(&self, ip: &str) -> StoreResult<IpAddressRecord>;

    /// Insert or overwrite the whois metadata for an IP. Fails with
    /// `UnknownIp` when no IP address record exists yet.
    async fn upsert_whois_info(
        &self,
        ip: &str,
        record: &WhoisRecord,
    ) -> StoreResult<WhoisInfoRecord>;
}

#[derive(Default)]
struct MemoryStoreInner {
    next_id: i64,
    // ip -> record
    ips: HashMap<String, IpAddressRecord>,
    // ip_address_id -> record
    whois: HashMap<i64, WhoisInfoRecord>,
}

/// In-process store. The single mutex serializes concurrent upserts for the
/// same IP, which is what keeps the one-whois-record-per-IP invariant under
/// concurrent enrichment of a repeat visitor.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read back the stored whois metadata for an IP, if any. Not part of
    /// the collaborator interface; useful for inspecting store contents.
    pub async fn get_whois_info(&self, ip: &str) -> StoreResult<Option<WhoisInfoRecord>> {
        let inner = self.inner.lock().await;
        let Some(ip_record) = inner.ips.get(ip) else {
            return Ok(None);
        };
        Ok(inner.whois.get(&ip_record.id).cloned())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_or_create_ip(&self, ip: &str) -> StoreResult<IpAddressRecord> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.ips.get(ip) {
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let record = IpAddressRecord {
            id: inner.next_id,
            ip: ip.to_string(),
        };
        inner.ips.insert(ip.to_string(), record.clone());
        Ok(record)
    }

    async fn upsert_whois_info(
        &self,
        ip: &str,
        record: &WhoisRecord,
    ) -> StoreResult<WhoisInfoRecord> {
        let mut inner = self.inner.lock().await;
        let ip_address_id = inner
            .ips
            .get(ip)
            .map(|r| r.id)
            .ok_or_else(|| StoreError::UnknownIp(ip.to_string()))?;

        if let Some(existing) = inner.whois.get_mut(&ip_address_id) {
            existing.asn = record.asn.clone();
            existing.name = record.name.clone();
            existing.country = record.country.clone();
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let info = WhoisInfoRecord {
            id: inner.next_id,
            ip_address_id,
            asn: record.asn.clone(),
            name: record.name.clone(),
            country: record.country.clone(),
        };
        inner.whois.insert(ip_address_id, info.clone());
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(asn: &str) -> WhoisRecord {
        WhoisRecord {
            asn: Some(asn.to_string()),
            name: Some("EXAMPLE-NET".to_string()),
            country: Some("DE".to_string()),
        }
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let first = store.find_or_create_ip("203.0.113.7").await.unwrap();
        let second = store.find_or_create_ip("203.0.113.7").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.ip, "203.0.113.7");
    }

    #[tokio::test]
    async fn distinct_ips_get_distinct_records() {
        let store = MemoryStore::new();
        let a = store.find_or_create_ip("203.0.113.7").await.unwrap();
        let b = store.find_or_create_ip("203.0.113.8").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn upsert_overwrites_single_record() {
        let store = MemoryStore::new();
        store.find_or_create_ip("203.0.113.7").await.unwrap();

        let first = store
            .upsert_whois_info("203.0.113.7", &record("AS64500"))
            .await
            .unwrap();
        let second = store
            .upsert_whois_info("203.0.113.7", &record("AS64501"))
            .await
            .unwrap();

        // Same row, fields reflect the most recent upsert
        assert_eq!(first.id, second.id);
        assert_eq!(second.asn.as_deref(), Some("AS64501"));

        let stored = store.get_whois_info("203.0.113.7").await.unwrap().unwrap();
        assert_eq!(stored.asn.as_deref(), Some("AS64501"));
    }

    #[tokio::test]
    async fn upsert_for_unknown_ip_fails() {
        let store = MemoryStore::new();
        let err = store
            .upsert_whois_info("203.0.113.7", &record("AS64500"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownIp(_)));
    }
}
