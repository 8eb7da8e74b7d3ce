//! # Logstats Service Library
//!
//! Access-log analytics with whois enrichment for Rust.
//!
//! ## Features
//!
//! - Combined-format access log parsing and daily/hourly/per-IP aggregation
//! - One-shot whois protocol client with ordered multi-registry fallback
//! - Heuristic field extraction (ASN, network name, country) over free-text
//!   registry responses
//! - Optional TTL caching of resolved records
//! - Pluggable persistence seam for IP and whois records
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use logstats_service::{Config, WhoisService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::load()?);
//!     let whois = WhoisService::new(config.clone());
//!
//!     match whois.resolve("203.0.113.7").await {
//!         Some(record) => println!("ASN: {:?}", record.asn),
//!         None => println!("no registry had a complete answer"),
//!     }
//!
//!     let report = logstats_service::stats::aggregate_file("logs/access.log", config.top_ips_limit)?;
//!     println!("total visits: {}", report.total_visits);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod extract;
pub mod logparse;
pub mod metrics;
pub mod stats;
pub mod store;
pub mod whois;

// Re-export main types for easy access
pub use cache::CacheService;
pub use config::Config;
pub use enrich::Enricher;
pub use errors::ServiceError;
pub use logparse::LogRecord;
pub use stats::AggregateReport;
pub use store::{IpAddressRecord, MemoryStore, Store, WhoisInfoRecord};
pub use whois::WhoisService;

/// Whois metadata extracted for a single IP address.
///
/// A record is complete iff all three fields are present; the fallback
/// resolver only ever returns complete records.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WhoisRecord {
    pub asn: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
}

impl WhoisRecord {
    pub fn is_complete(&self) -> bool {
        self.asn.is_some() && self.name.is_some() && self.country.is_some()
    }
}
