use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_path: String,
    pub upload_log_path: String,
    pub whois_servers: Vec<String>,
    pub whois_timeout_seconds: u64,
    pub max_response_size: usize,
    pub top_ips_limit: usize,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
    pub start_time: Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigData {
    pub port: u16,
    pub log_path: String,
    pub upload_log_path: String,
    pub whois_servers: Vec<String>,
    pub whois_timeout_seconds: u64,
    pub max_response_size: usize,
    pub top_ips_limit: usize,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,
}

/// Regional registries tried in order by the fallback resolver.
/// Entries may carry an explicit `host:port`; bare hosts default to port 43.
pub const DEFAULT_WHOIS_SERVERS: [&str; 5] = [
    "whois.ripe.net",
    "whois.arin.net",
    "whois.apnic.net",
    "whois.radb.net",
    "whois.iana.org",
];

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let is_production = Self::is_production_environment();

        let default_servers: Vec<String> = DEFAULT_WHOIS_SERVERS
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut settings = config::Config::builder()
            .set_default("port", Self::get_default_port())?
            .set_default("log_path", "logs/access.log")?
            .set_default("upload_log_path", "logs/upload.log")?
            .set_default("whois_servers", default_servers)?
            .set_default("whois_timeout_seconds", if is_production { 5_i64 } else { 3 })?
            .set_default("max_response_size", 1024 * 1024_i64)?
            .set_default("top_ips_limit", 20_i64)?
            .set_default("cache_ttl_seconds", if is_production { 3600_i64 } else { 1800 })?
            .set_default("cache_max_entries", 10_000_i64)?;

        // Override with environment variables if present
        settings = Self::apply_env_overrides(settings)?;

        let config_data: ConfigData = settings.build()?.try_deserialize()?;

        Ok(Config {
            port: config_data.port,
            log_path: config_data.log_path,
            upload_log_path: config_data.upload_log_path,
            whois_servers: config_data.whois_servers,
            whois_timeout_seconds: config_data.whois_timeout_seconds,
            max_response_size: config_data.max_response_size,
            top_ips_limit: config_data.top_ips_limit,
            cache_ttl_seconds: config_data.cache_ttl_seconds,
            cache_max_entries: config_data.cache_max_entries,
            start_time: Instant::now(),
        })
    }

    fn is_production_environment() -> bool {
        std::env::var("ENVIRONMENT")
            .or_else(|_| std::env::var("ENV"))
            .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
            .unwrap_or(false)
    }

    fn get_default_port() -> u16 {
        // Check common environment variables for port
        std::env::var("PORT")
            .or_else(|_| std::env::var("HTTP_PORT"))
            .or_else(|_| std::env::var("SERVER_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000)
    }

    fn apply_env_overrides(
        mut settings: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let env_mappings = [
            ("PORT", "port"),
            ("LOG_PATH", "log_path"),
            ("UPLOAD_LOG_PATH", "upload_log_path"),
            ("WHOIS_TIMEOUT_SECONDS", "whois_timeout_seconds"),
            ("WHOIS_TIMEOUT", "whois_timeout_seconds"),
            ("MAX_RESPONSE_SIZE", "max_response_size"),
            ("TOP_IPS_LIMIT", "top_ips_limit"),
            ("CACHE_TTL_SECONDS", "cache_ttl_seconds"),
            ("CACHE_TTL", "cache_ttl_seconds"),
            ("CACHE_MAX_ENTRIES", "cache_max_entries"),
            ("CACHE_SIZE", "cache_max_entries"),
        ];

        for (env_var, config_key) in env_mappings {
            if let Ok(value) = std::env::var(env_var) {
                settings = settings.set_override(config_key, value)?;
            }
        }

        // Comma-separated list, e.g. "whois.ripe.net,whois.arin.net"
        if let Ok(servers) = std::env::var("WHOIS_SERVERS") {
            let list: Vec<String> = servers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            settings = settings.set_override("whois_servers", list)?;
        }

        Ok(settings)
    }
}
