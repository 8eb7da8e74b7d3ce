use crate::{config::Config, errors::ServiceError, extract, WhoisRecord};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, warn};

const WHOIS_PORT: u16 = 43;
const READ_BUFFER_SIZE: usize = 4096;

/// One-shot whois protocol client with ordered registry fallback.
///
/// Whois is connection-per-query by design: the server signals end of
/// response by closing the connection, so there is nothing to pool or reuse.
pub struct WhoisService {
    config: Arc<Config>,
}

impl WhoisService {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.config.whois_timeout_seconds)
    }

    /// Query a single registry server for an IP address.
    ///
    /// Opens a fresh connection, writes `"{ip}\r\n"` and reads until the peer
    /// closes. The whole connect/send/read sequence runs under one deadline,
    /// so a registry that trickles bytes cannot stretch the attempt any more
    /// than an unresponsive one can. Registry flakiness is expected; any
    /// failure here is a per-host miss for the resolver, not a fatal
    /// condition.
    pub async fn query(&self, server: &str, ip: &str) -> Result<String, ServiceError> {
        // Server entries may carry an explicit port; bare hosts use 43
        let addr = if server.contains(':') {
            server.to_string()
        } else {
            format!("{}:{}", server, WHOIS_PORT)
        };

        timeout(
            self.attempt_timeout(),
            Self::exchange(&addr, ip, self.config.max_response_size),
        )
        .await?
    }

    async fn exchange(
        addr: &str,
        ip: &str,
        max_response_size: usize,
    ) -> Result<String, ServiceError> {
        let mut stream = TcpStream::connect(addr).await?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let query_line = format!("{}\r\n", ip);
        stream.write_all(query_line.as_bytes()).await?;

        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let mut response = Vec::new();

        loop {
            let n = stream.read(&mut buffer).await?;
            if n == 0 {
                break; // EOF - end of whois response
            }
            response.extend_from_slice(&buffer[..n]);
            if response.len() > max_response_size {
                return Err(ServiceError::ResponseTooLarge);
            }
        }

        String::from_utf8(response).map_err(|_| ServiceError::InvalidUtf8)
    }

    /// Resolve an IP against the configured registry list, in order.
    ///
    /// Stops at the first registry whose response extracts all three fields.
    /// A host that fails to respond, or answers with an incomplete record, is
    /// skipped; fields from different registries are never merged, since that
    /// could attribute a network to the wrong operator. Exhausting the list
    /// is a miss, a normal outcome.
    pub async fn resolve(&self, ip: &str) -> Option<WhoisRecord> {
        for server in &self.config.whois_servers {
            match self.query(server, ip).await {
                Ok(response) => {
                    let record = extract::extract(&response);
                    if record.is_complete() {
                        debug!("Complete whois record for {} from {}", ip, server);
                        return Some(record);
                    }
                    debug!("Incomplete whois record for {} from {}, trying next", ip, server);
                }
                Err(e) => {
                    warn!("Whois query to {} failed for {}: {}", server, ip, e);
                }
            }
        }

        debug!("All registries exhausted for {}", ip);
        None
    }
}
