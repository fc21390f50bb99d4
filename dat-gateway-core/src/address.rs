use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::GatewayError;
use crate::key::ArchiveKey;

const DEFAULT_DNS_TTL: Duration = Duration::from_secs(3600);

/// A user-supplied address: hex key, base32 key, or a DNS name resolvable
/// via the well-known Dat DNS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Hex(String),
    Base32(String),
    Dns(String),
}

impl Address {
    pub fn parse(raw: &str) -> Self {
        if raw.len() == ArchiveKey::HEX_LEN && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Address::Hex(raw.to_lowercase())
        } else if raw.len() == ArchiveKey::BASE32_LEN {
            Address::Base32(raw.to_lowercase())
        } else {
            Address::Dns(raw.to_string())
        }
    }
}

struct CachedRecord {
    key: ArchiveKey,
    expires_at: Instant,
}

/// Resolves user-supplied addresses to canonical `ArchiveKey`s.
///
/// DNS lookups (`https://<host>/.well-known/dat`) are cached per-host for
/// the TTL advertised by the record (default 3600s) so repeated requests
/// for the same name do not hammer the resolver (spec.md §4.1).
pub struct Resolver {
    client: reqwest::Client,
    dns_cache: DashMap<String, CachedRecord>,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            dns_cache: DashMap::new(),
        }
    }

    pub async fn resolve(&self, raw_address: &str) -> Result<ArchiveKey, GatewayError> {
        match Address::parse(raw_address) {
            Address::Hex(hex) => ArchiveKey::from_hex(&hex),
            Address::Base32(b32) => ArchiveKey::from_base32(&b32),
            Address::Dns(host) => self.resolve_dns(&host).await,
        }
    }

    async fn resolve_dns(&self, host: &str) -> Result<ArchiveKey, GatewayError> {
        if let Some(entry) = self.dns_cache.get(host) {
            if entry.expires_at > Instant::now() {
                return Ok(entry.key);
            }
        }

        let url = format!("https://{host}/.well-known/dat");
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Resolution(format!("dns lookup failed for {host}: {e}")))?
            .text()
            .await
            .map_err(|e| GatewayError::Resolution(format!("dns lookup failed for {host}: {e}")))?;

        let (key, ttl) = parse_dat_record(&body)
            .ok_or_else(|| GatewayError::Resolution(format!("no dat:// record for {host}")))?;

        self.dns_cache.insert(
            host.to_string(),
            CachedRecord {
                key,
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(key)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a well-known Dat DNS record body: `dat://<hex>\nttl=<seconds>`.
/// Only the first `dat://` line is honored, matching spec.md §4.1.
fn parse_dat_record(body: &str) -> Option<(ArchiveKey, Duration)> {
    let mut key = None;
    let mut ttl = DEFAULT_DNS_TTL;

    for line in body.lines() {
        let line = line.trim();
        if let Some(hex) = line.strip_prefix("dat://") {
            if key.is_none() {
                key = ArchiveKey::from_hex(hex).ok();
            }
        } else if let Some(secs) = line.strip_prefix("ttl=") {
            if let Ok(secs) = secs.parse::<u64>() {
                ttl = Duration::from_secs(secs);
            }
        }
    }

    key.map(|k| (k, ttl))
}
