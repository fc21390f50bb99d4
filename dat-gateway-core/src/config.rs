use std::net::SocketAddr;
use std::path::PathBuf;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the gateway.
///
/// Loaded from an optional YAML file merged with `DAT_GATEWAY_`-prefixed
/// environment variables, the same layering the teacher gateway uses for
/// its own config (`Figment::new().merge(Yaml::file).merge(Env::prefixed)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP/WebSocket listener address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Directory the swarm adapter persists archive metadata under.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Maximum number of resident archives.
    #[serde(default = "default_max")]
    pub max: usize,

    /// TTL in milliseconds, enabled only when paired with `sweep_period_ms`.
    #[serde(default)]
    pub ttl_ms: Option<u64>,

    /// Sweep period in milliseconds.
    #[serde(default)]
    pub sweep_period_ms: Option<u64>,

    /// Enable subdomain-based addressing and 302 redirects to it.
    #[serde(default)]
    pub redirect: bool,

    /// Bounded wait for an archive's feeds to materialize before admission
    /// either succeeds or is rejected as not-ready.
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,

    /// Bounded wait per HTTP request before it fails as not-found.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl GatewayConfig {
    /// Load configuration from an optional YAML file plus environment
    /// overrides. Mirrors the teacher's `AndoConfig::load`.
    pub fn load(config_path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(figment::providers::Serialized::defaults(
            GatewayConfig::default(),
        ));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed("DAT_GATEWAY_").split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// TTL expiry is enabled only when both `ttl_ms` and `sweep_period_ms`
    /// are configured (spec.md §4.2).
    pub fn ttl_enabled(&self) -> bool {
        self.ttl_ms.is_some() && self.sweep_period_ms.is_some()
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.max == 0 {
            anyhow::bail!("`max` must be a positive integer");
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            storage_dir: default_storage_dir(),
            max: default_max(),
            ttl_ms: None,
            sweep_period_ms: None,
            redirect: false,
            readiness_timeout_ms: default_readiness_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:5917".parse().unwrap()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_max() -> usize {
    50
}

fn default_readiness_timeout_ms() -> u64 {
    3_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.listen_addr.port(), 5917);
        assert_eq!(cfg.max, 50);
        assert!(!cfg.ttl_enabled());
        assert!(!cfg.redirect);
    }

    #[test]
    fn ttl_requires_both_fields() {
        let mut cfg = GatewayConfig::default();
        cfg.ttl_ms = Some(60_000);
        assert!(!cfg.ttl_enabled(), "ttl alone must not enable expiry");
        cfg.sweep_period_ms = Some(5_000);
        assert!(cfg.ttl_enabled());
    }

    #[test]
    fn zero_max_fails_validation() {
        let mut cfg = GatewayConfig::default();
        cfg.max = 0;
        assert!(cfg.validate().is_err());
    }
}
