use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dat_gateway_core::{Address, ArchiveKey, GatewayConfig, GatewayError, Resolver};
use dat_gateway_registry::Registry;
use dat_gateway_swarm::SwarmAdapter;
use http::header::HeaderValue;
use http::{header, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use tracing::warn;

use dat_gateway_observability::{log_access, AccessLogEntry};

use crate::landing::landing_page;

/// Binds a `Resolver`, a `Registry`, the swarm adapter, and the gateway's
/// configuration into one request handler. One instance is shared (via
/// `Arc`) across every connection the listener accepts; the WebSocket front
/// end reaches `swarm` directly to open replication streams, bypassing the
/// registry since replication does not require an admitted `LiveArchive`.
pub struct GatewayService<S: SwarmAdapter> {
    pub resolver: Arc<Resolver>,
    pub registry: Arc<Registry<S>>,
    pub swarm: Arc<S>,
    pub config: Arc<GatewayConfig>,
}

impl<S: SwarmAdapter + 'static> GatewayService<S> {
    pub fn new(
        resolver: Arc<Resolver>,
        registry: Arc<Registry<S>>,
        swarm: Arc<S>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            resolver,
            registry,
            swarm,
            config,
        }
    }

    /// Entry point for every non-upgrade request. Always sets the CORS
    /// header on the way out, regardless of which branch produced the body.
    pub async fn route(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let start = std::time::Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let mut response = match tokio::time::timeout(timeout, self.route_inner(&path, host.as_deref())).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => error_response(&e),
            Err(_) => error_response(&GatewayError::NotReady),
        };

        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

        log_access(&AccessLogEntry {
            method: method.to_string(),
            path,
            status: response.status().as_u16(),
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        });
        response
    }

    async fn route_inner(&self, path: &str, host: Option<&str>) -> Result<Response<Full<Bytes>>, GatewayError> {
        let subdomain_label = host
            .filter(|_| self.config.redirect)
            .and_then(|h| h.split('.').next())
            .filter(|label| label.len() == ArchiveKey::BASE32_LEN)
            .map(str::to_string);

        let (address, subpath, via_subdomain) = if let Some(label) = subdomain_label {
            (label, normalize_subpath(path), true)
        } else {
            let trimmed = path.trim_start_matches('/');
            if trimmed.is_empty() {
                return Ok(landing_page_response());
            }
            let mut parts = trimmed.splitn(2, '/');
            let address = parts.next().unwrap_or("").to_string();
            let rest = parts.next().unwrap_or("");
            (address, rest.to_string(), false)
        };

        if !via_subdomain && subpath == ".well-known/dat" {
            let key = self.resolver.resolve(&address).await?;
            return Ok(well_known_response(key));
        }

        let key = self.resolver.resolve(&address).await?;

        if self.config.redirect && !via_subdomain && !matches!(Address::parse(&address), Address::Base32(_)) {
            let base32 = key.to_base32();
            let host = host.unwrap_or("");
            let location = format!("http://{base32}.{host}{}", normalize_subpath(&subpath));
            return Ok(redirect_response(&location));
        }

        let live = self.registry.get_or_admit(key).await?;
        Ok(dat_gateway_drive::serve(&live.drive, &normalize_subpath(&subpath)).await)
    }
}

fn normalize_subpath(raw: &str) -> String {
    if raw.is_empty() {
        "/".to_string()
    } else if raw.starts_with('/') {
        raw.to_string()
    } else {
        format!("/{raw}")
    }
}

fn landing_page_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html")
        .body(Full::new(Bytes::from_static(landing_page())))
        .expect("valid response")
}

fn well_known_response(key: ArchiveKey) -> Response<Full<Bytes>> {
    let body = format!("dat://{}\nttl=3600", key.to_hex());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(body)))
        .expect("valid response")
}

fn redirect_response(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .body(Full::new(Bytes::new()))
        .expect("valid response")
}

fn error_response(e: &GatewayError) -> Response<Full<Bytes>> {
    warn!(error = %e, "request failed");
    Response::builder()
        .status(e.status_code())
        .body(Full::new(Bytes::from_static(e.body().as_bytes())))
        .expect("valid response")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(redirect: bool) -> GatewayConfig {
        let mut cfg = GatewayConfig::default();
        cfg.redirect = redirect;
        cfg
    }

    #[test]
    fn landing_page_has_cors_free_body() {
        let resp = landing_page_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn well_known_body_matches_literal_format() {
        let key = ArchiveKey::from_bytes([0x11; 32]);
        let resp = well_known_response(key);
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn normalize_subpath_defaults_to_root() {
        assert_eq!(normalize_subpath(""), "/");
        assert_eq!(normalize_subpath("icons/a.ico"), "/icons/a.ico");
        assert_eq!(normalize_subpath("/icons/a.ico"), "/icons/a.ico");
    }

    #[tokio::test]
    async fn redirect_is_issued_for_non_base32_address_when_enabled() {
        let resolver = Arc::new(Resolver::new());
        let dir = tempfile::tempdir().unwrap();
        let swarm = Arc::new(dat_gateway_swarm::FsSwarm::new(dir.path()));
        let cfg = Arc::new(config(true));
        let registry = Arc::new(Registry::from_config(Arc::clone(&swarm), &cfg));
        let service = GatewayService::new(resolver, registry, swarm, cfg);

        let hex = "a".repeat(64);
        let resp = service
            .route_inner(&format!("/{hex}/icons/favicon.ico"), Some("localhost"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("http://"));
        assert!(location.contains(".localhost"));
    }
}
