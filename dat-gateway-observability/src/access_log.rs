use serde::Serialize;
use tracing::info;

/// One resolved request, modeled on the teacher's `AccessLogEntry` shape
/// (`ando-observability::access_log`) but trimmed to this gateway's fields —
/// no upstream address or route id, since there is exactly one route shape
/// and no upstream proxying.
#[derive(Debug, Serialize)]
pub struct AccessLogEntry {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: f64,
}

/// Emits one structured `info` event per resolved request. Unlike the
/// teacher's `VictoriaLogsExporter`, this has no network sink to batch and
/// flush to — spec.md's non-goals exclude metrics, so this is the full
/// extent of request logging.
pub fn log_access(entry: &AccessLogEntry) {
    info!(
        method = %entry.method,
        path = %entry.path,
        status = entry.status,
        latency_ms = entry.latency_ms,
        "access"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_access_does_not_panic() {
        log_access(&AccessLogEntry {
            method: "GET".to_string(),
            path: "/garbados.hashbase.io/icons/favicon.ico".to_string(),
            status: 200,
            latency_ms: 1.5,
        });
    }
}
