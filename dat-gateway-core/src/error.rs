use thiserror::Error;

/// Unified error type for dat-gateway.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("resolution failed: {0}")]
    Resolution(String),

    #[error("archive not ready")]
    NotReady,

    #[error("capacity exhausted")]
    Capacity,

    #[error("swarm adapter error: {0}")]
    Adapter(String),

    #[error("client stream error: {0}")]
    ClientStream(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(String),
}

impl GatewayError {
    /// Map to the HTTP status code the front end should return.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Resolution(_) => 500,
            GatewayError::NotReady => 404,
            GatewayError::Capacity => 500,
            GatewayError::Adapter(_) => 500,
            GatewayError::ClientStream(_) => 500,
            GatewayError::Config(_) => 500,
            GatewayError::Io(_) => 500,
        }
    }

    /// Body text for the HTTP response, matching spec.md's literal bodies.
    pub fn body(&self) -> &'static str {
        match self {
            GatewayError::NotReady => "Not found",
            _ => "Server error",
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_maps_to_404_not_found() {
        assert_eq!(GatewayError::NotReady.status_code(), 404);
        assert_eq!(GatewayError::NotReady.body(), "Not found");
    }

    #[test]
    fn other_kinds_map_to_500_server_error() {
        for err in [
            GatewayError::Resolution("x".into()),
            GatewayError::Capacity,
            GatewayError::Adapter("x".into()),
            GatewayError::ClientStream("x".into()),
            GatewayError::Config("x".into()),
            GatewayError::Io("x".into()),
        ] {
            assert_eq!(err.status_code(), 500);
            assert_eq!(err.body(), "Server error");
        }
    }

    #[test]
    fn display_messages_are_readable() {
        assert_eq!(
            GatewayError::Resolution("bad host".into()).to_string(),
            "resolution failed: bad host"
        );
        assert_eq!(GatewayError::NotReady.to_string(), "archive not ready");
    }
}
