//! API gateway configuration.
//!
//! For now this only configures the HTTP listen address. The underlying
//! marketplace configuration is taken from `market::MarketConfig::from_env()`.

use std::net::SocketAddr;

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Bind to all interfaces so the container port mapping is reachable
        // from the host when running under docker-compose.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self { listen_addr: addr }
    }
}

impl ApiConfig {
    /// Builds the config from defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(addr) = std::env::var("API_LISTEN_ADDR") {
            match addr.parse() {
                Ok(parsed) => cfg.listen_addr = parsed,
                Err(e) => tracing::warn!("ignoring invalid API_LISTEN_ADDR {addr:?}: {e}"),
            }
        }
        cfg
    }
}
