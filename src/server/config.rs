//! HTTP server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Public base URL endpoints are advertised under
    pub domain: String,

    /// Maximum accepted request body size in bytes
    pub max_request_body_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4200,
            domain: "http://localhost:4200".to_string(),
            max_request_body_size: 2048,
        }
    }
}

impl ServerConfig {
    /// Set the listen port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the advertised base URL. A trailing slash is stripped.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.domain = domain.trim_end_matches('/').to_string();
        self
    }

    /// Set the body size cap, with a floor of one byte
    pub fn max_request_body_size(mut self, size: u64) -> Self {
        self.max_request_body_size = size.max(1);
        self
    }

    /// The socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port)
    }
}
