use crate::store::StoreConfig;
use std::net::SocketAddr;

/// HTTP server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            store: StoreConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr.port(), 3000);
        assert!(c.bind_addr.ip().is_unspecified());
        assert_eq!(c.store.path, PathBuf::from("data/logs.json"));
        assert_eq!(c.store.default_collections.len(), 3);
    }
}
