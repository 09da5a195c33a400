//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// QUIC listen address
    pub listen_addr: String,
    /// TLS certificate chain, PEM
    pub cert_path: PathBuf,
    /// TLS private key, PEM
    pub key_path: PathBuf,
    /// Request path answering the upgrade request
    pub secret_path: String,
    /// HTTP Basic credentials; `None` disables the check
    pub credentials: Option<(String, String)>,
    /// Timeout for outbound TCP dials
    pub dial_timeout: Duration,
    /// Replay cache capacity
    pub cache_size: usize,
}

impl ServerConfig {
    /// Create a configuration with the given listen address and defaults
    /// for everything else.
    pub fn new(listen_addr: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            cert_path: PathBuf::from("certs/cert.pem"),
            key_path: PathBuf::from("certs/key.pem"),
            secret_path: "/secret".to_string(),
            credentials: None,
            dial_timeout: Duration::from_secs(30),
            cache_size: 10,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.is_empty() {
            return Err(Error::config("listen address cannot be empty"));
        }
        if !self.secret_path.starts_with('/') {
            return Err(Error::config("secret path must start with '/'"));
        }
        if self.cache_size < 2 {
            return Err(Error::config("sequence cache size must be at least 2"));
        }
        if let Some((user, _)) = &self.credentials {
            if user.is_empty() {
                return Err(Error::config("credentials user cannot be empty"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ServerConfig::new("localhost:6121");
        assert!(config.validate().is_ok());
        assert_eq!(config.secret_path, "/secret");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ServerConfig::new("");
        assert!(config.validate().is_err());

        config = ServerConfig::new("localhost:6121");
        config.secret_path = "secret".to_string();
        assert!(config.validate().is_err());

        config = ServerConfig::new("localhost:6121");
        config.cache_size = 1;
        assert!(config.validate().is_err());

        config = ServerConfig::new("localhost:6121");
        config.credentials = Some((String::new(), "pass".to_string()));
        assert!(config.validate().is_err());
    }
}
