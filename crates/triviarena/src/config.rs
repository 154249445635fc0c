//! Environment-driven server configuration.

use std::env;

/// Origins always allowed during development.
const DEV_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on. `PORT`, default 8080.
    pub port: u16,
    /// Extra allowed browser origin. `CLIENT_ORIGIN`.
    pub client_origin: Option<String>,
    /// Production mode masks internal error details in acks.
    /// `TRIVIARENA_ENV=production`.
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            client_origin: None,
            production: false,
        }
    }
}

impl ServerConfig {
    /// Reads configuration from the environment. An unparseable `PORT`
    /// is a startup error — the process should exit non-zero rather
    /// than listen somewhere unexpected.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => 8080,
        };
        let client_origin = env::var("CLIENT_ORIGIN").ok().filter(|s| !s.is_empty());
        let production = env::var("TRIVIARENA_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        Ok(Self {
            port,
            client_origin,
            production,
        })
    }

    /// The full origin allow-list: built-in dev origins plus the
    /// configured one.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> =
            DEV_ORIGINS.iter().map(|s| s.to_string()).collect();
        if let Some(extra) = &self.client_origin {
            origins.push(extra.clone());
        }
        origins
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Startup configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PORT is not a valid port number: {0}")]
    InvalidPort(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins_include_dev_and_configured() {
        let config = ServerConfig {
            client_origin: Some("https://trivia.example".into()),
            ..ServerConfig::default()
        };
        let origins = config.allowed_origins();
        assert!(origins.contains(&"http://localhost:3000".to_string()));
        assert!(origins.contains(&"https://trivia.example".to_string()));
    }

    #[test]
    fn test_default_port() {
        assert_eq!(ServerConfig::default().port, 8080);
        assert_eq!(ServerConfig::default().bind_addr(), "0.0.0.0:8080");
    }
}
