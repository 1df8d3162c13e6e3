use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Per-file upload ceiling in MB
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: usize,

    /// Whole request body ceiling in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Rate limit: requests per window per client
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// Rate limit window length in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Upper bound on tracked clients in the rate-limit store
    #[serde(default = "default_rate_limit_max_clients")]
    pub rate_limit_max_clients: usize,

    /// Origins echoed back in CORS responses. The first one is the fallback.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Header carrying the client address set by a trusted proxy,
    /// e.g. `cf-connecting-ip`. Unset means use the peer address.
    #[serde(default)]
    pub client_ip_header: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Metrics endpoint enabled
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_file_size_mb: default_max_file_size_mb(),
            max_body_size_mb: default_max_body_size_mb(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            rate_limit_max_clients: default_rate_limit_max_clients(),
            allowed_origins: default_allowed_origins(),
            client_ip_header: None,
            log_level: default_log_level(),
            metrics_enabled: default_true(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `.env`, an optional `server.*` file and
    /// `FILEKIT_SERVER__*` environment variables, in increasing precedence.
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("server").required(false))
            .add_source(
                config::Environment::with_prefix("FILEKIT_SERVER")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins"),
            );

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the gateway refuse every request
    /// or accept unbounded uploads.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.max_file_size_mb == 0 {
            anyhow::bail!("max_file_size_mb must be greater than zero");
        }
        if self.max_body_size_mb < self.max_file_size_mb {
            anyhow::bail!(
                "max_body_size_mb ({}) must be at least max_file_size_mb ({})",
                self.max_body_size_mb,
                self.max_file_size_mb
            );
        }
        if self.rate_limit_per_minute == 0 {
            anyhow::bail!("rate_limit_per_minute must be greater than zero");
        }
        if self.rate_limit_window_secs == 0 {
            anyhow::bail!("rate_limit_window_secs must be greater than zero");
        }
        if self.rate_limit_max_clients == 0 {
            anyhow::bail!("rate_limit_max_clients must be greater than zero");
        }
        if self.allowed_origins.is_empty() {
            anyhow::bail!("allowed_origins must list at least one origin");
        }
        Ok(())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Per-file ceiling in bytes
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_file_size_mb() -> usize {
    50
}

fn default_max_body_size_mb() -> usize {
    256
}

fn default_rate_limit_per_minute() -> u32 {
    60
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_rate_limit_max_clients() -> usize {
    100_000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://easypdfkit.org".to_string(),
        "https://www.easypdfkit.org".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.max_file_size(), 50 * 1024 * 1024);
        assert_eq!(cfg.rate_limit_per_minute, 60);
        assert_eq!(cfg.rate_limit_window(), Duration::from_secs(60));
        assert_eq!(cfg.allowed_origins[0], "https://easypdfkit.org");
        assert!(cfg.client_ip_header.is_none());
        assert!(cfg.metrics_enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = ServerConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_validate_rejects_degenerate_limits() {
        let cfg = ServerConfig {
            rate_limit_per_minute: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ServerConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ServerConfig {
            allowed_origins: Vec::new(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ServerConfig {
            max_file_size_mb: 64,
            max_body_size_mb: 32,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: ServerConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"{"port": 9000, "client_ip_header": "cf-connecting-ip"}"#,
                config::FileFormat::Json,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.client_ip_header.as_deref(), Some("cf-connecting-ip"));
        assert_eq!(cfg.max_file_size_mb, 50);
    }
}
