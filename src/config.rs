use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// SQLite file holding the tree snapshot, disc content, favourites and settings
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Device proxy base URL, used until one is saved in settings
    #[serde(default = "default_pi_endpoint")]
    pub pi_endpoint: String,

    #[serde(default = "default_csdb_endpoint")]
    pub csdb_endpoint: String,

    /// Wait between a mount and the stats refresh
    #[serde(default = "default_mount_settle_ms")]
    pub mount_settle_ms: u64,

    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Retries on connection errors and 429/5xx responses
    #[serde(default)]
    pub max_retries: usize,

    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    #[serde(default = "default_true")]
    pub enable_gzip: bool,

    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_bind_address() -> String { "127.0.0.1:8080".to_string() }
fn default_database_path() -> String { "pi1541ui.db".to_string() }
fn default_pi_endpoint() -> String { "http://localhost:8000/proxy".to_string() }
fn default_csdb_endpoint() -> String { "http://localhost:8000/csdb".to_string() }
fn default_mount_settle_ms() -> u64 { 200 }
fn default_true() -> bool { true }
fn default_initial_retry_delay() -> u64 { 500 }
fn default_max_retry_delay() -> u64 { 8000 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_retries: 0,
            initial_retry_delay_ms: default_initial_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
            enable_gzip: true,
            user_agent: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_path: default_database_path(),
            pi_endpoint: default_pi_endpoint(),
            csdb_endpoint: default_csdb_endpoint(),
            mount_settle_ms: default_mount_settle_ms(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<Config>(&content) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("Invalid {}: {}, using defaults", path.display(), e),
                },
                Err(e) => log::warn!("Could not read {}: {}", path.display(), e),
            }
        }
        Self::default()
    }
}

impl HttpConfig {
    /// Create the proxy HTTP client from this configuration
    pub fn create_http_client(&self) -> Result<crate::http_client::ProxyHttpClient, reqwest::Error> {
        use crate::http_client::{HttpClientConfig, ProxyHttpClient};
        use std::time::Duration;

        let defaults = HttpClientConfig::default();
        let config = HttpClientConfig {
            timeout: self.timeout_secs.map(Duration::from_secs),
            max_retries: self.max_retries,
            initial_retry_delay_ms: self.initial_retry_delay_ms,
            max_retry_delay_ms: self.max_retry_delay_ms,
            enable_gzip: self.enable_gzip,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        };

        ProxyHttpClient::with_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
pi_endpoint = "http://pi.local/proxy"

[http]
timeout_secs = 10
"#,
        )
        .unwrap();
        assert_eq!(cfg.pi_endpoint, "http://pi.local/proxy");
        assert_eq!(cfg.csdb_endpoint, "http://localhost:8000/csdb");
        assert_eq!(cfg.mount_settle_ms, 200);
        assert_eq!(cfg.http.timeout_secs, Some(10));
        assert_eq!(cfg.http.max_retries, 0);
        assert!(cfg.http.enable_gzip);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = Config::load_from(Path::new("does/not/exist.toml"));
        assert_eq!(cfg.bind_address, "127.0.0.1:8080");
        assert_eq!(cfg.database_path, "pi1541ui.db");
        assert_eq!(cfg.http.timeout_secs, None);
    }

    #[test]
    fn test_create_http_client() {
        assert!(HttpConfig::default().create_http_client().is_ok());
    }
}
