use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_CONFIG_PATH: &str = "/etc/suntikd.conf";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_ELECTION_NAME: &str = "injector-client";
const DEFAULT_TRACING_FILTER: &str = "info";

/// Controller settings, loadable from a `key = value` file with environment
/// overrides (`SUNTIK_*`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed timeout applied to every agent request.
    pub request_timeout: Duration,
    /// Election resource name shared by all controller replicas.
    pub election_name: String,
    /// Optional topology JSON loaded into the in-memory graph at startup.
    pub topology_path: Option<PathBuf>,
    pub tracing_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            election_name: DEFAULT_ELECTION_NAME.to_string(),
            topology_path: None,
            tracing_filter: DEFAULT_TRACING_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        std::env::var("SUNTIK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load from a config file when present, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Config::default();

        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    config.apply(key.trim(), value.trim())?;
                }
            }
        }

        if let Ok(val) = std::env::var("SUNTIK_REQUEST_TIMEOUT_MS") {
            config.apply("request_timeout_ms", &val)?;
        }
        if let Ok(val) = std::env::var("SUNTIK_ELECTION_NAME") {
            config.apply("election_name", &val)?;
        }
        if let Ok(val) = std::env::var("SUNTIK_TOPOLOGY_PATH") {
            config.apply("topology_path", &val)?;
        }
        if let Ok(val) = std::env::var("SUNTIK_TRACING_FILTER") {
            config.apply("tracing_filter", &val)?;
        }

        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "request_timeout_ms" => {
                let ms: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid request_timeout_ms: {value}"))?;
                self.request_timeout = Duration::from_millis(ms);
            }
            "election_name" => self.election_name = value.to_string(),
            "topology_path" => self.topology_path = Some(PathBuf::from(value)),
            "tracing_filter" => self.tracing_filter = value.to_string(),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.election_name, "injector-client");
        assert!(config.topology_path.is_none());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/suntikd.conf")).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn key_value_lines_are_applied() {
        let mut config = Config::default();
        config.apply("request_timeout_ms", "2500").unwrap();
        config.apply("election_name", "pi-client").unwrap();
        config.apply("topology_path", "/var/lib/suntik/topology.json").unwrap();
        config.apply("unknown_key", "ignored").unwrap();

        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.election_name, "pi-client");
        assert_eq!(
            config.topology_path.as_deref(),
            Some(Path::new("/var/lib/suntik/topology.json"))
        );
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let mut config = Config::default();
        assert!(config.apply("request_timeout_ms", "soon").is_err());
    }
}
