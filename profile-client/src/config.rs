//! Resolver configuration.
//!
//! Configuration is loaded from a TOML file; every field has a default.

use profile_core::RecencyPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Relays queried when no list is configured, in priority order.
pub const DEFAULT_RELAYS: [&str; 3] = [
    "wss://relay.nostr.band",
    "wss://relay-jp.nostr.wirednet.jp/",
    "wss://relay.damus.io",
];

/// Configuration for [`ProfileResolver`](crate::ProfileResolver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Relay URLs, highest priority first.
    #[serde(default = "default_relays")]
    pub relays: Vec<String>,
    /// Seconds to wait for EOSE after sending REQ (default: 5).
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
    /// Seconds allowed for opening a relay connection (default: 5).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// How incoming events compete with stored profiles.
    #[serde(default)]
    pub recency: RecencyPolicy,
}

fn default_relays() -> Vec<String> {
    DEFAULT_RELAYS.iter().map(|url| url.to_string()).collect()
}

fn default_response_timeout_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            relays: default_relays(),
            response_timeout_secs: default_response_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            recency: RecencyPolicy::default(),
        }
    }
}

impl ResolverConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// invalid value.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the relay list.
    pub fn with_relays<I, S>(mut self, relays: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relays = relays.into_iter().map(Into::into).collect();
        self
    }

    /// Set the response timeout in seconds.
    pub fn with_response_timeout(mut self, secs: u64) -> Self {
        self.response_timeout_secs = secs;
        self
    }

    /// Set the connect timeout in seconds.
    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    /// Set the recency policy.
    pub fn with_recency(mut self, recency: RecencyPolicy) -> Self {
        self.recency = recency;
        self
    }

    /// Response timeout as a duration.
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Reject values the resolver cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relays.is_empty() {
            return Err(ConfigError::Invalid("relay list is empty".into()));
        }
        if let Some(blank) = self.relays.iter().find(|url| url.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("blank relay url: {:?}", blank)));
        }
        if self.response_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "response_timeout_secs must be at least 1".into(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = ResolverConfig::default();
        assert_eq!(config.relays.len(), 3);
        assert_eq!(config.relays[0], "wss://relay.nostr.band");
        assert_eq!(config.response_timeout(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.recency, RecencyPolicy::LastWriteWins);
        config.validate().unwrap();
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
relays = ["wss://a.example", "wss://b.example"]
response_timeout_secs = 2
recency = "newest-wins"
"#;

        let config: ResolverConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.relays, vec!["wss://a.example", "wss://b.example"]);
        assert_eq!(config.response_timeout_secs, 2);
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.recency, RecencyPolicy::NewestWins);
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let config: ResolverConfig = toml::from_str("").unwrap();
        assert_eq!(config, ResolverConfig::default());
    }

    #[test]
    fn builder_pattern() {
        let config = ResolverConfig::default()
            .with_relays(["wss://only.example"])
            .with_response_timeout(9)
            .with_connect_timeout(3)
            .with_recency(RecencyPolicy::NewestWins);

        assert_eq!(config.relays, vec!["wss://only.example"]);
        assert_eq!(config.response_timeout_secs, 9);
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.recency, RecencyPolicy::NewestWins);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let empty = ResolverConfig::default().with_relays(Vec::<String>::new());
        assert!(matches!(empty.validate(), Err(ConfigError::Invalid(_))));

        let blank = ResolverConfig::default().with_relays(["  "]);
        assert!(blank.validate().is_err());

        let zero = ResolverConfig::default().with_response_timeout(0);
        assert!(zero.validate().is_err());

        let zero = ResolverConfig::default().with_connect_timeout(0);
        assert!(zero.validate().is_err());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "relays = [\"wss://file.example\"]").unwrap();

        let config = ResolverConfig::from_file(file.path()).unwrap();
        assert_eq!(config.relays, vec!["wss://file.example"]);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "relays = []").unwrap();
        assert!(matches!(
            ResolverConfig::from_file(bad.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn from_file_reports_missing_and_malformed() {
        let missing = ResolverConfig::from_file(Path::new("/nonexistent/resolver.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "relays = 12").unwrap();
        assert!(matches!(
            ResolverConfig::from_file(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
