//! Probe configuration
//!
//! Configuration comes from an optional TOML file, then command-line flags
//! override individual fields. Every section is optional:
//!
//! ```toml
//! [target]
//! host = "broker.example.com"
//! port = 1883
//!
//! [credentials]
//! username_env = "MQTT_USERNAME"
//! password_env = "MQTT_PASSWORD"
//!
//! [timeouts]
//! dial_timeout_ms = 10000
//! read_timeout_ms = 20000
//! sys_echo_wait_ms = 1000
//! ```

use crate::protocol::Credentials;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Credential strings are length-prefixed with a u16 on the wire
pub const MAX_CREDENTIAL_LEN: usize = 0xFFFF;

/// Top-level probe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    #[serde(default)]
    pub target: TargetSection,
    #[serde(default)]
    pub credentials: CredentialsSection,
    #[serde(default)]
    pub timeouts: TimeoutSection,
}

/// Broker address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

/// Optional credentials, given literally or through environment variables
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CredentialsSection {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Environment variable containing the username
    pub username_env: Option<String>,
    /// Environment variable containing the password
    pub password_env: Option<String>,
}

/// Network deadlines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutSection {
    /// TCP dial timeout (default: 10s)
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
    /// Deadline for every individual read (default: 20s)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Pause before reading back a retained `$SYS` publish (default: 1s)
    #[serde(default = "default_sys_echo_wait_ms")]
    pub sys_echo_wait_ms: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            dial_timeout_ms: default_dial_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            sys_echo_wait_ms: default_sys_echo_wait_ms(),
        }
    }
}

fn default_dial_timeout_ms() -> u64 {
    10_000
}

fn default_read_timeout_ms() -> u64 {
    20_000
}

fn default_sys_echo_wait_ms() -> u64 {
    1_000
}

impl TimeoutSection {
    pub fn dial(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn sys_echo_wait(&self) -> Duration {
        Duration::from_millis(self.sys_echo_wait_ms)
    }
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("{field} is {len} bytes, must be shorter than 65536")]
    CredentialTooLong { field: &'static str, len: usize },
    #[error("A password requires a username")]
    PasswordWithoutUsername,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ProbeConfig {
    /// Configuration targeting `host:port` with default timeouts and no credentials
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            target: TargetSection {
                host: host.into(),
                port,
            },
            ..Default::default()
        }
    }

    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ProbeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// `host:port` string used for dialing, with IPv6 literals bracketed
    pub fn target(&self) -> String {
        let host = &self.target.host;
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.target.port)
        } else {
            format!("{host}:{}", self.target.port)
        }
    }

    fn resolve(literal: Option<&String>, env_var: Option<&String>) -> Option<String> {
        literal
            .cloned()
            .or_else(|| env_var.and_then(|name| std::env::var(name).ok()))
    }

    /// Username, from the literal value or its environment variable
    pub fn username(&self) -> Option<String> {
        Self::resolve(
            self.credentials.username.as_ref(),
            self.credentials.username_env.as_ref(),
        )
    }

    /// Password, from the literal value or its environment variable
    pub fn password(&self) -> Option<String> {
        Self::resolve(
            self.credentials.password.as_ref(),
            self.credentials.password_env.as_ref(),
        )
    }

    /// Credentials for CONNECT; `None` means anonymous
    ///
    /// An empty username counts as anonymous.
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username().filter(|name| !name.is_empty())?;
        Some(Credentials::new(username, self.password().unwrap_or_default()))
    }

    /// Check every constraint that must hold before probing starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "target host must not be empty".to_string(),
            ));
        }

        let username = self.username().unwrap_or_default();
        let password = self.password().unwrap_or_default();

        if username.len() > MAX_CREDENTIAL_LEN {
            return Err(ConfigError::CredentialTooLong {
                field: "username",
                len: username.len(),
            });
        }
        if password.len() > MAX_CREDENTIAL_LEN {
            return Err(ConfigError::CredentialTooLong {
                field: "password",
                len: password.len(),
            });
        }
        if username.is_empty() && !password.is_empty() {
            return Err(ConfigError::PasswordWithoutUsername);
        }

        let timeouts = &self.timeouts;
        if timeouts.dial_timeout_ms == 0 || timeouts.read_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "dial and read timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[target]
host = "broker.example.com"
port = 8883

[credentials]
username = "probe"
password = "secret"

[timeouts]
dial_timeout_ms = 5000
read_timeout_ms = 2000
sys_echo_wait_ms = 500
"#;

        let config: ProbeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.target.host, "broker.example.com");
        assert_eq!(config.target.port, 8883);
        assert_eq!(
            config.credentials(),
            Some(Credentials::new("probe", "secret"))
        );
        assert_eq!(config.timeouts.dial(), Duration::from_secs(5));
        assert_eq!(config.timeouts.read(), Duration::from_secs(2));
        assert_eq!(config.timeouts.sys_echo_wait(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ProbeConfig = toml::from_str("").unwrap();
        assert_eq!(config.target.host, "localhost");
        assert_eq!(config.target.port, 1883);
        assert_eq!(config.timeouts.dial(), Duration::from_secs(10));
        assert_eq!(config.timeouts.read(), Duration::from_secs(20));
        assert_eq!(config.timeouts.sys_echo_wait(), Duration::from_secs(1));
        assert_eq!(config.credentials(), None);
        assert_eq!(config, ProbeConfig::default());
    }

    #[test]
    fn test_target_formatting() {
        assert_eq!(ProbeConfig::new("localhost", 1883).target(), "localhost:1883");
        assert_eq!(ProbeConfig::new("::1", 1884).target(), "[::1]:1884");
        assert_eq!(ProbeConfig::new("[::1]", 1884).target(), "[::1]:1884");
    }

    #[test]
    fn test_empty_username_is_anonymous() {
        let mut config = ProbeConfig::new("localhost", 1883);
        config.credentials.username = Some(String::new());
        assert_eq!(config.credentials(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_username_without_password() {
        let mut config = ProbeConfig::new("localhost", 1883);
        config.credentials.username = Some("probe".to_string());
        assert_eq!(config.credentials(), Some(Credentials::new("probe", "")));
    }

    #[test]
    fn test_credential_length_bound() {
        let mut config = ProbeConfig::new("localhost", 1883);
        config.credentials.username = Some("u".repeat(MAX_CREDENTIAL_LEN));
        config.credentials.password = Some("p".repeat(MAX_CREDENTIAL_LEN));
        assert!(config.validate().is_ok());

        config.credentials.username = Some("u".repeat(MAX_CREDENTIAL_LEN + 1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CredentialTooLong { field: "username", len: 65536 })
        ));

        config.credentials.username = Some("probe".to_string());
        config.credentials.password = Some("p".repeat(MAX_CREDENTIAL_LEN + 1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CredentialTooLong { field: "password", .. })
        ));
    }

    #[test]
    fn test_password_without_username_rejected() {
        let mut config = ProbeConfig::new("localhost", 1883);
        config.credentials.password = Some("secret".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PasswordWithoutUsername)
        ));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = ProbeConfig::new("localhost", 1883);
        config.timeouts.read_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_host_rejected() {
        let config = ProbeConfig::new("  ", 1883);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_literal_username_wins_over_env() {
        let mut config = ProbeConfig::new("localhost", 1883);
        config.credentials.username = Some("literal".to_string());
        config.credentials.username_env = Some("MQTTINFO_TEST_UNUSED_USER_VAR".to_string());
        assert_eq!(config.username().as_deref(), Some("literal"));
    }
}
