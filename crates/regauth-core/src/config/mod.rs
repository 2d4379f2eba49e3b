//! Configuration parsing and management.
//!
//! The authority is configured from a TOML file naming the listen address and
//! the accepted tokens. Tokens may also come from a JSON tokens file, an
//! array of `{"token": "..."}` objects, so that the same file can be shared
//! with the clients under test.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// Top-level authority configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorityConfig {
    /// Address the HTTP endpoint binds to.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Tokens accepted inline.
    #[serde(default)]
    pub tokens: Vec<String>,

    /// Optional JSON tokens file, merged with `tokens`.
    #[serde(default)]
    pub tokens_file: Option<PathBuf>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            tokens: Vec::new(),
            tokens_file: None,
        }
    }
}

impl AuthorityConfig {
    /// Load configuration from a TOML file.
    ///
    /// A relative `tokens_file` is resolved against the directory holding
    /// the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut config = Self::from_toml(&content)?;
        if let (Some(tokens_file), Some(dir)) = (config.tokens_file.as_mut(), path.parent()) {
            if tokens_file.is_relative() {
                *tokens_file = dir.join(&*tokens_file);
            }
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or contains unknown keys.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Resolves the full accepted token set: inline tokens plus the tokens
    /// file, deduplicated.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The tokens file cannot be read or parsed
    /// - Any token is empty or whitespace-only
    /// - The resulting set is empty
    pub fn accepted_tokens(&self) -> Result<BTreeSet<String>, ConfigError> {
        let mut tokens: BTreeSet<String> = self.tokens.iter().cloned().collect();
        if let Some(path) = &self.tokens_file {
            tokens.extend(load_tokens_file(path)?);
        }

        if tokens.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "tokens must not be empty or whitespace-only".to_string(),
            ));
        }
        if tokens.is_empty() {
            return Err(ConfigError::Validation(
                "no accepted tokens configured; set `tokens`, `tokens_file`, or pass --token"
                    .to_string(),
            ));
        }
        Ok(tokens)
    }
}

/// One entry of a JSON tokens file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// The accepted token.
    pub token: String,
}

/// Reads a JSON tokens file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of
/// `{"token": "..."}` objects.
pub fn load_tokens_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read(path).map_err(ConfigError::Io)?;
    let entries: Vec<TokenEntry> =
        serde_json::from_slice(&content).map_err(|e| ConfigError::TokensFile {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(entries.into_iter().map(|entry| entry.token).collect())
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading a configuration or tokens file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Tokens file is not valid JSON of the expected shape.
    #[error("failed to parse tokens file {}: {source}", path.display())]
    TokensFile {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = AuthorityConfig::from_toml("").unwrap();
        assert_eq!(config, AuthorityConfig::default());
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            listen = "0.0.0.0:9000"
            tokens = ["abc", "def"]
            tokens_file = "/etc/regauth/tokens.json"
        "#;
        let config = AuthorityConfig::from_toml(toml).unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.tokens, vec!["abc".to_string(), "def".to_string()]);
        assert_eq!(
            config.tokens_file,
            Some(PathBuf::from("/etc/regauth/tokens.json"))
        );
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let result = AuthorityConfig::from_toml("listen_addr = \"127.0.0.1:1\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_rejects_bad_listen_address() {
        let result = AuthorityConfig::from_toml("listen = \"not-an-address\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AuthorityConfig {
            listen: "127.0.0.1:7777".parse().unwrap(),
            tokens: vec!["abc".into()],
            tokens_file: None,
        };
        let toml = config.to_toml().unwrap();
        assert_eq!(AuthorityConfig::from_toml(&toml).unwrap(), config);
    }

    #[test]
    fn test_accepted_tokens_merges_file_and_inline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"token": "from-file"}}, {{"token": "abc"}}]"#).unwrap();

        let config = AuthorityConfig {
            tokens: vec!["abc".into()],
            tokens_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let tokens = config.accepted_tokens().unwrap();
        assert_eq!(
            tokens.into_iter().collect::<Vec<_>>(),
            vec!["abc".to_string(), "from-file".to_string()]
        );
    }

    #[test]
    fn test_accepted_tokens_rejects_empty_set() {
        let result = AuthorityConfig::default().accepted_tokens();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_accepted_tokens_rejects_blank_token() {
        let config = AuthorityConfig {
            tokens: vec!["abc".into(), "   ".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.accepted_tokens(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_tokens_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["bare-string"]"#).unwrap();

        let result = load_tokens_file(file.path());
        assert!(matches!(result, Err(ConfigError::TokensFile { .. })));
    }

    #[test]
    fn test_missing_tokens_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_tokens_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_from_file_resolves_relative_tokens_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tokens.json"), r#"[{"token": "t1"}]"#).unwrap();
        let config_path = dir.path().join("regauth.toml");
        std::fs::write(&config_path, "tokens_file = \"tokens.json\"\n").unwrap();

        let config = AuthorityConfig::from_file(&config_path).unwrap();
        assert_eq!(config.tokens_file, Some(dir.path().join("tokens.json")));
        assert!(config.accepted_tokens().unwrap().contains("t1"));
    }
}
