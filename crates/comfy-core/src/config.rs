//! Client configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Environment variable overriding [`ClientConfig::base_url`].
pub const BASE_URL_ENV: &str = "COMFY_BASE_URL";
/// Environment variable overriding [`ClientConfig::api_prefix`].
pub const API_PREFIX_ENV: &str = "COMFY_API_PREFIX";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_API_PREFIX: &str = "/api-comfy";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Where the gateway lives and under which prefix it forwards to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Gateway origin. Its scheme decides `ws` vs `wss` for the socket.
    pub base_url: String,
    /// Command-base path prefix.
    pub api_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a config for `base_url` with the default prefix.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Override the command-base prefix.
    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Defaults overridden by `COMFY_BASE_URL` / `COMFY_API_PREFIX`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let Ok(prefix) = std::env::var(API_PREFIX_ENV) {
            config.api_prefix = prefix;
        }
        config
    }

    /// Prefix with exactly one leading slash and no trailing slash.
    #[must_use]
    pub fn prefix(&self) -> String {
        let trimmed = self.api_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }

    fn parse_base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.base_url.clone(),
            source,
        })
    }

    /// Socket URL for `identity`: `{ws|wss}://host{prefix}/ws?clientId=...`.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or not http(s)/ws(s).
    pub fn socket_url(&self, identity: &str) -> Result<Url, ConfigError> {
        let mut url = self.parse_base()?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|()| ConfigError::UnsupportedScheme(url.scheme().to_string()))?;
        url.set_path(&format!("{}/ws", self.prefix()));
        url.set_fragment(None);
        url.query_pairs_mut().clear().append_pair("clientId", identity);
        Ok(url)
    }

    /// Absolute URL of a command endpoint, e.g. `command_url("/prompt")`.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid.
    pub fn command_url(&self, path: &str) -> Result<Url, ConfigError> {
        let mut url = self.parse_base()?;
        url.set_path(&format!("{}/{}", self.prefix(), path.trim_start_matches('/')));
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Relative path of the image retrieval endpoint.
    #[must_use]
    pub fn view_path(&self) -> String {
        format!("{}/view", self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_url_mirrors_scheme() {
        let plain = ClientConfig::new("http://localhost:3000");
        assert_eq!(
            plain.socket_url("alice").unwrap().as_str(),
            "ws://localhost:3000/api-comfy/ws?clientId=alice"
        );

        let secure = ClientConfig::new("https://comfy.example.com");
        assert_eq!(
            secure.socket_url("alice").unwrap().as_str(),
            "wss://comfy.example.com/api-comfy/ws?clientId=alice"
        );
    }

    #[test]
    fn test_socket_url_encodes_identity() {
        let config = ClientConfig::default();
        let url = config.socket_url("bob & co").unwrap();
        assert_eq!(url.query(), Some("clientId=bob+%26+co"));
    }

    #[test]
    fn test_socket_url_rejects_other_schemes() {
        let config = ClientConfig::new("ftp://example.com");
        assert!(matches!(
            config.socket_url("a"),
            Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            ClientConfig::new("not a url").socket_url("a"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_prefix_normalization() {
        let config = ClientConfig::default().with_api_prefix("custom/");
        assert_eq!(config.prefix(), "/custom");
        assert_eq!(
            config.command_url("/prompt").unwrap().as_str(),
            "http://127.0.0.1:3000/custom/prompt"
        );
        assert_eq!(config.view_path(), "/custom/view");

        let bare = ClientConfig::default().with_api_prefix("");
        assert_eq!(bare.view_path(), "/view");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url": "https://gpu.local"}"#).unwrap();
        assert_eq!(config.base_url, "https://gpu.local");
        assert_eq!(config.api_prefix, "/api-comfy");
    }
}
