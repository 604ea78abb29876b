//! Client and controller configuration

use crate::{delivery::DeliveryOrigin, Error, Result, ORIGINAL_QUALITY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default registry API base
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";

/// Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the video registry API
    pub api_base_url: String,
    /// Origin that serves rendition streams. Derived from `api_base_url`
    /// when unset.
    pub delivery_origin: Option<String>,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            delivery_origin: None,
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            user_agent: format!("vidplay/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at a specific API base
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Default::default()
        }
    }

    /// Set an explicit delivery origin
    pub fn with_delivery_origin(mut self, origin: impl Into<String>) -> Self {
        self.delivery_origin = Some(origin.into());
        self
    }

    /// Load configuration from a JSON file. Missing fields keep defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed API base URL
    pub fn api_base(&self) -> Result<Url> {
        let url = Url::parse(self.api_base_url.trim_end_matches('/'))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "API base must be http(s): {}",
                self.api_base_url
            )));
        }
        Ok(url)
    }

    /// Configured delivery origin, or the one serving the API base
    pub fn delivery_origin(&self) -> Result<DeliveryOrigin> {
        match &self.delivery_origin {
            Some(origin) => DeliveryOrigin::parse(origin),
            None => DeliveryOrigin::from_api_base(&self.api_base()?),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.api_base()?;
        self.delivery_origin()?;
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Playback controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Rendition selected on open when the video offers it
    pub default_quality: String,
    /// When a captured position lies past the end of the target rendition,
    /// the seek lands this many seconds before its end
    pub clamp_margin_secs: f64,
    /// Controller mailbox capacity
    pub command_buffer: usize,
    /// Playback event channel capacity
    pub event_buffer: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_quality: ORIGINAL_QUALITY.to_string(),
            clamp_margin_secs: 0.0,
            command_buffer: 64,
            event_buffer: 256,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_quality.trim().is_empty() {
            return Err(Error::InvalidConfig("default_quality must not be empty".into()));
        }
        if !self.clamp_margin_secs.is_finite() || self.clamp_margin_secs < 0.0 {
            return Err(Error::InvalidConfig("clamp_margin_secs must be >= 0".into()));
        }
        if self.command_buffer == 0 || self.event_buffer == 0 {
            return Err(Error::InvalidConfig("channel capacities must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8080/api");
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.delivery_origin().unwrap().to_string(), "http://localhost:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_origin_wins() {
        let config = ClientConfig::new("http://api.internal:8080/api")
            .with_delivery_origin("https://media.example.com");
        assert_eq!(config.delivery_origin().unwrap().to_string(), "https://media.example.com");
    }

    #[test]
    fn test_invalid_client_config() {
        assert!(ClientConfig::new("ftp://example.com/api").validate().is_err());
        assert!(ClientConfig::new("http://x/api")
            .with_delivery_origin("http://x/media")
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api_base_url": "http://registry:9000/api", "request_timeout_ms": 5000}}"#
        )
        .unwrap();

        let config = ClientConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.api_base_url, "http://registry:9000/api");
        assert_eq!(config.request_timeout_ms, 5000);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_controller_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.default_quality, "original");
        assert!(config.validate().is_ok());

        let bad = ControllerConfig { clamp_margin_secs: -1.0, ..Default::default() };
        assert!(bad.validate().is_err());
    }
}
