use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use shared_types::origin_of;
use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::channel::RetryPolicy;

pub const DEFAULT_TEMPLATE_URL: &str = "https://templates.invitations.app/wedding";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub cors: Option<CorsConfig>,
    pub server: Option<ServerConfig>,
    pub templates: Option<TemplatesConfig>,
    pub channel: Option<ChannelConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            cors: Some(CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            }),
            server: Some(ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            }),
            templates: Some(TemplatesConfig::default()),
            channel: Some(ChannelConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TemplatesConfig {
    /// Deployment used when an event has no external template of its own
    pub default_url: String,
    /// Origins of every template deployment we trust to post messages
    #[serde(default)]
    pub known_origins: Vec<String>,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_TEMPLATE_URL.to_string(),
            known_origins: vec!["https://templates.invitations.app".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChannelConfig {
    /// Origin of the host page that embeds template frames
    pub page_origin: String,
    /// Log and allow messages from unexpected origins instead of rejecting
    #[serde(default)]
    pub dev_mode: bool,
    /// Delay before each INVITATION_LOADED send after the frame loads
    #[serde(default = "default_delivery_delays")]
    pub delivery_delays_ms: Vec<u64>,
    /// Manual template reloads allowed per frame session
    #[serde(default = "default_max_reloads")]
    pub max_reloads: u32,
    /// Other host pages that may mount frames (CORS origins are added at startup)
    #[serde(default)]
    pub extra_page_origins: Vec<String>,
    /// Secret the host dashboard sends as `X-Admin-Token` to open moderation sessions
    #[serde(default)]
    pub admin_token: Option<String>,
    /// Frame sessions with no traffic for this long are evicted
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    /// Undrained outbound messages kept per frame session
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

fn default_delivery_delays() -> Vec<u64> {
    vec![0, 500, 1500]
}

fn default_max_reloads() -> u32 {
    3
}

fn default_session_idle_secs() -> u64 {
    30 * 60
}

fn default_outbox_capacity() -> usize {
    64
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            page_origin: "http://localhost:3000".to_string(),
            dev_mode: false,
            delivery_delays_ms: default_delivery_delays(),
            max_reloads: default_max_reloads(),
            extra_page_origins: Vec::new(),
            admin_token: None,
            session_idle_secs: default_session_idle_secs(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

impl ChannelConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_delays_ms(&self.delivery_delays_ms)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// The page origin a frame session trusts. A caller may name its own page
    /// only when it is one of the configured host pages.
    pub fn page_origin_for(&self, requested: Option<&str>) -> Option<String> {
        let Some(requested) = requested else {
            return Some(self.page_origin.clone());
        };
        let requested = origin_of(requested)?;
        std::iter::once(&self.page_origin)
            .chain(&self.extra_page_origins)
            .filter_map(|configured| origin_of(configured))
            .find(|configured| *configured == requested)
    }

    /// Moderation sessions need the configured admin token; none configured
    /// means none are allowed.
    pub fn admits_admin(&self, presented: Option<&str>) -> bool {
        match (self.admin_token.as_deref(), presented) {
            (Some(expected), Some(presented)) => !expected.is_empty() && expected == presented,
            _ => false,
        }
    }
}

impl ApiConfig {
    pub fn load() -> Result<(Self, PathBuf), ConfigError> {
        let config_path = get_config_path();

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Message(format!("Failed to create config directory: {e}"))
            })?;
        }

        // Create default config file if it doesn't exist
        if !config_path.exists() {
            let default_config = toml::to_string(&ApiConfig::default()).map_err(|e| {
                ConfigError::Message(format!("Failed to serialize default config: {e}"))
            })?;
            std::fs::write(&config_path, default_config).map_err(|e| {
                ConfigError::Message(format!("Failed to write default config: {e}"))
            })?;
        }

        let builder = Config::builder()
            .add_source(File::from(config_path.clone()))
            .build()?;

        let config: ApiConfig = builder.try_deserialize()?;

        Ok((config, config_path))
    }

    pub fn templates(&self) -> TemplatesConfig {
        self.templates.clone().unwrap_or_default()
    }

    pub fn channel(&self) -> ChannelConfig {
        self.channel.clone().unwrap_or_default()
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("invitations").join("api.toml")
    } else {
        PathBuf::from("api.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_written_default_config_is_loadable() {
        let text = toml::to_string(&ApiConfig::default()).unwrap();
        let parsed: ApiConfig = toml::from_str(&text).unwrap();
        let channel = parsed.channel();
        assert_eq!(channel.delivery_delays_ms, vec![0, 500, 1500]);
        assert_eq!(channel.max_reloads, 3);
        assert_eq!(parsed.templates().default_url, DEFAULT_TEMPLATE_URL);
    }

    #[test]
    fn test_partial_channel_section_uses_defaults() {
        let parsed: ApiConfig = toml::from_str(
            r#"
[channel]
page_origin = "https://host.example"
"#,
        )
        .unwrap();
        let channel = parsed.channel();
        assert!(!channel.dev_mode);
        assert_eq!(channel.retry_policy().max_attempts(), 3);
    }

    #[test]
    fn test_page_origin_must_be_configured() {
        let channel = ChannelConfig {
            page_origin: "https://host.example.com".to_string(),
            extra_page_origins: vec!["https://dashboard.example.com:443".to_string()],
            ..ChannelConfig::default()
        };
        assert_eq!(channel.page_origin_for(None).as_deref(), Some("https://host.example.com"));
        assert_eq!(
            channel.page_origin_for(Some("https://dashboard.example.com/")).as_deref(),
            Some("https://dashboard.example.com")
        );
        assert_eq!(channel.page_origin_for(Some("https://evil.example.net")), None);
        assert_eq!(channel.page_origin_for(Some("null")), None);
    }

    #[test]
    fn test_admin_needs_configured_token() {
        let mut channel = ChannelConfig::default();
        assert!(!channel.admits_admin(Some("anything")));

        channel.admin_token = Some("host-secret".to_string());
        assert!(channel.admits_admin(Some("host-secret")));
        assert!(!channel.admits_admin(Some("guess")));
        assert!(!channel.admits_admin(None));

        channel.admin_token = Some(String::new());
        assert!(!channel.admits_admin(Some("")));
    }
}
