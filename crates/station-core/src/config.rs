use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cms: CmsConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Headless CMS connection (bearer-token REST API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsConfig {
    #[serde(default = "default_cms_base_url")]
    pub base_url: String,
    /// Bearer token for the CMS API. Empty means anonymous.
    #[serde(default)]
    pub api_token: String,
    /// Default page size for list endpoints.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Ceiling for the one-shot full show-catalog fetch.
    #[serde(default = "default_catalog_page_size")]
    pub catalog_page_size: u32,
}

/// Public calendar feed that drives the broadcast schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_calendar_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub calendar_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_calendar_max_results")]
    pub max_results: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Primary live stream URL.
    #[serde(default)]
    pub url: String,
    /// Low-bitrate variant of the live stream.
    #[serde(default)]
    pub low_bitrate_url: String,
    /// Select the low-bitrate stream at startup (e.g. metered connections).
    #[serde(default)]
    pub low_bitrate: bool,
    /// Station online/offline status endpoint, polled every 30s.
    #[serde(default)]
    pub status_url: String,
    /// Now-playing metadata endpoint, polled every 10s.
    #[serde(default)]
    pub now_playing_url: String,
    /// Label shown when now-playing metadata is unavailable.
    #[serde(default = "default_station_name")]
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chat_channel")]
    pub channel_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub pid_file: PathBuf,
    #[serde(default)]
    pub state_file: PathBuf,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: default_cms_base_url(),
            api_token: String::new(),
            page_size: default_page_size(),
            catalog_page_size: default_catalog_page_size(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            base_url: default_calendar_base_url(),
            calendar_id: String::new(),
            api_key: String::new(),
            max_results: default_calendar_max_results(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            low_bitrate_url: String::new(),
            low_bitrate: false,
            status_url: String::new(),
            now_playing_url: String::new(),
            station_name: default_station_name(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            pid_file: default_pid_file(),
            state_file: default_state_file(),
        }
    }
}

fn default_cms_base_url() -> String {
    "http://127.0.0.1:1337".to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_catalog_page_size() -> u32 {
    100
}

fn default_calendar_base_url() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_calendar_max_results() -> u32 {
    50
}

fn default_station_name() -> String {
    "Station".to_string()
}

fn default_chat_channel() -> String {
    "chatroom".to_string()
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8989
}

fn default_pid_file() -> PathBuf {
    platform::data_dir().join("daemon.pid")
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("state.json")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// The stream URL the daemon should tune, chosen once at startup.
    pub fn live_stream_url(&self) -> &str {
        if self.stream.low_bitrate && !self.stream.low_bitrate_url.is_empty() {
            &self.stream.low_bitrate_url
        } else {
            &self.stream.url
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.http.enabled);
        assert_eq!(config.http.port, 8989);
        assert_eq!(config.http.bind_address, "127.0.0.1");
        assert_eq!(config.cms.page_size, 10);
        assert_eq!(config.cms.catalog_page_size, 100);
        assert_eq!(config.calendar.max_results, 50);
        assert!(config.daemon.state_file.ends_with("station/state.json"));
    }

    #[test]
    fn test_live_stream_url_selection() {
        let mut config = Config::default();
        config.stream.url = "https://streams.example/high".into();
        config.stream.low_bitrate_url = "https://streams.example/low".into();

        assert_eq!(config.live_stream_url(), "https://streams.example/high");

        config.stream.low_bitrate = true;
        assert_eq!(config.live_stream_url(), "https://streams.example/low");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [cms]
            base_url = "https://cms.example"
            api_token = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.cms.base_url, "https://cms.example");
        assert_eq!(config.cms.page_size, 10);
        assert_eq!(config.http.port, 8989);
    }
}
