use crate::constants::*;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Process-wide configuration. Loaded once at startup and shared read-only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub fetch: FetchConfig,
    pub import: ImportConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub base_url: String,
    /// Never read from the config file in production; prefer `BROKER_API_TOKEN`.
    pub api_token: Option<String>,
    pub facebook_event_profile: String,
    pub facebook_search_profile: String,
    pub eventbrite_profile: String,
    pub max_search_results: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_page_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub request_deadline_secs: u64,
    pub processing_buffer_secs: u64,
    pub item_concurrency: usize,
    /// Additional hosts imported through their OpenGraph tags.
    pub opengraph_hosts: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Local libSQL file. Ignored unless built with the `db` feature.
    pub db_path: Option<String>,
    pub libsql_url: Option<String>,
    pub libsql_auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BROKER_BASE_URL.to_string(),
            api_token: None,
            facebook_event_profile: DEFAULT_FACEBOOK_EVENT_PROFILE.to_string(),
            facebook_search_profile: DEFAULT_FACEBOOK_SEARCH_PROFILE.to_string(),
            eventbrite_profile: DEFAULT_EVENTBRITE_PROFILE.to_string(),
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            timeout_secs: DEFAULT_BROKER_TIMEOUT_SECS,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: DEFAULT_PAGE_FETCH_TIMEOUT_SECS,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            request_deadline_secs: DEFAULT_REQUEST_DEADLINE_SECS,
            processing_buffer_secs: DEFAULT_PROCESSING_BUFFER_SECS,
            item_concurrency: DEFAULT_ITEM_CONCURRENCY,
            opengraph_hosts: DEFAULT_OPENGRAPH_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }
}

impl ImporterConfig {
    /// Loads `config.toml` (if present), applies environment overrides and validates.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH), |key| std::env::var(key).ok())
    }

    /// Loads from an explicit path. A missing file yields the defaults.
    pub fn load_from<F>(path: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str::<ImporterConfig>(&content)?
        } else {
            ImporterConfig::default()
        };

        config.apply_env(env)?;
        config.normalize_hosts();
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("BROKER_API_TOKEN") {
            self.broker.api_token = Some(token);
        }
        if let Some(base) = non_empty("BROKER_BASE_URL") {
            self.broker.base_url = base;
        }
        if let Some(port) = non_empty("IMPORTER_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("IMPORTER_PORT is not a port: {port}")))?;
        }
        if let Some(path) = non_empty("IMPORTER_DB_PATH") {
            self.storage.db_path = Some(path);
        }
        if let Some(url) = non_empty("LIBSQL_URL") {
            self.storage.libsql_url = Some(url);
        }
        if let Some(token) = non_empty("LIBSQL_AUTH_TOKEN") {
            self.storage.libsql_auth_token = Some(token);
        }
        Ok(())
    }

    fn normalize_hosts(&mut self) {
        let mut hosts: Vec<String> = self
            .import
            .opengraph_hosts
            .iter()
            .map(|h| {
                let h = h.trim().to_ascii_lowercase();
                h.strip_prefix("www.").map(str::to_string).unwrap_or(h)
            })
            .filter(|h| !h.is_empty())
            .collect();
        hosts.sort();
        hosts.dedup();
        self.import.opengraph_hosts = hosts;
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.timeout_secs == 0 || self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.broker.timeout_secs >= self.import.request_deadline_secs {
            return Err(ConfigError::Invalid(format!(
                "broker.timeout_secs ({}) must be shorter than import.request_deadline_secs ({})",
                self.broker.timeout_secs, self.import.request_deadline_secs
            )));
        }
        if self.fetch.timeout_secs >= self.import.request_deadline_secs {
            return Err(ConfigError::Invalid(format!(
                "fetch.timeout_secs ({}) must be shorter than import.request_deadline_secs ({})",
                self.fetch.timeout_secs, self.import.request_deadline_secs
            )));
        }
        if self.import.item_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "import.item_concurrency must be at least 1".to_string(),
            ));
        }
        if self.broker.max_search_results == 0 {
            return Err(ConfigError::Invalid(
                "broker.max_search_results must be at least 1".to_string(),
            ));
        }
        if url::Url::parse(&self.broker.base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "broker.base_url is not a valid URL: {}",
                self.broker.base_url
            )));
        }
        Ok(())
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.import.request_deadline_secs)
    }

    pub fn processing_buffer(&self) -> Duration {
        Duration::from_secs(self.import.processing_buffer_secs)
    }

    pub fn broker_timeout(&self) -> Duration {
        Duration::from_secs(self.broker.timeout_secs)
    }

    pub fn page_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }
}
