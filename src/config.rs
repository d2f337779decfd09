// File: ./src/config.rs
// Handles configuration loading, saving, and defaults.
use crate::client::notion::NotionOptions;
use crate::context::AppContext;
use crate::error::ConfigError;
use crate::model::{DEFAULT_LINK_PATTERN, StatusTable};
use crate::storage::LocalStorage;
use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://api.notion.com/v1";

fn default_true() -> bool {
    true
}
fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_link_pattern() -> String {
    DEFAULT_LINK_PATTERN.to_string()
}
fn default_recent_limit() -> usize {
    20
}

fn default_id_property() -> String {
    "ID".to_string()
}
fn default_title_property() -> String {
    "Task name".to_string()
}
fn default_status_property() -> String {
    "Status".to_string()
}
fn default_project_property() -> String {
    "Project".to_string()
}
fn default_project_title_property() -> String {
    "Project name".to_string()
}

/// Names of the database properties the task fields are read from.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PropertyNames {
    #[serde(default = "default_id_property")]
    pub id: String,
    #[serde(default = "default_title_property")]
    pub title: String,
    #[serde(default = "default_status_property")]
    pub status: String,
    #[serde(default = "default_project_property")]
    pub project: String,
    /// Title property of the pages the project relation points to.
    #[serde(default = "default_project_title_property")]
    pub project_title: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            id: default_id_property(),
            title: default_title_property(),
            status: default_status_property(),
            project: default_project_property(),
            project_title: default_project_title_property(),
        }
    }
}

/// Checked credentials for the remote service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub api_token: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub todo_database_id: Option<String>,
    #[serde(default)]
    pub vault_path: Option<PathBuf>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_link_pattern")]
    pub link_pattern: String,
    #[serde(default)]
    pub properties: PropertyNames,
    #[serde(default)]
    pub statuses: StatusTable,

    /// Documents considered when the vault has no workspace file.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    #[serde(default = "default_true")]
    pub desktop_notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            todo_database_id: None,
            vault_path: None,
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            link_pattern: default_link_pattern(),
            properties: PropertyNames::default(),
            statuses: StatusTable::default(),
            recent_limit: default_recent_limit(),
            desktop_notifications: true,
        }
    }
}

impl Config {
    /// Load the configuration from disk using an explicit context.
    pub fn load(ctx: &dyn AppContext) -> Result<Self> {
        let path = ctx.get_config_file_path()?;

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found"));
        }

        let contents = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;

        let config: Config = toml::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
        })?;

        Ok(config)
    }

    /// Whether `err` means the config file does not exist, as opposed to
    /// existing but being unreadable or invalid.
    pub fn is_missing_config_error(err: &Error) -> bool {
        if err.to_string().contains("Config file not found") {
            return true;
        }

        for cause in err.chain() {
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>()
                && io_err.kind() == std::io::ErrorKind::NotFound
            {
                return true;
            }
        }

        false
    }

    /// Save configuration using an explicit context.
    pub fn save(&self, ctx: &dyn AppContext) -> Result<()> {
        let path = ctx.get_config_file_path()?;
        LocalStorage::with_lock(&path, || {
            let toml_str = toml::to_string_pretty(self)?;
            LocalStorage::atomic_write(&path, toml_str)?;
            Ok(())
        })?;
        Ok(())
    }

    pub fn get_path_string(ctx: &dyn AppContext) -> Result<String> {
        let path = ctx.get_config_file_path()?;
        Ok(path.to_string_lossy().to_string())
    }

    /// The token, or a configuration error when it is blank.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let token = self.api_token.trim();
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(Credentials {
            api_token: token.to_string(),
        })
    }

    pub fn database_id(&self) -> Result<&str, ConfigError> {
        self.todo_database_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingDatabase)
    }

    pub fn notion_options(&self) -> NotionOptions {
        NotionOptions {
            base_url: self.api_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            properties: self.properties.clone(),
            user_agent: format!("tasklink/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
