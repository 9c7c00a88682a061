//! Configuration loader and validator for the Drive→Notion reading list sync.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const ENV_NOTION_KEY: &str = "NOTION_KEY";
pub const ENV_NOTION_PAGE_ID: &str = "NOTION_PAGE_ID";
pub const ENV_DRIVE_FOLDER_ID: &str = "DRIVE_FOLDER_ID";
pub const DOTENV_FILE: &str = ".env";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(".env error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub notion: Notion,
    #[serde(default)]
    pub drive: Drive,
}

/// Notion API settings and the page that hosts the reading list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Notion {
    pub token: String,
    pub version: String,
    pub page_id: String,
    pub database_name: String,
}

impl Default for Notion {
    fn default() -> Self {
        Self {
            token: String::new(),
            version: "2022-06-28".into(),
            page_id: String::new(),
            database_name: "Reading List".into(),
        }
    }
}

/// Google Drive settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Drive {
    pub folder_id: String,
    pub client_secret_path: String,
    pub token_path: String,
}

impl Default for Drive {
    fn default() -> Self {
        Self {
            folder_id: String::new(),
            client_secret_path: "credentials.json".into(),
            token_path: "token.json".into(),
        }
    }
}

impl Config {
    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from a dotenv file. Returns `false` when the file does
    /// not exist. The process environment is left untouched.
    pub fn apply_env_file(&mut self, path: &Path) -> Result<bool, ConfigError> {
        let iter = match dotenvy::from_path_iter(path) {
            Ok(iter) => iter,
            Err(err) if err.not_found() => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        let vars = iter.collect::<Result<HashMap<String, String>, _>>()?;
        self.apply_env_from(|key| vars.get(key).cloned());
        Ok(true)
    }

    /// Overlay values using `lookup`; unset or blank variables leave the file value alone.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_NOTION_KEY) {
            self.notion.token = v;
        }
        if let Some(v) = get(ENV_NOTION_PAGE_ID) {
            self.notion.page_id = v;
        }
        if let Some(v) = get(ENV_DRIVE_FOLDER_ID) {
            self.drive.folder_id = v;
        }
    }

    /// Names of the required service values that are still empty.
    /// These are not rejected here; the first request that needs them fails.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.notion.token.trim().is_empty() {
            missing.push(ENV_NOTION_KEY);
        }
        if self.notion.page_id.trim().is_empty() {
            missing.push(ENV_NOTION_PAGE_ID);
        }
        if self.drive.folder_id.trim().is_empty() {
            missing.push(ENV_DRIVE_FOLDER_ID);
        }
        missing
    }
}

/// Load configuration from a YAML file, overlay `.env` from the working
/// directory, then the process environment, and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - A missing file (YAML or `.env`) is not an error.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut cfg = load_file(path)?;
    cfg.apply_env_file(Path::new(DOTENV_FILE))?;
    cfg.apply_env();
    validate(&cfg)?;
    Ok(cfg)
}

fn load_file(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.notion.version.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.version must be non-empty"));
    }
    if cfg.notion.database_name.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.database_name must be non-empty"));
    }
    if cfg.drive.client_secret_path.trim().is_empty() {
        return Err(ConfigError::Invalid("drive.client_secret_path must be non-empty"));
    }
    if cfg.drive.token_path.trim().is_empty() {
        return Err(ConfigError::Invalid("drive.token_path must be non-empty"));
    }
    Ok(())
}

/// Returns the example YAML content.
pub fn example() -> &'static str {
    r#"notion:
  token: "YOUR_NOTION_INTEGRATION_TOKEN"
  version: "2022-06-28"
  page_id: "NOTION_PAGE_ID"
  database_name: "Reading List"

drive:
  folder_id: "DRIVE_FOLDER_ID"
  client_secret_path: "credentials.json"
  token_path: "token.json"
"#
}
