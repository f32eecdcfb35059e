use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::BridgeError;

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub jira: JiraConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Default project key used when a message does not name one.
    #[serde(default)]
    pub project: String,
    #[serde(default = "default_issue_type_id")]
    pub issue_type_id: String,
    #[serde(default)]
    pub default_completion_criteria: String,
    #[serde(default)]
    pub default_department: String,
    #[serde(default)]
    pub default_module: String,
    #[serde(default)]
    pub default_category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Poll interval in seconds between mailbox scans.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_true")]
    pub mark_as_read: bool,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    /// Lowercase extensions with a leading dot, e.g. ".pdf".
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            mark_as_read: true,
            ledger_path: default_ledger_path(),
        }
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            temp_dir: default_temp_dir(),
            max_size_mb: default_max_size_mb(),
            max_count: default_max_count(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_issue_type_id() -> String {
    "10004".to_string()
}

fn default_check_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("processed_emails.json")
}

fn default_temp_dir() -> PathBuf {
    env::temp_dir().join("jira_bridge_attachments")
}

fn default_max_size_mb() -> u64 {
    10
}

fn default_max_count() -> usize {
    5
}

fn default_allowed_extensions() -> Vec<String> {
    [
        ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt", ".png", ".jpg",
        ".jpeg", ".gif", ".zip",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            BridgeError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        let mut config: BridgeConfig = toml::from_str(&content)?;

        if let Some(username) = env_var_non_empty("JIRA_USERNAME") {
            config.jira.username = username;
        }
        if let Some(password) = env_var_non_empty("JIRA_PASSWORD") {
            config.jira.password = password;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        for (key, value) in [
            ("jira.base_url", &self.jira.base_url),
            ("jira.username", &self.jira.username),
            ("jira.password", &self.jira.password),
            ("jira.project", &self.jira.project),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::Config(format!("{} is not set", key)));
            }
        }
        Ok(())
    }
}

pub fn resolve_config_path() -> Result<PathBuf, BridgeError> {
    if let Some(path) = env_var_non_empty("BRIDGE_CONFIG_PATH") {
        return Ok(PathBuf::from(path));
    }

    let cwd = env::current_dir()?;
    let direct = cwd.join("bridge.toml");
    if direct.exists() {
        return Ok(direct);
    }

    Err(BridgeError::Config(
        "BRIDGE_CONFIG_PATH not set and bridge.toml not found".to_string(),
    ))
}

fn env_var_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
