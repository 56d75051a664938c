use crate::error::{ClientError, ClientResult, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_METRICS_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    #[serde(rename = "serverUrl", default = "default_server_url")]
    pub server_url: String,
    #[serde(
        rename = "requestTimeoutSecs",
        default = "default_request_timeout_secs"
    )]
    pub request_timeout_secs: u64,
    #[serde(
        rename = "metricsPollIntervalSecs",
        default = "default_metrics_poll_interval_secs"
    )]
    pub metrics_poll_interval_secs: u64,
    #[serde(
        rename = "maxConcurrentUploads",
        default = "default_max_concurrent_uploads"
    )]
    pub max_concurrent_uploads: usize,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_metrics_poll_interval_secs() -> u64 {
    DEFAULT_METRICS_POLL_INTERVAL_SECS
}

fn default_max_concurrent_uploads() -> usize {
    DEFAULT_MAX_CONCURRENT_UPLOADS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            metrics_poll_interval_secs: DEFAULT_METRICS_POLL_INTERVAL_SECS,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
        }
    }
}

impl ClientConfig {
    pub fn with_server_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Zero would spin the poller; clamp to one second
    pub fn metrics_poll_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_poll_interval_secs.max(1))
    }

    pub fn upload_permits(&self) -> usize {
        self.max_concurrent_uploads.max(1)
    }

    /// Server URL without a trailing slash so endpoint paths can be appended
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

pub fn get_config_dir() -> ClientResult<PathBuf> {
    dirs::home_dir()
        .map(|home_dir| home_dir.join(".nlq-desk"))
        .ok_or_else(|| ClientError::Config("Could not find home directory".to_string()))
}

pub fn get_config_file_path() -> ClientResult<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn get_logs_dir() -> ClientResult<PathBuf> {
    Ok(get_config_dir()?.join("logs"))
}

pub fn ensure_config_dir() -> ClientResult<()> {
    ensure_private_dir(&get_config_dir()?)
}

pub fn ensure_logs_dir() -> ClientResult<()> {
    ensure_private_dir(&get_logs_dir()?)
}

fn ensure_private_dir(dir: &Path) -> ClientResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;

        // Set permissions to 700 (read/write/execute for owner only) on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = fs::metadata(dir)?.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(dir, permissions)?;
        }
    }
    Ok(())
}

pub fn load_config() -> ClientResult<ClientConfig> {
    ensure_config_dir().context("Failed to prepare config directory")?;
    load_config_from(&get_config_file_path()?)
}

pub fn load_config_from(config_file: &Path) -> ClientResult<ClientConfig> {
    if !config_file.exists() {
        return Ok(ClientConfig::default());
    }

    let content = fs::read_to_string(config_file)?;
    serde_json::from_str(&content)
        .map_err(|e| ClientError::Config(format!("{}: {}", config_file.display(), e)))
}

pub fn save_config(config: &ClientConfig) -> ClientResult<()> {
    ensure_config_dir()?;
    save_config_to(&get_config_file_path()?, config)
}

pub fn save_config_to(config_file: &Path, config: &ClientConfig) -> ClientResult<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(config_file, content)?;

    // Set permissions to 600 (read/write for owner only) on Unix systems
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = fs::metadata(config_file)?.permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(config_file, permissions)?;
    }

    Ok(())
}

pub fn clear_config() -> ClientResult<()> {
    save_config(&ClientConfig::default())
}
