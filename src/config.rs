use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_PER_ACCOUNT: usize = 20;
pub const DEFAULT_QUIET_WINDOW_MS: u64 = 1000;
pub const DEFAULT_PROGRESS_STEP: f64 = 0.05;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub db_path: Option<String>,
    pub socket_path: Option<String>,
    pub max_notifications_per_account: Option<usize>,
    pub quiet_window_ms: Option<u64>,
    pub progress_step: Option<f64>,
    pub app_name: Option<String>,
    pub app_icon: Option<String>,
    /// Program run with a notification button's method and arguments.
    pub action_command: Option<String>,
}

/// What the engine runs with, defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub max_per_account: usize,
    pub quiet_window: Duration,
    pub progress_step: f64,
    pub app_name: String,
    pub app_icon: String,
    pub action_command: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl Config {
    pub fn settings(&self) -> Settings {
        Settings {
            max_per_account: self
                .max_notifications_per_account
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_PER_ACCOUNT),
            quiet_window: Duration::from_millis(
                self.quiet_window_ms.unwrap_or(DEFAULT_QUIET_WINDOW_MS),
            ),
            progress_step: self
                .progress_step
                .filter(|s| (0.0..1.0).contains(s))
                .unwrap_or(DEFAULT_PROGRESS_STEP),
            app_name: self.app_name.clone().unwrap_or_else(|| "Mail".to_string()),
            app_icon: self
                .app_icon
                .clone()
                .unwrap_or_else(|| "mail-unread".to_string()),
            action_command: self.action_command.clone().filter(|c| !c.trim().is_empty()),
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    let p = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("rs_mail_notifier");
    fs::create_dir_all(&p)?;
    Ok(p)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn default_db_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("mail.db"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

/// Read the config, writing a template with the defaults spelled out when
/// there is none yet.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let sample = Config {
            db_path: None,
            socket_path: None,
            max_notifications_per_account: Some(DEFAULT_MAX_PER_ACCOUNT),
            quiet_window_ms: Some(DEFAULT_QUIET_WINDOW_MS),
            progress_step: Some(DEFAULT_PROGRESS_STEP),
            app_name: Some("Mail".to_string()),
            app_icon: Some("mail-unread".to_string()),
            action_command: None,
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(path, tom)?;
        info!("Created template config at {}", path.display());
        return Ok(sample);
    }
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

pub fn resolve_db_path(cfg: &Config) -> Result<PathBuf> {
    if let Some(p) = &cfg.db_path {
        Ok(PathBuf::from(p))
    } else {
        default_db_path()
    }
}
