use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;
use crate::domain::notification::OpenNotification;

/// Notifications we left open, in ~/.config/rs_mail_notifier/notifications.json
pub fn default_state_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("notifications.json"))
}

pub fn save_open(path: &Path, open: &[OpenNotification]) -> Result<()> {
    let s = serde_json::to_string_pretty(open)?;
    fs::write(path, s)?;
    Ok(())
}

/// Empty when nothing was saved yet.
pub fn load_open(path: &Path) -> Result<Vec<OpenNotification>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let s = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&s)?)
}
