use anyhow::{bail, Context, Result};
use chrono::Duration;
use directories::ProjectDirs;
use pomonote_ipc::{RecoveryDecision, SOCKET_PATH};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Root of the note vault.
    pub vault_dir: PathBuf,
    pub sessions_folder: String,
    pub tasks_folder: String,
    pub pomodoro_minutes: u32,
    pub tick_interval_secs: u64,
    pub snapshot_interval_secs: u64,
    pub notifications: bool,
    pub recovery: RecoveryPolicy,
    pub socket_path: PathBuf,
    pub log_level: String,
}

/// What to do at startup with an unfinished session from a crash.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Keep it pending until someone decides over IPC.
    #[default]
    Prompt,
    Resume,
    Abandon,
    Ignore,
}

impl RecoveryPolicy {
    pub fn decision(&self) -> Option<RecoveryDecision> {
        match self {
            RecoveryPolicy::Prompt => None,
            RecoveryPolicy::Resume => Some(RecoveryDecision::Resume),
            RecoveryPolicy::Abandon => Some(RecoveryDecision::Abandon),
            RecoveryPolicy::Ignore => Some(RecoveryDecision::Ignore),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let vault_dir = directories::UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(|d| d.join("Vault")))
            .unwrap_or_else(|| PathBuf::from("Vault"));
        Self {
            vault_dir,
            sessions_folder: "Pomodoro/Sessions".to_string(),
            tasks_folder: "Tasks".to_string(),
            pomodoro_minutes: 25,
            tick_interval_secs: 1,
            snapshot_interval_secs: 5,
            notifications: true,
            recovery: RecoveryPolicy::Prompt,
            socket_path: PathBuf::from(SOCKET_PATH),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn pomodoro(&self) -> Duration {
        Duration::minutes(i64::from(self.pomodoro_minutes))
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_interval_secs)
    }

    pub fn snapshot_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pomodoro_minutes == 0 {
            bail!("pomodoro_minutes must be greater than zero");
        }
        if self.tick_interval_secs == 0 || self.snapshot_interval_secs == 0 {
            bail!("tick and snapshot intervals must be greater than zero");
        }
        if self.sessions_folder.trim_matches('/').is_empty() {
            bail!("sessions_folder must not be empty");
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "pomonote", "pomonote")
        .map(|proj_dirs| proj_dirs.config_dir().join("pomonote.toml"))
}

/// Loads `path`, or the platform config file when `path` is `None`. A
/// missing default file yields the defaults; a missing explicit file is an
/// error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => parse_file(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => parse_file(&path)?,
            _ => Config::default(),
        },
    };
    config.validate()?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {:?}", path))?;
    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file at {:?}", path))
}
