//! Crash snapshot of the timer, rewritten every few seconds.
//!
//! The snapshot only speeds up the first status shown after a restart. The
//! authoritative recovery source is the unfinished-session scan.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use pomonote_ipc::TimerPhase;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub is_active: bool,
    pub phase: TimerPhase,
    pub task_name: Option<String>,
    pub task_path: Option<String>,
    pub session: Option<String>,
    /// Epoch milliseconds.
    pub started_at: Option<i64>,
    pub paused_ms: i64,
    /// Epoch milliseconds.
    pub saved_at: i64,
}

impl TimerSnapshot {
    /// Running time as of `saved_at`.
    pub fn elapsed_ms(&self) -> i64 {
        match self.started_at {
            Some(started_at) if self.is_active => {
                (self.saved_at - started_at - self.paused_ms).max(0)
            }
            _ => 0,
        }
    }
}

pub struct Persistence {
    path: PathBuf,
}

impl Persistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `timer-state.json` in the platform data directory.
    pub fn default_location() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "pomonote", "pomonote")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(Self::new(proj_dirs.data_dir().join("timer-state.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create data directory {:?}", dir))?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<TimerSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        let snapshot = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {:?}", self.path))?;
        Ok(Some(snapshot))
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {:?}", self.path)),
        }
    }
}
