//! Tasks are markdown notes under the tasks folder with a `status` key.

use pomonote_ipc::{TaskInfo, TaskStatus};
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::frontmatter::{
    resolve_note_path, sanitize_file_stem, vault_relative, write_note_atomically, Note,
};

pub trait TaskRepository: Send {
    /// All tasks, or only those with `status`, sorted by path.
    fn list_tasks_by_status(&self, status: Option<TaskStatus>)
        -> Result<Vec<TaskInfo>, StoreError>;

    fn update_status(&mut self, path: &str, status: TaskStatus) -> Result<TaskInfo, StoreError>;

    fn create(&mut self, name: &str) -> Result<TaskInfo, StoreError>;
}

#[derive(Debug, Deserialize)]
struct TaskMeta {
    #[serde(default)]
    status: Option<TaskStatus>,
}

pub struct FileTaskRepository {
    vault: PathBuf,
    folder: String,
}

impl FileTaskRepository {
    pub fn new(vault: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            vault: vault.into(),
            folder: folder.into().trim_matches('/').to_string(),
        }
    }

    fn read(&self, path: &str) -> Result<(PathBuf, Note, TaskInfo), StoreError> {
        let file = resolve_note_path(&self.vault, path)?;
        let text = match fs::read_to_string(&file) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.to_string()))
            }
            Err(e) => return Err(StoreError::io(&file, e)),
        };
        let note = Note::parse(&text)?;
        let meta: TaskMeta = note.decode().map_err(|e| StoreError::Parse {
            path: file.clone(),
            message: e.to_string(),
        })?;
        let name = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path)
            .to_string();
        let info = TaskInfo {
            name,
            path: path.to_string(),
            status: meta.status.unwrap_or(TaskStatus::Todo),
        };
        Ok((file, note, info))
    }

    fn collect(&self, dir: &Path, relative: &str, out: &mut Vec<String>) -> Result<(), StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let child = vault_relative(relative, name);
            if path.is_dir() {
                self.collect(&path, &child, out)?;
            } else if name.ends_with(".md") {
                out.push(child);
            }
        }
        Ok(())
    }
}

impl TaskRepository for FileTaskRepository {
    fn list_tasks_by_status(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<TaskInfo>, StoreError> {
        let mut paths = Vec::new();
        self.collect(&self.vault.join(&self.folder), &self.folder, &mut paths)?;
        paths.sort();

        let mut tasks = Vec::new();
        for path in paths {
            match self.read(&path) {
                Ok((_, _, task)) if status.map_or(true, |s| s == task.status) => tasks.push(task),
                Ok(_) => {}
                Err(e) => warn!(task = %path, error = %e, "skipping unreadable task note"),
            }
        }
        Ok(tasks)
    }

    fn update_status(&mut self, path: &str, status: TaskStatus) -> Result<TaskInfo, StoreError> {
        let (file, mut note, mut task) = self.read(path)?;
        note.set("status", status.as_str());
        let rendered = note.render()?;
        write_note_atomically(&file, &rendered)?;
        info!(task = %path, status = status.as_str(), "task status updated");
        task.status = status;
        Ok(task)
    }

    fn create(&mut self, name: &str) -> Result<TaskInfo, StoreError> {
        let stem = sanitize_file_stem(name);
        if stem.is_empty() {
            return Err(StoreError::Rejected("task name is empty".to_string()));
        }
        let dir = self.vault.join(&self.folder);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let file_name = format!("{stem}.md");
        let path = vault_relative(&self.folder, &file_name);
        let file = dir.join(&file_name);

        let mut note = Note::new(format!("# {}\n", name.trim()));
        note.set("status", TaskStatus::Todo.as_str());
        let rendered = note.render()?;

        let mut handle = match fs::OpenOptions::new().write(true).create_new(true).open(&file) {
            Ok(handle) => handle,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StoreError::Rejected(format!("task `{path}` already exists")))
            }
            Err(e) => return Err(StoreError::io(&file, e)),
        };
        handle
            .write_all(rendered.as_bytes())
            .map_err(|e| StoreError::io(&file, e))?;
        info!(task = %path, "task created");

        Ok(TaskInfo {
            name: stem,
            path,
            status: TaskStatus::Todo,
        })
    }
}
