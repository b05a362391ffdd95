use chrono::NaiveDateTime;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::document::{timestamp, Outcome, SessionHandle, SessionMeta, SessionRecord, TaskRef};
use crate::error::StoreError;
use crate::frontmatter::{
    resolve_note_path, sanitize_file_stem, vault_relative, write_note_atomically, Note,
};

/// Proof that the host finished loading its note index. Recovery refuses to
/// scan without one, since an unloaded index looks like an empty vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReady {
    pub documents: usize,
}

/// Persistence of session notes.
///
/// The timer is the only caller that mutates sessions; implementations are
/// the only writers of the underlying documents.
pub trait SessionStore: Send {
    /// Loads the note index. Must be called before `list`/`find_unfinished`.
    fn load_index(&mut self) -> Result<IndexReady, StoreError>;

    fn create(&mut self, task: &TaskRef, started: NaiveDateTime)
        -> Result<SessionHandle, StoreError>;

    fn complete(
        &mut self,
        handle: &SessionHandle,
        outcome: Outcome,
        started: NaiveDateTime,
        ended: NaiveDateTime,
    ) -> Result<(), StoreError>;

    fn mark_abandoned(
        &mut self,
        handle: &SessionHandle,
        ended: NaiveDateTime,
    ) -> Result<(), StoreError>;

    fn mark_resumed(&mut self, handle: &SessionHandle) -> Result<(), StoreError>;

    fn set_energy(&mut self, handle: &SessionHandle, level: u8) -> Result<(), StoreError>;

    fn delete(&mut self, handle: &SessionHandle) -> Result<(), StoreError>;

    /// Every readable session, newest first. Unreadable notes are skipped.
    fn list(&self) -> Result<Vec<SessionRecord>, StoreError>;

    /// Sessions without an `ended` field, newest first.
    fn find_unfinished(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let mut unfinished: Vec<_> = self
            .list()?
            .into_iter()
            .filter(|record| !record.meta.is_finished())
            .collect();
        unfinished.sort_by(|a, b| b.meta.started.cmp(&a.meta.started));
        Ok(unfinished)
    }
}

/// Session notes stored as markdown files under `<vault>/<folder>`.
pub struct FileSessionStore {
    vault: PathBuf,
    folder: String,
    indexed: bool,
}

impl FileSessionStore {
    pub fn new(vault: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            vault: vault.into(),
            folder: folder.into().trim_matches('/').to_string(),
            indexed: false,
        }
    }

    pub fn folder_path(&self) -> PathBuf {
        self.vault.join(&self.folder)
    }

    fn handle_for(&self, file_name: &str) -> SessionHandle {
        SessionHandle::new(vault_relative(&self.folder, file_name))
    }

    fn resolve(&self, handle: &SessionHandle) -> Result<PathBuf, StoreError> {
        resolve_note_path(&self.vault, handle.as_str())
    }

    fn read(&self, handle: &SessionHandle) -> Result<(PathBuf, Note, SessionMeta), StoreError> {
        let path = self.resolve(handle)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(handle.to_string()))
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let mut note = Note::parse(&text)?;
        let meta = SessionMeta::from_note(&mut note).map_err(|message| StoreError::Parse {
            path: path.clone(),
            message,
        })?;
        Ok((path, note, meta))
    }

    /// Reads, applies `change`, and writes the note back with every
    /// unrelated key and the body untouched.
    fn update<F>(&mut self, handle: &SessionHandle, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut SessionMeta) -> Result<(), String>,
    {
        let (path, mut note, mut meta) = self.read(handle)?;
        change(&mut meta).map_err(StoreError::Rejected)?;
        note.merge(&meta)?;
        let rendered = note.render()?;
        write_note_atomically(&path, &rendered)?;
        debug!(session = %handle, "session note updated");
        Ok(())
    }

    fn file_name(task: &TaskRef, started: NaiveDateTime) -> String {
        let task = sanitize_file_stem(&task.name);
        let stamp = started.format("%Y-%m-%d %H%M%S");
        if task.is_empty() {
            stamp.to_string()
        } else {
            format!("{stamp} {task}")
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load_index(&mut self) -> Result<IndexReady, StoreError> {
        let dir = self.folder_path();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        let documents = fs::read_dir(&dir)
            .map_err(|e| StoreError::io(&dir, e))?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "md"))
            .count();
        self.indexed = true;
        info!(folder = %dir.display(), documents, "session index loaded");
        Ok(IndexReady { documents })
    }

    fn create(
        &mut self,
        task: &TaskRef,
        started: NaiveDateTime,
    ) -> Result<SessionHandle, StoreError> {
        let dir = self.folder_path();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut note = Note::new("");
        note.merge(&SessionMeta::for_task(task, started))?;
        let rendered = note.render()?;

        let base = Self::file_name(task, started);
        for attempt in 1..=100u32 {
            let name = if attempt == 1 {
                format!("{base}.md")
            } else {
                format!("{base} ({attempt}).md")
            };
            let path = dir.join(&name);
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(rendered.as_bytes())
                        .map_err(|e| StoreError::io(&path, e))?;
                    let handle = self.handle_for(&name);
                    info!(session = %handle, started = %timestamp::format(&started), "session note created");
                    return Ok(handle);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Err(StoreError::Rejected(format!(
            "could not find a free file name for `{base}`"
        )))
    }

    fn complete(
        &mut self,
        handle: &SessionHandle,
        outcome: Outcome,
        started: NaiveDateTime,
        ended: NaiveDateTime,
    ) -> Result<(), StoreError> {
        self.update(handle, |meta| meta.close(outcome, started, ended))
    }

    fn mark_abandoned(
        &mut self,
        handle: &SessionHandle,
        ended: NaiveDateTime,
    ) -> Result<(), StoreError> {
        self.update(handle, |meta| meta.abandon(ended))
    }

    fn mark_resumed(&mut self, handle: &SessionHandle) -> Result<(), StoreError> {
        self.update(handle, SessionMeta::mark_resumed)
    }

    fn set_energy(&mut self, handle: &SessionHandle, level: u8) -> Result<(), StoreError> {
        self.update(handle, |meta| meta.rate(level))
    }

    fn delete(&mut self, handle: &SessionHandle) -> Result<(), StoreError> {
        let path = self.resolve(handle)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(session = %handle, "session note deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(handle.to_string()))
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn list(&self) -> Result<Vec<SessionRecord>, StoreError> {
        if !self.indexed {
            return Err(StoreError::IndexNotReady);
        }
        let dir = self.folder_path();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut records = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "md") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let handle = self.handle_for(name);
            match self.read(&handle) {
                Ok((_, _, meta)) => records.push(SessionRecord { handle, meta }),
                Err(e) => warn!(session = %handle, error = %e, "skipping unreadable session note"),
            }
        }
        records.sort_by(|a, b| b.meta.started.cmp(&a.meta.started));
        Ok(records)
    }
}
