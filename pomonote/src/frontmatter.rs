//! Markdown notes with a YAML front-matter block.
//!
//! A note looks like
//!
//! ```text
//! ---
//! key: value
//! ---
//! body
//! ```
//!
//! The mapping is kept as an untyped `serde_yaml::Mapping` so that keys this
//! crate does not know about survive a rewrite. Typed access goes through
//! [`Note::decode`], which is the only place field types are enforced.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::StoreError;

const FENCE: &str = "---";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Note {
    pub meta: Mapping,
    pub body: String,
}

impl Note {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            meta: Mapping::new(),
            body: body.into(),
        }
    }

    /// Splits `text` into front matter and body. Text without a leading
    /// fence is all body.
    pub fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        let Some((yaml, body)) = split(text) else {
            return Ok(Self::new(text));
        };
        let meta = if yaml.trim().is_empty() {
            Mapping::new()
        } else {
            serde_yaml::from_str(yaml)?
        };
        Ok(Self {
            meta,
            body: body.to_string(),
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_yaml::Error> {
        serde_yaml::from_value(Value::Mapping(self.meta.clone()))
    }

    /// Overwrites every key present in `fields`, leaving the rest alone.
    /// Keys serialized as null are removed.
    pub fn merge<T: Serialize>(&mut self, fields: &T) -> Result<(), serde_yaml::Error> {
        if let Value::Mapping(map) = serde_yaml::to_value(fields)? {
            for (key, value) in map {
                if value.is_null() {
                    self.meta.remove(&key);
                } else {
                    self.meta.insert(key, value);
                }
            }
        }
        Ok(())
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.meta.insert(Value::from(key), value.into());
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(Value::as_str)
    }

    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        let yaml = if self.meta.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(&self.meta)?
        };
        Ok(format!("{FENCE}\n{yaml}{FENCE}\n{}", self.body))
    }
}

/// Maps a vault-relative note path to a file, refusing anything that could
/// escape the vault or is not a markdown note.
pub(crate) fn resolve_note_path(vault: &Path, relative: &str) -> Result<PathBuf, StoreError> {
    let rel = Path::new(relative);
    let safe = rel.components().all(|c| matches!(c, Component::Normal(_)));
    if !safe || !relative.ends_with(".md") {
        return Err(StoreError::InvalidHandle(relative.to_string()));
    }
    Ok(vault.join(rel))
}

/// Replaces characters that are not allowed (or mean something) in note
/// file names.
pub(crate) fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '[' | ']' | '#' | '^' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect();
    cleaned.trim().to_string()
}

/// Vault-relative path with `/` separators.
pub(crate) fn vault_relative(folder: &str, file_name: &str) -> String {
    if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{folder}/{file_name}")
    }
}

/// Replaces the note at `path` through a sibling `.md.tmp` file, so an
/// interrupted write never leaves a half-written note behind.
pub(crate) fn write_note_atomically(path: &Path, text: &str) -> Result<(), StoreError> {
    let tmp = path.with_extension("md.tmp");
    fs::write(&tmp, text).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

fn split(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text
        .strip_prefix("---\r\n")
        .or_else(|| text.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Status {
        status: Option<String>,
    }

    #[test]
    fn parses_fenced_front_matter_and_keeps_body() {
        let note = Note::parse("---\nstatus: todo\nowner: me\n---\n# Title\n").unwrap();
        assert_eq!(note.get_str("status"), Some("todo"));
        assert_eq!(note.body, "# Title\n");
        let decoded: Status = note.decode().unwrap();
        assert_eq!(decoded.status.as_deref(), Some("todo"));
    }

    #[test]
    fn text_without_fence_is_all_body() {
        let note = Note::parse("just words\n---\n").unwrap();
        assert!(note.meta.is_empty());
        assert_eq!(note.body, "just words\n---\n");
    }

    #[test]
    fn unterminated_fence_is_body() {
        let note = Note::parse("---\nstatus: todo\n").unwrap();
        assert!(note.meta.is_empty());
    }

    #[test]
    fn note_paths_stay_inside_the_vault() {
        let vault = Path::new("/vault");
        assert!(resolve_note_path(vault, "Tasks/a.md").is_ok());
        assert!(resolve_note_path(vault, "../a.md").is_err());
        assert!(resolve_note_path(vault, "/etc/a.md").is_err());
        assert!(resolve_note_path(vault, "Tasks/a.txt").is_err());
    }

    #[test]
    fn file_stems_lose_link_syntax() {
        assert_eq!(sanitize_file_stem(" [[Plan]]: v2 "), "--Plan--- v2");
    }

    #[test]
    fn merge_preserves_unknown_keys_and_drops_nulls() {
        let mut note = Note::parse("---\nstatus: todo\nowner: me\n---\nbody").unwrap();

        #[derive(Serialize)]
        struct Patch {
            status: &'static str,
            owner: Option<&'static str>,
        }
        note.merge(&Patch {
            status: "done",
            owner: None,
        })
        .unwrap();

        let rendered = note.render().unwrap();
        let again = Note::parse(&rendered).unwrap();
        assert_eq!(again.get_str("status"), Some("done"));
        assert!(again.meta.get("owner").is_none());
        assert_eq!(again.body, "body");
    }

    #[test]
    fn note_rewrite_replaces_the_file_and_leaves_no_temp() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Review.md");
        fs::write(&path, "old").unwrap();

        write_note_atomically(&path, "---\nstatus: done\n---\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "---\nstatus: done\n---\n");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("Review.md")]);
    }
}
