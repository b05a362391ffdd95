//! Typed schema of a session note's front matter.
//!
//! This is the single place where session fields are decoded. Optional
//! numeric fields stay `Option<u8>` all the way through so that a stored `0`
//! is never confused with a missing value.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDateTime, TimeZone, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frontmatter::Note;

/// Identifies one session note: its vault-relative path with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SessionHandle> for String {
    fn from(handle: SessionHandle) -> Self {
        handle.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Complete,
    Stop,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

pub const MAX_ENERGY: u8 = 5;

/// Front matter of a session note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    #[serde(with = "timestamp")]
    pub started: NaiveDateTime,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended: Option<NaiveDateTime>,
    pub task: String,
    /// The task as it was typed. `task` is a wiki link for the vault and
    /// cannot carry every name unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub resumed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour_of_day: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<u8>,
}

/// Spellings seen in hand-edited notes, mapped to the canonical key.
const KEY_ALIASES: &[(&str, &[&str])] = &[
    ("hourOfDay", &["hour_of_day", "hour of day"]),
    ("dayOfWeek", &["day_of_week", "day of week"]),
    ("energy", &["energyLevel", "energy_level", "energy level"]),
    ("taskName", &["task_name", "task name"]),
    ("taskPath", &["task_path", "task path"]),
];

impl SessionMeta {
    pub fn new(task: impl Into<String>, started: NaiveDateTime) -> Self {
        Self {
            started,
            ended: None,
            task: task.into(),
            task_name: None,
            task_path: None,
            outcome: None,
            resumed: false,
            hour_of_day: None,
            day_of_week: None,
            energy: None,
        }
    }

    /// A fresh session for `task`: the link plus the name and path verbatim.
    pub fn for_task(task: &TaskRef, started: NaiveDateTime) -> Self {
        Self {
            task_name: Some(task.name.clone()),
            task_path: task.path.clone(),
            ..Self::new(task.to_string(), started)
        }
    }

    /// The task this session was spent on. Notes written without the
    /// typed keys fall back to the `task` link.
    pub fn task_ref(&self) -> TaskRef {
        match &self.task_name {
            Some(name) => TaskRef::new(name.clone(), self.task_path.clone()),
            None => TaskRef::parse(&self.task),
        }
    }

    /// Rewrites alias keys to their canonical name, then decodes strictly.
    pub fn from_note(note: &mut Note) -> Result<Self, String> {
        normalize_keys(note);
        let meta: SessionMeta = note.decode().map_err(|e| e.to_string())?;
        meta.validate()?;
        Ok(meta)
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(hour) = self.hour_of_day {
            if hour > 23 {
                return Err(format!("hourOfDay {hour} is out of range"));
            }
        }
        if let Some(energy) = self.energy {
            if energy > MAX_ENERGY {
                return Err(format!("energy {energy} is out of range"));
            }
        }
        if let Some(ended) = self.ended {
            if ended < self.started {
                return Err("ended is before started".to_string());
            }
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.ended.is_some()
    }

    /// Closes an unfinished session. `block_start` feeds the derived
    /// hour and weekday fields.
    pub fn close(
        &mut self,
        outcome: Outcome,
        block_start: NaiveDateTime,
        ended: NaiveDateTime,
    ) -> Result<(), String> {
        self.ensure_open()?;
        self.ended = Some(ended.max(self.started));
        self.outcome = Some(outcome);
        self.hour_of_day = Some(block_start.hour() as u8);
        self.day_of_week = Some(block_start.weekday().into());
        Ok(())
    }

    pub fn abandon(&mut self, ended: NaiveDateTime) -> Result<(), String> {
        self.ensure_open()?;
        self.ended = Some(ended.max(self.started));
        self.outcome = Some(Outcome::Abandoned);
        Ok(())
    }

    pub fn mark_resumed(&mut self) -> Result<(), String> {
        self.ensure_open()?;
        self.resumed = true;
        Ok(())
    }

    pub fn rate(&mut self, level: u8) -> Result<(), String> {
        if level > MAX_ENERGY {
            return Err(format!("energy {level} is out of range"));
        }
        if !self.is_finished() {
            return Err("only finished sessions can be rated".to_string());
        }
        self.energy = Some(level);
        Ok(())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.ended.map(|ended| ended - self.started)
    }

    pub fn completed_pomodoros(&self, pomodoro: Duration) -> Option<u32> {
        let pomodoro_ms = pomodoro.num_milliseconds();
        if pomodoro_ms <= 0 {
            return None;
        }
        self.duration()
            .map(|d| (d.num_milliseconds().max(0) / pomodoro_ms) as u32)
    }

    fn ensure_open(&self) -> Result<(), String> {
        match self.outcome {
            Some(outcome) if self.ended.is_some() => {
                Err(format!("session already closed with outcome {outcome:?}"))
            }
            _ => Ok(()),
        }
    }
}

fn normalize_keys(note: &mut Note) {
    for (canonical, aliases) in KEY_ALIASES {
        for alias in *aliases {
            if let Some(value) = note.meta.remove(*alias) {
                if !note.meta.contains_key(*canonical) {
                    note.set(canonical, value);
                }
            }
        }
    }
}

/// A session note as listed from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub handle: SessionHandle,
    pub meta: SessionMeta,
}

/// Reference from a session to the task it was spent on, written as a
/// wiki link: `[[Tasks/Write report|Write report]]` or `[[Write report]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub name: String,
    pub path: Option<String>,
}

impl TaskRef {
    pub fn new(name: impl Into<String>, path: Option<String>) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }

    pub fn parse(reference: &str) -> Self {
        let trimmed = reference.trim();
        let Some(inner) = trimmed
            .strip_prefix("[[")
            .and_then(|rest| rest.strip_suffix("]]"))
        else {
            return Self::new(trimmed, None);
        };

        match inner.split_once('|') {
            Some((target, alias)) => Self::new(alias.trim(), Some(note_path(target.trim()))),
            None if inner.contains('/') => {
                let name = inner.rsplit('/').next().unwrap_or(inner).trim();
                Self::new(name, Some(note_path(inner.trim())))
            }
            None => Self::new(inner.trim(), None),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => {
                let target = path.strip_suffix(".md").unwrap_or(path);
                write!(f, "[[{}|{}]]", link_text(target), link_text(&self.name))
            }
            None => write!(f, "[[{}]]", link_text(&self.name)),
        }
    }
}

/// Link syntax characters cannot appear inside `[[...]]`.
fn link_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '|' | '[' | ']' => '-',
            c => c,
        })
        .collect()
}

fn note_path(target: &str) -> String {
    if target.ends_with(".md") {
        target.to_string()
    } else {
        format!("{target}.md")
    }
}

/// Truncates to whole seconds, the precision notes are written with.
pub fn to_note_time(at: DateTime<Local>) -> NaiveDateTime {
    let naive = at.naive_local();
    naive.with_nanosecond(0).unwrap_or(naive)
}

/// Interprets a note timestamp as local time. Times that fall in a DST gap
/// are read as UTC rather than rejected.
pub fn from_note_time(at: NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(&at)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&at))
}

pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
    const ACCEPTED: &[&str] = &[
        FORMAT,
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    pub fn format(at: &NaiveDateTime) -> String {
        at.format(FORMAT).to_string()
    }

    pub fn parse(raw: &str) -> Result<NaiveDateTime, String> {
        let raw = raw.trim();
        ACCEPTED
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .ok_or_else(|| format!("unrecognized timestamp `{raw}`"))
    }

    pub fn serialize<S: Serializer>(at: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            at: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match at {
                Some(at) => s.serialize_str(&super::format(at)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
