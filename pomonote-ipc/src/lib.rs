//! Inter-process communication between pomonote and pomonotectl
//!
//! We use Unix domain sockets for local IPC. Every message is one line of
//! JSON: the client writes a single `Command`, the daemon answers with one
//! `Response` line (or a stream of them for `Command::Watch`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Commands that pomonotectl can send to pomonote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Start {
        task_name: String,
        task_path: Option<String>,
    },
    Pause,
    Resume,
    Toggle,
    Complete,
    Stop,
    Cancel,
    Status,
    /// Ask for the pending crash-recovery candidate, if any.
    Recovery,
    Recover {
        decision: RecoveryDecision,
    },
    RateEnergy {
        session: String,
        level: u8,
    },
    AddTask {
        name: String,
    },
    ListTasks {
        status: Option<TaskStatus>,
    },
    SetTaskStatus {
        path: String,
        status: TaskStatus,
    },
    /// Keep the connection open and stream every timer event.
    Watch,
}

/// Responses from pomonote back to pomonotectl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Session(String),
    Status(TimerStatus),
    Recovery(Option<RecoveryInfo>),
    Tasks(Vec<TaskInfo>),
    Task(TaskInfo),
    Event(TimerEvent),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
}

impl TimerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub phase: TimerPhase,
    pub task_name: Option<String>,
    pub task_path: Option<String>,
    pub session: Option<String>,
    pub elapsed_seconds: u64,
    pub current_pomodoro_index: u32,
}

/// Everything the timer announces to its subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum TimerEvent {
    Start {
        task_name: String,
        task_path: Option<String>,
    },
    Pause,
    Resume,
    Complete {
        session: String,
    },
    Stop {
        session: String,
    },
    Cancel,
    Tick {
        status: TimerStatus,
    },
    PomodoroComplete {
        count: u32,
    },
    Recovered {
        task_name: String,
        task_path: Option<String>,
        session: String,
    },
    /// A closing write failed after the timer already went idle.
    SessionWriteFailed {
        session: String,
        message: String,
    },
}

impl TimerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TimerEvent::Start { .. } => "start",
            TimerEvent::Pause => "pause",
            TimerEvent::Resume => "resume",
            TimerEvent::Complete { .. } => "complete",
            TimerEvent::Stop { .. } => "stop",
            TimerEvent::Cancel => "cancel",
            TimerEvent::Tick { .. } => "tick",
            TimerEvent::PomodoroComplete { .. } => "pomodoro-complete",
            TimerEvent::Recovered { .. } => "recovered",
            TimerEvent::SessionWriteFailed { .. } => "session-write-failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryDecision {
    Resume,
    Abandon,
    Ignore,
}

/// An unfinished session found at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryInfo {
    pub session: String,
    pub task_name: String,
    pub task_path: Option<String>,
    /// Local start time, `%Y-%m-%dT%H:%M:%S`.
    pub started: String,
    pub elapsed_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    /// Vault-relative path of the task note.
    pub path: String,
    pub status: TaskStatus,
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub const SOCKET_PATH: &str = "/tmp/pomonote.sock";

/// Writes one message as a single JSON line.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one JSON line. Returns `Ok(None)` on a clean EOF.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, IpcError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}
