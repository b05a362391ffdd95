//! Pomodoro timer for a note vault.
//!
//! Sessions are markdown notes; the timer survives a crash by rediscovering
//! the session note that was never closed.

pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod events;
pub mod frontmatter;
pub mod ipc;
pub mod notify;
pub mod persistence;
pub mod plugin;
pub mod recovery;
pub mod session;
pub mod tasks;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, Config, RecoveryPolicy};
pub use error::{StoreError, TimerError};
pub use events::{EventBus, ListenerId};
pub use persistence::{Persistence, TimerSnapshot};
pub use plugin::PomodoroPlugin;
pub use recovery::RecoveryCandidate;
pub use session::{
    FileSessionStore, IndexReady, MemorySessionStore, Outcome, SessionHandle, SessionMeta,
    SessionRecord, SessionStore, TaskRef,
};
pub use tasks::{FileTaskRepository, TaskRepository};
pub use timer::{TimerService, TimerState};
