//! Session notes: one markdown note per work block.

pub mod document;
pub mod memory;
pub mod store;

pub use document::{
    from_note_time, to_note_time, DayOfWeek, Outcome, SessionHandle, SessionMeta, SessionRecord,
    TaskRef,
};
pub use memory::MemorySessionStore;
pub use store::{FileSessionStore, IndexReady, SessionStore};
