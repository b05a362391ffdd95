use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use super::document::{Outcome, SessionHandle, SessionMeta, SessionRecord, TaskRef};
use super::store::{IndexReady, SessionStore};
use crate::error::StoreError;

/// Session store kept in memory. Used by tests and by hosts that do not
/// persist sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: BTreeMap<SessionHandle, SessionMeta>,
    next_id: u64,
    indexed: bool,
    fail_writes: bool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail with `StoreError::Rejected`.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Seeds a session as if it had been written by an earlier process.
    pub fn insert(&mut self, meta: SessionMeta) -> SessionHandle {
        let handle = self.next_handle();
        self.sessions.insert(handle.clone(), meta);
        handle
    }

    pub fn get(&self, handle: &SessionHandle) -> Option<&SessionMeta> {
        self.sessions.get(handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn next_handle(&mut self) -> SessionHandle {
        self.next_id += 1;
        SessionHandle::new(format!("sessions/{:04}.md", self.next_id))
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            Err(StoreError::Rejected("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }

    fn update<F>(&mut self, handle: &SessionHandle, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut SessionMeta) -> Result<(), String>,
    {
        self.check_writable()?;
        let meta = self
            .sessions
            .get_mut(handle)
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))?;
        let mut updated = meta.clone();
        change(&mut updated).map_err(StoreError::Rejected)?;
        *meta = updated;
        Ok(())
    }
}

impl SessionStore for MemorySessionStore {
    fn load_index(&mut self) -> Result<IndexReady, StoreError> {
        self.indexed = true;
        Ok(IndexReady {
            documents: self.sessions.len(),
        })
    }

    fn create(
        &mut self,
        task: &TaskRef,
        started: NaiveDateTime,
    ) -> Result<SessionHandle, StoreError> {
        self.check_writable()?;
        Ok(self.insert(SessionMeta::for_task(task, started)))
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
        self.check_writable()?;
        self.sessions
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(handle.to_string()))
    }

    fn list(&self) -> Result<Vec<SessionRecord>, StoreError> {
        if !self.indexed {
            return Err(StoreError::IndexNotReady);
        }
        let mut records: Vec<_> = self
            .sessions
            .iter()
            .map(|(handle, meta)| SessionRecord {
                handle: handle.clone(),
                meta: meta.clone(),
            })
            .collect();
        records.sort_by(|a, b| b.meta.started.cmp(&a.meta.started));
        Ok(records)
    }
}
