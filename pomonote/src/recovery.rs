//! Crash recovery for sessions left open by a previous process.
//!
//! # Startup order
//! 1. The host loads its note index and hands back [`IndexReady`].
//! 2. [`scan`] looks for the newest unfinished session.
//! 3. The operator (or the configured policy) picks a [`RecoveryDecision`]
//!    and [`TimerService::recover`] applies it.
//!
//! Only the newest unfinished session is offered. Older ones stay
//! unfinished until a later scan or manual cleanup.

use pomonote_ipc::{RecoveryDecision, RecoveryInfo, TimerEvent, TimerPhase};
use tracing::{info, warn};

use crate::error::{StoreError, TimerError};
use crate::session::document::timestamp;
use crate::session::{
    from_note_time, to_note_time, IndexReady, SessionRecord, SessionStore, TaskRef,
};
use crate::timer::TimerService;

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryCandidate {
    pub record: SessionRecord,
    pub task: TaskRef,
}

impl RecoveryCandidate {
    pub fn new(record: SessionRecord) -> Self {
        let task = record.meta.task_ref();
        Self { record, task }
    }

    pub fn info(&self, now: chrono::DateTime<chrono::Local>) -> RecoveryInfo {
        let started = from_note_time(self.record.meta.started);
        let elapsed = (now - started).num_seconds().max(0);
        RecoveryInfo {
            session: self.record.handle.to_string(),
            task_name: self.task.name.clone(),
            task_path: self.task.path.clone(),
            started: timestamp::format(&self.record.meta.started),
            elapsed_seconds: elapsed as u64,
        }
    }
}

/// Finds the most recent unfinished session.
pub fn scan<S: SessionStore>(
    store: &S,
    ready: &IndexReady,
) -> Result<Option<RecoveryCandidate>, StoreError> {
    let unfinished = store.find_unfinished()?;
    if unfinished.len() > 1 {
        warn!(
            count = unfinished.len(),
            "several unfinished sessions; offering only the newest"
        );
    }
    let candidate = unfinished.into_iter().next().map(RecoveryCandidate::new);
    if let Some(candidate) = &candidate {
        info!(
            session = %candidate.record.handle,
            indexed = ready.documents,
            "unfinished session found"
        );
    }
    Ok(candidate)
}

impl<S: SessionStore> TimerService<S> {
    pub fn recover(
        &mut self,
        candidate: &RecoveryCandidate,
        decision: RecoveryDecision,
    ) -> Result<(), TimerError> {
        match decision {
            RecoveryDecision::Resume => self.resume_recovered(candidate),
            RecoveryDecision::Abandon => {
                let now = self.clock.now();
                self.store
                    .mark_abandoned(&candidate.record.handle, to_note_time(now))?;
                info!(session = %candidate.record.handle, "recovered session abandoned");
                Ok(())
            }
            RecoveryDecision::Ignore => {
                info!(session = %candidate.record.handle, "recovered session left unfinished");
                Ok(())
            }
        }
    }

    /// Re-enters `running` as if the block had never been interrupted:
    /// elapsed time counts from the note's original start, and every
    /// boundary already passed counts as announced.
    fn resume_recovered(&mut self, candidate: &RecoveryCandidate) -> Result<(), TimerError> {
        if self.state.phase != TimerPhase::Idle {
            return Err(TimerError::InvalidState("timer already running"));
        }
        let handle = candidate.record.handle.clone();
        let started_at = from_note_time(candidate.record.meta.started);

        self.state.begin(
            candidate.task.name.clone(),
            candidate.task.path.clone(),
            handle.clone(),
            started_at,
        );
        let completed = self
            .state
            .completed_pomodoros(self.clock.now(), self.pomodoro);
        self.state.last_notified_pomodoro = completed;
        self.state.current_pomodoro_index = completed.saturating_add(1);

        if let Err(e) = self.store.mark_resumed(&handle) {
            warn!(session = %handle, error = %e, "could not flag session as resumed");
        }
        info!(
            session = %handle,
            elapsed_ms = self.elapsed_ms(),
            pomodoro = self.state.current_pomodoro_index,
            "recovered session resumed"
        );
        self.events.emit(&TimerEvent::Recovered {
            task_name: candidate.task.name.clone(),
            task_path: candidate.task.path.clone(),
            session: handle.to_string(),
        });
        Ok(())
    }
}
