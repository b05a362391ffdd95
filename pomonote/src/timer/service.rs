use chrono::{DateTime, Duration, Local};
use pomonote_ipc::{TimerEvent, TimerPhase, TimerStatus};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::state::TimerState;
use crate::clock::Clock;
use crate::error::{StoreError, TimerError};
use crate::events::{EventBus, ListenerId};
use crate::persistence::TimerSnapshot;
use crate::session::{to_note_time, Outcome, SessionHandle, SessionStore, TaskRef};

/// The pomodoro timer. Owns the single authoritative timer state and the
/// session store it writes to.
///
/// All transitions are synchronous. Listeners run while the service is
/// mutably borrowed, so a listener cannot call back into it.
pub struct TimerService<S: SessionStore> {
    pub(crate) store: S,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pomodoro: Duration,
    pub(crate) state: TimerState,
    pub(crate) events: EventBus,
}

impl<S: SessionStore> TimerService<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, pomodoro: Duration) -> Self {
        Self {
            store,
            clock,
            pomodoro,
            state: TimerState::default(),
            events: EventBus::new(),
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&TimerEvent) + Send + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn clear_listeners(&mut self) {
        self.events.clear();
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn pomodoro(&self) -> Duration {
        self.pomodoro
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.state.phase
    }

    pub fn start(
        &mut self,
        task_name: &str,
        task_path: Option<&str>,
    ) -> Result<SessionHandle, TimerError> {
        if self.state.is_active() {
            return Err(TimerError::InvalidState("timer already running"));
        }

        let now = self.clock.now();
        let task_path = task_path.map(str::to_string);
        let task = TaskRef::new(task_name, task_path.clone());
        let session = self.store.create(&task, to_note_time(now))?;

        self.state
            .begin(task_name.to_string(), task_path.clone(), session.clone(), now);
        info!(task = task_name, session = %session, "timer started");
        self.events.emit(&TimerEvent::Start {
            task_name: task_name.to_string(),
            task_path,
        });
        Ok(session)
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        if self.state.phase != TimerPhase::Running {
            return Err(TimerError::InvalidState("timer not running"));
        }
        let now = self.clock.now();
        self.state.pause(now);
        info!(elapsed_ms = self.state.elapsed(now).num_milliseconds(), "timer paused");
        self.events.emit(&TimerEvent::Pause);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TimerError> {
        if self.state.phase != TimerPhase::Paused {
            return Err(TimerError::InvalidState("timer not paused"));
        }
        self.state.resume(self.clock.now());
        info!("timer resumed");
        self.events.emit(&TimerEvent::Resume);
        Ok(())
    }

    /// Pauses a running timer or resumes a paused one. Idle is left alone.
    pub fn toggle_pause(&mut self) -> Result<(), TimerError> {
        match self.state.phase {
            TimerPhase::Running => self.pause(),
            TimerPhase::Paused => self.resume(),
            TimerPhase::Idle => Ok(()),
        }
    }

    /// Finishes the work block. The timer is idle before the note is
    /// written and before `complete` is emitted.
    pub fn complete(&mut self) -> Result<SessionHandle, TimerError> {
        let now = self.clock.now();
        let (session, started_at) = self.take_active()?;

        let write = self.store.complete(
            &session,
            Outcome::Complete,
            to_note_time(started_at),
            to_note_time(now),
        );
        info!(session = %session, "timer completed");
        self.events.emit(&TimerEvent::Complete {
            session: session.to_string(),
        });
        if let Err(e) = write {
            self.report_write_failure(&session, "complete", e);
        }
        Ok(session)
    }

    /// Gives up on the work block but keeps its note, closed with
    /// `outcome: stop`.
    pub fn stop(&mut self) -> Result<SessionHandle, TimerError> {
        let now = self.clock.now();
        let (session, started_at) = self.take_active()?;

        let write = self.store.complete(
            &session,
            Outcome::Stop,
            to_note_time(started_at),
            to_note_time(now),
        );
        info!(session = %session, "timer stopped");
        self.events.emit(&TimerEvent::Stop {
            session: session.to_string(),
        });
        if let Err(e) = write {
            self.report_write_failure(&session, "stop", e);
        }
        Ok(session)
    }

    /// Discards the work block and deletes its note.
    pub fn cancel(&mut self) -> Result<(), TimerError> {
        let (session, _) = self.take_active()?;

        let write = self.store.delete(&session);
        info!(session = %session, "timer cancelled");
        self.events.emit(&TimerEvent::Cancel);
        if let Err(e) = write {
            self.report_write_failure(&session, "cancel", e);
        }
        Ok(())
    }

    /// Advances pomodoro bookkeeping. Only the latest crossed boundary is
    /// announced, however many passed since the previous tick.
    pub fn tick(&mut self) {
        if self.state.phase != TimerPhase::Running {
            return;
        }
        let now = self.clock.now();
        let completed = self.state.completed_pomodoros(now, self.pomodoro);
        if completed > 0 && completed > self.state.last_notified_pomodoro {
            self.state.last_notified_pomodoro = completed;
            self.state.current_pomodoro_index = completed.saturating_add(1);
            info!(count = completed, "pomodoro complete");
            self.events
                .emit(&TimerEvent::PomodoroComplete { count: completed });
        }
        let status = self.status_at(now);
        self.events.emit(&TimerEvent::Tick { status });
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.state.elapsed(self.clock.now()).num_milliseconds()
    }

    pub fn status(&self) -> TimerStatus {
        self.status_at(self.clock.now())
    }

    /// Records an energy rating (0-5) on a finished session.
    pub fn rate_energy(&mut self, session: &SessionHandle, level: u8) -> Result<(), TimerError> {
        if level > crate::session::document::MAX_ENERGY {
            return Err(TimerError::InvalidEnergy(level));
        }
        self.store.set_energy(session, level)?;
        info!(session = %session, level, "energy rated");
        Ok(())
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let now = self.clock.now();
        TimerSnapshot {
            is_active: self.state.is_active(),
            phase: self.state.phase,
            task_name: self.state.task_name.clone(),
            task_path: self.state.task_path.clone(),
            session: self.state.session.as_ref().map(ToString::to_string),
            started_at: self.state.started_at.map(|at| at.timestamp_millis()),
            paused_ms: self.state.paused(now).num_milliseconds(),
            saved_at: now.timestamp_millis(),
        }
    }

    pub(crate) fn status_at(&self, now: DateTime<Local>) -> TimerStatus {
        let elapsed = self.state.elapsed(now).num_milliseconds().max(0);
        TimerStatus {
            phase: self.state.phase,
            task_name: self.state.task_name.clone(),
            task_path: self.state.task_path.clone(),
            session: self.state.session.as_ref().map(ToString::to_string),
            elapsed_seconds: (elapsed / 1000) as u64,
            current_pomodoro_index: self.state.current_pomodoro_index,
        }
    }

    /// Resets to idle and hands back what the closing write needs.
    fn take_active(&mut self) -> Result<(SessionHandle, DateTime<Local>), TimerError> {
        if !self.state.is_active() {
            return Err(TimerError::InvalidState("timer not started"));
        }
        let session = self.state.session.take();
        let started_at = self.state.started_at;
        self.state.reset();
        match (session, started_at) {
            (Some(session), Some(started_at)) => Ok((session, started_at)),
            _ => {
                warn!("active timer had no session; reset to idle");
                Err(TimerError::InvalidState("timer not started"))
            }
        }
    }

    fn report_write_failure(&mut self, session: &SessionHandle, op: &str, e: StoreError) {
        error!(session = %session, op, error = %e, "session note may be incomplete");
        self.events.emit(&TimerEvent::SessionWriteFailed {
            session: session.to_string(),
            message: e.to_string(),
        });
    }
}
