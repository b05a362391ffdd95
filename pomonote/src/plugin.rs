//! Plugin lifecycle as seen by the host.
//!
//! The host owns exactly one [`PomodoroPlugin`] and drives it through:
//! - `on_load`: report what the last crash snapshot recorded.
//! - `on_index_ready`: the host's note index is loaded; run recovery.
//! - `on_unload`: write a final snapshot and drop all listeners.

use pomonote_ipc::{RecoveryDecision, RecoveryInfo};
use tracing::{info, warn};

use crate::config::RecoveryPolicy;
use crate::error::TimerError;
use crate::persistence::Persistence;
use crate::recovery::{self, RecoveryCandidate};
use crate::session::{IndexReady, SessionStore};
use crate::tasks::TaskRepository;
use crate::timer::TimerService;

pub struct PomodoroPlugin<S: SessionStore> {
    timer: TimerService<S>,
    tasks: Box<dyn TaskRepository>,
    persistence: Option<Persistence>,
    policy: RecoveryPolicy,
    pending: Option<RecoveryCandidate>,
}

impl<S: SessionStore> PomodoroPlugin<S> {
    pub fn new(
        timer: TimerService<S>,
        tasks: Box<dyn TaskRepository>,
        persistence: Option<Persistence>,
        policy: RecoveryPolicy,
    ) -> Self {
        Self {
            timer,
            tasks,
            persistence,
            policy,
            pending: None,
        }
    }

    pub fn timer(&self) -> &TimerService<S> {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut TimerService<S> {
        &mut self.timer
    }

    pub fn tasks(&self) -> &dyn TaskRepository {
        self.tasks.as_ref()
    }

    pub fn tasks_mut(&mut self) -> &mut dyn TaskRepository {
        self.tasks.as_mut()
    }

    /// Logs what the last crash snapshot says the previous run was doing.
    /// The session notes stay the source of truth for recovery.
    pub fn on_load(&mut self) {
        let Some(persistence) = self.persistence.as_ref() else {
            return;
        };
        match persistence.load() {
            Ok(Some(snapshot)) if snapshot.is_active => info!(
                task = snapshot.task_name.as_deref().unwrap_or("-"),
                phase = snapshot.phase.as_str(),
                elapsed_ms = snapshot.elapsed_ms(),
                "previous run ended with an active timer"
            ),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "ignoring unreadable timer snapshot"),
        }
    }

    /// Second startup phase. Scan failures are logged and the scan is
    /// skipped until the next launch.
    pub fn on_index_ready(&mut self, ready: IndexReady) -> Option<RecoveryInfo> {
        let candidate = match recovery::scan(self.timer.store(), &ready) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "recovery scan failed; will retry on next launch");
                return None;
            }
        };

        if let Some(decision) = self.policy.decision() {
            info!(?decision, "applying configured recovery policy");
            if let Err(e) = self.timer.recover(&candidate, decision) {
                warn!(error = %e, "automatic recovery failed; leaving it pending");
                self.pending = Some(candidate);
            }
        } else {
            self.pending = Some(candidate);
        }
        self.pending_recovery()
    }

    pub fn pending_recovery(&self) -> Option<RecoveryInfo> {
        let now = self.timer.clock.now();
        self.pending.as_ref().map(|candidate| candidate.info(now))
    }

    pub fn decide_recovery(&mut self, decision: RecoveryDecision) -> Result<(), TimerError> {
        let candidate = self
            .pending
            .as_ref()
            .ok_or(TimerError::InvalidState("no recovery pending"))?;
        self.timer.recover(candidate, decision)?;
        self.pending = None;
        Ok(())
    }

    /// Writes the crash snapshot, or removes it while the timer is idle.
    /// Failures are logged and retried on the next call.
    pub fn save_snapshot(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let snapshot = self.timer.snapshot();
        let result = if snapshot.is_active {
            persistence.save(&snapshot)
        } else {
            persistence.clear()
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to write timer snapshot");
        }
    }

    pub fn on_unload(&mut self) {
        self.save_snapshot();
        self.timer.clear_listeners();
        info!("plugin unloaded");
    }
}
