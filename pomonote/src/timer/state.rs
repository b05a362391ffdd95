use chrono::{DateTime, Duration, Local};
use pomonote_ipc::TimerPhase;

use crate::session::SessionHandle;

/// In-memory timer state.
///
/// Time accounting is continuous: one session spans the whole work block,
/// and paused spans are subtracted from wall-clock time since `started_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerState {
    pub phase: TimerPhase,
    pub task_name: Option<String>,
    pub task_path: Option<String>,
    pub session: Option<SessionHandle>,
    pub started_at: Option<DateTime<Local>>,
    pub paused_at: Option<DateTime<Local>>,
    pub total_paused: Duration,
    /// 1-based pomodoro in progress; 0 while idle.
    pub current_pomodoro_index: u32,
    pub last_notified_pomodoro: u32,
}

impl Default for TimerState {
    fn default() -> Self {
        Self {
            phase: TimerPhase::Idle,
            task_name: None,
            task_path: None,
            session: None,
            started_at: None,
            paused_at: None,
            total_paused: Duration::zero(),
            current_pomodoro_index: 0,
            last_notified_pomodoro: 0,
        }
    }
}

impl TimerState {
    pub fn begin(
        &mut self,
        task_name: String,
        task_path: Option<String>,
        session: SessionHandle,
        started_at: DateTime<Local>,
    ) {
        *self = Self {
            phase: TimerPhase::Running,
            task_name: Some(task_name),
            task_path,
            session: Some(session),
            started_at: Some(started_at),
            paused_at: None,
            total_paused: Duration::zero(),
            current_pomodoro_index: 1,
            last_notified_pomodoro: 0,
        };
    }

    pub fn pause(&mut self, now: DateTime<Local>) {
        self.phase = TimerPhase::Paused;
        self.paused_at = Some(now);
    }

    pub fn resume(&mut self, now: DateTime<Local>) {
        if let Some(paused_at) = self.paused_at.take() {
            let span = now - paused_at;
            if span > Duration::zero() {
                self.total_paused = self.total_paused + span;
            }
        }
        self.phase = TimerPhase::Running;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.phase != TimerPhase::Idle
    }

    /// Running time of the work block. Frozen while paused, never negative.
    pub fn elapsed(&self, now: DateTime<Local>) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::zero();
        };
        let until = match (self.phase, self.paused_at) {
            (TimerPhase::Idle, _) => return Duration::zero(),
            (TimerPhase::Paused, Some(paused_at)) => paused_at,
            _ => now,
        };
        let elapsed = until - started_at - self.total_paused;
        elapsed.max(Duration::zero())
    }

    /// Time spent paused so far, including an ongoing pause.
    pub fn paused(&self, now: DateTime<Local>) -> Duration {
        match self.paused_at {
            Some(paused_at) if now > paused_at => self.total_paused + (now - paused_at),
            _ => self.total_paused,
        }
    }

    pub fn completed_pomodoros(&self, now: DateTime<Local>, pomodoro: Duration) -> u32 {
        let pomodoro_ms = pomodoro.num_milliseconds();
        if pomodoro_ms <= 0 {
            return 0;
        }
        let completed = self.elapsed(now).num_milliseconds() / pomodoro_ms;
        u32::try_from(completed).unwrap_or(u32::MAX)
    }
}
