//! The pomodoro timer state machine.

mod service;
mod state;

pub use service::TimerService;
pub use state::TimerState;
