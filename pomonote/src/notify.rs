use pomonote_ipc::TimerEvent;
use tracing::warn;

/// Listener that raises a desktop notification when a pomodoro or a whole
/// work block finishes.
pub fn desktop_notifier() -> impl FnMut(&TimerEvent) + Send + 'static {
    |event: &TimerEvent| match event {
        TimerEvent::PomodoroComplete { count } => {
            let body = if *count == 1 {
                "1 pomodoro done. Time for a break?".to_string()
            } else {
                format!("{count} pomodoros done. Time for a break?")
            };
            send_notification("Pomodoro complete", &body);
        }
        TimerEvent::Complete { .. } => send_notification("Session complete", "Nice work."),
        TimerEvent::SessionWriteFailed { session, .. } => send_notification(
            "Session not saved",
            &format!("The note {session} may be incomplete."),
        ),
        _ => {}
    }
}

fn send_notification(title: &str, body: &str) {
    if let Err(e) = notify_rust::Notification::new()
        .summary(title)
        .body(body)
        .appname("pomonote")
        .show()
    {
        warn!(error = %e, "Failed to send notification");
    }
}
