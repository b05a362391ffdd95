//! State machine behaviour against an in-memory session store and a
//! hand-driven clock.

use chrono::{Duration, Local, TimeZone};
use pomonote::{ManualClock, MemorySessionStore, Outcome, TimerError, TimerService};
use pomonote_ipc::{TimerEvent, TimerPhase};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

struct Fixture {
    timer: TimerService<MemorySessionStore>,
    clock: ManualClock,
    events: Arc<Mutex<Vec<TimerEvent>>>,
}

impl Fixture {
    fn new(pomodoro: Duration) -> Self {
        let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap());
        let mut timer =
            TimerService::new(MemorySessionStore::new(), Arc::new(clock.clone()), pomodoro);
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        timer.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        Self {
            timer,
            clock,
            events,
        }
    }

    /// Every event except ticks, in emission order.
    fn events(&self) -> Vec<TimerEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !matches!(e, TimerEvent::Tick { .. }))
            .cloned()
            .collect()
    }

    fn pomodoro_events(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TimerEvent::PomodoroComplete { count } => Some(count),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn first_tick_after_start_never_completes_a_pomodoro() {
    for ms in [1, 1000, 1_500_000] {
        let mut f = Fixture::new(Duration::milliseconds(ms));
        f.timer.start("Write", None).unwrap();
        f.timer.tick();
        assert!(f.pomodoro_events().is_empty(), "duration {ms}ms");
    }
}

#[test]
fn exact_boundary_fires_once() {
    let mut f = Fixture::new(Duration::milliseconds(1000));
    f.timer.start("Write", None).unwrap();

    f.clock.advance_ms(1000);
    f.timer.tick();
    f.timer.tick();

    assert_eq!(f.pomodoro_events(), vec![1]);
}

#[test]
fn skipped_boundaries_coalesce_into_one_event() {
    let mut f = Fixture::new(Duration::milliseconds(1000));
    f.timer.start("Write", None).unwrap();

    f.clock.advance_ms(3500);
    f.timer.tick();

    assert_eq!(f.pomodoro_events(), vec![3]);
    assert_eq!(f.timer.state().current_pomodoro_index, 4);
}

#[test]
fn paused_time_does_not_count_towards_a_pomodoro() {
    let mut f = Fixture::new(Duration::milliseconds(1000));
    f.timer.start("Write", None).unwrap();

    f.clock.advance_ms(500);
    f.timer.tick();
    f.timer.pause().unwrap();
    f.clock.advance_ms(5000);
    f.timer.resume().unwrap();
    f.timer.tick();
    assert!(f.pomodoro_events().is_empty());

    f.clock.advance_ms(500);
    f.timer.tick();
    assert_eq!(f.pomodoro_events(), vec![1]);
    assert_eq!(f.timer.elapsed_ms(), 1000);
}

#[test]
fn elapsed_is_frozen_while_paused() {
    let mut f = Fixture::new(Duration::minutes(25));
    f.timer.start("Write", None).unwrap();
    f.clock.advance_ms(2_000);
    f.timer.pause().unwrap();

    f.clock.advance_ms(60_000);
    assert_eq!(f.timer.elapsed_ms(), 2_000);

    // Ticks while paused are ignored entirely.
    f.timer.tick();
    assert!(f.events.lock().unwrap().iter().all(|e| !matches!(e, TimerEvent::Tick { .. })));
}

#[test]
fn twenty_five_minute_pomodoro_boundary() {
    let mut f = Fixture::new(Duration::minutes(25));
    f.timer.start("Write", None).unwrap();

    f.clock.advance_ms(1_499_999);
    f.timer.tick();
    assert!(f.pomodoro_events().is_empty());
    assert_eq!(f.timer.state().current_pomodoro_index, 1);

    f.clock.advance_ms(1);
    f.timer.tick();
    assert_eq!(f.pomodoro_events(), vec![1]);
    assert_eq!(f.timer.status().current_pomodoro_index, 2);
}

#[test]
fn tick_event_follows_the_boundary_event() {
    let mut f = Fixture::new(Duration::milliseconds(1000));
    f.timer.start("Write", None).unwrap();
    f.clock.advance_ms(1000);
    f.timer.tick();

    let events = f.events.lock().unwrap().clone();
    let names: Vec<_> = events.iter().map(TimerEvent::name).collect();
    assert_eq!(names, vec!["start", "pomodoro-complete", "tick"]);
    match &events[2] {
        TimerEvent::Tick { status } => {
            assert_eq!(status.elapsed_seconds, 1);
            assert_eq!(status.current_pomodoro_index, 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn complete_resets_to_idle_and_allows_a_new_start() {
    let mut f = Fixture::new(Duration::minutes(25));
    let first = f.timer.start("Write", Some("Tasks/Write.md")).unwrap();
    f.clock.advance(Duration::minutes(30));

    let closed = f.timer.complete().unwrap();
    assert_eq!(closed, first);
    assert_eq!(f.timer.status().phase, TimerPhase::Idle);
    assert_eq!(f.timer.status().session, None);

    let meta = f.timer.store().get(&first).unwrap();
    assert_eq!(meta.outcome, Some(Outcome::Complete));
    assert_eq!(meta.task, "[[Tasks/Write|Write]]");
    assert_eq!(meta.hour_of_day, Some(9));
    assert_eq!(meta.duration(), Some(Duration::minutes(30)));

    let second = f.timer.start("Review", None).unwrap();
    assert_ne!(second, first);
    assert_eq!(f.timer.phase(), TimerPhase::Running);
}

#[test]
fn guards_reject_invalid_transitions_without_touching_state() {
    let mut f = Fixture::new(Duration::minutes(25));

    assert!(matches!(f.timer.pause(), Err(TimerError::InvalidState(_))));
    assert!(matches!(f.timer.complete(), Err(TimerError::InvalidState(_))));
    assert_eq!(f.timer.state().phase, TimerPhase::Idle);

    f.timer.start("Write", None).unwrap();
    let running = f.timer.state().clone();
    assert!(f.timer.resume().unwrap_err().is_invalid_state());
    assert!(f.timer.start("Other", None).unwrap_err().is_invalid_state());
    assert_eq!(f.timer.state(), &running);

    f.timer.pause().unwrap();
    let paused = f.timer.state().clone();
    assert!(f.timer.pause().unwrap_err().is_invalid_state());
    assert!(f.timer.start("Other", None).unwrap_err().is_invalid_state());
    assert_eq!(f.timer.state(), &paused);
    assert_eq!(f.timer.store().len(), 1);
}

#[test]
fn toggle_is_a_no_op_when_idle() {
    let mut f = Fixture::new(Duration::minutes(25));
    f.timer.toggle_pause().unwrap();
    assert_eq!(f.timer.phase(), TimerPhase::Idle);

    f.timer.start("Write", None).unwrap();
    f.timer.toggle_pause().unwrap();
    assert_eq!(f.timer.phase(), TimerPhase::Paused);
    f.timer.toggle_pause().unwrap();
    assert_eq!(f.timer.phase(), TimerPhase::Running);
}

#[test]
fn note_spans_the_whole_block_when_completed_while_paused() {
    let mut f = Fixture::new(Duration::minutes(25));
    let session = f.timer.start("Write", None).unwrap();
    f.clock.advance(Duration::minutes(10));
    f.timer.pause().unwrap();
    f.clock.advance(Duration::minutes(5));

    f.timer.complete().unwrap();
    let meta = f.timer.store().get(&session).unwrap();
    // The note records wall-clock start and end of the block.
    assert_eq!(meta.duration(), Some(Duration::minutes(15)));
    assert_eq!(f.timer.phase(), TimerPhase::Idle);
}

#[test]
fn stop_keeps_the_note_and_cancel_deletes_it() {
    let mut f = Fixture::new(Duration::minutes(25));
    let stopped = f.timer.start("Write", None).unwrap();
    f.clock.advance(Duration::minutes(3));
    f.timer.stop().unwrap();
    assert_eq!(
        f.timer.store().get(&stopped).unwrap().outcome,
        Some(Outcome::Stop)
    );

    let cancelled = f.timer.start("Write", None).unwrap();
    f.timer.cancel().unwrap();
    assert!(f.timer.store().get(&cancelled).is_none());
    assert_eq!(f.timer.phase(), TimerPhase::Idle);

    let names: Vec<_> = f.events().iter().map(TimerEvent::name).collect();
    assert_eq!(names, vec!["start", "stop", "start", "cancel"]);
}

#[test]
fn failed_closing_write_still_leaves_the_timer_idle() {
    let mut f = Fixture::new(Duration::minutes(25));
    let session = f.timer.start("Write", None).unwrap();
    f.timer.store_mut().fail_writes(true);

    let closed = f.timer.complete().unwrap();
    assert_eq!(closed, session);
    assert_eq!(f.timer.phase(), TimerPhase::Idle);
    assert!(!f.timer.store().get(&session).unwrap().is_finished());

    let events = f.events();
    assert_eq!(
        events.iter().map(TimerEvent::name).collect::<Vec<_>>(),
        vec!["start", "complete", "session-write-failed"]
    );

    f.timer.store_mut().fail_writes(false);
    f.timer.start("Write", None).unwrap();
}

#[test]
fn start_fails_cleanly_when_the_note_cannot_be_created() {
    let mut f = Fixture::new(Duration::minutes(25));
    f.timer.store_mut().fail_writes(true);

    assert!(matches!(
        f.timer.start("Write", None),
        Err(TimerError::Persistence(_))
    ));
    assert_eq!(f.timer.phase(), TimerPhase::Idle);
    assert!(f.events().is_empty());
}

#[test]
fn energy_is_rated_on_finished_sessions_only() {
    let mut f = Fixture::new(Duration::minutes(25));
    let session = f.timer.start("Write", None).unwrap();
    assert!(f.timer.rate_energy(&session, 3).is_err());

    f.timer.complete().unwrap();
    f.timer.rate_energy(&session, 0).unwrap();
    assert_eq!(f.timer.store().get(&session).unwrap().energy, Some(0));

    assert!(matches!(
        f.timer.rate_energy(&session, 6),
        Err(TimerError::InvalidEnergy(6))
    ));
}

#[test]
fn unsubscribed_listeners_hear_nothing_more() {
    let mut f = Fixture::new(Duration::minutes(25));
    let heard = Arc::new(Mutex::new(0));
    let counter = heard.clone();
    let id = f.timer.subscribe(move |_| *counter.lock().unwrap() += 1);

    f.timer.start("Write", None).unwrap();
    assert!(f.timer.unsubscribe(id));
    f.timer.pause().unwrap();

    assert_eq!(*heard.lock().unwrap(), 1);
    assert_eq!(f.events().len(), 2);
}
