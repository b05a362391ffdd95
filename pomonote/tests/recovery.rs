//! Crash recovery: sessions a previous process left without an end time.

use chrono::{DateTime, Duration, Local, TimeZone};
use pomonote::recovery::{self, RecoveryCandidate};
use pomonote::session::to_note_time;
use pomonote::{
    FileSessionStore, ManualClock, MemorySessionStore, Outcome, SessionMeta, SessionStore,
    StoreError, TimerService,
};
use pomonote_ipc::{RecoveryDecision, TimerEvent, TimerPhase};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn nine_am() -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
}

fn timer_with(
    store: MemorySessionStore,
    pomodoro: Duration,
) -> (TimerService<MemorySessionStore>, ManualClock) {
    let clock = ManualClock::new(nine_am());
    let timer = TimerService::new(store, Arc::new(clock.clone()), pomodoro);
    (timer, clock)
}

fn candidate(timer: &mut TimerService<MemorySessionStore>) -> RecoveryCandidate {
    let ready = timer.store_mut().load_index().unwrap();
    recovery::scan(timer.store(), &ready).unwrap().unwrap()
}

#[test]
fn resumed_session_counts_from_its_original_start() {
    let mut store = MemorySessionStore::new();
    let started = nine_am() - Duration::milliseconds(600_000);
    let handle = store.insert(SessionMeta::new(
        "[[Tasks/Write|Write]]",
        to_note_time(started),
    ));
    let (mut timer, _clock) = timer_with(store, Duration::minutes(25));

    let found = candidate(&mut timer);
    timer.recover(&found, RecoveryDecision::Resume).unwrap();

    let status = timer.status();
    assert_eq!(status.phase, TimerPhase::Running);
    assert_eq!(status.elapsed_seconds, 600);
    assert_eq!(status.task_name.as_deref(), Some("Write"));
    assert_eq!(status.task_path.as_deref(), Some("Tasks/Write.md"));
    assert_eq!(status.session.as_deref(), Some(handle.as_str()));
    assert_eq!(status.current_pomodoro_index, 1);
    assert!(timer.store().get(&handle).unwrap().resumed);
}

#[test]
fn resume_treats_passed_boundaries_as_announced() {
    let mut store = MemorySessionStore::new();
    store.insert(SessionMeta::new(
        "Write",
        to_note_time(nine_am() - Duration::minutes(10)),
    ));
    let (mut timer, clock) = timer_with(store, Duration::minutes(4));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    timer.subscribe(move |event| {
        if let TimerEvent::PomodoroComplete { count } = event {
            sink.lock().unwrap().push(*count);
        }
    });

    let found = candidate(&mut timer);
    timer.recover(&found, RecoveryDecision::Resume).unwrap();
    assert_eq!(timer.state().last_notified_pomodoro, 2);
    assert_eq!(timer.state().current_pomodoro_index, 3);

    timer.tick();
    assert!(events.lock().unwrap().is_empty());

    clock.advance(Duration::minutes(2));
    timer.tick();
    assert_eq!(*events.lock().unwrap(), vec![3]);
}

#[test]
fn abandon_closes_the_note_without_starting_the_timer() {
    let mut store = MemorySessionStore::new();
    let handle = store.insert(SessionMeta::new(
        "Write",
        to_note_time(nine_am() - Duration::hours(2)),
    ));
    let (mut timer, _clock) = timer_with(store, Duration::minutes(25));

    let found = candidate(&mut timer);
    timer.recover(&found, RecoveryDecision::Abandon).unwrap();

    assert_eq!(timer.phase(), TimerPhase::Idle);
    let meta = timer.store().get(&handle).unwrap();
    assert_eq!(meta.outcome, Some(Outcome::Abandoned));
    assert_eq!(meta.ended, Some(to_note_time(nine_am())));
    assert!(timer.store().find_unfinished().unwrap().is_empty());
}

#[test]
fn ignore_leaves_the_note_unfinished() {
    let mut store = MemorySessionStore::new();
    let handle = store.insert(SessionMeta::new(
        "Write",
        to_note_time(nine_am() - Duration::hours(2)),
    ));
    let (mut timer, _clock) = timer_with(store, Duration::minutes(25));

    let found = candidate(&mut timer);
    timer.recover(&found, RecoveryDecision::Ignore).unwrap();

    assert_eq!(timer.phase(), TimerPhase::Idle);
    assert!(!timer.store().get(&handle).unwrap().is_finished());
}

#[test]
fn scan_waits_for_the_index() {
    let mut store = MemorySessionStore::new();
    store.insert(SessionMeta::new("Write", to_note_time(nine_am())));

    // A fabricated token does not make an unloaded store scannable.
    let premature = pomonote::IndexReady { documents: 0 };
    assert!(matches!(
        recovery::scan(&store, &premature),
        Err(StoreError::IndexNotReady)
    ));

    let ready = store.load_index().unwrap();
    assert_eq!(ready.documents, 1);
    assert!(recovery::scan(&store, &ready).unwrap().is_some());
}

#[test]
fn newest_unfinished_session_is_offered() {
    let mut store = MemorySessionStore::new();
    store.insert(SessionMeta::new(
        "Older",
        to_note_time(nine_am() - Duration::days(1)),
    ));
    let newest = store.insert(SessionMeta::new(
        "Newer",
        to_note_time(nine_am() - Duration::hours(1)),
    ));
    let mut closed = SessionMeta::new("Closed", to_note_time(nine_am()));
    closed.ended = Some(to_note_time(nine_am()));
    closed.outcome = Some(Outcome::Complete);
    store.insert(closed);

    let ready = store.load_index().unwrap();
    let found = recovery::scan(&store, &ready).unwrap().unwrap();
    assert_eq!(found.record.handle, newest);

    let info = found.info(nine_am());
    assert_eq!(info.task_name, "Newer");
    assert_eq!(info.task_path, None);
    assert_eq!(info.started, "2026-10-18T08:00:00");
    assert_eq!(info.elapsed_seconds, 3600);
}

#[test]
fn nothing_to_recover_from_an_empty_store() {
    let mut store = MemorySessionStore::new();
    let ready = store.load_index().unwrap();
    assert_eq!(recovery::scan(&store, &ready).unwrap(), None);
}

#[test]
fn resume_is_refused_while_a_timer_is_active() {
    let mut store = MemorySessionStore::new();
    let stale = store.insert(SessionMeta::new(
        "Stale",
        to_note_time(nine_am() - Duration::hours(1)),
    ));
    let (mut timer, _clock) = timer_with(store, Duration::minutes(25));
    let found = candidate(&mut timer);

    let current = timer.start("Current", None).unwrap();
    let err = timer.recover(&found, RecoveryDecision::Resume).unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(timer.state().session.as_ref(), Some(&current));
    assert!(!timer.store().get(&stale).unwrap().resumed);
}

#[test]
fn task_names_with_link_syntax_survive_a_crash_on_disk() {
    let cases = [
        ("Q3/Q4 planning", None),
        ("A|B", None),
        ("Budget | Q4", Some("Tasks/Budget.md")),
    ];
    for (name, path) in cases {
        let vault = TempDir::new().unwrap();
        let clock = ManualClock::new(nine_am());
        let mut before = TimerService::new(
            FileSessionStore::new(vault.path(), "Pomodoro/Sessions"),
            Arc::new(clock.clone()),
            Duration::minutes(25),
        );
        let handle = before.start(name, path).unwrap();
        drop(before);

        clock.advance(Duration::minutes(10));
        let mut after = TimerService::new(
            FileSessionStore::new(vault.path(), "Pomodoro/Sessions"),
            Arc::new(clock.clone()),
            Duration::minutes(25),
        );
        let ready = after.store_mut().load_index().unwrap();
        let found = recovery::scan(after.store(), &ready).unwrap().unwrap();
        after.recover(&found, RecoveryDecision::Resume).unwrap();

        let status = after.status();
        assert_eq!(status.task_name.as_deref(), Some(name));
        assert_eq!(status.task_path.as_deref(), path);
        assert_eq!(status.session.as_deref(), Some(handle.as_str()));
        assert_eq!(status.elapsed_seconds, 600);
    }
}
