use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{sync::broadcast, time::sleep};

use routine_timer::{
    notify::{Notifier, RecordingSurface, RecurrencePolicy},
    state::{
        AppState, Command, CommandOutcome, ControllerSettings, DurationInput, NotificationPermission,
        Routine, UiEvent,
    },
    storage::{self, KeyValueStore, MemoryStore},
    utils::Clock,
    worker::WorkerMessage,
};

struct Fixture {
    state: Arc<AppState>,
    store: Arc<MemoryStore>,
    surface: Arc<RecordingSurface>,
    events: broadcast::Receiver<UiEvent>,
}

fn granted_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    storage::save_permission(store.as_ref(), NotificationPermission::Granted).unwrap();
    store
}

fn fixture_with(policy: RecurrencePolicy, store: Arc<MemoryStore>, surface: Arc<RecordingSurface>) -> Fixture {
    let (events_tx, events) = broadcast::channel(1024);
    let notifier = Notifier::new(policy, surface.clone(), None, events_tx.clone());
    // Countdowns follow the paused test runtime
    let state = Arc::new(AppState::with_clock(
        ControllerSettings::default(),
        store.clone() as Arc<dyn KeyValueStore>,
        notifier,
        events_tx,
        Clock::runtime(),
    ));
    Fixture { state, store, surface, events }
}

fn fixture(policy: RecurrencePolicy) -> Fixture {
    fixture_with(policy, granted_store(), Arc::new(RecordingSurface::granting()))
}

fn minutes(n: f64) -> Option<DurationInput> {
    Some(DurationInput::Number(n))
}

fn add(f: &Fixture, name: &str, duration: u32) -> Routine {
    match f.state.handle(Command::Add { name: name.into(), duration: minutes(duration as f64) }) {
        Ok(CommandOutcome::Added { routine }) => routine,
        other => panic!("add failed: {other:?}"),
    }
}

fn routine(f: &Fixture, id: i64) -> Routine {
    f.state.routine(id).unwrap().expect("routine exists")
}

fn drain(events: &mut broadcast::Receiver<UiEvent>) -> Vec<UiEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

#[tokio::test]
async fn valid_add_appends_one_inactive_routine() {
    let f = fixture(RecurrencePolicy::Recurring);

    let routine = add(&f, "  Stretch  ", 1);
    assert_eq!(routine.name, "Stretch");
    assert_eq!(routine.duration, 1);
    assert!(!routine.is_active);
    assert_eq!(f.state.routines().unwrap().len(), 1);

    let second = add(&f, "Tea", 3);
    assert!(second.id > routine.id);
    assert_eq!(f.state.routines().unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_add_changes_nothing() {
    let f = fixture(RecurrencePolicy::Recurring);
    add(&f, "Stretch", 1);
    let writes = f.store.write_count();

    let inputs = [
        ("", minutes(5.0)),
        ("Read", None),
        ("Read", minutes(0.0)),
        ("Read", minutes(-2.0)),
        ("Read", Some(DurationInput::Text("later".into()))),
    ];
    for (name, duration) in inputs {
        let err = f.state.handle(Command::Add { name: name.into(), duration }).unwrap_err();
        assert!(err.is_validation());
    }

    assert_eq!(f.state.routines().unwrap().len(), 1);
    assert_eq!(f.store.write_count(), writes);
}

#[tokio::test(start_paused = true)]
async fn start_then_stop_leaves_no_timer() {
    let f = fixture(RecurrencePolicy::Recurring);
    let id = add(&f, "Stretch", 1).id;

    assert_eq!(f.state.handle(Command::Start { id }).unwrap(), CommandOutcome::Started { id });
    assert!(f.state.has_timer(id));
    assert_eq!(f.state.handle(Command::Stop { id }).unwrap(), CommandOutcome::Stopped { id });

    let stopped = routine(&f, id);
    assert!(!stopped.is_active);
    assert_eq!(stopped.start_time, None);
    assert_eq!(stopped.remaining_time, None);
    assert!(!f.state.has_timer(id));

    // Nothing left to stop, so delete only removes
    assert_eq!(f.state.handle(Command::Stop { id }).unwrap(), CommandOutcome::Unchanged);
    assert_eq!(f.state.handle(Command::Delete { id }).unwrap(), CommandOutcome::Deleted { id });
    assert!(f.state.routines().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn second_start_is_a_no_op() {
    let f = fixture(RecurrencePolicy::Recurring);
    let id = add(&f, "Stretch", 1).id;

    assert!(f.state.start(id).unwrap());
    let first_start = routine(&f, id).start_time;
    sleep(Duration::from_secs(2)).await;
    assert!(!f.state.start(id).unwrap());

    assert_eq!(f.state.active_timer_count(), 1);
    assert_eq!(routine(&f, id).start_time, first_start);
}

#[tokio::test(start_paused = true)]
async fn unknown_ids_are_ignored() {
    let f = fixture(RecurrencePolicy::Recurring);
    for command in [
        Command::Start { id: 99 },
        Command::Stop { id: 99 },
        Command::Delete { id: 99 },
        Command::StopAll,
    ] {
        assert_eq!(f.state.handle(command).unwrap(), CommandOutcome::Unchanged);
    }
    assert_eq!(f.state.complete(99, 1).await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn recurring_routine_completes_notifies_once_and_restarts() {
    let mut f = fixture(RecurrencePolicy::Recurring);
    let id = add(&f, "Stretch", 1).id;

    f.state.start(id).unwrap();
    assert_eq!(f.state.view().unwrap().row(id).unwrap().countdown, "01:00");

    sleep(Duration::from_millis(30_500)).await;
    let remaining = routine(&f, id).remaining_time.unwrap();
    assert!(remaining <= 30_000 && remaining > 0, "remaining {remaining}");
    let ticks: Vec<String> = drain(&mut f.events)
        .into_iter()
        .filter_map(|e| match e {
            UiEvent::Tick { id: tick_id, display, .. } if tick_id == id => Some(display),
            _ => None,
        })
        .collect();
    assert!(ticks.contains(&"00:45".to_string()));

    // Completed at 60s, restart pending for one second
    sleep(Duration::from_secs(30)).await;
    let completed = routine(&f, id);
    assert!(!completed.is_active);
    assert!(f.state.has_pending_restart(id));
    assert_eq!(f.surface.show_count(), 1);

    let shown = f.surface.shown();
    assert_eq!(shown[0].title, "Stretch complete!");
    assert!(shown[0].actions.is_empty(), "direct path strips actions");

    let events = drain(&mut f.events);
    assert_eq!(
        events.iter().filter(|e| matches!(e, UiEvent::CompletionAlert { .. })).count(),
        1
    );

    sleep(Duration::from_secs(1)).await;
    let restarted = routine(&f, id);
    assert!(restarted.is_active);
    assert_eq!(f.state.view().unwrap().row(id).unwrap().countdown, "01:00");
    assert_eq!(f.surface.show_count(), 1);
    assert_eq!(f.state.active_timer_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn one_shot_routine_stays_inactive() {
    let mut f = fixture(RecurrencePolicy::OneShot);
    let id = add(&f, "Tea", 1).id;
    f.state.start(id).unwrap();

    sleep(Duration::from_millis(60_500)).await;
    assert!(!routine(&f, id).is_active);
    assert!(!f.state.has_timer(id));
    assert_eq!(f.surface.show_count(), 1);
    assert!(f.surface.shown()[0].require_interaction);

    sleep(Duration::from_secs(10)).await;
    assert!(!routine(&f, id).is_active);
    assert_eq!(f.surface.show_count(), 1);
    assert!(!drain(&mut f.events)
        .iter()
        .any(|e| matches!(e, UiEvent::CompletionAlert { .. })));
}

#[tokio::test(start_paused = true)]
async fn stopping_during_restart_delay_cancels_the_restart() {
    let f = fixture(RecurrencePolicy::Recurring);
    let id = add(&f, "Stretch", 1).id;
    f.state.start(id).unwrap();

    sleep(Duration::from_millis(60_300)).await;
    assert!(f.state.has_pending_restart(id));

    assert_eq!(f.state.handle(Command::Stop { id }).unwrap(), CommandOutcome::Stopped { id });
    sleep(Duration::from_secs(5)).await;
    assert!(!routine(&f, id).is_active);
    assert!(!f.state.has_timer(id));
}

#[tokio::test(start_paused = true)]
async fn routines_tick_independently() {
    let f = fixture(RecurrencePolicy::Recurring);
    let a = add(&f, "Stretch", 2).id;
    let b = add(&f, "Tea", 5).id;

    f.state.start(a).unwrap();
    sleep(Duration::from_secs(10)).await;
    f.state.start(b).unwrap();
    sleep(Duration::from_millis(5_500)).await;

    let b_before = routine(&f, b).remaining_time.unwrap();
    f.state.stop(a).unwrap();
    assert!(!routine(&f, a).is_active);
    assert!(routine(&f, b).is_active);
    assert_eq!(routine(&f, b).remaining_time.unwrap(), b_before);

    sleep(Duration::from_secs(5)).await;
    let b_after = routine(&f, b).remaining_time.unwrap();
    assert!(b_after < b_before);
    assert_eq!(f.state.active_timer_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn deleting_an_active_routine_silences_its_ticks() {
    let mut f = fixture(RecurrencePolicy::Recurring);
    let id = add(&f, "Stretch", 1).id;
    f.state.start(id).unwrap();
    sleep(Duration::from_millis(2_500)).await;

    assert_eq!(f.state.handle(Command::Delete { id }).unwrap(), CommandOutcome::Deleted { id });
    assert!(!f.state.has_timer(id));
    drain(&mut f.events);

    sleep(Duration::from_secs(120)).await;
    let after = drain(&mut f.events);
    assert!(after.iter().all(|e| !matches!(e, UiEvent::Tick { .. })));
    assert_eq!(f.surface.show_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn worker_stop_message_stops_every_active_routine() {
    let f = fixture(RecurrencePolicy::Recurring);
    let a = add(&f, "Stretch", 1).id;
    let b = add(&f, "Tea", 4).id;
    let idle = add(&f, "Walk", 10).id;
    f.state.start(a).unwrap();
    f.state.start(b).unwrap();

    let outcome = f.state.handle_worker_message(WorkerMessage::StopAllTimers).unwrap();
    assert_eq!(outcome, CommandOutcome::StoppedAll { ids: vec![a, b] });
    for id in [a, b, idle] {
        assert!(!routine(&f, id).is_active);
        assert!(!f.state.has_timer(id));
    }
}

#[tokio::test(start_paused = true)]
async fn permission_gates_system_notifications_only() {
    let mut f = fixture_with(
        RecurrencePolicy::Recurring,
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingSurface::granting()),
    );
    assert_eq!(f.state.permission(), NotificationPermission::Default);

    let id = add(&f, "Stretch", 1).id;
    f.state.start(id).unwrap();
    sleep(Duration::from_millis(60_500)).await;

    assert_eq!(f.surface.show_count(), 0);
    assert!(drain(&mut f.events)
        .iter()
        .any(|e| matches!(e, UiEvent::CompletionAlert { .. })));
}

#[tokio::test]
async fn permission_request_updates_and_persists() {
    let mut f = fixture_with(
        RecurrencePolicy::Recurring,
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingSurface::granting()),
    );

    let outcome = f.state.handle(Command::RequestPermission).unwrap();
    match outcome {
        CommandOutcome::Permission { status } => {
            assert_eq!(status.permission, NotificationPermission::Granted);
            assert!(!status.show_enable_button);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(storage::load_permission(f.store.as_ref()), NotificationPermission::Granted);
    assert!(drain(&mut f.events)
        .iter()
        .any(|e| matches!(e, UiEvent::PermissionStatus { .. })));
}

#[tokio::test]
async fn failed_permission_request_keeps_state_but_refreshes_status() {
    let mut f = fixture_with(
        RecurrencePolicy::Recurring,
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingSurface::failing("no notification server")),
    );

    let status = f.state.request_permission();
    assert_eq!(status.permission, NotificationPermission::Default);
    assert!(status.show_enable_button);
    assert!(drain(&mut f.events)
        .iter()
        .any(|e| matches!(e, UiEvent::PermissionStatus { .. })));
}

#[tokio::test(start_paused = true)]
async fn reload_preserves_routines_and_resumes_countdowns() {
    let f = fixture(RecurrencePolicy::Recurring);
    let stretch = add(&f, "Stretch", 1);
    let tea = add(&f, "Tea", 3);
    f.state.start(stretch.id).unwrap();
    sleep(Duration::from_millis(10_500)).await;

    let reloaded = fixture_with(
        RecurrencePolicy::Recurring,
        f.store.clone(),
        Arc::new(RecordingSurface::granting()),
    );
    let routines = reloaded.state.routines().unwrap();
    assert_eq!(routines.len(), 2);
    for (before, after) in [&stretch, &tea].into_iter().zip(&routines) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.name, after.name);
        assert_eq!(before.duration, after.duration);
    }

    let report = reloaded.state.reconcile().unwrap();
    assert_eq!(report.resumed, vec![stretch.id]);
    assert!(report.reset.is_empty());
    assert!(reloaded.state.has_timer(stretch.id));
    assert!(!reloaded.state.has_timer(tea.id));
}

#[tokio::test(start_paused = true)]
async fn reload_resets_countdowns_that_elapsed_while_down() {
    let mut stale = Routine::new(1, "Stretch".into(), 1);
    stale.activate(Utc::now() - chrono::Duration::hours(2));
    let store = granted_store();
    storage::save_routines(store.as_ref(), &[stale]).unwrap();

    let f = fixture_with(RecurrencePolicy::Recurring, store, Arc::new(RecordingSurface::granting()));
    let report = f.state.reconcile().unwrap();
    assert_eq!(report.reset, vec![1]);
    assert!(report.resumed.is_empty());

    assert!(!routine(&f, 1).is_active);
    assert!(!storage::load_routines(f.store.as_ref())[0].is_active);
    assert_eq!(f.surface.show_count(), 0);
}

#[tokio::test]
async fn malformed_storage_starts_empty() {
    let store = Arc::new(MemoryStore::with_value(storage::ROUTINES_KEY, "[{broken"));
    let f = fixture_with(RecurrencePolicy::Recurring, store, Arc::new(RecordingSurface::granting()));
    assert!(f.state.routines().unwrap().is_empty());
    assert_eq!(f.state.view().unwrap().rows.len(), 0);
}

#[tokio::test(start_paused = true)]
async fn zero_duration_routines_never_load() {
    let store = granted_store();
    store.put(storage::ROUTINES_KEY, r#"[{"id":1,"name":"Bad","duration":0,"isActive":false}]"#).unwrap();
    let f = fixture_with(RecurrencePolicy::Recurring, store, Arc::new(RecordingSurface::granting()));

    assert!(f.state.routines().unwrap().is_empty());
    assert_eq!(f.state.handle(Command::Start { id: 1 }).unwrap(), CommandOutcome::Unchanged);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(f.surface.show_count(), 0);
}
