//! Routine controller: the application object shared by handlers and tasks

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{
    Command, CommandOutcome, DurationInput, NewRoutine, NotificationPermission, PermissionStatus,
    Routine, RoutineId, RoutineListView, UiEvent,
};
use crate::{
    error::{Result, RoutineError},
    notify::{DeliveryChannel, Notifier, RecurrencePolicy},
    storage::{self, KeyValueStore},
    tasks::{countdown_task, restart_task},
    utils::{format_time, Clock},
    worker::WorkerMessage,
};

/// Timing and identity of the controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Period of countdown ticks
    pub tick_interval: Duration,
    /// Delay before a completed routine restarts under the recurring policy
    pub restart_delay: Duration,
    pub port: u16,
    pub host: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            restart_delay: Duration::from_secs(1),
            port: 20554,
            host: "127.0.0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Countdown,
    PendingRestart,
}

/// Live task driving one routine
#[derive(Debug)]
struct TimerHandle {
    kind: TimerKind,
    /// Lets a task detect that it has been replaced
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct RoutineTable {
    routines: Vec<Routine>,
    timers: HashMap<RoutineId, TimerHandle>,
    generation: u64,
    last_id: RoutineId,
}

impl RoutineTable {
    fn new(routines: Vec<Routine>) -> Self {
        let last_id = routines.iter().map(|r| r.id).max().unwrap_or(0);
        Self {
            routines,
            last_id,
            ..Self::default()
        }
    }

    fn get(&self, id: RoutineId) -> Option<&Routine> {
        self.routines.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: RoutineId) -> Option<&mut Routine> {
        self.routines.iter_mut().find(|r| r.id == id)
    }

    /// Creation timestamp, bumped past the last id so ids never repeat
    fn next_id(&mut self, now_ms: i64) -> RoutineId {
        let id = now_ms.max(self.last_id + 1);
        self.last_id = id;
        id
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn owns(&self, id: RoutineId, generation: u64) -> bool {
        self.timers.get(&id).is_some_and(|t| t.generation == generation)
    }

    fn install(&mut self, id: RoutineId, handle: TimerHandle) {
        if let Some(previous) = self.timers.insert(id, handle) {
            previous.task.abort();
        }
    }

    /// Abort and forget the timer for `id`
    fn cancel(&mut self, id: RoutineId) -> Option<TimerKind> {
        self.timers.remove(&id).map(|timer| {
            timer.task.abort();
            timer.kind
        })
    }

    /// Forget the timer for `id` without aborting it; used by the task itself
    fn release(&mut self, id: RoutineId) {
        self.timers.remove(&id);
    }
}

/// What a countdown tick observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running { remaining_ms: i64 },
    Elapsed,
    /// The ticking task no longer owns the routine's timer
    Superseded,
}

/// Routines found active when the collection was loaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub resumed: Vec<RoutineId>,
    pub reset: Vec<RoutineId>,
}

/// Counters for the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub routines: usize,
    pub active: usize,
    pub pending_restarts: usize,
    pub permission: NotificationPermission,
}

/// Owns the routine collection, its timers and the notification flow
pub struct AppState {
    table: Mutex<RoutineTable>,
    permission: Mutex<NotificationPermission>,
    store: Arc<dyn KeyValueStore>,
    notifier: Notifier,
    clock: Clock,
    settings: ControllerSettings,
    /// Page-facing event stream
    pub events: broadcast::Sender<UiEvent>,
    pub start_time: Instant,
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl AppState {
    /// Create the controller from whatever the store holds
    pub fn new(
        settings: ControllerSettings,
        store: Arc<dyn KeyValueStore>,
        notifier: Notifier,
        events: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self::with_clock(settings, store, notifier, events, Clock::new())
    }

    pub fn with_clock(
        settings: ControllerSettings,
        store: Arc<dyn KeyValueStore>,
        notifier: Notifier,
        events: broadcast::Sender<UiEvent>,
        clock: Clock,
    ) -> Self {
        let routines = storage::load_routines(store.as_ref());
        let permission = storage::load_permission(store.as_ref());
        info!("Loaded {} routines, notification permission {:?}", routines.len(), permission);

        Self {
            table: Mutex::new(RoutineTable::new(routines)),
            permission: Mutex::new(permission),
            store,
            notifier,
            clock,
            settings,
            events,
            start_time: Instant::now(),
            last_action: Mutex::new(None),
        }
    }

    fn table(&self) -> Result<MutexGuard<'_, RoutineTable>> {
        self.table.lock()
            .map_err(|e| RoutineError::Lock(format!("routine table: {}", e)))
    }

    /// Dispatch a command
    pub fn handle(self: &Arc<Self>, command: Command) -> Result<CommandOutcome> {
        let label = command.label();
        debug!("Handling command: {}", label);

        let outcome = match command {
            Command::Add { name, duration } => CommandOutcome::Added {
                routine: self.add(&name, duration.as_ref())?,
            },
            Command::Start { id } => match self.start(id)? {
                true => CommandOutcome::Started { id },
                false => CommandOutcome::Unchanged,
            },
            Command::Stop { id } => match self.stop(id)? {
                true => CommandOutcome::Stopped { id },
                false => CommandOutcome::Unchanged,
            },
            Command::Delete { id } => match self.delete(id)? {
                true => CommandOutcome::Deleted { id },
                false => CommandOutcome::Unchanged,
            },
            Command::StopAll => {
                let ids = self.stop_all()?;
                if ids.is_empty() {
                    CommandOutcome::Unchanged
                } else {
                    CommandOutcome::StoppedAll { ids }
                }
            }
            Command::RequestPermission => CommandOutcome::Permission {
                status: self.request_permission(),
            },
        };

        if outcome.changed() {
            self.record_action(label);
        }
        Ok(outcome)
    }

    /// React to a message relayed by the background worker
    pub fn handle_worker_message(self: &Arc<Self>, message: WorkerMessage) -> Result<CommandOutcome> {
        info!("Worker message received: {:?}", message);
        match message {
            WorkerMessage::StopAllTimers => self.handle(Command::StopAll),
        }
    }

    /// Validate and append a new inactive routine
    pub fn add(&self, name: &str, duration: Option<&DurationInput>) -> Result<Routine> {
        let new_routine = match NewRoutine::parse(name, duration) {
            Ok(new_routine) => new_routine,
            Err(e) => {
                debug!("Rejected routine {:?} / {:?}: {}", name, duration, e);
                return Err(e);
            }
        };

        let mut table = self.table()?;
        let id = table.next_id(self.clock.now_millis());
        let routine = Routine::new(id, new_routine.name, new_routine.duration);
        table.routines.push(routine.clone());
        self.commit(&table);

        info!("Added routine {} ({}, {} min)", id, routine.name, routine.duration);
        Ok(routine)
    }

    /// Begin counting down. Returns false for unknown or already active ids.
    pub fn start(self: &Arc<Self>, id: RoutineId) -> Result<bool> {
        let mut table = self.table()?;
        let started = self.start_locked(&mut table, id, self.clock.now());
        if started {
            self.commit(&table);
            info!("Started routine {}", id);
        }
        Ok(started)
    }

    fn start_locked(self: &Arc<Self>, table: &mut RoutineTable, id: RoutineId, now: DateTime<Utc>) -> bool {
        let Some(routine) = table.get_mut(id) else {
            debug!("Start ignored, unknown routine {}", id);
            return false;
        };
        if routine.is_active {
            debug!("Start ignored, routine {} is already active", id);
            return false;
        }
        routine.activate(now);

        self.spawn_countdown(table, id);
        true
    }

    fn spawn_countdown(self: &Arc<Self>, table: &mut RoutineTable, id: RoutineId) {
        let generation = table.next_generation();
        let task = tokio::spawn(countdown_task(
            Arc::clone(self),
            id,
            generation,
            self.settings.tick_interval,
        ));
        table.install(id, TimerHandle { kind: TimerKind::Countdown, generation, task });
    }

    /// Stop counting down; also cancels a pending restart.
    /// Returns false when there was nothing to stop.
    pub fn stop(&self, id: RoutineId) -> Result<bool> {
        let mut table = self.table()?;
        let stopped = self.stop_locked(&mut table, id);
        if stopped {
            self.commit(&table);
            info!("Stopped routine {}", id);
        }
        Ok(stopped)
    }

    fn stop_locked(&self, table: &mut RoutineTable, id: RoutineId) -> bool {
        let cancelled = table.cancel(id);
        let Some(routine) = table.get_mut(id) else {
            return false;
        };

        if !routine.is_active {
            if cancelled == Some(TimerKind::PendingRestart) {
                info!("Cancelled pending restart of routine {}", id);
                return true;
            }
            return false;
        }

        routine.deactivate();
        true
    }

    /// Stop every active routine and cancel every pending restart
    pub fn stop_all(&self) -> Result<Vec<RoutineId>> {
        let mut table = self.table()?;
        let ids: Vec<RoutineId> = table.routines.iter()
            .filter(|r| r.is_active || table.timers.contains_key(&r.id))
            .map(|r| r.id)
            .collect();

        let stopped: Vec<RoutineId> = ids.into_iter()
            .filter(|id| self.stop_locked(&mut table, *id))
            .collect();

        if !stopped.is_empty() {
            self.commit(&table);
            info!("Stopped {} routines", stopped.len());
        }
        Ok(stopped)
    }

    /// Remove a routine, stopping its timer first
    pub fn delete(&self, id: RoutineId) -> Result<bool> {
        let mut table = self.table()?;
        self.stop_locked(&mut table, id);

        let Some(index) = table.routines.iter().position(|r| r.id == id) else {
            debug!("Delete ignored, unknown routine {}", id);
            return Ok(false);
        };
        let removed = table.routines.remove(index);
        self.commit(&table);

        info!("Deleted routine {} ({})", id, removed.name);
        Ok(true)
    }

    /// Recompute the remaining time of a running countdown
    pub fn tick(&self, id: RoutineId, generation: u64) -> Result<TickOutcome> {
        let mut table = self.table()?;
        if !table.owns(id, generation) {
            return Ok(TickOutcome::Superseded);
        }

        let now = self.clock.now();
        let Some(routine) = table.get_mut(id) else {
            return Ok(TickOutcome::Superseded);
        };
        let Some(remaining_ms) = routine.remaining_at(now) else {
            return Ok(TickOutcome::Superseded);
        };
        if remaining_ms <= 0 {
            return Ok(TickOutcome::Elapsed);
        }

        routine.remaining_time = Some(remaining_ms);
        drop(table);

        self.publish(UiEvent::Tick {
            id,
            remaining_ms,
            display: format_time(remaining_ms),
        });
        Ok(TickOutcome::Running { remaining_ms })
    }

    /// Finish a countdown: stop it, notify, and schedule a restart if the
    /// policy asks for one. Ignored unless `generation` owns the timer.
    pub async fn complete(self: &Arc<Self>, id: RoutineId, generation: u64) -> Result<Option<DeliveryChannel>> {
        let name = {
            let mut table = self.table()?;
            if !table.owns(id, generation) {
                return Ok(None);
            }
            table.release(id);

            let Some(routine) = table.get_mut(id) else {
                return Ok(None);
            };
            if !routine.is_active {
                return Ok(None);
            }
            routine.deactivate();
            let name = routine.name.clone();
            info!("Routine {} ({}) completed", id, name);

            if let Some(delay) = self.notifier.policy().restart_delay(self.settings.restart_delay) {
                let generation = table.next_generation();
                let task = tokio::spawn(restart_task(Arc::clone(self), id, generation, delay));
                table.install(id, TimerHandle { kind: TimerKind::PendingRestart, generation, task });
                debug!("Routine {} restarts in {:?}", id, delay);
            }

            self.commit(&table);
            name
        };

        let channel = self.notifier.notify(&name, self.permission(), self.clock.now()).await;
        self.record_action("complete");
        Ok(Some(channel))
    }

    /// Start a completed routine again if `generation` still owns its pending restart
    pub fn restart(self: &Arc<Self>, id: RoutineId, generation: u64) -> Result<bool> {
        let mut table = self.table()?;
        if !table.owns(id, generation) {
            return Ok(false);
        }
        table.release(id);

        let started = self.start_locked(&mut table, id, self.clock.now());
        if started {
            self.commit(&table);
            info!("Restarted routine {}", id);
        }
        Ok(started)
    }

    /// Bring loaded state in line with the (empty) set of live timers.
    ///
    /// Active routines with time left resume from their stored start time;
    /// those that elapsed while nothing was running are reset to inactive.
    pub fn reconcile(self: &Arc<Self>) -> Result<ReconcileReport> {
        let mut table = self.table()?;
        let now = self.clock.now();
        let mut report = ReconcileReport::default();

        let loaded: Vec<RoutineId> = table.routines.iter()
            .filter(|r| !table.timers.contains_key(&r.id))
            .filter(|r| r.is_active || r.start_time.is_some() || r.remaining_time.is_some())
            .map(|r| r.id)
            .collect();

        for id in loaded {
            let Some(routine) = table.get_mut(id) else {
                continue;
            };
            let remaining = routine.is_active
                .then(|| routine.remaining_at(now))
                .flatten();

            match remaining {
                Some(remaining_ms) if remaining_ms > 0 => {
                    routine.remaining_time = Some(remaining_ms);
                    self.spawn_countdown(&mut table, id);
                    info!("Resumed routine {} with {} left", id, format_time(remaining_ms));
                    report.resumed.push(id);
                }
                _ => {
                    routine.deactivate();
                    warn!("Routine {} was left active with no time remaining, reset to inactive", id);
                    report.reset.push(id);
                }
            }
        }

        if !report.resumed.is_empty() || !report.reset.is_empty() {
            self.commit(&table);
        }
        Ok(report)
    }

    /// Ask the platform for permission and publish the resulting status
    pub fn request_permission(&self) -> PermissionStatus {
        match self.notifier.request_permission() {
            Ok(permission) => {
                info!("Notification permission is now {:?}", permission);
                if let Ok(mut current) = self.permission.lock() {
                    *current = permission;
                }
                if let Err(e) = storage::save_permission(self.store.as_ref(), permission) {
                    error!("Failed to persist notification permission: {}", e);
                }
            }
            Err(e) => {
                error!("Notification permission request failed: {}", e);
            }
        }

        let status = self.permission_status();
        self.publish(UiEvent::PermissionStatus { status: status.clone() });
        status
    }

    pub fn permission(&self) -> NotificationPermission {
        self.permission.lock().map(|p| *p).unwrap_or_default()
    }

    pub fn permission_status(&self) -> PermissionStatus {
        self.permission().status()
    }

    pub fn policy(&self) -> RecurrencePolicy {
        self.notifier.policy()
    }

    pub fn worker_registered(&self) -> bool {
        self.notifier.has_worker()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Snapshot of the routine collection
    pub fn routines(&self) -> Result<Vec<Routine>> {
        Ok(self.table()?.routines.clone())
    }

    pub fn routine(&self, id: RoutineId) -> Result<Option<Routine>> {
        Ok(self.table()?.get(id).cloned())
    }

    /// Current render model, without publishing it
    pub fn view(&self) -> Result<RoutineListView> {
        Ok(RoutineListView::render(&self.table()?.routines))
    }

    /// Whether any task is attached to `id`
    pub fn has_timer(&self, id: RoutineId) -> bool {
        self.table().map(|t| t.timers.contains_key(&id)).unwrap_or(false)
    }

    pub fn has_pending_restart(&self, id: RoutineId) -> bool {
        self.table()
            .map(|t| t.timers.get(&id).is_some_and(|h| h.kind == TimerKind::PendingRestart))
            .unwrap_or(false)
    }

    /// Number of running countdown tasks
    pub fn active_timer_count(&self) -> usize {
        self.table()
            .map(|t| t.timers.values().filter(|h| h.kind == TimerKind::Countdown).count())
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> Result<StatusSnapshot> {
        let table = self.table()?;
        Ok(StatusSnapshot {
            routines: table.routines.len(),
            active: table.routines.iter().filter(|r| r.is_active).count(),
            pending_restarts: table.timers.values()
                .filter(|h| h.kind == TimerKind::PendingRestart)
                .count(),
            permission: self.permission(),
        })
    }

    /// Persist and re-render after a mutation
    fn commit(&self, table: &RoutineTable) {
        self.persist(&table.routines);
        self.render(&table.routines);
    }

    /// Overwrite the stored snapshot. Failures are logged; the in-memory
    /// change stands.
    fn persist(&self, routines: &[Routine]) {
        if let Err(e) = storage::save_routines(self.store.as_ref(), routines) {
            error!("Failed to persist routines: {}", e);
        }
    }

    fn render(&self, routines: &[Routine]) -> RoutineListView {
        let view = RoutineListView::render(routines);
        self.publish(UiEvent::Render { view: view.clone() });
        view
    }

    fn publish(&self, event: UiEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            debug!("No page connected for {} event", name);
        }
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some((action.to_string(), Utc::now()));
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|a| a.clone()) {
            Some((action, time)) => (Some(action), Some(time)),
            None => (None, None),
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
