// Task store: canonical collection, derived view, and write-behind persistence

use crate::error::StoreError;
use crate::filter::{PriorityFilter, SortMode, derive_view};
use crate::kv::KvStorage;
use crate::models::{Task, TaskDraft, TaskStatus, sample_tasks};
use crate::persist::{self, PersistedState, Persister};
use chrono::Utc;
use eyre::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Key the store writes its blob under unless configured otherwise
pub const DEFAULT_STORAGE_KEY: &str = "task-storage";

/// Options fixed at open time
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Storage key holding the whole persisted state
    pub key: String,
    /// Start with the sample tasks when nothing has been persisted yet
    pub seed_sample_tasks: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_STORAGE_KEY.to_string(),
            seed_sample_tasks: false,
        }
    }
}

/// Notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The canonical collection changed
    TasksChanged,
    /// The filtered view or its filter/sort parameters changed
    ViewChanged,
    /// A write to storage failed. In-memory state is unaffected.
    PersistenceFailed { message: String },
}

/// Handle returned by [`TaskStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&StoreEvent)>;

/// Single source of truth for tasks
///
/// All operations run synchronously on the caller's thread and are visible to
/// reads as soon as they return. Every change is queued to a background
/// writer, in order, so callers never wait on storage I/O.
///
/// The filtered view is re-derived from the canonical collection and the
/// current filter and sort mode after every change, so it never lags behind
/// add, edit, remove or toggle.
///
/// If the persisted state could not be read at open, the store starts empty
/// in degraded mode: filter and sort changes are kept in memory only, and the
/// stored blob is copied to [`persist::unreadable_key`] before the first
/// mutation overwrites it.
pub struct TaskStore {
    tasks: Vec<Task>,
    view: Vec<Task>,
    filter: PriorityFilter,
    sort_mode: Option<SortMode>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
    persister: Persister,
    degraded: bool,
}

impl TaskStore {
    /// Rehydrate from `storage` and hand it to the background writer
    ///
    /// Unreadable or malformed persisted state is logged and replaced with an
    /// empty collection; it never fails the open. The only error is failing to
    /// start the writer thread.
    pub fn open<S: KvStorage>(storage: S, options: StoreOptions) -> Result<Self> {
        let mut seeded = false;
        let mut degraded = false;

        let state = match storage.get(&options.key) {
            Ok(Some(blob)) => match persist::decode(&blob) {
                Ok(state) => state,
                Err(e) => {
                    warn!(key = %options.key, error = %format!("{:#}", e), "Discarding unreadable task state");
                    degraded = true;
                    PersistedState::default()
                }
            },
            Ok(None) if options.seed_sample_tasks => {
                info!(key = %options.key, "No persisted tasks, seeding sample tasks");
                seeded = true;
                PersistedState {
                    tasks: sample_tasks(Utc::now()),
                    ..PersistedState::default()
                }
            }
            Ok(None) => {
                debug!(key = %options.key, "No persisted tasks, starting empty");
                PersistedState::default()
            }
            Err(e) => {
                warn!(key = %options.key, error = %format!("{:#}", e), "Failed to read task state, starting empty");
                degraded = true;
                PersistedState::default()
            }
        };

        let persister = Persister::spawn(storage, options.key)?;
        let view = derive_view(&state.tasks, state.filter, state.sort_mode);

        info!(count = state.tasks.len(), filter = %state.filter, "Task store ready");

        let mut store = Self {
            tasks: state.tasks,
            view,
            filter: state.filter,
            sort_mode: state.sort_mode,
            listeners: Vec::new(),
            next_subscription: 0,
            persister,
            degraded,
        };

        if degraded {
            if let Err(e) = store.persister.preserve_before_next_write() {
                store.persist_failed(e);
            }
        }

        if seeded {
            store.persist();
        }

        Ok(store)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The canonical collection in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// The derived view under the current filter and sort mode
    pub fn filtered_tasks(&self) -> &[Task] {
        &self.view
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filter(&self) -> PriorityFilter {
        self.filter
    }

    pub fn sort_mode(&self) -> Option<SortMode> {
        self.sort_mode
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True while the store runs on an empty fallback after failing to read
    /// persisted state, until the first mutation
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a new task and return its generated id
    ///
    /// Title and description are stored as given; rejecting empty input is
    /// the caller's job.
    pub fn add_task(&mut self, draft: TaskDraft) -> String {
        self.report_persist_failures();

        let id = self.next_id();
        debug!(id = %id, priority = %draft.priority, "add_task");

        let mut next = self.tasks.clone();
        next.push(Task::from_draft(id.clone(), draft));
        self.commit(next);

        id
    }

    /// Replace every field except the id of the task matching `id`
    pub fn edit_task(&mut self, id: &str, draft: TaskDraft) -> Result<(), StoreError> {
        self.report_persist_failures();

        let index = self.position(id)?;
        debug!(id, "edit_task");

        let mut next = self.tasks.clone();
        next[index] = self.tasks[index].with_fields(draft);
        self.commit(next);

        Ok(())
    }

    /// Delete the task matching `id` from the collection and the view
    pub fn remove_task(&mut self, id: &str) -> Result<(), StoreError> {
        self.report_persist_failures();

        let index = self.position(id)?;
        debug!(id, "remove_task");

        let mut next = self.tasks.clone();
        next.remove(index);
        self.commit(next);

        Ok(())
    }

    /// Flip between done and not done, returning the new status
    ///
    /// `Done` becomes `Todo`; `Todo` and `InProgress` both become `Done`.
    pub fn toggle_task_status(&mut self, id: &str) -> Result<TaskStatus, StoreError> {
        self.report_persist_failures();

        let index = self.position(id)?;
        let toggled = self.tasks[index].toggled();
        let status = toggled.status;
        debug!(id, from = %self.tasks[index].status, to = %status, "toggle_task_status");

        let mut next = self.tasks.clone();
        next[index] = toggled;
        self.commit(next);

        Ok(status)
    }

    /// Remove every task and the persisted key
    ///
    /// Filter and sort mode go back to their defaults.
    pub fn clear_tasks(&mut self) {
        self.report_persist_failures();
        info!(count = self.tasks.len(), "clear_tasks");

        self.tasks = Vec::new();
        self.view = Vec::new();
        self.filter = PriorityFilter::default();
        self.sort_mode = None;

        self.degraded = false;

        self.emit(StoreEvent::TasksChanged);
        self.emit(StoreEvent::ViewChanged);

        if let Err(e) = self.persister.delete() {
            self.persist_failed(e);
        }
    }

    // ========================================================================
    // View operations
    // ========================================================================

    /// Keep only tasks matching `filter` in the view
    ///
    /// The current sort mode, if one was chosen, is reapplied.
    pub fn filter_tasks_by_priority(&mut self, filter: impl Into<PriorityFilter>) {
        self.report_persist_failures();

        self.filter = filter.into();
        debug!(filter = %self.filter, "filter_tasks_by_priority");
        self.refresh_view();
    }

    /// Order the view by priority rank (`true`) or by id (`false`)
    ///
    /// The choice is remembered and reapplied whenever the view is
    /// recomputed.
    pub fn sort_filtered_tasks(&mut self, enable_priority_order: bool) {
        self.report_persist_failures();

        let mode = SortMode::from_priority_flag(enable_priority_order);
        debug!(mode = %mode, "sort_filtered_tasks");
        self.sort_mode = Some(mode);
        self.refresh_view();
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Register `listener` to be called after every change
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&StoreEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Deliver any write failures the background writer has reported
    ///
    /// Returns how many were delivered.
    pub fn poll_persistence(&mut self) -> usize {
        self.report_persist_failures()
    }

    /// Block until every queued write has reached storage
    pub fn flush(&mut self) -> Result<()> {
        self.persister.flush()?;
        self.report_persist_failures();
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn position(&self, id: &str) -> Result<usize, StoreError> {
        self.tasks.iter().position(|t| t.id == id).ok_or_else(|| {
            debug!(id, "Task not found");
            StoreError::not_found(id)
        })
    }

    fn next_id(&self) -> String {
        loop {
            let id = Uuid::now_v7().to_string();
            if self.get_task(&id).is_none() {
                return id;
            }
        }
    }

    /// Swap in the next collection, re-derive the view, notify, then persist
    fn commit(&mut self, next: Vec<Task>) {
        self.tasks = next;
        self.degraded = false;
        self.view = derive_view(&self.tasks, self.filter, self.sort_mode);
        self.emit(StoreEvent::TasksChanged);
        self.emit(StoreEvent::ViewChanged);
        self.persist();
    }

    fn refresh_view(&mut self) {
        self.view = derive_view(&self.tasks, self.filter, self.sort_mode);
        self.emit(StoreEvent::ViewChanged);
        if self.degraded {
            debug!(key = %self.persister.key(), "Degraded, keeping view change in memory only");
            return;
        }
        self.persist();
    }

    fn persist(&mut self) {
        let queued = persist::encode(&self.tasks, self.filter, self.sort_mode).and_then(|blob| self.persister.save(blob));
        if let Err(e) = queued {
            self.persist_failed(e);
        }
    }

    fn persist_failed(&mut self, e: eyre::Report) {
        let message = format!("{:#}", e);
        warn!(key = %self.persister.key(), error = %message, "Failed to queue task state for storage");
        self.emit(StoreEvent::PersistenceFailed { message });
    }

    fn report_persist_failures(&mut self) -> usize {
        let failures = self.persister.drain_failures();
        let count = failures.len();
        for failure in failures {
            self.emit(StoreEvent::PersistenceFailed {
                message: format!("{}: {}", failure.operation, failure.message),
            });
        }
        count
    }

    fn emit(&mut self, event: StoreEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}
