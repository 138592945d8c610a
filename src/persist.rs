// Persisted blob format and the ordered background writer

use crate::filter::{PriorityFilter, SortMode};
use crate::kv::KvStorage;
use crate::models::Task;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Highest blob version this build can read
pub const STATE_VERSION: u32 = 1;

/// Suffix of the side key holding a blob saved before it was overwritten
pub const UNREADABLE_SUFFIX: &str = "-unreadable";

/// Side key for `key`, e.g. `task-storage-unreadable`
pub fn unreadable_key(key: &str) -> String {
    format!("{}{}", key, UNREADABLE_SUFFIX)
}

/// Everything the store writes under its key
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistedState {
    pub tasks: Vec<Task>,
    pub filter: PriorityFilter,
    pub sort_mode: Option<SortMode>,
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    state: StateOut<'a>,
    version: u32,
}

#[derive(Serialize)]
struct StateOut<'a> {
    tasks: &'a [Task],
    filter: PriorityFilter,
    sort_mode: Option<SortMode>,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    state: StateIn,
    #[serde(default)]
    version: u32,
}

#[derive(Deserialize)]
struct StateIn {
    #[serde(default)]
    tasks: Vec<serde_json::Value>,
    #[serde(default)]
    filter: PriorityFilter,
    #[serde(default)]
    sort_mode: Option<SortMode>,
}

/// Serialize the collection and view parameters into a single JSON blob
pub fn encode(tasks: &[Task], filter: PriorityFilter, sort_mode: Option<SortMode>) -> Result<String> {
    let envelope = EnvelopeOut {
        state: StateOut {
            tasks,
            filter,
            sort_mode,
        },
        version: STATE_VERSION,
    };
    serde_json::to_string(&envelope).context("Failed to serialize task state")
}

/// Parse a blob produced by [`encode`]
///
/// An unreadable envelope is an error. Individual task entries that fail to
/// decode (bad deadline, unknown status, missing field) or repeat an earlier
/// id are dropped with a warning and the rest are kept in order.
pub fn decode(blob: &str) -> Result<PersistedState> {
    let envelope: EnvelopeIn = serde_json::from_str(blob).context("Failed to parse persisted task state")?;

    if envelope.version > STATE_VERSION {
        return Err(eyre!(
            "Persisted state version {} is newer than supported version {}",
            envelope.version,
            STATE_VERSION
        ));
    }

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(envelope.state.tasks.len());

    for (index, value) in envelope.state.tasks.into_iter().enumerate() {
        let task: Task = match serde_json::from_value(value) {
            Ok(t) => t,
            Err(e) => {
                warn!(index, error = ?e, "Dropping persisted task that failed to decode");
                continue;
            }
        };

        if !seen.insert(task.id.clone()) {
            warn!(index, id = %task.id, "Dropping persisted task with duplicate id");
            continue;
        }

        tasks.push(task);
    }

    info!(count = tasks.len(), version = envelope.version, "Decoded persisted task state");

    Ok(PersistedState {
        tasks,
        filter: envelope.state.filter,
        sort_mode: envelope.state.sort_mode,
    })
}

// ============================================================================
// Background writer
// ============================================================================

/// A write that the storage engine rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFailure {
    pub operation: &'static str,
    pub message: String,
}

enum Command {
    Set(String),
    Delete,
    Preserve,
    Flush(mpsc::Sender<()>),
}

/// Write-behind queue in front of a [`KvStorage`]
///
/// Commands run on a dedicated thread in the order they were queued. Failed
/// writes are logged and collected for [`Persister::drain_failures`].
pub struct Persister {
    key: String,
    commands: Option<mpsc::Sender<Command>>,
    failures: mpsc::Receiver<PersistFailure>,
    worker: Option<JoinHandle<()>>,
}

impl Persister {
    /// Move `storage` onto a new writer thread that owns `key`
    pub fn spawn<S: KvStorage>(storage: S, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let (command_tx, command_rx) = mpsc::channel();
        let (failure_tx, failure_rx) = mpsc::channel();

        let worker_key = key.clone();
        let worker = thread::Builder::new()
            .name("todostore-writer".to_string())
            .spawn(move || run_writer(storage, worker_key, command_rx, failure_tx))
            .context("Failed to spawn persistence writer thread")?;

        Ok(Self {
            key,
            commands: Some(command_tx),
            failures: failure_rx,
            worker: Some(worker),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Queue `blob` to replace the stored value. Returns immediately.
    pub fn save(&self, blob: String) -> Result<()> {
        self.send(Command::Set(blob))
    }

    /// Queue removal of the stored value
    pub fn delete(&self) -> Result<()> {
        self.send(Command::Delete)
    }

    /// Copy whatever is stored under the key to [`unreadable_key`] before the
    /// next set or delete touches it
    ///
    /// Until the copy succeeds, sets and deletes of the key are skipped and
    /// reported as failures.
    pub fn preserve_before_next_write(&self) -> Result<()> {
        self.send(Command::Preserve)
    }

    /// Block until every command queued so far has been applied
    pub fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(Command::Flush(ack_tx))?;
        ack_rx.recv().map_err(|_| eyre!("Persistence writer stopped before flush completed"))
    }

    /// Failures reported by the writer since the last call
    pub fn drain_failures(&self) -> Vec<PersistFailure> {
        self.failures.try_iter().collect()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .as_ref()
            .ok_or_else(|| eyre!("Persistence writer is shut down"))?
            .send(command)
            .map_err(|_| eyre!("Persistence writer thread is not running"))
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain its queue and exit
        self.commands.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(key = %self.key, "Persistence writer thread panicked");
            }
        }
    }
}

fn run_writer<S: KvStorage>(
    mut storage: S,
    key: String,
    commands: mpsc::Receiver<Command>,
    failures: mpsc::Sender<PersistFailure>,
) {
    debug!(key = %key, "Persistence writer started");
    let mut preserve_pending = false;

    for command in commands {
        let overwrites = matches!(command, Command::Set(_) | Command::Delete);
        if overwrites && preserve_pending {
            match preserve(&mut storage, &key) {
                Ok(()) => preserve_pending = false,
                Err(e) => {
                    report_failure(&failures, &key, "preserve", e);
                    continue;
                }
            }
        }

        let (operation, result) = match command {
            Command::Set(blob) => ("set", storage.set(&key, &blob)),
            Command::Delete => ("delete", storage.delete(&key)),
            Command::Preserve => {
                preserve_pending = true;
                continue;
            }
            Command::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        if let Err(e) = result {
            report_failure(&failures, &key, operation, e);
        }
    }

    debug!(key = %key, "Persistence writer stopped");
}

fn preserve<S: KvStorage>(storage: &mut S, key: &str) -> Result<()> {
    let current = storage.get(key).context("Failed to read task state before overwriting it")?;
    if let Some(blob) = current {
        let side_key = unreadable_key(key);
        storage.set(&side_key, &blob)?;
        info!(key, side_key = %side_key, "Saved previous task state before overwriting it");
    }
    Ok(())
}

fn report_failure(failures: &mpsc::Sender<PersistFailure>, key: &str, operation: &'static str, e: eyre::Report) {
    let message = format!("{:#}", e);
    warn!(key, operation, error = %message, "Failed to persist task state");
    let _ = failures.send(PersistFailure { operation, message });
}
