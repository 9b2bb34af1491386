//! In-memory history of analysis jobs with write-through persistence.
//!
//! All mutations are serialized through a single-writer mailbox task, so
//! "at most one terminal write per job id" is enforced in one place rather
//! than relying on scheduling order. Persistence failures are soft: the
//! write is logged and the in-memory view stays authoritative.

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::models::{ChatMessage, HistoryItem, JobOutcome, JobStatus};
use crate::storage::{HistoryBackend, StorageError};

/// Maximum number of retained history items; inserting one more evicts the
/// oldest.
pub const HISTORY_CAP: usize = 50;

/// Summary written onto pending jobs found at load time. Their in-flight
/// request died with the previous process and cannot be resumed.
pub const INTERRUPTED_SUMMARY: &str =
    "Analysis was interrupted before it finished. Please submit the document again.";

enum Command {
    List {
        reply: oneshot::Sender<Vec<HistoryItem>>,
    },
    VisibleTo {
        profile_id: Uuid,
        reply: oneshot::Sender<Vec<HistoryItem>>,
    },
    Get {
        id: Uuid,
        reply: oneshot::Sender<Option<HistoryItem>>,
    },
    Insert {
        item: HistoryItem,
        reply: oneshot::Sender<()>,
    },
    Settle {
        id: Uuid,
        outcome: JobOutcome,
        reply: oneshot::Sender<bool>,
    },
    AppendChat {
        id: Uuid,
        message: ChatMessage,
        reply: oneshot::Sender<bool>,
    },
    Delete {
        id: Uuid,
        reply: oneshot::Sender<()>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the history store task.
#[derive(Clone)]
pub struct HistoryHandle {
    tx: mpsc::Sender<Command>,
}

impl HistoryHandle {
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .expect("history store task exited");
        rx.await.expect("history store dropped a reply")
    }

    /// All items, newest first.
    pub async fn list(&self) -> Vec<HistoryItem> {
        self.call(|reply| Command::List { reply }).await
    }

    /// Items visible to one profile (legacy items without an owner included).
    pub async fn visible_to(&self, profile_id: Uuid) -> Vec<HistoryItem> {
        self.call(|reply| Command::VisibleTo { profile_id, reply })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Option<HistoryItem> {
        self.call(|reply| Command::Get { id, reply }).await
    }

    /// Insert a fresh record (normally `pending`), evicting the oldest item
    /// past [`HISTORY_CAP`]. Returns once the write-through completed.
    pub async fn insert(&self, item: HistoryItem) {
        self.call(|reply| Command::Insert { item, reply }).await
    }

    /// Apply the terminal outcome of a job. Returns false (and changes
    /// nothing) if the record is missing or already terminal.
    pub async fn settle(&self, id: Uuid, outcome: JobOutcome) -> bool {
        self.call(|reply| Command::Settle { id, outcome, reply })
            .await
    }

    /// Append a chat message to a completed job. Pending, failed or missing
    /// records make this a no-op; returns whether the message was stored.
    pub async fn append_chat(&self, id: Uuid, message: ChatMessage) -> bool {
        self.call(|reply| Command::AppendChat { id, message, reply })
            .await
    }

    pub async fn delete(&self, id: Uuid) {
        self.call(|reply| Command::Delete { id, reply }).await
    }

    pub async fn clear(&self) {
        self.call(|reply| Command::Clear { reply }).await
    }
}

/// Owner of the history list; lives on its own task.
pub struct HistoryStore {
    items: Vec<HistoryItem>,
    backend: Box<dyn HistoryBackend>,
}

impl HistoryStore {
    /// Load persisted items, repair interrupted jobs, and start the
    /// single-writer task. Must be called within a tokio runtime.
    pub fn spawn(backend: Box<dyn HistoryBackend>) -> Result<HistoryHandle, StorageError> {
        let items = backend.load_all()?;
        let mut store = Self { items, backend };
        store.repair_interrupted();

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move { store.run(rx).await });
        Ok(HistoryHandle { tx })
    }

    /// Load-time invariant repair: a persisted `pending` item has lost its
    /// in-flight request, so it is reclassified to `failed`. Idempotent by
    /// construction (repaired items are no longer pending).
    fn repair_interrupted(&mut self) {
        for item in &mut self.items {
            if item.status != JobStatus::Pending {
                continue;
            }
            item.status = JobStatus::Failed;
            item.summary = Some(INTERRUPTED_SUMMARY.to_string());
            tracing::warn!(job_id = %item.id, "reclassified interrupted pending job to failed");
            if let Err(e) = self.backend.put(item) {
                tracing::warn!(job_id = %item.id, error = %e, "failed to persist interrupted-job repair");
            }
        }
    }

    async fn run(&mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        tracing::debug!("history store mailbox closed");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::List { reply } => {
                let _ = reply.send(self.items.clone());
            }
            Command::VisibleTo { profile_id, reply } => {
                let visible = self
                    .items
                    .iter()
                    .filter(|i| i.visible_to(profile_id))
                    .cloned()
                    .collect();
                let _ = reply.send(visible);
            }
            Command::Get { id, reply } => {
                let _ = reply.send(self.items.iter().find(|i| i.id == id).cloned());
            }
            Command::Insert { item, reply } => {
                self.insert(item);
                let _ = reply.send(());
            }
            Command::Settle { id, outcome, reply } => {
                let _ = reply.send(self.settle(id, outcome));
            }
            Command::AppendChat { id, message, reply } => {
                let _ = reply.send(self.append_chat(id, message));
            }
            Command::Delete { id, reply } => {
                self.items.retain(|i| i.id != id);
                if let Err(e) = self.backend.delete(&id) {
                    tracing::warn!(job_id = %id, error = %e, "history delete failed");
                }
                let _ = reply.send(());
            }
            Command::Clear { reply } => {
                self.items.clear();
                if let Err(e) = self.backend.clear() {
                    tracing::warn!(error = %e, "history clear failed");
                }
                let _ = reply.send(());
            }
        }
    }

    fn insert(&mut self, item: HistoryItem) {
        self.persist(&item);
        self.items.insert(0, item);

        while self.items.len() > HISTORY_CAP {
            if let Some(evicted) = self.items.pop() {
                tracing::debug!(job_id = %evicted.id, "evicted oldest history item at cap");
                if let Err(e) = self.backend.delete(&evicted.id) {
                    tracing::warn!(job_id = %evicted.id, error = %e, "history evict delete failed");
                }
            }
        }
    }

    fn settle(&mut self, id: Uuid, outcome: JobOutcome) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            tracing::warn!(job_id = %id, "terminal write for unknown job ignored");
            return false;
        };
        if item.status.is_terminal() {
            tracing::warn!(
                job_id = %id,
                status = item.status.as_str(),
                "second terminal write ignored"
            );
            return false;
        }

        match outcome {
            JobOutcome::Completed(result) => {
                item.summary = Some(result.summary.clone());
                item.result = Some(result);
                item.status = JobStatus::Completed;
            }
            JobOutcome::Failed(summary) => {
                item.summary = Some(summary);
                item.status = JobStatus::Failed;
            }
        }
        let item = item.clone();
        self.persist(&item);
        true
    }

    fn append_chat(&mut self, id: Uuid, message: ChatMessage) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return false;
        };
        if item.status != JobStatus::Completed {
            return false;
        }
        item.chat_history.push(message);
        let item = item.clone();
        self.persist(&item);
        true
    }

    fn persist(&self, item: &HistoryItem) {
        if let Err(e) = self.backend.put(item) {
            tracing::warn!(
                job_id = %item.id,
                error = %e,
                "history write failed; in-memory state kept"
            );
        }
    }
}
