use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::model::{Event, Snapshot};
use crate::wal::Wal;

use super::EngineError;

/// Durable sink for engine events.
///
/// The engine appends an event before applying it, so a failed append leaves
/// in-memory state untouched.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn append(&self, event: &Event) -> Result<(), EngineError>;

    /// Replace everything journaled so far with a single snapshot.
    async fn compact(&self, snapshot: Snapshot) -> Result<(), EngineError>;

    async fn appends_since_compact(&self) -> u64;
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
///
/// `Engine` holds its store write lock across each append, so engine traffic
/// arrives one event at a time and batches stay at size 1. Batches only grow
/// when several callers share a `WalJournal` directly.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush the current batch first, then handle the non-append command
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
    tracing::debug!("WAL writer for {} stopped", wal.path().display());
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err.or(flush_err) {
        tracing::error!("WAL flush failed: {e}");
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let result = wal.append_buffered(&event).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

/// Journal backed by an on-disk WAL and a group-commit writer task.
pub struct WalJournal {
    tx: mpsc::Sender<WalCommand>,
}

impl WalJournal {
    /// Replay `path`, then open it for appending. Must run inside a tokio runtime.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (tx, rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, rx));
        Ok((Self { tx }, events))
    }

    async fn request<T>(
        &self,
        cmd: WalCommand,
        rx: oneshot::Receiver<io::Result<T>>,
    ) -> Result<T, EngineError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }
}

#[async_trait]
impl Journal for WalJournal {
    async fn append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        let cmd = WalCommand::Append {
            event: event.clone(),
            response: tx,
        };
        self.request(cmd, rx).await
    }

    async fn compact(&self, snapshot: Snapshot) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        let cmd = WalCommand::Compact {
            events: vec![Event::Snapshot(snapshot)],
            response: tx,
        };
        self.request(cmd, rx).await
    }

    async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// In-memory journal for tests and embedding without storage.
#[derive(Default)]
pub struct MemoryJournal {
    inner: Mutex<MemoryJournalState>,
}

#[derive(Default)]
struct MemoryJournalState {
    events: Vec<Event>,
    appends_since_compact: u64,
    fail_next: bool,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.inner.lock().await.events.clone()
    }

    /// Make the next append fail with a storage error.
    pub async fn fail_next_append(&self) {
        self.inner.lock().await.fail_next = true;
    }
}

#[async_trait]
impl Journal for MemoryJournal {
    async fn append(&self, event: &Event) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        if std::mem::take(&mut inner.fail_next) {
            return Err(EngineError::WalError("injected append failure".into()));
        }
        inner.events.push(event.clone());
        inner.appends_since_compact += 1;
        Ok(())
    }

    async fn compact(&self, snapshot: Snapshot) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        inner.events = vec![Event::Snapshot(snapshot)];
        inner.appends_since_compact = 0;
        Ok(())
    }

    async fn appends_since_compact(&self) -> u64 {
        self.inner.lock().await.appends_since_compact
    }
}
