mod audit;
mod conflict;
mod error;
mod journal;
mod mutations;
mod queries;
mod store;

pub use audit::AuditLogger;
pub use conflict::find_conflict;
pub use error::EngineError;
pub use journal::{Journal, MemoryJournal, WalJournal};
pub use store::Store;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::clock::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::model::*;
use crate::notify::NotifyHub;

/// The booking scheduling engine.
///
/// All state sits behind one write lock. Every mutation holds it across
/// check, journal append and apply, so two overlapping requests for the same
/// room can never both pass the conflict check.
pub struct Engine {
    state: RwLock<Store>,
    journal: Arc<dyn Journal>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    audit: AuditLogger,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    /// Build an engine whose state is the replay of `events`.
    pub fn new(
        journal: Arc<dyn Journal>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        notify: Arc<NotifyHub>,
        events: &[Event],
    ) -> Self {
        let mut store = Store::new();
        for event in events {
            store.apply(event);
        }
        Self {
            state: RwLock::new(store),
            audit: AuditLogger::new(clock.clone(), ids.clone()),
            journal,
            clock,
            ids,
            notify,
        }
    }

    /// Open the WAL at `path`, replay it, and start its writer task.
    /// Uses the system clock and ULID ids. Must run inside a tokio runtime.
    pub fn open(path: &Path, notify: Arc<NotifyHub>) -> std::io::Result<Self> {
        let (journal, events) = WalJournal::open(path)?;
        tracing::info!("replayed {} WAL events from {}", events.len(), path.display());
        Ok(Self::new(
            Arc::new(journal),
            Arc::new(SystemClock),
            Arc::new(UlidGenerator),
            notify,
            &events,
        ))
    }

    pub fn now_ms(&self) -> Ms {
        self.clock.now_ms()
    }

    /// Journal, apply, then notify every room the event touches.
    /// Nothing is applied if the journal rejects the event.
    pub(super) async fn persist_and_apply(
        &self,
        store: &mut Store,
        event: &Event,
        rooms: &[Ulid],
    ) -> Result<(), EngineError> {
        self.journal.append(event).await?;
        store.apply(event);
        for room_id in rooms {
            self.notify.send(*room_id, event);
        }
        Ok(())
    }

    /// Rewrite the journal as a single snapshot of the current state.
    pub async fn compact(&self) -> Result<(), EngineError> {
        // Write lock: no append may slip in between the snapshot and the rewrite.
        let store = self.state.write().await;
        self.journal.compact(store.snapshot()).await
    }

    pub async fn appends_since_compact(&self) -> u64 {
        self.journal.appends_since_compact().await
    }
}
