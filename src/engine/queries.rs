use ulid::Ulid;

use crate::export::{bookings_csv, DELETED_ROOM};
use crate::model::*;
use crate::report::{self, UtilizationReport};

use super::conflict::find_conflict;
use super::Engine;

impl Engine {
    pub async fn rooms(&self) -> Vec<Room> {
        self.state.read().await.rooms().to_vec()
    }

    pub async fn room(&self, id: &Ulid) -> Option<Room> {
        self.state.read().await.room(id).cloned()
    }

    /// Display name of a room, tolerating soft references to deleted rooms.
    pub async fn room_label(&self, id: &Ulid) -> String {
        self.state
            .read()
            .await
            .room(id)
            .map_or_else(|| DELETED_ROOM.to_string(), |r| r.name.clone())
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.read().await.bookings().to_vec()
    }

    pub async fn booking(&self, id: &Ulid) -> Option<Booking> {
        self.state.read().await.booking(id).cloned()
    }

    pub async fn users(&self) -> Vec<User> {
        self.state.read().await.users().to_vec()
    }

    pub async fn user(&self, id: &Ulid) -> Option<User> {
        self.state.read().await.user(id).cloned()
    }

    pub async fn config(&self) -> AppConfig {
        self.state.read().await.config().clone()
    }

    /// Newest first.
    pub async fn audit_log(&self) -> Vec<AuditEntry> {
        self.state
            .read()
            .await
            .audit_log()
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    pub async fn find_conflict(&self, room_id: Ulid, span: Span, exclude: Option<Ulid>) -> Option<Booking> {
        let store = self.state.read().await;
        find_conflict(store.bookings(), room_id, &span, exclude).cloned()
    }

    pub async fn bookings_for(&self, user: &User) -> Vec<Booking> {
        report::bookings_for(user, self.state.read().await.bookings())
    }

    pub async fn utilization(&self) -> UtilizationReport {
        let store = self.state.read().await;
        report::utilization(store.rooms(), store.bookings())
    }

    pub async fn export_csv(&self) -> String {
        let store = self.state.read().await;
        bookings_csv(store.rooms(), store.bookings())
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.read().await.snapshot()
    }
}
