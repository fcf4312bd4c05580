use ulid::Ulid;

use crate::model::*;

/// Every collection the engine owns. Rooms and bookings keep insertion order,
/// which is also listing and CSV order.
#[derive(Debug, Default, Clone)]
pub struct Store {
    rooms: Vec<Room>,
    bookings: Vec<Booking>,
    users: Vec<User>,
    config: AppConfig,
    audit_log: Vec<AuditEntry>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            rooms: snapshot.rooms,
            bookings: snapshot.bookings,
            users: snapshot.users,
            config: snapshot.config,
            audit_log: snapshot.audit_log,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            rooms: self.rooms.clone(),
            bookings: self.bookings.clone(),
            users: self.users.clone(),
            config: self.config.clone(),
            audit_log: self.audit_log.clone(),
        }
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, id: &Ulid) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == *id)
    }

    // ── Bookings ─────────────────────────────────────────────

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    pub fn booking(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    // ── Users & config ───────────────────────────────────────

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, id: &Ulid) -> Option<&User> {
        self.users.iter().find(|u| u.id == *id)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ── Audit ────────────────────────────────────────────────

    /// Oldest first.
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }

    // ── Event application ────────────────────────────────────

    /// Apply a journaled event. Events are validated before they are written,
    /// so an update for a missing id is skipped rather than reported.
    pub fn apply(&mut self, event: &Event) {
        if let Some(audit) = event.audit() {
            self.audit_log.push(audit.clone());
        }
        match event {
            Event::RoomCreated { room, .. } => self.rooms.push(room.clone()),
            Event::RoomUpdated { room, .. } => {
                if let Some(slot) = self.rooms.iter_mut().find(|r| r.id == room.id) {
                    *slot = room.clone();
                }
            }
            Event::RoomDeleted { id, .. } => self.rooms.retain(|r| r.id != *id),
            Event::BookingCreated { booking, .. } => self.bookings.push(booking.clone()),
            Event::BookingUpdated { booking, .. } => {
                if let Some(slot) = self.bookings.iter_mut().find(|b| b.id == booking.id) {
                    *slot = booking.clone();
                }
            }
            Event::BookingCancelled { id, reason, at, .. } => {
                if let Some(b) = self.bookings.iter_mut().find(|b| b.id == *id) {
                    b.status = BookingStatus::Cancelled {
                        reason: reason.clone(),
                    };
                    b.updated_at = *at;
                }
            }
            Event::ConfigUpdated { config, .. } => self.config = config.clone(),
            Event::UserRegistered { user } => {
                match self.users.iter_mut().find(|u| u.id == user.id) {
                    Some(slot) => *slot = user.clone(),
                    None => self.users.push(user.clone()),
                }
            }
            Event::Snapshot(snapshot) => *self = Store::from_snapshot(snapshot.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit(action: AuditAction, n: u128) -> AuditEntry {
        AuditEntry {
            id: Ulid::from_parts(0, n),
            action,
            user_id: Ulid::nil(),
            timestamp: n as Ms,
            details: String::new(),
        }
    }

    fn room(n: u128) -> Room {
        Room {
            id: Ulid::from_parts(1, n),
            name: format!("Room {n}"),
            capacity: 4,
            location: String::new(),
            resources: vec![],
            is_active: true,
            color: String::new(),
        }
    }

    #[test]
    fn apply_tracks_audit_in_insertion_order() {
        let mut store = Store::new();
        store.apply(&Event::RoomCreated { room: room(1), audit: audit(AuditAction::RoomCreated, 1) });
        store.apply(&Event::RoomCreated { room: room(2), audit: audit(AuditAction::RoomCreated, 2) });
        store.apply(&Event::RoomDeleted {
            id: room(1).id,
            audit: audit(AuditAction::RoomDeleted, 3),
        });

        assert_eq!(store.rooms().len(), 1);
        assert_eq!(store.rooms()[0].id, room(2).id);
        let ids: Vec<_> = store.audit_log().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![Ulid::from_parts(0, 1), Ulid::from_parts(0, 2), Ulid::from_parts(0, 3)]);
    }

    #[test]
    fn room_update_replaces_in_place() {
        let mut store = Store::new();
        store.apply(&Event::RoomCreated { room: room(1), audit: audit(AuditAction::RoomCreated, 1) });
        store.apply(&Event::RoomCreated { room: room(2), audit: audit(AuditAction::RoomCreated, 2) });
        let mut renamed = room(1);
        renamed.name = "Boardroom".into();
        store.apply(&Event::RoomUpdated { room: renamed, audit: audit(AuditAction::RoomEdited, 3) });

        assert_eq!(store.rooms()[0].name, "Boardroom");
        assert_eq!(store.rooms()[1].name, "Room 2");
    }

    #[test]
    fn user_registration_is_an_upsert() {
        let mut store = Store::new();
        let mut user = User {
            id: Ulid::from_parts(2, 1),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: Role::User,
            department: None,
            avatar: None,
        };
        store.apply(&Event::UserRegistered { user: user.clone() });
        user.role = Role::Admin;
        store.apply(&Event::UserRegistered { user: user.clone() });
        assert_eq!(store.users().len(), 1);
        assert!(store.user(&user.id).unwrap().is_admin());
    }

    #[test]
    fn snapshot_event_replaces_everything() {
        let mut store = Store::new();
        store.apply(&Event::RoomCreated { room: room(1), audit: audit(AuditAction::RoomCreated, 1) });

        let snapshot = Snapshot {
            rooms: vec![room(7)],
            ..Default::default()
        };
        store.apply(&Event::Snapshot(snapshot.clone()));
        assert_eq!(store.snapshot(), snapshot);
        assert!(store.audit_log().is_empty());
    }
}
