use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::validation::{validate_booking, validate_config, validate_reason, validate_room};

use super::conflict::{find_conflict, has_future_bookings};
use super::{Engine, EngineError};

impl Engine {
    // ── Bookings ─────────────────────────────────────────────

    /// Create (no `req.id`) or edit a booking.
    ///
    /// A rejected call leaves every collection and the audit log untouched.
    pub async fn upsert_booking(
        &self,
        actor: Option<&User>,
        mut req: BookingRequest,
    ) -> Result<Booking, EngineError> {
        let actor = actor.ok_or(EngineError::Unauthenticated)?;
        let mut store = self.state.write().await;
        let now = self.clock.now_ms();

        // Policy sees the merged recurrence flag, not just what the edit carries.
        if req.is_recurring.is_none()
            && let Some(id) = req.id
        {
            req.is_recurring = store.booking(&id).map(|b| b.is_recurring);
        }
        let span = validate_booking(&req, store.config(), now)?;
        match store.room(&req.room_id) {
            None => {
                return Err(EngineError::validation(format!("room {} does not exist", req.room_id)));
            }
            Some(room) if !room.is_active => {
                return Err(EngineError::validation(format!("room \"{}\" is inactive", room.name)));
            }
            Some(_) => {}
        }

        let existing = match req.id {
            Some(id) => {
                let Some(current) = store.booking(&id) else {
                    warn!("edit of unknown booking {id} by {}", actor.id);
                    return Err(EngineError::NotFound(id));
                };
                if !current.is_active() {
                    return Err(EngineError::validation("cancelled bookings cannot be edited"));
                }
                Some(current.clone())
            }
            None => {
                if store.bookings().len() >= MAX_BOOKINGS {
                    return Err(EngineError::LimitExceeded("too many bookings"));
                }
                None
            }
        };

        if let Some(other) = find_conflict(store.bookings(), req.room_id, &span, req.id) {
            debug!("booking in room {} conflicts with {}", req.room_id, other.id);
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::Conflict {
                title: other.title.clone(),
                span: other.span,
            });
        }

        let (booking, event, rooms) = match existing {
            Some(mut booking) => {
                let previous_room = booking.room_id;
                booking.room_id = req.room_id;
                booking.title = req.title;
                booking.span = span;
                if let Some(description) = req.description {
                    booking.description = description;
                }
                if let Some(participants) = req.participants {
                    booking.participants = participants;
                }
                if let Some(resources) = req.resources_requested {
                    booking.resources_requested = resources;
                }
                if let Some(meeting_type) = req.meeting_type {
                    booking.meeting_type = meeting_type;
                }
                if let Some(is_recurring) = req.is_recurring {
                    booking.is_recurring = is_recurring;
                }
                booking.updated_at = now;

                let audit = self.audit.record(
                    AuditAction::BookingEdited,
                    actor,
                    format!("Booking {} edited by {}", booking.id, actor.name),
                );
                let mut rooms = vec![booking.room_id];
                if previous_room != booking.room_id {
                    rooms.push(previous_room);
                }
                let event = Event::BookingUpdated {
                    booking: booking.clone(),
                    audit,
                };
                (booking, event, rooms)
            }
            None => {
                let booking = Booking {
                    id: self.ids.next_id(),
                    room_id: req.room_id,
                    title: req.title,
                    description: req.description.unwrap_or_default(),
                    span,
                    created_by: actor.id,
                    participants: req.participants.unwrap_or_default(),
                    resources_requested: req.resources_requested.unwrap_or_default(),
                    status: BookingStatus::Active,
                    meeting_type: req.meeting_type.unwrap_or_default(),
                    created_at: now,
                    updated_at: now,
                    is_recurring: req.is_recurring.unwrap_or(false),
                };
                let audit = self.audit.record(
                    AuditAction::BookingCreated,
                    actor,
                    format!("New booking created: {}", booking.title),
                );
                let rooms = vec![booking.room_id];
                let event = Event::BookingCreated {
                    booking: booking.clone(),
                    audit,
                };
                (booking, event, rooms)
            }
        };

        self.persist_and_apply(&mut store, &event, &rooms).await?;
        info!("booking {} saved in room {} by {}", booking.id, booking.room_id, actor.id);
        Ok(booking)
    }

    /// Cancel an active booking. Cancellation cannot be undone.
    pub async fn cancel_booking(
        &self,
        actor: Option<&User>,
        id: Ulid,
        reason: &str,
    ) -> Result<Booking, EngineError> {
        let actor = actor.ok_or(EngineError::Unauthenticated)?;
        validate_reason(reason)?;
        let mut store = self.state.write().await;

        let Some(current) = store.booking(&id) else {
            warn!("cancel of unknown booking {id} by {}", actor.id);
            return Err(EngineError::NotFound(id));
        };
        if !current.is_active() {
            return Err(EngineError::validation("booking is already cancelled"));
        }

        let now = self.clock.now_ms();
        let room_id = current.room_id;
        let audit = self.audit.record(
            AuditAction::BookingCancelled,
            actor,
            format!("Booking {id} cancelled. Reason: {reason}"),
        );
        let event = Event::BookingCancelled {
            id,
            room_id,
            reason: reason.to_string(),
            at: now,
            audit,
        };
        self.persist_and_apply(&mut store, &event, &[room_id]).await?;
        info!("booking {id} cancelled by {}", actor.id);

        store.booking(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    // ── Rooms ────────────────────────────────────────────────

    /// Create (no `req.id`) or edit a room. New rooms always start active.
    pub async fn upsert_room(&self, actor: Option<&User>, req: RoomRequest) -> Result<Room, EngineError> {
        let actor = actor.ok_or(EngineError::Unauthenticated)?;
        validate_room(&req)?;
        let mut store = self.state.write().await;

        let (room, event) = match req.id {
            Some(id) => {
                let Some(current) = store.room(&id) else {
                    warn!("edit of unknown room {id} by {}", actor.id);
                    return Err(EngineError::NotFound(id));
                };
                let mut room = current.clone();
                if let Some(name) = req.name {
                    room.name = name;
                }
                if let Some(capacity) = req.capacity {
                    room.capacity = capacity;
                }
                if let Some(location) = req.location {
                    room.location = location;
                }
                if let Some(resources) = req.resources {
                    room.resources = resources;
                }
                if let Some(is_active) = req.is_active {
                    room.is_active = is_active;
                }
                if let Some(color) = req.color {
                    room.color = color;
                }
                let audit = self
                    .audit
                    .record(AuditAction::RoomEdited, actor, format!("Room {} edited", room.name));
                let event = Event::RoomUpdated {
                    room: room.clone(),
                    audit,
                };
                (room, event)
            }
            None => {
                if store.rooms().len() >= MAX_ROOMS {
                    return Err(EngineError::LimitExceeded("too many rooms"));
                }
                let room = Room {
                    id: self.ids.next_id(),
                    name: req.name.unwrap_or_default(),
                    capacity: req.capacity.unwrap_or(1),
                    location: req.location.unwrap_or_default(),
                    resources: req.resources.unwrap_or_default(),
                    is_active: true,
                    color: req.color.unwrap_or_default(),
                };
                let audit = self.audit.record(
                    AuditAction::RoomCreated,
                    actor,
                    format!("New room created: {}", room.name),
                );
                let event = Event::RoomCreated {
                    room: room.clone(),
                    audit,
                };
                (room, event)
            }
        };

        self.persist_and_apply(&mut store, &event, &[room.id]).await?;
        info!("room {} ({}) saved by {}", room.id, room.name, actor.id);
        Ok(room)
    }

    /// Remove a room unless it still has active future bookings.
    /// Past and cancelled bookings keep pointing at the removed id.
    pub async fn delete_room(&self, actor: Option<&User>, id: Ulid) -> Result<(), EngineError> {
        let actor = actor.ok_or(EngineError::Unauthenticated)?;
        let mut store = self.state.write().await;

        if store.room(&id).is_none() {
            warn!("delete of unknown room {id} by {}", actor.id);
            return Err(EngineError::NotFound(id));
        }
        if has_future_bookings(store.bookings(), id, self.clock.now_ms()) {
            warn!("refused to delete room {id}: active future bookings");
            return Err(EngineError::DeletionGuard(id));
        }

        let audit = self
            .audit
            .record(AuditAction::RoomDeleted, actor, format!("Room {id} removed"));
        let event = Event::RoomDeleted { id, audit };
        self.persist_and_apply(&mut store, &event, &[id]).await?;
        self.notify.remove(&id);
        info!("room {id} deleted by {}", actor.id);
        Ok(())
    }

    // ── Config & users ───────────────────────────────────────

    pub async fn set_config(&self, actor: Option<&User>, config: AppConfig) -> Result<(), EngineError> {
        let actor = actor.ok_or(EngineError::Unauthenticated)?;
        validate_config(&config)?;
        let mut store = self.state.write().await;
        let audit = self.audit.record(
            AuditAction::ConfigUpdated,
            actor,
            format!(
                "Config updated by {}: {}–{}, max {}h, policy {}",
                actor.name,
                config.opening_time,
                config.closing_time,
                config.max_duration_hours,
                if config.enforce_policy { "enforced" } else { "advisory" }
            ),
        );
        let event = Event::ConfigUpdated { config, audit };
        self.persist_and_apply(&mut store, &event, &[]).await
    }

    /// Load or replace a reference user. Not audited: users come from the
    /// identity provider, not from an actor.
    pub async fn register_user(&self, user: User) -> Result<(), EngineError> {
        if user.name.trim().is_empty() {
            return Err(EngineError::validation("user name is required"));
        }
        if user.name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("user name too long"));
        }
        let mut store = self.state.write().await;
        if store.user(&user.id).is_none() && store.users().len() >= MAX_USERS {
            return Err(EngineError::LimitExceeded("too many users"));
        }
        let event = Event::UserRegistered { user };
        self.persist_and_apply(&mut store, &event, &[]).await
    }

    /// Replace the whole state with `snapshot` (first-boot seeding).
    pub async fn load_snapshot(&self, snapshot: Snapshot) -> Result<(), EngineError> {
        validate_config(&snapshot.config)?;
        let mut store = self.state.write().await;
        let (rooms, bookings) = (snapshot.rooms.len(), snapshot.bookings.len());
        let event = Event::Snapshot(snapshot);
        self.persist_and_apply(&mut store, &event, &[]).await?;
        info!("loaded snapshot: {rooms} rooms, {bookings} bookings");
        Ok(())
    }
}
