use chrono::DateTime;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Adjacent spans (one ends where the other starts) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// Wall-clock `HH:MM` of a timestamp.
pub fn fmt_hm(ms: Ms) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|d| d.format("%H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Wall-clock `YYYY-MM-DDTHH:MM:SS` of a timestamp.
pub fn fmt_datetime(ms: Ms) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

// ── Rooms ────────────────────────────────────────────────────────

/// Equipment a room can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amenity {
    Tv,
    Projector,
    Whiteboard,
    VideoConference,
    AirConditioning,
    Refreshments,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Ulid,
    pub name: String,
    pub capacity: u32,
    pub location: String,
    pub resources: Vec<Amenity>,
    pub is_active: bool,
    /// Display hint only.
    pub color: String,
}

// ── Bookings ─────────────────────────────────────────────────────

/// Cancellation is terminal; the reason only exists on the cancelled variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Active,
    Cancelled { reason: String },
}

impl BookingStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Active)
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        match self {
            BookingStatus::Active => None,
            BookingStatus::Cancelled { reason } => Some(reason),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Cancelled { .. } => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    #[default]
    InPerson,
    Online,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    /// Soft reference: the room may since have been deleted.
    pub room_id: Ulid,
    pub title: String,
    pub description: String,
    pub span: Span,
    pub created_by: Ulid,
    pub participants: Vec<String>,
    /// Not checked against the room's own resources.
    pub resources_requested: Vec<Amenity>,
    pub status: BookingStatus,
    pub meeting_type: MeetingType,
    pub created_at: Ms,
    pub updated_at: Ms,
    /// Informational; recurrences are never expanded.
    pub is_recurring: bool,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ── Users & config ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Ulid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub avatar: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Organization-wide booking policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `HH:MM`
    pub opening_time: String,
    /// `HH:MM`
    pub closing_time: String,
    pub default_duration_min: u32,
    pub min_advance_min: u32,
    pub max_duration_hours: u32,
    pub allow_recurring: bool,
    /// When false only the basic checks (title, ordering, not in the past) run.
    pub enforce_policy: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            opening_time: "07:00".into(),
            closing_time: "20:00".into(),
            default_duration_min: 60,
            min_advance_min: 15,
            max_duration_hours: 4,
            allow_recurring: true,
            enforce_policy: false,
        }
    }
}

// ── Audit ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    BookingCreated,
    BookingEdited,
    BookingCancelled,
    RoomCreated,
    RoomEdited,
    RoomDeleted,
    ConfigUpdated,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::BookingCreated => "BOOKING_CREATED",
            AuditAction::BookingEdited => "BOOKING_EDITED",
            AuditAction::BookingCancelled => "BOOKING_CANCELLED",
            AuditAction::RoomCreated => "ROOM_CREATED",
            AuditAction::RoomEdited => "ROOM_EDITED",
            AuditAction::RoomDeleted => "ROOM_DELETED",
            AuditAction::ConfigUpdated => "CONFIG_UPDATED",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Ulid,
    pub action: AuditAction,
    pub user_id: Ulid,
    pub timestamp: Ms,
    pub details: String,
}

// ── Persistence ──────────────────────────────────────────────────

/// Every collection the store owns, one entry each.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub rooms: Vec<Room>,
    pub bookings: Vec<Booking>,
    pub users: Vec<User>,
    pub config: AppConfig,
    /// Insertion order (oldest first).
    pub audit_log: Vec<AuditEntry>,
}

/// The event types. This is the WAL record format.
///
/// Mutations carry their audit entry so both persist in one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
        audit: AuditEntry,
    },
    RoomUpdated {
        room: Room,
        audit: AuditEntry,
    },
    RoomDeleted {
        id: Ulid,
        audit: AuditEntry,
    },
    BookingCreated {
        booking: Booking,
        audit: AuditEntry,
    },
    BookingUpdated {
        booking: Booking,
        audit: AuditEntry,
    },
    BookingCancelled {
        id: Ulid,
        room_id: Ulid,
        reason: String,
        at: Ms,
        audit: AuditEntry,
    },
    ConfigUpdated {
        config: AppConfig,
        audit: AuditEntry,
    },
    UserRegistered {
        user: User,
    },
    /// Replaces the whole store. Written by compaction and seeding.
    Snapshot(Snapshot),
}

impl Event {
    pub fn audit(&self) -> Option<&AuditEntry> {
        match self {
            Event::RoomCreated { audit, .. }
            | Event::RoomUpdated { audit, .. }
            | Event::RoomDeleted { audit, .. }
            | Event::BookingCreated { audit, .. }
            | Event::BookingUpdated { audit, .. }
            | Event::BookingCancelled { audit, .. }
            | Event::ConfigUpdated { audit, .. } => Some(audit),
            Event::UserRegistered { .. } | Event::Snapshot(_) => None,
        }
    }
}

// ── Requests ─────────────────────────────────────────────────────

/// Create (no `id`) or edit (`id` set) payload for a booking.
/// `None` fields keep the stored value on edit and take defaults on create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub id: Option<Ulid>,
    pub room_id: Ulid,
    pub title: String,
    pub start: Ms,
    pub end: Ms,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub participants: Option<Vec<String>>,
    #[serde(default)]
    pub resources_requested: Option<Vec<Amenity>>,
    #[serde(default)]
    pub meeting_type: Option<MeetingType>,
    #[serde(default)]
    pub is_recurring: Option<bool>,
}

impl BookingRequest {
    pub fn new(room_id: Ulid, title: impl Into<String>, start: Ms, end: Ms) -> Self {
        Self {
            id: None,
            room_id,
            title: title.into(),
            start,
            end,
            description: None,
            participants: None,
            resources_requested: None,
            meeting_type: None,
            is_recurring: None,
        }
    }

    pub fn editing(mut self, id: Ulid) -> Self {
        self.id = Some(id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomRequest {
    pub id: Option<Ulid>,
    pub name: Option<String>,
    pub capacity: Option<u32>,
    pub location: Option<String>,
    pub resources: Option<Vec<Amenity>>,
    pub is_active: Option<bool>,
    pub color: Option<String>,
}

impl RoomRequest {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: Some(name.into()),
            capacity: Some(capacity),
            ..Default::default()
        }
    }

    pub fn editing(id: Ulid) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}
