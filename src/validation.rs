//! Input checks that run before any lifecycle operation touches the store.

use chrono::{DateTime, NaiveDateTime, NaiveTime};

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::*;

const MINUTE: Ms = 60_000;
const HOUR: Ms = 3_600_000;

/// Check a booking request and return its span.
///
/// Always enforced: non-empty title, `end > start`, start not in the past.
/// The opening-hours, duration, advance-notice and recurrence rules of
/// `config` only apply when `config.enforce_policy` is set.
pub fn validate_booking(req: &BookingRequest, config: &AppConfig, now: Ms) -> Result<Span, EngineError> {
    if req.title.trim().is_empty() {
        return Err(EngineError::validation("title is required"));
    }
    if req.title.len() > MAX_TITLE_LEN {
        return Err(EngineError::LimitExceeded("title too long"));
    }
    if req.start < MIN_VALID_TIMESTAMP_MS || req.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if req.end <= req.start {
        return Err(EngineError::validation("end time must be after start time"));
    }
    let span = Span::new(req.start, req.end);
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("booking too long"));
    }
    if span.start < now {
        return Err(EngineError::validation("cannot book a time in the past"));
    }
    if req.description.as_ref().is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN) {
        return Err(EngineError::LimitExceeded("description too long"));
    }
    if let Some(participants) = &req.participants {
        if participants.len() > MAX_PARTICIPANTS {
            return Err(EngineError::LimitExceeded("too many participants"));
        }
        if participants.iter().any(|p| p.len() > MAX_PARTICIPANT_LEN) {
            return Err(EngineError::LimitExceeded("participant too long"));
        }
    }

    if config.enforce_policy {
        check_policy(&span, req.is_recurring.unwrap_or(false), config, now)?;
    }
    Ok(span)
}

fn parse_hm(s: &str, field: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| EngineError::validation(format!("invalid {field} in config: {s:?}")))
}

fn wall_clock(ms: Ms) -> Result<NaiveDateTime, EngineError> {
    DateTime::from_timestamp_millis(ms)
        .map(|d| d.naive_utc())
        .ok_or(EngineError::LimitExceeded("timestamp out of range"))
}

/// Organization policy from `AppConfig`.
pub fn check_policy(span: &Span, is_recurring: bool, config: &AppConfig, now: Ms) -> Result<(), EngineError> {
    let opening = parse_hm(&config.opening_time, "opening_time")?;
    let closing = parse_hm(&config.closing_time, "closing_time")?;

    let start = wall_clock(span.start)?;
    // Last instant inside the span, so an end exactly at midnight stays on the same day.
    let last = wall_clock(span.end - 1)?;
    let end = wall_clock(span.end)?;
    if start.date() != last.date() {
        return Err(EngineError::validation("bookings must start and end on the same day"));
    }
    if start.time() < opening || end.time() > closing || end.date() != start.date() {
        return Err(EngineError::validation(format!(
            "bookings must fall within opening hours ({}–{})",
            config.opening_time, config.closing_time
        )));
    }

    let max = config.max_duration_hours as Ms * HOUR;
    if span.duration_ms() > max {
        return Err(EngineError::validation(format!(
            "bookings may last at most {}h",
            config.max_duration_hours
        )));
    }

    if span.start < now + config.min_advance_min as Ms * MINUTE {
        return Err(EngineError::validation(format!(
            "bookings must be made at least {} minutes in advance",
            config.min_advance_min
        )));
    }

    if is_recurring && !config.allow_recurring {
        return Err(EngineError::validation("recurring bookings are disabled"));
    }
    Ok(())
}

/// Opening hours must parse and form a non-empty window; durations must be positive.
pub fn validate_config(config: &AppConfig) -> Result<(), EngineError> {
    let opening = parse_hm(&config.opening_time, "opening_time")?;
    let closing = parse_hm(&config.closing_time, "closing_time")?;
    if opening >= closing {
        return Err(EngineError::validation("opening_time must be before closing_time"));
    }
    if config.max_duration_hours == 0 || config.default_duration_min == 0 {
        return Err(EngineError::validation("durations must be positive"));
    }
    Ok(())
}

/// Check a room payload. Creation needs a name and a positive capacity;
/// edits only check the fields they carry.
pub fn validate_room(req: &RoomRequest) -> Result<(), EngineError> {
    let creating = req.id.is_none();
    match &req.name {
        Some(name) if name.trim().is_empty() => {
            return Err(EngineError::validation("room name is required"));
        }
        Some(name) if name.len() > MAX_NAME_LEN => {
            return Err(EngineError::LimitExceeded("room name too long"));
        }
        None if creating => return Err(EngineError::validation("room name is required")),
        _ => {}
    }
    match req.capacity {
        Some(0) => return Err(EngineError::validation("capacity must be positive")),
        None if creating => return Err(EngineError::validation("capacity is required")),
        _ => {}
    }
    if req.location.as_ref().is_some_and(|l| l.len() > MAX_LOCATION_LEN) {
        return Err(EngineError::LimitExceeded("location too long"));
    }
    Ok(())
}

pub fn validate_reason(reason: &str) -> Result<(), EngineError> {
    if reason.trim().is_empty() {
        return Err(EngineError::validation("a cancellation reason is required"));
    }
    if reason.len() > MAX_REASON_LEN {
        return Err(EngineError::LimitExceeded("reason too long"));
    }
    Ok(())
}
