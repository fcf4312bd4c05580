//! `;`-delimited CSV export of the booking list.

use crate::model::*;

pub const CSV_HEADER: &str = "ID;Room;Title;Start;End;Status;Reason";

/// Shown in place of a room that no longer exists.
pub const DELETED_ROOM: &str = "(deleted room)";

/// Quote a field only when it would otherwise break the row.
fn field(s: &str) -> String {
    if s.contains([';', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// One header row, then one row per booking in listing order.
pub fn bookings_csv(rooms: &[Room], bookings: &[Booking]) -> String {
    let mut out = String::with_capacity(64 * (bookings.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');
    for b in bookings {
        let room = rooms
            .iter()
            .find(|r| r.id == b.room_id)
            .map_or(DELETED_ROOM, |r| r.name.as_str());
        let row = [
            b.id.to_string(),
            field(room),
            field(&b.title),
            fmt_datetime(b.span.start),
            fmt_datetime(b.span.end),
            b.status.label().to_string(),
            field(b.status.cancel_reason().unwrap_or("")),
        ];
        out.push_str(&row.join(";"));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    /// 2024-01-10T09:00:00Z
    const T9: Ms = 1_704_877_200_000;
    const H: Ms = 3_600_000;

    fn booking(room_id: Ulid, title: &str, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::from_parts(0, 1),
            room_id,
            title: title.into(),
            description: String::new(),
            span: Span::new(T9, T9 + H),
            created_by: Ulid::nil(),
            participants: vec![],
            resources_requested: vec![],
            status,
            meeting_type: MeetingType::Online,
            created_at: 0,
            updated_at: 0,
            is_recurring: false,
        }
    }

    #[test]
    fn header_and_rows() {
        let room = Room {
            id: Ulid::from_parts(1, 1),
            name: "Main Hall".into(),
            capacity: 50,
            location: String::new(),
            resources: vec![],
            is_active: true,
            color: String::new(),
        };
        let bookings = vec![
            booking(room.id, "Daily", BookingStatus::Active),
            booking(room.id, "Review", BookingStatus::Cancelled { reason: "holiday".into() }),
        ];
        let csv = bookings_csv(&[room], &bookings);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            format!("{};Main Hall;Daily;2024-01-10T09:00:00;2024-01-10T10:00:00;active;", bookings[0].id)
        );
        assert!(lines[2].ends_with(";cancelled;holiday"));
    }

    #[test]
    fn missing_room_rendered_as_deleted() {
        let csv = bookings_csv(&[], &[booking(Ulid::new(), "Old", BookingStatus::Active)]);
        assert!(csv.lines().nth(1).unwrap().contains(DELETED_ROOM));
    }

    #[test]
    fn delimiters_in_text_are_quoted() {
        let csv = bookings_csv(&[], &[booking(Ulid::new(), "Q1; \"kickoff\"", BookingStatus::Active)]);
        assert!(csv.contains("\"Q1; \"\"kickoff\"\"\""));
    }

    #[test]
    fn empty_list_is_header_only() {
        assert_eq!(bookings_csv(&[], &[]), format!("{CSV_HEADER}\n"));
    }
}
