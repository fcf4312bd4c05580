//! Utilization figures and per-user listings derived from the store.

use serde::Serialize;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomUsage {
    pub room_id: Ulid,
    pub name: String,
    pub active_bookings: usize,
    pub reserved_ms: Ms,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UtilizationReport {
    pub active_bookings: usize,
    pub cancelled_bookings: usize,
    /// Each active booking counts its participants, or one if it lists none.
    pub participants_impacted: usize,
    pub reserved_ms: Ms,
    /// Current rooms, busiest first.
    pub per_room: Vec<RoomUsage>,
}

pub fn utilization(rooms: &[Room], bookings: &[Booking]) -> UtilizationReport {
    let mut report = UtilizationReport::default();
    for b in bookings {
        if b.is_active() {
            report.active_bookings += 1;
            report.participants_impacted += b.participants.len().max(1);
            report.reserved_ms += b.span.duration_ms();
        } else {
            report.cancelled_bookings += 1;
        }
    }

    report.per_room = rooms
        .iter()
        .map(|room| {
            let (count, ms) = bookings
                .iter()
                .filter(|b| b.room_id == room.id && b.is_active())
                .fold((0, 0), |(n, ms), b| (n + 1, ms + b.span.duration_ms()));
            RoomUsage {
                room_id: room.id,
                name: room.name.clone(),
                active_bookings: count,
                reserved_ms: ms,
            }
        })
        .collect();
    // Stable: rooms with equal counts keep inventory order.
    report.per_room.sort_by(|a, b| b.active_bookings.cmp(&a.active_bookings));
    report
}

/// Bookings visible to `user`: their own, or everything for an admin.
/// Latest start first.
pub fn bookings_for(user: &User, bookings: &[Booking]) -> Vec<Booking> {
    let mut visible: Vec<Booking> = bookings
        .iter()
        .filter(|b| user.is_admin() || b.created_by == user.id)
        .cloned()
        .collect();
    visible.sort_by(|a, b| b.span.start.cmp(&a.span.start));
    visible
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = 3_600_000;

    fn room(n: u128, name: &str) -> Room {
        Room {
            id: Ulid::from_parts(1, n),
            name: name.into(),
            capacity: 6,
            location: String::new(),
            resources: vec![],
            is_active: true,
            color: String::new(),
        }
    }

    fn booking(n: u128, room: &Room, start: Ms, end: Ms, owner: Ulid) -> Booking {
        Booking {
            id: Ulid::from_parts(2, n),
            room_id: room.id,
            title: format!("b{n}"),
            description: String::new(),
            span: Span::new(start, end),
            created_by: owner,
            participants: vec![],
            resources_requested: vec![],
            status: BookingStatus::Active,
            meeting_type: MeetingType::InPerson,
            created_at: 0,
            updated_at: 0,
            is_recurring: false,
        }
    }

    fn user(n: u128, role: Role) -> User {
        User {
            id: Ulid::from_parts(3, n),
            name: format!("u{n}"),
            email: String::new(),
            role,
            department: None,
            avatar: None,
        }
    }

    #[test]
    fn utilization_counts_active_and_cancelled() {
        let a = room(1, "A");
        let b = room(2, "B");
        let owner = Ulid::nil();
        let mut bookings = vec![
            booking(1, &a, 0, H, owner),
            booking(2, &b, 0, 2 * H, owner),
            booking(3, &b, 2 * H, 3 * H, owner),
            booking(4, &b, 5 * H, 6 * H, owner),
        ];
        bookings[1].participants = vec!["x@example.com".into(), "y@example.com".into()];
        bookings[3].status = BookingStatus::Cancelled { reason: "sick".into() };

        let report = utilization(&[a.clone(), b.clone()], &bookings);
        assert_eq!(report.active_bookings, 3);
        assert_eq!(report.cancelled_bookings, 1);
        assert_eq!(report.participants_impacted, 1 + 2 + 1);
        assert_eq!(report.reserved_ms, 4 * H);
        assert_eq!(report.per_room[0].room_id, b.id);
        assert_eq!(report.per_room[0].active_bookings, 2);
        assert_eq!(report.per_room[0].reserved_ms, 3 * H);
        assert_eq!(report.per_room[1].room_id, a.id);
    }

    #[test]
    fn utilization_skips_deleted_rooms_in_breakdown() {
        let a = room(1, "A");
        let gone = room(9, "Gone");
        let bookings = vec![booking(1, &gone, 0, H, Ulid::nil())];
        let report = utilization(&[a], &bookings);
        assert_eq!(report.active_bookings, 1);
        assert_eq!(report.per_room.len(), 1);
        assert_eq!(report.per_room[0].active_bookings, 0);
    }

    #[test]
    fn users_see_own_bookings_admins_see_all() {
        let a = room(1, "A");
        let ana = user(1, Role::User);
        let bo = user(2, Role::User);
        let admin = user(3, Role::Admin);
        let bookings = vec![
            booking(1, &a, 0, H, ana.id),
            booking(2, &a, 3 * H, 4 * H, bo.id),
            booking(3, &a, 5 * H, 6 * H, ana.id),
        ];

        let mine: Vec<_> = bookings_for(&ana, &bookings).iter().map(|b| b.id).collect();
        assert_eq!(mine, vec![bookings[2].id, bookings[0].id]);

        let all = bookings_for(&admin, &bookings);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, bookings[2].id);
    }
}
