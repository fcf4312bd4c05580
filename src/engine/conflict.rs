use ulid::Ulid;

use crate::model::*;

/// First active booking in `room_id` whose span overlaps `span`, in insertion order.
///
/// `exclude` skips the booking being edited so it never collides with itself.
/// The caller has already checked `span.start < span.end`.
pub fn find_conflict<'a>(
    bookings: &'a [Booking],
    room_id: Ulid,
    span: &Span,
    exclude: Option<Ulid>,
) -> Option<&'a Booking> {
    bookings.iter().find(|b| {
        b.is_active()
            && b.room_id == room_id
            && Some(b.id) != exclude
            && b.span.overlaps(span)
    })
}

/// Whether a room still has active bookings that start after `now`.
pub(crate) fn has_future_bookings(bookings: &[Booking], room_id: Ulid, now: Ms) -> bool {
    bookings
        .iter()
        .any(|b| b.room_id == room_id && b.is_active() && b.span.start > now)
}
