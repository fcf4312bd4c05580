//! Hard limits on request sizes and collection growth.

use crate::model::Ms;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_LOCATION_LEN: usize = 200;
pub const MAX_REASON_LEN: usize = 1024;
pub const MAX_PARTICIPANTS: usize = 500;
pub const MAX_PARTICIPANT_LEN: usize = 320;

pub const MAX_ROOMS: usize = 10_000;
pub const MAX_BOOKINGS: usize = 1_000_000;
pub const MAX_USERS: usize = 100_000;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2200-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;
/// A single booking may not span more than 31 days.
pub const MAX_SPAN_DURATION_MS: Ms = 31 * 24 * 3_600_000;

/// Longest accepted request line on the wire.
pub const MAX_LINE_LEN: usize = 256 * 1024;

/// Largest WAL entry payload. A longer length prefix is read as corruption.
pub const MAX_EVENT_BYTES: usize = 256 * 1024 * 1024;
