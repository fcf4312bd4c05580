use std::sync::Arc;

use crate::clock::{Clock, IdGenerator};
use crate::model::*;

/// Builds audit entries. The entry reaches the log when the event carrying it
/// is applied, so a rejected mutation never leaves an audit trace.
pub struct AuditLogger {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl AuditLogger {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { clock, ids }
    }

    pub fn record(&self, action: AuditAction, actor: &User, details: impl Into<String>) -> AuditEntry {
        AuditEntry {
            id: self.ids.next_id(),
            action,
            user_id: actor.id,
            timestamp: self.clock.now_ms(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SequentialIds};
    use ulid::Ulid;

    #[test]
    fn record_stamps_id_actor_and_time() {
        let clock = Arc::new(ManualClock::new(5_000));
        let logger = AuditLogger::new(clock.clone(), Arc::new(SequentialIds::new()));
        let actor = User {
            id: Ulid::from_parts(9, 9),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: Role::Admin,
            department: None,
            avatar: None,
        };

        let first = logger.record(AuditAction::RoomCreated, &actor, "New room created: A");
        clock.advance(10);
        let second = logger.record(AuditAction::RoomDeleted, &actor, "Room x removed");

        assert_eq!(first.user_id, actor.id);
        assert_eq!(first.timestamp, 5_000);
        assert_eq!(second.timestamp, 5_010);
        assert_ne!(first.id, second.id);
        assert_eq!(first.details, "New room created: A");
    }
}
