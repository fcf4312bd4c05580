use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

/// Background task that periodically compacts the WAL once enough appends
/// have accumulated.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}

/// One compactor pass. Returns true if the WAL was rewritten.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact().await {
        Ok(()) => {
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("roombook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn admin() -> User {
        User {
            id: Ulid::new(),
            name: "Admin".into(),
            email: "admin@example.com".into(),
            role: Role::Admin,
            department: None,
            avatar: None,
        }
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let engine = Engine::open(&path, Arc::new(NotifyHub::new())).unwrap();
        let admin = admin();
        engine.register_user(admin.clone()).await.unwrap();
        for i in 0..3 {
            engine
                .upsert_room(Some(&admin), RoomRequest::new(format!("Room {i}"), 4))
                .await
                .unwrap();
        }

        assert!(!compact_if_needed(&engine, 10).await);
        assert_eq!(engine.appends_since_compact().await, 4);

        assert!(compact_if_needed(&engine, 4).await);
        assert_eq!(engine.appends_since_compact().await, 0);

        let snapshot = engine.snapshot().await;
        drop(engine);
        let reopened = Engine::open(&path, Arc::new(NotifyHub::new())).unwrap();
        assert_eq!(reopened.snapshot().await, snapshot);
        assert_eq!(reopened.rooms().await.len(), 3);
    }
}
