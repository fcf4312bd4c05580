use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

use roombook::engine::Engine;
use roombook::model::Snapshot;
use roombook::notify::NotifyHub;
use roombook::{compactor, wire};

/// Load a JSON snapshot into an empty store.
async fn seed(engine: &Engine, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = engine.snapshot().await;
    if !snapshot.rooms.is_empty() || !snapshot.users.is_empty() || !snapshot.bookings.is_empty() {
        info!("store not empty, ignoring seed {}", path.display());
        return Ok(());
    }
    let raw = std::fs::read_to_string(path)?;
    let seeded: Snapshot = serde_json::from_str(&raw)?;
    engine.load_snapshot(seeded).await?;
    info!("seeded store from {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("ROOMBOOK_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    roombook::observability::init(metrics_port);

    let port = std::env::var("ROOMBOOK_PORT").unwrap_or_else(|_| "5480".into());
    let bind = std::env::var("ROOMBOOK_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("ROOMBOOK_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let password = std::env::var("ROOMBOOK_PASSWORD").unwrap_or_else(|_| "roombook".into());
    let max_connections: usize = std::env::var("ROOMBOOK_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(256);
    let compact_threshold: u64 = std::env::var("ROOMBOOK_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);
    let seed_path = std::env::var("ROOMBOOK_SEED").ok().map(PathBuf::from);

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    let wal_path = PathBuf::from(&data_dir).join("roombook.wal");
    let engine = Arc::new(Engine::open(&wal_path, Arc::new(NotifyHub::new()))?);
    if let Some(path) = &seed_path {
        seed(&engine, path).await?;
    }
    tokio::spawn(compactor::run_compactor(engine.clone(), compact_threshold));

    let semaphore = Arc::new(Semaphore::new(max_connections));

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("roombook listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  max_connections: {max_connections}");
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Graceful shutdown: stop accepting on SIGTERM/ctrl-c, drain in-flight connections
    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (socket, peer) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::error!("accept error: {e}");
                        continue;
                    }
                };

                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::warn!("connection limit reached, rejecting {peer}");
                        metrics::counter!(roombook::observability::CONNECTIONS_REJECTED_TOTAL).increment(1);
                        drop(socket);
                        continue;
                    }
                };

                info!("connection from {peer}");
                metrics::counter!(roombook::observability::CONNECTIONS_TOTAL).increment(1);
                metrics::gauge!(roombook::observability::CONNECTIONS_ACTIVE).increment(1.0);
                let engine = engine.clone();
                let pw = password.clone();

                tokio::spawn(async move {
                    let _permit = permit; // held until connection closes
                    if let Err(e) = wire::process_connection(socket, engine, pw).await {
                        tracing::error!("connection error from {peer}: {e}");
                    }
                    metrics::gauge!(roombook::observability::CONNECTIONS_ACTIVE).decrement(1.0);
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping accept loop");
                break;
            }
        }
    }

    // Wait for in-flight connections to finish (up to 10s)
    info!("draining connections...");
    let drain_deadline = tokio::time::sleep(std::time::Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == max_connections {
            info!("all connections drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = max_connections - semaphore.available_permits();
                tracing::warn!("drain timeout, {remaining} connections still open");
                break;
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }

    info!("roombook stopped");
    Ok(())
}
