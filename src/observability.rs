use std::net::SocketAddr;

use crate::wire::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "roombook_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "roombook_request_duration_seconds";

/// Counter: booking requests rejected by the conflict detector.
pub const BOOKING_CONFLICTS_TOTAL: &str = "roombook_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roombook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roombook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roombook_connections_rejected_total";

/// Counter: failed logins.
pub const AUTH_FAILURES_TOTAL: &str = "roombook_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "roombook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "roombook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
/// A failed install is logged and the server keeps running without metrics.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus metrics exporter: {e}"),
    }
}

/// Map a Request variant to a short label for metrics.
pub fn op_label(req: &Request) -> &'static str {
    match req {
        Request::Login { .. } => "login",
        Request::Logout => "logout",
        Request::UpsertBooking(_) => "upsert_booking",
        Request::CancelBooking { .. } => "cancel_booking",
        Request::UpsertRoom(_) => "upsert_room",
        Request::DeleteRoom { .. } => "delete_room",
        Request::SetConfig(_) => "set_config",
        Request::GetConfig => "get_config",
        Request::ListRooms => "list_rooms",
        Request::ListBookings => "list_bookings",
        Request::ListUsers => "list_users",
        Request::ListAudit => "list_audit",
        Request::MyBookings => "my_bookings",
        Request::Utilization => "utilization",
        Request::ExportCsv => "export_csv",
        Request::Listen { .. } => "listen",
        Request::Unlisten { .. } => "unlisten",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_label_matches_wire_tag() {
        let req: Request = serde_json::from_str(r#"{"op":"export_csv"}"#).unwrap();
        assert_eq!(op_label(&req), "export_csv");
        let req: Request =
            serde_json::from_str(r#"{"op":"delete_room","id":"01ARZ3NDEKTSV4RRFFQ69G5FAV"}"#).unwrap();
        assert_eq!(op_label(&req), "delete_room");
    }

    #[test]
    fn init_without_port_is_noop() {
        init(None);
    }
}
