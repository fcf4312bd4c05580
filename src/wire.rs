//! Newline-delimited JSON protocol.
//!
//! Each line a client sends is one [`Request`], tagged by `op`. Each reply is
//! `{"ok":true,"data":...}` or `{"ok":false,"code":...,"error":...}`. After a
//! `listen`, room events arrive interleaved as `{"notification":<event>}`.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::limits::MAX_LINE_LEN;
use crate::model::*;
use crate::observability;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Login { user_id: Ulid, password: String },
    Logout,
    UpsertBooking(BookingRequest),
    CancelBooking { id: Ulid, reason: String },
    UpsertRoom(RoomRequest),
    DeleteRoom { id: Ulid },
    SetConfig(AppConfig),
    GetConfig,
    ListRooms,
    ListBookings,
    ListUsers,
    ListAudit,
    MyBookings,
    Utilization,
    ExportCsv,
    Listen { room_id: Ulid },
    Unlisten { room_id: Ulid },
}

/// A failed request as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireError {
    pub code: &'static str,
    pub message: String,
}

impl WireError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    fn forbidden() -> Self {
        Self::new("forbidden", "administrator role required")
    }

    fn not_owner(id: Ulid) -> Self {
        Self::new(
            "forbidden",
            format!("booking {id} belongs to another user; only its creator or an administrator may change it"),
        )
    }
}

impl From<EngineError> for WireError {
    fn from(e: EngineError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

pub fn ok_line(data: Value) -> String {
    json!({ "ok": true, "data": data }).to_string()
}

pub fn err_line(e: &WireError) -> String {
    json!({ "ok": false, "code": e.code, "error": e.message }).to_string()
}

fn to_data<T: Serialize>(value: &T) -> Result<Value, WireError> {
    serde_json::to_value(value).map_err(|e| WireError::new("internal", e.to_string()))
}

/// Per-connection state: the logged-in user and active room subscriptions.
pub struct Session {
    engine: Arc<Engine>,
    password: Arc<str>,
    user: Option<User>,
    listeners: HashMap<Ulid, JoinHandle<()>>,
    notifications: mpsc::Sender<String>,
}

impl Session {
    /// `notifications` receives one ready-to-send line per room event.
    pub fn new(engine: Arc<Engine>, password: impl Into<Arc<str>>, notifications: mpsc::Sender<String>) -> Self {
        Self {
            engine,
            password: password.into(),
            user: None,
            listeners: HashMap::new(),
            notifications,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Parse, dispatch and render one request line.
    pub async fn handle_line(&mut self, line: &str) -> String {
        let req: Request = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                metrics::counter!(observability::REQUESTS_TOTAL, "op" => "invalid", "status" => "error")
                    .increment(1);
                return err_line(&WireError::bad_request(format!("invalid request: {e}")));
            }
        };

        let op = observability::op_label(&req);
        let started = Instant::now();
        let result = self.handle(req).await;
        metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);

        match result {
            Ok(data) => ok_line(data),
            Err(e) => {
                debug!("{op} failed: {e}");
                err_line(&e)
            }
        }
    }

    pub async fn handle(&mut self, req: Request) -> Result<Value, WireError> {
        let engine = self.engine.clone();
        match req {
            Request::Login { user_id, password } => {
                let user = match engine.user(&user_id).await {
                    Some(user) if *password == *self.password => user,
                    _ => {
                        warn!("failed login for {user_id}");
                        metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
                        return Err(WireError::new("unauthenticated", "invalid credentials"));
                    }
                };
                info!("user {} logged in", user.id);
                let data = to_data(&user)?;
                self.user = Some(user);
                Ok(data)
            }
            Request::Logout => {
                self.user = None;
                self.unlisten_all();
                Ok(Value::Null)
            }
            Request::UpsertBooking(req) => {
                if let Some(id) = req.id {
                    self.authorize_booking(id).await?;
                }
                let booking = engine.upsert_booking(self.user.as_ref(), req).await?;
                to_data(&booking)
            }
            Request::CancelBooking { id, reason } => {
                self.authorize_booking(id).await?;
                let booking = engine.cancel_booking(self.user.as_ref(), id, &reason).await?;
                to_data(&booking)
            }
            Request::UpsertRoom(req) => {
                let room = engine.upsert_room(self.admin()?, req).await?;
                to_data(&room)
            }
            Request::DeleteRoom { id } => {
                engine.delete_room(self.admin()?, id).await?;
                Ok(Value::Null)
            }
            Request::SetConfig(config) => {
                engine.set_config(self.admin()?, config).await?;
                to_data(&engine.config().await)
            }
            Request::GetConfig => to_data(&engine.config().await),
            Request::ListRooms => to_data(&engine.rooms().await),
            Request::ListBookings => to_data(&engine.bookings().await),
            Request::ListUsers => to_data(&engine.users().await),
            Request::ListAudit => {
                if self.admin()?.is_none() {
                    return Err(EngineError::Unauthenticated.into());
                }
                to_data(&engine.audit_log().await)
            }
            Request::MyBookings => {
                let user = self.user.as_ref().ok_or(EngineError::Unauthenticated)?;
                to_data(&engine.bookings_for(user).await)
            }
            Request::Utilization => {
                if self.admin()?.is_none() {
                    return Err(EngineError::Unauthenticated.into());
                }
                to_data(&engine.utilization().await)
            }
            Request::ExportCsv => Ok(Value::String(engine.export_csv().await)),
            Request::Listen { room_id } => {
                if engine.room(&room_id).await.is_none() {
                    return Err(EngineError::NotFound(room_id).into());
                }
                self.listen(room_id);
                Ok(json!({ "room_id": room_id }))
            }
            Request::Unlisten { room_id } => {
                self.unlisten(&room_id);
                Ok(Value::Null)
            }
        }
    }

    /// The current user if it may administer rooms and config. With no
    /// session the engine reports the missing actor itself.
    fn admin(&self) -> Result<Option<&User>, WireError> {
        match &self.user {
            Some(user) if !user.is_admin() => Err(WireError::forbidden()),
            user => Ok(user.as_ref()),
        }
    }

    /// Members may only change bookings they created. `created_by` never
    /// changes after creation. Unknown ids and missing sessions fall through
    /// to the engine, which reports them.
    async fn authorize_booking(&self, id: Ulid) -> Result<(), WireError> {
        let Some(user) = &self.user else {
            return Ok(());
        };
        if user.is_admin() {
            return Ok(());
        }
        match self.engine.booking(&id).await {
            Some(booking) if booking.created_by != user.id => {
                warn!("user {} denied change to booking {id}", user.id);
                Err(WireError::not_owner(id))
            }
            _ => Ok(()),
        }
    }

    fn listen(&mut self, room_id: Ulid) {
        if self.listeners.contains_key(&room_id) {
            return;
        }
        let mut rx = self.engine.notify.subscribe(room_id);
        let tx = self.notifications.clone();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let line = json!({ "notification": event }).to_string();
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!("listener on room {room_id} dropped {n} notifications");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.listeners.insert(room_id, handle);
    }

    fn unlisten(&mut self, room_id: &Ulid) {
        if let Some(handle) = self.listeners.remove(room_id) {
            handle.abort();
        }
    }

    fn unlisten_all(&mut self) {
        for (_, handle) in self.listeners.drain() {
            handle.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.unlisten_all();
    }
}

fn codec_err(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Serve one client until it disconnects.
pub async fn process_connection(socket: TcpStream, engine: Arc<Engine>, password: String) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    let (tx, mut rx) = mpsc::channel(256);
    let mut session = Session::new(engine, password, tx);

    loop {
        tokio::select! {
            frame = framed.next() => {
                let line = match frame {
                    None => break,
                    Some(Ok(line)) => line,
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        warn!("request line exceeds {MAX_LINE_LEN} bytes");
                        let reply = err_line(&WireError::bad_request("request too long"));
                        framed.send(reply).await.map_err(codec_err)?;
                        continue;
                    }
                    Some(Err(LinesCodecError::Io(e))) => return Err(e),
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = session.handle_line(&line).await;
                framed.send(reply).await.map_err(codec_err)?;
            }
            Some(line) = rx.recv() => {
                framed.send(line).await.map_err(codec_err)?;
            }
        }
    }

    if let Some(user) = session.user() {
        debug!("session for {} closed", user.id);
    }
    Ok(())
}
