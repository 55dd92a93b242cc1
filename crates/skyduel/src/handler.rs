//! Per-connection handler: handshake, then request dispatch.
//!
//! Each accepted connection gets its own task running this handler:
//!   1. Receive `Handshake` → check the version, learn the address
//!   2. Send `HandshakeAck`
//!   3. Loop: receive envelopes → dispatch to the session controller
//!
//! A `Subscribe` turns the connection into a push connection by starting a
//! forwarder task next to the loop; everything else is request/response,
//! which is all a poll client ever uses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use skyduel_protocol::{
    ClientMessage, Codec, Envelope, PROTOCOL_VERSION, Payload, PlayerAddress, ProtocolError,
    RoomCode, ServerMessage, SharedSnapshot, SlotInfo, unix_millis,
};
use skyduel_room::{MatchStore, SessionError};
use skyduel_transport::{Connection, WebSocketConnection};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::SkyduelError;
use crate::server::ServerState;

/// The sending half of a connection, shared with its push forwarder.
struct Outbox<C: Codec> {
    conn: Arc<WebSocketConnection>,
    codec: C,
    seq: AtomicU64,
}

impl<C: Codec> Outbox<C> {
    /// Increments and returns the next sequence number.
    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    async fn send(&self, msg: ServerMessage) -> Result<(), SkyduelError> {
        let envelope = Envelope::server(self.next_seq(), unix_millis(), msg);
        let bytes = self.codec.encode(&envelope)?;
        if matches!(envelope.payload, Payload::Server(ServerMessage::Snapshot { .. })) {
            self.conn.send_unreliable(&bytes).await?;
        } else {
            self.conn.send(&bytes).await?;
        }
        Ok(())
    }

    async fn send_error(&self, code: u16, message: &str) -> Result<(), SkyduelError> {
        self.send(ServerMessage::Error {
            code,
            message: message.to_string(),
        })
        .await
    }
}

/// Stops the push forwarder when the handler exits, however it exits.
#[derive(Default)]
struct Forwarder(Option<JoinHandle<()>>);

impl Forwarder {
    fn replace(&mut self, task: JoinHandle<()>) {
        if let Some(old) = self.0.replace(task) {
            old.abort();
        }
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        if let Some(task) = self.0.take() {
            task.abort();
        }
    }
}

/// What the loop does after a message.
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<M, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<M, C>>,
) -> Result<(), SkyduelError>
where
    M: MatchStore,
    C: Codec + Clone,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");
    let out = Arc::new(Outbox {
        conn: Arc::new(conn),
        codec: state.codec.clone(),
        seq: AtomicU64::new(0),
    });

    let address = perform_handshake(&out, &state).await?;
    tracing::info!(%conn_id, %address, "player connected");

    let mut forwarder = Forwarder::default();
    loop {
        let data = match tokio::time::timeout(state.idle_timeout, out.conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%address, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%address, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%address, "connection timed out");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%address, error = %e, "failed to decode envelope");
                continue;
            }
        };
        let Payload::Client(msg) = envelope.payload else {
            tracing::debug!(%address, "ignoring server payload from client");
            continue;
        };

        let flow = handle_message(&out, &state, &address, msg, envelope.seq, &mut forwarder).await?;
        if matches!(flow, Flow::Close) {
            break;
        }
    }
    Ok(())
}

/// Receives the handshake, validates it, and acknowledges it.
async fn perform_handshake<M, C>(
    out: &Outbox<C>,
    state: &ServerState<M, C>,
) -> Result<PlayerAddress, SkyduelError>
where
    M: MatchStore,
    C: Codec,
{
    let data = match tokio::time::timeout(state.handshake_timeout, out.conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(SkyduelError::Handshake("connection closed before handshake".into()));
        }
        Ok(Err(e)) => return Err(SkyduelError::Transport(e)),
        Err(_) => return Err(SkyduelError::Handshake("handshake timed out".into())),
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    let (version, address) = match envelope.payload {
        Payload::Client(ClientMessage::Handshake { version, address }) => (version, address),
        _ => {
            out.send_error(400, "expected Handshake").await?;
            return Err(ProtocolError::InvalidMessage("first message must be Handshake".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        out.send_error(
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(SkyduelError::Handshake(format!("protocol version {version}")));
    }
    if address.as_str().trim().is_empty() {
        out.send_error(400, "address must not be empty").await?;
        return Err(SkyduelError::Handshake("empty address".into()));
    }

    out.send(ServerMessage::HandshakeAck {
        server_time: unix_millis(),
    })
    .await?;
    Ok(address)
}

/// Dispatches one client message. Session errors go back to the client as
/// `Error` frames; only transport and codec failures end the connection.
async fn handle_message<M, C>(
    out: &Arc<Outbox<C>>,
    state: &ServerState<M, C>,
    address: &PlayerAddress,
    msg: ClientMessage,
    request_seq: u64,
    forwarder: &mut Forwarder,
) -> Result<Flow, SkyduelError>
where
    M: MatchStore,
    C: Codec + Clone,
{
    let ctl = &state.controller;
    let reply = match msg {
        ClientMessage::Handshake { .. } => {
            out.send_error(400, "already handshaken").await?;
            return Ok(Flow::Continue);
        }

        ClientMessage::CreateRoom { mode, ship } => {
            let host = SlotInfo {
                address: address.clone(),
                ship,
            };
            match ctl.create_session(mode, host).await {
                Ok(code) => ctl
                    .get_room(&code)
                    .await
                    .map(|room| ServerMessage::RoomCreated { room }),
                Err(e) => Err(e),
            }
        }

        ClientMessage::JoinRoom { room_code, ship } => {
            let guest = SlotInfo {
                address: address.clone(),
                ship,
            };
            ctl.join_session(&room_code, guest)
                .await
                .map(|room| ServerMessage::Room { room })
        }

        ClientMessage::SetReady { room_code, ready } => ctl
            .set_ready(&room_code, address.clone(), ready)
            .await
            .map(|room| ServerMessage::Room { room }),

        ClientMessage::GetRoom { room_code } => ctl
            .get_room(&room_code)
            .await
            .map(|room| ServerMessage::Room { room }),

        ClientMessage::StartSession { room_code, field } => {
            match ensure_member(state, &room_code, address).await {
                Ok(()) => ctl
                    .start_simulation(&room_code, field)
                    .await
                    .map(|room| ServerMessage::Room { room }),
                Err(e) => Err(e),
            }
        }

        ClientMessage::StopSession { room_code } => {
            match ensure_member(state, &room_code, address).await {
                Ok(()) => ctl
                    .stop_simulation(&room_code, &format!("stopped by {address}"))
                    .await
                    .map(|room| ServerMessage::Room { room }),
                Err(e) => Err(e),
            }
        }

        ClientMessage::LeaveRoom { room_code } => ctl
            .leave(&room_code, address.clone())
            .await
            .map(|_| ServerMessage::Accepted { seq: request_seq }),

        ClientMessage::Subscribe { room_code } => {
            let subscribed = match ctl.get_room(&room_code).await {
                Ok(room) => match room.slot_of(address) {
                    Some(slot) => ctl.subscribe(&room_code).await.map(|rx| (slot, rx)),
                    None => Err(SessionError::NotInRoom(address.clone(), room_code.clone())),
                },
                Err(e) => Err(e),
            };
            match subscribed {
                Ok((slot, snapshots)) => {
                    out.send(ServerMessage::Subscribed {
                        room_code: room_code.clone(),
                        slot,
                    })
                    .await?;
                    forwarder.replace(spawn_forwarder(Arc::clone(out), snapshots));
                    tracing::info!(%room_code, %address, %slot, "push subscriber attached");
                    return Ok(Flow::Continue);
                }
                Err(e) => Err(e),
            }
        }

        ClientMessage::PublishInput { room_code, input } => {
            let outcome = ctl.submit_input(&room_code, address, input).await;
            tracing::trace!(%room_code, %address, seq = input.seq, ?outcome, "input");
            return Ok(Flow::Continue);
        }

        ClientMessage::GetOtherPlayers { room_code } => ctl
            .other_players(&room_code, address.clone())
            .await
            .map(|players| ServerMessage::OtherPlayers { room_code, players }),

        ClientMessage::PushSelfState { room_code, state } => ctl
            .push_self_state(&room_code, address.clone(), state)
            .await
            .map(|()| ServerMessage::Accepted { seq: request_seq }),

        ClientMessage::GetSnapshot { room_code } => ctl
            .snapshot(&room_code)
            .await
            .map(|snapshot| ServerMessage::Snapshot { snapshot }),

        ClientMessage::Heartbeat { client_time } => Ok(ServerMessage::HeartbeatAck {
            client_time,
            server_time: unix_millis(),
        }),

        ClientMessage::Disconnect { reason } => {
            tracing::info!(%address, %reason, "client disconnected");
            return Ok(Flow::Close);
        }
    };

    match reply {
        Ok(msg) => out.send(msg).await?,
        Err(e) => {
            tracing::debug!(%address, code = e.code(), error = %e, "request rejected");
            out.send_error(e.code(), &e.to_string()).await?;
        }
    }
    Ok(Flow::Continue)
}

/// Fails with `NotInRoom` unless `address` holds a slot in the room.
async fn ensure_member<M: MatchStore, C: Codec>(
    state: &ServerState<M, C>,
    room_code: &RoomCode,
    address: &PlayerAddress,
) -> Result<(), SessionError> {
    let room = state.controller.get_room(room_code).await?;
    match room.slot_of(address) {
        Some(_) => Ok(()),
        None => Err(SessionError::NotInRoom(address.clone(), room_code.clone())),
    }
}

/// Streams every newer snapshot to the connection until the session is
/// gone or a send fails. Skipped ticks are never replayed.
fn spawn_forwarder<C: Codec>(
    out: Arc<Outbox<C>>,
    mut snapshots: watch::Receiver<SharedSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = Arc::clone(&snapshots.borrow_and_update());
            if let Err(e) = out.send(ServerMessage::Snapshot { snapshot }).await {
                tracing::debug!(error = %e, "push forwarder stopped");
                return;
            }
        }
        tracing::debug!("session gone, push forwarder done");
    })
}
