//! A handshaken connection to the server, with typed request helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use skyduel_protocol::{
    ClientMessage, Codec, Envelope, Field, GameMode, JsonCodec, PROTOCOL_VERSION, Payload,
    PlayerAddress, PlayerPublicState, RoomCode, RoomSnapshot, ServerMessage, SharedSnapshot,
    ShipStats, Slot, unix_millis,
};
use skyduel_transport::{Connection, WebSocketConnection};
use tracing::debug;

use crate::ClientError;

/// One connection, past its handshake.
///
/// Replies arrive in request order, so [`request`](Link::request) simply
/// reads the next server frame. A request that times out leaves its reply
/// in flight; callers drop the link after a [`ClientError::Timeout`].
pub struct Link<C: Codec = JsonCodec> {
    conn: WebSocketConnection,
    codec: C,
    seq: AtomicU64,
    timeout: Duration,
    address: PlayerAddress,
}

impl Link<JsonCodec> {
    /// Dials `url` and handshakes as `address`. `timeout` bounds the
    /// handshake and every later request.
    pub async fn connect(
        url: &str,
        address: PlayerAddress,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Self::connect_with(url, address, timeout, JsonCodec).await
    }
}

impl<C: Codec> Link<C> {
    pub async fn connect_with(
        url: &str,
        address: PlayerAddress,
        timeout: Duration,
        codec: C,
    ) -> Result<Self, ClientError> {
        let conn = tokio::time::timeout(timeout, WebSocketConnection::connect(url))
            .await
            .map_err(|_| ClientError::Timeout(timeout))??;
        let link = Self {
            conn,
            codec,
            seq: AtomicU64::new(0),
            timeout,
            address: address.clone(),
        };
        let reply = link
            .request(ClientMessage::Handshake {
                version: PROTOCOL_VERSION,
                address,
            })
            .await?;
        match reply {
            ServerMessage::HandshakeAck { server_time } => {
                debug!(address = %link.address, server_time, "handshake complete");
                Ok(link)
            }
            other => Err(unexpected("HandshakeAck", &other)),
        }
    }

    pub fn address(&self) -> &PlayerAddress {
        &self.address
    }

    /// Sends one message without waiting for a reply. Returns its `seq`.
    pub async fn send(&self, msg: ClientMessage) -> Result<u64, ClientError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let bytes = self
            .codec
            .encode(&Envelope::client(seq, unix_millis(), msg))?;
        self.conn.send(&bytes).await?;
        Ok(seq)
    }

    /// The next server message. Frames that fail to decode are skipped.
    pub async fn recv(&self) -> Result<ServerMessage, ClientError> {
        loop {
            let Some(bytes) = self.conn.recv().await? else {
                return Err(ClientError::Closed);
            };
            match self.codec.decode::<Envelope>(&bytes) {
                Ok(Envelope {
                    payload: Payload::Server(msg),
                    ..
                }) => return Ok(msg),
                Ok(_) => debug!("client payload from server ignored"),
                Err(e) => debug!(error = %e, "undecodable frame dropped"),
            }
        }
    }

    /// Sends `msg` and waits for its reply. An `Error` reply becomes
    /// [`ClientError::Rejected`].
    pub async fn request(&self, msg: ClientMessage) -> Result<ServerMessage, ClientError> {
        self.send(msg).await?;
        let reply = tokio::time::timeout(self.timeout, self.recv())
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        match reply {
            ServerMessage::Error { code, message } => Err(ClientError::Rejected { code, message }),
            other => Ok(other),
        }
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await?;
        Ok(())
    }

    // -- lobby --------------------------------------------------------

    pub async fn create_room(
        &self,
        mode: GameMode,
        ship: ShipStats,
    ) -> Result<RoomSnapshot, ClientError> {
        match self.request(ClientMessage::CreateRoom { mode, ship }).await? {
            ServerMessage::RoomCreated { room } => Ok(room),
            other => Err(unexpected("RoomCreated", &other)),
        }
    }

    pub async fn join_room(
        &self,
        room_code: RoomCode,
        ship: ShipStats,
    ) -> Result<RoomSnapshot, ClientError> {
        self.room_request(ClientMessage::JoinRoom { room_code, ship })
            .await
    }

    pub async fn set_ready(
        &self,
        room_code: RoomCode,
        ready: bool,
    ) -> Result<RoomSnapshot, ClientError> {
        self.room_request(ClientMessage::SetReady { room_code, ready })
            .await
    }

    pub async fn get_room(&self, room_code: RoomCode) -> Result<RoomSnapshot, ClientError> {
        self.room_request(ClientMessage::GetRoom { room_code }).await
    }

    pub async fn start_session(
        &self,
        room_code: RoomCode,
        field: Option<Field>,
    ) -> Result<RoomSnapshot, ClientError> {
        self.room_request(ClientMessage::StartSession { room_code, field })
            .await
    }

    pub async fn stop_session(&self, room_code: RoomCode) -> Result<RoomSnapshot, ClientError> {
        self.room_request(ClientMessage::StopSession { room_code })
            .await
    }

    pub async fn leave_room(&self, room_code: RoomCode) -> Result<(), ClientError> {
        self.accepted(ClientMessage::LeaveRoom { room_code }).await
    }

    async fn room_request(&self, msg: ClientMessage) -> Result<RoomSnapshot, ClientError> {
        match self.request(msg).await? {
            ServerMessage::Room { room } => Ok(room),
            other => Err(unexpected("Room", &other)),
        }
    }

    async fn accepted(&self, msg: ClientMessage) -> Result<(), ClientError> {
        match self.request(msg).await? {
            ServerMessage::Accepted { .. } => Ok(()),
            other => Err(unexpected("Accepted", &other)),
        }
    }

    // -- push path ----------------------------------------------------

    /// Starts the snapshot stream for `room_code` on this connection.
    pub async fn subscribe(&self, room_code: RoomCode) -> Result<Slot, ClientError> {
        match self.request(ClientMessage::Subscribe { room_code }).await? {
            ServerMessage::Subscribed { slot, .. } => Ok(slot),
            other => Err(unexpected("Subscribed", &other)),
        }
    }

    // -- poll path ----------------------------------------------------

    pub async fn get_snapshot(&self, room_code: RoomCode) -> Result<SharedSnapshot, ClientError> {
        match self.request(ClientMessage::GetSnapshot { room_code }).await? {
            ServerMessage::Snapshot { snapshot } => Ok(snapshot),
            other => Err(unexpected("Snapshot", &other)),
        }
    }

    pub async fn other_players(
        &self,
        room_code: RoomCode,
    ) -> Result<Vec<PlayerPublicState>, ClientError> {
        match self
            .request(ClientMessage::GetOtherPlayers { room_code })
            .await?
        {
            ServerMessage::OtherPlayers { players, .. } => Ok(players),
            other => Err(unexpected("OtherPlayers", &other)),
        }
    }

    pub async fn push_self_state(
        &self,
        room_code: RoomCode,
        state: PlayerPublicState,
    ) -> Result<(), ClientError> {
        self.accepted(ClientMessage::PushSelfState { room_code, state })
            .await
    }
}

fn unexpected(wanted: &str, got: &ServerMessage) -> ClientError {
    let got = match got {
        ServerMessage::HandshakeAck { .. } => "HandshakeAck",
        ServerMessage::RoomCreated { .. } => "RoomCreated",
        ServerMessage::Room { .. } => "Room",
        ServerMessage::Subscribed { .. } => "Subscribed",
        ServerMessage::Snapshot { .. } => "Snapshot",
        ServerMessage::OtherPlayers { .. } => "OtherPlayers",
        ServerMessage::Accepted { .. } => "Accepted",
        ServerMessage::HeartbeatAck { .. } => "HeartbeatAck",
        ServerMessage::Error { .. } => "Error",
    };
    ClientError::UnexpectedReply(format!("wanted {wanted}, got {got}"))
}
