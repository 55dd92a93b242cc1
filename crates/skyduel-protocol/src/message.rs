//! Messages and the envelope that carries them.
//!
//! Every frame on the wire is one [`Envelope`]. Clients send
//! [`ClientMessage`]s, the server answers with [`ServerMessage`]s. The same
//! vocabulary serves both delivery paths: a push connection subscribes and
//! receives a stream of snapshots, a poll connection sends
//! request/response pairs on an interval.

use serde::{Deserialize, Serialize};

use crate::{
    Field, GameMode, InputSample, PlayerAddress, PlayerPublicState, RoomCode,
    RoomSnapshot, SharedSnapshot, ShipStats, Slot,
};

/// Current protocol version. Handshakes with any other value are refused.
pub const PROTOCOL_VERSION: u32 = 1;

/// Delivery guarantee requested for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Channel {
    /// Requests, replies and errors.
    #[default]
    ReliableOrdered,
    /// Snapshots: a lost one is superseded by the next.
    Unreliable,
}

/// Client → server.
///
/// Internally tagged: `{ "type": "JoinRoom", "room_code": "123456", ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// First frame on every connection.
    Handshake {
        version: u32,
        address: PlayerAddress,
    },
    CreateRoom {
        mode: GameMode,
        ship: ShipStats,
    },
    JoinRoom {
        room_code: RoomCode,
        ship: ShipStats,
    },
    SetReady {
        room_code: RoomCode,
        ready: bool,
    },
    GetRoom {
        room_code: RoomCode,
    },
    /// Starts the simulation explicitly; the roster supplies the players.
    StartSession {
        room_code: RoomCode,
        #[serde(default)]
        field: Option<Field>,
    },
    StopSession {
        room_code: RoomCode,
    },
    LeaveRoom {
        room_code: RoomCode,
    },
    /// Push path: stream snapshots of this room to this connection.
    Subscribe {
        room_code: RoomCode,
    },
    /// Push path: fire-and-forget input.
    PublishInput {
        room_code: RoomCode,
        input: InputSample,
    },
    /// Poll path: latest public state of the other slot(s).
    GetOtherPlayers {
        room_code: RoomCode,
    },
    /// Poll path: report own state; each embedded input is applied like a
    /// `PublishInput`.
    PushSelfState {
        room_code: RoomCode,
        state: PlayerPublicState,
    },
    /// Poll path: the latest total snapshot.
    GetSnapshot {
        room_code: RoomCode,
    },
    Heartbeat {
        client_time: u64,
    },
    Disconnect {
        reason: String,
    },
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    HandshakeAck {
        server_time: u64,
    },
    RoomCreated {
        room: RoomSnapshot,
    },
    /// Current lobby view, sent in reply to join/ready/get/start/stop.
    Room {
        room: RoomSnapshot,
    },
    Subscribed {
        room_code: RoomCode,
        slot: Slot,
    },
    Snapshot {
        snapshot: SharedSnapshot,
    },
    OtherPlayers {
        room_code: RoomCode,
        players: Vec<PlayerPublicState>,
    },
    /// Acknowledges a request that has no other reply, echoing its
    /// envelope `seq`.
    Accepted {
        seq: u64,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },
    /// `code` follows HTTP conventions: 400 bad request, 403 not a member,
    /// 404 no such room, 409 full or already playing, 410 finished.
    Error {
        code: u16,
        message: String,
    },
}

/// What is inside an envelope.
///
/// Adjacently tagged: `{ "type": "Client", "data": { "type": "Heartbeat", ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Client(ClientMessage),
    Server(ServerMessage),
}

/// The top-level wire frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-connection, per-direction counter.
    pub seq: u64,
    /// Sender clock in milliseconds.
    pub timestamp: u64,
    #[serde(default)]
    pub channel: Channel,
    pub payload: Payload,
}

impl Envelope {
    pub fn client(seq: u64, timestamp: u64, msg: ClientMessage) -> Self {
        Self {
            seq,
            timestamp,
            channel: Channel::ReliableOrdered,
            payload: Payload::Client(msg),
        }
    }

    pub fn server(seq: u64, timestamp: u64, msg: ServerMessage) -> Self {
        let channel = match msg {
            ServerMessage::Snapshot { .. } => Channel::Unreliable,
            _ => Channel::ReliableOrdered,
        };
        Self {
            seq,
            timestamp,
            channel,
            payload: Payload::Server(msg),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
