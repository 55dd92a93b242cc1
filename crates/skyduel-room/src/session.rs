//! Session actor: an isolated Tokio task that owns one room.
//!
//! The actor owns the roster, the lifecycle status, the poll board and,
//! while playing, the [`World`] and its tick scheduler. The outside world
//! talks to it through a [`SessionHandle`]: lifecycle operations are
//! commands over a bounded channel with oneshot replies, input goes
//! straight into the shared [`InputCells`], and snapshots come out of a
//! `watch` cell that only the actor writes.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use skyduel_protocol::{
    Authority, Field, GameMode, InputSample, MatchRecord, PlayerAddress, PlayerPublicState,
    RoomCode, RoomSnapshot, SessionStatus, SharedSnapshot, Slot, SlotInfo, Snapshot,
    unix_millis,
};
use skyduel_sim::{SimConfig, World};
use skyduel_tick::{Budget, TickInfo, TickScheduler};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::board::PollBoard;
use crate::{InputCells, InputOutcome, SessionConfig, SessionError};

/// Generation counter, unique per spawned session.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Sent by an actor as it exits so the store can drop its entry.
#[derive(Debug)]
pub(crate) struct Reaped {
    pub(crate) room_code: RoomCode,
    pub(crate) generation: u64,
}

/// What a successful leave did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// The slot was freed (or, mid-game, the player simply went away).
    Left,
    /// The host left a waiting room; the session is closing.
    Closed,
}

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Commands sent to a session actor.
pub(crate) enum SessionCommand {
    Join {
        guest: SlotInfo,
        reply: Reply<RoomSnapshot>,
    },
    SetReady {
        address: PlayerAddress,
        ready: bool,
        reply: Reply<RoomSnapshot>,
    },
    Start {
        field: Option<Field>,
        reply: Reply<RoomSnapshot>,
    },
    Stop {
        reason: String,
        reply: Reply<RoomSnapshot>,
    },
    Leave {
        address: PlayerAddress,
        reply: Reply<Departure>,
    },
    GetRoom {
        reply: Reply<RoomSnapshot>,
    },
    PushSelfState {
        address: PlayerAddress,
        state: PlayerPublicState,
        reply: Reply<()>,
    },
    OtherPlayers {
        address: PlayerAddress,
        reply: Reply<Vec<PlayerPublicState>>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    room_code: RoomCode,
    generation: u64,
    sender: mpsc::Sender<SessionCommand>,
    inputs: Arc<InputCells>,
    snapshots: watch::Receiver<SharedSnapshot>,
}

impl SessionHandle {
    pub fn room_code(&self) -> &RoomCode {
        &self.room_code
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> SessionError {
        SessionError::Unavailable(self.room_code.clone())
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    pub async fn join(&self, guest: SlotInfo) -> Result<RoomSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Join { guest, reply })
            .await
    }

    pub async fn set_ready(
        &self,
        address: PlayerAddress,
        ready: bool,
    ) -> Result<RoomSnapshot, SessionError> {
        self.request(|reply| SessionCommand::SetReady {
            address,
            ready,
            reply,
        })
        .await
    }

    pub async fn start(&self, field: Option<Field>) -> Result<RoomSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Start { field, reply })
            .await
    }

    pub async fn stop(&self, reason: impl Into<String>) -> Result<RoomSnapshot, SessionError> {
        let reason = reason.into();
        self.request(|reply| SessionCommand::Stop { reason, reply })
            .await
    }

    pub async fn leave(&self, address: PlayerAddress) -> Result<Departure, SessionError> {
        self.request(|reply| SessionCommand::Leave { address, reply })
            .await
    }

    pub async fn room(&self) -> Result<RoomSnapshot, SessionError> {
        self.request(|reply| SessionCommand::GetRoom { reply }).await
    }

    pub async fn push_self_state(
        &self,
        address: PlayerAddress,
        state: PlayerPublicState,
    ) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::PushSelfState {
            address,
            state,
            reply,
        })
        .await
    }

    pub async fn other_players(
        &self,
        address: PlayerAddress,
    ) -> Result<Vec<PlayerPublicState>, SessionError> {
        self.request(|reply| SessionCommand::OtherPlayers { address, reply })
            .await
    }

    /// Tells the actor to stop. Pending commands behind this one fail
    /// with [`SessionError::Unavailable`].
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }

    /// Writes a sample into `slot`'s input cell. Never waits on the actor.
    pub fn submit_input(&self, slot: Slot, sample: InputSample) -> InputOutcome {
        self.inputs.submit(slot, sample)
    }

    /// Like [`submit_input`](Self::submit_input), resolving the slot from
    /// the sender's address.
    pub fn submit_from(&self, address: &PlayerAddress, sample: InputSample) -> InputOutcome {
        self.inputs.submit_from(address, sample)
    }

    /// The slot `address` holds, without asking the actor.
    pub fn slot_of(&self, address: &PlayerAddress) -> Option<Slot> {
        self.inputs.slot_of(address)
    }

    /// A receiver that sees every snapshot the actor publishes from now
    /// on. Intermediate snapshots may be skipped; ticks never go back.
    pub fn subscribe(&self) -> watch::Receiver<SharedSnapshot> {
        let mut rx = self.snapshots.clone();
        rx.mark_changed();
        rx
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> SharedSnapshot {
        self.snapshots.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct SessionActor {
    room_code: RoomCode,
    generation: u64,
    mode: GameMode,
    status: SessionStatus,
    host: SlotInfo,
    guest: Option<SlotInfo>,
    ready: [bool; 2],
    created_at: u64,
    config: SessionConfig,
    world: Option<World>,
    scheduler: Option<TickScheduler>,
    board: PollBoard,
    inputs: Arc<InputCells>,
    snapshots: watch::Sender<SharedSnapshot>,
    receiver: mpsc::Receiver<SessionCommand>,
    records: mpsc::UnboundedSender<MatchRecord>,
    reaper: mpsc::UnboundedSender<Reaped>,
    /// Idle timeout while waiting, end of grace once finished.
    deadline: Option<Instant>,
}

async fn next_tick(scheduler: Option<&mut TickScheduler>) -> TickInfo {
    match scheduler {
        Some(scheduler) => scheduler.wait_for_tick().await,
        None => std::future::pending().await,
    }
}

async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn lobby_snapshot(room_code: RoomCode, field: Field) -> Snapshot {
    Snapshot {
        room_code,
        tick: 0,
        time_ms: 0,
        status: SessionStatus::Waiting,
        authority: Authority::Server,
        field,
        players: [None, None],
        enemies: Vec::new(),
        projectiles: Vec::new(),
        enemy_bullets: Vec::new(),
        power_ups: Vec::new(),
        coins: Vec::new(),
        lasers: Vec::new(),
    }
}

impl SessionActor {
    async fn run(mut self) {
        info!(room_code = %self.room_code, mode = ?self.mode, "session actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle(cmd).is_break() {
                        break;
                    }
                }
                info = next_tick(self.scheduler.as_mut()) => self.on_tick(info),
                _ = expiry(self.deadline) => {
                    info!(room_code = %self.room_code, status = ?self.status, "session expired");
                    break;
                }
            }
        }

        self.inputs.close();
        let _ = self.reaper.send(Reaped {
            room_code: self.room_code.clone(),
            generation: self.generation,
        });
        info!(room_code = %self.room_code, "session actor stopped");
    }

    fn handle(&mut self, cmd: SessionCommand) -> ControlFlow<()> {
        if self.status == SessionStatus::Waiting {
            self.deadline = Some(Instant::now() + self.config.idle_timeout);
        }
        match cmd {
            SessionCommand::Join { guest, reply } => {
                let _ = reply.send(self.join(guest));
            }
            SessionCommand::SetReady {
                address,
                ready,
                reply,
            } => {
                let _ = reply.send(self.set_ready(&address, ready));
            }
            SessionCommand::Start { field, reply } => {
                let _ = reply.send(self.start(field));
            }
            SessionCommand::Stop { reason, reply } => {
                let _ = reply.send(self.stop(&reason));
            }
            SessionCommand::Leave { address, reply } => {
                let result = self.leave(&address);
                let closing = matches!(result, Ok(Departure::Closed));
                let _ = reply.send(result);
                if closing {
                    return ControlFlow::Break(());
                }
            }
            SessionCommand::GetRoom { reply } => {
                let _ = reply.send(Ok(self.room()));
            }
            SessionCommand::PushSelfState {
                address,
                state,
                reply,
            } => {
                let _ = reply.send(self.push_self_state(&address, state));
            }
            SessionCommand::OtherPlayers { address, reply } => {
                let _ = reply.send(self.other_players(&address));
            }
            SessionCommand::Shutdown => {
                info!(room_code = %self.room_code, "session shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn room(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_code: self.room_code.clone(),
            mode: self.mode,
            status: self.status,
            host: self.host.clone(),
            guest: self.guest.clone(),
            created_at: self.created_at,
            ready: self.ready,
            tick: self.snapshots.borrow().tick,
        }
    }

    fn slot_of(&self, address: &PlayerAddress) -> Result<Slot, SessionError> {
        if &self.host.address == address {
            Ok(Slot::Host)
        } else if self.guest.as_ref().is_some_and(|g| &g.address == address) {
            Ok(Slot::Guest)
        } else {
            Err(SessionError::NotInRoom(
                address.clone(),
                self.room_code.clone(),
            ))
        }
    }

    fn publish(&self, snapshot: Snapshot) {
        self.snapshots.send_replace(Arc::new(snapshot));
    }

    // -- lobby ---------------------------------------------------------------

    fn join(&mut self, guest: SlotInfo) -> Result<RoomSnapshot, SessionError> {
        let code = &self.room_code;
        if guest.address == self.host.address {
            return Err(SessionError::HostCannotJoin(code.clone()));
        }
        if !self.mode.accepts_guest() {
            return Err(SessionError::WrongMode(code.clone(), self.mode));
        }
        if self
            .guest
            .as_ref()
            .is_some_and(|current| current.address == guest.address)
        {
            return Ok(self.room());
        }
        match self.status {
            SessionStatus::Waiting => {}
            SessionStatus::Playing => return Err(SessionError::AlreadyPlaying(code.clone())),
            SessionStatus::Finished => return Err(SessionError::Finished(code.clone())),
        }
        if self.guest.is_some() {
            return Err(SessionError::RoomFull(code.clone()));
        }

        info!(room_code = %code, address = %guest.address, "guest joined");
        self.inputs
            .set_owner(Slot::Guest, Some(guest.address.clone()));
        self.guest = Some(guest);
        self.ready[Slot::Guest.index()] = false;
        Ok(self.room())
    }

    fn all_ready(&self) -> bool {
        let host_ready = self.ready[Slot::Host.index()];
        match self.mode.required_slots() {
            1 => host_ready,
            _ => host_ready && self.guest.is_some() && self.ready[Slot::Guest.index()],
        }
    }

    fn set_ready(
        &mut self,
        address: &PlayerAddress,
        ready: bool,
    ) -> Result<RoomSnapshot, SessionError> {
        let slot = self.slot_of(address)?;
        if self.status != SessionStatus::Waiting {
            return Ok(self.room());
        }
        if self.ready[slot.index()] != ready {
            self.ready[slot.index()] = ready;
            info!(room_code = %self.room_code, %slot, ready, "ready changed");
        }
        if self.mode != GameMode::Solo && self.all_ready() {
            self.start(None)?;
        }
        Ok(self.room())
    }

    fn leave(&mut self, address: &PlayerAddress) -> Result<Departure, SessionError> {
        let slot = self.slot_of(address)?;
        if self.status != SessionStatus::Waiting {
            info!(room_code = %self.room_code, %slot, status = ?self.status, "player left");
            return Ok(Departure::Left);
        }
        match slot {
            Slot::Host => {
                info!(room_code = %self.room_code, "host left, closing room");
                Ok(Departure::Closed)
            }
            Slot::Guest => {
                info!(room_code = %self.room_code, %address, "guest left");
                self.guest = None;
                self.ready[Slot::Guest.index()] = false;
                self.inputs.set_owner(Slot::Guest, None);
                self.board.clear(Slot::Guest);
                Ok(Departure::Left)
            }
        }
    }

    // -- lifecycle -----------------------------------------------------------

    fn start(&mut self, field: Option<Field>) -> Result<RoomSnapshot, SessionError> {
        match self.status {
            SessionStatus::Waiting => {}
            SessionStatus::Playing => return Ok(self.room()),
            SessionStatus::Finished => {
                return Err(SessionError::Finished(self.room_code.clone()));
            }
        }

        let sim = SimConfig {
            field: field.unwrap_or(self.config.field),
            tick_ms: self.config.tick_ms(),
            seed: self.config.seed.unwrap_or_else(rand::random),
            mode: self.mode,
            tuning: self.config.tuning.clone(),
        };
        let seed = sim.seed;
        let world = World::new(
            self.room_code.clone(),
            sim,
            [Some(self.host.clone()), self.guest.clone()],
        )?;

        self.publish(world.snapshot());
        self.world = Some(world);
        self.inputs.open();
        self.scheduler = Some(TickScheduler::new(self.config.tick_config()));
        self.status = SessionStatus::Playing;
        self.deadline = None;
        info!(
            room_code = %self.room_code,
            mode = ?self.mode,
            players = 1 + usize::from(self.guest.is_some()),
            seed,
            "session started"
        );
        Ok(self.room())
    }

    fn stop(&mut self, reason: &str) -> Result<RoomSnapshot, SessionError> {
        match self.status {
            SessionStatus::Waiting => Err(SessionError::NotPlaying(self.room_code.clone())),
            SessionStatus::Finished => Ok(self.room()),
            SessionStatus::Playing => {
                self.finish(reason);
                Ok(self.room())
            }
        }
    }

    fn on_tick(&mut self, info: TickInfo) {
        let Some(world) = self.world.as_mut() else {
            return;
        };
        let inputs = self.inputs.take_all();
        let snapshot = world.step(inputs);
        let finished = snapshot.status == SessionStatus::Finished;
        trace!(
            room_code = %self.room_code,
            tick = snapshot.tick,
            scheduler_tick = info.tick,
            "session ticked"
        );
        self.publish(snapshot);
        if let Some(scheduler) = self.scheduler.as_mut() {
            match scheduler.record_tick_end() {
                Budget::Within => {}
                Budget::Warning => warn!(
                    room_code = %self.room_code,
                    tick = info.tick,
                    utilization = scheduler.metrics().budget_utilization,
                    "tick approaching budget"
                ),
                Budget::Critical => warn!(
                    room_code = %self.room_code,
                    tick = info.tick,
                    utilization = scheduler.metrics().budget_utilization,
                    "tick exceeded budget"
                ),
            }
        }
        if finished {
            self.finish("all players down");
        }
    }

    /// `playing → finished`: freezes the world, publishes the final
    /// snapshot, queues match records and starts the grace period.
    fn finish(&mut self, reason: &str) {
        if self.status != SessionStatus::Playing {
            return;
        }
        let Some(mut world) = self.world.take() else {
            return;
        };
        world.finish();
        let snapshot = world.snapshot();
        self.status = SessionStatus::Finished;
        self.scheduler = None;
        self.inputs.close();
        self.deadline = Some(Instant::now() + self.config.finish_grace);

        for player in snapshot.players.iter().flatten() {
            let record = MatchRecord {
                room_code: self.room_code.clone(),
                mode: self.mode,
                address: player.address.clone(),
                score: player.score,
                coins: player.coins,
                duration_ms: snapshot.time_ms,
            };
            if self.records.send(record).is_err() {
                warn!(room_code = %self.room_code, address = %player.address, "match persister gone, record dropped");
            }
        }
        info!(
            room_code = %self.room_code,
            tick = snapshot.tick,
            total_score = snapshot.total_score(),
            reason,
            "session finished"
        );
        self.publish(snapshot);
    }

    // -- poll path -----------------------------------------------------------

    fn push_self_state(
        &mut self,
        address: &PlayerAddress,
        mut state: PlayerPublicState,
    ) -> Result<(), SessionError> {
        let slot = self.slot_of(address)?;
        if self.status == SessionStatus::Finished {
            return Err(SessionError::Finished(self.room_code.clone()));
        }
        state.slot = slot;
        state.address = address.clone();
        if !state.inputs.is_empty() {
            let accepted = self.inputs.submit_batch(slot, &state.inputs);
            debug!(
                room_code = %self.room_code,
                %slot,
                batch = state.inputs.len(),
                accepted,
                "poll inputs"
            );
            state.inputs.clear();
        }
        self.board.post(state);
        Ok(())
    }

    /// Server-derived state once a world exists, self-reports before.
    fn other_players(
        &self,
        address: &PlayerAddress,
    ) -> Result<Vec<PlayerPublicState>, SessionError> {
        let slot = self.slot_of(address)?;
        let latest = self.snapshots.borrow().clone();
        if let Some(other) = latest.player(slot.other()) {
            return Ok(vec![PlayerPublicState::from_player(
                other,
                latest.tick,
                unix_millis(),
            )]);
        }
        Ok(self.board.others(slot))
    }
}

/// Spawns a new session actor in `waiting` and returns its handle.
pub(crate) fn spawn_session(
    room_code: RoomCode,
    mode: GameMode,
    host: SlotInfo,
    config: &SessionConfig,
    records: mpsc::UnboundedSender<MatchRecord>,
    reaper: mpsc::UnboundedSender<Reaped>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    let (snapshots_tx, snapshots_rx) =
        watch::channel(Arc::new(lobby_snapshot(room_code.clone(), config.field)));
    let inputs = Arc::new(InputCells::with_backlog(config.input_backlog));
    inputs.set_owner(Slot::Host, Some(host.address.clone()));
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);

    let actor = SessionActor {
        room_code: room_code.clone(),
        generation,
        mode,
        status: SessionStatus::Waiting,
        host,
        guest: None,
        ready: [false, false],
        created_at: unix_millis(),
        config: config.clone(),
        world: None,
        scheduler: None,
        board: PollBoard::default(),
        inputs: inputs.clone(),
        snapshots: snapshots_tx,
        receiver: rx,
        records,
        reaper,
        deadline: Some(Instant::now() + config.idle_timeout),
    };
    tokio::spawn(actor.run());

    SessionHandle {
        room_code,
        generation,
        sender: tx,
        inputs,
        snapshots: snapshots_rx,
    }
}
