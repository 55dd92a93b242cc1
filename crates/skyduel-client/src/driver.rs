//! The client's fixed-period logic loop.

use std::time::Duration;

use skyduel_protocol::{
    InputSample, PlayerPublicState, SessionStatus, ShipStats, Slot, SlotInfo, Snapshot,
    unix_millis,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::update::UPDATE_BUFFER;
use crate::{
    ClientConfig, ClientView, FreshnessGate, LocalSim, PollClient, PushClient, ReconcileConfig,
    Reconciler, Update,
};

/// Who holds scoring truth for the client right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityMode {
    /// Every slot's values come from the latest server snapshot.
    ServerAuthoritative,
    /// The client simulates its own slot; the remote slot comes from peer
    /// reports.
    ClientSimulated,
}

/// What the player is pressing, as set by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Intent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub fire: bool,
}

impl Intent {
    pub fn sample(&self, seq: u64, client_ts: u64) -> InputSample {
        InputSample {
            seq,
            client_ts,
            up: self.up,
            down: self.down,
            left: self.left,
            right: self.right,
            fire: self.fire,
        }
    }
}

enum DriverCommand {
    FallBackToLocal,
    Shutdown,
}

/// The UI side of a driver.
pub struct DriverHandle {
    intent: watch::Sender<Intent>,
    view: watch::Receiver<ClientView>,
    mode: watch::Receiver<AuthorityMode>,
    commands: mpsc::Sender<DriverCommand>,
}

impl DriverHandle {
    pub fn set_intent(&self, intent: Intent) {
        self.intent.send_replace(intent);
    }

    /// A receiver that sees every published view. Renderers may stop
    /// reading at any time without slowing the driver.
    pub fn view(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }

    pub fn latest_view(&self) -> ClientView {
        self.view.borrow().clone()
    }

    pub fn mode(&self) -> AuthorityMode {
        *self.mode.borrow()
    }

    pub fn watch_mode(&self) -> watch::Receiver<AuthorityMode> {
        self.mode.clone()
    }

    /// Asks the driver to simulate locally from its next tick.
    pub async fn fall_back_to_local(&self) {
        self.commands.send(DriverCommand::FallBackToLocal).await.ok();
    }

    pub async fn shutdown(&self) {
        self.commands.send(DriverCommand::Shutdown).await.ok();
    }
}

/// Runs prediction, transport fan-out and reconciliation on a fixed period.
///
/// Per tick: read the intent, build the next [`InputSample`], predict (or
/// simulate locally), hand the sample to the transports, fold in whatever
/// the transports delivered, publish the view.
pub struct ClientDriver {
    config: ClientConfig,
    ship: ShipStats,
    reconciler: Reconciler,
    gate: FreshnessGate,
    mode: AuthorityMode,
    local: Option<LocalSim>,
    seq: u64,
    last_fresh: Instant,
    push: Option<PushClient>,
    poll: Option<PollClient>,
    updates_tx: mpsc::Sender<Update>,
    updates: mpsc::Receiver<Update>,
    intent: watch::Receiver<Intent>,
    view: watch::Sender<ClientView>,
    mode_tx: watch::Sender<AuthorityMode>,
    commands: mpsc::Receiver<DriverCommand>,
}

impl ClientDriver {
    /// Builds a driver for the player seated at `slot`. No connection is
    /// made until [`connect`](Self::connect).
    pub fn new(config: ClientConfig, slot: Slot, ship: ShipStats) -> (Self, DriverHandle) {
        let reconciler = Reconciler::new(
            slot,
            ReconcileConfig {
                threshold: config.reconcile_threshold,
            },
        );
        let (updates_tx, updates) = mpsc::channel(UPDATE_BUFFER);
        let (intent_tx, intent) = watch::channel(Intent::default());
        let (view, view_rx) = watch::channel(reconciler.view().clone());
        let (mode_tx, mode_rx) = watch::channel(AuthorityMode::ServerAuthoritative);
        let (commands_tx, commands) = mpsc::channel(8);

        let driver = Self {
            config,
            ship,
            reconciler,
            gate: FreshnessGate::new(),
            mode: AuthorityMode::ServerAuthoritative,
            local: None,
            seq: 0,
            last_fresh: Instant::now(),
            push: None,
            poll: None,
            updates_tx,
            updates,
            intent,
            view,
            mode_tx,
            commands,
        };
        let handle = DriverHandle {
            intent: intent_tx,
            view: view_rx,
            mode: mode_rx,
            commands: commands_tx,
        };
        (driver, handle)
    }

    /// Builds, connects and spawns a driver.
    pub fn spawn(config: ClientConfig, slot: Slot, ship: ShipStats) -> (DriverHandle, JoinHandle<()>) {
        let (mut driver, handle) = Self::new(config, slot, ship);
        driver.connect();
        (handle, tokio::spawn(driver.run()))
    }

    /// Starts the enabled transport paths.
    pub fn connect(&mut self) {
        if self.config.push_enabled && self.push.is_none() {
            self.push = Some(PushClient::spawn(self.config.clone(), self.updates_tx.clone()));
        }
        if self.config.poll_enabled && self.poll.is_none() {
            self.poll = Some(PollClient::spawn(self.config.clone(), self.updates_tx.clone()));
        }
        info!(
            room_code = %self.config.room_code,
            push = self.push.is_some(),
            poll = self.poll.is_some(),
            "client connecting"
        );
    }

    /// A sender feeding this driver, for transports other than the
    /// built-in push and poll clients.
    pub fn updates_sender(&self) -> mpsc::Sender<Update> {
        self.updates_tx.clone()
    }

    pub fn mode(&self) -> AuthorityMode {
        self.mode
    }

    pub fn view(&self) -> &ClientView {
        self.reconciler.view()
    }

    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.config.logic_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => self.step(Instant::now()),
                cmd = self.commands.recv() => match cmd {
                    Some(DriverCommand::FallBackToLocal) => self.fall_back_to_local("requested"),
                    Some(DriverCommand::Shutdown) | None => break,
                },
            }
        }
        if let Some(push) = self.push.take() {
            push.shutdown();
        }
        if let Some(poll) = self.poll.take() {
            poll.shutdown();
        }
        info!(room_code = %self.config.room_code, "client driver stopped");
    }

    /// One logic tick.
    pub fn step(&mut self, now: Instant) {
        self.seq += 1;
        let sample = self.intent.borrow().sample(self.seq, unix_millis());

        match self.mode {
            AuthorityMode::ServerAuthoritative => {
                let field = self.reconciler.view().field;
                self.reconciler.predict(&sample, &self.ship, field);
            }
            AuthorityMode::ClientSimulated => {
                if let Some(local) = self.local.as_mut() {
                    let snapshot = local.step(sample);
                    self.reconciler.apply_local(&snapshot);
                }
            }
        }

        self.send_input(sample);
        self.drain_updates(now);

        if self.mode == AuthorityMode::ServerAuthoritative
            && self.reconciler.view().status == SessionStatus::Playing
            && now.saturating_duration_since(self.last_fresh) > self.config.authority_timeout
        {
            self.fall_back_to_local("no fresh server snapshot");
        }

        self.view.send_replace(self.reconciler.view().clone());
    }

    fn send_input(&mut self, sample: InputSample) {
        if let Some(push) = &self.push {
            if !push.publish(sample) {
                trace!(seq = sample.seq, "push queue full, input dropped");
            }
        }
        if let Some(poll) = &self.poll {
            let view = self.reconciler.view();
            if let Some(local) = view.local() {
                // Reported on the server's tick axis, the last one applied.
                let mut state = PlayerPublicState::from_player(local, view.tick, unix_millis());
                state.address.clone_from(&self.config.address);
                poll.report(state);
                if !poll.publish(sample) {
                    trace!(seq = sample.seq, "poll queue full, input dropped");
                }
            }
        }
    }

    fn drain_updates(&mut self, now: Instant) {
        while let Ok(update) = self.updates.try_recv() {
            match update {
                Update::Snapshot(snapshot) => self.on_snapshot(&snapshot, now),
                Update::Peers(peers) => {
                    for peer in &peers {
                        if self.gate.admit_peer(peer) {
                            self.reconciler.apply_peer(peer);
                        }
                    }
                }
                Update::RoomGone { code, message } => {
                    debug!(code, %message, "server dropped the room");
                    if self.reconciler.view().status != SessionStatus::Finished {
                        self.fall_back_to_local("room gone");
                    }
                }
            }
        }
    }

    fn on_snapshot(&mut self, snapshot: &Snapshot, now: Instant) {
        if !self.gate.admit_snapshot(snapshot) {
            trace!(tick = snapshot.tick, "stale snapshot ignored");
            return;
        }
        self.last_fresh = now;
        match self.mode {
            AuthorityMode::ServerAuthoritative => {
                self.reconciler.apply_snapshot(snapshot);
            }
            AuthorityMode::ClientSimulated => {
                // Local counts are discarded, never merged.
                self.local = None;
                self.reconciler.resync(snapshot);
                self.set_mode(AuthorityMode::ServerAuthoritative);
                info!(tick = snapshot.tick, "server authority restored");
            }
        }
    }

    /// Switches to local simulation of the own slot, continuing from the
    /// current view. Idempotent.
    pub fn fall_back_to_local(&mut self, reason: &str) {
        if self.mode == AuthorityMode::ClientSimulated {
            return;
        }
        let view = self.reconciler.view();
        let room_code = view
            .room_code
            .clone()
            .unwrap_or_else(|| self.config.room_code.clone());
        let period = self.config.logic_period.max(Duration::from_millis(1));
        let local = match view.local() {
            Some(state) => LocalSim::handover(room_code, state, view.field, period),
            None => LocalSim::new(
                room_code,
                view.local_slot,
                SlotInfo {
                    address: self.config.address.clone(),
                    ship: self.ship,
                },
                view.field,
                period,
            ),
        };
        match local {
            Ok(local) => {
                self.local = Some(local);
                self.set_mode(AuthorityMode::ClientSimulated);
                info!(room_code = %self.config.room_code, reason, "simulating locally");
            }
            Err(e) => warn!(error = %e, "local simulation unavailable"),
        }
    }

    fn set_mode(&mut self, mode: AuthorityMode) {
        self.mode = mode;
        self.mode_tx.send_replace(mode);
    }
}
