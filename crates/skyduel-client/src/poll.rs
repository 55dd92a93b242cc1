//! Poll path: interval-driven request/response on its own connection.

use std::collections::VecDeque;

use skyduel_protocol::{InputSample, PlayerPublicState, SessionStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::update::deliver;
use crate::{ClientConfig, ClientError, Link, Update};

/// Inputs waiting for the next round.
const INPUT_BUFFER: usize = 32;

/// Most unacknowledged inputs carried by one report. Older ones are dropped
/// first.
const MAX_INPUT_BATCH: usize = 16;

/// Polls the server every `poll_interval`.
///
/// Each round reports the client's own state together with every input the
/// server has not acknowledged yet, then
/// fetches the latest snapshot. While the room is still waiting, or the
/// snapshot has not advanced, it also fetches the other players' reports.
/// Works with the push path disabled.
pub struct PollClient {
    self_state: watch::Sender<Option<PlayerPublicState>>,
    inputs: mpsc::Sender<InputSample>,
    task: JoinHandle<()>,
}

impl PollClient {
    pub fn spawn(config: ClientConfig, updates: mpsc::Sender<Update>) -> Self {
        let (self_state, rx) = watch::channel(None);
        let (inputs, inputs_rx) = mpsc::channel(INPUT_BUFFER);
        let task = tokio::spawn(run(config, updates, rx, inputs_rx));
        Self {
            self_state,
            inputs,
            task,
        }
    }

    /// Replaces the state sent on the next round.
    pub fn report(&self, state: PlayerPublicState) {
        self.self_state.send_replace(Some(state));
    }

    /// Queues `sample` for the next round. Never waits; returns `false` if
    /// the queue is full or the task has stopped.
    pub fn publish(&self, sample: InputSample) -> bool {
        self.inputs.try_send(sample).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for PollClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    config: ClientConfig,
    updates: mpsc::Sender<Update>,
    mut self_state: watch::Receiver<Option<PlayerPublicState>>,
    mut inputs: mpsc::Receiver<InputSample>,
) {
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut link: Option<Link> = None;
    let mut last_tick = None;
    // Sent with every report until one is accepted.
    let mut unacked = VecDeque::new();

    loop {
        interval.tick().await;
        if updates.is_closed() {
            break;
        }
        while let Ok(sample) = inputs.try_recv() {
            unacked.push_back(sample);
        }
        while unacked.len() > MAX_INPUT_BATCH {
            unacked.pop_front();
        }
        let current = match link.take() {
            Some(current) => current,
            None => {
                match Link::connect(&config.url, config.address.clone(), config.poll_timeout).await
                {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        debug!(error = %e, "poll connect failed");
                        continue;
                    }
                }
            }
        };

        let outgoing = Outgoing {
            state: &mut self_state,
            unacked: &mut unacked,
        };
        match round(&current, &config, outgoing, &updates, &mut last_tick).await {
            Ok(()) => link = Some(current),
            Err(ClientError::Rejected { code, message }) if matches!(code, 404 | 410) => {
                info!(room_code = %config.room_code, code, "poll path stopped: room gone");
                deliver(&updates, Update::RoomGone { code, message });
                break;
            }
            Err(e @ ClientError::Rejected { .. }) => {
                debug!(error = %e, "poll request rejected");
                link = Some(current);
            }
            // Timed-out replies may still arrive, so the link is dropped and
            // redialed on the next round.
            Err(e) => debug!(error = %e, "poll round failed"),
        }
    }
}

/// What a round reports.
struct Outgoing<'a> {
    state: &'a mut watch::Receiver<Option<PlayerPublicState>>,
    unacked: &'a mut VecDeque<InputSample>,
}

async fn round(
    link: &Link,
    config: &ClientConfig,
    outgoing: Outgoing<'_>,
    updates: &mpsc::Sender<Update>,
    last_tick: &mut Option<u64>,
) -> Result<(), ClientError> {
    let room_code = &config.room_code;
    let state = outgoing.state.borrow_and_update().clone();
    if let Some(mut state) = state {
        state.inputs = outgoing.unacked.iter().copied().collect();
        link.push_self_state(room_code.clone(), state).await?;
        outgoing.unacked.clear();
    }

    let snapshot = link.get_snapshot(room_code.clone()).await?;
    // Not advanced since last round: ask for the peers' own reports.
    let stale = last_tick.is_some_and(|last| snapshot.tick <= last);
    let wants_peers = stale || snapshot.status == SessionStatus::Waiting;
    *last_tick = Some(snapshot.tick);
    deliver(updates, Update::Snapshot(snapshot));
    if wants_peers {
        let peers = link.other_players(room_code.clone()).await?;
        if !peers.is_empty() {
            deliver(updates, Update::Peers(peers));
        }
    }
    Ok(())
}
