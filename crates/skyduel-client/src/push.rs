//! Push path: one subscribed connection streaming snapshots.

use skyduel_protocol::{ClientMessage, InputSample, ServerMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::update::deliver;
use crate::{ClientConfig, ClientError, Link, Update};

/// Inputs waiting to go out. Older ones are worthless once a newer exists.
const INPUT_BUFFER: usize = 8;

/// Keeps a subscription alive and forwards every snapshot to the driver.
///
/// Dropped connections are redialed with exponential backoff, then
/// re-handshaken and resubscribed. Nothing missed while disconnected is
/// replayed: the first snapshot after resubscribing is total.
pub struct PushClient {
    inputs: mpsc::Sender<InputSample>,
    task: JoinHandle<()>,
}

enum Ended {
    /// The driver went away.
    Stopped,
    RoomGone,
}

impl PushClient {
    pub fn spawn(config: ClientConfig, updates: mpsc::Sender<Update>) -> Self {
        let (inputs, inputs_rx) = mpsc::channel(INPUT_BUFFER);
        let task = tokio::spawn(run(config, updates, inputs_rx));
        Self { inputs, task }
    }

    /// Queues `sample` for sending. Never waits; returns `false` if the
    /// queue is full or the task has stopped.
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

impl Drop for PushClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    config: ClientConfig,
    updates: mpsc::Sender<Update>,
    mut inputs: mpsc::Receiver<InputSample>,
) {
    let mut attempt: u32 = 0;
    loop {
        match subscribed(&config, &updates, &mut inputs, &mut attempt).await {
            Ok(Ended::Stopped) => break,
            Ok(Ended::RoomGone) => {
                info!(room_code = %config.room_code, "push path stopped: room gone");
                break;
            }
            Err(e) => warn!(room_code = %config.room_code, error = %e, attempt, "push link lost"),
        }
        let delay = config.backoff(attempt);
        attempt = attempt.saturating_add(1);
        debug!(?delay, "push reconnect scheduled");
        tokio::time::sleep(delay).await;
    }
}

/// One connection's lifetime: dial, handshake, subscribe, stream.
async fn subscribed(
    config: &ClientConfig,
    updates: &mpsc::Sender<Update>,
    inputs: &mut mpsc::Receiver<InputSample>,
    attempt: &mut u32,
) -> Result<Ended, ClientError> {
    let link = Link::connect(&config.url, config.address.clone(), config.request_timeout).await?;
    let room_code = config.room_code.clone();
    let slot = match link.subscribe(room_code.clone()).await {
        Ok(slot) => slot,
        Err(ClientError::Rejected { code, message }) if matches!(code, 404 | 410) => {
            deliver(updates, Update::RoomGone { code, message });
            return Ok(Ended::RoomGone);
        }
        Err(e) => return Err(e),
    };
    *attempt = 0;
    info!(%room_code, %slot, "push path subscribed");

    // Inputs queued while disconnected: only the newest still matters.
    let mut pending = None;
    while let Ok(sample) = inputs.try_recv() {
        pending = Some(sample);
    }
    if let Some(input) = pending {
        link.send(ClientMessage::PublishInput {
            room_code: room_code.clone(),
            input,
        })
        .await?;
    }

    loop {
        tokio::select! {
            msg = link.recv() => match msg? {
                ServerMessage::Snapshot { snapshot } => {
                    deliver(updates, Update::Snapshot(snapshot));
                }
                ServerMessage::Error { code, message } => {
                    debug!(code, %message, "push path error frame");
                }
                _ => {}
            },
            input = inputs.recv() => {
                let Some(input) = input else {
                    link.close().await.ok();
                    return Ok(Ended::Stopped);
                };
                link.send(ClientMessage::PublishInput {
                    room_code: room_code.clone(),
                    input,
                })
                .await?;
            }
        }
    }
}
