//! What the push and poll tasks hand to the driver.

use skyduel_protocol::{PlayerPublicState, SharedSnapshot};
use tokio::sync::mpsc;
use tracing::trace;

/// Capacity of the channel from the transports to the driver.
pub const UPDATE_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub enum Update {
    Snapshot(SharedSnapshot),
    /// Poll-path reports about other slots.
    Peers(Vec<PlayerPublicState>),
    /// The server answered 404 or 410 for the room.
    RoomGone { code: u16, message: String },
}

/// Hands `update` to the driver without waiting. A full channel drops it:
/// the next snapshot supersedes it anyway.
pub(crate) fn deliver(updates: &mpsc::Sender<Update>, update: Update) -> bool {
    match updates.try_send(update) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            trace!("driver busy, update dropped");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}
