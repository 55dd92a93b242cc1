//! Client side of a skyduel session.
//!
//! A [`ClientDriver`] runs the client's logic loop at a fixed period,
//! whether or not anything is rendering:
//!
//! ```text
//! Intent (UI) ─► InputSample ─► predict ─┬─► PushClient ─┐
//!                                        └─► PollClient ─┤ server
//!                                                        │
//! ClientView (UI) ◄─ Reconciler ◄─ FreshnessGate ◄─ Update ◄─┘
//! ```
//!
//! The push path ([`PushClient`]) is a subscribed connection streaming
//! snapshots; the poll path ([`PollClient`]) is an independent
//! connection doing request/response on an interval. Either one alone is
//! enough to play. Both feed one [`Update`] channel, and the
//! [`FreshnessGate`] keeps duplicates from being applied twice.
//!
//! When the server stops answering for a room, the driver switches to
//! [`AuthorityMode::ClientSimulated`] and runs a [`LocalSim`] for its own
//! ship until a fresh server snapshot arrives.

mod config;
mod driver;
mod error;
mod fresh;
mod link;
mod local;
mod poll;
mod push;
mod reconcile;
mod update;

pub use config::{ClientConfig, MAX_RECONNECT_BACKOFF};
pub use driver::{AuthorityMode, ClientDriver, DriverHandle, Intent};
pub use error::ClientError;
pub use fresh::FreshnessGate;
pub use link::Link;
pub use local::LocalSim;
pub use poll::PollClient;
pub use push::PushClient;
pub use reconcile::{ClientView, DEFAULT_THRESHOLD, ReconcileConfig, Reconciler, Reconciliation};
pub use update::{UPDATE_BUFFER, Update};
