//! Per-call bridge between the telephony leg and the upstream session.
//!
//! - [`telephony`]: media-stream wire messages
//! - [`session`]: per-call state and the mark queue
//! - [`inbound`] / [`outbound`]: audio relays in each direction
//! - [`interruption`]: barge-in handling
//! - [`lifecycle`]: the [`CallBridge`] state machine tying them together

pub mod inbound;
pub mod interruption;
pub mod lifecycle;
pub mod outbound;
pub mod session;
pub mod telephony;

pub use inbound::{InboundRelay, PendingAudioQueue, RelayError};
pub use interruption::{Interruption, InterruptionController, TurnState};
pub use lifecycle::{BridgeAction, BridgeOptions, CallBridge, LifecycleState};
pub use outbound::OutboundRelay;
pub use session::{CallSession, MarkQueue};
pub use telephony::{TelephonyEvent, TelephonyMessage};
