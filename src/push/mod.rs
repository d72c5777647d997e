//! Push feed
//!
//! The single persistent low-latency connection and its capacity-bounded
//! subscription set.

mod manager;
mod socket;
mod types;

pub use manager::{plan_rebalance, PushConfig, PushFeedManager};
pub use socket::{Backoff, PushSocket, SocketConfig};
pub use types::{
    parse_control_ack, parse_tick_frame, ConnState, ControlAck, ControlMessage, SocketEvent,
    TICK_FIELD_COUNT,
};
