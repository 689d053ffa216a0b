//! Protocol module - Defines the wire protocol between client and server
//!
//! Every movement travels in its own frame:
//! - 4 bytes magic ("PMUD")
//! - 4 bytes payload length (big-endian)
//! - JSON payload: `{"client_id": "...", "direction": "..."}`
//!
//! The server never replies.

mod codec;
mod message;

pub use codec::*;
pub use message::*;

/// Default port for the game server
pub const DEFAULT_PORT: u16 = 8080;

/// Default upper bound on a frame payload
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024;

/// Magic bytes for protocol identification
pub const MAGIC_BYTES: [u8; 4] = [0x50, 0x4D, 0x55, 0x44]; // "PMUD"
