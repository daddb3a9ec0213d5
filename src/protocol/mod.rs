//! Wire-level protocol: JSON-RPC message types and event-stream framing

pub mod frame;
pub mod types;

pub use frame::{Frame, FrameBuffer};
pub use types::*;
