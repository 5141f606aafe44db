//! Wire protocol shared by the host dispatcher and the device worker.
//!
//! This crate owns the one thing both sides must agree on byte-for-byte:
//! the framed message format of spec §3/§6 (`[type][payload][checksum]`,
//! little-endian integers, additive modulo-256 checksum) and the chunk
//! and global-settings shapes carried inside it, plus the byte-level
//! frame reader (spec §4.3) that both the host and the device run over
//! their respective links. It has no actual I/O, no threads, and no
//! dispatcher/worker FSM — those live in `host` and `device`.
#![cfg_attr(not(test), no_std)]

pub mod chunk;
pub mod error;
pub mod frame_reader;
pub mod heartbeat;
pub mod message;

pub use chunk::{is_allowed_baud, ChunkSpec, Settings, ALLOWED_BAUD_RATES, DEFAULT_BAUD};
pub use error::ProtocolError;
pub use frame_reader::{FrameOutcome, FrameReader};
pub use heartbeat::HeartbeatTracker;
pub use message::{checksum, checksum_ok, Message, MessageType, MAX_MESSAGE_SIZE};
