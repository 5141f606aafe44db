//! Device-side (microcontroller) half of the Julia-set compute
//! protocol: the worker state machine, its byte-ring RX/TX queues, and
//! the `Link` trait its UART driver implements.
//!
//! This crate has no entry point of its own — the `#[no_main]`
//! firmware binary that claims interrupts and builds a concrete `Link`
//! is out of scope (spec §1 names OS-level serial configuration as an
//! external collaborator's concern); what lives here is the logic that
//! would run on top of it, and it is exercised under `std` in
//! `#[cfg(test)]`.
#![cfg_attr(not(test), no_std)]

pub mod error;
pub mod heartbeat;
pub mod link;
pub mod queue;
pub mod worker;

pub use error::WorkerError;
pub use heartbeat::DeviceHeartbeat;
pub use link::{Link, LinkError};
pub use queue::{ByteQueue, DEVICE_QUEUE_CAPACITY};
pub use worker::{Cursor, Worker, WorkerAction, WorkerState};
