pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod frame_reader;
pub mod framebuffer_iface;
pub mod harness;
pub mod heartbeat;
pub mod kernel_iface;
pub mod link;
pub mod queue;

pub use cli::Cli;
pub use dispatcher::{ChunkGrid, Dispatcher, DispatcherState, Policy};
pub use error::HostError;
pub use framebuffer_iface::{Framebuffer, MemoryFramebuffer};
pub use harness::Harness;
pub use heartbeat::HostHeartbeat;
pub use kernel_iface::{EscapeTimeKernel, Kernel};
pub use link::{Link, SerialLink};
pub use queue::BoundedQueue;
