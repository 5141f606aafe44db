use protocol::ProtocolError;

/// Host-side error kinds (spec §7). `UnknownType` and `BadChecksum`
/// never reach here — they're the frame reader's local-recovery cases
/// (resync, log-and-dispatch) — so this enum only carries the kinds
/// that propagate to the main loop.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("message queue is full")]
    QueueFull,
    #[error("message queue is empty")]
    QueueEmpty,
    #[error("link write failed: {0}")]
    WriteFailed(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("command illegal in current dispatcher state")]
    IllegalStateForCommand,
    #[error("no message received for {0} seconds, link declared dead")]
    LinkDead(u64),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
