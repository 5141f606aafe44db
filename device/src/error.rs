/// Error kinds reachable on the device side (spec §7's table, minus
/// the host-only `WriteFailed`/`LinkDead` policy branches, which the
/// worker handles inline rather than surfacing as an error value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("queue full")]
    QueueFull,
    #[error("queue empty")]
    QueueEmpty,
    #[error("illegal state for command")]
    IllegalStateForCommand,
}
