/// Codec-origin error kinds (spec §7). Frame-level recovery (resync,
/// drop-on-full) happens above this layer; these are the failures the
/// codec itself can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// `buf[0]` is not one of the defined type tags.
    #[error("unknown message type tag {0}")]
    UnknownType(u8),
    /// Caller supplied fewer bytes than `message_size(type)` requires.
    #[error("buffer too short: need {need} bytes, have {have}")]
    ShortBuffer { need: usize, have: usize },
    /// Recomputed checksum does not match the trailing byte.
    #[error("checksum mismatch")]
    BadChecksum,
}
