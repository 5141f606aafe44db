use crate::message::{Message, MessageType, MAX_MESSAGE_SIZE};

/// Result of a completed frame (spec §7: a bad checksum is logged and
/// the message is still dispatched, it is not dropped).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Ok(Message),
    ChecksumMismatch(Message),
}

impl FrameOutcome {
    pub fn message(self) -> Message {
        match self {
            FrameOutcome::Ok(m) | FrameOutcome::ChecksumMismatch(m) => m,
        }
    }
}

/// Accumulates bytes from the link into complete messages (spec §4.3).
///
/// `write_index == 0` is the only state in which a byte that isn't a
/// recognized type tag is silently discarded (resynchronization); once
/// a frame is open every byte is taken on faith until the frame's known
/// length is reached. Unknown-type resync is the only error this layer
/// recovers from locally (spec §7); it is not surfaced to the caller.
pub struct FrameReader {
    buf: [u8; MAX_MESSAGE_SIZE],
    index: usize,
    resyncs: u32,
}

impl FrameReader {
    pub const fn new() -> Self {
        Self { buf: [0u8; MAX_MESSAGE_SIZE], index: 0, resyncs: 0 }
    }

    /// Bytes discarded while resynchronizing, for diagnostics/tests.
    pub fn resync_count(&self) -> u32 {
        self.resyncs
    }

    /// Feed one byte. Returns `Some` once a full frame has accumulated.
    pub fn feed(&mut self, byte: u8) -> Option<FrameOutcome> {
        if self.index == 0 && MessageType::from_tag(byte).is_none() {
            self.resyncs += 1;
            return None;
        }
        self.buf[self.index] = byte;
        self.index += 1;

        let ty = MessageType::from_tag(self.buf[0])?;
        if self.index < ty.message_size() {
            return None;
        }

        let frame = &self.buf[..ty.message_size()];
        let checksum_ok = crate::message::checksum_ok(frame);
        // `ty` was already validated against `self.buf[0]` and the
        // buffer holds exactly `ty.message_size()` bytes, so decode
        // cannot fail here.
        let msg = Message::decode(frame).expect("frame reader assembled a well-formed frame");
        self.index = 0;

        Some(if checksum_ok { FrameOutcome::Ok(msg) } else { FrameOutcome::ChecksumMismatch(msg) })
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
