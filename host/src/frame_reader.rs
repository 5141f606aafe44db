use protocol::FrameOutcome;

use crate::queue::BoundedQueue;

/// Host-side wrapper around the shared [`protocol::FrameReader`]: once
/// a byte completes a frame, decide whether to log-and-drop (queue
/// full) or log-and-dispatch-anyway (bad checksum, spec §7's
/// documented lenient behavior) before handing the message to the
/// bounded queue the main thread drains.
pub struct HostFrameReader {
    inner: protocol::FrameReader,
}

impl HostFrameReader {
    pub fn new() -> Self {
        Self { inner: protocol::FrameReader::new() }
    }

    pub fn feed_byte(&mut self, byte: u8, queue: &BoundedQueue<protocol::Message>) {
        let Some(outcome) = self.inner.feed(byte) else { return };
        let msg = match outcome {
            FrameOutcome::Ok(msg) => msg,
            FrameOutcome::ChecksumMismatch(msg) => {
                log::warn!("checksum mismatch on {:?}, dispatching anyway", msg.message_type());
                msg
            }
        };
        if queue.push(msg).is_err() {
            log::warn!("message queue full, dropping {:?}", msg.message_type());
        }
    }
}

impl Default for HostFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Message, MAX_MESSAGE_SIZE};

    #[test]
    fn complete_frame_lands_in_queue() {
        let queue = BoundedQueue::new(4);
        let mut reader = HostFrameReader::new();
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let n = Message::ConnTest.encode(&mut buf).unwrap();
        for &b in &buf[..n] {
            reader.feed_byte(b, &queue);
        }
        assert_eq!(queue.pop().unwrap(), Message::ConnTest);
    }

    #[test]
    fn full_queue_drops_silently_without_panicking() {
        let queue = BoundedQueue::new(1);
        queue.push(Message::Ok).unwrap();
        let mut reader = HostFrameReader::new();
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let n = Message::ConnTest.encode(&mut buf).unwrap();
        for &b in &buf[..n] {
            reader.feed_byte(b, &queue);
        }
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.pop().unwrap(), Message::Ok);
    }
}
