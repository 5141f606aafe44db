use std::sync::{Arc, Mutex};

use protocol::{HeartbeatTracker, Message, MAX_MESSAGE_SIZE};

use crate::error::HostError;
use crate::link::Link;

/// Host-side wrapper around the shared [`protocol::HeartbeatTracker`]:
/// on the device side a dead link triggers a baud reset (spec §4.7), but
/// on the host side it's fatal — the main loop surfaces
/// [`HostError::LinkDead`] so the operator gets a clean exit instead of
/// a silently stuck UI (spec §7).
pub struct HostHeartbeat {
    tracker: HeartbeatTracker,
    declared_dead: bool,
}

impl HostHeartbeat {
    pub fn new(now_ms: u64) -> Self {
        Self { tracker: HeartbeatTracker::new(now_ms), declared_dead: false }
    }

    pub fn on_received(&mut self, now_ms: u64) {
        self.tracker.on_received(now_ms);
        self.declared_dead = false;
    }

    /// Sends a `CONN_TEST` probe over `link` if one is due, via the
    /// shared mutex the reader thread also locks for `read_byte`.
    pub fn poll_probe(
        &mut self,
        now_ms: u64,
        link: &Arc<Mutex<Box<dyn Link>>>,
    ) -> Result<(), HostError> {
        if !self.tracker.should_probe(now_ms) {
            return Ok(());
        }
        let mut buf = [0u8; MAX_MESSAGE_SIZE];
        let n = Message::ConnTest.encode(&mut buf)?;
        link.lock().unwrap().write_all(&buf[..n])?;
        self.tracker.on_probe_sent(now_ms);
        Ok(())
    }

    /// Returns `Err(HostError::LinkDead)` exactly once per dead episode
    /// (spec §4.7: `T_DEAD` silence declares the link dead).
    pub fn check_dead(&mut self, now_ms: u64) -> Result<(), HostError> {
        if self.tracker.is_dead(now_ms) && !self.declared_dead {
            self.declared_dead = true;
            return Err(HostError::LinkDead(protocol::heartbeat::T_DEAD_MS / 1000));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::loopback;

    #[test]
    fn probe_sent_only_after_silence_threshold() {
        let (host_end, mut device_end) = loopback::pair();
        let link: Arc<Mutex<Box<dyn Link>>> = Arc::new(Mutex::new(Box::new(host_end)));
        let mut hb = HostHeartbeat::new(0);

        hb.poll_probe(1_000, &link).unwrap();
        assert!(device_end.read_byte(std::time::Duration::from_millis(10)).is_none());

        hb.poll_probe(protocol::heartbeat::T_WARN_MS, &link).unwrap();
        assert!(device_end.read_byte(std::time::Duration::from_millis(10)).is_some());
    }

    #[test]
    fn check_dead_fires_exactly_once() {
        let mut hb = HostHeartbeat::new(0);
        assert!(hb.check_dead(protocol::heartbeat::T_DEAD_MS).is_err());
        assert!(hb.check_dead(protocol::heartbeat::T_DEAD_MS + 1).is_ok());
    }

    #[test]
    fn receipt_clears_dead_latch() {
        let mut hb = HostHeartbeat::new(0);
        assert!(hb.check_dead(protocol::heartbeat::T_DEAD_MS).is_err());
        hb.on_received(protocol::heartbeat::T_DEAD_MS + 1);
        assert!(!hb.declared_dead);
    }
}
