use protocol::{HeartbeatTracker, Message, DEFAULT_BAUD};

use crate::link::Link;

/// Device-side reaction to link supervision (spec §4.7): probe with
/// `CONN_TEST` after `T_warn`, and once the link is declared dead reset
/// to the default baud and keep waiting — the device never exits.
pub struct DeviceHeartbeat {
    tracker: HeartbeatTracker,
    was_dead: bool,
}

impl DeviceHeartbeat {
    pub fn new(now_ms: u64) -> Self {
        Self { tracker: HeartbeatTracker::new(now_ms), was_dead: false }
    }

    pub fn on_received(&mut self, now_ms: u64) {
        self.tracker.on_received(now_ms);
        self.was_dead = false;
    }

    /// Call once per main-loop iteration. Returns a `CONN_TEST` to send
    /// if a probe is due.
    pub fn poll(&mut self, now_ms: u64) -> Option<Message> {
        if self.tracker.should_probe(now_ms) {
            self.tracker.on_probe_sent(now_ms);
            return Some(Message::ConnTest);
        }
        None
    }

    /// Call once per main-loop iteration. If the link just became dead,
    /// resets the device's UART to the default baud rate (spec §4.7)
    /// and returns `true` exactly once for that transition.
    pub fn poll_link_death<L: Link>(&mut self, now_ms: u64, link: &mut L) -> bool {
        if self.tracker.is_dead(now_ms) && !self.was_dead {
            self.was_dead = true;
            link.set_baud(DEFAULT_BAUD);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::heartbeat::T_DEAD_MS;

    struct FakeLink {
        baud: u32,
    }
    impl Link for FakeLink {
        fn write_all(&mut self, _bytes: &[u8]) -> Result<(), crate::link::LinkError> {
            Ok(())
        }
        fn read_nonblocking(&mut self) -> Option<u8> {
            None
        }
        fn set_baud(&mut self, rate: u32) {
            self.baud = rate;
        }
    }

    #[test]
    fn resets_baud_once_on_link_death() {
        let mut hb = DeviceHeartbeat::new(0);
        let mut link = FakeLink { baud: 230_400 };
        assert!(!hb.poll_link_death(T_DEAD_MS - 1, &mut link));
        assert_eq!(link.baud, 230_400);
        assert!(hb.poll_link_death(T_DEAD_MS, &mut link));
        assert_eq!(link.baud, DEFAULT_BAUD);
        // does not fire again every tick while still dead
        assert!(!hb.poll_link_death(T_DEAD_MS + 1, &mut link));
    }
}
