//! Link-loss detection shared by both sides (spec §4.7). Expressed over
//! an abstract millisecond timestamp rather than `std::time::Instant`
//! so it stays `no_std`-usable on the device; the host and device crates
//! each supply their own monotonic clock.

/// Silence after which a side starts probing with `CONN_TEST`, at most
/// once per second.
pub const T_WARN_MS: u64 = 5_000;
/// Silence after which the link is declared dead.
pub const T_DEAD_MS: u64 = 8_000;
/// Minimum spacing between repeated `CONN_TEST` probes.
pub const CONN_TEST_INTERVAL_MS: u64 = 1_000;

/// Tracks `last_received` and decides when to probe or declare the
/// link dead. `CONN_TEST`/`CONN_OK` themselves must never feed back
/// into `should_probe`'s own cadence as if they were ordinary traffic
/// fresher than `T_WARN_MS` old — they do update `last_received` like
/// any other well-formed message (spec §4.7), so this type does not
/// special-case them; callers simply call [`HeartbeatTracker::on_received`]
/// for every well-formed message, `CONN_TEST`/`CONN_OK` included.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatTracker {
    last_received_ms: u64,
    last_probe_sent_ms: Option<u64>,
}

impl HeartbeatTracker {
    pub fn new(now_ms: u64) -> Self {
        Self { last_received_ms: now_ms, last_probe_sent_ms: None }
    }

    /// Call on receipt of any well-formed message.
    pub fn on_received(&mut self, now_ms: u64) {
        self.last_received_ms = now_ms;
    }

    fn silence_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_received_ms)
    }

    /// Whether a `CONN_TEST` probe should be sent now. Does not mark a
    /// probe as sent; call [`HeartbeatTracker::on_probe_sent`] once the
    /// caller actually transmits it.
    pub fn should_probe(&self, now_ms: u64) -> bool {
        if self.silence_ms(now_ms) < T_WARN_MS {
            return false;
        }
        match self.last_probe_sent_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= CONN_TEST_INTERVAL_MS,
        }
    }

    pub fn on_probe_sent(&mut self, now_ms: u64) {
        self.last_probe_sent_ms = Some(now_ms);
    }

    pub fn is_dead(&self, now_ms: u64) -> bool {
        self.silence_ms(now_ms) >= T_DEAD_MS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_link_does_not_probe_before_t_warn() {
        let hb = HeartbeatTracker::new(0);
        assert!(!hb.should_probe(T_WARN_MS - 1));
        assert!(hb.should_probe(T_WARN_MS));
    }

    #[test]
    fn probe_respects_minimum_interval() {
        let mut hb = HeartbeatTracker::new(0);
        assert!(hb.should_probe(T_WARN_MS));
        hb.on_probe_sent(T_WARN_MS);
        assert!(!hb.should_probe(T_WARN_MS + 500));
        assert!(hb.should_probe(T_WARN_MS + CONN_TEST_INTERVAL_MS));
    }

    #[test]
    fn declares_dead_after_t_dead() {
        let hb = HeartbeatTracker::new(0);
        assert!(!hb.is_dead(T_DEAD_MS - 1));
        assert!(hb.is_dead(T_DEAD_MS));
    }

    #[test]
    fn receipt_resets_silence_clock() {
        let mut hb = HeartbeatTracker::new(0);
        hb.on_received(T_WARN_MS);
        assert!(!hb.should_probe(T_WARN_MS + 100));
        assert!(hb.should_probe(T_WARN_MS + T_WARN_MS));
    }
}
