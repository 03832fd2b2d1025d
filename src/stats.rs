//! Periodic decoder-statistics snapshot logging (component G; the §11
//! supplemental "decoder statistics snapshot & stats-interval logging"
//! feature). Every decoder already tallies its own
//! [`crate::registry::DecoderStats`]; this module just walks the registry on
//! a timer and logs the non-zero snapshots, the way the teacher's main loop
//! periodically logs capture-session counters.

use crate::registry::DecoderRegistry;
use std::time::{Duration, Instant};

/// Log one `tracing::info!` line per decoder whose snapshot has any
/// non-zero counter. Call this from the stats thread once per tick; a
/// decoder that has seen nothing since startup is skipped to keep the log
/// quiet during normal operation.
pub fn log_snapshot(registry: &DecoderRegistry) {
    for descriptor in registry.iter() {
        let snap = descriptor.stats.snapshot();
        let total = snap.decode_ok as u64
            + snap.abort_early as u64
            + snap.abort_length as u64
            + snap.fail_mic as u64
            + snap.fail_sanity as u64
            + snap.fail_other as u64;
        if total == 0 {
            continue;
        }
        tracing::info!(
            decoder = descriptor.name(),
            protocol_num = descriptor.protocol_num,
            decode_events = snap.decode_events,
            decode_ok = snap.decode_ok,
            abort_early = snap.abort_early,
            abort_length = snap.abort_length,
            fail_mic = snap.fail_mic,
            fail_sanity = snap.fail_sanity,
            fail_other = snap.fail_other,
            "decoder stats"
        );
    }
}

/// Fires `log_snapshot` no more often than once per `interval`, driven by
/// repeated calls to [`StatsTicker::tick`] from the stats thread's poll
/// loop. A zero interval disables ticking entirely (the CLI's
/// `--stats-interval 0` default).
pub struct StatsTicker {
    interval: Duration,
    last: Instant,
}

impl StatsTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: Instant::now() }
    }

    /// Returns `true` and resets the internal clock if `interval` has
    /// elapsed since the last tick (or since construction); the caller is
    /// expected to log a snapshot when this returns `true`.
    pub fn tick(&mut self) -> bool {
        if self.interval.is_zero() {
            return false;
        }
        if self.last.elapsed() >= self.interval {
            self.last = Instant::now();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_never_ticks() {
        let mut ticker = StatsTicker::new(Duration::ZERO);
        assert!(!ticker.tick());
        assert!(!ticker.tick());
    }

    #[test]
    fn nonzero_interval_does_not_tick_immediately() {
        let mut ticker = StatsTicker::new(Duration::from_secs(60));
        assert!(!ticker.tick());
    }

    #[test]
    fn log_snapshot_does_not_panic_on_an_empty_registry() {
        let registry = DecoderRegistry::new();
        log_snapshot(&registry);
    }
}
