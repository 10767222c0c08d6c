//! Alarm cooldown gate

use std::time::{Duration, Instant};
use tracing::debug;

/// Minimum spacing between two alarm-sink invocations.
///
/// One gate is shared by every alert track of an engine, so a drowsiness
/// alarm also silences an absence alarm inside the same window.
#[derive(Debug, Clone)]
pub struct AlarmGate {
    /// Cooldown period between alarms
    cooldown: Duration,
    /// Last time any alarm was fired
    last_fired: Option<Instant>,
    /// Number of alarms fired through this gate
    fire_count: usize,
}

impl AlarmGate {
    /// Create a new gate with the given cooldown
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: None,
            fire_count: 0,
        }
    }

    /// Whether an alarm may fire at `now`
    pub fn is_open(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => {
                let open = now.saturating_duration_since(last) > self.cooldown;
                if !open {
                    debug!("Alarm suppressed: in cooldown period");
                }
                open
            }
        }
    }

    /// Record that an alarm was fired at `now`
    pub fn record(&mut self, now: Instant) {
        self.last_fired = Some(now);
        self.fire_count += 1;
    }

    /// Fire if the gate is open; returns whether it fired
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if self.is_open(now) {
            self.record(now);
            true
        } else {
            false
        }
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    pub fn fire_count(&self) -> usize {
        self.fire_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_alarm_always_allowed() {
        let gate = AlarmGate::new(Duration::from_secs(3));
        assert!(gate.is_open(Instant::now()));
        assert!(gate.last_fired().is_none());
    }

    #[test]
    fn test_cooldown_suppresses() {
        let mut gate = AlarmGate::new(Duration::from_secs(3));
        let t0 = Instant::now();

        assert!(gate.try_fire(t0));
        assert!(!gate.try_fire(t0 + Duration::from_secs(1)));
        // Boundary is exclusive
        assert!(!gate.try_fire(t0 + Duration::from_secs(3)));
        assert!(gate.try_fire(t0 + Duration::from_millis(3001)));
        assert_eq!(gate.fire_count(), 2);
    }

    #[test]
    fn test_clock_going_backwards_stays_closed() {
        let mut gate = AlarmGate::new(Duration::from_secs(3));
        let t0 = Instant::now() + Duration::from_secs(10);
        gate.record(t0);

        assert!(!gate.is_open(t0 - Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_cooldown_fires_on_every_later_tick() {
        let mut gate = AlarmGate::new(Duration::ZERO);
        let t0 = Instant::now();

        assert!(gate.try_fire(t0));
        assert!(!gate.try_fire(t0));
        assert!(gate.try_fire(t0 + Duration::from_millis(33)));
        assert_eq!(gate.fire_count(), 2);
    }
}
