//! Debounce gate for motion events

use std::time::Duration;

use tokio::time::Instant;

/// Whether an event at `now` may fire given the last fired event.
///
/// `None` means nothing fired yet in this session, which always passes.
/// Otherwise strictly more than `debounce` must have elapsed.
pub fn should_fire(now: Instant, last_fired: Option<Instant>, debounce: Duration) -> bool {
    match last_fired {
        None => true,
        Some(last) => now.saturating_duration_since(last) > debounce,
    }
}

/// Stateful wrapper around [`should_fire`]
#[derive(Debug, Clone, Default)]
pub struct DebounceGate {
    last_fired: Option<Instant>,
}

impl DebounceGate {
    /// Create a gate that has never fired
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the gate and, if it passes, record `now` as the last firing.
    ///
    /// The timestamp is recorded before the caller runs its callback, so
    /// a slow callback cannot shift the next window.
    pub fn try_fire(&mut self, now: Instant, debounce: Duration) -> bool {
        if should_fire(now, self.last_fired, debounce) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }

    /// Time of the last firing
    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    /// Forget the last firing
    pub fn reset(&mut self) {
        self.last_fired = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_event_always_fires() {
        let now = Instant::now();
        assert!(should_fire(now, None, Duration::ZERO));
        assert!(should_fire(now, None, Duration::from_secs(3600)));
    }

    #[test]
    fn test_window_boundary() {
        let t0 = Instant::now();
        let window = Duration::from_millis(3000);
        assert!(!should_fire(t0 + window, Some(t0), window));
        assert!(should_fire(t0 + window + Duration::from_millis(1), Some(t0), window));
    }

    #[test]
    fn test_clock_before_last_fire_never_fires() {
        let t0 = Instant::now() + Duration::from_secs(10);
        assert!(!should_fire(t0 - Duration::from_secs(5), Some(t0), Duration::from_secs(1)));
    }

    #[test]
    fn test_gate_records_and_resets() {
        let mut gate = DebounceGate::new();
        let t0 = Instant::now();
        let window = Duration::from_millis(3000);

        assert!(gate.try_fire(t0, window));
        assert_eq!(gate.last_fired(), Some(t0));

        assert!(!gate.try_fire(t0 + Duration::from_millis(1000), window));
        // A suppressed event does not move the window
        assert_eq!(gate.last_fired(), Some(t0));

        assert!(gate.try_fire(t0 + Duration::from_millis(3100), window));

        gate.reset();
        assert!(gate.last_fired().is_none());
        assert!(gate.try_fire(t0 + Duration::from_millis(3200), window));
    }

    proptest! {
        #[test]
        fn prop_debounce_boundary(debounce_ms in 0u64..1_000_000) {
            let t0 = Instant::now();
            let window = Duration::from_millis(debounce_ms);
            prop_assert!(!should_fire(t0 + window, Some(t0), window));
            prop_assert!(should_fire(t0 + window + Duration::from_millis(1), Some(t0), window));
        }

        #[test]
        fn prop_first_detection_allowed(offset_ms in 0u64..1_000_000, debounce_ms in 0u64..1_000_000) {
            let now = Instant::now() + Duration::from_millis(offset_ms);
            prop_assert!(should_fire(now, None, Duration::from_millis(debounce_ms)));
        }
    }
}
