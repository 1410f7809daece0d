use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Forwarder time unit. One tick is one millisecond.
pub type Ticks = u64;

pub const MICROS_PER_TICK: u64 = 1_000;

/// Monotonic time source consumed by the forwarder and the RAAQM transport
pub trait Clock: Send + Sync {
    /// Microseconds since an arbitrary, fixed origin
    fn now_micros(&self) -> u64;

    fn ticks(&self) -> Ticks {
        self.now_micros() / MICROS_PER_TICK
    }
}

/// Wall clock backed by `Instant`, anchored at construction
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new(start_micros: u64) -> Self {
        Self {
            micros: AtomicU64::new(start_micros),
        }
    }

    pub fn set_micros(&self, micros: u64) {
        self.micros.store(micros, Ordering::SeqCst);
    }

    pub fn advance_micros(&self, delta: u64) {
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn advance_ticks(&self, ticks: Ticks) {
        self.advance_micros(ticks.saturating_mul(MICROS_PER_TICK));
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.micros.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_ticks() {
        let clock = ManualClock::new(0);
        assert_eq!(clock.ticks(), 0);
        clock.advance_micros(2_500);
        assert_eq!(clock.ticks(), 2);
        clock.advance_ticks(10);
        assert_eq!(clock.ticks(), 12);
        assert_eq!(clock.now_micros(), 12_500);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_micros();
        let b = clock.now_micros();
        assert!(b >= a);
    }
}
