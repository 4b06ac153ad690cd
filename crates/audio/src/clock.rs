//! Zeitquellen fuer die Wiedergabeplanung
//!
//! Der Scheduler plant auf einer monotonen Zeitachse. Im Betrieb ist das
//! die Geraeteuhr (gerenderte Frames / Rate), in Tests eine manuell
//! gestellte Uhr.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotone Zeitquelle
pub trait Clock: Send + Sync {
    /// Aktuelle Zeit seit dem Start der Uhr
    fn now(&self) -> Duration;
}

/// Uhr auf Basis von [`Instant`]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Uhr des Ausgabegeraets: Anzahl gerenderter Frames geteilt durch Rate
#[derive(Debug, Clone)]
pub struct DeviceClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl DeviceClock {
    pub fn new(frames: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Clock for DeviceClock {
    fn now(&self) -> Duration {
        let frames = self.frames.load(Ordering::Acquire);
        let nanos = frames as u128 * 1_000_000_000 / self.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }
}

/// Von Hand gestellte Uhr (Tests, Simulation)
#[derive(Debug, Default)]
pub struct ManualClock {
    jetzt: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, zeit: Duration) {
        *self.jetzt.lock() = zeit;
    }

    pub fn advance(&self, dauer: Duration) {
        *self.jetzt.lock() += dauer;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.jetzt.lock()
    }
}
