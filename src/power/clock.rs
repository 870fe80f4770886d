//! Monotonic clock trait for deadlines and delays
//!
//! The clock restarts from zero on every wake, so it measures active time
//! only. Keeping it behind a trait lets tests drive deadlines without real
//! time passing.

use core::future::Future;

/// Monotonic, sleep-resetting time source
pub trait Clock {
    /// Microseconds since this wake
    fn now_us(&self) -> u64;

    /// Wait for the given number of milliseconds
    fn delay_ms(&mut self, ms: u32) -> impl Future<Output = ()>;
}

#[cfg(feature = "embedded")]
pub use embassy::EmbassyClock;

#[cfg(feature = "embedded")]
mod embassy {
    use super::Clock;
    use embassy_time::{Duration, Instant, Timer};

    /// Clock backed by the embassy time driver
    pub struct EmbassyClock;

    impl Clock for EmbassyClock {
        fn now_us(&self) -> u64 {
            Instant::now().as_micros()
        }

        async fn delay_ms(&mut self, ms: u32) {
            Timer::after(Duration::from_millis(ms as u64)).await;
        }
    }
}
