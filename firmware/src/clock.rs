//! Embassy-backed time source for the acquisition loop.

use core::time::Duration as CoreDuration;

use embassy_time::Instant;
use gnss_core::telemetry::TelemetryInstant;

/// Monotonic timestamp attached to firmware telemetry.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0.as_micros()
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl TelemetryInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> CoreDuration {
        CoreDuration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }
}

#[cfg(target_os = "none")]
pub use embassy_clock::EmbassyClock;

#[cfg(target_os = "none")]
mod embassy_clock {
    use core::time::Duration as CoreDuration;

    use embassy_time::{Duration, Instant, Timer};
    use gnss_core::acquisition::PollClock;

    use super::FirmwareInstant;

    /// Sleeps on the embassy timer queue.
    pub struct EmbassyClock;

    impl PollClock for EmbassyClock {
        type Instant = FirmwareInstant;

        fn now(&self) -> FirmwareInstant {
            FirmwareInstant::from(Instant::now())
        }

        async fn sleep(&mut self, duration: CoreDuration) {
            let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
            Timer::after(Duration::from_micros(micros)).await;
        }
    }
}
