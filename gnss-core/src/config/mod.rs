//! Tunables for the acquisition loop.
//!
//! Defaults reproduce the reference behaviour: five attempts per cycle, a
//! 300 × 500 ms wait window (150 s), a confidence threshold of 100, a strong
//! signal floor of 30, and a 5 s idle between cycles.

use core::{fmt, time::Duration};

pub mod overrides;

pub use overrides::{OverrideError, apply_overrides};

/// Fix attempts issued per cycle before settling for the last fix.
pub const DEFAULT_MAX_ATTEMPTS: u8 = 5;
/// Poll intervals to wait for a fix notification before timing out.
pub const DEFAULT_WAIT_TIMEOUT_TICKS: u16 = 300;
/// Duration of a single poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Largest confidence value still treated as trustworthy.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 100.0;
/// Minimum signal strength counted as a strong satellite.
pub const DEFAULT_STRONG_SIGNAL_FLOOR: u8 = 30;
/// Idle delay between two acquisition cycles.
pub const DEFAULT_IDLE_BETWEEN_CYCLES: Duration = Duration::from_secs(5);

/// Configuration shared by the acquisition controller and cycle scheduler.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AcquisitionConfig {
    pub max_attempts: u8,
    pub wait_timeout_ticks: u16,
    pub poll_interval: Duration,
    pub confidence_threshold: f32,
    pub strong_signal_floor: u8,
    pub idle_between_cycles: Duration,
}

impl AcquisitionConfig {
    /// Reference configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_timeout_ticks: DEFAULT_WAIT_TIMEOUT_TICKS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            strong_signal_floor: DEFAULT_STRONG_SIGNAL_FLOOR,
            idle_between_cycles: DEFAULT_IDLE_BETWEEN_CYCLES,
        }
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u8) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub const fn with_wait_timeout(mut self, ticks: u16, poll_interval: Duration) -> Self {
        self.wait_timeout_ticks = ticks;
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub const fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_strong_signal_floor(mut self, floor: u8) -> Self {
        self.strong_signal_floor = floor;
        self
    }

    #[must_use]
    pub const fn with_idle_between_cycles(mut self, idle: Duration) -> Self {
        self.idle_between_cycles = idle;
        self
    }

    /// Total time the controller waits for a notification before giving up.
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        self.poll_interval
            .saturating_mul(u32::from(self.wait_timeout_ticks))
    }

    /// Checks the invariants the acquisition loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.wait_timeout_ticks == 0 {
            return Err(ConfigError::ZeroTimeoutTicks);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if !self.confidence_threshold.is_finite() || self.confidence_threshold < 0.0 {
            return Err(ConfigError::InvalidConfidenceThreshold);
        }
        if self.idle_between_cycles < self.poll_interval {
            return Err(ConfigError::IdleShorterThanPoll {
                idle: self.idle_between_cycles,
                poll: self.poll_interval,
            });
        }
        Ok(())
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reasons a configuration is rejected by [`AcquisitionConfig::validate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    ZeroAttempts,
    ZeroTimeoutTicks,
    ZeroPollInterval,
    InvalidConfidenceThreshold,
    IdleShorterThanPoll { idle: Duration, poll: Duration },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroAttempts => f.write_str("max attempts must be at least 1"),
            ConfigError::ZeroTimeoutTicks => f.write_str("wait timeout must be at least 1 tick"),
            ConfigError::ZeroPollInterval => f.write_str("poll interval must be non-zero"),
            ConfigError::InvalidConfidenceThreshold => {
                f.write_str("confidence threshold must be finite and non-negative")
            }
            ConfigError::IdleShorterThanPoll { idle, poll } => write!(
                f,
                "idle {}ms shorter than poll interval {}ms",
                idle.as_millis(),
                poll.as_millis()
            ),
        }
    }
}
