//! Turns a raw [`FixRecord`] into a [`FixReport`].

use crate::fix::FixRecord;

/// Sentinel coordinates reported when a fix did not pass the acceptance test.
pub const UNTRUSTED_POSITION: (f64, f64) = (0.0, 0.0);

/// Shared acceptance predicate. Lower confidence is better; `NaN` never passes.
#[must_use]
pub fn is_acceptable(estimated_confidence: f32, confidence_threshold: f32) -> bool {
    estimated_confidence <= confidence_threshold
}

/// Counts satellites whose signal strength meets or exceeds `floor`.
#[must_use]
pub fn count_strong_signals(fix: &FixRecord, floor: u8) -> u8 {
    let strong = fix
        .satellites
        .iter()
        .filter(|satellite| satellite.is_strong(floor))
        .count();
    u8::try_from(strong).unwrap_or(u8::MAX)
}

/// Per-cycle summary handed to logging and telemetry.
///
/// When `accepted` is `false` the coordinates hold [`UNTRUSTED_POSITION`]; use
/// [`FixReport::position`] rather than reading them directly.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FixReport {
    pub accepted: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub estimated_confidence: f32,
    pub satellite_count: u8,
    pub strong_signal_count: u8,
    pub fix_id: u8,
}

impl FixReport {
    /// Validated coordinates, or `None` when the fix was not accepted.
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        self.accepted.then_some((self.latitude, self.longitude))
    }
}

/// Applies the acceptance test and signal statistics to `fix`.
#[must_use]
pub fn evaluate(fix: &FixRecord, confidence_threshold: f32, strong_signal_floor: u8) -> FixReport {
    let accepted = is_acceptable(fix.estimated_confidence, confidence_threshold);
    let (latitude, longitude) = if accepted {
        (fix.latitude, fix.longitude)
    } else {
        UNTRUSTED_POSITION
    };

    FixReport {
        accepted,
        latitude,
        longitude,
        estimated_confidence: fix.estimated_confidence,
        satellite_count: fix.satellite_count(),
        strong_signal_count: count_strong_signals(fix, strong_signal_floor),
        fix_id: fix.fix_id,
    }
}
