//! Fix records delivered by the modem's GNSS subsystem.
//!
//! A [`FixRecord`] is produced fresh for every fix attempt and handed to the
//! acquisition controller by value. Nothing in here interprets the record;
//! acceptance lives in [`crate::report`].

use core::fmt;

use heapless::Vec;

/// Upper bound on satellites the modem reports for a single fix.
pub const MAX_SATELLITES: usize = 32;

/// Bounded satellite list carried by a fix.
pub type SatelliteList = Vec<SatelliteInfo, MAX_SATELLITES>;

/// Per-satellite datum reported with a fix.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SatelliteInfo {
    /// Satellite number as reported by the modem.
    pub number: u8,
    /// Signal strength on the modem's own scale.
    pub signal_strength: u8,
}

impl SatelliteInfo {
    #[must_use]
    pub const fn new(number: u8, signal_strength: u8) -> Self {
        Self {
            number,
            signal_strength,
        }
    }

    /// Returns `true` when the signal meets or exceeds `floor`.
    #[must_use]
    pub const fn is_strong(&self, floor: u8) -> bool {
        self.signal_strength >= floor
    }
}

/// Raised when a fix already holds [`MAX_SATELLITES`] entries.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SatelliteOverflow {
    pub rejected: SatelliteInfo,
}

impl fmt::Display for SatelliteOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "satellite list full ({MAX_SATELLITES}), dropped sat {}",
            self.rejected.number
        )
    }
}

/// Result of one fix attempt.
///
/// Lower `estimated_confidence` is better. Coordinates are only meaningful once
/// the confidence has passed the caller's acceptance threshold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FixRecord {
    pub fix_id: u8,
    pub time_to_fix_ms: u32,
    pub estimated_confidence: f32,
    /// Degrees, WGS84.
    pub latitude: f64,
    /// Degrees, WGS84.
    pub longitude: f64,
    /// Metres above the ellipsoid.
    pub height: f32,
    /// Order as delivered by the modem.
    pub satellites: SatelliteList,
}

impl FixRecord {
    /// Creates a record with no satellites attached.
    #[must_use]
    pub const fn new(fix_id: u8, estimated_confidence: f32, latitude: f64, longitude: f64) -> Self {
        Self {
            fix_id,
            time_to_fix_ms: 0,
            estimated_confidence,
            latitude,
            longitude,
            height: 0.0,
            satellites: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_time_to_fix(mut self, time_to_fix_ms: u32) -> Self {
        self.time_to_fix_ms = time_to_fix_ms;
        self
    }

    #[must_use]
    pub fn with_height(mut self, height: f32) -> Self {
        self.height = height;
        self
    }

    /// Appends a satellite, failing once the list is full.
    pub fn push_satellite(&mut self, satellite: SatelliteInfo) -> Result<(), SatelliteOverflow> {
        self.satellites
            .push(satellite)
            .map_err(|rejected| SatelliteOverflow { rejected })
    }

    /// Appends every satellite from `satellites`, stopping at the first overflow.
    pub fn extend_satellites<I>(&mut self, satellites: I) -> Result<(), SatelliteOverflow>
    where
        I: IntoIterator<Item = SatelliteInfo>,
    {
        for satellite in satellites {
            self.push_satellite(satellite)?;
        }
        Ok(())
    }

    /// Number of satellites considered in the fix.
    #[must_use]
    pub fn satellite_count(&self) -> u8 {
        // Bounded by MAX_SATELLITES.
        u8::try_from(self.satellites.len()).unwrap_or(u8::MAX)
    }
}
