//! Firmware telemetry sink.
//!
//! Records every acquisition event into the shared ring and mirrors it to
//! defmt on target or stdout on host builds.

use gnss_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryPayload, TelemetryRecorder, TelemetrySink,
};

use crate::clock::FirmwareInstant;

macro_rules! emit {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        defmt::$level!($($arg)*);
        #[cfg(not(target_os = "none"))]
        println!($($arg)*);
    }};
}

/// Ring-backed sink that logs as it records.
pub struct FirmwareTelemetry {
    recorder: TelemetryRecorder<FirmwareInstant>,
}

impl FirmwareTelemetry {
    pub const fn new() -> Self {
        Self {
            recorder: TelemetryRecorder::new(),
        }
    }

    pub fn recorder(&self) -> &TelemetryRecorder<FirmwareInstant> {
        &self.recorder
    }
}

impl Default for FirmwareTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for FirmwareTelemetry {
    type Instant = FirmwareInstant;

    fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: FirmwareInstant,
    ) -> EventId {
        let id = self.recorder.record(event, payload, timestamp);
        log_event(event, &payload, timestamp.as_micros());
        id
    }
}

fn log_event(event: TelemetryEventKind, payload: &TelemetryPayload, t_us: u64) {
    match (event, payload) {
        (TelemetryEventKind::AttemptStarted, TelemetryPayload::Attempt(attempt)) => emit!(
            info,
            "gnss: starting fix attempt {}/{} t={}us",
            attempt.attempt,
            attempt.max_attempts,
            t_us
        ),
        (TelemetryEventKind::AwaitingFix, TelemetryPayload::Wait(wait)) => emit!(
            info,
            "gnss: waiting for fix {}/{}",
            wait.polls,
            wait.limit
        ),
        (TelemetryEventKind::FixDelivered, TelemetryPayload::Fix(fix)) => emit!(
            info,
            "gnss: fix {} delivered confidence={} satellites={} ttf={}ms",
            fix.fix_id,
            fix.confidence,
            fix.satellites,
            fix.time_to_fix_ms
        ),
        (TelemetryEventKind::FixRejected, TelemetryPayload::Fix(fix)) => emit!(
            warn,
            "gnss: fix {} rejected confidence={}",
            fix.fix_id,
            fix.confidence
        ),
        (TelemetryEventKind::AttemptsExhausted, TelemetryPayload::Attempt(attempt)) => emit!(
            warn,
            "gnss: {} attempts exhausted, keeping last fix",
            attempt.max_attempts
        ),
        (TelemetryEventKind::CommandFailed, TelemetryPayload::Attempt(attempt)) => emit!(
            error,
            "gnss: failed to start fix attempt {}",
            attempt.attempt
        ),
        (TelemetryEventKind::FixTimedOut, TelemetryPayload::Wait(wait)) => emit!(
            error,
            "gnss: fix timed out after {} polls",
            wait.polls
        ),
        (TelemetryEventKind::CycleReport, TelemetryPayload::Report(report)) => {
            emit!(
                info,
                "gnss: fix received confidence={} lat={} lon={} satellites={} strong={}",
                report.estimated_confidence,
                report.latitude,
                report.longitude,
                report.satellite_count,
                report.strong_signal_count
            );
            if !report.accepted {
                emit!(error, "gnss: invalid fix (low confidence)");
            }
        }
        (TelemetryEventKind::Idle, TelemetryPayload::Idle(idle)) => {
            let idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX);
            emit!(info, "gnss: sleeping for {}ms", idle_ms);
        }
        (TelemetryEventKind::CycleStarted, TelemetryPayload::Cycle(cycle)) => {
            emit!(info, "gnss: cycle {} t={}us", cycle.cycle, t_us);
        }
        (kind, _) if kind.is_fatal() => emit!(error, "gnss: {}", kind.label()),
        (kind, _) => emit!(info, "gnss: {}", kind.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss_core::telemetry::{AttemptTelemetry, WaitTelemetry};

    #[test]
    fn records_are_kept_in_ring() {
        let mut telemetry = FirmwareTelemetry::new();

        let first = telemetry.record(
            TelemetryEventKind::AttemptStarted,
            TelemetryPayload::Attempt(AttemptTelemetry::new(1, 5)),
            FirmwareInstant::from_micros(10),
        );
        let second = telemetry.record(
            TelemetryEventKind::FixTimedOut,
            TelemetryPayload::Wait(WaitTelemetry::new(1, 300, 300)),
            FirmwareInstant::from_micros(150_000_010),
        );

        assert_eq!((first, second), (0, 1));
        let latest = telemetry.recorder().latest().expect("latest record missing");
        assert_eq!(latest.event, TelemetryEventKind::FixTimedOut);
        assert_eq!(latest.timestamp.as_micros(), 150_000_010);
    }
}
