//! Telemetry event catalog and payload structures shared by firmware and host targets.
//!
//! Every step of an acquisition cycle is reported through a [`TelemetrySink`]:
//! attempts, each wait tick, acceptance or rejection of a fix, fatal errors,
//! and the per-cycle [`FixReport`]. The firmware mirrors records to defmt, the
//! emulator prints them, and [`TelemetryRecorder`] keeps the most recent ones
//! in a fixed-capacity ring.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::report::FixReport;

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Discriminated telemetry events emitted by the acquisition loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    CycleStarted,
    ProviderReady,
    ProviderSetupFailed,
    AttemptStarted,
    AwaitingFix,
    FixDelivered,
    FixAccepted,
    FixRejected,
    AttemptsExhausted,
    CommandFailed,
    FixTimedOut,
    CycleReport,
    Idle,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
            other => f.write_str(other.label()),
        }
    }
}

impl TelemetryEventKind {
    const CYCLE_STARTED_CODE: u16 = 0x0000;
    const PROVIDER_READY_CODE: u16 = 0x0001;
    const PROVIDER_SETUP_FAILED_CODE: u16 = 0x0002;
    const ATTEMPT_STARTED_CODE: u16 = 0x0010;
    const AWAITING_FIX_CODE: u16 = 0x0011;
    const FIX_DELIVERED_CODE: u16 = 0x0012;
    const FIX_ACCEPTED_CODE: u16 = 0x0013;
    const FIX_REJECTED_CODE: u16 = 0x0014;
    const ATTEMPTS_EXHAUSTED_CODE: u16 = 0x0015;
    const COMMAND_FAILED_CODE: u16 = 0x0020;
    const FIX_TIMED_OUT_CODE: u16 = 0x0021;
    const CYCLE_REPORT_CODE: u16 = 0x0030;
    const IDLE_CODE: u16 = 0x0031;

    /// Short kebab-case label used in log lines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TelemetryEventKind::CycleStarted => "cycle-started",
            TelemetryEventKind::ProviderReady => "provider-ready",
            TelemetryEventKind::ProviderSetupFailed => "provider-setup-failed",
            TelemetryEventKind::AttemptStarted => "attempt-started",
            TelemetryEventKind::AwaitingFix => "awaiting-fix",
            TelemetryEventKind::FixDelivered => "fix-delivered",
            TelemetryEventKind::FixAccepted => "fix-accepted",
            TelemetryEventKind::FixRejected => "fix-rejected",
            TelemetryEventKind::AttemptsExhausted => "attempts-exhausted",
            TelemetryEventKind::CommandFailed => "command-failed",
            TelemetryEventKind::FixTimedOut => "fix-timed-out",
            TelemetryEventKind::CycleReport => "cycle-report",
            TelemetryEventKind::Idle => "idle",
            TelemetryEventKind::Custom(_) => "custom",
        }
    }

    /// Returns `true` for events that end the run.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            TelemetryEventKind::ProviderSetupFailed
                | TelemetryEventKind::CommandFailed
                | TelemetryEventKind::FixTimedOut
        )
    }

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::CycleStarted => Self::CYCLE_STARTED_CODE,
            TelemetryEventKind::ProviderReady => Self::PROVIDER_READY_CODE,
            TelemetryEventKind::ProviderSetupFailed => Self::PROVIDER_SETUP_FAILED_CODE,
            TelemetryEventKind::AttemptStarted => Self::ATTEMPT_STARTED_CODE,
            TelemetryEventKind::AwaitingFix => Self::AWAITING_FIX_CODE,
            TelemetryEventKind::FixDelivered => Self::FIX_DELIVERED_CODE,
            TelemetryEventKind::FixAccepted => Self::FIX_ACCEPTED_CODE,
            TelemetryEventKind::FixRejected => Self::FIX_REJECTED_CODE,
            TelemetryEventKind::AttemptsExhausted => Self::ATTEMPTS_EXHAUSTED_CODE,
            TelemetryEventKind::CommandFailed => Self::COMMAND_FAILED_CODE,
            TelemetryEventKind::FixTimedOut => Self::FIX_TIMED_OUT_CODE,
            TelemetryEventKind::CycleReport => Self::CYCLE_REPORT_CODE,
            TelemetryEventKind::Idle => Self::IDLE_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::CYCLE_STARTED_CODE => TelemetryEventKind::CycleStarted,
            Self::PROVIDER_READY_CODE => TelemetryEventKind::ProviderReady,
            Self::PROVIDER_SETUP_FAILED_CODE => TelemetryEventKind::ProviderSetupFailed,
            Self::ATTEMPT_STARTED_CODE => TelemetryEventKind::AttemptStarted,
            Self::AWAITING_FIX_CODE => TelemetryEventKind::AwaitingFix,
            Self::FIX_DELIVERED_CODE => TelemetryEventKind::FixDelivered,
            Self::FIX_ACCEPTED_CODE => TelemetryEventKind::FixAccepted,
            Self::FIX_REJECTED_CODE => TelemetryEventKind::FixRejected,
            Self::ATTEMPTS_EXHAUSTED_CODE => TelemetryEventKind::AttemptsExhausted,
            Self::COMMAND_FAILED_CODE => TelemetryEventKind::CommandFailed,
            Self::FIX_TIMED_OUT_CODE => TelemetryEventKind::FixTimedOut,
            Self::CYCLE_REPORT_CODE => TelemetryEventKind::CycleReport,
            Self::IDLE_CODE => TelemetryEventKind::Idle,
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Index of the cycle that just started.
    Cycle(CycleTelemetry),
    /// Attempt counters.
    Attempt(AttemptTelemetry),
    /// Wait progress for the in-flight attempt.
    Wait(WaitTelemetry),
    /// Summary of a delivered fix.
    Fix(FixTelemetry),
    /// Validated report emitted once per cycle.
    Report(FixReport),
    /// Idle delay before the next cycle.
    Idle(Duration),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CycleTelemetry {
    pub cycle: u32,
}

/// Attempt counters, 1-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AttemptTelemetry {
    pub attempt: u8,
    pub max_attempts: u8,
}

impl AttemptTelemetry {
    #[must_use]
    pub const fn new(attempt: u8, max_attempts: u8) -> Self {
        Self {
            attempt,
            max_attempts,
        }
    }
}

/// Poll counter for the in-flight attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WaitTelemetry {
    pub attempt: u8,
    pub polls: u16,
    pub limit: u16,
}

impl WaitTelemetry {
    #[must_use]
    pub const fn new(attempt: u8, polls: u16, limit: u16) -> Self {
        Self {
            attempt,
            polls,
            limit,
        }
    }
}

/// Fix summary recorded when a notification arrives.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FixTelemetry {
    pub attempt: u8,
    pub fix_id: u8,
    pub confidence: f32,
    pub satellites: u8,
    pub time_to_fix_ms: u32,
}

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Destination for telemetry emitted by the controller and scheduler.
pub trait TelemetrySink {
    /// Timestamp attached to each record.
    type Instant: Copy;

    /// Records an event with the supplied payload.
    fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: Self::Instant,
    ) -> EventId;
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the most recent record of the given kind, if still retained.
    #[must_use]
    pub fn latest_of(&self, event: TelemetryEventKind) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered().filter(|record| record.event == event).last()
    }

    /// Counts retained records of the given kind.
    #[must_use]
    pub fn count_of(&self, event: TelemetryEventKind) -> usize {
        self.ring
            .oldest_ordered()
            .filter(|record| record.event == event)
            .count()
    }

    /// Returns the number of records currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant, const CAPACITY: usize> TelemetrySink for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    type Instant = TInstant;

    fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes_round_trip() {
        let fixtures = [
            (TelemetryEventKind::CycleStarted, 0x0000),
            (TelemetryEventKind::ProviderSetupFailed, 0x0002),
            (TelemetryEventKind::AwaitingFix, 0x0011),
            (TelemetryEventKind::AttemptsExhausted, 0x0015),
            (TelemetryEventKind::FixTimedOut, 0x0021),
            (TelemetryEventKind::Idle, 0x0031),
        ];

        for (event, code) in fixtures {
            assert_eq!(event.to_raw(), code);
            assert_eq!(TelemetryEventKind::from_raw(code), event);
        }

        assert_eq!(
            TelemetryEventKind::from_raw(0x7F00),
            TelemetryEventKind::Custom(0x7F00)
        );
    }

    #[test]
    fn fatal_events_are_flagged() {
        assert!(TelemetryEventKind::FixTimedOut.is_fatal());
        assert!(TelemetryEventKind::CommandFailed.is_fatal());
        assert!(!TelemetryEventKind::FixRejected.is_fatal());
        assert!(!TelemetryEventKind::AttemptsExhausted.is_fatal());
    }

    #[test]
    fn recorder_assigns_sequential_ids_and_wraps_ring() {
        let mut recorder = TelemetryRecorder::<u64, 4>::new();

        for tick in 0..6u16 {
            recorder.record(
                TelemetryEventKind::AwaitingFix,
                TelemetryPayload::Wait(WaitTelemetry::new(1, tick, 300)),
                u64::from(tick) * 500,
            );
        }

        assert_eq!(recorder.len(), 4);
        let latest = recorder.latest().copied().expect("latest record missing");
        assert_eq!(latest.id, 5);
        assert_eq!(latest.timestamp, 2_500);

        let first = recorder.oldest_first().next().expect("oldest record missing");
        assert_eq!(first.id, 2);
        assert_eq!(recorder.count_of(TelemetryEventKind::AwaitingFix), 4);
    }

    #[test]
    fn latest_of_filters_by_kind() {
        let mut recorder = TelemetryRecorder::<u64>::new();
        recorder.record(
            TelemetryEventKind::AttemptStarted,
            TelemetryPayload::Attempt(AttemptTelemetry::new(1, 5)),
            0,
        );
        recorder.record(TelemetryEventKind::Idle, TelemetryPayload::none(), 10);

        let attempt = recorder
            .latest_of(TelemetryEventKind::AttemptStarted)
            .expect("attempt record missing");
        assert_eq!(
            attempt.details,
            TelemetryPayload::Attempt(AttemptTelemetry::new(1, 5))
        );
        assert!(recorder.latest_of(TelemetryEventKind::FixAccepted).is_none());
    }
}
