//! Bounded-retry fix acquisition.
//!
//! Each attempt clears the mailbox, commands the provider, then polls the
//! mailbox at a fixed interval until a record arrives or the tick budget runs
//! out. Low-confidence fixes are retried; command failures and timeouts end the
//! run.

use core::{fmt, time::Duration};

use crate::fix::FixRecord;
use crate::mailbox::{FixInbox, FixMailbox, FixNotifier};
use crate::report::is_acceptable;
use crate::telemetry::{
    AttemptTelemetry, FixTelemetry, TelemetryEventKind, TelemetryInstant, TelemetryPayload,
    TelemetrySink, WaitTelemetry,
};

/// External subsystem that computes position fixes in the background.
///
/// Completed fixes are published through the notifier handed over in
/// [`FixProvider::register_fix_notifier`], one record per started attempt.
pub trait FixProvider<'m> {
    type Error;

    /// One-time receiver setup, issued before the first cycle.
    async fn configure(&mut self) -> Result<(), Self::Error>;

    /// Installs the capability used to publish completed fixes.
    fn register_fix_notifier(&mut self, notifier: FixNotifier<'m>);

    /// Commands a single fix computation.
    async fn start_fix_attempt(&mut self) -> Result<(), Self::Error>;
}

/// Time source driving the wait loop and the idle delay.
pub trait PollClock {
    type Instant: TelemetryInstant;

    fn now(&self) -> Self::Instant;

    async fn sleep(&mut self, duration: Duration);
}

/// Run-level failures surfaced to the scheduler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquisitionError<E> {
    /// `configure` failed before the first cycle.
    ProviderSetupFailed(E),
    /// The provider refused a start command.
    ProviderCommandFailed { attempt: u8, source: E },
    /// No notification arrived within the wait window.
    FixTimeout { attempt: u8, polls: u16 },
}

impl<E> AcquisitionError<E> {
    /// Telemetry event matching this failure.
    #[must_use]
    pub const fn event(&self) -> TelemetryEventKind {
        match self {
            AcquisitionError::ProviderSetupFailed(_) => TelemetryEventKind::ProviderSetupFailed,
            AcquisitionError::ProviderCommandFailed { .. } => TelemetryEventKind::CommandFailed,
            AcquisitionError::FixTimeout { .. } => TelemetryEventKind::FixTimedOut,
        }
    }
}

impl<E: fmt::Display> fmt::Display for AcquisitionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::ProviderSetupFailed(source) => {
                write!(f, "fix provider setup failed: {source}")
            }
            AcquisitionError::ProviderCommandFailed { attempt, source } => {
                write!(f, "attempt {attempt}: start command failed: {source}")
            }
            AcquisitionError::FixTimeout { attempt, polls } => {
                write!(f, "attempt {attempt}: no fix after {polls} polls")
            }
        }
    }
}

/// Per-cycle bookkeeping, reset by every [`AcquisitionController::acquire_fix`] call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AcquisitionState {
    pub attempts_remaining: u8,
    /// A start command is outstanding and its notification has not been taken.
    pub fix_pending: bool,
    /// Record from the most recent notification of the current attempt.
    pub last_fix: Option<FixRecord>,
}

impl AcquisitionState {
    const fn new(attempts: u8) -> Self {
        Self {
            attempts_remaining: attempts,
            fix_pending: false,
            last_fix: None,
        }
    }
}

/// Drives a [`FixProvider`] through bounded retry attempts.
pub struct AcquisitionController<'m, P, C>
where
    P: FixProvider<'m>,
    C: PollClock,
{
    provider: P,
    inbox: FixInbox<'m>,
    clock: C,
    poll_interval: Duration,
    state: AcquisitionState,
}

impl<'m, P, C> AcquisitionController<'m, P, C>
where
    P: FixProvider<'m>,
    C: PollClock,
{
    /// Wires `provider` to `mailbox` and keeps the consuming side.
    pub fn new(mut provider: P, mailbox: &'m FixMailbox, clock: C, poll_interval: Duration) -> Self {
        provider.register_fix_notifier(mailbox.notifier());

        Self {
            provider,
            inbox: mailbox.inbox(),
            clock,
            poll_interval,
            state: AcquisitionState::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> &AcquisitionState {
        &self.state
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Obtains one fix, retrying while confidence exceeds `confidence_threshold`.
    ///
    /// Returns the first acceptable record, or the last record once
    /// `max_attempts` are spent. Zero budgets are treated as one.
    pub async fn acquire_fix<T>(
        &mut self,
        max_attempts: u8,
        timeout_ticks: u16,
        confidence_threshold: f32,
        telemetry: &mut T,
    ) -> Result<FixRecord, AcquisitionError<P::Error>>
    where
        T: TelemetrySink<Instant = C::Instant>,
    {
        let max_attempts = max_attempts.max(1);
        let timeout_ticks = timeout_ticks.max(1);
        self.state = AcquisitionState::new(max_attempts);

        let mut attempt: u8 = 1;
        loop {
            self.inbox.clear();
            self.state.fix_pending = false;
            self.state.last_fix = None;

            let counters = AttemptTelemetry::new(attempt, max_attempts);
            telemetry.record(
                TelemetryEventKind::AttemptStarted,
                TelemetryPayload::Attempt(counters),
                self.clock.now(),
            );

            if let Err(source) = self.provider.start_fix_attempt().await {
                telemetry.record(
                    TelemetryEventKind::CommandFailed,
                    TelemetryPayload::Attempt(counters),
                    self.clock.now(),
                );
                return Err(AcquisitionError::ProviderCommandFailed { attempt, source });
            }
            self.state.fix_pending = true;
            self.state.attempts_remaining = max_attempts - attempt;

            let fix = self.await_fix(attempt, timeout_ticks, telemetry).await?;
            self.state.fix_pending = false;
            self.state.last_fix = Some(fix.clone());

            let summary = TelemetryPayload::Fix(FixTelemetry {
                attempt,
                fix_id: fix.fix_id,
                confidence: fix.estimated_confidence,
                satellites: fix.satellite_count(),
                time_to_fix_ms: fix.time_to_fix_ms,
            });
            telemetry.record(TelemetryEventKind::FixDelivered, summary, self.clock.now());

            if is_acceptable(fix.estimated_confidence, confidence_threshold) {
                telemetry.record(TelemetryEventKind::FixAccepted, summary, self.clock.now());
                return Ok(fix);
            }

            telemetry.record(TelemetryEventKind::FixRejected, summary, self.clock.now());
            if attempt >= max_attempts {
                telemetry.record(
                    TelemetryEventKind::AttemptsExhausted,
                    TelemetryPayload::Attempt(counters),
                    self.clock.now(),
                );
                return Ok(fix);
            }
            attempt += 1;
        }
    }

    async fn await_fix<T>(
        &mut self,
        attempt: u8,
        timeout_ticks: u16,
        telemetry: &mut T,
    ) -> Result<FixRecord, AcquisitionError<P::Error>>
    where
        T: TelemetrySink<Instant = C::Instant>,
    {
        let mut polls: u16 = 0;
        loop {
            if let Some(fix) = self.inbox.try_take() {
                return Ok(fix);
            }

            let progress = TelemetryPayload::Wait(WaitTelemetry::new(attempt, polls, timeout_ticks));
            if polls >= timeout_ticks {
                telemetry.record(TelemetryEventKind::FixTimedOut, progress, self.clock.now());
                return Err(AcquisitionError::FixTimeout { attempt, polls });
            }

            telemetry.record(TelemetryEventKind::AwaitingFix, progress, self.clock.now());
            polls += 1;
            self.clock.sleep(self.poll_interval).await;
        }
    }
}
