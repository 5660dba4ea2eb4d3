//! Outer acquisition loop.
//!
//! One cycle acquires a fix, evaluates it, records the report, then idles.
//! The loop only ends on a run-level [`AcquisitionError`].

use crate::acquisition::{AcquisitionController, AcquisitionError, FixProvider, PollClock};
use crate::config::AcquisitionConfig;
use crate::mailbox::FixMailbox;
use crate::report::{FixReport, evaluate};
use crate::telemetry::{CycleTelemetry, TelemetryEventKind, TelemetryPayload, TelemetrySink};

/// Repeats acquisition cycles over one provider.
pub struct CycleScheduler<'m, P, C>
where
    P: FixProvider<'m>,
    C: PollClock,
{
    controller: AcquisitionController<'m, P, C>,
    config: AcquisitionConfig,
    cycles_completed: u32,
}

impl<'m, P, C> CycleScheduler<'m, P, C>
where
    P: FixProvider<'m>,
    C: PollClock,
{
    /// Registers the mailbox notifier with `provider`.
    pub fn new(provider: P, mailbox: &'m FixMailbox, clock: C, config: AcquisitionConfig) -> Self {
        Self {
            controller: AcquisitionController::new(provider, mailbox, clock, config.poll_interval),
            config,
            cycles_completed: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    #[must_use]
    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    #[must_use]
    pub fn controller(&self) -> &AcquisitionController<'m, P, C> {
        &self.controller
    }

    /// Runs one cycle: acquire, evaluate, report, idle.
    pub async fn run_cycle<T>(
        &mut self,
        telemetry: &mut T,
    ) -> Result<FixReport, AcquisitionError<P::Error>>
    where
        T: TelemetrySink<Instant = C::Instant>,
    {
        let config = self.config;
        telemetry.record(
            TelemetryEventKind::CycleStarted,
            TelemetryPayload::Cycle(CycleTelemetry {
                cycle: self.cycles_completed.wrapping_add(1),
            }),
            self.controller.clock().now(),
        );

        let fix = self
            .controller
            .acquire_fix(
                config.max_attempts,
                config.wait_timeout_ticks,
                config.confidence_threshold,
                telemetry,
            )
            .await?;

        let report = evaluate(&fix, config.confidence_threshold, config.strong_signal_floor);
        telemetry.record(
            TelemetryEventKind::CycleReport,
            TelemetryPayload::Report(report),
            self.controller.clock().now(),
        );
        self.cycles_completed = self.cycles_completed.wrapping_add(1);

        telemetry.record(
            TelemetryEventKind::Idle,
            TelemetryPayload::Idle(config.idle_between_cycles),
            self.controller.clock().now(),
        );
        self.controller
            .clock_mut()
            .sleep(config.idle_between_cycles)
            .await;

        Ok(report)
    }

    /// Configures the provider. Called once before the first cycle.
    pub async fn start<T>(&mut self, telemetry: &mut T) -> Result<(), AcquisitionError<P::Error>>
    where
        T: TelemetrySink<Instant = C::Instant>,
    {
        if let Err(source) = self.controller.provider_mut().configure().await {
            telemetry.record(
                TelemetryEventKind::ProviderSetupFailed,
                TelemetryPayload::none(),
                self.controller.clock().now(),
            );
            return Err(AcquisitionError::ProviderSetupFailed(source));
        }

        telemetry.record(
            TelemetryEventKind::ProviderReady,
            TelemetryPayload::none(),
            self.controller.clock().now(),
        );
        Ok(())
    }

    /// Configures the provider once, then cycles until a fatal error.
    pub async fn run<T>(&mut self, telemetry: &mut T) -> AcquisitionError<P::Error>
    where
        T: TelemetrySink<Instant = C::Instant>,
    {
        if let Err(error) = self.start(telemetry).await {
            return error;
        }

        loop {
            if let Err(error) = self.run_cycle(telemetry).await {
                return error;
            }
        }
    }
}
