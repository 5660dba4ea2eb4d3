use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant as StdInstant};

use crossterm::style::Stylize;
use gnss_core::acquisition::{AcquisitionError, FixProvider, PollClock};
use gnss_core::config::AcquisitionConfig;
use gnss_core::fix::{FixRecord, SatelliteInfo};
use gnss_core::mailbox::{FixMailbox, FixNotifier};
use gnss_core::report::FixReport;
use gnss_core::scheduler::CycleScheduler;
use gnss_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecorder,
    TelemetrySink,
};

const BASE_LATITUDE: f64 = 47.376_9;
const BASE_LONGITUDE: f64 = 8.541_7;
const SIMULATED_SATELLITES: u8 = 8;

/// Behaviour of the simulated modem.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ModemProfile {
    /// Confidence improves over three attempts, the last one passes.
    Nominal,
    /// Every fix stays above the default threshold.
    Weak,
    /// Start commands succeed but no fix is ever delivered.
    Stuck,
    /// Start commands are refused.
    Offline,
}

impl ModemProfile {
    pub const TAGS: &'static str = "nominal|weak|stuck|offline";

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("nominal") {
            Ok(Self::Nominal)
        } else if tag.eq_ignore_ascii_case("weak") {
            Ok(Self::Weak)
        } else if tag.eq_ignore_ascii_case("stuck") {
            Ok(Self::Stuck)
        } else if tag.eq_ignore_ascii_case("offline") {
            Ok(Self::Offline)
        } else {
            Err(format!("Unknown modem profile `{tag}`"))
        }
    }

    /// Confidence of the fix produced by the `attempt`-th start command, if any.
    fn confidence(self, attempt: u32) -> Option<f32> {
        const NOMINAL: [f32; 3] = [180.0, 120.0, 45.0];
        const WEAK: [f32; 3] = [190.0, 150.0, 130.0];

        let index = usize::try_from(attempt % 3).unwrap_or(0);
        match self {
            ModemProfile::Nominal => Some(NOMINAL[index]),
            ModemProfile::Weak => Some(WEAK[index]),
            ModemProfile::Stuck | ModemProfile::Offline => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SimulatedModemError {
    NotConfigured,
    Unreachable,
}

impl std::fmt::Display for SimulatedModemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulatedModemError::NotConfigured => f.write_str("modem not configured"),
            SimulatedModemError::Unreachable => f.write_str("modem unreachable"),
        }
    }
}

/// Fix provider that completes fixes on a background thread.
pub struct SimulatedModem {
    profile: ModemProfile,
    fix_delay: Duration,
    notifier: Option<FixNotifier<'static>>,
    configured: bool,
    attempts: u32,
}

impl SimulatedModem {
    pub fn new(profile: ModemProfile, fix_delay: Duration) -> Self {
        Self {
            profile,
            fix_delay,
            notifier: None,
            configured: false,
            attempts: 0,
        }
    }

    fn build_fix(&self, confidence: f32) -> FixRecord {
        let attempt = self.attempts;
        let jitter = f64::from(attempt % 7) * 0.000_1;
        let fix_id = u8::try_from(attempt % 256).unwrap_or(u8::MAX);
        let time_to_fix_ms = u32::try_from(self.fix_delay.as_millis()).unwrap_or(u32::MAX);

        let mut fix = FixRecord::new(
            fix_id,
            confidence,
            BASE_LATITUDE + jitter,
            BASE_LONGITUDE - jitter,
        )
        .with_time_to_fix(time_to_fix_ms)
        .with_height(408.0);

        let satellites = (1..=SIMULATED_SATELLITES).map(|number| {
            let offset = u32::from(number) * 7 + attempt * 3;
            let strength = 15 + u8::try_from(offset % 30).unwrap_or(0);
            SatelliteInfo::new(number * 3, strength)
        });
        let filled = fix.extend_satellites(satellites);
        debug_assert!(filled.is_ok(), "simulated satellites exceed list capacity");
        fix
    }
}

impl FixProvider<'static> for SimulatedModem {
    type Error = SimulatedModemError;

    async fn configure(&mut self) -> Result<(), SimulatedModemError> {
        self.configured = true;
        Ok(())
    }

    fn register_fix_notifier(&mut self, notifier: FixNotifier<'static>) {
        self.notifier = Some(notifier);
    }

    async fn start_fix_attempt(&mut self) -> Result<(), SimulatedModemError> {
        if !self.configured {
            return Err(SimulatedModemError::NotConfigured);
        }
        if self.profile == ModemProfile::Offline {
            return Err(SimulatedModemError::Unreachable);
        }

        self.attempts += 1;
        let Some(confidence) = self.profile.confidence(self.attempts - 1) else {
            return Ok(());
        };
        let Some(notifier) = self.notifier else {
            return Ok(());
        };

        let fix = self.build_fix(confidence);
        let delay = self.fix_delay;
        thread::spawn(move || {
            thread::sleep(delay);
            notifier.deliver(fix);
        });
        Ok(())
    }
}

/// Monotonic host timestamp.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct HostInstant(StdInstant);

impl TelemetryInstant for HostInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }
}

/// Wall-clock sleeps on the calling thread.
pub struct HostClock;

impl PollClock for HostClock {
    type Instant = HostInstant;

    fn now(&self) -> HostInstant {
        HostInstant(StdInstant::now())
    }

    async fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Prints telemetry to a console writer and, optionally, a plain transcript file.
pub struct ConsoleTelemetry<W: Write> {
    console: W,
    transcript: Option<BufWriter<File>>,
    started_at: HostInstant,
    recorder: TelemetryRecorder<HostInstant>,
    verbose: bool,
    io_error: Option<io::Error>,
    accepted_reports: u32,
    rejected_reports: u32,
}

impl<W: Write> ConsoleTelemetry<W> {
    pub fn new(console: W, verbose: bool) -> Self {
        Self {
            console,
            transcript: None,
            started_at: HostClock.now(),
            recorder: TelemetryRecorder::new(),
            verbose,
            io_error: None,
            accepted_reports: 0,
            rejected_reports: 0,
        }
    }

    pub fn with_transcript(mut self, path: &Path) -> io::Result<Self> {
        let mut transcript = BufWriter::new(File::create(path)?);
        writeln!(transcript, "GNSS acquisition emulator transcript")?;
        self.transcript = Some(transcript);
        Ok(self)
    }

    pub fn recorder(&self) -> &TelemetryRecorder<HostInstant> {
        &self.recorder
    }

    pub fn report_counts(&self) -> (u32, u32) {
        (self.accepted_reports, self.rejected_reports)
    }

    /// Flushes output and returns the first I/O error seen while logging.
    pub fn finish(&mut self) -> io::Result<()> {
        if let Some(error) = self.io_error.take() {
            return Err(error);
        }
        self.console.flush()?;
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.flush()?;
        }
        Ok(())
    }

    fn write_line(&mut self, elapsed: Duration, event: TelemetryEventKind, line: &str) {
        let stamp = format!("[{:>9.3}s]", elapsed.as_secs_f64());
        let styled = match event {
            TelemetryEventKind::FixAccepted => line.green().to_string(),
            TelemetryEventKind::FixRejected | TelemetryEventKind::AttemptsExhausted => {
                line.yellow().to_string()
            }
            kind if kind.is_fatal() => line.red().bold().to_string(),
            TelemetryEventKind::CycleReport => line.bold().to_string(),
            _ => line.to_owned(),
        };

        let mut result = writeln!(self.console, "{} {styled}", stamp.as_str().dark_grey());
        if let Some(transcript) = self.transcript.as_mut() {
            result = result.and_then(|()| writeln!(transcript, "{stamp} {line}"));
        }
        if let Err(error) = result
            && self.io_error.is_none()
        {
            self.io_error = Some(error);
        }
    }
}

impl<W: Write> TelemetrySink for ConsoleTelemetry<W> {
    type Instant = HostInstant;

    fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: HostInstant,
    ) -> EventId {
        let id = self.recorder.record(event, payload, timestamp);

        if let TelemetryPayload::Report(report) = payload {
            if report.accepted {
                self.accepted_reports += 1;
            } else {
                self.rejected_reports += 1;
            }
        }

        let quiet = matches!(event, TelemetryEventKind::AwaitingFix) && !self.verbose;
        if !quiet {
            let elapsed = timestamp.saturating_duration_since(self.started_at);
            let line = describe(event, &payload);
            self.write_line(elapsed, event, &line);
        }
        id
    }
}

/// Human-readable rendering of one telemetry record.
pub fn describe(event: TelemetryEventKind, payload: &TelemetryPayload) -> String {
    match (event, payload) {
        (TelemetryEventKind::CycleStarted, TelemetryPayload::Cycle(cycle)) => {
            format!("cycle {}", cycle.cycle)
        }
        (TelemetryEventKind::AttemptStarted, TelemetryPayload::Attempt(attempt)) => format!(
            "starting fix attempt {}/{}",
            attempt.attempt, attempt.max_attempts
        ),
        (TelemetryEventKind::AwaitingFix, TelemetryPayload::Wait(wait)) => {
            format!("waiting for fix... {}/{}", wait.polls, wait.limit)
        }
        (TelemetryEventKind::FixDelivered, TelemetryPayload::Fix(fix)) => format!(
            "fix {} delivered after {}ms ({} satellites)",
            fix.fix_id, fix.time_to_fix_ms, fix.satellites
        ),
        (TelemetryEventKind::FixAccepted, TelemetryPayload::Fix(fix)) => {
            format!("fix {} accepted, confidence {:.2}", fix.fix_id, fix.confidence)
        }
        (TelemetryEventKind::FixRejected, TelemetryPayload::Fix(fix)) => {
            format!("fix {} rejected, confidence {:.2}", fix.fix_id, fix.confidence)
        }
        (TelemetryEventKind::AttemptsExhausted, TelemetryPayload::Attempt(attempt)) => format!(
            "{} attempts exhausted, reporting last fix",
            attempt.max_attempts
        ),
        (TelemetryEventKind::CommandFailed, TelemetryPayload::Attempt(attempt)) => {
            format!("failed to start fix attempt {}", attempt.attempt)
        }
        (TelemetryEventKind::FixTimedOut, TelemetryPayload::Wait(wait)) => {
            format!("fix timed out after {} polls", wait.polls)
        }
        (TelemetryEventKind::CycleReport, TelemetryPayload::Report(report)) => {
            describe_report(report)
        }
        (TelemetryEventKind::Idle, TelemetryPayload::Idle(idle)) => {
            format!("sleeping for {}ms", idle.as_millis())
        }
        (kind, _) => kind.label().replace('-', " "),
    }
}

fn describe_report(report: &FixReport) -> String {
    let verdict = if report.accepted {
        "fix received"
    } else {
        "invalid fix (low confidence)"
    };
    format!(
        "{verdict}: confidence {:.2} latitude {:.6} longitude {:.6} satellites {} strong signals {}",
        report.estimated_confidence,
        report.latitude,
        report.longitude,
        report.satellite_count,
        report.strong_signal_count
    )
}

pub type SessionError = AcquisitionError<SimulatedModemError>;

/// Scheduler wired to a simulated modem and a console sink.
pub struct Session<W: Write> {
    scheduler: CycleScheduler<'static, SimulatedModem, HostClock>,
    telemetry: ConsoleTelemetry<W>,
    started: bool,
}

impl<W: Write> Session<W> {
    /// Fix delay is a few poll intervals so the wait loop is visible.
    pub fn new(
        profile: ModemProfile,
        config: AcquisitionConfig,
        mailbox: &'static FixMailbox,
        telemetry: ConsoleTelemetry<W>,
    ) -> Self {
        let fix_delay = config.poll_interval.saturating_mul(3);
        let modem = SimulatedModem::new(profile, fix_delay);

        Self {
            scheduler: CycleScheduler::new(modem, mailbox, HostClock, config),
            telemetry,
            started: false,
        }
    }

    /// Runs `cycles` cycles, or until a fatal error when `None`.
    pub fn run(&mut self, cycles: Option<u32>) -> Result<u32, SessionError> {
        if !self.started {
            embassy_futures::block_on(self.scheduler.start(&mut self.telemetry))?;
            self.started = true;
        }

        match cycles {
            Some(count) => {
                for _ in 0..count {
                    embassy_futures::block_on(self.scheduler.run_cycle(&mut self.telemetry))?;
                }
                Ok(self.scheduler.cycles_completed())
            }
            None => loop {
                embassy_futures::block_on(self.scheduler.run_cycle(&mut self.telemetry))?;
            },
        }
    }

    pub fn cycles_completed(&self) -> u32 {
        self.scheduler.cycles_completed()
    }

    pub fn telemetry(&self) -> &ConsoleTelemetry<W> {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut ConsoleTelemetry<W> {
        &mut self.telemetry
    }
}
