#![allow(dead_code)]

use core::fmt;
use core::time::Duration;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use gnss_core::acquisition::{FixProvider, PollClock};
use gnss_core::fix::{FixRecord, SatelliteInfo};
use gnss_core::mailbox::{FixMailbox, FixNotifier};
use gnss_core::telemetry::{TelemetryInstant, TelemetryRecorder};

pub const POLL: Duration = Duration::from_millis(500);
pub const IDLE: Duration = Duration::from_secs(5);

pub type Recorder = TelemetryRecorder<MockInstant, 512>;

#[derive(Copy, Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct MockInstant(u64);

impl MockInstant {
    pub fn micros(value: u64) -> Self {
        Self(value)
    }
}

impl TelemetryInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MockError {
    Configure,
    Busy,
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockError::Configure => f.write_str("configure rejected"),
            MockError::Busy => f.write_str("provider busy"),
        }
    }
}

/// Scripted outcome for one start command.
#[derive(Clone, Debug)]
pub enum Delivery {
    /// Deliver `fix` during the `polls`-th poll sleep; 0 delivers on start.
    After { polls: u16, fix: FixRecord },
    /// Never deliver.
    Never,
}

/// State shared between the mock provider and the mock clock.
#[derive(Default)]
pub struct Bench {
    pub script: VecDeque<Delivery>,
    pub notifier: Option<FixNotifier<'static>>,
    pub configure_calls: u32,
    pub starts: u32,
    pub fail_configure: bool,
    pub fail_start_on: Option<u32>,
    pub sleeps: Vec<Duration>,
    pub now: u64,
    pending: Option<(u16, FixRecord)>,
}

impl Bench {
    pub fn poll_sleeps(&self) -> usize {
        self.sleeps.iter().filter(|&&sleep| sleep == POLL).count()
    }

    pub fn idle_sleeps(&self) -> usize {
        self.sleeps.iter().filter(|&&sleep| sleep == IDLE).count()
    }

    fn deliver(&mut self, fix: FixRecord) {
        if let Some(notifier) = self.notifier {
            notifier.deliver(fix);
        }
    }
}

pub type SharedBench = Rc<RefCell<Bench>>;

pub struct MockProvider {
    bench: SharedBench,
}

impl FixProvider<'static> for MockProvider {
    type Error = MockError;

    async fn configure(&mut self) -> Result<(), MockError> {
        let mut bench = self.bench.borrow_mut();
        bench.configure_calls += 1;
        if bench.fail_configure {
            Err(MockError::Configure)
        } else {
            Ok(())
        }
    }

    fn register_fix_notifier(&mut self, notifier: FixNotifier<'static>) {
        self.bench.borrow_mut().notifier = Some(notifier);
    }

    async fn start_fix_attempt(&mut self) -> Result<(), MockError> {
        let mut bench = self.bench.borrow_mut();
        bench.starts += 1;
        if bench.fail_start_on == Some(bench.starts) {
            return Err(MockError::Busy);
        }

        match bench.script.pop_front() {
            Some(Delivery::After { polls: 0, fix }) => bench.deliver(fix),
            Some(Delivery::After { polls, fix }) => bench.pending = Some((polls, fix)),
            Some(Delivery::Never) | None => bench.pending = None,
        }
        Ok(())
    }
}

pub struct MockClock {
    bench: SharedBench,
}

impl PollClock for MockClock {
    type Instant = MockInstant;

    fn now(&self) -> MockInstant {
        MockInstant::micros(self.bench.borrow().now)
    }

    async fn sleep(&mut self, duration: Duration) {
        let mut bench = self.bench.borrow_mut();
        bench.now += u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        bench.sleeps.push(duration);

        if let Some((remaining, fix)) = bench.pending.take() {
            if remaining <= 1 {
                bench.deliver(fix);
            } else {
                bench.pending = Some((remaining - 1, fix));
            }
        }
    }
}

pub fn bench(script: impl IntoIterator<Item = Delivery>) -> (SharedBench, MockProvider, MockClock) {
    let bench = Rc::new(RefCell::new(Bench {
        script: script.into_iter().collect(),
        ..Bench::default()
    }));
    let provider = MockProvider {
        bench: Rc::clone(&bench),
    };
    let clock = MockClock {
        bench: Rc::clone(&bench),
    };
    (bench, provider, clock)
}

pub fn leaked_mailbox() -> &'static FixMailbox {
    Box::leak(Box::new(FixMailbox::new()))
}

pub fn fix(fix_id: u8, confidence: f32) -> FixRecord {
    let mut fix = FixRecord::new(fix_id, confidence, 47.3769, 8.5417).with_time_to_fix(32_000);
    fix.extend_satellites([
        SatelliteInfo::new(2, 41),
        SatelliteInfo::new(9, 30),
        SatelliteInfo::new(17, 22),
        SatelliteInfo::new(23, 12),
    ])
    .expect("fixture fits the satellite list");
    fix
}

/// One delivery per confidence, each arriving after `polls` polls.
pub fn deliveries(confidences: &[f32], polls: u16) -> Vec<Delivery> {
    confidences
        .iter()
        .zip(1u8..)
        .map(|(&confidence, fix_id)| Delivery::After {
            polls,
            fix: fix(fix_id, confidence),
        })
        .collect()
}
