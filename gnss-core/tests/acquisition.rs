mod support;

use embassy_futures::block_on;
use gnss_core::acquisition::{AcquisitionController, AcquisitionError};
use gnss_core::report::evaluate;
use gnss_core::telemetry::{TelemetryEventKind, TelemetryPayload, WaitTelemetry};

use support::{Delivery, MockError, POLL, Recorder, bench, deliveries, fix, leaked_mailbox};

const THRESHOLD: f32 = 100.0;

#[test]
fn exhausted_attempts_return_last_fix() {
    for max_attempts in 1..=5u8 {
        let confidences = vec![150.0; usize::from(max_attempts) + 2];
        let (bench, provider, clock) = bench(deliveries(&confidences, 2));
        let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
        let mut telemetry = Recorder::new();

        let fix = block_on(controller.acquire_fix(max_attempts, 300, THRESHOLD, &mut telemetry))
            .expect("low confidence is not an error");

        assert_eq!(bench.borrow().starts, u32::from(max_attempts));
        assert_eq!(fix.fix_id, max_attempts, "last received record must be returned");
        assert_eq!(telemetry.count_of(TelemetryEventKind::FixRejected), usize::from(max_attempts));
        assert_eq!(telemetry.count_of(TelemetryEventKind::AttemptsExhausted), 1);
        assert_eq!(controller.state().attempts_remaining, 0);
    }
}

#[test]
fn first_acceptable_fix_stops_retries() {
    let (bench, provider, clock) = bench(deliveries(&[150.0, 60.0, 20.0], 1));
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    let fix = block_on(controller.acquire_fix(5, 300, THRESHOLD, &mut telemetry))
        .expect("acquisition should succeed");

    assert_eq!(fix.fix_id, 2);
    assert_eq!(bench.borrow().starts, 2, "no attempt may follow an acceptable fix");
    assert_eq!(telemetry.count_of(TelemetryEventKind::FixAccepted), 1);
    assert_eq!(telemetry.count_of(TelemetryEventKind::AttemptsExhausted), 0);

    let state = controller.state();
    assert!(!state.fix_pending);
    assert_eq!(state.attempts_remaining, 3);
    assert_eq!(state.last_fix.as_ref().map(|last| last.fix_id), Some(2));
}

#[test]
fn third_attempt_accepted_after_two_rejections() {
    let (bench, provider, clock) = bench(deliveries(&[150.0, 120.0, 80.0], 4));
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    let fix = block_on(controller.acquire_fix(3, 300, THRESHOLD, &mut telemetry))
        .expect("acquisition should succeed");
    let report = evaluate(&fix, THRESHOLD, 30);

    assert_eq!(fix.fix_id, 3);
    assert!(report.accepted);
    assert_eq!(report.position(), Some((47.3769, 8.5417)));
    assert_eq!(bench.borrow().starts, 3);
    assert_eq!(bench.borrow().poll_sleeps(), 12);
}

#[test]
fn exhausted_low_confidence_reports_sentinel() {
    let (bench, provider, clock) = bench(deliveries(&[150.0, 130.0], 1));
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    let fix = block_on(controller.acquire_fix(2, 300, THRESHOLD, &mut telemetry))
        .expect("low confidence is not an error");
    let report = evaluate(&fix, THRESHOLD, 30);

    assert_eq!(fix.fix_id, 2);
    assert!(!report.accepted);
    assert_eq!((report.latitude, report.longitude), (0.0, 0.0));
    assert_eq!(report.estimated_confidence, 130.0);
    assert_eq!(report.satellite_count, 4);
    assert_eq!(report.strong_signal_count, 2);
    assert_eq!(bench.borrow().starts, 2);
}

#[test]
fn missing_notification_times_out_after_exact_poll_count() {
    let (bench, provider, clock) = bench([Delivery::Never]);
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    let error = block_on(controller.acquire_fix(5, 3, THRESHOLD, &mut telemetry))
        .expect_err("no notification must time out");

    assert_eq!(error, AcquisitionError::FixTimeout { attempt: 1, polls: 3 });
    assert_eq!(bench.borrow().poll_sleeps(), 3);
    assert_eq!(bench.borrow().starts, 1, "timeouts are not retried");
    assert_eq!(telemetry.count_of(TelemetryEventKind::AwaitingFix), 3);

    let timeout = telemetry
        .latest_of(TelemetryEventKind::FixTimedOut)
        .expect("timeout must be recorded");
    assert_eq!(
        timeout.details,
        TelemetryPayload::Wait(WaitTelemetry::new(1, 3, 3))
    );
    assert!(controller.state().fix_pending);
}

#[test]
fn notification_on_last_poll_is_not_a_timeout() {
    let (bench, provider, clock) = bench(deliveries(&[40.0], 3));
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    let fix = block_on(controller.acquire_fix(5, 3, THRESHOLD, &mut telemetry))
        .expect("fix within the window must be taken");

    assert_eq!(fix.fix_id, 1);
    assert_eq!(bench.borrow().poll_sleeps(), 3);
    assert_eq!(telemetry.count_of(TelemetryEventKind::FixTimedOut), 0);
}

#[test]
fn immediate_notification_needs_no_poll() {
    let (bench, provider, clock) = bench(deliveries(&[40.0], 0));
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    let fix = block_on(controller.acquire_fix(5, 3, THRESHOLD, &mut telemetry))
        .expect("acquisition should succeed");

    assert_eq!(fix.fix_id, 1);
    assert!(bench.borrow().sleeps.is_empty());
}

#[test]
fn start_command_failure_is_fatal() {
    let (bench, provider, clock) = bench(deliveries(&[150.0, 10.0, 10.0], 1));
    bench.borrow_mut().fail_start_on = Some(2);
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    let error = block_on(controller.acquire_fix(5, 300, THRESHOLD, &mut telemetry))
        .expect_err("refused start must abort the run");

    assert_eq!(
        error,
        AcquisitionError::ProviderCommandFailed {
            attempt: 2,
            source: MockError::Busy
        }
    );
    assert_eq!(bench.borrow().starts, 2);
    assert_eq!(telemetry.count_of(TelemetryEventKind::CommandFailed), 1);
    assert_eq!(error.to_string(), "attempt 2: start command failed: provider busy");
}

#[test]
fn stale_record_is_cleared_before_start() {
    let mailbox = leaked_mailbox();
    let (bench, provider, clock) = bench([Delivery::Never]);
    let mut controller = AcquisitionController::new(provider, mailbox, clock, POLL);
    let mut telemetry = Recorder::new();

    mailbox.notifier().deliver(fix(99, 1.0));

    let error = block_on(controller.acquire_fix(1, 2, THRESHOLD, &mut telemetry))
        .expect_err("stale record must not satisfy the attempt");

    assert_eq!(error, AcquisitionError::FixTimeout { attempt: 1, polls: 2 });
    assert_eq!(bench.borrow().starts, 1);
}

#[test]
fn zero_budgets_behave_as_one() {
    let (bench, provider, clock) = bench([Delivery::Never]);
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    let error = block_on(controller.acquire_fix(0, 0, THRESHOLD, &mut telemetry))
        .expect_err("no notification must time out");

    assert_eq!(error, AcquisitionError::FixTimeout { attempt: 1, polls: 1 });
    assert_eq!(bench.borrow().poll_sleeps(), 1);
}

#[test]
fn wait_ticks_are_recorded_in_order() {
    let (_bench, provider, clock) = bench(deliveries(&[40.0], 2));
    let mut controller = AcquisitionController::new(provider, leaked_mailbox(), clock, POLL);
    let mut telemetry = Recorder::new();

    block_on(controller.acquire_fix(1, 10, THRESHOLD, &mut telemetry))
        .expect("acquisition should succeed");

    let events: Vec<_> = telemetry.oldest_first().map(|record| record.event).collect();
    assert_eq!(
        events,
        [
            TelemetryEventKind::AttemptStarted,
            TelemetryEventKind::AwaitingFix,
            TelemetryEventKind::AwaitingFix,
            TelemetryEventKind::FixDelivered,
            TelemetryEventKind::FixAccepted,
        ]
    );

    let polls: Vec<_> = telemetry
        .oldest_first()
        .filter_map(|record| match record.details {
            TelemetryPayload::Wait(wait) => Some(wait.polls),
            _ => None,
        })
        .collect();
    assert_eq!(polls, [0, 1]);
}
