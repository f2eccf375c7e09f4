//! Mode controller lifecycle against a simulated node.
//!
//! Covers connect, mode start/toggle/stop, manual frequency edits and the
//! single-job guarantee.

mod common;

use common::{connect_mock, test_config, wait_until};
use rssi_scanner::protocol::{READ_REVISION_CODE, WRITE_FREQUENCY};
use rssi_scanner::transport::{DynTransport, MockDevice};
use rssi_scanner::{Mode, ModeController, ScannerError};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn connect_reads_initial_frequency() {
    let (controller, mut channels, mock) = connect_mock(&test_config(), MockDevice::new(5800));

    assert_eq!(controller.startup().frequency, Some(5800));
    assert_eq!(controller.startup().api_level, None);
    assert_eq!(channels.state().frequency, Some(5800));
    assert_eq!(controller.active_mode(), None);
    assert_eq!(controller.scheduled_jobs(), 0);
    assert_eq!(mock.request_count(READ_REVISION_CODE), 0);

    controller.shutdown().unwrap();
}

#[test]
fn connect_probes_api_level_when_enabled() {
    let mut config = test_config();
    config.device.probe_api_level = true;
    let device = MockDevice::new(5800);
    device.handle().set_api_level(35);

    let (controller, _channels, _mock) = connect_mock(&config, device);
    assert_eq!(controller.startup().api_level, Some(35));
    controller.shutdown().unwrap();
}

#[test]
fn device_open_failure_is_fatal() {
    let result = ModeController::connect(&test_config(), || -> rssi_scanner::ScannerResult<DynTransport> {
        Err(rssi_scanner::error::TransportError::Closed.into())
    });

    let Err(err) = result else {
        panic!("connect should fail");
    };
    assert!(matches!(err, ScannerError::DeviceOpen(_)));
    assert!(err.is_fatal());
}

#[test]
fn invalid_config_is_rejected_before_open() {
    let mut config = test_config();
    config.signal.num_samples = 0;
    let result = ModeController::connect(&config, || {
        panic!("device must not be opened with an invalid config")
    });
    assert!(matches!(result, Err(ScannerError::Configuration(_))));
}

#[test]
fn default_mode_is_scan() {
    let (mut controller, _channels, _mock) = connect_mock(&test_config(), MockDevice::new(5800));
    controller.start_default_mode().unwrap();
    assert_eq!(controller.active_mode(), Some(Mode::Scan));
    assert_eq!(controller.scheduled_jobs(), 1);
    controller.shutdown().unwrap();
}

#[test]
fn toggling_twice_restores_mode_with_exactly_one_job() {
    let (mut controller, mut channels, _mock) =
        connect_mock(&test_config(), MockDevice::new(5800));

    controller.start_default_mode().unwrap();
    assert_eq!(controller.scheduled_jobs(), 1);

    assert_eq!(controller.toggle_mode().unwrap(), Mode::Signal);
    assert_eq!(controller.active_mode(), Some(Mode::Signal));
    assert_eq!(controller.scheduled_jobs(), 1);
    assert_eq!(channels.state().mode, Some(Mode::Signal));

    assert_eq!(controller.toggle_mode().unwrap(), Mode::Scan);
    assert_eq!(controller.active_mode(), Some(Mode::Scan));
    assert_eq!(controller.scheduled_jobs(), 1);

    // the job keeps running after the switch
    let ticks = channels.state().ticks;
    assert!(wait_until(WAIT, || channels.state().ticks > ticks + 2));
    assert_eq!(controller.scheduled_jobs(), 1);

    controller.shutdown().unwrap();
}

#[test]
fn toggle_from_idle_starts_default_mode() {
    let (mut controller, _channels, _mock) = connect_mock(&test_config(), MockDevice::new(5800));
    assert_eq!(controller.toggle_mode().unwrap(), Mode::Scan);
    controller.shutdown().unwrap();
}

#[test]
fn stop_cancels_the_job() {
    let (mut controller, mut channels, _mock) =
        connect_mock(&test_config(), MockDevice::new(5800));
    controller.start(Mode::Signal).unwrap();

    assert_eq!(controller.stop().unwrap(), Some(Mode::Signal));
    assert_eq!(controller.active_mode(), None);
    assert_eq!(controller.scheduled_jobs(), 0);
    assert!(channels.series().mode().is_none());
    assert_eq!(channels.state().mode, None);

    let ticks = channels.state().ticks;
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(channels.state().ticks, ticks);

    controller.shutdown().unwrap();
}

#[test]
fn stop_does_not_wait_for_a_stalled_exchange() {
    let mut config = test_config();
    config.device.timeout_ms = 800;
    let (mut controller, _channels, mock) = connect_mock(&config, MockDevice::new(5800));

    controller.start(Mode::Signal).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    // the next request goes unanswered and blocks for the full timeout
    mock.inject(rssi_scanner::transport::MockFault::Silent);
    std::thread::sleep(Duration::from_millis(30));

    let started = Instant::now();
    controller.stop().unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(controller.scheduled_jobs(), 0);

    controller.shutdown().unwrap();
}

#[test]
fn manual_frequency_ignored_while_scanning() {
    let (mut controller, _channels, mock) = connect_mock(&test_config(), MockDevice::new(5800));
    controller.start_default_mode().unwrap();

    assert_eq!(controller.set_frequency_manually(5740).unwrap(), None);
    assert_eq!(controller.active_mode(), Some(Mode::Scan));
    controller.stop().unwrap();
    assert!(!mock.written_frequencies().contains(&5740));

    controller.shutdown().unwrap();
}

#[test]
fn manual_frequency_out_of_range_never_reaches_device() {
    let (mut controller, _channels, mock) = connect_mock(&test_config(), MockDevice::new(5800));
    controller.start(Mode::Signal).unwrap();

    let err = controller.set_frequency_manually(6000).unwrap_err();
    assert!(matches!(
        err,
        ScannerError::Range {
            frequency: 6000,
            min: 5645,
            max: 5945
        }
    ));
    assert!(!err.is_fatal());
    assert_eq!(mock.request_count(WRITE_FREQUENCY), 0);
    assert_eq!(controller.active_mode(), Some(Mode::Signal));

    controller.shutdown().unwrap();
}

#[test]
fn manual_frequency_in_signal_mode_retunes_and_resets_buffers() {
    let (mut controller, mut channels, mock) =
        connect_mock(&test_config(), MockDevice::new(5800));
    controller.start(Mode::Signal).unwrap();

    assert!(wait_until(WAIT, || live_samples(&mut channels) >= 10));

    assert_eq!(controller.set_frequency_manually(5740).unwrap(), Some(5740));
    assert_eq!(mock.frequency(), 5740);
    assert_eq!(channels.state().frequency, Some(5740));
    assert!(live_samples(&mut channels) < 10);
    assert_eq!(controller.active_mode(), Some(Mode::Signal));
    assert_eq!(controller.scheduled_jobs(), 1);

    controller.shutdown().unwrap();
}

#[test]
fn manual_frequency_while_idle_just_retunes() {
    let (mut controller, _channels, mock) = connect_mock(&test_config(), MockDevice::new(5800));
    assert_eq!(controller.set_frequency_manually(5645).unwrap(), Some(5645));
    assert_eq!(mock.frequency(), 5645);
    assert_eq!(controller.scheduled_jobs(), 0);
    controller.shutdown().unwrap();
}

#[test]
fn manual_frequency_mismatch_is_reported() {
    let (mut controller, mut channels, mock) =
        connect_mock(&test_config(), MockDevice::new(5800));
    mock.set_stuck(true);

    let err = controller.set_frequency_manually(5700).unwrap_err();
    assert!(matches!(
        err,
        ScannerError::FrequencyMismatch {
            requested: 5700,
            reported: 5800
        }
    ));
    assert_eq!(mock.written_frequencies(), vec![5700; 5]);
    assert!(channels.state().last_error.is_some());

    controller.shutdown().unwrap();
}

fn live_samples(channels: &mut rssi_scanner::channels::PresentationChannels) -> usize {
    match channels.series().as_ref() {
        rssi_scanner::acquisition::SeriesSnapshot::Signal(signal) => signal.live.size(),
        _ => 0,
    }
}
