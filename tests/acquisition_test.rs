//! Scan and signal acquisition end to end against a simulated node.

mod common;

use common::{connect_mock, test_config, wait_until};
use rssi_scanner::acquisition::{AcquisitionEvent, BufferDelta, SeriesSnapshot};
use rssi_scanner::band::{MAX_FREQ, MIN_FREQ};
use rssi_scanner::protocol::READ_LAP_STATS;
use rssi_scanner::transport::{MockDevice, MockFault};
use rssi_scanner::Mode;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

#[test]
fn scan_wraps_from_top_of_band() {
    let (mut controller, mut channels, mock) =
        connect_mock(&test_config(), MockDevice::new(MAX_FREQ));
    controller.start(Mode::Scan).unwrap();

    assert!(wait_until(WAIT, || mock.written_frequencies().len() >= 2));
    controller.stop().unwrap();

    let written = mock.written_frequencies();
    assert_eq!(written[0], MIN_FREQ);
    assert_eq!(written[1], MIN_FREQ + 2);

    let first_tick = channels
        .drain_events()
        .into_iter()
        .find_map(|event| match event {
            AcquisitionEvent::Tick {
                mode: Mode::Scan,
                frequency,
                delta: BufferDelta::Scan { probed, next, .. },
            } => Some((frequency, probed, next)),
            _ => None,
        });
    assert_eq!(first_tick, Some((Some(MIN_FREQ), MAX_FREQ, MIN_FREQ)));

    controller.shutdown().unwrap();
}

#[test]
fn scan_records_live_min_max_per_frequency() {
    let mut config = test_config();
    config.scan.min_frequency = 5790;
    config.scan.max_frequency = 5810;
    let device = MockDevice::new(5790).with_rssi_model(|frequency| {
        if frequency == 5800 {
            90
        } else {
            20
        }
    });
    let (mut controller, mut channels, _mock) = connect_mock(&config, device);
    controller.start_default_mode().unwrap();

    // 11 slots at 10 ms per tick: a couple of full sweeps
    assert!(wait_until(WAIT, || channels.state().ticks >= 25));
    let series = channels.series();
    let SeriesSnapshot::Scan(scan) = series.as_ref() else {
        panic!("expected scan buffers, got {:?}", series.mode());
    };
    assert_eq!(scan.max.len(), 11);
    assert_eq!(scan.max.at(5800), Some(Some(90)));
    assert_eq!(scan.min.at(5800), Some(Some(90)));
    assert_eq!(scan.live.at(5802), Some(Some(20)));

    let peak = scan
        .max
        .iter()
        .filter_map(|(frequency, max)| max.map(|max| (frequency, max)))
        .max_by_key(|&(_, max)| max);
    assert_eq!(peak, Some((5800, 90)));

    controller.shutdown().unwrap();
}

#[test]
fn scan_restart_after_out_of_band_frequency() {
    let (mut controller, _channels, mock) = connect_mock(&test_config(), MockDevice::new(6100));
    controller.start(Mode::Scan).unwrap();
    assert!(wait_until(WAIT, || !mock.written_frequencies().is_empty()));
    controller.stop().unwrap();
    assert_eq!(mock.written_frequencies()[0], MIN_FREQ);
    controller.shutdown().unwrap();
}

#[test]
fn signal_records_live_and_history_points() {
    let device = MockDevice::new(5800);
    device.handle().set_history(85, 50, 20);
    let (mut controller, mut channels, mock) = connect_mock(&test_config(), device);
    controller.start(Mode::Signal).unwrap();

    assert!(wait_until(WAIT, || channels.state().ticks >= 3));
    controller.stop().unwrap();

    let mut saw_pair = false;
    for event in channels.drain_events() {
        if let AcquisitionEvent::Tick {
            delta: BufferDelta::Signal { live, history, window },
            frequency,
            ..
        } = event
        {
            assert_eq!(frequency, None);
            assert_eq!(live.1, 100);
            assert_eq!(window.end_ms - window.start_ms, 32 * 10);
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].1, 85);
            assert_eq!(history[1].0 - history[0].0, 30);
            saw_pair = true;
        }
    }
    assert!(saw_pair);
    // signal mode never retunes the node
    assert!(mock.written_frequencies().is_empty());

    controller.shutdown().unwrap();
}

#[test]
fn signal_without_history_adds_no_points() {
    let (mut controller, mut channels, _mock) =
        connect_mock(&test_config(), MockDevice::new(5800));
    controller.start(Mode::Signal).unwrap();
    assert!(wait_until(WAIT, || channels.state().ticks >= 3));

    let series = channels.series();
    let SeriesSnapshot::Signal(signal) = series.as_ref() else {
        panic!("expected signal buffers");
    };
    assert!(signal.live.size() >= 3);
    assert!(signal.history.is_empty());

    // timestamps are non-decreasing in buffer order
    let live = signal.live.to_vec();
    assert!(live.windows(2).all(|pair| pair[0].0 <= pair[1].0));

    controller.shutdown().unwrap();
}

#[test]
fn signal_window_keeps_num_samples() {
    let mut config = test_config();
    config.signal.num_samples = 4;
    let (mut controller, mut channels, _mock) = connect_mock(&config, MockDevice::new(5800));
    controller.start(Mode::Signal).unwrap();
    assert!(wait_until(WAIT, || channels.state().ticks >= 8));

    let series = channels.series();
    let SeriesSnapshot::Signal(signal) = series.as_ref() else {
        panic!("expected signal buffers");
    };
    assert_eq!(signal.live.size(), 4);
    assert!(signal.live.is_full());

    controller.shutdown().unwrap();
}

#[test]
fn tick_errors_are_reported_and_schedule_continues() {
    let (mut controller, mut channels, mock) =
        connect_mock(&test_config(), MockDevice::new(5800));
    controller.start(Mode::Signal).unwrap();
    assert!(wait_until(WAIT, || channels.state().ticks >= 2));

    mock.inject(MockFault::CorruptChecksum);
    assert!(wait_until(WAIT, || channels.state().last_error.is_some()));
    let message = channels.state().last_error.unwrap();
    assert!(message.contains("checksum"), "unexpected message: {message}");

    let ticks = channels.state().ticks;
    assert!(wait_until(WAIT, || channels.state().ticks >= ticks + 3));
    assert_eq!(controller.active_mode(), Some(Mode::Signal));

    let errors: Vec<_> = channels
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, AcquisitionEvent::Error { mode: Some(Mode::Signal), .. }))
        .collect();
    assert_eq!(errors.len(), 1);

    controller.shutdown().unwrap();
}

#[test]
fn latest_error_replaces_previous_one() {
    let (mut controller, mut channels, mock) =
        connect_mock(&test_config(), MockDevice::new(5800));
    controller.start(Mode::Signal).unwrap();

    mock.inject(MockFault::Truncate);
    assert!(wait_until(WAIT, || channels
        .state()
        .last_error
        .is_some_and(|e| e.contains("expected 17"))));

    mock.inject(MockFault::Silent);
    assert!(wait_until(WAIT, || channels
        .state()
        .last_error
        .is_some_and(|e| e.contains("timed out"))));

    assert!(mock.request_count(READ_LAP_STATS) > 2);
    controller.shutdown().unwrap();
}

#[test]
fn stopped_scan_never_retunes_the_node() {
    let mut config = test_config();
    config.device.timeout_ms = 500;
    let device = MockDevice::new(5800).with_latency(Duration::from_millis(80));
    let (mut controller, _channels, mock) = connect_mock(&config, device);

    controller.start(Mode::Scan).unwrap();
    // mid-way through the first tick's frequency read
    std::thread::sleep(Duration::from_millis(40));
    controller.stop().unwrap();
    let at_stop = mock.written_frequencies();

    // long enough for the abandoned exchange to finish its reads
    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(mock.written_frequencies(), at_stop);
    assert_eq!(mock.frequency(), 5800);

    controller.shutdown().unwrap();
}
