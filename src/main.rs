//! CLI entry point for rssi-scanner
//!
//! Provides command-line access to a lap-timer node:
//! - Sweeping the band and printing the strongest frequencies
//! - Monitoring rssi at one frequency
//! - Reading or setting the tuned frequency
//!
//! # Usage
//!
//! ```bash
//! rssi-scanner --port /dev/ttyUSB0 scan --duration 30
//! rssi-scanner --port /dev/ttyUSB0 signal --frequency 5800
//! rssi-scanner --mock read-frequency
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rssi_scanner::acquisition::{AcquisitionEvent, SeriesSnapshot};
use rssi_scanner::channels::PresentationChannels;
use rssi_scanner::config::ScannerConfig;
use rssi_scanner::logging;
use rssi_scanner::transport::{DynTransport, MockDevice, SerialTransport};
use rssi_scanner::{Mode, ModeController, ScannerResult};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Frequency the simulated node starts on.
const MOCK_START_FREQUENCY: u16 = 5800;

#[derive(Parser)]
#[command(name = "rssi-scanner")]
#[command(about = "Scan and monitor RSSI lap-timer nodes over serial", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/scanner.toml")]
    config: PathBuf,

    /// Serial port (overrides device.port)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Use a simulated node instead of a serial port
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the band and report the strongest frequencies
    Scan {
        /// Seconds to run
        #[arg(long, default_value = "10")]
        duration: u64,
    },

    /// Monitor rssi at a fixed frequency
    Signal {
        /// Tune to this frequency first (MHz)
        #[arg(long)]
        frequency: Option<u16>,

        /// Seconds to run
        #[arg(long, default_value = "10")]
        duration: u64,
    },

    /// Print the node's tuned frequency
    ReadFrequency,

    /// Tune the node and confirm by reading back
    SetFrequency {
        /// Frequency in MHz
        frequency: u16,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ScannerConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(port) = cli.port {
        config.device.port = Some(port);
    }
    if cli.mock {
        config.device.settle_ms = 0;
    }
    config.validate().context("invalid configuration")?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let (mut controller, mut channels) = connect(&config, cli.mock)?;

    match cli.command {
        Commands::Scan { duration } => {
            controller.start(Mode::Scan)?;
            watch_for(&mut channels, Duration::from_secs(duration));
            report_scan(&mut channels);
        }
        Commands::Signal {
            frequency,
            duration,
        } => {
            if let Some(frequency) = frequency {
                let confirmed = controller
                    .set_frequency_manually(frequency)
                    .context("setting frequency")?;
                info!(?confirmed, "Tuned");
            }
            controller.start(Mode::Signal)?;
            watch_for(&mut channels, Duration::from_secs(duration));
            report_signal(&mut channels);
        }
        Commands::ReadFrequency => match controller.startup().frequency {
            Some(frequency) => println!("{frequency} MHz"),
            None => anyhow::bail!(
                "frequency read failed: {}",
                channels.state().last_error.unwrap_or_default()
            ),
        },
        Commands::SetFrequency { frequency } => {
            let confirmed = controller
                .set_frequency_manually(frequency)
                .context("setting frequency")?;
            if let Some(frequency) = confirmed {
                println!("{frequency} MHz");
            }
        }
    }

    controller.shutdown()?;
    Ok(())
}

fn connect(config: &ScannerConfig, mock: bool) -> Result<(ModeController, PresentationChannels)> {
    if mock {
        info!("Using simulated node");
        return Ok(ModeController::connect(config, || {
            Ok(Box::new(MockDevice::new(MOCK_START_FREQUENCY)) as DynTransport)
        })?);
    }

    let port = config.port()?.to_string();
    let baud_rate = config.device.baud_rate;
    let open = move || -> ScannerResult<DynTransport> {
        Ok(Box::new(SerialTransport::open(&port, baud_rate)?) as DynTransport)
    };
    ModeController::connect(config, open).context("opening device")
}

/// Print a status line every second until `duration` elapses.
fn watch_for(channels: &mut PresentationChannels, duration: Duration) {
    let deadline = Instant::now() + duration;
    let mut errors = 0usize;
    while Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(Instant::now());
        std::thread::sleep(remaining.min(Duration::from_secs(1)));
        for event in channels.drain_events() {
            if let AcquisitionEvent::Error { message, .. } = event {
                warn!("{}", message);
                errors += 1;
            }
        }
        let state = channels.state();
        println!(
            "mode={} frequency={} ticks={} errors={}",
            state.mode.map_or("-".to_string(), |m| m.to_string()),
            state.frequency.map_or("-".to_string(), |f| f.to_string()),
            state.ticks,
            errors
        );
    }
}

fn report_scan(channels: &mut PresentationChannels) {
    let series = channels.series();
    let SeriesSnapshot::Scan(scan) = series.as_ref() else {
        return;
    };
    let mut peaks: Vec<(u16, i32)> = scan
        .max
        .iter()
        .filter_map(|(frequency, max)| max.map(|max| (frequency, max)))
        .collect();
    peaks.sort_by(|a, b| b.1.cmp(&a.1));
    println!("Strongest frequencies:");
    for (frequency, max) in peaks.into_iter().take(5) {
        println!("  {frequency} MHz  max rssi {max}");
    }
}

fn report_signal(channels: &mut PresentationChannels) {
    let series = channels.series();
    let SeriesSnapshot::Signal(signal) = series.as_ref() else {
        return;
    };
    let live = signal.live.to_vec();
    if live.is_empty() {
        return;
    }
    let sum: i64 = live.iter().map(|&(_, rssi)| i64::from(rssi)).sum();
    println!(
        "{} samples in [{}, {}] ms, mean rssi {}, {} history points",
        live.len(),
        signal.window.start_ms,
        signal.window.end_ms,
        sum / live.len() as i64,
        signal.history.size()
    );
}
