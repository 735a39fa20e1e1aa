//! Geiger Dose Agent CLI
//!
//! Dose-rate monitor for two-line pulse Geiger sensors.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, Receiver, Sender};
use geiger_dose_agent::{
    config::{Config, OutputFormat, SourceKind},
    core::{GeigerMonitor, CSV_KEYS},
    source::{self, PulseKind, SensorEvent},
    VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// How long the host loop sleeps between ticks.
const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Capacity of the handler notification channel.
const EVENT_QUEUE_CAPACITY: usize = 1_024;

#[derive(Parser)]
#[command(name = "geiger-agent")]
#[command(version = VERSION)]
#[command(about = "Dose-rate monitor for two-line pulse Geiger sensors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start measuring and print readings
    Start {
        /// Pulse source (simulated or none)
        #[arg(long)]
        source: Option<String>,

        /// Mean radiation pulses per minute for the simulated source
        #[arg(long)]
        cpm: Option<f64>,

        /// Mean noise pulses per minute for the simulated source
        #[arg(long)]
        noise: Option<f64>,

        /// RNG seed for the simulated source
        #[arg(long)]
        seed: Option<u64>,

        /// Output format (csv or jsonl)
        #[arg(long)]
        format: Option<String>,

        /// Seconds between printed readings
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Print the CSV header line
    Keys,

    /// Show configuration
    Config,

    /// Update and save configuration
    Set {
        /// Poll threshold in milliseconds
        #[arg(long)]
        poll_threshold_ms: Option<u64>,

        /// Number of 6-second buckets in the window
        #[arg(long)]
        history_buckets: Option<usize>,

        /// Sensor calibration, CPM per µSv/h
        #[arg(long)]
        alpha: Option<f64>,

        /// Seconds between printed readings
        #[arg(long)]
        interval: Option<u64>,

        /// Output format (csv or jsonl)
        #[arg(long)]
        format: Option<String>,

        /// Pulse source (simulated or none)
        #[arg(long)]
        source: Option<String>,

        /// Mean radiation pulses per minute for the simulated source
        #[arg(long)]
        cpm: Option<f64>,

        /// Mean noise pulses per minute for the simulated source
        #[arg(long)]
        noise: Option<f64>,
    },
}

/// Per-run overrides shared by `start` and `set`.
#[derive(Default)]
struct Overrides {
    poll_threshold_ms: Option<u64>,
    history_buckets: Option<usize>,
    alpha: Option<f64>,
    interval: Option<u64>,
    format: Option<String>,
    source: Option<String>,
    cpm: Option<f64>,
    noise: Option<f64>,
    seed: Option<u64>,
}

impl Overrides {
    fn apply(self, config: &mut Config) -> anyhow::Result<()> {
        if let Some(ms) = self.poll_threshold_ms {
            config.poll_threshold_ms = ms;
        }
        if let Some(buckets) = self.history_buckets {
            config.history_buckets = buckets;
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(secs) = self.interval {
            config.report_interval = Duration::from_secs(secs);
        }
        if let Some(format) = self.format {
            config.output_format = format.parse::<OutputFormat>()?;
        }
        if let Some(kind) = self.source {
            config.source.kind = kind.parse::<SourceKind>()?;
        }
        if let Some(cpm) = self.cpm {
            config.source.radiation_cpm = cpm;
        }
        if let Some(noise) = self.noise {
            config.source.noise_per_minute = noise;
        }
        if self.seed.is_some() {
            config.source.seed = self.seed;
        }
        config.validate()?;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            source,
            cpm,
            noise,
            seed,
            format,
            interval,
            duration,
        } => cmd_start(
            Overrides {
                interval,
                format,
                source,
                cpm,
                noise,
                seed,
                ..Overrides::default()
            },
            duration.map(Duration::from_secs),
        ),
        Commands::Keys => {
            println!("{CSV_KEYS}");
            Ok(())
        }
        Commands::Config => cmd_config(),
        Commands::Set {
            poll_threshold_ms,
            history_buckets,
            alpha,
            interval,
            format,
            source,
            cpm,
            noise,
        } => cmd_set(Overrides {
            poll_threshold_ms,
            history_buckets,
            alpha,
            interval,
            format,
            source,
            cpm,
            noise,
            seed: None,
        }),
    }
}

/// Log to stderr so stdout carries only readings.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_start(overrides: Overrides, run_for: Option<Duration>) -> anyhow::Result<()> {
    let mut config = Config::load().context("loading configuration")?;
    overrides.apply(&mut config)?;

    let mut monitor = GeigerMonitor::new(config.monitor_config());
    let (sender, receiver) = bounded(EVENT_QUEUE_CAPACITY);
    register_handlers(&mut monitor, &sender);

    let mut pulse_source = source::from_config(&config.source)?;
    pulse_source
        .start(monitor.lines())
        .context("starting pulse source")?;

    tracing::info!(
        version = VERSION,
        session = %monitor.session_id(),
        source = pulse_source.name(),
        poll_threshold_ms = config.poll_threshold_ms,
        history_buckets = config.history_buckets,
        "measurement started"
    );

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(Arc::clone(&running))?;

    if config.output_format == OutputFormat::Csv {
        println!("{CSV_KEYS}");
    }

    let started = Instant::now();
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) {
        monitor.tick();
        drain_events(&receiver);

        if last_report.elapsed() >= config.report_interval {
            print_reading(&monitor, config.output_format)?;
            last_report = Instant::now();
        }

        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }

        thread::sleep(TICK_INTERVAL);
    }

    pulse_source.stop();
    drain_events(&receiver);
    print_reading(&monitor, config.output_format)?;

    eprintln!();
    eprintln!("{}", monitor.log().summary());
    Ok(())
}

/// Forward handler notifications to the main loop.
fn register_handlers(monitor: &mut GeigerMonitor, sender: &Sender<SensorEvent>) {
    let radiation = sender.clone();
    monitor.register_radiation_handler(move || {
        // A full queue only drops notifications, never counts.
        let _ = radiation.try_send(SensorEvent::new(PulseKind::Radiation));
    });
    let noise = sender.clone();
    monitor.register_noise_handler(move || {
        let _ = noise.try_send(SensorEvent::new(PulseKind::Noise));
    });
}

fn drain_events(receiver: &Receiver<SensorEvent>) {
    for event in receiver.try_iter() {
        match event.kind {
            PulseKind::Radiation => tracing::trace!(at = %event.timestamp, "radiation pulse"),
            PulseKind::Noise => {
                tracing::warn!(at = %event.timestamp, "noise detected, interval discarded")
            }
        }
    }
}

fn print_reading(monitor: &GeigerMonitor, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Csv => println!("{}", monitor.csv_status()),
        OutputFormat::Jsonl => {
            let line = serde_json::to_string(&monitor.reading()).context("serializing reading")?;
            println!("{line}");
        }
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_set(overrides: Overrides) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    overrides.apply(&mut config)?;
    if config.source.kind == SourceKind::Simulated && !cfg!(feature = "simulated") {
        bail!("the simulated source is not available in this build");
    }
    config.save().context("saving configuration")?;
    println!("Configuration saved to {:?}", Config::config_path());
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
