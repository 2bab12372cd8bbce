//! notefire - sound-controlled turret
//!
//! Listens on a microphone, estimates the dominant pitch per frame, and
//! drives the turret: G rotates clockwise, B counterclockwise, D fires.
//!
//! Run with: cargo run -- --sim

mod device;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result as EyreResult, WrapErr};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notefire::actuator::{DigitalOutput, SimGpio, SysfsGpio, Turret};
use notefire::capture::CaptureStream;
use notefire::note::NoteTable;
use notefire::pitch::PitchDetector;
use notefire::{pipeline, Config};

#[derive(Parser, Debug)]
#[command(name = "notefire")]
#[command(about = "Sound-controlled turret: detected notes drive rotation and firing")]
#[command(version)]
struct Args {
    /// TOML config file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Substring of the input device name (default input device when omitted)
    #[arg(short, long)]
    device: Option<String>,

    /// List available input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log output transitions instead of driving /sys/class/gpio
    #[arg(long)]
    sim: bool,
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notefire=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if args.list_devices {
        return device::list_input_devices();
    }

    let config = match &args.config {
        Some(path) => Config::load(path)
            .wrap_err_with(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };

    let notes = NoteTable::new(config.notes.clone())?;
    let mut detector = PitchDetector::new(
        config.audio.frame_size,
        config.audio.sample_rate,
        config.detection.min_frequency_hz,
        config.detection.max_frequency_hz,
    );

    let input = device::resolve_input(args.device.as_deref())?;
    let mut source = CaptureStream::open(&input, config.audio.sample_rate, config.audio.frame_size)
        .wrap_err("failed to open capture stream")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("failed to install interrupt handler")?;

    info!(
        "starting notefire ({} Hz, {}-sample frames); press Ctrl+C to stop",
        config.audio.sample_rate, config.audio.frame_size
    );

    if args.sim {
        run_turret(SimGpio::new(), &config, &mut source, &mut detector, &notes, &shutdown)?;
    } else {
        let pins = [
            config.turret.step_pin,
            config.turret.dir_pin,
            config.turret.solenoid_pin,
        ];
        run_turret(
            SysfsGpio::open(&pins)?,
            &config,
            &mut source,
            &mut detector,
            &notes,
            &shutdown,
        )?;
    }

    info!("turret released; exiting");
    Ok(())
}

fn run_turret<G: DigitalOutput>(
    gpio: G,
    config: &Config,
    source: &mut CaptureStream,
    detector: &mut PitchDetector,
    notes: &NoteTable,
    shutdown: &AtomicBool,
) -> EyreResult<()> {
    // Turret::drop releases all output lines on every exit path out of
    // this scope, error or not.
    let mut turret = Turret::new(gpio, config.turret.clone())?;
    pipeline::run(source, detector, notes, &mut turret, shutdown)?;
    Ok(())
}
