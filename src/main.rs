//! # PLB Teleop
//!
//! Drive a soft-body dough simulation with a Logitech F710 gamepad or the
//! keyboard.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and load configuration
//!    - Set up logging (stderr, plus a daily file when telemetry is enabled)
//!    - Seed and reset the simulation
//!
//! 2. **Teleop** (default subcommand)
//!    - Bind the gamepad and wait until every input is released
//!    - Tick the session at `rate_hz`: poll input, step, render
//!    - Escape or Ctrl+C ends the session
//!
//! 3. **Rollout**
//!    - Run one episode of zero actions, keeping every frame
//!    - Scrub through the frames with `a` / `d`
//!
//! Terminal lines are forwarded as key presses: type `a` then Enter to send
//! `a`, or `esc` to send Escape.
//!
//! # Examples
//!
//! ```bash
//! plb-teleop --config config/teleop.toml
//! plb-teleop teleop --keyboard
//! plb-teleop devices
//! plb-teleop inspect-recording logs/snapshots_20240101_120000_0000.jsonl
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use plb_teleop::config::{Config, InputMode, TelemetryConfig};
use plb_teleop::controller::device::{list_gamepads, EvdevBackend};
use plb_teleop::controller::registry::GamepadRegistry;
use plb_teleop::controller::snapshot::are_any_buttons_pressed;
use plb_teleop::controller::translator::InputTranslator;
use plb_teleop::telemetry::{read_recording, SnapshotRecorder};
use plb_teleop::teleop::{
    env::cylinder_model, render::parse_key_line, rollout, scrub_tick, ActionScale, ChannelRenderer, ControlSource,
    GamepadActionMapper, GamepadControl, KeyPress, KeyboardActionMapper, KeyboardControl,
    KinematicPrimitive, Renderer, SimulationEnv, TeleopSession, TickOutcome,
};

/// Number of ticks between status log messages
const LOG_INTERVAL_TICKS: u64 = 300;

/// Poll period while scrubbing a rollout
const SCRUB_POLL_MS: u64 = 100;

/// File name prefix of the daily log
const LOG_FILE_NAME: &str = "plb-teleop.log";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Drive the simulation interactively (default)
    Teleop {
        /// Use the keyboard even if the configuration selects the gamepad
        #[arg(long)]
        keyboard: bool,
    },
    /// Record a zero-action episode and scrub through its frames
    Rollout,
    /// List detected gamepads
    Devices,
    /// Summarize a snapshot recording
    InspectRecording {
        /// Path to a JSONL recording
        path: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let _log_guard = init_logging(&config.telemetry)?;
    info!("PLB Teleop v{} starting...", env!("CARGO_PKG_VERSION"));

    match args.cmd.unwrap_or(Commands::Teleop { keyboard: false }) {
        Commands::Teleop { keyboard } => run_teleop(&config, keyboard).await,
        Commands::Rollout => run_rollout(&config).await,
        Commands::Devices => print_devices(),
        Commands::InspectRecording { path } => inspect_recording(&path),
    }
}

/// Sets up stderr logging and, when telemetry is enabled, a daily log file.
///
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_logging(telemetry: &TelemetryConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let (file_layer, guard) = if telemetry.enabled {
        std::fs::create_dir_all(&telemetry.log_dir)
            .with_context(|| format!("Failed to create log dir {}", telemetry.log_dir))?;
        let appender = tracing_appender::rolling::daily(&telemetry.log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

fn make_env(config: &Config) -> Result<KinematicPrimitive> {
    let mesh_path = config.render.primitive_mesh.as_deref().map(Path::new);
    let model = cylinder_model(mesh_path).with_context(|| match mesh_path {
        Some(path) => format!("Failed to load primitive mesh {}", path.display()),
        None => "Failed to load built-in primitive mesh".to_string(),
    })?;
    debug!("Primitive model: {} faces", model.faces.len());

    let mut env = KinematicPrimitive::new(
        &config.simulation.env_name,
        config.render.width,
        config.render.height,
        config.simulation.max_episode_steps,
    )
    .with_model(model);
    env.seed(config.simulation.seed);
    env.reset()?;
    info!(
        "Environment {} ready (seed {}, {} steps per episode)",
        env.name(),
        config.simulation.seed,
        env.max_episode_steps()
    );
    Ok(env)
}

/// Forwards terminal input to the renderer as key presses.
///
/// Runs on a plain thread: a blocking stdin read would otherwise hold up
/// runtime shutdown.
fn spawn_key_reader(keys: UnboundedSender<KeyPress>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            for key in parse_key_line(&line) {
                if keys.send(key).is_err() {
                    return;
                }
            }
        }
        debug!("Key reader finished");
    });
}

fn key_renderer() -> ChannelRenderer {
    let (tx, rx) = unbounded_channel();
    spawn_key_reader(tx);
    ChannelRenderer::new(rx)
}

fn tick_period(rate_hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(rate_hz.max(1)))
}

async fn run_teleop(config: &Config, force_keyboard: bool) -> Result<()> {
    let env = make_env(config)?;
    let renderer = key_renderer();
    let scale = ActionScale::from_config(&config.teleop);

    let input = if force_keyboard {
        InputMode::Keyboard
    } else {
        config.teleop.input
    };

    match input {
        InputMode::Keyboard => {
            info!("Keyboard control: a/d body x, q/e spin, w/s world y, r reset, esc quit");
            let control = KeyboardControl::new(KeyboardActionMapper::new(scale));
            drive(TeleopSession::new(env, renderer, control)?, config.teleop.rate_hz).await
        }
        InputMode::Gamepad => {
            let mut registry = GamepadRegistry::new(EvdevBackend);
            let device = registry.bind(config.gamepad.device_index)?;
            let translator = InputTranslator::from_config(device, &config.gamepad)?;

            let mut control = GamepadControl::new(translator, GamepadActionMapper::new(scale));
            if config.telemetry.enabled {
                control = control.with_recorder(SnapshotRecorder::from_config(&config.telemetry)?);
            }

            let poll = Duration::from_millis(config.gamepad.release_poll_ms);
            tokio::select! {
                result = control.wait_for_release(poll, tokio::time::sleep) => {
                    result?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, shutting down...");
                    return Ok(());
                }
            }

            info!("Gamepad control: d-pad moves, right stick spins, Start resets");
            drive(TeleopSession::new(env, renderer, control)?, config.teleop.rate_hz).await
        }
    }
}

/// Ticks the session at `rate_hz` until Escape or Ctrl+C.
async fn drive<E, R, C>(mut session: TeleopSession<E, R, C>, rate_hz: u32) -> Result<()>
where
    E: SimulationEnv,
    R: Renderer,
    C: ControlSource,
{
    let mut ticker = interval(tick_period(rate_hz));
    let mut slowest = Duration::ZERO;

    info!("Starting teleop loop at {}Hz", rate_hz);
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match session.tick()? {
                    TickOutcome::Exit => break,
                    TickOutcome::Continue { step_time } => {
                        slowest = slowest.max(step_time);
                        if session.steps() % LOG_INTERVAL_TICKS == 0 {
                            info!("{} steps, slowest step {:?}", session.steps(), slowest);
                            slowest = Duration::ZERO;
                        }
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!(
        "Session ended after {} steps ({} resets)",
        session.steps(),
        session.resets()
    );
    Ok(())
}

async fn run_rollout(config: &Config) -> Result<()> {
    let mut env = make_env(config)?;
    let mut history = rollout(&mut env)?;
    let mut renderer = key_renderer();
    let mut ticker = interval(Duration::from_millis(SCRUB_POLL_MS));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !scrub_tick(&mut history, &mut renderer)? {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    Ok(())
}

fn print_devices() -> Result<()> {
    let gamepads = list_gamepads()?;
    if gamepads.is_empty() {
        warn!("No gamepads found");
        return Ok(());
    }

    for pad in gamepads {
        println!(
            "{}: {} ({}) [{:04x}:{:04x}]",
            pad.index,
            pad.name,
            pad.path.display(),
            pad.vendor,
            pad.product
        );
    }
    Ok(())
}

fn inspect_recording(path: &Path) -> Result<()> {
    let records = read_recording(path)
        .with_context(|| format!("Failed to read recording {}", path.display()))?;

    let mut active = 0;
    for (i, record) in records.iter().enumerate() {
        if are_any_buttons_pressed(&record.events)
            .with_context(|| format!("Record {} has an invalid event set", i + 1))?
        {
            active += 1;
        }
    }

    println!("{}: {} records, {} with input away from rest", path.display(), records.len(), active);
    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        println!("  from {} to {}", first.timestamp, last.timestamp);
    }
    Ok(())
}
