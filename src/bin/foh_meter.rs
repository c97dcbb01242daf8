use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use foh_meter::analysis::format_db;
use foh_meter::audio::{
    CpalSource, SampleSource, ScriptedSource, SyntheticSignal, SyntheticSource, WavFileSource,
};
use foh_meter::session::{
    IntervalTrigger, MeterDriver, MeterReading, SessionController, TickTrigger,
};
use foh_meter::storage::{JsonFileStore, KeyValueStore};
use foh_meter::venue::{classify_venue_type, estimate_offset, TargetZone, VenuePreset};
use foh_meter::AppConfig;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

const SYNTHETIC_SAMPLE_RATE: u32 = 48_000;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("foh_meter error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "foh_meter", about = "Loudness meter with FOH audience prediction")]
struct Cli {
    /// JSON file holding settings and venue profiles
    #[arg(long, default_value = "foh_meter_store.json")]
    store: PathBuf,
    /// Meter configuration (defaults to assets/meter_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Meter a source and print one reading per tick.
    Meter(MeterArgs),
    /// Measure the FOH offset by walking from the console to the audience.
    Calibrate(CalibrateArgs),
    /// Manage saved venue profiles.
    #[command(subcommand)]
    Profiles(ProfilesCommand),
    /// Estimate or set the FOH offset.
    #[command(subcommand)]
    Offset(OffsetCommand),
    /// Apply a named venue preset (small, medium, large).
    Preset { name: VenuePreset },
    /// List target zones, or select one with --set.
    Zones {
        #[arg(long)]
        set: Option<TargetZone>,
    },
}

#[derive(Args, Debug, Clone)]
struct SourceArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Live)]
    source: SourceKind,
    /// WAV file for --source wav
    #[arg(long)]
    wav: Option<PathBuf>,
    /// Restart the WAV file when it ends
    #[arg(long = "loop")]
    looping: bool,
    /// Sine peak level for --source synthetic (dBFS)
    #[arg(long, default_value_t = -12.0, allow_hyphen_values = true)]
    level_db: f32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Live,
    Wav,
    Synthetic,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug, Clone)]
struct MeterArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Stop after this many ticks (runs until Ctrl-C otherwise)
    #[arg(long)]
    ticks: Option<u64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
struct CalibrateArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Seconds of metering at the console before the reference is taken
    #[arg(long, default_value_t = 2)]
    settle_secs: u32,
    /// Seconds allowed to walk to the audience position
    #[arg(long, default_value_t = 10)]
    walk_secs: u32,
    /// Synthetic level at the audience position (dBFS); defaults to --level-db
    #[arg(long, allow_hyphen_values = true)]
    audience_level_db: Option<f32>,
}

#[derive(Subcommand, Debug)]
enum ProfilesCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        distance: f32,
        #[arg(long, default_value_t = 0.0)]
        elevation: f32,
        /// Offset in dB; estimated from the placement when omitted
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<f32>,
    },
    Delete {
        id: u64,
    },
    /// Apply a profile's placement and offset
    Select {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
enum OffsetCommand {
    /// Estimate the offset from console distance and elevation
    Estimate {
        #[arg(long)]
        distance: f32,
        #[arg(long, default_value_t = 0.0)]
        elevation: f32,
        /// Store the estimate as the current offset
        #[arg(long)]
        apply: bool,
    },
    /// Set the offset directly
    Set {
        #[arg(allow_hyphen_values = true)]
        offset_db: f32,
    },
    /// Print the stored offset
    Show,
}

impl Cli {
    fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => AppConfig::load_from_file(path),
            None => AppConfig::load(),
        };
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&self.store));

        match self.command {
            Command::Meter(args) => meter_command(&config, store, args),
            Command::Calibrate(args) => calibrate_command(&config, store, args),
            Command::Profiles(cmd) => profiles_command(&config, store, cmd),
            Command::Offset(cmd) => offset_command(&config, store, cmd),
            Command::Preset { name } => {
                let mut controller = idle_controller(&config, store);
                controller.apply_preset(name)?;
                let placement = controller.placement();
                println!(
                    "Applied {} preset: {:.1} m, {:.1} m elevation, offset {:+.1} dB",
                    placement.venue_type(),
                    placement.distance_m,
                    placement.elevation_m,
                    controller.settings().foh_offset_db
                );
                Ok(())
            }
            Command::Zones { set } => zones_command(&config, store, set),
        }
    }
}

// ============================================================================
// METER
// ============================================================================

fn meter_command(config: &AppConfig, store: Arc<dyn KeyValueStore>, args: MeterArgs) -> Result<()> {
    let source = build_source(config, &args.source)?;
    let mut controller = SessionController::new(source, store, &config.meter);
    let tick_hz = config.meter.nominal_tick_hz;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async move {
        let driver = MeterDriver::new();
        let stop = driver.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.stop();
            }
        });

        let mut readings = Box::pin(driver.reading_stream());
        let format = args.format;
        let printer = tokio::spawn(async move {
            while let Some(reading) = readings.next().await {
                print_reading(&reading, format);
            }
        });

        let mut trigger = IntervalTrigger::new(tick_hz);
        if let Some(ticks) = args.ticks {
            trigger = trigger.with_limit(ticks);
        }
        let exit = driver.run(&mut controller, &mut trigger).await;

        drop(driver);
        printer.await.context("reading printer task")?;
        let exit = exit.context("metering failed")?;

        let stats = controller.statistics();
        eprintln!(
            "Stopped ({:?}): max RMS {} dBFS, max peak {} dBFS, {} clip events",
            exit,
            format_db(stats.session.rms_max),
            format_db(stats.session.peak_max),
            stats.session.clipping_count
        );
        Ok::<(), anyhow::Error>(())
    })
}

fn print_reading(reading: &MeterReading, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(reading) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to serialize reading: {err}"),
        },
        OutputFormat::Table => println!(
            concat!(
                "{:>7} ms  RMS {:>6}  Peak {:>6}  Hold {:>6}  Avg {:>6}  ",
                "DR {:>4.1}  Crest {:>4.1}  Corr {:+.2}  Clips {:>3}  ",
                "Aud {:>6} ({:>5} dB SPL) {}"
            ),
            reading.timestamp_ms,
            format_db(reading.rms_db),
            format_db(reading.peak_db),
            format_db(reading.held_peak_db),
            format_db(reading.average_rms_db),
            reading.dynamic_range_db,
            reading.crest_factor_db,
            reading.correlation,
            reading.clip_count,
            format_db(reading.audience_rms_db),
            format_db(reading.audience_spl_db),
            if reading.in_target_zone { "in zone" } else { "out of zone" },
        ),
    }
}

// ============================================================================
// CALIBRATE
// ============================================================================

fn calibrate_command(
    config: &AppConfig,
    store: Arc<dyn KeyValueStore>,
    args: CalibrateArgs,
) -> Result<()> {
    let tick_hz = config.meter.nominal_tick_hz;
    let settle_ticks = u64::from(args.settle_secs) * u64::from(tick_hz);
    let walk_ticks = u64::from(args.walk_secs) * u64::from(tick_hz);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let offset = if args.source.source == SourceKind::Synthetic {
        let mut controller = SessionController::new(
            synthetic_source(config, args.source.level_db),
            store,
            &config.meter,
        );
        let audience_db = args.audience_level_db.unwrap_or(args.source.level_db);
        runtime.block_on(run_calibration(
            &mut controller,
            tick_hz,
            settle_ticks,
            walk_ticks,
            |source| source.set_signal(synthetic_signal(audience_db)),
        ))?
    } else {
        let mut controller =
            SessionController::new(build_source(config, &args.source)?, store, &config.meter);
        runtime.block_on(run_calibration(
            &mut controller,
            tick_hz,
            settle_ticks,
            walk_ticks,
            |_| eprintln!("Walk to the audience position now."),
        ))?
    };

    println!("Measured FOH offset: {:+.1} dB (saved)", offset);
    Ok(())
}

async fn run_calibration<S, F>(
    controller: &mut SessionController<S>,
    tick_hz: u32,
    settle_ticks: u64,
    walk_ticks: u64,
    on_walk: F,
) -> Result<f32>
where
    S: SampleSource,
    F: FnOnce(&mut S),
{
    let mut trigger = IntervalTrigger::new(tick_hz);
    controller.start().context("starting the meter")?;

    let result: Result<f32> = async {
        tick_for(controller, &mut trigger, settle_ticks.max(1)).await?;
        controller.start_calibration()?;
        eprintln!("Reference taken at the console.");

        on_walk(controller.source_mut());
        tick_for(controller, &mut trigger, walk_ticks.max(1)).await?;
        Ok(controller.complete_calibration()?)
    }
    .await;

    controller.stop();
    result
}

async fn tick_for<S: SampleSource>(
    controller: &mut SessionController<S>,
    trigger: &mut IntervalTrigger,
    ticks: u64,
) -> Result<()> {
    for _ in 0..ticks {
        let Some(now_ms) = trigger.next_tick().await else {
            break;
        };
        controller.tick(now_ms)?;
    }
    Ok(())
}

// ============================================================================
// PROFILES, OFFSET, ZONES
// ============================================================================

fn profiles_command(
    config: &AppConfig,
    store: Arc<dyn KeyValueStore>,
    cmd: ProfilesCommand,
) -> Result<()> {
    let mut controller = idle_controller(config, store);
    match cmd {
        ProfilesCommand::List => {
            let selected = controller.settings().selected_profile;
            if controller.profiles().list().is_empty() {
                println!("No venue profiles saved.");
            }
            for profile in controller.profiles().list() {
                println!(
                    "{} {:>14}  {:<24} {:>5.1} m  {:>4.1} m up  {:+.1} dB  {}",
                    if Some(profile.id) == selected { "*" } else { " " },
                    profile.id,
                    profile.name,
                    profile.distance_m,
                    profile.elevation_m,
                    profile.offset_db,
                    profile.venue_type
                );
            }
        }
        ProfilesCommand::Add {
            name,
            distance,
            elevation,
            offset,
        } => {
            let offset = offset.unwrap_or_else(|| estimate_offset(distance, elevation));
            let profile = controller.create_profile(&name, distance, elevation, offset)?;
            println!(
                "Saved profile {} '{}' ({}, {:+.1} dB)",
                profile.id, profile.name, profile.venue_type, profile.offset_db
            );
        }
        ProfilesCommand::Delete { id } => {
            if controller.delete_profile(id)? {
                println!("Deleted profile {id}");
            } else {
                println!("No profile with id {id}");
            }
        }
        ProfilesCommand::Select { id } => match controller.select_profile(id)? {
            Some(profile) => println!(
                "Selected '{}': offset {:+.1} dB",
                profile.name, profile.offset_db
            ),
            None => bail!("no profile with id {id}"),
        },
    }
    Ok(())
}

fn offset_command(
    config: &AppConfig,
    store: Arc<dyn KeyValueStore>,
    cmd: OffsetCommand,
) -> Result<()> {
    let mut controller = idle_controller(config, store);
    match cmd {
        OffsetCommand::Estimate {
            distance,
            elevation,
            apply,
        } => {
            let offset = estimate_offset(distance, elevation);
            println!(
                "Estimated offset {:+.2} dB ({} venue)",
                offset,
                classify_venue_type(distance)
            );
            if apply {
                controller.set_placement(distance, elevation)?;
                controller.apply_estimated_offset()?;
                controller.clear_selection()?;
                println!("Offset saved.");
            }
        }
        OffsetCommand::Set { offset_db } => {
            controller.set_foh_offset(offset_db)?;
            println!("Offset set to {:+.1} dB", offset_db);
        }
        OffsetCommand::Show => {
            println!("{:+.1} dB", controller.settings().foh_offset_db);
        }
    }
    Ok(())
}

fn zones_command(
    config: &AppConfig,
    store: Arc<dyn KeyValueStore>,
    set: Option<TargetZone>,
) -> Result<()> {
    let mut controller = idle_controller(config, store);
    if let Some(zone) = set {
        controller.set_target_zone(zone)?;
    }
    let current = controller.settings().target_zone;
    for zone in TargetZone::ALL {
        let marker = if zone == current { "*" } else { " " };
        println!("{} {:<10} {}", marker, zone.id(), zone);
    }
    Ok(())
}

// ============================================================================
// SOURCES
// ============================================================================

fn build_source(config: &AppConfig, args: &SourceArgs) -> Result<Box<dyn SampleSource>> {
    Ok(match args.source {
        SourceKind::Live => Box::new(CpalSource::new(config.audio.clone())),
        SourceKind::Wav => {
            let Some(path) = &args.wav else {
                bail!("--source wav requires --wav <PATH>");
            };
            Box::new(
                WavFileSource::new(path, config.audio.window_size, config.meter.nominal_tick_hz)
                    .looping(args.looping),
            )
        }
        SourceKind::Synthetic => Box::new(synthetic_source(config, args.level_db)),
    })
}

fn synthetic_signal(level_db: f32) -> SyntheticSignal {
    SyntheticSignal {
        amplitude: 10f32.powf(level_db / 20.0).min(1.0),
        ..SyntheticSignal::default()
    }
}

fn synthetic_source(config: &AppConfig, level_db: f32) -> SyntheticSource {
    SyntheticSource::new(
        synthetic_signal(level_db),
        SYNTHETIC_SAMPLE_RATE,
        config.audio.window_size,
    )
}

/// Controller for commands that only touch settings and profiles
fn idle_controller(
    config: &AppConfig,
    store: Arc<dyn KeyValueStore>,
) -> SessionController<ScriptedSource> {
    SessionController::new(ScriptedSource::new(Vec::new()), store, &config.meter)
}
