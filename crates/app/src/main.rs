use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use event_sounds_core::{
    display_path,
    selection::collect_candidates,
    timeline::{insert_sequential, plan_strip_duplicates, HostCapabilities, StripSpan},
    AudioEvent, CameraGeometry, EventSoundEngine, EventSoundError, EventSoundsConfig, HostApi,
    MemoryDestination, MemoryTimeline, MotionRecording, SceneContext, SoundSource,
    TimelineExporter,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

fn main() -> event_sounds_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect {
            recording,
            config,
            seed,
            sounds_dir,
            legacy_host,
            output,
            edit_list,
        } => run_detect(DetectArgs {
            recording: &recording,
            config: config.as_deref(),
            seed,
            sounds_dir: sounds_dir.as_deref(),
            legacy_host,
            output: &output,
            edit_list: edit_list.as_deref(),
        }),
        Commands::Export {
            events,
            config,
            fps,
            start,
            output,
        } => run_export(&events, config.as_deref(), fps, start, &output),
        Commands::Insert {
            asset,
            config,
            playhead,
            fps,
            count,
            legacy_host,
            output,
        } => run_insert(
            &asset,
            config.as_deref(),
            playhead,
            fps,
            count,
            legacy_host,
            &output,
        ),
        Commands::Duplicate {
            start,
            end,
            config,
            count,
            offset,
        } => run_duplicate(start, end, config.as_deref(), count, offset),
    }
}

/// Scheduled events as written by `detect` and read by `export`.
#[derive(Debug, Serialize, Deserialize)]
struct EventsDocument {
    fps: f64,
    frame_start: i64,
    events: Vec<AudioEvent>,
}

fn load_config(path: Option<&Path>) -> event_sounds_core::Result<EventSoundsConfig> {
    match path {
        Some(path) => EventSoundsConfig::load(path),
        None => Ok(EventSoundsConfig::default()),
    }
}

fn host_api(legacy: bool) -> event_sounds_core::Result<HostApi> {
    HostApi::detect(HostCapabilities {
        strips: !legacy,
        sequences: true,
    })
}

struct DetectArgs<'a> {
    recording: &'a Path,
    config: Option<&'a Path>,
    seed: Option<u64>,
    sounds_dir: Option<&'a Path>,
    legacy_host: bool,
    output: &'a Path,
    edit_list: Option<&'a Path>,
}

fn run_detect(args: DetectArgs<'_>) -> event_sounds_core::Result<()> {
    tracing::info!(
        recording = %display_path(&args.recording.display().to_string()),
        "detecting motion sounds"
    );

    let mut recording = MotionRecording::load(args.recording)?;
    let mut config = load_config(args.config)?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(dir) = args.sounds_dir {
        let candidates = collect_candidates(dir)?;
        tracing::info!(
            dir = %display_path(&dir.display().to_string()),
            sounds = candidates.len(),
            "picking sounds at random from folder"
        );
        config.selection = SoundSource::Random { candidates };
    }

    let points = recording.tracked_points();
    let camera = recording.camera();
    let scene = SceneContext {
        fps: recording.fps,
        frame_range: recording.frame_range,
        available_points: &points,
        camera: camera.as_ref().map(|c| c as &dyn CameraGeometry),
    };

    let mut engine = EventSoundEngine::new(config)?;
    let mut timeline = MemoryTimeline::with_assets(
        host_api(args.legacy_host)?,
        recording.fps,
        recording.frame_range.start,
        engine.asset_store(),
    );
    let (events, report) = engine.run_on_timeline(&mut recording, scene, &mut timeline)?;

    if !report.is_complete() {
        tracing::warn!(failed = report.failures.len(), "some events could not be placed");
    }

    let document = EventsDocument {
        fps: recording.fps,
        frame_start: recording.frame_range.start,
        events,
    };
    std::fs::write(args.output, serde_json::to_string_pretty(&document)?)?;

    if let Some(path) = args.edit_list {
        std::fs::write(path, serde_json::to_string_pretty(&timeline.to_json()?)?)?;
    }

    tracing::info!(
        events = document.events.len(),
        output = ?args.output,
        "wrote scheduled events"
    );
    Ok(())
}

fn run_export(
    events_path: &Path,
    config_path: Option<&Path>,
    fps: f64,
    start: i64,
    output: &Path,
) -> event_sounds_core::Result<()> {
    let document: EventsDocument = serde_json::from_str(&std::fs::read_to_string(events_path)?)?;
    let engine = EventSoundEngine::new(load_config(config_path)?)?;
    let mut assets = engine.asset_store();

    let mut destination = MemoryDestination::new(fps, start);
    let report = TimelineExporter::new(document.fps, document.frame_start).export(
        &document.events,
        &mut destination,
        &mut assets,
    )?;

    for failure in &report.failures {
        tracing::warn!(
            frame = failure.source_frame,
            asset = %display_path(&failure.asset_path.display().to_string()),
            reason = %failure.reason,
            "event not exported"
        );
    }

    let written = serde_json::json!({
        "timeline": &destination,
        "report": &report,
    });
    std::fs::write(output, serde_json::to_string_pretty(&written)?)?;
    tracing::info!(clips = report.clips.len(), fps, start, "exported timeline");
    Ok(())
}

fn run_insert(
    asset: &Path,
    config_path: Option<&Path>,
    playhead: i64,
    fps: f64,
    count: Option<usize>,
    legacy_host: bool,
    output: &Path,
) -> event_sounds_core::Result<()> {
    let config = load_config(config_path)?;
    let count = count.unwrap_or(config.insertion.count);
    if count == 0 {
        return Err(EventSoundError::invalid("count must be at least 1"));
    }

    let mut timeline = MemoryTimeline::new(host_api(legacy_host)?, fps, playhead);
    let clips = insert_sequential(&mut timeline, asset, count, &config.insertion.clip_prefix)?;

    std::fs::write(output, serde_json::to_string_pretty(&timeline.to_json()?)?)?;
    tracing::info!(count = clips.len(), playhead, "wrote insertion edit list");
    Ok(())
}

fn run_duplicate(
    start: f64,
    end: f64,
    config_path: Option<&Path>,
    count: Option<u32>,
    offset: Option<i64>,
) -> event_sounds_core::Result<()> {
    let defaults = load_config(config_path)?.duplication;
    let plan = plan_strip_duplicates(
        StripSpan {
            frame_start: start,
            frame_end: end,
        },
        count.unwrap_or(defaults.count),
        offset.unwrap_or(defaults.offset),
    )?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Motion-triggered sound placement", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect threshold crossings in a motion recording and schedule sounds.
    Detect {
        /// Motion recording (JSON) exported from the scene.
        recording: PathBuf,
        /// Output path for the scheduled events.
        output: PathBuf,
        /// Engine configuration (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seed for random volume and sound selection.
        #[arg(long)]
        seed: Option<u64>,
        /// Pick each event's sound at random from the audio files in this
        /// folder, replacing the configured sound selection.
        #[arg(long)]
        sounds_dir: Option<PathBuf>,
        /// Target a host that only offers the older sequences API.
        #[arg(long)]
        legacy_host: bool,
        /// Also write the local timeline edit list here.
        #[arg(long)]
        edit_list: Option<PathBuf>,
    },
    /// Re-place scheduled events on a timeline with another frame rate.
    Export {
        /// Events written by `detect`.
        events: PathBuf,
        /// Output path for the destination timeline.
        output: PathBuf,
        /// Engine configuration, for declared asset durations.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Destination frame rate.
        #[arg(long)]
        fps: f64,
        /// Destination start frame.
        #[arg(long, default_value_t = 0)]
        start: i64,
    },
    /// Insert one sound several times back to back from the playhead.
    Insert {
        /// Sound file to insert.
        asset: PathBuf,
        /// Output path for the edit list.
        output: PathBuf,
        /// Engine configuration, for the insertion defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        playhead: i64,
        #[arg(long, default_value_t = 24.0)]
        fps: f64,
        /// Number of copies (configured, else 5).
        #[arg(long)]
        count: Option<usize>,
        #[arg(long)]
        legacy_host: bool,
    },
    /// Plan linked duplicates of an animation strip at a fixed frame offset.
    Duplicate {
        /// First frame of the source strip.
        start: f64,
        /// Last frame of the source strip.
        end: f64,
        /// Engine configuration, for the duplication defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of duplicates, 1 to 1000 (configured, else 50).
        #[arg(long)]
        count: Option<u32>,
        /// Frames between duplicates (configured, else 24).
        #[arg(long)]
        offset: Option<i64>,
    },
}
