use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cutline::{
    AspectRatio, EngineConfig, ExportEncoder, ExportProgress, ExportSettings, ExportStatus,
    FfmpegSink, FfmpegSinkOpts, FrameRGBA, FrameRate, FsMediaLoader, MediaResourceCache,
    PlaybackState, PlaybackSynchronizer, Project, QualityPreset, Timeline,
};

#[derive(Parser, Debug)]
#[command(name = "cutline", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the frame at one timeline instant as a PNG.
    Frame(FrameArgs),
    /// Export the timeline to an MP4 (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Play the timeline headless against the wall clock and save the last frame.
    Preview(PreviewArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Timeline time in seconds.
    #[arg(long)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Quality preset: fast, balanced or high.
    #[arg(long, default_value = "balanced")]
    preset: QualityPreset,

    /// Aspect ratio: 16:9, 4:3 or 9:16.
    #[arg(long, default_value = "16:9")]
    aspect: AspectRatio,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Quality preset: fast, balanced or high.
    #[arg(long, default_value = "balanced")]
    preset: QualityPreset,

    /// Aspect ratio: 16:9, 4:3 or 9:16.
    #[arg(long, default_value = "16:9")]
    aspect: AspectRatio,

    /// Frame rate: 24, 30 or 60.
    #[arg(long, default_value = "30")]
    fps: FrameRate,

    /// Override render worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Overwrite output if it already exists.
    #[arg(long, default_value_t = true)]
    overwrite: bool,

    /// Cancel the export after this many seconds.
    #[arg(long)]
    max_secs: Option<f64>,
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Wall-clock seconds to play.
    #[arg(long, default_value_t = 2.0)]
    seconds: f64,

    /// Output PNG path for the last rendered frame.
    #[arg(long)]
    out: PathBuf,

    /// Quality preset: fast, balanced or high.
    #[arg(long, default_value = "fast")]
    preset: QualityPreset,

    /// Aspect ratio: 16:9, 4:3 or 9:16.
    #[arg(long, default_value = "16:9")]
    aspect: AspectRatio,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Preview(args) => cmd_preview(args),
    }
}

struct Loaded {
    project: Project,
    timeline: Timeline,
    cache: MediaResourceCache,
    config: EngineConfig,
}

fn load(in_path: &Path) -> anyhow::Result<Loaded> {
    let project = Project::from_json_file(in_path)?;
    let timeline = project.build_timeline()?;
    let config = EngineConfig::from_env();
    let root = in_path.parent().unwrap_or_else(|| Path::new("."));
    let loader = FsMediaLoader::new(root, config.sample_rate, config.video_frame_cache);
    let cache = MediaResourceCache::from_config(Arc::new(loader), &config);
    Ok(Loaded {
        project,
        timeline,
        cache,
        config,
    })
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let loaded = load(&args.in_path)?;
    let canvas = ExportSettings {
        preset: args.preset,
        aspect: args.aspect,
        ..ExportSettings::default()
    }
    .canvas();

    let mut sync = PlaybackSynchronizer::new(loaded.cache, loaded.config, canvas)?;
    sync.set_timeline(loaded.timeline.snapshot(), loaded.project.volumes.clone());
    sync.seek(args.time);
    write_png(&args.out, &sync.frame())?;

    eprintln!("wrote {} (t = {:.3}s)", args.out.display(), sync.current_time());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let loaded = load(&args.in_path)?;
    let settings = ExportSettings {
        preset: args.preset,
        aspect: args.aspect,
        frame_rate: args.fps,
        threads: args.threads,
        overwrite: args.overwrite,
        ..ExportSettings::default()
    };

    let mut sink = FfmpegSink::new(FfmpegSinkOpts {
        out_path: args.out.clone(),
        overwrite: settings.overwrite,
        bg_rgba: [0, 0, 0, 255],
    });
    let mut encoder = ExportEncoder::new(loaded.cache, loaded.config, settings);

    let monitor = encoder.monitor();
    let watchdog = args.max_secs.map(|max| {
        let monitor = monitor.clone();
        std::thread::spawn(move || {
            let started = Instant::now();
            while !monitor.status().is_terminal() {
                if started.elapsed().as_secs_f64() >= max {
                    eprintln!("time limit of {max}s reached, cancelling");
                    monitor.cancel();
                    break;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        })
    });

    let outcome = encoder.run(
        loaded.timeline.items(),
        &loaded.project.volumes,
        &mut sink,
        &mut |p: &ExportProgress| {
            let eta = p
                .eta_secs
                .map(|s| format!("{s:.1}s"))
                .unwrap_or_else(|| "?".to_owned());
            eprintln!(
                "{:>5.1}% {}/{} frames, {:.1} fps, eta {eta}",
                p.fraction * 100.0,
                p.frames_done,
                p.total_frames,
                p.fps_throughput
            );
        },
    );
    if let Some(handle) = watchdog
        && handle.join().is_err()
    {
        eprintln!("watchdog thread panicked");
    }

    match outcome.status {
        ExportStatus::Completed => {
            eprintln!(
                "wrote {} ({} frames in {:.2}s)",
                args.out.display(),
                outcome.frames_encoded,
                outcome.elapsed.as_secs_f64()
            );
            Ok(())
        }
        ExportStatus::Cancelled => {
            eprintln!("export cancelled after {} frames", outcome.frames_encoded);
            Ok(())
        }
        ExportStatus::Error(msg) => anyhow::bail!("export failed: {msg}"),
        other => anyhow::bail!("export ended in non-terminal status {other:?}"),
    }
}

fn cmd_preview(args: PreviewArgs) -> anyhow::Result<()> {
    let loaded = load(&args.in_path)?;
    let canvas = ExportSettings {
        preset: args.preset,
        aspect: args.aspect,
        ..ExportSettings::default()
    }
    .canvas();

    let mut sync = PlaybackSynchronizer::new(loaded.cache, loaded.config, canvas)?;
    sync.set_timeline(loaded.timeline.snapshot(), loaded.project.volumes.clone());
    sync.seek(0.0);

    let started = Instant::now();
    sync.play(started);
    let budget = Duration::from_secs_f64(args.seconds.max(0.0));
    while started.elapsed() < budget && sync.state() == PlaybackState::Playing {
        std::thread::sleep(Duration::from_millis(16));
        sync.tick(Instant::now());
    }
    sync.stop();
    write_png(&args.out, &sync.frame())?;

    eprintln!(
        "wrote {} after {} renders (t = {:.3}s)",
        args.out.display(),
        sync.render_count(),
        sync.current_time()
    );
    Ok(())
}

fn write_png(out: &Path, frame: &FrameRGBA) -> anyhow::Result<()> {
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", out.display()))
}
