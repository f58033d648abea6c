use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sha2::Digest as _;

use cutline::audio::output::SoftwareOutput;
use cutline::decode::cache::{FrameCache, FrameCacheOpts};
use cutline::playback::clock::SystemClock;
use cutline::playback::driver::run_realtime;
use cutline::render::compositor::{Compositor, CompositorOpts};
use cutline::{
    Color, CpuSurface, ExportOpts, Exporter, FfmpegMuxer, Fps, FsMediaLoader, MediaLoader,
    PcmAudioEncoder, PlaybackOpts, PlaybackScheduler, RawVideoEncoder, Timeline,
};

#[derive(Parser, Debug)]
#[command(name = "cutline", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the render plan of one frame as JSON.
    Plan(PlanArgs),
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Export an MP4 video (requires `ffmpeg` on PATH).
    Export(ExportArgs),
    /// Play headless in real time and print playback stats.
    Play(PlayArgs),
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// TTF/OTF font used for text items.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Output frame rate, `30` or `30000/1001`. Defaults to the timeline's.
    #[arg(long, value_parser = parse_fps)]
    fps: Option<Fps>,

    /// TTF/OTF font used for text items.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Export without an audio stream.
    #[arg(long, default_value_t = false)]
    no_audio: bool,

    /// Print the SHA-256 of the written file.
    #[arg(long, default_value_t = false)]
    digest: bool,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Stop after this many seconds of wall time.
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,

    /// Start position in seconds.
    #[arg(long, default_value_t = 0.0)]
    start: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
        Command::Play(args) => cmd_play(args),
    }
}

fn parse_fps(s: &str) -> Result<Fps, String> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (n.trim(), d.trim()),
        None => (s.trim(), "1"),
    };
    let num = num.parse::<u32>().map_err(|e| format!("bad fps numerator: {e}"))?;
    let den = den.parse::<u32>().map_err(|e| format!("bad fps denominator: {e}"))?;
    Fps::new(num, den).map_err(|e| e.to_string())
}

fn read_timeline(path: &Path) -> anyhow::Result<Timeline> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("open timeline '{}'", path.display()))?;
    let timeline = Timeline::from_json(&json).with_context(|| "parse timeline JSON")?;
    Ok(timeline)
}

fn media_root(in_path: &Path) -> &Path {
    in_path.parent().unwrap_or_else(|| Path::new("."))
}

fn make_surface(width: u32, height: u32, font: Option<&Path>) -> anyhow::Result<CpuSurface> {
    let surface = CpuSurface::new(width, height)?;
    Ok(match font {
        Some(path) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
            surface.with_font(&bytes)?
        }
        None => surface,
    })
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let timeline = read_timeline(&args.in_path)?;
    let plan = timeline.render_plan(args.frame);
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let timeline = read_timeline(&args.in_path)?;
    let loader = FsMediaLoader::new(media_root(&args.in_path));
    let surface = make_surface(args.width, args.height, args.font.as_deref())?;
    let mut compositor = Compositor::new(
        surface,
        CompositorOpts {
            background: Color::rgb(0, 0, 0),
            ..CompositorOpts::default()
        },
    )?;

    let plan = timeline.render_plan(args.frame);
    let t = timeline.fps.frames_to_secs(args.frame);
    let key_ms = (t * 1000.0).round() as u64;

    let mut cache = FrameCache::new(FrameCacheOpts::default());
    let mut frames = HashMap::new();
    let mut stills = Vec::new();
    for layer in &plan.layers {
        let item = &layer.item;
        if let cutline::ItemKind::Image { source } = &item.kind {
            stills.push(source.as_str());
        }
        let Some(clip) = item.media() else {
            continue;
        };
        cache.attach_decoder(item.id.clone(), loader.open_video(&clip.source)?)?;
        let source_time_s =
            (clip.trim_start_s + (t - timeline.fps.frames_to_secs(item.start))).max(0.0);
        let image = cache
            .await_frame(&item.id, key_ms, source_time_s)
            .with_context(|| format!("decode frame of '{}'", clip.source))?;
        frames.insert(item.id.clone(), image);
    }
    compositor.load_stills(stills, &loader);

    compositor.render_frame(&plan, &frames)?;
    let frame = compositor.read_rgba8()?;
    cache.cleanup();

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let timeline = read_timeline(&args.in_path)?;
    let loader: Arc<dyn MediaLoader> = Arc::new(FsMediaLoader::new(media_root(&args.in_path)));

    let defaults = ExportOpts::default();
    let opts = ExportOpts {
        width: args.width.unwrap_or(defaults.width),
        height: args.height.unwrap_or(defaults.height),
        fps: args.fps,
        include_audio: !args.no_audio,
        ..defaults
    };

    let surface = make_surface(opts.width, opts.height, args.font.as_deref())?;
    let mut exporter = Exporter::new(surface, loader)?;
    let out = exporter.export(
        &timeline,
        &opts,
        &mut RawVideoEncoder::with_background(opts.background),
        &mut PcmAudioEncoder::new(),
        &mut FfmpegMuxer::new(),
    )?;

    cutline::export::ffmpeg::ensure_parent_dir(&args.out)?;
    let tmp = args.out.with_extension("mp4.partial");
    std::fs::write(&tmp, &out.container)
        .with_context(|| format!("write '{}'", tmp.display()))?;
    std::fs::rename(&tmp, &args.out)
        .with_context(|| format!("move output into place at '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} frames, {} bytes)",
        args.out.display(),
        out.frames,
        out.container.len()
    );
    if args.digest {
        println!("{}", sha256_hex(&out.container));
    }
    Ok(())
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let timeline = read_timeline(&args.in_path)?;
    let loader: Arc<dyn MediaLoader> = Arc::new(FsMediaLoader::new(media_root(&args.in_path)));
    let output = SoftwareOutput::new(48_000, 2)?;
    let compositor = Compositor::new(CpuSurface::new(640, 360)?, CompositorOpts::default())?;

    let mut player = PlaybackScheduler::new(
        Arc::new(timeline),
        compositor,
        Box::new(output.clone()),
        loader,
        Box::new(SystemClock::new()),
        PlaybackOpts::default(),
    );
    player.seek_to(args.start);

    let max = Duration::try_from_secs_f64(args.seconds.max(0.0))
        .with_context(|| format!("invalid --seconds {}", args.seconds))?;
    let stats = run_realtime(&mut player, max, Some(&output));
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
