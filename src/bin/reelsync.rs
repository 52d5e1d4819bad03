use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use reelsync::audio::{AudioClip, FfmpegDecoder, FfprobeProbe, MediaProbe};
use reelsync::render::compose::{ComposeInputs, Corner};
use reelsync::timecode::document::{read_cues, write_cues};
use reelsync::timeline::{SegmentPolicy, SubtitleItem, VideoKind, VideoSegment, segment_text};
use reelsync::{
    FfmpegSink, FfmpegSinkOpts, FrameComposer, FrameIndex, FrameSink, NullSink, ReelConfig,
    RenderJob, TextRasterizer, TimelineComposer, TimelineDocument, build_encoder_plan,
    merge_audio_clips, session_duration,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reelsync", version)]
struct Cli {
    /// JSON config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the output width.
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Override the output height.
    #[arg(long, global = true)]
    height: Option<u32>,

    /// Override the output frame rate.
    #[arg(long, global = true)]
    fps: Option<u32>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split narration text into timed captions (SRT or VTT by extension).
    Segment(SegmentArgs),
    /// Convert a caption file between SRT and WebVTT.
    Convert(ConvertArgs),
    /// Build a timeline JSON document from captions, audio and video files.
    Timeline(TimelineArgs),
    /// Print (or run) the ffmpeg command that assembles a timeline.
    Plan(PlanArgs),
    /// Mix audio clips placed at start offsets into one file.
    MergeAudio(MergeAudioArgs),
    /// Render a timeline to an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single frame of a timeline as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct SegmentArgs {
    /// Narration text file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output caption file (.srt or .vtt).
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input caption file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output caption file; the extension picks the format.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct TimelineArgs {
    /// Caption file providing the subtitle track.
    #[arg(long)]
    captions: Option<PathBuf>,

    /// Audio file, one per caption in order (repeatable).
    #[arg(long = "audio")]
    audio: Vec<PathBuf>,

    /// Video segment as `TYPE=PATH`, TYPE one of chart, overlay, background (repeatable).
    #[arg(long = "video", value_parser = parse_video_segment)]
    video: Vec<VideoSegment>,

    /// Output timeline JSON.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Timeline JSON.
    #[arg(long)]
    timeline: PathBuf,

    /// Output video path.
    #[arg(long)]
    out: PathBuf,

    /// Caption file to burn in; by default the subtitle track is written next to the output.
    #[arg(long)]
    captions: Option<PathBuf>,

    /// Run the command instead of printing it.
    #[arg(long, default_value_t = false)]
    exec: bool,
}

#[derive(Parser, Debug)]
struct MergeAudioArgs {
    /// Clip as `PATH@START_SECONDS` (repeatable).
    #[arg(long = "clip", value_parser = parse_clip, required = true)]
    clips: Vec<AudioClip>,

    /// Output audio file (`.f32le` writes raw PCM).
    #[arg(long)]
    out: PathBuf,

    /// Timeline JSON that receives the merged file as its soundtrack.
    #[arg(long)]
    timeline: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Timeline JSON.
    #[arg(long)]
    timeline: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Soundtrack muxed into the video; its length sets the session duration. Defaults to the
    /// timeline's merged audio item.
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Static chart image drawn in the content area.
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Secondary-speaker video drawn in a corner.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Overlay corner.
    #[arg(long, default_value = "bottom-right")]
    corner: Corner,

    /// Extra font directory (repeatable).
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,

    /// Compose every frame without encoding.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Timeline JSON.
    #[arg(long)]
    timeline: PathBuf,

    /// Presentation time in seconds.
    #[arg(long)]
    time: f64,

    /// Static chart image.
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn parse_video_segment(s: &str) -> Result<VideoSegment, String> {
    let (kind, file) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=PATH, got '{s}'"))?;
    let kind: VideoKind = kind.parse().map_err(|e| format!("{e}"))?;
    Ok(VideoSegment {
        file: PathBuf::from(file),
        start_time: 0.0,
        duration: 0.0,
        kind,
    })
}

fn parse_clip(s: &str) -> Result<AudioClip, String> {
    let (file, start) = s
        .rsplit_once('@')
        .ok_or_else(|| format!("expected PATH@START_SECONDS, got '{s}'"))?;
    let start: f64 = start
        .parse()
        .map_err(|e| format!("invalid start '{start}': {e}"))?;
    if !(start.is_finite() && start >= 0.0) {
        return Err(format!("start must be >= 0, got {start}"));
    }
    Ok(AudioClip::new(file, start))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config.as_deref() {
        Some(path) => ReelConfig::from_path(path)?,
        None => ReelConfig::default(),
    };
    if let Some(w) = cli.width {
        config.output.width = w;
    }
    if let Some(h) = cli.height {
        config.output.height = h;
    }
    if let Some(fps) = cli.fps {
        config.output.fps = fps;
    }
    config.validate()?;
    match cli.cmd {
        Command::Segment(args) => cmd_segment(args, &config),
        Command::Convert(args) => cmd_convert(args),
        Command::Timeline(args) => cmd_timeline(args),
        Command::Plan(args) => cmd_plan(args, &config),
        Command::MergeAudio(args) => cmd_merge_audio(args),
        Command::Render(args) => cmd_render(args, &config),
        Command::Frame(args) => cmd_frame(args, &config),
    }
}

fn numbered(cues: Vec<reelsync::timeline::Cue>) -> Vec<SubtitleItem> {
    cues.into_iter()
        .enumerate()
        .map(|(i, cue)| SubtitleItem::from_cue(format!("subtitle_{}", i + 1), cue))
        .collect()
}

fn cmd_segment(args: SegmentArgs, config: &ReelConfig) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read narration '{}'", args.in_path.display()))?;
    let policy = SegmentPolicy::from(&config.captions);
    let items = numbered(segment_text(&text, &policy));
    reelsync::encode::process::ensure_parent_dir(&args.out)?;
    let style = write_cues(&args.out, &items)?;
    eprintln!("wrote {} cues ({style:?}) to {}", items.len(), args.out.display());
    Ok(())
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let items = numbered(read_cues(&args.in_path)?);
    reelsync::encode::process::ensure_parent_dir(&args.out)?;
    let style = write_cues(&args.out, &items)?;
    eprintln!("wrote {} cues ({style:?}) to {}", items.len(), args.out.display());
    Ok(())
}

fn cmd_timeline(args: TimelineArgs) -> anyhow::Result<()> {
    let cues = match args.captions.as_deref() {
        Some(path) => read_cues(path)?,
        None => Vec::new(),
    };
    let probe = FfprobeProbe;
    let video: Vec<VideoSegment> = args
        .video
        .into_iter()
        .filter_map(|mut seg| match probe.duration_secs(&seg.file) {
            Ok(d) => {
                seg.duration = d;
                Some(seg)
            }
            Err(err) => {
                tracing::warn!(path = %seg.file.display(), %err, "skipping video without duration");
                None
            }
        })
        .collect();
    let doc = TimelineDocument::create_timeline(&cues, &args.audio, &video, &probe);
    doc.save(&args.out)?;
    eprintln!(
        "wrote timeline ({:.3}s) to {}",
        doc.total_duration(),
        args.out.display()
    );
    Ok(())
}

fn cmd_plan(args: PlanArgs, config: &ReelConfig) -> anyhow::Result<()> {
    let doc = TimelineDocument::load(&args.timeline)?;
    let plan = build_encoder_plan(
        &doc,
        &args.out,
        args.captions.as_deref(),
        &config.encoder,
    );
    if args.exec {
        reelsync::encode::process::ensure_parent_dir(&args.out)?;
        plan.run()?;
        eprintln!("wrote {}", args.out.display());
    } else {
        plan.write_sidecar()?;
        println!("{plan}");
    }
    Ok(())
}

fn cmd_merge_audio(args: MergeAudioArgs) -> anyhow::Result<()> {
    reelsync::encode::process::ensure_parent_dir(&args.out)?;
    let merged = merge_audio_clips(&args.clips, &args.out, &FfmpegDecoder)?;
    eprintln!(
        "wrote {} ({:.3}s, {} clips mixed, {} skipped)",
        merged.path.display(),
        merged.duration_secs,
        merged.clips_mixed,
        merged.clips_skipped
    );
    if let Some(path) = args.timeline.as_deref() {
        let mut doc = TimelineDocument::load(path)?;
        let id = doc.register_audio(&merged.path, 0.0, merged.duration_secs)?;
        doc.save(path)?;
        eprintln!("registered {id} in {}", path.display());
    }
    Ok(())
}

fn build_composer(
    config: &ReelConfig,
    doc: TimelineDocument,
    inputs: &ComposeInputs,
    font_dirs: &[PathBuf],
) -> anyhow::Result<TimelineComposer> {
    let dirs: Vec<&Path> = font_dirs.iter().map(PathBuf::as_path).collect();
    let composer = TimelineComposer::new(
        config.canvas()?,
        doc,
        config.video.clone(),
        config.captions.clone(),
        TextRasterizer::new(&dirs),
    );
    Ok(inputs.apply(composer, config.fps()?.as_f64())?)
}

fn cmd_render(args: RenderArgs, config: &ReelConfig) -> anyhow::Result<()> {
    let doc = TimelineDocument::load(&args.timeline)?;
    let (audio, audio_secs) = match args.audio.clone() {
        Some(path) => {
            let secs = FfprobeProbe
                .duration_secs(&path)
                .with_context(|| format!("probe soundtrack '{}'", path.display()))?;
            (Some(path), Some(secs))
        }
        None => match doc.soundtrack() {
            Some(item) => {
                tracing::info!(id = %item.id, path = %item.file.display(), "using timeline soundtrack");
                (Some(item.file.clone()), Some(item.span.duration()))
            }
            None => (None, None),
        },
    };
    let duration = session_duration(&doc, audio_secs, config.video.fallback_duration_secs);

    let inputs = ComposeInputs {
        chart: args.chart.clone(),
        overlay: args.overlay.clone(),
        overlay_corner: args.corner,
    };
    let composer = build_composer(config, doc, &inputs, &args.font_dirs)?;

    let mut job = RenderJob::new(composer, config.fps()?, duration)
        .with_video_config(&config.video)
        .with_settings(config.encoder.clone());
    if let Some(audio) = audio.as_ref()
        && !args.dry_run
    {
        job = job.with_audio(&args.out, audio);
    }

    let mut null_sink = NullSink::default();
    let mut ffmpeg_sink;
    let sink: &mut dyn FrameSink = if args.dry_run {
        &mut null_sink
    } else {
        let mut opts = FfmpegSinkOpts::new(&args.out, config.encoder.clone());
        opts.background = config.video.background;
        ffmpeg_sink = FfmpegSink::new(opts);
        &mut ffmpeg_sink
    };

    let report = job.run(sink)?;
    eprintln!(
        "{} frames ({} placeholders), muxed: {}",
        report.frames_written, report.frames_placeholder, report.muxed
    );
    if !args.dry_run {
        eprintln!("wrote {}", args.out.display());
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs, config: &ReelConfig) -> anyhow::Result<()> {
    let doc = TimelineDocument::load(&args.timeline)?;
    let inputs = ComposeInputs {
        chart: args.chart.clone(),
        ..ComposeInputs::default()
    };
    let mut composer = build_composer(config, doc, &inputs, &[])?;
    let fps = config.fps()?;
    let idx = FrameIndex((args.time.max(0.0) * fps.as_f64()).floor() as u64);
    let frame = composer.compose(idx, args.time)?;
    frame.save_png(&args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
