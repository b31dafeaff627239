use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vibereel", version)]
struct Cli {
    /// Log filter used when `RUST_LOG` is unset (e.g. `info`, `vibereel=debug`).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export the project as an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Render a single preview frame as a PNG.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct Overrides {
    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Output height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Output frame rate (integer frames per second).
    #[arg(long)]
    fps: Option<u32>,

    /// Visualization mode: `bars`, `orbital` or `wave`.
    #[arg(long)]
    mode: Option<String>,

    /// Background image, replacing the project's.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Font file for the title block.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Chunk length in seconds.
    #[arg(long)]
    chunk_secs: Option<f64>,

    /// Worker threads for spectrum analysis.
    #[arg(long)]
    threads: Option<usize>,

    /// Print the render report as JSON on stdout.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Time on the timeline, in seconds.
    #[arg(long)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    overrides: Overrides,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn load_project(in_path: &std::path::Path, o: &Overrides) -> anyhow::Result<vibereel::Project> {
    let mut project = vibereel::Project::from_path(in_path)
        .with_context(|| format!("load project '{}'", in_path.display()))?;
    if let Some(w) = o.width {
        project.render.width = w;
    }
    if let Some(h) = o.height {
        project.render.height = h;
    }
    if let Some(fps) = o.fps {
        project.render.fps = vibereel::Fps::new(fps, 1)?;
    }
    if let Some(mode) = &o.mode {
        project.visual.mode = serde_json::from_value(serde_json::Value::String(mode.clone()))
            .with_context(|| format!("unknown visualization mode '{mode}'"))?;
    }
    // Paths given on the command line are relative to the working directory.
    if let Some(bg) = &o.background {
        project.background_image = Some(std::path::absolute(bg)?);
    }
    if let Some(font) = &o.font {
        project.visual.font_path = Some(std::path::absolute(font)?);
    }
    Ok(project)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    vibereel::encode::ffmpeg::require_ffmpeg()?;
    let mut project = load_project(&args.in_path, &args.overrides)?;
    if let Some(c) = args.chunk_secs {
        project.render.chunk_secs = c;
    }
    if args.threads.is_some() {
        project.render.threads = args.threads;
    }
    let mut session = project.into_session(vibereel::AutoDecoder::default())?;

    let (video_path, audio_path) = vibereel::intermediate_paths(&args.out);
    let mut video = vibereel::FfmpegVideoEncoder::new(video_path);
    let mut audio = vibereel::FfmpegAudioEncoder::new(audio_path);
    let mut muxer = vibereel::FfmpegMuxer::new(&args.out);

    let mut progress = |fraction: f64, status: &str| {
        eprint!("\r[{:>3.0}%] {status:<40}", fraction * 100.0);
    };
    let res = session.render(
        vibereel::RenderOutputs {
            video: &mut video,
            audio: &mut audio,
            muxer: &mut muxer,
        },
        &mut progress,
        None,
    );
    eprintln!();
    let report = res?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    eprintln!(
        "wrote {} ({} frames, {} chunks)",
        report.output.display(),
        report.stats.frames_encoded,
        report.stats.chunks
    );
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let project = load_project(&args.in_path, &args.overrides)?;
    let mut session = project.into_session(vibereel::AutoDecoder::default())?;
    let frame = session.render_frame_at(args.at)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    // The background layer is opaque, so premultiplied and straight alpha coincide.
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
