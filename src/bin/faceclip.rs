use std::{
    fs,
    path::PathBuf,
    sync::Arc,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use faceclip::{
    Catalog, ClipEncoderOptions, ClipExporter, ClipPipeline, ClipWindow, CommandDetector,
    FaceCounter, FrameSize, OperationType, PipelineOptions, ProgressCallback, ProgressInfo,
    SegmentOptions, VideoCodec, VideoSource, select_windows,
};
use ffmpeg_next::util::log::Level as FfmpegLevel;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use serde_json::{Value, json};

const CLI_AFTER_HELP: &str = "Examples:\n  faceclip metadata input.mp4 --json\n  faceclip count input.mp4 --detector python3 --detector-arg detect.py --json > counts.json\n  faceclip segment --counts counts.json --fps 30\n  faceclip export input.mp4 --start 0 --end 700 --prefix demo --out clips\n  faceclip run --catalog videos.json --out clips --detector python3 --detector-arg detect.py --progress\n  faceclip completions zsh > _faceclip";

#[derive(Debug, Parser)]
#[command(
    name = "faceclip",
    version,
    about = "Cut videos into clips where a chosen number of faces is on screen",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar for counting and export.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Args, Clone)]
struct DetectorArgs {
    /// Detector program speaking the one-line-per-frame protocol.
    #[arg(long)]
    detector: String,

    /// Argument passed to the detector program (repeatable).
    #[arg(long = "detector-arg", allow_hyphen_values = true)]
    detector_args: Vec<String>,
}

#[derive(Debug, Args, Clone)]
struct SamplingArgs {
    /// Seconds of video per sampled unit.
    #[arg(long, default_value_t = 1)]
    interval: u32,

    /// Sampled frames decoded per batch.
    #[arg(long, default_value_t = 80)]
    batch_size: usize,

    /// Detector input width.
    #[arg(long, default_value_t = 576)]
    width: u32,

    /// Detector input height.
    #[arg(long, default_value_t = 324)]
    height: u32,

    /// Hand frames to the detector at source resolution.
    #[arg(long)]
    no_resize: bool,
}

#[derive(Debug, Args, Clone)]
struct SegmentArgs {
    /// Face count a run must have.
    #[arg(long, default_value_t = 1)]
    target: usize,

    /// Minimum run length in sampled units.
    #[arg(long, default_value_t = 10)]
    min_units: usize,

    /// Maximum clip length in frames.
    #[arg(long, default_value_t = 700)]
    max_frames: u64,

    /// Also evaluate the run that reaches the end of the video.
    #[arg(long)]
    flush_trailing: bool,

    /// Clamp the last window of each run to the run's end.
    #[arg(long)]
    clamp: bool,
}

#[derive(Debug, Args, Clone)]
struct EncoderArgs {
    /// Clip codec (h264, h265, mpeg4).
    #[arg(long, default_value = "h264")]
    codec: String,

    /// Constant Rate Factor.
    #[arg(long, default_value_t = 23)]
    crf: u32,

    /// Container extension.
    #[arg(long, default_value = "mp4")]
    ext: String,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print video metadata.
    #[command(
        visible_alias = "probe",
        after_help = "Examples:\n  faceclip metadata input.mp4\n  faceclip metadata input.mp4 --json"
    )]
    Metadata {
        /// Input video path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Count faces once per sampled unit.
    Count {
        /// Input video path.
        input: PathBuf,

        #[command(flatten)]
        detector: DetectorArgs,

        #[command(flatten)]
        sampling: SamplingArgs,

        /// Output the sequence as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Select clip windows from a saved face-count sequence.
    #[command(
        after_help = "The counts file is either a JSON array of integers or the object printed by `faceclip count --json`."
    )]
    Segment {
        /// JSON file holding the face counts.
        #[arg(long)]
        counts: PathBuf,

        /// Average frame rate of the video the counts came from.
        #[arg(long)]
        fps: u32,

        /// Seconds of video per sampled unit.
        #[arg(long, default_value_t = 1)]
        interval: u32,

        #[command(flatten)]
        segment: SegmentArgs,

        /// Output windows as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export one frame window as a clip.
    Export {
        /// Input video path.
        input: PathBuf,
        /// First frame (inclusive).
        #[arg(long)]
        start: u64,
        /// End frame (exclusive).
        #[arg(long)]
        end: u64,
        /// Clip file name prefix.
        #[arg(long)]
        prefix: String,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        encoder: EncoderArgs,
    },

    /// Run the full pipeline over a catalog of downloaded videos.
    Run {
        /// Catalog JSON: {"<url>": {"path": "...", "search_string": "..."}}.
        #[arg(long)]
        catalog: PathBuf,
        /// Output directory for clips.
        #[arg(long)]
        out: PathBuf,

        #[command(flatten)]
        detector: DetectorArgs,

        #[command(flatten)]
        sampling: SamplingArgs,

        #[command(flatten)]
        segment: SegmentArgs,

        #[command(flatten)]
        encoder: EncoderArgs,

        /// Output the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_log_level(value: &str) -> Option<FfmpegLevel> {
    match value.to_ascii_lowercase().as_str() {
        "quiet" => Some(FfmpegLevel::Quiet),
        "panic" => Some(FfmpegLevel::Panic),
        "fatal" => Some(FfmpegLevel::Fatal),
        "error" => Some(FfmpegLevel::Error),
        "warning" | "warn" => Some(FfmpegLevel::Warning),
        "info" => Some(FfmpegLevel::Info),
        "verbose" => Some(FfmpegLevel::Verbose),
        "debug" => Some(FfmpegLevel::Debug),
        "trace" => Some(FfmpegLevel::Trace),
        _ => None,
    }
}

fn parse_codec(value: &str) -> Option<VideoCodec> {
    match value.to_ascii_lowercase().as_str() {
        "h264" | "avc" | "x264" => Some(VideoCodec::H264),
        "h265" | "hevc" | "x265" => Some(VideoCodec::H265),
        "mpeg4" | "mp4v" => Some(VideoCodec::Mpeg4),
        _ => None,
    }
}

/// Accepts `[1, 0, 2]` or `{"counts": [1, 0, 2], ...}`.
fn parse_counts(json: &str) -> Result<Vec<usize>, String> {
    let value: Value = serde_json::from_str(json).map_err(|error| error.to_string())?;
    let array = match &value {
        Value::Array(array) => array,
        Value::Object(object) => object
            .get("counts")
            .and_then(Value::as_array)
            .ok_or("object has no \"counts\" array")?,
        _ => return Err("expected an array of face counts".to_string()),
    };
    array
        .iter()
        .map(|count| {
            count
                .as_u64()
                .map(|count| count as usize)
                .ok_or_else(|| format!("not a face count: {count}"))
        })
        .collect()
}

fn logger_builder(verbose: bool) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .format_timestamp(None);
    builder
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG directives are parsed last and take precedence.
    logger_builder(global.verbose).parse_default_env().try_init()?;

    if let Some(level) = &global.log_level {
        let parsed = parse_log_level(level).ok_or(format!("unsupported --log-level: {level}"))?;
        ffmpeg_next::util::log::set_level(parsed);
    }

    Ok(())
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg:>8} {bar:40.cyan/blue} {pos}/{len} ({eta})",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let label = match info.operation {
            OperationType::FaceCounting => "counting",
            OperationType::ClipExport => "export",
            _ => "working",
        };
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_message(label);
        self.bar.set_position(info.current);
    }
}

fn spawn_detector(args: &DetectorArgs) -> Result<CommandDetector, Box<dyn std::error::Error>> {
    CommandDetector::spawn(&args.detector, &args.detector_args)
        .map_err(|error| format!("cannot start detector `{}`: {error}", args.detector).into())
}

fn segment_options(args: &SegmentArgs) -> SegmentOptions {
    SegmentOptions::default()
        .target_face_count(args.target)
        .min_run_units(args.min_units)
        .max_clip_frames(args.max_frames)
        .flush_trailing_run(args.flush_trailing)
        .clamp_window_end(args.clamp)
}

fn encoder_options(args: &EncoderArgs) -> Result<ClipEncoderOptions, Box<dyn std::error::Error>> {
    let codec = parse_codec(&args.codec).ok_or(format!("unsupported --codec: {}", args.codec))?;
    Ok(ClipEncoderOptions::default()
        .codec(codec)
        .crf(args.crf)
        .extension(&args.ext))
}

fn pipeline_options(sampling: &SamplingArgs) -> PipelineOptions {
    let frame_size = (!sampling.no_resize).then(|| FrameSize::new(sampling.width, sampling.height));
    PipelineOptions::new()
        .with_sample_interval(sampling.interval)
        .with_batch_size(sampling.batch_size)
        .with_frame_size(frame_size)
}

fn windows_json(windows: &[ClipWindow]) -> Value {
    Value::Array(
        windows
            .iter()
            .map(|window| json!({ "start_frame": window.start_frame, "end_frame": window.end_frame }))
            .collect(),
    )
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    let progress = if cli.global.progress {
        Some(Arc::new(TerminalProgress::new()?))
    } else {
        None
    };
    let with_progress = |options: PipelineOptions| match &progress {
        Some(progress) => options.with_progress(progress.clone()),
        None => options,
    };

    match cli.command {
        Commands::Metadata { input, json } => {
            let source = VideoSource::open(&input)?;
            let metadata = source.metadata();
            if json {
                let payload = json!({
                    "width": metadata.width,
                    "height": metadata.height,
                    "fps": metadata.frames_per_second,
                    "average_frame_rate": metadata.average_frame_rate,
                    "frame_count": metadata.frame_count,
                    "frame_count_estimated": metadata.frame_count_estimated,
                    "duration_seconds": metadata.duration.as_secs_f64(),
                    "codec": metadata.codec,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{} {}", "file".bold(), input.display());
                println!("  {}x{} {}", metadata.width, metadata.height, metadata.codec);
                println!(
                    "  {:.3} fps (indexed at {}), {} frames{}",
                    metadata.frames_per_second,
                    metadata.average_frame_rate,
                    metadata.frame_count,
                    if metadata.frame_count_estimated { " (estimated)" } else { "" },
                );
                println!("  {:.3}s", metadata.duration.as_secs_f64());
            }
        }
        Commands::Count {
            input,
            detector,
            sampling,
            json,
        } => {
            let options = with_progress(pipeline_options(&sampling));
            let counter = FaceCounter::new(spawn_detector(&detector)?);
            let mut source = VideoSource::open(&input)?;
            let sequence = counter.count_video(&mut source, &options)?;
            if let Some(progress) = &progress {
                progress.finish();
            }

            if json {
                let payload = json!({
                    "source": input.display().to_string(),
                    "average_frame_rate": source.average_frame_rate(),
                    "frames_per_unit": sequence.frames_per_unit,
                    "counts": sequence.counts,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for (unit, count) in sequence.counts.iter().enumerate() {
                    println!(
                        "unit {unit:>6} (frame {:>8}): {count}",
                        unit as u64 * sequence.frames_per_unit
                    );
                }
            }
        }
        Commands::Segment {
            counts,
            fps,
            interval,
            segment,
            json,
        } => {
            let counts = parse_counts(&fs::read_to_string(&counts)?)?;
            let frames_per_unit = fps as u64 * interval as u64;
            let windows = select_windows(&counts, frames_per_unit, &segment_options(&segment))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&windows_json(&windows))?);
            } else {
                for window in &windows {
                    println!("{}\t{}", window.start_frame, window.end_frame);
                }
                if cli.global.verbose {
                    eprintln!("{} {} window(s)", "selected".green().bold(), windows.len());
                }
            }
        }
        Commands::Export {
            input,
            start,
            end,
            prefix,
            out,
            encoder,
        } => {
            if start >= end {
                return Err("--start must be < --end".into());
            }
            let mut source = VideoSource::open(&input)?;
            let exporter = ClipExporter::new(&out, encoder_options(&encoder)?);
            match exporter.export_clip(&mut source, ClipWindow::new(start, end), &prefix)? {
                Some(path) => println!("{} {}", "saved".green().bold(), path.display()),
                None => eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    "window holds no decodable frame; nothing written".yellow()
                ),
            }
        }
        Commands::Run {
            catalog,
            out,
            detector,
            sampling,
            segment,
            encoder,
            json,
        } => {
            let catalog = Catalog::from_json_file(&catalog)?;
            let options = with_progress(pipeline_options(&sampling))
                .with_segment_options(segment_options(&segment))
                .with_encoder(encoder_options(&encoder)?)
                .with_output_directory(&out);
            let pipeline = ClipPipeline::new(spawn_detector(&detector)?, options)?;
            let report = pipeline.process_catalog(&catalog.entries);
            if let Some(progress) = &progress {
                progress.finish();
            }

            if json {
                let payload = json!({
                    "videos": report.videos.iter().map(|video| json!({
                        "source": video.source.display().to_string(),
                        "prefix": video.prefix,
                        "frame_count": video.metadata.frame_count,
                        "fps": video.metadata.frames_per_second,
                        "units": video.face_counts.len(),
                        "windows": windows_json(&video.windows),
                        "written": video.written.iter().map(|path| path.display().to_string()).collect::<Vec<_>>(),
                        "skipped": windows_json(&video.skipped),
                        "failed": video.failed.iter().map(|(window, error)| json!({
                            "start_frame": window.start_frame,
                            "end_frame": window.end_frame,
                            "error": error.to_string(),
                        })).collect::<Vec<_>>(),
                    })).collect::<Vec<_>>(),
                    "missing": report.missing.iter().map(|path| path.display().to_string()).collect::<Vec<_>>(),
                    "failed": report.failed.iter().map(|(path, error)| json!({
                        "source": path.display().to_string(),
                        "error": error.to_string(),
                    })).collect::<Vec<_>>(),
                    "clips_written": report.clips_written(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                for video in &report.videos {
                    println!(
                        "{} {} ({} window(s), {} written)",
                        "processed".green().bold(),
                        video.source.display(),
                        video.windows.len(),
                        video.written.len(),
                    );
                    for (window, error) in &video.failed {
                        println!(
                            "  {} [{}, {}): {error}",
                            "failed".red().bold(),
                            window.start_frame,
                            window.end_frame,
                        );
                    }
                }
                for path in &report.missing {
                    println!("{} {}", "missing".yellow().bold(), path.display());
                }
                for (path, error) in &report.failed {
                    println!("{} {}: {error}", "failed".red().bold(), path.display());
                }
                println!(
                    "{} clip(s) written to {}",
                    report.clips_written(),
                    out.display()
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "faceclip", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use super::{logger_builder, parse_codec, parse_counts, parse_log_level};

    #[test]
    fn verbose_lowers_the_log_filter() {
        assert_eq!(logger_builder(false).build().filter(), LevelFilter::Warn);
        assert_eq!(logger_builder(true).build().filter(), LevelFilter::Debug);
    }

    #[test]
    fn parse_log_level_aliases() {
        assert!(parse_log_level("quiet").is_some());
        assert!(parse_log_level("WARN").is_some());
        assert!(parse_log_level("warning").is_some());
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn parse_codec_aliases() {
        assert!(parse_codec("h264").is_some());
        assert!(parse_codec("HEVC").is_some());
        assert!(parse_codec("mpeg4").is_some());
        assert!(parse_codec("vp9").is_none());
    }

    #[test]
    fn parse_counts_formats() {
        assert_eq!(parse_counts("[1, 0, 2]").unwrap(), vec![1, 0, 2]);
        assert_eq!(
            parse_counts(r#"{"frames_per_unit": 30, "counts": [3]}"#).unwrap(),
            vec![3]
        );
        assert!(parse_counts("[1, -1]").is_err());
        assert!(parse_counts("{\"other\": []}").is_err());
        assert!(parse_counts("7").is_err());
    }
}
