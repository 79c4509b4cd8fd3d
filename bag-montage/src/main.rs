use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use eyre::{Context, Result};

use bag_montage::{run_export, ExportConfig, ExportMode, OverlayConfig};
use topic_source::{ChainSource, DirSource, TimePolicy, TopicSource};

#[derive(Parser)]
#[command(author, version, about = "extract and composite image topics from recorded logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Log directories to read, processed as one recording in the order
    /// given.
    #[arg(required = true)]
    inputs: Vec<Utf8PathBuf>,

    /// Image topic to include in the output (may be specified multiple
    /// times). Auto-detected when the logs contain exactly one image
    /// topic.
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Resizes all images to match the height of the topic at this
    /// index.
    #[arg(long, short = 'i', default_value_t = 0)]
    index: usize,

    /// Global scale for all images.
    #[arg(long, short = 'x', default_value_t = 1.0)]
    scale: f64,

    /// Time in seconds representing where to start in the recording.
    #[arg(long, short = 's')]
    start: Option<f64>,

    /// Time in seconds representing where to stop in the recording.
    #[arg(long, short = 'e')]
    stop: Option<f64>,

    /// Use log record time rather than the stamp embedded in each
    /// message.
    #[arg(long)]
    record_time: bool,

    /// Write the date and time into each output frame.
    #[arg(long)]
    timestamp: bool,

    /// Write the raw timestamp in seconds into each output frame.
    #[arg(long)]
    raw_timestamp: bool,

    /// Disable showing progress.
    #[arg(long)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write every Nth merged frame as a numbered PNG file.
    Images {
        #[command(flatten)]
        common: CommonArgs,

        /// Destination directory for output.
        #[arg(long, short = 'o')]
        outdir: Utf8PathBuf,

        /// Extract every Nth image.
        #[arg(long, default_value_t = 1)]
        skip: usize,
    },
    /// Write a synchronized video holding all selected topics.
    Video {
        #[command(flatten)]
        common: CommonArgs,

        /// Destination of the video file.
        #[arg(long, short = 'o')]
        output: Utf8PathBuf,

        /// FPS of the output video. If not specified, FPS will be set to
        /// the maximum frequency of the topics.
        #[arg(long, short = 'f')]
        fps: Option<f64>,

        /// ffmpeg codec to use.
        #[arg(long, short = 'c', default_value = "libx264")]
        codec: String,

        /// ffmpeg quality (-q:v) value for the chosen codec.
        #[arg(long, short = 'q')]
        quality: Option<u8>,
    },
}

fn open_sources(inputs: &[Utf8PathBuf]) -> Result<ChainSource> {
    let mut parts: Vec<Box<dyn TopicSource>> = Vec::with_capacity(inputs.len());
    for input in inputs {
        tracing::info!("processing log {}", input);
        let source = DirSource::open(input.as_std_path())
            .with_context(|| format!("opening log directory {input}"))?;
        parts.push(Box::new(source));
    }
    Ok(ChainSource::new(parts))
}

/// Resolve the topic list, falling back to auto-detection over the image
/// topics present in the recording.
fn resolve_topics(requested: Vec<String>, source: &ChainSource) -> Result<Vec<String>> {
    if !requested.is_empty() {
        return Ok(requested);
    }
    tracing::info!("no topics specified, checking logs for image topics");
    let detected = source.image_topics();
    match detected.len() {
        0 => eyre::bail!("no image topics found in the given logs"),
        1 => Ok(detected),
        _ => eyre::bail!(
            "multiple image topics detected: {:?}; please specify topics using --topic",
            detected
        ),
    }
}

fn build_config(common: &CommonArgs, mode: ExportMode, topics: Vec<String>) -> ExportConfig {
    ExportConfig {
        topics,
        reference_index: common.index,
        scale: common.scale,
        start: common.start,
        stop: common.stop,
        time_policy: if common.record_time {
            TimePolicy::RecordTime
        } else {
            TimePolicy::HeaderStamp
        },
        overlay: OverlayConfig {
            date: common.timestamp,
            raw: common.raw_timestamp,
        },
        mode,
        show_progress: !common.no_progress,
    }
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let (common, mode) = match &cli.command {
        Commands::Images {
            common,
            outdir,
            skip,
        } => (
            common,
            ExportMode::SkipSampled {
                skip: *skip,
                outdir: outdir.to_string(),
            },
        ),
        Commands::Video {
            common,
            output,
            fps,
            codec,
            quality,
        } => (
            common,
            ExportMode::FixedRate {
                fps: *fps,
                codec: codec.clone(),
                quality: *quality,
                output: output.to_string(),
            },
        ),
    };

    let source = open_sources(&common.inputs)?;
    let topics = resolve_topics(common.topics.clone(), &source)?;
    tracing::info!("output will contain the topics: {:?}", topics);

    let cfg = build_config(common, mode, topics).validate()?;
    run_export(&cfg, &source)?;
    tracing::info!("done");
    Ok(())
}
