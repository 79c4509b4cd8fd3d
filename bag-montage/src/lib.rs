use indicatif::{ProgressBar, ProgressStyle};

use ffmpeg_raw_writer::EncoderOptions;
use topic_source::{TimeWindow, TopicMessage, TopicSource};

pub mod canvas;
mod compositor;
mod config;
mod error;
mod frequency;
mod output;
mod overlay;
mod size_plan;

pub use compositor::{CompositeSummary, Compositor, Mode};
pub use config::{ExportConfig, ExportMode, OverlayConfig, Valid};
pub use error::{Error, Result, SinkError};
pub use frequency::max_topic_frequency;
pub use output::{FrameSink, ImageDirSink, VideoSink};
pub use overlay::TimestampOverlay;
pub use size_plan::{canvas_size, derive_sizes, plan_sizes, TopicSize};

/// Run one compositing pass over `source` as described by `cfg`.
///
/// Plans sizes, resolves the output frame rate if needed, opens the
/// sink, then drives the compositor over the message stream.
pub fn run_export(cfg: &Valid<ExportConfig>, source: &dyn TopicSource) -> Result<CompositeSummary> {
    let cfg = cfg.valid();
    let started = std::time::Instant::now();

    let window = TimeWindow {
        start: cfg.start,
        stop: cfg.stop,
    };

    tracing::info!("calculating output sizes");
    let sizes = plan_sizes(source, &cfg.topics, cfg.reference_index, cfg.scale)?;
    let (canvas_width, canvas_height) = canvas_size(&sizes);
    tracing::info!(
        "resulting canvas of width {} and height {}",
        canvas_width,
        canvas_height
    );

    let overlay = TimestampOverlay::from_config(&cfg.overlay);

    let total_msgs: usize = cfg
        .topics
        .iter()
        .map(|t| source.message_count(t, &window))
        .sum();
    let progress = if cfg.show_progress {
        let style = ProgressStyle::with_template("compositing {wide_bar} {pos}/{len} ETA: {eta} ")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        Some(ProgressBar::new(total_msgs as u64).with_style(style))
    } else {
        None
    };

    let summary = match &cfg.mode {
        ExportMode::FixedRate {
            fps,
            codec,
            quality,
            output,
        } => {
            let fps = match fps {
                Some(fps) => {
                    tracing::info!("using manually set frame rate of {:.3}", fps);
                    *fps
                }
                None => {
                    tracing::info!("calculating ideal output frame rate");
                    let counts: Vec<usize> = cfg
                        .topics
                        .iter()
                        .map(|t| source.message_count(t, &window))
                        .collect();
                    let fps = max_topic_frequency(&counts, window_duration(source, &window))?;
                    tracing::info!("output frame rate of {:.3}", fps);
                    fps
                }
            };
            let opts = EncoderOptions {
                fps,
                codec: codec.clone(),
                quality: *quality,
            };
            let sink = VideoSink::open(output, canvas_width, canvas_height, &opts)?;
            tracing::info!("writing video at {}", output);
            let compositor =
                Compositor::new(&cfg.topics, sizes, Mode::FixedRate { fps }, overlay, sink);
            drive(
                compositor,
                source.messages(&cfg.topics, window, cfg.time_policy)?,
                progress.as_ref(),
            )?
        }
        ExportMode::SkipSampled { skip, outdir } => {
            let sink = ImageDirSink::new(outdir.as_str())?;
            tracing::info!("writing images into {}", outdir);
            let compositor = Compositor::new(
                &cfg.topics,
                sizes,
                Mode::SkipSampled { skip: *skip },
                overlay,
                sink,
            );
            drive(
                compositor,
                source.messages(&cfg.topics, window, cfg.time_policy)?,
                progress.as_ref(),
            )?
        }
    };

    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }
    tracing::info!(
        "wrote {} messages to {} frames in {:.2} seconds",
        summary.messages,
        summary.frames,
        started.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Effective estimation window: the requested window bounds default to
/// the recording span, and the duration never exceeds the span itself.
fn window_duration(source: &dyn TopicSource, window: &TimeWindow) -> f64 {
    match source.time_span() {
        Some((span_start, span_stop)) => {
            let start = window.start.unwrap_or(span_start);
            let stop = window.stop.unwrap_or(span_stop);
            (stop - start).min(span_stop - span_start)
        }
        // an empty recording; the frequency estimator reports this
        None => 0.0,
    }
}

fn drive<S: FrameSink>(
    mut compositor: Compositor<S>,
    messages: Box<dyn Iterator<Item = topic_source::Result<TopicMessage>> + '_>,
    progress: Option<&ProgressBar>,
) -> Result<CompositeSummary> {
    for msg in messages {
        compositor.push(msg?)?;
        if let Some(progress) = progress {
            progress.inc(1);
        }
    }
    compositor.finish()
}
