use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use rgb_frame::RgbFrame;
use topic_source::{datetime_to_f64, f64_to_datetime, TopicMessage};

use crate::canvas::merge_slots;
use crate::error::Result;
use crate::output::FrameSink;
use crate::overlay::TimestampOverlay;
use crate::size_plan::TopicSize;

/// Output cadence of one compositing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    /// Emit at a fixed frame rate; elapsed frame intervals are filled by
    /// repeating the last canvas.
    FixedRate { fps: f64 },
    /// Emit on every Nth input message, across all topics.
    SkipSampled { skip: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Priming,
    Streaming,
    Drained,
}

#[derive(Debug, Clone, Copy)]
enum ModeState {
    FixedRate {
        frame_duration: f64,
        /// Index of the output frame interval the stream currently sits
        /// in. Never decreases.
        current_frame: i64,
    },
    SkipSampled {
        skip: usize,
        /// Count of all messages seen, across topics.
        num_msgs: usize,
    },
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeSummary {
    pub messages: usize,
    pub frames: usize,
}

/// The synchronization core: holds the last known image per topic and
/// decides when to emit merged frames.
///
/// Slot handling in fixed-rate mode is snapshot-then-update: a frame
/// crossing is rendered from the slots as they stood before the
/// triggering message, and only then is that message's slot replaced. In
/// skip-sampled mode the arriving slot is updated first and the merged
/// canvas samples the stream after the update.
pub struct Compositor<S: FrameSink> {
    topic_index: BTreeMap<String, usize>,
    sizes: Vec<TopicSize>,
    slots: Vec<RgbFrame>,
    overlay: Option<TimestampOverlay>,
    state: State,
    mode: ModeState,
    sink: S,
    frames_written: usize,
    msgs_seen: usize,
}

fn frame_index(t: f64, frame_duration: f64) -> i64 {
    (t / frame_duration).floor() as i64
}

impl<S: FrameSink> Compositor<S> {
    pub fn new(
        topics: &[String],
        sizes: Vec<TopicSize>,
        mode: Mode,
        overlay: Option<TimestampOverlay>,
        sink: S,
    ) -> Self {
        let topic_index = topics
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        let slots = sizes
            .iter()
            .map(|s| RgbFrame::black(s.width, s.height))
            .collect();
        let mode = match mode {
            Mode::FixedRate { fps } => ModeState::FixedRate {
                frame_duration: 1.0 / fps,
                current_frame: 0,
            },
            Mode::SkipSampled { skip } => ModeState::SkipSampled { skip, num_msgs: 0 },
        };
        Self {
            topic_index,
            sizes,
            slots,
            overlay,
            state: State::Uninitialized,
            mode,
            sink,
            frames_written: 0,
            msgs_seen: 0,
        }
    }

    /// Feed the next message from the time-ordered stream; emits zero or
    /// more frames to the sink.
    pub fn push(&mut self, msg: TopicMessage) -> Result<()> {
        let Some(&slot_idx) = self.topic_index.get(&msg.topic) else {
            tracing::debug!("ignoring message on unselected topic {}", msg.topic);
            return Ok(());
        };
        self.msgs_seen += 1;
        let t = datetime_to_f64(&msg.capture_time);

        match self.mode {
            ModeState::FixedRate {
                frame_duration,
                current_frame,
            } => {
                let next_frame = frame_index(t, frame_duration);
                if self.state == State::Uninitialized {
                    // Priming: this message's time is the synchronization
                    // origin. There is nothing to merge against yet.
                    self.mode = ModeState::FixedRate {
                        frame_duration,
                        current_frame: next_frame,
                    };
                    self.state = State::Priming;
                } else {
                    // A non-positive count means this message does not
                    // cross a frame boundary; negative happens on
                    // out-of-order input and must not emit or move
                    // `current_frame` backwards.
                    let reps = next_frame - current_frame;
                    tracing::debug!(
                        "topic {} updated at {} seconds, frame {}",
                        msg.topic,
                        t,
                        next_frame
                    );
                    if reps > 0 {
                        let stamp = f64_to_datetime(current_frame as f64 * frame_duration);
                        let canvas = self.compose(stamp);
                        tracing::debug!(
                            "writing frame {} at time {} for {} repetitions",
                            current_frame,
                            t,
                            reps
                        );
                        for _ in 0..reps {
                            self.sink
                                .write_frame(self.frames_written, stamp, &canvas)?;
                            self.frames_written += 1;
                        }
                        self.mode = ModeState::FixedRate {
                            frame_duration,
                            current_frame: next_frame,
                        };
                    }
                    self.state = State::Streaming;
                }
                // The slot update comes after any emission so that the
                // emitted canvas reflects the stream before this message.
                self.slots[slot_idx] = msg.image;
            }
            ModeState::SkipSampled { skip, num_msgs } => {
                let num_msgs = num_msgs + 1;
                self.mode = ModeState::SkipSampled { skip, num_msgs };
                self.state = if self.state == State::Uninitialized {
                    State::Priming
                } else {
                    State::Streaming
                };
                self.slots[slot_idx] = msg.image;
                if num_msgs % skip == 0 {
                    let canvas = self.compose(msg.capture_time);
                    self.sink.write_frame(num_msgs, msg.capture_time, &canvas)?;
                    self.frames_written += 1;
                }
            }
        }
        Ok(())
    }

    /// Mark the stream exhausted and flush the sink.
    pub fn finish(mut self) -> Result<CompositeSummary> {
        self.state = State::Drained;
        self.sink.finish()?;
        Ok(CompositeSummary {
            messages: self.msgs_seen,
            frames: self.frames_written,
        })
    }

    fn compose(&self, stamp: DateTime<Utc>) -> RgbFrame {
        let mut canvas = merge_slots(&self.slots, &self.sizes);
        if let Some(overlay) = &self.overlay {
            overlay.stamp(&mut canvas, stamp);
        }
        canvas
    }
}
