use chrono::{DateTime, Utc};

use rgb_frame::RgbFrame;

mod chain;
mod dir_source;
mod timebase;

pub use chain::ChainSource;
pub use dir_source::DirSource;
pub use timebase::{datetime_to_f64, f64_to_datetime};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open source \"{path}\": {source}")]
    SourceOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed index record at {path}:{line}: {source}")]
    Index {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("no messages found for topic \"{topic}\"")]
    NoMessagesForTopic { topic: String },
    #[error("message on topic \"{topic}\" carries no image payload")]
    NoImageData { topic: String },
    #[error("decoding image on topic \"{topic}\" at {time}: {source}")]
    Decode {
        topic: String,
        time: DateTime<Utc>,
        #[source]
        source: image::ImageError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which recorded timestamp becomes a message's capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TimePolicy {
    /// The timestamp embedded in the message itself.
    #[default]
    HeaderStamp,
    /// The time the log recorded the message.
    RecordTime,
}

/// Inclusive time window over log record time, in seconds.
///
/// `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindow {
    pub start: Option<f64>,
    pub stop: Option<f64>,
}

impl TimeWindow {
    pub fn contains(&self, t: f64) -> bool {
        if let Some(start) = self.start {
            if t < start {
                return false;
            }
        }
        if let Some(stop) = self.stop {
            if t > stop {
                return false;
            }
        }
        true
    }
}

/// One decoded image message.
#[derive(Debug, Clone)]
pub struct TopicMessage {
    pub topic: String,
    /// Timestamp selected according to the [`TimePolicy`] of the iteration.
    pub capture_time: DateTime<Utc>,
    pub image: RgbFrame,
}

/// A finite, seekable recording of timestamped image messages on named
/// topics.
///
/// Implementations decode lazily: opening a source reads only its index,
/// and image payloads are decoded as the iterator returned by
/// [`TopicSource::messages`] advances.
pub trait TopicSource {
    /// All topic names present in the recording, in order of first
    /// appearance.
    fn topics(&self) -> Vec<String>;

    /// The subset of [`TopicSource::topics`] that carry image data.
    fn image_topics(&self) -> Vec<String>;

    /// Record-time span `(first, last)` of the recording in seconds, or
    /// `None` for an empty recording.
    fn time_span(&self) -> Option<(f64, f64)>;

    /// One-shot probe decoding the first message of `topic`.
    fn first_message(&self, topic: &str) -> Result<TopicMessage>;

    /// Number of messages on `topic` whose record time falls in `window`.
    fn message_count(&self, topic: &str, window: &TimeWindow) -> usize;

    /// Iterate, in record-time order, over the messages of the listed
    /// topics within `window`.
    fn messages<'a>(
        &'a self,
        topics: &[String],
        window: TimeWindow,
        policy: TimePolicy,
    ) -> Result<Box<dyn Iterator<Item = Result<TopicMessage>> + 'a>>;
}
