#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Source(#[from] topic_source::Error),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("no frequency signal: {0}")]
    NoFrequencySignal(String),
}

/// Failures from either kind of output sink.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("could not create output directory \"{path}\": {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Png(#[from] bg_png_writer::Error),
    #[error(transparent)]
    Video(#[from] ffmpeg_raw_writer::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
