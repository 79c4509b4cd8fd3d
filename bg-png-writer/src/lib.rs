use std::path::PathBuf;
use std::thread::JoinHandle;

use rgb_frame::RgbFrame;

/// Maximum number of submitted frames not yet written to disk. Submission
/// blocks once this many are pending.
pub const PENDING_LIMIT: usize = 10;

/// Number of background writer threads.
pub const WORKER_COUNT: usize = 2;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("writing \"{path}\": {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("already done")]
    AlreadyDone,
    #[error("disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, Error>;

struct WriteJob {
    path: PathBuf,
    frame: RgbFrame,
}

/// Writes numbered PNG frames from a small pool of background threads.
///
/// The submission channel is bounded at [`PENDING_LIMIT`], so `write`
/// applies backpressure to the producer rather than queueing without
/// limit. Frames cross the channel by value and are never shared back.
pub struct BgPngWriter {
    tx: Option<crossbeam_channel::Sender<WriteJob>>,
    err_rx: crossbeam_channel::Receiver<Error>,
    workers: Vec<JoinHandle<()>>,
}

impl BgPngWriter {
    pub fn new() -> Self {
        Self::with_limits(PENDING_LIMIT, WORKER_COUNT)
    }

    pub fn with_limits(pending_limit: usize, worker_count: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<WriteJob>(pending_limit);
        let (err_tx, err_rx) = crossbeam_channel::unbounded();
        let workers = (0..worker_count)
            .map(|worker| {
                let rx = rx.clone();
                let err_tx = err_tx.clone();
                std::thread::spawn(move || {
                    while let Ok(WriteJob { path, frame }) = rx.recv() {
                        tracing::debug!("worker {}: writing {}", worker, path.display());
                        if let Err(source) = frame.to_image().save(&path) {
                            // Surface the error and exit this thread; the
                            // producer sees it on its next call.
                            let _ = err_tx.send(Error::Write { path, source });
                            return;
                        }
                    }
                })
            })
            .collect();
        Self {
            tx: Some(tx),
            err_rx,
            workers,
        }
    }

    /// Queue one frame, blocking while [`PENDING_LIMIT`] frames are
    /// already pending.
    pub fn write(&mut self, path: PathBuf, frame: RgbFrame) -> Result<()> {
        match self.err_rx.try_recv() {
            Ok(e) => return Err(e),
            Err(e) => {
                if !e.is_empty() {
                    return Err(Error::Disconnected);
                }
            }
        }
        let tx = self.tx.as_ref().ok_or(Error::AlreadyDone)?;
        tx.send(WriteJob { path, frame })
            .map_err(|_| Error::Disconnected)?;
        Ok(())
    }

    /// Wait for all pending frames, then report the first worker error if
    /// any occurred.
    pub fn finish(&mut self) -> Result<()> {
        if self.tx.take().is_none() {
            return Err(Error::AlreadyDone);
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        match self.err_rx.try_recv() {
            Ok(e) => Err(e),
            Err(_) => Ok(()),
        }
    }
}

impl Default for BgPngWriter {
    fn default() -> Self {
        Self::new()
    }
}
