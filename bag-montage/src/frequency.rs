use crate::error::{Error, Result};

/// Derive an output frame rate from per-topic message counts over a time
/// window of `duration` seconds.
///
/// The topic with the highest rate wins so that no topic's updates are
/// undersampled.
pub fn max_topic_frequency(counts: &[usize], duration: f64) -> Result<f64> {
    if !(duration > 0.0) {
        return Err(Error::NoFrequencySignal(format!(
            "window duration is {} seconds",
            duration
        )));
    }
    let max_count = counts.iter().copied().max().unwrap_or(0);
    if max_count == 0 {
        return Err(Error::NoFrequencySignal(
            "no messages on any selected topic".to_string(),
        ));
    }
    Ok(max_count as f64 / duration)
}
