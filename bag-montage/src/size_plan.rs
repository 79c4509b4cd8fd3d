use topic_source::TopicSource;

use crate::error::Result;

/// Planned output dimensions for one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicSize {
    pub width: u32,
    pub height: u32,
}

/// Probe one message per topic and derive output sizes sharing a common
/// target height.
///
/// Fails with `NoMessagesForTopic` if any topic has no messages at all.
pub fn plan_sizes(
    source: &dyn TopicSource,
    topics: &[String],
    reference_index: usize,
    scale: f64,
) -> Result<Vec<TopicSize>> {
    tracing::debug!(
        "resizing heights to topic {} (index {})",
        topics[reference_index],
        reference_index
    );
    let mut native = Vec::with_capacity(topics.len());
    for topic in topics {
        let probe = source.first_message(topic)?;
        native.push((probe.image.width, probe.image.height));
    }

    let sizes = derive_sizes(&native, reference_index, scale);
    for ((topic, (nw, nh)), size) in topics.iter().zip(&native).zip(&sizes) {
        tracing::info!(
            "topic {} originally {} x {}, rescaled to {} x {}",
            topic,
            nw,
            nh,
            size.width,
            size.height
        );
    }
    Ok(sizes)
}

/// Pure size derivation: scale the reference topic's height, then rescale
/// every topic to that height preserving its aspect ratio.
///
/// Derived dimensions are clamped to at least 1x1.
pub fn derive_sizes(native: &[(u32, u32)], reference_index: usize, scale: f64) -> Vec<TopicSize> {
    let (_, ref_height) = native[reference_index];
    let target_height = ((ref_height as f64 * scale).round() as u32).max(1);
    native
        .iter()
        .map(|&(w, h)| TopicSize {
            width: ((w as f64 * target_height as f64 / h as f64).round() as u32).max(1),
            height: target_height,
        })
        .collect()
}

/// Canvas dimensions implied by the planned sizes.
pub fn canvas_size(sizes: &[TopicSize]) -> (u32, u32) {
    (
        sizes.iter().map(|s| s.width).sum(),
        sizes.first().map(|s| s.height).unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heights_are_equal_and_aspect_is_preserved() {
        let native = [(640, 480), (1280, 1024), (320, 200), (1920, 1080)];
        let sizes = derive_sizes(&native, 0, 1.0);
        for (size, &(w, h)) in sizes.iter().zip(&native) {
            assert_eq!(size.height, 480);
            let native_aspect = w as f64 / h as f64;
            let out_aspect = size.width as f64 / size.height as f64;
            // rounding moves the width by at most half a pixel
            assert!((out_aspect - native_aspect).abs() <= 1.0 / size.height as f64);
        }
    }

    #[test]
    fn reference_height_is_scaled() {
        let native = [(640, 480), (800, 600)];
        let sizes = derive_sizes(&native, 1, 0.5);
        assert!(sizes.iter().all(|s| s.height == 300));
        assert_eq!(sizes[1].width, 400);
    }

    #[test]
    fn degenerate_scales_clamp_to_one_pixel() {
        let native = [(640, 480)];
        let sizes = derive_sizes(&native, 0, 0.0001);
        assert_eq!(sizes[0].height, 1);
        assert!(sizes[0].width >= 1);
    }

    #[test]
    fn canvas_spans_all_topics() {
        let sizes = vec![
            TopicSize {
                width: 640,
                height: 480,
            },
            TopicSize {
                width: 600,
                height: 480,
            },
        ];
        assert_eq!(canvas_size(&sizes), (1240, 480));
        assert_eq!(canvas_size(&[]), (0, 0));
    }
}
