use crate::{Error, Result, TimePolicy, TimeWindow, TopicMessage, TopicSource};

/// Several recordings presented as one, in the order given.
///
/// Recorded logs are often split into sequential files; chaining them
/// keeps one pipeline run over the whole session. No re-sorting happens
/// across parts, matching the caller-supplied order.
pub struct ChainSource {
    parts: Vec<Box<dyn TopicSource>>,
}

impl ChainSource {
    pub fn new(parts: Vec<Box<dyn TopicSource>>) -> Self {
        Self { parts }
    }
}

impl TopicSource for ChainSource {
    fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for part in &self.parts {
            for topic in part.topics() {
                if !topics.contains(&topic) {
                    topics.push(topic);
                }
            }
        }
        topics
    }

    fn image_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for part in &self.parts {
            for topic in part.image_topics() {
                if !topics.contains(&topic) {
                    topics.push(topic);
                }
            }
        }
        topics
    }

    fn time_span(&self) -> Option<(f64, f64)> {
        let spans: Vec<(f64, f64)> = self.parts.iter().filter_map(|p| p.time_span()).collect();
        let start = spans.iter().map(|s| s.0).fold(f64::INFINITY, f64::min);
        let stop = spans.iter().map(|s| s.1).fold(f64::NEG_INFINITY, f64::max);
        if spans.is_empty() {
            None
        } else {
            Some((start, stop))
        }
    }

    fn first_message(&self, topic: &str) -> Result<TopicMessage> {
        for part in &self.parts {
            match part.first_message(topic) {
                Err(Error::NoMessagesForTopic { .. }) => continue,
                other => return other,
            }
        }
        Err(Error::NoMessagesForTopic {
            topic: topic.to_string(),
        })
    }

    fn message_count(&self, topic: &str, window: &TimeWindow) -> usize {
        self.parts
            .iter()
            .map(|p| p.message_count(topic, window))
            .sum()
    }

    fn messages<'a>(
        &'a self,
        topics: &[String],
        window: TimeWindow,
        policy: TimePolicy,
    ) -> Result<Box<dyn Iterator<Item = Result<TopicMessage>> + 'a>> {
        let mut iters = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            iters.push(part.messages(topics, window, policy)?);
        }
        Ok(Box::new(iters.into_iter().flatten()))
    }
}
