use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rgb_frame::RgbFrame;

use crate::{
    f64_to_datetime, Error, Result, TimePolicy, TimeWindow, TopicMessage, TopicSource,
};

const INDEX_FILENAME: &str = "index.jsonl";

/// One line of the `index.jsonl` manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub topic: String,
    /// Message type name; topics whose type contains "Image" carry frames.
    pub msgtype: String,
    /// Time the log recorded the message, seconds since the UNIX epoch.
    pub record_time: f64,
    /// Timestamp embedded in the message, seconds since the UNIX epoch.
    pub header_stamp: f64,
    /// Frame file path relative to the log directory. Absent for
    /// non-image messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl IndexRecord {
    fn capture_time(&self, policy: TimePolicy) -> f64 {
        match policy {
            TimePolicy::HeaderStamp => self.header_stamp,
            TimePolicy::RecordTime => self.record_time,
        }
    }
}

/// A recording stored as a log directory: an `index.jsonl` manifest with
/// one record per message, next to the referenced image files.
///
/// The whole index is read at open time; image files are decoded only as
/// messages are iterated.
pub struct DirSource {
    dir: PathBuf,
    /// Sorted by `record_time`.
    records: Vec<IndexRecord>,
}

impl DirSource {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let index_path = dir.join(INDEX_FILENAME);
        let contents =
            std::fs::read_to_string(&index_path).map_err(|source| Error::SourceOpen {
                path: index_path.display().to_string(),
                source,
            })?;

        let mut records = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: IndexRecord =
                serde_json::from_str(line).map_err(|source| Error::Index {
                    path: index_path.display().to_string(),
                    line: lineno + 1,
                    source,
                })?;
            records.push(record);
        }
        records.sort_by(|a, b| a.record_time.total_cmp(&b.record_time));

        tracing::debug!(
            "opened log directory {} with {} messages",
            dir.display(),
            records.len()
        );

        Ok(Self { dir, records })
    }

    fn decode(&self, record: &IndexRecord, policy: TimePolicy) -> Result<TopicMessage> {
        let capture_time = f64_to_datetime(record.capture_time(policy));
        let Some(file) = &record.file else {
            return Err(Error::NoImageData {
                topic: record.topic.clone(),
            });
        };
        let img = image::open(self.dir.join(file)).map_err(|source| Error::Decode {
            topic: record.topic.clone(),
            time: capture_time,
            source,
        })?;
        Ok(TopicMessage {
            topic: record.topic.clone(),
            capture_time,
            image: RgbFrame::from_image(img.to_rgb8()),
        })
    }

    fn unique_topics<F: Fn(&IndexRecord) -> bool>(&self, keep: F) -> Vec<String> {
        let mut topics: Vec<String> = Vec::new();
        for record in &self.records {
            if keep(record) && !topics.iter().any(|t| t == &record.topic) {
                topics.push(record.topic.clone());
            }
        }
        topics
    }
}

impl TopicSource for DirSource {
    fn topics(&self) -> Vec<String> {
        self.unique_topics(|_| true)
    }

    fn image_topics(&self) -> Vec<String> {
        self.unique_topics(|r| r.msgtype.contains("Image"))
    }

    fn time_span(&self) -> Option<(f64, f64)> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => Some((first.record_time, last.record_time)),
            _ => None,
        }
    }

    fn first_message(&self, topic: &str) -> Result<TopicMessage> {
        let record = self
            .records
            .iter()
            .find(|r| r.topic == topic)
            .ok_or_else(|| Error::NoMessagesForTopic {
                topic: topic.to_string(),
            })?;
        self.decode(record, TimePolicy::RecordTime)
    }

    fn message_count(&self, topic: &str, window: &TimeWindow) -> usize {
        self.records
            .iter()
            .filter(|r| r.topic == topic && window.contains(r.record_time))
            .count()
    }

    fn messages<'a>(
        &'a self,
        topics: &[String],
        window: TimeWindow,
        policy: TimePolicy,
    ) -> Result<Box<dyn Iterator<Item = Result<TopicMessage>> + 'a>> {
        let topics = topics.to_vec();
        Ok(Box::new(
            self.records
                .iter()
                .filter(move |r| {
                    topics.iter().any(|t| t == &r.topic) && window.contains(r.record_time)
                })
                .map(move |r| self.decode(r, policy)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime_to_f64;

    const IMAGE_MSGTYPE: &str = "sensor_msgs/msg/Image";

    fn write_frame(dir: &Path, name: &str, color: [u8; 3]) {
        let img = image::RgbImage::from_pixel(8, 6, image::Rgb(color));
        img.save(dir.join(name)).unwrap();
    }

    fn record(topic: &str, t: f64, file: Option<&str>) -> String {
        let record = IndexRecord {
            topic: topic.to_string(),
            msgtype: if file.is_some() {
                IMAGE_MSGTYPE.to_string()
            } else {
                "std_msgs/msg/String".to_string()
            },
            record_time: t,
            // embedded stamps trail record time in these fixtures
            header_stamp: t - 0.25,
            file: file.map(|f| f.to_string()),
        };
        serde_json::to_string(&record).unwrap()
    }

    fn fixture_log(dir: &Path) {
        write_frame(dir, "cam0_0.png", [10, 0, 0]);
        write_frame(dir, "cam0_1.png", [20, 0, 0]);
        write_frame(dir, "cam1_0.png", [0, 10, 0]);
        // deliberately unsorted record times
        let lines = [
            record("/cam0/image_raw", 3.0, Some("cam0_1.png")),
            record("/cam0/image_raw", 1.0, Some("cam0_0.png")),
            record("/cam1/image_raw", 2.0, Some("cam1_0.png")),
            record("/rosout", 1.5, None),
        ];
        std::fs::write(dir.join(INDEX_FILENAME), lines.join("\n")).unwrap();
    }

    #[test]
    fn iteration_is_record_time_ordered() {
        let tmp = tempfile::tempdir().unwrap();
        fixture_log(tmp.path());
        let source = DirSource::open(tmp.path()).unwrap();

        let topics = vec!["/cam0/image_raw".to_string(), "/cam1/image_raw".to_string()];
        let msgs: Vec<_> = source
            .messages(&topics, TimeWindow::default(), TimePolicy::RecordTime)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let times: Vec<f64> = msgs.iter().map(|m| datetime_to_f64(&m.capture_time)).collect();
        assert_eq!(msgs.len(), 3);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(msgs[0].topic, "/cam0/image_raw");
        assert_eq!(msgs[1].topic, "/cam1/image_raw");
        assert_eq!(msgs[0].image.width, 8);
    }

    #[test]
    fn window_and_topic_filters_apply() {
        let tmp = tempfile::tempdir().unwrap();
        fixture_log(tmp.path());
        let source = DirSource::open(tmp.path()).unwrap();

        let topics = vec!["/cam0/image_raw".to_string()];
        let window = TimeWindow {
            start: Some(2.0),
            stop: None,
        };
        let msgs: Vec<_> = source
            .messages(&topics, window, TimePolicy::RecordTime)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(datetime_to_f64(&msgs[0].capture_time).round(), 3.0);

        assert_eq!(source.message_count("/cam0/image_raw", &TimeWindow::default()), 2);
        assert_eq!(source.message_count("/cam0/image_raw", &window), 1);
    }

    #[test]
    fn time_policy_selects_stamp() {
        let tmp = tempfile::tempdir().unwrap();
        fixture_log(tmp.path());
        let source = DirSource::open(tmp.path()).unwrap();

        let topics = vec!["/cam1/image_raw".to_string()];
        let by_record: Vec<_> = source
            .messages(&topics, TimeWindow::default(), TimePolicy::RecordTime)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let by_header: Vec<_> = source
            .messages(&topics, TimeWindow::default(), TimePolicy::HeaderStamp)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let record_t = datetime_to_f64(&by_record[0].capture_time);
        let header_t = datetime_to_f64(&by_header[0].capture_time);
        assert!((record_t - header_t - 0.25).abs() < 1e-6);
    }

    #[test]
    fn probe_and_detection() {
        let tmp = tempfile::tempdir().unwrap();
        fixture_log(tmp.path());
        let source = DirSource::open(tmp.path()).unwrap();

        let first = source.first_message("/cam0/image_raw").unwrap();
        assert_eq!(datetime_to_f64(&first.capture_time).round(), 1.0);
        assert_eq!(&first.image.image_data[..3], &[10, 0, 0]);

        let missing = source.first_message("/cam2/image_raw");
        assert!(matches!(
            missing,
            Err(Error::NoMessagesForTopic { topic }) if topic == "/cam2/image_raw"
        ));

        assert_eq!(source.topics().len(), 3);
        assert_eq!(
            source.image_topics(),
            vec!["/cam0/image_raw".to_string(), "/cam1/image_raw".to_string()]
        );
        assert_eq!(source.time_span(), Some((1.0, 3.0)));
    }

    #[test]
    fn corrupt_frame_surfaces_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        fixture_log(tmp.path());
        std::fs::write(tmp.path().join("cam0_0.png"), b"not a png").unwrap();
        let source = DirSource::open(tmp.path()).unwrap();

        let result = source.first_message("/cam0/image_raw");
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn malformed_index_line_is_reported_with_location() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(INDEX_FILENAME),
            format!("{}\nnot json\n", record("/cam0/image_raw", 1.0, None)),
        )
        .unwrap();
        let result = DirSource::open(tmp.path());
        assert!(matches!(result, Err(Error::Index { line: 2, .. })));
    }

    #[test]
    fn missing_directory_is_a_source_open_error() {
        let result = DirSource::open("/nonexistent/log/dir");
        assert!(matches!(result, Err(Error::SourceOpen { .. })));
    }
}
