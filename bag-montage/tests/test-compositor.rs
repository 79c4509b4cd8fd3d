use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};

use bag_montage::{Compositor, FrameSink, Mode, SinkError, TopicSize};
use rgb_frame::RgbFrame;
use topic_source::{datetime_to_f64, f64_to_datetime, TopicMessage};

const TOPIC_A: &str = "/cam_a/image_raw";
const TOPIC_B: &str = "/cam_b/image_raw";

/// In-memory sink recording every emission.
#[derive(Clone, Default)]
struct CollectSink {
    frames: Rc<RefCell<Vec<(usize, DateTime<Utc>, RgbFrame)>>>,
}

impl FrameSink for CollectSink {
    fn write_frame(
        &mut self,
        ordinal: usize,
        stamp: DateTime<Utc>,
        canvas: &RgbFrame,
    ) -> Result<(), SinkError> {
        self.frames
            .borrow_mut()
            .push((ordinal, stamp, canvas.clone()));
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

fn topics() -> Vec<String> {
    vec![TOPIC_A.to_string(), TOPIC_B.to_string()]
}

fn sizes() -> Vec<TopicSize> {
    vec![
        TopicSize {
            width: 4,
            height: 4,
        },
        TopicSize {
            width: 4,
            height: 4,
        },
    ]
}

fn msg(topic: &str, t: f64, color: [u8; 3]) -> TopicMessage {
    TopicMessage {
        topic: topic.to_string(),
        capture_time: f64_to_datetime(t),
        image: RgbFrame::solid(4, 4, color),
    }
}

fn a_color(i: u8) -> [u8; 3] {
    [100 + i, 0, 0]
}

fn b_color(i: u8) -> [u8; 3] {
    [0, 100 + i, 0]
}

/// First pixel of the left (topic A) half of a canvas.
fn left_pixel(canvas: &RgbFrame) -> [u8; 3] {
    canvas.image_data[0..3].try_into().unwrap()
}

/// First pixel of the right (topic B) half of a canvas.
fn right_pixel(canvas: &RgbFrame) -> [u8; 3] {
    canvas.image_data[4 * 3..4 * 3 + 3].try_into().unwrap()
}

fn fixed_rate(fps: f64, sink: CollectSink) -> Compositor<CollectSink> {
    Compositor::new(&topics(), sizes(), Mode::FixedRate { fps }, None, sink)
}

fn skip_sampled(skip: usize, sink: CollectSink) -> Compositor<CollectSink> {
    Compositor::new(&topics(), sizes(), Mode::SkipSampled { skip }, None, sink)
}

#[test]
fn emissions_between_messages_follow_the_frame_index() {
    // frame duration 0.5s; floor(2.7/0.5) - floor(0.3/0.5) = 5
    let sink = CollectSink::default();
    let frames = sink.frames.clone();
    let mut compositor = fixed_rate(2.0, sink);

    compositor.push(msg(TOPIC_A, 0.3, a_color(0))).unwrap();
    assert_eq!(frames.borrow().len(), 0, "priming must not emit");

    compositor.push(msg(TOPIC_A, 2.7, a_color(1))).unwrap();
    let summary = compositor.finish().unwrap();
    assert_eq!(summary.frames, 5);
    assert_eq!(summary.messages, 2);

    let frames = frames.borrow();
    assert_eq!(frames.len(), 5);
    for (i, (ordinal, _, canvas)) in frames.iter().enumerate() {
        assert_eq!(*ordinal, i);
        // every repetition shows the pre-update snapshot
        assert_eq!(left_pixel(canvas), a_color(0));
        assert_eq!(right_pixel(canvas), [0, 0, 0], "slot B never updated");
    }
}

#[test]
fn a_topic_that_never_updates_is_held_in_every_frame() {
    let sink = CollectSink::default();
    let frames = sink.frames.clone();
    let mut compositor = fixed_rate(2.0, sink);

    compositor.push(msg(TOPIC_A, 0.0, a_color(0))).unwrap();
    compositor.push(msg(TOPIC_B, 0.0, b_color(0))).unwrap();
    for i in 1..=4u8 {
        compositor
            .push(msg(TOPIC_A, i as f64 * 0.5, a_color(i)))
            .unwrap();
    }
    let summary = compositor.finish().unwrap();
    assert_eq!(summary.frames, 4);

    for (_, _, canvas) in frames.borrow().iter() {
        assert_eq!(right_pixel(canvas), b_color(0));
    }
    // meanwhile the updating topic advances frame by frame
    let lefts: Vec<[u8; 3]> = frames.borrow().iter().map(|f| left_pixel(&f.2)).collect();
    assert_eq!(lefts, vec![a_color(0), a_color(1), a_color(2), a_color(3)]);
}

#[test]
fn out_of_order_messages_never_regress() {
    let sink = CollectSink::default();
    let frames = sink.frames.clone();
    let mut compositor = fixed_rate(2.0, sink);

    compositor.push(msg(TOPIC_A, 1.0, a_color(0))).unwrap();
    compositor.push(msg(TOPIC_A, 2.25, a_color(1))).unwrap();
    assert_eq!(frames.borrow().len(), 2);

    // a message from the past: no emission, no panic, slot still updated
    compositor.push(msg(TOPIC_B, 0.75, b_color(0))).unwrap();
    assert_eq!(frames.borrow().len(), 2);

    compositor.push(msg(TOPIC_A, 2.75, a_color(2))).unwrap();
    let summary = compositor.finish().unwrap();
    assert_eq!(summary.frames, 3);

    let frames = frames.borrow();
    // the post-regression frame reflects both the late slot update and
    // the latest in-order image
    let (_, stamp, canvas) = &frames[2];
    assert_eq!(left_pixel(canvas), a_color(1));
    assert_eq!(right_pixel(canvas), b_color(0));
    // `current_frame` did not move backwards: the frame stamp continues
    // from the pre-regression interval
    assert!((datetime_to_f64(stamp) - 2.0).abs() < 1e-6);
}

#[test]
fn skip_sampling_emits_every_nth_message() {
    let sink = CollectSink::default();
    let frames = sink.frames.clone();
    let mut compositor = skip_sampled(3, sink);

    for i in 0..10u8 {
        let topic = if i % 2 == 0 { TOPIC_A } else { TOPIC_B };
        let color = if i % 2 == 0 { a_color(i) } else { b_color(i) };
        compositor.push(msg(topic, i as f64, color)).unwrap();
    }
    let summary = compositor.finish().unwrap();

    // floor(10 / 3) frames, at message ordinals 3, 6, 9
    assert_eq!(summary.frames, 3);
    let ordinals: Vec<usize> = frames.borrow().iter().map(|f| f.0).collect();
    assert_eq!(ordinals, vec![3, 6, 9]);

    // slots update before emission: the third message (topic A, i = 2)
    // is already visible, while B still holds its second-message image
    let frames = frames.borrow();
    assert_eq!(left_pixel(&frames[0].2), a_color(2));
    assert_eq!(right_pixel(&frames[0].2), b_color(1));
}

#[test]
fn skip_of_one_emits_every_message_including_the_first() {
    let sink = CollectSink::default();
    let frames = sink.frames.clone();
    let mut compositor = skip_sampled(1, sink);

    for i in 0..4u8 {
        compositor.push(msg(TOPIC_A, i as f64, a_color(i))).unwrap();
    }
    let summary = compositor.finish().unwrap();
    assert_eq!(summary.frames, 4);
    let ordinals: Vec<usize> = frames.borrow().iter().map(|f| f.0).collect();
    assert_eq!(ordinals, vec![1, 2, 3, 4]);
}

#[test]
fn two_topic_end_to_end_scenario() {
    // topic A at 10 Hz and topic B at 2 Hz over one second, fps 5:
    // exactly 5 frames at 0.0, 0.2, 0.4, 0.6, 0.8.
    let mut events = Vec::new();
    for i in 0..=10u8 {
        events.push((i as f64 / 10.0, TOPIC_A, a_color(i)));
    }
    events.push((0.0, TOPIC_B, b_color(0)));
    events.push((0.5, TOPIC_B, b_color(1)));
    events.push((1.0, TOPIC_B, b_color(2)));
    events.sort_by(|x, y| x.0.total_cmp(&y.0));

    let sink = CollectSink::default();
    let frames = sink.frames.clone();
    let mut compositor = fixed_rate(5.0, sink);
    for (t, topic, color) in events {
        compositor.push(msg(topic, t, color)).unwrap();
    }
    let summary = compositor.finish().unwrap();
    assert_eq!(summary.frames, 5);
    assert_eq!(summary.messages, 14);

    let frames = frames.borrow();
    let stamps: Vec<f64> = frames.iter().map(|f| datetime_to_f64(&f.1)).collect();
    for (stamp, expected) in stamps.iter().zip([0.0, 0.2, 0.4, 0.6, 0.8]) {
        assert!((stamp - expected).abs() < 1e-6, "{} vs {}", stamp, expected);
    }

    // each canvas holds the snapshot from just before the frame-crossing
    // message
    let lefts: Vec<[u8; 3]> = frames.iter().map(|f| left_pixel(&f.2)).collect();
    assert_eq!(
        lefts,
        vec![a_color(1), a_color(3), a_color(5), a_color(7), a_color(9)]
    );
    let rights: Vec<[u8; 3]> = frames.iter().map(|f| right_pixel(&f.2)).collect();
    assert_eq!(
        rights,
        vec![b_color(0), b_color(0), b_color(1), b_color(1), b_color(1)]
    );
}

#[test]
fn slots_resize_to_planned_sizes_in_the_canvas() {
    // native 8x8 images land in 4x4 slots; canvas is 8x4
    let sink = CollectSink::default();
    let frames = sink.frames.clone();
    let mut compositor = skip_sampled(2, sink);

    let big = |color| TopicMessage {
        topic: TOPIC_A.to_string(),
        capture_time: f64_to_datetime(0.0),
        image: RgbFrame::solid(8, 8, color),
    };
    compositor.push(big(a_color(0))).unwrap();
    compositor.push(msg(TOPIC_B, 0.5, b_color(0))).unwrap();
    compositor.finish().unwrap();

    let frames = frames.borrow();
    assert_eq!(frames.len(), 1);
    let canvas = &frames[0].2;
    assert_eq!(canvas.width, 8);
    assert_eq!(canvas.height, 4);
    assert_eq!(left_pixel(canvas), a_color(0));
    assert_eq!(right_pixel(canvas), b_color(0));
}
