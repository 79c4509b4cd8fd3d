use std::borrow::Cow;

use image::imageops::{self, FilterType};

use rgb_frame::RgbFrame;

use crate::size_plan::TopicSize;

/// Resize each slot to its planned size and concatenate left to right.
///
/// Pure: identical slot contents always produce a byte-identical canvas.
pub fn merge_slots(slots: &[RgbFrame], sizes: &[TopicSize]) -> RgbFrame {
    let canvas_width: u32 = sizes.iter().map(|s| s.width).sum();
    let canvas_height: u32 = sizes.first().map(|s| s.height).unwrap_or(0);
    let mut canvas = RgbFrame::black(canvas_width, canvas_height);
    let dest_stride = canvas.stride as usize;

    let mut cur_x = 0usize;
    for (slot, size) in slots.iter().zip(sizes) {
        let resized = resize_to(slot, size);
        let src_stride = resized.stride as usize;
        let copy_width = size.width as usize * 3;
        for src_row in 0..size.height as usize {
            let src = &resized.image_data[src_row * src_stride..][..copy_width];
            let dest_start = src_row * dest_stride + cur_x * 3;
            canvas.image_data[dest_start..][..copy_width].copy_from_slice(src);
        }
        cur_x += size.width as usize;
    }
    canvas
}

fn resize_to<'a>(frame: &'a RgbFrame, size: &TopicSize) -> Cow<'a, RgbFrame> {
    if frame.width == size.width && frame.height == size.height {
        return Cow::Borrowed(frame);
    }
    let resized = imageops::resize(&frame.to_image(), size.width, size.height, FilterType::Triangle);
    Cow::Owned(RgbFrame::from_image(resized))
}
