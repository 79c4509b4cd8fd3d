use chrono::{DateTime, Utc};
use rusttype::{point, Font, Scale};

use rgb_frame::RgbFrame;
use topic_source::datetime_to_f64;

use crate::config::OverlayConfig;

const TEXT_HEIGHT_FRACTION: f32 = 0.05;
const MIN_TEXT_HEIGHT_PX: f32 = 12.0;
const LINE_PAD_PX: u32 = 4;
const TEXT_COLOR: [u8; 3] = [0, 255, 0];
const BOX_COLOR: [u8; 3] = [0, 0, 0];

/// Renders timestamp annotations into the top-left corner of a finished
/// canvas.
///
/// The raw-seconds line stacks below the date line when both are enabled,
/// on an opaque background box. Drawing clips at the canvas edge and
/// never changes the canvas dimensions.
pub struct TimestampOverlay {
    font: Font<'static>,
    show_date: bool,
    show_raw: bool,
}

impl TimestampOverlay {
    /// Returns `None` when no annotation is requested.
    pub fn from_config(cfg: &OverlayConfig) -> Option<Self> {
        if !cfg.date && !cfg.raw {
            return None;
        }
        let font =
            Font::try_from_bytes(ttf_firacode::REGULAR as &[u8]).expect("parsing embedded font");
        Some(Self {
            font,
            show_date: cfg.date,
            show_raw: cfg.raw,
        })
    }

    pub fn stamp(&self, canvas: &mut RgbFrame, time: DateTime<Utc>) {
        let text_height = (canvas.height as f32 * TEXT_HEIGHT_FRACTION).max(MIN_TEXT_HEIGHT_PX);
        let scale = Scale::uniform(text_height);
        let mut y_top = 0;
        // The raw line's box is stretched to at least the date box width.
        let mut box_width = 0;
        if self.show_date {
            let text = time.format("%Y-%m-%d %H:%M:%S%.6f").to_string();
            y_top = self.draw_line(canvas, &text, scale, y_top, &mut box_width);
        }
        if self.show_raw {
            let text = format!("{:.4}", datetime_to_f64(&time));
            self.draw_line(canvas, &text, scale, y_top, &mut box_width);
        }
    }

    /// Draw one boxed text line with its top at `y_top`; returns the top
    /// of the next line.
    fn draw_line(
        &self,
        canvas: &mut RgbFrame,
        text: &str,
        scale: Scale,
        y_top: u32,
        box_width: &mut u32,
    ) -> u32 {
        let v_metrics = self.font.v_metrics(scale);
        let line_height = (v_metrics.ascent - v_metrics.descent).ceil() as u32 + 2 * LINE_PAD_PX;

        let glyphs: Vec<_> = self
            .font
            .layout(
                text,
                scale,
                point(
                    LINE_PAD_PX as f32,
                    y_top as f32 + LINE_PAD_PX as f32 + v_metrics.ascent,
                ),
            )
            .collect();

        let text_end = glyphs
            .iter()
            .rev()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .next()
            .unwrap_or(0.0)
            .ceil() as u32;
        *box_width = (text_end + LINE_PAD_PX).max(*box_width);

        for y in y_top..y_top + line_height {
            for x in 0..*box_width {
                put_pixel(canvas, x, y, BOX_COLOR, 255);
            }
        }

        for glyph in glyphs {
            if let Some(bounding_box) = glyph.pixel_bounding_box() {
                glyph.draw(|x, y, v| {
                    let gx = x as i32 + bounding_box.min.x;
                    let gy = y as i32 + bounding_box.min.y;
                    if gx >= 0 && gy >= 0 {
                        put_pixel(canvas, gx as u32, gy as u32, TEXT_COLOR, (v * 255.0) as u8);
                    }
                });
            }
        }

        y_top + line_height
    }
}

fn put_pixel(frame: &mut RgbFrame, x: u32, y: u32, color: [u8; 3], alpha: u8) {
    if x >= frame.width || y >= frame.height {
        return;
    }
    let pix_start = frame.stride as usize * y as usize + x as usize * 3;

    let alpha = alpha as f64 / 255.0;
    let p = 1.0 - alpha;
    let q = alpha;

    let old: [u8; 3] = frame.image_data[pix_start..pix_start + 3]
        .try_into()
        .unwrap();
    let new: [u8; 3] = [
        (old[0] as f64 * p + color[0] as f64 * q).round() as u8,
        (old[1] as f64 * p + color[1] as f64 * q).round() as u8,
        (old[2] as f64 * p + color[2] as f64 * q).round() as u8,
    ];

    frame.image_data[pix_start..pix_start + 3].copy_from_slice(&new);
}
