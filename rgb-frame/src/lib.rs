use machine_vision_formats::{
    pixel_format::RGB8, ImageBuffer, ImageBufferMutRef, ImageBufferRef, ImageData, ImageMutData,
    ImageStride, OwnedImageStride, Stride,
};

const BYTES_PER_PIXEL: usize = 3;

/// Owned RGB8 image data with a row stride.
///
/// Rows are `stride` bytes apart; only the first `width * 3` bytes of each
/// row are pixel data. Everything in this pipeline is RGB8, so unlike a
/// generic frame type the pixel format is fixed at compile time.
#[derive(Clone)]
pub struct RgbFrame {
    /// width in pixels
    pub width: u32,
    /// height in pixels
    pub height: u32,
    /// number of bytes in an image row
    pub stride: u32,
    /// raw image data
    pub image_data: Vec<u8>,
}

impl RgbFrame {
    /// Move a `Vec<u8>` buffer as the backing store for a frame.
    ///
    /// Returns `None` if the buffer is too small for the requested
    /// dimensions.
    pub fn new(width: u32, height: u32, stride: u32, image_data: Vec<u8>) -> Option<Self> {
        if height == 0 {
            return Some(Self {
                width,
                height,
                stride,
                image_data,
            });
        }
        let valid_stride = width as usize * BYTES_PER_PIXEL;
        if (stride as usize) < valid_stride {
            return None;
        }
        let sz = stride as usize * (height as usize - 1) + valid_stride;
        if image_data.len() < sz {
            return None;
        }
        Some(Self {
            width,
            height,
            stride,
            image_data,
        })
    }

    /// Allocate a packed all-black frame.
    pub fn black(width: u32, height: u32) -> Self {
        let stride = width as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            stride: stride as u32,
            image_data: vec![0u8; stride * height as usize],
        }
    }

    /// Allocate a packed frame filled with a single color.
    pub fn solid(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut frame = Self::black(width, height);
        for px in frame.image_data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&color);
        }
        frame
    }

    /// Copy into an `image` crate RGB buffer, dropping any row padding.
    pub fn to_image(&self) -> image::RgbImage {
        let valid_stride = self.width as usize * BYTES_PER_PIXEL;
        let mut packed = Vec::with_capacity(valid_stride * self.height as usize);
        for row in self.image_data.chunks(self.stride as usize).take(self.height as usize) {
            packed.extend_from_slice(&row[..valid_stride]);
        }
        // The buffer length is exact by construction.
        image::RgbImage::from_raw(self.width, self.height, packed).unwrap()
    }

    /// Take ownership of an `image` crate RGB buffer (always packed).
    pub fn from_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            stride: width * BYTES_PER_PIXEL as u32,
            image_data: img.into_raw(),
        }
    }
}

impl std::fmt::Debug for RgbFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "RgbFrame {{ {}x{} }}", self.width, self.height)
    }
}

impl PartialEq for RgbFrame {
    fn eq(&self, other: &RgbFrame) -> bool {
        if self.width != other.width || self.height != other.height {
            return false;
        }

        // Strides may differ; compare only the valid region of each row.
        let valid_stride = self.width as usize * BYTES_PER_PIXEL;
        let a_rows = self.image_data.chunks(self.stride as usize);
        let b_rows = other.image_data.chunks(other.stride as usize);
        for (a_row, b_row) in a_rows.zip(b_rows).take(self.height as usize) {
            if a_row[..valid_stride] != b_row[..valid_stride] {
                return false;
            }
        }
        true
    }
}

impl ImageData<RGB8> for RgbFrame {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn buffer_ref(&self) -> ImageBufferRef<'_, RGB8> {
        ImageBufferRef::new(&self.image_data)
    }
    fn buffer(self) -> ImageBuffer<RGB8> {
        ImageBuffer::new(self.image_data)
    }
}

impl ImageMutData<RGB8> for RgbFrame {
    fn buffer_mut_ref(&mut self) -> ImageBufferMutRef<'_, RGB8> {
        ImageBufferMutRef::new(&mut self.image_data)
    }
}

impl Stride for RgbFrame {
    fn stride(&self) -> usize {
        self.stride as usize
    }
}

impl From<RgbFrame> for Vec<u8> {
    fn from(orig: RgbFrame) -> Vec<u8> {
        orig.image_data
    }
}

impl From<Box<RgbFrame>> for Vec<u8> {
    fn from(orig: Box<RgbFrame>) -> Vec<u8> {
        orig.image_data
    }
}

fn _test_rgb_frame_is_send() {
    // Compile-time test to ensure RgbFrame implements Send trait.
    fn implements<T: Send>() {}
    implements::<RgbFrame>();
}

fn _test_rgb_frame_is_image_stride() {
    // Compile-time test to ensure RgbFrame implements ImageStride trait.
    fn implements<T: ImageStride<RGB8>>() {}
    implements::<RgbFrame>();
}

fn _test_rgb_frame_is_owned_image_stride() {
    fn implements<T: OwnedImageStride<RGB8>>() {}
    implements::<RgbFrame>();
}
