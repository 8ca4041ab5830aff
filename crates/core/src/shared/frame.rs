use ndarray::{ArrayView3, ShapeError};

/// An immutable raster of interleaved 8-bit samples, row-major.
///
/// There is no mutable access: a stage that needs different pixels
/// (resize, crop, annotated preview) derives a new frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            byte_len(width, height, channels),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn from_rgb_image(image: image::RgbImage, index: usize) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3, index)
    }

    /// `None` unless the frame is 3-channel.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        (self.channels == 3)
            .then(|| image::RgbImage::from_raw(self.width, self.height, self.data.clone()))
            .flatten()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Capture sequence number assigned by the frame source.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Samples of the pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.channels as usize;
        let start = (y as usize * self.width as usize + x as usize) * c;
        self.data.get(start..start + c)
    }

    /// `(height, width, channels)` view of the samples.
    pub fn view(&self) -> Result<ArrayView3<'_, u8>, ShapeError> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
    }
}

fn byte_len(width: u32, height: u32, channels: u8) -> usize {
    width as usize * height as usize * channels as usize
}
