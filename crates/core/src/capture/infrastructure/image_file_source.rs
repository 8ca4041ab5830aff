use std::path::Path;

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;

/// Replays one still image as a fixed-length stream.
///
/// Each call yields the same pixels with the next sequence number, so the
/// pipeline can be driven offline without a camera.
pub struct ImageFileSource {
    image: Option<Frame>,
    repeat: usize,
    served: usize,
}

impl ImageFileSource {
    pub fn open(path: &Path, repeat: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let rgb = image::open(path)?.to_rgb8();
        Ok(Self::from_frame(Frame::from_rgb_image(rgb, 0), repeat))
    }

    pub fn from_frame(frame: Frame, repeat: usize) -> Self {
        Self {
            image: Some(frame),
            repeat,
            served: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.repeat.saturating_sub(self.served)
    }
}

impl FrameSource for ImageFileSource {
    fn current_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(image) = self.image.as_ref() else {
            return Ok(None);
        };
        if self.served >= self.repeat {
            return Ok(None);
        }
        let frame = Frame::new(
            image.data().to_vec(),
            image.width(),
            image.height(),
            image.channels(),
            self.served,
        );
        self.served += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.image = None;
    }
}
