use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect as DrawRect;

use crate::rendering::domain::renderer::{RenderInput, Renderer};
use crate::shared::constants::MOUTH_LANDMARK;
use crate::shared::geometry::{Rect, WorkingSpace};

/// `#66ff00`
pub const STROKE_COLOR: Rgb<u8> = Rgb([0x66, 0xff, 0x00]);
pub const STROKE_WIDTH: u32 = 3;

const LANDMARK_RADIUS: i32 = 2;
const MOUTH_RADIUS: i32 = 5;

/// Paints the tick's face box, landmarks and feature box onto a copy of the
/// working canvas and writes it to disk every `every` ticks.
pub struct PreviewImageRenderer {
    path: PathBuf,
    every: u64,
    written: u64,
}

impl PreviewImageRenderer {
    /// `every` of 0 is treated as 1. The image format follows the extension.
    pub fn new(path: &Path, every: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            every: every.max(1),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl Renderer for PreviewImageRenderer {
    fn draw(&mut self, input: &RenderInput<'_>) -> Result<(), Box<dyn std::error::Error>> {
        if input.tick % self.every != 0 {
            return Ok(());
        }
        let img = annotate(input).ok_or("preview needs an RGB canvas")?;
        img.save(&self.path)?;
        self.written += 1;
        Ok(())
    }
}

/// Returns the annotated canvas, or `None` if the canvas is not RGB.
pub fn annotate(input: &RenderInput<'_>) -> Option<RgbImage> {
    let mut img = input.canvas.to_rgb_image()?;

    if let Some(face) = input.face {
        stroke_rect(&mut img, &face.bbox());
        for (i, p) in face.landmarks.iter().enumerate() {
            let center = (p.x.round() as i32, p.y.round() as i32);
            if i == MOUTH_LANDMARK {
                draw_hollow_circle_mut(&mut img, center, MOUTH_RADIUS, STROKE_COLOR);
            }
            draw_filled_circle_mut(&mut img, center, LANDMARK_RADIUS, STROKE_COLOR);
        }
    }

    if let Some(feature) = input.feature_in_working_space() {
        stroke_rect(&mut img, &feature.bbox);
    }

    Some(img)
}

/// Hollow rectangle `STROKE_WIDTH` pixels thick, growing inward.
fn stroke_rect(img: &mut RgbImage, rect: &Rect<WorkingSpace>) {
    let x = rect.x.round() as i32;
    let y = rect.y.round() as i32;
    let w = rect.width.round() as i64;
    let h = rect.height.round() as i64;

    for inset in 0..STROKE_WIDTH as i64 {
        let (iw, ih) = (w - 2 * inset, h - 2 * inset);
        if iw <= 0 || ih <= 0 {
            break;
        }
        let r = DrawRect::at(x + inset as i32, y + inset as i32).of_size(iw as u32, ih as u32);
        draw_hollow_rect_mut(img, r, STROKE_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Detection;
    use crate::detection::domain::face_estimate::FaceEstimate;
    use crate::imaging::region_extractor::CroppedFrame;
    use crate::shared::frame::Frame;
    use crate::shared::geometry::{CropTransform, PixelRect, Point};

    fn canvas() -> Frame {
        Frame::new(vec![0; 100 * 100 * 3], 100, 100, 3, 0)
    }

    fn input<'a>(
        tick: u64,
        canvas: &'a Frame,
        face: Option<&'a FaceEstimate<WorkingSpace>>,
    ) -> RenderInput<'a> {
        RenderInput {
            tick,
            canvas,
            face,
            crop: None,
            detections: &[],
            offset: 0.0,
        }
    }

    fn pixel(img: &RgbImage, x: u32, y: u32) -> Rgb<u8> {
        *img.get_pixel(x, y)
    }

    #[test]
    fn test_face_box_drawn_three_pixels_thick() {
        let canvas = canvas();
        let face = FaceEstimate::new(Point::new(10.0, 10.0), Point::new(60.0, 60.0), vec![], 0.9);

        let img = annotate(&input(0, &canvas, Some(&face))).unwrap();

        assert_eq!(pixel(&img, 10, 30), STROKE_COLOR);
        assert_eq!(pixel(&img, 12, 30), STROKE_COLOR);
        assert_eq!(pixel(&img, 13, 30), Rgb([0, 0, 0]));
        assert_eq!(pixel(&img, 35, 35), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_feature_box_drawn_at_working_position() {
        let canvas = canvas();
        let crop = CroppedFrame {
            frame: Frame::new(vec![0; 40 * 40 * 3], 40, 40, 3, 0),
            transform: CropTransform::new(PixelRect::new(50, 50, 40, 40)),
        };
        let detections = [Detection {
            class_id: 1,
            label: "tongue".into(),
            score: 0.9,
            bbox: Rect::new(5.0, 5.0, 20.0, 20.0),
        }];
        let mut inp = input(0, &canvas, None);
        inp.crop = Some(&crop);
        inp.detections = &detections;

        let img = annotate(&inp).unwrap();

        // crop-local (5,5) lands at working (55,55)
        assert_eq!(pixel(&img, 55, 60), STROKE_COLOR);
        assert_eq!(pixel(&img, 5, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_writes_only_on_cadence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let canvas = canvas();
        let mut renderer = PreviewImageRenderer::new(&path, 5);

        for tick in 0..11 {
            renderer.draw(&input(tick, &canvas, None)).unwrap();
        }

        assert_eq!(renderer.written(), 3);
        let saved = image::open(&path).unwrap();
        assert_eq!(saved.width(), 100);
    }

    #[test]
    fn test_non_rgb_canvas_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let gray = Frame::new(vec![0; 16], 4, 4, 1, 0);
        let mut renderer = PreviewImageRenderer::new(&dir.path().join("p.png"), 1);
        assert!(renderer.draw(&input(0, &gray, None)).is_err());
    }
}
