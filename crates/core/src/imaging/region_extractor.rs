use image::imageops::FilterType;
use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::geometry::{
    CoordinateSpace, CropTransform, PixelRect, ResizeTransform, WorkingSpace,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    #[error(
        "region {width}x{height} at ({x}, {y}) exceeds {source_width}x{source_height} source"
    )]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        source_width: u32,
        source_height: u32,
    },
    #[error("region or source has zero area")]
    Empty,
    #[error("resize needs an RGB frame, got {0} channels")]
    UnsupportedChannels(u8),
}

/// The working canvas plus the scale that produced it.
#[derive(Clone, Debug)]
pub struct ResizedFrame {
    pub frame: Frame,
    pub transform: ResizeTransform,
}

/// A face crop plus the working-canvas window it was cut from.
#[derive(Clone, Debug)]
pub struct CroppedFrame {
    pub frame: Frame,
    pub transform: CropTransform,
}

/// Derives new rasters from existing ones: 1:1 crops and aspect-preserving
/// resizes. Never touches the source frame.
pub struct RegionExtractor {
    filter: FilterType,
}

impl RegionExtractor {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    /// Copies `region` out of `source` pixel for pixel.
    ///
    /// The region must lie entirely inside the source; callers clamp first.
    pub fn extract<S: CoordinateSpace>(
        &self,
        source: &Frame,
        region: &PixelRect<S>,
    ) -> Result<Frame, RegionError> {
        if region.width == 0 || region.height == 0 {
            return Err(RegionError::Empty);
        }
        if !region.fits_within(source.width(), source.height()) {
            return Err(RegionError::OutOfBounds {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                source_width: source.width(),
                source_height: source.height(),
            });
        }

        let channels = source.channels() as usize;
        let src_stride = source.width() as usize * channels;
        let row_len = region.width as usize * channels;
        let x_offset = region.x as usize * channels;
        let src = source.data();

        let mut data = Vec::with_capacity(row_len * region.height as usize);
        for row in region.y as usize..region.bottom() as usize {
            let start = row * src_stride + x_offset;
            data.extend_from_slice(&src[start..start + row_len]);
        }

        Ok(Frame::new(
            data,
            region.width,
            region.height,
            source.channels(),
            source.index(),
        ))
    }

    /// Cuts the face window out of the working canvas, establishing crop space.
    pub fn crop(
        &self,
        canvas: &Frame,
        window: PixelRect<WorkingSpace>,
    ) -> Result<CroppedFrame, RegionError> {
        let frame = self.extract(canvas, &window)?;
        Ok(CroppedFrame {
            frame,
            transform: CropTransform::new(window),
        })
    }

    /// Scales the whole source to fit `target_width x target_height`,
    /// preserving aspect ratio: `scale = min(tw / sw, th / sh)`.
    pub fn resize(
        &self,
        source: &Frame,
        target_width: u32,
        target_height: u32,
    ) -> Result<ResizedFrame, RegionError> {
        let (sw, sh) = (source.width(), source.height());
        if sw == 0 || sh == 0 || target_width == 0 || target_height == 0 {
            return Err(RegionError::Empty);
        }

        let scale = (target_width as f64 / sw as f64).min(target_height as f64 / sh as f64);
        let new_w = ((sw as f64 * scale).round() as u32).clamp(1, target_width);
        let new_h = ((sh as f64 * scale).round() as u32).clamp(1, target_height);

        let transform = ResizeTransform::between(sw, sh, new_w, new_h);
        if new_w == sw && new_h == sh {
            return Ok(ResizedFrame {
                frame: source.clone(),
                transform,
            });
        }

        let img = source
            .to_rgb_image()
            .ok_or(RegionError::UnsupportedChannels(source.channels()))?;
        let resized = image::imageops::resize(&img, new_w, new_h, self.filter);

        Ok(ResizedFrame {
            frame: Frame::from_rgb_image(resized, source.index()),
            transform,
        })
    }
}

impl Default for RegionExtractor {
    fn default() -> Self {
        Self::new(FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::geometry::{CropSpace, Rect, RawSpace};
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// Frame where every pixel encodes its own position: (x, y, 0).
    fn coordinate_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0]);
            }
        }
        Frame::new(data, width, height, 3, 42)
    }

    #[test]
    fn test_extract_inside_bounds_has_requested_size() {
        let src = coordinate_frame(100, 80);
        let region: PixelRect<WorkingSpace> = PixelRect::new(10, 20, 30, 40);

        let out = RegionExtractor::default().extract(&src, &region).unwrap();

        assert_eq!(out.width(), 30);
        assert_eq!(out.height(), 40);
        assert_eq!(out.channels(), 3);
        assert_eq!(out.index(), 42);
    }

    #[test]
    fn test_extract_copies_pixels_one_to_one() {
        let src = coordinate_frame(100, 80);
        let region: PixelRect<WorkingSpace> = PixelRect::new(10, 20, 30, 40);

        let out = RegionExtractor::default().extract(&src, &region).unwrap();

        // Local (0,0) is source (10,20); local (29,39) is source (39,59).
        assert_eq!(out.pixel(0, 0), Some(&[10u8, 20, 0][..]));
        assert_eq!(out.pixel(29, 39), Some(&[39u8, 59, 0][..]));
    }

    #[test]
    fn test_extract_full_frame() {
        let src = coordinate_frame(16, 9);
        let region: PixelRect<RawSpace> = PixelRect::new(0, 0, 16, 9);
        let out = RegionExtractor::default().extract(&src, &region).unwrap();
        assert_eq!(out.data(), src.data());
    }

    #[rstest]
    #[case::past_right(PixelRect::new(90, 0, 20, 10))]
    #[case::past_bottom(PixelRect::new(0, 75, 10, 10))]
    #[case::fully_outside(PixelRect::new(200, 200, 10, 10))]
    #[case::wider_than_source(PixelRect::new(0, 0, 101, 1))]
    fn test_extract_out_of_bounds(#[case] region: PixelRect<WorkingSpace>) {
        let src = coordinate_frame(100, 80);
        let err = RegionExtractor::default()
            .extract(&src, &region)
            .unwrap_err();
        assert!(matches!(err, RegionError::OutOfBounds { .. }));
    }

    #[test]
    fn test_extract_zero_area_is_empty_error() {
        let src = coordinate_frame(10, 10);
        let region: PixelRect<WorkingSpace> = PixelRect::new(2, 2, 0, 5);
        assert_eq!(
            RegionExtractor::default().extract(&src, &region),
            Err(RegionError::Empty)
        );
    }

    #[test]
    fn test_extract_leaves_source_untouched() {
        let src = coordinate_frame(20, 20);
        let before = src.clone();
        let region: PixelRect<WorkingSpace> = PixelRect::new(5, 5, 5, 5);
        RegionExtractor::default().extract(&src, &region).unwrap();
        assert_eq!(src, before);
    }

    #[test]
    fn test_crop_records_window_for_translation() {
        let canvas = coordinate_frame(100, 100);
        let window = PixelRect::new(10, 10, 50, 60);

        let crop = RegionExtractor::default().crop(&canvas, window).unwrap();

        assert_eq!(crop.frame.width(), 50);
        assert_eq!(crop.frame.height(), 60);
        let local: Rect<CropSpace> = Rect::new(0.0, 0.0, 5.0, 5.0);
        let working = crop.transform.rect_to_working(&local);
        assert_relative_eq!(working.x, 10.0);
        assert_relative_eq!(working.y, 10.0);
    }

    #[test]
    fn test_resize_landscape_fits_width() {
        // 640x480 into 400x400: scale = min(0.625, 0.833) = 0.625 -> 400x300
        let src = Frame::new(vec![128u8; 640 * 480 * 3], 640, 480, 3, 3);
        let out = RegionExtractor::default().resize(&src, 400, 400).unwrap();

        assert_eq!(out.frame.width(), 400);
        assert_eq!(out.frame.height(), 300);
        assert_eq!(out.frame.index(), 3);
        assert_relative_eq!(out.transform.scale_x(), 0.625);
        assert_relative_eq!(out.transform.scale_y(), 0.625);
    }

    #[test]
    fn test_resize_transform_matches_rounded_canvas() {
        // 641x480 -> scale 0.624, canvas rounds to 400x300
        let src = Frame::new(vec![0u8; 641 * 480 * 3], 641, 480, 3, 0);
        let out = RegionExtractor::default().resize(&src, 400, 400).unwrap();
        assert_eq!((out.frame.width(), out.frame.height()), (400, 300));

        let full: Rect<WorkingSpace> = Rect::new(0.0, 0.0, 400.0, 300.0);
        let raw = out.transform.rect_to_raw(&full);
        assert_relative_eq!(raw.x, 0.0);
        assert_relative_eq!(raw.y, 0.0);
        assert_relative_eq!(raw.width, 641.0, epsilon = 1e-9);
        assert_relative_eq!(raw.height, 480.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resize_portrait_fits_height() {
        let src = Frame::new(vec![0u8; 300 * 600 * 3], 300, 600, 3, 0);
        let out = RegionExtractor::default().resize(&src, 400, 400).unwrap();
        assert_eq!(out.frame.width(), 200);
        assert_eq!(out.frame.height(), 400);
    }

    #[test]
    fn test_resize_same_size_is_identity() {
        let src = coordinate_frame(40, 40);
        let out = RegionExtractor::default().resize(&src, 40, 40).unwrap();
        assert_eq!(out.frame, src);
        assert_relative_eq!(out.transform.scale_x(), 1.0);
        assert_relative_eq!(out.transform.scale_y(), 1.0);
    }

    #[test]
    fn test_resize_preserves_flat_colour() {
        let src = Frame::new(vec![200u8; 64 * 64 * 3], 64, 64, 3, 0);
        let out = RegionExtractor::default().resize(&src, 32, 32).unwrap();
        assert!(out.frame.data().iter().all(|&v| v == 200));
    }

    #[test]
    fn test_resize_zero_target_is_empty_error() {
        let src = coordinate_frame(10, 10);
        assert!(matches!(
            RegionExtractor::default().resize(&src, 0, 10),
            Err(RegionError::Empty)
        ));
    }

    #[test]
    fn test_resize_rejects_non_rgb() {
        let src = Frame::new(vec![0u8; 100], 10, 10, 1, 0);
        assert_eq!(
            RegionExtractor::default().resize(&src, 5, 5).unwrap_err(),
            RegionError::UnsupportedChannels(1)
        );
    }
}
