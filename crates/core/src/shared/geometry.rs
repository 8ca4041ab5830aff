//! Points and rectangles tagged with the coordinate space they live in.
//!
//! Three nested spaces exist per tick: the raw camera frame, the resized
//! working canvas, and the face crop. Values from different spaces have
//! different types, so the only way across a boundary is one of the
//! transforms at the bottom of this module.

use std::fmt;
use std::marker::PhantomData;

pub trait CoordinateSpace: Copy + Clone + fmt::Debug + Default + PartialEq + Send + Sync {
    const NAME: &'static str;
}

/// Native camera resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawSpace;

/// The resized canvas every detection stage works against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkingSpace;

/// Local coordinates of the face crop handed to the feature detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CropSpace;

impl CoordinateSpace for RawSpace {
    const NAME: &'static str = "raw";
}

impl CoordinateSpace for WorkingSpace {
    const NAME: &'static str = "working";
}

impl CoordinateSpace for CropSpace {
    const NAME: &'static str = "crop";
}

#[derive(Clone, Copy, Default, PartialEq)]
pub struct Point<S: CoordinateSpace> {
    pub x: f64,
    pub y: f64,
    space: PhantomData<S>,
}

impl<S: CoordinateSpace> Point<S> {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }
}

impl<S: CoordinateSpace> fmt::Debug for Point<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point<{}>({}, {})", S::NAME, self.x, self.y)
    }
}

/// Axis-aligned rectangle with sub-pixel geometry.
#[derive(Clone, Copy, Default, PartialEq)]
pub struct Rect<S: CoordinateSpace> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    space: PhantomData<S>,
}

impl<S: CoordinateSpace> Rect<S> {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    pub fn from_corners(top_left: Point<S>, bottom_right: Point<S>) -> Self {
        Self::new(
            top_left.x,
            top_left.y,
            bottom_right.x - top_left.x,
            bottom_right.y - top_left.y,
        )
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn top_left(&self) -> Point<S> {
        Point::new(self.x, self.y)
    }

    /// Snaps to whole pixels and intersects with `[0, width) x [0, height)`.
    ///
    /// Returns `None` when nothing of the rectangle is left inside.
    pub fn clamp_to_pixels(&self, width: u32, height: u32) -> Option<PixelRect<S>> {
        if !(self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite())
        {
            return None;
        }

        let x0 = self.x.round().clamp(0.0, width as f64);
        let y0 = self.y.round().clamp(0.0, height as f64);
        let x1 = self.right().round().clamp(0.0, width as f64);
        let y1 = self.bottom().round().clamp(0.0, height as f64);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(PixelRect::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        ))
    }
}

impl<S: CoordinateSpace> fmt::Debug for Rect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect<{}>{{x: {}, y: {}, w: {}, h: {}}}",
            S::NAME,
            self.x,
            self.y,
            self.width,
            self.height
        )
    }
}

/// Whole-pixel rectangle, used wherever pixels are actually copied.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelRect<S: CoordinateSpace> {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    space: PhantomData<S>,
}

impl<S: CoordinateSpace> PixelRect<S> {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            space: PhantomData,
        }
    }

    /// Exclusive right edge. Computed in `u64` so huge regions cannot wrap.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }

    pub fn to_rect(&self) -> Rect<S> {
        Rect::new(
            self.x as f64,
            self.y as f64,
            self.width as f64,
            self.height as f64,
        )
    }
}

impl<S: CoordinateSpace> fmt::Debug for PixelRect<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PixelRect<{}>{{x: {}, y: {}, w: {}, h: {}}}",
            S::NAME,
            self.x,
            self.y,
            self.width,
            self.height
        )
    }
}

// ---------------------------------------------------------------------------
// Space transforms
// ---------------------------------------------------------------------------

/// Per-axis scale between the raw frame and the working canvas.
///
/// The canvas is rounded to whole pixels, so the two axes can differ
/// slightly even for an aspect-preserving resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResizeTransform {
    scale_x: f64,
    scale_y: f64,
}

impl ResizeTransform {
    /// Scales are working pixels per raw pixel.
    pub fn new(scale_x: f64, scale_y: f64) -> Self {
        Self { scale_x, scale_y }
    }

    /// Transform that maps a `raw_w x raw_h` frame exactly onto a
    /// `working_w x working_h` canvas.
    pub fn between(raw_w: u32, raw_h: u32, working_w: u32, working_h: u32) -> Self {
        Self::new(
            working_w as f64 / raw_w as f64,
            working_h as f64 / raw_h as f64,
        )
    }

    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    pub fn point_to_raw(&self, p: &Point<WorkingSpace>) -> Point<RawSpace> {
        Point::new(p.x / self.scale_x, p.y / self.scale_y)
    }

    pub fn rect_to_raw(&self, r: &Rect<WorkingSpace>) -> Rect<RawSpace> {
        Rect::new(
            r.x / self.scale_x,
            r.y / self.scale_y,
            r.width / self.scale_x,
            r.height / self.scale_y,
        )
    }

    pub fn rect_to_working(&self, r: &Rect<RawSpace>) -> Rect<WorkingSpace> {
        Rect::new(
            r.x * self.scale_x,
            r.y * self.scale_y,
            r.width * self.scale_x,
            r.height * self.scale_y,
        )
    }
}

/// Offset between a crop and the working-canvas window it was cut from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropTransform {
    window: PixelRect<WorkingSpace>,
}

impl CropTransform {
    pub fn new(window: PixelRect<WorkingSpace>) -> Self {
        Self { window }
    }

    pub fn window(&self) -> PixelRect<WorkingSpace> {
        self.window
    }

    pub fn point_to_working(&self, p: &Point<CropSpace>) -> Point<WorkingSpace> {
        Point::new(p.x + self.window.x as f64, p.y + self.window.y as f64)
    }

    pub fn rect_to_working(&self, r: &Rect<CropSpace>) -> Rect<WorkingSpace> {
        Rect::new(
            r.x + self.window.x as f64,
            r.y + self.window.y as f64,
            r.width,
            r.height,
        )
    }

    pub fn rect_to_crop(&self, r: &Rect<WorkingSpace>) -> Rect<CropSpace> {
        Rect::new(
            r.x - self.window.x as f64,
            r.y - self.window.y as f64,
            r.width,
            r.height,
        )
    }
}
