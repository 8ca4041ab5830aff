pub const FACE_MODEL_NAME: &str = "face_detection_short_range.onnx";
pub const FEATURE_MODEL_NAME: &str = "tongue_detector.onnx";

/// Directory name used under the platform cache/config roots.
pub const APP_DIR_NAME: &str = "TongueTracker";

/// Pixel area that maps to an offset of 1.0.
pub const OFFSET_AREA_NORMALIZER: f64 = 40_000.0;

/// Landmark index of the mouth in a face estimate.
pub const MOUTH_LANDMARK: usize = 3;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
