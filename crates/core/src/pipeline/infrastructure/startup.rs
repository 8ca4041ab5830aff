use std::path::{Path, PathBuf};

use crate::capture::infrastructure::ffmpeg_camera_source::{CameraSettings, FfmpegCameraSource};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::feature_detector::FeatureDetector;
use crate::detection::infrastructure::model_resolver::{self, ProgressFn};
use crate::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use crate::detection::infrastructure::onnx_ssd_feature_detector::OnnxSsdFeatureDetector;
use crate::pipeline::pipeline_config::PipelineConfig;
use crate::pipeline::startup_error::{DetectorStage, StartupError};

/// Resolves a model location, mapping failure to the stage it belongs to.
pub fn resolve_model(
    location: &str,
    stage: DetectorStage,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, StartupError> {
    model_resolver::resolve(location, bundled_dir, progress).map_err(|e| {
        StartupError::DetectorUnavailable {
            stage,
            reason: e.to_string(),
        }
    })
}

/// Loads both detectors named in `config`.
pub fn load_detectors(
    config: &PipelineConfig,
    bundled_dir: Option<&Path>,
) -> Result<(Box<dyn FaceDetector>, Box<dyn FeatureDetector>), StartupError> {
    let unavailable = |stage| {
        move |e: Box<dyn std::error::Error>| StartupError::DetectorUnavailable {
            stage,
            reason: e.to_string(),
        }
    };

    let face_path = resolve_model(&config.face_model, DetectorStage::Face, bundled_dir, None)?;
    let feature_path = resolve_model(
        &config.feature_model,
        DetectorStage::Feature,
        bundled_dir,
        None,
    )?;

    log::info!("Loading face model {}", face_path.display());
    let face = OnnxBlazefaceDetector::new(&face_path, config.stage_one_confidence)
        .map_err(unavailable(DetectorStage::Face))?;
    log::info!("Loading feature model {}", feature_path.display());
    let feature =
        OnnxSsdFeatureDetector::new(&feature_path).map_err(unavailable(DetectorStage::Feature))?;

    Ok((Box::new(face), Box::new(feature)))
}

pub fn open_camera(settings: &CameraSettings) -> Result<FfmpegCameraSource, StartupError> {
    FfmpegCameraSource::open(settings).map_err(|e| StartupError::DeviceAcquisition {
        device: settings.device.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_is_detector_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            face_model: tmp.path().join("missing_face.onnx").display().to_string(),
            ..PipelineConfig::default()
        };

        let err = load_detectors(&config, None).err().unwrap();

        assert!(matches!(
            err,
            StartupError::DetectorUnavailable {
                stage: DetectorStage::Face,
                ..
            }
        ));
    }

    #[test]
    fn test_unopenable_device_is_device_acquisition() {
        let settings = CameraSettings {
            device: "file:///nonexistent/camera.mp4".into(),
            resolution: None,
            framerate: None,
        };
        let err = open_camera(&settings).err().unwrap();
        assert!(matches!(err, StartupError::DeviceAcquisition { .. }));
        assert!(err.to_string().contains("/nonexistent/camera.mp4"));
    }
}
