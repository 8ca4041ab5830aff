use std::fmt;

use thiserror::Error;

use super::pipeline_config::ConfigError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorStage {
    Face,
    Feature,
}

impl fmt::Display for DetectorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorStage::Face => write!(f, "stage-one face"),
            DetectorStage::Feature => write!(f, "stage-two feature"),
        }
    }
}

/// Failures that abort a session before the first tick. Never retried here.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("capture device {device} unavailable: {reason}")]
    DeviceAcquisition { device: String, reason: String },
    #[error("{stage} detector unavailable: {reason}")]
    DetectorUnavailable { stage: DetectorStage, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failing_part() {
        let device = StartupError::DeviceAcquisition {
            device: "/dev/video0".into(),
            reason: "permission denied".into(),
        };
        assert_eq!(
            device.to_string(),
            "capture device /dev/video0 unavailable: permission denied"
        );

        let detector = StartupError::DetectorUnavailable {
            stage: DetectorStage::Feature,
            reason: "model not found".into(),
        };
        assert!(detector.to_string().starts_with("stage-two feature detector"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: StartupError = ConfigError::Invalid("decimation_interval must be >= 1".into()).into();
        assert!(matches!(err, StartupError::Config(ConfigError::Invalid(_))));
    }
}
