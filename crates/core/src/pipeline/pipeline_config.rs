use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::label_map::LabelMap;
use crate::shared::constants::{APP_DIR_NAME, FACE_MODEL_NAME, FEATURE_MODEL_NAME};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Session settings. Every field has a default, so a partial JSON file
/// is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bounding square the raw frame is scaled into.
    pub working_canvas_max_size: u32,
    /// Stage-two scores must be strictly above this.
    pub stage_two_threshold: f32,
    /// Stage one runs on every tick where `tick % decimation_interval == 0`.
    pub decimation_interval: u32,
    /// Face box height multiplier, anchored at the top edge.
    pub face_box_vertical_padding: f64,
    pub preview_enabled: bool,
    /// Requested counter wrap; rounded up to a multiple of the interval.
    pub tick_wrap_period: u32,
    /// Tick rate ceiling; 0 runs as fast as frames arrive.
    pub target_fps: f64,
    pub stage_one_confidence: f64,
    /// Path, bare model name or URL.
    pub face_model: String,
    pub feature_model: String,
    pub labels: LabelMap,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_canvas_max_size: 400,
            stage_two_threshold: 0.75,
            decimation_interval: 10,
            face_box_vertical_padding: 1.25,
            preview_enabled: true,
            tick_wrap_period: 100,
            target_fps: 60.0,
            stage_one_confidence: 0.5,
            face_model: FACE_MODEL_NAME.to_string(),
            feature_model: FEATURE_MODEL_NAME.to_string(),
            labels: LabelMap::default(),
        }
    }
}

impl PipelineConfig {
    /// `<config dir>/TongueTracker/config.json`, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file at `path` if it exists, otherwise the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.working_canvas_max_size == 0 {
            return invalid("working_canvas_max_size must be >= 1".into());
        }
        if self.decimation_interval == 0 {
            return invalid("decimation_interval must be >= 1".into());
        }
        if !(0.0..=1.0).contains(&self.stage_two_threshold) {
            return invalid(format!(
                "stage_two_threshold must be in [0, 1], got {}",
                self.stage_two_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.stage_one_confidence) {
            return invalid(format!(
                "stage_one_confidence must be in [0, 1], got {}",
                self.stage_one_confidence
            ));
        }
        if !(self.face_box_vertical_padding >= 1.0 && self.face_box_vertical_padding.is_finite()) {
            return invalid(format!(
                "face_box_vertical_padding must be >= 1.0, got {}",
                self.face_box_vertical_padding
            ));
        }
        if !(self.target_fps >= 0.0 && self.target_fps.is_finite()) {
            return invalid(format!("target_fps must be >= 0, got {}", self.target_fps));
        }
        if self.labels.is_empty() {
            return invalid("labels must name at least one class".into());
        }
        Ok(())
    }
}
