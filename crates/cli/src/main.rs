use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use tongue_tracker_core::capture::domain::frame_source::FrameSource;
use tongue_tracker_core::capture::infrastructure::ffmpeg_camera_source::CameraSettings;
use tongue_tracker_core::capture::infrastructure::image_file_source::ImageFileSource;
use tongue_tracker_core::detection::domain::label_map::LabelMap;
use tongue_tracker_core::pipeline::detection_pipeline::DetectionPipeline;
use tongue_tracker_core::pipeline::infrastructure::startup::{
    load_detectors, open_camera, resolve_model,
};
use tongue_tracker_core::pipeline::infrastructure::threaded_runner::{self, RunnerEvent};
use tongue_tracker_core::pipeline::pipeline_config::PipelineConfig;
use tongue_tracker_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use tongue_tracker_core::pipeline::pipeline_runner::PipelineRunner;
use tongue_tracker_core::pipeline::startup_error::{DetectorStage, StartupError};
use tongue_tracker_core::rendering::domain::renderer::{NullRenderer, Renderer};
use tongue_tracker_core::rendering::infrastructure::preview_image_renderer::PreviewImageRenderer;
use tongue_tracker_core::shared::constants::IMAGE_EXTENSIONS;

/// Webcam face + tongue tracker. Runs until the stream ends.
#[derive(Parser)]
#[command(name = "tongue-tracker")]
struct Cli {
    /// Camera number (ignored when --input is given).
    #[arg(long, default_value = "0")]
    camera: u32,

    /// Capture device name, stream URL, video file or still image.
    #[arg(long)]
    input: Option<String>,

    /// Requested capture size, e.g. 1280x720.
    #[arg(long, value_parser = parse_resolution)]
    capture_size: Option<(u32, u32)>,

    /// Requested capture frame rate.
    #[arg(long)]
    capture_fps: Option<u32>,

    /// JSON config file (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory searched for bare model names after the user cache.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Face model path, name or URL.
    #[arg(long)]
    face_model: Option<String>,

    /// Feature model path, name or URL.
    #[arg(long)]
    feature_model: Option<String>,

    /// Class table, e.g. 1=tongue,2=lip.
    #[arg(long, value_delimiter = ',', value_parser = parse_label)]
    labels: Option<Vec<(i64, String)>>,

    /// Working canvas bounding square in pixels.
    #[arg(long)]
    working_size: Option<u32>,

    /// Stage-two score threshold (0.0-1.0).
    #[arg(long)]
    threshold: Option<f32>,

    /// Run face detection every Nth tick.
    #[arg(long)]
    decimation: Option<u32>,

    /// Face box height multiplier.
    #[arg(long)]
    padding: Option<f64>,

    /// Tick rate ceiling (0 = unpaced).
    #[arg(long)]
    fps: Option<f64>,

    /// Disable the preview image.
    #[arg(long)]
    no_preview: bool,

    /// Where the annotated preview is written.
    #[arg(long, default_value = "preview.png")]
    preview_path: PathBuf,

    /// Write the preview every N ticks.
    #[arg(long, default_value = "15")]
    preview_every: u64,

    /// Stop after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let mut config = load_config(&cli)?;
    resolve_models(&mut config, cli.models_dir.as_deref())?;
    let (face, feature) = load_detectors(&config, cli.models_dir.as_deref())?;

    let source = open_source(&cli)?;
    let renderer: Box<dyn Renderer> = if config.preview_enabled {
        Box::new(PreviewImageRenderer::new(&cli.preview_path, cli.preview_every))
    } else {
        Box::new(NullRenderer)
    };

    let pipeline = DetectionPipeline::new(
        config,
        face,
        feature,
        renderer,
        Box::new(StdoutPipelineLogger::default()),
    )?;
    let mut runner = PipelineRunner::new(pipeline);
    if let Some(max) = cli.max_ticks {
        runner = runner.with_max_ticks(max);
    }

    let handle = threaded_runner::spawn(runner, source);
    for event in handle.events.iter() {
        match event {
            RunnerEvent::Tick(tick) => {
                log::debug!("tick {} {:?} offset {:.4}", tick.tick, tick.mode, tick.offset);
            }
            RunnerEvent::Error(message) => eprintln!("Error: {message}"),
            RunnerEvent::Stopped(summary) => {
                log::info!(
                    "Stopped ({:?}) after {} ticks, last offset {:.4}",
                    summary.reason,
                    summary.ticks,
                    summary.last_offset
                );
            }
        }
    }
    handle.join()?;

    Ok(())
}

/// Config file first, then any flags on top.
fn load_config(cli: &Cli) -> Result<PipelineConfig, StartupError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => match PipelineConfig::default_path() {
            Some(path) => PipelineConfig::load_or_default(&path)?,
            None => PipelineConfig::default(),
        },
    };

    if let Some(v) = &cli.face_model {
        config.face_model = v.clone();
    }
    if let Some(v) = &cli.feature_model {
        config.feature_model = v.clone();
    }
    if let Some(v) = &cli.labels {
        config.labels = LabelMap::new(v.iter().cloned());
    }
    if let Some(v) = cli.working_size {
        config.working_canvas_max_size = v;
    }
    if let Some(v) = cli.threshold {
        config.stage_two_threshold = v;
    }
    if let Some(v) = cli.decimation {
        config.decimation_interval = v;
    }
    if let Some(v) = cli.padding {
        config.face_box_vertical_padding = v;
    }
    if let Some(v) = cli.fps {
        config.target_fps = v;
    }
    if cli.no_preview {
        config.preview_enabled = false;
    }

    config.validate()?;
    Ok(config)
}

/// Turns model locations into local paths, downloading with progress.
fn resolve_models(
    config: &mut PipelineConfig,
    models_dir: Option<&Path>,
) -> Result<(), StartupError> {
    for (location, stage) in [
        (&mut config.face_model, DetectorStage::Face),
        (&mut config.feature_model, DetectorStage::Feature),
    ] {
        log::info!("Resolving {stage} model: {location}");
        let path = resolve_model(
            location.as_str(),
            stage,
            models_dir,
            Some(Box::new(download_progress)),
        )?;
        *location = path.display().to_string();
    }
    eprintln!();
    Ok(())
}

fn open_source(cli: &Cli) -> Result<Box<dyn FrameSource>, StartupError> {
    if let Some(input) = &cli.input {
        let path = Path::new(input);
        if is_image(path) {
            let repeat = cli.max_ticks.unwrap_or(1) as usize;
            let source =
                ImageFileSource::open(path, repeat).map_err(|e| StartupError::DeviceAcquisition {
                    device: input.clone(),
                    reason: e.to_string(),
                })?;
            return Ok(Box::new(source));
        }
    }

    let settings = CameraSettings {
        device: cli
            .input
            .clone()
            .unwrap_or_else(|| CameraSettings::camera(cli.camera).device),
        resolution: cli.capture_size,
        framerate: cli.capture_fps,
    };
    Ok(Box::new(open_camera(&settings)?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(t) = cli.threshold {
        if !(0.0..=1.0).contains(&t) {
            return Err(format!("Threshold must be between 0.0 and 1.0, got {t}").into());
        }
    }
    if cli.decimation == Some(0) {
        return Err("Decimation must be at least 1".into());
    }
    if cli.preview_every == 0 {
        return Err("Preview interval must be at least 1".into());
    }
    if cli.max_ticks == Some(0) {
        return Err("Max ticks must be at least 1".into());
    }
    if let Some(config) = &cli.config {
        if !config.exists() {
            return Err(format!("Config file not found: {}", config.display()).into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_resolution(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w = w.parse().map_err(|_| format!("bad width '{w}'"))?;
    let h = h.parse().map_err(|_| format!("bad height '{h}'"))?;
    Ok((w, h))
}

fn parse_label(s: &str) -> Result<(i64, String), String> {
    let (id, label) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=LABEL, got '{s}'"))?;
    let id = id
        .trim()
        .parse()
        .map_err(|_| format!("bad class id '{id}'"))?;
    Ok((id, label.trim().to_string()))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1280x720"), Ok((1280, 720)));
        assert!(parse_resolution("1280").is_err());
        assert!(parse_resolution("wide x tall").is_err());
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("1=tongue"), Ok((1, "tongue".to_string())));
        assert_eq!(parse_label(" 2 = lip "), Ok((2, "lip".to_string())));
        assert!(parse_label("tongue").is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"decimation_interval": 3, "stage_two_threshold": 0.6}"#).unwrap();

        let cli = Cli::parse_from([
            "tongue-tracker",
            "--config",
            path.to_str().unwrap(),
            "--decimation",
            "5",
            "--no-preview",
            "--labels",
            "1=tongue,2=lip",
        ]);
        let config = load_config(&cli).unwrap();

        assert_eq!(config.decimation_interval, 5);
        assert_eq!(config.stage_two_threshold, 0.6);
        assert!(!config.preview_enabled);
        assert_eq!(config.labels.get(2), Some("lip"));
    }

    #[test]
    fn test_validate_rejects_zero_decimation() {
        let cli = Cli::parse_from(["tongue-tracker", "--decimation", "0"]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("face.PNG")));
        assert!(!is_image(Path::new("/dev/video0")));
    }
}
