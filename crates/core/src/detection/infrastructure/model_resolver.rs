use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model not found: {0}")]
    NotFound(String),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// How a configured model location should be interpreted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelLocation {
    /// `http://` or `https://`; fetched once into the cache.
    Url(String),
    /// Anything with a directory component or an existing file.
    Path(PathBuf),
    /// A bare file name, looked up in the cache and bundled directories.
    Name(String),
}

impl ModelLocation {
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Self::Url(location.to_string());
        }
        let path = Path::new(location);
        if path.components().count() > 1 || path.is_absolute() || path.exists() {
            Self::Path(path.to_path_buf())
        } else {
            Self::Name(location.to_string())
        }
    }
}

/// Turn a model location into a local file path.
///
/// Bare names are looked up in the user cache, then `bundled_dir`. URLs are
/// downloaded into the cache unless a previous download is already there.
pub fn resolve(
    location: &str,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(location, &model_cache_dir()?, bundled_dir, progress)
}

fn resolve_in(
    location: &str,
    cache_dir: &Path,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    match ModelLocation::parse(location) {
        ModelLocation::Path(path) => {
            if path.is_file() {
                Ok(path)
            } else {
                Err(ModelResolveError::NotFound(path.display().to_string()))
            }
        }
        ModelLocation::Name(name) => {
            let cached = cache_dir.join(&name);
            if cached.is_file() {
                return Ok(cached);
            }
            bundled_dir
                .map(|dir| dir.join(&name))
                .filter(|p| p.is_file())
                .ok_or(ModelResolveError::NotFound(name))
        }
        ModelLocation::Url(url) => {
            let name = file_name_from_url(&url)
                .ok_or_else(|| ModelResolveError::NotFound(url.clone()))?;
            let cached = cache_dir.join(name);
            if cached.is_file() {
                return Ok(cached);
            }
            fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
            log::info!("Downloading model {url}");
            download(&url, &cached, progress)?;
            Ok(cached)
        }
    }
}

fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|n| !n.is_empty() && !n.contains(':'))
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/TongueTracker/models/`
/// - Linux: `$XDG_CACHE_HOME/TongueTracker/models/` or `~/.cache/TongueTracker/models/`
/// - Windows: `%LOCALAPPDATA%/TongueTracker/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let root = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let root = dirs::cache_dir();

    root.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_to(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_to(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ModelResolveError::Write { path, source }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case::https("https://host/models/tongue.onnx", ModelLocation::Url("https://host/models/tongue.onnx".into()))]
    #[case::http("http://host/a.onnx", ModelLocation::Url("http://host/a.onnx".into()))]
    #[case::relative("models/face.onnx", ModelLocation::Path("models/face.onnx".into()))]
    #[case::bare("face_detection_short_range.onnx", ModelLocation::Name("face_detection_short_range.onnx".into()))]
    fn test_parse_location(#[case] input: &str, #[case] expected: ModelLocation) {
        assert_eq!(ModelLocation::parse(input), expected);
    }

    #[test]
    fn test_existing_path_used_as_is() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("face.onnx");
        fs::write(&model, b"model").unwrap();

        let resolved =
            resolve_in(model.to_str().unwrap(), &tmp.path().join("cache"), None, None).unwrap();

        assert_eq!(resolved, model);
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.onnx");
        let err = resolve_in(missing.to_str().unwrap(), tmp.path(), None, None).unwrap_err();
        assert!(matches!(err, ModelResolveError::NotFound(_)));
    }

    #[test]
    fn test_name_prefers_cache_over_bundled() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&bundled).unwrap();
        fs::write(cache.join("tongue_model.onnx"), b"cached").unwrap();
        fs::write(bundled.join("tongue_model.onnx"), b"bundled").unwrap();

        let resolved = resolve_in("tongue_model.onnx", &cache, Some(&bundled), None).unwrap();

        assert_eq!(resolved, cache.join("tongue_model.onnx"));
    }

    #[test]
    fn test_name_falls_back_to_bundled() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("tongue_model.onnx"), b"bundled").unwrap();

        let resolved = resolve_in(
            "tongue_model.onnx",
            &tmp.path().join("cache"),
            Some(&bundled),
            None,
        )
        .unwrap();

        assert_eq!(fs::read(resolved).unwrap(), b"bundled");
    }

    #[test]
    fn test_name_missing_everywhere() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_in("tongue_model.onnx", tmp.path(), None, None).unwrap_err();
        assert!(matches!(err, ModelResolveError::NotFound(n) if n == "tongue_model.onnx"));
    }

    #[test]
    fn test_url_already_in_cache_skips_download() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("tongue.onnx"), b"cached").unwrap();

        let resolved = resolve_in(
            "http://invalid.nonexistent.example.com/m/tongue.onnx?v=2",
            tmp.path(),
            None,
            None,
        )
        .unwrap();

        assert_eq!(resolved, tmp.path().join("tongue.onnx"));
    }

    #[rstest]
    #[case("https://host/a/b/model.onnx", Some("model.onnx"))]
    #[case("https://host/model.onnx?token=1", Some("model.onnx"))]
    #[case("https://host/", None)]
    fn test_file_name_from_url(#[case] url: &str, #[case] expected: Option<&str>) {
        assert_eq!(file_name_from_url(url), expected);
    }

    #[test]
    fn test_model_cache_dir_is_namespaced() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_failed_download_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
