//! # model-cache
//!
//! Resolve segmentation model weights to a local file, downloading them once
//! into a per-user cache directory.
//!
//! A model source is either a local path or an `http://` / `https://` URL.
//! Local paths are used in place. URLs are fetched on first use and stored
//! under [`model_cache_dir`]; every later call finds the cached copy and
//! skips the network.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use model_cache::ensure_model;
//!
//! let path = ensure_model(
//!     "https://example.com/models/portrait.onnx",
//!     Some(&|downloaded, total| {
//!         if let Some(t) = total {
//!             eprint!("\rDownloading model: {}/{} bytes", downloaded, t);
//!         }
//!     }),
//! )
//! .expect("model unavailable");
//! ```
//!
//! ## Environment variable overrides
//!
//! - `CUTOUT_MODEL_PATH`: path to an existing model file; used for every
//!   source and skips download.
//! - `CUTOUT_MODEL_CACHE_DIR`: override the default cache directory.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by model-cache operations.
#[derive(Error, Debug)]
pub enum ModelCacheError {
    /// A local model path does not exist.
    #[error("Model file not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Could not create or navigate the local cache directory.
    #[error("Cache directory error: {0}")]
    CacheDir(#[source] std::io::Error),

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// The downloaded bytes could not be written into the cache.
    #[error("Failed to store model in cache: {0}")]
    Write(#[source] std::io::Error),
}

// ── Cache directory resolution ───────────────────────────────────────────────

/// Returns the directory downloaded models are stored in.
///
/// Default locations:
/// - **macOS**: `~/Library/Caches/cutout/models/`
/// - **Linux**: `~/.cache/cutout/models/`
/// - **Windows**: `%LOCALAPPDATA%\cutout\models\`
///
/// Override by setting `CUTOUT_MODEL_CACHE_DIR`.
pub fn model_cache_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("CUTOUT_MODEL_CACHE_DIR") {
        return PathBuf::from(override_dir);
    }

    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir);

    base.join("cutout").join("models")
}

/// `true` for `http://` and `https://` sources.
pub fn is_url(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// File name a URL is cached under.
///
/// Host and path are flattened into one name so that two models with the
/// same final path segment on different hosts do not collide. Query strings
/// and fragments are ignored.
pub fn cache_file_name(url: &str) -> String {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let without_query = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    let name: String = without_query
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() {
        "model.onnx".to_string()
    } else {
        name
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Returns the local path for `source` if no download is needed, or `None`.
pub fn cached_model_path(source: &str) -> Option<PathBuf> {
    if let Some(p) = env_override() {
        return Some(p);
    }
    let path = if is_url(source) {
        model_cache_dir().join(cache_file_name(source))
    } else {
        PathBuf::from(source)
    };
    path.exists().then_some(path)
}

/// Ensures the model named by `source` is available as a local file.
///
/// - If `CUTOUT_MODEL_PATH` is set (and the file exists), that path is used.
/// - A local path is returned as-is when it exists.
/// - A URL is looked up in [`model_cache_dir`] and downloaded if absent.
///
/// `on_progress` receives `(bytes_downloaded, total_size_option)` during
/// the download. Pass `None` to suppress progress callbacks.
///
/// Downloads land in a temporary file next to the final path and are
/// renamed into place only once complete, so an interrupted download never
/// leaves a truncated model in the cache.
pub fn ensure_model(
    source: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, ModelCacheError> {
    // 1. Environment variable override.
    if let Some(p) = env_override() {
        return Ok(p);
    }

    // 2. Local file.
    if !is_url(source) {
        let path = PathBuf::from(source);
        return if path.exists() {
            Ok(path)
        } else {
            Err(ModelCacheError::NotFound { path })
        };
    }

    // 3. Already cached on disk.
    let cache_dir = model_cache_dir();
    let model_path = cache_dir.join(cache_file_name(source));
    if model_path.exists() {
        return Ok(model_path);
    }

    // 4. Download.
    std::fs::create_dir_all(&cache_dir).map_err(ModelCacheError::CacheDir)?;
    download_to(source, &cache_dir, &model_path, on_progress)?;

    Ok(model_path)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn env_override() -> Option<PathBuf> {
    let p = PathBuf::from(std::env::var("CUTOUT_MODEL_PATH").ok()?);
    if p.exists() {
        Some(p)
    } else {
        eprintln!(
            "model-cache: CUTOUT_MODEL_PATH '{}' not found; ignoring",
            p.display()
        );
        None
    }
}

/// Streams `url` into `dest`, calling `on_progress` every 64 KiB.
fn download_to(
    url: &str,
    cache_dir: &Path,
    dest: &Path,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<(), ModelCacheError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("model-cache/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| ModelCacheError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| ModelCacheError::Download(format!("GET {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(ModelCacheError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }

    let total = response.content_length();
    let mut tmp = tempfile::NamedTempFile::new_in(cache_dir).map_err(ModelCacheError::Write)?;
    let mut chunk = vec![0u8; 64 * 1024]; // 64 KiB
    let mut downloaded: u64 = 0;

    loop {
        match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                tmp.write_all(&chunk[..n]).map_err(ModelCacheError::Write)?;
                downloaded += n as u64;
                if let Some(cb) = on_progress {
                    cb(downloaded, total);
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ModelCacheError::Download(format!("Read error: {e}")));
            }
        }
    }

    if let Some(expected) = total {
        if downloaded != expected {
            return Err(ModelCacheError::Download(format!(
                "truncated download: {downloaded} of {expected} bytes"
            )));
        }
    }

    tmp.persist(dest).map_err(|e| ModelCacheError::Write(e.error))?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
