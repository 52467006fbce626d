//! Input images: filename, declared MIME type and raw bytes.
//!
//! The core does not validate that the declared MIME type matches the
//! bytes; a mismatch surfaces later as a decode failure. Inputs can come
//! from disk, from memory, or from a `data:` URL of the kind a browser
//! file reader produces.

use super::archive::ENTRY_SUFFIX;
use crate::error::CutoutError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Trailing extension: a final `.` followed by characters that are neither
/// `/` nor `.`.
static RE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^/.]+$").unwrap());

/// An image supplied by the caller. Immutable once created.
#[derive(Debug, Clone)]
pub struct InputImage {
    filename: String,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl InputImage {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read an image from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, CutoutError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CutoutError::InputNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => CutoutError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => CutoutError::Internal(format!("Failed to read {}: {e}", path.display())),
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime_type = mime_from_filename(&filename).to_string();
        debug!("Read {} ({} bytes, {})", path.display(), bytes.len(), mime_type);

        Ok(Self::new(filename, mime_type, bytes))
    }

    /// Read several images from disk, preserving order.
    pub async fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Self>, CutoutError> {
        let mut inputs = Vec::with_capacity(paths.len());
        for p in paths {
            inputs.push(Self::from_path(p).await?);
        }
        Ok(inputs)
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(filename: impl Into<String>, data_url: &str) -> Result<Self, CutoutError> {
        let filename = filename.into();
        let invalid = |reason: &str| CutoutError::InvalidDataUrl {
            name: filename.clone(),
            reason: reason.to_string(),
        };

        let rest = data_url
            .strip_prefix("data:")
            .ok_or_else(|| invalid("missing 'data:' prefix"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| invalid("missing ',' separator"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| invalid("only base64 data URLs are supported"))?;
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| invalid(&format!("bad base64 payload: {e}")))?;

        let mime_type = if mime_type.is_empty() {
            mime_from_filename(&filename).to_string()
        } else {
            mime_type.to_string()
        };
        Ok(Self::new(filename, mime_type, bytes))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// The filename with its final extension removed; case is preserved.
    ///
    /// `photo.JPG` → `photo`, `a.tar.gz` → `a.tar`, `README` → `README`.
    pub fn stem(&self) -> String {
        RE_EXTENSION.replace(&self.filename, "").into_owned()
    }

    /// Name of this image's entry in the output archive, unless an earlier
    /// input with the same stem already claimed it.
    pub fn entry_name(&self) -> String {
        format!("{}{}", self.stem(), ENTRY_SUFFIX)
    }
}

/// Best-effort MIME type for a filename.
pub fn mime_from_filename(name: &str) -> &'static str {
    let ext = PathBuf::from(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}
