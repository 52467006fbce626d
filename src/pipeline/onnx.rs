//! ONNX Runtime segmentation backend (cargo feature `onnx`).
//!
//! Any single-input portrait-matting network works as long as it takes an
//! NCHW `f32` RGB tensor in `[0, 1]` and returns a foreground matte whose
//! last two dimensions are `H × W`.

use crate::config::SegmentOptions;
use crate::error::SegmentationError;
use crate::pipeline::mask::Mask;
use crate::provider::{SegmentationBackend, SegmentationModel};
use async_trait::async_trait;
use image::{imageops, GrayImage, Luma, RgbaImage};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Loads an ONNX model from a local path or an HTTP(S) URL.
///
/// URLs are downloaded once into the model cache (see the `model-cache`
/// crate); later runs reuse the cached file.
#[derive(Debug, Clone)]
pub struct OnnxBackend {
    source: String,
    intra_threads: usize,
}

impl OnnxBackend {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            intra_threads: 4,
        }
    }

    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads.max(1);
        self
    }
}

#[async_trait]
impl SegmentationBackend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    async fn load(&self) -> Result<Arc<dyn SegmentationModel>, SegmentationError> {
        let source = self.source.clone();
        let threads = self.intra_threads;

        let session = tokio::task::spawn_blocking(move || -> Result<Session, SegmentationError> {
            let path = model_cache::ensure_model(&source, None).map_err(|e| {
                SegmentationError::LoadFailed {
                    detail: e.to_string(),
                }
            })?;
            build_session(&path, threads)
        })
        .await
        .map_err(|e| SegmentationError::LoadFailed {
            detail: format!("load task panicked: {e}"),
        })??;

        Ok(Arc::new(OnnxModel {
            session: Arc::new(Mutex::new(session)),
        }))
    }
}

fn build_session(path: &Path, threads: usize) -> Result<Session, SegmentationError> {
    let load_err = |detail: String| SegmentationError::LoadFailed { detail };

    info!("Loading ONNX model from {}", path.display());
    let session = Session::builder()
        .map_err(|e| load_err(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_err(e.to_string()))?
        .with_intra_threads(threads)
        .map_err(|e| load_err(e.to_string()))?
        .commit_from_file(path)
        .map_err(|e| load_err(format!("{}: {e}", path.display())))?;
    info!("ONNX model loaded");
    Ok(session)
}

/// A committed ONNX Runtime session. `run` needs exclusive access, so
/// inference is serialised through the mutex.
struct OnnxModel {
    session: Arc<Mutex<Session>>,
}

#[async_trait]
impl SegmentationModel for OnnxModel {
    async fn segment(
        &self,
        image: &RgbaImage,
        options: &SegmentOptions,
    ) -> Result<Mask, SegmentationError> {
        let (width, height) = image.dimensions();
        let (in_w, in_h) = options.internal_resolution.model_input_size(width, height);
        let tensor = to_nchw(image, in_w, in_h);
        debug!("Model input {}x{} for {}x{} image", in_w, in_h, width, height);

        let session = Arc::clone(&self.session);
        let (matte, out_w, out_h) = tokio::task::spawn_blocking(move || run_session(&session, tensor))
            .await
            .map_err(|e| SegmentationError::InferenceFailed {
                detail: format!("inference task panicked: {e}"),
            })??;

        let probabilities = resize_matte(&matte, out_w, out_h, width, height);
        Mask::from_probabilities(width, height, &probabilities, options.segmentation_threshold)
            .ok_or_else(|| SegmentationError::InferenceFailed {
                detail: "matte does not cover the image".to_string(),
            })
    }
}

fn run_session(
    session: &Mutex<Session>,
    input: Array4<f32>,
) -> Result<(Vec<f32>, u32, u32), SegmentationError> {
    let infer_err = |detail: String| SegmentationError::InferenceFailed { detail };

    let tensor = Tensor::from_array(input).map_err(|e| infer_err(e.to_string()))?;
    let mut session = session
        .lock()
        .map_err(|_| infer_err("session lock poisoned".to_string()))?;
    let outputs = session
        .run(ort::inputs![tensor])
        .map_err(|e| infer_err(e.to_string()))?;

    let matte = outputs[0]
        .try_extract_array::<f32>()
        .map_err(|e| infer_err(e.to_string()))?;
    let shape = matte.shape();
    if shape.len() < 2 {
        return Err(infer_err(format!("unexpected matte shape {shape:?}")));
    }
    let out_h = shape[shape.len() - 2];
    let out_w = shape[shape.len() - 1];
    let values: Vec<f32> = matte.iter().take(out_w * out_h).copied().collect();
    if values.len() != out_w * out_h {
        return Err(infer_err(format!("matte has {} values for {out_w}x{out_h}", values.len())));
    }

    Ok((values, out_w as u32, out_h as u32))
}

/// RGB channels of `image`, resized to `width × height`, as a `[1, 3, H, W]`
/// tensor in `[0, 1]`. Alpha is ignored.
pub fn to_nchw(image: &RgbaImage, width: u32, height: u32) -> Array4<f32> {
    let resized;
    let source = if image.dimensions() == (width, height) {
        image
    } else {
        resized = imageops::resize(image, width, height, imageops::FilterType::Triangle);
        &resized
    };

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in source.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            tensor[[0, c, y, x]] = pixel[c] as f32 / 255.0;
        }
    }
    tensor
}

/// Resize a row-major matte to the target size. Values are clamped to
/// `[0, 1]`.
pub fn resize_matte(
    matte: &[f32],
    matte_width: u32,
    matte_height: u32,
    target_width: u32,
    target_height: u32,
) -> Vec<f32> {
    if (matte_width, matte_height) == (target_width, target_height) {
        return matte.iter().map(|v| v.clamp(0.0, 1.0)).collect();
    }

    let gray = GrayImage::from_fn(matte_width, matte_height, |x, y| {
        let idx = (y * matte_width + x) as usize;
        Luma([(matte[idx] * 255.0).round().clamp(0.0, 255.0) as u8])
    });
    let resized = imageops::resize(
        &gray,
        target_width,
        target_height,
        imageops::FilterType::Lanczos3,
    );
    resized.pixels().map(|p| p[0] as f32 / 255.0).collect()
}
