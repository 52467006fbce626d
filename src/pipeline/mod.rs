//! Pipeline stages for background removal.
//!
//! Each submodule implements one step of the per-image path. The batch
//! packager in [`crate::batch`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ decode ──▶ mask ──────────▶ encode ──▶ archive
//! (bytes)   (RGBA)     (segmentation    (PNG)      (ZIP)
//!                       or fallback)
//! ```
//!
//! 1. [`input`]: filename, declared MIME type and bytes; stem extraction
//! 2. [`decode`]: bytes to an RGBA buffer; runs in `spawn_blocking`
//! 3. [`mask`]: binary foreground mask and its application to alpha
//! 4. [`fallback`]: colour-tolerance mask keyed on the top-left pixel
//! 5. [`encode`]: RGBA buffer to PNG; runs in `spawn_blocking`
//! 6. [`archive`]: ordered, uniquely named entries in an in-memory ZIP
//!
//! With the `onnx` feature, [`onnx`] provides a segmentation backend built
//! on ONNX Runtime.

pub mod archive;
pub mod decode;
pub mod encode;
pub mod fallback;
pub mod input;
pub mod mask;
#[cfg(feature = "onnx")]
pub mod onnx;
