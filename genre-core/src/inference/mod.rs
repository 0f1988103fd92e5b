//! Genre model abstraction.
//!
//! The `GenreModel` trait decouples the pipeline from any specific backend
//! (stub, ONNX Runtime, ...).
//!
//! Prediction takes `&self`: one loaded model serves every request. Backends
//! whose runtime needs exclusive access during a forward pass serialise it
//! internally, so callers only ever hold an immutable handle.

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::{OnnxGenreModel, OnnxModelConfig};

use std::sync::Arc;

use ndarray::{Array2, Array4};

use crate::error::Result;

/// Contract for genre classification backends.
pub trait GenreModel: Send + Sync + 'static {
    /// Run one dummy forward pass so the first real request doesn't pay for
    /// lazy allocation. Called once at startup.
    ///
    /// # Errors
    /// Returns an error if the backend cannot execute at all.
    fn warm_up(&self) -> Result<()>;

    /// Classify a batch of spectrogram images.
    ///
    /// # Parameters
    /// - `batch`: `[chunks, height, width, 1]` mel images.
    ///
    /// # Returns
    /// `[chunks, labels]` scores, one row per input image.
    fn predict(&self, batch: Array4<f32>) -> Result<Array2<f32>>;

    /// Short human-readable description for health reporting.
    fn describe(&self) -> String;
}

/// Thread-safe reference-counted handle to any `GenreModel` implementor.
#[derive(Clone)]
pub struct ModelHandle(pub Arc<dyn GenreModel>);

impl ModelHandle {
    /// Wrap any `GenreModel` in a `ModelHandle`.
    pub fn new<M: GenreModel>(model: M) -> Self {
        Self(Arc::new(model))
    }
}

impl std::ops::Deref for ModelHandle {
    type Target = dyn GenreModel;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.0.describe())
            .finish()
    }
}
