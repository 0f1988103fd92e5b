//! `StubModel`: placeholder backend that needs no model file.
//!
//! Scores each image by its mean energy: silent chunks vote for one genre,
//! anything audible for another. Deterministic, so the whole upload →
//! features → aggregation path can be exercised without ONNX Runtime.

use ndarray::{Array2, Array4, Axis};
use tracing::debug;

use crate::error::{GenreError, Result};
use crate::inference::GenreModel;
use crate::prediction::Genre;

/// Probability mass given to the chosen label; the rest is spread evenly.
const PEAK: f32 = 0.9;

/// Energy-threshold stub model.
#[derive(Debug, Clone)]
pub struct StubModel {
    quiet: Genre,
    loud: Genre,
    threshold: f32,
}

impl StubModel {
    pub fn new(quiet: Genre, loud: Genre, threshold: f32) -> Self {
        Self {
            quiet,
            loud,
            threshold,
        }
    }

    fn row_for(&self, genre: Genre) -> [f32; Genre::COUNT] {
        let rest = (1.0 - PEAK) / (Genre::COUNT - 1) as f32;
        let mut row = [rest; Genre::COUNT];
        row[genre.index()] = PEAK;
        row
    }
}

impl Default for StubModel {
    fn default() -> Self {
        Self::new(Genre::Blues, Genre::Classical, 1e-6)
    }
}

impl GenreModel for StubModel {
    fn warm_up(&self) -> Result<()> {
        debug!("StubModel::warm_up: no-op");
        Ok(())
    }

    fn predict(&self, batch: Array4<f32>) -> Result<Array2<f32>> {
        let chunks = batch.len_of(Axis(0));
        let mut out = Array2::<f32>::zeros((chunks, Genre::COUNT));
        for (i, image) in batch.axis_iter(Axis(0)).enumerate() {
            let energy = image
                .mean()
                .ok_or_else(|| GenreError::Inference("empty spectrogram image".into()))?;
            let genre = if energy > self.threshold {
                self.loud
            } else {
                self.quiet
            };
            out.row_mut(i).assign(&ndarray::arr1(&self.row_for(genre)));
        }
        Ok(out)
    }

    fn describe(&self) -> String {
        format!("stub (quiet={}, loud={})", self.quiet, self.loud)
    }
}
