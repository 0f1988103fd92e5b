//! Label set and chunk-prediction aggregation.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{GenreError, Result};

/// The genres the model was trained on. Declaration order is the model's
/// output index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Blues,
    Classical,
    Country,
    Disco,
    Hiphop,
    Jazz,
}

impl Genre {
    /// All labels, indexed by model output position.
    pub const ALL: [Genre; 6] = [
        Genre::Blues,
        Genre::Classical,
        Genre::Country,
        Genre::Disco,
        Genre::Hiphop,
        Genre::Jazz,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Genre::Blues => "blues",
            Genre::Classical => "classical",
            Genre::Country => "country",
            Genre::Disco => "disco",
            Genre::Hiphop => "hiphop",
            Genre::Jazz => "jazz",
        }
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = GenreError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| GenreError::UnknownLabel(s.to_string()))
    }
}

/// Final result for one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenrePrediction {
    pub genre: Genre,
    /// Mean probability of `genre`, rounded to 3 decimals, in [0, 1].
    pub confidence: f64,
    /// Mean probability per label, in `Genre::ALL` order.
    pub probabilities: Vec<f32>,
    pub chunk_count: usize,
}

impl GenrePrediction {
    /// Average per-chunk distributions (`[chunks, labels]`) and pick the argmax.
    ///
    /// Ties resolve to the lowest index.
    ///
    /// # Errors
    /// Returns `GenreError::Inference` for an empty batch or a label count
    /// other than [`Genre::COUNT`].
    pub fn from_chunk_predictions(predictions: ArrayView2<'_, f32>) -> Result<Self> {
        let (chunks, labels) = predictions.dim();
        if labels != Genre::COUNT {
            return Err(GenreError::Inference(format!(
                "model produced {labels} classes, expected {}",
                Genre::COUNT
            )));
        }
        let mean = predictions
            .mean_axis(Axis(0))
            .ok_or_else(|| GenreError::Inference("model returned no predictions".into()))?;

        let (best, best_p) = mean
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |(bi, bp), (i, &p)| {
                if p > bp {
                    (i, p)
                } else {
                    (bi, bp)
                }
            });
        let genre = Genre::from_index(best)
            .ok_or_else(|| GenreError::Inference(format!("class index {best} out of range")))?;

        Ok(Self {
            genre,
            confidence: round_confidence(best_p),
            probabilities: mean.to_vec(),
            chunk_count: chunks,
        })
    }
}

/// Clamp to [0, 1] and round to 3 decimals.
pub fn round_confidence(p: f32) -> f64 {
    let p = if p.is_finite() { p as f64 } else { 0.0 };
    (p.clamp(0.0, 1.0) * 1_000.0).round() / 1_000.0
}

/// Turn raw model rows into probability distributions.
///
/// Rows that already look like distributions are kept; anything with a
/// negative entry or a sum off by more than 1e-3 is soft-maxed.
///
/// # Errors
/// Returns `GenreError::Inference` if the model emitted NaN or infinity.
pub fn to_probabilities(mut raw: Array2<f32>) -> Result<Array2<f32>> {
    if raw.iter().any(|v| !v.is_finite()) {
        return Err(GenreError::Inference(
            "model output contains non-finite values".into(),
        ));
    }
    for mut row in raw.rows_mut() {
        let sum: f32 = row.sum();
        let is_distribution = row.iter().all(|&v| v >= 0.0) && (sum - 1.0).abs() <= 1e-3;
        if is_distribution {
            continue;
        }
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let total: f32 = row.sum();
        row.mapv_inplace(|v| v / total);
    }
    Ok(raw)
}
