//! `GenreClassifier`: decode → chunk → mel → resize → batch → predict → aggregate.
//!
//! ## Lifecycle
//!
//! ```text
//! ModelHandle::new(model)     → weights loaded once, shared read-only
//!     └─► GenreClassifier::new(handle, config)
//!         └─► warm_up()       → one dummy forward pass
//!             └─► classify_*  → any number of independent calls, any thread
//! ```
//!
//! Every call owns its signal, chunk views and batch; the only shared state is
//! the model handle.

use std::path::Path;
use std::time::Instant;

use ndarray::{Array4, Axis};
use tracing::{debug, info};

use crate::{
    audio::{self, AudioSignal},
    buffering::ChunkPlan,
    error::{GenreError, Result},
    features::{resize_bilinear, MelConfig, MelSpectrogram},
    inference::ModelHandle,
    prediction::{to_probabilities, GenrePrediction},
};

/// Configuration for `GenreClassifier`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Window length in seconds. Default: 4.
    pub chunk_secs: u32,
    /// Seconds shared by consecutive windows. Default: 2.
    pub overlap_secs: u32,
    /// Mel frontend. Defaults mirror the training features.
    pub mel: MelConfig,
    /// Model input `(height, width)`. Default: (150, 150).
    pub target_size: (usize, usize),
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_secs: 4,
            overlap_secs: 2,
            mel: MelConfig::default(),
            target_size: (150, 150),
        }
    }
}

impl PipelineConfig {
    /// # Errors
    /// Returns `GenreError::InvalidConfig` when the window arithmetic or the
    /// target shape is degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_secs == 0 {
            return Err(GenreError::InvalidConfig("chunk_secs must be > 0".into()));
        }
        if self.overlap_secs >= self.chunk_secs {
            return Err(GenreError::InvalidConfig(format!(
                "overlap_secs ({}) must be < chunk_secs ({})",
                self.overlap_secs, self.chunk_secs
            )));
        }
        if self.target_size.0 == 0 || self.target_size.1 == 0 {
            return Err(GenreError::InvalidConfig("target size must be non-zero".into()));
        }
        if self.mel.n_fft == 0 || self.mel.hop_length == 0 || self.mel.n_mels == 0 {
            return Err(GenreError::InvalidConfig("mel parameters must be non-zero".into()));
        }
        Ok(())
    }
}

/// Shared, cloneable entry point for classification.
#[derive(Debug, Clone)]
pub struct GenreClassifier {
    config: PipelineConfig,
    model: ModelHandle,
}

impl GenreClassifier {
    /// # Errors
    /// Returns `GenreError::InvalidConfig` if `config` fails validation.
    pub fn new(model: ModelHandle, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, model })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn warm_up(&self) -> Result<()> {
        let started = Instant::now();
        self.model.warm_up()?;
        info!(
            model = %self.model.describe(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model warm-up complete"
        );
        Ok(())
    }

    /// Classify an audio file on disk.
    pub fn classify_file(&self, path: &Path) -> Result<GenrePrediction> {
        let signal = audio::decode_file(path)?;
        self.classify_signal(&signal)
    }

    /// Classify an in-memory audio file. `extension` is a format hint such as
    /// `"mp3"`.
    pub fn classify_bytes(&self, data: &[u8], extension: Option<&str>) -> Result<GenrePrediction> {
        let signal = audio::decode_bytes(data, extension)?;
        self.classify_signal(&signal)
    }

    /// Classify a decoded signal.
    pub fn classify_signal(&self, signal: &AudioSignal) -> Result<GenrePrediction> {
        let started = Instant::now();
        let batch = self.build_batch(signal)?;
        let chunks = batch.dim().0;
        let features_ms = started.elapsed().as_millis() as u64;

        let raw = self.model.predict(batch)?;
        if raw.nrows() != chunks {
            return Err(GenreError::Inference(format!(
                "model returned {} rows for {chunks} chunks",
                raw.nrows()
            )));
        }
        let probabilities = to_probabilities(raw)?;
        let prediction = GenrePrediction::from_chunk_predictions(probabilities.view())?;

        info!(
            genre = %prediction.genre,
            confidence = prediction.confidence,
            chunks,
            duration_secs = signal.duration_secs(),
            features_ms,
            total_ms = started.elapsed().as_millis() as u64,
            "classified audio"
        );
        Ok(prediction)
    }

    /// Chunk `signal` and stack the resized mel images into
    /// `[chunks, height, width, 1]`.
    pub fn build_batch(&self, signal: &AudioSignal) -> Result<Array4<f32>> {
        let plan = ChunkPlan::new(
            signal.len(),
            signal.sample_rate(),
            self.config.chunk_secs,
            self.config.overlap_secs,
        )?;
        let mel = MelSpectrogram::new(&self.config.mel, signal.sample_rate())?;
        let (height, width) = self.config.target_size;

        debug!(
            chunks = plan.count(),
            chunk_len = plan.chunk_len(),
            stride = plan.stride(),
            padded = plan.needs_padding(),
            "chunk plan"
        );

        let mut batch = Array4::<f32>::zeros((plan.count(), height, width, 1));
        for chunk in plan.chunks(signal.samples()) {
            let spectrogram = mel.compute(&chunk.samples);
            let image = resize_bilinear(spectrogram.view(), height, width)?;
            batch
                .index_axis_mut(Axis(0), chunk.index)
                .index_axis_move(Axis(2), 0)
                .assign(&image);
            debug!(
                index = chunk.index,
                start = chunk.start,
                samples = chunk.samples.len(),
                frames = spectrogram.ncols(),
                "chunk features"
            );
        }
        Ok(batch)
    }
}
