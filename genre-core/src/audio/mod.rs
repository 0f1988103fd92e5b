//! Decoded audio representation.
//!
//! Uploads are decoded once into an [`AudioSignal`]: mono `f32` samples at the
//! file's native sample rate. Nothing downstream resamples; the chunk
//! arithmetic is expressed in whole seconds of the native rate.

pub mod decode;

pub use decode::{decode_bytes, decode_file};

use crate::error::{GenreError, Result};

/// Lowest sample rate accepted from a decoded header.
pub const MIN_SAMPLE_RATE: u32 = 1_000;
/// Highest sample rate accepted from a decoded header.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Mono PCM samples at a known sample rate.
///
/// Immutable once constructed; consumers borrow [`AudioSignal::samples`].
#[derive(Debug, Clone)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    /// Wrap already-mono samples.
    ///
    /// # Errors
    /// Returns `GenreError::Decode` when `sample_rate` is outside
    /// [`MIN_SAMPLE_RATE`]..=[`MAX_SAMPLE_RATE`]. Chunk buffers are sized from
    /// the rate, so a forged header must not reach them.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(GenreError::Decode(format!(
                "unsupported sample rate {sample_rate} Hz (expected {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE})"
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Build a mono signal from interleaved frames by averaging channels.
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(GenreError::Decode("stream reports zero channels".into()));
        }
        if channels == 1 {
            return Self::new(interleaved.to_vec(), sample_rate);
        }
        let scale = 1.0 / channels as f32;
        let samples = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect();
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the duration of this signal in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
