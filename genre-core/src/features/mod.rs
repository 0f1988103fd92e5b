//! Chunk → model input conversion.
//!
//! ## Mel spectrogram parameters (must match training)
//!
//! | Parameter       | Value                     |
//! |-----------------|---------------------------|
//! | Hann window     | 2048 samples (periodic)   |
//! | FFT size        | 2048                      |
//! | Frequency bins  | 1025 (2048/2+1)           |
//! | Hop length      | 512                       |
//! | Padding         | 1024 zeros each side      |
//! | Mel bands       | 128 (Slaney scale + norm) |
//! | Mel range       | 0 Hz – sr/2               |
//! | Scaling         | power (|X|²), no log      |
//!
//! Each mel image is then resized bilinearly to 150×150 with half-pixel
//! centres and stored with a trailing channel axis.

pub mod mel;
pub mod resize;

pub use mel::MelSpectrogram;
pub use resize::resize_bilinear;

/// Short-time mel transform settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MelConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub fmin: f32,
    /// Upper band edge in Hz. `None` means Nyquist of the signal.
    pub fmax: Option<f32>,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            n_fft: 2_048,
            hop_length: 512,
            n_mels: 128,
            fmin: 0.0,
            fmax: None,
        }
    }
}
