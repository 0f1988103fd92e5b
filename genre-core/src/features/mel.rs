//! Mel power spectrogram.
//!
//! Frames are centred: the chunk is padded with `n_fft / 2` zeros on both
//! sides, giving `1 + len / hop` frames. Output shape is `(n_mels, frames)`.

use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::MelConfig;
use crate::error::{GenreError, Result};

/// Mel filterbank plus FFT plan for one sample rate.
pub struct MelSpectrogram {
    config: MelConfig,
    sample_rate: u32,
    window: Vec<f32>,
    /// `(n_mels, n_fft / 2 + 1)`
    filters: Array2<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for MelSpectrogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MelSpectrogram")
            .field("config", &self.config)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

impl MelSpectrogram {
    /// # Errors
    /// Returns `GenreError::FeatureExtraction` for degenerate settings
    /// (zero hop, odd or tiny FFT, empty band range).
    pub fn new(config: &MelConfig, sample_rate: u32) -> Result<Self> {
        if config.n_fft < 2 || config.n_fft % 2 != 0 {
            return Err(GenreError::FeatureExtraction(format!(
                "n_fft must be even and >= 2, got {}",
                config.n_fft
            )));
        }
        if config.hop_length == 0 || config.n_mels == 0 {
            return Err(GenreError::FeatureExtraction(
                "hop length and mel band count must be non-zero".into(),
            ));
        }
        if sample_rate == 0 {
            return Err(GenreError::FeatureExtraction("sample rate is zero".into()));
        }
        let nyquist = sample_rate as f32 / 2.0;
        let fmax = config.fmax.unwrap_or(nyquist).min(nyquist);
        if fmax <= config.fmin {
            return Err(GenreError::FeatureExtraction(format!(
                "empty mel range: fmin={} fmax={}",
                config.fmin, fmax
            )));
        }

        let filters = build_mel_filters(
            config.n_fft,
            sample_rate,
            config.n_mels,
            config.fmin,
            fmax,
        );
        let fft = FftPlanner::<f32>::new().plan_fft_forward(config.n_fft);

        Ok(Self {
            config: config.clone(),
            sample_rate,
            window: build_hann_window(config.n_fft),
            filters,
            fft,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn n_mels(&self) -> usize {
        self.config.n_mels
    }

    /// Number of frames produced for `len` input samples.
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.config.hop_length
    }

    /// Compute the `(n_mels, frames)` mel power spectrogram of `samples`.
    pub fn compute(&self, samples: &[f32]) -> Array2<f32> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let pad = n_fft / 2;
        let n_freqs = n_fft / 2 + 1;
        let frames = self.frame_count(samples.len());

        let mut power = Array2::<f32>::zeros((n_freqs, frames));
        let mut fft_buf = vec![Complex::new(0.0f32, 0.0); n_fft];

        for frame in 0..frames {
            let start = frame * hop;
            for (i, slot) in fft_buf.iter_mut().enumerate() {
                // Position in the unpadded signal; outside it the padding is zero.
                let s = (start + i)
                    .checked_sub(pad)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex::new(s * self.window[i], 0.0);
            }
            self.fft.process(&mut fft_buf);

            for k in 0..n_freqs {
                power[[k, frame]] = fft_buf[k].norm_sqr();
            }
        }

        self.filters.dot(&power)
    }
}

fn build_hann_window(n: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Band edges in Hz: `n_mels + 2` points evenly spaced on the Slaney mel scale.
fn mel_band_edges(n_mels: usize, fmin: f32, fmax: f32) -> Vec<f32> {
    let mel_min = hz_to_mel_slaney(fmin);
    let mel_max = hz_to_mel_slaney(fmax);
    (0..=(n_mels + 1))
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32)
        .map(mel_to_hz_slaney)
        .collect()
}

fn build_mel_filters(fft_size: usize, sr: u32, n_mels: usize, fmin: f32, fmax: f32) -> Array2<f32> {
    let n_freqs = fft_size / 2 + 1;
    let hz_pts = mel_band_edges(n_mels, fmin, fmax);
    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|k| k as f32 * sr as f32 / fft_size as f32)
        .collect();

    let mut filters = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let lower = hz_pts[m];
        let center = hz_pts[m + 1];
        let upper = hz_pts[m + 2];
        let down_denom = (center - lower).max(1e-10);
        let up_denom = (upper - center).max(1e-10);
        // Slaney normalisation: constant energy per band.
        let enorm = 2.0 / (upper - lower).max(1e-10);

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let w = if freq >= lower && freq <= center {
                (freq - lower) / down_denom
            } else if freq > center && freq <= upper {
                (upper - freq) / up_denom
            } else {
                0.0
            };
            filters[[m, k]] = (w * enorm).max(0.0);
        }
    }
    filters
}

fn hz_to_mel_slaney(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1_000.0;
    let min_log_mel = min_log_hz / f_sp; // 15
    let logstep = (6.4_f32).ln() / 27.0;
    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

fn mel_to_hz_slaney(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1_000.0;
    let min_log_mel = min_log_hz / f_sp; // 15
    let logstep = (6.4_f32).ln() / 27.0;
    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * f_sp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Axis;

    const SR: u32 = 22_050;

    fn sine(freq: f32, secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (SR as f32 * secs) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
            .collect()
    }

    #[test]
    fn slaney_scale_is_linear_below_1khz() {
        assert_relative_eq!(hz_to_mel_slaney(1_000.0), 15.0, epsilon = 1e-4);
        assert_relative_eq!(hz_to_mel_slaney(500.0), 7.5, epsilon = 1e-4);
        assert_relative_eq!(mel_to_hz_slaney(hz_to_mel_slaney(4_321.0)), 4_321.0, max_relative = 1e-4);
    }

    #[test]
    fn output_shape_follows_centered_framing() {
        let mel = MelSpectrogram::new(&MelConfig::default(), SR).unwrap();
        let chunk = vec![0.0f32; 4 * SR as usize];
        let spec = mel.compute(&chunk);
        assert_eq!(spec.dim(), (128, 1 + 88_200 / 512));
        assert_eq!(mel.frame_count(88_200), 173);
    }

    #[test]
    fn silence_has_zero_energy() {
        let mel = MelSpectrogram::new(&MelConfig::default(), SR).unwrap();
        let spec = mel.compute(&vec![0.0f32; 8_192]);
        assert!(spec.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn filters_are_non_negative_and_bounded_by_nyquist() {
        let filters = build_mel_filters(2_048, SR, 128, 0.0, SR as f32 / 2.0);
        assert_eq!(filters.dim(), (128, 1_025));
        assert!(filters.iter().all(|&w| w >= 0.0));
        assert!(filters.row(127).sum() > 0.0);
    }

    #[test]
    fn filter_row_sums_match_librosa_slaney() {
        // librosa.filters.mel(sr=22050, n_fft=2048) (n_mels=128, htk=False, norm="slaney")
        let reference = [
            (0usize, 0.090_345_882_f32),
            (1, 0.093_373_882),
            (10, 0.091_041_121),
            (40, 0.090_865_378),
            (64, 0.092_800_487),
            (100, 0.092_914_506),
            (127, 0.092_869_242),
        ];
        let filters = build_mel_filters(2_048, SR, 128, 0.0, SR as f32 / 2.0);
        for (row, expected) in reference {
            assert_relative_eq!(filters.row(row).sum(), expected, max_relative = 1e-3);
        }
        assert_relative_eq!(filters.sum(), 11.886_681, max_relative = 1e-3);
    }

    #[test]
    fn sine_energy_lands_in_matching_band() {
        let mel = MelSpectrogram::new(&MelConfig::default(), SR).unwrap();
        let spec = mel.compute(&sine(1_000.0, 1.0, 0.5));
        let band_energy = spec.sum_axis(Axis(1));
        let peak = band_energy
            .iter()
            .enumerate()
            .fold((0usize, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });

        let edges = mel_band_edges(128, 0.0, SR as f32 / 2.0);
        let center = edges[peak.0 + 1];
        assert!(
            (center - 1_000.0).abs() < 100.0,
            "peak band centre {center} Hz too far from 1 kHz"
        );
    }

    #[test]
    fn louder_input_means_more_energy() {
        let mel = MelSpectrogram::new(&MelConfig::default(), SR).unwrap();
        let quiet = mel.compute(&sine(440.0, 0.5, 0.1)).sum();
        let loud = mel.compute(&sine(440.0, 0.5, 0.2)).sum();
        // Power scales with amplitude squared.
        assert_relative_eq!(loud / quiet, 4.0, max_relative = 1e-3);
    }

    #[test]
    fn degenerate_config_rejected() {
        let mut cfg = MelConfig::default();
        cfg.hop_length = 0;
        assert!(MelSpectrogram::new(&cfg, SR).is_err());

        let mut cfg = MelConfig::default();
        cfg.n_fft = 1_023;
        assert!(MelSpectrogram::new(&cfg, SR).is_err());

        let mut cfg = MelConfig::default();
        cfg.fmin = 20_000.0;
        assert!(MelSpectrogram::new(&cfg, SR).is_err());
    }
}
