// ============================================================
// Layer 4 — Spectral Band Powers
// ============================================================
// Reduces a raw EEG waveform to one power value per frequency
// band. Bands are delimited by consecutive cutoffs, so the
// default cutoffs 0.5, 4, 7, 12, 30 Hz give four bands:
//
//   delta [0.5, 4)  theta [4, 7)  alpha [7, 12)  beta [12, 30)
//
// The signal is Hann-windowed and zero-padded to the next power
// of two before the FFT.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CUTOFFS: [f64; 5] = [0.5, 4.0, 7.0, 12.0, 30.0];
pub const DEFAULT_SAMPLING_RATE: f64 = 512.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralConfig {
    pub sampling_rate: f64,
    pub cutoffs:       Vec<f64>,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            sampling_rate: DEFAULT_SAMPLING_RATE,
            cutoffs:       DEFAULT_CUTOFFS.to_vec(),
        }
    }
}

impl SpectralConfig {
    pub fn num_bands(&self) -> usize {
        self.cutoffs.len().saturating_sub(1)
    }

    /// Names for the default four bands, generic labels otherwise.
    pub fn band_names(&self) -> Vec<String> {
        if self.cutoffs == DEFAULT_CUTOFFS {
            return ["delta", "theta", "alpha", "beta"].map(String::from).to_vec();
        }
        self.cutoffs
            .windows(2)
            .map(|w| format!("{}-{}Hz", w[0], w[1]))
            .collect()
    }
}

pub struct SpectralAnalyzer {
    config:  SpectralConfig,
    planner: FftPlanner<f64>,
}

impl SpectralAnalyzer {
    pub fn new(config: SpectralConfig) -> Self {
        Self { config, planner: FftPlanner::new() }
    }

    /// Power per band for one epoch's raw samples.
    pub fn band_powers(&mut self, samples: &[f64]) -> Vec<f32> {
        let n_bands = self.config.num_bands();
        if samples.len() < 2 {
            return vec![0.0; n_bands];
        }

        let fft_size = samples.len().next_power_of_two();
        let window   = hann_window(samples.len());

        let mut buffer: Vec<Complex<f64>> = samples
            .iter()
            .zip(&window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        buffer.resize(fft_size, Complex::new(0.0, 0.0));

        let fft = self.planner.plan_fft_forward(fft_size);
        fft.process(&mut buffer);

        // Positive frequencies only
        let n_freqs  = fft_size / 2 + 1;
        let norm     = 1.0 / (fft_size as f64).powi(2);
        let freq_res = self.config.sampling_rate / fft_size as f64;

        let mut powers = vec![0.0f64; n_bands];
        for (bin, c) in buffer[..n_freqs].iter().enumerate() {
            let freq = bin as f64 * freq_res;
            if let Some(band) = self.band_of(freq) {
                powers[band] += (c.re * c.re + c.im * c.im) * norm;
            }
        }

        powers.into_iter().map(|p| p as f32).collect()
    }

    fn band_of(&self, freq: f64) -> Option<usize> {
        self.config
            .cutoffs
            .windows(2)
            .position(|w| freq >= w[0] && freq < w[1])
    }
}

fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / rate).sin())
            .collect()
    }

    #[test]
    fn test_alpha_sine_lands_in_alpha_band() {
        let mut a = SpectralAnalyzer::new(SpectralConfig::default());
        let p = a.band_powers(&sine(10.0, 512.0, 512));
        assert_eq!(p.len(), 4);
        let total: f32 = p.iter().sum();
        // index 2 = alpha [7, 12)
        assert!(p[2] > total * 0.8, "powers = {p:?}");
    }

    #[test]
    fn test_short_signal_gives_zero_vector() {
        let mut a = SpectralAnalyzer::new(SpectralConfig::default());
        assert_eq!(a.band_powers(&[]), vec![0.0; 4]);
        assert_eq!(a.band_powers(&[1.0]), vec![0.0; 4]);
    }

    #[test]
    fn test_band_names() {
        assert_eq!(SpectralConfig::default().band_names()[0], "delta");
        let custom = SpectralConfig { sampling_rate: 256.0, cutoffs: vec![1.0, 2.0, 3.0] };
        assert_eq!(custom.band_names(), vec!["1-2Hz", "2-3Hz"]);
    }
}
