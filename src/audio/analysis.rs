//! Deterministic per-frame spectrum analysis over already-mixed PCM.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Default analysis window length in samples.
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Analyzer tuning. The dB range maps magnitudes onto `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// FFT window length in samples (power of two).
    pub fft_size: usize,
    /// Magnitude (dBFS) mapped to 0.0.
    pub min_db: f32,
    /// Magnitude (dBFS) mapped to 1.0.
    pub max_db: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

impl SpectrumConfig {
    /// Validate window size and dB range.
    pub fn validate(&self) -> crate::VibeResult<()> {
        if self.fft_size < 64 || !self.fft_size.is_power_of_two() {
            return Err(crate::VibeError::validation(
                "spectrum fft_size must be a power of two >= 64",
            ));
        }
        if !(self.min_db.is_finite() && self.max_db.is_finite()) || self.min_db >= self.max_db {
            return Err(crate::VibeError::validation(
                "spectrum min_db must be < max_db",
            ));
        }
        Ok(())
    }
}

/// Windowed FFT producing normalized magnitudes, one value per frequency bin.
///
/// Stateless between calls (no temporal smoothing), so analyzing a window twice yields the
/// same result regardless of what was analyzed before. Shareable across threads.
pub struct SpectrumAnalyzer {
    cfg: SpectrumConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("cfg", &self.cfg)
            .finish()
    }
}

impl SpectrumAnalyzer {
    /// Plan the FFT and precompute the Blackman window.
    pub fn new(cfg: SpectrumConfig) -> Self {
        let n = cfg.fft_size.max(2);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n);
        let window = blackman_window(n);
        Self { cfg, fft, window }
    }

    /// Window length in samples.
    pub fn fft_size(&self) -> usize {
        self.window.len()
    }

    /// Number of magnitude bins produced by [`SpectrumAnalyzer::analyze`].
    pub fn bin_count(&self) -> usize {
        self.window.len() / 2
    }

    /// Analyze the most recent `fft_size` samples of `mono`.
    ///
    /// Shorter input is treated as preceded by silence.
    pub fn analyze(&self, mono: &[f32]) -> Vec<f32> {
        let n = self.window.len();
        let take = mono.len().min(n);
        let pad = n - take;
        let tail = &mono[mono.len() - take..];

        let mut buf: Vec<Complex<f32>> = Vec::with_capacity(n);
        buf.extend((0..pad).map(|_| Complex::new(0.0, 0.0)));
        buf.extend(
            tail.iter()
                .zip(&self.window[pad..])
                .map(|(s, w)| Complex::new(s * w, 0.0)),
        );
        self.fft.process(&mut buf);

        let range = self.cfg.max_db - self.cfg.min_db;
        let scale = 1.0 / n as f32;
        buf[..self.bin_count()]
            .iter()
            .map(|c| {
                let mag = c.norm() * scale;
                if mag <= 0.0 {
                    return 0.0;
                }
                let db = 20.0 * mag.log10();
                ((db - self.cfg.min_db) / range).clamp(0.0, 1.0)
            })
            .collect()
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    let denom = n as f64;
    (0..n)
        .map(|i| {
            let x = std::f64::consts::TAU * i as f64 / denom;
            (0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()) as f32
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/audio/analysis.rs"]
mod tests;
