//! Attack/decay envelope follower turning frequency magnitudes into smooth band intensities.

/// Number of output bands tracked by [`FrequencyEnvelope`].
pub const BAND_COUNT: usize = 32;

/// Base of the exponential band -> bin mapping (`bin = floor(BIN_BASE^(band + BIN_OFFSET))`).
const BIN_BASE: f32 = 1.18;
const BIN_OFFSET: i32 = 5;

/// Tuning for [`FrequencyEnvelope`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Blend coefficient when the target rises above the current value.
    pub attack: f32,
    /// Blend coefficient when the target falls below the current value.
    pub decay: f32,
    /// Gain applied to each band target before smoothing. Targets are not clamped afterwards.
    pub gain: f32,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            attack: 0.6,
            decay: 0.12,
            gain: 1.3,
        }
    }
}

impl EnvelopeConfig {
    /// Validate coefficient ranges.
    pub fn validate(&self) -> crate::VibeResult<()> {
        for (name, v) in [("attack", self.attack), ("decay", self.decay)] {
            if !v.is_finite() || v <= 0.0 || v > 1.0 {
                return Err(crate::VibeError::validation(format!(
                    "envelope {name} must be in (0, 1]"
                )));
            }
        }
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(crate::VibeError::validation(
                "envelope gain must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// Smoothed per-band intensities, nominally in `[0, 1]` (can reach `gain` on full-scale input).
pub type EnvelopeState = [f32; BAND_COUNT];

/// Stateful envelope follower.
///
/// Must be driven with frames in increasing time order. There is no way to replay from an
/// earlier time: after a seek call [`FrequencyEnvelope::reset`], which produces a short fade-in.
#[derive(Clone, Debug)]
pub struct FrequencyEnvelope {
    cfg: EnvelopeConfig,
    state: EnvelopeState,
}

impl Default for FrequencyEnvelope {
    fn default() -> Self {
        Self::new(EnvelopeConfig::default())
    }
}

impl FrequencyEnvelope {
    /// Create a silent envelope.
    pub fn new(cfg: EnvelopeConfig) -> Self {
        Self {
            cfg,
            state: [0.0; BAND_COUNT],
        }
    }

    /// Current band values.
    pub fn state(&self) -> &EnvelopeState {
        &self.state
    }

    /// Zero every band.
    pub fn reset(&mut self) {
        self.state = [0.0; BAND_COUNT];
    }

    /// Advance one frame using normalized magnitudes in `[0, 1]`.
    pub fn update(&mut self, magnitudes: &[f32]) -> &EnvelopeState {
        self.update_with(magnitudes.len(), |i| magnitudes[i], 1.0)
    }

    /// Advance one frame using byte magnitudes in `0..=255`.
    pub fn update_u8(&mut self, magnitudes: &[u8]) -> &EnvelopeState {
        self.update_with(magnitudes.len(), |i| f32::from(magnitudes[i]), 255.0)
    }

    fn update_with(
        &mut self,
        len: usize,
        at: impl Fn(usize) -> f32,
        full_scale: f32,
    ) -> &EnvelopeState {
        let sample = |i: usize| if i < len { at(i) } else { 0.0 };
        for (band, current) in self.state.iter_mut().enumerate() {
            let bin = source_bin(band);
            let avg = (sample(bin) + sample(bin + 1)) / 2.0;
            let target = (avg / full_scale) * self.cfg.gain;

            let alpha = if target > *current {
                self.cfg.attack
            } else {
                self.cfg.decay
            };
            *current += (target - *current) * alpha;
        }
        &self.state
    }
}

/// Source frequency bin for output `band`: low bands get single bins, high bands are sparse.
pub fn source_bin(band: usize) -> usize {
    BIN_BASE.powi(band as i32 + BIN_OFFSET).floor() as usize
}

#[cfg(test)]
#[path = "../../tests/unit/audio/envelope.rs"]
mod tests;
