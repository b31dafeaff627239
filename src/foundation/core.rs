use crate::foundation::error::{VibeError, VibeResult};

pub use kurbo::{Affine, BezPath, Point, Rect};

/// Index of an output video frame, counted from the start of the export.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames `[start, end)` of one render chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// First frame.
    pub start: FrameIndex,
    /// One past the last frame.
    pub end: FrameIndex,
}

impl FrameRange {
    /// Frames in increasing order; empty when `end <= start`.
    pub fn iter(self) -> impl Iterator<Item = FrameIndex> {
        (self.start.0..self.end.0).map(FrameIndex)
    }
}

/// Output frame rate as the exact ratio `num / den` (e.g. `30000/1001`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Frames per `den` seconds.
    pub num: u32,
    /// Seconds per `num` frames.
    pub den: u32,
}

impl Fps {
    /// Rate with both terms non-zero.
    pub fn new(num: u32, den: u32) -> VibeResult<Self> {
        if num == 0 || den == 0 {
            return Err(VibeError::validation(format!(
                "fps {num}/{den}: both terms must be > 0"
            )));
        }
        Ok(Self { num, den })
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Seconds between consecutive frames.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Start time of frame number `frames`.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        frames as f64 * f64::from(self.den) / f64::from(self.num)
    }

    /// Frame showing at `secs`.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }

    /// Number of frames whose start time lies strictly before `secs`.
    ///
    /// Tolerates float noise of a few nanoseconds so `10.0 s @ 30 fps` is exactly 300 frames.
    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        (secs * self.as_f64() - 1e-6).ceil().max(0.0) as u64
    }

    /// Presentation timestamp of `idx` in whole microseconds, rounded to nearest.
    pub fn frame_timestamp_us(self, idx: FrameIndex) -> u64 {
        let num = u128::from(idx.0) * 1_000_000 * u128::from(self.den);
        let rate = u128::from(self.num);
        ((num + rate / 2) / rate) as u64
    }
}

/// Output size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Canvas {
    /// Layout scale relative to a 1080-pixel-tall reference frame.
    ///
    /// All visual metrics (padding, bar sizes, font sizes) are authored for 1080p and scaled by
    /// this factor, with a floor so tiny previews stay legible.
    pub fn ui_scale(self) -> f64 {
        (f64::from(self.height) / 1080.0).max(0.25)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
