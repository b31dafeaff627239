use crate::foundation::core::Fps;
use crate::timeline::decode::AudioPcm;

/// Planar `f32` PCM: one contiguous plane per channel, all of equal length.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanarPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// One plane per channel.
    pub planes: Vec<Vec<f32>>,
}

impl PlanarPcm {
    /// Silent buffer of `frames` samples per channel.
    pub fn silent(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            planes: vec![vec![0.0; frames]; usize::from(channels)],
        }
    }

    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.planes.len() as u16
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    /// Borrow one channel plane.
    pub fn channel(&self, c: usize) -> &[f32] {
        &self.planes[c]
    }

    /// Copy `len` frames starting at `start` (clamped to the buffer).
    pub fn slice_frames(&self, start: usize, len: usize) -> Self {
        let start = start.min(self.frames());
        let end = start.saturating_add(len).min(self.frames());
        Self {
            sample_rate: self.sample_rate,
            planes: self.planes.iter().map(|p| p[start..end].to_vec()).collect(),
        }
    }

    /// Interleave the planes (`L R L R ...`).
    pub fn to_interleaved(&self) -> Vec<f32> {
        let ch = self.planes.len();
        let mut out = Vec::with_capacity(self.frames() * ch);
        for i in 0..self.frames() {
            out.extend(self.planes.iter().map(|p| p[i]));
        }
        out
    }

    /// Channel-averaged window of `len` samples ending (exclusive) at frame `end`.
    ///
    /// Positions outside the buffer read as silence.
    pub fn mono_window(&self, end: usize, len: usize) -> Vec<f32> {
        let ch = self.planes.len();
        if ch == 0 {
            return vec![0.0; len];
        }
        let frames = self.frames();
        let inv = 1.0 / ch as f32;
        (0..len)
            .map(|k| {
                let pos = (end + k).checked_sub(len);
                match pos {
                    Some(i) if i < frames => self.planes.iter().map(|p| p[i]).sum::<f32>() * inv,
                    _ => 0.0,
                }
            })
            .collect()
    }
}

/// A decoded track placed on the output timeline, in output samples.
#[derive(Clone, Copy, Debug)]
pub struct MixSource<'a> {
    /// Decoded PCM at its own rate and channel count.
    pub pcm: &'a AudioPcm,
    /// First output sample the track occupies.
    pub start_sample: u64,
    /// Output samples the track occupies. Source audio beyond this is cut; missing audio is silence.
    pub len_samples: u64,
}

/// Where a source lands inside a mix window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Offset inside the window where the source starts contributing.
    pub dst_offset: usize,
    /// Offset inside the source span (output samples) where reading starts.
    pub src_offset: u64,
    /// Number of samples contributed.
    pub count: usize,
}

/// Intersect a source span with the window `[window_start, window_start + frames)`.
pub fn placement(
    start_sample: u64,
    len_samples: u64,
    window_start: i64,
    frames: usize,
) -> Option<Placement> {
    let src_start = i128::from(start_sample);
    let src_end = src_start + i128::from(len_samples);
    let win_start = i128::from(window_start);
    let win_end = win_start + frames as i128;

    let lo = src_start.max(win_start);
    let hi = src_end.min(win_end);
    if hi <= lo {
        return None;
    }
    Some(Placement {
        dst_offset: (lo - win_start) as usize,
        src_offset: (lo - src_start) as u64,
        count: (hi - lo) as usize,
    })
}

/// Mix sources into an isolated planar buffer covering `[window_start, window_start + frames)`.
///
/// Every output sample depends only on its global index, so splitting a span into several
/// windows yields the same samples as mixing it at once. Negative positions are silence.
pub fn mix_window(
    sources: &[MixSource<'_>],
    window_start: i64,
    frames: usize,
    sample_rate: u32,
    channels: u16,
) -> PlanarPcm {
    let mut out = PlanarPcm::silent(sample_rate, channels, frames);
    for src in sources {
        if let Some(p) = placement(src.start_sample, src.len_samples, window_start, frames) {
            mix_source(&mut out, src, p);
        }
    }
    for plane in &mut out.planes {
        for s in plane.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
    }
    out
}

fn mix_source(out: &mut PlanarPcm, src: &MixSource<'_>, p: Placement) {
    let pcm = src.pcm;
    let src_ch = usize::from(pcm.channels);
    if src_ch == 0 || pcm.sample_rate == 0 || out.sample_rate == 0 {
        return;
    }
    let data = pcm.interleaved_f32.as_slice();
    let src_frames = data.len() / src_ch;
    if src_frames == 0 {
        return;
    }
    let out_ch = out.planes.len();
    let ratio = f64::from(pcm.sample_rate) / f64::from(out.sample_rate);

    for k in 0..p.count {
        let rel = p.src_offset + k as u64;
        let src_pos = rel as f64 * ratio;
        let f0 = src_pos.floor() as usize;
        if f0 >= src_frames {
            // Decoded audio shorter than the declared duration: the rest stays silent.
            break;
        }
        let f1 = (f0 + 1).min(src_frames - 1);
        let frac = (src_pos - f0 as f64) as f32;
        let at = |c: usize| {
            let v0 = data[f0 * src_ch + c];
            let v1 = data[f1 * src_ch + c];
            v0 + (v1 - v0) * frac
        };

        let dst = p.dst_offset + k;
        if out_ch == 1 {
            let sum: f32 = (0..src_ch).map(at).sum();
            out.planes[0][dst] += sum / src_ch as f32;
        } else {
            for (c, plane) in out.planes.iter_mut().enumerate() {
                plane[dst] += at(c.min(src_ch - 1));
            }
        }
    }
}

/// Convert a frame index to the nearest sample index at `sample_rate`.
pub fn frame_to_sample(frame: u64, fps: Fps, sample_rate: u32) -> u64 {
    let num = u128::from(frame) * u128::from(sample_rate) * u128::from(fps.den);
    let den = u128::from(fps.num);
    ((num + (den / 2)) / den) as u64
}

/// Convert seconds to the nearest sample index at `sample_rate`.
pub fn secs_to_sample(secs: f64, sample_rate: u32) -> u64 {
    (secs * f64::from(sample_rate)).round().max(0.0) as u64
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
