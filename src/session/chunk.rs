use crate::audio::mix::{frame_to_sample, secs_to_sample};
use crate::foundation::core::{Fps, FrameIndex, FrameRange};
use crate::timeline::model::Timeline;

/// One iteration of the export loop: a time window, its samples and the frames it produces.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderChunk {
    /// 0-based chunk number.
    pub index: u64,
    /// Window start in seconds.
    pub start_secs: f64,
    /// Window end in seconds (exclusive, clamped to the timeline).
    pub end_secs: f64,
    /// First output sample of the window.
    pub start_sample: u64,
    /// Output sample after the window.
    pub end_sample: u64,
    /// Frames whose presentation time falls inside the window.
    pub frames: FrameRange,
    /// Indices of tracks overlapping the window.
    pub tracks: Vec<usize>,
}

impl RenderChunk {
    /// Samples per channel covered by the window.
    pub fn sample_count(&self) -> usize {
        (self.end_sample - self.start_sample) as usize
    }
}

/// Walks a timeline in fixed-length chunks.
///
/// Chunk `i` starts at `i * chunk_secs` (no accumulated float drift). Frame `f` belongs to the
/// chunk whose window contains `f / fps`, so every frame lands in exactly one chunk whatever the
/// chunk length.
#[derive(Clone, Debug)]
pub struct ChunkPlanner<'a> {
    timeline: &'a Timeline,
    fps: Fps,
    sample_rate: u32,
    chunk_secs: f64,
    total_secs: f64,
    total_frames: u64,
    next: u64,
}

impl<'a> ChunkPlanner<'a> {
    /// Planner over `timeline`. `chunk_secs` must be positive.
    pub fn new(timeline: &'a Timeline, fps: Fps, sample_rate: u32, chunk_secs: f64) -> Self {
        let total_secs = timeline.total_duration();
        Self {
            timeline,
            fps,
            sample_rate,
            chunk_secs,
            total_secs,
            total_frames: fps.secs_to_frames_ceil(total_secs),
            next: 0,
        }
    }

    /// Frames in the whole export.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Number of chunks the planner yields.
    pub fn chunk_count(&self) -> u64 {
        if self.total_secs <= 0.0 || self.chunk_secs <= 0.0 {
            return 0;
        }
        ((self.total_secs / self.chunk_secs) - 1e-9).ceil().max(1.0) as u64
    }
}

impl Iterator for ChunkPlanner<'_> {
    type Item = RenderChunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.chunk_count() {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let start_secs = index as f64 * self.chunk_secs;
        let end_secs = if index + 1 == self.chunk_count() {
            self.total_secs
        } else {
            ((index + 1) as f64 * self.chunk_secs).min(self.total_secs)
        };
        let first = self.fps.secs_to_frames_ceil(start_secs).min(self.total_frames);
        let end = self.fps.secs_to_frames_ceil(end_secs).min(self.total_frames);

        Some(RenderChunk {
            index,
            start_secs,
            end_secs,
            start_sample: secs_to_sample(start_secs, self.sample_rate),
            end_sample: secs_to_sample(end_secs, self.sample_rate),
            frames: FrameRange {
                start: FrameIndex(first),
                end: FrameIndex(end.max(first)),
            },
            tracks: self.timeline.overlapping(start_secs, end_secs),
        })
    }
}

/// Sample position at which frame `f`'s analysis window ends.
pub fn frame_end_sample(f: FrameIndex, fps: Fps, sample_rate: u32) -> u64 {
    frame_to_sample(f.0, fps, sample_rate)
}

#[cfg(test)]
#[path = "../../tests/unit/session/chunk.rs"]
mod tests;
