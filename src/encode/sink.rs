use std::path::PathBuf;

use crate::audio::mix::PlanarPcm;
use crate::foundation::core::Fps;
use crate::foundation::error::{VibeError, VibeResult};
use crate::render::backend::FrameRGBA;

/// Video stream parameters handed to [`VideoEncoder::begin`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoStreamConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
    /// Distance between key frames, in frames.
    pub keyframe_interval: u64,
}

/// Audio stream parameters handed to [`AudioEncoder::begin`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioStreamConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
}

/// Result of a finished elementary stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedStream {
    /// File holding the stream, for encoders that write one.
    pub path: Option<PathBuf>,
    /// Frames (video) or sample frames (audio) accepted.
    pub units: u64,
}

/// Consumer of composed frames.
///
/// Ordering contract: `encode` is called with strictly increasing timestamps between `begin` and
/// `finish`. `queue_depth` reports frames accepted but not yet consumed; `flush` blocks until it
/// reaches zero.
pub trait VideoEncoder: Send {
    /// Called once before any frame.
    fn begin(&mut self, cfg: VideoStreamConfig) -> VibeResult<()>;
    /// Submit one frame.
    fn encode(&mut self, frame: &FrameRGBA, timestamp_us: u64, key_frame: bool)
    -> VibeResult<()>;
    /// Frames submitted but not yet consumed.
    fn queue_depth(&self) -> usize;
    /// Wait for the queue to drain.
    fn flush(&mut self) -> VibeResult<()>;
    /// Complete the stream.
    fn finish(&mut self) -> VibeResult<EncodedStream>;
    /// Tear down after a failure. Must be safe to call in any state.
    fn abort(&mut self) {}
}

/// Consumer of mixed PCM, one chunk at a time in timestamp order.
pub trait AudioEncoder: Send {
    /// Called once before any audio.
    fn begin(&mut self, cfg: AudioStreamConfig) -> VibeResult<()>;
    /// Submit one chunk starting at `timestamp_us`.
    fn encode(&mut self, pcm: &PlanarPcm, timestamp_us: u64) -> VibeResult<()>;
    /// Push buffered audio downstream.
    fn flush(&mut self) -> VibeResult<()>;
    /// Complete the stream.
    fn finish(&mut self) -> VibeResult<EncodedStream>;
    /// Tear down after a failure. Must be safe to call in any state.
    fn abort(&mut self) {}
}

/// Combines finished audio and video streams into the output container.
pub trait Muxer: Send {
    /// Write the container and return its path.
    fn finalize(&mut self, video: &EncodedStream, audio: &EncodedStream) -> VibeResult<PathBuf>;
    /// Discard partial output.
    fn abort(&mut self);
}

/// Receiver of `(fraction, status)` progress updates.
pub trait ProgressSink {
    /// Report progress in `[0, 1]`.
    fn report(&mut self, fraction: f64, status: &str);
}

impl<F: FnMut(f64, &str)> ProgressSink for F {
    fn report(&mut self, fraction: f64, status: &str) {
        self(fraction, status)
    }
}

/// Progress sink that drops every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _fraction: f64, _status: &str) {}
}

/// Metadata recorded for each frame by [`InMemoryVideoEncoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Presentation timestamp.
    pub timestamp_us: u64,
    /// Key frame flag as requested.
    pub key_frame: bool,
    /// Content hash of the frame pixels.
    pub checksum: u64,
}

/// Video encoder that records frame metadata (and optionally pixels) for tests and debugging.
///
/// With [`InMemoryVideoEncoder::with_backlog`] every frame stays queued until `flush`, which
/// makes backpressure observable.
#[derive(Debug, Default)]
pub struct InMemoryVideoEncoder {
    cfg: Option<VideoStreamConfig>,
    keep_pixels: bool,
    backlog: bool,
    pending: usize,
    /// Frames in submission order.
    pub frames: Vec<EncodedFrame>,
    /// Pixels of each frame when retention is enabled.
    pub pixels: Vec<FrameRGBA>,
    /// Number of `flush` calls.
    pub flushes: usize,
    /// Whether `finish` ran.
    pub finished: bool,
    /// Whether `abort` ran.
    pub aborted: bool,
}

impl InMemoryVideoEncoder {
    /// Encoder recording metadata only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also keep every frame's pixels.
    pub fn keep_pixels(mut self) -> Self {
        self.keep_pixels = true;
        self
    }

    /// Hold frames in the queue until `flush`.
    pub fn with_backlog(mut self) -> Self {
        self.backlog = true;
        self
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<VideoStreamConfig> {
        self.cfg
    }
}

impl VideoEncoder for InMemoryVideoEncoder {
    fn begin(&mut self, cfg: VideoStreamConfig) -> VibeResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.pixels.clear();
        self.pending = 0;
        Ok(())
    }

    fn encode(
        &mut self,
        frame: &FrameRGBA,
        timestamp_us: u64,
        key_frame: bool,
    ) -> VibeResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| VibeError::encode("video encoder not started"))?;
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(VibeError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if let Some(last) = self.frames.last()
            && timestamp_us <= last.timestamp_us
        {
            return Err(VibeError::encode("video timestamps must strictly increase"));
        }
        self.frames.push(EncodedFrame {
            timestamp_us,
            key_frame,
            checksum: frame.checksum(),
        });
        if self.keep_pixels {
            self.pixels.push(frame.clone());
        }
        if self.backlog {
            self.pending += 1;
        }
        Ok(())
    }

    fn queue_depth(&self) -> usize {
        self.pending
    }

    fn flush(&mut self) -> VibeResult<()> {
        self.flushes += 1;
        self.pending = 0;
        Ok(())
    }

    fn finish(&mut self) -> VibeResult<EncodedStream> {
        self.pending = 0;
        self.finished = true;
        Ok(EncodedStream {
            path: None,
            units: self.frames.len() as u64,
        })
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

/// Audio encoder that concatenates every chunk into one planar buffer.
#[derive(Debug, Default)]
pub struct InMemoryAudioEncoder {
    cfg: Option<AudioStreamConfig>,
    /// `(timestamp_us, frames)` per submitted chunk.
    pub chunks: Vec<(u64, usize)>,
    /// All submitted audio, concatenated.
    pub pcm: Option<PlanarPcm>,
    /// Whether `finish` ran.
    pub finished: bool,
    /// Whether `abort` ran.
    pub aborted: bool,
}

impl InMemoryAudioEncoder {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<AudioStreamConfig> {
        self.cfg
    }
}

impl AudioEncoder for InMemoryAudioEncoder {
    fn begin(&mut self, cfg: AudioStreamConfig) -> VibeResult<()> {
        self.pcm = Some(PlanarPcm::silent(cfg.sample_rate, cfg.channels, 0));
        self.cfg = Some(cfg);
        self.chunks.clear();
        Ok(())
    }

    fn encode(&mut self, pcm: &PlanarPcm, timestamp_us: u64) -> VibeResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| VibeError::encode("audio encoder not started"))?;
        if pcm.channels() != cfg.channels || pcm.sample_rate != cfg.sample_rate {
            return Err(VibeError::encode("audio chunk format mismatch"));
        }
        if let Some(&(last, _)) = self.chunks.last()
            && timestamp_us <= last
        {
            return Err(VibeError::encode("audio timestamps must strictly increase"));
        }
        let acc = self
            .pcm
            .as_mut()
            .ok_or_else(|| VibeError::encode("audio encoder not started"))?;
        for (dst, src) in acc.planes.iter_mut().zip(&pcm.planes) {
            dst.extend_from_slice(src);
        }
        self.chunks.push((timestamp_us, pcm.frames()));
        Ok(())
    }

    fn flush(&mut self) -> VibeResult<()> {
        Ok(())
    }

    fn finish(&mut self) -> VibeResult<EncodedStream> {
        self.finished = true;
        Ok(EncodedStream {
            path: None,
            units: self.pcm.as_ref().map_or(0, |p| p.frames() as u64),
        })
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

/// Muxer that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct InMemoryMuxer {
    /// Streams passed to `finalize`.
    pub finalized: Option<(EncodedStream, EncodedStream)>,
    /// Whether `abort` ran.
    pub aborted: bool,
    /// Fail `finalize` with this message.
    pub fail_with: Option<String>,
}

impl InMemoryMuxer {
    /// Recorder that succeeds.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Muxer for InMemoryMuxer {
    fn finalize(&mut self, video: &EncodedStream, audio: &EncodedStream) -> VibeResult<PathBuf> {
        if let Some(msg) = &self.fail_with {
            return Err(VibeError::encode(msg.clone()));
        }
        self.finalized = Some((video.clone(), audio.clone()));
        Ok(PathBuf::from("in-memory.mp4"))
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
