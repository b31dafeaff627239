use std::path::PathBuf;

use rayon::prelude::*;

use crate::audio::analysis::{SpectrumAnalyzer, SpectrumConfig};
use crate::audio::envelope::{EnvelopeConfig, EnvelopeState, FrequencyEnvelope};
use crate::audio::mix::{MixSource, PlanarPcm, mix_window, secs_to_sample};
use crate::encode::sink::{
    AudioEncoder, AudioStreamConfig, Muxer, ProgressSink, VideoEncoder, VideoStreamConfig,
};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{VibeError, VibeResult};
use crate::render::backend::FrameRGBA;
use crate::render::background::{BackgroundImage, load_background};
use crate::render::compositor::{ComposeParams, VisualFrameCompositor};
use crate::render::style::VisualSettings;
use crate::session::chunk::{ChunkPlanner, RenderChunk, frame_end_sample};
use crate::session::progress::{CancelToken, ProgressTracker, RenderPhase};
use crate::timeline::cache::{ActiveBuffer, CacheStats, TimelineCache};
use crate::timeline::decode::MIX_SAMPLE_RATE;

/// Frames replayed through a fresh envelope before a preview frame.
const PREVIEW_WARMUP_SECS: f64 = 1.0;

/// Export parameters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fps,
    /// Video bitrate in bits per second.
    pub video_bitrate: u32,
    /// Audio bitrate in bits per second.
    pub audio_bitrate: u32,
    /// Mix and output sample rate.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Length of one render chunk in seconds.
    pub chunk_secs: f64,
    /// Video queue depth above which the session waits for the encoder.
    pub max_encoder_queue: usize,
    /// Seconds between key frames.
    pub keyframe_interval_secs: f64,
    /// Decoded tracks kept resident by the timeline cache.
    pub residency_cap: usize,
    /// Worker threads for spectrum analysis. `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// FFT parameters.
    pub spectrum: SpectrumConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: Fps { num: 30, den: 1 },
            video_bitrate: 8_000_000,
            audio_bitrate: 128_000,
            sample_rate: MIX_SAMPLE_RATE,
            channels: 2,
            chunk_secs: 5.0,
            max_encoder_queue: 5,
            keyframe_interval_secs: 2.0,
            residency_cap: crate::timeline::cache::DEFAULT_RESIDENCY_CAP,
            threads: None,
            spectrum: SpectrumConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Check every field; the first violation is returned.
    pub fn validate(&self) -> VibeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VibeError::validation("render width/height must be > 0"));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(VibeError::validation(
                "render width/height must fit in 16 bits",
            ));
        }
        Fps::new(self.fps.num, self.fps.den)?;
        if self.sample_rate == 0 {
            return Err(VibeError::validation("render sample_rate must be > 0"));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(VibeError::validation("render channels must be in 1..=8"));
        }
        if !self.chunk_secs.is_finite() || self.chunk_secs <= 0.0 {
            return Err(VibeError::validation("render chunk_secs must be > 0"));
        }
        if !self.keyframe_interval_secs.is_finite() || self.keyframe_interval_secs <= 0.0 {
            return Err(VibeError::validation(
                "render keyframe_interval_secs must be > 0",
            ));
        }
        if self.residency_cap == 0 {
            return Err(VibeError::validation("render residency_cap must be >= 1"));
        }
        if self.threads == Some(0) {
            return Err(VibeError::validation(
                "render threads must be >= 1 when set",
            ));
        }
        self.spectrum.validate()
    }

    /// Key frame spacing in frames (at least 1).
    pub fn keyframe_interval_frames(&self) -> u64 {
        ((self.keyframe_interval_secs * self.fps.as_f64()).round() as u64).max(1)
    }
}

/// Export statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RenderStats {
    /// Chunks rendered.
    pub chunks: u64,
    /// Video frames submitted.
    pub frames_encoded: u64,
    /// Frames submitted with the key frame flag.
    pub key_frames: u64,
    /// Audio sample frames submitted.
    pub audio_samples: u64,
    /// Times the session waited on a backed-up video encoder.
    pub backpressure_waits: u64,
    /// Tracks rendered as silence because they failed to decode.
    pub failed_tracks: u64,
}

/// Outcome of a successful export.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RenderReport {
    /// Container written by the muxer.
    pub output: PathBuf,
    /// Export statistics.
    pub stats: RenderStats,
    /// Timeline cache counters at the end of the export.
    pub cache: CacheStats,
}

/// Encoders and muxer an export writes into. The caller keeps ownership.
pub struct RenderOutputs<'a> {
    /// Video stream consumer.
    pub video: &'a mut dyn VideoEncoder,
    /// Audio stream consumer.
    pub audio: &'a mut dyn AudioEncoder,
    /// Container writer.
    pub muxer: &'a mut dyn Muxer,
}

/// Drives one export: walks the timeline in chunks, mixes and analyzes each chunk's audio,
/// composes one frame per output tick and feeds both encoders.
///
/// The session owns the timeline cache and the envelope; nothing is shared between sessions.
/// Rendering is one blocking call on the caller's thread.
pub struct RenderSession {
    cfg: RenderConfig,
    visual: VisualSettings,
    envelope_cfg: EnvelopeConfig,
    cache: TimelineCache,
    analyzer: SpectrumAnalyzer,
    compositor: VisualFrameCompositor,
    background_path: Option<PathBuf>,
    background: Option<BackgroundImage>,
    pool: Option<rayon::ThreadPool>,
    phase: RenderPhase,
}

impl std::fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSession")
            .field("cfg", &self.cfg)
            .field("phase", &self.phase)
            .field("cache", &self.cache)
            .field("background", &self.background)
            .finish()
    }
}

impl RenderSession {
    /// Validate the configuration and take ownership of the cache.
    ///
    /// The cache's residency cap is replaced by `cfg.residency_cap`. Fails with
    /// [`VibeError::Validation`] for an empty timeline or zero total duration.
    pub fn new(
        mut cache: TimelineCache,
        cfg: RenderConfig,
        visual: VisualSettings,
        envelope_cfg: EnvelopeConfig,
    ) -> VibeResult<Self> {
        cfg.validate()?;
        visual.validate()?;
        envelope_cfg.validate()?;
        let timeline = cache.timeline();
        if timeline.tracks().is_empty() {
            return Err(VibeError::validation("playlist is empty"));
        }
        let total = timeline.total_duration();
        if !total.is_finite() || total <= 0.0 {
            return Err(VibeError::validation("playlist total duration is zero"));
        }
        let pool = match cfg.threads {
            Some(n) => Some(build_thread_pool(n)?),
            None => None,
        };
        cache.set_residency_cap(cfg.residency_cap);
        Ok(Self {
            analyzer: SpectrumAnalyzer::new(cfg.spectrum),
            cfg,
            visual,
            envelope_cfg,
            cache,
            compositor: VisualFrameCompositor::new(),
            background_path: None,
            background: None,
            pool,
            phase: RenderPhase::Idle,
        })
    }

    /// Load the background from `path` when the export starts. A failed load renders without it.
    pub fn with_background_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.background_path = Some(path.into());
        self.background = None;
        self
    }

    /// Use an already decoded background.
    pub fn with_background(mut self, image: BackgroundImage) -> Self {
        self.background_path = None;
        self.background = Some(image);
        self
    }

    /// Current phase.
    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Export parameters.
    pub fn config(&self) -> &RenderConfig {
        &self.cfg
    }

    /// Visual settings.
    pub fn visual(&self) -> &VisualSettings {
        &self.visual
    }

    /// The timeline cache.
    pub fn cache(&self) -> &TimelineCache {
        &self.cache
    }

    /// Mutable access for renaming or removing tracks between exports.
    pub fn cache_mut(&mut self) -> &mut TimelineCache {
        &mut self.cache
    }

    /// The background in use, once loaded.
    pub fn background(&self) -> Option<&BackgroundImage> {
        self.background.as_ref()
    }

    /// Timeline length in seconds.
    pub fn total_duration(&self) -> f64 {
        self.cache.timeline().total_duration()
    }

    /// Frames an export produces.
    pub fn total_frames(&self) -> u64 {
        self.cfg.fps.secs_to_frames_ceil(self.total_duration())
    }

    /// Run a full export into `outputs`.
    ///
    /// Progress is strictly increasing and ends at `1.0` on success. On error the encoders and
    /// muxer are aborted, the failure is reported through `progress` and returned. A cancel
    /// request is honored at the next chunk boundary.
    #[tracing::instrument(skip_all, fields(total_secs = self.total_duration()))]
    pub fn render(
        &mut self,
        outputs: RenderOutputs<'_>,
        progress: &mut dyn ProgressSink,
        cancel: Option<&CancelToken>,
    ) -> VibeResult<RenderReport> {
        let RenderOutputs {
            video,
            audio,
            muxer,
        } = outputs;
        let mut progress = ProgressTracker::new(progress);
        let mut stats = RenderStats::default();

        let res = self.run(
            &mut *video,
            &mut *audio,
            &mut *muxer,
            &mut progress,
            cancel,
            &mut stats,
        );
        stats.failed_tracks = self.cache.failed_ids().len() as u64;

        match res {
            Ok(output) => {
                self.set_phase(RenderPhase::Done);
                progress.report(1.0, "Done");
                tracing::info!(
                    output = %output.display(),
                    frames = stats.frames_encoded,
                    chunks = stats.chunks,
                    "export finished"
                );
                Ok(RenderReport {
                    output,
                    stats,
                    cache: self.cache.stats(),
                })
            }
            Err(VibeError::Cancelled) => {
                self.set_phase(RenderPhase::Cancelled);
                if let Err(e) = video.flush() {
                    tracing::warn!(error = %e, "video flush after cancel failed");
                }
                if let Err(e) = audio.flush() {
                    tracing::warn!(error = %e, "audio flush after cancel failed");
                }
                video.abort();
                audio.abort();
                muxer.abort();
                progress.stop("Export cancelled");
                Err(VibeError::Cancelled)
            }
            Err(e) => {
                self.set_phase(RenderPhase::Error);
                tracing::error!(error = %e, "export failed");
                video.abort();
                audio.abort();
                muxer.abort();
                progress.stop(&format!("Export failed: {e}"));
                Err(e)
            }
        }
    }

    fn run(
        &mut self,
        video: &mut dyn VideoEncoder,
        audio: &mut dyn AudioEncoder,
        muxer: &mut dyn Muxer,
        progress: &mut ProgressTracker<'_>,
        cancel: Option<&CancelToken>,
        stats: &mut RenderStats,
    ) -> VibeResult<PathBuf> {
        self.set_phase(RenderPhase::Init);
        progress.report(0.01, "Initializing");
        let total = self.total_duration();
        let mut envelope = FrequencyEnvelope::new(self.envelope_cfg);

        self.set_phase(RenderPhase::ConfigureEncoders);
        progress.report(0.05, "Configuring encoders");
        video.begin(VideoStreamConfig {
            width: self.cfg.width,
            height: self.cfg.height,
            fps: self.cfg.fps,
            bitrate: self.cfg.video_bitrate,
            keyframe_interval: self.cfg.keyframe_interval_frames(),
        })?;
        audio.begin(AudioStreamConfig {
            sample_rate: self.cfg.sample_rate,
            channels: self.cfg.channels,
            bitrate: self.cfg.audio_bitrate,
        })?;

        self.set_phase(RenderPhase::LoadBackgroundImage);
        if self.background.is_none()
            && let Some(path) = self.background_path.as_deref()
        {
            self.background = load_background(path);
        }

        let chunks: Vec<RenderChunk> = ChunkPlanner::new(
            self.cache.timeline(),
            self.cfg.fps,
            self.cfg.sample_rate,
            self.cfg.chunk_secs,
        )
        .collect();
        tracing::info!(chunks = chunks.len(), frames = self.total_frames(), "export planned");

        for chunk in &chunks {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                tracing::info!(chunk = chunk.index, "export cancelled");
                return Err(VibeError::Cancelled);
            }
            progress.report(
                0.1 + 0.9 * chunk.start_secs / total,
                &format!("Rendering {:.0}s / {:.0}s", chunk.start_secs, total),
            );
            self.render_chunk(chunk, video, audio, &mut envelope, stats)?;
            stats.chunks += 1;
            std::thread::yield_now();
        }

        self.set_phase(RenderPhase::Flush);
        video.flush()?;
        audio.flush()?;

        self.set_phase(RenderPhase::Finalize);
        progress.report(0.95, "Finalizing");
        let video_stream = video.finish()?;
        let audio_stream = audio.finish()?;
        muxer.finalize(&video_stream, &audio_stream)
    }

    #[tracing::instrument(skip_all, fields(chunk = chunk.index, start_secs = chunk.start_secs))]
    fn render_chunk(
        &mut self,
        chunk: &RenderChunk,
        video: &mut dyn VideoEncoder,
        audio: &mut dyn AudioEncoder,
        envelope: &mut FrequencyEnvelope,
        stats: &mut RenderStats,
    ) -> VibeResult<()> {
        let fps = self.cfg.fps;
        let sr = self.cfg.sample_rate;
        let fft = self.analyzer.fft_size() as i64;

        // The mix starts one FFT window before the earlier of the chunk start and the first
        // frame's sample, so every analysis window lies fully inside it.
        let first_end = frame_end_sample(chunk.frames.start, fps, sr);
        let window_start = chunk.start_sample.min(first_end) as i64 - fft;
        let prefix = (chunk.start_sample as i64 - window_start) as usize;

        self.set_phase(RenderPhase::PrepareChunkAudio);
        let prep_start = (window_start.max(0) as f64 / f64::from(sr)).min(chunk.start_secs);
        self.cache.ensure_resident(prep_start, chunk.end_secs);

        self.set_phase(RenderPhase::MixChunkAudio);
        let mix = self.mix(
            prep_start,
            chunk.end_secs,
            window_start,
            prefix + chunk.sample_count(),
        );
        let chunk_pcm = mix.slice_frames(prefix, chunk.sample_count());
        audio.encode(&chunk_pcm, samples_to_us(chunk.start_sample, sr))?;
        stats.audio_samples += chunk_pcm.frames() as u64;

        self.set_phase(RenderPhase::SnapshotFrequencies);
        let frames: Vec<FrameIndex> = chunk.frames.iter().collect();
        let spectra = self.snapshot(&mix, window_start, &frames);

        self.set_phase(RenderPhase::RenderChunkFrames);
        let total = self.total_duration();
        let key_interval = self.cfg.keyframe_interval_frames();
        for (&f, spectrum) in frames.iter().zip(&spectra) {
            let t = fps.frames_to_secs(f.0);
            if t >= total {
                break;
            }
            let state = *envelope.update(spectrum);
            let frame = self.compose_at(t, &state);

            if video.queue_depth() > self.cfg.max_encoder_queue {
                tracing::debug!(depth = video.queue_depth(), "waiting on video encoder");
                video.flush()?;
                stats.backpressure_waits += 1;
            }
            let key_frame = f.0.is_multiple_of(key_interval);
            video.encode(&frame, fps.frame_timestamp_us(f), key_frame)?;
            stats.frames_encoded += 1;
            if key_frame {
                stats.key_frames += 1;
            }
        }

        self.set_phase(RenderPhase::EncodeChunk);
        audio.flush()
    }

    /// Render one preview frame at `t` seconds.
    ///
    /// Uses a fresh envelope warmed over the preceding second of frames, so the result matches
    /// the exported frame closely but not bit for bit.
    #[tracing::instrument(skip(self))]
    pub fn render_frame_at(&mut self, t: f64) -> VibeResult<FrameRGBA> {
        let total = self.total_duration();
        if !t.is_finite() || t < 0.0 || t >= total {
            return Err(VibeError::validation(format!(
                "preview time {t} is outside [0, {total})"
            )));
        }
        if self.background.is_none()
            && let Some(path) = self.background_path.as_deref()
        {
            self.background = load_background(path);
        }

        let fps = self.cfg.fps;
        let sr = self.cfg.sample_rate;
        let fft = self.analyzer.fft_size() as i64;
        let target = fps.secs_to_frames_floor(t);
        let warm = fps.secs_to_frames_ceil(PREVIEW_WARMUP_SECS);
        let frames: Vec<FrameIndex> = (target.saturating_sub(warm)..=target)
            .map(FrameIndex)
            .collect();

        let window_start = frame_end_sample(frames[0], fps, sr) as i64 - fft;
        let window_end = frame_end_sample(FrameIndex(target), fps, sr) as i64;
        let prep_start = window_start.max(0) as f64 / f64::from(sr);
        let prep_end = (t + fps.frame_duration_secs()).min(total);
        self.cache.ensure_resident(prep_start, prep_end);
        let mix = self.mix(
            prep_start,
            prep_end,
            window_start,
            (window_end - window_start) as usize,
        );

        let mut envelope = FrequencyEnvelope::new(self.envelope_cfg);
        for spectrum in self.snapshot(&mix, window_start, &frames) {
            envelope.update(&spectrum);
        }
        let state = *envelope.state();
        Ok(self.compose_at(t, &state))
    }

    fn mix(&mut self, start: f64, end: f64, window_start: i64, frames: usize) -> PlanarPcm {
        let sr = self.cfg.sample_rate;
        let channels = self.cfg.channels;
        let buffers = self.cache.active_buffers(start, end);
        let sources: Vec<MixSource<'_>> = buffers.iter().map(|b| mix_source(b, sr)).collect();
        mix_window(&sources, window_start, frames, sr, channels)
    }

    /// One spectrum per frame, each over the FFT window ending at the frame's sample.
    fn snapshot(
        &self,
        mix: &PlanarPcm,
        window_start: i64,
        frames: &[FrameIndex],
    ) -> Vec<Vec<f32>> {
        let fps = self.cfg.fps;
        let sr = self.cfg.sample_rate;
        let analyzer = &self.analyzer;
        let fft = analyzer.fft_size();
        let one = |f: &FrameIndex| {
            let end = (frame_end_sample(*f, fps, sr) as i64 - window_start).max(0) as usize;
            analyzer.analyze(&mix.mono_window(end, fft))
        };
        match &self.pool {
            Some(pool) => pool.install(|| frames.par_iter().map(one).collect::<Vec<_>>()),
            None => frames.par_iter().map(one).collect::<Vec<_>>(),
        }
    }

    fn compose_at(&mut self, t: f64, envelope: &EnvelopeState) -> FrameRGBA {
        let pos = self.cache.track_at_time(t);
        let params = ComposeParams {
            envelope,
            background: self.background.as_ref(),
            track: pos.map(|p| p.track),
            track_time: pos.map_or(0.0, |p| p.offset_secs),
            track_duration: pos.map_or(0.0, |p| p.track.duration_secs),
            is_playing: true,
            elapsed: t,
            width: self.cfg.width,
            height: self.cfg.height,
            settings: &self.visual,
        };
        self.compositor.compose(&params)
    }

    fn set_phase(&mut self, phase: RenderPhase) {
        if self.phase != phase {
            tracing::trace!(?phase, "render phase");
        }
        self.phase = phase;
    }
}

fn mix_source<'a>(b: &ActiveBuffer<'a>, sample_rate: u32) -> MixSource<'a> {
    let start_sample = secs_to_sample(b.start_secs, sample_rate);
    let end_sample = secs_to_sample(b.start_secs + b.duration_secs, sample_rate);
    MixSource {
        pcm: b.pcm,
        start_sample,
        len_samples: end_sample.saturating_sub(start_sample),
    }
}

fn samples_to_us(sample: u64, sample_rate: u32) -> u64 {
    let den = u128::from(sample_rate.max(1));
    ((u128::from(sample) * 1_000_000 + den / 2) / den) as u64
}

fn build_thread_pool(threads: usize) -> VibeResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| VibeError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/session/render_session.rs"]
mod tests;
