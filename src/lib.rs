//! vibereel renders a playlist of audio tracks into an audio-reactive visualizer video.
//!
//! Export is chunked and memory-bounded: only a few decoded tracks are resident at a time, audio
//! is mixed one chunk at a time and frames stream straight into the encoders.
//!
//! - Describe an export with a [`Project`] (or build a [`TimelineCache`] by hand)
//! - Create a [`RenderSession`]
//! - Stream it into a [`VideoEncoder`], an [`AudioEncoder`] and a [`Muxer`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod audio;
/// Encoder, muxer and progress seams.
pub mod encode;
/// JSON project files.
pub mod project;
pub(crate) mod render;
/// Chunked export driver.
pub mod session;
pub(crate) mod timeline;

pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRange};
pub use crate::foundation::error::{VibeError, VibeResult};

pub use crate::audio::analysis::{DEFAULT_FFT_SIZE, SpectrumAnalyzer, SpectrumConfig};
pub use crate::audio::envelope::{BAND_COUNT, EnvelopeConfig, EnvelopeState, FrequencyEnvelope};
pub use crate::audio::mix::{MixSource, PlanarPcm, mix_window};
pub use crate::encode::ffmpeg::{
    FfmpegAudioEncoder, FfmpegMuxer, FfmpegVideoEncoder, intermediate_paths, is_ffmpeg_on_path,
};
pub use crate::encode::sink::{
    AudioEncoder, AudioStreamConfig, EncodedFrame, EncodedStream, InMemoryAudioEncoder,
    InMemoryMuxer, InMemoryVideoEncoder, Muxer, NoProgress, ProgressSink, VideoEncoder,
    VideoStreamConfig,
};
pub use crate::project::file::{Project, TrackEntry};
pub use crate::render::backend::FrameRGBA;
pub use crate::render::background::{BackgroundImage, load_background};
pub use crate::render::compositor::{ComposeParams, VisualFrameCompositor};
pub use crate::render::style::{FontSize, Rgb8, TextAnchor, VisualSettings, VisualizationMode};
pub use crate::session::chunk::{ChunkPlanner, RenderChunk};
pub use crate::session::progress::{CancelToken, RenderPhase};
pub use crate::session::render_session::{
    RenderConfig, RenderOutputs, RenderReport, RenderSession, RenderStats,
};
pub use crate::timeline::cache::{
    ActiveBuffer, CacheStats, DEFAULT_RESIDENCY_CAP, TimelineCache,
};
pub use crate::timeline::decode::{
    AudioDecoder, AudioPcm, AutoDecoder, FfmpegAudioDecoder, MIX_SAMPLE_RATE, WavDecoder,
    probe_duration_secs,
};
pub use crate::timeline::model::{Playlist, Timeline, Track, TrackId, TrackPosition, TrackSource};
