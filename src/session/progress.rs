use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::encode::sink::ProgressSink;

/// Steps of an export, in the order a successful run visits them.
///
/// The chunk phases repeat once per chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    /// Not started.
    #[default]
    Idle,
    /// Validating inputs and resetting state.
    Init,
    /// Opening the video and audio encoders.
    ConfigureEncoders,
    /// Decoding the optional background image.
    LoadBackgroundImage,
    /// Making the chunk's tracks resident.
    PrepareChunkAudio,
    /// Mixing the chunk window and submitting its audio.
    MixChunkAudio,
    /// Per-frame spectrum analysis.
    SnapshotFrequencies,
    /// Composing and submitting the chunk's frames.
    RenderChunkFrames,
    /// Per-chunk encoder bookkeeping.
    EncodeChunk,
    /// Draining both encoders.
    Flush,
    /// Closing the streams and muxing the container.
    Finalize,
    /// Finished successfully.
    Done,
    /// Stopped by a cancel request.
    Cancelled,
    /// Stopped by an error.
    Error,
}

impl RenderPhase {
    /// Whether the export has stopped.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Error)
    }
}

/// Shared flag used to stop an export between chunks.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next chunk boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Forwards progress to a sink while keeping the reported fraction strictly increasing.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a mut dyn ProgressSink,
    last: f64,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: 0.0 }
    }

    /// Report `fraction` unless it would not advance past the previous report.
    pub(crate) fn report(&mut self, fraction: f64, status: &str) {
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction <= self.last {
            return;
        }
        self.last = fraction;
        tracing::debug!(fraction, status, "export progress");
        self.sink.report(fraction, status);
    }

    /// Terminal status at the last reported fraction.
    pub(crate) fn stop(&mut self, status: &str) {
        self.sink.report(self.last, status);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/progress.rs"]
mod tests;
