use std::io::{Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::audio::mix::PlanarPcm;
use crate::encode::sink::{
    AudioEncoder, AudioStreamConfig, EncodedStream, Muxer, VideoEncoder, VideoStreamConfig,
};
use crate::foundation::core::Fps;
use crate::foundation::error::{VibeError, VibeResult};
use crate::foundation::math::scale_by_alpha;
use crate::render::backend::FrameRGBA;

/// Frames buffered between the caller and the ffmpeg writer thread.
const WRITER_CHANNEL_DEPTH: usize = 8;

type StderrDrain = JoinHandle<std::io::Result<Vec<u8>>>;

/// A running `ffmpeg` child with its stderr drained on a helper thread.
struct FfmpegProcess {
    child: Child,
    stderr_drain: Option<StderrDrain>,
}

impl FfmpegProcess {
    fn spawn(mut cmd: Command) -> VibeResult<(Self, ChildStdin)> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| {
            VibeError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VibeError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| VibeError::encode("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });
        Ok((
            Self {
                child,
                stderr_drain: Some(stderr_drain),
            },
            stdin,
        ))
    }

    /// Wait for exit; stdin must already be closed.
    fn wait(mut self, what: &str) -> VibeResult<()> {
        let status = self.child.wait().map_err(|e| {
            VibeError::encode(format!("failed to wait for ffmpeg ({what}) to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| VibeError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| VibeError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(VibeError::encode(format!(
                "ffmpeg ({what}) exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn kill(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(h) = self.stderr_drain.take() {
            let _ = h.join();
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: usize,
    error: Option<String>,
}

/// Counter of frames handed to the writer thread but not yet written to ffmpeg.
#[derive(Default)]
struct WriteQueue {
    state: Mutex<QueueState>,
    drained: Condvar,
}

impl WriteQueue {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn push(&self) {
        self.lock().pending += 1;
    }

    fn done(&self, error: Option<String>) {
        let mut s = self.lock();
        s.pending = s.pending.saturating_sub(1);
        if error.is_some() {
            s.error = error;
            s.pending = 0;
        }
        self.drained.notify_all();
    }

    fn depth(&self) -> usize {
        self.lock().pending
    }

    fn wait_drained(&self) -> VibeResult<()> {
        let mut s = self.lock();
        while s.pending > 0 && s.error.is_none() {
            s = self.drained.wait(s).unwrap_or_else(|p| p.into_inner());
        }
        match &s.error {
            Some(e) => Err(VibeError::encode(e.clone())),
            None => Ok(()),
        }
    }
}

struct VideoRun {
    cfg: VideoStreamConfig,
    process: FfmpegProcess,
    tx: Option<SyncSender<Vec<u8>>>,
    writer: Option<JoinHandle<()>>,
    queue: Arc<WriteQueue>,
    last_ts: Option<u64>,
    frames: u64,
}

/// H.264 video encoder backed by the system `ffmpeg`.
///
/// Frames are flattened to opaque RGBA and handed to a writer thread through a bounded channel;
/// [`VideoEncoder::queue_depth`] reports what the writer has not yet pushed into ffmpeg.
///
/// Frames reach ffmpeg as a raw pipe, so key frames cannot be requested one at a time: the
/// schedule `frame % keyframe_interval == 0` is fixed at spawn with `-force_key_frames` (and a
/// matching `-g`). A per-frame flag that disagrees with it is logged and ignored.
pub struct FfmpegVideoEncoder {
    out_path: PathBuf,
    run: Option<VideoRun>,
}

impl FfmpegVideoEncoder {
    /// Encoder writing an MP4 video-only stream to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            run: None,
        }
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    #[tracing::instrument(level = "debug", skip(self), fields(out = %self.out_path.display()))]
    fn begin(&mut self, cfg: VideoStreamConfig) -> VibeResult<()> {
        if self.run.is_some() {
            return Err(VibeError::encode("video encoder already started"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(VibeError::validation(
                "ffmpeg video width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(VibeError::validation(
                "ffmpeg video width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        ensure_parent_dir(&self.out_path)?;
        require_ffmpeg()?;

        let mut cmd = Command::new("ffmpeg");
        // Input: raw RGBA8 frames, flattened to opaque before writing.
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0"])
            .args(video_output_args(&cfg))
            .arg(&self.out_path);

        let (process, mut stdin) = FfmpegProcess::spawn(cmd)?;
        let queue = Arc::new(WriteQueue::default());
        let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(WRITER_CHANNEL_DEPTH);
        let writer_queue = queue.clone();
        let writer = std::thread::spawn(move || {
            for buf in rx {
                let result = stdin
                    .write_all(&buf)
                    .map_err(|e| format!("failed to write frame to ffmpeg stdin: {e}"));
                let failed = result.is_err();
                writer_queue.done(result.err());
                if failed {
                    break;
                }
            }
            // Dropping stdin here signals end of input to ffmpeg.
        });

        self.run = Some(VideoRun {
            cfg,
            process,
            tx: Some(tx),
            writer: Some(writer),
            queue,
            last_ts: None,
            frames: 0,
        });
        Ok(())
    }

    fn encode(
        &mut self,
        frame: &FrameRGBA,
        timestamp_us: u64,
        key_frame: bool,
    ) -> VibeResult<()> {
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| VibeError::encode("ffmpeg video encoder not started"))?;
        if let Some(last) = run.last_ts
            && timestamp_us <= last
        {
            return Err(VibeError::encode(
                "ffmpeg video encoder received out-of-order timestamp",
            ));
        }
        if frame.width != run.cfg.width || frame.height != run.cfg.height {
            return Err(VibeError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, run.cfg.width, run.cfg.height
            )));
        }
        let expected_key = run.frames.is_multiple_of(run.cfg.keyframe_interval.max(1));
        if key_frame != expected_key {
            tracing::warn!(
                frame = run.frames,
                key_frame,
                "key frame request off the forced schedule; ignored"
            );
        }

        let mut buf = vec![0u8; frame.data.len()];
        if frame.premultiplied {
            flatten_premul_over_bg_to_opaque_rgba8(&mut buf, &frame.data, [0, 0, 0, 255])?;
        } else {
            buf.copy_from_slice(&frame.data);
        }

        run.queue.push();
        let tx = run
            .tx
            .as_ref()
            .ok_or_else(|| VibeError::encode("ffmpeg video encoder is already finalized"))?;
        if tx.send(buf).is_err() {
            run.queue.done(Some("ffmpeg writer thread stopped".to_string()));
            return run.queue.wait_drained();
        }
        run.last_ts = Some(timestamp_us);
        run.frames += 1;
        Ok(())
    }

    fn queue_depth(&self) -> usize {
        self.run.as_ref().map_or(0, |r| r.queue.depth())
    }

    fn flush(&mut self) -> VibeResult<()> {
        match &self.run {
            Some(run) => run.queue.wait_drained(),
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> VibeResult<EncodedStream> {
        let mut run = self
            .run
            .take()
            .ok_or_else(|| VibeError::encode("ffmpeg video encoder not started"))?;
        drop(run.tx.take());
        if let Some(w) = run.writer.take() {
            w.join()
                .map_err(|_| VibeError::encode("ffmpeg writer thread panicked"))?;
        }
        let write_error = run.queue.lock().error.clone();
        run.process.wait("video")?;
        if let Some(e) = write_error {
            return Err(VibeError::encode(e));
        }
        Ok(EncodedStream {
            path: Some(self.out_path.clone()),
            units: run.frames,
        })
    }

    fn abort(&mut self) {
        if let Some(mut run) = self.run.take() {
            drop(run.tx.take());
            run.process.kill();
            if let Some(w) = run.writer.take() {
                let _ = w.join();
            }
        }
        let _ = std::fs::remove_file(&self.out_path);
    }
}

impl Drop for FfmpegVideoEncoder {
    fn drop(&mut self) {
        if self.run.is_some() {
            self.abort();
        }
    }
}

struct AudioRun {
    cfg: AudioStreamConfig,
    process: FfmpegProcess,
    stdin: Option<ChildStdin>,
    samples: u64,
}

/// AAC audio encoder backed by the system `ffmpeg`, fed interleaved `f32le` over stdin.
///
/// Chunks must arrive in order; a gap between the end of the previous chunk and the next
/// chunk's timestamp is filled with silence.
pub struct FfmpegAudioEncoder {
    out_path: PathBuf,
    run: Option<AudioRun>,
}

impl FfmpegAudioEncoder {
    /// Encoder writing an AAC (`.m4a`) stream to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            run: None,
        }
    }
}

impl AudioEncoder for FfmpegAudioEncoder {
    #[tracing::instrument(level = "debug", skip(self), fields(out = %self.out_path.display()))]
    fn begin(&mut self, cfg: AudioStreamConfig) -> VibeResult<()> {
        if self.run.is_some() {
            return Err(VibeError::encode("audio encoder already started"));
        }
        if cfg.sample_rate == 0 || cfg.channels == 0 {
            return Err(VibeError::validation(
                "audio sample_rate and channels must be non-zero",
            ));
        }
        ensure_parent_dir(&self.out_path)?;
        require_ffmpeg()?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-loglevel", "error", "-f", "f32le"])
            .args(["-ar", &cfg.sample_rate.to_string()])
            .args(["-ac", &cfg.channels.to_string()])
            .args(["-i", "pipe:0", "-vn", "-c:a", "aac"])
            .args(["-b:a", &cfg.bitrate.to_string()])
            .arg(&self.out_path);

        let (process, stdin) = FfmpegProcess::spawn(cmd)?;
        self.run = Some(AudioRun {
            cfg,
            process,
            stdin: Some(stdin),
            samples: 0,
        });
        Ok(())
    }

    fn encode(&mut self, pcm: &PlanarPcm, timestamp_us: u64) -> VibeResult<()> {
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| VibeError::encode("ffmpeg audio encoder not started"))?;
        if pcm.channels() != run.cfg.channels || pcm.sample_rate != run.cfg.sample_rate {
            return Err(VibeError::encode("audio chunk format mismatch"));
        }
        let at_sample = (u128::from(timestamp_us) * u128::from(run.cfg.sample_rate)
            + 500_000)
            / 1_000_000;
        let at_sample = at_sample as u64;
        if at_sample + 1 < run.samples {
            return Err(VibeError::encode(format!(
                "audio chunk at {timestamp_us}us overlaps audio already written"
            )));
        }
        let gap = at_sample.saturating_sub(run.samples);

        let stdin = run
            .stdin
            .as_mut()
            .ok_or_else(|| VibeError::encode("ffmpeg audio encoder is already finalized"))?;
        let mut bytes = Vec::with_capacity(
            (gap as usize + pcm.frames()) * usize::from(run.cfg.channels) * 4,
        );
        for _ in 0..gap * u64::from(run.cfg.channels) {
            bytes.extend_from_slice(&0f32.to_le_bytes());
        }
        for s in pcm.to_interleaved() {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        stdin.write_all(&bytes).map_err(|e| {
            VibeError::encode(format!("failed to write audio to ffmpeg stdin: {e}"))
        })?;
        run.samples += gap + pcm.frames() as u64;
        Ok(())
    }

    fn flush(&mut self) -> VibeResult<()> {
        if let Some(stdin) = self.run.as_mut().and_then(|r| r.stdin.as_mut()) {
            stdin
                .flush()
                .map_err(|e| VibeError::encode(format!("failed to flush ffmpeg stdin: {e}")))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> VibeResult<EncodedStream> {
        let mut run = self
            .run
            .take()
            .ok_or_else(|| VibeError::encode("ffmpeg audio encoder not started"))?;
        drop(run.stdin.take());
        run.process.wait("audio")?;
        Ok(EncodedStream {
            path: Some(self.out_path.clone()),
            units: run.samples,
        })
    }

    fn abort(&mut self) {
        if let Some(mut run) = self.run.take() {
            drop(run.stdin.take());
            run.process.kill();
        }
        let _ = std::fs::remove_file(&self.out_path);
    }
}

impl Drop for FfmpegAudioEncoder {
    fn drop(&mut self) {
        if self.run.is_some() {
            self.abort();
        }
    }
}

/// Stream-copies a video and an audio stream into one MP4.
#[derive(Clone, Debug)]
pub struct FfmpegMuxer {
    out_path: PathBuf,
    /// Delete the intermediate stream files after muxing or aborting.
    pub remove_inputs: bool,
    inputs: Vec<PathBuf>,
}

impl FfmpegMuxer {
    /// Muxer writing to `out_path`.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            remove_inputs: true,
            inputs: Vec::new(),
        }
    }

    fn cleanup_inputs(&mut self) {
        if self.remove_inputs {
            for p in self.inputs.drain(..) {
                let _ = std::fs::remove_file(p);
            }
        }
    }
}

impl Muxer for FfmpegMuxer {
    #[tracing::instrument(level = "debug", skip_all, fields(out = %self.out_path.display()))]
    fn finalize(&mut self, video: &EncodedStream, audio: &EncodedStream) -> VibeResult<PathBuf> {
        let (Some(v), Some(a)) = (video.path.as_ref(), audio.path.as_ref()) else {
            return Err(VibeError::encode(
                "ffmpeg muxer requires file-backed video and audio streams",
            ));
        };
        self.inputs = vec![v.clone(), a.clone()];
        ensure_parent_dir(&self.out_path)?;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-loglevel", "error", "-i"])
            .arg(v)
            .arg("-i")
            .arg(a)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c", "copy"])
            .args(["-movflags", "+faststart"])
            .arg(&self.out_path);
        let (process, stdin) = FfmpegProcess::spawn(cmd)?;
        drop(stdin);
        let result = process.wait("mux");
        self.cleanup_inputs();
        result?;
        Ok(self.out_path.clone())
    }

    fn abort(&mut self) {
        self.cleanup_inputs();
        let _ = std::fs::remove_file(&self.out_path);
    }
}

/// Encoding arguments placed after the raw input.
fn video_output_args(cfg: &VideoStreamConfig) -> Vec<String> {
    let gop = cfg.keyframe_interval.max(1).to_string();
    let forced = format!("expr:eq(mod(n,{gop}),0)");
    [
        "-an",
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-b:v",
        &cfg.bitrate.to_string(),
        "-g",
        &gop,
        "-keyint_min",
        &gop,
        "-sc_threshold",
        "0",
        "-force_key_frames",
        &forced,
        "-movflags",
        "+faststart",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input framerate as `num/den`.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> VibeResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(VibeError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (u16::from(s[0]) + scale_by_alpha(bg_r, inv)).min(255) as u8;
        d[1] = (u16::from(s[1]) + scale_by_alpha(bg_g, inv)).min(255) as u8;
        d[2] = (u16::from(s[2]) + scale_by_alpha(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Intermediate stream paths next to `out`: `<stem>.video.mp4` and `<stem>.audio.m4a`.
pub fn intermediate_paths(out: &Path) -> (PathBuf, PathBuf) {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let dir = out.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("{stem}.video.mp4")),
        dir.join(format!("{stem}.audio.m4a")),
    )
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> VibeResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Fail with [`VibeError::Encode`] when `ffmpeg` is not on `PATH`.
pub fn require_ffmpeg() -> VibeResult<()> {
    if is_ffmpeg_on_path() {
        Ok(())
    } else {
        Err(VibeError::encode(
            "ffmpeg is required for MP4 encoding, but was not found on PATH",
        ))
    }
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
