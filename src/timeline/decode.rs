use std::io::Cursor;
use std::path::Path;

use crate::foundation::error::{VibeError, VibeResult};

/// Internal audio mixing sample rate used across decode/mix/encode pipeline.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

#[derive(Clone, Debug)]
/// Decoded interleaved floating-point PCM.
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved `f32` PCM samples.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.interleaved_f32.len() / usize::from(self.channels)
    }

    /// Decoded length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Whole-file audio decoder.
///
/// Implementations return linear PCM for the complete input or fail; there is no streaming
/// decode. Decoders must be `Send + Sync` so a cache can be moved into a render thread.
pub trait AudioDecoder: Send + Sync {
    /// Decode encoded file bytes.
    fn decode(&self, bytes: &[u8]) -> VibeResult<AudioPcm>;

    /// Decode a file on disk. The default reads the whole file and calls [`AudioDecoder::decode`].
    fn decode_path(&self, path: &Path) -> VibeResult<AudioPcm> {
        let bytes = std::fs::read(path).map_err(|e| {
            VibeError::decode(format!("failed to read audio '{}': {e}", path.display()))
        })?;
        self.decode(&bytes)
    }
}

/// In-process decoder for RIFF/WAVE files (PCM integer or IEEE float).
#[derive(Clone, Copy, Debug, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> VibeResult<AudioPcm> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| VibeError::decode(format!("wav header: {e}")))?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(VibeError::decode("wav has zero channels or sample rate"));
        }

        let interleaved_f32 = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| VibeError::decode(format!("wav samples: {e}")))?,
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| VibeError::decode(format!("wav samples: {e}")))?
            }
        };

        Ok(AudioPcm {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            interleaved_f32,
        })
    }
}

/// Decoder backed by the system `ffmpeg` binary; output is stereo at a fixed sample rate.
#[derive(Clone, Copy, Debug)]
pub struct FfmpegAudioDecoder {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for FfmpegAudioDecoder {
    fn default() -> Self {
        Self {
            sample_rate: MIX_SAMPLE_RATE,
        }
    }
}

impl AudioDecoder for FfmpegAudioDecoder {
    fn decode(&self, bytes: &[u8]) -> VibeResult<AudioPcm> {
        decode_audio_f32_stereo_bytes(bytes, self.sample_rate)
    }

    fn decode_path(&self, path: &Path) -> VibeResult<AudioPcm> {
        decode_audio_f32_stereo(path, self.sample_rate)
    }
}

/// Sniffs RIFF/WAVE input and decodes it in-process; everything else goes through `ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoDecoder {
    ffmpeg: FfmpegAudioDecoder,
}

impl AudioDecoder for AutoDecoder {
    fn decode(&self, bytes: &[u8]) -> VibeResult<AudioPcm> {
        if is_riff_wave(bytes) {
            return WavDecoder.decode(bytes);
        }
        self.ffmpeg.decode(bytes)
    }

    fn decode_path(&self, path: &Path) -> VibeResult<AudioPcm> {
        if has_wav_extension(path) {
            return WavDecoder.decode_path(path);
        }
        self.ffmpeg.decode_path(path)
    }
}

/// Return `true` when `bytes` starts with a RIFF/WAVE header.
pub fn is_riff_wave(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

/// Probe the playback duration of an audio file in seconds.
///
/// WAV headers are read in-process; other containers are probed with `ffprobe`.
pub fn probe_duration_secs(path: &Path) -> VibeResult<f64> {
    if has_wav_extension(path) {
        let reader = hound::WavReader::open(path)
            .map_err(|e| VibeError::decode(format!("wav header '{}': {e}", path.display())))?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(VibeError::decode("wav sample rate is zero"));
        }
        return Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate));
    }
    probe_duration_ffprobe(path)
}

#[cfg(feature = "media-ffmpeg")]
fn probe_duration_ffprobe(path: &Path) -> VibeResult<f64> {
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        format: ProbeFormat,
    }

    let out = std::process::Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format"])
        .arg(path)
        .output()
        .map_err(|e| VibeError::decode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(VibeError::decode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| VibeError::decode(format!("ffprobe json parse failed: {e}")))?;
    parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| VibeError::decode("ffprobe reported no duration"))
}

#[cfg(not(feature = "media-ffmpeg"))]
fn probe_duration_ffprobe(_path: &Path) -> VibeResult<f64> {
    Err(VibeError::decode(
        "non-WAV audio requires the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
/// Decode audio from a media file to stereo interleaved `f32` PCM.
pub fn decode_audio_f32_stereo(path: &Path, sample_rate: u32) -> VibeResult<AudioPcm> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args(ffmpeg_pcm_output_args(sample_rate).iter())
        .output()
        .map_err(|e| VibeError::decode(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        return Err(VibeError::decode(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    pcm_from_f32le(&out.stdout, sample_rate)
}

#[cfg(feature = "media-ffmpeg")]
/// Decode in-memory encoded audio by piping it through `ffmpeg`.
pub fn decode_audio_f32_stereo_bytes(bytes: &[u8], sample_rate: u32) -> VibeResult<AudioPcm> {
    use std::io::Write as _;
    use std::process::{Command, Stdio};

    let mut child = Command::new("ffmpeg")
        .args(["-v", "error", "-i", "pipe:0"])
        .args(ffmpeg_pcm_output_args(sample_rate).iter())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| VibeError::decode(format!("failed to spawn ffmpeg for audio decode: {e}")))?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| VibeError::decode("failed to open ffmpeg stdin (unexpected)"))?;

    // Feed stdin from a helper thread while this thread drains stdout; a single thread would
    // deadlock once both pipe buffers fill.
    let out = std::thread::scope(|scope| {
        scope.spawn(move || {
            // ffmpeg may stop reading early on corrupt input; the exit status reports that.
            let _ = stdin.write_all(bytes);
        });
        child.wait_with_output()
    })
    .map_err(|e| VibeError::decode(format!("failed to wait for ffmpeg: {e}")))?;

    if !out.status.success() {
        return Err(VibeError::decode(format!(
            "ffmpeg audio decode failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    pcm_from_f32le(&out.stdout, sample_rate)
}

#[cfg(feature = "media-ffmpeg")]
fn ffmpeg_pcm_output_args(sample_rate: u32) -> [String; 10] {
    [
        "-vn".to_string(),
        "-f".to_string(),
        "f32le".to_string(),
        "-acodec".to_string(),
        "pcm_f32le".to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-ar".to_string(),
        sample_rate.to_string(),
        "pipe:1".to_string(),
    ]
}

#[cfg(feature = "media-ffmpeg")]
fn pcm_from_f32le(bytes: &[u8], sample_rate: u32) -> VibeResult<AudioPcm> {
    if !bytes.len().is_multiple_of(4) {
        return Err(VibeError::decode(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    if bytes.is_empty() {
        return Err(VibeError::decode("ffmpeg produced no audio samples"));
    }
    let interleaved_f32 = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(AudioPcm {
        sample_rate,
        channels: 2,
        interleaved_f32,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
/// Decode audio from a media file to stereo interleaved `f32` PCM.
///
/// Returns an error when `media-ffmpeg` feature is disabled.
pub fn decode_audio_f32_stereo(_path: &Path, _sample_rate: u32) -> VibeResult<AudioPcm> {
    Err(VibeError::decode(
        "non-WAV audio requires the 'media-ffmpeg' feature",
    ))
}

#[cfg(not(feature = "media-ffmpeg"))]
/// Decode in-memory encoded audio by piping it through `ffmpeg`.
///
/// Returns an error when `media-ffmpeg` feature is disabled.
pub fn decode_audio_f32_stereo_bytes(_bytes: &[u8], _sample_rate: u32) -> VibeResult<AudioPcm> {
    Err(VibeError::decode(
        "non-WAV audio requires the 'media-ffmpeg' feature",
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/decode.rs"]
mod tests;
