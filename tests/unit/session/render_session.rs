use std::sync::Arc;

use super::*;
use crate::encode::sink::{InMemoryAudioEncoder, InMemoryMuxer, InMemoryVideoEncoder, NoProgress};
use crate::timeline::decode::WavDecoder;
use crate::timeline::model::{Timeline, Track, TrackId, TrackSource};

fn wav_bytes(secs: f64, sample_rate: u32, freq: f32) -> Arc<[u8]> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cur = std::io::Cursor::new(Vec::new());
    {
        let mut w = hound::WavWriter::new(&mut cur, spec).unwrap();
        let n = (secs * f64::from(sample_rate)).round() as u32;
        for i in 0..n {
            let t = i as f32 / sample_rate as f32;
            let v = 0.5 * (std::f32::consts::TAU * freq * t).sin();
            w.write_sample((v * f32::from(i16::MAX)) as i16).unwrap();
        }
        w.finalize().unwrap();
    }
    Arc::from(cur.into_inner())
}

fn track(id: u64, secs: f64, source: Arc<[u8]>) -> Track {
    Track::new(
        TrackId(id),
        TrackSource::Bytes(source),
        format!("Track {id}"),
        "",
        secs,
    )
}

fn cache(durations: &[f64]) -> TimelineCache {
    let tracks = durations
        .iter()
        .enumerate()
        .map(|(i, &d)| track(i as u64, d, wav_bytes(d, 8000, 220.0 * (i + 1) as f32)))
        .collect();
    TimelineCache::new(Timeline::new(tracks), WavDecoder)
}

fn small_cfg(chunk_secs: f64) -> RenderConfig {
    RenderConfig {
        width: 64,
        height: 36,
        fps: Fps { num: 10, den: 1 },
        sample_rate: 8000,
        chunk_secs,
        keyframe_interval_secs: 1.0,
        spectrum: SpectrumConfig {
            fft_size: 256,
            ..SpectrumConfig::default()
        },
        ..RenderConfig::default()
    }
}

fn session(durations: &[f64], chunk_secs: f64) -> RenderSession {
    RenderSession::new(
        cache(durations),
        small_cfg(chunk_secs),
        VisualSettings::default(),
        EnvelopeConfig::default(),
    )
    .unwrap()
}

struct Recorded {
    video: InMemoryVideoEncoder,
    audio: InMemoryAudioEncoder,
    muxer: InMemoryMuxer,
    progress: Vec<(f64, String)>,
    result: VibeResult<RenderReport>,
}

fn run(
    s: &mut RenderSession,
    video: InMemoryVideoEncoder,
    muxer: InMemoryMuxer,
    cancel: Option<&CancelToken>,
) -> Recorded {
    let mut video = video;
    let mut audio = InMemoryAudioEncoder::new();
    let mut muxer = muxer;
    let mut progress = Vec::new();
    let mut sink = |f: f64, msg: &str| progress.push((f, msg.to_string()));
    let result = s.render(
        RenderOutputs {
            video: &mut video,
            audio: &mut audio,
            muxer: &mut muxer,
        },
        &mut sink,
        cancel,
    );
    Recorded {
        video,
        audio,
        muxer,
        progress,
        result,
    }
}

#[test]
fn new_rejects_empty_and_zero_length_timelines() {
    let empty = TimelineCache::new(Timeline::new(Vec::new()), WavDecoder);
    let err = RenderSession::new(
        empty,
        small_cfg(1.0),
        VisualSettings::default(),
        EnvelopeConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, VibeError::Validation(_)));

    let zero = TimelineCache::new(
        Timeline::new(vec![track(0, 0.0, Arc::from(&b""[..]))]),
        WavDecoder,
    );
    let err = RenderSession::new(
        zero,
        small_cfg(1.0),
        VisualSettings::default(),
        EnvelopeConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, VibeError::Validation(_)));
}

#[test]
fn config_validation_catches_bad_fields() {
    let mut cfg = RenderConfig::default();
    assert!(cfg.validate().is_ok());
    cfg.chunk_secs = 0.0;
    assert!(cfg.validate().is_err());

    let cfg = RenderConfig {
        threads: Some(0),
        ..RenderConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = RenderConfig {
        width: 70_000,
        ..RenderConfig::default()
    };
    assert!(cfg.validate().is_err());
    assert_eq!(RenderConfig::default().keyframe_interval_frames(), 60);
}

#[test]
fn export_produces_every_frame_and_sample() {
    let mut s = session(&[1.0, 1.5, 0.5], 1.0);
    let rec = run(&mut s, InMemoryVideoEncoder::new(), InMemoryMuxer::new(), None);
    let report = rec.result.unwrap();

    assert_eq!(s.phase(), RenderPhase::Done);
    assert_eq!(report.output, PathBuf::from("in-memory.mp4"));
    assert_eq!(report.stats.chunks, 3);
    assert_eq!(report.stats.frames_encoded, 30);
    assert_eq!(report.stats.key_frames, 3);
    assert_eq!(report.stats.audio_samples, 24_000);
    assert_eq!(report.stats.failed_tracks, 0);

    assert_eq!(rec.video.frames.len(), 30);
    assert!(rec.video.finished);
    let keys: Vec<usize> = (0..30).filter(|&i| rec.video.frames[i].key_frame).collect();
    assert_eq!(keys, vec![0, 10, 20]);
    for w in rec.video.frames.windows(2) {
        assert!(w[0].timestamp_us < w[1].timestamp_us);
    }
    assert_eq!(rec.video.frames[29].timestamp_us, 2_900_000);

    assert_eq!(
        rec.audio.chunks,
        vec![(0, 8000), (1_000_000, 8000), (2_000_000, 8000)]
    );
    let (v, a) = rec.muxer.finalized.clone().unwrap();
    assert_eq!(v.units, 30);
    assert_eq!(a.units, 24_000);

    let fractions: Vec<f64> = rec.progress.iter().map(|(f, _)| *f).collect();
    for w in fractions.windows(2) {
        assert!(w[0] < w[1], "{fractions:?}");
    }
    assert_eq!(rec.progress.last().unwrap(), &(1.0, "Done".to_string()));
    assert!(rec.progress.iter().any(|(_, m)| m == "Rendering 1s / 3s"));
}

#[test]
fn chunk_length_does_not_change_output() {
    let render = |chunk_secs: f64| {
        let mut s = session(&[0.8, 1.25], chunk_secs);
        let rec = run(&mut s, InMemoryVideoEncoder::new(), InMemoryMuxer::new(), None);
        rec.result.unwrap();
        (rec.video.frames, rec.audio.pcm.unwrap())
    };
    let (frames_a, pcm_a) = render(0.5);
    let (frames_b, pcm_b) = render(1.3);
    assert_eq!(frames_a, frames_b);
    assert_eq!(pcm_a, pcm_b);
}

#[test]
fn backed_up_encoder_is_flushed() {
    let mut s = session(&[1.0], 1.0);
    let rec = run(
        &mut s,
        InMemoryVideoEncoder::new().with_backlog(),
        InMemoryMuxer::new(),
        None,
    );
    let report = rec.result.unwrap();
    // Queue limit 5: the seventh frame finds six queued and waits.
    assert_eq!(report.stats.backpressure_waits, 1);
    assert_eq!(rec.video.frames.len(), 10);
    assert!(rec.video.flushes as u64 > report.stats.backpressure_waits);
}

#[test]
fn cancel_stops_before_the_next_chunk() {
    let mut s = session(&[1.0, 1.0], 0.5);
    let token = CancelToken::new();
    token.cancel();
    let rec = run(&mut s, InMemoryVideoEncoder::new(), InMemoryMuxer::new(), Some(&token));
    assert!(matches!(rec.result, Err(VibeError::Cancelled)));
    assert_eq!(s.phase(), RenderPhase::Cancelled);
    assert!(rec.video.frames.is_empty());
    assert!(rec.video.flushes >= 1);
    assert!(rec.video.aborted && rec.audio.aborted && rec.muxer.aborted);
    assert_eq!(rec.progress.last().unwrap().1, "Export cancelled");
}

#[test]
fn muxer_failure_aborts_everything() {
    let mut s = session(&[0.5], 1.0);
    let mut muxer = InMemoryMuxer::new();
    muxer.fail_with = Some("disk full".to_string());
    let rec = run(&mut s, InMemoryVideoEncoder::new(), muxer, None);
    let err = rec.result.unwrap_err();
    assert!(matches!(err, VibeError::Encode(_)));
    assert_eq!(s.phase(), RenderPhase::Error);
    assert!(rec.video.aborted && rec.audio.aborted && rec.muxer.aborted);
    let (fraction, msg) = rec.progress.last().unwrap();
    assert!(msg.starts_with("Export failed:"), "{msg}");
    assert!(*fraction < 1.0);
}

#[test]
fn corrupt_track_counts_as_failed_and_stays_silent() {
    let tracks = vec![
        track(0, 0.5, wav_bytes(0.5, 8000, 440.0)),
        track(1, 0.5, Arc::from(&b"definitely not audio"[..])),
        track(2, 0.5, wav_bytes(0.5, 8000, 440.0)),
    ];
    let cache = TimelineCache::new(Timeline::new(tracks), WavDecoder);
    let mut s = RenderSession::new(
        cache,
        small_cfg(0.5),
        VisualSettings::default(),
        EnvelopeConfig::default(),
    )
    .unwrap();
    let rec = run(&mut s, InMemoryVideoEncoder::new(), InMemoryMuxer::new(), None);
    let report = rec.result.unwrap();
    assert_eq!(report.stats.failed_tracks, 1);
    assert_eq!(report.stats.frames_encoded, 15);

    let pcm = rec.audio.pcm.unwrap();
    let left = pcm.channel(0);
    assert!(left[4000..8000].iter().all(|&s| s == 0.0));
    assert!(left[..4000].iter().any(|&s| s.abs() > 0.1));
    assert!(left[8000..].iter().any(|&s| s.abs() > 0.1));
}

#[test]
fn preview_frame_has_output_size() {
    let mut s = session(&[1.0, 1.0], 1.0);
    let frame = s.render_frame_at(1.25).unwrap();
    assert_eq!((frame.width, frame.height), (64, 36));
    assert!(s.render_frame_at(2.0).is_err());
    assert!(s.render_frame_at(-0.1).is_err());
    assert!(s.render_frame_at(f64::NAN).is_err());
    assert_eq!(s.phase(), RenderPhase::Idle);
}

#[test]
fn session_is_reusable_after_an_export() {
    let mut s = session(&[0.5], 1.0);
    let first = run(&mut s, InMemoryVideoEncoder::new(), InMemoryMuxer::new(), None);
    first.result.unwrap();
    let mut video = InMemoryVideoEncoder::new();
    let mut audio = InMemoryAudioEncoder::new();
    let mut muxer = InMemoryMuxer::new();
    let report = s
        .render(
            RenderOutputs {
                video: &mut video,
                audio: &mut audio,
                muxer: &mut muxer,
            },
            &mut NoProgress,
            None,
        )
        .unwrap();
    assert_eq!(report.stats.frames_encoded, 5);
    assert_eq!(first.video.frames, video.frames);
}

#[test]
fn config_residency_cap_is_applied_to_the_cache() {
    let cfg = RenderConfig {
        residency_cap: 1,
        ..small_cfg(1.0)
    };
    let mut s = RenderSession::new(
        cache(&[1.0, 1.0, 1.0, 1.0]),
        cfg,
        VisualSettings::default(),
        EnvelopeConfig::default(),
    )
    .unwrap();
    assert_eq!(s.cache().residency_cap(), 1);

    let rec = run(&mut s, InMemoryVideoEncoder::new(), InMemoryMuxer::new(), None);
    let report = rec.result.unwrap();
    assert_eq!(report.stats.frames_encoded, 40);
    assert_eq!(report.cache.decodes, 4);
    // Chunk windows reach back into the previous track, so two stay resident at a boundary.
    assert!(report.cache.resident <= 2, "{:?}", report.cache);
    assert!(report.cache.evictions >= 2, "{:?}", report.cache);
}
