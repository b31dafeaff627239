use super::*;

fn frame(w: u32, h: u32, v: u8) -> FrameRGBA {
    FrameRGBA {
        width: w,
        height: h,
        data: vec![v; (w * h * 4) as usize],
        premultiplied: true,
    }
}

fn video_cfg() -> VideoStreamConfig {
    VideoStreamConfig {
        width: 2,
        height: 2,
        fps: Fps::new(30, 1).unwrap(),
        bitrate: 1_000_000,
        keyframe_interval: 60,
    }
}

#[test]
fn in_memory_video_records_in_order() {
    let mut enc = InMemoryVideoEncoder::new().keep_pixels();
    assert!(enc.encode(&frame(2, 2, 0), 0, true).is_err(), "not started");
    enc.begin(video_cfg()).unwrap();
    enc.encode(&frame(2, 2, 1), 0, true).unwrap();
    enc.encode(&frame(2, 2, 2), 33_333, false).unwrap();
    assert!(enc.encode(&frame(2, 2, 3), 33_333, false).is_err());
    assert!(enc.encode(&frame(4, 2, 3), 66_667, false).is_err());

    let out = enc.finish().unwrap();
    assert_eq!(out.units, 2);
    assert_eq!(enc.pixels.len(), 2);
    assert!(enc.frames[0].key_frame);
    assert_ne!(enc.frames[0].checksum, enc.frames[1].checksum);
}

#[test]
fn backlog_mode_holds_frames_until_flush() {
    let mut enc = InMemoryVideoEncoder::new().with_backlog();
    enc.begin(video_cfg()).unwrap();
    for i in 0..4u64 {
        enc.encode(&frame(2, 2, 0), i * 10, false).unwrap();
    }
    assert_eq!(enc.queue_depth(), 4);
    enc.flush().unwrap();
    assert_eq!(enc.queue_depth(), 0);
    assert_eq!(enc.flushes, 1);
}

#[test]
fn in_memory_audio_concatenates_chunks() {
    let mut enc = InMemoryAudioEncoder::new();
    enc.begin(AudioStreamConfig {
        sample_rate: 10,
        channels: 2,
        bitrate: 128_000,
    })
    .unwrap();
    let a = PlanarPcm {
        sample_rate: 10,
        planes: vec![vec![0.1, 0.2], vec![-0.1, -0.2]],
    };
    let b = PlanarPcm {
        sample_rate: 10,
        planes: vec![vec![0.3], vec![-0.3]],
    };
    enc.encode(&a, 0).unwrap();
    enc.encode(&b, 200_000).unwrap();
    assert!(enc.encode(&b, 200_000).is_err());
    assert!(
        enc.encode(&PlanarPcm::silent(10, 1, 3), 400_000).is_err(),
        "channel mismatch"
    );

    let out = enc.finish().unwrap();
    assert_eq!(out.units, 3);
    assert_eq!(enc.pcm.as_ref().unwrap().channel(0), &[0.1, 0.2, 0.3]);
    assert_eq!(enc.chunks, vec![(0, 2), (200_000, 1)]);
}

#[test]
fn closures_are_progress_sinks() {
    let mut seen = Vec::new();
    {
        let mut sink = |f: f64, s: &str| seen.push((f, s.to_string()));
        sink.report(0.5, "half");
        NoProgress.report(1.0, "ignored");
    }
    assert_eq!(seen, vec![(0.5, "half".to_string())]);
}

#[test]
fn muxer_records_or_fails() {
    let mut m = InMemoryMuxer::new();
    let v = EncodedStream {
        path: None,
        units: 3,
    };
    let a = EncodedStream::default();
    assert_eq!(m.finalize(&v, &a).unwrap(), PathBuf::from("in-memory.mp4"));
    assert_eq!(m.finalized, Some((v.clone(), a.clone())));

    let mut failing = InMemoryMuxer {
        fail_with: Some("disk full".into()),
        ..InMemoryMuxer::default()
    };
    assert!(failing.finalize(&v, &a).is_err());
}
