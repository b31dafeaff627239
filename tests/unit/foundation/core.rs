use super::*;

#[test]
fn frame_range_iterates_half_open() {
    let r = FrameRange {
        start: FrameIndex(2),
        end: FrameIndex(5),
    };
    let frames: Vec<u64> = r.iter().map(|f| f.0).collect();
    assert_eq!(frames, vec![2, 3, 4]);

    let inverted = FrameRange {
        start: FrameIndex(5),
        end: FrameIndex(2),
    };
    assert_eq!(inverted.iter().count(), 0);
}

#[test]
fn fps_rejects_zero_terms() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    let ntsc = Fps::new(30000, 1001).unwrap();
    assert!((ntsc.as_f64() - 29.97).abs() < 1e-3);
}

#[test]
fn frame_start_times_map_back_to_the_same_frame() {
    let fps = Fps::new(30000, 1001).unwrap();
    for f in [0, 1, 123, 29_999] {
        let secs = fps.frames_to_secs(f);
        assert_eq!(fps.secs_to_frames_floor(secs + fps.frame_duration_secs() * 0.5), f);
    }
}

#[test]
fn secs_to_frames_ceil_counts_frames_starting_before_bound() {
    let fps = Fps::new(30, 1).unwrap();
    assert_eq!(fps.secs_to_frames_ceil(30.0), 900);
    assert_eq!(fps.secs_to_frames_ceil(5.0), 150);
    assert_eq!(fps.secs_to_frames_ceil(10.1), 303);
    assert_eq!(fps.secs_to_frames_ceil(10.11), 304);
    assert_eq!(fps.secs_to_frames_ceil(0.0), 0);
}

#[test]
fn frame_timestamps_are_rational() {
    let fps = Fps::new(30, 1).unwrap();
    assert_eq!(fps.frame_timestamp_us(FrameIndex(0)), 0);
    assert_eq!(fps.frame_timestamp_us(FrameIndex(30)), 1_000_000);
    assert_eq!(fps.frame_timestamp_us(FrameIndex(1)), 33_333);

    let ntsc = Fps::new(30000, 1001).unwrap();
    assert_eq!(ntsc.frame_timestamp_us(FrameIndex(30000)), 1_001_000_000);
}

#[test]
fn ui_scale_is_relative_to_1080p_with_a_floor() {
    let hd = Canvas {
        width: 1280,
        height: 720,
    };
    assert!((hd.ui_scale() - 720.0 / 1080.0).abs() < 1e-12);
    let thumb = Canvas {
        width: 64,
        height: 36,
    };
    assert_eq!(thumb.ui_scale(), 0.25);
}
