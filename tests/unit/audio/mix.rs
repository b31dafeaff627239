use super::*;

fn pcm(sample_rate: u32, channels: u16, interleaved_f32: Vec<f32>) -> AudioPcm {
    AudioPcm {
        sample_rate,
        channels,
        interleaved_f32,
    }
}

#[test]
fn frame_to_sample_uses_rational_fps() {
    // 30000/1001 ~ 29.97
    let ntsc = Fps {
        num: 30_000,
        den: 1001,
    };
    assert_eq!(frame_to_sample(0, ntsc, 48_000), 0);
    assert_eq!(frame_to_sample(30_000, ntsc, 48_000), 48_048_000);

    let fps = Fps { num: 30, den: 1 };
    assert_eq!(frame_to_sample(1, fps, 48_000), 1600);
    assert_eq!(secs_to_sample(10.0, 48_000), 480_000);
    assert_eq!(secs_to_sample(-1.0, 48_000), 0);
}

#[test]
fn placement_handles_sources_starting_before_and_inside_window() {
    // Source began before the window: read from inside the source.
    assert_eq!(
        placement(0, 1000, 400, 200),
        Some(Placement {
            dst_offset: 0,
            src_offset: 400,
            count: 200
        })
    );
    // Source starts inside the window and ends before it does.
    assert_eq!(
        placement(450, 100, 400, 200),
        Some(Placement {
            dst_offset: 50,
            src_offset: 0,
            count: 100
        })
    );
    // Negative window start (look-back prefix before the timeline).
    assert_eq!(
        placement(0, 100, -50, 100),
        Some(Placement {
            dst_offset: 50,
            src_offset: 0,
            count: 50
        })
    );
    assert_eq!(placement(0, 100, 100, 10), None);
    assert_eq!(placement(10, 0, 0, 100), None);
}

#[test]
fn mono_source_feeds_both_channels() {
    let a = pcm(48_000, 1, vec![0.25; 100]);
    let out = mix_window(
        &[MixSource {
            pcm: &a,
            start_sample: 10,
            len_samples: 100,
        }],
        0,
        50,
        48_000,
        2,
    );
    assert_eq!(out.frames(), 50);
    assert_eq!(out.channel(0)[9], 0.0);
    assert_eq!(out.channel(0)[10], 0.25);
    assert_eq!(out.channel(1)[49], 0.25);
}

#[test]
fn sources_sum_and_clamp() {
    let a = pcm(48_000, 2, vec![0.8; 200]);
    let b = pcm(48_000, 2, vec![0.7; 200]);
    let sources = [
        MixSource {
            pcm: &a,
            start_sample: 0,
            len_samples: 100,
        },
        MixSource {
            pcm: &b,
            start_sample: 50,
            len_samples: 100,
        },
    ];
    let out = mix_window(&sources, 0, 150, 48_000, 2);
    assert!((out.channel(0)[10] - 0.8).abs() < 1e-6);
    assert_eq!(out.channel(0)[60], 1.0);
    assert!((out.channel(1)[120] - 0.7).abs() < 1e-6);
}

#[test]
fn declared_span_cuts_long_audio_and_pads_short_audio() {
    let long = pcm(48_000, 1, vec![0.5; 1000]);
    let short = pcm(48_000, 1, vec![0.5; 10]);
    let out = mix_window(
        &[
            MixSource {
                pcm: &long,
                start_sample: 0,
                len_samples: 20,
            },
            MixSource {
                pcm: &short,
                start_sample: 20,
                len_samples: 30,
            },
        ],
        0,
        60,
        48_000,
        1,
    );
    assert_eq!(out.channel(0)[19], 0.5);
    assert_eq!(out.channel(0)[29], 0.5);
    assert_eq!(out.channel(0)[30], 0.0);
    assert_eq!(out.channel(0)[55], 0.0);
}

#[test]
fn resamples_with_linear_interpolation() {
    let src = pcm(24_000, 1, vec![0.0, 1.0, 0.0, 1.0]);
    let out = mix_window(
        &[MixSource {
            pcm: &src,
            start_sample: 0,
            len_samples: 8,
        }],
        0,
        8,
        48_000,
        1,
    );
    let ch = out.channel(0);
    assert_eq!(ch[0], 0.0);
    assert!((ch[1] - 0.5).abs() < 1e-6);
    assert_eq!(ch[2], 1.0);
    assert!((ch[3] - 0.5).abs() < 1e-6);
}

#[test]
fn split_windows_match_single_window() {
    let data: Vec<f32> = (0..4000).map(|i| ((i as f32) * 0.013).sin() * 0.5).collect();
    let a = pcm(44_100, 2, data);
    let sources = [MixSource {
        pcm: &a,
        start_sample: 123,
        len_samples: 1800,
    }];

    let whole = mix_window(&sources, -64, 2000, 48_000, 2);
    let first = mix_window(&sources, -64, 700, 48_000, 2);
    let second = mix_window(&sources, 636, 1300, 48_000, 2);

    for c in 0..2 {
        let mut joined = first.channel(c).to_vec();
        joined.extend_from_slice(second.channel(c));
        assert_eq!(joined.as_slice(), whole.channel(c));
    }
}

#[test]
fn planar_helpers_slice_interleave_and_window() {
    let p = PlanarPcm {
        sample_rate: 48_000,
        planes: vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]],
    };
    assert_eq!(p.to_interleaved(), vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    assert_eq!(p.slice_frames(1, 5).planes, vec![vec![2.0, 3.0], vec![-2.0, -3.0]]);

    let q = PlanarPcm {
        sample_rate: 48_000,
        planes: vec![vec![1.0, 2.0, 3.0], vec![3.0, 4.0, 5.0]],
    };
    // Window ending at frame 2 with length 4: two leading positions fall before the buffer.
    assert_eq!(q.mono_window(2, 4), vec![0.0, 0.0, 2.0, 3.0]);
    assert_eq!(q.mono_window(4, 2), vec![4.0, 0.0]);
}
