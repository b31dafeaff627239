use super::*;

#[test]
fn source_bins_are_exponential_and_increasing() {
    assert_eq!(source_bin(0), 2); // 1.18^5 = 2.28
    assert_eq!(source_bin(1), 2); // 1.18^6 = 2.69
    assert_eq!(source_bin(31), 387); // 1.18^36 = 387.7
    for b in 1..BAND_COUNT {
        assert!(source_bin(b) >= source_bin(b - 1));
    }
}

#[test]
fn constant_full_scale_rises_toward_gain_ceiling_and_never_exceeds_it() {
    let mut env = FrequencyEnvelope::default();
    let full = vec![1.0f32; 1024];
    let mut prev = [0.0f32; BAND_COUNT];
    for _ in 0..60 {
        let s = *env.update(&full);
        for b in 0..BAND_COUNT {
            assert!(s[b] >= prev[b]);
            assert!(s[b] <= 1.3 + 1e-6);
        }
        prev = s;
    }
    for v in env.state() {
        assert!((v - 1.3).abs() < 1e-3);
    }
}

#[test]
fn decay_is_slower_than_attack() {
    let mut env = FrequencyEnvelope::default();
    let full = vec![255u8; 1024];
    let rise_frames = (0..)
        .position(|_| env.update_u8(&full)[0] > 0.9 * 1.3)
        .unwrap();

    let peak = env.state()[0];
    let fall_frames = (0..)
        .position(|_| env.update_u8(&[])[0] < peak * 0.1)
        .unwrap();

    assert!(fall_frames > rise_frames, "{fall_frames} <= {rise_frames}");
    assert!(env.state().iter().all(|v| *v >= 0.0));
}

#[test]
fn undersized_input_decays_toward_silence() {
    let mut env = FrequencyEnvelope::default();
    env.update(&vec![1.0; 1024]);
    let before = env.state()[10];
    env.update(&[0.5; 3]);
    assert!(env.state()[10] < before);
    assert!(env.state()[10] > 0.0);
}

#[test]
fn reset_zeroes_state() {
    let mut env = FrequencyEnvelope::default();
    env.update(&vec![1.0; 1024]);
    env.reset();
    assert!(env.state().iter().all(|v| *v == 0.0));
}

#[test]
fn config_validation_rejects_out_of_range_coefficients() {
    assert!(EnvelopeConfig::default().validate().is_ok());
    let bad = EnvelopeConfig {
        attack: 0.0,
        ..EnvelopeConfig::default()
    };
    assert!(bad.validate().is_err());
    let bad = EnvelopeConfig {
        decay: 1.5,
        ..EnvelopeConfig::default()
    };
    assert!(bad.validate().is_err());
}
