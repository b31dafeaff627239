use super::*;

#[test]
fn checksum_matches_reference_fnv1a() {
    assert_eq!(checksum_bytes(b""), 0xcbf2_9ce4_8422_2325);
    assert_eq!(checksum_bytes(b"a"), 0xaf63_dc4c_8601_ec8c);
    assert_ne!(checksum_bytes(b"ab"), checksum_bytes(b"ba"));
}

#[test]
fn alpha_scaling_rounds_to_nearest() {
    assert_eq!(scale_by_alpha(255, 255), 255);
    assert_eq!(scale_by_alpha(200, 0), 0);
    assert_eq!(scale_by_alpha(255, 128), 128);
    assert_eq!(scale_by_alpha(100, 128), 50);
    assert_eq!(scale_by_alpha(1, 127), 0);
}
