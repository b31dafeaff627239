use super::*;

#[test]
fn hex_colors_parse_with_fallback() {
    assert_eq!(
        Rgb8::parse_hex("#f8fafc"),
        Some(Rgb8 {
            r: 0xf8,
            g: 0xfa,
            b: 0xfc
        })
    );
    assert_eq!(
        Rgb8::parse_hex("00FF10"),
        Some(Rgb8 { r: 0, g: 255, b: 16 })
    );
    assert_eq!(Rgb8::parse_hex("#fff"), None);
    assert_eq!(Rgb8::parse_hex("#gg0000"), None);
    assert_eq!(Rgb8::parse_hex_or_fallback("nope"), FALLBACK_ACCENT);
}

#[test]
fn font_sizes_follow_presets() {
    assert_eq!(FontSize::Small.title_px(), 36.0);
    assert_eq!(FontSize::ExtraLarge.title_px(), 72.0);
    assert_eq!(FontSize::artist_px(48.0), 26.0);
    assert_eq!(FontSize::artist_px(60.0), 33.0);
}

#[test]
fn settings_deserialize_with_defaults() {
    let s: VisualSettings =
        serde_json::from_str(r#"{ "mode": "orbital", "anchor": "top_right", "color": "bad" }"#)
            .unwrap();
    assert_eq!(s.mode, VisualizationMode::Orbital);
    assert_eq!(s.anchor, TextAnchor::TopRight);
    assert!(s.anchor.is_right());
    assert_eq!(s.accent(), FALLBACK_ACCENT);
    assert!(s.ken_burns);
    assert_eq!(s.font_size, FontSize::Medium);

    let bad = VisualSettings {
        intensity: -1.0,
        ..VisualSettings::default()
    };
    assert!(bad.validate().is_err());
}
