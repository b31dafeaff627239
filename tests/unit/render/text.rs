use super::*;

#[test]
fn layout_requires_a_registered_font() {
    let mut engine = TextLayoutEngine::new();
    let brush = TextBrushRgba8 {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };
    assert!(engine.layout_line("hello", 24.0, brush).is_err());
    assert!(engine.set_font(b"not a font").is_err());
}

#[test]
fn layout_rejects_bad_sizes() {
    let mut engine = TextLayoutEngine::new();
    assert!(
        engine
            .layout_line("x", f32::NAN, TextBrushRgba8::default())
            .is_err()
    );
    assert!(
        engine
            .layout_line("x", 0.0, TextBrushRgba8::default())
            .is_err()
    );
}

fn fixture_font() -> Vec<u8> {
    std::fs::read(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/data/fonts/DejaVuSansMono.ttf"
    ))
    .unwrap()
}

#[test]
fn real_font_shapes_lines_that_scale_with_size() {
    let mut engine = TextLayoutEngine::new();
    engine.set_font(&fixture_font()).unwrap();

    let small = engine
        .layout_line("Song", 24.0, TextBrushRgba8::default())
        .unwrap();
    let big = engine
        .layout_line("Song", 48.0, TextBrushRgba8::default())
        .unwrap();
    let longer = engine
        .layout_line("Songs", 24.0, TextBrushRgba8::default())
        .unwrap();

    assert!(small.width() > 0.0);
    assert!((big.width() / small.width() - 2.0).abs() < 0.1);
    assert!(big.height() > small.height());
    // Monospace: one more glyph adds a quarter of the four-glyph width.
    assert!((longer.width() / small.width() - 1.25).abs() < 0.05);
}
