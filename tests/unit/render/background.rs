use std::io::Cursor;

use super::*;

#[test]
fn decode_png_dimensions_and_premul() {
    let src_rgba = vec![100u8, 50u8, 200u8, 128u8, 10, 20, 30, 255];
    let img = image::RgbaImage::from_raw(2, 1, src_rgba).unwrap();

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();

    let bg = BackgroundImage::decode(&buf).unwrap();
    assert_eq!((bg.width(), bg.height()), (2, 1));
    assert_eq!(
        bg.rgba8_premul(),
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8,
            10,
            20,
            30,
            255
        ]
    );
}

#[test]
fn missing_or_corrupt_images_degrade_to_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_background(&dir.path().join("missing.png")).is_none());

    let corrupt = dir.path().join("corrupt.png");
    std::fs::write(&corrupt, b"\x89PNG not really").unwrap();
    assert!(load_background(&corrupt).is_none());

    assert!(BackgroundImage::from_rgba8(0, 4, vec![]).is_err());
    assert!(BackgroundImage::from_rgba8(2, 2, vec![0; 3]).is_err());
}
