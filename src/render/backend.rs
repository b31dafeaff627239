use crate::foundation::math::checksum_bytes;

/// A rendered frame as RGBA8 pixels.
///
/// Frames produced by the compositor are **premultiplied alpha** and fully opaque. The
/// `premultiplied` flag is kept to make this explicit at encoder boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// RGBA value at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Content hash of the pixel data.
    pub fn checksum(&self) -> u64 {
        checksum_bytes(&self.data)
    }
}
