use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{VibeError, VibeResult};
use crate::foundation::math::scale_by_alpha;

/// Decoded background image, premultiplied and ready to paint.
#[derive(Clone)]
pub struct BackgroundImage {
    width: u32,
    height: u32,
    rgba8_premul: Arc<Vec<u8>>,
    paint: vello_cpu::Image,
}

impl std::fmt::Debug for BackgroundImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl BackgroundImage {
    /// Decode any format supported by `image`.
    pub fn decode(bytes: &[u8]) -> VibeResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode background image")?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Build from straight-alpha RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, mut rgba8: Vec<u8>) -> VibeResult<Self> {
        if width == 0 || height == 0 {
            return Err(VibeError::decode("background image has zero size"));
        }
        if rgba8.len() != (width as usize) * (height as usize) * 4 {
            return Err(VibeError::decode("background image byte len mismatch"));
        }
        premultiply_rgba8_in_place(&mut rgba8);
        let pixmap = pixmap_from_premul_bytes(&rgba8, width, height)?;
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8),
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied RGBA8 pixels.
    pub fn rgba8_premul(&self) -> &[u8] {
        &self.rgba8_premul
    }

    pub(crate) fn paint(&self) -> vello_cpu::Image {
        self.paint.clone()
    }
}

/// Load the background image at `path`.
///
/// Failures are logged and yield `None`, so the frame falls back to the solid background.
pub fn load_background(path: &Path) -> Option<BackgroundImage> {
    let loaded = std::fs::read(path)
        .map_err(|e| VibeError::decode(format!("failed to read '{}': {e}", path.display())))
        .and_then(|bytes| BackgroundImage::decode(&bytes));
    match loaded {
        Ok(img) => {
            tracing::debug!(path = %path.display(), width = img.width, height = img.height, "background loaded");
            Some(img)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "background image unavailable; using solid fill");
            None
        }
    }
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        for c in &mut px[..3] {
            *c = scale_by_alpha(u16::from(*c), a) as u8;
        }
    }
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> VibeResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| VibeError::evaluation("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| VibeError::evaluation("pixmap height exceeds u16"))?;
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect::<Vec<_>>();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/background.rs"]
mod tests;
