use std::path::{Path, PathBuf};

use crate::audio::envelope::EnvelopeState;
use crate::foundation::core::{Affine, BezPath, Canvas, Rect};
use crate::render::backend::FrameRGBA;
use crate::render::background::{BackgroundImage, pixmap_from_premul_bytes};
use crate::render::style::{FontSize, Rgb8, TextAnchor, VisualSettings, VisualizationMode};
use crate::render::text::{TextBrushRgba8, TextLayoutEngine};
use crate::render::viz;
use crate::timeline::model::{Track, TrackId};

const BACKGROUND: Rgb8 = Rgb8 { r: 3, g: 3, b: 4 };
const TITLE_COLOR: Rgb8 = Rgb8 {
    r: 0xf8,
    g: 0xfa,
    b: 0xfc,
};
const ARTIST_ALPHA: u8 = 166; // 65%
const TITLE_GAP: f64 = 12.0;
const PROGRESS_GAP: f64 = 16.0;
const PROGRESS_HEIGHT: f64 = 8.0;
const PROGRESS_WIDTH: f64 = 400.0;
const PROGRESS_TRACK_ALPHA: u8 = 30;

/// Inputs for one composed frame.
#[derive(Clone, Copy, Debug)]
pub struct ComposeParams<'a> {
    /// Smoothed band values.
    pub envelope: &'a EnvelopeState,
    /// Background image, if one loaded.
    pub background: Option<&'a BackgroundImage>,
    /// Track currently playing.
    pub track: Option<&'a Track>,
    /// Playback position inside the track, in seconds.
    pub track_time: f64,
    /// Duration of the track, in seconds.
    pub track_duration: f64,
    /// Whether playback is running (gates the pan/zoom).
    pub is_playing: bool,
    /// Time driving procedural motion, in seconds.
    pub elapsed: f64,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Visual settings.
    pub settings: &'a VisualSettings,
}

struct TitleBlock {
    key: (TrackId, String, String, u32),
    title: parley::Layout<TextBrushRgba8>,
    artist: parley::Layout<TextBrushRgba8>,
}

struct FontSlot {
    path: PathBuf,
    font: Option<vello_cpu::peniko::FontData>,
}

/// Draws the background, the visualization and the title block into RGBA frames.
///
/// Holds only caches (raster context, font, text layouts, vignette); output is a pure function
/// of [`ComposeParams`]. Composition never fails: missing inputs simply drop their layer.
pub struct VisualFrameCompositor {
    ctx: Option<vello_cpu::RenderContext>,
    text: TextLayoutEngine,
    font: Option<FontSlot>,
    title: Option<TitleBlock>,
    vignette: Option<(u32, u32, vello_cpu::Image)>,
}

impl Default for VisualFrameCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for VisualFrameCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualFrameCompositor")
            .field("font", &self.font.as_ref().map(|s| &s.path))
            .finish()
    }
}

impl VisualFrameCompositor {
    /// Compositor with empty caches.
    pub fn new() -> Self {
        Self {
            ctx: None,
            text: TextLayoutEngine::new(),
            font: None,
            title: None,
            vignette: None,
        }
    }

    /// Render one frame. Zero-sized requests yield an empty frame.
    pub fn compose(&mut self, p: &ComposeParams<'_>) -> FrameRGBA {
        let (Ok(w16), Ok(h16)) = (u16::try_from(p.width), u16::try_from(p.height)) else {
            tracing::warn!(width = p.width, height = p.height, "frame size exceeds u16; skipped");
            return empty_frame(0, 0);
        };
        if w16 == 0 || h16 == 0 {
            return empty_frame(0, 0);
        }

        let canvas = Canvas {
            width: p.width,
            height: p.height,
        };
        let ui = canvas.ui_scale();
        self.sync_font(p.settings.font_path.as_deref());
        let vignette = self.vignette_paint(p.width, p.height);
        let title = self.title_block(p, ui);

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w16 && ctx.height() == h16 => ctx,
            _ => vello_cpu::RenderContext::new(w16, h16),
        };
        ctx.reset();
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());

        let (w, h) = (f64::from(p.width), f64::from(p.height));
        draw_background(&mut ctx, p, w, h, ui);
        if let Some(v) = vignette {
            ctx.set_transform(affine_to_cpu(Affine::translate((0.0, h - (h * 0.5).ceil()))));
            ctx.set_paint(v);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, (h * 0.5).ceil()));
        }
        draw_visualization(&mut ctx, p, w, h, ui);
        self.draw_overlay(&mut ctx, p, title, w, h, ui);

        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);
        self.ctx = Some(ctx);

        FrameRGBA {
            width: p.width,
            height: p.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }

    fn sync_font(&mut self, path: Option<&Path>) {
        let Some(path) = path else {
            self.font = None;
            self.title = None;
            return;
        };
        if self.font.as_ref().is_some_and(|s| s.path == path) {
            return;
        }

        self.title = None;
        let loaded = std::fs::read(path)
            .map_err(|e| crate::VibeError::decode(format!("failed to read font: {e}")))
            .and_then(|bytes| {
                self.text.set_font(&bytes)?;
                Ok(vello_cpu::peniko::FontData::new(
                    vello_cpu::peniko::Blob::from(bytes),
                    0,
                ))
            });
        let font = match loaded {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "font unavailable; titles disabled"
                );
                None
            }
        };
        self.font = Some(FontSlot {
            path: path.to_path_buf(),
            font,
        });
    }

    fn title_block(&mut self, p: &ComposeParams<'_>, ui: f64) -> Option<TitleSnapshot> {
        if !p.settings.show_title {
            return None;
        }
        let track = p.track?;
        if self.font.as_ref().and_then(|s| s.font.as_ref()).is_none() {
            return None;
        }

        let title_px = (f64::from(p.settings.font_size.title_px()) * ui) as f32;
        let key = (
            track.id,
            track.display_name().to_string(),
            track.display_artist().to_string(),
            title_px.to_bits(),
        );
        if self.title.as_ref().is_none_or(|t| t.key != key) {
            let title_brush = TextBrushRgba8 {
                r: TITLE_COLOR.r,
                g: TITLE_COLOR.g,
                b: TITLE_COLOR.b,
                a: 255,
            };
            let artist_brush = TextBrushRgba8 {
                a: ARTIST_ALPHA,
                ..title_brush
            };
            let built = self
                .text
                .layout_line(&key.1, title_px, title_brush)
                .and_then(|title| {
                    let artist_px = FontSize::artist_px(title_px);
                    let artist = self.text.layout_line(&key.2, artist_px, artist_brush)?;
                    Ok((title, artist))
                });
            match built {
                Ok((title, artist)) => self.title = Some(TitleBlock { key, title, artist }),
                Err(e) => {
                    tracing::warn!(track = %track.id, error = %e, "title layout failed");
                    self.title = None;
                    return None;
                }
            }
        }

        let block = self.title.as_ref()?;
        let gap = TITLE_GAP * ui;
        Some(TitleSnapshot {
            width: f64::from(block.title.width().max(block.artist.width())),
            title_height: f64::from(block.title.height()),
            height: f64::from(block.title.height()) + gap + f64::from(block.artist.height()),
        })
    }

    fn vignette_paint(&mut self, width: u32, height: u32) -> Option<vello_cpu::Image> {
        if let Some((w, h, img)) = &self.vignette
            && *w == width
            && *h == height
        {
            return Some(img.clone());
        }
        let vh = (f64::from(height) * 0.5).ceil() as u32;
        let bytes = vignette_bytes(width, vh);
        let pixmap = match pixmap_from_premul_bytes(&bytes, width, vh) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "vignette skipped");
                return None;
            }
        };
        let img = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.vignette = Some((width, height, img.clone()));
        Some(img)
    }

    fn draw_overlay(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        p: &ComposeParams<'_>,
        title: Option<TitleSnapshot>,
        w: f64,
        h: f64,
        ui: f64,
    ) {
        let progress = progress_fraction(p);
        if title.is_none() && progress.is_none() {
            return;
        }

        let pad = viz::PADDING * ui;
        let bar_w = PROGRESS_WIDTH * ui;
        let bar_h = PROGRESS_HEIGHT * ui;
        let min_w = if progress.is_some() { bar_w } else { 0.0 };
        let block_w = title.map_or(bar_w, |t| t.width.max(min_w));
        let block_h = title.map_or(0.0, |t| t.height)
            + match (title, progress) {
                (Some(_), Some(_)) => PROGRESS_GAP * ui + bar_h,
                (None, Some(_)) => bar_h,
                _ => 0.0,
            };

        let x = match p.settings.anchor {
            TextAnchor::TopLeft | TextAnchor::BottomLeft => pad,
            TextAnchor::TopRight | TextAnchor::BottomRight => w - pad - block_w,
            TextAnchor::Center => (w - block_w) * 0.5,
        };
        let y = match p.settings.anchor {
            TextAnchor::TopLeft | TextAnchor::TopRight => pad,
            TextAnchor::BottomLeft | TextAnchor::BottomRight => h - pad - block_h,
            TextAnchor::Center => (h - block_h) * 0.5,
        };
        let align = |item_w: f64| match p.settings.anchor {
            TextAnchor::TopRight | TextAnchor::BottomRight => x + block_w - item_w,
            TextAnchor::Center => x + (block_w - item_w) * 0.5,
            _ => x,
        };

        let mut cursor = y;
        if let (Some(t), Some(block), Some(font)) = (
            title,
            self.title.as_ref(),
            self.font.as_ref().and_then(|s| s.font.as_ref()),
        ) {
            let title_x = align(f64::from(block.title.width()));
            draw_layout(ctx, &block.title, font, title_x, cursor);
            let artist_x = align(f64::from(block.artist.width()));
            let artist_y = cursor + t.title_height + TITLE_GAP * ui;
            draw_layout(ctx, &block.artist, font, artist_x, artist_y);
            cursor += t.height + PROGRESS_GAP * ui;
        }

        if let Some(frac) = progress {
            let bx = align(bar_w);
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                255,
                255,
                255,
                PROGRESS_TRACK_ALPHA,
            ));
            ctx.fill_rect(&rect_to_cpu(Rect::new(bx, cursor, bx + bar_w, cursor + bar_h)));
            if frac > 0.0 {
                let accent = p.settings.accent();
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    accent.r, accent.g, accent.b, 255,
                ));
                ctx.fill_rect(&rect_to_cpu(Rect::new(
                    bx,
                    cursor,
                    bx + bar_w * frac,
                    cursor + bar_h,
                )));
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct TitleSnapshot {
    width: f64,
    title_height: f64,
    height: f64,
}

fn empty_frame(width: u32, height: u32) -> FrameRGBA {
    FrameRGBA {
        width,
        height,
        data: vec![0; (width as usize) * (height as usize) * 4],
        premultiplied: true,
    }
}

fn progress_fraction(p: &ComposeParams<'_>) -> Option<f64> {
    if !p.settings.show_progress || p.track.is_none() {
        return None;
    }
    if !(p.track_duration.is_finite() && p.track_duration > 0.0) {
        return None;
    }
    Some((p.track_time / p.track_duration).clamp(0.0, 1.0))
}

/// Ken Burns transform offsets: `(scale, tx, ty)` at `elapsed` seconds, before ui scaling.
pub(crate) fn ken_burns(elapsed: f64) -> (f64, f64, f64) {
    let t = elapsed / 20.0;
    (
        1.05 + t.sin() * 0.02,
        (t * 0.5).cos() * 15.0,
        (t * 0.3).sin() * 15.0,
    )
}

/// Transform that scales an `iw`x`ih` image to cover a `w`x`h` frame, centered.
pub(crate) fn cover_transform(
    iw: f64,
    ih: f64,
    w: f64,
    h: f64,
    zoom: f64,
    dx: f64,
    dy: f64,
) -> Affine {
    let s = (w / iw).max(h / ih) * zoom;
    let ox = (w - iw * s) * 0.5 + dx;
    let oy = (h - ih * s) * 0.5 + dy;
    Affine::translate((ox, oy)) * Affine::scale(s)
}

fn draw_background(
    ctx: &mut vello_cpu::RenderContext,
    p: &ComposeParams<'_>,
    w: f64,
    h: f64,
    ui: f64,
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        BACKGROUND.r,
        BACKGROUND.g,
        BACKGROUND.b,
        255,
    ));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));

    let Some(img) = p.background else {
        return;
    };
    let (zoom, dx, dy) = if p.settings.ken_burns && p.is_playing {
        let (s, tx, ty) = ken_burns(p.elapsed);
        (s, tx * ui, ty * ui)
    } else {
        (1.0, 0.0, 0.0)
    };
    let (iw, ih) = (f64::from(img.width()), f64::from(img.height()));
    ctx.set_transform(affine_to_cpu(cover_transform(iw, ih, w, h, zoom, dx, dy)));
    ctx.set_paint(img.paint());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
}

fn draw_visualization(
    ctx: &mut vello_cpu::RenderContext,
    p: &ComposeParams<'_>,
    w: f64,
    h: f64,
    ui: f64,
) {
    let s = p.settings;
    let accent = s.accent();
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        accent.r, accent.g, accent.b, 230,
    ));

    match s.mode {
        VisualizationMode::Bars => {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            for r in viz::bar_rects(p.envelope, w, h, ui, s.intensity, s.anchor) {
                ctx.fill_rect(&rect_to_cpu(r));
            }
        }
        VisualizationMode::Orbital => {
            let (center, radius) = viz::orbit_center(w, h, ui, s.anchor);
            for spoke in viz::orbital_spokes(p.envelope, radius, ui, s.intensity, p.elapsed) {
                let tr = Affine::translate(center.to_vec2()) * Affine::rotate(spoke.angle);
                ctx.set_transform(affine_to_cpu(tr));
                ctx.fill_rect(&rect_to_cpu(spoke.rect));
            }
        }
        VisualizationMode::Wave => {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            let path = viz::wave_path(p.envelope, w, h, ui, s.intensity, p.elapsed, s.anchor);
            ctx.fill_path(&bezpath_to_cpu(&path));
        }
    }
}

fn draw_layout(
    ctx: &mut vello_cpu::RenderContext,
    layout: &parley::Layout<TextBrushRgba8>,
    font: &vello_cpu::peniko::FontData,
    x: f64,
    y: f64,
) {
    ctx.set_transform(affine_to_cpu(Affine::translate((x, y))));
    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = run.style().brush;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                brush.r, brush.g, brush.b, brush.a,
            ));
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}

/// Premultiplied vignette rows: transparent at the top, 0.8 at 80%, 0.95 at the bottom.
pub(crate) fn vignette_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; (width as usize) * (height as usize) * 4];
    let h1 = f64::from(height.max(1) - 1);
    for y in 0..height {
        let t = if h1 <= 0.0 { 1.0 } else { f64::from(y) / h1 };
        let alpha = vignette_alpha(t);
        let a = (alpha * 255.0).round() as u8;
        let premul = |c: u8| (f64::from(c) * alpha).round() as u8;
        let px = [premul(BACKGROUND.r), premul(BACKGROUND.g), premul(BACKGROUND.b), a];
        let row = (y as usize) * (width as usize) * 4;
        for x in 0..width as usize {
            bytes[row + x * 4..row + x * 4 + 4].copy_from_slice(&px);
        }
    }
    bytes
}

pub(crate) fn vignette_alpha(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t <= 0.8 {
        t / 0.8 * 0.8
    } else {
        0.8 + (t - 0.8) / 0.2 * 0.15
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
