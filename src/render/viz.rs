//! Resolution-independent geometry for the three visualization modes.
//!
//! Everything here is a pure function of the envelope, the canvas and the time, so it can be
//! tested without rasterizing. Sizes are authored for 1080p and multiplied by `ui`.

use crate::audio::envelope::{BAND_COUNT, EnvelopeState};
use crate::foundation::core::{BezPath, Point, Rect};
use crate::render::style::TextAnchor;

/// Response curve exponent; biases the meter toward peaks.
const RESPONSE_EXP: f32 = 1.4;

pub(crate) const PADDING: f64 = 80.0;
pub(crate) const BAR_COUNT: usize = 12;
const BAR_WIDTH: f64 = 24.0;
const BAR_GAP: f64 = 12.0;
const BAR_MAX_HEIGHT: f64 = 200.0;
const BAR_MIN_HEIGHT: f64 = 4.0;

const ORBIT_RADIUS: f64 = 150.0;
const SPOKE_MAX: f64 = 140.0;
const SPOKE_MIN: f64 = 6.0;
const SPOKE_WIDTH: f64 = 6.0;
const ORBIT_SPEED: f64 = 0.1;

const WAVE_MAX_AMP: f64 = 160.0;
const WAVE_MIN_AMP: f64 = 1.0;

fn response(v: f32) -> f64 {
    f64::from(v.max(0.0).powf(RESPONSE_EXP))
}

/// Bar rectangles, bottom-anchored in the corner opposite the text's horizontal side.
pub(crate) fn bar_rects(
    env: &EnvelopeState,
    width: f64,
    height: f64,
    ui: f64,
    intensity: f32,
    anchor: TextAnchor,
) -> Vec<Rect> {
    let bar_w = BAR_WIDTH * ui;
    let gap = BAR_GAP * ui;
    let pad = PADDING * ui;
    let total = BAR_COUNT as f64 * bar_w + (BAR_COUNT - 1) as f64 * gap;
    let x0 = if anchor.is_right() {
        pad
    } else {
        width - pad - total
    };
    let bottom = height - pad;
    let max_h = BAR_MAX_HEIGHT * ui * f64::from(intensity);
    let min_h = BAR_MIN_HEIGHT * ui;

    (0..BAR_COUNT)
        .map(|i| {
            let v = env[(i * 2).min(BAND_COUNT - 1)];
            let h = (response(v) * max_h).max(min_h);
            let x = x0 + i as f64 * (bar_w + gap);
            Rect::new(x, bottom - h, x + bar_w, bottom)
        })
        .collect()
}

/// One radiating spoke: rotation angle about `center` and the unrotated rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Spoke {
    pub(crate) angle: f64,
    pub(crate) rect: Rect,
}

/// Orbit center and radius; moves up and shrinks when the title is centered.
pub(crate) fn orbit_center(width: f64, height: f64, ui: f64, anchor: TextAnchor) -> (Point, f64) {
    if anchor == TextAnchor::Center {
        (Point::new(width * 0.5, height * 0.3), ORBIT_RADIUS * ui * 0.75)
    } else {
        (Point::new(width * 0.5, height * 0.5), ORBIT_RADIUS * ui)
    }
}

/// Spokes for every band, mirrored so the ring is symmetric.
pub(crate) fn orbital_spokes(
    env: &EnvelopeState,
    radius: f64,
    ui: f64,
    intensity: f32,
    elapsed: f64,
) -> Vec<Spoke> {
    let n = BAND_COUNT * 2;
    let max_len = SPOKE_MAX * ui * f64::from(intensity);
    let min_len = SPOKE_MIN * ui;
    let half_w = SPOKE_WIDTH * ui * 0.5;
    let spin = elapsed * ORBIT_SPEED;

    (0..n)
        .map(|i| {
            let band = if i < BAND_COUNT { i } else { n - 1 - i };
            let len = (response(env[band]) * max_len).max(min_len);
            Spoke {
                angle: spin + std::f64::consts::TAU * i as f64 / n as f64,
                rect: Rect::new(radius, -half_w, radius + len, half_w),
            }
        })
        .collect()
}

/// Closed ribbon through the band values, smoothed with quadratic midpoints.
pub(crate) fn wave_path(
    env: &EnvelopeState,
    width: f64,
    height: f64,
    ui: f64,
    intensity: f32,
    elapsed: f64,
    anchor: TextAnchor,
) -> BezPath {
    let pad = PADDING * ui;
    let baseline = if anchor == TextAnchor::Center {
        height * 0.82
    } else {
        height * 0.5
    };
    let span = (width - 2.0 * pad).max(1.0);
    let step = span / (BAND_COUNT - 1) as f64;
    let max_amp = WAVE_MAX_AMP * ui * f64::from(intensity);
    let min_amp = WAVE_MIN_AMP * ui;

    let amps: Vec<f64> = env
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let phase = 0.6 + 0.4 * (2.0 * elapsed + 0.5 * i as f64).sin();
            (response(v) * max_amp * phase).max(min_amp)
        })
        .collect();
    let upper: Vec<Point> = amps
        .iter()
        .enumerate()
        .map(|(i, a)| Point::new(pad + i as f64 * step, baseline - a))
        .collect();
    let lower: Vec<Point> = amps
        .iter()
        .enumerate()
        .rev()
        .map(|(i, a)| Point::new(pad + i as f64 * step, baseline + a))
        .collect();

    let mut path = BezPath::new();
    path.move_to(upper[0]);
    smooth_through(&mut path, &upper);
    path.line_to(lower[0]);
    smooth_through(&mut path, &lower);
    path.close_path();
    path
}

fn smooth_through(path: &mut BezPath, pts: &[Point]) {
    for w in pts.windows(2).skip(1) {
        path.quad_to(w[0], w[0].midpoint(w[1]));
    }
    if let Some(&last) = pts.last() {
        path.line_to(last);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/viz.rs"]
mod tests;
