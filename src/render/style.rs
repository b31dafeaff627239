use std::path::PathBuf;

/// Accent used when a configured color does not parse.
pub const FALLBACK_ACCENT: Rgb8 = Rgb8 {
    r: 255,
    g: 183,
    b: 3,
};

/// Straight (non-premultiplied) opaque color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Parse `#RRGGBB` (leading `#` optional, case-insensitive).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let ch = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: ch(0)?,
            g: ch(2)?,
            b: ch(4)?,
        })
    }

    /// Parse `#RRGGBB`, falling back to [`FALLBACK_ACCENT`].
    pub fn parse_hex_or_fallback(s: &str) -> Self {
        Self::parse_hex(s).unwrap_or(FALLBACK_ACCENT)
    }
}

/// Visualization drawn over the background.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationMode {
    /// Log-spaced vertical bars anchored to a bottom corner.
    #[default]
    Bars,
    /// Spokes radiating from a slowly rotating circle.
    Orbital,
    /// Smoothed ribbon through the band values.
    Wave,
}

/// Placement of the title block and progress bar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAnchor {
    /// Top-left corner.
    TopLeft,
    /// Top-right corner.
    TopRight,
    /// Bottom-left corner.
    #[default]
    BottomLeft,
    /// Bottom-right corner.
    BottomRight,
    /// Centered horizontally and vertically.
    Center,
}

impl TextAnchor {
    /// `true` for anchors on the right edge.
    pub fn is_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight)
    }
}

/// Title size preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    /// 36 px at 1080p.
    Small,
    /// 48 px at 1080p.
    #[default]
    Medium,
    /// 60 px at 1080p.
    Large,
    /// 72 px at 1080p.
    ExtraLarge,
}

impl FontSize {
    /// Title size in pixels at 1080p.
    pub fn title_px(self) -> f32 {
        match self {
            Self::Small => 36.0,
            Self::Medium => 48.0,
            Self::Large => 60.0,
            Self::ExtraLarge => 72.0,
        }
    }

    /// Artist size derived from a (scaled) title size.
    pub fn artist_px(title_px: f32) -> f32 {
        (title_px * 0.55).floor().max(1.0)
    }
}

/// Visual parameters for [`crate::VisualFrameCompositor::compose`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VisualSettings {
    /// Active visualization.
    pub mode: VisualizationMode,
    /// Accent color as `#RRGGBB`.
    pub color: String,
    /// Visualization amplitude multiplier.
    pub intensity: f32,
    /// Pan/zoom the background while playing.
    pub ken_burns: bool,
    /// Draw the title and artist.
    pub show_title: bool,
    /// Draw the progress bar.
    pub show_progress: bool,
    /// Title block placement.
    pub anchor: TextAnchor,
    /// Font file for the title block. Without one no text is drawn.
    pub font_path: Option<PathBuf>,
    /// Title size preset.
    pub font_size: FontSize,
}

impl Default for VisualSettings {
    fn default() -> Self {
        Self {
            mode: VisualizationMode::Bars,
            color: "#ffb703".to_string(),
            intensity: 1.0,
            ken_burns: true,
            show_title: true,
            show_progress: true,
            anchor: TextAnchor::BottomLeft,
            font_path: None,
            font_size: FontSize::Medium,
        }
    }
}

impl VisualSettings {
    /// Parsed accent color.
    pub fn accent(&self) -> Rgb8 {
        Rgb8::parse_hex_or_fallback(&self.color)
    }

    /// Validate numeric fields.
    pub fn validate(&self) -> crate::VibeResult<()> {
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(crate::VibeError::validation(
                "visual intensity must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/style.rs"]
mod tests;
