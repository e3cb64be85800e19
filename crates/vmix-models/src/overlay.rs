//! Image overlay placement.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default overlay width in pixels.
pub const DEFAULT_OVERLAY_WIDTH: u32 = 150;
/// Default distance from the anchored edges in pixels.
pub const DEFAULT_OVERLAY_MARGIN: u32 = 20;

/// Corner an overlay is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopRight => "top-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomRight => "bottom-right",
        }
    }

    /// Parse an anchor name. Unknown names fall back to bottom-right.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" | "topleft" => Anchor::TopLeft,
            "top-right" | "topright" => Anchor::TopRight,
            "bottom-left" | "bottomleft" => Anchor::BottomLeft,
            _ => Anchor::BottomRight,
        }
    }

    /// True when the overlay hugs the right edge.
    pub fn is_right(&self) -> bool {
        matches!(self, Anchor::TopRight | Anchor::BottomRight)
    }

    /// True when the overlay hugs the bottom edge.
    pub fn is_bottom(&self) -> bool {
        matches!(self, Anchor::BottomLeft | Anchor::BottomRight)
    }
}

impl From<String> for Anchor {
    fn from(s: String) -> Self {
        Anchor::parse_lenient(&s)
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Caller-supplied overlay settings. Never mutated once a job starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    #[serde(default)]
    pub anchor: Anchor,
    /// Target overlay width; height follows the image aspect ratio
    #[serde(default = "default_width")]
    pub width_pixels: u32,
    #[serde(default = "default_margin")]
    pub margin_pixels: u32,
    /// Accepted and recorded, not applied to the composite
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_width() -> u32 {
    DEFAULT_OVERLAY_WIDTH
}
fn default_margin() -> u32 {
    DEFAULT_OVERLAY_MARGIN
}
fn default_opacity() -> f32 {
    1.0
}

impl Default for OverlaySpec {
    fn default() -> Self {
        Self {
            anchor: Anchor::default(),
            width_pixels: DEFAULT_OVERLAY_WIDTH,
            margin_pixels: DEFAULT_OVERLAY_MARGIN,
            opacity: 1.0,
        }
    }
}

impl OverlaySpec {
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_width(mut self, width_pixels: u32) -> Self {
        self.width_pixels = width_pixels;
        self
    }

    pub fn with_margin(mut self, margin_pixels: u32) -> Self {
        self.margin_pixels = margin_pixels;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let spec = OverlaySpec::default();
        assert_eq!(spec.anchor, Anchor::BottomRight);
        assert_eq!(spec.width_pixels, 150);
        assert_eq!(spec.margin_pixels, 20);
        assert!((spec.opacity - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_anchor_parse() {
        assert_eq!(Anchor::parse_lenient("top-left"), Anchor::TopLeft);
        assert_eq!(Anchor::parse_lenient("TOP_RIGHT"), Anchor::TopRight);
        assert_eq!(Anchor::parse_lenient("bottom-left"), Anchor::BottomLeft);
        assert_eq!(Anchor::parse_lenient("center"), Anchor::BottomRight);
        assert_eq!(Anchor::parse_lenient(""), Anchor::BottomRight);
    }

    #[test]
    fn test_unknown_anchor_deserializes_to_bottom_right() {
        let spec: OverlaySpec = serde_json::from_str(r#"{"anchor":"middle"}"#).unwrap();
        assert_eq!(spec.anchor, Anchor::BottomRight);
        assert_eq!(spec.width_pixels, DEFAULT_OVERLAY_WIDTH);

        let spec: OverlaySpec = serde_json::from_str(r#"{"anchor":"top-left"}"#).unwrap();
        assert_eq!(spec.anchor, Anchor::TopLeft);
    }

    #[test]
    fn test_anchor_serializes_kebab_case() {
        let json = serde_json::to_string(&Anchor::TopRight).unwrap();
        assert_eq!(json, "\"top-right\"");
    }

    #[test]
    fn test_opacity_clamping() {
        let spec = OverlaySpec::default().with_opacity(1.7);
        assert!((spec.opacity - 1.0).abs() < f32::EPSILON);
    }
}
