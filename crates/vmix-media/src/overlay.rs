//! Overlay placement geometry.
//!
//! Positions are rendered as FFmpeg `overlay` expressions so the engine
//! resolves them against the real frame size: `W`/`H` are the main frame,
//! `w`/`h` the scaled overlay.

use std::fmt;

use vmix_models::{Anchor, OverlaySpec};

/// Placement along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOffset {
    /// `margin` pixels from the near (left/top) edge
    FromNearEdge(u32),
    /// `margin` pixels from the far (right/bottom) edge
    FromFarEdge(u32),
}

impl AxisOffset {
    fn expr(&self, frame_var: char, overlay_var: char) -> String {
        match self {
            AxisOffset::FromNearEdge(margin) => margin.to_string(),
            AxisOffset::FromFarEdge(margin) => {
                format!("{}-{}-{}", frame_var, overlay_var, margin)
            }
        }
    }

    /// Evaluate against concrete sizes.
    pub fn to_pixels(&self, frame: u32, overlay: u32) -> i64 {
        match *self {
            AxisOffset::FromNearEdge(margin) => i64::from(margin),
            AxisOffset::FromFarEdge(margin) => {
                i64::from(frame) - i64::from(overlay) - i64::from(margin)
            }
        }
    }
}

/// Resolved overlay position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPosition {
    pub x: AxisOffset,
    pub y: AxisOffset,
}

impl OverlayPosition {
    /// Resolve an anchor and margin to per-axis offsets.
    pub fn resolve(anchor: Anchor, margin: u32) -> Self {
        let x = if anchor.is_right() {
            AxisOffset::FromFarEdge(margin)
        } else {
            AxisOffset::FromNearEdge(margin)
        };
        let y = if anchor.is_bottom() {
            AxisOffset::FromFarEdge(margin)
        } else {
            AxisOffset::FromNearEdge(margin)
        };
        Self { x, y }
    }

    pub fn from_spec(spec: &OverlaySpec) -> Self {
        Self::resolve(spec.anchor, spec.margin_pixels)
    }

    pub fn x_expr(&self) -> String {
        self.x.expr('W', 'w')
    }

    pub fn y_expr(&self) -> String {
        self.y.expr('H', 'h')
    }

    /// Top-left corner in pixels for a frame and a scaled overlay.
    pub fn to_pixels(&self, frame: (u32, u32), overlay: (u32, u32)) -> (i64, i64) {
        (
            self.x.to_pixels(frame.0, overlay.0),
            self.y.to_pixels(frame.1, overlay.1),
        )
    }
}

impl fmt::Display for OverlayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x_expr(), self.y_expr())
    }
}

/// Scale filter giving the overlay `width` pixels and keeping its aspect ratio.
pub fn scale_filter(width: u32) -> String {
    format!("scale={}:-1", width.max(1))
}

/// `overlay` filter for a position.
pub fn overlay_filter(position: &OverlayPosition) -> String {
    format!("overlay={}:format=auto", position)
}

/// Height after scaling an image of `source` size to `width`, rounded like `-1`.
pub fn scaled_height(source: (u32, u32), width: u32) -> Option<u32> {
    let (sw, sh) = source;
    if sw == 0 || sh == 0 {
        return None;
    }
    let h = (f64::from(sh) * f64::from(width) / f64::from(sw)).round();
    Some(h.max(1.0) as u32)
}
