//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Corner of the frame the watermark is pinned to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
    TopLeft,
    TopRight,
}

impl Position {
    /// All positions, in the order they are offered to users.
    pub const ALL: [Position; 4] = [
        Position::BottomRight,
        Position::BottomLeft,
        Position::TopLeft,
        Position::TopRight,
    ];

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BottomRight => "Bottom-right",
            Self::BottomLeft => "Bottom-left",
            Self::TopLeft => "Top-left",
            Self::TopRight => "Top-right",
        }
    }

    /// Stable identifier, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
        }
    }

    /// Builds the overlay expression for this position with the given margin.
    pub fn overlay_expr(&self, margin: u32) -> OverlayExpr {
        let (x, y) = match self {
            Self::BottomRight => (Anchor::End(margin), Anchor::End(margin)),
            Self::BottomLeft => (Anchor::Start(margin), Anchor::End(margin)),
            Self::TopLeft => (Anchor::Start(margin), Anchor::Start(margin)),
            Self::TopRight => (Anchor::End(margin), Anchor::Start(margin)),
        };
        OverlayExpr { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a position string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown watermark position: {0}")]
pub struct ParsePositionError(pub String);

impl FromStr for Position {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Position::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ParsePositionError(s.to_string()))
    }
}

/// Placement of one axis of the overlay, measured from the start (left/top)
/// or the end (right/bottom) of the frame, inset by a margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "from", content = "margin", rename_all = "snake_case")]
pub enum Anchor {
    Start(u32),
    End(u32),
}

impl Anchor {
    fn render(&self, frame_var: &str, overlay_var: &str) -> String {
        match self {
            Self::Start(margin) => margin.to_string(),
            Self::End(margin) => format!("{}-{}-{}", frame_var, overlay_var, margin),
        }
    }

    fn evaluate(&self, frame: u32, overlay: u32) -> i64 {
        match self {
            Self::Start(margin) => *margin as i64,
            Self::End(margin) => frame as i64 - overlay as i64 - *margin as i64,
        }
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Coordinate expression handed to FFmpeg's overlay filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayExpr {
    pub x: Anchor,
    pub y: Anchor,
}

impl OverlayExpr {
    /// Top-left corner of the overlay for the given frame and overlay sizes.
    ///
    /// Coordinates can be negative when the overlay is larger than the frame,
    /// the same as FFmpeg would compute.
    pub fn evaluate(&self, frame: Size, overlay: Size) -> (i64, i64) {
        (
            self.x.evaluate(frame.width, overlay.width),
            self.y.evaluate(frame.height, overlay.height),
        )
    }
}

impl fmt::Display for OverlayExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.x.render("main_w", "overlay_w"),
            self.y.render("main_h", "overlay_h")
        )
    }
}

/// A single watermark composition request.
#[derive(Debug, Clone)]
pub struct OverlayRequest {
    /// Identifier used in logs (batch id and job index).
    pub job_id: String,
    /// Input video.
    pub video_path: PathBuf,
    /// Watermark image.
    pub watermark_path: PathBuf,
    /// Where the composed video is written. Overwritten if present.
    pub output_path: PathBuf,
    /// Overlay placement.
    pub expr: OverlayExpr,
}
