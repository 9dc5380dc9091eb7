//! Shared boundary types for the sprite playground.
//!
//! This module defines the data contracts that cross component lines:
//! - Store → Renderer: `SpriteMotion`, the single mutable sprite state
//! - Store → History: `HistoryEntry`, the snapshot taken before each run

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Geometry primitives
// ---------------------------------------------------------------------------

/// A point in stage pixels. `y` grows downwards, like screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

// ---------------------------------------------------------------------------
// Sprite state (observed by the renderer)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    Glide,
}

/// A transition currently applied to position changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    #[serde(rename = "type")]
    pub kind: AnimationKind,
    pub duration_ms: u64,
}

/// Speech or thought bubble. Visible only while `duration_ms > 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechText {
    pub message: String,
    pub duration_ms: u64,
    pub think: bool,
}

impl SpeechText {
    pub fn is_visible(&self) -> bool {
        self.duration_ms > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpriteMotion {
    pub position: Point,
    /// Degrees. Not wrapped on write; renderers normalise when drawing.
    pub rotation: f64,
    pub animation: Option<Animation>,
    pub text: SpeechText,
    /// Offset added to the sprite's base scale.
    pub size: f64,
}

// ---------------------------------------------------------------------------
// Undo history
// ---------------------------------------------------------------------------

/// State captured immediately before a triggered run begins.
///
/// `animation` is not captured; restoring an entry always clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub position: Point,
    pub rotation: f64,
    pub size: f64,
    pub text: SpeechText,
}

impl From<&SpriteMotion> for HistoryEntry {
    fn from(motion: &SpriteMotion) -> Self {
        HistoryEntry {
            position: motion.position,
            rotation: motion.rotation,
            size: motion.size,
            text: motion.text.clone(),
        }
    }
}
