//! Stage geometry shared by the sequencer, the input adapter and the preview.
//!
//! Sprite positions are stage pixels. The terminal preview draws the stage at
//! a cell offset with a fixed number of pixels per cell, so pointer samples
//! (cells) and sprite centres (pixels) meet in one screen-space pixel frame.

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::StageConfig;
use crate::types::{Point, SpriteMotion};

/// Width and height of the sprite glyph in terminal cells.
pub const SPRITE_COLS: u16 = 5;
pub const SPRITE_ROWS: u16 = 3;

/// Where the renderer currently draws the sprite, in screen-space pixels.
///
/// `point_towards` aims from this centre to the last pointer sample.
pub trait SpriteBounds: Send + Sync {
    fn center(&self, motion: &SpriteMotion) -> Point;
}

/// Screen-space layout of the terminal stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    /// Top-left cell of the stage on screen.
    pub origin_col: u16,
    pub origin_row: u16,
    pub px_per_col: f64,
    pub px_per_row: f64,
    pub width_px: f64,
    pub height_px: f64,
}

impl Stage {
    pub fn new(config: &StageConfig, origin_col: u16, origin_row: u16) -> Self {
        Stage {
            origin_col,
            origin_row,
            px_per_col: config.px_per_col.max(1.0),
            px_per_row: config.px_per_row.max(1.0),
            width_px: config.width_px,
            height_px: config.height_px,
        }
    }

    pub fn cols(&self) -> u16 {
        (self.width_px / self.px_per_col).ceil().clamp(1.0, u16::MAX as f64) as u16
    }

    pub fn rows(&self) -> u16 {
        (self.height_px / self.px_per_row).ceil().clamp(1.0, u16::MAX as f64) as u16
    }

    /// Screen-space pixel at the centre of a terminal cell.
    pub fn cell_to_screen(&self, col: u16, row: u16) -> Point {
        Point::new(
            (col as f64 + 0.5) * self.px_per_col,
            (row as f64 + 0.5) * self.px_per_row,
        )
    }

    /// Top-left cell of the sprite glyph relative to the stage origin.
    /// May be negative or beyond the stage; callers clip.
    pub fn sprite_cell(&self, motion: &SpriteMotion) -> (i32, i32) {
        self.sprite_cell_at(motion.position)
    }

    fn sprite_cell_at(&self, position: Point) -> (i32, i32) {
        (
            (position.x / self.px_per_col).floor() as i32,
            (position.y / self.px_per_row).floor() as i32,
        )
    }

    /// Screen-space centre of the sprite glyph drawn at stage `position`.
    pub fn center_at(&self, position: Point) -> Point {
        let (sx, sy) = self.sprite_cell_at(position);
        let left = (self.origin_col as i32 + sx) as f64 * self.px_per_col;
        let top = (self.origin_row as i32 + sy) as f64 * self.px_per_row;
        Point::new(
            left + SPRITE_COLS as f64 * self.px_per_col / 2.0,
            top + SPRITE_ROWS as f64 * self.px_per_row / 2.0,
        )
    }

    /// Whether the screen cell `(col, row)` lies on the sprite glyph.
    pub fn hits_sprite(&self, col: u16, row: u16, motion: &SpriteMotion) -> bool {
        let (sx, sy) = self.sprite_cell(motion);
        let x = col as i32 - self.origin_col as i32 - sx;
        let y = row as i32 - self.origin_row as i32 - sy;
        (0..SPRITE_COLS as i32).contains(&x) && (0..SPRITE_ROWS as i32).contains(&y)
    }
}

impl SpriteBounds for Stage {
    fn center(&self, motion: &SpriteMotion) -> Point {
        self.center_at(motion.position)
    }
}

impl<T: SpriteBounds + ?Sized> SpriteBounds for Arc<T> {
    fn center(&self, motion: &SpriteMotion) -> Point {
        (**self).center(motion)
    }
}

/// Sprite bounds as the preview last drew them.
///
/// During a glide `SpriteMotion::position` already holds the target while the
/// preview is still tweening towards it; aiming uses the drawn position.
#[derive(Debug)]
pub struct DrawnSprite {
    stage: Stage,
    drawn: Mutex<Option<Point>>,
}

impl DrawnSprite {
    pub fn new(stage: Stage) -> Self {
        DrawnSprite {
            stage,
            drawn: Mutex::new(None),
        }
    }

    /// Record where the sprite was just drawn, in stage pixels.
    pub fn record(&self, position: Point) {
        *self.drawn.lock().unwrap_or_else(PoisonError::into_inner) = Some(position);
    }
}

impl SpriteBounds for DrawnSprite {
    /// Falls back to the state's position until the first frame is drawn.
    fn center(&self, motion: &SpriteMotion) -> Point {
        let drawn = *self.drawn.lock().unwrap_or_else(PoisonError::into_inner);
        self.stage.center_at(drawn.unwrap_or(motion.position))
    }
}
