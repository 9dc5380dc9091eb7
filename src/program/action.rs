//! Typed actions, one variant per block kind with its exact field shape.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::source::Block;
use crate::error::{PlaygroundError, Result};

/// Events that start a chain. A top-level block whose type is one of these
/// is a chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "when_flag_clicked")]
    FlagClicked,
    #[serde(rename = "when_key_pressed")]
    KeyPressed,
    #[serde(rename = "when_sprite_clicked")]
    SpriteClicked,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::FlagClicked,
        EventKind::KeyPressed,
        EventKind::SpriteClicked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::FlagClicked => "when_flag_clicked",
            EventKind::KeyPressed => "when_key_pressed",
            EventKind::SpriteClicked => "when_sprite_clicked",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = PlaygroundError;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| PlaygroundError::UnknownEvent(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointTarget {
    MousePointer,
    /// Any other target the editor offers. Pointing at it is a no-op.
    Other(String),
}

impl From<String> for PointTarget {
    fn from(s: String) -> Self {
        if s == "MOUSE_POINTER" {
            PointTarget::MousePointer
        } else {
            PointTarget::Other(s)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Event hat block. Does nothing when dispatched.
    Event(EventKind),
    GoTo { x: f64, y: f64 },
    GoToRandom,
    Clockwise { angle: f64 },
    Anticlockwise { angle: f64 },
    Glide { seconds: f64, x: f64, y: f64 },
    GlideRandom { seconds: f64 },
    PointInDirection { direction: f64 },
    PointTowards { target: PointTarget },
    Move { steps: f64 },
    ChangeXBy { delta: f64 },
    SetX { x: f64 },
    ChangeYBy { delta: f64 },
    SetY { y: f64 },
    SayForSeconds { message: String, seconds: f64 },
    Say { message: String },
    ThinkForSeconds { message: String, seconds: f64 },
    Think { message: String },
    ChangeSize { delta: f64 },
    /// A block type this interpreter does not know. Dispatched as a no-op.
    Unrecognized(String),
}

impl Action {
    /// The block type this action was authored as.
    pub fn kind(&self) -> &str {
        match self {
            Action::Event(event) => event.as_str(),
            Action::GoTo { .. } => "go_to",
            Action::GoToRandom => "go_to_random",
            Action::Clockwise { .. } => "clockwise",
            Action::Anticlockwise { .. } => "anticlockwise",
            Action::Glide { .. } => "glide",
            Action::GlideRandom { .. } => "glide_random",
            Action::PointInDirection { .. } => "point_in_direction",
            Action::PointTowards { .. } => "point_towards",
            Action::Move { .. } => "move",
            Action::ChangeXBy { .. } => "change_x_by",
            Action::SetX { .. } => "set_x",
            Action::ChangeYBy { .. } => "change_y_by",
            Action::SetY { .. } => "set_y",
            Action::SayForSeconds { .. } => "say_for_seconds",
            Action::Say { .. } => "say",
            Action::ThinkForSeconds { .. } => "think_for_seconds",
            Action::Think { .. } => "think",
            Action::ChangeSize { .. } => "change_size",
            Action::Unrecognized(kind) => kind,
        }
    }

    pub fn event(&self) -> Option<EventKind> {
        match self {
            Action::Event(event) => Some(*event),
            _ => None,
        }
    }

    /// Type-check a source block's fields.
    pub fn from_block(block: &Block) -> Result<Self> {
        let action = match block.kind.as_str() {
            "go_to" => Action::GoTo {
                x: block.number("x_position")?,
                y: block.number("y_position")?,
            },
            "go_to_random" => Action::GoToRandom,
            "clockwise" => Action::Clockwise {
                angle: block.number("angle")?,
            },
            "anticlockwise" => Action::Anticlockwise {
                angle: block.number("angle")?,
            },
            "glide" => Action::Glide {
                seconds: block.number("seconds")?,
                x: block.number("x_position")?,
                y: block.number("y_position")?,
            },
            "glide_random" => Action::GlideRandom {
                seconds: block.number("seconds")?,
            },
            "point_in_direction" => Action::PointInDirection {
                direction: block.number("direction")?,
            },
            "point_towards" => Action::PointTowards {
                target: block.text("target")?.into(),
            },
            "move" => Action::Move {
                steps: block.number("x_position")?,
            },
            "change_x_by" => Action::ChangeXBy {
                delta: block.number("delta_x")?,
            },
            "set_x" => Action::SetX {
                x: block.number("x_position")?,
            },
            "change_y_by" => Action::ChangeYBy {
                delta: block.number("delta_y")?,
            },
            "set_y" => Action::SetY {
                y: block.number("y_position")?,
            },
            "say_for_seconds" => Action::SayForSeconds {
                message: block.text("message")?,
                seconds: block.number("seconds")?,
            },
            "say" => Action::Say {
                message: block.text("message")?,
            },
            "think_for_seconds" => Action::ThinkForSeconds {
                message: block.text("message")?,
                seconds: block.number("seconds")?,
            },
            "think" => Action::Think {
                message: block.text("message")?,
            },
            "change_size" => Action::ChangeSize {
                delta: block.number("size")?,
            },
            other => match other.parse::<EventKind>() {
                Ok(event) => Action::Event(event),
                Err(_) => Action::Unrecognized(other.to_string()),
            },
        };
        Ok(action)
    }
}
