//! The dispatch table: each action as a pure transition over `SpriteMotion`.
//!
//! Transitions never sleep or spawn. When an action needs a follow-up (a glide
//! finishing, a timed bubble disappearing) it says so in the returned
//! `Effect` and the sequencer schedules it.

use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;

use crate::config::StageConfig;
use crate::program::{Action, PointTarget};
use crate::stage::SpriteBounds;
use crate::types::{Animation, AnimationKind, Point, SpeechText, SpriteMotion};

/// How a transition touched one of the timed slots (`text`, `animation`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Touch {
    #[default]
    Untouched,
    Written,
    /// Written, and must be cleared once the duration elapses.
    WrittenUntil(Duration),
}

impl Touch {
    pub fn is_written(self) -> bool {
        !matches!(self, Touch::Untouched)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effect {
    pub text: Touch,
    pub animation: Touch,
}

impl Effect {
    pub const NONE: Effect = Effect {
        text: Touch::Untouched,
        animation: Touch::Untouched,
    };
}

/// Inputs a transition may read besides the sprite itself.
pub struct StepContext<'a> {
    pub rng: &'a mut StdRng,
    /// Last accepted pointer sample, screen-space pixels.
    pub pointer: Point,
    pub bounds: &'a dyn SpriteBounds,
    pub stage: &'a StageConfig,
    /// Display duration for the untimed `say` / `think` blocks.
    pub say_duration: Duration,
}

impl StepContext<'_> {
    fn random_point(&mut self) -> Point {
        Point::new(
            random_below(self.rng, self.stage.width_px),
            random_below(self.rng, self.stage.height_px),
        )
    }
}

fn random_below(rng: &mut StdRng, limit: f64) -> f64 {
    if limit > 0.0 {
        rng.random_range(0.0..limit)
    } else {
        0.0
    }
}

/// Apply an action to the sprite.
pub trait Apply {
    fn apply(&self, motion: &mut SpriteMotion, ctx: &mut StepContext<'_>) -> Effect;
}

impl Apply for Action {
    fn apply(&self, motion: &mut SpriteMotion, ctx: &mut StepContext<'_>) -> Effect {
        match self {
            Action::Event(_) | Action::Unrecognized(_) => Effect::NONE,
            Action::GoTo { x, y } => {
                motion.position = Point::new(*x, *y);
                Effect::NONE
            }
            Action::GoToRandom => {
                motion.position = ctx.random_point();
                Effect::NONE
            }
            Action::Clockwise { angle } => {
                motion.rotation += angle;
                Effect::NONE
            }
            Action::Anticlockwise { angle } => {
                motion.rotation -= angle;
                Effect::NONE
            }
            Action::Glide { seconds, x, y } => glide(motion, *seconds, Point::new(*x, *y)),
            Action::GlideRandom { seconds } => {
                let target = ctx.random_point();
                glide(motion, *seconds, target)
            }
            Action::PointInDirection { direction } => {
                motion.rotation = *direction;
                Effect::NONE
            }
            Action::PointTowards {
                target: PointTarget::MousePointer,
            } => {
                motion.rotation = heading(ctx.bounds.center(motion), ctx.pointer);
                motion.animation = None;
                Effect {
                    animation: Touch::Written,
                    ..Effect::NONE
                }
            }
            Action::PointTowards {
                target: PointTarget::Other(_),
            } => Effect::NONE,
            Action::Move { steps } => {
                motion.position.x += steps;
                Effect::NONE
            }
            Action::ChangeXBy { delta } => {
                motion.position.x += delta;
                Effect::NONE
            }
            Action::SetX { x } => {
                motion.position.x = *x;
                Effect::NONE
            }
            Action::ChangeYBy { delta } => {
                motion.position.y += delta;
                Effect::NONE
            }
            Action::SetY { y } => {
                motion.position.y = *y;
                Effect::NONE
            }
            Action::SayForSeconds { message, seconds } => {
                speak_for(motion, message, *seconds, false)
            }
            Action::Say { message } => speak(motion, message, ctx.say_duration, false),
            Action::ThinkForSeconds { message, seconds } => {
                speak_for(motion, message, *seconds, true)
            }
            Action::Think { message } => speak(motion, message, ctx.say_duration, true),
            Action::ChangeSize { delta } => {
                motion.size += delta;
                Effect::NONE
            }
        }
    }
}

/// Block seconds as a duration. Negative or non-finite values count as zero.
pub fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn glide(motion: &mut SpriteMotion, secs: f64, target: Point) -> Effect {
    let duration = seconds(secs);
    motion.animation = Some(Animation {
        kind: AnimationKind::Glide,
        duration_ms: millis(duration),
    });
    motion.position = target;
    Effect {
        animation: Touch::WrittenUntil(duration),
        ..Effect::NONE
    }
}

fn speak_for(motion: &mut SpriteMotion, message: &str, secs: f64, think: bool) -> Effect {
    let duration = seconds(secs);
    speak(motion, message, duration, think);
    Effect {
        text: Touch::WrittenUntil(duration),
        ..Effect::NONE
    }
}

/// The bare `say` / `think` blocks record a short duration but never clear;
/// the duration only gates visibility for the renderer.
fn speak(motion: &mut SpriteMotion, message: &str, duration: Duration, think: bool) -> Effect {
    motion.text = SpeechText {
        message: message.to_string(),
        duration_ms: millis(duration),
        think,
    };
    Effect {
        text: Touch::Written,
        ..Effect::NONE
    }
}

/// Angle in degrees from `from` to `to`, in `[0, 360)`, with y growing
/// downwards (so 90° points down the screen).
pub fn heading(from: Point, to: Point) -> f64 {
    let angle = (to.y - from.y).atan2(to.x - from.x).to_degrees();
    if angle < 0.0 { angle + 360.0 } else { angle }
}
