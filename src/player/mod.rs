//! The interactive terminal preview.
//!
//! Observes the sprite store and draws the stage; forwards terminal input to
//! the input adapter. The player never mutates sprite state itself; glides are
//! tweened purely on screen between the last drawn and the new position.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture, EventStream};
use crossterm::style::Stylize;
use crossterm::{cursor, execute, queue, style, terminal};
use futures::StreamExt;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{KeyBindings, StageConfig};
use crate::engine::Sequencer;
use crate::engine::store::MotionReceiver;
use crate::input::{Command, InputAdapter};
use crate::menubar::render_menubar;
use crate::stage::{DrawnSprite, SPRITE_COLS, SPRITE_ROWS, Stage};
use crate::types::{Point, SpriteMotion};

/// Rows reserved above the stage for the menu bar.
const CANVAS_OFFSET: u16 = 1;
const FRAME: Duration = Duration::from_millis(33);

/// On-screen interpolation for a glide.
struct Tween {
    from: Point,
    to: Point,
    started: Instant,
    duration: Duration,
}

impl Tween {
    /// Position at `now`, and whether the tween has finished.
    fn sample(&self, now: Instant) -> (Point, bool) {
        let elapsed = now.saturating_duration_since(self.started);
        if self.duration.is_zero() || elapsed >= self.duration {
            return (self.to, true);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        (
            Point::new(
                self.from.x + (self.to.x - self.from.x) * t,
                self.from.y + (self.to.y - self.from.y) * t,
            ),
            false,
        )
    }
}

pub struct Player {
    sequencer: Sequencer,
    input: InputAdapter,
    stage: Stage,
    sprite: Arc<DrawnSprite>,
    motion: MotionReceiver,
    latest: SpriteMotion,
    /// Where the sprite is currently drawn; lags `latest` during a glide.
    drawn: Point,
    tween: Option<Tween>,
    shown_playing: bool,
    fullscreen: bool,
}

impl Player {
    /// Stage layout used by the preview: inside a one-cell border, below the
    /// menu bar.
    pub fn stage_layout(config: &StageConfig) -> Stage {
        Stage::new(config, 1, CANVAS_OFFSET + 1)
    }

    /// `sprite` should be the bounds the sequencer aims from; the player
    /// records every drawn position in it.
    pub fn new(
        sequencer: Sequencer,
        stage: Stage,
        sprite: Arc<DrawnSprite>,
        bindings: KeyBindings,
    ) -> Self {
        let mut motion = sequencer.store().subscribe();
        let latest = motion.current();
        let input = InputAdapter::new(sequencer.clone(), bindings, stage.clone());
        Self {
            sequencer,
            input,
            stage,
            sprite,
            motion,
            drawn: latest.position,
            latest,
            tween: None,
            shown_playing: false,
            fullscreen: false,
        }
    }

    /// Run the preview until the user quits.
    ///
    /// Sets up the terminal, enters the event loop, and restores the terminal
    /// on exit (even on error).
    pub async fn play(&mut self) -> Result<()> {
        let (term_w, term_h) = terminal::size()?;
        let (need_w, need_h) = required_size(&self.stage);
        if term_w < need_w || term_h < need_h {
            bail!("Terminal too small: need {need_w}x{need_h}, have {term_w}x{term_h}");
        }

        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All),
        )?;

        let result = self.run_loop(&mut stdout).await;

        // Always restore terminal state.
        let _ = execute!(
            stdout,
            DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();

        result
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    async fn run_loop(&mut self, stdout: &mut io::Stdout) -> Result<()> {
        self.render_full(stdout)?;

        let mut events = EventStream::new();
        let mut frames = time::interval(FRAME);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = events.next() => {
                    let Some(event) = event else { break };
                    match self.input.handle_event(event?) {
                        Command::Quit => break,
                        Command::Continue => {}
                        Command::Redraw => self.render_full(stdout)?,
                        Command::ToggleFullscreen => {
                            self.fullscreen = !self.fullscreen;
                            let seq: &[u8] = if self.fullscreen { b"\x1b[10;1t" } else { b"\x1b[10;0t" };
                            stdout.write_all(seq)?;
                            self.render_full(stdout)?;
                        }
                        command => {
                            if self.input.dispatch(command) {
                                self.render_chrome(stdout)?;
                            }
                        }
                    }
                }
                changed = self.motion.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.latest = self.motion.current();
                    self.retarget(Instant::now());
                    self.render_stage(stdout)?;
                    self.render_chrome(stdout)?;
                }
                _ = frames.tick() => {
                    if self.tween.is_some() {
                        self.advance_tween(Instant::now());
                        self.render_stage(stdout)?;
                    }
                    if self.sequencer.is_playing() != self.shown_playing {
                        self.render_chrome(stdout)?;
                    }
                }
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Glide tweening
    // -----------------------------------------------------------------------

    fn retarget(&mut self, now: Instant) {
        let target = self.latest.position;
        match &self.latest.animation {
            Some(animation) => {
                let moving_to = self.tween.as_ref().map(|t| t.to);
                if moving_to != Some(target) && self.drawn != target {
                    self.tween = Some(Tween {
                        from: self.drawn,
                        to: target,
                        started: now,
                        duration: Duration::from_millis(animation.duration_ms),
                    });
                }
            }
            None => {
                self.tween = None;
                self.drawn = target;
            }
        }
    }

    fn advance_tween(&mut self, now: Instant) {
        if let Some(tween) = &self.tween {
            let (point, done) = tween.sample(now);
            self.drawn = point;
            if done {
                self.tween = None;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Terminal output
    // -----------------------------------------------------------------------

    fn render_full(&mut self, stdout: &mut io::Stdout) -> Result<()> {
        execute!(stdout, terminal::Clear(terminal::ClearType::All))?;
        self.render_border(stdout)?;
        self.render_stage(stdout)?;
        self.render_chrome(stdout)
    }

    fn render_chrome(&mut self, stdout: &mut io::Stdout) -> Result<()> {
        self.shown_playing = self.sequencer.is_playing();
        render_menubar(stdout, 0, &self.menu_items())?;
        self.render_status(stdout)?;
        stdout.flush()?;
        Ok(())
    }

    fn menu_items(&self) -> Vec<String> {
        let b = self.input.bindings();
        let mut items = vec![
            if self.shown_playing {
                format!("[{}] run (playing)", b.run)
            } else {
                format!("[{}] run", b.run)
            },
            format!("[{}] key event", b.trigger_key),
            format!("[{}] click sprite", b.click_sprite),
        ];
        if self.input.can_undo() {
            let depth = self.sequencer.store().history_len();
            items.push(format!("[{}] undo ({depth})", b.undo));
        }
        items.push(format!("[{}] reset", b.reset));
        items.push(format!("[{}] quit", b.quit));
        items
    }

    fn render_border(&self, stdout: &mut io::Stdout) -> Result<()> {
        let cols = self.stage.cols() as usize;
        let top = self.stage.origin_row - 1;
        let bottom = self.stage.origin_row + self.stage.rows();
        let horizontal = "─".repeat(cols);
        queue!(
            stdout,
            cursor::MoveTo(0, top),
            style::Print(format!("┌{horizontal}┐")),
            cursor::MoveTo(0, bottom),
            style::Print(format!("└{horizontal}┘")),
        )?;
        for row in self.stage.origin_row..bottom {
            queue!(
                stdout,
                cursor::MoveTo(0, row),
                style::Print('│'),
                cursor::MoveTo(self.stage.origin_col + self.stage.cols(), row),
                style::Print('│'),
            )?;
        }
        Ok(())
    }

    fn render_stage(&self, stdout: &mut io::Stdout) -> Result<()> {
        let blank = " ".repeat(self.stage.cols() as usize);
        for row in 0..self.stage.rows() {
            queue!(
                stdout,
                cursor::MoveTo(self.stage.origin_col, self.stage.origin_row + row),
                style::Print(&blank),
            )?;
        }

        let mut shown = self.latest.clone();
        shown.position = self.drawn;
        self.sprite.record(self.drawn);
        let (sx, sy) = self.stage.sprite_cell(&shown);

        let glyph = heading_glyph(shown.rotation);
        let body = ["/\\_/\\".to_string(), "(o.o)".to_string(), format!(" >{glyph}< ")];
        let sprite_style = if shown.size > 0.0 {
            style::ContentStyle::new().bold()
        } else if shown.size < 0.0 {
            style::ContentStyle::new().dim()
        } else {
            style::ContentStyle::new()
        };
        for (dy, line) in body.iter().enumerate() {
            self.put(stdout, sx, sy + dy as i32, line, sprite_style)?;
        }

        if shown.text.is_visible() {
            let bubble = if shown.text.think {
                format!("( {} ) o", shown.text.message)
            } else {
                format!("< {} >", shown.text.message)
            };
            let row = if sy > 0 { sy - 1 } else { sy + SPRITE_ROWS as i32 };
            let col = sx + SPRITE_COLS as i32 / 2;
            self.put(stdout, col, row, &bubble, style::ContentStyle::new().italic())?;
        }

        stdout.flush()?;
        Ok(())
    }

    /// Print `text` at a stage-relative cell, clipped to the stage.
    fn put(
        &self,
        stdout: &mut io::Stdout,
        col: i32,
        row: i32,
        text: &str,
        cs: style::ContentStyle,
    ) -> Result<()> {
        let cols = self.stage.cols() as i32;
        if row < 0 || row >= self.stage.rows() as i32 {
            return Ok(());
        }
        for (i, ch) in text.chars().enumerate() {
            let x = col + i as i32;
            if (0..cols).contains(&x) {
                queue!(
                    stdout,
                    cursor::MoveTo(
                        self.stage.origin_col + x as u16,
                        self.stage.origin_row + row as u16
                    ),
                    style::PrintStyledContent(style::StyledContent::new(cs, ch)),
                )?;
            }
        }
        Ok(())
    }

    fn render_status(&self, stdout: &mut io::Stdout) -> Result<()> {
        let status_y = self.stage.origin_row + self.stage.rows() + 1;
        let (_, term_h) = terminal::size()?;
        if status_y >= term_h {
            return Ok(()); // No room for status bar.
        }

        let m = &self.latest;
        let activity = match (self.shown_playing, self.sequencer.current_run()) {
            (true, Some(run)) => format!("playing {run}"),
            _ => "idle".to_string(),
        };
        let status = format!(
            " x {:.0}  y {:.0} | dir {:.0}\u{b0} | size {:+.0} | {activity} ",
            m.position.x,
            m.position.y,
            m.rotation.rem_euclid(360.0),
            m.size,
        );

        let mut cs = style::ContentStyle::default();
        cs.attributes.set(style::Attribute::Dim);

        queue!(
            stdout,
            cursor::MoveTo(0, status_y),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::PrintStyledContent(style::StyledContent::new(cs, status)),
        )?;
        Ok(())
    }
}

/// Terminal size needed to show `stage` with its border, menu bar and
/// status bar. Saturates for stages wider than any terminal.
fn required_size(stage: &Stage) -> (u16, u16) {
    let w = stage.cols().saturating_add(2);
    // menu bar + top/bottom border + status bar
    let h = stage.rows().saturating_add(CANVAS_OFFSET + 3);
    (w, h)
}

/// Arrow for the sprite's heading, in eight sectors. 0° points right and
/// angles grow clockwise on screen.
fn heading_glyph(rotation: f64) -> char {
    const ARROWS: [char; 8] = ['→', '↘', '↓', '↙', '←', '↖', '↑', '↗'];
    let sector = ((rotation.rem_euclid(360.0) + 22.5) / 45.0).floor() as usize % ARROWS.len();
    ARROWS[sector]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_glyph_sectors() {
        assert_eq!(heading_glyph(0.0), '→');
        assert_eq!(heading_glyph(90.0), '↓');
        assert_eq!(heading_glyph(-90.0), '↑');
        assert_eq!(heading_glyph(270.0), '↑');
        assert_eq!(heading_glyph(350.0), '→');
        assert_eq!(heading_glyph(765.0), '↘');
    }

    #[test]
    fn required_size_covers_chrome_and_saturates() {
        let stage = Player::stage_layout(&StageConfig::default());
        assert_eq!(required_size(&stage), (52, 29));

        let huge = StageConfig {
            width_px: 1e9,
            height_px: 1e9,
            ..StageConfig::default()
        };
        assert_eq!(required_size(&Player::stage_layout(&huge)), (u16::MAX, u16::MAX));
    }

    #[test]
    fn tween_interpolates_then_lands() {
        let start = Instant::now();
        let tween = Tween {
            from: Point::new(0.0, 0.0),
            to: Point::new(100.0, 50.0),
            started: start,
            duration: Duration::from_millis(1000),
        };
        let (mid, done) = tween.sample(start + Duration::from_millis(500));
        assert!(!done);
        assert_eq!(mid, Point::new(50.0, 25.0));
        let (end, done) = tween.sample(start + Duration::from_millis(1500));
        assert!(done);
        assert_eq!(end, Point::new(100.0, 50.0));
    }
}
