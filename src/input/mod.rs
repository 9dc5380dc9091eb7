//! Turns terminal input into sequencer triggers.

pub mod pointer;

use crossterm::event::{Event, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use tracing::debug;

use crate::config::{KeyBindings, matches_binding};
use crate::engine::Sequencer;
use crate::program::EventKind;
use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Nothing to do.
    Continue,
    Redraw,
    /// The run control (`when_flag_clicked`, ignored while playing).
    Run,
    /// The trigger key (`when_key_pressed`).
    KeyTrigger,
    /// A click on the sprite (`when_sprite_clicked`).
    ClickSprite,
    Undo,
    Reset,
    ToggleFullscreen,
    Quit,
}

pub struct InputAdapter {
    sequencer: Sequencer,
    bindings: KeyBindings,
    stage: Stage,
}

impl InputAdapter {
    pub fn new(sequencer: Sequencer, bindings: KeyBindings, stage: Stage) -> Self {
        InputAdapter {
            sequencer,
            bindings,
            stage,
        }
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Undo is only offered while there is history to pop.
    pub fn can_undo(&self) -> bool {
        self.sequencer.store().history_len() > 0
    }

    pub fn handle_event(&self, event: Event) -> Command {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(_, _) => Command::Redraw,
            _ => Command::Continue,
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Command {
        let b = &self.bindings;
        if matches_binding(&b.quit, &key) {
            Command::Quit
        } else if matches_binding(&b.trigger_key, &key) {
            Command::KeyTrigger
        } else if matches_binding(&b.run, &key) {
            Command::Run
        } else if matches_binding(&b.click_sprite, &key) {
            Command::ClickSprite
        } else if matches_binding(&b.undo, &key) {
            if self.can_undo() { Command::Undo } else { Command::Continue }
        } else if matches_binding(&b.reset, &key) {
            Command::Reset
        } else if matches_binding(&b.fullscreen, &key) {
            Command::ToggleFullscreen
        } else {
            Command::Continue
        }
    }

    fn handle_mouse(&self, mouse: MouseEvent) -> Command {
        match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                let point = self.stage.cell_to_screen(mouse.column, mouse.row);
                self.sequencer.pointer().record(point);
                Command::Continue
            }
            MouseEventKind::Down(MouseButton::Left) => {
                let motion = self.sequencer.store().motion();
                if self.stage.hits_sprite(mouse.column, mouse.row, &motion) {
                    Command::ClickSprite
                } else {
                    Command::Continue
                }
            }
            _ => Command::Continue,
        }
    }

    /// Apply a command to the sequencer. Returns whether the preview chrome
    /// (menu, status) should be redrawn.
    pub fn dispatch(&self, command: Command) -> bool {
        match command {
            Command::Run => self.sequencer.run().is_some(),
            Command::KeyTrigger => self.sequencer.start_animation(EventKind::KeyPressed).is_some(),
            Command::ClickSprite => self
                .sequencer
                .start_animation(EventKind::SpriteClicked)
                .is_some(),
            Command::Undo => self.sequencer.undo(),
            Command::Reset => {
                self.sequencer.reset();
                true
            }
            Command::Redraw => true,
            Command::Continue | Command::ToggleFullscreen | Command::Quit => {
                debug!(?command, "not a sequencer command");
                false
            }
        }
    }
}
