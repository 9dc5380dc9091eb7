//! Sprite state store: the current `SpriteMotion` and the undo history.
//!
//! State lives in a `watch` channel. Every mutation runs as a closure over the
//! latest value under the channel's lock, so a timed clear and a chain step can
//! never apply to a stale copy, and the renderer is woken on each change.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::effects::Effect;
use crate::types::{HistoryEntry, SpeechText, SpriteMotion};

/// Identifies the run that last wrote a timed slot.
pub type Stamp = u64;

#[derive(Debug, Clone, Default)]
struct Tracked {
    motion: SpriteMotion,
    text_owner: Option<Stamp>,
    animation_owner: Option<Stamp>,
}

#[derive(Debug)]
pub struct SpriteStore {
    state: watch::Sender<Tracked>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl Default for SpriteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SpriteStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Tracked::default());
        SpriteStore {
            state,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn motion(&self) -> SpriteMotion {
        self.state.borrow().motion.clone()
    }

    /// The fields captured for undo.
    pub fn snapshot(&self) -> HistoryEntry {
        HistoryEntry::from(&self.state.borrow().motion)
    }

    pub fn subscribe(&self) -> MotionReceiver {
        MotionReceiver {
            inner: self.state.subscribe(),
        }
    }

    /// Apply a transition to the latest state.
    pub fn apply(&self, mutate: impl FnOnce(&mut SpriteMotion)) {
        self.state.send_modify(|t| mutate(&mut t.motion));
    }

    /// Apply a chain step of run `stamp` and record the run as the owner of
    /// every timed slot the step wrote.
    pub fn apply_step(
        &self,
        stamp: Stamp,
        transition: impl FnOnce(&mut SpriteMotion) -> Effect,
    ) -> Effect {
        let mut effect = Effect::NONE;
        self.state.send_modify(|t| {
            effect = transition(&mut t.motion);
            if effect.text.is_written() {
                t.text_owner = Some(stamp);
            }
            if effect.animation.is_written() {
                t.animation_owner = Some(stamp);
            }
        });
        effect
    }

    /// Hide the bubble, unless a run other than `stamp` wrote it since.
    pub fn clear_text_if_owned(&self, stamp: Stamp) -> bool {
        self.state.send_if_modified(|t| {
            if t.text_owner != Some(stamp) {
                return false;
            }
            t.motion.text = SpeechText::default();
            t.text_owner = None;
            true
        })
    }

    /// Drop the running animation, unless a run other than `stamp` wrote it
    /// since.
    pub fn clear_animation_if_owned(&self, stamp: Stamp) -> bool {
        self.state.send_if_modified(|t| {
            if t.animation_owner != Some(stamp) {
                return false;
            }
            t.motion.animation = None;
            t.animation_owner = None;
            true
        })
    }

    pub fn push_history(&self, entry: HistoryEntry) {
        self.history().push(entry);
    }

    pub fn pop_history(&self) -> Option<HistoryEntry> {
        self.history().pop()
    }

    pub fn history_len(&self) -> usize {
        self.history().len()
    }

    /// Write a history entry back. `animation` is always cleared and no
    /// pending timed clear owns the restored slots.
    pub fn restore(&self, entry: HistoryEntry) {
        self.state.send_modify(|t| {
            t.motion.position = entry.position;
            t.motion.rotation = entry.rotation;
            t.motion.size = entry.size;
            t.motion.text = entry.text;
            t.motion.animation = None;
            t.text_owner = None;
            t.animation_owner = None;
        });
    }

    /// Back to the default sprite with an empty history.
    pub fn reset(&self) {
        self.state.send_modify(|t| *t = Tracked::default());
        self.history().clear();
    }

    fn history(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Renderer-side view of the store.
#[derive(Debug, Clone)]
pub struct MotionReceiver {
    inner: watch::Receiver<Tracked>,
}

impl MotionReceiver {
    /// Wait for the next change. Errors once the store is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.inner.changed().await
    }

    /// The latest state, marking it seen.
    pub fn current(&mut self) -> SpriteMotion {
        self.inner.borrow_and_update().motion.clone()
    }
}
