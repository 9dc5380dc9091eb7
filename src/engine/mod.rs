//! The action sequencer.
//!
//! Turns a triggering event into state changes over time: it selects the
//! chains headed by that event, snapshots the sprite for undo, then walks each
//! chain step by step with a fixed pacing delay between steps.
//!
//! Every scheduled continuation belongs to a cancellation scope. Chain walkers
//! belong to their run, which a newer run, `undo` or `reset` cancels. Timed
//! clears belong to the session, which only `reset` cancels, and they only
//! apply while the run that scheduled them is still the last run to write the
//! slot. Within one run they are unconditional.

pub mod effects;
pub mod store;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::{PlaygroundConfig, StageConfig, Timing};
use crate::input::pointer::PointerTracker;
use crate::program::{Action, EventKind, Program, Step};
use crate::stage::SpriteBounds;
use effects::{Apply, StepContext, Touch};
use store::{SpriteStore, Stamp};

/// Identifies one triggered run. Increases monotonically per sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct ActiveRun {
    id: RunId,
    token: CancellationToken,
}

struct RunState {
    /// Parent of every run token and every timed clear.
    session: CancellationToken,
    /// Bumped by `reset`; chain guards from older epochs no longer count.
    epoch: u64,
    current: Option<ActiveRun>,
    last_id: u64,
}

struct Inner {
    store: Arc<SpriteStore>,
    pointer: Arc<PointerTracker>,
    bounds: Box<dyn SpriteBounds>,
    program: RwLock<Arc<Program>>,
    rng: Mutex<StdRng>,
    timing: Timing,
    stage: StageConfig,
    runs: Mutex<RunState>,
    /// Chains currently between their first and last step.
    active: watch::Sender<usize>,
}

#[derive(Clone, Copy)]
enum Slot {
    Text,
    Animation,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::Text => "text",
            Slot::Animation => "animation",
        })
    }
}

/// Runs authored programs against one sprite.
///
/// Cheap to clone; clones share the same store, program and run state.
/// Triggering methods spawn onto the current tokio runtime and must be called
/// from within one.
#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<Inner>,
}

impl Sequencer {
    pub fn new(
        store: Arc<SpriteStore>,
        pointer: Arc<PointerTracker>,
        bounds: impl SpriteBounds + 'static,
        config: &PlaygroundConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (active, _) = watch::channel(0);
        Sequencer {
            inner: Arc::new(Inner {
                store,
                pointer,
                bounds: Box::new(bounds),
                program: RwLock::new(Arc::new(Program::default())),
                rng: Mutex::new(rng),
                timing: config.timing.clone(),
                stage: config.stage.clone(),
                runs: Mutex::new(RunState {
                    session: CancellationToken::new(),
                    epoch: 0,
                    current: None,
                    last_id: 0,
                }),
                active,
            }),
        }
    }

    pub fn store(&self) -> &Arc<SpriteStore> {
        &self.inner.store
    }

    pub fn pointer(&self) -> &Arc<PointerTracker> {
        &self.inner.pointer
    }

    /// The program new runs will bind to.
    pub fn program(&self) -> Arc<Program> {
        Arc::clone(&*self.inner.program.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a newly authored program. Runs already in flight keep walking
    /// the version they were started with.
    pub fn replace_program(&self, program: Program) {
        let roots = program.roots().len();
        *self.inner.program.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(program);
        info!(roots, "program replaced");
    }

    /// Whether a chain of a live run is between its first and last step.
    /// Chains of cancelled runs may still be winding down; they don't count.
    pub fn is_playing(&self) -> bool {
        let runs = self.inner.runs();
        runs.current.is_some() && *self.inner.active.borrow() > 0
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.inner.runs().current.as_ref().map(|run| run.id)
    }

    /// Resolve once no chain is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.active.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// The run control: start `when_flag_clicked` chains unless something is
    /// already playing.
    pub fn run(&self) -> Option<RunId> {
        if self.is_playing() {
            debug!("run ignored while playing");
            return None;
        }
        self.start_animation(EventKind::FlagClicked)
    }

    /// Start every chain headed by `event`.
    ///
    /// Returns `None`, leaving state and history untouched, when the program
    /// has no such chain. Otherwise pushes one history entry, supersedes the
    /// previous run and starts the matching chains in root order.
    pub fn start_animation(&self, event: EventKind) -> Option<RunId> {
        let program = self.program();
        let chains = program.chains_for(event);
        if chains.is_empty() {
            debug!(%event, "no chains for event");
            return None;
        }

        let store = &self.inner.store;
        store.push_history(store.snapshot());

        let (run, token, epoch) = self.inner.begin_run();
        info!(%run, %event, chains = chains.len(), "run started");

        for head in chains {
            self.inner.dispatch(run, &head.action);
            if head.next.is_some() {
                let guard = ChainGuard::enter(&self.inner, epoch);
                tokio::spawn(continue_chain(
                    Arc::clone(&self.inner),
                    run,
                    token.clone(),
                    head,
                    guard,
                ));
            }
        }
        Some(run)
    }

    /// Restore the state from before the most recent run. Cancels the current
    /// run first so its remaining steps cannot overwrite the restored state.
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&self) -> bool {
        self.inner.cancel_current("undo");
        match self.inner.store.pop_history() {
            Some(entry) => {
                self.inner.store.restore(entry);
                info!(remaining = self.inner.store.history_len(), "undo");
                true
            }
            None => {
                debug!("undo with empty history");
                false
            }
        }
    }

    /// Default sprite, empty history, and every pending continuation or
    /// timed clear cancelled.
    pub fn reset(&self) {
        {
            let mut runs = self.inner.runs();
            runs.session.cancel();
            runs.session = CancellationToken::new();
            runs.epoch += 1;
            runs.current = None;
            self.inner.active.send_replace(0);
        }
        self.inner.store.reset();
        info!("reset");
    }
}

impl Inner {
    fn runs(&self) -> MutexGuard<'_, RunState> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_run(&self) -> (RunId, CancellationToken, u64) {
        let mut runs = self.runs();
        if let Some(previous) = runs.current.take() {
            previous.token.cancel();
            debug!(run = %previous.id, "run superseded");
        }
        runs.last_id += 1;
        let id = RunId(runs.last_id);
        let token = runs.session.child_token();
        runs.current = Some(ActiveRun {
            id,
            token: token.clone(),
        });
        (id, token, runs.epoch)
    }

    fn cancel_current(&self, reason: &'static str) {
        if let Some(run) = self.runs().current.take() {
            run.token.cancel();
            debug!(run = %run.id, reason, "run cancelled");
        }
    }

    fn session(&self) -> CancellationToken {
        self.runs().session.clone()
    }

    fn dispatch(self: &Arc<Self>, run: RunId, action: &Action) {
        let stamp: Stamp = run.0;
        let pointer = self.pointer.position();
        let effect = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            let mut ctx = StepContext {
                rng: &mut *rng,
                pointer,
                bounds: self.bounds.as_ref(),
                stage: &self.stage,
                say_duration: Duration::from_millis(self.timing.say_duration_ms),
            };
            self.store.apply_step(stamp, |motion| action.apply(motion, &mut ctx))
        };
        trace!(%run, action = action.kind(), "step dispatched");

        if let Touch::WrittenUntil(after) = effect.text {
            self.schedule_clear(Slot::Text, stamp, after);
        }
        if let Touch::WrittenUntil(after) = effect.animation {
            self.schedule_clear(Slot::Animation, stamp, after);
        }
    }

    fn schedule_clear(self: &Arc<Self>, slot: Slot, stamp: Stamp, after: Duration) {
        let token = self.session();
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = time::sleep(after) => {
                    let cleared = match slot {
                        Slot::Text => store.clear_text_if_owned(stamp),
                        Slot::Animation => store.clear_animation_if_owned(stamp),
                    };
                    debug!(%slot, run = stamp, cleared, "timed clear");
                }
            }
        });
    }
}

/// Walk the rest of a chain whose head has already been dispatched.
async fn continue_chain(
    inner: Arc<Inner>,
    run: RunId,
    token: CancellationToken,
    head: Arc<Step>,
    _guard: ChainGuard,
) {
    let mut current: &Step = &head;
    while let Some(next) = current.next.as_deref() {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(%run, "chain stopped");
                return;
            }
            () = time::sleep(inner.timing.step_delay()) => {}
        }
        inner.dispatch(run, &next.action);
        current = next;
    }
    trace!(%run, "chain finished");
}

/// Counts one chain as in flight until dropped.
struct ChainGuard {
    inner: Arc<Inner>,
    epoch: u64,
}

impl ChainGuard {
    fn enter(inner: &Arc<Inner>, epoch: u64) -> Self {
        let runs = inner.runs();
        if runs.epoch == epoch {
            inner.active.send_modify(|n| *n += 1);
        }
        drop(runs);
        ChainGuard {
            inner: Arc::clone(inner),
            epoch,
        }
    }
}

impl Drop for ChainGuard {
    fn drop(&mut self) {
        // Hold the run lock so a concurrent reset can't zero the count
        // between the epoch check and the decrement.
        let runs = self.inner.runs();
        if runs.epoch == self.epoch {
            self.inner.active.send_modify(|n| *n = n.saturating_sub(1));
        }
    }
}
