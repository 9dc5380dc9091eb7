//! The authored action model.
//!
//! Turns the editor's block JSON into typed chains. A chain is an owned
//! linked list of steps, so it is always finite and acyclic.

pub mod action;
pub mod source;

use std::path::Path;
use std::sync::Arc;

pub use action::{Action, EventKind, PointTarget};
use source::{Block, SourceProgram};

use crate::error::{PlaygroundError, Result};

/// One action and the step that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub action: Action,
    pub next: Option<Box<Step>>,
}

impl Step {
    pub fn iter(&self) -> StepIter<'_> {
        StepIter { current: Some(self) }
    }

    pub fn step_count(&self) -> usize {
        self.iter().count()
    }
}

impl TryFrom<&Block> for Step {
    type Error = PlaygroundError;

    fn try_from(block: &Block) -> Result<Self> {
        let action = Action::from_block(block)?;

        // Walk iteratively so long chains don't recurse per link.
        let mut rest = Vec::new();
        let mut cursor = block.next_block();
        while let Some(b) = cursor {
            rest.push(Action::from_block(b)?);
            cursor = b.next_block();
        }

        let next = rest
            .into_iter()
            .rev()
            .fold(None, |next, action| Some(Box::new(Step { action, next })));
        Ok(Step { action, next })
    }
}

// Same as `Block`: dropping a long chain must not recurse per step.
impl Drop for Step {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut step) = next {
            next = step.next.take();
        }
    }
}

pub struct StepIter<'a> {
    current: Option<&'a Step>,
}

impl<'a> Iterator for StepIter<'a> {
    type Item = &'a Action;

    fn next(&mut self) -> Option<Self::Item> {
        let step = self.current?;
        self.current = step.next.as_deref();
        Some(&step.action)
    }
}

/// An authored program: top-level chains in editor order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    roots: Vec<Arc<Step>>,
}

impl Program {
    pub fn from_blocks(blocks: &[Block]) -> Result<Self> {
        let roots = blocks
            .iter()
            .map(|b| Step::try_from(b).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Program { roots })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let source = SourceProgram::from_json(json)?;
        Self::from_blocks(&source.into_blocks())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PlaygroundError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn roots(&self) -> &[Arc<Step>] {
        &self.roots
    }

    /// Root chains whose head is the hat block for `event`, in root order.
    pub fn chains_for(&self, event: EventKind) -> Vec<Arc<Step>> {
        self.roots
            .iter()
            .filter(|root| root.action.event() == Some(event))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
