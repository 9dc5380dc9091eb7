//! Source blocks as the editor serializes them.
//!
//! These mirror the Blockly JSON serialization: every block has a `type`, an
//! open `fields` bag, and an optional `next` link wrapping the following
//! block. Nothing here knows what a field means; `action` gives them types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PlaygroundError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<NextBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextBlock {
    pub block: Box<Block>,
}

/// A whole authored program as the editor hands it over.
///
/// Accepts either the full workspace serialization
/// (`{"blocks": {"languageVersion": 0, "blocks": [...]}}`) or a bare array of
/// top-level blocks.
#[derive(Debug, Clone)]
pub enum SourceProgram {
    Blocks(Vec<Block>),
    Workspace(Workspace),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub blocks: TopBlocks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopBlocks {
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl SourceProgram {
    /// Parse editor JSON. Every `next` link nests two objects deeper, so the
    /// parser runs without serde_json's depth limit and grows its stack on
    /// demand instead.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut de = serde_json::Deserializer::from_str(json);
        de.disable_recursion_limit();
        let program = if json.trim_start().starts_with('[') {
            let blocks = Vec::<Block>::deserialize(serde_stacker::Deserializer::new(&mut de))?;
            SourceProgram::Blocks(blocks)
        } else {
            let workspace = Workspace::deserialize(serde_stacker::Deserializer::new(&mut de))?;
            SourceProgram::Workspace(workspace)
        };
        de.end()?;
        Ok(program)
    }

    pub fn into_blocks(self) -> Vec<Block> {
        match self {
            SourceProgram::Blocks(blocks) => blocks,
            SourceProgram::Workspace(workspace) => workspace.blocks.blocks,
        }
    }
}

// Unlink the chain one block at a time; the derived drop would recurse once
// per `next`.
impl Drop for Block {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(NextBlock { mut block }) = next {
            next = block.next.take();
        }
    }
}

impl Block {
    /// Read a numeric field. Accepts a JSON number or a numeric string, since
    /// text inputs in the editor serialize their content as strings.
    pub fn number(&self, field: &'static str) -> Result<f64> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Err(self.missing(field)),
            Some(Value::Number(n)) => n.as_f64().ok_or_else(|| self.invalid(field, "a number")),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.invalid(field, "a number")),
            Some(_) => Err(self.invalid(field, "a number")),
        }
    }

    /// Read a text field. Numbers are accepted and printed as-is.
    pub fn text(&self, field: &'static str) -> Result<String> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Err(self.missing(field)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(_) => Err(self.invalid(field, "text")),
        }
    }

    pub fn next_block(&self) -> Option<&Block> {
        self.next.as_ref().map(|n| n.block.as_ref())
    }

    fn missing(&self, field: &'static str) -> PlaygroundError {
        PlaygroundError::MissingField {
            block: self.kind.clone(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, expected: &'static str) -> PlaygroundError {
        PlaygroundError::InvalidField {
            block: self.kind.clone(),
            field,
            expected,
        }
    }
}
