//! Message ledger - append-only turn log with tool-call pairing checks

use crate::error::{Error, Result};
use crate::types::{Role, ToolCall, Turn};
use serde::{Deserialize, Serialize};

/// Ordered, append-only sequence of turns for one thread.
///
/// Every `tool_result` must answer the single call left open by the
/// preceding agent turn. Appends are all-or-nothing: a batch that breaks
/// the pairing rule leaves the ledger untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    turns: Vec<Turn>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from existing turns, rejecting inconsistent history.
    pub fn from_turns(turns: Vec<Turn>) -> Result<Self> {
        let ledger = Self { turns };
        ledger.validate()?;
        Ok(ledger)
    }

    pub fn append(&mut self, turns: impl IntoIterator<Item = Turn>) -> Result<()> {
        let batch: Vec<Turn> = turns.into_iter().collect();
        let mut pairing = Pairing::default();
        for (idx, turn) in self.turns.iter().enumerate() {
            pairing.accept(idx, turn)?;
        }
        for (offset, turn) in batch.iter().enumerate() {
            pairing.accept(self.turns.len() + offset, turn)?;
        }
        self.turns.extend(batch);
        Ok(())
    }

    pub fn push(&mut self, turn: Turn) -> Result<()> {
        self.append([turn])
    }

    pub fn tail(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn validate(&self) -> Result<()> {
        let mut pairing = Pairing::default();
        for (idx, turn) in self.turns.iter().enumerate() {
            pairing.accept(idx, turn)?;
        }
        Ok(())
    }

    /// The call requested by the last agent turn that has no tool_result yet.
    pub fn open_call(&self) -> Option<&ToolCall> {
        let mut open: Option<&ToolCall> = None;
        for turn in &self.turns {
            match turn.role {
                Role::Agent => open = turn.tool_calls.first(),
                Role::ToolResult => open = None,
                Role::User => {}
            }
        }
        open
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[derive(Default)]
struct Pairing {
    open: Option<String>,
}

impl Pairing {
    fn accept(&mut self, idx: usize, turn: &Turn) -> Result<()> {
        match turn.role {
            Role::Agent => {
                if let Some(open) = &self.open {
                    return Err(Error::ledger(format!(
                        "turn {idx}: agent turn while call {open} is unanswered"
                    )));
                }
                if turn.tool_calls.len() > 1 {
                    return Err(Error::ledger(format!(
                        "turn {idx}: {} simultaneous open calls",
                        turn.tool_calls.len()
                    )));
                }
                if let Some(call) = turn.tool_calls.first() {
                    self.open = Some(call.id.clone());
                }
            }
            Role::User => {
                if let Some(open) = &self.open {
                    return Err(Error::ledger(format!(
                        "turn {idx}: user turn while call {open} is unanswered"
                    )));
                }
            }
            Role::ToolResult => {
                let id = turn.tool_call_id.as_deref().ok_or_else(|| {
                    Error::ledger(format!("turn {idx}: tool_result without tool_call_id"))
                })?;
                match self.open.take() {
                    Some(open) if open == id => {}
                    Some(open) => {
                        self.open = Some(open);
                        return Err(Error::ledger(format!(
                            "turn {idx}: tool_result for {id} does not match open call"
                        )));
                    }
                    None => {
                        return Err(Error::ledger(format!(
                            "turn {idx}: tool_result for {id} has no open call"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
