//! Pipeline stages and the forward-only machine that moves between them
//!
//! INIT → RESEARCHING → BUDGETING → PLANNING → DONE
//!
//! FAILED is reachable from any non-terminal stage. Nothing moves backwards.

use crate::error::PlannerError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Researching,
    Budgeting,
    Planning,
    Done,
    Failed,
}

impl Stage {
    /// Successor on the happy path
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::Researching),
            Stage::Researching => Some(Stage::Budgeting),
            Stage::Budgeting => Some(Stage::Planning),
            Stage::Planning => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Init => "INIT",
            Stage::Researching => "RESEARCHING",
            Stage::Budgeting => "BUDGETING",
            Stage::Planning => "PLANNING",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone)]
pub struct StageMachine {
    current: Stage,
    history: Vec<Stage>,
}

impl StageMachine {
    pub fn new() -> Self {
        Self {
            current: Stage::Init,
            history: vec![Stage::Init],
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    /// Every stage entered so far, `INIT` first
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Move to `to`. Only the happy-path successor, or FAILED from a
    /// non-terminal stage, is accepted.
    pub fn advance(&mut self, to: Stage) -> Result<Stage> {
        let allowed = self.current.next() == Some(to)
            || (to == Stage::Failed && !self.current.is_terminal());

        if !allowed {
            return Err(PlannerError::InvalidTransition {
                from: self.current,
                to,
            });
        }

        self.current = to;
        self.history.push(to);
        Ok(to)
    }

    pub fn fail(&mut self) -> Result<Stage> {
        self.advance(Stage::Failed)
    }
}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut machine = StageMachine::new();
        for stage in [Stage::Researching, Stage::Budgeting, Stage::Planning, Stage::Done] {
            assert_eq!(machine.advance(stage).unwrap(), stage);
        }
        assert!(machine.current().is_terminal());
        assert_eq!(machine.history().len(), 5);
    }

    #[test]
    fn test_no_skipping_or_rewinding() {
        let mut machine = StageMachine::new();
        assert!(matches!(
            machine.advance(Stage::Budgeting),
            Err(PlannerError::InvalidTransition {
                from: Stage::Init,
                to: Stage::Budgeting
            })
        ));

        machine.advance(Stage::Researching).unwrap();
        machine.advance(Stage::Budgeting).unwrap();
        assert!(machine.advance(Stage::Researching).is_err());
        assert_eq!(machine.current(), Stage::Budgeting);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut machine = StageMachine::new();
        machine.fail().unwrap();
        assert!(machine.fail().is_err());
        assert!(machine.advance(Stage::Researching).is_err());

        let mut done = StageMachine::new();
        for stage in [Stage::Researching, Stage::Budgeting, Stage::Planning, Stage::Done] {
            done.advance(stage).unwrap();
        }
        assert!(done.fail().is_err());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&Stage::Researching).unwrap(), "\"RESEARCHING\"");
        assert_eq!(Stage::Done.to_string(), "DONE");
    }
}
