//! Run state and the forward-only state machine for one pipeline run.

use super::StageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The execution state of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created but not started.
    Idle,
    /// The strategist stage is in flight.
    RunningStrategist,
    /// The creator stage is in flight.
    RunningCreator,
    /// The optimizer stage is in flight.
    RunningOptimizer,
    /// All stages finished.
    Completed,
    /// A stage failed or the run was cancelled.
    Failed,
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RunningStrategist => write!(f, "running_strategist"),
            Self::RunningCreator => write!(f, "running_creator"),
            Self::RunningOptimizer => write!(f, "running_optimizer"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl RunState {
    /// Returns the running state for a stage.
    #[must_use]
    pub const fn running(stage: StageId) -> Self {
        match stage {
            StageId::Strategist => Self::RunningStrategist,
            StageId::Creator => Self::RunningCreator,
            StageId::Optimizer => Self::RunningOptimizer,
        }
    }

    /// Returns the stage in flight, if any.
    #[must_use]
    pub const fn stage(self) -> Option<StageId> {
        match self {
            Self::RunningStrategist => Some(StageId::Strategist),
            Self::RunningCreator => Some(StageId::Creator),
            Self::RunningOptimizer => Some(StageId::Optimizer),
            _ => None,
        }
    }

    /// Returns true if the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if a stage is in flight.
    #[must_use]
    pub const fn is_running(self) -> bool {
        self.stage().is_some()
    }
}

/// Error returned when a transition would break the linear stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid run state transition: {from} -> {to}")]
pub struct TransitionError {
    /// State before the attempted transition.
    pub from: RunState,
    /// Requested target state.
    pub to: RunState,
}

/// Tracks the state of one run and rejects out-of-order transitions.
///
/// The only legal path is `Idle -> RunningStrategist -> RunningCreator ->
/// RunningOptimizer -> Completed`, with a jump to `Failed` from any running
/// state.
#[derive(Debug, Clone, Default)]
pub struct RunStateMachine {
    state: RunState,
    history: Vec<RunState>,
}

impl RunStateMachine {
    /// Creates a machine in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Returns every state visited so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Enters the running state for `stage`.
    pub fn begin_stage(&mut self, stage: StageId) -> Result<(), TransitionError> {
        let expected = match self.state {
            RunState::Idle => Some(StageId::Strategist),
            current => current.stage().and_then(StageId::next),
        };

        if expected == Some(stage) {
            self.transition(RunState::running(stage));
            Ok(())
        } else {
            Err(self.reject(RunState::running(stage)))
        }
    }

    /// Marks the run completed. Only legal once the optimizer is running.
    pub fn complete(&mut self) -> Result<(), TransitionError> {
        if self.state == RunState::RunningOptimizer {
            self.transition(RunState::Completed);
            Ok(())
        } else {
            Err(self.reject(RunState::Completed))
        }
    }

    /// Marks the run failed. Only legal while a stage is running.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        if self.state.is_running() {
            self.transition(RunState::Failed);
            Ok(())
        } else {
            Err(self.reject(RunState::Failed))
        }
    }

    fn transition(&mut self, to: RunState) {
        self.state = to;
        self.history.push(to);
    }

    const fn reject(&self, to: RunState) -> TransitionError {
        TransitionError {
            from: self.state,
            to,
        }
    }
}
