// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark run state machine with typed state transitions.
//!
//! Implements the run lifecycle: Init → SmallObjects → LargeObjects →
//! MixedObjects → Done, with Failed reachable from any phase.
//! Invalid transitions result in StateTransitionError.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::StateTransitionError;
use crate::workload::Phase;

/// Run lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Baseline recorded, no workload started yet.
    Init,
    /// Phase 1 is running.
    SmallObjects,
    /// Phase 2 is running.
    LargeObjects,
    /// Phase 3 is running.
    MixedObjects,
    /// Every phase completed.
    Done,
    /// A phase ran out of memory.
    Failed,
}

impl RunState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::SmallObjects => "SmallObjects",
            Self::LargeObjects => "LargeObjects",
            Self::MixedObjects => "MixedObjects",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }

    /// The state in which `phase` runs.
    pub const fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::SmallObjects => Self::SmallObjects,
            Phase::LargeObjects => Self::LargeObjects,
            Phase::MixedObjects => Self::MixedObjects,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: RunState) -> bool {
        matches!(
            (self, target),
            (Self::Init, Self::SmallObjects)
                | (Self::SmallObjects, Self::LargeObjects)
                | (Self::LargeObjects, Self::MixedObjects)
                | (Self::MixedObjects, Self::Done)
                | (Self::SmallObjects, Self::Failed)
                | (Self::LargeObjects, Self::Failed)
                | (Self::MixedObjects, Self::Failed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for one benchmark run.
#[derive(Debug)]
pub struct RunStateMachine {
    current_state: RunState,
    last_transition: Instant,
    transition_count: u64,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: RunState::Init,
            last_transition: Instant::now(),
            transition_count: 0,
        }
    }

    pub fn state(&self) -> RunState {
        self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.last_transition.elapsed()
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: RunState) -> Result<(), StateTransitionError> {
        if self.current_state.is_terminal() {
            return Err(StateTransitionError::TerminalState {
                state: self.current_state,
            });
        }

        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                from: self.current_state,
                to: target,
            });
        }

        tracing::debug!(
            from = self.current_state.name(),
            to = target.name(),
            elapsed_ms = self.time_in_current_state().as_millis() as u64,
            "Run state transition"
        );

        self.current_state = target;
        self.last_transition = Instant::now();
        self.transition_count += 1;

        Ok(())
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = RunStateMachine::new();
        assert_eq!(sm.state(), RunState::Init);
        assert_eq!(sm.transition_count(), 0);
    }

    #[test]
    fn test_linear_path() {
        let mut sm = RunStateMachine::new();
        for target in [
            RunState::SmallObjects,
            RunState::LargeObjects,
            RunState::MixedObjects,
            RunState::Done,
        ] {
            assert!(sm.transition_to(target).is_ok());
            assert_eq!(sm.state(), target);
        }
        assert_eq!(sm.transition_count(), 4);
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        let mut sm = RunStateMachine::new();
        assert!(sm.transition_to(RunState::LargeObjects).is_err());
        assert!(sm.transition_to(RunState::Done).is_err());
        assert!(sm.transition_to(RunState::Failed).is_err());
        assert_eq!(sm.state(), RunState::Init);

        sm.transition_to(RunState::SmallObjects).unwrap();
        assert!(sm.transition_to(RunState::Init).is_err());
        assert!(sm.transition_to(RunState::MixedObjects).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut sm = RunStateMachine::new();
        sm.transition_to(RunState::SmallObjects).unwrap();
        sm.transition_to(RunState::Failed).unwrap();

        let err = sm.transition_to(RunState::LargeObjects).unwrap_err();
        assert!(matches!(err, StateTransitionError::TerminalState { .. }));
        assert_eq!(sm.state(), RunState::Failed);
    }

    #[test]
    fn test_for_phase() {
        assert_eq!(RunState::for_phase(Phase::SmallObjects), RunState::SmallObjects);
        assert_eq!(RunState::for_phase(Phase::MixedObjects), RunState::MixedObjects);
        assert!(RunState::Done.is_terminal());
        assert!(!RunState::MixedObjects.is_terminal());
    }
}
