//! The phase stack.

use crate::context::PhaseContext;
use crate::phase::PhaseState;

/// One frame of the phase stack: a state and the context it was pushed with.
#[derive(Debug)]
pub struct PhaseData {
    state: PhaseState,
    context: PhaseContext,
}

impl PhaseData {
    pub fn new(state: PhaseState, context: PhaseContext) -> Self {
        Self { state, context }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn context(&self) -> &PhaseContext {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut PhaseContext {
        &mut self.context
    }

    /// Split the frame into its parts.
    pub fn into_parts(self) -> (PhaseState, PhaseContext) {
        (self.state, self.context)
    }
}

/// LIFO sequence of [`PhaseData`] frames, bottom first.
#[derive(Debug, Default)]
pub struct PhaseStack {
    frames: Vec<PhaseData>,
}

impl PhaseStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: PhaseState, context: PhaseContext) {
        self.frames.push(PhaseData::new(state, context));
    }

    pub fn pop(&mut self) -> Option<PhaseData> {
        self.frames.pop()
    }

    pub fn peek(&self) -> Option<&PhaseData> {
        self.frames.last()
    }

    pub(crate) fn peek_mut(&mut self) -> Option<&mut PhaseData> {
        self.frames.last_mut()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames from the bottom of the stack to the top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &PhaseData> + '_ {
        self.frames.iter()
    }

    /// Drop every frame above `depth`, returning how many were dropped.
    ///
    /// Dropped frames are discarded without being unwound.
    pub fn truncate(&mut self, depth: usize) -> usize {
        let dropped = self.frames.len().saturating_sub(depth);
        self.frames.truncate(depth);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{BlockPhaseState, EntityPhaseState};

    fn complete() -> PhaseContext {
        PhaseContext::start().complete()
    }

    #[test]
    fn push_pop_is_lifo() {
        let mut stack = PhaseStack::new();
        stack.push(PhaseState::IDLE, complete());
        stack.push(PhaseState::Entity(EntityPhaseState::DeathUpdate), complete());
        stack.push(PhaseState::Entity(EntityPhaseState::DeathDropsSpawning), complete());

        assert_eq!(stack.len(), 3);
        assert_eq!(
            stack.peek().map(PhaseData::state),
            Some(PhaseState::Entity(EntityPhaseState::DeathDropsSpawning))
        );
        assert_eq!(
            stack.pop().map(|frame| frame.state()),
            Some(PhaseState::Entity(EntityPhaseState::DeathDropsSpawning))
        );
        assert_eq!(
            stack.pop().map(|frame| frame.state()),
            Some(PhaseState::Entity(EntityPhaseState::DeathUpdate))
        );
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn iter_runs_bottom_to_top() {
        let mut stack = PhaseStack::new();
        stack.push(PhaseState::IDLE, complete());
        stack.push(PhaseState::Block(BlockPhaseState::BlockDecay), complete());
        let states: Vec<_> = stack.iter().map(PhaseData::state).collect();
        assert_eq!(
            states,
            vec![PhaseState::IDLE, PhaseState::Block(BlockPhaseState::BlockDecay)]
        );
    }

    #[test]
    fn truncate_reports_dropped_frames() {
        let mut stack = PhaseStack::new();
        for _ in 0..4 {
            stack.push(PhaseState::IDLE, complete());
        }
        assert_eq!(stack.truncate(1), 3);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.truncate(5), 0);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn empty_stack_pops_nothing() {
        let mut stack = PhaseStack::new();
        assert!(stack.is_empty());
        assert!(stack.pop().is_none());
        assert!(stack.peek().is_none());
    }
}
