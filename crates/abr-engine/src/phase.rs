//! Reconciliation phases and their legal transitions

use crate::error::EngineError;

/// Phase of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilePhase {
    Idle,
    Validating,
    Diffing,
    ResolvingResources,
    Instantiating,
    Applying,
    Done,
    Failed,
}

/// Phases reachable from `from`
#[must_use]
pub fn allowed_transitions(from: ReconcilePhase) -> &'static [ReconcilePhase] {
    use ReconcilePhase::{
        Applying, Diffing, Done, Failed, Idle, Instantiating, ResolvingResources, Validating,
    };
    match from {
        Idle => &[Validating],
        Validating => &[Diffing, Failed],
        Diffing => &[ResolvingResources],
        ResolvingResources => &[Instantiating],
        Instantiating => &[Applying],
        Applying => &[Done, Failed],
        Done | Failed => &[],
    }
}

/// Check a transition against the table
///
/// # Errors
/// Returns `EngineError::IllegalTransition` if `to` is not reachable from `from`
pub fn validate_transition(from: ReconcilePhase, to: ReconcilePhase) -> Result<(), EngineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(EngineError::IllegalTransition { from, to })
    }
}

/// Current phase of a pass, advanced only along legal edges
#[derive(Debug)]
pub(crate) struct PhaseTracker {
    current: ReconcilePhase,
}

impl PhaseTracker {
    pub(crate) fn new() -> Self {
        Self {
            current: ReconcilePhase::Idle,
        }
    }

    pub(crate) fn advance(&mut self, to: ReconcilePhase) -> Result<(), EngineError> {
        validate_transition(self.current, to)?;
        tracing::trace!("Reconcile phase {:?} -> {:?}", self.current, to);
        self.current = to;
        Ok(())
    }

    pub(crate) fn current(&self) -> ReconcilePhase {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReconcilePhase::*;

    #[test]
    fn happy_path_is_legal() {
        let mut tracker = PhaseTracker::new();
        for phase in [Validating, Diffing, ResolvingResources, Instantiating, Applying, Done] {
            tracker.advance(phase).unwrap();
        }
        assert_eq!(tracker.current(), Done);
    }

    #[test]
    fn failure_only_from_validation_or_apply() {
        assert!(validate_transition(Validating, Failed).is_ok());
        assert!(validate_transition(Applying, Failed).is_ok());
        assert!(validate_transition(Instantiating, Failed).is_err());
        assert!(validate_transition(Diffing, Failed).is_err());
    }

    #[test]
    fn terminal_phases_are_final() {
        assert!(allowed_transitions(Done).is_empty());
        assert!(allowed_transitions(Failed).is_empty());
        assert!(matches!(
            validate_transition(Idle, Applying),
            Err(EngineError::IllegalTransition { from: Idle, to: Applying })
        ));
    }
}
