//! Decider abstraction for event-sourced domain models.

use crate::error::{DomainError, DomainResult};

/// Optimistic concurrency expectation for a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (useful for migrations, backfills, etc.).
    Any,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Pure decision model (pure, deterministic).
///
/// - **Decision logic**: `decide(command, state)` returns events or a rejection.
/// - **State evolution**: `evolve(state, event)` folds one event into state.
///
/// Deciders hold no state of their own and must not perform IO. Current state is
/// always rebuilt by folding the stream from `initial_state()`, so calling
/// `decide` again after a stale append is always safe.
pub trait Decider {
    type State: Clone + core::fmt::Debug;
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// State of a stream with no events.
    fn initial_state() -> Self::State;

    /// Evolve state by a single event.
    ///
    /// Must be total: combinations that cannot legally occur return the state unchanged.
    fn evolve(state: Self::State, event: &Self::Event) -> Self::State;

    /// Decide which events to emit given the current state and a command.
    fn decide(command: &Self::Command, state: &Self::State) -> Result<Vec<Self::Event>, Self::Error>;

    /// Rebuild state by replaying events left-to-right from `initial_state()`.
    fn fold<'a, I>(events: I) -> Self::State
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        events
            .into_iter()
            .fold(Self::initial_state(), |state, event| Self::evolve(state, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tally {
        Add(i64),
    }

    struct Counter;

    impl Decider for Counter {
        type State = i64;
        type Command = i64;
        type Event = Tally;
        type Error = DomainError;

        fn initial_state() -> i64 {
            0
        }

        fn evolve(state: i64, event: &Tally) -> i64 {
            match event {
                Tally::Add(n) => state + n,
            }
        }

        fn decide(command: &i64, _state: &i64) -> Result<Vec<Tally>, DomainError> {
            if *command == 0 {
                return Err(DomainError::validation("delta cannot be zero"));
            }
            Ok(vec![Tally::Add(*command)])
        }
    }

    #[test]
    fn fold_starts_from_initial_state() {
        assert_eq!(Counter::fold(&[]), 0);
        assert_eq!(Counter::fold(&[Tally::Add(2), Tally::Add(-5)]), -3);
    }

    #[test]
    fn expected_version_exact_rejects_stale_reads() {
        assert!(ExpectedVersion::Exact(3).check(3).is_ok());
        assert!(matches!(
            ExpectedVersion::Exact(3).check(4),
            Err(DomainError::Conflict(_))
        ));
        assert!(ExpectedVersion::Any.matches(42));
    }
}
