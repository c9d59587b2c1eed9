//! Core aggregate and domain event traits.

use std::hash::Hash;

use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;
}

/// Trait for aggregates whose state changes are expressed as events.
///
/// Command methods on an aggregate validate against the current state and
/// return the events they would produce; `apply` folds an event into the
/// state. Keeping the two apart lets a service persist the events as an
/// audit trail before (or instead of) mutating anything.
pub trait Aggregate: Default + Clone + Send + Sync + Sized + 'static {
    /// Identifier type of the aggregate.
    type Id: Copy + Eq + Hash + Ord + Send + Sync + std::fmt::Display + 'static;

    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent + 'static;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, or None before its creation event.
    fn id(&self) -> Option<Self::Id>;

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic and must not fail; events
    /// are facts that have already been accepted.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::CartId;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Created { id: CartId },
        Updated { value: i32 },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Updated { .. } => "TestUpdated",
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct TestAggregate {
        id: Option<CartId>,
        value: i32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("test error")]
    struct TestError;

    impl Aggregate for TestAggregate {
        type Id = CartId;
        type Event = TestEvent;
        type Error = TestError;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
        }

        fn id(&self) -> Option<CartId> {
            self.id
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Created { id } => self.id = Some(id),
                TestEvent::Updated { value } => self.value = value,
            }
        }
    }

    #[test]
    fn test_aggregate_apply_events() {
        let mut aggregate = TestAggregate::default();
        let id = CartId::new();
        aggregate.apply_events(vec![TestEvent::Created { id }, TestEvent::Updated { value: 42 }]);

        assert_eq!(aggregate.id(), Some(id));
        assert_eq!(aggregate.value, 42);
    }

    #[test]
    fn test_domain_event_type() {
        assert_eq!(TestEvent::Created { id: CartId::new() }.event_type(), "TestCreated");
        assert_eq!(TestEvent::Updated { value: 42 }.event_type(), "TestUpdated");
    }
}
