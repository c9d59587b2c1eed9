//! Aggregate persistence with an append-only event history per aggregate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::Aggregate;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// An aggregate together with the number of events it was built from.
#[derive(Debug, Clone)]
pub struct Versioned<A> {
    pub aggregate: A,
    pub version: u64,
}

/// Storage for aggregates and their event histories.
///
/// `append` is optimistic: it fails if the stored version is not the one the
/// caller loaded.
#[async_trait]
pub trait AggregateStore<A: Aggregate>: Send + Sync {
    /// Loads the current state of an aggregate.
    async fn load(&self, id: A::Id) -> Result<Option<Versioned<A>>, StoreError>;

    /// Appends events and returns the resulting state.
    async fn append(
        &self,
        id: A::Id,
        expected_version: u64,
        events: Vec<A::Event>,
    ) -> Result<Versioned<A>, StoreError>;

    /// Returns the full event history in order.
    async fn history(&self, id: A::Id) -> Result<Vec<A::Event>, StoreError>;
}

struct Entry<A: Aggregate> {
    state: A,
    events: Vec<A::Event>,
}

/// In-memory aggregate store.
///
/// Keeps the folded state next to the history so loads do not replay.
pub struct InMemoryAggregateStore<A: Aggregate> {
    entries: Arc<RwLock<HashMap<A::Id, Entry<A>>>>,
}

impl<A: Aggregate> InMemoryAggregateStore<A> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the number of stored aggregates.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<A: Aggregate> Default for InMemoryAggregateStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Aggregate> Clone for InMemoryAggregateStore<A> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[async_trait]
impl<A: Aggregate> AggregateStore<A> for InMemoryAggregateStore<A> {
    async fn load(&self, id: A::Id) -> Result<Option<Versioned<A>>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&id).map(|entry| Versioned {
            aggregate: entry.state.clone(),
            version: entry.events.len() as u64,
        }))
    }

    async fn append(
        &self,
        id: A::Id,
        expected_version: u64,
        events: Vec<A::Event>,
    ) -> Result<Versioned<A>, StoreError> {
        let mut entries = self.entries.write().await;
        let actual = entries.get(&id).map_or(0, |entry| entry.events.len() as u64);
        if actual != expected_version {
            return Err(StoreError::ConcurrencyConflict {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let entry = entries.entry(id).or_insert_with(|| Entry {
            state: A::default(),
            events: Vec::new(),
        });
        entry.state.apply_events(events.iter().cloned());
        entry.events.extend(events);

        Ok(Versioned {
            aggregate: entry.state.clone(),
            version: entry.events.len() as u64,
        })
    }

    async fn history(&self, id: A::Id) -> Result<Vec<A::Event>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&id)
            .map(|entry| entry.events.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::CartId;
    use domain::{Cart, OwnerRef};

    use super::*;

    #[tokio::test]
    async fn test_append_and_load() {
        let store = InMemoryAggregateStore::<Cart>::new();
        let id = CartId::new();
        let events = Cart::default()
            .open(id, OwnerRef::Guest("g1".into()), Utc::now())
            .unwrap();

        let stored = store.append(id, 0, events).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.aggregate.id(), Some(id));

        let loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.aggregate, stored.aggregate);
        assert_eq!(store.history(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = InMemoryAggregateStore::<Cart>::new();
        let id = CartId::new();
        let events = Cart::default()
            .open(id, OwnerRef::Guest("g1".into()), Utc::now())
            .unwrap();
        store.append(id, 0, events.clone()).await.unwrap();

        let result = store.append(id, 0, events).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_aggregate() {
        let store = InMemoryAggregateStore::<Cart>::new();
        assert!(store.load(CartId::new()).await.unwrap().is_none());
        assert!(store.history(CartId::new()).await.unwrap().is_empty());
    }
}
