//! Keyed registry of lifecycle entities. Grounded on `startstopper.Map`'s
//! `inMemoryMap`: insert only after a successful start, restart as
//! delete-then-add (accepted non-atomicity — callers serialize by key),
//! remove only after a successful stop.

use super::{Error, Lifecycle};
use dashmap::DashMap;
use std::sync::Arc;

pub struct Registry<V> {
    entries: DashMap<String, (Arc<Lifecycle>, V)>,
}

impl<V: Clone> Default for Registry<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V: Clone> Registry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert and start `entity` under `key` if absent. Returns whether the
    /// registry changed. If `key` is present, this is a no-op.
    pub async fn add_and_start(
        &self,
        key: String,
        entity: Arc<Lifecycle>,
        value: V,
    ) -> Result<bool, Error> {
        if self.entries.contains_key(&key) {
            return Ok(false);
        }
        entity.start().await?;
        self.entries.insert(key, (entity, value));
        Ok(true)
    }

    /// Stop and remove `key` if present, then insert and start the
    /// replacement. Not atomic: a concurrent `get` between the two steps
    /// may observe absence.
    pub async fn update_and_restart(
        &self,
        key: String,
        entity: Arc<Lifecycle>,
        value: V,
    ) -> Result<bool, Error> {
        let removed = self.delete_and_stop(&key).await?;
        let added = self.add_and_start(key, entity, value).await?;
        Ok(removed || added)
    }

    /// Stop and remove `key` if present. No-op, `false`, if absent. On
    /// failure, the entity is left registered (stop happens before removal).
    pub async fn delete_and_stop(&self, key: &str) -> Result<bool, Error> {
        let Some(entity) = self.entries.get(key).map(|e| e.value().0.clone()) else {
            return Ok(false);
        };
        entity.stop().await?;
        self.entries.remove(key);
        Ok(true)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|e| e.value().1.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Snapshot of all keys currently registered, tolerant of concurrent
    /// mutation during iteration.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stop every remaining entry; used by the controller on shutdown.
    pub async fn stop_all(&self) -> Vec<Error> {
        let keys = self.keys();
        let mut errors = Vec::new();
        for key in keys {
            if let Err(e) = self.delete_and_stop(&key).await {
                errors.push(e);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Runner;

    fn noop_runner() -> Runner {
        Box::new(|cancel| {
            Box::pin(async move {
                cancel.cancelled().await;
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn add_and_start_inserts_once() {
        let registry: Registry<u32> = Registry::new();
        let l = Lifecycle::new(noop_runner());
        assert!(registry
            .add_and_start("a".into(), l.clone(), 1)
            .await
            .unwrap());
        assert_eq!(registry.len(), 1);

        let l2 = Lifecycle::new(noop_runner());
        assert!(!registry
            .add_and_start("a".into(), l2, 2)
            .await
            .unwrap());
        assert_eq!(registry.get("a"), Some(1));
    }

    #[tokio::test]
    async fn delete_and_stop_removes_present_key() {
        let registry: Registry<u32> = Registry::new();
        let l = Lifecycle::new(noop_runner());
        registry.add_and_start("a".into(), l, 1).await.unwrap();
        assert!(registry.delete_and_stop("a").await.unwrap());
        assert!(!registry.contains("a"));
        assert!(!registry.delete_and_stop("a").await.unwrap());
    }

    #[tokio::test]
    async fn update_and_restart_replaces_value() {
        let registry: Registry<u32> = Registry::new();
        let l1 = Lifecycle::new(noop_runner());
        registry.add_and_start("a".into(), l1, 1).await.unwrap();

        let l2 = Lifecycle::new(noop_runner());
        let changed = registry
            .update_and_restart("a".into(), l2, 2)
            .await
            .unwrap();
        assert!(changed);
        assert_eq!(registry.get("a"), Some(2));
    }

    #[tokio::test]
    async fn stop_all_clears_registry() {
        let registry: Registry<u32> = Registry::new();
        for i in 0..3u32 {
            registry
                .add_and_start(i.to_string(), Lifecycle::new(noop_runner()), i)
                .await
                .unwrap();
        }
        let errors = registry.stop_all().await;
        assert!(errors.is_empty());
        assert!(registry.is_empty());
    }
}
