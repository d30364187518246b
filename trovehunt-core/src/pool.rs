//! Named reward pools and the process-wide pool directory.

use log::warn;
use rand::{Rng, RngCore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::reward::{MessageTemplates, PreparedReward, RewardVariant, SubPoolError, SubPoolResolver};
use crate::weighted::{SelectorError, WeightedSelector};

/// Errors raised when rehydrating a persisted pool.
#[derive(Debug, Error)]
pub enum PoolLoadError {
    #[error("persisted pool is not an object")]
    NotAnObject,
    #[error("persisted pool is missing its id")]
    MissingId,
}

/// Named, persisted collection of weighted reward variants.
///
/// The pool owns a cumulative-weight selector over its entries; every
/// mutation rebuilds the cumulative offsets and marks the pool dirty for
/// the next persistence sweep.
#[derive(Debug, Clone)]
pub struct RewardPool {
    id: String,
    entries: Vec<RewardVariant>,
    selector: WeightedSelector<usize>,
    messages: Option<MessageTemplates>,
    dirty: bool,
}

impl RewardPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: Vec::new(),
            selector: WeightedSelector::new(),
            messages: None,
            dirty: false,
        }
    }

    /// Pool id, globally unique within the directory.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the pool holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all entry weights.
    #[must_use]
    pub const fn total_weight(&self) -> u64 {
        self.selector.total_weight()
    }

    /// All entries, in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[RewardVariant] {
        &self.entries
    }

    /// Shared message templates applied to variants without overrides.
    #[must_use]
    pub const fn messages(&self) -> Option<&MessageTemplates> {
        self.messages.as_ref()
    }

    /// Replace the shared message templates.
    pub fn set_messages(&mut self, messages: Option<MessageTemplates>) {
        self.messages = messages;
        self.dirty = true;
    }

    /// Append a variant and recompute the cumulative offsets.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::ZeroWeight` when the variant's weight is zero.
    pub fn add(&mut self, variant: RewardVariant) -> Result<(), SelectorError> {
        if variant.weight() == 0 {
            return Err(SelectorError::ZeroWeight);
        }
        self.entries.push(variant);
        self.rebuild();
        self.dirty = true;
        Ok(())
    }

    /// Remove the entry at `index` and rebuild the cumulative offsets.
    /// Remaining weights are unaffected individually; only offsets shift.
    pub fn remove(&mut self, index: usize) -> Option<RewardVariant> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        self.rebuild();
        self.dirty = true;
        Some(removed)
    }

    /// Update the weight of the entry at `index`.
    /// Returns whether an entry was updated.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::ZeroWeight` when the new weight is zero.
    pub fn set_weight(&mut self, index: usize, weight: u32) -> Result<bool, SelectorError> {
        if weight == 0 {
            return Err(SelectorError::ZeroWeight);
        }
        let Some(entry) = self.entries.get_mut(index) else {
            return Ok(false);
        };
        entry.weight = weight;
        self.rebuild();
        self.dirty = true;
        Ok(true)
    }

    /// Draw one variant with probability proportional to its weight.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::EmptyPool` when the pool has no entries.
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&RewardVariant, SelectorError> {
        let index = *self.selector.draw(rng)?;
        self.entries.get(index).ok_or(SelectorError::EmptyPool)
    }

    /// Draw one variant with the pool's shared templates folded in.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::EmptyPool` when the pool has no entries.
    pub fn draw_prepared<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<PreparedReward, SelectorError> {
        let variant = self.random(rng)?.clone();
        Ok(PreparedReward::compose(variant, self.messages.as_ref()))
    }

    /// Whether the pool has unsaved changes.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn rebuild(&mut self) {
        self.selector.clear();
        for (index, entry) in self.entries.iter().enumerate() {
            // Zero weights are rejected at the mutation seams.
            let _ = self.selector.add(index, entry.weight().max(1));
        }
    }

    /// Persisted form: `{ id, treasures: [...], messages? }`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let treasures: Vec<Value> = self
            .entries
            .iter()
            .filter_map(|entry| serde_json::to_value(entry).ok())
            .collect();
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert("treasures".to_string(), Value::Array(treasures));
        if let Some(messages) = &self.messages
            && !messages.is_empty()
            && let Ok(value) = serde_json::to_value(messages)
        {
            map.insert("messages".to_string(), value);
        }
        Value::Object(map)
    }

    /// Rehydrate a pool from its persisted form.
    ///
    /// Entries with unknown kind tags or malformed payloads are skipped
    /// with a logged warning; they never abort the whole load.
    ///
    /// # Errors
    ///
    /// Returns `PoolLoadError` when the value is not an object with an id.
    pub fn from_value(value: &Value) -> Result<Self, PoolLoadError> {
        let map = value.as_object().ok_or(PoolLoadError::NotAnObject)?;
        let id = map
            .get("id")
            .and_then(Value::as_str)
            .ok_or(PoolLoadError::MissingId)?;
        let mut pool = Self::new(id);
        pool.messages = map
            .get("messages")
            .and_then(|value| serde_json::from_value(value.clone()).ok());
        if let Some(treasures) = map.get("treasures").and_then(Value::as_array) {
            for (index, entry) in treasures.iter().enumerate() {
                match serde_json::from_value::<RewardVariant>(entry.clone()) {
                    Ok(variant) => {
                        if let Err(err) = pool.add(variant) {
                            warn!("pool '{id}' entry {index} rejected: {err}");
                        }
                    }
                    Err(err) => {
                        warn!("pool '{id}' entry {index} skipped: {err}");
                    }
                }
            }
        }
        // A freshly loaded pool matches storage by definition.
        pool.dirty = false;
        Ok(pool)
    }
}

/// Process-wide registry of named reward pools.
#[derive(Default)]
pub struct PoolDirectory {
    pools: RwLock<HashMap<String, Arc<RwLock<RewardPool>>>>,
}

impl PoolDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a pool by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<RwLock<RewardPool>>> {
        self.pools
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Fetch a pool, creating an empty one on first reference.
    pub fn get_or_create(&self, id: &str) -> Arc<RwLock<RewardPool>> {
        let mut pools = self
            .pools
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pools
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(RewardPool::new(id))))
            .clone()
    }

    /// Insert a loaded pool, replacing any existing entry with the same id.
    pub fn insert(&self, pool: RewardPool) {
        self.pools
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(pool.id().to_string(), Arc::new(RwLock::new(pool)));
    }

    /// Remove a pool. Returns whether one was removed.
    pub fn delete(&self, id: &str) -> bool {
        self.pools
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Ids of all registered pools, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .pools
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Whether the named pool exists and has at least one entry.
    /// Callers offering a draw-backed action should check this first.
    #[must_use]
    pub fn is_drawable(&self, id: &str) -> bool {
        self.get(id).is_some_and(|pool| {
            !pool
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .is_empty()
        })
    }

    /// Load pools from persisted values, skipping malformed ones with a
    /// logged warning.
    pub fn load_values(&self, values: &[Value]) -> usize {
        let mut loaded = 0;
        for (index, value) in values.iter().enumerate() {
            match RewardPool::from_value(value) {
                Ok(pool) => {
                    self.insert(pool);
                    loaded += 1;
                }
                Err(err) => warn!("persisted reward pool {index} skipped: {err}"),
            }
        }
        loaded
    }

    /// Visit every pool and persist the dirty ones, clearing the flag after
    /// a successful write. Returns how many pools were written.
    ///
    /// # Errors
    ///
    /// Propagates the first storage error; the failing pool stays dirty.
    pub fn flush_dirty<S: crate::PoolStorage>(&self, storage: &S) -> Result<usize, S::Error> {
        let pools: Vec<_> = self
            .pools
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut written = 0;
        for pool in pools {
            let snapshot = {
                let pool = pool.read().unwrap_or_else(std::sync::PoisonError::into_inner);
                if !pool.is_dirty() {
                    continue;
                }
                pool.clone()
            };
            storage.save_reward_pool(&snapshot)?;
            pool.write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clear_dirty();
            written += 1;
        }
        Ok(written)
    }
}

impl SubPoolResolver for PoolDirectory {
    fn draw_from(
        &self,
        pool_id: &str,
        rng: &mut dyn RngCore,
    ) -> Result<PreparedReward, SubPoolError> {
        let pool = self
            .get(pool_id)
            .ok_or_else(|| SubPoolError::UnknownPool(pool_id.to_string()))?;
        let pool = pool.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        pool.draw_prepared(rng)
            .map_err(|_| SubPoolError::Empty(pool_id.to_string()))
    }
}
