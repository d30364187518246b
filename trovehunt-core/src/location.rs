//! World coordinates and named location pools.

use log::warn;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::constants::REMOVE_EPSILON_SQ;
use crate::platform::ActorId;

/// A point in a named world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPos {
    /// Construct a position.
    #[must_use]
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// The block this position falls in, usable as an index key.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn block(&self) -> BlockPos {
        BlockPos {
            world: self.world.clone(),
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            z: self.z.floor() as i32,
        }
    }

    /// Squared distance to another position in the same world.
    /// Returns `None` when the worlds differ.
    #[must_use]
    pub fn distance_squared(&self, other: &Self) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some(dz.mul_add(dz, dx.mul_add(dx, dy * dy)))
    }
}

/// Integer block coordinates, the key type of the hunt coordinate index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    /// Construct a block position.
    #[must_use]
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// The block center as a world position.
    #[must_use]
    pub fn center(&self) -> WorldPos {
        WorldPos {
            world: self.world.clone(),
            x: f64::from(self.x) + 0.5,
            y: f64::from(self.y) + 0.5,
            z: f64::from(self.z) + 0.5,
        }
    }
}

/// Named set of world coordinates usable for hunt sampling.
///
/// Membership has set semantics keyed on block equality; a coordinate may
/// belong to any number of pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPool {
    id: String,
    #[serde(default)]
    locations: Vec<WorldPos>,
    #[serde(skip)]
    dirty: bool,
}

impl LocationPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            locations: Vec::new(),
            dirty: false,
        }
    }

    /// Pool id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of member coordinates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Returns true when the pool holds no coordinates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// All member coordinates.
    #[must_use]
    pub fn locations(&self) -> &[WorldPos] {
        &self.locations
    }

    /// Whether a coordinate's block is already a member.
    #[must_use]
    pub fn contains(&self, pos: &WorldPos) -> bool {
        let block = pos.block();
        self.locations.iter().any(|member| member.block() == block)
    }

    /// Add a coordinate; duplicates (same block) are ignored.
    /// Returns whether the pool changed.
    pub fn add_location(&mut self, pos: WorldPos) -> bool {
        if self.contains(&pos) {
            return false;
        }
        self.locations.push(pos);
        self.dirty = true;
        true
    }

    /// Remove any member within a small epsilon of `pos`, accounting for
    /// the re-centering hosts apply to stored positions.
    /// Returns whether a removal occurred.
    pub fn remove_location(&mut self, pos: &WorldPos) -> bool {
        let before = self.locations.len();
        self.locations.retain(|member| {
            member
                .distance_squared(pos)
                .is_none_or(|sq| sq > REMOVE_EPSILON_SQ)
        });
        let removed = self.locations.len() != before;
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// Return `n` distinct members via shuffle-and-take.
    ///
    /// Requesting more than the pool holds is not an error; the whole set
    /// is returned and a warning is logged.
    pub fn get_n_random<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<WorldPos> {
        if n >= self.locations.len() {
            if n > self.locations.len() {
                warn!(
                    "location pool '{}' holds {} coordinates, {} requested; returning all",
                    self.id,
                    self.locations.len(),
                    n
                );
            }
            return self.locations.clone();
        }
        let mut members = self.locations.clone();
        members.shuffle(rng);
        members.truncate(n);
        members
    }

    /// Members within a squared-distance threshold of `origin`.
    #[must_use]
    pub fn nearby(&self, origin: &WorldPos, threshold_sq: f64) -> Vec<&WorldPos> {
        self.locations
            .iter()
            .filter(|member| {
                member
                    .distance_squared(origin)
                    .is_some_and(|sq| sq <= threshold_sq)
            })
            .collect()
    }

    /// Whether the pool has unsaved changes.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

/// Process-wide registry of named location pools.
#[derive(Default)]
pub struct LocationPoolDirectory {
    pools: RwLock<HashMap<String, Arc<RwLock<LocationPool>>>>,
}

impl LocationPoolDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a pool by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<RwLock<LocationPool>>> {
        self.pools
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Fetch a pool, creating an empty one on first reference.
    pub fn get_or_create(&self, id: &str) -> Arc<RwLock<LocationPool>> {
        let mut pools = self
            .pools
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pools
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(LocationPool::new(id))))
            .clone()
    }

    /// Insert a loaded pool, replacing any existing entry with the same id.
    pub fn insert(&self, pool: LocationPool) {
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

    /// Load pools from persisted values, skipping malformed ones with a
    /// logged warning.
    pub fn load_values(&self, values: &[serde_json::Value]) -> usize {
        let mut loaded = 0;
        for (index, value) in values.iter().enumerate() {
            match serde_json::from_value::<LocationPool>(value.clone()) {
                Ok(pool) => {
                    self.insert(pool);
                    loaded += 1;
                }
                Err(err) => warn!("persisted location pool {index} skipped: {err}"),
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
    pub fn flush_dirty<S: crate::LocationStorage>(&self, storage: &S) -> Result<usize, S::Error> {
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
            storage.save_location_pool(&snapshot)?;
            pool.write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clear_dirty();
            written += 1;
        }
        Ok(written)
    }
}

/// Tracks which pool an actor is currently editing.
///
/// Block-place/break hooks consult this to route edits; the state lives
/// outside the pools themselves.
#[derive(Default)]
pub struct EditSessions {
    sessions: Mutex<HashMap<ActorId, String>>,
}

impl EditSessions {
    /// Create an empty session map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin (or retarget) an actor's editing session.
    pub fn begin(&self, actor: ActorId, pool_id: impl Into<String>) {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(actor, pool_id.into());
    }

    /// End an actor's session, returning the pool it targeted.
    pub fn end(&self, actor: &ActorId) -> Option<String> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(actor)
    }

    /// The pool the actor is editing, if any.
    #[must_use]
    pub fn active(&self, actor: &ActorId) -> Option<String> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(actor)
            .cloned()
    }
}
