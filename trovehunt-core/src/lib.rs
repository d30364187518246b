//! Trovehunt Engine
//!
//! Platform-agnostic core logic for weighted reward pools and timed
//! treasure hunt events. This crate provides the reward and hunt mechanics
//! without UI or platform-specific dependencies; hosts supply the
//! collaborator seams in [`platform`].

pub mod constants;
pub mod hunt;
pub mod location;
pub mod numbers;
pub mod platform;
pub mod pool;
pub mod registry;
pub mod reward;
pub mod rng;
pub mod sampling;
pub mod weighted;

// Re-export commonly used types
pub use hunt::{ClaimOutcome, Hunt, HuntId, HuntPhase, TickStatus};
pub use location::{
    BlockPos, EditSessions, LocationPool, LocationPoolDirectory, WorldPos,
};
pub use platform::{
    ActorDirectory, ActorId, Broadcaster, CommandExecutor, ContainerError, ContainerHandle,
    ContainerIntegration, CurrencyLedger, FeedbackCfg, ItemIntegration, ItemStack, Platform,
    PotionForm, ProgressIndicator,
};
pub use pool::{PoolDirectory, PoolLoadError, RewardPool};
pub use registry::{ContainerSpec, HuntError, HuntRegistry, HuntTemplate};
pub use reward::{
    BroadcastScope, GrantContext, GrantFlags, MessageTemplates, PreparedReward, RewardKind,
    RewardVariant, SubPoolError, SubPoolResolver,
};
pub use sampling::{AmountRange, GaussianRange, MoneyRange};
pub use weighted::{SelectorError, WeightedSelector};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::sync::{Arc, Mutex};

/// Trait for abstracting reward-pool persistence.
/// Platform-specific implementations should provide this.
pub trait PoolStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write one pool in its persisted form.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be written.
    fn save_reward_pool(&self, pool: &RewardPool) -> Result<(), Self::Error>;

    /// Load the persisted form of every stored pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_reward_pools(&self) -> Result<Vec<serde_json::Value>, Self::Error>;

    /// Remove a stored pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be deleted.
    fn delete_reward_pool(&self, id: &str) -> Result<(), Self::Error>;
}

/// Trait for abstracting location-pool persistence.
/// Platform-specific implementations should provide this.
pub trait LocationStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write one location pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be written.
    fn save_location_pool(&self, pool: &LocationPool) -> Result<(), Self::Error>;

    /// Load every stored location pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load_location_pools(&self) -> Result<Vec<serde_json::Value>, Self::Error>;

    /// Remove a stored location pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be deleted.
    fn delete_location_pool(&self, id: &str) -> Result<(), Self::Error>;
}

/// Main service facade wiring the directories and the hunt registry.
///
/// Constructed once at startup; collaborators receive handles instead of
/// reaching for globals.
pub struct HuntEngine {
    platform: Platform,
    pools: Arc<PoolDirectory>,
    locations: Arc<LocationPoolDirectory>,
    registry: HuntRegistry,
    sessions: EditSessions,
    redeem_rng: Mutex<SmallRng>,
}

impl HuntEngine {
    /// Load both directories from storage and assemble the registry.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read; individual
    /// malformed pools are skipped with a logged warning instead.
    pub fn init<S>(platform: Platform, storage: &S, base_seed: u64) -> Result<Self, anyhow::Error>
    where
        S: PoolStorage + LocationStorage,
        <S as PoolStorage>::Error: Into<anyhow::Error>,
        <S as LocationStorage>::Error: Into<anyhow::Error>,
    {
        let pools = Arc::new(PoolDirectory::new());
        let values = storage.load_reward_pools().map_err(Into::into)?;
        pools.load_values(&values);

        let locations = Arc::new(LocationPoolDirectory::new());
        let values = storage.load_location_pools().map_err(Into::into)?;
        locations.load_values(&values);

        let registry = HuntRegistry::new(
            platform.clone(),
            Arc::clone(&pools),
            Arc::clone(&locations),
            base_seed,
        );
        let redeem_seed = rng::derive_domain_seed(base_seed, b"redeem");
        Ok(Self {
            platform,
            pools,
            locations,
            registry,
            sessions: EditSessions::new(),
            redeem_rng: Mutex::new(SmallRng::seed_from_u64(redeem_seed)),
        })
    }

    /// Reward pool directory.
    #[must_use]
    pub fn pools(&self) -> &Arc<PoolDirectory> {
        &self.pools
    }

    /// Location pool directory.
    #[must_use]
    pub fn locations(&self) -> &Arc<LocationPoolDirectory> {
        &self.locations
    }

    /// Active hunt registry.
    #[must_use]
    pub const fn registry(&self) -> &HuntRegistry {
        &self.registry
    }

    /// Per-actor location-pool editing sessions.
    #[must_use]
    pub const fn sessions(&self) -> &EditSessions {
        &self.sessions
    }

    /// Draw from a named pool and grant the result to an actor.
    ///
    /// This is the consumable-key redemption path; callers should check
    /// [`PoolDirectory::is_drawable`] before offering the action.
    ///
    /// # Errors
    ///
    /// Returns `SubPoolError` when the pool is unknown or empty.
    pub fn redeem(
        &self,
        pool_id: &str,
        actor: &ActorId,
        flags: &GrantFlags,
    ) -> Result<(), SubPoolError> {
        let mut rng = self
            .redeem_rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let drawn = self.pools.draw_from(pool_id, &mut *rng)?;
        let ctx = GrantContext::new(&self.platform, self.pools.as_ref());
        drawn.grant(actor, flags, &ctx, &mut *rng);
        Ok(())
    }

    /// Periodic persistence sweep: write every dirty pool in both
    /// directories and clear their flags. Returns how many were written.
    ///
    /// # Errors
    ///
    /// Propagates the first storage error; failing pools stay dirty.
    pub fn persist_sweep<S>(&self, storage: &S) -> Result<usize, anyhow::Error>
    where
        S: PoolStorage + LocationStorage,
        <S as PoolStorage>::Error: Into<anyhow::Error>,
        <S as LocationStorage>::Error: Into<anyhow::Error>,
    {
        let rewards = self.pools.flush_dirty(storage).map_err(Into::into)?;
        let locations = self.locations.flush_dirty(storage).map_err(Into::into)?;
        Ok(rewards + locations)
    }

    /// Explicit admin delete of a reward pool, in memory and in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored pool cannot be deleted.
    pub fn delete_pool<S: PoolStorage>(&self, id: &str, storage: &S) -> Result<bool, S::Error> {
        let removed = self.pools.delete(id);
        if removed {
            storage.delete_reward_pool(id)?;
        }
        Ok(removed)
    }

    /// Explicit admin delete of a location pool, in memory and in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored pool cannot be deleted.
    pub fn delete_location_pool<S: LocationStorage>(
        &self,
        id: &str,
        storage: &S,
    ) -> Result<bool, S::Error> {
        let removed = self.locations.delete(id);
        if removed {
            storage.delete_location_pool(id)?;
        }
        Ok(removed)
    }

    /// Stop every active hunt and release the registry.
    pub fn shutdown(&self) {
        self.registry.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        reward_pools: Mutex<HashMap<String, serde_json::Value>>,
        location_pools: Mutex<HashMap<String, serde_json::Value>>,
    }

    impl PoolStorage for MemoryStore {
        type Error = Infallible;

        fn save_reward_pool(&self, pool: &RewardPool) -> Result<(), Self::Error> {
            self.reward_pools
                .lock()
                .unwrap()
                .insert(pool.id().to_string(), pool.to_value());
            Ok(())
        }

        fn load_reward_pools(&self) -> Result<Vec<serde_json::Value>, Self::Error> {
            Ok(self.reward_pools.lock().unwrap().values().cloned().collect())
        }

        fn delete_reward_pool(&self, id: &str) -> Result<(), Self::Error> {
            self.reward_pools.lock().unwrap().remove(id);
            Ok(())
        }
    }

    impl LocationStorage for MemoryStore {
        type Error = Infallible;

        fn save_location_pool(&self, pool: &LocationPool) -> Result<(), Self::Error> {
            let value = serde_json::to_value(pool).expect("location pool serializes");
            self.location_pools
                .lock()
                .unwrap()
                .insert(pool.id().to_string(), value);
            Ok(())
        }

        fn load_location_pools(&self) -> Result<Vec<serde_json::Value>, Self::Error> {
            Ok(self
                .location_pools
                .lock()
                .unwrap()
                .values()
                .cloned()
                .collect())
        }

        fn delete_location_pool(&self, id: &str) -> Result<(), Self::Error> {
            self.location_pools.lock().unwrap().remove(id);
            Ok(())
        }
    }

    struct Quiet;
    impl CurrencyLedger for Quiet {
        fn deposit(&self, _actor: &ActorId, _amount: f64) {}
        fn balance(&self, _actor: &ActorId) -> f64 {
            0.0
        }
    }
    impl Broadcaster for Quiet {
        fn send_personal(&self, _actor: &ActorId, _message: &str) {}
        fn send_global(&self, _message: &str) {}
        fn send_to_world(&self, _world: &str, _message: &str) {}
        fn send_to_radius(&self, _origin: &WorldPos, _radius: f64, _message: &str) {}
    }
    impl CommandExecutor for Quiet {
        fn run_as_console(&self, _command: &str) {}
    }
    impl ContainerIntegration for Quiet {
        fn materialize(
            &self,
            _at: &BlockPos,
            _kind: &str,
        ) -> Result<ContainerHandle, ContainerError> {
            Ok(ContainerHandle(1))
        }
        fn destroy(&self, _handle: &ContainerHandle) {}
    }
    impl ActorDirectory for Quiet {
        fn is_online(&self, _actor: &ActorId) -> bool {
            true
        }
        fn world_of(&self, _actor: &ActorId) -> Option<String> {
            None
        }
        fn position_of(&self, _actor: &ActorId) -> Option<WorldPos> {
            None
        }
        fn actors_in_world(&self, _world: &str) -> Vec<ActorId> {
            Vec::new()
        }
        fn actors_near(&self, _origin: &WorldPos, _radius: f64) -> Vec<ActorId> {
            Vec::new()
        }
        fn give_item(&self, _actor: &ActorId, _stack: &ItemStack) -> Option<ItemStack> {
            None
        }
        fn drop_item(&self, _actor: &ActorId, _stack: &ItemStack) {}
    }
    impl ProgressIndicator for Quiet {
        fn show(&self, _bar: &str, _viewer: &ActorId, _label: &str, _fraction: f64) {}
        fn update(&self, _bar: &str, _label: &str, _fraction: f64) {}
        fn hide(&self, _bar: &str, _viewer: &ActorId) {}
    }
    impl ItemIntegration for Quiet {
        fn enchanted_artifact(
            &self,
            _advanced: bool,
            _exclusions: &[String],
            _variety_roll: u32,
        ) -> Option<ItemStack> {
            None
        }
        fn potion(&self, _form: PotionForm, _variety_roll: u32) -> Option<ItemStack> {
            None
        }
        fn custom_item(&self, _id: &str, _amount: i64) -> Option<ItemStack> {
            None
        }
    }

    fn quiet_platform() -> Platform {
        let quiet = Arc::new(Quiet);
        Platform {
            ledger: quiet.clone(),
            broadcast: quiet.clone(),
            console: quiet.clone(),
            containers: quiet.clone(),
            actors: quiet.clone(),
            progress: quiet.clone(),
            items: quiet,
        }
    }

    #[test]
    fn init_loads_persisted_pools() {
        let store = MemoryStore::default();
        {
            let mut pool = RewardPool::new("starter");
            pool.add(RewardVariant::new(
                RewardKind::Money {
                    amount: MoneyRange::fixed(5.0),
                },
                2,
            ))
            .unwrap();
            store.save_reward_pool(&pool).unwrap();

            let mut locations = LocationPool::new("spawn");
            locations.add_location(WorldPos::new("overworld", 0.0, 64.0, 0.0));
            store.save_location_pool(&locations).unwrap();
        }

        let engine = HuntEngine::init(quiet_platform(), &store, 99).unwrap();
        assert_eq!(engine.pools().ids(), vec!["starter".to_string()]);
        assert_eq!(engine.locations().ids(), vec!["spawn".to_string()]);
        assert!(engine.pools().is_drawable("starter"));
    }

    #[test]
    fn persist_sweep_writes_only_dirty_pools() {
        let store = MemoryStore::default();
        let engine = HuntEngine::init(quiet_platform(), &store, 99).unwrap();

        let pool = engine.pools().get_or_create("daily");
        pool.write()
            .unwrap()
            .add(RewardVariant::new(
                RewardKind::Money {
                    amount: MoneyRange::fixed(1.0),
                },
                1,
            ))
            .unwrap();

        assert_eq!(engine.persist_sweep(&store).unwrap(), 1);
        // Second sweep has nothing dirty left.
        assert_eq!(engine.persist_sweep(&store).unwrap(), 0);
        assert!(store.reward_pools.lock().unwrap().contains_key("daily"));
    }

    #[test]
    fn redeem_unknown_pool_errors() {
        let store = MemoryStore::default();
        let engine = HuntEngine::init(quiet_platform(), &store, 99).unwrap();
        let outcome = engine.redeem("missing", &ActorId::new("alice"), &GrantFlags::default());
        assert_eq!(
            outcome,
            Err(SubPoolError::UnknownPool("missing".to_string()))
        );
    }

    #[test]
    fn delete_pool_removes_memory_and_storage() {
        let store = MemoryStore::default();
        let engine = HuntEngine::init(quiet_platform(), &store, 99).unwrap();
        engine.pools().get_or_create("temp");
        engine.persist_sweep(&store).unwrap();

        assert!(engine.delete_pool("temp", &store).unwrap());
        assert!(engine.pools().get("temp").is_none());
        assert!(!store.reward_pools.lock().unwrap().contains_key("temp"));
        assert!(!engine.delete_pool("temp", &store).unwrap());
    }
}
