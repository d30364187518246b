//! Hunt templates and the process-wide hunt registry.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::constants::{CLAIM_DENIED_MESSAGE, DEFAULT_CONTAINER_COUNT, DEFAULT_HUNT_TTL_SECS};
use crate::hunt::{ClaimOutcome, Hunt, HuntId, TickStatus};
use crate::location::{BlockPos, LocationPoolDirectory};
use crate::platform::{ActorId, FeedbackCfg, Platform};
use crate::pool::PoolDirectory;
use crate::reward::BroadcastScope;
use crate::rng::derive_domain_seed;

fn default_kind_weight() -> u32 {
    1
}

/// One container kind in a hunt-type's weighted distribution, bound to the
/// reward pool its claims draw from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Kind hint passed to the container integration.
    pub kind: String,
    #[serde(default = "default_kind_weight")]
    pub weight: u32,
    /// Reward pool id claims of this kind draw from.
    pub pool: String,
    #[serde(default)]
    pub idle_effect: FeedbackCfg,
    #[serde(default)]
    pub claim_effect: FeedbackCfg,
}

/// Persistent description of a hunt type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HuntTemplate {
    pub id: String,
    /// Location pool coordinates are sampled from.
    pub location_pool: String,
    #[serde(default = "HuntTemplate::default_container_count")]
    pub container_count: u32,
    #[serde(default = "HuntTemplate::default_ttl_secs")]
    pub ttl_secs: u64,
    pub containers: Vec<ContainerSpec>,
    /// Broadcast on start; `{count}` substitutes the container count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_message: Option<String>,
    /// Broadcast on stop; `{remaining}` substitutes unclaimed containers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_message: Option<String>,
    /// Personal message for a claim that lost the race.
    #[serde(default = "HuntTemplate::default_denied_message")]
    pub denied_message: String,
    #[serde(default)]
    pub scope: BroadcastScope,
    #[serde(default = "HuntTemplate::default_progress_bar")]
    pub progress_bar: bool,
    /// Whether successful claims broadcast reward messages.
    #[serde(default)]
    pub broadcast_claims: bool,
    #[serde(default = "HuntTemplate::default_progress_label")]
    pub progress_label: String,
}

impl HuntTemplate {
    const fn default_container_count() -> u32 {
        DEFAULT_CONTAINER_COUNT
    }

    const fn default_ttl_secs() -> u64 {
        DEFAULT_HUNT_TTL_SECS
    }

    fn default_denied_message() -> String {
        CLAIM_DENIED_MESSAGE.to_string()
    }

    const fn default_progress_bar() -> bool {
        true
    }

    fn default_progress_label() -> String {
        "Treasure hunt: {remaining}/{max} containers left".to_string()
    }
}

/// Errors raised when a hunt cannot be started.
#[derive(Debug, Error)]
pub enum HuntError {
    #[error("unknown hunt template '{0}'")]
    UnknownTemplate(String),
    #[error("unknown location pool '{0}'")]
    UnknownLocationPool(String),
    #[error("location pool '{0}' is empty")]
    EmptyLocationPool(String),
    #[error("location pool '{0}' has no locally-resolvable coordinates")]
    NoLocalLocations(String),
    #[error("hunt template '{0}' defines no container kinds")]
    NoContainerKinds(String),
    #[error("no containers could be materialized for template '{0}'")]
    NothingMaterialized(String),
    #[error("hunt was already started")]
    AlreadyStarted,
}

/// Process-wide concurrent registry of active hunts.
///
/// Owns the coordinate→hunt index used to dispatch interaction events and
/// the hunt-type template table. Constructed once at startup and shared by
/// handle.
pub struct HuntRegistry {
    platform: Platform,
    pools: Arc<PoolDirectory>,
    locations: Arc<LocationPoolDirectory>,
    templates: RwLock<HashMap<String, HuntTemplate>>,
    active: RwLock<HashMap<HuntId, Arc<Hunt>>>,
    index: RwLock<HashMap<BlockPos, HuntId>>,
    next_id: AtomicU64,
    base_seed: u64,
}

impl HuntRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new(
        platform: Platform,
        pools: Arc<PoolDirectory>,
        locations: Arc<LocationPoolDirectory>,
        base_seed: u64,
    ) -> Self {
        Self {
            platform,
            pools,
            locations,
            templates: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            base_seed,
        }
    }

    /// Register (or replace) a hunt-type template.
    pub fn register_template(&self, template: HuntTemplate) {
        self.templates
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(template.id.clone(), template);
    }

    /// Look up a template by id.
    #[must_use]
    pub fn template(&self, id: &str) -> Option<HuntTemplate> {
        self.templates
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Ids of all registered templates, sorted.
    #[must_use]
    pub fn template_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .templates
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Number of active hunts.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// The hunt owning a coordinate, if any.
    #[must_use]
    pub fn hunt_at(&self, coord: &BlockPos) -> Option<HuntId> {
        self.index
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(coord)
            .copied()
    }

    /// Handle to an active hunt.
    #[must_use]
    pub fn hunt(&self, id: HuntId) -> Option<Arc<Hunt>> {
        self.active
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Start a hunt from a registered template.
    ///
    /// # Errors
    ///
    /// Returns `HuntError` when the template or its location pool cannot
    /// produce a running hunt.
    pub fn start_hunt(
        &self,
        template_id: &str,
        count_override: Option<u32>,
    ) -> Result<HuntId, HuntError> {
        let template = self
            .template(template_id)
            .ok_or_else(|| HuntError::UnknownTemplate(template_id.to_string()))?;
        self.start_ad_hoc(template, count_override)
    }

    /// Start a hunt from an ad-hoc template that was never registered.
    ///
    /// # Errors
    ///
    /// Returns `HuntError` when the template or its location pool cannot
    /// produce a running hunt.
    pub fn start_ad_hoc(
        &self,
        template: HuntTemplate,
        count_override: Option<u32>,
    ) -> Result<HuntId, HuntError> {
        if template.containers.is_empty() {
            return Err(HuntError::NoContainerKinds(template.id.clone()));
        }
        let location_pool = self
            .locations
            .get(&template.location_pool)
            .ok_or_else(|| HuntError::UnknownLocationPool(template.location_pool.clone()))?;

        // One hunt per location pool: replace any active one first.
        let replaced: Vec<HuntId> = self
            .active
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|hunt| hunt.location_pool() == template.location_pool)
            .map(|hunt| hunt.id())
            .collect();
        for id in replaced {
            info!(
                "stopping hunt {id}; location pool '{}' is being reused",
                template.location_pool
            );
            self.stop_hunt(id, false);
        }

        let count = count_override.unwrap_or(template.container_count).max(1);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let seed = derive_domain_seed(self.base_seed, &id.to_le_bytes());
        let hunt = Arc::new(Hunt::new(id, template, count, seed));

        let sample = {
            let pool = location_pool
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if pool.is_empty() {
                return Err(HuntError::EmptyLocationPool(pool.id().to_string()));
            }
            hunt.generate_locations(&pool, self.platform.containers.as_ref())
        };
        if sample.is_empty() {
            return Err(HuntError::NoLocalLocations(hunt.location_pool().to_string()));
        }

        let coords = hunt.start(&sample, &self.platform)?;
        {
            let mut active = self
                .active
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            active.insert(id, Arc::clone(&hunt));
        }
        {
            let mut index = self
                .index
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for coord in coords {
                index.insert(coord, id);
            }
        }
        Ok(id)
    }

    /// Dispatch a container interaction to the owning hunt.
    ///
    /// Coordinates no hunt owns are answered with the denial path so a
    /// stale interaction after a stop cannot corrupt anything.
    pub fn claim_at(&self, coord: &BlockPos, actor: &ActorId) -> ClaimOutcome {
        let hunt = self.hunt_at(coord).and_then(|id| self.hunt(id));
        let Some(hunt) = hunt else {
            self.platform
                .broadcast
                .send_personal(actor, CLAIM_DENIED_MESSAGE);
            return ClaimOutcome::NotPartOfHunt;
        };

        let outcome = hunt.claim(coord, actor, &self.platform, self.pools.as_ref());
        if let ClaimOutcome::Granted { depleted } = outcome {
            self.index
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(coord);
            if depleted {
                self.stop_hunt(hunt.id(), false);
            }
        }
        outcome
    }

    /// Stop a hunt and drop it from the registry.
    /// Returns whether an active hunt was stopped.
    pub fn stop_hunt(&self, id: HuntId, timed_out: bool) -> bool {
        let hunt = {
            self.active
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .remove(&id)
        };
        let Some(hunt) = hunt else {
            return false;
        };
        let drained = hunt.stop(timed_out, &self.platform);
        let mut index = self
            .index
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match drained {
            Some(coords) => {
                for coord in &coords {
                    index.remove(coord);
                }
            }
            // Already stopped elsewhere; sweep any stale entries.
            None => index.retain(|_, owner| *owner != id),
        }
        true
    }

    /// Drive every active hunt's idle tick, stopping expired ones.
    pub fn tick(&self) {
        let hunts: Vec<Arc<Hunt>> = self
            .active
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for hunt in hunts {
            match hunt.tick(&self.platform) {
                TickStatus::Expired => {
                    self.stop_hunt(hunt.id(), true);
                }
                TickStatus::Active | TickStatus::Stopped => {}
            }
        }
    }

    /// Stop every active hunt (shutdown/reload).
    pub fn stop_all(&self) {
        let ids: Vec<HuntId> = self
            .active
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        if !ids.is_empty() {
            warn!("stopping {} active hunts", ids.len());
        }
        for id in ids {
            self.stop_hunt(id, false);
        }
    }

    /// Remove a disconnecting actor from every hunt's viewer set.
    pub fn on_actor_disconnect(&self, actor: &ActorId) {
        let hunts: Vec<Arc<Hunt>> = self
            .active
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for hunt in hunts {
            hunt.on_actor_disconnect(actor, &self.platform);
        }
    }
}
