//! A single running treasure hunt.
//!
//! A hunt owns its coordinate→container bindings and viewer set; reward
//! and location pools are referenced by id only. State transitions are
//! one-way (`Created → Running → Stopped`) and guarded by a single mutex
//! whose remove-if-present is the claim arbitration point. Collaborator
//! calls happen outside that lock.

use log::{info, warn};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use crate::location::{BlockPos, LocationPool, WorldPos};
use crate::platform::{ActorId, ContainerHandle, ContainerIntegration, Platform};
use crate::registry::{HuntError, HuntTemplate};
use crate::reward::{GrantContext, GrantFlags, SubPoolResolver};
use crate::rng::RngStreams;
use crate::weighted::WeightedSelector;

/// Identifier of one hunt instance.
pub type HuntId = u64;

/// Lifecycle phase; transitions are one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuntPhase {
    Created,
    Running,
    Stopped,
}

/// Result of a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The actor won the coordinate; `depleted` signals the last container.
    Granted { depleted: bool },
    /// The coordinate is not (or no longer) part of this hunt.
    NotPartOfHunt,
}

/// Result of one idle tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Active,
    Expired,
    Stopped,
}

/// A live container at a claimed-for coordinate.
#[derive(Debug, Clone)]
struct ContainerBinding {
    kind_index: usize,
    handle: ContainerHandle,
}

#[derive(Debug)]
struct HuntInner {
    phase: HuntPhase,
    bindings: HashMap<BlockPos, ContainerBinding>,
    remaining: u32,
    max: u32,
    viewers: HashSet<ActorId>,
}

/// One running timed event seeding containers at sampled coordinates.
pub struct Hunt {
    id: HuntId,
    template: HuntTemplate,
    kind_selector: WeightedSelector<usize>,
    requested: u32,
    ttl: Duration,
    started: OnceLock<Instant>,
    world: OnceLock<String>,
    bar_id: String,
    rng: RngStreams,
    inner: Mutex<HuntInner>,
}

impl Hunt {
    /// Build a hunt in the `Created` phase.
    #[must_use]
    pub fn new(id: HuntId, template: HuntTemplate, requested: u32, seed: u64) -> Self {
        let mut kind_selector = WeightedSelector::new();
        for (index, spec) in template.containers.iter().enumerate() {
            // Template validation happens at registration; clamp defensively.
            let _ = kind_selector.add(index, spec.weight.max(1));
        }
        let ttl = Duration::from_secs(template.ttl_secs);
        Self {
            id,
            bar_id: format!("trovehunt-{id}"),
            kind_selector,
            requested,
            ttl,
            started: OnceLock::new(),
            world: OnceLock::new(),
            rng: RngStreams::from_seed(seed),
            inner: Mutex::new(HuntInner {
                phase: HuntPhase::Created,
                bindings: HashMap::new(),
                remaining: 0,
                max: 0,
                viewers: HashSet::new(),
            }),
            template,
        }
    }

    /// Hunt id.
    #[must_use]
    pub const fn id(&self) -> HuntId {
        self.id
    }

    /// Id of the template this hunt was started from.
    #[must_use]
    pub fn template_id(&self) -> &str {
        &self.template.id
    }

    /// Id of the location pool the hunt samples from.
    #[must_use]
    pub fn location_pool(&self) -> &str {
        &self.template.location_pool
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> HuntPhase {
        self.lock().phase
    }

    /// Containers still live.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.lock().remaining
    }

    /// Containers the hunt started with.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.lock().max
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HuntInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Sample coordinates from the location pool, restricted to worlds the
    /// container integration resolves locally. Shortfall is logged, not an
    /// error.
    #[must_use]
    pub fn generate_locations(
        &self,
        pool: &LocationPool,
        containers: &dyn ContainerIntegration,
    ) -> Vec<WorldPos> {
        let mut local: Vec<WorldPos> = pool
            .locations()
            .iter()
            .filter(|pos| containers.is_local_world(&pos.world))
            .cloned()
            .collect();
        let wanted = self.requested as usize;
        if local.len() < wanted {
            warn!(
                "location pool '{}' offers {} local coordinates, {} requested",
                pool.id(),
                local.len(),
                wanted
            );
        }
        {
            use rand::seq::SliceRandom;
            let mut placement = self.rng.placement();
            local.shuffle(&mut *placement);
        }
        local.truncate(wanted);
        local
    }

    /// Materialize containers at the sampled coordinates and enter the
    /// `Running` phase. Returns the indexed coordinates.
    ///
    /// # Errors
    ///
    /// Returns `HuntError::AlreadyStarted` on a second call and
    /// `HuntError::NothingMaterialized` when no coordinate could host a
    /// container.
    pub fn start(
        &self,
        sample: &[WorldPos],
        platform: &Platform,
    ) -> Result<Vec<BlockPos>, HuntError> {
        if self.phase() != HuntPhase::Created {
            return Err(HuntError::AlreadyStarted);
        }

        let mut bindings: HashMap<BlockPos, ContainerBinding> = HashMap::new();
        for pos in sample {
            let block = pos.block();
            if bindings.contains_key(&block) {
                continue;
            }
            let kind_index = match self.kind_selector.draw(&mut *self.rng.placement()) {
                Ok(index) => *index,
                Err(_) => return Err(HuntError::NoContainerKinds(self.template.id.clone())),
            };
            let kind = &self.template.containers[kind_index].kind;
            match platform.containers.materialize(&block, kind) {
                Ok(handle) => {
                    bindings.insert(block, ContainerBinding { kind_index, handle });
                }
                Err(err) => warn!("hunt {}: {err}", self.id),
            }
        }
        if bindings.is_empty() {
            return Err(HuntError::NothingMaterialized(self.template.id.clone()));
        }

        let coords: Vec<BlockPos> = bindings.keys().cloned().collect();
        if let Some(first) = coords.first() {
            let _ = self.world.set(first.world.clone());
        }
        let count = crate::numbers::clamp_usize_to_u32(bindings.len());
        {
            let mut inner = self.lock();
            inner.bindings = bindings;
            inner.remaining = count;
            inner.max = count;
            inner.phase = HuntPhase::Running;
        }
        let _ = self.started.set(Instant::now());
        info!(
            "hunt {} started from template '{}' with {count} containers",
            self.id, self.template.id
        );

        if let Some(template) = &self.template.start_message {
            let count_text = count.to_string();
            let message = template.replace("{count}", &count_text);
            self.broadcast_scoped(platform, &message);
        }
        if self.template.progress_bar {
            self.sync_progress(platform);
        }
        Ok(coords)
    }

    /// Attempt to claim a coordinate for an actor.
    ///
    /// The binding removal under the hunt lock is the only arbitration
    /// point: with concurrent attempts on the same coordinate exactly one
    /// caller sees the binding, and `remaining` drops exactly once.
    pub fn claim(
        &self,
        coord: &BlockPos,
        actor: &ActorId,
        platform: &Platform,
        pools: &dyn SubPoolResolver,
    ) -> ClaimOutcome {
        let won = {
            let mut inner = self.lock();
            if inner.phase != HuntPhase::Running {
                None
            } else {
                let binding = inner.bindings.remove(coord);
                if binding.is_some() {
                    inner.remaining = inner.remaining.saturating_sub(1);
                }
                binding.map(|binding| (binding, inner.remaining))
            }
        };

        let Some((binding, remaining)) = won else {
            platform
                .broadcast
                .send_personal(actor, &self.template.denied_message);
            return ClaimOutcome::NotPartOfHunt;
        };

        platform.containers.destroy(&binding.handle);
        let spec = &self.template.containers[binding.kind_index];
        if !spec.claim_effect.is_silent() {
            platform.containers.play_claim_effect(coord, &spec.claim_effect);
        }

        let flags = GrantFlags {
            personal_message: true,
            broadcast_message: self.template.broadcast_claims,
            scope: self.template.scope,
        };
        {
            let mut reward_rng = self.rng.reward();
            match pools.draw_from(&spec.pool, &mut *reward_rng) {
                Ok(drawn) => {
                    let ctx = GrantContext::new(platform, pools);
                    drawn.grant(actor, &flags, &ctx, &mut *reward_rng);
                }
                Err(err) => {
                    // The claim still consumes the container so the hunt
                    // can deplete; the miss is an operator problem.
                    warn!("hunt {}: claim at {coord:?} granted nothing: {err}", self.id);
                }
            }
        }

        if self.template.progress_bar {
            self.update_progress(platform);
        }
        ClaimOutcome::Granted {
            depleted: remaining == 0,
        }
    }

    /// One idle tick: TTL expiry, ambient feedback, progress mirroring.
    pub fn tick(&self, platform: &Platform) -> TickStatus {
        let snapshot = {
            let inner = self.lock();
            if inner.phase != HuntPhase::Running {
                return TickStatus::Stopped;
            }
            inner
                .bindings
                .iter()
                .map(|(block, binding)| (block.clone(), binding.kind_index))
                .collect::<Vec<_>>()
        };
        if self
            .started
            .get()
            .is_some_and(|started| started.elapsed() >= self.ttl)
        {
            return TickStatus::Expired;
        }

        for (block, kind_index) in snapshot {
            let effect = &self.template.containers[kind_index].idle_effect;
            if effect.is_silent() {
                continue;
            }
            // Intensity scales how often ambient feedback fires.
            let roll: f32 = self.rng.feedback().r#gen();
            if roll < effect.intensity.clamp(0.0, 1.0) {
                platform.containers.play_idle_effect(&block, effect);
            }
        }
        if self.template.progress_bar {
            self.sync_progress(platform);
        }
        TickStatus::Active
    }

    /// Stop the hunt. Idempotent: a second call is a no-op returning `None`.
    ///
    /// Destroys still-live containers, hides the progress bar, and returns
    /// the drained coordinates so the registry can unindex them.
    pub fn stop(&self, timed_out: bool, platform: &Platform) -> Option<Vec<BlockPos>> {
        let (bindings, viewers) = {
            let mut inner = self.lock();
            if inner.phase == HuntPhase::Stopped {
                return None;
            }
            inner.phase = HuntPhase::Stopped;
            let bindings: Vec<(BlockPos, ContainerBinding)> = inner.bindings.drain().collect();
            let viewers: Vec<ActorId> = inner.viewers.drain().collect();
            (bindings, viewers)
        };

        for (_, binding) in &bindings {
            platform.containers.destroy(&binding.handle);
        }
        for viewer in &viewers {
            platform.progress.hide(&self.bar_id, viewer);
        }
        if let Some(template) = &self.template.stop_message {
            let leftover = bindings.len().to_string();
            let message = template.replace("{remaining}", &leftover);
            self.broadcast_scoped(platform, &message);
        }
        info!(
            "hunt {} stopped ({}) with {} containers left",
            self.id,
            if timed_out { "timed out" } else { "depleted or stopped" },
            bindings.len()
        );
        Some(bindings.into_iter().map(|(block, _)| block).collect())
    }

    /// Drop an actor from the viewer set without touching hunt state.
    pub fn on_actor_disconnect(&self, actor: &ActorId, platform: &Platform) {
        let was_viewer = self.lock().viewers.remove(actor);
        if was_viewer {
            platform.progress.hide(&self.bar_id, actor);
        }
    }

    fn progress_label(&self, remaining: u32, max: u32) -> String {
        self.template
            .progress_label
            .replace("{remaining}", &remaining.to_string())
            .replace("{max}", &max.to_string())
    }

    fn progress_fraction(remaining: u32, max: u32) -> f64 {
        if max == 0 {
            0.0
        } else {
            f64::from(remaining) / f64::from(max)
        }
    }

    /// Push the current fraction and pick up actors newly in the world.
    fn sync_progress(&self, platform: &Platform) {
        let Some(world) = self.world.get() else {
            return;
        };
        let present = platform.actors.actors_in_world(world);
        let (remaining, max, newcomers) = {
            let mut inner = self.lock();
            let newcomers: Vec<ActorId> = present
                .into_iter()
                .filter(|actor| inner.viewers.insert(actor.clone()))
                .collect();
            (inner.remaining, inner.max, newcomers)
        };
        let label = self.progress_label(remaining, max);
        let fraction = Self::progress_fraction(remaining, max);
        for viewer in &newcomers {
            platform.progress.show(&self.bar_id, viewer, &label, fraction);
        }
        platform.progress.update(&self.bar_id, &label, fraction);
    }

    fn update_progress(&self, platform: &Platform) {
        let (remaining, max) = {
            let inner = self.lock();
            (inner.remaining, inner.max)
        };
        let label = self.progress_label(remaining, max);
        platform
            .progress
            .update(&self.bar_id, &label, Self::progress_fraction(remaining, max));
    }

    fn broadcast_scoped(&self, platform: &Platform, message: &str) {
        use crate::reward::BroadcastScope;
        match (self.template.scope, self.world.get()) {
            (BroadcastScope::World, Some(world)) => {
                platform.broadcast.send_to_world(world, message);
            }
            (BroadcastScope::Radius(_) | BroadcastScope::World | BroadcastScope::Server, _) => {
                // Hunt-level messages have no actor anchor; radius scopes
                // degrade to a server-wide broadcast.
                platform.broadcast.send_global(message);
            }
        }
    }
}
