//! Integration seams between the engine and the host server.
//!
//! The engine never talks to an inventory, chat transport, or world
//! directly; platform-specific implementations provide these traits.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::location::{BlockPos, WorldPos};

/// Opaque actor identity, typically a player UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    /// Construct from any displayable id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A concrete stack of items ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ItemStack {
    /// Plain stack with no attributes.
    #[must_use]
    pub fn new(item: impl Into<String>, amount: i64) -> Self {
        Self {
            item: item.into(),
            amount,
            attributes: serde_json::Map::new(),
        }
    }
}

/// Handle to a materialized in-world container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub u64);

/// Container form a potion reward is delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PotionForm {
    Normal,
    Splash,
    Lingering,
}

impl PotionForm {
    pub(crate) const ALL: [Self; 3] = [Self::Normal, Self::Splash, Self::Lingering];
}

/// Raised when the host cannot materialize a container.
#[derive(Debug, Error)]
#[error("container could not be materialized at {world} {x},{y},{z}: {reason}")]
pub struct ContainerError {
    pub world: String,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub reason: String,
}

impl ContainerError {
    /// Build an error for the given position.
    #[must_use]
    pub fn new(at: &BlockPos, reason: impl Into<String>) -> Self {
        Self {
            world: at.world.clone(),
            x: at.x,
            y: at.y,
            z: at.z,
            reason: reason.into(),
        }
    }
}

/// Currency ledger collaborator.
pub trait CurrencyLedger: Send + Sync {
    /// Deposit an amount into the actor's account.
    fn deposit(&self, actor: &ActorId, amount: f64);
    /// Current account balance.
    fn balance(&self, actor: &ActorId) -> f64;
}

/// Broadcast/messaging transport collaborator.
pub trait Broadcaster: Send + Sync {
    fn send_personal(&self, actor: &ActorId, message: &str);
    fn send_global(&self, message: &str);
    fn send_to_world(&self, world: &str, message: &str);
    fn send_to_radius(&self, origin: &WorldPos, radius: f64, message: &str);
}

/// Console command execution collaborator.
pub trait CommandExecutor: Send + Sync {
    fn run_as_console(&self, command: &str);
}

/// Ambient/claim feedback settings for one container kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackCfg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub particle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default = "FeedbackCfg::default_intensity")]
    pub intensity: f32,
}

impl Default for FeedbackCfg {
    fn default() -> Self {
        Self {
            particle: None,
            sound: None,
            intensity: Self::default_intensity(),
        }
    }
}

impl FeedbackCfg {
    const fn default_intensity() -> f32 {
        crate::constants::DEFAULT_FEEDBACK_INTENSITY
    }

    /// True when neither a particle nor a sound is configured.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        self.particle.is_none() && self.sound.is_none()
    }
}

/// In-world container rendering collaborator.
pub trait ContainerIntegration: Send + Sync {
    /// Materialize a container of the hinted kind at a position.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError` when the position cannot host a container.
    fn materialize(&self, at: &BlockPos, kind: &str) -> Result<ContainerHandle, ContainerError>;

    /// Remove a previously materialized container.
    fn destroy(&self, handle: &ContainerHandle);

    /// Whether a world is resolvable on this server instance.
    ///
    /// Location pools may be shared across servers; only locally-resolvable
    /// coordinates become live containers.
    fn is_local_world(&self, _world: &str) -> bool {
        true
    }

    /// Ambient feedback at a live container position.
    fn play_idle_effect(&self, _at: &BlockPos, _effect: &FeedbackCfg) {}

    /// One-shot feedback when a container is claimed.
    fn play_claim_effect(&self, _at: &BlockPos, _effect: &FeedbackCfg) {}
}

/// Online/offline actor resolution and item delivery collaborator.
pub trait ActorDirectory: Send + Sync {
    fn is_online(&self, actor: &ActorId) -> bool;
    fn world_of(&self, actor: &ActorId) -> Option<String>;
    fn position_of(&self, actor: &ActorId) -> Option<WorldPos>;
    fn actors_in_world(&self, world: &str) -> Vec<ActorId>;
    fn actors_near(&self, origin: &WorldPos, radius: f64) -> Vec<ActorId>;

    /// Deposit a stack into the actor's inventory, returning the portion
    /// that did not fit.
    fn give_item(&self, actor: &ActorId, stack: &ItemStack) -> Option<ItemStack>;

    /// Drop a stack at the actor's location.
    fn drop_item(&self, actor: &ActorId, stack: &ItemStack);
}

/// Named progress bar collaborator, one bar per hunt world.
pub trait ProgressIndicator: Send + Sync {
    fn show(&self, bar: &str, viewer: &ActorId, label: &str, fraction: f64);
    fn update(&self, bar: &str, label: &str, fraction: f64);
    fn hide(&self, bar: &str, viewer: &ActorId);
}

/// Integration-specific item construction collaborator.
///
/// Randomness stays inside the engine: `variety_roll` lets the host map a
/// uniform draw onto whatever catalog it maintains.
pub trait ItemIntegration: Send + Sync {
    /// A randomly enchanted artifact, excluding the configured kinds.
    /// `None` means the integration cannot produce one.
    fn enchanted_artifact(
        &self,
        advanced: bool,
        exclusions: &[String],
        variety_roll: u32,
    ) -> Option<ItemStack>;

    /// A potion of a host-chosen non-trivial type in the given form.
    fn potion(&self, form: PotionForm, variety_roll: u32) -> Option<ItemStack>;

    /// An item by integration id. `None` when the id is unknown.
    fn custom_item(&self, id: &str, amount: i64) -> Option<ItemStack>;
}

/// Bundle of collaborator handles constructed once at startup.
#[derive(Clone)]
pub struct Platform {
    pub ledger: Arc<dyn CurrencyLedger>,
    pub broadcast: Arc<dyn Broadcaster>,
    pub console: Arc<dyn CommandExecutor>,
    pub containers: Arc<dyn ContainerIntegration>,
    pub actors: Arc<dyn ActorDirectory>,
    pub progress: Arc<dyn ProgressIndicator>,
    pub items: Arc<dyn ItemIntegration>,
}
