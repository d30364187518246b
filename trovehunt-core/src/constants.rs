//! Centralized tuning constants for the Trovehunt engine.
//!
//! These values define the deterministic behavior of pools and hunts.
//! Keeping them together ensures that gameplay can only be adjusted via
//! code changes reviewed in version control, rather than through external
//! assets.

// Reward granting ----------------------------------------------------------
/// Maximum nesting depth for sub-pool rewards before the grant fails closed.
pub(crate) const MAX_SUBPOOL_DEPTH: u8 = 8;
/// Default per-stack size used when an item payload does not specify one.
pub(crate) const DEFAULT_MAX_STACK: i64 = 64;

// Location pools -----------------------------------------------------------
/// Squared radius used when matching a coordinate for removal.
/// Accounts for the block re-centering hosts apply to stored positions.
pub(crate) const REMOVE_EPSILON_SQ: f64 = 0.25;

// Hunts --------------------------------------------------------------------
/// Informational reply for a claim that lost the race or arrived late.
pub(crate) const CLAIM_DENIED_MESSAGE: &str = "This container is no longer part of the hunt.";
/// Fallback container count when a template omits one.
pub(crate) const DEFAULT_CONTAINER_COUNT: u32 = 10;
/// Fallback time-to-live for a hunt, in seconds.
pub(crate) const DEFAULT_HUNT_TTL_SECS: u64 = 900;
/// Default feedback intensity multiplier for container effects.
pub(crate) const DEFAULT_FEEDBACK_INTENSITY: f32 = 1.0;
