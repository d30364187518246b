//! Seeded RNG streams for reproducible hunts.
//!
//! Each hunt derives independent placement, reward, and feedback streams
//! from the registry's base seed, so replaying a seed reproduces container
//! layout and reward draws without the streams perturbing each other.

use hmac::{Hmac, Mac};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use sha2::Sha256;
use std::sync::{Mutex, MutexGuard};

/// Derive a stream seed from a base seed and a domain tag.
pub(crate) fn derive_domain_seed(base_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&base_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

/// Independent RNG streams owned by one hunt.
///
/// Streams sit behind mutexes because hunts are shared across the claim
/// path and the tick task.
#[derive(Debug)]
pub struct RngStreams {
    placement: Mutex<SmallRng>,
    reward: Mutex<SmallRng>,
    feedback: Mutex<SmallRng>,
}

impl RngStreams {
    /// Construct the streams from a hunt-level seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            placement: Mutex::new(SmallRng::seed_from_u64(derive_domain_seed(
                seed,
                b"placement",
            ))),
            reward: Mutex::new(SmallRng::seed_from_u64(derive_domain_seed(seed, b"reward"))),
            feedback: Mutex::new(SmallRng::seed_from_u64(derive_domain_seed(
                seed,
                b"feedback",
            ))),
        }
    }

    /// Location sampling and container-kind draws.
    pub fn placement(&self) -> MutexGuard<'_, SmallRng> {
        self.placement.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Reward pool draws and quantity sampling.
    pub fn reward(&self) -> MutexGuard<'_, SmallRng> {
        self.reward.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Idle feedback jitter.
    pub fn feedback(&self) -> MutexGuard<'_, SmallRng> {
        self.feedback.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
