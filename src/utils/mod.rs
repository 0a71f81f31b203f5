//! Shared utilities: time source, seedable randomness, text helpers.

pub mod clock;
pub mod text;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};

/// Process-wide RNG. Never hold the lock across an `.await`.
pub type SharedRng = Arc<Mutex<StdRng>>;

/// Seeded when a seed is configured, entropy-seeded otherwise
pub fn shared_rng(seed: Option<u64>) -> SharedRng {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Arc::new(Mutex::new(rng))
}
