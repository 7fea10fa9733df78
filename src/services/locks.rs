//! Striped in-process locks serializing compound check-then-write sequences.
//!
//! Connect, disconnect, and property writes all read current state, evaluate
//! temporal invariants, and then write. Each such sequence takes the stripe
//! lock for its key before the first read, so two callers working on the
//! same component pair or the same (component, property type) pair cannot
//! interleave between the check and the write. Different keys usually land
//! on different stripes and proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

const STRIPE_COUNT: usize = 64;

/// Key identifying the state a compound operation checks and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    /// An unordered component pair (connections, subcomponent links).
    Pair(i64, i64),
    /// A (component, property type) pair (property intervals).
    ComponentProperty(i64, i64),
    /// A single vertex (replace, disable).
    Vertex(i64),
}

impl LockKey {
    /// Builds a pair key; the order of the two ids does not matter.
    #[must_use]
    pub const fn pair(a: i64, b: i64) -> Self {
        if a <= b {
            Self::Pair(a, b)
        } else {
            Self::Pair(b, a)
        }
    }
}

/// Fixed pool of stripe mutexes keyed by hashed [`LockKey`].
pub struct KeyLocks {
    stripes: Vec<Mutex<()>>,
}

impl KeyLocks {
    /// Creates the stripe pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPE_COUNT).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Acquires the stripe lock for `key`, blocking until available.
    ///
    /// A poisoned stripe is recovered; the guarded sections hold no
    /// invariant of their own beyond mutual exclusion.
    pub fn lock(&self, key: &LockKey) -> MutexGuard<'_, ()> {
        let stripe = &self.stripes[Self::stripe_index(key)];
        match stripe.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(?key, "key lock stripe was poisoned, recovering");
                poisoned.into_inner()
            },
        }
    }

    fn stripe_index(key: &LockKey) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % STRIPE_COUNT
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}
