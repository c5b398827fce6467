//! Local snapshot cache of upstream prime listings
//!
//! Reads never block on the network: `list_pending` serves from the
//! last refreshed snapshot and only the refresh path talks upstream.
//! Payouts still re-validate against the live source.

use parking_lot::RwLock;
use shared::prime::{ExternalPrime, PrimeSystem};
use shared::util::now_millis;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CachedPrimes {
    pub primes: Vec<ExternalPrime>,
    pub refreshed_at: i64,
}

/// Per-system snapshot of the upstream "paid" primes
#[derive(Default)]
pub struct PrimeCache {
    inner: RwLock<HashMap<PrimeSystem, CachedPrimes>>,
}

impl PrimeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, system: PrimeSystem) -> Option<CachedPrimes> {
        self.inner.read().get(&system).cloned()
    }

    pub fn put(&self, system: PrimeSystem, primes: Vec<ExternalPrime>) -> CachedPrimes {
        let cached = CachedPrimes {
            primes,
            refreshed_at: now_millis(),
        };
        self.inner.write().insert(system, cached.clone());
        cached
    }
}
