//! Session-scoped counters shared by the scheduler and navigation agents.
//!
//! The counters are an explicit, injectable object rather than process-wide
//! statics so multiple sessions (and tests) can run side by side. Increments
//! are atomic because pooled entities may be instantiated off the main tick
//! during batch warmup.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::SpawnOrder;

/// Shared counter state for one game session.
#[derive(Debug, Default)]
pub struct SessionCounters {
    last_spawn_order: AtomicU64,
    population: AtomicU32,
}

impl SessionCounters {
    /// Creates counters with all values at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws the next spawn order, strictly greater than every prior one.
    #[must_use]
    pub fn next_spawn_order(&self) -> SpawnOrder {
        let previous = self.last_spawn_order.fetch_add(1, Ordering::Relaxed);
        SpawnOrder::new(previous + 1)
    }

    /// Records an externally assigned order so future draws stay ahead of it.
    pub fn adopt_spawn_order(&self, order: SpawnOrder) {
        let _ = self
            .last_spawn_order
            .fetch_max(order.get(), Ordering::Relaxed);
    }

    /// Number of live agents tracked for the active horde.
    #[must_use]
    pub fn population(&self) -> u32 {
        self.population.load(Ordering::Relaxed)
    }

    /// Registers a spawned agent.
    pub fn increment_population(&self) {
        let _ = self.population.fetch_add(1, Ordering::Relaxed);
    }

    /// Registers a despawned agent.
    ///
    /// Returns `false` when the counter was already zero; the decrement is
    /// dropped so the population can never go negative.
    pub fn decrement_population(&self) -> bool {
        self.population
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| {
                value.checked_sub(1)
            })
            .is_ok()
    }
}
