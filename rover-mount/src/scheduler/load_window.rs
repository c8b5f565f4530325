use crate::config::LoadWindowConfig;
use crate::mutation::SurfaceId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct SurfaceLoad {
    first_seen: Instant,
    last_seen: Instant,
    transactions: u32,
}

/// Tracks each surface's first transactions so frame splitting can be
/// skipped while the surface is still loading.
pub struct SurfaceLoadTracker {
    config: LoadWindowConfig,
    surfaces: Mutex<HashMap<SurfaceId, SurfaceLoad>>,
}

impl SurfaceLoadTracker {
    pub fn new(config: LoadWindowConfig) -> Self {
        Self {
            config,
            surfaces: Mutex::new(HashMap::new()),
        }
    }

    /// Record a transaction for `surface` and report whether it is still in
    /// its initial load window
    pub fn is_in_initial_load_window(&self, surface: SurfaceId) -> bool {
        self.is_in_initial_load_window_at(surface, Instant::now())
    }

    pub fn is_in_initial_load_window_at(&self, surface: SurfaceId, now: Instant) -> bool {
        if surface == SurfaceId(0) {
            return false;
        }

        let mut surfaces = self.surfaces.lock();
        if surfaces.len() > self.config.max_entries {
            let ttl = self.config.ttl();
            surfaces.retain(|_, load| now.saturating_duration_since(load.last_seen) <= ttl);
        }

        let load = surfaces.entry(surface).or_insert(SurfaceLoad {
            first_seen: now,
            last_seen: now,
            transactions: 0,
        });
        load.last_seen = now;
        load.transactions += 1;

        now.saturating_duration_since(load.first_seen) < self.config.window()
            || load.transactions <= self.config.max_transactions
    }

    pub fn tracked_surfaces(&self) -> usize {
        self.surfaces.lock().len()
    }
}
