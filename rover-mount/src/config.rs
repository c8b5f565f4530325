use crate::error::Result;
use serde::Deserialize;
use std::time::Duration;

/// Minimum platform API level that supports constructing nodes off the UI thread
pub const OFF_THREAD_CREATION_API_LEVEL: u32 = 21;

/// Tunables for the mounting engine.
///
/// Every value here was tuned empirically on one device class; hosts are
/// expected to override them rather than rely on the defaults generalizing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MountingConfig {
    pub split: SplitConfig,
    pub load_window: LoadWindowConfig,
    /// Create mutations per main-thread task on the non-parallel path
    pub create_fragment_size: usize,
    pub preallocation_workers: WorkerLimits,
    pub mutation_create_workers: WorkerLimits,
}

impl MountingConfig {
    /// Parse a JSON document, filling anything missing with defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for MountingConfig {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
            load_window: LoadWindowConfig::default(),
            create_fragment_size: 70,
            preallocation_workers: WorkerLimits {
                max_parallelism: 2,
                priority: 5,
            },
            mutation_create_workers: WorkerLimits {
                max_parallelism: 4,
                priority: 5,
            },
        }
    }
}

/// Heuristic cost per non-Create mutation type. Create always costs 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub insert: i32,
    pub remove: i32,
    pub delete: i32,
    /// Update and anything else
    pub default: i32,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            insert: 3,
            remove: 3,
            delete: 4,
            default: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub weights: CostWeights,
    /// Group cost above which a same-parent Insert/Remove run may be broken
    pub soft_same_parent_break_cost: i32,
    pub min_count: usize,
    pub min_cost: i32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            weights: CostWeights::default(),
            soft_same_parent_break_cost: 90,
            min_count: 60,
            min_cost: 120,
        }
    }
}

/// Initial-load window during which frame splitting is suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoadWindowConfig {
    pub window_ms: u64,
    pub max_transactions: u32,
    /// Tracker size above which stale surfaces get pruned
    pub max_entries: usize,
    pub ttl_secs: u64,
}

impl LoadWindowConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for LoadWindowConfig {
    fn default() -> Self {
        Self {
            window_ms: 3000,
            max_transactions: 3,
            max_entries: 128,
            ttl_secs: 120,
        }
    }
}

/// Parallelism cap and priority tier for one worker scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WorkerLimits {
    pub max_parallelism: usize,
    pub priority: u8,
}

/// Platform capabilities, computed once at startup and passed down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeCapabilities {
    /// Node constructors may run on worker threads (preallocation, Create fan-out)
    pub off_thread_creation: bool,
    /// The scheduler may fan out Creates and split the rest across frames
    pub parallel_scheduling: bool,
}

impl RuntimeCapabilities {
    pub fn detect(api_level: u32, parallelization_requested: bool) -> Self {
        let off_thread_creation = api_level >= OFF_THREAD_CREATION_API_LEVEL;
        Self {
            off_thread_creation,
            parallel_scheduling: off_thread_creation && parallelization_requested,
        }
    }

    /// Everything runs synchronously on the calling thread
    pub fn serial() -> Self {
        Self::default()
    }
}
