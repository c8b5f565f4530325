mod job;

pub use job::{
    InlineJobPartner, Job, JobPartner, JobRejected, RayonJobPartner, Scenario, job_partner_for,
};

use crate::instance::BuiltinComponent;
use crate::mutation::{ComponentHandle, ComponentName};
use parking_lot::RwLock;
use std::collections::HashSet;

/// Components whose construction may run on a worker thread.
///
/// Built-ins are allow-listed by handle; third-party components opt in by
/// name at startup.
pub struct ParallelComponentSet {
    handles: HashSet<ComponentHandle>,
    names: RwLock<HashSet<ComponentName>>,
}

impl ParallelComponentSet {
    pub fn empty() -> Self {
        Self {
            handles: HashSet::new(),
            names: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_builtins() -> Self {
        Self {
            handles: BuiltinComponent::ALL
                .into_iter()
                .filter(|c| c.is_parallel_safe())
                .map(|c| c.handle())
                .collect(),
            names: RwLock::new(HashSet::new()),
        }
    }

    pub fn add_component_name(&self, name: &str) {
        if name.is_empty() {
            return;
        }
        self.names.write().insert(name.into());
    }

    pub fn has_component_name(&self, name: &str) -> bool {
        self.names.read().contains(name)
    }

    pub fn is_eligible(&self, handle: ComponentHandle, name: &str) -> bool {
        self.handles.contains(&handle) || self.has_component_name(name)
    }
}

impl Default for ParallelComponentSet {
    fn default() -> Self {
        Self::with_builtins()
    }
}
