pub mod config;
pub mod error;
pub mod guide_layout;
pub mod instance;
pub mod mounting;
pub mod mutation;
pub mod native;
pub mod parallel;
pub mod prealloc;
pub mod scheduler;

use std::sync::Arc;

// Re-export key types
pub use config::{MountingConfig, RuntimeCapabilities};
pub use error::{MountError, NodeApiError, Result};
pub use instance::{ComponentInstance, ComponentKind, InstanceRegistry};
pub use mounting::{MountReport, MountingManager};
pub use mutation::{Mutation, MutationKind, ShadowView, SurfaceId, Tag, Transaction};
pub use scheduler::{FrameScheduler, SchedulerDelegate, SplitPlan};

/// Shared handle to a live component instance
pub type SharedInstance = Arc<ComponentInstance>;
