use std::thread::{self, ThreadId};

/// Remembers the thread that owns the live tree
#[derive(Debug, Clone, Copy)]
pub struct ThreadConfinement {
    owner: ThreadId,
}

impl ThreadConfinement {
    /// Confine to the current thread
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    pub fn debug_check(&self, operation: &'static str) {
        debug_assert!(
            self.is_owner(),
            "`{operation}` must run on the thread that owns the mounted tree"
        );
    }
}
