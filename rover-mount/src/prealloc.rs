//! Queue of speculative instance construction ahead of Create mutations.

use crate::config::RuntimeCapabilities;
use crate::mutation::{ComponentHandle, ComponentName, Props, Tag};
use crate::parallel::{JobPartner, ParallelComponentSet};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Request to build an instance before its Create mutation arrives
#[derive(Debug, Clone)]
pub struct PreallocationRequest {
    pub tag: Tag,
    pub component_handle: ComponentHandle,
    pub component_name: ComponentName,
    pub props: Arc<Props>,
}

/// Consumer of preallocation requests, usually the instance provider
pub trait PreallocationDelegate: Send + Sync {
    /// A request was queued and is waiting to be pulled
    fn on_push_preallocation_request(&self);

    fn process_preallocation_request(&self, request: &PreallocationRequest);
}

pub struct PreallocationQueue {
    queue: Mutex<VecDeque<PreallocationRequest>>,
    delegate: RwLock<Option<Weak<dyn PreallocationDelegate>>>,
    partner: Arc<dyn JobPartner>,
    parallel: Arc<ParallelComponentSet>,
    capabilities: RuntimeCapabilities,
}

impl PreallocationQueue {
    pub fn new(
        partner: Arc<dyn JobPartner>,
        parallel: Arc<ParallelComponentSet>,
        capabilities: RuntimeCapabilities,
    ) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            delegate: RwLock::new(None),
            partner,
            parallel,
            capabilities,
        }
    }

    pub fn set_delegate(&self, delegate: Weak<dyn PreallocationDelegate>) {
        *self.delegate.write() = Some(delegate);
    }

    /// Hand eligible requests to a worker; everything else is queued for the
    /// delegate to pull.
    pub fn push(&self, request: PreallocationRequest) {
        let delegate = self.delegate.read().as_ref().and_then(Weak::upgrade);

        if let Some(delegate) = &delegate {
            if self.capabilities.off_thread_creation
                && self
                    .parallel
                    .is_eligible(request.component_handle, &request.component_name)
            {
                let tag = request.tag;
                let worker_delegate = Arc::clone(delegate);
                let submitted = self.partner.submit(Box::new(move || {
                    worker_delegate.process_preallocation_request(&request);
                }));
                if let Err(rejected) = submitted {
                    // Mounting creates the instance synchronously instead
                    warn!(tag = tag.0, reason = %rejected.reason, "preallocation job rejected");
                }
                return;
            }
        }

        self.queue.lock().push_back(request);
        match delegate {
            Some(delegate) => delegate.on_push_preallocation_request(),
            None => debug!("preallocation queued without a delegate"),
        }
    }

    pub fn pop(&self) -> Option<PreallocationRequest> {
        self.queue.lock().pop_front()
    }

    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}
