use super::{BuiltinComponent, ComponentInstance, ComponentKind};
use crate::SharedInstance;
use crate::error::{MountError, Result};
use crate::mutation::{ComponentHandle, ComponentName, Tag};
use crate::native::NativeNodeApi;
use crate::prealloc::{PreallocationDelegate, PreallocationQueue, PreallocationRequest};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Builds component instances by component identity
pub trait ComponentFactory: Send + Sync {
    fn create(&self, tag: Tag, handle: ComponentHandle, name: &str) -> Result<ComponentInstance>;

    /// Placeholder for components no native implementation exists for
    fn create_fallback(
        &self,
        tag: Tag,
        handle: ComponentHandle,
        name: &str,
    ) -> Result<ComponentInstance>;
}

/// Factory for built-in components plus custom names registered at startup
pub struct NativeComponentFactory {
    api: Arc<dyn NativeNodeApi>,
    custom: RwLock<HashSet<ComponentName>>,
}

impl NativeComponentFactory {
    pub fn new(api: Arc<dyn NativeNodeApi>) -> Self {
        Self {
            api,
            custom: RwLock::new(HashSet::new()),
        }
    }

    pub fn register_custom(&self, name: &str) {
        self.custom.write().insert(name.into());
    }

    fn kind_for(&self, handle: ComponentHandle, name: &str) -> Option<ComponentKind> {
        if let Some(builtin) =
            BuiltinComponent::from_handle(handle).or_else(|| BuiltinComponent::from_name(name))
        {
            return Some(ComponentKind::Builtin(builtin));
        }
        self.custom
            .read()
            .contains(name)
            .then_some(ComponentKind::Custom)
    }
}

impl ComponentFactory for NativeComponentFactory {
    fn create(&self, tag: Tag, handle: ComponentHandle, name: &str) -> Result<ComponentInstance> {
        let kind = self
            .kind_for(handle, name)
            .ok_or_else(|| MountError::UnknownComponent(name.to_string()))?;
        ComponentInstance::new(tag, kind, handle, name, self.api.clone())
    }

    fn create_fallback(
        &self,
        tag: Tag,
        handle: ComponentHandle,
        name: &str,
    ) -> Result<ComponentInstance> {
        ComponentInstance::new(tag, ComponentKind::Custom, handle, name, self.api.clone())
    }
}

/// Source of instances for the mounting manager
pub trait ComponentInstanceProvider: Send + Sync {
    fn get_component_instance(
        &self,
        tag: Tag,
        handle: ComponentHandle,
        name: &str,
    ) -> Option<SharedInstance>;

    fn create_fallback_instance(
        &self,
        tag: Tag,
        handle: ComponentHandle,
        name: &str,
    ) -> Option<SharedInstance>;

    /// Drop preallocated instances that were never claimed by a Create
    fn clear_preallocated_views(&self);

    fn clear_preallocation_request_queue(&self);
}

/// Provider that hands out preallocated instances first and falls back to
/// building through its factory.
pub struct DefaultInstanceProvider {
    factory: Arc<dyn ComponentFactory>,
    queue: Arc<PreallocationQueue>,
    preallocated: Mutex<HashMap<Tag, SharedInstance>>,
    pull_requested: AtomicBool,
}

impl DefaultInstanceProvider {
    /// Build the provider and register it as the queue's delegate
    pub fn new(factory: Arc<dyn ComponentFactory>, queue: Arc<PreallocationQueue>) -> Arc<Self> {
        let provider = Arc::new(Self {
            factory,
            queue: queue.clone(),
            preallocated: Mutex::new(HashMap::new()),
            pull_requested: AtomicBool::new(false),
        });
        let delegate: Arc<dyn PreallocationDelegate> = provider.clone();
        queue.set_delegate(Arc::downgrade(&delegate));
        provider
    }

    /// Build every queued request. Returns the number processed.
    pub fn process_pending_requests(&self) -> usize {
        self.pull_requested.store(false, Ordering::Release);
        let mut processed = 0;
        while let Some(request) = self.queue.pop() {
            self.process_preallocation_request(&request);
            processed += 1;
        }
        processed
    }

    /// Set when the queue asked to be drained and nobody has done so yet
    pub fn has_pending_pull(&self) -> bool {
        self.pull_requested.load(Ordering::Acquire)
    }

    pub fn preallocated_count(&self) -> usize {
        self.preallocated.lock().len()
    }
}

impl PreallocationDelegate for DefaultInstanceProvider {
    fn on_push_preallocation_request(&self) {
        self.pull_requested.store(true, Ordering::Release);
    }

    fn process_preallocation_request(&self, request: &PreallocationRequest) {
        if self.preallocated.lock().contains_key(&request.tag) {
            return;
        }

        let instance = match self.factory.create(
            request.tag,
            request.component_handle,
            &request.component_name,
        ) {
            Ok(instance) => Arc::new(instance),
            Err(e) => {
                debug!(tag = request.tag.0, component = %request.component_name, error = %e, "preallocation skipped");
                return;
            }
        };
        if let Err(e) = instance.set_props(request.props.clone()) {
            warn!(tag = request.tag.0, error = %e, "preallocated props failed");
            return;
        }
        self.preallocated.lock().insert(request.tag, instance);
    }
}

impl ComponentInstanceProvider for DefaultInstanceProvider {
    fn get_component_instance(
        &self,
        tag: Tag,
        handle: ComponentHandle,
        name: &str,
    ) -> Option<SharedInstance> {
        let claimed = self.preallocated.lock().remove(&tag);
        if let Some(instance) = claimed {
            if instance.component_handle() == handle {
                return Some(instance);
            }
        }

        match self.factory.create(tag, handle, name) {
            Ok(instance) => Some(Arc::new(instance)),
            Err(e) => {
                debug!(tag = tag.0, component = name, error = %e, "no native component");
                None
            }
        }
    }

    fn create_fallback_instance(
        &self,
        tag: Tag,
        handle: ComponentHandle,
        name: &str,
    ) -> Option<SharedInstance> {
        match self.factory.create_fallback(tag, handle, name) {
            Ok(instance) => Some(Arc::new(instance)),
            Err(e) => {
                warn!(tag = tag.0, component = name, error = %e, "fallback component failed");
                None
            }
        }
    }

    fn clear_preallocated_views(&self) {
        let dropped = std::mem::take(&mut *self.preallocated.lock());
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "dropping unclaimed preallocated views");
        }
    }

    fn clear_preallocation_request_queue(&self) {
        self.queue.clear();
    }
}
