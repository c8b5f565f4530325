mod adapter;
mod confinement;

pub use adapter::{MessageChannel, MountingAdapter};

use adapter::valid_adapter_mutations;
pub use confinement::ThreadConfinement;

use crate::SharedInstance;
use crate::config::RuntimeCapabilities;
use crate::error::{MountError, Result, panic_message};
use crate::guide_layout::GuideLayoutCache;
use crate::instance::{ComponentInstanceProvider, InstanceRegistry};
use crate::mutation::classify::target_tag;
use crate::mutation::{ComponentName, Mutation, MutationKind, ShadowView, SurfaceId, Tag};
use crate::parallel::{InlineJobPartner, Job, JobPartner, ParallelComponentSet};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

pub const ACCESSIBILITY_EVENT_MESSAGE: &str = "RNOH::schedulerDidSendAccessibilityEvent";

/// A mutation that could not be applied
#[derive(Debug)]
pub struct MutationFailure {
    pub kind: MutationKind,
    pub tag: Tag,
    pub error: MountError,
}

/// Outcome of applying one batch
#[derive(Debug, Default)]
pub struct MountReport {
    pub applied: usize,
    pub failures: Vec<MutationFailure>,
}

impl MountReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn record(&mut self, mutation: &Mutation, result: Result<()>) {
        match result {
            Ok(()) => self.applied += 1,
            Err(error) => self.failures.push(MutationFailure {
                kind: mutation.kind,
                tag: target_tag(mutation),
                error,
            }),
        }
    }
}

/// Applies mutations to the live component tree.
///
/// Tree-changing operations run on the thread that built the manager. Create
/// mutations of parallel-safe components may run on workers.
pub struct MountingManager {
    this: Weak<MountingManager>,
    registry: Arc<InstanceRegistry>,
    provider: Arc<dyn ComponentInstanceProvider>,
    parallel: Arc<ParallelComponentSet>,
    create_partner: Arc<dyn JobPartner>,
    capabilities: RuntimeCapabilities,
    adapter: Option<Arc<dyn MountingAdapter>>,
    adapter_components: HashSet<ComponentName>,
    guide_layout: Option<Arc<GuideLayoutCache>>,
    channel: Option<Arc<dyn MessageChannel>>,
    owner: ThreadConfinement,
}

pub struct MountingManagerBuilder {
    provider: Arc<dyn ComponentInstanceProvider>,
    registry: Option<Arc<InstanceRegistry>>,
    parallel: Option<Arc<ParallelComponentSet>>,
    create_partner: Option<Arc<dyn JobPartner>>,
    capabilities: RuntimeCapabilities,
    adapter: Option<Arc<dyn MountingAdapter>>,
    adapter_components: HashSet<ComponentName>,
    guide_layout: Option<Arc<GuideLayoutCache>>,
    channel: Option<Arc<dyn MessageChannel>>,
}

impl MountingManagerBuilder {
    pub fn registry(mut self, registry: Arc<InstanceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn parallel_components(mut self, parallel: Arc<ParallelComponentSet>) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn create_partner(mut self, partner: Arc<dyn JobPartner>) -> Self {
        self.create_partner = Some(partner);
        self
    }

    pub fn capabilities(mut self, capabilities: RuntimeCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Mirror `components` to `adapter`
    pub fn adapter<I, S>(mut self, adapter: Arc<dyn MountingAdapter>, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.adapter = Some(adapter);
        self.adapter_components = components
            .into_iter()
            .map(|name| ComponentName::from(name.as_ref()))
            .collect();
        self
    }

    pub fn guide_layout(mut self, cache: Arc<GuideLayoutCache>) -> Self {
        self.guide_layout = Some(cache);
        self
    }

    pub fn message_channel(mut self, channel: Arc<dyn MessageChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Build the manager, owned by the calling thread
    pub fn build(self) -> Arc<MountingManager> {
        Arc::new_cyclic(|this| MountingManager {
            this: this.clone(),
            registry: self.registry.unwrap_or_default(),
            provider: self.provider,
            parallel: self
                .parallel
                .unwrap_or_else(|| Arc::new(ParallelComponentSet::with_builtins())),
            create_partner: self
                .create_partner
                .unwrap_or_else(|| Arc::new(InlineJobPartner) as Arc<dyn JobPartner>),
            capabilities: self.capabilities,
            adapter: self.adapter,
            adapter_components: self.adapter_components,
            guide_layout: self.guide_layout,
            channel: self.channel,
            owner: ThreadConfinement::current(),
        })
    }
}

impl MountingManager {
    pub fn builder(provider: Arc<dyn ComponentInstanceProvider>) -> MountingManagerBuilder {
        MountingManagerBuilder {
            provider,
            registry: None,
            parallel: None,
            create_partner: None,
            capabilities: RuntimeCapabilities::serial(),
            adapter: None,
            adapter_components: HashSet::new(),
            guide_layout: None,
            channel: None,
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn parallel_components(&self) -> &Arc<ParallelComponentSet> {
        &self.parallel
    }

    pub fn create_partner(&self) -> &Arc<dyn JobPartner> {
        &self.create_partner
    }

    pub fn capabilities(&self) -> RuntimeCapabilities {
        self.capabilities
    }

    pub fn owner(&self) -> ThreadConfinement {
        self.owner
    }

    pub fn find_by_tag(&self, tag: Tag) -> Option<SharedInstance> {
        self.registry.find_by_tag(tag)
    }

    pub fn will_mount(&self, _mutations: &[Mutation]) {}

    /// Let the adapter apply `mutations` on the calling thread
    pub fn do_mount(&self, mutations: &[Mutation]) {
        if let Some(adapter) = &self.adapter {
            adapter.do_mount(mutations);
        }
    }

    /// Apply a batch: eligible Creates fan out to workers and are joined
    /// before any other mutation runs, everything else runs in order.
    pub fn did_mount(&self, mutations: &[Mutation]) -> MountReport {
        if let Some(adapter) = &self.adapter {
            let valid = valid_adapter_mutations(mutations, |v| self.is_adapter_managed(v));
            if !valid.is_empty() {
                adapter.did_mount(&valid);
            }
        }
        self.provider.clear_preallocation_request_queue();

        let report = Arc::new(Mutex::new(MountReport::default()));
        let this = self.this.upgrade();
        let mut fanned_out = false;

        for mutation in mutations.iter().filter(|m| m.is_create()) {
            if let Some(manager) = this.as_ref() {
                if self.can_create_off_thread(&mutation.new_child) {
                    let manager = Arc::clone(manager);
                    let job_mutation = mutation.clone();
                    let job_report = Arc::clone(&report);
                    let job: Job = Box::new(move || {
                        let result = manager.apply_isolated(&job_mutation);
                        job_report.lock().record(&job_mutation, result);
                    });
                    match self.create_partner.submit(job) {
                        Ok(()) => fanned_out = true,
                        Err(rejected) => {
                            warn!(tag = mutation.new_child.tag.0, reason = %rejected.reason, "create job rejected, running inline");
                            (rejected.job)();
                        }
                    }
                    continue;
                }
            }
            let result = self.apply_isolated(mutation);
            report.lock().record(mutation, result);
        }
        if fanned_out {
            self.create_partner.wait();
        }

        for mutation in mutations.iter().filter(|m| !m.is_create()) {
            let result = self.apply_isolated(mutation);
            report.lock().record(mutation, result);
        }

        drop(this);
        std::mem::take(&mut *report.lock())
    }

    /// Apply one mutation, converting a panic into an error and logging any failure
    pub fn apply_isolated(&self, mutation: &Mutation) -> Result<()> {
        let result = catch_unwind(AssertUnwindSafe(|| self.handle_mutation(mutation)))
            .unwrap_or_else(|payload| Err(MountError::Panicked(panic_message(payload.as_ref()))));
        if let Err(e) = &result {
            error!(
                mutation = mutation.kind.name(),
                tag = target_tag(mutation).0,
                error = %e,
                "mutation failed"
            );
        }
        result
    }

    pub fn handle_mutation(&self, mutation: &Mutation) -> Result<()> {
        debug!(
            mutation = mutation.kind.name(),
            tag = target_tag(mutation).0,
            "handle mutation"
        );
        if !mutation.is_create() {
            self.owner.debug_check("handle_mutation");
        }

        match mutation.kind {
            MutationKind::Create => self.create(&mutation.new_child),
            MutationKind::Delete => {
                self.delete(mutation.old_child.tag);
                Ok(())
            }
            MutationKind::Insert => self.insert(mutation),
            MutationKind::Remove => self.remove(mutation),
            MutationKind::Update => self.update(&mutation.new_child),
            MutationKind::RemoveDeleteTree => Ok(()),
        }
    }

    fn create(&self, view: &ShadowView) -> Result<()> {
        let name = view.component_name.as_str();
        let instance = self
            .provider
            .get_component_instance(view.tag, view.component_handle, name)
            .or_else(|| {
                self.provider
                    .create_fallback_instance(view.tag, view.component_handle, name)
            })
            .ok_or_else(|| MountError::InstanceUnavailable {
                tag: view.tag,
                component: name.to_string(),
            })?;

        self.registry.insert(Arc::clone(&instance));
        self.apply_shadow_view(&instance, view)
    }

    fn delete(&self, tag: Tag) {
        let Some(instance) = self.registry.delete_by_tag(tag) else {
            return;
        };
        if instance.kind().is_modal() {
            if let Some(cache) = &self.guide_layout {
                cache.invalidate(tag);
            }
        }
    }

    fn insert(&self, mutation: &Mutation) -> Result<()> {
        let parent = self.registry.find_by_tag(mutation.parent.tag);
        let child = self.registry.find_by_tag(mutation.new_child.tag);
        match (parent, child) {
            (Some(parent), Some(child)) => parent.insert_child(&child, mutation.index),
            _ => {
                debug!(
                    parent = mutation.parent.tag.0,
                    child = mutation.new_child.tag.0,
                    "insert skipped, instance missing"
                );
                Ok(())
            }
        }
    }

    fn remove(&self, mutation: &Mutation) -> Result<()> {
        let Some(parent) = self.registry.find_by_tag(mutation.parent.tag) else {
            return Ok(());
        };
        let child = self.registry.find_by_tag(mutation.old_child.tag);
        parent.remove_child(child.as_ref())
    }

    fn update(&self, view: &ShadowView) -> Result<()> {
        match self.registry.find_by_tag(view.tag) {
            Some(instance) => self.apply_shadow_view(&instance, view),
            None => Ok(()),
        }
    }

    /// The id mapping moves before props so lookups made while applying props
    /// already see the new id.
    fn apply_shadow_view(&self, instance: &SharedInstance, view: &ShadowView) -> Result<()> {
        self.registry
            .update_tag_by_id(view.tag, &view.props.native_id, &instance.id());
        instance.set_layout(view.layout);
        instance.set_event_emitter(view.event_emitter);
        instance.set_state(view.state.clone());
        instance.set_props(Arc::clone(&view.props))
    }

    /// Finalize every instance touched by `mutations` once. Returns how many
    /// instances were finalized.
    pub fn finalize_mutation_updates(&self, mutations: &[Mutation]) -> usize {
        let mut seen = HashSet::new();
        let mut touched = Vec::new();
        for mutation in mutations {
            let tag = match mutation.kind {
                MutationKind::Create | MutationKind::Update => mutation.new_child.tag,
                MutationKind::Insert | MutationKind::Remove => mutation.parent.tag,
                MutationKind::Delete | MutationKind::RemoveDeleteTree => continue,
            };
            if let Some(instance) = self.registry.find_by_tag(tag) {
                if seen.insert(Arc::as_ptr(&instance)) {
                    touched.push(instance);
                }
            }
        }

        for instance in &touched {
            if let Err(e) = instance.finalize_updates() {
                error!(tag = instance.tag().0, error = %e, "finalize failed");
            }
        }
        touched.len()
    }

    pub fn dispatch_command(&self, view: &ShadowView, command: &str, args: &Value) {
        if self.is_adapter_managed(view) {
            if let Some(adapter) = &self.adapter {
                adapter.dispatch_command(view, command, args);
            }
        }
        if let Some(instance) = self.registry.find_by_tag(view.tag) {
            instance.handle_command(command, args);
        }
    }

    pub fn set_is_js_responder(
        &self,
        view: &ShadowView,
        is_js_responder: bool,
        block_native_responder: bool,
    ) {
        if self.is_adapter_managed(view) {
            if let Some(adapter) = &self.adapter {
                adapter.set_is_js_responder(view, is_js_responder, block_native_responder);
            }
        }

        let Some(instance) = self.registry.find_by_tag(view.tag) else {
            return;
        };
        instance.set_is_js_responder(is_js_responder);

        let mut current = Some(instance);
        while let Some(node) = current {
            node.set_native_responder_blocked(block_native_responder);
            current = node.parent();
        }
    }

    pub fn send_accessibility_event(&self, tag: Tag, event_type: &str) {
        let Some(channel) = &self.channel else {
            return;
        };
        let Some(instance) = self.registry.find_by_tag(tag) else {
            debug!(tag = tag.0, "accessibility event for missing instance");
            return;
        };
        channel.post_message(
            ACCESSIBILITY_EVENT_MESSAGE,
            json!({ "type": event_type, "targetId": instance.node().0 }),
        );
    }

    /// Merge raw props into a mounted instance. The merged keys become the
    /// instance's ignored keys so later commits don't overwrite them.
    ///
    /// Returns false when the instance is missing or not attached to a surface.
    pub fn update_view(&self, tag: Tag, raw_props: Map<String, Value>) -> Result<bool> {
        self.owner.debug_check("update_view");
        let Some(instance) = self.registry.find_by_tag(tag) else {
            return Ok(false);
        };
        if self.surface_of(&instance).is_none() {
            debug!(tag = tag.0, "update_view on detached instance");
            return Ok(false);
        }

        let mut props = (*instance.props()).clone();
        let keys: HashSet<String> = raw_props.keys().cloned().collect();
        props.values.extend(raw_props);

        instance.set_ignored_prop_keys(HashSet::new());
        let applied = instance.set_props(Arc::new(props));
        let finalized = instance.finalize_updates();
        instance.set_ignored_prop_keys(keys);
        applied.and(finalized).map(|()| true)
    }

    /// Surface of the tree `instance` is mounted in, if any
    pub fn surface_of(&self, instance: &SharedInstance) -> Option<SurfaceId> {
        let mut root = Arc::clone(instance);
        while let Some(parent) = root.parent() {
            root = parent;
        }
        SurfaceId::from_root_tag(root.tag())
    }

    pub fn clear_preallocated_views(&self) {
        self.provider.clear_preallocated_views();
    }

    pub fn clear_preallocation_request_queue(&self) {
        self.provider.clear_preallocation_request_queue();
    }

    fn can_create_off_thread(&self, view: &ShadowView) -> bool {
        self.capabilities.off_thread_creation
            && self
                .parallel
                .is_eligible(view.component_handle, &view.component_name)
    }

    fn is_adapter_managed(&self, view: &ShadowView) -> bool {
        self.adapter.is_some() && self.adapter_components.contains(view.component_name.as_str())
    }
}
