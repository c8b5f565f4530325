use super::ComponentKind;
use crate::SharedInstance;
use crate::error::{MountError, Result};
use crate::mutation::{ComponentHandle, ComponentName, EventEmitterId, LayoutMetrics, Props, Tag};
use crate::native::{NativeNodeApi, NodeHandle, check_status};
use parking_lot::Mutex;
use serde_json::{Value, json};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

enum AttributeChange {
    Set(String, Value),
    Reset(String),
}

#[derive(Default)]
struct InstanceState {
    id: String,
    parent: Weak<ComponentInstance>,
    children: SmallVec<[SharedInstance; 4]>,
    props: Arc<Props>,
    state: Option<Arc<Value>>,
    layout: LayoutMetrics,
    event_emitter: Option<EventEmitterId>,
    ignored_prop_keys: HashSet<String>,
    layout_dirty: bool,
    finalize_count: u32,
    js_responder: bool,
    native_responder_blocked: bool,
    commands: Vec<(String, Value)>,
}

/// Live counterpart of one shadow node, owning exactly one native node.
///
/// Mutable state sits behind a single mutex. A parent and a child are never
/// locked at the same time, and no lock is held across a native call.
pub struct ComponentInstance {
    tag: Tag,
    kind: ComponentKind,
    component_handle: ComponentHandle,
    component_name: ComponentName,
    node: NodeHandle,
    api: Arc<dyn NativeNodeApi>,
    inner: Mutex<InstanceState>,
}

impl ComponentInstance {
    pub fn new(
        tag: Tag,
        kind: ComponentKind,
        component_handle: ComponentHandle,
        component_name: &str,
        api: Arc<dyn NativeNodeApi>,
    ) -> Result<Self> {
        let node = api
            .create_node(kind.node_type())
            .ok_or_else(|| MountError::InstanceUnavailable {
                tag,
                component: component_name.to_string(),
            })?;

        Ok(Self {
            tag,
            kind,
            component_handle,
            component_name: component_name.into(),
            node,
            api,
            inner: Mutex::new(InstanceState::default()),
        })
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn component_handle(&self) -> ComponentHandle {
        self.component_handle
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn node(&self) -> NodeHandle {
        self.node
    }

    /// External id, empty when unset
    pub fn id(&self) -> String {
        self.inner.lock().id.clone()
    }

    pub fn parent(&self) -> Option<SharedInstance> {
        self.inner.lock().parent.upgrade()
    }

    pub fn children(&self) -> Vec<SharedInstance> {
        self.inner.lock().children.to_vec()
    }

    pub fn child_tags(&self) -> Vec<Tag> {
        self.inner.lock().children.iter().map(|c| c.tag()).collect()
    }

    pub fn insert_child(self: &Arc<Self>, child: &SharedInstance, index: usize) -> Result<()> {
        if !self.kind.accepts_children() {
            return Err(MountError::ChildrenUnsupported {
                parent: self.tag,
                component: self.component_name.to_string(),
            });
        }

        // A node has at most one parent
        if let Some(previous) = child.parent() {
            previous.remove_child(Some(child))?;
        }

        let native_index = i32::try_from(index).unwrap_or(i32::MAX);
        check_status(
            "insertChildAt",
            self.api.insert_child_at(self.node, child.node, native_index),
        )?;

        child.inner.lock().parent = Arc::downgrade(self);
        let mut inner = self.inner.lock();
        let at = index.min(inner.children.len());
        inner.children.insert(at, Arc::clone(child));
        Ok(())
    }

    /// Detach `child`; a missing child or one that is not ours is a no-op
    pub fn remove_child(&self, child: Option<&SharedInstance>) -> Result<()> {
        let Some(child) = child else {
            return Ok(());
        };

        let removed = {
            let mut inner = self.inner.lock();
            match inner.children.iter().position(|c| Arc::ptr_eq(c, child)) {
                Some(position) => {
                    inner.children.remove(position);
                    true
                }
                None => false,
            }
        };
        if !removed {
            return Ok(());
        }

        {
            let mut child_state = child.inner.lock();
            if std::ptr::eq(child_state.parent.as_ptr(), self) {
                child_state.parent = Weak::new();
            }
        }

        check_status("removeChild", self.api.remove_child(self.node, child.node))?;
        Ok(())
    }

    /// Record the new external id. The registry mapping is maintained by the caller.
    pub fn set_id(&self, id: &str) {
        self.inner.lock().id = id.to_string();
    }

    /// Apply `props`, pushing only changed keys to the native node.
    ///
    /// Every change is attempted. Keys the native node rejected keep their
    /// previous value in the stored props, so the next update retries them.
    /// The first native error is returned.
    pub fn set_props(&self, props: Arc<Props>) -> Result<()> {
        let (old, changes) = {
            let mut inner = self.inner.lock();
            let old = Arc::clone(&inner.props);
            let ignored = &inner.ignored_prop_keys;

            let mut changes = Vec::new();
            for (key, value) in &props.values {
                if ignored.contains(key) || old.values.get(key) == Some(value) {
                    continue;
                }
                changes.push(AttributeChange::Set(key.clone(), value.clone()));
            }
            for key in old.values.keys() {
                if !ignored.contains(key) && !props.values.contains_key(key) {
                    changes.push(AttributeChange::Reset(key.clone()));
                }
            }

            inner.id = props.native_id.clone();
            inner.props = props;
            (old, changes)
        };

        let mut rejected = Vec::new();
        let mut first_error = None;
        for change in changes {
            let (key, result) = match change {
                AttributeChange::Set(key, value) => {
                    let status = self.api.set_attribute(self.node, &key, &value);
                    (key, check_status("setAttribute", status))
                }
                AttributeChange::Reset(key) => {
                    let status = self.api.reset_attribute(self.node, &key);
                    (key, check_status("resetAttribute", status))
                }
            };
            if let Err(e) = result {
                warn!(tag = self.tag.0, key = %key, error = %e, "attribute rejected");
                rejected.push(key);
                first_error.get_or_insert(e);
            }
        }

        if !rejected.is_empty() {
            let mut inner = self.inner.lock();
            let stored = Arc::make_mut(&mut inner.props);
            for key in rejected {
                match old.values.get(&key) {
                    Some(value) => {
                        stored.values.insert(key, value.clone());
                    }
                    None => {
                        stored.values.remove(&key);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    pub fn props(&self) -> Arc<Props> {
        Arc::clone(&self.inner.lock().props)
    }

    pub fn set_state(&self, state: Option<Arc<Value>>) {
        self.inner.lock().state = state;
    }

    pub fn state(&self) -> Option<Arc<Value>> {
        self.inner.lock().state.clone()
    }

    pub fn set_layout(&self, layout: LayoutMetrics) {
        let mut inner = self.inner.lock();
        if inner.layout != layout {
            inner.layout = layout;
            inner.layout_dirty = true;
        }
    }

    pub fn layout(&self) -> LayoutMetrics {
        self.inner.lock().layout
    }

    pub fn set_event_emitter(&self, emitter: Option<EventEmitterId>) {
        self.inner.lock().event_emitter = emitter;
    }

    pub fn event_emitter(&self) -> Option<EventEmitterId> {
        self.inner.lock().event_emitter
    }

    /// Keys in this set are skipped by later prop updates
    pub fn set_ignored_prop_keys(&self, keys: HashSet<String>) {
        self.inner.lock().ignored_prop_keys = keys;
    }

    pub fn ignored_prop_keys(&self) -> HashSet<String> {
        self.inner.lock().ignored_prop_keys.clone()
    }

    /// Commit pending layout to the native node
    pub fn finalize_updates(&self) -> Result<()> {
        let pending = {
            let mut inner = self.inner.lock();
            inner.finalize_count += 1;
            std::mem::take(&mut inner.layout_dirty).then_some(inner.layout)
        };

        if let Some(layout) = pending {
            let frame = layout.frame;
            check_status(
                "setMeasuredSize",
                self.api.set_measured_size(
                    self.node,
                    frame.width.round() as i32,
                    frame.height.round() as i32,
                ),
            )?;
            check_status(
                "setAttribute",
                self.api
                    .set_attribute(self.node, "position", &json!({ "x": frame.x, "y": frame.y })),
            )?;
        }
        Ok(())
    }

    pub fn finalize_count(&self) -> u32 {
        self.inner.lock().finalize_count
    }

    pub fn handle_command(&self, name: &str, args: &Value) {
        debug!(tag = self.tag.0, command = name, "component command");
        self.inner
            .lock()
            .commands
            .push((name.to_string(), args.clone()));
    }

    pub fn take_commands(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut self.inner.lock().commands)
    }

    pub fn set_is_js_responder(&self, is_js_responder: bool) {
        self.inner.lock().js_responder = is_js_responder;
    }

    pub fn is_js_responder(&self) -> bool {
        self.inner.lock().js_responder
    }

    pub fn set_native_responder_blocked(&self, blocked: bool) {
        self.inner.lock().native_responder_blocked = blocked;
    }

    pub fn is_native_responder_blocked(&self) -> bool {
        self.inner.lock().native_responder_blocked
    }
}

impl Drop for ComponentInstance {
    fn drop(&mut self) {
        self.api.dispose_node(self.node);
    }
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("tag", &self.tag)
            .field("component", &self.component_name)
            .field("node", &self.node)
            .finish()
    }
}
