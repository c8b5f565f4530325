use super::{NativeNodeApi, NodeHandle, NodeType, STATUS_OK};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One recorded call against the native surface
#[derive(Debug, Clone, PartialEq)]
pub enum NodeCall {
    Create {
        node: NodeHandle,
        node_type: NodeType,
    },
    Dispose {
        node: NodeHandle,
    },
    SetAttribute {
        node: NodeHandle,
        key: String,
        value: Value,
    },
    ResetAttribute {
        node: NodeHandle,
        key: String,
    },
    InsertChildAt {
        parent: NodeHandle,
        child: NodeHandle,
        index: i32,
    },
    AddChild {
        parent: NodeHandle,
        child: NodeHandle,
    },
    RemoveChild {
        parent: NodeHandle,
        child: NodeHandle,
    },
    SetMeasuredSize {
        node: NodeHandle,
        width: i32,
        height: i32,
    },
}

#[derive(Default)]
struct NodeTree {
    types: HashMap<NodeHandle, NodeType>,
    children: HashMap<NodeHandle, Vec<NodeHandle>>,
    attributes: HashMap<NodeHandle, HashMap<String, Value>>,
    sizes: HashMap<NodeHandle, (i32, i32)>,
}

/// In-memory native surface for headless hosts and tests.
///
/// Keeps a mirror of the native tree and records every call. Individual
/// calls can be forced to return a status code with [`RecordingNodeApi::fail_call`].
pub struct RecordingNodeApi {
    next_handle: AtomicU64,
    calls: Mutex<Vec<NodeCall>>,
    tree: Mutex<NodeTree>,
    forced_status: Mutex<HashMap<&'static str, i32>>,
}

impl RecordingNodeApi {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            tree: Mutex::new(NodeTree::default()),
            forced_status: Mutex::new(HashMap::new()),
        }
    }

    /// Force every later `call` (e.g. "setAttribute") to return `code`.
    /// For "createNode" any non-zero code makes creation return `None`.
    pub fn fail_call(&self, call: &'static str, code: i32) {
        self.forced_status.lock().insert(call, code);
    }

    pub fn clear_failures(&self) {
        self.forced_status.lock().clear();
    }

    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().clone()
    }

    pub fn take_calls(&self) -> Vec<NodeCall> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn children_of(&self, node: NodeHandle) -> Vec<NodeHandle> {
        self.tree
            .lock()
            .children
            .get(&node)
            .cloned()
            .unwrap_or_default()
    }

    pub fn node_type(&self, node: NodeHandle) -> Option<NodeType> {
        self.tree.lock().types.get(&node).copied()
    }

    pub fn attribute(&self, node: NodeHandle, key: &str) -> Option<Value> {
        self.tree
            .lock()
            .attributes
            .get(&node)
            .and_then(|attrs| attrs.get(key))
            .cloned()
    }

    pub fn measured_size(&self, node: NodeHandle) -> Option<(i32, i32)> {
        self.tree.lock().sizes.get(&node).copied()
    }

    pub fn live_nodes(&self) -> usize {
        self.tree.lock().types.len()
    }

    fn status(&self, call: &'static str) -> i32 {
        self.forced_status
            .lock()
            .get(call)
            .copied()
            .unwrap_or(STATUS_OK)
    }

    fn record(&self, call: NodeCall) {
        self.calls.lock().push(call);
    }
}

impl Default for RecordingNodeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeNodeApi for RecordingNodeApi {
    fn create_node(&self, node_type: NodeType) -> Option<NodeHandle> {
        if self.status("createNode") != STATUS_OK {
            return None;
        }
        let node = NodeHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.tree.lock().types.insert(node, node_type);
        self.record(NodeCall::Create { node, node_type });
        Some(node)
    }

    fn dispose_node(&self, node: NodeHandle) {
        {
            let mut tree = self.tree.lock();
            tree.types.remove(&node);
            tree.children.remove(&node);
            tree.attributes.remove(&node);
            tree.sizes.remove(&node);
        }
        self.record(NodeCall::Dispose { node });
    }

    fn set_attribute(&self, node: NodeHandle, key: &str, value: &Value) -> i32 {
        let status = self.status("setAttribute");
        if status == STATUS_OK {
            self.tree
                .lock()
                .attributes
                .entry(node)
                .or_default()
                .insert(key.to_string(), value.clone());
        }
        self.record(NodeCall::SetAttribute {
            node,
            key: key.to_string(),
            value: value.clone(),
        });
        status
    }

    fn reset_attribute(&self, node: NodeHandle, key: &str) -> i32 {
        let status = self.status("resetAttribute");
        if status == STATUS_OK {
            if let Some(attrs) = self.tree.lock().attributes.get_mut(&node) {
                attrs.remove(key);
            }
        }
        self.record(NodeCall::ResetAttribute {
            node,
            key: key.to_string(),
        });
        status
    }

    fn insert_child_at(&self, parent: NodeHandle, child: NodeHandle, index: i32) -> i32 {
        let status = self.status("insertChildAt");
        if status == STATUS_OK {
            let mut tree = self.tree.lock();
            let children = tree.children.entry(parent).or_default();
            let at = (index.max(0) as usize).min(children.len());
            children.insert(at, child);
        }
        self.record(NodeCall::InsertChildAt {
            parent,
            child,
            index,
        });
        status
    }

    fn add_child(&self, parent: NodeHandle, child: NodeHandle) -> i32 {
        let status = self.status("addChild");
        if status == STATUS_OK {
            self.tree.lock().children.entry(parent).or_default().push(child);
        }
        self.record(NodeCall::AddChild { parent, child });
        status
    }

    fn remove_child(&self, parent: NodeHandle, child: NodeHandle) -> i32 {
        let status = self.status("removeChild");
        if status == STATUS_OK {
            if let Some(children) = self.tree.lock().children.get_mut(&parent) {
                children.retain(|c| *c != child);
            }
        }
        self.record(NodeCall::RemoveChild { parent, child });
        status
    }

    fn set_measured_size(&self, node: NodeHandle, width: i32, height: i32) -> i32 {
        let status = self.status("setMeasuredSize");
        if status == STATUS_OK {
            self.tree.lock().sizes.insert(node, (width, height));
        }
        self.record(NodeCall::SetMeasuredSize {
            node,
            width,
            height,
        });
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_tree_operations() {
        let api = RecordingNodeApi::new();
        let parent = api.create_node(NodeType::Stack).unwrap();
        let a = api.create_node(NodeType::Text).unwrap();
        let b = api.create_node(NodeType::Image).unwrap();

        assert_eq!(api.insert_child_at(parent, a, 0), STATUS_OK);
        assert_eq!(api.insert_child_at(parent, b, 0), STATUS_OK);
        assert_eq!(api.children_of(parent), vec![b, a]);

        assert_eq!(api.remove_child(parent, b), STATUS_OK);
        assert_eq!(api.children_of(parent), vec![a]);
        assert_eq!(api.node_type(b), Some(NodeType::Image));
        assert_eq!(api.calls().len(), 6);
    }

    #[test]
    fn test_forced_failure() {
        let api = RecordingNodeApi::new();
        let node = api.create_node(NodeType::Stack).unwrap();

        api.fail_call("setAttribute", 401);
        assert_eq!(api.set_attribute(node, "opacity", &Value::from(1)), 401);
        assert!(api.attribute(node, "opacity").is_none());

        api.clear_failures();
        assert_eq!(api.set_attribute(node, "opacity", &Value::from(1)), STATUS_OK);
        assert_eq!(api.attribute(node, "opacity"), Some(Value::from(1)));

        api.fail_call("createNode", -1);
        assert!(api.create_node(NodeType::Text).is_none());
    }

    #[test]
    fn test_dispose_forgets_node() {
        let api = RecordingNodeApi::new();
        let node = api.create_node(NodeType::Stack).unwrap();
        api.set_measured_size(node, 10, 20);
        assert_eq!(api.measured_size(node), Some((10, 20)));
        assert_eq!(api.live_nodes(), 1);

        api.dispose_node(node);
        assert_eq!(api.live_nodes(), 0);
        assert!(api.measured_size(node).is_none());
    }
}
