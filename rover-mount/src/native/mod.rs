mod stub;

pub use stub::{NodeCall, RecordingNodeApi};

use crate::error::NodeApiError;
use serde_json::Value;

pub const STATUS_OK: i32 = 0;
/// The attribute or event is not supported by this node type
pub const STATUS_ATTRIBUTE_NOT_SUPPORTED: i32 = 106102;
/// The operation is not supported for this kind of node
pub const STATUS_NOT_SUPPORTED_FOR_NODE: i32 = 106103;

/// Opaque handle of a native node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

/// Native node types backing the component kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Stack,
    Text,
    Span,
    Image,
    Scroll,
    TextInput,
    Toggle,
    Refresh,
    LoadingProgress,
    Custom,
}

/// Capability surface of the retained native UI toolkit.
///
/// Every call except `create_node` and `dispose_node` returns a raw status
/// code; callers map it through [`check_status`].
pub trait NativeNodeApi: Send + Sync {
    /// Returns `None` when the toolkit could not allocate the node
    fn create_node(&self, node_type: NodeType) -> Option<NodeHandle>;

    fn dispose_node(&self, node: NodeHandle);

    fn set_attribute(&self, node: NodeHandle, key: &str, value: &Value) -> i32;

    fn reset_attribute(&self, node: NodeHandle, key: &str) -> i32;

    fn insert_child_at(&self, parent: NodeHandle, child: NodeHandle, index: i32) -> i32;

    fn add_child(&self, parent: NodeHandle, child: NodeHandle) -> i32;

    fn remove_child(&self, parent: NodeHandle, child: NodeHandle) -> i32;

    fn set_measured_size(&self, node: NodeHandle, width: i32, height: i32) -> i32;
}

/// Map a native status code: "unsupported for this node kind" is only a
/// warning, every other non-zero code is an error.
pub fn check_status(call: &'static str, code: i32) -> Result<(), NodeApiError> {
    match code {
        STATUS_OK => Ok(()),
        STATUS_ATTRIBUTE_NOT_SUPPORTED | STATUS_NOT_SUPPORTED_FOR_NODE => {
            tracing::warn!(call, code, "native call not supported for this node");
            Ok(())
        }
        code => Err(NodeApiError { call, code }),
    }
}
