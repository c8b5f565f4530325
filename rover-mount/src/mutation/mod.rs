pub mod classify;

use crate::instance::BuiltinComponent;
use serde_json::{Map, Value};
use smartstring::{LazyCompact, SmartString};
use std::sync::Arc;
use std::time::Instant;

/// Stable identifier of one logical UI node, assigned by the diff engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Tag(pub i32);

impl Tag {
    /// Tag carried by an empty shadow view
    pub const NONE: Tag = Tag(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SurfaceId(pub i32);

impl SurfaceId {
    /// Root tags of surfaces are reserved as `n * 10 + 1`
    pub fn from_root_tag(tag: Tag) -> Option<Self> {
        if tag.0 % 10 == 1 {
            Some(SurfaceId(tag.0))
        } else {
            None
        }
    }
}

/// Type identity of a component, stable for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentHandle(pub u64);

pub type ComponentName = SmartString<LazyCompact>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventEmitterId(pub u64);

/// Props snapshot for one view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    /// External id used for name-based lookup; empty when unset
    pub native_id: String,
    pub values: Map<String, Value>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native_id(mut self, id: impl Into<String>) -> Self {
        self.native_id = id.into();
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutMetrics {
    pub frame: Frame,
}

impl LayoutMetrics {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            frame: Frame {
                x,
                y,
                width,
                height,
            },
        }
    }
}

/// Lightweight snapshot of a shadow node as seen by one mutation
#[derive(Debug, Clone, Default)]
pub struct ShadowView {
    pub tag: Tag,
    pub component_handle: ComponentHandle,
    pub component_name: ComponentName,
    pub props: Arc<Props>,
    pub state: Option<Arc<Value>>,
    pub layout: LayoutMetrics,
    pub event_emitter: Option<EventEmitterId>,
}

impl ShadowView {
    pub fn new(tag: Tag, component_handle: ComponentHandle, component_name: &str) -> Self {
        Self {
            tag,
            component_handle,
            component_name: component_name.into(),
            ..Self::default()
        }
    }

    /// Snapshot of a built-in component
    pub fn builtin(component: BuiltinComponent, tag: i32) -> Self {
        Self::new(Tag(tag), component.handle(), component.name())
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = Arc::new(props);
        self
    }

    pub fn with_layout(mut self, layout: LayoutMetrics) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(Arc::new(state));
        self
    }

    pub fn with_event_emitter(mut self, emitter: EventEmitterId) -> Self {
        self.event_emitter = Some(emitter);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Delete,
    Insert,
    Remove,
    Update,
    RemoveDeleteTree,
}

impl MutationKind {
    pub fn name(self) -> &'static str {
        match self {
            MutationKind::Create => "CREATE",
            MutationKind::Delete => "DELETE",
            MutationKind::Insert => "INSERT",
            MutationKind::Remove => "REMOVE",
            MutationKind::Update => "UPDATE",
            MutationKind::RemoveDeleteTree => "REMOVE_DELETE_TREE",
        }
    }
}

/// One tree-mutation instruction. Pure data; owns no node.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub kind: MutationKind,
    pub parent: ShadowView,
    pub old_child: ShadowView,
    pub new_child: ShadowView,
    pub index: usize,
}

impl Mutation {
    pub fn create(view: ShadowView) -> Self {
        Self {
            kind: MutationKind::Create,
            parent: ShadowView::default(),
            old_child: ShadowView::default(),
            new_child: view,
            index: 0,
        }
    }

    pub fn delete(view: ShadowView) -> Self {
        Self {
            kind: MutationKind::Delete,
            parent: ShadowView::default(),
            old_child: view,
            new_child: ShadowView::default(),
            index: 0,
        }
    }

    pub fn insert(parent: ShadowView, child: ShadowView, index: usize) -> Self {
        Self {
            kind: MutationKind::Insert,
            parent,
            old_child: ShadowView::default(),
            new_child: child,
            index,
        }
    }

    pub fn remove(parent: ShadowView, child: ShadowView, index: usize) -> Self {
        Self {
            kind: MutationKind::Remove,
            parent,
            old_child: child,
            new_child: ShadowView::default(),
            index,
        }
    }

    pub fn update(old: ShadowView, new: ShadowView) -> Self {
        Self {
            kind: MutationKind::Update,
            parent: ShadowView::default(),
            old_child: old,
            new_child: new,
            index: 0,
        }
    }

    pub fn remove_delete_tree(parent: ShadowView, child: ShadowView, index: usize) -> Self {
        Self {
            kind: MutationKind::RemoveDeleteTree,
            parent,
            old_child: child,
            new_child: ShadowView::default(),
            index,
        }
    }

    pub fn is_create(&self) -> bool {
        self.kind == MutationKind::Create
    }
}

pub type MutationList = Vec<Mutation>;

/// Timestamps recorded by the commit pipeline for one transaction
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionTelemetry {
    pub commit_start: Option<Instant>,
    pub commit_end: Option<Instant>,
    pub diff_start: Option<Instant>,
    pub diff_end: Option<Instant>,
    pub layout_start: Option<Instant>,
    pub layout_end: Option<Instant>,
}

impl TransactionTelemetry {
    pub fn commit_ms(&self) -> Option<f64> {
        span_ms(self.commit_start, self.commit_end)
    }

    pub fn diff_ms(&self) -> Option<f64> {
        span_ms(self.diff_start, self.diff_end)
    }

    pub fn layout_ms(&self) -> Option<f64> {
        span_ms(self.layout_start, self.layout_end)
    }
}

fn span_ms(start: Option<Instant>, end: Option<Instant>) -> Option<f64> {
    let (start, end) = (start?, end?);
    Some(end.checked_duration_since(start)?.as_secs_f64() * 1000.0)
}

/// Ordered mutations produced by one commit; consumed exactly once
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub surface_id: SurfaceId,
    pub mutations: MutationList,
    pub telemetry: TransactionTelemetry,
}

impl Transaction {
    pub fn new(surface_id: SurfaceId, mutations: MutationList) -> Self {
        Self {
            surface_id,
            mutations,
            telemetry: TransactionTelemetry::default(),
        }
    }
}
