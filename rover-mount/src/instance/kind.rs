use crate::mutation::ComponentHandle;
use crate::native::NodeType;

/// Components shipped with the renderer, each with a fixed handle and name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinComponent {
    Root,
    View,
    Paragraph,
    Text,
    RawText,
    Image,
    ScrollView,
    TextInput,
    Switch,
    PullToRefreshView,
    ActivityIndicatorView,
    ModalHostView,
}

impl BuiltinComponent {
    pub const ALL: [BuiltinComponent; 12] = [
        BuiltinComponent::Root,
        BuiltinComponent::View,
        BuiltinComponent::Paragraph,
        BuiltinComponent::Text,
        BuiltinComponent::RawText,
        BuiltinComponent::Image,
        BuiltinComponent::ScrollView,
        BuiltinComponent::TextInput,
        BuiltinComponent::Switch,
        BuiltinComponent::PullToRefreshView,
        BuiltinComponent::ActivityIndicatorView,
        BuiltinComponent::ModalHostView,
    ];

    pub fn handle(self) -> ComponentHandle {
        ComponentHandle(self as u64 + 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            BuiltinComponent::Root => "RootView",
            BuiltinComponent::View => "View",
            BuiltinComponent::Paragraph => "Paragraph",
            BuiltinComponent::Text => "Text",
            BuiltinComponent::RawText => "RawText",
            BuiltinComponent::Image => "Image",
            BuiltinComponent::ScrollView => "ScrollView",
            BuiltinComponent::TextInput => "TextInput",
            BuiltinComponent::Switch => "Switch",
            BuiltinComponent::PullToRefreshView => "PullToRefreshView",
            BuiltinComponent::ActivityIndicatorView => "ActivityIndicatorView",
            BuiltinComponent::ModalHostView => "ModalHostView",
        }
    }

    pub fn from_handle(handle: ComponentHandle) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.handle() == handle)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Constructors of these components never touch the live tree, so they
    /// may run on worker threads.
    pub fn is_parallel_safe(self) -> bool {
        !matches!(self, BuiltinComponent::ModalHostView)
    }
}

/// Closed set of component behaviors backing a [`ComponentInstance`](super::ComponentInstance)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Builtin(BuiltinComponent),
    /// Third-party or adapter-backed component rendered into a custom node
    Custom,
}

impl ComponentKind {
    pub fn node_type(self) -> NodeType {
        match self {
            ComponentKind::Builtin(builtin) => match builtin {
                BuiltinComponent::Root
                | BuiltinComponent::View
                | BuiltinComponent::ModalHostView => NodeType::Stack,
                BuiltinComponent::Paragraph | BuiltinComponent::Text => NodeType::Text,
                BuiltinComponent::RawText => NodeType::Span,
                BuiltinComponent::Image => NodeType::Image,
                BuiltinComponent::ScrollView => NodeType::Scroll,
                BuiltinComponent::TextInput => NodeType::TextInput,
                BuiltinComponent::Switch => NodeType::Toggle,
                BuiltinComponent::PullToRefreshView => NodeType::Refresh,
                BuiltinComponent::ActivityIndicatorView => NodeType::LoadingProgress,
            },
            ComponentKind::Custom => NodeType::Custom,
        }
    }

    pub fn accepts_children(self) -> bool {
        !matches!(
            self,
            ComponentKind::Builtin(
                BuiltinComponent::RawText
                    | BuiltinComponent::Image
                    | BuiltinComponent::TextInput
                    | BuiltinComponent::Switch
                    | BuiltinComponent::ActivityIndicatorView
            )
        )
    }

    pub fn is_modal(self) -> bool {
        self == ComponentKind::Builtin(BuiltinComponent::ModalHostView)
    }
}
