use crate::mutation::Tag;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MountError {
    #[error("no component instance could be created for `{component}` (tag {tag:?})")]
    InstanceUnavailable { tag: Tag, component: String },

    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    #[error("component `{component}` (tag {parent:?}) does not accept children")]
    ChildrenUnsupported { parent: Tag, component: String },

    #[error(transparent)]
    NodeApi(#[from] NodeApiError),

    #[error("panicked while mounting: {0}")]
    Panicked(String),

    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),

    #[error("invalid mounting config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MountError>;

/// Non-zero status returned by the native node capability surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("native `{call}` failed with status {code}")]
pub struct NodeApiError {
    pub call: &'static str,
    pub code: i32,
}

/// Render a caught panic payload as text for logging
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
