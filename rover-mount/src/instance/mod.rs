mod component;
mod kind;
mod provider;
mod registry;

pub use component::ComponentInstance;
pub use kind::{BuiltinComponent, ComponentKind};
pub use provider::{
    ComponentFactory, ComponentInstanceProvider, DefaultInstanceProvider, NativeComponentFactory,
};
pub use registry::InstanceRegistry;
