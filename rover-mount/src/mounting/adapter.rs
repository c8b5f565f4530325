use crate::mutation::{Frame, Mutation, MutationKind, MutationList, ShadowView};
use serde_json::Value;

/// Downstream renderer mirroring components it manages itself
pub trait MountingAdapter: Send + Sync {
    fn do_mount(&self, mutations: &[Mutation]);

    fn did_mount(&self, mutations: &[Mutation]);

    fn dispatch_command(&self, view: &ShadowView, command: &str, args: &Value);

    fn set_is_js_responder(
        &self,
        view: &ShadowView,
        is_js_responder: bool,
        block_native_responder: bool,
    );
}

/// One-way message bus to the host UI layer
pub trait MessageChannel: Send + Sync {
    fn post_message(&self, name: &str, payload: Value);
}

/// Mutations the adapter cares about: those touching at least one managed
/// view. The adapter positions its own views, so frame origins are reset.
pub(crate) fn valid_adapter_mutations(
    mutations: &[Mutation],
    is_managed: impl Fn(&ShadowView) -> bool,
) -> MutationList {
    mutations
        .iter()
        .filter(|m| m.kind != MutationKind::RemoveDeleteTree)
        .filter(|m| is_managed(&m.parent) || is_managed(&m.old_child) || is_managed(&m.new_child))
        .map(|m| {
            let mut mutation = m.clone();
            let size = mutation.new_child.layout.frame;
            mutation.new_child.layout.frame = Frame {
                x: 0.0,
                y: 0.0,
                ..size
            };
            mutation
        })
        .collect()
}
