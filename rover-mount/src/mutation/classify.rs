//! Stateless inspection of single mutations, used to size and fence batches.

use super::{Mutation, MutationKind, Tag};
use crate::config::CostWeights;

/// Rough cost of applying a mutation on the UI thread.
///
/// Create is 0 because Creates are scheduled separately from everything else.
pub fn cost(mutation: &Mutation, weights: &CostWeights) -> i32 {
    match mutation.kind {
        MutationKind::Create => 0,
        MutationKind::Insert => weights.insert,
        MutationKind::Remove => weights.remove,
        MutationKind::Delete => weights.delete,
        MutationKind::Update | MutationKind::RemoveDeleteTree => weights.default,
    }
}

/// The tag a mutation acts on
pub fn target_tag(mutation: &Mutation) -> Tag {
    match mutation.kind {
        MutationKind::Create | MutationKind::Insert | MutationKind::Update => {
            mutation.new_child.tag
        }
        MutationKind::Remove | MutationKind::Delete => mutation.old_child.tag,
        MutationKind::RemoveDeleteTree => {
            if mutation.old_child.tag.is_none() {
                mutation.new_child.tag
            } else {
                mutation.old_child.tag
            }
        }
    }
}

/// Insert and Remove reference a parent and may be grouped by it
pub fn is_structural_with_parent(mutation: &Mutation) -> bool {
    matches!(mutation.kind, MutationKind::Insert | MutationKind::Remove)
}

/// Both mutations are structural and share the same parent
pub fn same_parent_run(current: &Mutation, next: &Mutation) -> bool {
    is_structural_with_parent(current)
        && is_structural_with_parent(next)
        && current.parent.tag == next.parent.tag
}
