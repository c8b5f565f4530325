//! Cost-balanced split of non-Create mutations across two frames.

use crate::config::SplitConfig;
use crate::mutation::classify::{cost, same_parent_run, target_tag};
use crate::mutation::{Mutation, MutationKind, MutationList, Tag};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// `batch_a` runs this frame, `batch_b` on the next vsync.
/// When `enabled` is false everything is in `batch_a`.
#[derive(Debug, Clone, Default)]
pub struct SplitPlan {
    pub enabled: bool,
    pub batch_a: MutationList,
    pub batch_b: MutationList,
}

#[derive(Debug, Clone, Copy)]
struct Group {
    end: usize,
    cost: i32,
}

/// Split `mutations` into two batches, or keep them whole when splitting
/// would not pay off or no legal boundary exists.
pub fn split_non_create(mutations: &[Mutation], config: &SplitConfig) -> SplitPlan {
    match split_index(mutations, config) {
        Some(index) => SplitPlan {
            enabled: true,
            batch_a: mutations[..index].to_vec(),
            batch_b: mutations[index..].to_vec(),
        },
        None => SplitPlan {
            enabled: false,
            batch_a: mutations.to_vec(),
            batch_b: Vec::new(),
        },
    }
}

/// Index of the first mutation of the second batch.
///
/// A boundary never falls inside a Remove..Insert move of one tag, nor
/// between an Insert and the last Update of that tag. Same-parent
/// Insert/Remove runs stay together until the running group cost reaches the
/// soft break cost.
pub fn split_index(mutations: &[Mutation], config: &SplitConfig) -> Option<usize> {
    let n = mutations.len();
    let weights = &config.weights;

    let mut last_insert: HashMap<Tag, usize> = HashMap::with_capacity(n);
    let mut last_update: HashMap<Tag, usize> = HashMap::with_capacity(n);
    let mut quick_total = 0;
    for (i, mutation) in mutations.iter().enumerate() {
        quick_total += cost(mutation, weights);
        match mutation.kind {
            MutationKind::Insert => {
                last_insert.insert(target_tag(mutation), i);
            }
            MutationKind::Update => {
                last_update.insert(target_tag(mutation), i);
            }
            _ => {}
        }
    }

    if n < config.min_count && quick_total < config.min_cost {
        return None;
    }

    let mut groups: SmallVec<[Group; 16]> = SmallVec::new();
    let mut group_start = 0;
    let mut group_cost = 0;
    let mut open_moves: HashSet<Tag> = HashSet::new();
    // tag -> index of the Update that closes its init fence
    let mut pending_init: HashMap<Tag, usize> = HashMap::new();

    for (i, mutation) in mutations.iter().enumerate() {
        group_cost += cost(mutation, weights);
        let tag = target_tag(mutation);

        match mutation.kind {
            MutationKind::Remove => {
                if last_insert.get(&tag).is_some_and(|&j| j > i) {
                    open_moves.insert(tag);
                }
                pending_init.remove(&tag);
            }
            MutationKind::Insert => {
                open_moves.remove(&tag);
                if let Some(&k) = last_update.get(&tag) {
                    if k > i {
                        pending_init.insert(tag, k);
                    }
                }
            }
            MutationKind::Update => {
                if pending_init.get(&tag) == Some(&i) {
                    pending_init.remove(&tag);
                }
            }
            MutationKind::Delete => {
                open_moves.remove(&tag);
                pending_init.remove(&tag);
            }
            MutationKind::Create | MutationKind::RemoveDeleteTree => {}
        }

        let Some(next) = mutations.get(i + 1) else {
            break;
        };
        let boundary_allowed = open_moves.is_empty()
            && pending_init.is_empty()
            && (!same_parent_run(mutation, next)
                || group_cost >= config.soft_same_parent_break_cost);
        if boundary_allowed {
            groups.push(Group {
                end: i + 1,
                cost: group_cost,
            });
            group_start = i + 1;
            group_cost = 0;
        }
    }
    if group_start < n {
        groups.push(Group {
            end: n,
            cost: group_cost,
        });
    }

    if groups.len() <= 1 {
        return None;
    }
    let total: i32 = groups.iter().map(|g| g.cost).sum();
    if total < config.min_cost {
        return None;
    }

    let target = total / 2;
    let mut best = 0;
    let mut best_diff = i32::MAX;
    let mut prefix = 0;
    for k in 1..groups.len() {
        prefix += groups[k - 1].cost;
        let diff = (prefix - target).abs();
        // Strict comparison keeps the earliest boundary on ties
        if diff < best_diff {
            best_diff = diff;
            best = k;
        }
    }

    let index = groups[best - 1].end;
    if index > 0 && index < n {
        return Some(index);
    }
    (n >= 2).then(|| (n / 2).clamp(1, n - 1))
}
