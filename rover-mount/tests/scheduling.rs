//! End-to-end scheduling: transactions go through the delegate, the main
//! thread is pumped by hand and vsync is fired by hand.

mod common;

use common::{Harness, text, tree, view, with_opacity};
use rover_mount::config::{LoadWindowConfig, MountingConfig, RuntimeCapabilities};
use rover_mount::instance::BuiltinComponent;
use rover_mount::mutation::Props;
use rover_mount::native::NodeCall;
use rover_mount::prealloc::PreallocationRequest;
use rover_mount::{Mutation, SurfaceId, Tag};
use serde_json::{Value, json};
use std::sync::Arc;

fn parallel() -> RuntimeCapabilities {
    RuntimeCapabilities::detect(21, true)
}

/// Load window that is already over on the first transaction
fn no_load_window() -> MountingConfig {
    MountingConfig {
        load_window: LoadWindowConfig {
            window_ms: 0,
            max_transactions: 0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn opacity_of(h: &Harness, tag: i32) -> Option<Value> {
    let instance = h.manager.find_by_tag(Tag(tag))?;
    h.api.attribute(instance.node(), "opacity")
}

fn opacity_updates(tags: std::ops::Range<i32>, opacity: i64) -> Vec<Mutation> {
    tags.map(|t| Mutation::update(view(t), with_opacity(view(t), opacity)))
        .collect()
}

#[test]
fn test_serial_path_fragments_creates() {
    let h = Harness::new(RuntimeCapabilities::serial());
    h.commit(11, tree(11, 100..250));

    // do_mount, 151 creates in fragments of 70, the rest, clearing preallocated views
    assert_eq!(h.main.len(), 6);
    assert!(h.manager.find_by_tag(Tag(11)).is_none());

    assert_eq!(h.pump(), 6);
    let root = h.manager.find_by_tag(Tag(11)).unwrap();
    assert_eq!(root.child_tags().len(), 150);
    assert_eq!(h.api.children_of(root.node()).len(), 150);
    assert_eq!(h.vsync.pending_requests(), 0);
}

#[test]
fn test_every_touched_instance_finalized_once() {
    let h = Harness::new(RuntimeCapabilities::serial());
    h.commit(11, tree(11, 100..110));
    h.pump();

    let root = h.manager.find_by_tag(Tag(11)).unwrap();
    assert_eq!(root.finalize_count(), 1);
    for tag in 100..110 {
        assert_eq!(h.manager.find_by_tag(Tag(tag)).unwrap().finalize_count(), 1);
    }
}

#[test]
fn test_parallel_creates_join_before_commit_returns() {
    let h = Harness::new(parallel());
    h.commit(11, tree(11, 100..200));

    // Creates already ran on workers; the tree is not linked yet
    assert_eq!(h.manager.registry().len(), 101);
    let root = h.manager.find_by_tag(Tag(11)).unwrap();
    assert!(root.child_tags().is_empty());

    h.pump();
    assert_eq!(root.child_tags().len(), 100);
    assert_eq!(
        root.child_tags(),
        (100..200).map(Tag).collect::<Vec<_>>()
    );
}

#[test]
fn test_initial_load_is_never_split() {
    let h = Harness::new(parallel());
    h.commit(11, tree(11, 100..200));

    // do_mount, main-thread creates, the rest, clearing preallocated views
    assert_eq!(h.pump(), 4);
    assert_eq!(h.vsync.pending_requests(), 0);

    h.commit(11, opacity_updates(100..200, 1));
    h.pump();
    assert_eq!(h.vsync.pending_requests(), 0);
    assert!((100..200).all(|t| opacity_of(&h, t) == Some(json!(1))));
}

#[test]
fn test_large_batch_tail_waits_for_next_frame() {
    let h = Harness::with_config(parallel(), no_load_window());
    h.commit(11, tree(11, 100..200));
    h.pump();
    h.next_frame();
    let root = h.manager.find_by_tag(Tag(11)).unwrap();
    assert_eq!(root.child_tags().len(), 100);
    assert_eq!(root.finalize_count(), 1);

    h.commit(11, opacity_updates(100..200, 1));
    h.pump();

    let updated: Vec<i32> = (100..200)
        .filter(|&t| opacity_of(&h, t).is_some())
        .collect();
    assert_eq!(updated, (100..150).collect::<Vec<_>>());
    assert_eq!(h.vsync.pending_requests(), 1);
    // Nothing is finalized until the tail lands
    assert_eq!(h.manager.find_by_tag(Tag(120)).unwrap().finalize_count(), 1);

    assert_eq!(h.next_frame(), 1);
    assert!((100..200).all(|t| opacity_of(&h, t) == Some(json!(1))));
    assert_eq!(h.manager.find_by_tag(Tag(120)).unwrap().finalize_count(), 2);
    assert_eq!(h.manager.find_by_tag(Tag(180)).unwrap().finalize_count(), 2);
}

#[test]
fn test_insert_run_split_keeps_order() {
    let h = Harness::with_config(parallel(), no_load_window());
    h.commit(11, tree(11, 100..200));
    h.pump();

    let root = h.manager.find_by_tag(Tag(11)).unwrap();
    let first_frame = root.child_tags();
    assert!(!first_frame.is_empty() && first_frame.len() < 100);
    assert_eq!(
        first_frame,
        (100..100 + first_frame.len() as i32).map(Tag).collect::<Vec<_>>()
    );

    h.next_frame();
    assert_eq!(
        root.child_tags(),
        (100..200).map(Tag).collect::<Vec<_>>()
    );
}

#[test]
fn test_surface_zero_is_split_immediately() {
    let h = Harness::new(parallel());
    h.commit(0, tree(11, 100..200));
    h.pump();
    assert_eq!(h.vsync.pending_requests(), 1);

    h.next_frame();
    let root = h.manager.find_by_tag(Tag(11)).unwrap();
    assert_eq!(root.child_tags().len(), 100);
}

#[test]
fn test_tails_of_two_transactions_share_one_frame() {
    let h = Harness::new(parallel());
    h.commit(11, tree(11, 100..200));
    h.pump();

    h.commit(0, opacity_updates(100..200, 1));
    h.commit(0, opacity_updates(100..200, 2));
    assert_eq!(h.vsync.pending_requests(), 1);
    assert_eq!(h.frames.pending_len(), 2);

    h.pump();
    assert_eq!(opacity_of(&h, 120), Some(json!(2)));
    assert_eq!(opacity_of(&h, 180), None);

    h.next_frame();
    assert!((100..200).all(|t| opacity_of(&h, t) == Some(json!(2))));
    assert_eq!(h.vsync.pending_requests(), 0);
}

#[test]
fn test_preliminary_allocation_is_claimed_by_create() {
    let h = Harness::new(RuntimeCapabilities::serial());
    let props = Props::new().with("color", json!("red"));

    h.delegate.scheduler_did_request_preliminary_view_allocation(
        SurfaceId(11),
        PreallocationRequest {
            tag: Tag(100),
            component_handle: BuiltinComponent::Text.handle(),
            component_name: BuiltinComponent::Text.name().into(),
            props: Arc::new(props.clone()),
        },
    );
    assert!(h.provider.has_pending_pull());
    assert_eq!(h.queue.len(), 1);

    assert_eq!(h.provider.process_pending_requests(), 1);
    assert_eq!(h.provider.preallocated_count(), 1);
    assert_eq!(h.api.live_nodes(), 1);

    h.commit(
        11,
        vec![
            Mutation::create(view(11)),
            Mutation::create(text(100).with_props(props)),
            Mutation::insert(view(11), text(100), 0),
        ],
    );
    h.pump();

    // Only the root needed a new node
    assert_eq!(h.api.live_nodes(), 2);
    assert_eq!(h.provider.preallocated_count(), 0);
    let color_writes = h
        .api
        .calls()
        .into_iter()
        .filter(|call| matches!(call, NodeCall::SetAttribute { key, .. } if key == "color"))
        .count();
    assert_eq!(color_writes, 1);
}

#[test]
fn test_claimed_preallocation_keeps_native_id() {
    let h = Harness::new(RuntimeCapabilities::serial());
    let props = Props::new().with_native_id("header");

    h.delegate.scheduler_did_request_preliminary_view_allocation(
        SurfaceId(11),
        PreallocationRequest {
            tag: Tag(5),
            component_handle: BuiltinComponent::View.handle(),
            component_name: BuiltinComponent::View.name().into(),
            props: Arc::new(props.clone()),
        },
    );
    h.provider.process_pending_requests();
    let live_before = h.api.live_nodes();

    h.commit(11, vec![Mutation::create(view(5).with_props(props))]);
    h.pump();

    let instance = h.manager.find_by_tag(Tag(5)).unwrap();
    assert_eq!(h.api.live_nodes(), live_before);
    assert_eq!(instance.id(), "header");
    let registry = h.manager.registry();
    assert_eq!(registry.find_tag_by_id("header"), Some(Tag(5)));
    assert_eq!(registry.find_by_id("header").unwrap().tag(), Tag(5));
}

#[test]
fn test_unclaimed_preallocations_are_dropped() {
    let h = Harness::new(RuntimeCapabilities::serial());
    h.delegate.scheduler_did_request_preliminary_view_allocation(
        SurfaceId(11),
        PreallocationRequest {
            tag: Tag(500),
            component_handle: BuiltinComponent::View.handle(),
            component_name: BuiltinComponent::View.name().into(),
            props: Arc::new(Props::new()),
        },
    );
    h.provider.process_pending_requests();
    assert_eq!(h.api.live_nodes(), 1);

    h.commit(11, tree(11, 100..102));
    h.pump();

    assert_eq!(h.provider.preallocated_count(), 0);
    assert!(h.manager.find_by_tag(Tag(500)).is_none());
    assert_eq!(h.api.live_nodes(), 3);
}

#[test]
fn test_commit_clears_request_queue() {
    let h = Harness::new(RuntimeCapabilities::serial());
    h.delegate.scheduler_did_request_preliminary_view_allocation(
        SurfaceId(11),
        PreallocationRequest {
            tag: Tag(100),
            component_handle: BuiltinComponent::View.handle(),
            component_name: BuiltinComponent::View.name().into(),
            props: Arc::new(Props::new()),
        },
    );
    assert_eq!(h.queue.len(), 1);

    h.commit(11, vec![Mutation::create(view(11))]);
    assert!(h.queue.is_empty());
}

#[test]
fn test_commands_and_responder_run_on_main_thread() {
    let h = Harness::new(RuntimeCapabilities::serial());
    h.commit(11, tree(11, 100..101));
    h.pump();

    h.delegate
        .scheduler_did_dispatch_command(view(100), "focus".to_string(), json!([1]));
    h.delegate
        .scheduler_did_set_is_js_responder(view(100), true, true);

    let child = h.manager.find_by_tag(Tag(100)).unwrap();
    let root = h.manager.find_by_tag(Tag(11)).unwrap();
    assert!(child.take_commands().is_empty());
    assert!(!root.is_native_responder_blocked());

    assert_eq!(h.pump(), 2);
    assert_eq!(child.take_commands(), vec![("focus".to_string(), json!([1]))]);
    assert!(child.is_js_responder());
    assert!(child.is_native_responder_blocked());
    assert!(root.is_native_responder_blocked());
}

#[test]
fn test_tasks_after_manager_drop_are_noops() {
    let h = Harness::new(RuntimeCapabilities::serial());
    h.commit(11, tree(11, 100..105));

    let queued = h.main.len();
    let common::Harness {
        manager, main, api, ..
    } = h;
    drop(manager);

    assert_eq!(main.run_pending(), queued);
    assert_eq!(api.live_nodes(), 0);
}
