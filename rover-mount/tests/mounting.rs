//! Mounting manager against the in-memory native API, without a scheduler.

mod common;

use common::{Harness, image, text, view, with_opacity};
use rover_mount::config::{RuntimeCapabilities, SplitConfig};
use rover_mount::mutation::{ComponentHandle, Props, ShadowView};
use rover_mount::scheduler::split_index;
use rover_mount::{ComponentKind, MountError, Mutation, MutationKind, Tag};
use serde_json::{Map, Value, json};

fn harness() -> Harness {
    Harness::new(RuntimeCapabilities::serial())
}

/// Root 11 with A (100) and B (101) under it, and C (102) under A
fn mount_abc(h: &Harness) {
    let report = h.manager.did_mount(&[
        Mutation::create(view(11)),
        Mutation::create(view(100)),
        Mutation::create(view(101)),
        Mutation::create(text(102)),
        Mutation::insert(view(11), view(100), 0),
        Mutation::insert(view(11), view(101), 1),
        Mutation::insert(view(100), text(102), 0),
    ]);
    assert!(report.is_clean());
    assert_eq!(report.applied, 7);
}

#[test]
fn test_reparent_moves_child_between_parents() {
    let h = harness();
    mount_abc(&h);

    let a = h.manager.find_by_tag(Tag(100)).unwrap();
    let b = h.manager.find_by_tag(Tag(101)).unwrap();
    let c = h.manager.find_by_tag(Tag(102)).unwrap();
    let c_node = c.node();

    let report = h.manager.did_mount(&[
        Mutation::remove(view(100), text(102), 0),
        Mutation::insert(view(101), text(102), 0),
    ]);
    assert!(report.is_clean());

    assert!(a.child_tags().is_empty());
    assert_eq!(b.child_tags(), vec![Tag(102)]);
    assert_eq!(c.parent().unwrap().tag(), Tag(101));
    assert!(h.api.children_of(a.node()).is_empty());
    assert_eq!(h.api.children_of(b.node()), vec![c_node]);
    // Same native node, never recreated
    assert_eq!(h.manager.find_by_tag(Tag(102)).unwrap().node(), c_node);
}

#[test]
fn test_reparent_within_one_batch() {
    let h = harness();
    h.manager
        .did_mount(&[Mutation::create(view(1)), Mutation::create(view(2))]);

    let mutations = [
        Mutation::create(view(10)),
        Mutation::insert(view(1), view(10), 0),
        Mutation::remove(view(1), view(10), 0),
        Mutation::insert(view(2), view(10), 0),
    ];
    assert!(h.manager.did_mount(&mutations).is_clean());

    let moved = h.manager.find_by_tag(Tag(10)).unwrap();
    assert_eq!(moved.parent().unwrap().tag(), Tag(2));
    assert!(h.manager.find_by_tag(Tag(1)).unwrap().child_tags().is_empty());
    assert_eq!(
        h.manager.find_by_tag(Tag(2)).unwrap().child_tags(),
        vec![Tag(10)]
    );

    let eager = SplitConfig {
        min_count: 0,
        min_cost: 0,
        ..Default::default()
    };
    if let Some(index) = split_index(&mutations[1..], &eager) {
        assert_ne!(index, 2);
    }
}

#[test]
fn test_move_never_straddles_frames() {
    let mut mutations: Vec<Mutation> = (200..230)
        .map(|t| Mutation::update(view(t), view(t)))
        .collect();
    let remove_at = mutations.len();
    mutations.push(Mutation::remove(view(100), text(102), 0));
    mutations.push(Mutation::insert(view(101), text(102), 0));
    mutations.extend((230..290).map(|t| Mutation::update(view(t), view(t))));

    let index = split_index(&mutations, &SplitConfig::default()).unwrap();
    assert_ne!(index, remove_at + 1);
}

#[test]
fn test_delete_disposes_but_move_keeps_node() {
    let h = harness();
    mount_abc(&h);
    let c_node = h.manager.find_by_tag(Tag(102)).unwrap().node();
    let live = h.api.live_nodes();

    h.manager.did_mount(&[
        Mutation::remove(view(100), text(102), 0),
        Mutation::insert(view(101), text(102), 0),
    ]);
    assert_eq!(h.api.live_nodes(), live);

    let report = h.manager.did_mount(&[
        Mutation::remove(view(101), text(102), 0),
        Mutation::delete(text(102)),
    ]);
    assert!(report.is_clean());
    assert!(h.manager.find_by_tag(Tag(102)).is_none());
    assert!(h.api.node_type(c_node).is_none());
    assert_eq!(h.api.live_nodes(), live - 1);
}

#[test]
fn test_failed_mutation_does_not_stop_batch() {
    let h = harness();
    let report = h.manager.did_mount(&[
        Mutation::create(view(11)),
        Mutation::create(image(100)),
        Mutation::create(view(101)),
        Mutation::insert(image(100), view(101), 0),
        Mutation::insert(view(11), image(100), 0),
        Mutation::update(view(11), with_opacity(view(11), 1)),
    ]);

    assert_eq!(report.applied, 5);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.kind, MutationKind::Insert);
    assert!(matches!(
        failure.error,
        MountError::ChildrenUnsupported { parent: Tag(100), .. }
    ));

    let root = h.manager.find_by_tag(Tag(11)).unwrap();
    assert_eq!(root.child_tags(), vec![Tag(100)]);
    assert_eq!(h.api.attribute(root.node(), "opacity"), Some(json!(1)));
}

#[test]
fn test_native_create_failure_is_reported() {
    let h = harness();
    h.api.fail_call("createNode", -1);
    let report = h.manager.did_mount(&[Mutation::create(view(100))]);
    h.api.clear_failures();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        MountError::InstanceUnavailable { tag: Tag(100), .. }
    ));
    assert!(h.manager.find_by_tag(Tag(100)).is_none());

    // Later references to the missing tag are skipped
    let report = h.manager.did_mount(&[
        Mutation::create(view(11)),
        Mutation::insert(view(11), view(100), 0),
        Mutation::update(view(100), view(100)),
    ]);
    assert!(report.is_clean());
}

#[test]
fn test_rejected_attribute_is_retried_by_identical_update() {
    let h = harness();
    h.manager.did_mount(&[Mutation::create(view(100))]);
    let red = view(100).with_props(Props::new().with("color", json!("red")));

    h.api.fail_call("setAttribute", 401);
    let report = h.manager.did_mount(&[Mutation::update(view(100), red.clone())]);
    assert_eq!(report.failures.len(), 1);

    h.api.clear_failures();
    let report = h.manager.did_mount(&[Mutation::update(red.clone(), red)]);
    assert!(report.is_clean());
    let instance = h.manager.find_by_tag(Tag(100)).unwrap();
    assert_eq!(h.api.attribute(instance.node(), "color"), Some(json!("red")));
}

#[test]
fn test_unknown_component_gets_fallback() {
    let h = harness();
    let chart = ShadowView::new(Tag(100), ComponentHandle(9_999), "FancyChart");
    let report = h.manager.did_mount(&[Mutation::create(chart)]);
    assert!(report.is_clean());

    let instance = h.manager.find_by_tag(Tag(100)).unwrap();
    assert_eq!(instance.kind(), ComponentKind::Custom);
    assert_eq!(instance.component_name(), "FancyChart");
}

#[test]
fn test_registered_custom_component_is_created() {
    let h = harness();
    h.factory.register_custom("MapView");
    let map = ShadowView::new(Tag(100), ComponentHandle(4_242), "MapView");
    assert!(h.manager.did_mount(&[Mutation::create(map)]).is_clean());
    assert_eq!(
        h.manager.find_by_tag(Tag(100)).unwrap().kind(),
        ComponentKind::Custom
    );
}

#[test]
fn test_native_id_follows_updates() {
    let h = harness();
    let header = view(100).with_props(Props::new().with_native_id("header"));
    h.manager.did_mount(&[Mutation::create(header.clone())]);

    let registry = h.manager.registry();
    assert_eq!(registry.find_tag_by_id("header"), Some(Tag(100)));

    let title = view(100).with_props(Props::new().with_native_id("title"));
    h.manager.did_mount(&[Mutation::update(header, title)]);
    assert!(registry.find_by_id("header").is_none());
    assert_eq!(registry.find_by_id("title").unwrap().tag(), Tag(100));

    h.manager.did_mount(&[Mutation::delete(view(100))]);
    assert!(registry.find_by_id("title").is_none());
    assert!(registry.is_empty());
}

#[test]
fn test_update_view_keys_survive_later_commits() {
    let h = harness();
    mount_abc(&h);

    let mut raw = Map::new();
    raw.insert("opacity".to_string(), Value::from(0.3));
    assert!(h.manager.update_view(Tag(100), raw).unwrap());

    let a = h.manager.find_by_tag(Tag(100)).unwrap();
    assert_eq!(h.api.attribute(a.node(), "opacity"), Some(Value::from(0.3)));

    h.manager
        .did_mount(&[Mutation::update(view(100), with_opacity(view(100), 1))]);
    assert_eq!(h.api.attribute(a.node(), "opacity"), Some(Value::from(0.3)));
}

#[test]
fn test_update_view_skips_detached_instance() {
    let h = harness();
    h.manager.did_mount(&[Mutation::create(view(100))]);

    let mut raw = Map::new();
    raw.insert("opacity".to_string(), Value::from(0.3));
    assert!(!h.manager.update_view(Tag(100), raw.clone()).unwrap());
    assert!(!h.manager.update_view(Tag(999), raw).unwrap());
}

#[test]
fn test_layout_is_committed_on_finalize() {
    use rover_mount::mutation::LayoutMetrics;

    let h = harness();
    let sized = view(100).with_layout(LayoutMetrics::new(4.0, 8.0, 120.4, 39.6));
    let mutations = [Mutation::create(sized)];
    h.manager.did_mount(&mutations);

    let instance = h.manager.find_by_tag(Tag(100)).unwrap();
    assert!(h.api.measured_size(instance.node()).is_none());

    assert_eq!(h.manager.finalize_mutation_updates(&mutations), 1);
    assert_eq!(h.api.measured_size(instance.node()), Some((120, 40)));
    assert_eq!(
        h.api.attribute(instance.node(), "position"),
        Some(json!({ "x": 4.0, "y": 8.0 }))
    );
}
