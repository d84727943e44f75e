//! Integration Tests for the Simulator
//!
//! These tests verify that the tree, render engine, effect scheduler and memo
//! cache together reproduce the documented ordering rules.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use hookline_core::{
    simulate, Component, DepValue, EffectOrdering, EffectSpec, NodeSpec, Scenario, SimConfig,
    Simulator, TreeError, UpdateOutcome, Wrapper,
};

/// Parent P with E_p on [x], child C with E_c on [x].
fn parent_child() -> NodeSpec {
    NodeSpec::new("P")
        .value("x", 0)
        .effect(EffectSpec::on("E_p", ["x"]).cleanup(|_| Ok(())))
        .child(NodeSpec::new("C").effect(EffectSpec::on("E_c", ["x"]).cleanup(|_| Ok(()))))
}

/// Test the mount pass: parents render first, children's effects run first.
#[test]
fn mount_renders_parent_first_and_runs_child_effects_first() {
    let mut sim = Simulator::new(parent_child(), SimConfig::default());
    let log = sim.pass();

    assert_eq!(log.render.labels(), ["P", "C"]);
    assert_eq!(log.effects.runs(), ["E_c", "E_p"]);
    assert!(log.effects.cleanups().is_empty());
}

/// Test an update pass where the shared dependency changes.
#[test]
fn update_cleans_up_then_reruns_child_first() {
    let mut sim = Simulator::new(parent_child(), SimConfig::default());
    sim.pass();

    let root = sim.tree().root();
    sim.tree_mut().request_update(root, [("x", 1)]).unwrap();
    let log = sim.pass();

    assert_eq!(log.render.labels(), ["P", "C"]);
    assert_eq!(log.effects.cleanups(), ["E_c", "E_p"]);
    assert_eq!(log.effects.runs(), ["E_c", "E_p"]);
    assert_eq!(
        log.effects.lines(),
        ["cleanup E_c", "cleanup E_p", "run E_c", "run E_p"]
    );
}

/// Test unmounting a child while the parent stays.
#[test]
fn unmounting_child_cleans_up_only_child() {
    let mut sim = Simulator::new(parent_child(), SimConfig::default());
    sim.pass();

    let c = sim.tree().find_by_label("C").unwrap();
    sim.tree_mut().remove_node(c).unwrap();
    let log = sim.pass();

    assert_eq!(log.effects.lines(), ["cleanup E_c"]);
    assert!(!log.render.contains("C"));

    // Removing again neither fails nor cleans up twice.
    sim.tree_mut().remove_node(c).unwrap();
    assert!(sim.pass().effects.is_empty());
}

/// Test that separately removed siblings clean up in tree order, before the
/// update cleanups of a surviving sibling in the same batch.
#[test]
fn unmount_cleanups_follow_tree_order_and_precede_updates() {
    let spec = NodeSpec::new("P")
        .value("x", 0)
        .child(
            NodeSpec::new("A")
                .effect(EffectSpec::once("a").cleanup(|_| Ok(())))
                .child(NodeSpec::new("A1").effect(EffectSpec::once("a1").cleanup(|_| Ok(())))),
        )
        .child(NodeSpec::new("B").effect(EffectSpec::once("b").cleanup(|_| Ok(()))))
        .child(NodeSpec::new("S").effect(EffectSpec::on("s", ["x"]).cleanup(|_| Ok(()))));
    let mut sim = Simulator::new(spec, SimConfig::default());
    sim.pass();

    let a = sim.tree().find_by_label("A").unwrap();
    let b = sim.tree().find_by_label("B").unwrap();
    let root = sim.tree().root();
    sim.tree_mut().remove_node(b).unwrap();
    sim.tree_mut().request_update(root, [("x", 1)]).unwrap();
    sim.tree_mut().remove_node(a).unwrap();
    let log = sim.pass();

    assert_eq!(log.render.labels(), ["P", "S"]);
    assert_eq!(
        log.effects.lines(),
        ["cleanup a1", "cleanup a", "cleanup b", "cleanup s", "run s"]
    );
    assert_eq!(sim.tree().len(), 2);
}

/// Test that a deferred fetch completing after unmount is dropped.
#[test]
fn stale_async_result_is_ignored() {
    let outcome = Arc::new(Mutex::new(None));
    let outcome_clone = outcome.clone();

    let profile = NodeSpec::new("Profile")
        .value("user", "ada")
        .effect(EffectSpec::on("fetch", ["user"]).body(move |cx| {
            let updater = cx.updater();
            let outcome = outcome_clone.clone();
            cx.defer(move || {
                *outcome.lock() = Some(updater.set("data", "loaded"));
            });
            Ok(())
        }))
        .effect(EffectSpec::on("show", ["data"]));

    let mut sim = Simulator::new(NodeSpec::new("App").child(profile), SimConfig::default());
    let mount = sim.pass();
    assert_eq!(mount.effects.runs(), ["fetch", "show"]);

    let profile = sim.tree().find_by_label("Profile").unwrap();
    sim.tree_mut().remove_node(profile).unwrap();
    sim.pass();

    let passes = sim.flush_deferred().unwrap();
    assert_eq!(*outcome.lock(), Some(UpdateOutcome::StaleAsyncIgnored));
    assert!(passes.is_empty());
    assert!(sim.pass().effects.is_empty());
}

/// Test that a deferred fetch completing while mounted triggers a rerun.
#[test]
fn async_result_applies_while_mounted() {
    let profile = NodeSpec::new("Profile")
        .effect(EffectSpec::once("fetch").body(|cx| {
            let updater = cx.updater();
            cx.defer(move || {
                updater.set("data", "loaded");
            });
            Ok(())
        }))
        .effect(EffectSpec::on("show", ["data"]));

    let mut sim = Simulator::new(profile, SimConfig::default());
    sim.pass();

    let passes = sim.flush_deferred().unwrap();
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].effects.runs(), ["show"]);

    let root = sim.tree().root();
    assert_eq!(sim.tree().value(root, "data"), DepValue::from("loaded"));
}

/// Test that several update requests collapse into one pass.
#[test]
fn batched_updates_run_one_pass() {
    let runs = Arc::new(AtomicI32::new(0));
    let runs_clone = runs.clone();

    let form = NodeSpec::new("Form")
        .value("name", "")
        .value("email", "")
        .effect(EffectSpec::on("validate", ["name", "email"]).body(move |_| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

    let mut sim = Simulator::new(form, SimConfig::default());
    sim.pass();

    let root = sim.tree().root();
    let tree = sim.tree_mut();
    tree.request_update(root, [("name", "ada")]).unwrap();
    tree.request_update(root, [("email", "ada@example.com")]).unwrap();
    tree.request_update(root, [("name", "grace")]).unwrap();

    let passes = sim.settle().unwrap();
    assert_eq!(passes.len(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(sim.tree().value(root, "name"), DepValue::from("grace"));
}

/// Test the full lifecycle of `once` and `always` effects.
#[test]
fn once_and_always_lifecycles() {
    let mut sim = Simulator::new(
        NodeSpec::new("App").value("tick", 0).child(
            NodeSpec::new("Clock")
                .effect(EffectSpec::once("subscribe").cleanup(|_| Ok(())))
                .effect(EffectSpec::always("log").cleanup(|_| Ok(()))),
        ),
        SimConfig::default(),
    );

    let mount = sim.pass();
    assert_eq!(mount.effects.runs(), ["subscribe", "log"]);

    let root = sim.tree().root();
    for tick in 1..=3 {
        sim.tree_mut().request_update(root, [("tick", tick)]).unwrap();
        let log = sim.pass();
        assert_eq!(log.effects.lines(), ["run log"]);
    }

    let clock = sim.tree().find_by_label("Clock").unwrap();
    let node = sim.tree().node(clock).unwrap();
    assert_eq!(node.effect("subscribe").unwrap().run_count(), 1);
    assert_eq!(node.effect("log").unwrap().run_count(), 4);

    sim.tree_mut().remove_node(clock).unwrap();
    let unmount = sim.pass();
    assert_eq!(unmount.effects.lines(), ["cleanup subscribe", "cleanup log"]);
}

/// Test that a new record each pass re-triggers, while a kept one does not.
#[test]
fn composite_dependencies_compare_by_identity() {
    let mut sim = Simulator::new(
        NodeSpec::new("Chart").effect(EffectSpec::on("draw", ["options"])),
        SimConfig::default(),
    );
    let root = sim.tree().root();
    sim.pass();

    let options = DepValue::record(serde_json::json!({ "color": "red" }));
    sim.tree_mut().request_update(root, [("options", options.clone())]).unwrap();
    assert_eq!(sim.pass().effects.runs(), ["draw"]);

    sim.tree_mut().request_update(root, [("options", options)]).unwrap();
    assert!(sim.pass().effects.is_empty());

    let same_contents = DepValue::record(serde_json::json!({ "color": "red" }));
    sim.tree_mut().request_update(root, [("options", same_contents)]).unwrap();
    assert_eq!(sim.pass().effects.runs(), ["draw"]);
}

/// Test that the memo cache skips unchanged work across passes.
#[test]
fn memo_skips_expensive_computation() {
    let computed = Arc::new(AtomicI32::new(0));
    let counter = computed.clone();

    let list = NodeSpec::new("List")
        .value("query", "a")
        .value("theme", "dark")
        .on_render(move |cx| {
            let query = cx.value("query");
            let counter = counter.clone();
            cx.memo("filtered", &[query], move || {
                counter.fetch_add(1, Ordering::SeqCst);
                vec![1, 2, 3]
            });
        });

    let mut sim = Simulator::new(list, SimConfig::default());
    let root = sim.tree().root();
    sim.pass();

    sim.tree_mut().request_update(root, [("theme", "light")]).unwrap();
    sim.pass();
    assert_eq!(computed.load(Ordering::SeqCst), 1);

    sim.tree_mut().request_update(root, [("query", "b")]).unwrap();
    sim.pass();
    assert_eq!(computed.load(Ordering::SeqCst), 2);

    let stats = sim.tree().node(root).unwrap().memos().stats();
    assert_eq!((stats.hits, stats.misses), (1, 2));
}

/// Test get_or_compute called directly on the tree.
#[test]
fn tree_memo_api_matches_cache_contract() {
    let mut sim = Simulator::new(NodeSpec::new("P"), SimConfig::default());
    let root = sim.tree().root();
    let calls = AtomicI32::new(0);
    let compute = || {
        calls.fetch_add(1, Ordering::SeqCst);
        "value".to_string()
    };

    let deps = [DepValue::from(1)];
    sim.tree_mut().get_or_compute(root, "k", &deps, compute).unwrap();
    sim.tree_mut().get_or_compute(root, "k", &deps, compute).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    sim.tree_mut()
        .get_or_compute(root, "k", &[DepValue::from(2)], compute)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test that an effect updating its own dependency forever is stopped.
#[test]
fn runaway_updates_hit_depth_limit() {
    let counter = NodeSpec::new("Counter")
        .value("n", 0)
        .effect(EffectSpec::on("bump", ["n"]).body(|cx| {
            let next = match cx.dep(0) {
                DepValue::Int(n) => n + 1,
                _ => 0,
            };
            cx.updater().set("n", next);
            Ok(())
        }));

    let config = SimConfig {
        max_settle_passes: 5,
        ..SimConfig::default()
    };
    let mut sim = Simulator::new(counter, config);
    sim.pass();

    assert_eq!(sim.settle().unwrap_err(), TreeError::UpdateDepthExceeded(5));
}

/// Test that a failing effect is reported without blocking the others.
#[test]
fn failing_cleanup_does_not_block_siblings() {
    let mut sim = Simulator::new(
        NodeSpec::new("P")
            .value("x", 0)
            .child(NodeSpec::new("A").effect(
                EffectSpec::on("a", ["x"]).cleanup(|_| Err("socket already closed".into())),
            ))
            .child(NodeSpec::new("B").effect(EffectSpec::on("b", ["x"]).cleanup(|_| Ok(())))),
        SimConfig::default(),
    );
    sim.pass();

    let root = sim.tree().root();
    sim.tree_mut().request_update(root, [("x", 1)]).unwrap();
    let log = sim.pass();

    assert_eq!(log.effects.cleanups(), ["a", "b"]);
    assert_eq!(log.effects.runs(), ["a", "b"]);
    assert_eq!(log.failures.len(), 1);
    assert_eq!(log.failures[0].effect(), "a");
}

/// Test the per-node ordering variant on a deeper tree.
#[test]
fn per_node_ordering_variant() {
    let tree = NodeSpec::new("P")
        .value("x", 0)
        .effect(EffectSpec::on("p", ["x"]).cleanup(|_| Ok(())))
        .child(NodeSpec::new("A").effect(EffectSpec::on("a", ["x"]).cleanup(|_| Ok(()))))
        .child(NodeSpec::new("B").effect(EffectSpec::on("b", ["x"]).cleanup(|_| Ok(()))));

    let mut sim = Simulator::new(tree, SimConfig::default().with_ordering(EffectOrdering::PerNode));
    sim.pass();
    let root = sim.tree().root();
    sim.tree_mut().request_update(root, [("x", 1)]).unwrap();

    assert_eq!(
        sim.pass().effects.lines(),
        ["cleanup a", "run a", "cleanup b", "run b", "cleanup p", "run p"]
    );
}

/// Test a wrapped component mounting inside a tree.
#[test]
fn wrapped_component_mounts_wrapper_first() {
    let counter = || NodeSpec::new("Counter").effect(EffectSpec::once("inner_mount"));
    let with_logging = Wrapper::new("withLogging").effect(EffectSpec::once("outer_mount"));

    let mut sim = Simulator::new(with_logging.wrap(counter).build(), SimConfig::default());
    let log = sim.pass();

    assert_eq!(log.render.labels(), ["withLogging(Counter)", "Counter"]);
    assert_eq!(log.effects.runs(), ["inner_mount", "outer_mount"]);
}

/// Test a node mounted later runs its effects on the next pass only.
#[test]
fn late_mount_runs_on_next_pass() {
    let mut sim = Simulator::new(parent_child(), SimConfig::default());
    sim.pass();

    let root = sim.tree().root();
    sim.tree_mut()
        .create_node(root, NodeSpec::new("D").effect(EffectSpec::once("E_d")))
        .unwrap();
    let log = sim.pass();

    assert_eq!(log.render.labels(), ["P", "C", "D"]);
    assert_eq!(log.effects.lines(), ["run E_d"]);
}

/// Test the JSON scenario driver end to end.
#[test]
fn json_scenario_matches_golden_output() {
    let scenario = Scenario::from_json(
        r#"{
            "config": { "ordering": "phased" },
            "root": {
                "label": "P",
                "values": { "x": 0 },
                "effects": [{ "label": "E_p", "deps": ["x"] }],
                "children": [
                    { "label": "C", "effects": [{ "label": "E_c", "deps": ["x"], "fail": "cleanup" }] }
                ]
            },
            "script": [
                { "update": { "P": { "x": 1 } } },
                { "mount": { "parent": "P", "node": { "label": "D", "effects": [{ "label": "E_d", "deps": "once" }] } } },
                { "remove": "C" }
            ]
        }"#,
    )
    .unwrap();

    let logs = simulate(&scenario).unwrap();
    let lines: Vec<Vec<String>> = logs.iter().map(|log| log.effects.lines()).collect();

    assert_eq!(
        lines,
        vec![
            vec!["run E_c", "run E_p"],
            vec!["cleanup E_c", "cleanup E_p", "run E_c", "run E_p"],
            vec!["run E_d"],
            vec!["cleanup E_c"],
        ]
    );
    assert_eq!(logs[1].failures.len(), 1);
    assert_eq!(logs[3].failures.len(), 1);
    assert_eq!(logs[3].render.labels(), ["P", "D"]);
}
