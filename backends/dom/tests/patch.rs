//! Reconciling virtual trees against a `MemoryDom`.

use std::{cell::RefCell, rc::Rc};

use serde_json::json;
use zeal_core::{
    Lifecycle, PatchFlags, VChild, VNode, ZealError, error::clear_error_handler,
    handler::into_handler, set_error_handler,
};
use zeal_dom::{
    DirectiveRegistry, ManualScheduler, MemoryDom, Mutation, NodeId, Patcher, Renderer,
    UpdateQueue,
};
use zeal_reactive::ReactiveState;

type HookLog = Rc<RefCell<Vec<(Lifecycle, NodeId)>>>;

fn recording_patcher() -> (Patcher<MemoryDom>, HookLog) {
    let log: HookLog = Rc::default();
    let sink = log.clone();
    let renderer = Renderer::<MemoryDom>::new()
        .with_hook(move |moment, node: &NodeId| sink.borrow_mut().push((moment, *node)));
    (Patcher::new(renderer), log)
}

/// Mounts `tree` into a fresh container and clears the log.
fn mounted(patcher: &Patcher<MemoryDom>, tree: &VChild) -> (MemoryDom, NodeId, NodeId) {
    let mut dom = MemoryDom::new();
    let container = dom.container();
    let root = patcher
        .renderer()
        .render(&mut dom, tree, &container)
        .expect("mounted");
    dom.clear_log();
    (dom, container, root)
}

fn item(key: Option<&str>, text: &str) -> VChild {
    let node = VNode::new("li").with_child(VChild::text(text));
    match key {
        Some(key) => node.with_key(key).into(),
        None => node.into(),
    }
}

fn list(items: Vec<VChild>) -> VChild {
    VNode::new("ul").with_children(items).into()
}

fn capture_errors() -> Rc<RefCell<Vec<ZealError>>> {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    set_error_handler(move |error| sink.borrow_mut().push(error.clone()));
    errors
}

// ============================================================================
// Children
// ============================================================================

#[test]
fn keyed_children_are_moved_not_recreated() {
    let (patcher, hooks) = recording_patcher();
    let old = list(vec![
        item(Some("1"), "A"),
        item(Some("2"), "B"),
        item(Some("3"), "C"),
    ]);
    let (mut dom, container, ul) = mounted(&patcher, &old);
    let before = dom.children(ul).to_vec();
    hooks.borrow_mut().clear();

    let new = list(vec![
        item(Some("3"), "C"),
        item(Some("1"), "A"),
        item(Some("2"), "B"),
    ]);
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(dom.children(ul), &[before[2], before[0], before[1]]);
    assert_eq!(dom.text_content(ul), "CAB");
    assert!(hooks.borrow().is_empty());
    assert!(!dom.log().iter().any(Mutation::is_create));
}

#[test]
fn appending_unkeyed_text_mounts_exactly_one_node() {
    fn text(items: &[&str]) -> VChild {
        VNode::new("p")
            .with_children(items.iter().map(|item| VChild::text(*item)))
            .into()
    }
    let (patcher, _) = recording_patcher();
    let old = text(&["1", "2", "3"]);
    let (mut dom, container, p) = mounted(&patcher, &old);
    let before = dom.children(p).to_vec();

    patcher.update(&mut dom, &container, Some(&text(&["1", "2", "3", "4"])), Some(&old), 0);

    let log = dom.take_log();
    assert_eq!(log.len(), 2, "{log:?}");
    let Mutation::CreateText { node, .. } = &log[0] else {
        panic!("expected a text node, got {log:?}");
    };
    assert_eq!(
        log[1],
        Mutation::Insert {
            parent: p,
            node: *node,
            index: 3
        }
    );
    assert_eq!(&dom.children(p)[..3], before.as_slice());
}

#[test]
fn changed_text_is_updated_in_place() {
    let (patcher, _) = recording_patcher();
    let old: VChild = VNode::new("p").with_child(VChild::text("a")).into();
    let (mut dom, container, p) = mounted(&patcher, &old);
    let text = dom.children(p)[0];

    let new: VChild = VNode::new("p").with_child(VChild::text("b")).into();
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(
        dom.take_log(),
        [Mutation::SetText {
            node: text,
            text: "b".to_owned()
        }]
    );
}

#[test]
fn unkeyed_siblings_are_replaced_after_a_removal() {
    let (patcher, hooks) = recording_patcher();
    let old = list(vec![item(None, "1"), item(None, "2")]);
    let (mut dom, container, ul) = mounted(&patcher, &old);
    let before = dom.children(ul).to_vec();
    hooks.borrow_mut().clear();

    let new = list(vec![item(None, "2")]);
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    let after = dom.children(ul).to_vec();
    assert_eq!(after.len(), 1);
    assert!(!before.contains(&after[0]));
    assert_eq!(dom.text_content(ul), "2");

    let torn_down = hooks
        .borrow()
        .iter()
        .filter(|(moment, _)| *moment == Lifecycle::Teardown)
        .count();
    assert_eq!(torn_down, 2);
}

#[test]
fn keyed_and_unkeyed_children_mix() {
    let (patcher, _) = recording_patcher();
    let old = list(vec![item(Some("a"), "A"), item(None, "x"), item(Some("b"), "B")]);
    let (mut dom, container, ul) = mounted(&patcher, &old);
    let before = dom.children(ul).to_vec();

    let new = list(vec![item(Some("b"), "B"), item(Some("a"), "A")]);
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(dom.children(ul), &[before[2], before[0]]);
}

#[test]
fn removed_children_are_torn_down_and_detached() {
    let (patcher, hooks) = recording_patcher();
    let old = list(vec![item(Some("1"), "A"), item(Some("2"), "B")]);
    let (mut dom, container, ul) = mounted(&patcher, &old);
    let removed = dom.children(ul)[1];
    hooks.borrow_mut().clear();

    let new = list(vec![item(Some("1"), "A")]);
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(dom.children(ul).len(), 1);
    assert_eq!(dom.parent(removed), None);
    assert_eq!(*hooks.borrow(), [(Lifecycle::Teardown, removed)]);
}

// ============================================================================
// Replacement
// ============================================================================

#[test]
fn different_tags_replace_the_node() {
    let (patcher, hooks) = recording_patcher();
    let old: VChild = VNode::new("p").into();
    let (mut dom, container, p) = mounted(&patcher, &old);
    hooks.borrow_mut().clear();

    let new: VChild = VNode::new("span").into();
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    let span = dom.children(container)[0];
    assert_eq!(dom.tag(span), Some("span"));
    assert_eq!(
        *hooks.borrow(),
        [(Lifecycle::Teardown, p), (Lifecycle::Mount, span)]
    );
}

#[test]
fn text_and_elements_replace_each_other() {
    let (patcher, _) = recording_patcher();
    let old: VChild = VNode::new("div").with_child(VChild::text("plain")).into();
    let (mut dom, container, div) = mounted(&patcher, &old);

    let new: VChild = VNode::new("div").with_child(VNode::new("em")).into();
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(dom.inner_markup(div), "<em></em>");
}

#[test]
fn shared_subtrees_are_skipped() {
    let (patcher, _) = recording_patcher();
    let tree = list(vec![item(None, "same")]);
    let (mut dom, container, _) = mounted(&patcher, &tree);

    patcher.update(&mut dom, &container, Some(&tree.clone()), Some(&tree), 0);

    assert!(dom.log().is_empty());
}

#[test]
fn absent_sides_mount_and_unmount() {
    let (patcher, _) = recording_patcher();
    let mut dom = MemoryDom::new();
    let container = dom.container();
    let tree: VChild = VNode::new("p").into();

    patcher.update(&mut dom, &container, Some(&tree), None, 0);
    assert_eq!(dom.children(container).len(), 1);

    patcher.update(&mut dom, &container, None, Some(&tree), 0);
    assert!(dom.children(container).is_empty());
}

// ============================================================================
// Attributes
// ============================================================================

#[test]
fn full_props_remove_stale_attributes_only() {
    let (patcher, _) = recording_patcher();
    let old: VChild = VNode::new("input")
        .with_prop("a", "1")
        .with_prop("b", "2")
        .with_flags(PatchFlags::FULL_PROPS)
        .into();
    let (mut dom, container, input) = mounted(&patcher, &old);

    let new: VChild = VNode::new("input")
        .with_prop("a", "1")
        .with_flags(PatchFlags::FULL_PROPS)
        .into();
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(
        dom.take_log(),
        [Mutation::RemoveAttribute {
            node: input,
            name: "b".to_owned()
        }]
    );
    assert_eq!(dom.attribute(input, "a"), Some("1"));
}

#[test]
fn zero_flags_skip_attribute_work() {
    let (patcher, _) = recording_patcher();
    let old: VChild = VNode::new("p").with_prop("title", "old").into();
    let (mut dom, container, p) = mounted(&patcher, &old);

    let new: VChild = VNode::new("p").with_prop("title", "new").into();
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(dom.attribute(p, "title"), Some("old"));
    assert!(dom.log().is_empty());
}

#[test]
fn class_flag_only_touches_class() {
    let (patcher, _) = recording_patcher();
    let old: VChild = VNode::new("p")
        .with_prop("class", "a")
        .with_prop("title", "old")
        .with_flags(PatchFlags::CLASS)
        .into();
    let (mut dom, container, p) = mounted(&patcher, &old);

    let new: VChild = VNode::new("p")
        .with_prop("class", "a b")
        .with_prop("title", "new")
        .with_flags(PatchFlags::CLASS)
        .into();
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(dom.attribute(p, "class"), Some("a b"));
    assert_eq!(dom.attribute(p, "title"), Some("old"));
}

#[test]
fn props_flag_diffs_values_and_removes_falsy_ones() {
    let (patcher, _) = recording_patcher();
    let old: VChild = VNode::new("button")
        .with_prop("title", "same")
        .with_prop("disabled", true)
        .with_flags(PatchFlags::PROPS)
        .into();
    let (mut dom, container, button) = mounted(&patcher, &old);

    let new: VChild = VNode::new("button")
        .with_prop("title", "same")
        .with_prop("disabled", false)
        .with_flags(PatchFlags::PROPS)
        .into();
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);

    assert_eq!(
        dom.take_log(),
        [Mutation::RemoveAttribute {
            node: button,
            name: "disabled".to_owned()
        }]
    );
}

#[test]
fn hydrate_rebinds_listeners() {
    let dom = Rc::new(RefCell::new(MemoryDom::new()));
    let (patcher, _) = recording_patcher();
    let hits = Rc::new(RefCell::new(Vec::new()));
    let handler = |label: &'static str| {
        let hits = hits.clone();
        into_handler(move |_| hits.borrow_mut().push(label))
    };

    let old: VChild = VNode::new("button")
        .with_listener("click", handler("old"))
        .with_listener("focus", handler("focus"))
        .with_flags(PatchFlags::HYDRATE)
        .into();
    let new: VChild = VNode::new("button")
        .with_listener("click", handler("new"))
        .with_flags(PatchFlags::HYDRATE)
        .into();

    let (container, button) = {
        let mut dom = dom.borrow_mut();
        let container = dom.container();
        let button = patcher.renderer().render(&mut dom, &old, &container).unwrap();
        patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);
        (container, button)
    };
    assert_eq!(dom.borrow().children(container), &[button]);
    assert_eq!(dom.borrow().listener_count(button), 1);

    MemoryDom::fire(&dom, button, "click");
    MemoryDom::fire(&dom, button, "focus");
    assert_eq!(*hits.borrow(), ["new"]);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn failing_subtrees_do_not_stop_their_siblings() {
    let errors = capture_errors();
    let (patcher, _) = recording_patcher();
    let old: VChild = VNode::new("div").into();
    let (mut dom, container, div) = mounted(&patcher, &old);

    let new: VChild = VNode::new("div")
        .with_child(VNode::new("span").with_prop("bad name", "x"))
        .with_child(VNode::new("em"))
        .into();
    patcher.update(&mut dom, &container, Some(&new), Some(&old), 0);
    clear_error_handler();

    assert_eq!(errors.borrow().len(), 1);
    assert_eq!(dom.inner_markup(div), "<em></em>");
}

#[test]
fn missing_nodes_are_reported() {
    let errors = capture_errors();
    let (patcher, _) = recording_patcher();
    let mut dom = MemoryDom::new();
    let container = dom.container();
    let tree: VChild = VNode::new("p").into();

    patcher.update(&mut dom, &container, Some(&tree), Some(&tree.clone()), 4);
    patcher.update(&mut dom, &container, None, Some(&tree), 0);
    clear_error_handler();

    let errors = errors.borrow();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|error| matches!(error, ZealError::Reconcile(_))));
}

// ============================================================================
// Directives
// ============================================================================

#[test]
fn directives_rerun_on_patch() {
    let state = ReactiveState::new(json!({ "open": false }));
    let renderer = Renderer::<MemoryDom>::new()
        .with_directives(Rc::new(DirectiveRegistry::with_builtins()), state.clone());
    let patcher = Patcher::new(renderer);
    let tree = || -> VChild { VNode::new("p").with_prop("data-show", "open").into() };
    let old = tree();
    let (mut dom, container, p) = mounted(&patcher, &old);
    assert_eq!(dom.style(p, "display"), Some("none"));

    state.set("open", true);
    patcher.update(&mut dom, &container, Some(&tree()), Some(&old), 0);

    assert_eq!(dom.style(p, "display"), None);
}

// ============================================================================
// Batching
// ============================================================================

#[test]
fn queued_updates_collapse_per_position() {
    let dom = Rc::new(RefCell::new(MemoryDom::new()));
    let scheduler = Rc::new(ManualScheduler::new());
    let (patcher, _) = recording_patcher();
    let queue = UpdateQueue::new(dom.clone(), patcher.clone(), scheduler.clone());
    let text = |value: &str| -> VChild { VNode::new("p").with_child(VChild::text(value)).into() };

    let old = text("0");
    let container = {
        let mut dom = dom.borrow_mut();
        let container = dom.container();
        patcher.renderer().render(&mut dom, &old, &container).unwrap();
        dom.clear_log();
        container
    };

    queue.enqueue(&container, Some(text("1")), Some(old.clone()), 0);
    queue.enqueue(&container, Some(text("2")), Some(text("1")), 0);
    assert_eq!(queue.len(), 1);
    assert_eq!(scheduler.pending(), 1);
    assert!(dom.borrow().log().is_empty());

    assert_eq!(scheduler.run_frame(), 1);
    assert!(queue.is_empty());
    let dom = dom.borrow();
    assert_eq!(dom.text_content(container), "2");
    assert!(
        !dom.log()
            .iter()
            .any(|mutation| matches!(mutation, Mutation::SetText { text, .. } if text == "1"))
    );
}

#[test]
fn flushing_by_hand_applies_queued_updates() {
    let dom = Rc::new(RefCell::new(MemoryDom::new()));
    let scheduler = Rc::new(ManualScheduler::new());
    let queue = UpdateQueue::new(dom.clone(), Patcher::default(), scheduler.clone());
    let container = dom.borrow_mut().container();

    queue.enqueue(&container, Some(VNode::new("p").into()), None, 0);
    assert_eq!(queue.flush(), 1);
    assert_eq!(dom.borrow().children(container).len(), 1);

    // The frame requested by the first enqueue finds nothing left to do.
    assert_eq!(scheduler.run_frame(), 1);
    assert_eq!(dom.borrow().children(container).len(), 1);
}

#[test]
fn busy_frame_retries_on_the_next_one() {
    let errors = capture_errors();
    let dom = Rc::new(RefCell::new(MemoryDom::new()));
    let scheduler = Rc::new(ManualScheduler::new());
    let queue = UpdateQueue::new(dom.clone(), Patcher::default(), scheduler.clone());
    let container = dom.borrow_mut().container();

    queue.enqueue(&container, Some(VNode::new("p").into()), None, 0);
    {
        let _busy = dom.borrow();
        assert_eq!(scheduler.run_frame(), 1);
    }
    assert_eq!(queue.len(), 1);
    assert_eq!(scheduler.pending(), 1);
    assert!(matches!(errors.borrow().as_slice(), [ZealError::Reconcile(_)]));

    assert_eq!(scheduler.run_frame(), 1);
    assert!(queue.is_empty());
    assert_eq!(dom.borrow().children(container).len(), 1);
    assert_eq!(scheduler.pending(), 0);
    clear_error_handler();
}
