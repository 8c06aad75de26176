//! Components mounted through an `App` onto a `MemoryDom`.

use std::{cell::RefCell, rc::Rc};

use serde_json::json;
use zeal::{App, AppConfig, ComponentDefinition, UpdateMode};
use zeal_core::{
    Event, Lifecycle, Value, ZealError, error::clear_error_handler, set_error_handler,
};
use zeal_dom::{ManualScheduler, MemoryDom, Mutation, NodeId};

type HookLog = Rc<RefCell<Vec<(Lifecycle, NodeId)>>>;

struct Fixture {
    dom: Rc<RefCell<MemoryDom>>,
    container: NodeId,
    app: App<MemoryDom>,
    hooks: HookLog,
}

fn fixture(config: AppConfig) -> Fixture {
    let dom = Rc::new(RefCell::new(MemoryDom::new()));
    let container = dom.borrow_mut().container();
    let hooks: HookLog = Rc::default();
    let sink = hooks.clone();
    let app = App::new(config, Rc::clone(&dom))
        .on_element(move |moment, node: &NodeId| sink.borrow_mut().push((moment, *node)));
    Fixture {
        dom,
        container,
        app,
        hooks,
    }
}

impl Fixture {
    fn mount(&mut self, definition: ComponentDefinition) -> zeal::Component<MemoryDom> {
        self.app.component("test", definition);
        let component = self
            .app
            .mount("test", &self.container, Value::Null)
            .expect("mounted");
        self.dom.borrow_mut().clear_log();
        self.hooks.borrow_mut().clear();
        component
    }

    fn root(&self) -> NodeId {
        self.dom.borrow().children(self.container)[0]
    }

    fn text(&self) -> String {
        self.dom.borrow().text_content(self.container)
    }
}

fn capture_errors() -> Rc<RefCell<Vec<ZealError>>> {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    set_error_handler(move |error| sink.borrow_mut().push(error.clone()));
    errors
}

// ============================================================================
// Rendering on state changes
// ============================================================================

#[test]
fn mounts_the_first_render() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(
        ComponentDefinition::new("<p class=\"greeting\">Hello, {{ name }}!</p>")
            .state(json!({ "name": "Ada" })),
    );

    let p = fx.root();
    assert_eq!(fx.dom.borrow().tag(p), Some("p"));
    assert_eq!(fx.dom.borrow().attribute(p, "class"), Some("greeting"));
    assert_eq!(fx.dom.borrow().attribute(p, &component.scope_id()), Some(""));
    assert_eq!(fx.text(), "Hello, Ada!");
    assert_eq!(component.index(), 0);
}

#[test]
fn static_templates_patch_nothing() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(ComponentDefinition::new("<section><h1>Fixed</h1></section>"));
    let before = component.tree().expect("tree");

    component.refresh();

    assert!(component.tree().expect("tree").same_ref(&before));
    assert!(fx.dom.borrow().log().is_empty());
    assert_eq!(component.render_count(), 1);
}

#[test]
fn every_write_renders_even_when_the_value_is_unchanged() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(ComponentDefinition::new("<p>{{ n }}</p>").state(json!({ "n": 1 })));

    component.state().set("n", 1);
    component.state().set("n", 1);

    assert_eq!(component.render_count(), 2);
    assert_eq!(fx.text(), "1");
    assert!(fx.dom.borrow().log().is_empty());
}

#[test]
fn text_changes_are_set_in_place() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(ComponentDefinition::new("<p>{{ n }}</p>").state(json!({ "n": 1 })));
    let p = fx.root();

    component.state().set("n", 2);

    assert_eq!(fx.root(), p);
    assert_eq!(fx.text(), "2");
    assert!(matches!(
        fx.dom.borrow().log(),
        [Mutation::SetText { text, .. }] if text == "2"
    ));
}

#[test]
fn listeners_call_methods_that_write_state() {
    let mut fx = fixture(AppConfig::default());
    fx.mount(
        ComponentDefinition::new(r#"<button @click="inc">{{ count }}</button>"#)
            .state(json!({ "count": 0 }))
            .method("inc", |cx| {
                let next = cx.state.get().get("count").as_f64().unwrap_or_default() + 1.0;
                cx.state.set("count", next);
            }),
    );
    let button = fx.root();

    MemoryDom::fire(&fx.dom, button, "click");
    MemoryDom::fire(&fx.dom, button, "click");

    assert_eq!(fx.text(), "2");
}

#[test]
fn a_render_that_writes_state_is_followed_by_exactly_one_more() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(
        ComponentDefinition::new("<p>{{ sync }}{{ n }}/{{ mirror }}</p>")
            .state(json!({ "n": 1, "mirror": 0 }))
            .computed("sync", |state| {
                let n = state.get().get("n");
                if state.get().get("mirror") != n {
                    state.set("mirror", n);
                }
                Ok(Value::Undefined)
            }),
    );
    assert_eq!(fx.text(), "1/1");

    component.state().set("n", 2);

    assert_eq!(component.render_count(), 2);
    assert_eq!(fx.text(), "2/2");
}

// ============================================================================
// Reconciliation through templates
// ============================================================================

#[test]
fn keyed_lists_relocate_existing_nodes() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(
        ComponentDefinition::new(r#"<ul><li z-for="item in items" :key="item.id">{{ item.id }}</li></ul>"#)
            .state(json!({ "items": [{ "id": 1 }, { "id": 2 }, { "id": 3 }] })),
    );
    let ul = fx.root();
    let before = fx.dom.borrow().children(ul).to_vec();

    component
        .state()
        .set("items", json!([{ "id": 3 }, { "id": 1 }, { "id": 2 }]));

    assert_eq!(fx.text(), "312");
    assert_eq!(fx.dom.borrow().children(ul), &[before[2], before[0], before[1]]);
    assert!(fx.hooks.borrow().is_empty());
    assert!(!fx.dom.borrow().log().iter().any(Mutation::is_create));
}

#[test]
fn unkeyed_items_are_replaced_after_a_removal() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(
        ComponentDefinition::new(r#"<ul><li z-for="item in items">{{ item.id }}</li></ul>"#)
            .state(json!({ "items": [{ "id": 1 }, { "id": 2 }] })),
    );
    let ul = fx.root();
    let before = fx.dom.borrow().children(ul).to_vec();

    component.state().set("items", json!([{ "id": 2 }]));

    let after = fx.dom.borrow().children(ul).to_vec();
    assert_eq!(after.len(), 1);
    assert!(!before.contains(&after[0]));
    assert_eq!(fx.text(), "2");
    let moments: Vec<_> = fx.hooks.borrow().iter().map(|(moment, _)| *moment).collect();
    assert_eq!(
        moments,
        [Lifecycle::Teardown, Lifecycle::Mount, Lifecycle::Teardown]
    );
}

#[test]
fn toggling_z_if_mounts_and_tears_down_once_per_flip() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(
        ComponentDefinition::new(r#"<div><button z-if="open" @click="noop">x</button></div>"#)
            .state(json!({ "open": true }))
            .method("noop", |_| {}),
    );

    for open in [false, true, false, true] {
        component.state().set("open", open);
    }

    let dom = fx.dom.borrow();
    let hooks = fx.hooks.borrow();
    assert!(hooks.iter().all(|(_, node)| dom.tag(*node) == Some("button")));
    let moments: Vec<_> = hooks.iter().map(|(moment, _)| *moment).collect();
    assert_eq!(
        moments,
        [
            Lifecycle::Teardown,
            Lifecycle::Mount,
            Lifecycle::Teardown,
            Lifecycle::Mount
        ]
    );
    assert_eq!(dom.total_listeners(), 1);
}

// ============================================================================
// Directives
// ============================================================================

#[test]
fn directives_run_again_on_every_patch() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(
        ComponentDefinition::new(r#"<p data-show="open">body</p>"#).state(json!({ "open": false })),
    );
    let p = fx.root();
    assert_eq!(fx.dom.borrow().style(p, "display"), Some("none"));

    component.state().set("open", true);

    assert_eq!(fx.root(), p);
    assert_eq!(fx.dom.borrow().style(p, "display"), None);
}

#[test]
fn model_directive_writes_back_and_rerenders() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(
        ComponentDefinition::new(r#"<input data-model="name">"#).state(json!({ "name": "Ada" })),
    );
    let input = fx.root();
    assert_eq!(fx.dom.borrow().attribute(input, "value"), Some("Ada"));

    MemoryDom::dispatch(&fx.dom, input, &mut Event::new("input").with_value("Grace"));

    assert_eq!(component.state().get().get("name"), Value::from("Grace"));
    assert_eq!(component.render_count(), 1);
    assert_eq!(fx.dom.borrow().attribute(input, "value"), Some("Grace"));
    assert_eq!(fx.dom.borrow().listener_count(input), 1);
}

#[test]
fn app_directives_reach_components() {
    let mut fx = fixture(AppConfig::default());
    fx.app.directive("upper", |dom: &mut MemoryDom, node: &NodeId, expr, state| {
        let text = zeal_core::evaluate_in(expr, state).to_display_string().to_uppercase();
        zeal_dom::Dom::set_text_content(dom, node, &text)
    });
    fx.mount(ComponentDefinition::new(r#"<p data-upper="word"></p>"#).state(json!({ "word": "hi" })));

    assert_eq!(fx.text(), "HI");
}

// ============================================================================
// Batched updates
// ============================================================================

#[test]
fn batched_mode_applies_one_patch_per_frame() {
    let scheduler = Rc::new(ManualScheduler::new());
    let config = AppConfig::builder()
        .update_mode(UpdateMode::Batched)
        .build()
        .expect("valid config");
    let mut fx = fixture(config);
    fx.app = App::new(fx.app.config().clone(), Rc::clone(&fx.dom)).with_scheduler(scheduler.clone());
    let component = fx.mount(ComponentDefinition::new("<p>{{ n }}</p>").state(json!({ "n": 0 })));

    component.state().set("n", 1);
    component.state().set("n", 2);

    assert_eq!(fx.text(), "0");
    assert_eq!(scheduler.pending(), 1);

    assert_eq!(scheduler.run_frame(), 1);
    assert_eq!(fx.text(), "2");
    assert_eq!(fx.dom.borrow().log().len(), 1);
}

#[test]
fn batched_mode_without_a_scheduler_falls_back_to_immediate() {
    let errors = capture_errors();
    let config = AppConfig::from_json(r#"{ "update_mode": "batched" }"#).expect("valid config");
    let mut fx = fixture(config);
    let component = fx.mount(ComponentDefinition::new("<p>{{ n }}</p>").state(json!({ "n": 0 })));
    clear_error_handler();

    component.state().set("n", 1);

    assert_eq!(fx.text(), "1");
    assert!(matches!(errors.borrow()[0], ZealError::Config(_)));
}

#[test]
fn busy_document_retries_the_render_on_the_next_frame() {
    let errors = capture_errors();
    let scheduler = Rc::new(ManualScheduler::new());
    let mut fx = fixture(AppConfig::default());
    fx.app = App::new(fx.app.config().clone(), Rc::clone(&fx.dom)).with_scheduler(scheduler.clone());
    let component = fx.mount(ComponentDefinition::new("<p>{{ n }}</p>").state(json!({ "n": 0 })));

    {
        let _busy = fx.dom.borrow();
        component.state().set("n", 1);
        component.state().set("n", 2);
    }
    clear_error_handler();

    assert_eq!(fx.text(), "0");
    assert_eq!(scheduler.pending(), 1);
    assert!(matches!(errors.borrow()[0], ZealError::Render(_)));

    assert_eq!(scheduler.run_frame(), 1);
    assert_eq!(fx.text(), "2");
    assert_eq!(component.render_count(), 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn mount_and_unmount_hooks_see_the_state() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let (on_mount, on_unmount) = (seen.clone(), seen.clone());
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(
        ComponentDefinition::new("<p>{{ n }}</p>")
            .state(json!({ "n": 4 }))
            .on_mounted(move |state| on_mount.borrow_mut().push(format!("mounted {}", state.get().get("n"))))
            .on_unmounted(move |state| {
                on_unmount.borrow_mut().push(format!("unmounted {}", state.get().get("n")));
            }),
    );
    let p = fx.root();

    component.unmount();
    component.unmount();

    assert_eq!(*seen.borrow(), ["mounted 4", "unmounted 4"]);
    assert!(!component.is_mounted());
    assert!(fx.dom.borrow().children(fx.container).is_empty());
    assert_eq!(*fx.hooks.borrow(), [(Lifecycle::Teardown, p)]);
}

#[test]
fn unmounted_components_ignore_state() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(ComponentDefinition::new("<p>{{ n }}</p>").state(json!({ "n": 0 })));

    component.unmount();
    component.state().set("n", 1);
    component.refresh();

    assert_eq!(component.render_count(), 0);
    assert!(component.tree().is_none());
    assert_eq!(component.state().listener_count(), 0);
}

#[test]
fn reloading_the_template_keeps_the_state() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(ComponentDefinition::new("<p>{{ n }}</p>").state(json!({ "n": 7 })));

    assert!(!component.reload_template("<p>{{ n }}</p>"));
    assert!(component.reload_template("<h2>n = {{ n }}</h2>"));

    let root = fx.root();
    assert_eq!(fx.dom.borrow().tag(root), Some("h2"));
    assert_eq!(fx.text(), "n = 7");
}

#[test]
fn unmount_all_empties_the_container() {
    let mut fx = fixture(AppConfig::default());
    fx.app.component("a", ComponentDefinition::new("<p>a</p>"));
    fx.app.component("b", ComponentDefinition::new("<p>b</p>"));
    fx.app.mount("a", &fx.container, Value::Null).expect("a");
    fx.app.mount("b", &fx.container, Value::Null).expect("b");
    assert_eq!(fx.text(), "ab");

    fx.app.unmount_all();

    assert!(fx.app.mounted().is_empty());
    assert_eq!(fx.text(), "");
}

#[test]
fn later_siblings_follow_their_root_after_an_earlier_unmount() {
    let mut fx = fixture(AppConfig::default());
    fx.app.component("first", ComponentDefinition::new("<p>first</p>"));
    fx.app.component(
        "second",
        ComponentDefinition::new("<p>{{ n }}</p>").state(json!({ "n": 0 })),
    );
    let first = fx.app.mount("first", &fx.container, Value::Null).expect("first");
    let second = fx.app.mount("second", &fx.container, Value::Null).expect("second");
    assert_eq!(second.index(), 1);

    first.unmount();
    second.state().set("n", 1);

    assert_eq!(fx.text(), "1");
    assert_eq!(fx.dom.borrow().children(fx.container).len(), 1);
    assert_eq!(second.index(), 0);

    second.unmount();
    assert_eq!(fx.text(), "");
}

#[test]
fn debug_output_reports_mount_state() {
    let mut fx = fixture(AppConfig::default());
    let component = fx.mount(ComponentDefinition::new("<p>hi</p>"));

    let shown = format!("{component:?}");
    assert!(shown.contains("mounted: true"), "{shown}");
    assert!(shown.contains("index: 0"), "{shown}");

    component.unmount();
    assert!(format!("{component:?}").contains("mounted: false"));
}
