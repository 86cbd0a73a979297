use itags::{events::Event, LifecycleState, Members, Runtime, Scope, SubclassOptions, Value};
use std::{cell::Cell, rc::Rc};

use runtime_::{mount, runtime, unmount, Log};

fn setter(level: &'static str) -> impl Fn(&mut Scope<'_>) + 'static {
	move |scope| {
		scope.set(level, level);
		scope.set("shared", level);
	}
}

/// `x-a` <- `x-b` <- `x-c`, each with an init hook setting its own field and `shared`.
fn three_levels(runtime: &mut Runtime, middle: SubclassOptions) {
	let a = runtime.define_component("x-a", Members::new().hook("init", setter("a")), true);
	let b = runtime.subclass(a, "x-b", Members::new().hook("init", setter("b")), middle);
	runtime.subclass(b, "x-c", Members::new().hook("init", setter("c")), SubclassOptions::default());
}

#[test]
fn init_chains_top_down() {
	let mut runtime = runtime();
	three_levels(&mut runtime, SubclassOptions::default());
	let element = mount(&mut runtime, "x-c");

	assert_eq!(runtime.prop(element, "a"), Some(Value::from("a")));
	assert_eq!(runtime.prop(element, "b"), Some(Value::from("b")));
	assert_eq!(runtime.prop(element, "c"), Some(Value::from("c")));
	assert_eq!(runtime.prop(element, "shared"), Some(Value::from("c")));
	assert_eq!(runtime.lifecycle_state(element), Some(LifecycleState::Initialized));
	assert!(runtime.is_initialized(element));
	assert!(runtime.is_rendered(element));
}

#[test]
fn destroy_chains_bottom_up() {
	let mut runtime = runtime();
	let log = Log::default();
	let a = runtime.define_component("x-a", Members::new().hook("destroy", log.hook("a")), true);
	let b = runtime.subclass(a, "x-b", Members::new().hook("destroy", log.hook("b")), SubclassOptions::default());
	runtime.subclass(b, "x-c", Members::new().hook("destroy", log.hook("c")), SubclassOptions::default());

	let element = mount(&mut runtime, "x-c");
	assert!(log.entries().is_empty());

	unmount(&mut runtime, element);
	assert_eq!(log.entries(), ["c", "b", "a"]);
	assert!(runtime.is_destroyed(element));
	assert!(!runtime.is_rendered(element));
}

#[test]
fn chain_destroy_boundary() {
	let mut runtime = runtime();
	let log = Log::default();
	let a = runtime.define_component("x-a", Members::new().hook("destroy", log.hook("a")), true);
	let b = runtime.subclass(a, "x-b", Members::new().hook("destroy", log.hook("b")), SubclassOptions::default().chain_destroy(false));
	runtime.subclass(b, "x-c", Members::new().hook("destroy", log.hook("c")), SubclassOptions::default());

	let element = mount(&mut runtime, "x-c");
	unmount(&mut runtime, element);
	assert_eq!(log.entries(), ["c", "b"]);
}

#[test]
fn chain_init_boundary() {
	let mut runtime = runtime();
	three_levels(&mut runtime, SubclassOptions::default().chain_init(false));
	let element = mount(&mut runtime, "x-c");

	assert_eq!(runtime.prop(element, "a"), None);
	assert_eq!(runtime.prop(element, "b"), Some(Value::from("b")));
	assert_eq!(runtime.prop(element, "c"), Some(Value::from("c")));
}

#[test]
fn chain_init_boundary_can_be_crossed_explicitly() {
	let mut runtime = runtime();
	let a = runtime.define_component("x-a", Members::new().hook("init", setter("a")), true);
	let b = runtime.subclass(a, "x-b", Members::new().hook("init", setter("b")), SubclassOptions::default().chain_init(false));
	runtime.subclass(
		b,
		"x-c",
		Members::new().hook("init", |scope| {
			// `x-c` chains into `x-b` automatically, so only the level above `x-b` may be called by hand.
			assert_eq!(scope.call_super("init", &[]), None);
			scope.up().call_super("init", &[]);
			scope.set("c", "c");
		}),
		SubclassOptions::default(),
	);

	let element = mount(&mut runtime, "x-c");
	assert_eq!(runtime.prop(element, "a"), Some(Value::from("a")));
	assert_eq!(runtime.prop(element, "b"), Some(Value::from("b")));
	assert_eq!(runtime.prop(element, "c"), Some(Value::from("c")));
	assert_eq!(runtime.prop(element, "shared"), Some(Value::from("a")));
}

#[test]
fn teardown_runs_once() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.define_component("x-once", Members::new().hook("destroy", log.hook("destroy")), true);
	let element = mount(&mut runtime, "x-once");

	assert!(!runtime.destroy_ui(element), "attached elements can't be torn down by hand");
	assert!(log.entries().is_empty());

	unmount(&mut runtime, element);
	assert_eq!(log.count("destroy"), 1);

	assert!(!runtime.destroy_ui(element));
	runtime.tick();
	assert_eq!(log.count("destroy"), 1);
	assert!(runtime.is_destroyed(element));
}

#[test]
fn destroyed_instances_are_released() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.define_component("x-churn", Members::new().hook("init", log.hook("init")).hook("destroy", log.hook("destroy")), true);

	let mut last = None;
	for _ in 0..100 {
		let element = mount(&mut runtime, "x-churn");
		unmount(&mut runtime, element);
		last = Some(element);
	}
	let element = last.unwrap();
	assert_eq!(log.count("init"), 100);
	assert_eq!(log.count("destroy"), 100);

	assert!(runtime.is_destroyed(element));
	assert_eq!(runtime.lifecycle_state(element), Some(LifecycleState::Destroyed));
	assert!(runtime.model(element).is_none());
	assert!(runtime.class_of_element(element).is_none());
	assert!(!runtime.destroy_ui(element));

	// Re-inserting doesn't bring it back.
	let body = runtime.body();
	runtime.append_child(body, element).unwrap();
	runtime.tick();
	assert_eq!(log.count("init"), 100);
	assert!(runtime.is_destroyed(element));
	assert!(!runtime.is_rendered(element));
}

#[test]
fn public_entry_points_are_guarded() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.define_component("x-guarded", Members::new().hook("init", log.hook("init")).hook("sync", log.hook("sync")), true);
	let element = mount(&mut runtime, "x-guarded");
	assert_eq!(log.entries(), ["init", "sync"]);

	assert!(!runtime.init_ui(element));
	assert!(runtime.sync_ui(element, &[]));
	assert_eq!(log.entries(), ["init", "sync", "sync"]);

	unmount(&mut runtime, element);
	assert!(!runtime.init_ui(element));
	assert!(!runtime.render_ui(element));
	assert!(!runtime.sync_ui(element, &[]));
	assert!(!runtime.reinitialize_ui(element));
	assert_eq!(log.entries(), ["init", "sync", "sync"]);
}

#[test]
fn reinitialize_runs_destroy_then_init_in_place() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.define_component(
		"x-again",
		Members::new().hook("init", log.hook("init")).hook("render", log.hook("render")).hook("sync", log.hook("sync")).hook("destroy", log.hook("destroy")),
		true,
	);
	let element = mount(&mut runtime, "x-again");

	let state = Rc::new(Cell::new(None));
	let observed = state.clone();
	let class = runtime.class_of("x-again").unwrap();
	runtime.merge_prototypes(
		class,
		Members::new().method("peek", move |scope, _| {
			let element = scope.element();
			observed.set(scope.runtime().lifecycle_state(element));
			None
		}),
		true,
		true,
	);

	assert!(runtime.reinitialize_ui(element));
	assert_eq!(log.entries(), ["init", "render", "sync", "destroy", "init", "render", "sync"]);
	assert_eq!(runtime.lifecycle_state(element), Some(LifecycleState::Initialized));
	assert!(runtime.is_rendered(element));

	runtime.call(element, "peek", &[]);
	assert_eq!(state.get(), Some(LifecycleState::Initialized));
}

#[test]
fn removal_before_activation_cancels_it() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.define_component("x-brief", Members::new().hook("init", log.hook("init")).hook("destroy", log.hook("destroy")), true);

	let element = runtime.create_element("x-brief");
	let body = runtime.body();
	runtime.append_child(body, element).unwrap();
	runtime.remove(element).unwrap();
	runtime.tick();

	assert!(log.entries().is_empty());
	assert_eq!(runtime.lifecycle_state(element), Some(LifecycleState::Uninitialized));
	assert!(!runtime.is_rendered(element));
}

#[test]
fn detached_elements_wait_for_insertion() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.define_component("x-waiting", Members::new().hook("init", log.hook("init")), true);

	let element = runtime.create_element("x-waiting");
	assert!(runtime.is_upgraded(element));
	runtime.tick();
	assert!(log.entries().is_empty());

	let body = runtime.body();
	runtime.append_child(body, element).unwrap();
	assert!(log.entries().is_empty(), "activation is deferred to the next tick");
	runtime.tick();
	assert_eq!(log.entries(), ["init"]);
}

#[test]
fn moving_keeps_instances_alive() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.define_component("x-moved", Members::new().hook("init", log.hook("init")).hook("destroy", log.hook("destroy")), true);
	let element = mount(&mut runtime, "x-moved");

	let body = runtime.body();
	let container = runtime.create_element("div");
	runtime.append_child(body, container).unwrap();
	runtime.append_child(container, element).unwrap();
	runtime.tick();

	assert_eq!(log.entries(), ["init"]);
	assert!(runtime.is_rendered(element));
}

#[test]
fn removing_a_subtree_destroys_nested_instances() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.define_component("x-outer", Members::new().hook("destroy", log.hook("outer")), true);
	runtime.define_component("x-inner", Members::new().hook("destroy", log.hook("inner")), true);

	let outer = runtime.create_element("x-outer");
	let inner = runtime.create_element("x-inner");
	runtime.append_child(outer, inner).unwrap();
	let body = runtime.body();
	runtime.append_child(body, outer).unwrap();
	runtime.tick();
	assert!(runtime.is_rendered(inner));

	unmount(&mut runtime, outer);
	assert_eq!(log.entries(), ["outer", "inner"]);
	assert!(runtime.is_destroyed(inner));
}

#[test]
fn design_template_is_captured_before_rendering() {
	let mut runtime = runtime();
	runtime.define_component(
		"x-designed",
		Members::new().hook("render", |scope| {
			let template = scope.design_template().unwrap_or_default();
			scope.set_text(&format!("rendered from {}", template.len())).unwrap();
		}),
		true,
	);

	let element = runtime.create_element("x-designed");
	let text = runtime.document_mut().create_text("design");
	let span = runtime.document_mut().create_element("span");
	runtime.append_child(element, text).unwrap();
	runtime.append_child(element, span).unwrap();
	let body = runtime.body();
	runtime.append_child(body, element).unwrap();
	runtime.tick();

	assert_eq!(runtime.design_template(element), Some("design<span></span>"));
	assert_eq!(runtime.document().text_content(element), "rendered from 19");
	assert!(!runtime.is_server_rendered(element));
}

#[test]
fn ready_fires_once_rendered() {
	let mut runtime = runtime();
	runtime.define_component("x-ready", Members::new(), true);
	let calls = Rc::new(Cell::new(0));

	let element = runtime.create_element("x-ready");
	let counter = calls.clone();
	runtime.ready(element, move |_| counter.set(counter.get() + 1));
	assert_eq!(calls.get(), 0);

	let body = runtime.body();
	runtime.append_child(body, element).unwrap();
	runtime.tick();
	assert_eq!(calls.get(), 1);

	let counter = calls.clone();
	runtime.ready(element, move |_| counter.set(counter.get() + 1));
	assert_eq!(calls.get(), 2);

	let other = mount(&mut runtime, "x-ready");
	assert!(runtime.is_rendered(other));
	assert_eq!(calls.get(), 2);
}

#[test]
fn instance_subscriptions_end_with_the_instance() {
	let mut runtime = runtime();
	let pings = Rc::new(Cell::new(0));
	let counter = pings.clone();
	runtime.define_component(
		"x-listener",
		Members::new().hook("init", move |scope| {
			let counter = counter.clone();
			scope.after("x:ping", None, move |_, _| counter.set(counter.get() + 1));
		}),
		true,
	);
	let element = mount(&mut runtime, "x-listener");
	assert_eq!(runtime.events().owned_by(element), 1);

	runtime.emit(Event::new("x:ping"));
	assert_eq!(pings.get(), 1);

	unmount(&mut runtime, element);
	assert_eq!(runtime.events().owned_by(element), 0);
	runtime.emit(Event::new("x:ping"));
	assert_eq!(pings.get(), 1);
}
