use itags::{
	events::{Event, Filter},
	selector::Selector,
	Document, DomError, Runtime,
};
use std::{cell::RefCell, rc::Rc};

use runtime_::{runtime, Log};

fn recorder(log: &Log, entry: &'static str) -> impl Fn(&mut Runtime, &Event) + 'static {
	let log = log.clone();
	move |_, _| log.push(entry)
}

#[test]
fn before_subscribers_can_prevent() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.before("x:ping", None, recorder(&log, "before"));
	runtime.after("x:ping", None, recorder(&log, "after"));

	assert!(runtime.emit(Event::new("x:ping")));
	assert_eq!(log.entries(), ["before", "after"]);

	let blocker = runtime.before("x:*", None, |_, event| event.prevent_default());
	assert!(!runtime.emit(Event::new("x:ping")));
	assert_eq!(log.entries(), ["before", "after", "before"]);

	assert!(runtime.detach(blocker));
	assert!(!runtime.detach(blocker));
	assert!(runtime.emit(Event::new("x:ping")));
	assert_eq!(log.count("after"), 2);
}

#[test]
fn patterns_match_by_emitter_and_kind() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.after("*:ping", None, recorder(&log, "any emitter"));
	runtime.after("x:*", None, recorder(&log, "any kind"));
	runtime.after("pong", None, recorder(&log, "bare kind"));

	runtime.emit(Event::new("y:ping"));
	runtime.emit(Event::new("x:other"));
	runtime.emit(Event::new("z:pong"));
	assert_eq!(log.entries(), ["any emitter", "any kind", "bare kind"]);

	let event = Event::new("x-widget:prototypechange");
	assert_eq!(event.emitter(), "x-widget");
	assert_eq!(event.kind(), "prototypechange");
}

#[test]
fn filters_and_once_subscriptions() {
	let mut runtime = runtime();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let body = runtime.body();
	let element = runtime.create_element("div");

	let only_element: Filter = Rc::new(move |_: &Runtime, event: &Event| event.target == Some(element));
	let sink = seen.clone();
	runtime.once_after("x:ping", Some(only_element), move |_, event| sink.borrow_mut().push(event.target));

	runtime.emit(Event::new("x:ping").target(body));
	assert!(seen.borrow().is_empty());
	runtime.emit(Event::new("x:ping").target(element));
	runtime.emit(Event::new("x:ping").target(element));
	assert_eq!(*seen.borrow(), [Some(element)]);
}

#[test]
fn subscribers_detached_mid_dispatch_are_skipped() {
	let mut runtime = runtime();
	let log = Log::default();
	let victim = Rc::new(RefCell::new(None));

	let target = victim.clone();
	let first = log.clone();
	runtime.after("x:ping", None, move |runtime, _| {
		first.push("first");
		if let Some(id) = target.borrow_mut().take() {
			runtime.detach(id);
		}
	});
	*victim.borrow_mut() = Some(runtime.after("x:ping", None, recorder(&log, "second")));

	runtime.emit(Event::new("x:ping"));
	assert_eq!(log.entries(), ["first"]);
}

#[test]
fn finalizers_run_once_per_tick() {
	let mut runtime = runtime();
	let log = Log::default();
	let finalizer_log = log.clone();
	runtime.finalize(move |_| finalizer_log.push("finalize"));

	runtime.tick();
	runtime.tick();
	assert_eq!(log.count("finalize"), 2);
}

#[test]
fn insertions_and_removals_become_events() {
	let mut runtime = runtime();
	let log = Log::default();
	runtime.after("UI:nodeinsert", None, recorder(&log, "insert"));
	runtime.after("UI:noderemove", None, recorder(&log, "remove"));

	let body = runtime.body();
	let outer = runtime.create_element("div");
	let inner = runtime.create_element("span");
	runtime.append_child(outer, inner).unwrap();
	runtime.tick();
	assert!(log.entries().is_empty(), "detached changes aren't announced");

	runtime.append_child(body, outer).unwrap();
	runtime.tick();
	assert_eq!(log.entries(), ["insert"]);

	runtime.remove(outer).unwrap();
	runtime.tick();
	assert_eq!(log.entries(), ["insert", "remove"]);
}

#[test]
fn tree_errors() {
	let mut document = Document::new();
	let body = document.body();
	let outer = document.create_element("div");
	let inner = document.create_element("div");
	let text = document.create_text("text");
	document.append_child(body, outer).unwrap();
	document.append_child(outer, inner).unwrap();

	assert_eq!(document.append_child(inner, outer), Err(DomError::Cycle { parent: inner, child: outer }));
	assert_eq!(document.append_child(outer, outer), Err(DomError::Cycle { parent: outer, child: outer }));
	assert_eq!(document.append_child(outer, body), Err(DomError::BodyImmovable));
	assert_eq!(document.remove(body), Err(DomError::BodyImmovable));
	assert_eq!(document.append_child(text, inner), Err(DomError::NotAnElement(text)));
	assert_eq!(document.insert_before(body, text, Some(inner)), Err(DomError::NotAChild { parent: body, reference: inner }));
	assert_eq!(document.set_attribute(text, "a", "b"), Err(DomError::NotAnElement(text)));

	document.insert_before(outer, text, Some(inner)).unwrap();
	assert_eq!(document.children(outer), [text, inner]);
	assert!(document.is_attached(text));
	assert!(document.contains(outer, inner));
	assert!(!document.contains(inner, outer));
}

#[test]
fn serialization_escapes() {
	let mut document = Document::new();
	let element = document.create_element("P");
	document.set_attribute(element, "title", "a \"quoted\" <value> & more").unwrap();
	let text = document.create_text("1 < 2 & \"fine\"");
	let comment = document.create_comment(" note ");
	document.append_child(element, text).unwrap();
	document.append_child(element, comment).unwrap();

	assert_eq!(document.inner_html(element), "1 &lt; 2 &amp; \"fine\"<!-- note -->");
	assert_eq!(
		document.outer_html(element),
		"<p title=\"a &quot;quoted&quot; &lt;value&gt; &amp; more\">1 &lt; 2 &amp; \"fine\"<!-- note --></p>"
	);
	assert_eq!(document.text_content(element), "1 < 2 & \"fine\"");

	document.set_text_content(element, "plain").unwrap();
	assert_eq!(document.inner_html(element), "plain");
	document.set_text_content(element, "").unwrap();
	assert!(document.children(element).is_empty());
}

#[test]
fn selectors() {
	let mut document = Document::new();
	let body = document.body();
	let element = document.create_element("x-card");
	document.set_attribute(element, "id", "main").unwrap();
	document.set_attribute(element, "class", "big  shared").unwrap();
	document.set_attribute(element, "data-kind", "news").unwrap();
	document.append_child(body, element).unwrap();

	let matches = |source: &str| document.matches(element, &Selector::parse(source).unwrap());
	assert!(matches("*"));
	assert!(matches("x-card"));
	assert!(matches("X-Card"));
	assert!(matches("#main"));
	assert!(matches(".shared.big"));
	assert!(matches("x-card[data-kind]"));
	assert!(matches("[data-kind=news]"));
	assert!(matches("[data-kind='news']"));
	assert!(matches("div, .big"));
	assert!(!matches("div"));
	assert!(!matches(".small"));
	assert!(!matches("[data-kind=sports]"));
	assert!(!matches("x-card#other"));

	assert_eq!(document.query_all(body, &Selector::parse(".big").unwrap()), [element]);

	for unsupported in ["div p", "div > p", "a,", "[", ".", "p:hover"] {
		assert!(Selector::parse(unsupported).is_err(), "{:?} should be rejected", unsupported);
	}
	assert_eq!(Selector::parse("div,  p q").unwrap_err().position, 7);
}
