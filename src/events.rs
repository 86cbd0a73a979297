//! A small event bus in the `emitter:type` style.
//!
//! Subscribers listen `before` (and may prevent the event) or `after` it. Patterns may use `*` for either half.
//! Subscriptions can have an owning element, which lets the runtime detach everything an instance subscribed to when it is destroyed.
//! `finalize` callbacks run once at the end of every [`Runtime::tick`].

use crate::{class::ClassId, dom::NodeId, Runtime};
use core::cell::Cell;
use std::rc::Rc;
use tracing::{instrument, trace, trace_span};

pub type Callback = Rc<dyn Fn(&mut Runtime, &Event)>;
pub type Filter = Rc<dyn Fn(&Runtime, &Event) -> bool>;
pub type Finalizer = Rc<dyn Fn(&mut Runtime)>;

pub const NODE_INSERT: &str = "UI:nodeinsert";
pub const NODE_REMOVE: &str = "UI:noderemove";
pub const ATTRIBUTE_CHANGE: &str = "UI:attributechange";
pub const RENDERED: &str = "itag:rendered";

#[derive(Debug)]
pub struct Event {
	name: Rc<str>,
	pub target: Option<NodeId>,
	pub class: Option<ClassId>,
	/// Changed member or attribute names, depending on the event.
	pub names: Vec<Rc<str>>,
	prevented: Cell<bool>,
}

impl Event {
	#[must_use]
	pub fn new(name: &str) -> Self {
		Self {
			name: name.into(),
			target: None,
			class: None,
			names: Vec::new(),
			prevented: Cell::new(false),
		}
	}

	#[must_use]
	pub fn target(mut self, target: NodeId) -> Self {
		self.target = Some(target);
		self
	}

	#[must_use]
	pub fn class(mut self, class: ClassId) -> Self {
		self.class = Some(class);
		self
	}

	#[must_use]
	pub fn names(mut self, names: Vec<Rc<str>>) -> Self {
		self.names = names;
		self
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.name
	}

	#[must_use]
	pub fn emitter(&self) -> &str {
		self.name.split_once(':').map_or("", |(emitter, _)| emitter)
	}

	#[must_use]
	pub fn kind(&self) -> &str {
		self.name.split_once(':').map_or(&self.name, |(_, kind)| kind)
	}

	/// Only has an effect from `before` subscribers.
	pub fn prevent_default(&self) {
		self.prevented.set(true);
	}

	#[must_use]
	pub fn is_prevented(&self) -> bool {
		self.prevented.get()
	}

	#[must_use]
	pub fn has_name(&self, name: &str) -> bool {
		self.names.iter().any(|n| &**n == name)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Before,
	After,
}

struct Subscription {
	id: SubscriptionId,
	phase: Phase,
	emitter: Rc<str>,
	kind: Rc<str>,
	filter: Option<Filter>,
	callback: Callback,
	once: bool,
	owner: Option<NodeId>,
}

impl Subscription {
	fn matches(&self, event: &Event) -> bool {
		(&*self.emitter == "*" || &*self.emitter == event.emitter()) && (&*self.kind == "*" || &*self.kind == event.kind())
	}
}

#[derive(Default)]
pub struct EventBus {
	subscriptions: Vec<Subscription>,
	finalizers: Vec<Finalizer>,
	next_id: u64,
}

impl EventBus {
	pub(crate) fn subscribe(&mut self, phase: Phase, pattern: &str, filter: Option<Filter>, callback: Callback, once: bool, owner: Option<NodeId>) -> SubscriptionId {
		let (emitter, kind) = pattern.split_once(':').unwrap_or(("*", pattern));
		let id = SubscriptionId(self.next_id);
		self.next_id += 1;
		self.subscriptions.push(Subscription {
			id,
			phase,
			emitter: emitter.into(),
			kind: kind.into(),
			filter,
			callback,
			once,
			owner,
		});
		id
	}

	pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
		self.subscriptions.iter().any(|s| s.id == id)
	}

	pub(crate) fn detach(&mut self, id: SubscriptionId) -> bool {
		let before = self.subscriptions.len();
		self.subscriptions.retain(|s| s.id != id);
		self.subscriptions.len() != before
	}

	/// Returns how many subscriptions were dropped.
	pub(crate) fn detach_owner(&mut self, owner: NodeId) -> usize {
		let before = self.subscriptions.len();
		self.subscriptions.retain(|s| s.owner != Some(owner));
		before - self.subscriptions.len()
	}

	pub(crate) fn add_finalizer(&mut self, finalizer: Finalizer) {
		self.finalizers.push(finalizer);
	}

	pub(crate) fn finalizers(&self) -> Vec<Finalizer> {
		self.finalizers.clone()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.subscriptions.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.subscriptions.is_empty()
	}

	/// Subscriptions owned by `owner`.
	#[must_use]
	pub fn owned_by(&self, owner: NodeId) -> usize {
		self.subscriptions.iter().filter(|s| s.owner == Some(owner)).count()
	}
}

impl Runtime {
	pub fn before(&mut self, pattern: &str, filter: Option<Filter>, callback: impl Fn(&mut Runtime, &Event) + 'static) -> SubscriptionId {
		self.bus.subscribe(Phase::Before, pattern, filter, Rc::new(callback), false, None)
	}

	pub fn after(&mut self, pattern: &str, filter: Option<Filter>, callback: impl Fn(&mut Runtime, &Event) + 'static) -> SubscriptionId {
		self.bus.subscribe(Phase::After, pattern, filter, Rc::new(callback), false, None)
	}

	/// Like [`Runtime::after`], but detaches itself after the first matching event.
	pub fn once_after(&mut self, pattern: &str, filter: Option<Filter>, callback: impl Fn(&mut Runtime, &Event) + 'static) -> SubscriptionId {
		self.bus.subscribe(Phase::After, pattern, filter, Rc::new(callback), true, None)
	}

	/// Registers a callback that runs once at the end of every [`Runtime::tick`], after the document and task queue have settled.
	pub fn finalize(&mut self, finalizer: impl Fn(&mut Runtime) + 'static) {
		self.bus.add_finalizer(Rc::new(finalizer));
	}

	pub fn detach(&mut self, subscription: SubscriptionId) -> bool {
		self.bus.detach(subscription)
	}

	#[must_use]
	pub fn events(&self) -> &EventBus {
		&self.bus
	}

	/// Runs `before` subscribers, then (unless prevented) `after` subscribers. Returns whether the event went through.
	#[instrument(skip(self, event), fields(name = event.name()))]
	pub fn emit(&mut self, event: Event) -> bool {
		self.dispatch_phase(Phase::Before, &event);
		if event.is_prevented() {
			trace!("Event was prevented.");
			return false;
		}
		self.dispatch_phase(Phase::After, &event);
		true
	}

	fn dispatch_phase(&mut self, phase: Phase, event: &Event) {
		let matching: Vec<(SubscriptionId, Callback, bool)> = self
			.bus
			.subscriptions
			.iter()
			.filter(|s| s.phase == phase && s.matches(event))
			.filter(|s| s.filter.as_ref().map_or(true, |filter| filter(self, event)))
			.map(|s| (s.id, s.callback.clone(), s.once))
			.collect();

		for (id, callback, once) in matching {
			let live = if once { self.bus.detach(id) } else { self.bus.contains(id) };
			if !live {
				// Detached by an earlier subscriber of the same event.
				continue;
			}
			let span = trace_span!("Subscriber", ?id, ?phase);
			let _enter = span.enter();
			callback(self, event);
		}
	}
}
