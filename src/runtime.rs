use crate::{
	class::{ClassId, Classes, ComponentClass, Member},
	config::Config,
	dom::{Document, Mutation, NodeId},
	error::DomError,
	events::{Event, EventBus, ATTRIBUTE_CHANGE, NODE_INSERT, NODE_REMOVE},
	model::Model,
	plugin::Plugin,
	rc_hash_map::RcHashMap,
	registry::Registry,
	upgrade::BindingRule,
	value::Value,
};
use hashbrown::{HashMap, HashSet};
use std::{collections::VecDeque, rc::Rc};
use tracing::{debug, instrument, trace, trace_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
	Uninitialized,
	Initialized,
	Destroyed,
}

/// Everything the runtime tracks about one upgraded element.
#[derive(Debug)]
pub(crate) struct Instance {
	pub class: ClassId,
	pub model: Model,
	/// Whether the model was handed in by a binding rather than read from attributes.
	pub model_bound: bool,
	/// The model version the declared attributes last agreed with.
	pub seen_version: u64,
	pub props: HashMap<String, Value>,
	pub state: LifecycleState,
	pub rendered: bool,
	/// Nesting depth of syncs in progress; declared attributes written meanwhile aren't translated into the model.
	pub protected: u32,
	/// Level a pending super-call resolves from, after [`Scope::up`](`crate::Scope::up`) hops.
	pub cursor: Option<ClassId>,
	/// The cursor before the first hop, restored once the hops are consumed.
	pub hop_origin: Option<Option<ClassId>>,
	/// The flattened member view, iff prototype delegation is off.
	pub view: Option<HashMap<Rc<str>, ClassId>>,
	pub template: Option<String>,
	pub server_rendered: bool,
	pub plugins: Vec<(NodeId, Rc<str>)>,
}

impl Instance {
	pub fn new(class: ClassId) -> Self {
		Self {
			class,
			model: Model::new(),
			model_bound: false,
			seen_version: 0,
			props: HashMap::new(),
			state: LifecycleState::Uninitialized,
			rendered: false,
			protected: 0,
			cursor: None,
			hop_origin: None,
			view: None,
			template: None,
			server_rendered: false,
			plugins: Vec::new(),
		}
	}

	pub fn is_live(&self) -> bool {
		self.rendered && self.state == LifecycleState::Initialized
	}

	/// Live, with model changes not yet written to attributes and synced.
	pub fn is_stale(&self) -> bool {
		self.is_live() && self.model.version() != self.seen_version
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Task {
	Activate(NodeId),
}

/// The component runtime: document, class registry, instances, event bus and task queue in one place.
///
/// Nothing happens asynchronously on its own. Document changes and deferred work are processed by [`Runtime::tick`],
/// which plays the part of a host's task queue turn.
pub struct Runtime {
	pub(crate) config: Config,
	pub(crate) document: Document,
	pub(crate) classes: Classes,
	pub(crate) registry: Registry,
	pub(crate) instances: HashMap<NodeId, Instance>,
	/// Elements whose instance was torn down and released. They stay destroyed.
	pub(crate) destroyed: HashSet<NodeId>,
	pub(crate) bus: EventBus,
	pub(crate) tasks: VecDeque<Task>,
	pub(crate) plugins: HashMap<Rc<str>, Rc<dyn Plugin>>,
	pub(crate) plugin_activations: RcHashMap<(NodeId, Rc<str>), u16, Rc<dyn Plugin>>,
	pub(crate) bindings: Vec<BindingRule>,
	pub(crate) next_binding: u64,
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new(Config::default())
	}
}

impl Runtime {
	#[must_use]
	#[instrument]
	pub fn new(config: Config) -> Self {
		let mut runtime = Self {
			config,
			document: Document::new(),
			classes: Classes::new(),
			registry: Registry::new(),
			instances: HashMap::new(),
			destroyed: HashSet::new(),
			bus: EventBus::default(),
			tasks: VecDeque::new(),
			plugins: HashMap::new(),
			plugin_activations: RcHashMap::new(),
			bindings: Vec::new(),
			next_binding: 0,
		};
		runtime.wire_upgrader();
		runtime.wire_reactor();
		runtime
	}

	#[must_use]
	pub fn config(&self) -> &Config {
		&self.config
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	/// Direct document access. Attribute writes made here bypass `UI:attributechange`; use [`Runtime::set_attribute`] for those.
	pub fn document_mut(&mut self) -> &mut Document {
		&mut self.document
	}

	#[must_use]
	pub fn body(&self) -> NodeId {
		self.document.body()
	}

	#[must_use]
	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// The root class every component descends from.
	#[must_use]
	pub fn root_class(&self) -> ClassId {
		Classes::root()
	}

	/// # Panics
	///
	/// Iff `class` didn't come from this runtime.
	#[must_use]
	pub fn class(&self, class: ClassId) -> &ComponentClass {
		self.classes.get(class)
	}

	/// The class currently registered for `tag` (or `tag#pseudo`).
	#[must_use]
	pub fn class_of(&self, tag: &str) -> Option<ClassId> {
		self.registry.get(tag)
	}

	/// The class an element was upgraded with.
	#[must_use]
	pub fn class_of_element(&self, element: NodeId) -> Option<ClassId> {
		self.instances.get(&element).map(|instance| instance.class)
	}

	/// Whether `element` was ever upgraded. Destroyed elements count, but can't be upgraded again.
	#[must_use]
	pub fn is_upgraded(&self, element: NodeId) -> bool {
		self.instances.contains_key(&element) || self.destroyed.contains(&element)
	}

	#[must_use]
	pub fn lifecycle_state(&self, element: NodeId) -> Option<LifecycleState> {
		match self.instances.get(&element) {
			Some(instance) => Some(instance.state),
			None if self.destroyed.contains(&element) => Some(LifecycleState::Destroyed),
			None => None,
		}
	}

	/// The model `element` reads from. Destroyed instances release theirs.
	#[must_use]
	pub fn model(&self, element: NodeId) -> Option<Model> {
		self.instances.get(&element).map(|instance| instance.model.clone())
	}

	#[must_use]
	pub fn prop(&self, element: NodeId, name: &str) -> Option<Value> {
		self.instances.get(&element)?.props.get(name).cloned()
	}

	pub fn set_prop(&mut self, element: NodeId, name: &str, value: impl Into<Value>) {
		match self.instances.get_mut(&element) {
			Some(instance) => {
				instance.props.insert(name.to_owned(), value.into());
			}
			None => warn!(?element, "Can't set a property on an element that isn't upgraded."),
		}
	}

	/// The child content captured on first initialization.
	#[must_use]
	pub fn design_template(&self, element: NodeId) -> Option<&str> {
		self.instances.get(&element)?.template.as_deref()
	}

	/// Whether the element's model was recovered from an embedded snapshot.
	#[must_use]
	pub fn is_server_rendered(&self, element: NodeId) -> bool {
		self.instances.get(&element).map_or(false, |instance| instance.server_rendered)
	}

	/// Creates a detached element, upgrading it right away if its tag is registered.
	///
	/// Activation still waits for the element to be attached and for the next [`Runtime::tick`].
	pub fn create_element(&mut self, tag: &str) -> NodeId {
		let element = self.document.create_element(tag);
		self.upgrade_if_registered(element);
		element
	}

	/// Creates a detached element carrying an `is` discriminator for pseudo variants.
	pub fn create_element_is(&mut self, tag: &str, is: &str) -> NodeId {
		let element = self.document.create_element(tag);
		if let Err(error) = self.document.set_attribute(element, "is", is) {
			warn!("Could not set `is` on a new element: {}", error);
		}
		self.upgrade_if_registered(element);
		element
	}

	pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
		self.document.append_child(parent, child)
	}

	pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<(), DomError> {
		self.document.insert_before(parent, child, reference)
	}

	pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
		self.document.remove(node)
	}

	#[must_use]
	pub fn attribute(&self, element: NodeId, name: &str) -> Option<&str> {
		self.document.attribute(element, name)
	}

	/// Sets an attribute and announces it with `UI:attributechange`, which is what feeds declared attributes into the model.
	#[instrument(skip(self, value))]
	pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> Result<(), DomError> {
		if self.document.set_attribute(element, name, value)? {
			self.attribute_changed(element, name);
		}
		Ok(())
	}

	#[instrument(skip(self))]
	pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> Result<(), DomError> {
		if self.document.remove_attribute(element, name)? {
			self.attribute_changed(element, name);
		}
		Ok(())
	}

	fn attribute_changed(&mut self, element: NodeId, name: &str) {
		if cfg!(feature = "dangerous-logging") {
			trace!(?element, name, value = ?self.document.attribute(element, name), "Attribute changed.");
		}
		self.emit(Event::new(ATTRIBUTE_CHANGE).target(element).names(vec![name.into()]));
	}

	/// Processes recorded document mutations and queued tasks until both are exhausted, then runs the finalizers.
	///
	/// Repeats while finalizers cause further work, up to [`Config::max_settle_rounds`] times.
	#[instrument(skip(self))]
	pub fn tick(&mut self) {
		for round in 0..self.config.max_settle_rounds {
			let span = trace_span!("Settling", round);
			let _enter = span.enter();
			loop {
				let mutations = self.document.take_mutations();
				if !mutations.is_empty() {
					for mutation in mutations {
						match mutation {
							Mutation::Inserted(node) => self.emit(Event::new(NODE_INSERT).target(node)),
							Mutation::Removed(node) => self.emit(Event::new(NODE_REMOVE).target(node)),
						};
					}
					continue;
				}
				match self.tasks.pop_front() {
					Some(task) => self.run_task(task),
					None => break,
				}
			}

			for finalizer in self.bus.finalizers() {
				finalizer(self);
			}
			if !self.document.has_pending_mutations() && self.tasks.is_empty() && !self.has_stale_models() {
				debug!(rounds = round + 1, "Settled.");
				return;
			}
		}
		warn!("The runtime didn't settle within {} rounds; continuing on the next tick.", self.config.max_settle_rounds);
	}

	fn run_task(&mut self, task: Task) {
		trace!(?task, "Running task.");
		match task {
			Task::Activate(element) => self.activate(element),
		}
	}

	/// Calls a method on an instance the way `element.name(args)` would, resolving from its most-derived class.
	///
	/// Lifecycle names are not callable this way; use the `*_ui` entry points.
	#[instrument(skip(self, args))]
	pub fn call(&mut self, element: NodeId, name: &str, args: &[Value]) -> Option<Value> {
		self.call_virtual(element, name, args)
	}

	/// Reads a value member through the instance's class chain.
	#[must_use]
	pub fn member(&self, element: NodeId, name: &str) -> Option<Value> {
		match self.lookup(element, name)?.member {
			Member::Value(value) => Some(value),
			Member::Method(_) => None,
		}
	}

	/// Upgraded elements whose class is `class` or descends from it, in document order of their ids.
	pub(crate) fn instances_of(&self, class: ClassId) -> Vec<NodeId> {
		let mut elements: Vec<NodeId> = self.instances.iter().filter(|(_, instance)| self.classes.descends_from(instance.class, class)).map(|(&element, _)| element).collect();
		elements.sort_unstable();
		elements
	}
}
