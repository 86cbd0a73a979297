//! Upgrading elements to component instances, deferred first activation and the attribute/model feedback loop.

use crate::{
	class::ClassId,
	dom::NodeId,
	events::{ATTRIBUTE_CHANGE, NODE_INSERT, NODE_REMOVE},
	model::Model,
	runtime::{Instance, LifecycleState, Task},
	selector::{Selector, SelectorError},
	Runtime,
};
use tracing::{debug, instrument, trace, trace_span, warn};

/// A document-level rule that hands a shared model to every matching instance when it activates.
#[derive(Debug)]
pub(crate) struct BindingRule {
	pub id: u64,
	pub selector: Selector,
	pub model: Model,
	pub scope: Option<NodeId>,
}

impl BindingRule {
	fn applies_to(&self, runtime: &Runtime, element: NodeId) -> bool {
		runtime.document.matches(element, &self.selector) && self.scope.map_or(true, |scope| runtime.document.contains(scope, element))
	}
}

/// Detach handle for [`Runtime::bind_model_selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "Without this handle, the binding rule can't be detached."]
pub struct ModelBinding(u64);

impl Runtime {
	pub(crate) fn wire_upgrader(&mut self) {
		self.after(NODE_INSERT, None, |runtime, event| {
			let Some(target) = event.target else { return };
			let mut nodes = vec![target];
			nodes.extend(runtime.document.descendants(target));
			for node in nodes {
				if !runtime.document.is_element(node) {
					continue;
				}
				if !runtime.is_upgraded(node) {
					runtime.upgrade_if_registered(node);
				}
				if runtime.lifecycle_state(node) == Some(LifecycleState::Uninitialized) {
					runtime.tasks.push_back(Task::Activate(node));
				}
			}
		});

		self.after(NODE_REMOVE, None, |runtime, event| {
			let Some(target) = event.target else { return };
			let mut nodes = vec![target];
			nodes.extend(runtime.document.descendants(target));
			let upgraded: Vec<NodeId> = nodes.into_iter().filter(|&node| runtime.is_upgraded(node)).collect();
			for node in upgraded {
				runtime.destroy(node, false);
			}
		});

		self.after(ATTRIBUTE_CHANGE, None, |runtime, event| {
			let (Some(element), Some(name)) = (event.target, event.names.first()) else { return };
			runtime.attribute_to_model(element, name);
		});

		self.finalize(Runtime::refresh);
	}

	/// Upgrades `element` to `class`. Activation is queued if it is attached already, and otherwise happens once it is inserted.
	///
	/// Elements keep the class they were first upgraded with.
	#[instrument(skip(self))]
	pub fn upgrade(&mut self, element: NodeId, class: ClassId) -> bool {
		if let Some(existing) = self.instances.get(&element) {
			trace!(class = ?existing.class, "Already upgraded.");
			return false;
		}
		if self.destroyed.contains(&element) {
			trace!("Destroyed elements stay destroyed.");
			return false;
		}
		if self.classes.try_get(class).is_none() || !self.document.is_element(element) {
			warn!("Can only upgrade elements to classes of this runtime.");
			return false;
		}

		let mut instance = Instance::new(class);
		if !self.config.prototype_delegation {
			instance.view = Some(self.classes.flatten(class));
		}
		self.instances.insert(element, instance);
		if self.document.is_attached(element) {
			self.tasks.push_back(Task::Activate(element));
		}
		true
	}

	pub(crate) fn upgrade_if_registered(&mut self, element: NodeId) -> bool {
		let Some(tag) = self.document.tag(element) else { return false };
		match self.registry.lookup_element(tag, self.document.attribute(element, "is")) {
			Some(class) => self.upgrade(element, class),
			None => false,
		}
	}

	/// Upgrades every not-yet-upgraded attached element that `class` is registered for.
	pub(crate) fn upgrade_existing(&mut self, class: ClassId) {
		let body = self.document.body();
		let candidates: Vec<NodeId> = self
			.document
			.descendants(body)
			.into_iter()
			.filter(|&node| !self.is_upgraded(node))
			.filter(|&node| {
				self.document
					.tag(node)
					.map_or(false, |tag| self.registry.lookup_element(tag, self.document.attribute(node, "is")) == Some(class))
			})
			.collect();
		debug!(count = candidates.len(), "Upgrading existing elements.");
		for element in candidates {
			self.upgrade(element, class);
		}
	}

	/// First activation: model, then init, render and sync.
	pub(crate) fn activate(&mut self, element: NodeId) {
		let span = trace_span!("Activating", ?element);
		let _enter = span.enter();
		match self.instances.get(&element) {
			Some(instance) if instance.state == LifecycleState::Uninitialized && self.document.is_attached(element) => (),
			_ => {
				trace!("Activation no longer applies.");
				return;
			}
		}

		let bound = self.bindings.iter().find(|rule| rule.applies_to(self, element)).map(|rule| rule.model.clone());
		match bound {
			Some(model) => {
				if let Some(instance) = self.instances.get_mut(&element) {
					instance.model = model;
					instance.model_bound = true;
				}
			}
			None => {
				self.attributes_to_model(element);
				if let Some(instance) = self.instances.get_mut(&element) {
					instance.seen_version = instance.model.version();
				}
			}
		}

		self.initialize(element, false);
		self.render(element, false);
		self.sync(element, &[]);
		self.mark_rendered(element);
	}

	/// Reads every declared attribute into the model.
	fn attributes_to_model(&mut self, element: NodeId) {
		let Some(instance) = self.instances.get(&element) else { return };
		for (name, kind) in self.classes.declared_attrs(instance.class) {
			match kind.read(self.document.attribute(element, &name)) {
				Some(value) => instance.model.set(&name, value),
				None => instance.model.remove(&name).is_some(),
			};
		}
	}

	fn attribute_to_model(&mut self, element: NodeId, name: &str) {
		let Some(instance) = self.instances.get(&element) else { return };
		if instance.state != LifecycleState::Initialized {
			return;
		}
		if instance.protected > 0 {
			trace!(?element, name, "Attribute is protected during sync.");
			return;
		}
		let declared = self.classes.declared_attrs(instance.class);
		let Some((_, kind)) = declared.iter().find(|(declared, _)| declared == name) else { return };
		let changed = match kind.read(self.document.attribute(element, name)) {
			Some(value) => instance.model.set(name, value),
			None => instance.model.remove(name).is_some(),
		};
		trace!(?element, name, changed, "Attribute read into the model.");
	}

	/// Writes declared attributes from the model, without reading them back.
	///
	/// Marks the instance as caught up with the model as of now; later changes, including those its sync hook makes, refresh it again.
	fn write_attributes_from_model(&mut self, element: NodeId) {
		let Some(instance) = self.instances.get_mut(&element) else { return };
		instance.protected += 1;
		instance.seen_version = instance.model.version();
		let model = instance.model.clone();
		for (name, kind) in self.classes.declared_attrs(instance.class) {
			let result = match kind.write(model.get(&name).as_ref()) {
				Some(raw) => self.set_attribute(element, &name, &raw),
				None => self.remove_attribute(element, &name),
			};
			if let Err(error) = result {
				warn!("Could not write attribute {:?}: {}", name, error);
			}
		}
		if let Some(instance) = self.instances.get_mut(&element) {
			instance.protected -= 1;
		}
	}

	/// Re-syncs every live instance whose model changed since its attributes last matched it.
	///
	/// Runs at the end of each settling round.
	pub(crate) fn refresh(&mut self) {
		let mut stale: Vec<NodeId> = self.instances.iter().filter(|(_, instance)| instance.is_stale()).map(|(&element, _)| element).collect();
		stale.sort_unstable();
		for element in stale {
			trace!(?element, "Refreshing from model.");
			self.write_attributes_from_model(element);
			self.sync(element, &[]);
		}
	}

	pub(crate) fn has_stale_models(&self) -> bool {
		self.instances.values().any(Instance::is_stale)
	}

	/// Replaces the model of `element`, optionally copying over fields the new model lacks.
	///
	/// A rendered instance writes its declared attributes from the new model and re-syncs right away.
	#[instrument(skip(self, model))]
	pub fn bind_model(&mut self, element: NodeId, model: Model, merge_current: bool) -> bool {
		let Some(instance) = self.instances.get_mut(&element) else {
			warn!(?element, "Can't bind a model to an element that isn't upgraded.");
			return false;
		};
		if merge_current {
			model.merge_missing(&instance.model);
		}
		instance.model = model;
		instance.model_bound = true;
		if instance.is_live() {
			self.write_attributes_from_model(element);
			self.sync(element, &[]);
		}
		true
	}

	/// Binds `model` to every instance matching `selector` (below `scope`, if given), both now and on future activation.
	///
	/// # Errors
	///
	/// Iff `selector` can't be parsed.
	#[instrument(skip(self, model))]
	pub fn bind_model_selector(&mut self, selector: &str, model: Model, scope: Option<NodeId>) -> Result<ModelBinding, SelectorError> {
		let rule = BindingRule {
			id: self.next_binding,
			selector: Selector::parse(selector)?,
			model,
			scope,
		};
		self.next_binding += 1;

		let mut existing: Vec<NodeId> = self.instances.keys().copied().filter(|&element| rule.applies_to(self, element)).collect();
		existing.sort_unstable();
		let binding = ModelBinding(rule.id);
		let model = rule.model.clone();
		self.bindings.push(rule);
		for element in existing {
			if self.lifecycle_state(element) == Some(LifecycleState::Initialized) {
				self.bind_model(element, model.clone(), false);
			}
		}
		Ok(binding)
	}

	/// Stops applying a binding rule to newly activated instances. Returns whether it was still attached.
	pub fn detach_binding(&mut self, binding: ModelBinding) -> bool {
		let before = self.bindings.len();
		self.bindings.retain(|rule| rule.id != binding.0);
		self.bindings.len() != before
	}

	#[must_use]
	pub fn is_model_bound(&self, element: NodeId) -> bool {
		self.instances.get(&element).map_or(false, |instance| instance.model_bound)
	}
}
