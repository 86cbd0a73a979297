//! The per-instance lifecycle: `uninitialized -> initialized -> destroyed`, plus in-place re-initialization.
//!
//! Init runs own `_initUI` hooks from the topmost chained level down to the instance's class.
//! A level whose `chain_init` flag is `false` still runs its own hook, but its parent's hook isn't run for it.
//! Destroy mirrors this bottom-up with `chain_destroy`.

use crate::{
	class::{DESTROY, INIT, RENDER, SYNC},
	dom::NodeId,
	events::{Event, Filter, RENDERED},
	model::Model,
	runtime::LifecycleState,
	value::Value,
	Runtime,
};
use std::rc::Rc;
use tracing::{debug, error, instrument, trace, warn};

impl Runtime {
	fn is_destroyed_or_missing(&self, element: NodeId) -> bool {
		!self.instances.contains_key(&element)
	}

	/// Runs the chained init hooks. Returns whether anything ran.
	pub(crate) fn initialize(&mut self, element: NodeId, reinit: bool) -> bool {
		let Some(instance) = self.instances.get(&element) else { return false };
		if !(reinit || instance.state == LifecycleState::Uninitialized) || !self.document.is_attached(element) {
			trace!(?element, reinit, "Skipped init.");
			return false;
		}
		let class = instance.class;
		if !reinit {
			self.capture_design(element);
		}

		let chain = self.classes.ancestry(class);
		let mut top = 0;
		while top + 1 < chain.len() && self.classes.get(chain[top]).chain_init() {
			top += 1;
		}
		for &level in chain[..=top].iter().rev() {
			self.invoke_own(element, level, INIT, &[]);
		}

		if let Some(instance) = self.instances.get_mut(&element) {
			instance.state = LifecycleState::Initialized;
		}
		debug!(?element, reinit, "Initialized.");
		true
	}

	/// Recovers an embedded model snapshot, if there is one, and records the design template.
	fn capture_design(&mut self, element: NodeId) {
		let prefix = self.config.model_marker_prefix.clone();
		let marker = self
			.document
			.children(element)
			.iter()
			.copied()
			.find(|&child| self.document.is_comment(child) && self.document.data(child).map_or(false, |data| data.starts_with(&prefix)));

		let mut recovered = false;
		if let Some(marker) = marker {
			let payload = self.document.data(marker).map(|data| data[prefix.len()..].to_owned()).unwrap_or_default();
			if let Err(error) = self.document.remove(marker) {
				warn!("Could not remove the embedded model marker: {}", error);
			}
			match Value::decode_fields(&payload) {
				Ok(fields) => {
					if cfg!(feature = "dangerous-logging") {
						trace!(?element, payload = payload.as_str(), "Recovered embedded model.");
					}
					if let Some(instance) = self.instances.get(&element) {
						for (key, value) in fields {
							instance.model.set(&key, value);
						}
					}
					recovered = true;
				}
				Err(decode_error) => error!(?element, "Ignoring embedded model: {}", decode_error),
			}
		}

		let template = self.document.inner_html(element);
		if let Some(instance) = self.instances.get_mut(&element) {
			instance.template = Some(template);
			instance.server_rendered = recovered;
		}
	}

	pub(crate) fn render(&mut self, element: NodeId, reinit: bool) -> bool {
		if self.is_destroyed_or_missing(element) || !self.document.is_attached(element) {
			trace!(?element, reinit, "Skipped render.");
			return false;
		}
		if let Some(resolved) = self.lookup(element, RENDER) {
			self.invoke_resolved(element, RENDER, resolved, &[], false);
		}
		self.activate_plugins(element);
		true
	}

	/// Runs the most-derived sync hook with declared attributes protected from being read back into the model.
	pub(crate) fn sync(&mut self, element: NodeId, args: &[Value]) -> bool {
		if self.is_destroyed_or_missing(element) || !self.document.is_attached(element) {
			trace!(?element, "Skipped sync.");
			return false;
		}
		match self.lookup(element, SYNC) {
			Some(resolved) => {
				self.invoke_resolved(element, SYNC, resolved, args, true);
			}
			None => trace!(?element, "No sync hook."),
		}
		if self.config.server_rendering {
			self.embed_model(element);
		}
		true
	}

	/// Replaces the model marker comment at the start of `element` with a fresh snapshot.
	fn embed_model(&mut self, element: NodeId) {
		let Some(model) = self.model(element) else { return };
		let prefix = self.config.model_marker_prefix.clone();
		let stale: Vec<NodeId> = self
			.document
			.children(element)
			.iter()
			.copied()
			.filter(|&child| self.document.is_comment(child) && self.document.data(child).map_or(false, |data| data.starts_with(&prefix)))
			.collect();
		for marker in stale {
			if let Err(error) = self.document.remove(marker) {
				warn!("Could not remove a stale model marker: {}", error);
			}
		}

		let payload = Value::encode_fields(&model.snapshot());
		if cfg!(feature = "dangerous-logging") {
			trace!(?element, payload = payload.as_str(), "Embedding model.");
		}
		let marker = self.document.create_comment(&format!("{}{}", prefix, payload));
		if let Err(error) = self.document.prepend_child(element, marker) {
			warn!("Could not embed the model: {}", error);
		}
	}

	/// Runs the chained destroy hooks. Outside of re-initialization this only happens once the element has left the document.
	pub(crate) fn destroy(&mut self, element: NodeId, reinit: bool) -> bool {
		let Some(instance) = self.instances.get(&element) else { return false };
		if instance.state != LifecycleState::Initialized || !(reinit || !self.document.is_attached(element)) {
			trace!(?element, reinit, "Skipped destroy.");
			return false;
		}
		let class = instance.class;

		for level in self.classes.ancestry(class) {
			self.invoke_own(element, level, DESTROY, &[]);
			if !self.classes.get(level).chain_destroy() {
				break;
			}
		}

		if !reinit {
			let detached = self.bus.detach_owner(element);
			trace!(?element, detached, "Detached instance subscriptions.");
			self.deactivate_plugins(element);
			// Model, props and template go with the record; only the id is remembered.
			self.instances.remove(&element);
			self.destroyed.insert(element);
		}
		debug!(?element, reinit, "Destroyed.");
		true
	}

	/// Tears down and rebuilds an instance in place. It never becomes observably destroyed in between.
	pub(crate) fn reinitialize(&mut self, element: NodeId) -> bool {
		let live = self.instances.get(&element).map_or(false, |instance| instance.state == LifecycleState::Initialized);
		if !live || !self.document.is_attached(element) {
			trace!(?element, "Skipped re-initialization.");
			return false;
		}
		self.destroy(element, true);
		self.initialize(element, true);
		self.render(element, true);
		self.sync(element, &[])
	}

	pub(crate) fn mark_rendered(&mut self, element: NodeId) {
		let Some(instance) = self.instances.get_mut(&element) else { return };
		instance.rendered = true;
		let class = instance.class;
		self.emit(Event::new(RENDERED).target(element).class(class));
	}

	/// Initializes `element` unless it has been initialized before, it isn't attached or it was destroyed.
	#[instrument(skip(self))]
	pub fn init_ui(&mut self, element: NodeId) -> bool {
		self.initialize(element, false)
	}

	#[instrument(skip(self))]
	pub fn render_ui(&mut self, element: NodeId) -> bool {
		self.render(element, false)
	}

	#[instrument(skip(self, args))]
	pub fn sync_ui(&mut self, element: NodeId, args: &[Value]) -> bool {
		self.sync(element, args)
	}

	/// Tears `element` down, but only if it was initialized and has since left the document.
	///
	/// Calling this on an attached or already destroyed element does nothing.
	#[instrument(skip(self))]
	pub fn destroy_ui(&mut self, element: NodeId) -> bool {
		self.destroy(element, false)
	}

	#[instrument(skip(self))]
	pub fn reinitialize_ui(&mut self, element: NodeId) -> bool {
		self.reinitialize(element)
	}

	#[must_use]
	pub fn is_rendered(&self, element: NodeId) -> bool {
		self.instances.get(&element).map_or(false, |instance| instance.rendered)
	}

	#[must_use]
	pub fn is_initialized(&self, element: NodeId) -> bool {
		self.lifecycle_state(element) == Some(LifecycleState::Initialized)
	}

	#[must_use]
	pub fn is_destroyed(&self, element: NodeId) -> bool {
		self.lifecycle_state(element) == Some(LifecycleState::Destroyed)
	}

	/// Calls `callback` once `element` has been rendered: right away if it already is, otherwise after its first render.
	pub fn ready(&mut self, element: NodeId, callback: impl Fn(&mut Runtime) + 'static) {
		if self.is_rendered(element) {
			callback(self);
			return;
		}
		let filter: Filter = Rc::new(move |_: &Runtime, event: &Event| event.target == Some(element));
		self.once_after(RENDERED, Some(filter), move |runtime, _| callback(runtime));
	}

	/// Whether `model` is the model `element` currently reads from.
	#[must_use]
	pub fn has_model(&self, element: NodeId, model: &Model) -> bool {
		self.instances.get(&element).map_or(false, |instance| instance.model.same(model))
	}
}
