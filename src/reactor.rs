//! Declaring classes and mutating them while instances are live.
//!
//! Every non-silent member change emits `<tag>[#pseudo]:prototypechange` with the changed internal names.
//! The runtime itself listens for these: a changed init hook re-initializes every live instance of the tag (any pseudo variant)
//! and of the class's subclasses, while a changed sync hook only re-syncs them.

use crate::{
	class::{split_tag, validate_tag, ClassId, Classes, ComponentClass, Members, SubclassOptions, INIT, SYNC},
	dom::NodeId,
	error::DeclareError,
	events::Event,
	Runtime,
};
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};

const PROTOTYPE_CHANGE: &str = "prototypechange";

impl Runtime {
	pub(crate) fn wire_reactor(&mut self) {
		self.after(&format!("*:{}", PROTOTYPE_CHANGE), None, |runtime, event| {
			let Some(class) = event.class else { return };
			let targets = runtime.live_instances_of(class);
			if event.has_name(INIT) {
				debug!(count = targets.len(), "Re-initializing live instances.");
				for element in targets {
					runtime.reinitialize(element);
				}
			} else if event.has_name(SYNC) {
				debug!(count = targets.len(), "Re-syncing live instances.");
				for element in targets {
					runtime.sync(element, &[]);
				}
			}
		});
	}

	/// Rendered, attached instances whose class descends from `class` or carries its tag, whichever pseudo variant they use.
	fn live_instances_of(&self, class: ClassId) -> Vec<NodeId> {
		let tag = self.classes.get(class).tag();
		let mut elements: Vec<NodeId> = self
			.instances
			.iter()
			.filter(|(_, instance)| instance.is_live())
			.filter(|(_, instance)| self.classes.descends_from(instance.class, class) || (!tag.is_empty() && self.classes.get(instance.class).tag() == tag))
			.map(|(&element, _)| element)
			.filter(|&element| self.document.is_attached(element))
			.collect();
		elements.sort_unstable();
		elements
	}

	/// Declares a class below `parent` and registers it.
	///
	/// `tag` may carry a `#pseudo` suffix, in which case it must repeat the parent's tag and the class becomes a pseudo variant,
	/// selected with an `is="pseudo"` attribute. Already present elements the new class is registered for are upgraded.
	///
	/// # Errors
	///
	/// See [`DeclareError`].
	#[instrument(skip(self, members))]
	pub fn try_subclass(&mut self, parent: ClassId, tag: &str, members: Members, options: SubclassOptions) -> Result<ClassId, DeclareError> {
		let parent_class = self.classes.try_get(parent).ok_or(DeclareError::UnknownClass(parent))?;
		let (tag, pseudo) = split_tag(tag)?;
		match pseudo {
			Some(pseudo) => {
				if parent == Classes::root() {
					return Err(DeclareError::PseudoOfRoot);
				}
				if tag != parent_class.tag() {
					return Err(DeclareError::PseudoTagMismatch {
						parent: parent_class.tag().to_owned(),
						tag: tag.to_owned(),
						pseudo: pseudo.to_owned(),
					});
				}
			}
			None => {
				if !parent_class.subclassable() {
					return Err(DeclareError::NotSubclassable(parent_class.key()));
				}
			}
		}
		validate_tag(tag)?;

		let class = self.classes.create(parent, tag, pseudo, options);
		self.classes.merge(class, members, true);
		let key = self.classes.get(class).key();
		debug!(?class, key = key.as_str(), "Declared class.");
		self.registry.register(key, class);
		self.upgrade_existing(class);
		Ok(class)
	}

	/// Like [`Runtime::try_subclass`], but logs failures and returns `parent` instead.
	pub fn subclass(&mut self, parent: ClassId, tag: &str, members: Members, options: SubclassOptions) -> ClassId {
		match self.try_subclass(parent, tag, members, options) {
			Ok(class) => class,
			Err(error) => {
				warn!("Could not declare <{}>: {}", tag, error);
				parent
			}
		}
	}

	/// A same-tag variant of `parent`, selected by `is="pseudo"`.
	pub fn pseudo_variant(&mut self, parent: ClassId, pseudo: &str, members: Members, options: SubclassOptions) -> ClassId {
		let Some(parent_class) = self.classes.try_get(parent) else {
			warn!("{}", DeclareError::UnknownClass(parent));
			return parent;
		};
		if parent == Classes::root() {
			warn!("{}", DeclareError::PseudoOfRoot);
			return parent;
		}
		let tag = format!("{}#{}", parent_class.tag(), pseudo);
		self.subclass(parent, &tag, members, options)
	}

	/// Declares a top-level component, directly below the root class.
	pub fn define_component(&mut self, tag: &str, members: Members, subclassable: bool) -> ClassId {
		self.subclass(Classes::root(), tag, members, SubclassOptions::default().subclassable(subclassable))
	}

	/// Merges members into an existing class. Lifecycle names are translated.
	///
	/// Without `force`, names the class already resolves are kept. With it, a method replacing an own method is pushed on top of it,
	/// so that the new implementation can reach the old one through [`Scope::call_original`](`crate::Scope::call_original`).
	///
	/// Returns the internal names that changed.
	#[instrument(skip(self, members))]
	pub fn merge_prototypes(&mut self, class: ClassId, members: Members, force: bool, silent: bool) -> Vec<Rc<str>> {
		if self.classes.try_get(class).is_none() {
			warn!("{}", DeclareError::UnknownClass(class));
			return Vec::new();
		}
		let changed = self.classes.merge(class, members, force);
		self.prototype_changed(class, changed.clone(), silent);
		changed
	}

	/// Removes own members (and all their overlays) from a class. Returns the internal names that were present.
	#[instrument(skip(self))]
	pub fn remove_prototypes(&mut self, class: ClassId, names: &[&str], silent: bool) -> Vec<Rc<str>> {
		if self.classes.try_get(class).is_none() {
			warn!("{}", DeclareError::UnknownClass(class));
			return Vec::new();
		}
		let removed = self.classes.remove(class, names);
		self.prototype_changed(class, removed.clone(), silent);
		removed
	}

	fn prototype_changed(&mut self, class: ClassId, names: Vec<Rc<str>>, silent: bool) {
		if names.is_empty() {
			return;
		}
		if !self.config.prototype_delegation {
			self.reflatten(class);
		}
		if silent {
			trace!(?names, "Silent prototype change.");
			return;
		}
		let emitter = match self.classes.get(class).key() {
			key if key.is_empty() => "itag".to_owned(),
			key => key,
		};
		self.emit(Event::new(&format!("{}:{}", emitter, PROTOTYPE_CHANGE)).class(class).names(names));
	}

	/// Rebuilds the flattened member view of every instance below `class` from scratch.
	fn reflatten(&mut self, class: ClassId) {
		for element in self.instances_of(class) {
			let Some(instance) = self.instances.get(&element) else { continue };
			let view = self.classes.flatten(instance.class);
			if let Some(instance) = self.instances.get_mut(&element) {
				instance.view = Some(view);
			}
		}
	}

	/// The class registered for `tag` (or `tag#pseudo`), with its metadata.
	#[must_use]
	pub fn class_info(&self, tag: &str) -> Option<&ComponentClass> {
		self.registry.get(tag).and_then(|class| self.classes.try_get(class))
	}
}
