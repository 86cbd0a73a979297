//! Method dispatch: virtual calls, super-calls and orig-calls.
//!
//! Every invocation runs inside a [`Scope`] that knows which class level the running implementation belongs to
//! and where in that level's overlay stack it sits. Super-calls resolve relative to that level, not to the instance's class,
//! so nested and looping super-calls each find the right ancestor.
//!
//! The per-instance cursor that [`Scope::up`] moves is cleared for the duration of every invocation and put back when the
//! [`Scope`] is dropped, which also happens while unwinding out of a panicking hook.

use crate::{
	class::{internal_name, is_lifecycle_name, ClassId, Member, MethodFn, Resolved, DESTROY, INIT},
	dom::NodeId,
	error::DomError,
	events::{Event, Filter, Phase, SubscriptionId},
	model::Model,
	value::Value,
	Runtime,
};
use std::rc::Rc;
use tracing::{trace_span, warn};

/// Which implementation is currently executing.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
	pub level: ClassId,
	pub name: Rc<str>,
	pub depth: usize,
}

/// The handle every method and lifecycle hook receives, standing in for `this`.
pub struct Scope<'rt> {
	runtime: &'rt mut Runtime,
	element: NodeId,
	frame: Frame,
	saved_cursor: (Option<ClassId>, Option<Option<ClassId>>),
	releases_protection: bool,
}

impl Drop for Scope<'_> {
	fn drop(&mut self) {
		if let Some(instance) = self.runtime.instances.get_mut(&self.element) {
			(instance.cursor, instance.hop_origin) = self.saved_cursor;
			if self.releases_protection {
				instance.protected = instance.protected.saturating_sub(1);
			}
		}
	}
}

impl Runtime {
	/// Runs `method` on `element` as the implementation described by `frame`.
	pub(crate) fn invoke(&mut self, element: NodeId, frame: Frame, method: &Rc<MethodFn>, args: &[Value], protect: bool) -> Option<Value> {
		let Some(instance) = self.instances.get_mut(&element) else {
			warn!(?element, "Tried to invoke a method on an element that isn't upgraded.");
			return None;
		};
		let saved_cursor = (instance.cursor.take(), instance.hop_origin.take());
		if protect {
			instance.protected += 1;
		}

		let span = trace_span!("Invoking", ?element, name = &*frame.name, level = ?frame.level, depth = frame.depth);
		let _enter = span.enter();
		let mut scope = Scope {
			runtime: self,
			element,
			frame,
			saved_cursor,
			releases_protection: protect,
		};
		method(&mut scope, args)
	}

	/// Invokes a resolved member. Value members are simply returned.
	pub(crate) fn invoke_resolved(&mut self, element: NodeId, name: &str, resolved: Resolved, args: &[Value], protect: bool) -> Option<Value> {
		match resolved.member {
			Member::Method(method) => self.invoke(
				element,
				Frame {
					level: resolved.level,
					name: name.into(),
					depth: resolved.depth,
				},
				&method,
				args,
				protect,
			),
			Member::Value(value) => Some(value),
		}
	}

	/// Resolves `name` (an internal name) through the instance's effective member view.
	pub(crate) fn lookup(&self, element: NodeId, name: &str) -> Option<Resolved> {
		let instance = self.instances.get(&element)?;
		match &instance.view {
			None => self.classes.resolve(instance.class, name),
			Some(view) => {
				let level = *view.get(name)?;
				self.classes.resolve(level, name).filter(|resolved| resolved.level == level)
			}
		}
	}

	pub(crate) fn call_virtual(&mut self, element: NodeId, name: &str, args: &[Value]) -> Option<Value> {
		if is_lifecycle_name(name) {
			warn!(name, "Lifecycle hooks can't be called as methods.");
			return None;
		}
		match self.lookup(element, name) {
			Some(resolved) => self.invoke_resolved(element, name, resolved, args, false),
			None => {
				warn!(?element, name, "No such member.");
				None
			}
		}
	}

	/// Runs the topmost implementation of `name` that `level` itself defines, if any.
	pub(crate) fn invoke_own(&mut self, element: NodeId, level: ClassId, name: &str, args: &[Value]) -> Option<Value> {
		let depth = self.classes.get(level).own(name)?.len().checked_sub(1)?;
		let member = self.classes.at(level, name, depth)?;
		self.invoke_resolved(element, name, Resolved { level, depth, member }, args, false)
	}
}

impl<'rt> Scope<'rt> {
	#[must_use]
	pub fn element(&self) -> NodeId {
		self.element
	}

	/// The class level the running implementation belongs to.
	#[must_use]
	pub fn level(&self) -> ClassId {
		self.frame.level
	}

	/// The internal name of the running method.
	#[must_use]
	pub fn method_name(&self) -> &str {
		&self.frame.name
	}

	pub fn runtime(&mut self) -> &mut Runtime {
		self.runtime
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<Value> {
		self.runtime.prop(self.element, name)
	}

	pub fn set(&mut self, name: &str, value: impl Into<Value>) {
		self.runtime.set_prop(self.element, name, value);
	}

	/// The instance's current model. Writes to it are picked up by the refresh pass at the end of the tick.
	#[must_use]
	pub fn model(&self) -> Model {
		self.runtime.model(self.element).unwrap_or_default()
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<String> {
		self.runtime.attribute(self.element, name).map(ToOwned::to_owned)
	}

	pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), DomError> {
		self.runtime.set_attribute(self.element, name, value)
	}

	pub fn remove_attribute(&mut self, name: &str) -> Result<(), DomError> {
		self.runtime.remove_attribute(self.element, name)
	}

	/// Replaces the element's children with text.
	pub fn set_text(&mut self, text: &str) -> Result<(), DomError> {
		self.runtime.document.set_text_content(self.element, text)
	}

	#[must_use]
	pub fn design_template(&self) -> Option<String> {
		self.runtime.design_template(self.element).map(ToOwned::to_owned)
	}

	/// Subscribes on behalf of this instance. The subscription is detached when the instance is destroyed.
	pub fn after(&mut self, pattern: &str, filter: Option<Filter>, callback: impl Fn(&mut Runtime, &Event) + 'static) -> SubscriptionId {
		self.runtime.bus.subscribe(Phase::After, pattern, filter, Rc::new(callback), false, Some(self.element))
	}

	/// Virtual call from the instance's most-derived class.
	pub fn call(&mut self, name: &str, args: &[Value]) -> Option<Value> {
		self.runtime.call_virtual(self.element, name, args)
	}

	/// Reads a value member through the instance's class chain.
	#[must_use]
	pub fn member(&self, name: &str) -> Option<Value> {
		self.runtime.member(self.element, name)
	}

	/// Moves the super-call cursor one level further up without dispatching anything yet.
	///
	/// Chains: `scope.up().up().call_super("f", &[])` resolves `f` above the great-grandparent of the running level.
	/// The hops are consumed by the next [`Scope::call_super`], [`Scope::call_original`] or [`Scope::reset_super`].
	/// They are kept on the instance, not the scope: hops left pending when the hook returns still apply to the next super-call on this element.
	pub fn up(&mut self) -> &mut Self {
		let element = self.element;
		let frame_level = self.frame.level;
		let Some(instance) = self.runtime.instances.get_mut(&element) else { return self };
		let base = instance.cursor.unwrap_or(frame_level);
		match self.runtime.classes.get(base).parent() {
			Some(parent) => {
				if instance.hop_origin.is_none() {
					instance.hop_origin = Some(instance.cursor);
				}
				instance.cursor = Some(parent);
			}
			None => warn!(?element, "There is no level above the root class."),
		}
		self
	}

	/// The zero-argument super-call: discards pending [`Scope::up`] hops without dispatching.
	///
	/// Returns `self` like [`Scope::up`], so `scope.reset_super().up()` starts a fresh hop chain.
	pub fn reset_super(&mut self) -> &mut Self {
		if let Some(instance) = self.runtime.instances.get_mut(&self.element) {
			if let Some(origin) = instance.hop_origin.take() {
				instance.cursor = origin;
			}
		}
		self
	}

	/// Consumes pending hops. Returns the level they pointed at, or the running level.
	fn take_current_level(&mut self) -> ClassId {
		let frame_level = self.frame.level;
		match self.runtime.instances.get_mut(&self.element) {
			Some(instance) => {
				let current = instance.cursor.unwrap_or(frame_level);
				if let Some(origin) = instance.hop_origin.take() {
					instance.cursor = origin;
				}
				current
			}
			None => frame_level,
		}
	}

	/// Calls the implementation of `name` found starting one level above the current level
	/// (the running level, or wherever [`Scope::up`] moved the cursor).
	///
	/// Lifecycle names are translated. Calling `init` or `destroy` this way is refused when the current level already chains
	/// that hook automatically.
	pub fn call_super(&mut self, name: &str, args: &[Value]) -> Option<Value> {
		let current = self.take_current_level();
		let key = internal_name(name);
		let class = self.runtime.classes.get(current);
		if (key == INIT && class.chain_init()) || (key == DESTROY && class.chain_destroy()) {
			warn!(
				name,
				level = ?current,
				"This hook is chained automatically at the current level and can't be invoked manually."
			);
			return None;
		}
		let Some(parent) = class.parent() else {
			warn!(name, "There is no level above the root class.");
			return None;
		};
		match self.runtime.classes.resolve(parent, key) {
			Some(resolved) => self.runtime.invoke_resolved(self.element, key, resolved, args, false),
			None => {
				warn!(name, level = ?current, "No ancestor defines this member.");
				None
			}
		}
	}

	/// Calls the implementation the running one replaced at its own level, or returns [`None`] if there is none.
	///
	/// After [`Scope::up`] hops, calls the current implementation of the running method's name at the level the hops lead to.
	pub fn call_original(&mut self, args: &[Value]) -> Option<Value> {
		let current = self.take_current_level();
		let name = self.frame.name.clone();
		let depth = if current == self.frame.level {
			self.frame.depth.checked_sub(1)?
		} else {
			self.runtime.classes.get(current).own(&name)?.len().checked_sub(1)?
		};
		let member = self.runtime.classes.at(current, &name, depth)?;
		self.runtime.invoke_resolved(self.element, &name, Resolved { level: current, depth, member }, args, false)
	}
}
