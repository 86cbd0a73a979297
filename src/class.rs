//! Component classes: an arena of tag-bound descriptors linked to their parents by index.
//!
//! Each class stores only its *own* members. Lookups walk the parent links, so a class never mutates its ancestors.
//! A member name maps to a stack of implementations: forced merges of a method onto a level that already defines it push an overlay,
//! and [`Scope::call_original`](`crate::Scope::call_original`) steps down that stack.

use crate::{
	dispatch::Scope,
	error::DeclareError,
	value::{AttrType, Value},
};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{trace, warn};

/// The signature of every method and lifecycle hook.
///
/// The returned [`None`] plays the part of "undefined".
pub type MethodFn = dyn Fn(&mut Scope<'_>, &[Value]) -> Option<Value>;

pub const INIT: &str = "_initUI";
pub const RENDER: &str = "_renderUI";
pub const SYNC: &str = "_syncUI";
pub const DESTROY: &str = "_destroyUI";
pub const ATTRS: &str = "_attrs";

/// Declared lifecycle names and the internal names they are stored under.
pub const METHOD_TABLE: [(&str, &str); 5] = [("init", INIT), ("render", RENDER), ("sync", SYNC), ("destroy", DESTROY), ("attrs", ATTRS)];

/// Translates a declared lifecycle name into its internal name. Other names pass through.
#[must_use]
pub fn internal_name(name: &str) -> &str {
	METHOD_TABLE.iter().find(|(public, _)| *public == name).map_or(name, |(_, internal)| internal)
}

/// Whether `name` is a declared or internal lifecycle name.
#[must_use]
pub fn is_lifecycle_name(name: &str) -> bool {
	METHOD_TABLE.iter().any(|(public, internal)| *public == name || *internal == name)
}

#[derive(Clone)]
pub enum Member {
	Method(Rc<MethodFn>),
	Value(Value),
}

impl Debug for Member {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Member::Method(method) => write!(f, "Method({:p})", Rc::as_ptr(method)),
			Member::Value(value) => f.debug_tuple("Value").field(value).finish(),
		}
	}
}

/// An ordered member declaration, as passed to [`Runtime::subclass`](`crate::Runtime::subclass`) and
/// [`Runtime::merge_prototypes`](`crate::Runtime::merge_prototypes`).
#[derive(Debug, Clone, Default)]
pub struct Members(Vec<(String, Member)>);

impl Members {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn method(mut self, name: &str, method: impl Fn(&mut Scope<'_>, &[Value]) -> Option<Value> + 'static) -> Self {
		self.0.push((name.to_owned(), Member::Method(Rc::new(method))));
		self
	}

	/// A method without arguments or result, which is what lifecycle hooks usually are.
	#[must_use]
	pub fn hook(self, name: &str, hook: impl Fn(&mut Scope<'_>) + 'static) -> Self {
		self.method(name, move |scope, _| {
			hook(scope);
			None
		})
	}

	#[must_use]
	pub fn value(mut self, name: &str, value: impl Into<Value>) -> Self {
		self.0.push((name.to_owned(), Member::Value(value.into())));
		self
	}

	/// Declares typed attributes (`"string"`, `"number"`, `"boolean"` or `"date"`) that are mirrored into the model.
	#[must_use]
	pub fn attrs<'a>(self, attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		let attrs = attrs.into_iter().map(|(name, kind)| (name.to_owned(), Value::from(kind))).collect();
		self.value("attrs", Value::Object(attrs))
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub(crate) fn into_inner(self) -> Vec<(String, Member)> {
		self.0
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

/// Flags fixed when a class is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubclassOptions {
	pub chain_init: bool,
	pub chain_destroy: bool,
	pub subclassable: bool,
}

impl Default for SubclassOptions {
	fn default() -> Self {
		Self {
			chain_init: true,
			chain_destroy: true,
			subclassable: true,
		}
	}
}

impl SubclassOptions {
	/// Whether initializing this level first initializes its parent level.
	#[must_use]
	pub fn chain_init(mut self, chain_init: bool) -> Self {
		self.chain_init = chain_init;
		self
	}

	/// Whether destroying this level afterwards destroys its parent level.
	#[must_use]
	pub fn chain_destroy(mut self, chain_destroy: bool) -> Self {
		self.chain_destroy = chain_destroy;
		self
	}

	#[must_use]
	pub fn subclassable(mut self, subclassable: bool) -> Self {
		self.subclassable = subclassable;
		self
	}
}

#[derive(Debug)]
pub struct ComponentClass {
	tag: Rc<str>,
	pseudo: Option<Rc<str>>,
	parent: Option<ClassId>,
	options: SubclassOptions,
	members: HashMap<Rc<str>, Vec<Member>>,
}

impl ComponentClass {
	/// Empty for the root class.
	#[must_use]
	pub fn tag(&self) -> &str {
		&self.tag
	}

	#[must_use]
	pub fn pseudo(&self) -> Option<&str> {
		self.pseudo.as_deref()
	}

	#[must_use]
	pub fn parent(&self) -> Option<ClassId> {
		self.parent
	}

	#[must_use]
	pub fn chain_init(&self) -> bool {
		self.options.chain_init
	}

	#[must_use]
	pub fn chain_destroy(&self) -> bool {
		self.options.chain_destroy
	}

	#[must_use]
	pub fn subclassable(&self) -> bool {
		self.options.subclassable
	}

	/// `tag` or `tag#pseudo`, as registered.
	#[must_use]
	pub fn key(&self) -> String {
		match &self.pseudo {
			Some(pseudo) => format!("{}#{}", self.tag, pseudo),
			None => self.tag.to_string(),
		}
	}

	/// Whether this exact level defines `name` (by internal name).
	#[must_use]
	pub fn defines(&self, name: &str) -> bool {
		self.members.contains_key(name)
	}

	/// The implementation stack of `name` at this level, bottom first.
	#[must_use]
	pub fn own(&self, name: &str) -> Option<&[Member]> {
		self.members.get(name).map(Vec::as_slice)
	}

	pub fn own_names(&self) -> impl Iterator<Item = &Rc<str>> {
		self.members.keys()
	}
}

/// Checks a custom element tag name: a lowercase ASCII letter first, at least one dash, and no uppercase or whitespace.
pub fn validate_tag(tag: &str) -> Result<(), DeclareError> {
	let valid = tag.starts_with(|c: char| c.is_ascii_lowercase())
		&& tag.contains('-')
		&& tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'));
	if valid {
		Ok(())
	} else {
		Err(DeclareError::InvalidTagName(tag.to_owned()))
	}
}

fn validate_pseudo(pseudo: &str) -> Result<(), DeclareError> {
	if !pseudo.is_empty() && pseudo.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_')) {
		Ok(())
	} else {
		Err(DeclareError::InvalidPseudoName(pseudo.to_owned()))
	}
}

/// Splits `tag#pseudo`.
pub(crate) fn split_tag(declared: &str) -> Result<(&str, Option<&str>), DeclareError> {
	match declared.split_once('#') {
		Some((tag, pseudo)) => {
			validate_pseudo(pseudo)?;
			Ok((tag, Some(pseudo)))
		}
		None => Ok((declared, None)),
	}
}

/// Where a member lookup ended up.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
	pub level: ClassId,
	pub depth: usize,
	pub member: Member,
}

#[derive(Debug)]
pub(crate) struct Classes(Vec<ComponentClass>);

impl Classes {
	pub fn new() -> Self {
		Self(vec![ComponentClass {
			tag: "".into(),
			pseudo: None,
			parent: None,
			options: SubclassOptions::default(),
			members: HashMap::new(),
		}])
	}

	pub fn root() -> ClassId {
		ClassId(0)
	}

	pub fn get(&self, id: ClassId) -> &ComponentClass {
		&self.0[id.0]
	}

	/// Checked access for ids handed in from outside.
	pub fn try_get(&self, id: ClassId) -> Option<&ComponentClass> {
		self.0.get(id.0)
	}

	pub fn create(&mut self, parent: ClassId, tag: &str, pseudo: Option<&str>, options: SubclassOptions) -> ClassId {
		let id = ClassId(self.0.len());
		self.0.push(ComponentClass {
			tag: tag.into(),
			pseudo: pseudo.map(Into::into),
			parent: Some(parent),
			options,
			members: HashMap::new(),
		});
		id
	}

	/// `id` first, the root last.
	pub fn ancestry(&self, id: ClassId) -> Vec<ClassId> {
		let mut chain = vec![id];
		let mut cursor = self.get(id).parent;
		while let Some(parent) = cursor {
			chain.push(parent);
			cursor = self.get(parent).parent;
		}
		chain
	}

	pub fn descends_from(&self, id: ClassId, ancestor: ClassId) -> bool {
		let mut cursor = Some(id);
		while let Some(class) = cursor {
			if class == ancestor {
				return true;
			}
			cursor = self.get(class).parent;
		}
		false
	}

	/// Finds the nearest level at or above `start` that defines `name`, and the top of its stack there.
	pub fn resolve(&self, start: ClassId, name: &str) -> Option<Resolved> {
		let mut cursor = Some(start);
		while let Some(level) = cursor {
			let class = self.get(level);
			if let Some(stack) = class.members.get(name) {
				return stack.last().map(|member| Resolved {
					level,
					depth: stack.len() - 1,
					member: member.clone(),
				});
			}
			cursor = class.parent;
		}
		None
	}

	pub fn at(&self, level: ClassId, name: &str, depth: usize) -> Option<Member> {
		self.get(level).members.get(name)?.get(depth).cloned()
	}

	/// Merges `members` into `id`, translating lifecycle names. Returns the internal names that changed.
	///
	/// Without `force`, names the class already resolves (own or inherited) are left alone.
	pub fn merge(&mut self, id: ClassId, members: Members, force: bool) -> Vec<Rc<str>> {
		let mut changed: Vec<Rc<str>> = Vec::new();
		for (name, member) in members.into_inner() {
			let key = internal_name(&name);
			if !force && self.resolve(id, key).is_some() {
				trace!(member = key, "Kept existing member (not forced).");
				continue;
			}

			let members = &mut self.0[id.0].members;
			let key: Rc<str> = match members.get_key_value(key) {
				Some((existing, _)) => existing.clone(),
				None => key.into(),
			};
			let stack = members.entry(key.clone()).or_default();
			if matches!((stack.last(), &member), (Some(Member::Method(_)), Member::Method(_))) {
				stack.push(member);
			} else {
				*stack = vec![member];
			}
			if !changed.contains(&key) {
				changed.push(key);
			}
		}
		changed
	}

	/// Removes own members (all overlays included). Returns the internal names that were present.
	pub fn remove(&mut self, id: ClassId, names: &[&str]) -> Vec<Rc<str>> {
		let members = &mut self.0[id.0].members;
		let mut removed = Vec::new();
		for name in names {
			let key = internal_name(name);
			match members.remove_entry(key) {
				Some((key, _)) => removed.push(key),
				None => warn!(member = key, "Tried to remove a member that this class doesn't define itself."),
			}
		}
		removed
	}

	/// Materializes the member view of `id`: each name mapped to the level that provides it.
	pub fn flatten(&self, id: ClassId) -> HashMap<Rc<str>, ClassId> {
		let mut view = HashMap::new();
		for level in self.ancestry(id).into_iter().rev() {
			for name in self.get(level).members.keys() {
				view.insert(name.clone(), level);
			}
		}
		view
	}

	/// Declared attributes across the chain, with more-derived declarations taking precedence.
	pub fn declared_attrs(&self, id: ClassId) -> Vec<(String, AttrType)> {
		let mut attrs: Vec<(String, AttrType)> = Vec::new();
		for level in self.ancestry(id).into_iter().rev() {
			let declared = self.get(level).members.get(ATTRS).and_then(|stack| stack.last());
			let Some(Member::Value(Value::Object(declared))) = declared else { continue };
			for (name, kind) in declared {
				let Some(kind) = kind.as_str().and_then(AttrType::parse) else {
					warn!(attribute = name.as_str(), "Ignoring attribute declaration with unknown type.");
					continue;
				};
				match attrs.iter_mut().find(|(n, _)| n == name) {
					Some(existing) => existing.1 = kind,
					None => attrs.push((name.clone(), kind)),
				}
			}
		}
		attrs
	}
}
