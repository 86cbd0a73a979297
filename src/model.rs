//! Observable key-value models.
//!
//! A [`Model`] is a shared handle: cloning it yields another view of the same fields.
//! Every write that actually changes a field bumps the model's version once; instances compare that version
//! during the refresh pass at the end of each [`Runtime::tick`](`crate::Runtime::tick`) to find out whether they must write attributes back and re-sync.

use crate::value::Value;
use core::cell::RefCell;
use std::{collections::BTreeMap, rc::Rc};

#[derive(Debug, Default)]
struct ModelData {
	fields: BTreeMap<String, Value>,
	version: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Model(Rc<RefCell<ModelData>>);

impl Model {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
		Self(Rc::new(RefCell::new(ModelData { fields, version: 0 })))
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<Value> {
		self.0.borrow().fields.get(key).cloned()
	}

	#[must_use]
	pub fn contains(&self, key: &str) -> bool {
		self.0.borrow().fields.contains_key(key)
	}

	/// Returns whether the field changed. Writing an equal value is a no-op.
	pub fn set(&self, key: &str, value: impl Into<Value>) -> bool {
		let value = value.into();
		let mut data = self.0.borrow_mut();
		if data.fields.get(key) == Some(&value) {
			return false;
		}
		data.fields.insert(key.to_owned(), value);
		data.version += 1;
		true
	}

	pub fn remove(&self, key: &str) -> Option<Value> {
		let mut data = self.0.borrow_mut();
		let removed = data.fields.remove(key);
		if removed.is_some() {
			data.version += 1;
		}
		removed
	}

	/// Copies every field of `other` that this model doesn't have yet.
	pub fn merge_missing(&self, other: &Model) {
		if self.same(other) {
			return;
		}
		for (key, value) in other.snapshot() {
			if !self.contains(&key) {
				self.set(&key, value);
			}
		}
	}

	#[must_use]
	pub fn snapshot(&self) -> BTreeMap<String, Value> {
		self.0.borrow().fields.clone()
	}

	#[must_use]
	pub fn version(&self) -> u64 {
		self.0.borrow().version
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.borrow().fields.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Whether both handles point at the same model.
	#[must_use]
	pub fn same(&self, other: &Model) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
