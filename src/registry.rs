use crate::class::ClassId;
use hashbrown::HashMap;
use tracing::warn;

/// Maps `tag` and `tag#pseudo` keys to component classes.
///
/// Registering a key again replaces the previous class. Elements that were already upgraded keep the class they were upgraded with.
#[derive(Debug, Default)]
pub struct Registry {
	entries: HashMap<String, ClassId>,
}

impl Registry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the class previously registered under `key`, if any.
	pub fn register(&mut self, key: String, class: ClassId) -> Option<ClassId> {
		let previous = self.entries.insert(key, class);
		if let Some(previous) = previous {
			warn!(?previous, ?class, "Redefined a registered tag; existing elements keep their previous class.");
		}
		previous
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<ClassId> {
		self.entries.get(key).copied()
	}

	#[must_use]
	pub fn contains(&self, key: &str) -> bool {
		self.entries.contains_key(key)
	}

	/// The class an element with `tag` and the given `is` discriminator upgrades to.
	///
	/// Unknown pseudo names fall back to the plain tag.
	#[must_use]
	pub fn lookup_element(&self, tag: &str, is: Option<&str>) -> Option<ClassId> {
		is.and_then(|is| self.get(&format!("{}#{}", tag, is))).or_else(|| self.get(tag))
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}
}
