//! Plugins: named behaviors attached to elements below a component by a `plugin-<name>` attribute.
//!
//! A host activates the plugins in its subtree when it renders and releases them when it is destroyed.
//! Activations are reference-counted per node and plugin, so a plugin node inside nested components is activated once
//! and deactivated only after its last host is gone.

use crate::{dom::NodeId, Runtime};
use std::rc::Rc;
use tracing::{instrument, trace, warn};

const MARKER_PREFIX: &str = "plugin-";

pub trait Plugin {
	fn activate(&self, runtime: &mut Runtime, node: NodeId);
	fn deactivate(&self, runtime: &mut Runtime, node: NodeId);
}

impl Runtime {
	/// Registers `plugin` under `name`, replacing any previous plugin of that name for future activations.
	#[instrument(skip(self, plugin))]
	pub fn define_plugin(&mut self, name: &str, plugin: impl Plugin + 'static) {
		if self.plugins.insert(name.into(), Rc::new(plugin)).is_some() {
			warn!("Replaced an existing plugin.");
		}
	}

	#[must_use]
	pub fn is_plugin_active(&self, node: NodeId, name: &str) -> bool {
		self.plugin_activations.is_strong(&(node, Rc::<str>::from(name)))
	}

	pub(crate) fn activate_plugins(&mut self, host: NodeId) {
		let mut markers = Vec::new();
		for node in self.document.descendants(host) {
			for (attribute, _) in self.document.attributes(node) {
				if let Some(name) = attribute.strip_prefix(MARKER_PREFIX) {
					markers.push((node, Rc::<str>::from(name)));
				}
			}
		}

		for key in markers {
			let held = self.instances.get(&host).map_or(true, |instance| instance.plugins.contains(&key));
			if held {
				continue;
			}
			let Some(plugin) = self.plugins.get(&key.1).cloned() else {
				trace!(node = ?key.0, name = &*key.1, "No plugin by that name.");
				continue;
			};
			let became_active = match self.plugin_activations.increment_or_insert_with(key.clone(), || plugin.clone()) {
				Ok((_, became_active)) => became_active,
				Err(error) => {
					warn!(node = ?key.0, name = &*key.1, "Could not activate plugin: {}", error);
					continue;
				}
			};
			let node = key.0;
			if let Some(instance) = self.instances.get_mut(&host) {
				instance.plugins.push(key);
			}
			if became_active {
				trace!(?node, "Activating plugin.");
				plugin.activate(self, node);
			}
		}
	}

	pub(crate) fn deactivate_plugins(&mut self, host: NodeId) {
		let Some(instance) = self.instances.get_mut(&host) else { return };
		for key in core::mem::take(&mut instance.plugins) {
			let plugin = match self.plugin_activations.weak_decrement(&key) {
				Ok(Some(plugin)) => plugin.clone(),
				Ok(None) => continue,
				Err(error) => {
					warn!(node = ?key.0, name = &*key.1, "Could not release plugin: {}", error);
					continue;
				}
			};
			if !self.plugin_activations.is_strong(&key) {
				trace!(node = ?key.0, "Deactivating plugin.");
				plugin.deactivate(self, key.0);
			}
		}
		let released = self.plugin_activations.drain_weak().count();
		trace!(released, "Dropped released plugin activations.");
	}
}
