//! Importing existing browser DOM into a [`Runtime`]'s document.
//!
//! This is how components declared after the HTML was parsed get to upgrade the elements that were already there:
//! load the page content, then declare classes.

use crate::{dom::NodeId, error::DomError, Runtime};
use tracing::{instrument, warn};
use wasm_bindgen::JsCast;
use web_sys::{Attr, Comment, Element, NamedNodeMap, NodeList, Text};

/// Copies `element` and its subtree into the document and appends it to `parent`.
///
/// Insertion is recorded like any other, so registered elements in the copy upgrade on the next [`Runtime::tick`].
///
/// # Errors
///
/// Iff `parent` is not an element of the document.
#[instrument(skip(runtime, element))]
pub fn load_into(runtime: &mut Runtime, parent: NodeId, element: &Element) -> Result<NodeId, DomError> {
	let loaded = load_element(runtime, element);
	runtime.append_child(parent, loaded)?;
	Ok(loaded)
}

/// Copies `element` and its subtree into the document, detached.
pub fn load_element(runtime: &mut Runtime, element: &Element) -> NodeId {
	let loaded = runtime.document_mut().create_element(&element.tag_name());
	load_attributes(runtime, loaded, &element.attributes());
	let children = load_child_nodes(runtime, &element.child_nodes());
	for child in children {
		if let Err(error) = runtime.document_mut().append_child(loaded, child) {
			warn!("Could not attach a loaded child node: {}", error);
		}
	}
	loaded
}

/// Copies the element, text and comment nodes of a node list. Other node types are skipped.
pub fn load_child_nodes(runtime: &mut Runtime, child_nodes: &NodeList) -> Vec<NodeId> {
	(0..child_nodes.length())
		.filter_map(|i| child_nodes.item(i))
		.filter_map(|child| {
			if let Some(element) = child.dyn_ref::<Element>() {
				Some(load_element(runtime, element))
			} else if let Some(text) = child.dyn_ref::<Text>() {
				Some(runtime.document_mut().create_text(&text.data()))
			} else if let Some(comment) = child.dyn_ref::<Comment>() {
				Some(runtime.document_mut().create_comment(&comment.data()))
			} else {
				warn!(node_type = child.node_type(), "Skipped unrecognised child node.");
				None
			}
		})
		.collect()
}

pub fn load_attributes(runtime: &mut Runtime, element: NodeId, attributes: &NamedNodeMap) {
	for attribute in (0..attributes.length()).filter_map(|i| attributes.item(i)) {
		load_attribute(runtime, element, &attribute);
	}
}

pub fn load_attribute(runtime: &mut Runtime, element: NodeId, attribute: &Attr) {
	if let Err(error) = runtime.document_mut().set_attribute(element, &attribute.local_name(), &attribute.value()) {
		warn!("Could not copy an attribute: {}", error);
	}
}
