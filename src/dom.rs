//! A minimal document tree the runtime upgrades elements in.
//!
//! Only the parts a component runtime needs are modelled: elements with ordered attributes, text and comments.
//! Insertions into and removals from the attached tree are recorded as [`Mutation`]s, which [`Runtime::tick`](`crate::Runtime::tick`)
//! turns into `UI:nodeinsert` and `UI:noderemove` events.

use crate::{error::DomError, selector::Selector};
use core::fmt::Write as _;
use tracing::{instrument, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	Element { tag: String, attributes: Vec<(String, String)> },
	Text(String),
	Comment(String),
}

#[derive(Debug)]
struct Node {
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	kind: NodeKind,
}

/// A change to the attached tree, recorded for the subtree root only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
	Inserted(NodeId),
	Removed(NodeId),
}

#[derive(Debug)]
pub struct Document {
	nodes: Vec<Node>,
	body: NodeId,
	mutations: Vec<Mutation>,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	#[must_use]
	pub fn new() -> Self {
		Self {
			nodes: vec![Node {
				parent: None,
				children: Vec::new(),
				kind: NodeKind::Element {
					tag: "body".to_owned(),
					attributes: Vec::new(),
				},
			}],
			body: NodeId(0),
			mutations: Vec::new(),
		}
	}

	#[must_use]
	pub fn body(&self) -> NodeId {
		self.body
	}

	fn create_node(&mut self, kind: NodeKind) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			parent: None,
			children: Vec::new(),
			kind,
		});
		id
	}

	/// Creates a detached element. Tag names are stored lowercase.
	pub fn create_element(&mut self, tag: &str) -> NodeId {
		self.create_node(NodeKind::Element {
			tag: tag.to_ascii_lowercase(),
			attributes: Vec::new(),
		})
	}

	pub fn create_text(&mut self, text: &str) -> NodeId {
		self.create_node(NodeKind::Text(text.to_owned()))
	}

	pub fn create_comment(&mut self, comment: &str) -> NodeId {
		self.create_node(NodeKind::Comment(comment.to_owned()))
	}

	fn node(&self, id: NodeId) -> Result<&Node, DomError> {
		self.nodes.get(id.0).ok_or(DomError::InvalidNode(id))
	}

	#[must_use]
	pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
		self.nodes.get(id.0).map(|node| &node.kind)
	}

	#[must_use]
	pub fn tag(&self, id: NodeId) -> Option<&str> {
		match self.kind(id)? {
			NodeKind::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_element(&self, id: NodeId) -> bool {
		self.tag(id).is_some()
	}

	#[must_use]
	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(id.0)?.parent
	}

	#[must_use]
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.nodes.get(id.0).map_or(&[], |node| &node.children)
	}

	/// Whether `descendant` is `ancestor` or lies below it.
	#[must_use]
	pub fn contains(&self, ancestor: NodeId, descendant: NodeId) -> bool {
		let mut cursor = Some(descendant);
		while let Some(node) = cursor {
			if node == ancestor {
				return true;
			}
			cursor = self.parent(node);
		}
		false
	}

	#[must_use]
	pub fn is_attached(&self, id: NodeId) -> bool {
		self.contains(self.body, id)
	}

	/// All nodes below `id` in document order, excluding `id` itself.
	#[must_use]
	pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
		while let Some(next) = stack.pop() {
			out.push(next);
			stack.extend(self.children(next).iter().rev().copied());
		}
		out
	}

	pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
		self.insert_before(parent, child, None)
	}

	pub fn prepend_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
		let reference = self.children(parent).first().copied();
		self.insert_before(parent, child, reference)
	}

	/// Inserts `child` into `parent` before `reference`, or at the end if `reference` is [`None`].
	///
	/// A node that already has a parent is moved.
	#[instrument(skip(self))]
	pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<(), DomError> {
		if !self.is_element(parent) {
			return Err(DomError::NotAnElement(parent));
		}
		self.node(child)?;
		if child == self.body {
			return Err(DomError::BodyImmovable);
		}
		if self.contains(child, parent) {
			return Err(DomError::Cycle { parent, child });
		}
		if let Some(reference) = reference {
			if self.parent(reference) != Some(parent) {
				return Err(DomError::NotAChild { parent, reference });
			}
			if reference == child {
				return Ok(());
			}
		}

		let was_attached = self.is_attached(child);
		self.detach(child);
		let siblings = &mut self.nodes[parent.0].children;
		let index = reference.and_then(|reference| siblings.iter().position(|&id| id == reference)).unwrap_or(siblings.len());
		siblings.insert(index, child);
		self.nodes[child.0].parent = Some(parent);

		if was_attached {
			self.mutations.push(Mutation::Removed(child));
		}
		if self.is_attached(parent) {
			trace!("Inserted {:?} into the attached tree.", child);
			self.mutations.push(Mutation::Inserted(child));
		}
		Ok(())
	}

	fn detach(&mut self, child: NodeId) {
		if let Some(old_parent) = self.nodes[child.0].parent.take() {
			self.nodes[old_parent.0].children.retain(|&id| id != child);
		}
	}

	/// Detaches `child` from its parent, if any.
	#[instrument(skip(self))]
	pub fn remove(&mut self, child: NodeId) -> Result<(), DomError> {
		self.node(child)?;
		if child == self.body {
			return Err(DomError::BodyImmovable);
		}
		let was_attached = self.is_attached(child);
		self.detach(child);
		if was_attached {
			trace!("Removed {:?} from the attached tree.", child);
			self.mutations.push(Mutation::Removed(child));
		}
		Ok(())
	}

	pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
		if self.parent(child) != Some(parent) {
			return Err(DomError::NotAChild { parent, reference: child });
		}
		self.remove(child)
	}

	/// Removes all children of `id`.
	pub fn clear_children(&mut self, id: NodeId) -> Result<(), DomError> {
		for child in self.node(id)?.children.clone() {
			self.remove(child)?;
		}
		Ok(())
	}

	#[must_use]
	pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
		match self.kind(id) {
			Some(NodeKind::Element { attributes, .. }) => attributes,
			_ => &[],
		}
	}

	#[must_use]
	pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
		self.attributes(id).iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
	}

	fn attributes_mut(&mut self, id: NodeId) -> Result<&mut Vec<(String, String)>, DomError> {
		match self.nodes.get_mut(id.0).map(|node| &mut node.kind) {
			Some(NodeKind::Element { attributes, .. }) => Ok(attributes),
			Some(_) => Err(DomError::NotAnElement(id)),
			None => Err(DomError::InvalidNode(id)),
		}
	}

	/// Returns whether the stored value changed.
	pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<bool, DomError> {
		let attributes = self.attributes_mut(id)?;
		match attributes.iter_mut().find(|(n, _)| n == name) {
			Some((_, existing)) if existing == value => Ok(false),
			Some((_, existing)) => {
				*existing = value.to_owned();
				Ok(true)
			}
			None => {
				attributes.push((name.to_owned(), value.to_owned()));
				Ok(true)
			}
		}
	}

	/// Returns whether an attribute was removed.
	pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<bool, DomError> {
		let attributes = self.attributes_mut(id)?;
		let before = attributes.len();
		attributes.retain(|(n, _)| n != name);
		Ok(attributes.len() != before)
	}

	/// The data of a text or comment node.
	#[must_use]
	pub fn data(&self, id: NodeId) -> Option<&str> {
		match self.kind(id)? {
			NodeKind::Text(data) | NodeKind::Comment(data) => Some(data),
			NodeKind::Element { .. } => None,
		}
	}

	#[must_use]
	pub fn is_comment(&self, id: NodeId) -> bool {
		matches!(self.kind(id), Some(NodeKind::Comment(_)))
	}

	#[must_use]
	pub fn text_content(&self, id: NodeId) -> String {
		match self.kind(id) {
			Some(NodeKind::Text(text)) => text.clone(),
			Some(NodeKind::Comment(_)) | None => String::new(),
			Some(NodeKind::Element { .. }) => self.children(id).iter().map(|&child| self.text_content(child)).collect(),
		}
	}

	/// Replaces all children of `id` with a single text node.
	pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
		self.clear_children(id)?;
		if !text.is_empty() {
			let text = self.create_text(text);
			self.append_child(id, text)?;
		}
		Ok(())
	}

	/// Serializes the children of `id`.
	#[must_use]
	pub fn inner_html(&self, id: NodeId) -> String {
		let mut html = String::new();
		for &child in self.children(id) {
			self.write_outer_html(child, &mut html);
		}
		html
	}

	#[must_use]
	pub fn outer_html(&self, id: NodeId) -> String {
		let mut html = String::new();
		self.write_outer_html(id, &mut html);
		html
	}

	fn write_outer_html(&self, id: NodeId, html: &mut String) {
		match self.kind(id) {
			None => (),
			Some(NodeKind::Text(text)) => html.push_str(&escape(text, false)),
			Some(NodeKind::Comment(comment)) => {
				let _ = write!(html, "<!--{}-->", comment);
			}
			Some(NodeKind::Element { tag, attributes }) => {
				html.push('<');
				html.push_str(tag);
				for (name, value) in attributes {
					let _ = write!(html, " {}=\"{}\"", name, escape(value, true));
				}
				html.push('>');
				for &child in self.children(id) {
					self.write_outer_html(child, html);
				}
				let _ = write!(html, "</{}>", tag);
			}
		}
	}

	#[must_use]
	pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
		match self.tag(id) {
			Some(tag) => selector.matches(tag, self.attributes(id)),
			None => false,
		}
	}

	/// Elements below `root` (excluding `root`) that match `selector`, in document order.
	#[must_use]
	pub fn query_all(&self, root: NodeId, selector: &Selector) -> Vec<NodeId> {
		self.descendants(root).into_iter().filter(|&id| self.matches(id, selector)).collect()
	}

	/// Hands out and clears the recorded mutations.
	pub fn take_mutations(&mut self) -> Vec<Mutation> {
		core::mem::take(&mut self.mutations)
	}

	#[must_use]
	pub fn has_pending_mutations(&self) -> bool {
		!self.mutations.is_empty()
	}
}

fn escape(text: &str, attribute: bool) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' if attribute => escaped.push_str("&quot;"),
			c => escaped.push(c),
		}
	}
	escaped
}
