use crate::{class::ClassId, dom::NodeId};
use thiserror::Error;

/// Why a component class could not be declared.
///
/// The lenient entry points log these as warnings and hand back the parent class instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeclareError {
	#[error("invalid tag name {0:?}: must start with a lowercase ASCII letter and contain a dash")]
	InvalidTagName(String),
	#[error("invalid pseudo name {0:?}")]
	InvalidPseudoName(String),
	#[error("class <{0}> is not subclassable; only pseudo variants may extend it")]
	NotSubclassable(String),
	#[error("pseudo variant {pseudo:?} must keep its parent's tag <{parent}>, not <{tag}>")]
	PseudoTagMismatch { parent: String, tag: String, pseudo: String },
	#[error("the root class has no tag to create a pseudo variant of")]
	PseudoOfRoot,
	#[error("{0:?} is not a class of this runtime")]
	UnknownClass(ClassId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
	#[error("{0:?} is not a valid node")]
	InvalidNode(NodeId),
	#[error("{0:?} is not an element")]
	NotAnElement(NodeId),
	#[error("inserting {child:?} into {parent:?} would create a cycle")]
	Cycle { parent: NodeId, child: NodeId },
	#[error("{reference:?} is not a child of {parent:?}")]
	NotAChild { parent: NodeId, reference: NodeId },
	#[error("the document body can't be moved")]
	BodyImmovable,
}

/// Failure to recover an embedded model snapshot.
#[derive(Debug, Error)]
pub enum ModelError {
	#[error("malformed model JSON: {0}")]
	Json(#[from] serde_json::Error),
	#[error("embedded model is not a JSON object")]
	NotAnObject,
}
