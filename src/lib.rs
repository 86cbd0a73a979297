#![doc(html_root_url = "https://docs.rs/itags/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Tag-bound component classes over a small document model.
//!
//! Classes form chains below a root class. Instances are upgraded from elements whose tag (and `is` attribute) is registered,
//! run chained `init`/`destroy` hooks, and keep a model in sync with their declared attributes.
//! Method implementations can reach their ancestors' versions with [`Scope::call_super`] and the version they replaced with
//! [`Scope::call_original`]. Classes stay mutable: redefining `init` or `sync` re-runs it on every live instance.
//!
//! Everything is driven by an explicit [`Runtime`]. Call [`Runtime::tick`] to let it process document changes and deferred work.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod class;
mod config;
mod dispatch;
pub mod dom;
mod error;
pub mod events;
mod lifecycle;
pub mod load;
mod model;
mod plugin;
mod rc_hash_map;
mod reactor;
mod registry;
mod runtime;
pub mod selector;
mod upgrade;
mod value;

pub use class::{internal_name, is_lifecycle_name, validate_tag, ClassId, ComponentClass, Member, Members, MethodFn, SubclassOptions, METHOD_TABLE};
pub use config::Config;
pub use dispatch::Scope;
pub use dom::{Document, NodeId};
pub use error::{DeclareError, DomError, ModelError};
pub use model::Model;
pub use plugin::Plugin;
pub use rc_hash_map::CountSaturatedError;
pub use registry::Registry;
pub use runtime::{LifecycleState, Runtime};
pub use upgrade::ModelBinding;
pub use value::{AttrType, Value};
