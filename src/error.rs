use crate::{expr::ResolveError, tree::NodeId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
	#[error(transparent)]
	Resolve(#[from] ResolveError),

	#[error("hydration mismatch: expected {expected} but found {found}")]
	HydrationMismatch { expected: String, found: String },

	#[error("failed to load component <{tag}>: {message}")]
	LoadFailed { tag: String, message: String },

	#[error("depth limit ({limit}) reached")]
	DepthLimit { limit: usize },

	#[error("loop source is not a list (found {found})")]
	NotAList { found: String },

	#[error("unknown node {0:?}")]
	UnknownNode(NodeId),

	#[error("node {0:?} is not a component")]
	NotAComponent(NodeId),

	#[error("can't write data path `{path}`")]
	InvalidPath { path: String },

	#[error("component template of `{name}` must have an element root")]
	InvalidTemplate { name: String },
}

/// A recoverable error, attributed to the component whose markup caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reported {
	pub component: Option<NodeId>,
	pub error: Error,
}
