//! Compiled expressions and the port through which they are resolved.

use crate::{
	component::ComponentDef,
	data::{DataPath, Scope, Value},
};
use std::rc::Rc;
use thiserror::Error;

/// A bound expression as produced by the template compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Literal(Value),
	/// A plain accessor like `items[0].name`.
	Path(DataPath),
	/// Text interpolation, rendered as the concatenation of its parts.
	Interp(Vec<Expr>),
	/// Anything the built-in [`ScopeResolver`] doesn't understand. Custom [`Resolver`]s may evaluate it.
	Opaque { source: Rc<str>, deps: Vec<DataPath> },
}
impl Expr {
	#[must_use]
	pub fn path(source: &str) -> Self {
		Self::Path(DataPath::parse(source))
	}

	#[must_use]
	pub fn literal(value: impl Into<Value>) -> Self {
		Self::Literal(value.into())
	}

	/// The accessor path, if this is a plain accessor.
	#[must_use]
	pub fn as_path(&self) -> Option<&DataPath> {
		match self {
			Expr::Path(path) => Some(path),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_static(&self) -> bool {
		match self {
			Expr::Literal(_) => true,
			Expr::Interp(parts) => parts.iter().all(Expr::is_static),
			Expr::Path(_) | Expr::Opaque { .. } => false,
		}
	}

	/// Calls `f` with each data path this expression reads.
	pub fn for_each_dep(&self, f: &mut impl FnMut(&DataPath)) {
		match self {
			Expr::Literal(_) => (),
			Expr::Path(path) => f(path),
			Expr::Interp(parts) => {
				for part in parts {
					part.for_each_dep(f)
				}
			}
			Expr::Opaque { deps, .. } => deps.iter().for_each(f),
		}
	}

	/// Whether a change at `changed` can affect this expression's value.
	#[must_use]
	pub fn depends_on(&self, changed: &DataPath) -> bool {
		let mut hit = false;
		self.for_each_dep(&mut |dep| hit = hit || dep.intersects(changed));
		hit
	}
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
	#[error("unsupported expression `{0}`")]
	Unsupported(Rc<str>),
	#[error("failed to evaluate `{source_text}`: {message}")]
	Failed { source_text: Rc<str>, message: String },
}

/// Evaluates bound expressions. Implementations must be free of side effects.
pub trait Resolver {
	/// # Errors
	///
	/// Whatever the evaluator considers a failure. The view tree reports it and renders the node as if the value were [`Value::Null`].
	fn resolve(&self, expr: &Expr, scope: &Scope, owner: Option<&ComponentDef>) -> Result<Value, ResolveError>;
}
impl<R: Resolver + ?Sized> Resolver for Rc<R> {
	fn resolve(&self, expr: &Expr, scope: &Scope, owner: Option<&ComponentDef>) -> Result<Value, ResolveError> {
		(**self).resolve(expr, scope, owner)
	}
}

/// Resolves literals, accessor paths and interpolations. Missing data resolves to [`Value::Null`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ScopeResolver;
impl Resolver for ScopeResolver {
	fn resolve(&self, expr: &Expr, scope: &Scope, owner: Option<&ComponentDef>) -> Result<Value, ResolveError> {
		match expr {
			Expr::Literal(value) => Ok(value.clone()),
			Expr::Path(path) => Ok(scope.lookup(path).unwrap_or_default()),
			Expr::Interp(parts) => {
				let mut text = String::new();
				for part in parts {
					text += &self.resolve(part, scope, owner)?.to_string();
				}
				Ok(Value::String(text))
			}
			Expr::Opaque { source, .. } => Err(ResolveError::Unsupported(source.clone())),
		}
	}
}
