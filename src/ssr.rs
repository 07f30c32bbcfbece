//! Server-side rendering into a string that [`Tree::hydrate`] can adopt later.

use crate::{
	component::ComponentDef,
	data::Value,
	error::Error,
	expr::Resolver,
	surface::{Surface, VirtualSurface},
	tree::Tree,
};
use std::rc::Rc;
use tracing::instrument;

/// Renders `def` with `data` and returns the markup, anchors included.
///
/// Text nodes are delimited so that parsing the markup reproduces them one to one.
///
/// # Errors
///
/// The first error reported while rendering, if any.
#[instrument(skip(def, data, resolver), fields(component = %def.name))]
pub fn render_to_string<K: AsRef<str>, R: Resolver>(def: Rc<ComponentDef>, data: impl IntoIterator<Item = (K, Value)>, resolver: R) -> Result<String, Error> {
	let mut tree = Tree::new(VirtualSurface::new(), resolver);
	let container = tree.surface_mut().create_element("body");
	let root = tree.mount(def, data, &container, None)?;
	if let Some(reported) = tree.take_errors().into_iter().next() {
		return Err(reported.error);
	}
	let html = tree.surface().inner_markup(container);
	tree.dispose(root, true);
	Ok(html)
}
