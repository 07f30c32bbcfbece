//! The output surface: whatever the view tree materializes its nodes into.
//!
//! Each live node exclusively owns the handles it created. The tree never touches another node's handles.

use crate::anode::StaticElement;
use core::fmt::Debug;

pub mod virtual_dom;
pub mod web;

pub use virtual_dom::{VirtualHandle, VirtualSurface};
pub use web::WebSurface;

/// Anchor label standing in for an empty text node in serialized markup, which a parser wouldn't produce.
pub const EMPTY_TEXT: &str = "s-text";
/// Anchor label separating adjacent text nodes in serialized markup, which a parser would merge.
pub const TEXT_BREAK: &str = "s-sep";

/// What an existing output node looks like, for hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputKind {
	Element(String),
	Text(String),
	Anchor(String),
}

pub trait Surface {
	type Handle: Clone + PartialEq + Debug;

	fn create_element(&mut self, tag: &str) -> Self::Handle;
	fn create_text(&mut self, text: &str) -> Self::Handle;
	/// Creates a placeholder marking a position in the output, like a DOM comment.
	fn create_anchor(&mut self, label: &str) -> Self::Handle;
	/// Creates an element carrying `source`'s tag and attributes.
	fn clone_template(&mut self, source: &StaticElement) -> Self::Handle;

	/// Inserts (or moves) `new` into `parent`, before `reference` or at the end.
	fn insert_before(&mut self, new: &Self::Handle, parent: &Self::Handle, reference: Option<&Self::Handle>);
	/// Detaches `handle` from its parent, if any.
	fn remove(&mut self, handle: &Self::Handle);

	fn set_attribute(&mut self, element: &Self::Handle, name: &str, value: &str);
	fn remove_attribute(&mut self, element: &Self::Handle, name: &str);
	fn set_text(&mut self, text: &Self::Handle, content: &str);

	fn parent(&self, handle: &Self::Handle) -> Option<Self::Handle>;
	fn first_child(&self, handle: &Self::Handle) -> Option<Self::Handle>;
	fn next_sibling(&self, handle: &Self::Handle) -> Option<Self::Handle>;
	fn inspect(&self, handle: &Self::Handle) -> OutputKind;
}
