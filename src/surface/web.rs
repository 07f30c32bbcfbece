//! The browser DOM as output surface.

use super::{OutputKind, Surface};
use crate::anode::StaticElement;
use hashbrown::HashMap;
use tracing::{error, trace, warn};
use wasm_bindgen::JsCast;

/// Materializes nodes as DOM nodes of one [`web_sys::Document`].
#[derive(Debug)]
pub struct WebSurface {
	document: web_sys::Document,
	prototypes: HashMap<u32, web_sys::Element>,
}
impl WebSurface {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		Self {
			document,
			prototypes: HashMap::new(),
		}
	}

	#[must_use]
	pub fn document(&self) -> &web_sys::Document {
		&self.document
	}

	fn create_html_element(&self, tag: &str) -> Option<web_sys::Element> {
		match self.document.create_element(tag) {
			Ok(element) => Some(element),
			Err(error) => {
				error!("Failed to create element <{}>: {:?}", tag, error);
				None
			}
		}
	}
}

impl Surface for WebSurface {
	type Handle = web_sys::Node;

	fn create_element(&mut self, tag: &str) -> web_sys::Node {
		match self.create_html_element(tag) {
			Some(element) => element.into(),
			// Keeps the tree's shape intact, so later insertions and removals still line up.
			None => self.document.create_comment(tag).into(),
		}
	}

	fn create_text(&mut self, text: &str) -> web_sys::Node {
		self.document.create_text_node(text).into()
	}

	fn create_anchor(&mut self, label: &str) -> web_sys::Node {
		self.document.create_comment(label).into()
	}

	fn clone_template(&mut self, source: &StaticElement) -> web_sys::Node {
		if !self.prototypes.contains_key(&source.id()) {
			trace!("Building prototype for <{}>.", source.tag);
			let prototype = match self.create_html_element(&source.tag) {
				Some(prototype) => prototype,
				None => return self.document.create_comment(&source.tag).into(),
			};
			for (name, value) in &source.attributes {
				if let Err(error) = prototype.set_attribute(name, value) {
					error!("Could not set attribute {:?} on prototype: {:?}", name, error)
				}
			}
			self.prototypes.insert(source.id(), prototype);
		}

		let prototype: &web_sys::Node = match self.prototypes.get(&source.id()) {
			Some(prototype) => prototype.as_ref(),
			None => return self.document.create_comment(&source.tag).into(),
		};
		match prototype.clone_node() {
			Ok(clone) => clone,
			Err(error) => {
				error!("Failed to clone prototype <{}>: {:?}", source.tag, error);
				self.create_element(&source.tag)
			}
		}
	}

	fn insert_before(&mut self, new: &web_sys::Node, parent: &web_sys::Node, reference: Option<&web_sys::Node>) {
		if let Err(error) = parent.insert_before(new, reference) {
			error!("Failed to insert node: {:?}", error)
		}
	}

	fn remove(&mut self, handle: &web_sys::Node) {
		match handle.parent_node() {
			Some(parent) => {
				if let Err(error) = parent.remove_child(handle) {
					error!("Failed to remove the node: {:?}", error)
				}
			}
			None => trace!("Node to remove is already detached."),
		}
	}

	fn set_attribute(&mut self, element: &web_sys::Node, name: &str, value: &str) {
		match element.dyn_ref::<web_sys::Element>() {
			Some(element) => {
				if let Err(error) = element.set_attribute(name, value) {
					error!("Could not set attribute {:?}: {:?}", name, error)
				}
			}
			None => warn!("Tried to set attribute {:?} on a non-element.", name),
		}
	}

	fn remove_attribute(&mut self, element: &web_sys::Node, name: &str) {
		if let Some(element) = element.dyn_ref::<web_sys::Element>() {
			if let Err(error) = element.remove_attribute(name) {
				warn!("Could not remove attribute {:?}: {:?}", name, error)
			}
		}
	}

	fn set_text(&mut self, text: &web_sys::Node, content: &str) {
		match text.dyn_ref::<web_sys::CharacterData>() {
			Some(text) => text.set_data(content),
			None => error!("Expected to update `web_sys::Text` but found {:?}.", text),
		}
	}

	fn parent(&self, handle: &web_sys::Node) -> Option<web_sys::Node> {
		handle.parent_node()
	}

	fn first_child(&self, handle: &web_sys::Node) -> Option<web_sys::Node> {
		handle.first_child()
	}

	fn next_sibling(&self, handle: &web_sys::Node) -> Option<web_sys::Node> {
		handle.next_sibling()
	}

	fn inspect(&self, handle: &web_sys::Node) -> OutputKind {
		if let Some(element) = handle.dyn_ref::<web_sys::Element>() {
			OutputKind::Element(element.tag_name().to_ascii_lowercase())
		} else if let Some(text) = handle.dyn_ref::<web_sys::Text>() {
			OutputKind::Text(text.data())
		} else if let Some(comment) = handle.dyn_ref::<web_sys::Comment>() {
			OutputKind::Anchor(comment.data())
		} else {
			OutputKind::Anchor(String::new())
		}
	}
}
