//! An in-memory output tree. Doubles as the string builder for server-side rendering.
//!
//! Handles index into an arena that only grows. Removed nodes stay allocated until the surface is dropped,
//! which suits rendering to a string and tests, but not long-lived live trees with heavy churn.

use super::{OutputKind, Surface, EMPTY_TEXT, TEXT_BREAK};
use crate::anode::StaticElement;
use core::fmt::Write as _;
use hashbrown::HashMap;
use tracing::{error, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualHandle(usize);

#[derive(Debug, Clone)]
enum Content {
	Element { tag: String, attributes: Vec<(String, String)> },
	Text(String),
	Anchor(String),
}

#[derive(Debug, Clone)]
struct VirtualNode {
	content: Content,
	parent: Option<usize>,
	children: Vec<usize>,
}

/// Operation counters, to observe how much output work an operation caused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
	pub elements_created: usize,
	pub texts_created: usize,
	pub anchors_created: usize,
	pub templates_cloned: usize,
	pub insertions: usize,
	pub removals: usize,
	pub text_writes: usize,
	pub attribute_writes: usize,
}

#[derive(Debug, Default)]
pub struct VirtualSurface {
	nodes: Vec<VirtualNode>,
	prototypes: HashMap<u32, usize>,
	stats: Stats,
}

const VOID_ELEMENTS: [&str; 14] = ["area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr"];

impl VirtualSurface {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn stats(&self) -> Stats {
		self.stats
	}

	pub fn reset_stats(&mut self) {
		self.stats = Stats::default()
	}

	fn push(&mut self, content: Content) -> VirtualHandle {
		self.nodes.push(VirtualNode {
			content,
			parent: None,
			children: vec![],
		});
		VirtualHandle(self.nodes.len() - 1)
	}

	#[must_use]
	pub fn children(&self, handle: VirtualHandle) -> Vec<VirtualHandle> {
		self.nodes[handle.0].children.iter().copied().map(VirtualHandle).collect()
	}

	#[must_use]
	pub fn attribute(&self, handle: VirtualHandle, name: &str) -> Option<&str> {
		match &self.nodes[handle.0].content {
			Content::Element { attributes, .. } => attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str()),
			_ => None,
		}
	}

	/// The concatenated text below `handle`.
	#[must_use]
	pub fn text_content(&self, handle: VirtualHandle) -> String {
		let mut text = String::new();
		self.collect_text(handle.0, &mut text);
		text
	}

	fn collect_text(&self, index: usize, text: &mut String) {
		match &self.nodes[index].content {
			Content::Text(content) => text.push_str(content),
			Content::Anchor(_) => (),
			Content::Element { .. } => {
				for &child in &self.nodes[index].children {
					self.collect_text(child, text)
				}
			}
		}
	}

	/// Serializes `handle` and its descendants as HTML.
	#[must_use]
	pub fn to_html(&self, handle: VirtualHandle) -> String {
		let mut html = String::new();
		self.write_html(handle.0, false, &mut html);
		html
	}

	/// Serializes only the descendants of `handle`.
	#[must_use]
	pub fn inner_html(&self, handle: VirtualHandle) -> String {
		let mut html = String::new();
		self.write_children(&self.nodes[handle.0].children, false, &mut html);
		html
	}

	/// Like [`inner_html`](`VirtualSurface::inner_html`), but parsing the result yields one text node per text node here.
	///
	/// Empty text is written as `<!--s-text-->` and adjacent texts are separated by `<!--s-sep-->`.
	#[must_use]
	pub fn inner_markup(&self, handle: VirtualHandle) -> String {
		let mut html = String::new();
		self.write_children(&self.nodes[handle.0].children, true, &mut html);
		html
	}

	fn write_children(&self, children: &[usize], markers: bool, html: &mut String) {
		let mut after_text = false;
		for &child in children {
			if let (true, Content::Text(text)) = (markers, &self.nodes[child].content) {
				if text.is_empty() {
					let _ = write!(html, "<!--{}-->", EMPTY_TEXT);
					after_text = false;
					continue;
				}
				if after_text {
					let _ = write!(html, "<!--{}-->", TEXT_BREAK);
				}
			}
			after_text = matches!(self.nodes[child].content, Content::Text(_));
			self.write_html(child, markers, html)
		}
	}

	fn write_html(&self, index: usize, markers: bool, html: &mut String) {
		let node = &self.nodes[index];
		match &node.content {
			Content::Text(text) => escape(text, false, html),
			Content::Anchor(label) => {
				html.push_str("<!--");
				html.push_str(&label.replace("--", "- -"));
				html.push_str("-->");
			}
			Content::Element { tag, attributes } => {
				html.push('<');
				html.push_str(tag);
				for (name, value) in attributes {
					if value.is_empty() {
						let _ = write!(html, " {}", name);
					} else {
						let _ = write!(html, " {}=\"", name);
						escape(value, true, html);
						html.push('"');
					}
				}
				html.push('>');
				if VOID_ELEMENTS.contains(&tag.as_str()) {
					if !node.children.is_empty() {
						error!("Void element <{}> has children; They are not serialized.", tag);
					}
					return;
				}
				self.write_children(&node.children, markers, html);
				let _ = write!(html, "</{}>", tag);
			}
		}
	}

	fn detach(&mut self, index: usize) {
		if let Some(parent) = self.nodes[index].parent.take() {
			self.nodes[parent].children.retain(|&child| child != index);
		}
	}
}

fn escape(text: &str, attribute: bool, html: &mut String) {
	for c in text.chars() {
		match c {
			'&' => html.push_str("&amp;"),
			'<' => html.push_str("&lt;"),
			'>' => html.push_str("&gt;"),
			'"' if attribute => html.push_str("&quot;"),
			c => html.push(c),
		}
	}
}

impl Surface for VirtualSurface {
	type Handle = VirtualHandle;

	fn create_element(&mut self, tag: &str) -> VirtualHandle {
		self.stats.elements_created += 1;
		self.push(Content::Element {
			tag: tag.to_owned(),
			attributes: vec![],
		})
	}

	fn create_text(&mut self, text: &str) -> VirtualHandle {
		self.stats.texts_created += 1;
		self.push(Content::Text(text.to_owned()))
	}

	fn create_anchor(&mut self, label: &str) -> VirtualHandle {
		self.stats.anchors_created += 1;
		self.push(Content::Anchor(label.to_owned()))
	}

	fn clone_template(&mut self, source: &StaticElement) -> VirtualHandle {
		let prototype = match self.prototypes.get(&source.id()) {
			Some(&prototype) => prototype,
			None => {
				trace!("Building prototype for <{}>.", source.tag);
				let prototype = self.push(Content::Element {
					tag: source.tag.to_string(),
					attributes: source.attributes.iter().map(|(name, value)| (name.to_string(), value.clone())).collect(),
				});
				self.prototypes.insert(source.id(), prototype.0);
				prototype.0
			}
		};
		self.stats.templates_cloned += 1;
		let content = self.nodes[prototype].content.clone();
		self.push(content)
	}

	fn insert_before(&mut self, new: &VirtualHandle, parent: &VirtualHandle, reference: Option<&VirtualHandle>) {
		self.stats.insertions += 1;
		self.detach(new.0);
		let position = match reference {
			None => self.nodes[parent.0].children.len(),
			Some(reference) => match self.nodes[parent.0].children.iter().position(|&child| child == reference.0) {
				Some(position) => position,
				None => {
					error!("Reference node {:?} is not a child of {:?}. Appending instead.", reference, parent);
					self.nodes[parent.0].children.len()
				}
			},
		};
		self.nodes[parent.0].children.insert(position, new.0);
		self.nodes[new.0].parent = Some(parent.0);
	}

	fn remove(&mut self, handle: &VirtualHandle) {
		self.stats.removals += 1;
		self.detach(handle.0)
	}

	fn set_attribute(&mut self, element: &VirtualHandle, name: &str, value: &str) {
		self.stats.attribute_writes += 1;
		match &mut self.nodes[element.0].content {
			Content::Element { attributes, .. } => match attributes.iter_mut().find(|(n, _)| n == name) {
				Some((_, v)) => *v = value.to_owned(),
				None => attributes.push((name.to_owned(), value.to_owned())),
			},
			other => error!("Tried to set attribute {:?} on non-element {:?}.", name, other),
		}
	}

	fn remove_attribute(&mut self, element: &VirtualHandle, name: &str) {
		if let Content::Element { attributes, .. } = &mut self.nodes[element.0].content {
			attributes.retain(|(n, _)| n != name)
		}
	}

	fn set_text(&mut self, text: &VirtualHandle, content: &str) {
		self.stats.text_writes += 1;
		match &mut self.nodes[text.0].content {
			Content::Text(current) => *current = content.to_owned(),
			other => error!("Tried to set text on non-text {:?}.", other),
		}
	}

	fn parent(&self, handle: &VirtualHandle) -> Option<VirtualHandle> {
		self.nodes[handle.0].parent.map(VirtualHandle)
	}

	fn first_child(&self, handle: &VirtualHandle) -> Option<VirtualHandle> {
		self.nodes[handle.0].children.first().copied().map(VirtualHandle)
	}

	fn next_sibling(&self, handle: &VirtualHandle) -> Option<VirtualHandle> {
		let parent = self.nodes[handle.0].parent?;
		let siblings = &self.nodes[parent].children;
		let position = siblings.iter().position(|&child| child == handle.0)?;
		siblings.get(position + 1).copied().map(VirtualHandle)
	}

	fn inspect(&self, handle: &VirtualHandle) -> OutputKind {
		match &self.nodes[handle.0].content {
			Content::Element { tag, .. } => OutputKind::Element(tag.clone()),
			Content::Text(text) => OutputKind::Text(text.clone()),
			Content::Anchor(label) => OutputKind::Anchor(label.clone()),
		}
	}
}
