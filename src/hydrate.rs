//! Reverse construction: builds the live tree over output that already exists, e.g. from server-side rendering.
//!
//! The existing output must have exactly the shape fresh creation would produce, anchors included.
//! Markup from [`render_to_string`](`crate::ssr::render_to_string`) qualifies after parsing: its text markers are consumed here.
//! Attributes of adopted elements aren't rewritten. Text is only rewritten where it differs.
//!
//! Nothing is written to the output (and no load starts) until the whole tree matched.

use crate::{
	component::ComponentDef,
	data::Value,
	error::Error,
	expr::Resolver,
	life_cycle::LifeCycle,
	surface::{OutputKind, Surface, EMPTY_TEXT, TEXT_BREAK},
	tree::{Kind, NodeId, NodeType, Tree},
};
use std::rc::Rc;
use tracing::{instrument, trace, trace_span};

/// Cursor over the existing children of one output element.
struct Walker<H> {
	parent: H,
	current: Option<H>,
}

/// Output changes and side effects held back until hydration succeeded.
enum Fixup<H> {
	SetText(H, String),
	Insert { new: H, parent: H, reference: Option<H> },
	Remove(H),
	StartLoad(NodeId),
}

enum Expected<'a> {
	Element(&'a str),
	Text,
	Anchor(&'a str),
}
impl Expected<'_> {
	fn describe(&self) -> String {
		match self {
			Expected::Element(tag) => format!("<{}>", tag),
			Expected::Text => "text".to_string(),
			Expected::Anchor(label) => format!("<!--{}-->", label),
		}
	}

	fn matches(&self, found: &OutputKind) -> bool {
		match (self, found) {
			(Expected::Element(tag), OutputKind::Element(found)) => tag.eq_ignore_ascii_case(found),
			(Expected::Text, OutputKind::Text(_)) => true,
			(Expected::Anchor(label), OutputKind::Anchor(found)) => label == found,
			_ => false,
		}
	}
}

fn describe(found: Option<&OutputKind>) -> String {
	match found {
		None => "end of content".to_string(),
		Some(OutputKind::Element(tag)) => format!("<{}>", tag),
		Some(OutputKind::Text(text)) => format!("text {:?}", text),
		Some(OutputKind::Anchor(label)) => format!("<!--{}-->", label),
	}
}

impl<S: Surface, R: Resolver> Tree<S, R> {
	/// Creates a root component over the existing content of `container`.
	///
	/// # Errors
	///
	/// [`Error::HydrationMismatch`] if the existing output doesn't have the expected shape.
	/// Nothing remains of the partially built tree in that case, and the output is left as it was.
	#[instrument(skip(self, def, data, container), fields(component = %def.name))]
	pub fn hydrate<K: AsRef<str>>(&mut self, def: Rc<ComponentDef>, data: impl IntoIterator<Item = (K, Value)>, container: &S::Handle) -> Result<NodeId, Error> {
		let root = self.create_root(def, data)?;
		let mut walker = Walker {
			parent: container.clone(),
			current: self.surface.first_child(container),
		};
		let mut fixups = vec![];
		match self.hydrate_node(root, &mut walker, &mut fixups) {
			Ok(()) => {
				if let Some(rest) = &walker.current {
					trace!("Leaving trailing output {:?} alone.", rest);
				}
				self.apply_fixups(fixups);
				Ok(root)
			}
			Err(error) => {
				self.dispose_node(root, true);
				Err(error)
			}
		}
	}

	fn apply_fixups(&mut self, fixups: Vec<Fixup<S::Handle>>) {
		trace!(count = fixups.len(), "Applying hydration fixups.");
		for fixup in fixups {
			match fixup {
				Fixup::SetText(text, content) => self.surface.set_text(&text, &content),
				Fixup::Insert { new, parent, reference } => self.surface.insert_before(&new, &parent, reference.as_ref()),
				Fixup::Remove(marker) => self.surface.remove(&marker),
				Fixup::StartLoad(id) => self.start_load(id),
			}
		}
	}

	/// Consumes the next existing output node if it is an anchor labelled `label`.
	fn skip_marker(&self, walker: &mut Walker<S::Handle>, label: &str) -> Option<S::Handle> {
		let current = walker.current.clone()?;
		match self.surface.inspect(&current) {
			OutputKind::Anchor(found) if found == label => {
				walker.current = self.surface.next_sibling(&current);
				Some(current)
			}
			_ => None,
		}
	}

	/// Consumes the next existing output node if it matches `expected`.
	fn adopt(&self, walker: &mut Walker<S::Handle>, expected: &Expected) -> Result<S::Handle, Error> {
		let found = walker.current.as_ref().map(|current| self.surface.inspect(current));
		match (walker.current.clone(), found) {
			(Some(current), Some(kind)) if expected.matches(&kind) => {
				walker.current = self.surface.next_sibling(&current);
				Ok(current)
			}
			(_, found) => Err(Error::HydrationMismatch {
				expected: expected.describe(),
				found: describe(found.as_ref()),
			}),
		}
	}

	fn hydrate_node(&mut self, id: NodeId, walker: &mut Walker<S::Handle>, fixups: &mut Vec<Fixup<S::Handle>>) -> Result<(), Error> {
		let node_type = self.node_type(id).ok_or(Error::UnknownNode(id))?;
		let span = trace_span!("Hydrating", %id, ?node_type);
		let _enter = span.enter();

		match node_type {
			NodeType::Text => self.hydrate_text(id, walker, fixups)?,
			NodeType::Element | NodeType::Component => self.hydrate_element(id, walker, fixups)?,
			NodeType::If => {
				let branch = self.select_branch(id, &[]);
				let content = match self.nodes.get_mut(&id) {
					Some(node) => {
						if let Kind::If { branch: current, .. } = &mut node.kind {
							*current = branch;
						}
						branch.and_then(|branch| node.anode.hotspot().if_branches.get(branch).map(|(_, content)| content.clone()))
					}
					None => None,
				};
				if let Some(child) = content.and_then(|content| self.create_child(id, &content, None, None)) {
					self.hydrate_node(child, walker, fixups)?
				}
				let anchor = self.adopt(walker, &Expected::Anchor("s-if"))?;
				if let Some(Kind::If { el, .. }) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
					*el = Some(anchor)
				}
			}
			NodeType::For => {
				let list = self.for_list(id);
				for (i, value) in list.into_iter().enumerate() {
					if let Some(child) = self.new_item(id, i, value) {
						self.hydrate_node(child, walker, fixups)?
					}
				}
				let anchor = self.adopt(walker, &Expected::Anchor("s-for"))?;
				if let Some(Kind::For { el, .. }) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
					*el = Some(anchor)
				}
			}
			NodeType::Slot | NodeType::Template => {
				let (content, is_slot) = match self.nodes.get(&id) {
					Some(node) => match &node.kind {
						Kind::Slot { content, .. } => (content.clone(), true),
						_ => (node.anode.children.clone(), false),
					},
					None => return Err(Error::UnknownNode(id)),
				};
				let (start, end) = if is_slot { ("s-slot", "/s-slot") } else { ("s-tpl", "/s-tpl") };
				let sel = self.adopt(walker, &Expected::Anchor(start))?;
				for child in &content {
					if let Some(child) = self.create_child(id, child, None, None) {
						self.hydrate_node(child, walker, fixups)?
					}
				}
				let el = self.adopt(walker, &Expected::Anchor(end))?;
				if let Some(Kind::Slot { sel: s, el: e, .. }) | Some(Kind::Template { sel: s, el: e }) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
					*s = Some(sel);
					*e = Some(el);
				}
			}
			NodeType::Async => {
				let (anode, owner, scope, placeholder) = match self.nodes.get(&id) {
					Some(node) => match &node.kind {
						Kind::Async(state) => (node.anode.clone(), node.owner, node.scope.clone(), state.registration.placeholder.clone()),
						_ => return Err(Error::UnknownNode(id)),
					},
					None => return Err(Error::UnknownNode(id)),
				};
				if let Some(placeholder) = placeholder {
					let child = self.create_component(placeholder, Some(anode), owner, scope, Some(id))?;
					if let Some(node) = self.nodes.get_mut(&id) {
						node.children.push(child)
					}
					self.hydrate_node(child, walker, fixups)?
				}
				let anchor = self.adopt(walker, &Expected::Anchor("s-async"))?;
				if let Some(Kind::Async(state)) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
					state.el = Some(anchor)
				}
				self.to_phase(id, LifeCycle::Created);
				self.to_phase(id, LifeCycle::Attached);
				fixups.push(Fixup::StartLoad(id));
				return Ok(());
			}
		}

		self.to_phase(id, LifeCycle::Created);
		self.to_phase(id, LifeCycle::Attached);
		Ok(())
	}

	/// Adopts one text node. Parsed markup may instead hold an empty-text marker, or nothing at all for empty text.
	fn hydrate_text(&mut self, id: NodeId, walker: &mut Walker<S::Handle>, fixups: &mut Vec<Fixup<S::Handle>>) -> Result<(), Error> {
		let (anode, scope, owner) = match self.nodes.get(&id) {
			Some(node) => (node.anode.clone(), node.scope.clone(), node.owner),
			None => return Err(Error::UnknownNode(id)),
		};
		let content = match &anode.text_expr {
			Some(expr) => self.eval(expr, &scope, owner).to_string(),
			None => String::new(),
		};

		if let Some(separator) = self.skip_marker(walker, TEXT_BREAK) {
			fixups.push(Fixup::Remove(separator));
		}
		let existing = match walker.current.as_ref().map(|current| self.surface.inspect(current)) {
			Some(OutputKind::Text(existing)) => Some(existing),
			_ => None,
		};
		let text = match existing {
			Some(existing) => {
				let text = self.adopt(walker, &Expected::Text)?;
				if existing != content {
					trace!("Correcting hydrated text.");
					fixups.push(Fixup::SetText(text.clone(), content.clone()));
				}
				text
			}
			None => {
				let marker = self.skip_marker(walker, EMPTY_TEXT);
				if marker.is_none() && !content.is_empty() {
					return Err(Error::HydrationMismatch {
						expected: Expected::Text.describe(),
						found: describe(walker.current.as_ref().map(|current| self.surface.inspect(current)).as_ref()),
					});
				}
				trace!("Restoring text that has no output node.");
				let text = self.surface.create_text(&content);
				fixups.push(Fixup::Insert {
					new: text.clone(),
					parent: walker.parent.clone(),
					reference: marker.clone().or_else(|| walker.current.clone()),
				});
				if let Some(marker) = marker {
					fixups.push(Fixup::Remove(marker));
				}
				text
			}
		};

		if let Some(node) = self.nodes.get_mut(&id) {
			node.kind = Kind::Text { el: Some(text), content };
		}
		Ok(())
	}

	fn hydrate_element(&mut self, id: NodeId, walker: &mut Walker<S::Handle>, fixups: &mut Vec<Fixup<S::Handle>>) -> Result<(), Error> {
		let anode = self.nodes.get(&id).map(|node| node.anode.clone()).ok_or(Error::UnknownNode(id))?;
		let el = self.adopt(walker, &Expected::Element(&anode.tag_name))?;
		match self.nodes.get_mut(&id).map(|node| &mut node.kind) {
			Some(Kind::Element { el: slot }) => *slot = Some(el.clone()),
			Some(Kind::Component(component)) => component.el = Some(el.clone()),
			_ => return Err(Error::UnknownNode(id)),
		}

		let mut inner = Walker {
			current: self.surface.first_child(&el),
			parent: el,
		};
		for child in &anode.children {
			if let Some(child) = self.create_child(id, child, None, None) {
				self.hydrate_node(child, &mut inner, fixups)?
			}
		}
		match inner.current {
			None => Ok(()),
			Some(extra) => Err(Error::HydrationMismatch {
				expected: format!("end of <{}>", anode.tag_name),
				found: describe(Some(&self.surface.inspect(&extra))),
			}),
		}
	}
}
