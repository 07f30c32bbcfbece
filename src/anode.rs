//! Abstract nodes: the compiled, immutable form of one markup element and its bindings.
//!
//! Abstract nodes are built bottom-up and sealed by [`ANode::prepare`], which also computes the node's
//! [`Hotspot`]. Once prepared, an abstract node is shared by reference between all live nodes created from it.

use crate::{data::Value, expr::Expr};
use core::sync::atomic::{AtomicU32, Ordering};
use std::rc::Rc;

/// Tag reserved for slot outlets.
pub const SLOT_TAG: &str = "slot";
/// Tag reserved for element-less grouping.
pub const TEMPLATE_TAG: &str = "template";

/// Attributes that are left out entirely when they resolve to an empty value at creation.
pub(crate) const EMPTY_SKIPPED_PROPS: [&str; 3] = ["class", "style", "id"];

#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
	pub name: Rc<str>,
	pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForDirective {
	/// Name the current item is bound to in the item scope.
	pub item: Rc<str>,
	/// Name the current position is bound to in the item scope, if any.
	pub index: Option<Rc<str>>,
	pub list: Expr,
	/// Key expression, resolved against the item scope. Enables keyed reconciliation.
	pub track_by: Option<Expr>,
}
impl ForDirective {
	#[must_use]
	pub fn new(item: &str, list: Expr) -> Self {
		Self {
			item: item.into(),
			index: None,
			list,
			track_by: None,
		}
	}

	#[must_use]
	pub fn index(mut self, name: &str) -> Self {
		self.index = Some(name.into());
		self
	}

	#[must_use]
	pub fn track_by(mut self, key: Expr) -> Self {
		self.track_by = Some(key);
		self
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
	pub r#if: Option<Expr>,
	/// Only meaningful on nodes in an [`ANode::elses`] list.
	pub elif: Option<Expr>,
	pub r#for: Option<ForDirective>,
	/// Raw bind: a map-valued expression spread as attributes.
	pub bind: Option<Expr>,
}

/// An element with only its static attributes, ready to be cloned by a [`Surface`](`crate::surface::Surface`).
#[derive(Debug, PartialEq)]
pub struct StaticElement {
	id: u32,
	pub tag: Rc<str>,
	pub attributes: Vec<(Rc<str>, String)>,
}
impl StaticElement {
	/// Unique for the lifetime of the process, so surfaces can cache one prototype per template.
	#[must_use]
	pub fn id(&self) -> u32 {
		self.id
	}
}

static NEXT_TEMPLATE_ID: AtomicU32 = AtomicU32::new(1);

/// Precomputed creation shortcuts. Never mutated after [`ANode::prepare`].
#[derive(Debug, Default, PartialEq)]
pub struct Hotspot {
	/// Template carrying the static attributes, cloned instead of building the element from scratch.
	pub source_node: Option<StaticElement>,
	/// Indices into [`ANode::props`] that still have to be resolved after cloning [`Self::source_node`].
	pub dynamic_props: Vec<usize>,
	/// The conditional branches, as `(condition, content)`. The final `else` has no condition.
	pub if_branches: Vec<(Option<Expr>, Rc<ANode>)>,
	/// This node without its `for` directive: the shape of each loop item.
	pub for_item: Option<Rc<ANode>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ANode {
	pub tag_name: Rc<str>,
	pub props: Vec<Prop>,
	pub directives: Directives,
	pub children: Vec<Rc<ANode>>,
	pub text_expr: Option<Expr>,
	/// `else`/`elif` siblings following an `if` node.
	pub elses: Vec<Rc<ANode>>,
	hotspot: Rc<Hotspot>,
}
impl ANode {
	#[must_use]
	pub fn element(tag_name: &str) -> Self {
		Self {
			tag_name: tag_name.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn text(expr: Expr) -> Self {
		Self {
			text_expr: Some(expr),
			..Self::default()
		}
	}

	#[must_use]
	pub fn static_text(text: &str) -> Self {
		Self::text(Expr::literal(text))
	}

	#[must_use]
	pub fn prop(mut self, name: &str, expr: Expr) -> Self {
		self.props.push(Prop { name: name.into(), expr });
		self
	}

	#[must_use]
	pub fn attr(self, name: &str, value: &str) -> Self {
		self.prop(name, Expr::literal(value))
	}

	#[must_use]
	pub fn child(mut self, child: ANode) -> Self {
		self.children.push(child.prepare());
		self
	}

	#[must_use]
	pub fn r#if(mut self, condition: Expr) -> Self {
		self.directives.r#if = Some(condition);
		self
	}

	/// Adds an `elif` branch (with `Some`) or the final `else` branch (with `None`).
	#[must_use]
	pub fn r#else(mut self, condition: Option<Expr>, mut branch: ANode) -> Self {
		branch.directives.elif = condition;
		self.elses.push(branch.prepare());
		self
	}

	#[must_use]
	pub fn r#for(mut self, directive: ForDirective) -> Self {
		self.directives.r#for = Some(directive);
		self
	}

	#[must_use]
	pub fn bind(mut self, expr: Expr) -> Self {
		self.directives.bind = Some(expr);
		self
	}

	#[must_use]
	pub fn hotspot(&self) -> &Hotspot {
		&self.hotspot
	}

	/// The value of a literal prop, for compile-time matching like slot names.
	#[must_use]
	pub fn static_prop(&self, name: &str) -> Option<&Value> {
		self.props.iter().find(|prop| &*prop.name == name).and_then(|prop| match &prop.expr {
			Expr::Literal(value) => Some(value),
			_ => None,
		})
	}

	/// Seals the node and computes its [`Hotspot`].
	#[must_use]
	pub fn prepare(mut self) -> Rc<Self> {
		let mut hotspot = Hotspot::default();

		if self.directives.r#if.is_some() {
			let mut main = self.clone();
			let condition = main.directives.r#if.take();
			main.elses.clear();
			hotspot.if_branches.push((condition, main.prepare()));
			for branch in &self.elses {
				let mut content = (**branch).clone();
				let condition = content.directives.elif.take();
				hotspot.if_branches.push((condition, content.prepare()));
			}
		} else if self.directives.r#for.is_some() {
			let mut item = self.clone();
			item.directives.r#for = None;
			hotspot.for_item = Some(item.prepare());
		} else if self.text_expr.is_none() && !self.tag_name.is_empty() && &*self.tag_name != SLOT_TAG && &*self.tag_name != TEMPLATE_TAG {
			let mut attributes = vec![];
			for (i, prop) in self.props.iter().enumerate() {
				match &prop.expr {
					Expr::Literal(value) => {
						if is_attribute_present(&prop.name, value) {
							attributes.push((prop.name.clone(), attribute_text(value)))
						}
					}
					_ => hotspot.dynamic_props.push(i),
				}
			}
			hotspot.source_node = Some(StaticElement {
				id: NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed),
				tag: self.tag_name.clone(),
				attributes,
			});
		}

		self.hotspot = Rc::new(hotspot);
		Rc::new(self)
	}
}

/// Whether a prop with this resolved value produces an attribute at all.
pub(crate) fn is_attribute_present(name: &str, value: &Value) -> bool {
	match value {
		Value::Null | Value::Bool(false) => false,
		value => value.is_truthy() || !EMPTY_SKIPPED_PROPS.contains(&name),
	}
}

/// How a value is written into an attribute. `true` becomes an empty (present) attribute.
pub(crate) fn attribute_text(value: &Value) -> String {
	match value {
		Value::Bool(true) => String::new(),
		other => other.to_string(),
	}
}
