//! Component definitions and the per-component registry of sub-components.

use crate::{anode::ANode, data::Value, tree::NodeId};
use core::fmt::{self, Debug, Formatter};
use hashbrown::HashMap;
use std::rc::Rc;

/// Dynamic lookup consulted before the static registry.
pub type ComponentResolver = dyn Fn(&ANode) -> Option<Registration>;

/// What a tag resolves to in a component's registry.
#[derive(Clone)]
pub enum Registration {
	Component(Rc<ComponentDef>),
	Async(Rc<AsyncRegistration>),
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Registration::Component(def) => f.debug_tuple("Component").field(&def.name).finish(),
			Registration::Async(_) => f.write_str("Async"),
		}
	}
}

pub struct ComponentDef {
	pub name: Rc<str>,
	/// The component's own markup. Its root must be an element.
	pub template: Rc<ANode>,
	/// Initial data, before invocation props are applied.
	pub data: Vec<(Rc<str>, Value)>,
	components: HashMap<Rc<str>, Registration>,
	resolver: Option<Box<ComponentResolver>>,
}
impl Debug for ComponentDef {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentDef")
			.field("name", &self.name)
			.field("template", &self.template.tag_name)
			.field("components", &self.components.keys().collect::<Vec<_>>())
			.finish()
	}
}
impl ComponentDef {
	#[must_use]
	pub fn new(name: &str, template: ANode) -> Self {
		Self {
			name: name.into(),
			template: template.prepare(),
			data: vec![],
			components: HashMap::new(),
			resolver: None,
		}
	}

	#[must_use]
	pub fn data(mut self, name: &str, value: impl Into<Value>) -> Self {
		self.data.push((name.into(), value.into()));
		self
	}

	#[must_use]
	pub fn component(mut self, tag: &str, def: Rc<ComponentDef>) -> Self {
		self.components.insert(tag.into(), Registration::Component(def));
		self
	}

	#[must_use]
	pub fn async_component(mut self, tag: &str, registration: AsyncRegistration) -> Self {
		self.components.insert(tag.into(), Registration::Async(Rc::new(registration)));
		self
	}

	#[must_use]
	pub fn resolver(mut self, resolver: impl 'static + Fn(&ANode) -> Option<Registration>) -> Self {
		self.resolver = Some(Box::new(resolver));
		self
	}

	/// Finds the sub-component for `anode`, trying the dynamic resolver first.
	#[must_use]
	pub fn lookup(&self, anode: &ANode) -> Option<Registration> {
		self.resolver
			.as_ref()
			.and_then(|resolver| resolver(anode))
			.or_else(|| self.components.get(&*anode.tag_name).cloned())
	}
}

/// Identifies one pending load. Completing it after its node was disposed does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket {
	pub(crate) node: NodeId,
	pub(crate) generation: u32,
}
impl LoadTicket {
	#[must_use]
	pub fn node(&self) -> NodeId {
		self.node
	}
}

/// Starts loading a component definition.
///
/// The view tree never waits: whoever finishes the load hands the result to
/// [`Tree::complete_load`](`crate::tree::Tree::complete_load`) together with the ticket.
pub trait Loader {
	fn load(&self, ticket: LoadTicket);
}
impl<F: Fn(LoadTicket)> Loader for F {
	fn load(&self, ticket: LoadTicket) {
		self(ticket)
	}
}

pub struct AsyncRegistration {
	pub loader: Box<dyn Loader>,
	/// Rendered while loading.
	pub placeholder: Option<Rc<ComponentDef>>,
	/// Rendered if loading fails.
	pub fallback: Option<Rc<ComponentDef>>,
}
impl AsyncRegistration {
	#[must_use]
	pub fn new(loader: impl 'static + Loader) -> Self {
		Self {
			loader: Box::new(loader),
			placeholder: None,
			fallback: None,
		}
	}

	#[must_use]
	pub fn placeholder(mut self, def: Rc<ComponentDef>) -> Self {
		self.placeholder = Some(def);
		self
	}

	#[must_use]
	pub fn fallback(mut self, def: Rc<ComponentDef>) -> Self {
		self.fallback = Some(def);
		self
	}
}
