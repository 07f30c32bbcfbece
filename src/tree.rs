//! The live node tree.
//!
//! Nodes are stored in an arena keyed by [`NodeId`]. The `children` lists are the only owning edges;
//! `parent`, `owner` and `parent_component` are plain id lookups.

use crate::{
	anode::ANode,
	component::{AsyncRegistration, ComponentDef, LoadTicket},
	data::{Scope, Value},
	error::{Error, Reported},
	expr::{Expr, Resolver, ScopeResolver},
	life_cycle::LifeCycle,
	surface::Surface,
};
use core::{
	fmt::{self, Display, Formatter},
	mem,
	sync::atomic::{AtomicU32, Ordering},
};
use hashbrown::HashMap;
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span};

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);
impl Display for NodeId {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

fn guid() -> NodeId {
	NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
	Text,
	Element,
	Component,
	If,
	For,
	Slot,
	Template,
	Async,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
	/// Nodes nested deeper than this aren't created.
	pub depth_limit: usize,
}
impl Default for Options {
	fn default() -> Self {
		Self { depth_limit: 256 }
	}
}

pub(crate) struct ComponentState<H> {
	pub(crate) el: Option<H>,
	pub(crate) def: Rc<ComponentDef>,
	pub(crate) data: Rc<Scope>,
	/// The invoking abstract node. [`None`] for root components.
	pub(crate) source: Option<Rc<ANode>>,
	/// Slots rendering content from the invoking markup. They receive the invoker's changes.
	pub(crate) slots: Vec<NodeId>,
}

pub(crate) struct ForItem {
	pub(crate) scope: Rc<Scope>,
	pub(crate) key: Option<String>,
}

pub(crate) struct AsyncState<H> {
	pub(crate) el: Option<H>,
	pub(crate) registration: Rc<AsyncRegistration>,
	/// Issued when loading starts.
	pub(crate) ticket: Option<LoadTicket>,
	pub(crate) failed: bool,
}

pub(crate) enum Kind<H> {
	Text {
		el: Option<H>,
		content: String,
	},
	Element {
		el: Option<H>,
	},
	Component(Box<ComponentState<H>>),
	If {
		el: Option<H>,
		branch: Option<usize>,
		/// Last value of each branch condition. [`None`] until resolved, or once a change invalidates it.
		conditions: Vec<Option<bool>>,
	},
	For {
		el: Option<H>,
		items: Vec<ForItem>,
	},
	Slot {
		sel: Option<H>,
		el: Option<H>,
		content: Vec<Rc<ANode>>,
		/// Set when rendering content from the invoking markup.
		child_owner: Option<NodeId>,
		child_scope: Option<Rc<Scope>>,
	},
	Template {
		sel: Option<H>,
		el: Option<H>,
	},
	Async(Box<AsyncState<H>>),
}
impl<H> Kind<H> {
	pub(crate) fn node_type(&self) -> NodeType {
		match self {
			Kind::Text { .. } => NodeType::Text,
			Kind::Element { .. } => NodeType::Element,
			Kind::Component(_) => NodeType::Component,
			Kind::If { .. } => NodeType::If,
			Kind::For { .. } => NodeType::For,
			Kind::Slot { .. } => NodeType::Slot,
			Kind::Template { .. } => NodeType::Template,
			Kind::Async(_) => NodeType::Async,
		}
	}

	/// The single element (or text) this node renders as, if it has one.
	pub(crate) fn primary(&self) -> Option<&H> {
		match self {
			Kind::Text { el, .. } | Kind::Element { el } => el.as_ref(),
			Kind::Component(component) => component.el.as_ref(),
			_ => None,
		}
	}

	/// Takes every handle this node created itself, leaving [`None`]s behind.
	fn take_own_handles(&mut self) -> Vec<H> {
		match self {
			Kind::Text { el, .. } | Kind::Element { el } | Kind::If { el, .. } | Kind::For { el, .. } => el.take().into_iter().collect(),
			Kind::Component(component) => component.el.take().into_iter().collect(),
			Kind::Slot { sel, el, .. } | Kind::Template { sel, el } => sel.take().into_iter().chain(el.take()).collect(),
			Kind::Async(state) => state.el.take().into_iter().collect(),
		}
	}
}

pub(crate) struct Node<H> {
	pub(crate) anode: Rc<ANode>,
	pub(crate) owner: Option<NodeId>,
	pub(crate) scope: Rc<Scope>,
	pub(crate) parent: Option<NodeId>,
	pub(crate) parent_component: Option<NodeId>,
	pub(crate) life_cycle: LifeCycle,
	pub(crate) children: Vec<NodeId>,
	pub(crate) depth: usize,
	pub(crate) kind: Kind<H>,
}

type Observer = Box<dyn FnMut(NodeId, LifeCycle)>;

/// A forest of live nodes rendering into one [`Surface`].
pub struct Tree<S: Surface, R: Resolver = ScopeResolver> {
	pub(crate) surface: S,
	pub(crate) resolver: R,
	pub(crate) nodes: HashMap<NodeId, Node<S::Handle>>,
	pub(crate) options: Options,
	errors: Vec<Reported>,
	observer: Option<Observer>,
	load_generation: u32,
}

impl<S: Surface> Tree<S, ScopeResolver> {
	#[must_use]
	pub fn with_surface(surface: S) -> Self {
		Self::new(surface, ScopeResolver)
	}
}

impl<S: Surface, R: Resolver> Tree<S, R> {
	#[must_use]
	pub fn new(surface: S, resolver: R) -> Self {
		Self::with_options(surface, resolver, Options::default())
	}

	#[must_use]
	pub fn with_options(surface: S, resolver: R, options: Options) -> Self {
		Self {
			surface,
			resolver,
			nodes: HashMap::new(),
			options,
			errors: vec![],
			observer: None,
			load_generation: 0,
		}
	}

	/// Calls `observer` after each lifecycle transition of any node.
	pub fn observe(&mut self, observer: impl 'static + FnMut(NodeId, LifeCycle)) {
		self.observer = Some(Box::new(observer))
	}

	#[must_use]
	pub fn surface(&self) -> &S {
		&self.surface
	}

	pub fn surface_mut(&mut self) -> &mut S {
		&mut self.surface
	}

	#[must_use]
	pub fn resolver(&self) -> &R {
		&self.resolver
	}

	#[must_use]
	pub fn into_surface(self) -> S {
		self.surface
	}

	/// Drains the errors reported so far.
	pub fn take_errors(&mut self) -> Vec<Reported> {
		mem::take(&mut self.errors)
	}

	#[must_use]
	pub fn contains(&self, id: NodeId) -> bool {
		self.nodes.contains_key(&id)
	}

	#[must_use]
	pub fn node_count(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
		self.nodes.get(&id).map(|node| node.kind.node_type())
	}

	/// [`None`] once the node is disposed.
	#[must_use]
	pub fn phase(&self, id: NodeId) -> Option<LifeCycle> {
		self.nodes.get(&id).map(|node| node.life_cycle)
	}

	#[must_use]
	pub fn children(&self, id: NodeId) -> &[NodeId] {
		self.nodes.get(&id).map_or(&[][..], |node| node.children.as_slice())
	}

	#[must_use]
	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(&id)?.parent
	}

	#[must_use]
	pub fn owner(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(&id)?.owner
	}

	#[must_use]
	pub fn parent_component(&self, id: NodeId) -> Option<NodeId> {
		self.nodes.get(&id)?.parent_component
	}

	#[must_use]
	pub fn scope(&self, id: NodeId) -> Option<Rc<Scope>> {
		self.nodes.get(&id).map(|node| node.scope.clone())
	}

	/// The component's own data model.
	#[must_use]
	pub fn component_data(&self, id: NodeId) -> Option<Rc<Scope>> {
		match &self.nodes.get(&id)?.kind {
			Kind::Component(component) => Some(component.data.clone()),
			_ => None,
		}
	}

	#[must_use]
	pub fn component_def(&self, id: NodeId) -> Option<Rc<ComponentDef>> {
		match &self.nodes.get(&id)?.kind {
			Kind::Component(component) => Some(component.def.clone()),
			_ => None,
		}
	}

	/// The primary output handle of text, element and component nodes.
	#[must_use]
	pub fn output(&self, id: NodeId) -> Option<&S::Handle> {
		self.nodes.get(&id)?.kind.primary()
	}

	/// All top-level output handles of a node, in document order.
	#[must_use]
	pub fn outputs(&self, id: NodeId) -> Vec<S::Handle> {
		let mut handles = vec![];
		self.collect_outputs(id, &mut handles);
		handles
	}

	pub(crate) fn collect_outputs(&self, id: NodeId, handles: &mut Vec<S::Handle>) {
		let node = match self.nodes.get(&id) {
			Some(node) => node,
			None => return,
		};
		match &node.kind {
			Kind::Text { el, .. } | Kind::Element { el } => handles.extend(el.clone()),
			Kind::Component(component) => handles.extend(component.el.clone()),
			Kind::If { el, .. } | Kind::For { el, .. } => {
				for &child in &node.children {
					self.collect_outputs(child, handles)
				}
				handles.extend(el.clone())
			}
			Kind::Async(state) => {
				for &child in &node.children {
					self.collect_outputs(child, handles)
				}
				handles.extend(state.el.clone())
			}
			Kind::Slot { sel, el, .. } | Kind::Template { sel, el } => {
				handles.extend(sel.clone());
				for &child in &node.children {
					self.collect_outputs(child, handles)
				}
				handles.extend(el.clone())
			}
		}
	}

	pub(crate) fn first_output(&self, id: NodeId) -> Option<S::Handle> {
		let node = self.nodes.get(&id)?;
		match &node.kind {
			Kind::Text { el, .. } | Kind::Element { el } => el.clone(),
			Kind::Component(component) => component.el.clone(),
			Kind::If { el, .. } | Kind::For { el, .. } => node.children.iter().find_map(|&child| self.first_output(child)).or_else(|| el.clone()),
			Kind::Async(state) => node.children.iter().find_map(|&child| self.first_output(child)).or_else(|| state.el.clone()),
			Kind::Slot { sel, .. } | Kind::Template { sel, .. } => sel.clone(),
		}
	}

	/// The handle a child should be inserted before to land in front of `id`'s own closing anchor.
	pub(crate) fn closing_anchor(&self, id: NodeId) -> Option<S::Handle> {
		match &self.nodes.get(&id)?.kind {
			Kind::If { el, .. } | Kind::For { el, .. } | Kind::Slot { el, .. } | Kind::Template { el, .. } => el.clone(),
			Kind::Async(state) => state.el.clone(),
			Kind::Text { .. } | Kind::Element { .. } | Kind::Component(_) => None,
		}
	}

	/// Advances `id` to `phase`, notifying the observer. Does nothing for past phases.
	pub(crate) fn to_phase(&mut self, id: NodeId, phase: LifeCycle) -> bool {
		let advanced = match self.nodes.get_mut(&id) {
			Some(node) => node.life_cycle.to_phase(phase),
			None => false,
		};
		if advanced {
			trace!("{} -> {:?}", id, phase);
			if let Some(observer) = &mut self.observer {
				observer(id, phase)
			}
		}
		advanced
	}

	pub(crate) fn report(&mut self, component: Option<NodeId>, error: Error) {
		error!(component = ?component, "{}", error);
		self.errors.push(Reported { component, error })
	}

	pub(crate) fn owner_def(&self, owner: Option<NodeId>) -> Option<Rc<ComponentDef>> {
		self.component_def(owner?)
	}

	/// Resolves `expr`. Failures are reported against `owner` and resolve to [`Value::Null`].
	pub(crate) fn eval(&mut self, expr: &Expr, scope: &Scope, owner: Option<NodeId>) -> Value {
		let def = self.owner_def(owner);
		let result = self.resolver.resolve(expr, scope, def.as_deref());
		match result {
			Ok(value) => value,
			Err(error) => {
				self.report(owner, error.into());
				Value::Null
			}
		}
	}

	pub(crate) fn next_ticket(&mut self, node: NodeId) -> LoadTicket {
		self.load_generation = self.load_generation.wrapping_add(1);
		LoadTicket {
			node,
			generation: self.load_generation,
		}
	}

	/// Adds a node to the arena. It isn't linked into `parent`'s children yet.
	pub(crate) fn insert_node(&mut self, anode: Rc<ANode>, owner: Option<NodeId>, scope: Rc<Scope>, parent: Option<NodeId>, kind: Kind<S::Handle>) -> Result<NodeId, Error> {
		let (parent_component, depth) = match parent {
			None => (None, 0),
			Some(parent) => {
				let parent_node = self.nodes.get(&parent).ok_or(Error::UnknownNode(parent))?;
				let parent_component = match parent_node.kind {
					Kind::Component(_) => Some(parent),
					_ => parent_node.parent_component,
				};
				(parent_component, parent_node.depth + 1)
			}
		};
		if depth > self.options.depth_limit {
			return Err(Error::DepthLimit { limit: self.options.depth_limit });
		}

		let id = guid();
		self.nodes.insert(
			id,
			Node {
				anode,
				owner,
				scope,
				parent,
				parent_component,
				life_cycle: LifeCycle::Start,
				children: vec![],
				depth,
				kind,
			},
		);
		Ok(id)
	}

	/// Removes `id` from its parent's children (and loop items).
	fn unlink(&mut self, parent: NodeId, id: NodeId) {
		if let Some(parent) = self.nodes.get_mut(&parent) {
			if let Some(position) = parent.children.iter().position(|&child| child == id) {
				parent.children.remove(position);
				if let Kind::For { items, .. } = &mut parent.kind {
					if position < items.len() {
						items.remove(position);
					}
				}
			}
		}
	}

	/// Disposes `id` and everything below it, children first.
	///
	/// With `skip_detach`, output is left in place for the caller to clear in bulk.
	/// Disposing a node twice does nothing.
	#[instrument(skip(self))]
	pub fn dispose(&mut self, id: NodeId, skip_detach: bool) {
		self.dispose_node(id, skip_detach)
	}

	pub(crate) fn dispose_node(&mut self, id: NodeId, skip_detach: bool) {
		let node = match self.nodes.get_mut(&id) {
			Some(node) if node.life_cycle < LifeCycle::Detached => node,
			_ => return trace!("{} is already disposed.", id),
		};
		let span = trace_span!("Disposing", %id, node_type = ?node.kind.node_type());
		let _enter = span.enter();

		let children = mem::take(&mut node.children);
		// Children of elements vanish together with the element.
		let children_skip_detach = skip_detach || matches!(node.kind, Kind::Element { .. } | Kind::Component(_));
		for child in children {
			self.dispose_node(child, children_skip_detach)
		}

		let node = match self.nodes.get_mut(&id) {
			Some(node) => node,
			None => return,
		};
		let handles = node.kind.take_own_handles();
		let parent = node.parent;
		let owner = node.owner;
		let is_outer_slot = matches!(node.kind, Kind::Slot { child_owner: Some(_), .. });
		if !skip_detach {
			for handle in &handles {
				self.surface.remove(handle)
			}
		}
		self.to_phase(id, LifeCycle::Detached);
		self.to_phase(id, LifeCycle::Disposed);

		if is_outer_slot {
			if let Some(Kind::Component(component)) = owner.and_then(|owner| self.nodes.get_mut(&owner)).map(|node| &mut node.kind) {
				component.slots.retain(|&slot| slot != id)
			}
		}
		if let Some(parent) = parent {
			self.unlink(parent, id)
		}
		self.nodes.remove(&id);
	}
}
