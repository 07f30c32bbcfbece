//! Update propagation: applies change records to attached nodes.
//!
//! A binding is only re-resolved if its expression depends on a changed path.

use crate::{
	anode::{attribute_text, is_attribute_present},
	data::{Change, DataPath, Scope, Value},
	error::Error,
	expr::{Expr, Resolver},
	surface::Surface,
	tree::{Kind, NodeId, NodeType, Tree},
};
use std::rc::Rc;
use tracing::{instrument, trace, trace_span, warn};

pub(crate) fn affected(expr: &Expr, changes: &[Change]) -> bool {
	changes.iter().any(|change| expr.depends_on(&change.path))
}

impl<S: Surface, R: Resolver> Tree<S, R> {
	/// Applies `changes` of the data `id` is bound against (its scope, not a component's own data).
	///
	/// Nodes that aren't attached ignore updates.
	#[instrument(skip(self, changes), fields(changes = changes.len()))]
	pub fn update(&mut self, id: NodeId, changes: &[Change]) {
		if !changes.is_empty() {
			self.update_node(id, changes)
		}
	}

	/// Applies `changes` of `component`'s own data model. The data must already reflect them.
	///
	/// # Errors
	///
	/// If `component` doesn't exist or isn't a component.
	#[instrument(skip(self, changes), fields(changes = changes.len()))]
	pub fn notify(&mut self, component: NodeId, changes: &[Change]) -> Result<(), Error> {
		match self.node_type(component) {
			Some(NodeType::Component) => {
				self.notify_component(component, changes);
				Ok(())
			}
			Some(_) => Err(Error::NotAComponent(component)),
			None => Err(Error::UnknownNode(component)),
		}
	}

	/// Writes `value` into `component`'s data at `path` and propagates the change.
	///
	/// # Errors
	///
	/// If `component` isn't a component or the path can't be written.
	pub fn set_data(&mut self, component: NodeId, path: impl Into<DataPath>, value: impl Into<Value>) -> Result<(), Error> {
		let path = path.into();
		let value = value.into();
		let data = self.data_of(component)?;
		if !data.set_path(&path, value.clone()) {
			return Err(Error::InvalidPath { path: path.to_string() });
		}
		self.notify_component(component, &[Change::set(path, value)]);
		Ok(())
	}

	/// Splices the list at `path` in `component`'s data and propagates the change.
	///
	/// # Errors
	///
	/// If `component` isn't a component or there is no list at `path`.
	pub fn splice_data(&mut self, component: NodeId, path: impl Into<DataPath>, index: usize, remove: usize, insert: Vec<Value>) -> Result<(), Error> {
		let path = path.into();
		let data = self.data_of(component)?;
		if data.splice_path(&path, index, remove, &insert).is_none() {
			return Err(Error::InvalidPath { path: path.to_string() });
		}
		self.notify_component(component, &[Change::splice(path, index, remove, insert)]);
		Ok(())
	}

	fn data_of(&self, component: NodeId) -> Result<Rc<Scope>, Error> {
		match self.node_type(component) {
			Some(NodeType::Component) => self.component_data(component).ok_or(Error::NotAComponent(component)),
			Some(_) => Err(Error::NotAComponent(component)),
			None => Err(Error::UnknownNode(component)),
		}
	}

	pub(crate) fn update_node(&mut self, id: NodeId, changes: &[Change]) {
		let node = match self.nodes.get(&id) {
			Some(node) => node,
			None => return trace!("Dropping update for missing node {}.", id),
		};
		if !node.life_cycle.is_attached() {
			return trace!("Dropping update for {} in phase {:?}.", id, node.life_cycle);
		}
		let node_type = node.kind.node_type();
		let span = trace_span!("Updating", %id, ?node_type);
		let _enter = span.enter();
		if cfg!(feature = "log-paths") {
			trace!(paths = ?changes.iter().map(|change| change.path.to_string()).collect::<Vec<_>>(), "Changed paths.");
		}

		match node_type {
			NodeType::Text => self.update_text(id, changes),
			NodeType::Element => {
				self.update_props(id, changes);
				self.update_children(id, changes)
			}
			NodeType::Component => self.update_component(id, changes),
			NodeType::If => self.update_if(id, changes),
			NodeType::For => self.update_for(id, changes),
			NodeType::Slot => {
				if matches!(self.nodes.get(&id).map(|node| &node.kind), Some(Kind::Slot { child_owner: Some(_), .. })) {
					trace!("Slot content is updated through its invoking component.");
				} else {
					self.update_children(id, changes)
				}
			}
			NodeType::Template | NodeType::Async => self.update_children(id, changes),
		}
	}

	pub(crate) fn update_children(&mut self, id: NodeId, changes: &[Change]) {
		let children = self.children(id).to_vec();
		for child in children {
			self.update_node(child, changes)
		}
	}

	fn update_text(&mut self, id: NodeId, changes: &[Change]) {
		let (anode, scope, owner) = match self.nodes.get(&id) {
			Some(node) => (node.anode.clone(), node.scope.clone(), node.owner),
			None => return,
		};
		let expr = match &anode.text_expr {
			Some(expr) if affected(expr, changes) => expr,
			_ => return,
		};
		let new_content = self.eval(expr, &scope, owner).to_string();
		if let Some(Kind::Text { el: Some(el), content }) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
			if *content != new_content {
				if cfg!(feature = "dangerous-logging") {
					trace!(%new_content, "Updating text.");
				}
				self.surface.set_text(el, &new_content);
				*content = new_content;
			}
		}
	}

	/// Re-applies the props (and raw bind) of an element or a component's root element.
	fn update_props(&mut self, id: NodeId, changes: &[Change]) {
		let (anode, scope, owner, el) = match self.nodes.get(&id) {
			Some(node) => match (&node.kind, node.kind.primary()) {
				(Kind::Component(component), Some(el)) => (node.anode.clone(), component.data.clone(), Some(id), el.clone()),
				(_, Some(el)) => (node.anode.clone(), node.scope.clone(), node.owner, el.clone()),
				(_, None) => return,
			},
			None => return,
		};

		if let Some(bind) = anode.directives.bind.as_ref().filter(|bind| affected(bind, changes)) {
			match self.eval(bind, &scope, owner) {
				Value::Map(map) => {
					for (name, value) in &map {
						if is_attribute_present(name, value) {
							self.surface.set_attribute(&el, name, &attribute_text(value))
						} else {
							self.surface.remove_attribute(&el, name)
						}
					}
				}
				Value::Null => (),
				_ => warn!("Ignoring non-map bind value on <{}>.", anode.tag_name),
			}
		}

		for prop in &anode.props {
			if prop.expr.is_static() || !affected(&prop.expr, changes) {
				continue;
			}
			let value = self.eval(&prop.expr, &scope, owner);
			if is_attribute_present(&prop.name, &value) {
				self.surface.set_attribute(&el, &prop.name, &attribute_text(&value))
			} else {
				self.surface.remove_attribute(&el, &prop.name)
			}
		}
	}

	/// Changes from the invoking scope: re-resolves invocation props into the component's data,
	/// feeds slot content, then propagates the resulting data changes inside.
	fn update_component(&mut self, id: NodeId, changes: &[Change]) {
		let (source, scope, owner, data, slots) = match self.nodes.get(&id) {
			Some(node) => match &node.kind {
				Kind::Component(component) => (component.source.clone(), node.scope.clone(), node.owner, component.data.clone(), component.slots.clone()),
				_ => return,
			},
			None => return,
		};

		let mut inner = vec![];
		if let Some(source) = &source {
			if let Some(bind) = source.directives.bind.as_ref().filter(|bind| affected(bind, changes)) {
				if let Value::Map(map) = self.eval(bind, &scope, owner) {
					for (name, value) in map {
						if data.set(&name, value.clone()) {
							inner.push(Change::set(DataPath::key(&name), value))
						}
					}
				}
			}
			for prop in &source.props {
				if prop.expr.is_static() || !affected(&prop.expr, changes) {
					continue;
				}
				let value = self.eval(&prop.expr, &scope, owner);
				if data.set(&prop.name, value.clone()) {
					inner.push(Change::set(DataPath::key(&prop.name), value))
				}
			}
		}

		for slot in slots {
			self.update_children(slot, changes)
		}

		if !inner.is_empty() {
			self.notify_component(id, &inner)
		}
	}

	pub(crate) fn notify_component(&mut self, id: NodeId, changes: &[Change]) {
		match self.phase(id) {
			Some(phase) if phase.is_attached() => (),
			phase => return trace!("Dropping data change of {} in phase {:?}.", id, phase),
		}
		self.update_props(id, changes);
		self.update_children(id, changes)
	}

	fn update_if(&mut self, id: NodeId, changes: &[Change]) {
		let (anode, current, anchor) = match self.nodes.get(&id) {
			Some(node) => match &node.kind {
				Kind::If { el: Some(el), branch, .. } => (node.anode.clone(), *branch, el.clone()),
				_ => return,
			},
			None => return,
		};

		let conditions_affected = anode.hotspot().if_branches.iter().any(|(condition, _)| condition.as_ref().map_or(false, |condition| affected(condition, changes)));
		let branch = if conditions_affected { self.select_branch(id, changes) } else { current };

		if branch == current {
			return self.update_children(id, changes);
		}

		trace!("Switching branch {:?} -> {:?}.", current, branch);
		let children = self.children(id).to_vec();
		for child in children {
			self.dispose_node(child, false)
		}
		match self.surface.parent(&anchor) {
			Some(parent_el) => self.open_branch(id, branch, &parent_el, &anchor),
			None => warn!("Anchor of {} is detached; Not rendering the new branch.", id),
		}
	}
}
