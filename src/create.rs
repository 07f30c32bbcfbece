//! The node factory and the creation/attach protocol.

use crate::{
	anode::{attribute_text, is_attribute_present, ANode, SLOT_TAG, TEMPLATE_TAG},
	component::{ComponentDef, Registration},
	data::{Change, Scope, Value},
	error::Error,
	expr::Resolver,
	life_cycle::LifeCycle,
	surface::Surface,
	tree::{AsyncState, ComponentState, Kind, NodeId, NodeType, Tree},
	update::affected,
};
use std::rc::Rc;
use tracing::{error, instrument, trace, trace_span, warn};

impl<S: Surface, R: Resolver> Tree<S, R> {
	/// Creates the node `anode` describes, as a child of `parent`. It still has to be linked and attached.
	///
	/// The first matching rule decides the node type: text expression, `if`, `for`, slot tag,
	/// template tag, a registered sub-component and finally a plain element. Unknown tags are not an error.
	///
	/// # Errors
	///
	/// If `parent` doesn't exist or the depth limit is exceeded.
	#[instrument(skip(self, anode, scope), fields(tag = %anode.tag_name))]
	pub fn create_node(&mut self, anode: &Rc<ANode>, parent: NodeId, scope: Option<Rc<Scope>>) -> Result<NodeId, Error> {
		let parent_node = self.nodes.get(&parent).ok_or(Error::UnknownNode(parent))?;
		let (owner, default_scope) = match &parent_node.kind {
			Kind::Component(component) => (Some(parent), component.data.clone()),
			Kind::Slot {
				child_owner: Some(child_owner),
				child_scope: Some(child_scope),
				..
			} => (Some(*child_owner), child_scope.clone()),
			_ => (parent_node.owner, parent_node.scope.clone()),
		};
		let scope = scope.unwrap_or(default_scope);
		let parent = Some(parent);

		if anode.text_expr.is_some() {
			return self.insert_node(anode.clone(), owner, scope, parent, Kind::Text { el: None, content: String::new() });
		}

		if anode.directives.r#if.is_some() {
			return self.insert_node(
				anode.clone(),
				owner,
				scope,
				parent,
				Kind::If {
					el: None,
					branch: None,
					conditions: vec![],
				},
			);
		}

		if anode.directives.r#for.is_some() {
			return self.insert_node(anode.clone(), owner, scope, parent, Kind::For { el: None, items: vec![] });
		}

		match &*anode.tag_name {
			SLOT_TAG => return self.create_slot(anode, owner, scope, parent),
			TEMPLATE_TAG => return self.insert_node(anode.clone(), owner, scope, parent, Kind::Template { sel: None, el: None }),
			_ => (),
		}

		match self.owner_def(owner).and_then(|def| def.lookup(anode)) {
			Some(Registration::Component(def)) => match self.create_component(def, Some(anode.clone()), owner, scope.clone(), parent) {
				Err(error @ Error::InvalidTemplate { .. }) => self.report(owner, error),
				other => return other,
			},
			Some(Registration::Async(registration)) => {
				return self.insert_node(
					anode.clone(),
					owner,
					scope,
					parent,
					Kind::Async(Box::new(AsyncState {
						el: None,
						registration,
						ticket: None,
						failed: false,
					})),
				)
			}
			None => (),
		}

		self.insert_node(anode.clone(), owner, scope, parent, Kind::Element { el: None })
	}

	/// Creates a component node rendering `def`. Invocation props are resolved against `scope` right away.
	pub(crate) fn create_component(&mut self, def: Rc<ComponentDef>, source: Option<Rc<ANode>>, owner: Option<NodeId>, scope: Rc<Scope>, parent: Option<NodeId>) -> Result<NodeId, Error> {
		let template = def.template.clone();
		if template.text_expr.is_some() || template.directives.r#if.is_some() || template.directives.r#for.is_some() || matches!(&*template.tag_name, "" | SLOT_TAG | TEMPLATE_TAG) {
			return Err(Error::InvalidTemplate { name: def.name.to_string() });
		}

		let data = Scope::root(def.data.iter().cloned());
		if let Some(source) = &source {
			if let Some(bind) = &source.directives.bind {
				match self.eval(bind, &scope, owner) {
					Value::Map(map) => {
						for (name, value) in map {
							data.set(&name, value);
						}
					}
					Value::Null => (),
					_ => warn!("Ignoring non-map bind value on <{}>.", source.tag_name),
				}
			}
			for prop in &source.props {
				let value = self.eval(&prop.expr, &scope, owner);
				data.set(&prop.name, value);
			}
		}

		self.insert_node(
			template,
			owner,
			scope,
			parent,
			Kind::Component(Box::new(ComponentState {
				el: None,
				def,
				data,
				source,
				slots: vec![],
			})),
		)
	}

	fn create_slot(&mut self, anode: &Rc<ANode>, owner: Option<NodeId>, scope: Rc<Scope>, parent: Option<NodeId>) -> Result<NodeId, Error> {
		let name = slot_name(anode, "name");
		let (source, invoker, invoking_scope) = match owner.and_then(|owner| self.nodes.get(&owner)) {
			Some(owner_node) => match &owner_node.kind {
				Kind::Component(component) => (component.source.clone(), owner_node.owner, Some(owner_node.scope.clone())),
				_ => (None, None, None),
			},
			None => (None, None, None),
		};

		let content: Vec<Rc<ANode>> = source
			.iter()
			.flat_map(|source| source.children.iter())
			.filter(|child| slot_name(child, "slot") == name)
			.cloned()
			.collect();

		let kind = match (content.is_empty(), invoker, invoking_scope) {
			(false, Some(invoker), Some(invoking_scope)) => Kind::Slot {
				sel: None,
				el: None,
				content,
				child_owner: Some(invoker),
				child_scope: Some(invoking_scope),
			},
			_ => Kind::Slot {
				sel: None,
				el: None,
				content: anode.children.clone(),
				child_owner: None,
				child_scope: None,
			},
		};
		let outer = matches!(kind, Kind::Slot { child_owner: Some(_), .. });

		let id = self.insert_node(anode.clone(), owner, scope, parent, kind)?;
		if outer {
			if let Some(Kind::Component(component)) = owner.and_then(|owner| self.nodes.get_mut(&owner)).map(|node| &mut node.kind) {
				component.slots.push(id)
			}
		}
		Ok(id)
	}

	/// Creates and attaches a root component.
	///
	/// # Errors
	///
	/// If the component's template root isn't an element.
	#[instrument(skip(self, def, data, parent_el, reference), fields(component = %def.name))]
	pub fn mount<K: AsRef<str>>(&mut self, def: Rc<ComponentDef>, data: impl IntoIterator<Item = (K, Value)>, parent_el: &S::Handle, reference: Option<&S::Handle>) -> Result<NodeId, Error> {
		let id = self.create_root(def, data)?;
		self.attach_node(id, parent_el, reference);
		Ok(id)
	}

	/// Creates a root component without attaching it. `data` overrides the definition's initial data.
	///
	/// # Errors
	///
	/// If the component's template root isn't an element.
	pub fn create_root<K: AsRef<str>>(&mut self, def: Rc<ComponentDef>, data: impl IntoIterator<Item = (K, Value)>) -> Result<NodeId, Error> {
		let id = self.create_component(def, None, None, Rc::default(), None)?;
		if let Some(scope) = self.component_data(id) {
			for (name, value) in data {
				scope.set(name.as_ref(), value);
			}
		}
		Ok(id)
	}

	/// Inserts `id`'s output into `parent_el`, before `reference` or at the end. Creates it first if necessary.
	///
	/// Attaching an attached node does nothing.
	///
	/// # Errors
	///
	/// If `id` doesn't exist.
	#[instrument(skip(self, parent_el, reference))]
	pub fn attach(&mut self, id: NodeId, parent_el: &S::Handle, reference: Option<&S::Handle>) -> Result<(), Error> {
		if !self.contains(id) {
			return Err(Error::UnknownNode(id));
		}
		self.attach_node(id, parent_el, reference);
		Ok(())
	}

	pub(crate) fn attach_node(&mut self, id: NodeId, parent_el: &S::Handle, reference: Option<&S::Handle>) {
		let node_type = match self.nodes.get(&id) {
			Some(node) if node.life_cycle < LifeCycle::Attached => node.kind.node_type(),
			Some(_) => return trace!("{} is already attached.", id),
			None => return,
		};
		let span = trace_span!("Attaching", %id, ?node_type);
		let _enter = span.enter();

		match node_type {
			NodeType::Text => self.attach_text(id, parent_el, reference),
			NodeType::Element | NodeType::Component => self.attach_element(id, parent_el, reference),
			NodeType::If => self.attach_if(id, parent_el, reference),
			NodeType::For => self.attach_for(id, parent_el, reference),
			NodeType::Slot | NodeType::Template => self.attach_fragment(id, parent_el, reference),
			NodeType::Async => self.attach_async(id, parent_el, reference),
		}
	}

	/// The component failures below `id` are attributed to.
	pub(crate) fn reporting_component(&self, id: NodeId) -> Option<NodeId> {
		let node = self.nodes.get(&id)?;
		match node.kind {
			Kind::Component(_) => Some(id),
			_ => node.owner,
		}
	}

	/// Creates a node for `anode` below `parent` and links it at `position` (or last).
	/// Failures are reported, not returned.
	pub(crate) fn create_child(&mut self, parent: NodeId, anode: &Rc<ANode>, scope: Option<Rc<Scope>>, position: Option<usize>) -> Option<NodeId> {
		match self.create_node(anode, parent, scope) {
			Ok(child) => {
				if let Some(parent) = self.nodes.get_mut(&parent) {
					let position = position.unwrap_or(parent.children.len()).min(parent.children.len());
					parent.children.insert(position, child);
				}
				Some(child)
			}
			Err(error) => {
				let component = self.reporting_component(parent);
				self.report(component, error);
				None
			}
		}
	}

	fn attach_text(&mut self, id: NodeId, parent_el: &S::Handle, reference: Option<&S::Handle>) {
		let (anode, scope, owner, created) = match self.nodes.get(&id) {
			Some(node) => (node.anode.clone(), node.scope.clone(), node.owner, node.life_cycle.is_created()),
			None => return,
		};
		if !created {
			let content = match &anode.text_expr {
				Some(expr) => self.eval(expr, &scope, owner).to_string(),
				None => String::new(),
			};
			if cfg!(feature = "dangerous-logging") {
				trace!(%content, "Creating text.");
			}
			let text = self.surface.create_text(&content);
			if let Some(node) = self.nodes.get_mut(&id) {
				node.kind = Kind::Text { el: Some(text), content };
			}
			self.to_phase(id, LifeCycle::Created);
		}

		if let Some(text) = self.output(id).cloned() {
			self.surface.insert_before(&text, parent_el, reference);
		}
		self.to_phase(id, LifeCycle::Attached);
	}

	/// Builds the primary element of an element or component node, exactly once.
	///
	/// Clones the hotspot's source element when there is one, in which case only the dynamic props remain to be applied.
	pub(crate) fn element_own_create(&mut self, id: NodeId) {
		let node = match self.nodes.get(&id) {
			Some(node) if node.life_cycle == LifeCycle::Start => node,
			_ => return,
		};
		let anode = node.anode.clone();
		let (scope, owner) = match &node.kind {
			Kind::Component(component) => (component.data.clone(), Some(id)),
			_ => (node.scope.clone(), node.owner),
		};

		let hotspot = anode.hotspot();
		let (el, props) = match &hotspot.source_node {
			Some(source) => (self.surface.clone_template(source), hotspot.dynamic_props.clone()),
			None => (self.surface.create_element(&anode.tag_name), (0..anode.props.len()).collect()),
		};

		if let Some(bind) = &anode.directives.bind {
			match self.eval(bind, &scope, owner) {
				Value::Map(map) => {
					for (name, value) in &map {
						if is_attribute_present(name, value) {
							self.surface.set_attribute(&el, name, &attribute_text(value))
						}
					}
				}
				Value::Null => (),
				_ => warn!("Ignoring non-map bind value on <{}>.", anode.tag_name),
			}
		}

		for i in props {
			let prop = &anode.props[i];
			let value = self.eval(&prop.expr, &scope, owner);
			if is_attribute_present(&prop.name, &value) {
				self.surface.set_attribute(&el, &prop.name, &attribute_text(&value))
			}
		}

		match self.nodes.get_mut(&id).map(|node| &mut node.kind) {
			Some(Kind::Element { el: slot }) => *slot = Some(el),
			Some(Kind::Component(component)) => component.el = Some(el),
			_ => return error!("{} is not an element.", id),
		}
		self.to_phase(id, LifeCycle::Created);
	}

	fn attach_element(&mut self, id: NodeId, parent_el: &S::Handle, reference: Option<&S::Handle>) {
		self.element_own_create(id);
		let el = match self.output(id).cloned() {
			Some(el) => el,
			None => return error!("{} has no element to attach.", id),
		};
		self.surface.insert_before(&el, parent_el, reference);

		let (anode, has_children) = match self.nodes.get(&id) {
			Some(node) => (node.anode.clone(), !node.children.is_empty()),
			None => return,
		};
		if !has_children {
			for child in &anode.children {
				if let Some(child) = self.create_child(id, child, None, None) {
					self.attach_node(child, &el, None)
				}
			}
		}
		self.to_phase(id, LifeCycle::Attached);
	}

	/// Picks the first branch whose condition holds. A branch without condition always does.
	///
	/// Conditions affected by `changes` are resolved again, the others keep their last value.
	/// Conditions behind the selected branch aren't resolved at all.
	pub(crate) fn select_branch(&mut self, id: NodeId, changes: &[Change]) -> Option<usize> {
		let (anode, scope, owner, mut known) = match self.nodes.get(&id) {
			Some(node) => match &node.kind {
				Kind::If { conditions, .. } => (node.anode.clone(), node.scope.clone(), node.owner, conditions.clone()),
				_ => return None,
			},
			None => return None,
		};
		let branches = &anode.hotspot().if_branches;
		known.resize(branches.len(), None);
		for (value, (condition, _)) in known.iter_mut().zip(branches) {
			if condition.as_ref().map_or(false, |condition| affected(condition, changes)) {
				*value = None
			}
		}

		let mut selected = None;
		for (i, (condition, _)) in branches.iter().enumerate() {
			let holds = match (condition, known[i]) {
				(None, _) => true,
				(Some(_), Some(holds)) => holds,
				(Some(condition), None) => {
					let holds = self.eval(condition, &scope, owner).is_truthy();
					known[i] = Some(holds);
					holds
				}
			};
			if holds {
				selected = Some(i);
				break;
			}
		}

		if let Some(Kind::If { conditions, .. }) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
			*conditions = known;
		}
		selected
	}

	/// Creates and attaches the content of `branch` in front of the if-anchor.
	pub(crate) fn open_branch(&mut self, id: NodeId, branch: Option<usize>, parent_el: &S::Handle, anchor: &S::Handle) {
		let content = match (self.nodes.get_mut(&id), branch) {
			(Some(node), branch) => {
				if let Kind::If { branch: current, .. } = &mut node.kind {
					*current = branch;
				}
				branch.and_then(|branch| node.anode.hotspot().if_branches.get(branch).map(|(_, content)| content.clone()))
			}
			(None, _) => return,
		};
		if let Some(content) = content {
			if let Some(child) = self.create_child(id, &content, None, None) {
				self.attach_node(child, parent_el, Some(anchor))
			}
		}
	}

	fn attach_if(&mut self, id: NodeId, parent_el: &S::Handle, reference: Option<&S::Handle>) {
		let anchor = self.surface.create_anchor("s-if");
		if let Some(Kind::If { el, .. }) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
			*el = Some(anchor.clone());
		}
		self.to_phase(id, LifeCycle::Created);
		self.surface.insert_before(&anchor, parent_el, reference);

		let branch = self.select_branch(id, &[]);
		self.open_branch(id, branch, parent_el, &anchor);
		self.to_phase(id, LifeCycle::Attached);
	}

	/// Slots and templates: two anchors with the children between them.
	fn attach_fragment(&mut self, id: NodeId, parent_el: &S::Handle, reference: Option<&S::Handle>) {
		let (content, is_slot) = match self.nodes.get(&id) {
			Some(node) => match &node.kind {
				Kind::Slot { content, .. } => (content.clone(), true),
				_ => (node.anode.children.clone(), false),
			},
			None => return,
		};
		let (start, end) = if is_slot { ("s-slot", "/s-slot") } else { ("s-tpl", "/s-tpl") };
		let sel = self.surface.create_anchor(start);
		let el = self.surface.create_anchor(end);
		if let Some(Kind::Slot { sel: s, el: e, .. }) | Some(Kind::Template { sel: s, el: e }) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
			*s = Some(sel.clone());
			*e = Some(el.clone());
		}
		self.to_phase(id, LifeCycle::Created);
		self.surface.insert_before(&sel, parent_el, reference);
		self.surface.insert_before(&el, parent_el, reference);

		for child in &content {
			if let Some(child) = self.create_child(id, child, None, None) {
				self.attach_node(child, parent_el, Some(&el))
			}
		}
		self.to_phase(id, LifeCycle::Attached);
	}
}

/// Slot name given by a literal prop, `""` for the default slot.
fn slot_name(anode: &ANode, prop: &str) -> String {
	anode.static_prop(prop).map(ToString::to_string).unwrap_or_default()
}
