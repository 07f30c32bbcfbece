//! Loop nodes: one child per list item, followed by the loop's anchor.
//!
//! Each item renders the loop's item template in its own scope, a child of the loop's scope holding the
//! item (and optionally index) variable. With `track_by`, items are matched by key across updates.
//! Otherwise they are matched by value at both ends of the list and patched in place in between.

use crate::{
	anode::ForDirective,
	data::{Change, ChangeKind, DataPath, PathSegment, Scope, Value},
	error::Error,
	expr::Resolver,
	life_cycle::LifeCycle,
	surface::Surface,
	tree::{ForItem, Kind, NodeId, Tree},
};
use core::mem;
use hashbrown::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{trace, trace_span, warn};

/// Which item (and how many path segments) a change below the list addresses.
fn item_target(list_path: &DataPath, path: &DataPath) -> Option<(usize, usize)> {
	if path.len() <= list_path.len() || !path.starts_with(list_path) {
		return None;
	}
	let position = match &path.segments()[list_path.len()] {
		PathSegment::Index(i) => *i,
		PathSegment::Key(key) => key.parse().ok()?,
	};
	Some((position, list_path.len() + 1))
}

fn is_splice_of(change: &Change, list_path: &DataPath) -> bool {
	matches!(change.kind, ChangeKind::Splice { .. }) && change.path.len() == list_path.len() && change.path.starts_with(list_path)
}

enum ListChange<'a> {
	Splice { index: usize, remove: usize, insert: &'a [Value] },
	Item { position: usize, consumed: usize, change: &'a Change },
}

impl<S: Surface, R: Resolver> Tree<S, R> {
	fn for_directive(&self, id: NodeId) -> Option<(ForDirective, Rc<Scope>, Option<NodeId>)> {
		let node = self.nodes.get(&id)?;
		let directive = node.anode.directives.r#for.clone()?;
		Some((directive, node.scope.clone(), node.owner))
	}

	/// The current list. `null` renders nothing, other non-lists are reported and render nothing too.
	pub(crate) fn for_list(&mut self, id: NodeId) -> Vec<Value> {
		let (directive, scope, owner) = match self.for_directive(id) {
			Some(found) => found,
			None => return vec![],
		};
		match self.eval(&directive.list, &scope, owner) {
			Value::List(list) => list,
			Value::Null => vec![],
			other => {
				let component = self.reporting_component(id);
				self.report(component, Error::NotAList { found: format!("{:?}", other) });
				vec![]
			}
		}
	}

	fn item_key(&mut self, directive: &ForDirective, item_scope: &Scope, owner: Option<NodeId>) -> Option<String> {
		let track_by = directive.track_by.as_ref()?;
		Some(self.eval(track_by, item_scope, owner).to_string())
	}

	/// Creates (but doesn't link) the node for one item.
	fn make_item(&mut self, id: NodeId, position: usize, value: Value) -> Option<(NodeId, ForItem)> {
		let (directive, scope, owner) = self.for_directive(id)?;
		let template = self.nodes.get(&id)?.anode.hotspot().for_item.clone()?;

		let item_scope = Scope::child(&scope);
		item_scope.set(&directive.item, value);
		if let Some(index) = &directive.index {
			item_scope.set(index, Value::from(position));
		}
		let key = self.item_key(&directive, &item_scope, owner);

		match self.create_node(&template, id, Some(item_scope.clone())) {
			Ok(child) => Some((child, ForItem { scope: item_scope, key })),
			Err(error) => {
				let component = self.reporting_component(id);
				self.report(component, error);
				None
			}
		}
	}

	/// Creates the node for one item and links it at `position`.
	pub(crate) fn new_item(&mut self, id: NodeId, position: usize, value: Value) -> Option<NodeId> {
		let (child, item) = self.make_item(id, position, value)?;
		if let Some(node) = self.nodes.get_mut(&id) {
			let position = position.min(node.children.len());
			node.children.insert(position, child);
			if let Kind::For { items, .. } = &mut node.kind {
				items.insert(position.min(items.len()), item);
			}
		}
		Some(child)
	}

	/// The handle item `position` should be inserted before.
	fn item_reference(&self, id: NodeId, position: usize) -> Option<S::Handle> {
		let node = self.nodes.get(&id)?;
		node.children[position.min(node.children.len())..]
			.iter()
			.find_map(|&child| self.first_output(child))
			.or_else(|| self.closing_anchor(id))
	}

	pub(crate) fn attach_for(&mut self, id: NodeId, parent_el: &S::Handle, reference: Option<&S::Handle>) {
		let anchor = self.surface.create_anchor("s-for");
		if let Some(Kind::For { el, .. }) = self.nodes.get_mut(&id).map(|node| &mut node.kind) {
			*el = Some(anchor.clone());
		}
		self.to_phase(id, LifeCycle::Created);
		self.surface.insert_before(&anchor, parent_el, reference);

		let list = self.for_list(id);
		let mut seen = HashSet::new();
		for (i, value) in list.into_iter().enumerate() {
			if let Some(child) = self.new_item(id, i, value) {
				if let Some(key) = self.item_at(id, child).and_then(|item| item.key.clone()) {
					if !seen.insert(key.clone()) {
						warn!("Duplicate loop key {:?}.", key)
					}
				}
				self.attach_node(child, parent_el, Some(&anchor))
			}
		}
		self.to_phase(id, LifeCycle::Attached);
	}

	fn item_at(&self, id: NodeId, child: NodeId) -> Option<&ForItem> {
		let node = self.nodes.get(&id)?;
		let position = node.children.iter().position(|&c| c == child)?;
		match &node.kind {
			Kind::For { items, .. } => items.get(position),
			_ => None,
		}
	}

	pub(crate) fn update_for(&mut self, id: NodeId, changes: &[Change]) {
		let (directive, ..) = match self.for_directive(id) {
			Some(found) => found,
			None => return,
		};
		let keyed = directive.track_by.is_some();
		let list_path = directive.list.as_path();

		let mut forward = vec![];
		let mut list_changes = vec![];
		let mut structural = false;
		for change in changes {
			if !directive.list.depends_on(&change.path) {
				forward.push(change.clone());
				continue;
			}
			match list_path {
				Some(list_path) => {
					if let Some((position, consumed)) = item_target(list_path, &change.path) {
						list_changes.push(ListChange::Item { position, consumed, change })
					} else if let (false, ChangeKind::Splice { index, remove, insert }) = (keyed, &change.kind) {
						if is_splice_of(change, list_path) {
							list_changes.push(ListChange::Splice {
								index: *index,
								remove: *remove,
								insert,
							})
						} else {
							structural = true
						}
					} else {
						structural = true
					}
				}
				None => structural = true,
			}
		}

		if !structural && !list_changes.is_empty() {
			let list = self.for_list(id);
			for list_change in list_changes {
				match list_change {
					ListChange::Splice { index, remove, insert } => self.splice_items(id, index, remove, insert),
					ListChange::Item { position, consumed, change } => {
						if !self.update_item(id, &directive, &list, position, consumed, change) {
							structural = true;
							break;
						}
					}
				}
			}
		}

		if structural {
			if keyed {
				self.reconcile_keyed(id)
			} else {
				self.reconcile_unkeyed(id)
			}
		}

		if !forward.is_empty() {
			self.update_children(id, &forward)
		}
	}

	/// Pushes a change below one item into that item. Returns `false` if the list has to be reconciled instead.
	fn update_item(&mut self, id: NodeId, directive: &ForDirective, list: &[Value], position: usize, consumed: usize, change: &Change) -> bool {
		let value = match list.get(position) {
			Some(value) => value.clone(),
			None => return false,
		};
		let (child, item_scope, key) = match self.nodes.get(&id) {
			Some(node) => match (&node.kind, node.children.get(position)) {
				(Kind::For { items, .. }, Some(&child)) => match items.get(position) {
					Some(item) => (child, item.scope.clone(), item.key.clone()),
					None => return false,
				},
				_ => return false,
			},
			None => return false,
		};

		item_scope.set(&directive.item, value);
		let owner = self.owner(id);
		if key.is_some() && self.item_key(directive, &item_scope, owner) != key {
			trace!("Key of item {} changed.", position);
			return false;
		}

		let rebased = Change {
			path: change.path.rebase(consumed, &DataPath::key(&directive.item)),
			kind: change.kind.clone(),
		};
		self.update_node(child, &[rebased]);
		true
	}

	fn splice_items(&mut self, id: NodeId, index: usize, remove: usize, insert: &[Value]) {
		let span = trace_span!("Splicing", index, remove, insert = insert.len());
		let _enter = span.enter();

		let doomed: Vec<NodeId> = match self.nodes.get(&id) {
			Some(node) => {
				let start = index.min(node.children.len());
				let end = (start + remove).min(node.children.len());
				node.children[start..end].to_vec()
			}
			None => return,
		};
		let index = index.min(self.children(id).len());
		for child in doomed {
			self.dispose_node(child, false)
		}

		let parent_el = match self.closing_anchor(id).and_then(|anchor| self.surface.parent(&anchor)) {
			Some(parent_el) => parent_el,
			None => return warn!("Loop anchor is detached; Not rendering inserted items."),
		};
		for (i, value) in insert.iter().enumerate() {
			if let Some(child) = self.new_item(id, index + i, value.clone()) {
				let reference = self.item_reference(id, index + i + 1);
				self.attach_node(child, &parent_el, reference.as_ref())
			}
		}

		if remove != insert.len() {
			self.renumber(id, index + insert.len())
		}
	}

	/// Updates the index variable of every item from `from` on.
	fn renumber(&mut self, id: NodeId, from: usize) {
		let index_name = match self.for_directive(id).and_then(|(directive, ..)| directive.index) {
			Some(index_name) => index_name,
			None => return,
		};
		let targets: Vec<(NodeId, Rc<Scope>)> = match self.nodes.get(&id) {
			Some(node) => match &node.kind {
				Kind::For { items, .. } => node.children.iter().copied().zip(items.iter().map(|item| item.scope.clone())).skip(from).collect(),
				_ => return,
			},
			None => return,
		};
		for (position, (child, scope)) in targets.into_iter().enumerate() {
			let position = from + position;
			if scope.set(&index_name, Value::from(position)) {
				self.update_node(child, &[Change::set(DataPath::key(&index_name), position)])
			}
		}
	}

	/// Replaces the item variable of the item at `position`, updating its node if the value changed.
	fn patch_item(&mut self, id: NodeId, item_name: &str, position: usize, value: Value) {
		let (child, scope) = match self.nodes.get(&id) {
			Some(node) => match (&node.kind, node.children.get(position)) {
				(Kind::For { items, .. }, Some(&child)) => match items.get(position) {
					Some(item) => (child, item.scope.clone()),
					None => return,
				},
				_ => return,
			},
			None => return,
		};
		if scope.set(item_name, value.clone()) {
			self.update_node(child, &[Change::set(DataPath::key(item_name), value)])
		}
	}

	/// Matches equal values at both ends, patches the rest in place and creates or disposes the difference.
	fn reconcile_unkeyed(&mut self, id: NodeId) {
		let span = trace_span!("Reconciling unkeyed loop", %id);
		let _enter = span.enter();

		let (directive, ..) = match self.for_directive(id) {
			Some(found) => found,
			None => return,
		};
		let new = self.for_list(id);
		let old: Vec<Value> = match self.nodes.get(&id).map(|node| &node.kind) {
			Some(Kind::For { items, .. }) => items.iter().map(|item| item.scope.get(&directive.item).unwrap_or_default()).collect(),
			_ => return,
		};

		let mut head = 0;
		while head < old.len() && head < new.len() && old[head] == new[head] {
			head += 1;
		}
		let mut tail = 0;
		while tail < old.len() - head && tail < new.len() - head && old[old.len() - 1 - tail] == new[new.len() - 1 - tail] {
			tail += 1;
		}
		let old_middle = old.len() - head - tail;
		let new_middle = new.len() - head - tail;
		let common = old_middle.min(new_middle);
		trace!(head, tail, old_middle, new_middle, "Matched list ends.");

		for position in head..head + common {
			self.patch_item(id, &directive.item, position, new[position].clone())
		}

		if old_middle > common {
			let doomed = self.children(id).get(head + common..head + old_middle).map(<[NodeId]>::to_vec).unwrap_or_default();
			for child in doomed {
				self.dispose_node(child, false)
			}
		}

		if new_middle > common {
			let parent_el = match self.closing_anchor(id).and_then(|anchor| self.surface.parent(&anchor)) {
				Some(parent_el) => parent_el,
				None => return warn!("Loop anchor is detached; Not rendering new items."),
			};
			for position in head + common..head + new_middle {
				if let Some(child) = self.new_item(id, position, new[position].clone()) {
					let reference = self.item_reference(id, position + 1);
					self.attach_node(child, &parent_el, reference.as_ref())
				}
			}
		}

		if old.len() != new.len() {
			self.renumber(id, head + common)
		}
	}

	/// Reuses item nodes by key, moving their output where necessary.
	fn reconcile_keyed(&mut self, id: NodeId) {
		let span = trace_span!("Reconciling keyed loop", %id);
		let _enter = span.enter();

		let (directive, scope, owner) = match self.for_directive(id) {
			Some(found) => found,
			None => return,
		};
		let anchor = match self.closing_anchor(id) {
			Some(anchor) => anchor,
			None => return,
		};
		let parent_el = match self.surface.parent(&anchor) {
			Some(parent_el) => parent_el,
			None => return warn!("Loop anchor is detached; Not reconciling."),
		};
		let new = self.for_list(id);

		let (old_children, old_items) = match self.nodes.get_mut(&id) {
			Some(node) => match &mut node.kind {
				Kind::For { items, .. } => (mem::take(&mut node.children), mem::take(items)),
				_ => return,
			},
			None => return,
		};

		let mut by_key: HashMap<String, usize> = HashMap::new();
		for (i, item) in old_items.iter().enumerate() {
			if let Some(key) = &item.key {
				by_key.entry(key.clone()).or_insert(i);
			}
		}

		let mut old_slots: Vec<Option<(NodeId, ForItem)>> = old_children.into_iter().zip(old_items).map(Some).collect();
		let mut children = Vec::with_capacity(new.len());
		let mut items = Vec::with_capacity(new.len());
		let mut fresh = HashSet::new();
		let mut patches = vec![];
		let mut seen = HashSet::new();
		for (position, value) in new.iter().enumerate() {
			let probe = Scope::child(&scope);
			probe.set(&directive.item, value.clone());
			if let Some(index) = &directive.index {
				probe.set(index, Value::from(position));
			}
			let key = self.item_key(&directive, &probe, owner).unwrap_or_default();
			if !seen.insert(key.clone()) {
				warn!("Duplicate loop key {:?}.", key)
			}

			let reused = by_key.remove(&key).and_then(|old| old_slots[old].take());
			match reused {
				Some((child, item)) => {
					patches.push((child, item.scope.clone(), position, value.clone()));
					children.push(child);
					items.push(item);
				}
				None => {
					if let Some((child, item)) = self.make_item(id, position, value.clone()) {
						fresh.insert(child);
						children.push(child);
						items.push(item);
					}
				}
			}
		}

		if let Some(node) = self.nodes.get_mut(&id) {
			node.children = children.clone();
			if let Kind::For { items: slot, .. } = &mut node.kind {
				*slot = items;
			}
		}
		for (child, _) in old_slots.into_iter().flatten() {
			self.dispose_node(child, false)
		}

		let mut reference = anchor;
		for &child in children.iter().rev() {
			if fresh.contains(&child) {
				self.attach_node(child, &parent_el, Some(&reference));
			} else {
				let outputs = self.outputs(child);
				let in_place = outputs.last().map_or(true, |last| self.surface.next_sibling(last).as_ref() == Some(&reference));
				if !in_place {
					trace!("Moving {}.", child);
					for output in &outputs {
						self.surface.insert_before(output, &parent_el, Some(&reference))
					}
				}
			}
			if let Some(first) = self.first_output(child) {
				reference = first;
			}
		}

		for (child, item_scope, position, value) in patches {
			let mut item_changes = vec![];
			if item_scope.set(&directive.item, value.clone()) {
				item_changes.push(Change::set(DataPath::key(&directive.item), value));
			}
			if let Some(index) = &directive.index {
				if item_scope.set(index, Value::from(position)) {
					item_changes.push(Change::set(DataPath::key(index), position));
				}
			}
			if !item_changes.is_empty() {
				self.update_node(child, &item_changes)
			}
		}
	}
}
