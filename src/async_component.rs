//! Asynchronously loaded components.
//!
//! An async node renders its placeholder (if any) in front of an anchor until its load completes.
//! It is then replaced, at the same position in the tree, by a component node for the loaded definition.

use crate::{
	component::{ComponentDef, LoadTicket},
	error::Error,
	expr::Resolver,
	life_cycle::LifeCycle,
	surface::Surface,
	tree::{Kind, NodeId, Tree},
};
use std::rc::Rc;
use tracing::{instrument, trace, warn};

impl<S: Surface, R: Resolver> Tree<S, R> {
	pub(crate) fn attach_async(&mut self, id: NodeId, parent_el: &S::Handle, reference: Option<&S::Handle>) {
		let anchor = self.surface.create_anchor("s-async");
		let (anode, owner, scope, registration) = match self.nodes.get_mut(&id) {
			Some(node) => match &mut node.kind {
				Kind::Async(state) => {
					state.el = Some(anchor.clone());
					(node.anode.clone(), node.owner, node.scope.clone(), state.registration.clone())
				}
				_ => return,
			},
			None => return,
		};
		self.to_phase(id, LifeCycle::Created);
		self.surface.insert_before(&anchor, parent_el, reference);

		if let Some(placeholder) = registration.placeholder.clone() {
			match self.create_component(placeholder, Some(anode), owner, scope, Some(id)) {
				Ok(child) => {
					if let Some(node) = self.nodes.get_mut(&id) {
						node.children.push(child)
					}
					self.attach_node(child, parent_el, Some(&anchor))
				}
				Err(error) => {
					let component = self.reporting_component(id);
					self.report(component, error)
				}
			}
		}
		self.to_phase(id, LifeCycle::Attached);
		self.start_load(id);
	}

	/// Issues a new ticket and hands it to the loader.
	pub(crate) fn start_load(&mut self, id: NodeId) {
		let ticket = self.next_ticket(id);
		let registration = match self.nodes.get_mut(&id).map(|node| &mut node.kind) {
			Some(Kind::Async(state)) => {
				state.ticket = Some(ticket);
				state.registration.clone()
			}
			_ => return,
		};
		trace!(?ticket, "Loading.");
		registration.loader.load(ticket)
	}

	/// Whether `id` is still waiting for the load identified by `ticket`.
	#[must_use]
	pub fn is_pending(&self, ticket: LoadTicket) -> bool {
		match self.nodes.get(&ticket.node) {
			Some(node) => matches!(&node.kind, Kind::Async(state) if state.ticket == Some(ticket) && !state.failed) && node.life_cycle.is_attached(),
			None => false,
		}
	}

	/// Hands a finished load to the view tree.
	///
	/// On success, the async node is replaced by the loaded component, which renders where the placeholder was.
	/// On failure, the error is reported and the fallback (if any) renders instead.
	///
	/// Completions for disposed nodes or outdated tickets are ignored.
	#[instrument(skip(self, result), fields(node = %ticket.node))]
	pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<Rc<ComponentDef>, String>) {
		if !self.is_pending(ticket) {
			return trace!("Ignoring stale load completion.");
		}

		match result {
			Ok(def) => self.transplant(ticket.node, def),
			Err(message) => {
				let (tag, owner, fallback) = match self.nodes.get_mut(&ticket.node) {
					Some(node) => match &mut node.kind {
						Kind::Async(state) => {
							state.failed = true;
							(node.anode.tag_name.to_string(), node.owner, state.registration.fallback.clone())
						}
						_ => return,
					},
					None => return,
				};
				self.report(owner, Error::LoadFailed { tag, message });
				match fallback {
					Some(fallback) => self.transplant(ticket.node, fallback),
					None => {
						let placeholder = self.children(ticket.node).to_vec();
						for child in placeholder {
							self.dispose_node(child, false)
						}
					}
				}
			}
		}
	}

	/// Replaces async node `id` with a component node rendering `def` in the same position.
	fn transplant(&mut self, id: NodeId, def: Rc<ComponentDef>) {
		let (anode, owner, scope, parent) = match self.nodes.get(&id) {
			Some(node) => (node.anode.clone(), node.owner, node.scope.clone(), node.parent),
			None => return,
		};
		let reference = self.first_output(id);
		let parent_el = match reference.as_ref().and_then(|reference| self.surface.parent(reference)) {
			Some(parent_el) => parent_el,
			None => return warn!("{} is not in the output; Not rendering the loaded component.", id),
		};

		let component = match self.create_component(def, Some(anode), owner, scope, parent) {
			Ok(component) => component,
			Err(error) => return self.report(owner, error),
		};
		if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
			match parent.children.iter_mut().find(|child| **child == id) {
				Some(slot) => *slot = component,
				None => parent.children.push(component),
			}
		}
		// `id` is no longer linked, so disposing it leaves the parent's children alone.
		self.attach_node(component, &parent_el, reference.as_ref());
		self.dispose_node(id, false)
	}
}
