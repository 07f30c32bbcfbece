use std::{cell::RefCell, rc::Rc};
use xylem::{
	surface::{Surface as _, VirtualHandle},
	ANode, AsyncRegistration, ComponentDef, Error, Expr, LoadTicket, NodeId, NodeType, Tree, Value, VirtualSurface,
};

type Tickets = Rc<RefCell<Vec<LoadTicket>>>;

fn setup(configure: impl FnOnce(AsyncRegistration) -> AsyncRegistration) -> (Tree<VirtualSurface>, VirtualHandle, NodeId, Tickets) {
	let tickets = Tickets::default();
	let registration = configure(AsyncRegistration::new({
		let tickets = tickets.clone();
		move |ticket: LoadTicket| tickets.borrow_mut().push(ticket)
	}));
	let def = Rc::new(
		ComponentDef::new(
			"page",
			ANode::element("div").child(ANode::element("x-lazy").prop("label", Expr::path("label"))),
		)
		.async_component("x-lazy", registration),
	);

	let mut tree = Tree::with_surface(VirtualSurface::new());
	let body = tree.surface_mut().create_element("body");
	let root = tree.mount(def, [("label", Value::from("hi"))], &body, None).unwrap();
	(tree, body, root, tickets)
}

fn loaded() -> Rc<ComponentDef> {
	Rc::new(ComponentDef::new("loaded", ANode::element("b").child(ANode::text(Expr::path("label")))))
}

fn loading() -> Rc<ComponentDef> {
	Rc::new(ComponentDef::new("loading", ANode::element("i").child(ANode::static_text("..."))))
}

#[test]
fn pending_renders_placeholder() {
	let (tree, body, root, tickets) = setup(|registration| registration.placeholder(loading()));
	assert_eq!(tree.surface().inner_html(body), "<div><i>...</i><!--s-async--></div>");
	assert_eq!(tickets.borrow().len(), 1);

	let lazy = tree.children(root)[0];
	assert_eq!(tree.node_type(lazy), Some(NodeType::Async));
	assert_eq!(tickets.borrow()[0].node(), lazy);
	assert!(tree.is_pending(tickets.borrow()[0]));
}

#[test]
fn resolved_load_takes_the_placeholders_place() {
	let (mut tree, body, root, tickets) = setup(|registration| registration.placeholder(loading()));
	let lazy = tree.children(root)[0];
	let ticket = tickets.borrow()[0];

	tree.complete_load(ticket, Ok(loaded()));
	assert_eq!(tree.surface().inner_html(body), "<div><b>hi</b></div>");
	assert!(!tree.contains(lazy));

	let component = tree.children(root)[0];
	assert_eq!(tree.node_type(component), Some(NodeType::Component));
	assert_eq!(tree.parent(component), Some(root));
	assert_eq!(tree.children(root).len(), 1);

	tree.set_data(root, "label", "ho").unwrap();
	assert_eq!(tree.surface().inner_html(body), "<div><b>ho</b></div>");

	// Completing twice does nothing.
	tree.complete_load(ticket, Ok(loading()));
	assert_eq!(tree.surface().inner_html(body), "<div><b>ho</b></div>");
}

#[test]
fn failed_load_is_reported() {
	let (mut tree, body, root, tickets) = setup(|registration| registration.placeholder(loading()));
	let ticket = tickets.borrow()[0];

	tree.complete_load(ticket, Err("offline".to_string()));
	assert_eq!(tree.surface().inner_html(body), "<div><!--s-async--></div>");
	let errors = tree.take_errors();
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].component, Some(root));
	assert_eq!(
		errors[0].error,
		Error::LoadFailed {
			tag: "x-lazy".to_string(),
			message: "offline".to_string(),
		}
	);
	assert!(!tree.is_pending(ticket));
}

#[test]
fn failed_load_renders_fallback() {
	let fallback = Rc::new(ComponentDef::new("fallback", ANode::element("em").child(ANode::static_text("failed"))));
	let (mut tree, body, _, tickets) = setup(|registration| registration.fallback(fallback));
	assert_eq!(tree.surface().inner_html(body), "<div><!--s-async--></div>");

	let ticket = tickets.borrow()[0];
	tree.complete_load(ticket, Err("offline".to_string()));
	assert_eq!(tree.surface().inner_html(body), "<div><em>failed</em></div>");
	assert_eq!(tree.take_errors().len(), 1);
}

#[test]
fn disposal_cancels() {
	let (mut tree, body, root, tickets) = setup(|registration| registration);
	let ticket = tickets.borrow()[0];

	tree.dispose(root, false);
	assert!(!tree.is_pending(ticket));
	tree.complete_load(ticket, Ok(loaded()));
	assert_eq!(tree.node_count(), 0);
	assert_eq!(tree.surface().inner_html(body), "");
	assert!(tree.take_errors().is_empty());
}

#[test]
fn loaded_component_keeps_its_position_between_siblings() {
	let tickets = Tickets::default();
	let registration = AsyncRegistration::new({
		let tickets = tickets.clone();
		move |ticket: LoadTicket| tickets.borrow_mut().push(ticket)
	})
	.placeholder(loading());
	let def = Rc::new(
		ComponentDef::new(
			"page",
			ANode::element("div")
				.child(ANode::element("span").child(ANode::static_text("a")))
				.child(ANode::element("x-lazy").prop("label", Expr::path("label")))
				.child(ANode::element("span").child(ANode::static_text("z"))),
		)
		.async_component("x-lazy", registration),
	);
	let mut tree = Tree::with_surface(VirtualSurface::new());
	let body = tree.surface_mut().create_element("body");
	let root = tree.mount(def, [("label", Value::from("hi"))], &body, None).unwrap();
	assert_eq!(tree.surface().inner_html(body), "<div><span>a</span><i>...</i><!--s-async--><span>z</span></div>");
	let before = tree.children(root).to_vec();

	let ticket = tickets.borrow()[0];
	tree.complete_load(ticket, Ok(loaded()));
	assert_eq!(tree.surface().inner_html(body), "<div><span>a</span><b>hi</b><span>z</span></div>");

	let after = tree.children(root);
	assert_eq!(after.len(), 3);
	assert_eq!((after[0], after[2]), (before[0], before[2]));
	assert_eq!(tree.node_type(after[1]), Some(NodeType::Component));
}
