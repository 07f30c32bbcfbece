use std::{cell::RefCell, rc::Rc};
use xylem::{surface::Surface as _, ANode, Change, ComponentDef, Expr, LifeCycle, NodeId, Tree, Value, VirtualSurface};

type Log = Rc<RefCell<Vec<(NodeId, LifeCycle)>>>;

fn setup() -> (Tree<VirtualSurface>, Log) {
	let mut tree = Tree::with_surface(VirtualSurface::new());
	let log = Log::default();
	tree.observe({
		let log = log.clone();
		move |id, phase| log.borrow_mut().push((id, phase))
	});
	(tree, log)
}

fn def() -> Rc<ComponentDef> {
	Rc::new(ComponentDef::new(
		"nested",
		ANode::element("div")
			.child(ANode::element("span").child(ANode::text(Expr::path("a"))))
			.child(ANode::static_text("b")),
	))
}

#[test]
fn creation_order() {
	let (mut tree, log) = setup();
	let body = tree.surface_mut().create_element("body");
	let root = tree.mount(def(), [("a", Value::from("a"))], &body, None).unwrap();

	let span = tree.children(root)[0];
	let b = tree.children(root)[1];
	let a = tree.children(span)[0];

	assert_eq!(
		*log.borrow(),
		[
			(root, LifeCycle::Created),
			(span, LifeCycle::Created),
			(a, LifeCycle::Created),
			(a, LifeCycle::Attached),
			(span, LifeCycle::Attached),
			(b, LifeCycle::Created),
			(b, LifeCycle::Attached),
			(root, LifeCycle::Attached),
		]
	);
	assert_eq!(tree.surface().inner_html(body), "<div><span>a</span>b</div>");
}

#[test]
fn dispose_is_post_order() {
	let (mut tree, log) = setup();
	let body = tree.surface_mut().create_element("body");
	let root = tree.mount(def(), [("a", Value::from("a"))], &body, None).unwrap();

	let span = tree.children(root)[0];
	let b = tree.children(root)[1];
	let a = tree.children(span)[0];
	log.borrow_mut().clear();

	tree.dispose(root, false);
	assert_eq!(
		*log.borrow(),
		[
			(a, LifeCycle::Detached),
			(a, LifeCycle::Disposed),
			(span, LifeCycle::Detached),
			(span, LifeCycle::Disposed),
			(b, LifeCycle::Detached),
			(b, LifeCycle::Disposed),
			(root, LifeCycle::Detached),
			(root, LifeCycle::Disposed),
		]
	);
	assert_eq!(tree.surface().inner_html(body), "");
	assert_eq!(tree.node_count(), 0);
	assert_eq!(tree.phase(root), None);
	assert_eq!(tree.output(root), None);
}

#[test]
fn only_the_element_itself_is_removed() {
	let (mut tree, _) = setup();
	let body = tree.surface_mut().create_element("body");
	let root = tree.mount(def(), [("a", Value::from("a"))], &body, None).unwrap();
	tree.surface_mut().reset_stats();

	tree.dispose(root, false);
	assert_eq!(tree.surface().stats().removals, 1);
}

#[test]
fn skip_detach_leaves_output() {
	let (mut tree, _) = setup();
	let body = tree.surface_mut().create_element("body");
	let root = tree.mount(def(), [("a", Value::from("a"))], &body, None).unwrap();

	tree.dispose(root, true);
	assert_eq!(tree.node_count(), 0);
	assert_eq!(tree.surface().inner_html(body), "<div><span>a</span>b</div>");
}

#[test]
fn repeated_transitions_do_nothing() {
	let (mut tree, log) = setup();
	let body = tree.surface_mut().create_element("body");
	let root = tree.mount(def(), [("a", Value::from("a"))], &body, None).unwrap();
	log.borrow_mut().clear();
	tree.surface_mut().reset_stats();

	tree.attach(root, &body, None).unwrap();
	assert!(log.borrow().is_empty());
	assert_eq!(tree.surface().stats(), Default::default());
	assert_eq!(tree.phase(root), Some(LifeCycle::Attached));

	tree.dispose(root, false);
	let disposed = log.borrow().len();
	tree.dispose(root, false);
	assert_eq!(log.borrow().len(), disposed);
	assert!(tree.attach(root, &body, None).is_err());
}

#[test]
fn detached_nodes_ignore_updates() {
	let (mut tree, _) = setup();
	let root = tree.create_root(def(), [("a", Value::from("a"))]).unwrap();
	let orphan = tree.create_node(&ANode::text(Expr::path("a")).prepare(), root, None).unwrap();
	assert_eq!(tree.phase(orphan), Some(LifeCycle::Start));

	tree.update(orphan, &[Change::set("a", "b")]);
	assert_eq!(tree.phase(orphan), Some(LifeCycle::Start));
	assert_eq!(tree.output(orphan), None);
}

#[test]
fn attach_creates_lazily() {
	let (mut tree, log) = setup();
	let body = tree.surface_mut().create_element("body");
	let root = tree.create_root(def(), [("a", Value::from("x"))]).unwrap();
	assert_eq!(tree.phase(root), Some(LifeCycle::Start));
	assert!(log.borrow().is_empty());

	tree.attach(root, &body, None).unwrap();
	assert_eq!(tree.phase(root), Some(LifeCycle::Attached));
	assert_eq!(tree.surface().inner_html(body), "<div><span>x</span>b</div>");
}
