use std::rc::Rc;
use xylem::{AsyncRegistration, ANode, ComponentDef, Expr, ForDirective, LoadTicket, NodeType, Registration, Tree, VirtualSurface};

fn def() -> ComponentDef {
	ComponentDef::new("host", ANode::element("div"))
		.component("x-comp", Rc::new(ComponentDef::new("comp", ANode::element("span"))))
		.async_component("x-async", AsyncRegistration::new(|_: LoadTicket| ()))
}

fn node_type_of(def: ComponentDef, anode: ANode) -> NodeType {
	let mut tree = Tree::with_surface(VirtualSurface::new());
	let root = tree.create_root(Rc::new(def), Vec::<(&str, _)>::new()).unwrap();
	let id = tree.create_node(&anode.prepare(), root, None).unwrap();
	tree.node_type(id).unwrap()
}

#[test]
fn text_wins_over_everything() {
	let mut anode = ANode::text(Expr::path("x")).r#if(Expr::literal(true)).r#for(ForDirective::new("item", Expr::path("items")));
	anode.tag_name = "slot".into();
	assert_eq!(node_type_of(def(), anode), NodeType::Text);

	let mut anode = ANode::text(Expr::path("x"));
	anode.tag_name = "x-comp".into();
	assert_eq!(node_type_of(def(), anode), NodeType::Text);
}

#[test]
fn if_wins_over_for() {
	let anode = ANode::element("li").r#for(ForDirective::new("item", Expr::path("items"))).r#if(Expr::path("show"));
	assert_eq!(node_type_of(def(), anode), NodeType::If);
}

#[test]
fn for_wins_over_tags() {
	assert_eq!(node_type_of(def(), ANode::element("slot").r#for(ForDirective::new("item", Expr::path("items")))), NodeType::For);
	assert_eq!(node_type_of(def(), ANode::element("x-comp").r#for(ForDirective::new("item", Expr::path("items")))), NodeType::For);
}

#[test]
fn special_tags() {
	assert_eq!(node_type_of(def(), ANode::element("slot")), NodeType::Slot);
	assert_eq!(node_type_of(def(), ANode::element("template")), NodeType::Template);
}

#[test]
fn registered_components() {
	assert_eq!(node_type_of(def(), ANode::element("x-comp")), NodeType::Component);
	assert_eq!(node_type_of(def(), ANode::element("x-async")), NodeType::Async);
}

#[test]
fn unknown_tags_are_elements() {
	assert_eq!(node_type_of(def(), ANode::element("x-unknown")), NodeType::Element);
	assert_eq!(node_type_of(def(), ANode::element("div")), NodeType::Element);
}

#[test]
fn dynamic_resolver_comes_first() {
	let dynamic = Rc::new(ComponentDef::new("dynamic", ANode::element("b")));
	let def = def().resolver(move |anode| {
		if &*anode.tag_name == "x-async" {
			Some(Registration::Component(dynamic.clone()))
		} else {
			None
		}
	});
	assert_eq!(node_type_of(def, ANode::element("x-async")), NodeType::Component);
}

#[test]
fn creation_links_nothing_and_renders_nothing() {
	let mut tree = Tree::with_surface(VirtualSurface::new());
	let root = tree.create_root(Rc::new(def()), Vec::<(&str, _)>::new()).unwrap();
	let id = tree.create_node(&ANode::element("p").prepare(), root, None).unwrap();

	assert!(tree.children(root).is_empty());
	assert_eq!(tree.parent(id), Some(root));
	assert_eq!(tree.owner(id), Some(root));
	assert_eq!(tree.parent_component(id), Some(root));
	assert_eq!(tree.output(id), None);
	assert_eq!(tree.surface().stats().elements_created + tree.surface().stats().templates_cloned, 0);
}
