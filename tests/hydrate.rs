use std::{cell::RefCell, rc::Rc};
use xylem::{
	ssr::render_to_string,
	surface::{Surface as _, VirtualHandle},
	ANode, AsyncRegistration, ComponentDef, Error, Expr, ForDirective, LifeCycle, LoadTicket, NodeType, ScopeResolver, Tree, Value, VirtualSurface,
};

fn page(root_tag: &str) -> Rc<ComponentDef> {
	Rc::new(ComponentDef::new(
		"page",
		ANode::element(root_tag)
			.child(ANode::element("h1").prop("class", Expr::path("kind")).child(ANode::text(Expr::path("title"))))
			.child(ANode::element("ul").child(ANode::element("li").r#for(ForDirective::new("item", Expr::path("items"))).child(ANode::text(Expr::path("item")))))
			.child(ANode::element("p").r#if(Expr::path("show")).child(ANode::static_text("shown")))
			.child(ANode::element("template").child(ANode::static_text("t"))),
	))
}

fn data(title: &str, items: Vec<i32>) -> [(&'static str, Value); 4] {
	[("title", title.into()), ("kind", "big".into()), ("items", items.into()), ("show", true.into())]
}

/// Renders `page("div")` and hands back just the output.
fn rendered() -> (VirtualSurface, VirtualHandle) {
	let mut tree = Tree::with_surface(VirtualSurface::new());
	let body = tree.surface_mut().create_element("body");
	tree.mount(page("div"), data("Hello", vec![1, 2, 3]), &body, None).unwrap();
	let mut surface = tree.into_surface();
	surface.reset_stats();
	(surface, body)
}

const HTML: &str = "<div><h1 class=\"big\">Hello</h1><ul><li>1</li><li>2</li><li>3</li><!--s-for--></ul><p>shown</p><!--s-if--><!--s-tpl-->t<!--/s-tpl--></div>";

#[test]
fn adopts_existing_output() {
	let (surface, body) = rendered();
	assert_eq!(surface.inner_html(body), HTML);

	let mut tree = Tree::with_surface(surface);
	let root = tree.hydrate(page("div"), data("Hello", vec![1, 2, 3]), &body).unwrap();
	assert_eq!(tree.phase(root), Some(LifeCycle::Attached));
	assert_eq!(tree.surface().inner_html(body), HTML);

	let stats = tree.surface().stats();
	assert_eq!(stats.elements_created + stats.texts_created + stats.anchors_created + stats.templates_cloned, 0);
	assert_eq!(stats.insertions, 0);

	tree.set_data(root, "items", vec![1, 2, 3, 4]).unwrap();
	tree.set_data(root, "show", false).unwrap();
	tree.set_data(root, "title", "Bye").unwrap();
	assert_eq!(
		tree.surface().inner_html(body),
		"<div><h1 class=\"big\">Bye</h1><ul><li>1</li><li>2</li><li>3</li><li>4</li><!--s-for--></ul><!--s-if--><!--s-tpl-->t<!--/s-tpl--></div>"
	);
}

#[test]
fn corrects_differing_text() {
	let (surface, body) = rendered();
	let mut tree = Tree::with_surface(surface);
	tree.hydrate(page("div"), data("Other", vec![1, 2, 3]), &body).unwrap();
	assert!(tree.surface().inner_html(body).contains("<h1 class=\"big\">Other</h1>"));
	assert_eq!(tree.surface().stats().text_writes, 1);
}

#[test]
fn root_mismatch() {
	let (surface, body) = rendered();
	let mut tree = Tree::with_surface(surface);
	let result = tree.hydrate(page("section"), data("Hello", vec![1, 2, 3]), &body);
	assert_eq!(
		result,
		Err(Error::HydrationMismatch {
			expected: "<section>".to_string(),
			found: "<div>".to_string(),
		})
	);
	assert_eq!(tree.node_count(), 0);
	assert_eq!(tree.surface().inner_html(body), HTML);
}

#[test]
fn list_length_mismatch() {
	let (surface, body) = rendered();
	let mut tree = Tree::with_surface(surface);
	let result = tree.hydrate(page("div"), data("Hello", vec![1, 2]), &body);
	assert_eq!(
		result,
		Err(Error::HydrationMismatch {
			expected: "<!--s-for-->".to_string(),
			found: "<li>".to_string(),
		})
	);
	assert_eq!(tree.node_count(), 0);
	assert_eq!(tree.surface().inner_html(body), HTML);
}

#[test]
fn missing_content() {
	let (mut surface, body) = rendered();
	let mut tree = Tree::with_surface(VirtualSurface::new());
	let empty = tree.surface_mut().create_element("body");
	assert!(matches!(
		tree.hydrate(page("div"), data("Hello", vec![]), &empty),
		Err(Error::HydrationMismatch { .. })
	));

	let extra = surface.create_element("hr");
	let container = surface.first_child(&body).unwrap();
	surface.insert_before(&extra, &container, None);
	let mut tree = Tree::with_surface(surface);
	assert_eq!(
		tree.hydrate(page("div"), data("Hello", vec![1, 2, 3]), &body),
		Err(Error::HydrationMismatch {
			expected: "end of <div>".to_string(),
			found: "<hr>".to_string(),
		})
	);
}

fn texts() -> Rc<ComponentDef> {
	Rc::new(ComponentDef::new(
		"texts",
		ANode::element("div")
			.child(ANode::element("p").child(ANode::text(Expr::path("x"))))
			.child(ANode::element("span").child(ANode::static_text("a")).child(ANode::text(Expr::path("b")))),
	))
}

fn append(surface: &mut VirtualSurface, parent: VirtualHandle, child: VirtualHandle) -> VirtualHandle {
	surface.insert_before(&child, &parent, None);
	child
}

/// Builds what a browser makes of `texts()` markup: text nodes merged, empty ones gone, comments kept.
fn parsed(markers: bool) -> (VirtualSurface, VirtualHandle) {
	let mut surface = VirtualSurface::new();
	let body = surface.create_element("body");
	let div = surface.create_element("div");
	let div = append(&mut surface, body, div);
	let p = surface.create_element("p");
	let p = append(&mut surface, div, p);
	let span = surface.create_element("span");
	let span = append(&mut surface, div, span);
	if markers {
		let empty = surface.create_anchor("s-text");
		append(&mut surface, p, empty);
	}
	let a = surface.create_text("a");
	append(&mut surface, span, a);
	if markers {
		let separator = surface.create_anchor("s-sep");
		append(&mut surface, span, separator);
	}
	let b = surface.create_text("b");
	append(&mut surface, span, b);
	surface.reset_stats();
	(surface, body)
}

#[test]
fn server_markup_delimits_text() {
	assert_eq!(
		render_to_string(texts(), [("x", Value::Null), ("b", Value::from("b"))], ScopeResolver).unwrap(),
		"<div><p><!--s-text--></p><span>a<!--s-sep-->b</span></div>"
	);

	let (surface, body) = parsed(true);
	assert_eq!(surface.inner_html(body), "<div><p><!--s-text--></p><span>a<!--s-sep-->b</span></div>");
	let mut tree = Tree::with_surface(surface);
	let root = tree.hydrate(texts(), [("x", Value::Null), ("b", Value::from("b"))], &body).unwrap();
	assert_eq!(tree.surface().inner_html(body), "<div><p></p><span>ab</span></div>");
	assert_eq!(tree.surface().stats().elements_created, 0);

	tree.set_data(root, "x", "hi").unwrap();
	tree.set_data(root, "b", "c").unwrap();
	assert_eq!(tree.surface().inner_html(body), "<div><p>hi</p><span>ac</span></div>");
}

#[test]
fn empty_text_may_be_missing() {
	let (mut surface, body) = parsed(false);
	let span = surface.children(surface.children(body)[0])[1];
	let merged = surface.children(span)[1];
	surface.remove(&merged);
	let a = surface.children(span)[0];
	surface.set_text(&a, "ab");

	let mut tree = Tree::with_surface(surface);
	assert_eq!(
		tree.hydrate(texts(), [("x", Value::Null), ("b", Value::from("b"))], &body),
		Err(Error::HydrationMismatch {
			expected: "text".to_string(),
			found: "end of content".to_string(),
		})
	);

	let (surface, body) = parsed(false);
	let mut tree = Tree::with_surface(surface);
	let root = tree.hydrate(texts(), [("x", Value::Null), ("b", Value::from("b"))], &body).unwrap();
	tree.set_data(root, "x", "hi").unwrap();
	assert_eq!(tree.surface().inner_html(body), "<div><p>hi</p><span>ab</span></div>");
}

#[test]
fn mismatch_writes_nothing() {
	let (surface, body) = parsed(true);
	let mut tree = Tree::with_surface(surface);
	let def = Rc::new(ComponentDef::new(
		"texts",
		ANode::element("div")
			.child(ANode::element("p").child(ANode::text(Expr::path("x"))))
			.child(ANode::element("span").child(ANode::static_text("changed")).child(ANode::text(Expr::path("b"))))
			.child(ANode::element("footer")),
	));
	assert_eq!(
		tree.hydrate(def, [("x", Value::from("filled")), ("b", Value::from("b"))], &body),
		Err(Error::HydrationMismatch {
			expected: "<footer>".to_string(),
			found: "end of content".to_string(),
		})
	);
	assert_eq!(tree.node_count(), 0);
	assert_eq!(tree.surface().inner_html(body), "<div><p><!--s-text--></p><span>a<!--s-sep-->b</span></div>");
	let stats = tree.surface().stats();
	assert_eq!((stats.text_writes, stats.insertions, stats.removals), (0, 0, 0));
}

type Tickets = Rc<RefCell<Vec<LoadTicket>>>;

fn lazy_page(tickets: &Tickets, trailer: bool) -> Rc<ComponentDef> {
	let registration = AsyncRegistration::new({
		let tickets = tickets.clone();
		move |ticket: LoadTicket| tickets.borrow_mut().push(ticket)
	})
	.placeholder(Rc::new(ComponentDef::new("spinner", ANode::element("progress"))));
	let mut main = ANode::element("main").child(ANode::element("x-lazy"));
	if trailer {
		main = main.child(ANode::element("footer"));
	}
	Rc::new(ComponentDef::new("page", main).async_component("x-lazy", registration))
}

#[test]
fn async_nodes_load_once_hydrated() {
	let tickets = Tickets::default();
	let html = render_to_string(lazy_page(&tickets, false), Vec::<(&str, _)>::new(), ScopeResolver).unwrap();
	assert_eq!(html, "<main><progress></progress><!--s-async--></main>");
	tickets.borrow_mut().clear();

	let mut surface = VirtualSurface::new();
	let body = surface.create_element("body");
	let main = surface.create_element("main");
	let main = append(&mut surface, body, main);
	let progress = surface.create_element("progress");
	append(&mut surface, main, progress);
	let anchor = surface.create_anchor("s-async");
	append(&mut surface, main, anchor);

	let mut tree = Tree::with_surface(surface);
	assert!(tree.hydrate(lazy_page(&tickets, true), Vec::<(&str, _)>::new(), &body).is_err());
	assert!(tickets.borrow().is_empty());

	let root = tree.hydrate(lazy_page(&tickets, false), Vec::<(&str, _)>::new(), &body).unwrap();
	assert_eq!(tickets.borrow().len(), 1);
	let lazy = tree.children(root)[0];
	assert_eq!(tree.node_type(lazy), Some(NodeType::Async));
	let ticket = tickets.borrow()[0];
	assert!(tree.is_pending(ticket));

	tree.complete_load(ticket, Ok(Rc::new(ComponentDef::new("loaded", ANode::element("article")))));
	assert_eq!(tree.surface().inner_html(body), "<main><article></article></main>");
}

#[test]
fn components_and_slots_are_adopted() {
	let card = Rc::new(ComponentDef::new(
		"card",
		ANode::element("div").attr("class", "card").child(ANode::element("slot").child(ANode::static_text("empty"))),
	));
	let def = || {
		Rc::new(
			ComponentDef::new("page", ANode::element("section").child(ANode::element("x-card").child(ANode::text(Expr::path("msg")))))
				.component("x-card", card.clone()),
		)
	};

	let mut tree = Tree::with_surface(VirtualSurface::new());
	let body = tree.surface_mut().create_element("body");
	tree.mount(def(), [("msg", Value::from("hello"))], &body, None).unwrap();
	let mut surface = tree.into_surface();
	assert_eq!(surface.inner_html(body), "<section><div class=\"card\"><!--s-slot-->hello<!--/s-slot--></div></section>");
	surface.reset_stats();

	let mut tree = Tree::with_surface(surface);
	let root = tree.hydrate(def(), [("msg", Value::from("hello"))], &body).unwrap();
	let card = tree.children(root)[0];
	let slot = tree.children(card)[0];
	assert_eq!(tree.node_type(card), Some(NodeType::Component));
	assert_eq!(tree.node_type(slot), Some(NodeType::Slot));
	assert_eq!(tree.phase(slot), Some(LifeCycle::Attached));
	assert_eq!(tree.owner(tree.children(slot)[0]), Some(root));

	tree.set_data(root, "msg", "bye").unwrap();
	assert_eq!(tree.surface().inner_html(body), "<section><div class=\"card\"><!--s-slot-->bye<!--/s-slot--></div></section>");
	let stats = tree.surface().stats();
	assert_eq!(stats.elements_created + stats.texts_created + stats.anchors_created + stats.templates_cloned, 0);
}
