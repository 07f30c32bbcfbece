#![cfg(target_arch = "wasm32")]

use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, HtmlBodyElement, HtmlElement};
use xylem::{ANode, ComponentDef, Expr, ForDirective, ScopeResolver, Tree, Value, WebSurface};

wasm_bindgen_test_configure!(run_in_browser);

static mut LOG_INITIALIZED: bool = false;

fn setup() -> (Tree<WebSurface>, web_sys::Node) {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}

	let document = window().unwrap().document().unwrap();
	let body = document.body().unwrap().dyn_into::<HtmlBodyElement>().unwrap();
	let container = document.create_element("div").unwrap();
	body.append_child(&container).unwrap();
	(Tree::new(WebSurface::new(document), ScopeResolver), container.into())
}

fn inner_html(container: &web_sys::Node) -> String {
	container.dyn_ref::<HtmlElement>().unwrap().inner_html()
}

#[wasm_bindgen_test]
fn text() {
	let (mut tree, container) = setup();
	let def = Rc::new(ComponentDef::new("hello", ANode::element("p").child(ANode::text(Expr::path("name")))));
	let root = tree.mount(def, [("name", Value::from("xylem"))], &container, None).unwrap();
	assert_eq!(inner_html(&container), "<p>xylem</p>");

	tree.set_data(root, "name", "web").unwrap();
	assert_eq!(inner_html(&container), "<p>web</p>");

	tree.dispose(root, false);
	assert_eq!(inner_html(&container), "");
}

#[wasm_bindgen_test]
fn keyed_list() {
	let (mut tree, container) = setup();
	let def = Rc::new(ComponentDef::new(
		"list",
		ANode::element("ul").attr("class", "list").child(
			ANode::element("li")
				.r#for(ForDirective::new("item", Expr::path("items")).track_by(Expr::path("item")))
				.child(ANode::text(Expr::path("item"))),
		),
	));
	let root = tree.mount(def, [("items", Value::from(vec!["a", "b", "c"]))], &container, None).unwrap();
	assert_eq!(inner_html(&container), "<ul class=\"list\"><li>a</li><li>b</li><li>c</li><!--s-for--></ul>");

	tree.set_data(root, "items", vec!["c", "a"]).unwrap();
	assert_eq!(inner_html(&container), "<ul class=\"list\"><li>c</li><li>a</li><!--s-for--></ul>");
}

#[wasm_bindgen_test]
fn hydrate_server_markup() {
	let (mut tree, container) = setup();
	let def = Rc::new(ComponentDef::new(
		"toggle",
		ANode::element("div").child(ANode::element("b").r#if(Expr::path("on")).child(ANode::static_text("on"))),
	));
	let html = xylem::ssr::render_to_string(def.clone(), [("on", Value::from(true))], ScopeResolver).unwrap();
	container.dyn_ref::<HtmlElement>().unwrap().set_inner_html(&html);

	let root = tree.hydrate(def, [("on", Value::from(true))], &container).unwrap();
	tree.set_data(root, "on", false).unwrap();
	assert_eq!(inner_html(&container), "<div><!--s-if--></div>");
}
