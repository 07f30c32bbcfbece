#![doc(html_root_url = "https://docs.rs/xylem/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod anode;
mod async_component;
pub mod component;
mod create;
pub mod data;
pub mod error;
pub mod expr;
mod for_node;
mod hydrate;
pub mod life_cycle;
pub mod ssr;
pub mod surface;
pub mod tree;
mod update;

pub use anode::{ANode, ForDirective};
pub use component::{AsyncRegistration, ComponentDef, LoadTicket, Loader, Registration};
pub use data::{Change, ChangeKind, DataPath, PathSegment, Scope, Value};
pub use error::{Error, Reported};
pub use expr::{Expr, ResolveError, Resolver, ScopeResolver};
pub use life_cycle::LifeCycle;
pub use surface::{Surface, VirtualSurface, WebSurface};
pub use tree::{NodeId, NodeType, Options, Tree};
