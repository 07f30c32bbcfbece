//! Data model seen by the view tree: values, data paths, change records and scopes.
//!
//! Change tracking itself happens elsewhere. This module only describes what a change looks like once
//! it was produced, and the [`Scope`]s that bound expressions are resolved against.

use core::{
	cell::RefCell,
	fmt::{self, Display, Formatter},
};
use hashbrown::HashMap;
use std::{collections::BTreeMap, rc::Rc};

/// A data value as stored in a [`Scope`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
	List(Vec<Value>),
	Map(BTreeMap<String, Value>),
}
impl Default for Value {
	fn default() -> Self {
		Self::Null
	}
}
impl Value {
	/// Whether this value counts as "present" for conditions and empty-attribute checks.
	#[must_use]
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(b) => *b,
			Value::Number(n) => *n != 0.0 && !n.is_nan(),
			Value::String(s) => !s.is_empty(),
			Value::List(_) | Value::Map(_) => true,
		}
	}

	#[must_use]
	pub fn as_list(&self) -> Option<&[Value]> {
		match self {
			Value::List(items) => Some(items),
			_ => None,
		}
	}

	/// Follows `path` into this value. Missing steps yield [`None`].
	#[must_use]
	pub fn get_path(&self, path: &[PathSegment]) -> Option<&Value> {
		let mut current = self;
		for segment in path {
			current = match (current, segment) {
				(Value::List(items), PathSegment::Index(i)) => items.get(*i)?,
				(Value::List(items), PathSegment::Key(key)) => items.get(key.parse::<usize>().ok()?)?,
				(Value::Map(map), PathSegment::Key(key)) => map.get(&**key)?,
				(Value::Map(map), PathSegment::Index(i)) => map.get(&i.to_string())?,
				_ => return None,
			}
		}
		Some(current)
	}

	/// Replaces the value at `path`, creating intermediate maps where needed.
	///
	/// Returns `false` if a list index is out of range or the path crosses a scalar.
	pub fn set_path(&mut self, path: &[PathSegment], value: Value) -> bool {
		let (first, rest) = match path.split_first() {
			Some(split) => split,
			None => {
				*self = value;
				return true;
			}
		};

		if let Value::Null = self {
			*self = Value::Map(BTreeMap::new());
		}

		let next = match (self, first) {
			(Value::List(items), segment) => {
				let index = match segment.as_index() {
					Some(index) if index < items.len() => index,
					_ => return false,
				};
				&mut items[index]
			}
			(Value::Map(map), segment) => map.entry(segment.to_string()).or_insert(Value::Null),
			_ => return false,
		};
		next.set_path(rest, value)
	}
}
impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => Ok(()),
			Value::Bool(b) => write!(f, "{}", b),
			#[allow(clippy::cast_possible_truncation)]
			Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
			Value::Number(n) => write!(f, "{}", n),
			Value::String(s) => f.write_str(s),
			Value::List(items) => {
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(",")?;
					}
					write!(f, "{}", item)?;
				}
				Ok(())
			}
			Value::Map(_) => f.write_str("[object Object]"),
		}
	}
}
impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}
impl From<f64> for Value {
	fn from(n: f64) -> Self {
		Self::Number(n)
	}
}
impl From<i32> for Value {
	fn from(n: i32) -> Self {
		Self::Number(n.into())
	}
}
impl From<usize> for Value {
	#[allow(clippy::cast_precision_loss)]
	fn from(n: usize) -> Self {
		Self::Number(n as f64)
	}
}
impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Self::String(s.to_owned())
	}
}
impl From<String> for Value {
	fn from(s: String) -> Self {
		Self::String(s)
	}
}
impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(items: Vec<T>) -> Self {
		Self::List(items.into_iter().map(Into::into).collect())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
	Key(Rc<str>),
	Index(usize),
}
impl PathSegment {
	fn as_index(&self) -> Option<usize> {
		match self {
			PathSegment::Index(i) => Some(*i),
			PathSegment::Key(key) => key.parse().ok(),
		}
	}

	/// `Key("2")` and `Index(2)` address the same slot.
	#[must_use]
	pub fn matches(&self, other: &PathSegment) -> bool {
		match (self, other) {
			(PathSegment::Key(a), PathSegment::Key(b)) => a == b,
			(PathSegment::Index(a), PathSegment::Index(b)) => a == b,
			(PathSegment::Key(key), PathSegment::Index(i)) | (PathSegment::Index(i), PathSegment::Key(key)) => key.parse::<usize>().ok() == Some(*i),
		}
	}
}
impl Display for PathSegment {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			PathSegment::Key(key) => f.write_str(key),
			PathSegment::Index(i) => write!(f, "{}", i),
		}
	}
}

/// A location in a data model, like `items[2].name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DataPath(Vec<PathSegment>);
impl DataPath {
	#[must_use]
	pub fn new(segments: Vec<PathSegment>) -> Self {
		Self(segments)
	}

	#[must_use]
	pub fn key(name: &str) -> Self {
		Self(vec![PathSegment::Key(name.into())])
	}

	/// Parses dotted/bracketed accessor syntax. Numeric segments become [`PathSegment::Index`].
	#[must_use]
	pub fn parse(source: &str) -> Self {
		Self(
			source
				.split(|c| c == '.' || c == '[' || c == ']')
				.filter(|part| !part.is_empty())
				.map(|part| match part.parse() {
					Ok(i) => PathSegment::Index(i),
					Err(_) => PathSegment::Key(part.into()),
				})
				.collect(),
		)
	}

	#[must_use]
	pub fn segments(&self) -> &[PathSegment] {
		&self.0
	}

	#[must_use]
	pub fn first_key(&self) -> Option<&str> {
		match self.0.first() {
			Some(PathSegment::Key(key)) => Some(key),
			_ => None,
		}
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn join(&self, segment: PathSegment) -> Self {
		let mut segments = self.0.clone();
		segments.push(segment);
		Self(segments)
	}

	/// Whether `prefix` is a (non-strict) prefix of `self`.
	#[must_use]
	pub fn starts_with(&self, prefix: &DataPath) -> bool {
		prefix.0.len() <= self.0.len() && prefix.0.iter().zip(&self.0).all(|(a, b)| a.matches(b))
	}

	/// Two paths intersect when one contains the other.
	#[must_use]
	pub fn intersects(&self, other: &DataPath) -> bool {
		self.0.iter().zip(&other.0).all(|(a, b)| a.matches(b))
	}

	/// Replaces the first `prefix_len` segments with `head`.
	#[must_use]
	pub fn rebase(&self, prefix_len: usize, head: &DataPath) -> Self {
		let mut segments = head.0.clone();
		segments.extend(self.0.iter().skip(prefix_len).cloned());
		Self(segments)
	}
}
impl Display for DataPath {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		for (i, segment) in self.0.iter().enumerate() {
			match segment {
				PathSegment::Index(index) => write!(f, "[{}]", index)?,
				PathSegment::Key(key) if i == 0 => f.write_str(key)?,
				PathSegment::Key(key) => write!(f, ".{}", key)?,
			}
		}
		Ok(())
	}
}
impl From<&str> for DataPath {
	fn from(source: &str) -> Self {
		Self::parse(source)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
	/// The value at the path was replaced.
	Set(Value),
	/// The list at the path had `remove` items taken out at `index` and `insert` put in their place.
	Splice { index: usize, remove: usize, insert: Vec<Value> },
}

/// One data change, as delivered by the (external) data model.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
	pub path: DataPath,
	pub kind: ChangeKind,
}
impl Change {
	#[must_use]
	pub fn set(path: impl Into<DataPath>, value: impl Into<Value>) -> Self {
		Self {
			path: path.into(),
			kind: ChangeKind::Set(value.into()),
		}
	}

	#[must_use]
	pub fn splice(path: impl Into<DataPath>, index: usize, remove: usize, insert: Vec<Value>) -> Self {
		Self {
			path: path.into(),
			kind: ChangeKind::Splice { index, remove, insert },
		}
	}
}

/// A data context. Variables not found locally are looked up in the parent scope.
#[derive(Debug, Default)]
pub struct Scope {
	vars: RefCell<HashMap<Rc<str>, Value>>,
	parent: Option<Rc<Scope>>,
}
impl Scope {
	#[must_use]
	pub fn root<K: Into<Rc<str>>>(data: impl IntoIterator<Item = (K, Value)>) -> Rc<Self> {
		Rc::new(Self {
			vars: RefCell::new(data.into_iter().map(|(k, v)| (k.into(), v)).collect()),
			parent: None,
		})
	}

	#[must_use]
	pub fn child(parent: &Rc<Scope>) -> Rc<Self> {
		Rc::new(Self {
			vars: RefCell::default(),
			parent: Some(parent.clone()),
		})
	}

	#[must_use]
	pub fn parent(&self) -> Option<&Rc<Scope>> {
		self.parent.as_ref()
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<Value> {
		match self.vars.borrow().get(name) {
			Some(value) => Some(value.clone()),
			None => self.parent.as_ref().and_then(|parent| parent.get(name)),
		}
	}

	#[must_use]
	pub fn lookup(&self, path: &DataPath) -> Option<Value> {
		let (first, rest) = path.segments().split_first()?;
		let name = first.to_string();
		let vars = self.vars.borrow();
		match vars.get(name.as_str()) {
			Some(value) => value.get_path(rest).cloned(),
			None => {
				drop(vars);
				self.parent.as_ref().and_then(|parent| parent.lookup(path))
			}
		}
	}

	/// Sets a local variable, shadowing the parent's. Returns whether the value changed.
	pub fn set(&self, name: &str, value: Value) -> bool {
		let mut vars = self.vars.borrow_mut();
		match vars.get_mut(name) {
			Some(current) if *current == value => false,
			Some(current) => {
				*current = value;
				true
			}
			None => {
				vars.insert(name.into(), value);
				true
			}
		}
	}

	/// Writes `value` at `path`, into whichever scope in the chain owns the path's first segment.
	///
	/// Returns `false` if the path is empty or can't be written.
	pub fn set_path(&self, path: &DataPath, value: Value) -> bool {
		let (first, rest) = match path.segments().split_first() {
			Some(split) => split,
			None => return false,
		};
		let name = first.to_string();
		let owns = self.vars.borrow().contains_key(name.as_str());
		match (owns, &self.parent) {
			(false, Some(parent)) if parent.lookup(&DataPath::key(&name)).is_some() => parent.set_path(path, value),
			_ => {
				let mut vars = self.vars.borrow_mut();
				let slot = vars.entry(name.as_str().into()).or_insert(Value::Null);
				slot.set_path(rest, value)
			}
		}
	}

	/// Applies a splice to the list at `path`. Returns the items that were removed.
	pub fn splice_path(&self, path: &DataPath, index: usize, remove: usize, insert: &[Value]) -> Option<Vec<Value>> {
		let mut list = match self.lookup(path)? {
			Value::List(list) => list,
			_ => return None,
		};
		let index = index.min(list.len());
		let end = (index + remove).min(list.len());
		let removed = list.splice(index..end, insert.iter().cloned()).collect();
		if self.set_path(path, Value::List(list)) {
			Some(removed)
		} else {
			None
		}
	}
}
