//! In-process query and mutation of manifest trees.
//!
//! Semantics follow yq for the supported path subset: reads skip missing
//! nodes, deletes of missing nodes are no-ops, and sets create missing
//! intermediate mappings.

use serde_json::Value;
use thiserror::Error;

use crate::path::{Path, Segment};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EditError {
	#[error("cannot descend into {found} at `{path}`: expected {expected}")]
	TypeMismatch {
		path: String,
		expected: &'static str,
		found: &'static str,
	},

	#[error("index {index} out of range at `{path}` (length {len})")]
	IndexOutOfRange {
		path: String,
		index: usize,
		len: usize,
	},
}

/// Predicate matching objects whose `field` equals `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldEquals {
	pub field: String,
	pub value: Value,
}

impl FieldEquals {
	pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
		Self {
			field: field.into(),
			value: value.into(),
		}
	}

	fn matches(&self, node: &Value) -> bool {
		node.get(&self.field) == Some(&self.value)
	}
}

fn kind_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "a sequence",
		Value::Object(_) => "a mapping",
	}
}

/// Collect every non-null node matched by `path`.
pub fn get<'a>(root: &'a Value, path: &Path) -> Vec<&'a Value> {
	let mut out = Vec::new();
	collect(root, path.segments(), &mut out);
	out
}

fn collect<'a>(node: &'a Value, segments: &[Segment], out: &mut Vec<&'a Value>) {
	let Some((first, rest)) = segments.split_first() else {
		if !node.is_null() {
			out.push(node);
		}
		return;
	};
	match (first, node) {
		(Segment::Key(key), Value::Object(map)) => {
			if let Some(child) = map.get(key) {
				collect(child, rest, out);
			}
		}
		(Segment::Index(index), Value::Array(items)) => {
			if let Some(child) = items.get(*index) {
				collect(child, rest, out);
			}
		}
		(Segment::Each, Value::Array(items)) => {
			for child in items {
				collect(child, rest, out);
			}
		}
		(Segment::Each, Value::Object(map)) => {
			for child in map.values() {
				collect(child, rest, out);
			}
		}
		_ => {}
	}
}

/// Remove every node matched by `path`.
///
/// Deleting the root resets the document to null.
pub fn delete(root: &mut Value, path: &Path) {
	let Some((last, parent)) = path.segments().split_last() else {
		*root = Value::Null;
		return;
	};
	let last = last.clone();
	let _ = visit_mut(root, parent, path, &mut |node| {
		match (&last, node) {
			(Segment::Key(key), Value::Object(map)) => {
				map.shift_remove(key);
			}
			(Segment::Index(index), Value::Array(items)) if *index < items.len() => {
				items.remove(*index);
			}
			(Segment::Each, Value::Array(items)) => items.clear(),
			(Segment::Each, Value::Object(map)) => map.clear(),
			_ => {}
		}
		Ok(())
	});
}

/// Set every node matched by `path` to `value`, creating missing mappings.
pub fn set(root: &mut Value, path: &Path, value: &Value) -> Result<(), EditError> {
	set_in(root, path.segments(), path, value)
}

fn set_in(
	node: &mut Value,
	segments: &[Segment],
	path: &Path,
	value: &Value,
) -> Result<(), EditError> {
	let Some((first, rest)) = segments.split_first() else {
		*node = value.clone();
		return Ok(());
	};
	match first {
		Segment::Key(key) => {
			if node.is_null() {
				*node = Value::Object(serde_json::Map::new());
			}
			match node {
				Value::Object(map) => {
					let child = map.entry(key.clone()).or_insert(Value::Null);
					set_in(child, rest, path, value)
				}
				other => Err(EditError::TypeMismatch {
					path: path.to_string(),
					expected: "a mapping",
					found: kind_name(other),
				}),
			}
		}
		Segment::Index(index) => match node {
			Value::Array(items) => {
				let len = items.len();
				let child = items.get_mut(*index).ok_or(EditError::IndexOutOfRange {
					path: path.to_string(),
					index: *index,
					len,
				})?;
				set_in(child, rest, path, value)
			}
			Value::Null => Err(EditError::IndexOutOfRange {
				path: path.to_string(),
				index: *index,
				len: 0,
			}),
			other => Err(EditError::TypeMismatch {
				path: path.to_string(),
				expected: "a sequence",
				found: kind_name(other),
			}),
		},
		Segment::Each => match node {
			Value::Array(items) => items
				.iter_mut()
				.try_for_each(|child| set_in(child, rest, path, value)),
			Value::Object(map) => map
				.values_mut()
				.try_for_each(|child| set_in(child, rest, path, value)),
			Value::Null => Ok(()),
			other => Err(EditError::TypeMismatch {
				path: path.to_string(),
				expected: "a sequence",
				found: kind_name(other),
			}),
		},
	}
}

/// For every node matched by `collection` that satisfies `predicate`, set
/// its `field` to `value`. Returns the number of updated nodes.
pub fn set_where(
	root: &mut Value,
	collection: &Path,
	predicate: &FieldEquals,
	field: &str,
	value: &Value,
) -> Result<usize, EditError> {
	let mut updated = 0;
	visit_mut(root, collection.segments(), collection, &mut |node| {
		if !predicate.matches(node) {
			return Ok(());
		}
		match node {
			Value::Object(map) => {
				map.insert(field.to_string(), value.clone());
				updated += 1;
				Ok(())
			}
			other => Err(EditError::TypeMismatch {
				path: collection.to_string(),
				expected: "a mapping",
				found: kind_name(other),
			}),
		}
	})?;
	Ok(updated)
}

/// Call `f` on every existing node matched by `segments`, without creating
/// anything along the way.
fn visit_mut(
	node: &mut Value,
	segments: &[Segment],
	path: &Path,
	f: &mut dyn FnMut(&mut Value) -> Result<(), EditError>,
) -> Result<(), EditError> {
	let Some((first, rest)) = segments.split_first() else {
		return f(node);
	};
	match (first, node) {
		(Segment::Key(key), Value::Object(map)) => match map.get_mut(key) {
			Some(child) => visit_mut(child, rest, path, f),
			None => Ok(()),
		},
		(Segment::Index(index), Value::Array(items)) => match items.get_mut(*index) {
			Some(child) => visit_mut(child, rest, path, f),
			None => Ok(()),
		},
		(Segment::Each, Value::Array(items)) => items
			.iter_mut()
			.try_for_each(|child| visit_mut(child, rest, path, f)),
		(Segment::Each, Value::Object(map)) => map
			.values_mut()
			.try_for_each(|child| visit_mut(child, rest, path, f)),
		_ => Ok(()),
	}
}
