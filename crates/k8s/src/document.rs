//! Owned manifest documents.

use serde_json::Value;
use thiserror::Error;

use crate::{
	edit::{self, EditError, FieldEquals},
	path::Path,
};

#[derive(Debug, Error)]
pub enum DocumentError {
	#[error("parsing YAML document")]
	ParseYaml(#[source] serde_yaml::Error),

	#[error("serializing YAML document")]
	SerializeYaml(#[source] serde_yaml::Error),
}

/// A Kubernetes manifest as an owned tree.
///
/// A document has exactly one owner at a time: edits take `self` and hand the
/// updated document back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document(Value);

impl Document {
	pub fn new(value: Value) -> Self {
		Self(value)
	}

	pub fn from_yaml(input: &str) -> Result<Self, DocumentError> {
		serde_yaml::from_str(input)
			.map(Self)
			.map_err(DocumentError::ParseYaml)
	}

	pub fn to_yaml(&self) -> Result<String, DocumentError> {
		serde_yaml::to_string(&self.0).map_err(DocumentError::SerializeYaml)
	}

	pub fn as_value(&self) -> &Value {
		&self.0
	}

	pub fn into_value(self) -> Value {
		self.0
	}

	pub fn kind(&self) -> Option<&str> {
		self.0.get("kind").and_then(Value::as_str)
	}

	pub fn name(&self) -> Option<&str> {
		self.0.pointer("/metadata/name").and_then(Value::as_str)
	}

	pub fn get(&self, path: &Path) -> Vec<&Value> {
		edit::get(&self.0, path)
	}

	/// First string found at `path`.
	pub fn get_str(&self, path: &Path) -> Option<&str> {
		self.get(path).into_iter().find_map(Value::as_str)
	}

	#[must_use]
	pub fn delete(mut self, path: &Path) -> Self {
		edit::delete(&mut self.0, path);
		self
	}

	pub fn set(mut self, path: &Path, value: &Value) -> Result<Self, EditError> {
		edit::set(&mut self.0, path, value)?;
		Ok(self)
	}

	pub fn set_where(
		mut self,
		collection: &Path,
		predicate: &FieldEquals,
		field: &str,
		value: &Value,
	) -> Result<(Self, usize), EditError> {
		let updated = edit::set_where(&mut self.0, collection, predicate, field, value)?;
		Ok((self, updated))
	}
}

impl From<Value> for Document {
	fn from(value: Value) -> Self {
		Self(value)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_yaml_round_trip_keeps_key_order() {
		let yaml = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: app\n  namespace: ns1\n";
		let doc = Document::from_yaml(yaml).unwrap();
		assert_eq!(doc.kind(), Some("Deployment"));
		assert_eq!(doc.name(), Some("app"));
		assert_eq!(doc.to_yaml().unwrap(), yaml);
	}

	#[test]
	fn test_invalid_yaml() {
		assert!(Document::from_yaml("a: [").is_err());
	}

	#[test]
	fn test_get_str_picks_first_string() {
		let doc = Document::new(json!({ "items": [ { "x": 1 }, { "x": "a" }, { "x": "b" } ] }));
		assert_eq!(doc.get_str(&Path::must(".items[].x")), Some("a"));
	}

	#[test]
	fn test_edits_chain() {
		let doc = Document::new(json!({ "metadata": { "name": "app", "uid": "u" } }))
			.delete(&Path::must(".metadata.uid"))
			.set(&Path::must(".metadata.name"), &json!("copy"))
			.unwrap();
		assert_eq!(doc.as_value(), &json!({ "metadata": { "name": "copy" } }));
	}
}
