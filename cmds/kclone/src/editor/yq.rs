//! Editing through the `yq` binary.
//!
//! Every operation writes the document to the scratch file, runs one `yq`
//! expression against it and reads the result back.

use std::{
	fs,
	path::PathBuf,
	process::Command,
};

use k8s::{Document, FieldEquals, Path};
use serde_json::Value;
use tracing::instrument;

use super::{DocumentEditor, EditorError};

pub struct YqEditor {
	binary: PathBuf,
	scratch: PathBuf,
}

/// Render a value as a yq literal. JSON literals are valid yq.
fn literal(value: &Value) -> String {
	value.to_string()
}

/// Parse a user path and render it in canonical yq form.
fn expression(path: &str) -> Result<String, EditorError> {
	Ok(path.parse::<Path>()?.to_string())
}

pub fn delete_expression(paths: &[&str]) -> Result<String, EditorError> {
	let parts = paths
		.iter()
		.map(|p| expression(p).map(|p| format!("del({p})")))
		.collect::<Result<Vec<_>, _>>()?;
	Ok(parts.join(" | "))
}

pub fn set_expression(path: &str, value: &Value) -> Result<String, EditorError> {
	Ok(format!("{} = {}", expression(path)?, literal(value)))
}

pub fn set_where_expression(
	collection: &str,
	predicate: &FieldEquals,
	field: &str,
	value: &Value,
) -> Result<String, EditorError> {
	let collection = expression(collection)?;
	let tested = Path::root().key(predicate.field.clone());
	let target = Path::root().key(field);
	Ok(format!(
		"({collection} | select({tested} == {})){target} = {}",
		literal(&predicate.value),
		literal(value),
	))
}

impl YqEditor {
	pub fn new(binary: PathBuf, scratch: PathBuf) -> Self {
		Self { binary, scratch }
	}

	fn scratch_error(&self, source: std::io::Error) -> EditorError {
		EditorError::Scratch {
			path: self.scratch.clone(),
			source,
		}
	}

	fn store(&self, doc: &Document) -> Result<(), EditorError> {
		fs::write(&self.scratch, doc.to_yaml()?).map_err(|e| self.scratch_error(e))
	}

	fn load(&self) -> Result<Document, EditorError> {
		let yaml = fs::read_to_string(&self.scratch).map_err(|e| self.scratch_error(e))?;
		Ok(Document::from_yaml(&yaml)?)
	}

	#[instrument(skip(self, args), fields(binary = %self.binary.display()))]
	fn run(&self, expression: &str, args: &[&str]) -> Result<Vec<u8>, EditorError> {
		let output = Command::new(&self.binary)
			.arg("eval")
			.args(args)
			.arg(expression)
			.arg(&self.scratch)
			.output()
			.map_err(|source| EditorError::Spawn {
				binary: self.binary.display().to_string(),
				source,
			})?;

		if !output.status.success() {
			return Err(EditorError::Failed {
				expression: expression.to_string(),
				status: output.status,
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}
		Ok(output.stdout)
	}

	fn edit_in_place(&self, doc: &Document, expression: &str) -> Result<Document, EditorError> {
		self.store(doc)?;
		self.run(expression, &["-i"])?;
		self.load()
	}
}

impl DocumentEditor for YqEditor {
	fn get_field(&self, doc: &Document, path: &str) -> Result<Vec<Value>, EditorError> {
		let expression = expression(path)?;
		self.store(doc)?;
		let stdout = self.run(&expression, &["-o=json", "-I=0"])?;

		serde_json::Deserializer::from_slice(&stdout)
			.into_iter::<Value>()
			.filter(|v| !matches!(v, Ok(Value::Null)))
			.collect::<Result<Vec<_>, _>>()
			.map_err(EditorError::Output)
	}

	fn delete_fields(&self, doc: Document, paths: &[&str]) -> Result<Document, EditorError> {
		if paths.is_empty() {
			return Ok(doc);
		}
		self.edit_in_place(&doc, &delete_expression(paths)?)
	}

	fn set_field(
		&self,
		doc: Document,
		path: &str,
		value: Value,
	) -> Result<Document, EditorError> {
		self.edit_in_place(&doc, &set_expression(path, &value)?)
	}

	fn set_field_where(
		&self,
		doc: Document,
		collection: &str,
		predicate: &FieldEquals,
		field: &str,
		value: Value,
	) -> Result<Document, EditorError> {
		let expression = set_where_expression(collection, predicate, field, &value)?;
		self.edit_in_place(&doc, &expression)
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;

	#[test]
	fn test_delete_expression() {
		assert_eq!(
			delete_expression(&[".metadata.uid", ".data[\"secrets.env\"]"]).unwrap(),
			r#"del(.metadata.uid) | del(.data["secrets.env"])"#
		);
	}

	#[test]
	fn test_set_expression() {
		assert_eq!(
			set_expression(".spec.replicas", &json!(1)).unwrap(),
			".spec.replicas = 1"
		);
		assert_eq!(
			set_expression(".metadata.name", &json!("app-test-debug")).unwrap(),
			r#".metadata.name = "app-test-debug""#
		);
	}

	#[test]
	fn test_set_where_expression() {
		let expression = set_where_expression(
			".spec.template.spec.containers[].env[].valueFrom.secretKeyRef",
			&FieldEquals::new("name", "db"),
			"name",
			&json!("db-copy"),
		)
		.unwrap();
		assert_eq!(
			expression,
			r#"(.spec.template.spec.containers[].env[].valueFrom.secretKeyRef | select(.name == "db")).name = "db-copy""#
		);
	}

	#[test]
	fn test_invalid_path_rejected_before_spawn() {
		let editor = YqEditor::new(
			PathBuf::from("/nonexistent/yq"),
			PathBuf::from("/nonexistent/scratch"),
		);
		assert_matches!(
			editor.set_field(Document::default(), "spec", json!(1)),
			Err(EditorError::Path(_))
		);
	}

	#[test]
	fn test_missing_binary() {
		let dir = tempfile::tempdir().unwrap();
		let editor = YqEditor::new(dir.path().join("no-such-yq"), dir.path().join("doc.yaml"));
		assert_matches!(
			editor.get_field(&Document::new(json!({ "a": 1 })), ".a"),
			Err(EditorError::Spawn { .. })
		);
	}

	/// Runs the real mikefarah yq, taken from `KCLONE_TEST_YQ` or PATH, and
	/// checks it edits exactly like the native editor.
	#[test]
	#[ignore = "requires mikefarah yq"]
	fn test_matches_native_editor() {
		use crate::editor::NativeEditor;

		let binary = std::env::var_os("KCLONE_TEST_YQ").map_or_else(|| PathBuf::from("yq"), PathBuf::from);
		let dir = tempfile::tempdir().unwrap();
		let yq = YqEditor::new(binary, dir.path().join("doc.yaml"));
		let native = NativeEditor;
		let doc = Document::new(json!({
			"metadata": { "name": "app", "uid": "u1", "annotations": { "a.b/c": "x" } },
			"spec": { "template": { "spec": {
				"containers": [
					{ "name": "app", "image": "app:1.0", "envFrom": [ { "secretRef": { "name": "db" } } ] },
					{ "name": "sidecar", "image": "envoy:1.0" }
				],
				"volumes": [ { "name": "v", "secret": { "secretName": "db" } } ]
			} } }
		}));

		let images = ".spec.template.spec.containers[].image";
		assert_eq!(
			yq.get_field(&doc, images).unwrap(),
			native.get_field(&doc, images).unwrap()
		);
		assert_eq!(
			yq.get_field(&doc, ".metadata.missing").unwrap(),
			Vec::<Value>::new()
		);

		let deleted = [".metadata.uid", ".metadata.annotations[\"a.b/c\"]", ".status"];
		assert_eq!(
			yq.delete_fields(doc.clone(), &deleted).unwrap(),
			native.delete_fields(doc.clone(), &deleted).unwrap()
		);

		assert_eq!(
			yq.set_field(doc.clone(), ".spec.replicas", json!(1)).unwrap(),
			native.set_field(doc.clone(), ".spec.replicas", json!(1)).unwrap()
		);

		let predicate = FieldEquals::new("secretName", "db");
		let collection = ".spec.template.spec.volumes[].secret";
		assert_eq!(
			yq.set_field_where(doc.clone(), collection, &predicate, "secretName", json!("db-copy"))
				.unwrap(),
			native
				.set_field_where(doc, collection, &predicate, "secretName", json!("db-copy"))
				.unwrap()
		);
	}
}
