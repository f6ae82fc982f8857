use k8s::{Document, FieldEquals, Path};
use serde_json::Value;

use super::{DocumentEditor, EditorError};

/// Edits documents in process with [`k8s::edit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEditor;

impl DocumentEditor for NativeEditor {
	fn get_field(&self, doc: &Document, path: &str) -> Result<Vec<Value>, EditorError> {
		let path: Path = path.parse()?;
		Ok(doc.get(&path).into_iter().cloned().collect())
	}

	fn delete_fields(&self, doc: Document, paths: &[&str]) -> Result<Document, EditorError> {
		let parsed = paths
			.iter()
			.map(|p| p.parse::<Path>())
			.collect::<Result<Vec<_>, _>>()?;
		Ok(parsed.iter().fold(doc, |doc, path| doc.delete(path)))
	}

	fn set_field(
		&self,
		doc: Document,
		path: &str,
		value: Value,
	) -> Result<Document, EditorError> {
		let path: Path = path.parse()?;
		Ok(doc.set(&path, &value)?)
	}

	fn set_field_where(
		&self,
		doc: Document,
		collection: &str,
		predicate: &FieldEquals,
		field: &str,
		value: Value,
	) -> Result<Document, EditorError> {
		let collection: Path = collection.parse()?;
		let (doc, updated) = doc.set_where(&collection, predicate, field, &value)?;
		tracing::trace!(%collection, updated, "conditional set");
		Ok(doc)
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;

	fn deployment() -> Document {
		Document::new(json!({
			"metadata": { "name": "app", "uid": "1234" },
			"spec": {
				"template": {
					"spec": {
						"volumes": [
							{ "name": "a", "secret": { "secretName": "db" } },
							{ "name": "b", "secret": { "secretName": "tls" } }
						]
					}
				}
			}
		}))
	}

	#[test]
	fn test_get_field_each() {
		let values = NativeEditor
			.get_field(&deployment(), ".spec.template.spec.volumes[].secret.secretName")
			.unwrap();
		assert_eq!(values, vec![json!("db"), json!("tls")]);
	}

	#[test]
	fn test_delete_missing_fields_is_noop() {
		let doc = NativeEditor
			.delete_fields(deployment(), &[".metadata.uid", ".metadata.generation"])
			.unwrap();
		assert_eq!(doc.get_str(&Path::must(".metadata.uid")), None);
		assert_eq!(doc.name(), Some("app"));
	}

	#[test]
	fn test_set_field_where() {
		let doc = NativeEditor
			.set_field_where(
				deployment(),
				".spec.template.spec.volumes[].secret",
				&FieldEquals::new("secretName", "db"),
				"secretName",
				json!("db-copy"),
			)
			.unwrap();
		let values = NativeEditor
			.get_field(&doc, ".spec.template.spec.volumes[].secret.secretName")
			.unwrap();
		assert_eq!(values, vec![json!("db-copy"), json!("tls")]);
	}

	#[test]
	fn test_invalid_path() {
		assert_matches!(
			NativeEditor.get_field(&deployment(), ".spec[oops"),
			Err(EditorError::Path(_))
		);
	}

	#[test]
	fn test_set_type_mismatch() {
		assert_matches!(
			NativeEditor.set_field(deployment(), ".metadata.name.first", json!("x")),
			Err(EditorError::Edit(_))
		);
	}
}
