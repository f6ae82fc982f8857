//! Patch handling and response bodies for the mock server.

use serde_json::{json, Map, Value};

/// Apply `patch` onto `base` with merge-patch semantics.
///
/// Objects merge recursively, `null` removes a key, everything else replaces.
/// Keys starting with `$` are strategic merge directives and are dropped.
pub fn apply_patch(base: Value, patch: Value) -> Value {
	match (base, patch) {
		(Value::Object(mut base), Value::Object(patch)) => {
			for (key, value) in patch {
				if key.starts_with('$') {
					continue;
				}
				if value.is_null() {
					base.shift_remove(&key);
					continue;
				}
				match base.get_mut(&key) {
					Some(current) => {
						let previous = std::mem::take(current);
						*current = apply_patch(previous, value);
					}
					None => {
						base.insert(key, apply_patch(Value::Null, value));
					}
				}
			}
			Value::Object(base)
		}
		(_, Value::Object(patch)) => apply_patch(Value::Object(Map::new()), Value::Object(patch)),
		(_, patch) => patch,
	}
}

/// A `metav1.Status` failure body.
pub fn status_body(code: u16, reason: &str, message: &str) -> Value {
	json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	})
}

/// Split `/api/v1/namespaces/ns1/secrets/db` into the collection path and name.
pub fn split_resource_path(path: &str) -> (String, String) {
	let path = path.trim_end_matches('/');
	match path.rsplit_once('/') {
		Some((collection, name)) => (collection.to_string(), name.to_string()),
		None => (path.to_string(), String::new()),
	}
}
