//! Cloning Secrets under new names and pointing the copy at them.

use std::collections::{BTreeMap, BTreeSet};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use k8s::{name::validate_subdomain, Document, FieldEquals, NameError, Path};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::instrument;

use super::{discovery::SiteKind, request::SecretOverrides};
use crate::{
	cluster::{ClusterClient, ClusterError, ResourceKind},
	editor::{DocumentEditor, EditorError},
};

/// Metadata that must not be carried over to a new Secret.
pub const SECRET_METADATA_FIELDS: &[&str] = &[
	".metadata.uid",
	".metadata.resourceVersion",
	".metadata.creationTimestamp",
	".metadata.annotations",
	".metadata.ownerReferences",
	".metadata.managedFields",
];

pub const DEFAULT_ENV_BLOB_KEY: &str = "secrets.env";

/// How a Secret stores its values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SecretLayout {
	/// One data entry per key.
	#[default]
	Keys,
	/// A single data entry holding a `KEY=VALUE` env file.
	EnvBlob { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RekeyPlan {
	pub old_secret_name: String,
	pub new_secret_name: String,
}

impl RekeyPlan {
	pub fn new(old_secret_name: &str, clone_name: &str) -> Self {
		Self {
			old_secret_name: old_secret_name.to_string(),
			new_secret_name: format!("{old_secret_name}-{clone_name}"),
		}
	}
}

#[derive(Debug, Error)]
pub enum RekeyError {
	#[error("fetching secret `{name}`")]
	Fetch {
		name: String,
		#[source]
		source: ClusterError,
	},

	#[error("editing secret `{name}`")]
	Edit {
		name: String,
		#[source]
		source: EditorError,
	},

	#[error("secret `{name}` entry `{key}` is not valid base64")]
	Decode {
		name: String,
		key: String,
		#[source]
		source: base64::DecodeError,
	},

	#[error("secret `{name}` entry `{key}` is not a string")]
	NonString { name: String, key: String },

	#[error("secret `{name}` has no `{key}` entry")]
	MissingBlob { name: String, key: String },

	#[error("secret `{name}` entry `{key}` is not UTF-8 text")]
	NotUtf8 {
		name: String,
		key: String,
		#[source]
		source: std::string::FromUtf8Error,
	},

	#[error("`{name}` is not a valid secret name")]
	InvalidName {
		name: String,
		#[source]
		source: NameError,
	},

	#[error("applying secret `{name}`")]
	Apply {
		name: String,
		#[source]
		source: ClusterError,
	},

	#[error("copy `{new}` of secret `{old}` would replace a secret the deployment already uses")]
	NameConflict { old: String, new: String },

	#[error("pointing the deployment at `{name}`")]
	Rewrite {
		name: String,
		#[source]
		source: EditorError,
	},
}

fn decode(name: &str, key: &str, value: &Value) -> Result<Vec<u8>, RekeyError> {
	let encoded = value.as_str().ok_or_else(|| RekeyError::NonString {
		name: name.to_string(),
		key: key.to_string(),
	})?;
	STANDARD
		.decode(encoded)
		.map_err(|source| RekeyError::Decode {
			name: name.to_string(),
			key: key.to_string(),
			source,
		})
}

/// Decode every entry, let `overrides` replace or add keys, re-encode.
pub fn merge_keys(
	name: &str,
	data: &Map<String, Value>,
	overrides: &SecretOverrides,
) -> Result<Map<String, Value>, RekeyError> {
	let mut decoded = data
		.iter()
		.map(|(key, value)| decode(name, key, value).map(|bytes| (key.clone(), bytes)))
		.collect::<Result<Vec<_>, _>>()?;

	for (key, value) in overrides.iter() {
		match decoded.iter_mut().find(|(k, _)| k == key) {
			Some((_, existing)) => *existing = value.as_bytes().to_vec(),
			None => decoded.push((key.to_string(), value.as_bytes().to_vec())),
		}
	}

	Ok(decoded
		.into_iter()
		.map(|(key, bytes)| (key, Value::from(STANDARD.encode(bytes))))
		.collect())
}

/// Parse `KEY=VALUE` lines, skipping blanks, comments and lines without `=`.
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
	content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.filter_map(|line| line.split_once('='))
		.map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
		.collect()
}

/// Render sorted `KEY=VALUE` lines joined by `\n`.
pub fn render_env(entries: &BTreeMap<String, String>) -> String {
	let mut lines: Vec<_> = entries
		.iter()
		.map(|(key, value)| format!("{key}={value}"))
		.collect();
	lines.sort();
	lines.join("\n")
}

/// Merge `overrides` into the base64 env file `encoded`.
pub fn merge_env_blob(
	name: &str,
	key: &str,
	encoded: &Value,
	overrides: &SecretOverrides,
) -> Result<String, RekeyError> {
	let bytes = decode(name, key, encoded)?;
	let content = String::from_utf8(bytes).map_err(|source| RekeyError::NotUtf8 {
		name: name.to_string(),
		key: key.to_string(),
		source,
	})?;

	let mut entries = parse_env(&content);
	for (k, v) in overrides.iter() {
		entries.insert(k.to_string(), v.to_string());
	}
	Ok(STANDARD.encode(render_env(&entries)))
}

/// Turn the fetched source Secret into the manifest of its copy.
pub fn prepare_secret(
	editor: &dyn DocumentEditor,
	doc: Document,
	plan: &RekeyPlan,
	overrides: &SecretOverrides,
	layout: &SecretLayout,
) -> Result<Document, RekeyError> {
	let name = plan.old_secret_name.as_str();
	let edit = |source| RekeyError::Edit {
		name: name.to_string(),
		source,
	};

	let doc = editor
		.delete_fields(doc, SECRET_METADATA_FIELDS)
		.map_err(edit)?;
	let data = match editor.get_field(&doc, ".data").map_err(edit)?.into_iter().next() {
		Some(Value::Object(map)) => map,
		_ => Map::new(),
	};

	let doc = match layout {
		SecretLayout::Keys => {
			let merged = merge_keys(name, &data, overrides)?;
			editor
				.set_field(doc, ".data", Value::Object(merged))
				.map_err(edit)?
		}
		SecretLayout::EnvBlob { key } => {
			let blob = data.get(key).ok_or_else(|| RekeyError::MissingBlob {
				name: name.to_string(),
				key: key.clone(),
			})?;
			let merged = merge_env_blob(name, key, blob, overrides)?;
			let path = Path::must(".data").key(key.clone()).to_string();
			editor
				.set_field(doc, &path, Value::from(merged))
				.map_err(edit)?
		}
	};

	editor
		.set_field(doc, ".metadata.name", Value::from(plan.new_secret_name.clone()))
		.map_err(edit)
}

/// Clone one Secret according to `plan` and apply it.
#[instrument(skip(cluster, editor, overrides), fields(from = %plan.old_secret_name, to = %plan.new_secret_name))]
pub async fn rekey<C: ClusterClient>(
	cluster: &C,
	editor: &dyn DocumentEditor,
	namespace: &str,
	plan: &RekeyPlan,
	overrides: &SecretOverrides,
	layout: &SecretLayout,
) -> Result<RekeyPlan, RekeyError> {
	validate_subdomain(&plan.new_secret_name).map_err(|source| RekeyError::InvalidName {
		name: plan.new_secret_name.clone(),
		source,
	})?;

	let source = cluster
		.get_document(ResourceKind::Secret, &plan.old_secret_name, namespace)
		.await
		.map_err(|source| RekeyError::Fetch {
			name: plan.old_secret_name.clone(),
			source,
		})?;

	let secret = prepare_secret(editor, source, plan, overrides, layout)?;

	cluster
		.apply(ResourceKind::Secret, &secret, namespace)
		.await
		.map_err(|source| RekeyError::Apply {
			name: plan.new_secret_name.clone(),
			source,
		})?;

	tracing::info!("secret cloned");
	Ok(plan.clone())
}

/// Plan a copy of every referenced Secret.
///
/// Fails when a copy would take the name of another referenced Secret, since
/// applying it would overwrite a Secret the source Deployment still uses.
pub fn plan_all(names: &BTreeSet<String>, clone_name: &str) -> Result<Vec<RekeyPlan>, RekeyError> {
	names
		.iter()
		.map(|name| {
			let plan = RekeyPlan::new(name, clone_name);
			if names.contains(&plan.new_secret_name) {
				return Err(RekeyError::NameConflict {
					old: plan.old_secret_name,
					new: plan.new_secret_name,
				});
			}
			Ok(plan)
		})
		.collect()
}

/// Never a valid Secret name, so it cannot match a real reference.
fn placeholder(index: usize) -> String {
	format!("kclone.rename/{index}")
}

fn set_reference(
	editor: &dyn DocumentEditor,
	mut doc: Document,
	from: &str,
	to: &str,
	plan: &RekeyPlan,
) -> Result<Document, RekeyError> {
	for kind in SiteKind::ALL {
		doc = editor
			.set_field_where(
				doc,
				kind.collection(),
				&FieldEquals::new(kind.name_field(), from),
				kind.name_field(),
				Value::from(to),
			)
			.map_err(|source| RekeyError::Rewrite {
				name: plan.new_secret_name.clone(),
				source,
			})?;
	}
	Ok(doc)
}

/// Point every reference to an old Secret at its copy.
///
/// Each reference is rewritten once from its original value. Old names are
/// first swapped for placeholders, so a new name that equals another old name
/// is not renamed a second time.
pub fn rewrite_references(
	editor: &dyn DocumentEditor,
	mut doc: Document,
	plans: &[RekeyPlan],
) -> Result<Document, RekeyError> {
	for (index, plan) in plans.iter().enumerate() {
		doc = set_reference(editor, doc, &plan.old_secret_name, &placeholder(index), plan)?;
	}
	for (index, plan) in plans.iter().enumerate() {
		doc = set_reference(editor, doc, &placeholder(index), &plan.new_secret_name, plan)?;
	}
	Ok(doc)
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;
	use crate::{editor::NativeEditor, test_utils::FakeCluster};

	fn b64(s: &str) -> Value {
		Value::from(STANDARD.encode(s))
	}

	fn overrides(input: &str) -> SecretOverrides {
		SecretOverrides::parse([input], ";").unwrap()
	}

	fn secret(name: &str, data: Value) -> Document {
		Document::new(json!({
			"apiVersion": "v1",
			"kind": "Secret",
			"type": "Opaque",
			"metadata": {
				"name": name,
				"namespace": "ns1",
				"uid": "9a1f",
				"resourceVersion": "77",
				"creationTimestamp": "2024-01-01T00:00:00Z",
				"annotations": { "kubectl.kubernetes.io/last-applied-configuration": "{}" },
				"ownerReferences": [ { "kind": "SealedSecret", "name": name } ],
				"labels": { "team": "core" }
			},
			"data": data
		}))
	}

	#[test]
	fn test_merge_keys() {
		let data = json!({ "a": b64("1"), "b": b64("2") });
		let merged = merge_keys("db", data.as_object().unwrap(), &overrides("b=3;c=4")).unwrap();
		assert_eq!(
			Value::Object(merged),
			json!({ "a": b64("1"), "b": b64("3"), "c": b64("4") })
		);
	}

	#[test]
	fn test_merge_keys_keeps_binary_untouched() {
		let raw = STANDARD.encode([0xff_u8, 0x00, 0xfe]);
		let data = json!({ "bin": raw });
		let merged = merge_keys("db", data.as_object().unwrap(), &overrides("x=y")).unwrap();
		assert_eq!(merged["bin"], json!(raw));
	}

	#[test]
	fn test_merge_keys_invalid_base64() {
		let data = json!({ "a": "not base64!" });
		assert_matches!(
			merge_keys("db", data.as_object().unwrap(), &SecretOverrides::default()),
			Err(RekeyError::Decode { key, .. }) if key == "a"
		);
	}

	#[test]
	fn test_parse_and_render_env() {
		let entries = parse_env("# comment\n\n B = 2 \nA=1\nnot a pair\nURL=x=y\n");
		assert_eq!(render_env(&entries), "A=1\nB=2\nURL=x=y");
	}

	#[test]
	fn test_merge_env_blob() {
		let merged =
			merge_env_blob("app", "secrets.env", &b64("b=2\na=1\n"), &overrides("b=3;c=4")).unwrap();
		assert_eq!(merged, STANDARD.encode("a=1\nb=3\nc=4"));
	}

	#[test]
	fn test_prepare_secret_keys() {
		let plan = RekeyPlan::new("db", "app-test-debug");
		let doc = prepare_secret(
			&NativeEditor,
			secret("db", json!({ "a": b64("1"), "b": b64("2") })),
			&plan,
			&overrides("b=3;c=4"),
			&SecretLayout::Keys,
		)
		.unwrap();

		assert_eq!(
			doc.as_value(),
			&json!({
				"apiVersion": "v1",
				"kind": "Secret",
				"type": "Opaque",
				"metadata": {
					"name": "db-app-test-debug",
					"namespace": "ns1",
					"labels": { "team": "core" }
				},
				"data": { "a": b64("1"), "b": b64("3"), "c": b64("4") }
			})
		);
	}

	#[test]
	fn test_prepare_secret_env_blob() {
		let plan = RekeyPlan::new("app-env", "app-test-debug");
		let layout = SecretLayout::EnvBlob {
			key: DEFAULT_ENV_BLOB_KEY.to_string(),
		};
		let doc = prepare_secret(
			&NativeEditor,
			secret("app-env", json!({ "secrets.env": b64("TOKEN=old\nMODE=prod"), "other": b64("x") })),
			&plan,
			&overrides("TOKEN=new"),
			&layout,
		)
		.unwrap();

		let data = doc.as_value()["data"].clone();
		assert_eq!(data["secrets.env"], b64("MODE=prod\nTOKEN=new"));
		assert_eq!(data["other"], b64("x"));
	}

	#[test]
	fn test_prepare_secret_missing_blob() {
		let layout = SecretLayout::EnvBlob {
			key: DEFAULT_ENV_BLOB_KEY.to_string(),
		};
		assert_matches!(
			prepare_secret(
				&NativeEditor,
				secret("db", json!({ "a": b64("1") })),
				&RekeyPlan::new("db", "copy"),
				&SecretOverrides::default(),
				&layout,
			),
			Err(RekeyError::MissingBlob { key, .. }) if key == "secrets.env"
		);
	}

	#[test]
	fn test_prepare_secret_without_data() {
		let doc = Document::new(json!({ "kind": "Secret", "metadata": { "name": "db" } }));
		let doc = prepare_secret(
			&NativeEditor,
			doc,
			&RekeyPlan::new("db", "copy"),
			&overrides("k=v"),
			&SecretLayout::Keys,
		)
		.unwrap();
		assert_eq!(doc.as_value()["data"], json!({ "k": b64("v") }));
	}

	#[tokio::test]
	async fn test_rekey_applies_copy() {
		let cluster = FakeCluster::new().with_object(
			ResourceKind::Secret,
			"ns1",
			secret("db", json!({ "a": b64("1") })),
		);
		let plan = RekeyPlan::new("db", "app-test-debug");

		let result = rekey(
			&cluster,
			&NativeEditor,
			"ns1",
			&plan,
			&overrides("a=2"),
			&SecretLayout::Keys,
		)
		.await
		.unwrap();

		assert_eq!(result, plan);
		let copy = cluster
			.object(ResourceKind::Secret, "ns1", "db-app-test-debug")
			.unwrap();
		assert_eq!(copy.as_value()["data"], json!({ "a": b64("2") }));
		let original = cluster.object(ResourceKind::Secret, "ns1", "db").unwrap();
		assert_eq!(original.as_value()["data"], json!({ "a": b64("1") }));
	}

	#[tokio::test]
	async fn test_rekey_missing_secret() {
		let cluster = FakeCluster::new().with_namespace("ns1");
		assert_matches!(
			rekey(
				&cluster,
				&NativeEditor,
				"ns1",
				&RekeyPlan::new("db", "copy"),
				&SecretOverrides::default(),
				&SecretLayout::Keys,
			)
			.await,
			Err(RekeyError::Fetch { name, source: ClusterError::NotFound { .. } }) if name == "db"
		);
	}

	#[test]
	fn test_rewrite_references() {
		let doc = Document::new(json!({
			"spec": { "template": { "spec": {
				"containers": [ {
					"env": [
						{ "name": "A", "valueFrom": { "secretKeyRef": { "name": "db", "key": "a" } } },
						{ "name": "B", "valueFrom": { "secretKeyRef": { "name": "other", "key": "b" } } }
					],
					"envFrom": [ { "secretRef": { "name": "db" } } ]
				} ],
				"volumes": [ { "name": "v", "secret": { "secretName": "db" } } ]
			} } }
		}));

		let doc = rewrite_references(&NativeEditor, doc, &[RekeyPlan::new("db", "copy")]).unwrap();
		let spec = &doc.as_value()["spec"]["template"]["spec"];
		assert_eq!(spec["containers"][0]["env"][0]["valueFrom"]["secretKeyRef"]["name"], "db-copy");
		assert_eq!(spec["containers"][0]["env"][1]["valueFrom"]["secretKeyRef"]["name"], "other");
		assert_eq!(spec["containers"][0]["envFrom"][0]["secretRef"]["name"], "db-copy");
		assert_eq!(spec["volumes"][0]["secret"]["secretName"], "db-copy");
	}

	#[test]
	fn test_rewrite_references_renames_each_site_once() {
		let doc = Document::new(json!({
			"spec": { "template": { "spec": {
				"volumes": [
					{ "name": "a", "secret": { "secretName": "db" } },
					{ "name": "b", "secret": { "secretName": "db-copy" } }
				]
			} } }
		}));
		let plans = [RekeyPlan::new("db", "copy"), RekeyPlan::new("db-copy", "copy")];

		let doc = rewrite_references(&NativeEditor, doc, &plans).unwrap();
		let volumes = &doc.as_value()["spec"]["template"]["spec"]["volumes"];
		assert_eq!(volumes[0]["secret"]["secretName"], "db-copy");
		assert_eq!(volumes[1]["secret"]["secretName"], "db-copy-copy");
	}

	#[test]
	fn test_plan_all() {
		let names: BTreeSet<String> = ["cache", "db"].map(String::from).into();
		assert_eq!(
			plan_all(&names, "copy").unwrap(),
			vec![RekeyPlan::new("cache", "copy"), RekeyPlan::new("db", "copy")]
		);
	}

	#[test]
	fn test_plan_all_refuses_to_replace_a_referenced_secret() {
		let names: BTreeSet<String> = ["db", "db-copy"].map(String::from).into();
		assert_matches!(
			plan_all(&names, "copy"),
			Err(RekeyError::NameConflict { old, new }) if old == "db" && new == "db-copy"
		);
	}
}
