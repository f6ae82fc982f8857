//! Turning a live Deployment into a fresh copy.

use k8s::{Document, Path};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::instrument;

use crate::editor::{DocumentEditor, EditorError};

/// Fields owned by the API server.
pub const SERVER_MANAGED_FIELDS: &[&str] = &[
	".metadata.uid",
	".metadata.resourceVersion",
	".metadata.creationTimestamp",
	".metadata.generation",
	".metadata.managedFields",
	".metadata.annotations[\"kubectl.kubernetes.io/last-applied-configuration\"]",
	".metadata.annotations[\"deployment.kubernetes.io/revision\"]",
	".status",
];

pub const PROBE_FIELDS: &[&str] = &[
	".spec.template.spec.containers[].livenessProbe",
	".spec.template.spec.containers[].readinessProbe",
];

pub const IMAGE_PATH: &str = ".spec.template.spec.containers[0].image";

pub const DEFAULT_LABEL_KEY: &str = "app";

#[derive(Debug, Error)]
pub enum TransformError {
	#[error("image reference `{0}` must have the form <name>:<tag> without a digest")]
	MalformedImageReference(String),

	#[error("the first container has no image to retag")]
	MissingImage,

	#[error("image tag `{0}` is not valid")]
	InvalidImageTag(String),

	#[error(transparent)]
	Editor(#[from] EditorError),
}

#[derive(Debug, Clone)]
pub struct TransformOptions<'a> {
	pub new_name: &'a str,
	pub label_key: &'a str,
	pub image_tag: Option<&'a str>,
	pub strip_probes: bool,
}

fn validate_tag(tag: &str) -> Result<(), TransformError> {
	let valid = !tag.is_empty()
		&& tag.len() <= 128
		&& !tag.starts_with(['.', '-'])
		&& tag
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
	if valid {
		Ok(())
	} else {
		Err(TransformError::InvalidImageTag(tag.to_string()))
	}
}

/// Replace the tag of `reference`, which must be `<name>:<tag>`.
///
/// The tag is what follows the last `:`, so registry ports stay part of the name.
pub fn retag(reference: &str, tag: &str) -> Result<String, TransformError> {
	validate_tag(tag)?;
	let malformed = || TransformError::MalformedImageReference(reference.to_string());
	if reference.contains('@') {
		return Err(malformed());
	}
	let (name, current) = reference.rsplit_once(':').ok_or_else(malformed)?;
	if name.is_empty() || current.is_empty() || current.contains('/') {
		return Err(malformed());
	}
	Ok(format!("{name}:{tag}"))
}

fn label_path(prefix: &str, key: &str) -> String {
	Path::must(prefix).key(key).to_string()
}

/// Apply every transform step. Running it twice gives the same document.
#[instrument(skip_all, fields(new_name = options.new_name))]
pub fn transform(
	editor: &dyn DocumentEditor,
	doc: Document,
	options: &TransformOptions<'_>,
) -> Result<Document, TransformError> {
	if let Some(tag) = options.image_tag {
		validate_tag(tag)?;
	}

	let mut doc = editor.delete_fields(doc, SERVER_MANAGED_FIELDS)?;
	if options.strip_probes {
		doc = editor.delete_fields(doc, PROBE_FIELDS)?;
	}

	doc = editor.set_field(doc, ".spec.replicas", json!(1))?;

	let name = Value::from(options.new_name);
	doc = editor.set_field(doc, ".metadata.name", name.clone())?;
	doc = editor.set_field(
		doc,
		&label_path(".spec.selector.matchLabels", options.label_key),
		name.clone(),
	)?;
	doc = editor.set_field(
		doc,
		&label_path(".spec.template.metadata.labels", options.label_key),
		name,
	)?;

	if let Some(tag) = options.image_tag {
		let image = editor
			.get_str(&doc, IMAGE_PATH)?
			.ok_or(TransformError::MissingImage)?;
		let retagged = retag(&image, tag)?;
		tracing::debug!(from = %image, to = %retagged, "retagging image");
		doc = editor.set_field(doc, IMAGE_PATH, Value::from(retagged))?;
	}

	Ok(doc)
}
