//! Finding the Secrets a Deployment consumes.

use std::{collections::BTreeSet, fmt};

use k8s::Document;

use crate::editor::{DocumentEditor, EditorError};

/// Where in the pod template a Secret is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SiteKind {
	/// `env[].valueFrom.secretKeyRef`
	EnvValueFrom,
	/// `envFrom[].secretRef`
	EnvFrom,
	/// `volumes[].secret`
	Volume,
}

impl SiteKind {
	pub const ALL: [SiteKind; 3] = [SiteKind::EnvValueFrom, SiteKind::EnvFrom, SiteKind::Volume];

	/// Path matching every reference object of this kind.
	pub fn collection(self) -> &'static str {
		match self {
			SiteKind::EnvValueFrom => ".spec.template.spec.containers[].env[].valueFrom.secretKeyRef",
			SiteKind::EnvFrom => ".spec.template.spec.containers[].envFrom[].secretRef",
			SiteKind::Volume => ".spec.template.spec.volumes[].secret",
		}
	}

	/// Field of the reference object holding the Secret name.
	pub fn name_field(self) -> &'static str {
		match self {
			SiteKind::EnvValueFrom | SiteKind::EnvFrom => "name",
			SiteKind::Volume => "secretName",
		}
	}

	fn name_path(self) -> String {
		format!("{}.{}", self.collection(), self.name_field())
	}
}

impl fmt::Display for SiteKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SiteKind::EnvValueFrom => "env",
			SiteKind::EnvFrom => "envFrom",
			SiteKind::Volume => "volume",
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SecretReferenceSite {
	pub kind: SiteKind,
	pub secret_name: String,
}

/// Every Secret reference, grouped by site kind in document order.
pub fn reference_sites(
	editor: &dyn DocumentEditor,
	doc: &Document,
) -> Result<Vec<SecretReferenceSite>, EditorError> {
	let mut sites = Vec::new();
	for kind in SiteKind::ALL {
		for value in editor.get_field(doc, &kind.name_path())? {
			match value.as_str() {
				Some(name) if !name.is_empty() => sites.push(SecretReferenceSite {
					kind,
					secret_name: name.to_string(),
				}),
				_ => {}
			}
		}
	}
	Ok(sites)
}

/// Names of all referenced Secrets, deduplicated and sorted.
pub fn discover(
	editor: &dyn DocumentEditor,
	doc: &Document,
) -> Result<BTreeSet<String>, EditorError> {
	Ok(reference_sites(editor, doc)?
		.into_iter()
		.map(|site| site.secret_name)
		.collect())
}
