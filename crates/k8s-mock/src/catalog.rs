//! Resource kinds known to the mock server and their API paths.

/// A served resource kind.
pub struct CatalogEntry {
	/// Plural resource name used in URLs.
	pub plural: &'static str,
	pub kind: &'static str,
	pub api_version: &'static str,
	pub namespaced: bool,
}

/// The kinds the mock server knows how to route.
pub struct ResourceCatalog {
	entries: Vec<CatalogEntry>,
}

impl Default for ResourceCatalog {
	fn default() -> Self {
		Self {
			entries: vec![
				CatalogEntry::namespaced("v1", "secrets", "Secret"),
				CatalogEntry::namespaced("v1", "configmaps", "ConfigMap"),
				CatalogEntry::cluster_scoped("v1", "namespaces", "Namespace"),
				CatalogEntry::namespaced("apps/v1", "deployments", "Deployment"),
			],
		}
	}
}

impl CatalogEntry {
	const fn namespaced(api_version: &'static str, plural: &'static str, kind: &'static str) -> Self {
		Self {
			plural,
			kind,
			api_version,
			namespaced: true,
		}
	}

	const fn cluster_scoped(
		api_version: &'static str,
		plural: &'static str,
		kind: &'static str,
	) -> Self {
		Self {
			plural,
			kind,
			api_version,
			namespaced: false,
		}
	}

	/// Collection path, e.g. `/apis/apps/v1/namespaces/ns1/deployments`.
	pub fn collection_path(&self, namespace: Option<&str>) -> String {
		let prefix = if self.api_version.contains('/') {
			format!("/apis/{}", self.api_version)
		} else {
			format!("/api/{}", self.api_version)
		};
		if self.namespaced {
			format!(
				"{}/namespaces/{}/{}",
				prefix,
				namespace.unwrap_or("default"),
				self.plural
			)
		} else {
			format!("{}/{}", prefix, self.plural)
		}
	}
}

impl ResourceCatalog {
	pub fn lookup(&self, api_version: &str, kind: &str) -> Option<&CatalogEntry> {
		self.entries
			.iter()
			.find(|e| e.api_version == api_version && e.kind == kind)
	}

	/// Derive `(collection path, name)` for a manifest.
	pub fn locate(&self, manifest: &serde_json::Value) -> Option<(String, String)> {
		let api_version = manifest.get("apiVersion")?.as_str()?;
		let kind = manifest.get("kind")?.as_str()?;
		let name = manifest.pointer("/metadata/name")?.as_str()?;
		let namespace = manifest
			.pointer("/metadata/namespace")
			.and_then(|n| n.as_str());
		let entry = self.lookup(api_version, kind)?;
		Some((entry.collection_path(namespace), name.to_string()))
	}
}
