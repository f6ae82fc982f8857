//! In-memory cluster for unit tests.

use std::{
	collections::{HashMap, HashSet},
	sync::Mutex,
};

use k8s::Document;
use serde_json::json;

use crate::cluster::{ClusterClient, ClusterError, ResourceKind};

type Key = (ResourceKind, String, String);

#[derive(Default)]
pub struct FakeCluster {
	namespaces: HashSet<String>,
	objects: Mutex<HashMap<Key, Document>>,
	applied: Mutex<Vec<(ResourceKind, String)>>,
	failing_applies: HashSet<String>,
	failing_gets: HashSet<String>,
}

pub fn deployment(namespace: &str, name: &str) -> Document {
	Document::new(json!({
		"apiVersion": "apps/v1",
		"kind": "Deployment",
		"metadata": { "name": name, "namespace": namespace },
		"spec": {
			"replicas": 3,
			"selector": { "matchLabels": { "app": name } },
			"template": {
				"metadata": { "labels": { "app": name } },
				"spec": { "containers": [ { "name": "main", "image": "registry/app:1.0" } ] }
			}
		}
	}))
}

impl FakeCluster {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_namespace(mut self, namespace: &str) -> Self {
		self.namespaces.insert(namespace.to_string());
		self
	}

	#[must_use]
	pub fn with_deployment(self, namespace: &str, name: &str) -> Self {
		self.with_object(ResourceKind::Deployment, namespace, deployment(namespace, name))
	}

	#[must_use]
	pub fn with_object(mut self, kind: ResourceKind, namespace: &str, doc: Document) -> Self {
		self.namespaces.insert(namespace.to_string());
		let name = doc.name().unwrap_or_default().to_string();
		self.objects
			.get_mut()
			.unwrap()
			.insert((kind, namespace.to_string(), name), doc);
		self
	}

	/// Applying an object named `name` fails.
	#[must_use]
	pub fn failing_apply(mut self, name: &str) -> Self {
		self.failing_applies.insert(name.to_string());
		self
	}

	/// Fetching an object named `name` fails.
	#[must_use]
	pub fn failing_get(mut self, name: &str) -> Self {
		self.failing_gets.insert(name.to_string());
		self
	}

	/// Successful applies, in order.
	pub fn applied(&self) -> Vec<(ResourceKind, String)> {
		self.applied.lock().unwrap().clone()
	}

	pub fn object(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<Document> {
		self.objects
			.lock()
			.unwrap()
			.get(&(kind, namespace.to_string(), name.to_string()))
			.cloned()
	}
}

fn injected(name: &str) -> ClusterError {
	ClusterError::Rejected {
		name: name.to_string(),
		code: 500,
		message: format!("injected failure for {name}"),
	}
}

impl ClusterClient for FakeCluster {
	async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError> {
		Ok(self.namespaces.contains(name))
	}

	async fn resource_exists(
		&self,
		kind: ResourceKind,
		name: &str,
		namespace: &str,
	) -> Result<bool, ClusterError> {
		Ok(self.object(kind, namespace, name).is_some())
	}

	async fn get_document(
		&self,
		kind: ResourceKind,
		name: &str,
		namespace: &str,
	) -> Result<Document, ClusterError> {
		if self.failing_gets.contains(name) {
			return Err(injected(name));
		}
		self.object(kind, namespace, name)
			.ok_or_else(|| ClusterError::NotFound {
				kind,
				name: name.to_string(),
				namespace: namespace.to_string(),
			})
	}

	async fn apply(
		&self,
		kind: ResourceKind,
		document: &Document,
		namespace: &str,
	) -> Result<(), ClusterError> {
		let name = document.name().unwrap_or_default().to_string();
		if self.failing_applies.contains(&name) {
			return Err(injected(&name));
		}
		self.objects.lock().unwrap().insert(
			(kind, namespace.to_string(), name.clone()),
			document.clone(),
		);
		self.applied.lock().unwrap().push((kind, name));
		Ok(())
	}
}
