//! [`ClusterClient`] backed by a live API server.

use k8s::Document;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DynamicObject};
use tracing::instrument;

use super::{
	apply::{api_resource, ApplyEngine, ApplyStrategy},
	client::ClusterConnection,
	ClusterClient, ClusterError, ResourceKind,
};

pub struct KubeCluster {
	connection: ClusterConnection,
	engine: ApplyEngine,
}

impl KubeCluster {
	pub fn new(
		connection: ClusterConnection,
		strategy: ApplyStrategy,
		field_manager: impl Into<String>,
	) -> Self {
		let engine = ApplyEngine::new(connection.client().clone(), strategy, field_manager);
		Self { connection, engine }
	}

	pub fn connection(&self) -> &ClusterConnection {
		&self.connection
	}

	fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
		Api::namespaced_with(
			self.connection.client().clone(),
			namespace,
			&api_resource(kind),
		)
	}

	async fn fetch(
		&self,
		kind: ResourceKind,
		name: &str,
		namespace: &str,
	) -> Result<Option<DynamicObject>, ClusterError> {
		self.api(kind, namespace)
			.get_opt(name)
			.await
			.map_err(|e| ClusterError::from_kube(name, e))
	}
}

impl ClusterClient for KubeCluster {
	#[instrument(skip(self))]
	async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError> {
		let api: Api<Namespace> = Api::all(self.connection.client().clone());
		let found = api
			.get_opt(name)
			.await
			.map_err(|e| ClusterError::from_kube(name, e))?;
		Ok(found.is_some())
	}

	#[instrument(skip(self))]
	async fn resource_exists(
		&self,
		kind: ResourceKind,
		name: &str,
		namespace: &str,
	) -> Result<bool, ClusterError> {
		Ok(self.fetch(kind, name, namespace).await?.is_some())
	}

	#[instrument(skip(self))]
	async fn get_document(
		&self,
		kind: ResourceKind,
		name: &str,
		namespace: &str,
	) -> Result<Document, ClusterError> {
		let object =
			self.fetch(kind, name, namespace)
				.await?
				.ok_or_else(|| ClusterError::NotFound {
					kind,
					name: name.to_string(),
					namespace: namespace.to_string(),
				})?;
		let mut value = serde_json::to_value(&object).map_err(|source| ClusterError::Decode {
			name: name.to_string(),
			source,
		})?;

		// Lists and some proxies drop the type meta on single objects.
		if let Some(map) = value.as_object_mut() {
			map.entry("apiVersion")
				.or_insert_with(|| kind.api_version().into());
			map.entry("kind").or_insert_with(|| kind.as_str().into());
		}
		Ok(Document::new(value))
	}

	#[instrument(skip(self, document), fields(name = document.name().unwrap_or("unknown")))]
	async fn apply(
		&self,
		kind: ResourceKind,
		document: &Document,
		namespace: &str,
	) -> Result<(), ClusterError> {
		self.engine
			.apply_manifest(kind, document.as_value(), namespace)
			.await?;
		Ok(())
	}
}
